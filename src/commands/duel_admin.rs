//! Server moderation of duels.
//!
//! Every command here requires the Manage Server permission on discord.
//! The implementations check it again through [MessageContext::is_guild_admin],
//! so they can be reused from contexts poise doesn't guard.

// {{{ Imports
use poise::serenity_prelude::{Role, User};

use crate::context::{Error, PoiseContext, TaggedError};
use crate::duel::record::DuelRecord;
use crate::duel::session::{DuelPhase, DuelSession};
use crate::duel::settings::GuildSettings;
use crate::royale::PlayerTag;
use crate::user_error;

use super::discord::MessageContext;
use super::duel::register_impl;
use super::utils::{format_secs, mention, mention_role};
// }}}

// {{{ Helpers
pub(super) async fn require_admin<C: MessageContext>(ctx: &C) -> Result<u64, TaggedError> {
	let guild_id = ctx.require_guild()?;
	if !ctx.is_guild_admin().await? {
		return Err(user_error!(
			"Only members who can manage this server can do that!"
		));
	}

	Ok(guild_id)
}

fn update_settings<C: MessageContext>(
	ctx: &C,
	guild_id: u64,
	update: impl FnOnce(&mut GuildSettings),
) -> Result<GuildSettings, Error> {
	let conn = ctx.data().db.get()?;
	let mut settings = GuildSettings::get(&conn, guild_id)?;
	update(&mut settings);
	settings.save(&conn)?;
	Ok(settings)
}
// }}}
// {{{ Clear
// {{{ Implementation
pub async fn clear_impl<C: MessageContext>(ctx: &mut C) -> Result<DuelSession, TaggedError> {
	let guild_id = require_admin(ctx).await?;
	let previous = {
		let mut conn = ctx.data().db.get()?;
		DuelSession::clear(&mut conn, guild_id)?
	};

	ctx.data().hub.cancel_generation(guild_id, previous.generation);
	tracing::info!(
		guild_id,
		generation = previous.generation,
		by = ctx.author_id(),
		"Duel cleared"
	);

	let message = match previous.phase() {
		DuelPhase::Idle => "There was no duel running, but everything has been reset anyway.".to_owned(),
		DuelPhase::Pending => format!(
			"Cleared the pending duel of {}. No credits changed hands.",
			mention(previous.player1_id)
		),
		DuelPhase::Accepted => format!(
			"Cleared the duel between {} and {}. No credits changed hands.",
			mention(previous.player1_id),
			mention(previous.player2_id)
		),
	};

	ctx.reply(&message).await?;
	Ok(previous)
}
// }}}
// {{{ Discord wrapper
/// Force clear the running duel without paying anything out
#[poise::command(
	prefix_command,
	slash_command,
	guild_only,
	required_permissions = "MANAGE_GUILD"
)]
pub async fn clear(mut ctx: PoiseContext<'_>) -> Result<(), Error> {
	let res = clear_impl(&mut ctx).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Reset
// {{{ Implementation
pub async fn reset_impl<C: MessageContext>(ctx: &mut C) -> Result<usize, TaggedError> {
	let guild_id = require_admin(ctx).await?;
	let changed = {
		let conn = ctx.data().db.get()?;
		DuelRecord::reset_season(&conn, guild_id)?
	};

	tracing::info!(guild_id, changed, "Season reset");
	ctx.reply(&format!(
		"A new season has begun! Reset the wins of {changed} members."
	))
	.await?;

	Ok(changed)
}
// }}}
// {{{ Discord wrapper
/// Start a new season, resetting everyone's season wins
#[poise::command(
	prefix_command,
	slash_command,
	guild_only,
	required_permissions = "MANAGE_GUILD"
)]
pub async fn reset(mut ctx: PoiseContext<'_>) -> Result<(), Error> {
	let res = reset_impl(&mut ctx).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Minimum bet
// {{{ Implementation
pub async fn mincreds_impl<C: MessageContext>(
	ctx: &mut C,
	amount: u64,
) -> Result<GuildSettings, TaggedError> {
	let guild_id = require_admin(ctx).await?;
	if amount == 0 {
		return Err(user_error!("The minimum bet must be at least one credit."));
	}

	let settings = update_settings(ctx, guild_id, |s| s.min_bet = amount)?;
	ctx.reply(&format!("The minimum bet is now {amount} credits."))
		.await?;

	Ok(settings)
}
// }}}
// {{{ Discord wrapper
/// Set the smallest bet a duel can be started with
#[poise::command(
	prefix_command,
	slash_command,
	guild_only,
	required_permissions = "MANAGE_GUILD"
)]
pub async fn mincreds(
	mut ctx: PoiseContext<'_>,
	#[description = "Minimum amount of credits"] amount: u64,
) -> Result<(), Error> {
	let res = mincreds_impl(&mut ctx, amount).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Timeouts
// {{{ Implementation
pub async fn timeouts_impl<C: MessageContext>(
	ctx: &mut C,
	accept_secs: u64,
	battle_secs: u64,
) -> Result<GuildSettings, TaggedError> {
	let guild_id = require_admin(ctx).await?;
	if accept_secs == 0 || battle_secs == 0 {
		return Err(user_error!("Timeouts must be at least one second long."));
	}

	let settings = update_settings(ctx, guild_id, |s| {
		s.accept_timeout_secs = accept_secs;
		s.battle_timeout_secs = battle_secs;
	})?;

	ctx.reply(&format!(
		"Duels now wait {} to be accepted, and {} for the battle. Running duels keep their old timeouts.",
		format_secs(accept_secs),
		format_secs(battle_secs)
	))
	.await?;

	Ok(settings)
}
// }}}
// {{{ Discord wrapper
/// Set how long duels wait for an opponent and for the battle
#[poise::command(
	prefix_command,
	slash_command,
	guild_only,
	required_permissions = "MANAGE_GUILD"
)]
pub async fn timeouts(
	mut ctx: PoiseContext<'_>,
	#[description = "Seconds to wait for someone to accept"] accept: u64,
	#[description = "Seconds to wait for the battle"] battle: u64,
) -> Result<(), Error> {
	let res = timeouts_impl(&mut ctx, accept, battle).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Ping role
// {{{ Implementation
pub async fn role_impl<C: MessageContext>(
	ctx: &mut C,
	role_id: Option<u64>,
) -> Result<GuildSettings, TaggedError> {
	let guild_id = require_admin(ctx).await?;
	let settings = update_settings(ctx, guild_id, |s| s.ping_role_id = role_id)?;

	let message = match role_id {
		Some(role_id) => format!("Public duels will now ping {}.", mention_role(role_id)),
		None => "Public duels won't ping anyone anymore.".to_owned(),
	};

	ctx.reply(&message).await?;
	Ok(settings)
}
// }}}
// {{{ Discord wrapper
/// Set (or unset) the role pinged for public duels
#[poise::command(
	prefix_command,
	slash_command,
	guild_only,
	required_permissions = "MANAGE_GUILD"
)]
pub async fn role(
	mut ctx: PoiseContext<'_>,
	#[description = "Leave empty to stop pinging"] role: Option<Role>,
) -> Result<(), Error> {
	let res = role_impl(&mut ctx, role.map(|r| r.id.get())).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Set tag
// {{{ Implementation
pub async fn settag_impl<C: MessageContext>(
	ctx: &mut C,
	member_id: u64,
	raw_tag: &str,
) -> Result<PlayerTag, TaggedError> {
	require_admin(ctx).await?;
	register_impl(ctx, member_id, raw_tag).await
}
// }}}
// {{{ Discord wrapper
/// Register a player tag on behalf of someone else
#[poise::command(
	prefix_command,
	slash_command,
	guild_only,
	required_permissions = "MANAGE_GUILD"
)]
pub async fn settag(
	mut ctx: PoiseContext<'_>,
	#[description = "Member to register"] member: User,
	#[description = "Their player tag"] tag: String,
) -> Result<(), Error> {
	let res = settag_impl(&mut ctx, member.id.get(), &tag).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
