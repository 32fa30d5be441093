// {{{ Imports
use poise::serenity_prelude::User;

use crate::bank;
use crate::context::{Error, PoiseContext, TaggedError};
use crate::user_error;

use super::discord::MessageContext;
use super::duel_admin::require_admin;
use super::utils::mention;
// }}}

// {{{ Toplevel
/// Look at (or manage) the credits used for betting
#[poise::command(
	prefix_command,
	slash_command,
	guild_only,
	subcommands("balance", "set"),
	subcommand_required
)]
pub async fn bank(_ctx: PoiseContext<'_>) -> Result<(), Error> {
	Ok(())
}
// }}}
// {{{ Balance
// {{{ Implementation
pub async fn balance_impl<C: MessageContext>(
	ctx: &mut C,
	member_id: Option<u64>,
) -> Result<u64, TaggedError> {
	let guild_id = ctx.require_guild()?;
	let member_id = member_id.unwrap_or_else(|| ctx.author_id());
	let balance = bank::balance(&*ctx.data().db.get()?, guild_id, member_id)?;

	ctx.reply(&format!("{} has {balance} credits.", mention(member_id)))
		.await?;

	Ok(balance)
}
// }}}
// {{{ Discord wrapper
/// Show how many credits a member has
#[poise::command(prefix_command, slash_command, guild_only)]
async fn balance(
	mut ctx: PoiseContext<'_>,
	#[description = "Defaults to yourself"] member: Option<User>,
) -> Result<(), Error> {
	let res = balance_impl(&mut ctx, member.map(|m| m.id.get())).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Set
// {{{ Implementation
pub async fn set_impl<C: MessageContext>(
	ctx: &mut C,
	member_id: u64,
	amount: u64,
) -> Result<(), TaggedError> {
	let guild_id = require_admin(ctx).await?;

	// Balances are stored as signed 64 bit integers
	if i64::try_from(amount).is_err() {
		return Err(user_error!("Balances can be at most {} credits.", i64::MAX));
	}

	bank::set_balance(&*ctx.data().db.get()?, guild_id, member_id, amount)?;

	tracing::info!(guild_id, member_id, amount, by = ctx.author_id(), "Balance set");
	ctx.reply(&format!(
		"{} now has {amount} credits.",
		mention(member_id)
	))
	.await?;

	Ok(())
}
// }}}
// {{{ Discord wrapper
/// Overwrite the balance of a member
#[poise::command(
	prefix_command,
	slash_command,
	guild_only,
	required_permissions = "MANAGE_GUILD"
)]
async fn set(
	mut ctx: PoiseContext<'_>,
	#[description = "Member whose balance to set"] member: User,
	#[description = "Their new balance"] amount: u64,
) -> Result<(), Error> {
	let res = set_impl(&mut ctx, member.id.get(), amount).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
