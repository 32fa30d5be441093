// {{{ Imports
use std::time::Duration;

use chrono::Utc;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter, User};
use poise::CreateReply;
use rusqlite::Connection;
use tokio::time::Instant;

use crate::bank;
use crate::context::{Error, ErrorKind, PoiseContext, TagError, TaggedError};
use crate::duel::correlate::{classify, find_resolving_battle};
use crate::duel::hub::{AcceptWait, DuelSignals};
use crate::duel::record::{leaderboard, DuelRecord, LeaderboardSort};
use crate::duel::session::{Challenge, DuelPhase, DuelSession};
use crate::duel::settings::GuildSettings;
use crate::duel::settle::{settle, Settlement};
use crate::royale::{Battle, PlayerTag};
use crate::user_error;

use super::discord::MessageContext;
use super::duel_admin::{clear, mincreds, reset, role, settag, timeouts};
use super::utils::ranked_list::RankedList;
use super::utils::{format_secs, mention, mention_role};
// }}}

// {{{ Toplevel
/// Wager credits on a real Clash Royale battle
#[poise::command(
	prefix_command,
	slash_command,
	guild_only,
	subcommands(
		"start", "accept", "cancel", "claim", "register", "stats", "ldb", "battles", "clear",
		"reset", "mincreds", "timeouts", "role", "settag"
	),
	subcommand_required
)]
pub async fn duel(_ctx: PoiseContext<'_>) -> Result<(), Error> {
	Ok(())
}
// }}}
// {{{ Helpers
fn registered_tag(conn: &Connection, guild_id: u64, member_id: u64) -> Result<PlayerTag, TaggedError> {
	DuelRecord::get(conn, guild_id, member_id)?.tag.ok_or_else(|| {
		user_error!(
			"{} has no player tag registered! Use `duel register <tag>` first.",
			mention(member_id)
		)
	})
}

/// Crowns taken by a duellist in a battle from player one's log.
fn crowns_of(session: &DuelSession, battle: &Battle, member_id: u64) -> u32 {
	if member_id == session.player1_id {
		battle.team_crowns()
	} else {
		battle.opponent_crowns()
	}
}
// }}}
// {{{ Start
// {{{ Implementation
pub async fn start_impl<C: MessageContext>(
	ctx: &mut C,
	bet: u64,
	target_id: Option<u64>,
) -> Result<AcceptWait, TaggedError> {
	let guild_id = ctx.require_guild()?;
	let author = ctx.author_id();

	let (settings, session, tag) = {
		let conn = ctx.data().db.get()?;

		if DuelSession::get_or_expire(&conn, guild_id, Utc::now())?.active {
			return Err(user_error!(
				"A duel is already running in this server! Wait for it to finish first."
			));
		}

		let settings = GuildSettings::get(&conn, guild_id)?;
		if bet < settings.min_bet {
			return Err(user_error!(
				"The minimum bet in this server is {} credits.",
				settings.min_bet
			));
		}

		let balance = bank::balance(&conn, guild_id, author)?;
		if balance < bet {
			return Err(user_error!(
				"You can't bet {bet} credits, you only have {balance}."
			));
		}

		let tag = registered_tag(&conn, guild_id, author)?;

		if target_id == Some(author) {
			return Err(user_error!("You can't challenge yourself!"));
		}

		let challenge = Challenge {
			challenger_id: author,
			bet,
			target_id,
		};

		let session = DuelSession::open(&conn, &settings, challenge, Utc::now())?
			.ok_or_else(|| user_error!("Someone else started a duel just before you did!"))?;

		(settings, session, tag)
	};

	// Registered before announcing, so an immediate acceptance can't be missed
	let mut signals = ctx.data().hub.signals(guild_id, session.generation);
	tracing::info!(
		guild_id,
		generation = session.generation,
		player1 = author,
		bet,
		private = session.is_private,
		"Duel issued"
	);

	// {{{ Announce
	let content = match (target_id, settings.ping_role_id) {
		(Some(target), _) => Some(format!("{}, you have been challenged!", mention(target))),
		(None, Some(role)) => Some(format!("{} a new duel is up for grabs!", mention_role(role))),
		(None, None) => None,
	};

	let footer = if session.is_private {
		"Only the challenged member can accept, using `duel accept`"
	} else {
		"Anyone can accept using `duel accept`"
	};

	let embed = CreateEmbed::default()
		.title(if session.is_private {
			"Private duel challenge"
		} else {
			"Duel challenge"
		})
		.description(format!(
			"{} bets **{bet}** credits on a Clash Royale battle!",
			mention(author)
		))
		.field("Challenger", tag.to_string(), true)
		.field("Bet", bet.to_string(), true)
		.field("Expires in", format_secs(session.accept_timeout_secs), true)
		.footer(CreateEmbedFooter::new(footer));

	let mut reply = CreateReply::default().reply(true).embed(embed);
	if let Some(content) = content {
		reply = reply.content(content);
	}

	ctx.send(reply).await?;
	// }}}

	let wait = signals
		.wait_for_acceptance(Duration::from_secs(session.accept_timeout_secs))
		.await;

	if wait == AcceptWait::TimedOut {
		let expired = {
			let conn = ctx.data().db.get()?;
			DuelSession::clear_pending(&conn, guild_id, session.generation)?
		};

		// Otherwise someone accepted right as the time ran out
		if expired {
			ctx.data().hub.release(guild_id, session.generation);
			tracing::info!(guild_id, generation = session.generation, "Duel expired");
			ctx.reply(&format!(
				"Nobody accepted the duel of {} within {}, so it has been called off.",
				mention(author),
				format_secs(session.accept_timeout_secs)
			))
			.await?;
		}
	}

	Ok(wait)
}
// }}}
// {{{ Discord wrapper
/// Challenge the server (or a specific member) to a duel
#[poise::command(prefix_command, slash_command, guild_only)]
async fn start(
	mut ctx: PoiseContext<'_>,
	#[description = "How many credits to bet"] bet: u64,
	#[description = "Only let this member accept"] member: Option<User>,
) -> Result<(), Error> {
	let res = start_impl(&mut ctx, bet, member.map(|m| m.id.get())).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Accept
// {{{ Battle watching
enum BattleWatch {
	Found(Battle),
	Cancelled,
	TimedOut,
}

/// Polls the battle log of player one until a battle against player two
/// shows up, the duel is cancelled, or the battle timeout runs out.
async fn watch_battles<C: MessageContext>(
	ctx: &C,
	session: &DuelSession,
	player1_tag: &PlayerTag,
	player2_tag: &PlayerTag,
	signals: &DuelSignals,
) -> BattleWatch {
	let since = session.start_time.unwrap_or_else(Utc::now);
	let poll_interval = ctx.data().poll_interval;
	let deadline = Instant::now() + Duration::from_secs(session.battle_timeout_secs);

	loop {
		let wake_at = deadline.min(Instant::now() + poll_interval);
		tokio::select! {
			biased;
			_ = signals.cancelled() => return BattleWatch::Cancelled,
			_ = tokio::time::sleep_until(wake_at) => {}
		}

		match ctx.battle_log(player1_tag).await {
			Ok(battles) => {
				if let Some(battle) = find_resolving_battle(&battles, since, player2_tag) {
					return BattleWatch::Found(battle.clone());
				}
			}
			Err(err) => tracing::warn!(
				guild_id = session.guild_id,
				tag = %player1_tag,
				error.message = %err.error,
				"Could not fetch battle log"
			),
		}

		if Instant::now() >= deadline {
			return BattleWatch::TimedOut;
		}
	}
}
// }}}
// {{{ Settle & announce
async fn settle_and_announce<C: MessageContext>(
	ctx: &mut C,
	session: &DuelSession,
	battle: &Battle,
) -> Result<Settlement, TaggedError> {
	let outcome = classify(battle, session);
	let settlement = {
		let mut conn = ctx.data().db.get()?;
		settle(&mut conn, session, outcome)
	};

	let settlement = settlement.map_err(|err| match err.kind {
		ErrorKind::User => user_error!(
			"Could not settle the duel: {}. An admin can call it off with `duel clear`.",
			err.error
		),
		ErrorKind::Internal => err,
	})?;

	// Stops a watcher still running for this duel. Must not wait on
	// anything before this, a newer duel can start once settled.
	ctx.data().hub.cancel_generation(session.guild_id, session.generation);

	let embed = match &settlement {
		Settlement::Tie => CreateEmbed::default().title("Duel tied").description(format!(
			"{} and {} tied {}-{}. No credits change hands.",
			mention(session.player1_id),
			mention(session.player2_id),
			battle.team_crowns(),
			battle.opponent_crowns(),
		)),
		Settlement::Decided {
			winner_id,
			loser_id,
			bet,
			winner_score,
			loser_score,
		} => CreateEmbed::default()
			.title("Duel settled")
			.description(format!(
				"{} beat {} {}-{} and takes **{bet}** credits!",
				mention(*winner_id),
				mention(*loser_id),
				crowns_of(session, battle, *winner_id),
				crowns_of(session, battle, *loser_id),
			))
			.field(
				"Winner score",
				format!("{} → {}", winner_score.0, winner_score.1),
				true,
			)
			.field(
				"Loser score",
				format!("{} → {}", loser_score.0, loser_score.1),
				true,
			),
	};

	ctx.send(CreateReply::default().embed(embed)).await?;
	Ok(settlement)
}
// }}}
// {{{ Implementation
pub async fn accept_impl<C: MessageContext>(ctx: &mut C) -> Result<Option<Settlement>, TaggedError> {
	let guild_id = ctx.require_guild()?;
	let author = ctx.author_id();

	let (session, player1_tag, player2_tag) = {
		let conn = ctx.data().db.get()?;
		let session = DuelSession::get_or_expire(&conn, guild_id, Utc::now())?;

		match session.phase() {
			DuelPhase::Idle => {
				return Err(user_error!(
					"There is no duel to accept right now. Start one with `duel start <bet>`!"
				))
			}
			DuelPhase::Accepted => return Err(user_error!("This duel has already been accepted!")),
			DuelPhase::Pending => {}
		}

		if session.player1_id == author {
			return Err(user_error!("You can't accept your own duel!"));
		}

		if let Some(target) = session.private_target_id.filter(|_| session.is_private) {
			if target != author {
				return Err(user_error!(
					"This duel is reserved for {}.",
					mention(target)
				));
			}
		}

		let player2_tag = registered_tag(&conn, guild_id, author)?;

		let balance = bank::balance(&conn, guild_id, author)?;
		if balance < session.bet {
			return Err(user_error!(
				"You need at least {} credits to accept this duel, you only have {balance}.",
				session.bet
			));
		}

		let player1_tag = registered_tag(&conn, guild_id, session.player1_id)?;

		let session = DuelSession::accept(&conn, guild_id, session.generation, author, Utc::now())?
			.ok_or_else(|| user_error!("Someone else got to this duel first!"))?;

		(session, player1_tag, player2_tag)
	};

	let hub = ctx.data().hub.clone();
	hub.notify_accepted(guild_id, session.generation, author);
	let signals = hub.signals(guild_id, session.generation);

	tracing::info!(
		guild_id,
		generation = session.generation,
		player1 = session.player1_id,
		player2 = author,
		"Duel accepted"
	);

	let embed = CreateEmbed::default()
		.title("Duel accepted")
		.description(format!(
			"{} ({player1_tag}) vs {} ({player2_tag}) for **{}** credits!\n\
			Play a friendly battle against each other, I'll be watching for the next {}.",
			mention(session.player1_id),
			mention(author),
			session.bet,
			format_secs(session.battle_timeout_secs),
		));
	ctx.send(CreateReply::default().reply(true).embed(embed))
		.await?;

	let watched = watch_battles(ctx, &session, &player1_tag, &player2_tag, &signals).await;
	match watched {
		BattleWatch::Cancelled => Ok(None),
		BattleWatch::TimedOut => {
			hub.release(guild_id, session.generation);
			tracing::info!(
				guild_id,
				generation = session.generation,
				"No battle found before the timeout"
			);

			ctx.reply(&format!(
				"No results found: I couldn't find a battle between {player1_tag} and {player2_tag}. \
				Once you've played, either of you can use `duel claim`, or an admin can call it off with `duel clear`."
			))
			.await?;

			Ok(None)
		}
		BattleWatch::Found(battle) => {
			let res = settle_and_announce(ctx, &session, &battle).await;
			hub.release(guild_id, session.generation);
			res.map(Some)
		}
	}
}
// }}}
// {{{ Discord wrapper
/// Accept the running duel
#[poise::command(prefix_command, slash_command, guild_only)]
async fn accept(mut ctx: PoiseContext<'_>) -> Result<(), Error> {
	let res = accept_impl(&mut ctx).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Claim
// {{{ Implementation
pub async fn claim_impl<C: MessageContext>(ctx: &mut C) -> Result<Settlement, TaggedError> {
	let guild_id = ctx.require_guild()?;
	let author = ctx.author_id();

	let (session, player1_tag, player2_tag) = {
		let conn = ctx.data().db.get()?;
		let session = DuelSession::get(&conn, guild_id)?;

		if session.phase() != DuelPhase::Accepted {
			return Err(user_error!("There is no accepted duel waiting for a result."));
		}

		if !session.is_duellist(author) {
			return Err(user_error!(
				"Only {} and {} can claim this duel.",
				mention(session.player1_id),
				mention(session.player2_id)
			));
		}

		let player1_tag = registered_tag(&conn, guild_id, session.player1_id)?;
		let player2_tag = registered_tag(&conn, guild_id, session.player2_id)?;
		(session, player1_tag, player2_tag)
	};

	let battles = ctx.battle_log(&player1_tag).await?;
	let since = session.start_time.unwrap_or_else(Utc::now);
	let battle = find_resolving_battle(&battles, since, &player2_tag)
		.cloned()
		.ok_or_else(|| {
			user_error!(
				"I couldn't find a battle between {player1_tag} and {player2_tag} played after the duel was accepted. Play it first, then claim again!"
			)
		})?;

	settle_and_announce(ctx, &session, &battle).await
}
// }}}
// {{{ Discord wrapper
/// Look for the result of an accepted duel once more
#[poise::command(prefix_command, slash_command, guild_only)]
async fn claim(mut ctx: PoiseContext<'_>) -> Result<(), Error> {
	let res = claim_impl(&mut ctx).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Cancel
// {{{ Implementation
pub async fn cancel_impl<C: MessageContext>(ctx: &mut C) -> Result<DuelSession, TaggedError> {
	let guild_id = ctx.require_guild()?;
	let author = ctx.author_id();
	let is_admin = ctx.is_guild_admin().await?;

	let cancelled = {
		let conn = ctx.data().db.get()?;
		let session = DuelSession::get(&conn, guild_id)?;

		let cleared = match (session.phase(), is_admin) {
			(DuelPhase::Idle, _) => return Err(user_error!("There is no duel to cancel.")),
			(_, true) => DuelSession::clear_generation(&conn, guild_id, session.generation)?,
			(_, false) if session.player1_id != author => {
				return Err(user_error!(
					"Only the challenger or an admin can cancel this duel."
				))
			}
			(DuelPhase::Accepted, false) => {
				return Err(user_error!(
					"This duel has already been accepted, only an admin can cancel it now."
				))
			}
			(DuelPhase::Pending, false) => {
				DuelSession::clear_pending(&conn, guild_id, session.generation)?
			}
		};

		if !cleared {
			return Err(user_error!(
				"The duel changed while I was cancelling it, please try again."
			));
		}

		session
	};

	ctx.data().hub.cancel_generation(guild_id, cancelled.generation);
	tracing::info!(
		guild_id,
		generation = cancelled.generation,
		by = author,
		"Duel cancelled"
	);

	ctx.reply("The duel has been cancelled. No credits changed hands.")
		.await?;

	Ok(cancelled)
}
// }}}
// {{{ Discord wrapper
/// Cancel the running duel
#[poise::command(prefix_command, slash_command, guild_only)]
async fn cancel(mut ctx: PoiseContext<'_>) -> Result<(), Error> {
	let res = cancel_impl(&mut ctx).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Register
// {{{ Implementation
pub async fn register_impl<C: MessageContext>(
	ctx: &mut C,
	member_id: u64,
	raw_tag: &str,
) -> Result<PlayerTag, TaggedError> {
	let guild_id = ctx.require_guild()?;
	let tag: PlayerTag = raw_tag
		.parse()
		.map_err(|err: anyhow::Error| err.tag(ErrorKind::User))?;

	{
		let conn = ctx.data().db.get()?;
		DuelRecord::set_tag(&conn, guild_id, member_id, &tag)?;
	}

	ctx.reply(&format!("Registered {tag} for {}!", mention(member_id)))
		.await?;

	Ok(tag)
}
// }}}
// {{{ Discord wrapper
/// Link your Clash Royale player tag
#[poise::command(prefix_command, slash_command, guild_only)]
async fn register(
	mut ctx: PoiseContext<'_>,
	#[description = "Your player tag, eg. #2PY08LQ"] tag: String,
) -> Result<(), Error> {
	let author = ctx.author().id.get();
	let res = register_impl(&mut ctx, author, &tag).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Stats
// {{{ Implementation
pub async fn stats_impl<C: MessageContext>(
	ctx: &mut C,
	member_id: Option<u64>,
) -> Result<DuelRecord, TaggedError> {
	let guild_id = ctx.require_guild()?;
	let member_id = member_id.unwrap_or_else(|| ctx.author_id());

	let (record, balance) = {
		let conn = ctx.data().db.get()?;
		(
			DuelRecord::get(&conn, guild_id, member_id)?,
			bank::balance(&conn, guild_id, member_id)?,
		)
	};

	let tag = record
		.tag
		.as_ref()
		.map_or_else(|| "Not registered".to_owned(), PlayerTag::to_string);

	let embed = CreateEmbed::default()
		.title("Duel stats")
		.description(mention(member_id))
		.field("Tag", tag, true)
		.field("Score", record.score.to_string(), true)
		.field("Credits", balance.to_string(), true)
		.field("Season wins", record.wins.to_string(), true)
		.field("Lifetime wins", record.lifetime_wins.to_string(), true);

	ctx.send(CreateReply::default().reply(true).embed(embed))
		.await?;

	Ok(record)
}
// }}}
// {{{ Discord wrapper
/// Show the duel stats of a member
#[poise::command(prefix_command, slash_command, guild_only)]
async fn stats(
	mut ctx: PoiseContext<'_>,
	#[description = "Defaults to yourself"] member: Option<User>,
) -> Result<(), Error> {
	let res = stats_impl(&mut ctx, member.map(|m| m.id.get())).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Leaderboard
// {{{ Implementation
pub const LEADERBOARD_SIZE: usize = 10;

pub async fn ldb_impl<C: MessageContext>(
	ctx: &mut C,
	sort: LeaderboardSort,
) -> Result<Vec<DuelRecord>, TaggedError> {
	let guild_id = ctx.require_guild()?;
	let records = {
		let conn = ctx.data().db.get()?;
		leaderboard(&conn, guild_id, sort, LEADERBOARD_SIZE)?
	};

	if records.is_empty() {
		ctx.reply("Nobody has duelled in this server yet!").await?;
		return Ok(records);
	}

	let mut list = RankedList::new();
	for record in &records {
		let name = record
			.tag
			.as_ref()
			.map_or_else(|| format!("<{}>", record.member_id), PlayerTag::to_string);
		list.push(name, sort.key(record).to_string());
	}

	let embed = CreateEmbed::default()
		.title(format!("Duel leaderboard ({})", sort.label()))
		.description(format!("```\n{}```", list.into_string()));

	ctx.send(CreateReply::default().reply(true).embed(embed))
		.await?;

	Ok(records)
}
// }}}
// {{{ Discord wrapper
/// Show the best duellists of the server
#[poise::command(prefix_command, slash_command, guild_only)]
async fn ldb(
	mut ctx: PoiseContext<'_>,
	#[description = "s (score), w (season wins) or l (lifetime wins)"] sort: Option<String>,
) -> Result<(), Error> {
	let sort = sort
		.as_deref()
		.unwrap_or_default()
		.parse::<LeaderboardSort>()
		.map_err(|err| err.tag(ErrorKind::User));

	let res = match sort {
		Ok(sort) => ldb_impl(&mut ctx, sort).await,
		Err(err) => Err(err),
	};

	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
// }}}
// {{{ Battles
// {{{ Implementation
pub const BATTLE_LOG_SIZE: usize = 10;

pub async fn battles_impl<C: MessageContext>(
	ctx: &mut C,
	raw_tag: &str,
) -> Result<Vec<Battle>, TaggedError> {
	let tag: PlayerTag = raw_tag
		.parse()
		.map_err(|err: anyhow::Error| err.tag(ErrorKind::User))?;

	let mut battles = ctx.battle_log(&tag).await?;
	battles.truncate(BATTLE_LOG_SIZE);

	if battles.is_empty() {
		ctx.reply(&format!("{tag} hasn't played any battles recently."))
			.await?;
		return Ok(battles);
	}

	let mut list = RankedList::new();
	for battle in &battles {
		let opponent = battle
			.opponent
			.first()
			.map_or("?", |side| side.name.as_str());

		list.push(
			format!("{} vs {opponent}", battle.battle_time.format("%d %b %H:%M")),
			format!("{}-{}", battle.team_crowns(), battle.opponent_crowns()),
		);
	}

	let embed = CreateEmbed::default()
		.title(format!("Recent battles of {tag}"))
		.description(format!("```\n{}```", list.into_string()));

	ctx.send(CreateReply::default().reply(true).embed(embed))
		.await?;

	Ok(battles)
}
// }}}
// {{{ Discord wrapper
/// Show the recent battles of a player
#[poise::command(prefix_command, slash_command)]
async fn battles(
	mut ctx: PoiseContext<'_>,
	#[description = "Player tag, eg. #2PY08LQ"] tag: String,
) -> Result<(), Error> {
	let res = battles_impl(&mut ctx, &tag).await;
	ctx.handle_error(res).await?;
	Ok(())
}
// }}}
