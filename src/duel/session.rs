//! The per-guild duel session, persisted as a single row per guild.
//!
//! Every state transition is a single compare-and-swap statement, so two
//! commands racing each other can never both win. The `generation` counter
//! bumps on every new challenge, which lets long-running watchers check
//! they're still looking at the duel they started with.

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::context::Error;
use crate::duel::settings::GuildSettings;

// {{{ Types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DuelPhase {
	/// No duel is running.
	Idle,
	/// Waiting for someone to accept.
	Pending,
	/// Both players are locked in, waiting on the battle result.
	Accepted,
}

/// The details needed to issue a new challenge.
#[derive(Debug, Clone, Copy)]
pub struct Challenge {
	pub challenger_id: u64,
	pub bet: u64,
	pub target_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuelSession {
	pub guild_id: u64,
	pub active: bool,
	pub generation: u64,
	pub player1_id: u64,
	pub player2_id: u64,
	pub bet: u64,
	/// Issue time while pending, acceptance time afterwards.
	/// Only battles strictly after this instant may resolve the duel.
	pub start_time: Option<DateTime<Utc>>,
	pub accept_timeout_secs: u64,
	pub battle_timeout_secs: u64,
	pub is_private: bool,
	pub private_target_id: Option<u64>,
}
// }}}

impl DuelSession {
	/// The state of a guild which has never hosted a duel.
	pub fn cleared(guild_id: u64) -> Self {
		Self {
			guild_id,
			active: false,
			generation: 0,
			player1_id: 0,
			player2_id: 0,
			bet: 0,
			start_time: None,
			accept_timeout_secs: 0,
			battle_timeout_secs: 0,
			is_private: false,
			private_target_id: None,
		}
	}

	fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
		Ok(Self {
			guild_id: row.get("guild_id")?,
			active: row.get("active")?,
			generation: row.get("generation")?,
			player1_id: row.get("player1_id")?,
			player2_id: row.get("player2_id")?,
			bet: row.get("bet")?,
			start_time: row.get("start_time")?,
			accept_timeout_secs: row.get("accept_timeout_secs")?,
			battle_timeout_secs: row.get("battle_timeout_secs")?,
			is_private: row.get("is_private")?,
			private_target_id: row.get("private_target_id")?,
		})
	}

	// {{{ Queries
	#[inline]
	pub fn phase(&self) -> DuelPhase {
		match (self.active, self.player2_id) {
			(false, _) => DuelPhase::Idle,
			(true, 0) => DuelPhase::Pending,
			(true, _) => DuelPhase::Accepted,
		}
	}

	#[inline]
	pub fn is_duellist(&self, member_id: u64) -> bool {
		member_id != 0 && (member_id == self.player1_id || member_id == self.player2_id)
	}

	pub fn get(conn: &Connection, guild_id: u64) -> Result<Self, Error> {
		let session = conn
			.prepare_cached("SELECT * FROM duel_sessions WHERE guild_id=?")?
			.query_row([guild_id], Self::from_row)
			.optional()?;

		Ok(session.unwrap_or_else(|| Self::cleared(guild_id)))
	}

	/// The instant a pending duel stops waiting for an opponent.
	pub fn accept_deadline(&self) -> Option<DateTime<Utc>> {
		let secs = i64::try_from(self.accept_timeout_secs).ok()?;
		self.start_time?
			.checked_add_signed(TimeDelta::try_seconds(secs)?)
	}

	/// Like [Self::get], except a pending duel whose acceptance window has
	/// already passed is cleared first. Nothing else expires such duels
	/// once the command watching them is gone, eg. after a restart.
	pub fn get_or_expire(
		conn: &Connection,
		guild_id: u64,
		now: DateTime<Utc>,
	) -> Result<Self, Error> {
		let session = Self::get(conn, guild_id)?;
		let overdue = session.phase() == DuelPhase::Pending
			&& session.accept_deadline().is_some_and(|deadline| deadline <= now);

		if overdue && Self::clear_pending(conn, guild_id, session.generation)? {
			tracing::info!(
				guild_id,
				generation = session.generation,
				"Expired an unwatched duel"
			);
			return Self::get(conn, guild_id);
		}

		Ok(session)
	}
	// }}}
	// {{{ Transitions
	/// Issues a new challenge, unless a duel is already active in the guild.
	///
	/// Returns [None] when another duel is active. The check and the write
	/// happen in a single statement.
	pub fn open(
		conn: &Connection,
		settings: &GuildSettings,
		challenge: Challenge,
		now: DateTime<Utc>,
	) -> Result<Option<Self>, Error> {
		conn.prepare_cached("INSERT OR IGNORE INTO duel_sessions(guild_id) VALUES (?)")?
			.execute([settings.guild_id])?;

		let session = conn
			.prepare_cached(
				"
        UPDATE duel_sessions SET
          active=1,
          generation=generation + 1,
          player1_id=?,
          player2_id=0,
          bet=?,
          start_time=?,
          accept_timeout_secs=?,
          battle_timeout_secs=?,
          is_private=?,
          private_target_id=?
        WHERE guild_id=? AND active=0
        RETURNING *
      ",
			)?
			.query_row(
				(
					challenge.challenger_id,
					challenge.bet,
					now,
					settings.accept_timeout_secs,
					settings.battle_timeout_secs,
					challenge.target_id.is_some(),
					challenge.target_id,
					settings.guild_id,
				),
				Self::from_row,
			)
			.optional()?;

		Ok(session)
	}

	/// Locks in the second player of a pending duel, moving the
	/// battle watermark to `now`.
	///
	/// Returns [None] if the duel was accepted, cleared or replaced in the meantime.
	pub fn accept(
		conn: &Connection,
		guild_id: u64,
		generation: u64,
		player2_id: u64,
		now: DateTime<Utc>,
	) -> Result<Option<Self>, Error> {
		let session = conn
			.prepare_cached(
				"
        UPDATE duel_sessions SET
          player2_id=?,
          start_time=?
        WHERE guild_id=? AND generation=? AND active=1 AND player2_id=0
        RETURNING *
      ",
			)?
			.query_row((player2_id, now, guild_id, generation), Self::from_row)
			.optional()?;

		Ok(session)
	}

	/// Clears a duel that nobody has accepted yet.
	/// Returns whether anything was cleared.
	pub fn clear_pending(conn: &Connection, guild_id: u64, generation: u64) -> Result<bool, Error> {
		let changed = conn
			.prepare_cached(&format!(
				"{CLEAR_STATEMENT} WHERE guild_id=? AND generation=? AND active=1 AND player2_id=0"
			))?
			.execute((guild_id, generation))?;

		Ok(changed > 0)
	}

	/// Clears a specific duel, whatever phase it's in.
	/// Returns whether anything was cleared.
	pub fn clear_generation(
		conn: &Connection,
		guild_id: u64,
		generation: u64,
	) -> Result<bool, Error> {
		let changed = conn
			.prepare_cached(&format!(
				"{CLEAR_STATEMENT} WHERE guild_id=? AND generation=? AND active=1"
			))?
			.execute((guild_id, generation))?;

		Ok(changed > 0)
	}

	/// Unconditionally resets the guild's session, returning what was there before.
	pub fn clear(conn: &mut Connection, guild_id: u64) -> Result<Self, Error> {
		let tx = conn.transaction()?;
		let previous = Self::get(&tx, guild_id)?;
		tx.prepare_cached(&format!("{CLEAR_STATEMENT} WHERE guild_id=?"))?
			.execute([guild_id])?;
		tx.commit()?;

		Ok(previous)
	}
	// }}}
}

/// Resets every field except the generation counter, which must keep
/// growing so stale watchers can't touch newer duels.
const CLEAR_STATEMENT: &str = "
  UPDATE duel_sessions SET
    active=0,
    player1_id=0,
    player2_id=0,
    bet=0,
    start_time=NULL,
    accept_timeout_secs=0,
    battle_timeout_secs=0,
    is_private=0,
    private_target_id=NULL
";

// {{{ Tests
#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::testing::{get_user_context, GUILD};

	fn challenge(challenger_id: u64, target_id: Option<u64>) -> Challenge {
		Challenge {
			challenger_id,
			bet: 100,
			target_id,
		}
	}

	#[test]
	fn only_one_duel_per_guild() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;
		let settings = GuildSettings::defaults(GUILD);
		let now = Utc::now();

		let first = DuelSession::open(&conn, &settings, challenge(1, None), now)?.unwrap();
		assert_eq!(first.phase(), DuelPhase::Pending);
		assert_eq!(first.generation, 1);
		assert_eq!(first.start_time, Some(now));
		assert_eq!(first.accept_timeout_secs, settings.accept_timeout_secs);

		assert!(DuelSession::open(&conn, &settings, challenge(2, None), now)?.is_none());
		assert_eq!(DuelSession::get(&conn, GUILD)?, first);

		// Other guilds are unaffected
		let other = GuildSettings::defaults(GUILD + 1);
		assert!(DuelSession::open(&conn, &other, challenge(2, None), now)?.is_some());

		Ok(())
	}

	#[test]
	fn overdue_pending_duels_expire_on_read() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;
		let settings = GuildSettings::defaults(GUILD);
		let issued = Utc::now() - TimeDelta::hours(1);

		let session = DuelSession::open(&conn, &settings, challenge(1, None), issued)?.unwrap();
		let deadline = issued + TimeDelta::seconds(settings.accept_timeout_secs as i64);
		assert_eq!(session.accept_deadline(), Some(deadline));

		// Still within the window
		let early = DuelSession::get_or_expire(&conn, GUILD, deadline - TimeDelta::seconds(1))?;
		assert_eq!(early, session);

		let expired = DuelSession::get_or_expire(&conn, GUILD, Utc::now())?;
		assert_eq!(expired.phase(), DuelPhase::Idle);
		assert_eq!(expired.generation, session.generation);

		// Accepted duels never expire this way
		let session = DuelSession::open(&conn, &settings, challenge(1, None), issued)?.unwrap();
		DuelSession::accept(&conn, GUILD, session.generation, 2, issued)?.unwrap();
		let kept = DuelSession::get_or_expire(&conn, GUILD, Utc::now())?;
		assert_eq!(kept.phase(), DuelPhase::Accepted);

		Ok(())
	}

	#[test]
	fn accepting_moves_the_watermark() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;
		let settings = GuildSettings::defaults(GUILD);
		let issued = Utc::now();
		let accepted = issued + TimeDelta::seconds(30);

		let session = DuelSession::open(&conn, &settings, challenge(1, Some(2)), issued)?.unwrap();
		assert!(session.is_private);

		let session = DuelSession::accept(&conn, GUILD, session.generation, 2, accepted)?.unwrap();
		assert_eq!(session.phase(), DuelPhase::Accepted);
		assert_eq!(session.start_time, Some(accepted));
		assert!(session.is_duellist(1) && session.is_duellist(2));
		assert!(!session.is_duellist(3));

		// Can't be accepted twice
		assert!(DuelSession::accept(&conn, GUILD, session.generation, 3, accepted)?.is_none());

		// Pending-only clears don't touch accepted duels
		assert!(!DuelSession::clear_pending(&conn, GUILD, session.generation)?);

		Ok(())
	}

	#[test]
	fn stale_generations_are_ignored() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let mut conn = data.db.get()?;
		let settings = GuildSettings::defaults(GUILD);

		let old = DuelSession::open(&conn, &settings, challenge(1, None), Utc::now())?.unwrap();
		assert!(DuelSession::clear_pending(&conn, GUILD, old.generation)?);

		let new = DuelSession::open(&conn, &settings, challenge(3, None), Utc::now())?.unwrap();
		assert_eq!(new.generation, old.generation + 1);

		assert!(!DuelSession::clear_pending(&conn, GUILD, old.generation)?);
		assert!(DuelSession::accept(&conn, GUILD, old.generation, 4, Utc::now())?.is_none());
		assert!(!DuelSession::clear_generation(&conn, GUILD, old.generation)?);

		let previous = DuelSession::clear(&mut conn, GUILD)?;
		assert_eq!(previous, new);

		Ok(())
	}

	#[test]
	fn forced_clear_resets_every_phase() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let mut conn = data.db.get()?;
		let settings = GuildSettings::defaults(GUILD);

		// Idle
		DuelSession::clear(&mut conn, GUILD)?;
		assert_eq!(DuelSession::get(&conn, GUILD)?.phase(), DuelPhase::Idle);

		// Pending
		let session = DuelSession::open(&conn, &settings, challenge(1, Some(2)), Utc::now())?.unwrap();
		DuelSession::clear(&mut conn, GUILD)?;
		let cleared = DuelSession::get(&conn, GUILD)?;
		assert_eq!(
			cleared,
			DuelSession {
				generation: session.generation,
				..DuelSession::cleared(GUILD)
			}
		);

		// Accepted
		let session = DuelSession::open(&conn, &settings, challenge(1, None), Utc::now())?.unwrap();
		DuelSession::accept(&conn, GUILD, session.generation, 2, Utc::now())?.unwrap();
		DuelSession::clear(&mut conn, GUILD)?;
		let cleared = DuelSession::get(&conn, GUILD)?;
		assert_eq!(
			cleared,
			DuelSession {
				generation: session.generation,
				..DuelSession::cleared(GUILD)
			}
		);

		Ok(())
	}
}
// }}}
