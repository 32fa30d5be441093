use rusqlite::{Connection, TransactionBehavior};

use crate::bank;
use crate::context::TaggedError;
use crate::duel::correlate::DuelOutcome;
use crate::duel::elo;
use crate::duel::record::DuelRecord;
use crate::duel::session::{DuelPhase, DuelSession};
use crate::user_error;

/// Everything that changed when a duel was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
	Tie,
	Decided {
		winner_id: u64,
		loser_id: u64,
		bet: u64,
		/// Ratings before and after the duel.
		winner_score: (u64, u64),
		loser_score: (u64, u64),
	},
}

/// Pays out a duel and clears it, all inside one transaction.
///
/// Fails without changing anything if the duel is no longer the one
/// described by `session`, or if the loser can't cover the bet.
pub fn settle(
	conn: &mut Connection,
	session: &DuelSession,
	outcome: DuelOutcome,
) -> Result<Settlement, TaggedError> {
	let guild_id = session.guild_id;
	// Takes the write lock up front, so nothing can sneak in between
	// the read below and the final clear.
	let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

	let current = DuelSession::get(&tx, guild_id)?;
	if current.generation != session.generation || current.phase() != DuelPhase::Accepted {
		return Err(user_error!("This duel has already been settled or cleared"));
	}

	let settlement = match outcome {
		DuelOutcome::Tie => Settlement::Tie,
		DuelOutcome::Decided {
			winner_id,
			loser_id,
		} => {
			bank::withdraw(&tx, guild_id, loser_id, current.bet)?;
			bank::deposit(&tx, guild_id, winner_id, current.bet)?;

			let winner_before = DuelRecord::get(&tx, guild_id, winner_id)?.score;
			let loser_before = DuelRecord::get(&tx, guild_id, loser_id)?.score;
			let (winner_after, loser_after) = elo::after_win(winner_before, loser_before);

			DuelRecord::apply_result(&tx, guild_id, winner_id, true, winner_after)?;
			DuelRecord::apply_result(&tx, guild_id, loser_id, false, loser_after)?;

			Settlement::Decided {
				winner_id,
				loser_id,
				bet: current.bet,
				winner_score: (winner_before, winner_after),
				loser_score: (loser_before, loser_after),
			}
		}
	};

	if !DuelSession::clear_generation(&tx, guild_id, session.generation)? {
		return Err(user_error!("This duel has already been settled or cleared"));
	}

	tx.commit()?;

	tracing::info!(
		guild_id,
		generation = session.generation,
		?settlement,
		"Settled duel"
	);

	Ok(settlement)
}

// {{{ Tests
#[cfg(test)]
mod tests {
	use chrono::Utc;

	use super::*;
	use crate::context::testing::{get_user_context, GUILD};
	use crate::context::Error;
	use crate::duel::session::Challenge;
	use crate::duel::settings::GuildSettings;

	fn accepted_duel(conn: &Connection, bet: u64) -> Result<DuelSession, Error> {
		let settings = GuildSettings::defaults(GUILD);
		let challenge = Challenge {
			challenger_id: 1,
			bet,
			target_id: None,
		};

		let session = DuelSession::open(conn, &settings, challenge, Utc::now())?.unwrap();
		Ok(DuelSession::accept(conn, GUILD, session.generation, 2, Utc::now())?.unwrap())
	}

	#[test]
	fn wins_move_credits_and_ratings() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let mut conn = data.db.get()?;
		bank::set_balance(&conn, GUILD, 1, 1000)?;
		bank::set_balance(&conn, GUILD, 2, 1000)?;
		DuelRecord::apply_result(&conn, GUILD, 1, false, 1200)?;
		DuelRecord::apply_result(&conn, GUILD, 2, false, 1200)?;

		let session = accepted_duel(&conn, 300)?;
		let outcome = DuelOutcome::Decided {
			winner_id: 2,
			loser_id: 1,
		};

		let settlement = settle(&mut conn, &session, outcome).map_err(|e| e.error)?;
		assert_eq!(
			settlement,
			Settlement::Decided {
				winner_id: 2,
				loser_id: 1,
				bet: 300,
				winner_score: (1200, 1216),
				loser_score: (1200, 1184),
			}
		);

		assert_eq!(bank::balance(&conn, GUILD, 1)?, 700);
		assert_eq!(bank::balance(&conn, GUILD, 2)?, 1300);

		let winner = DuelRecord::get(&conn, GUILD, 2)?;
		assert_eq!((winner.wins, winner.lifetime_wins), (1, 1));
		let loser = DuelRecord::get(&conn, GUILD, 1)?;
		assert_eq!((loser.wins, loser.lifetime_wins), (0, 0));

		assert_eq!(DuelSession::get(&conn, GUILD)?.phase(), DuelPhase::Idle);

		// Settling twice is refused
		let err = settle(&mut conn, &session, outcome).unwrap_err();
		assert!(err.is_user());
		assert_eq!(bank::balance(&conn, GUILD, 2)?, 1300);

		Ok(())
	}

	#[test]
	fn ties_only_clear_the_session() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let mut conn = data.db.get()?;
		bank::set_balance(&conn, GUILD, 1, 500)?;
		bank::set_balance(&conn, GUILD, 2, 500)?;

		let session = accepted_duel(&conn, 200)?;
		let settlement = settle(&mut conn, &session, DuelOutcome::Tie).map_err(|e| e.error)?;

		assert_eq!(settlement, Settlement::Tie);
		assert_eq!(bank::balance(&conn, GUILD, 1)?, 500);
		assert_eq!(bank::balance(&conn, GUILD, 2)?, 500);
		assert_eq!(DuelRecord::get(&conn, GUILD, 1)?, DuelRecord::empty(GUILD, 1));
		assert_eq!(DuelSession::get(&conn, GUILD)?.phase(), DuelPhase::Idle);

		Ok(())
	}

	#[test]
	fn replaced_duels_are_left_alone() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let mut conn = data.db.get()?;
		bank::set_balance(&conn, GUILD, 1, 500)?;
		bank::set_balance(&conn, GUILD, 2, 500)?;

		let old = accepted_duel(&conn, 200)?;
		DuelSession::clear(&mut conn, GUILD)?;
		let new = accepted_duel(&conn, 100)?;

		let outcome = DuelOutcome::Decided {
			winner_id: 2,
			loser_id: 1,
		};

		let err = settle(&mut conn, &old, outcome).unwrap_err();
		assert!(err.is_user());
		assert_eq!(DuelSession::get(&conn, GUILD)?, new);
		assert_eq!(bank::balance(&conn, GUILD, 1)?, 500);
		assert_eq!(bank::balance(&conn, GUILD, 2)?, 500);

		// The current duel still settles
		let settlement = settle(&mut conn, &new, outcome).map_err(|e| e.error)?;
		assert!(matches!(settlement, Settlement::Decided { bet: 100, .. }));
		assert_eq!(bank::balance(&conn, GUILD, 2)?, 600);

		Ok(())
	}

	#[test]
	fn broke_losers_roll_everything_back() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let mut conn = data.db.get()?;
		bank::set_balance(&conn, GUILD, 1, 50)?;
		bank::set_balance(&conn, GUILD, 2, 500)?;

		let session = accepted_duel(&conn, 200)?;
		let outcome = DuelOutcome::Decided {
			winner_id: 2,
			loser_id: 1,
		};

		let err = settle(&mut conn, &session, outcome).unwrap_err();
		assert!(err.is_user());

		assert_eq!(bank::balance(&conn, GUILD, 1)?, 50);
		assert_eq!(bank::balance(&conn, GUILD, 2)?, 500);
		assert_eq!(DuelRecord::get(&conn, GUILD, 2)?.wins, 0);
		assert_eq!(DuelSession::get(&conn, GUILD)?, session);

		Ok(())
	}
}
// }}}
