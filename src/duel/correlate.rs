//! Matching duels against real battles from the api.

use chrono::{DateTime, Utc};

use crate::duel::session::DuelSession;
use crate::royale::{Battle, PlayerTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelOutcome {
	Decided { winner_id: u64, loser_id: u64 },
	Tie,
}

/// Finds the battle settling a duel in a battle log of player one.
///
/// A battle qualifies when it happened strictly after `since` and
/// player two was on the opposing side. The first qualifying battle
/// in log order wins.
pub fn find_resolving_battle<'a>(
	battles: &'a [Battle],
	since: DateTime<Utc>,
	opponent: &PlayerTag,
) -> Option<&'a Battle> {
	battles.iter().find(|battle| {
		battle.battle_time > since && battle.opponent.iter().any(|side| opponent.matches(&side.tag))
	})
}

/// Decides a duel from a battle in player one's log by comparing crowns.
pub fn classify(battle: &Battle, session: &DuelSession) -> DuelOutcome {
	let (player1, player2) = (session.player1_id, session.player2_id);
	match battle.team_crowns().cmp(&battle.opponent_crowns()) {
		std::cmp::Ordering::Greater => DuelOutcome::Decided {
			winner_id: player1,
			loser_id: player2,
		},
		std::cmp::Ordering::Less => DuelOutcome::Decided {
			winner_id: player2,
			loser_id: player1,
		},
		std::cmp::Ordering::Equal => DuelOutcome::Tie,
	}
}

// }}}
