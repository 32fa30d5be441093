use std::str::FromStr;

use anyhow::bail;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::context::Error;
use crate::royale::PlayerTag;

// {{{ Record
/// Duel statistics of a single guild member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuelRecord {
	pub guild_id: u64,
	pub member_id: u64,
	pub tag: Option<PlayerTag>,
	/// Wins since the last season reset.
	pub wins: u64,
	pub lifetime_wins: u64,
	pub score: u64,
}

impl DuelRecord {
	pub fn empty(guild_id: u64, member_id: u64) -> Self {
		Self {
			guild_id,
			member_id,
			tag: None,
			wins: 0,
			lifetime_wins: 0,
			score: 0,
		}
	}

	fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
		Ok(Self {
			guild_id: row.get("guild_id")?,
			member_id: row.get("member_id")?,
			tag: row.get("tag")?,
			wins: row.get("wins")?,
			lifetime_wins: row.get("lifetime_wins")?,
			score: row.get("score")?,
		})
	}

	pub fn get(conn: &Connection, guild_id: u64, member_id: u64) -> Result<Self, Error> {
		let record = conn
			.prepare_cached("SELECT * FROM duel_records WHERE guild_id=? AND member_id=?")?
			.query_row((guild_id, member_id), Self::from_row)
			.optional()?;

		Ok(record.unwrap_or_else(|| Self::empty(guild_id, member_id)))
	}

	pub fn set_tag(conn: &Connection, guild_id: u64, member_id: u64, tag: &PlayerTag) -> Result<(), Error> {
		conn.prepare_cached(
			"
        INSERT INTO duel_records(guild_id, member_id, tag)
        VALUES (?,?,?)
        ON CONFLICT(guild_id, member_id) DO UPDATE SET tag=excluded.tag
      ",
		)?
		.execute((guild_id, member_id, tag))?;

		Ok(())
	}

	/// Stores the outcome of a settled duel for a single player.
	pub fn apply_result(
		conn: &Connection,
		guild_id: u64,
		member_id: u64,
		won: bool,
		new_score: u64,
	) -> Result<(), Error> {
		conn.prepare_cached(
			"
        INSERT INTO duel_records(guild_id, member_id, wins, lifetime_wins, score)
        VALUES (?1, ?2, ?3, ?3, ?4)
        ON CONFLICT(guild_id, member_id) DO UPDATE SET
          wins=wins + excluded.wins,
          lifetime_wins=lifetime_wins + excluded.lifetime_wins,
          score=excluded.score
      ",
		)?
		.execute((guild_id, member_id, u64::from(won), new_score))?;

		Ok(())
	}

	/// Starts a new season by zeroing everyone's season wins.
	/// Returns the number of records touched.
	pub fn reset_season(conn: &Connection, guild_id: u64) -> Result<usize, Error> {
		let changed = conn
			.prepare_cached("UPDATE duel_records SET wins=0 WHERE guild_id=? AND wins != 0")?
			.execute([guild_id])?;

		Ok(changed)
	}
}
// }}}
// {{{ Leaderboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderboardSort {
	#[default]
	#[serde(rename = "s")]
	Score,
	#[serde(rename = "w")]
	Wins,
	#[serde(rename = "l")]
	LifetimeWins,
}

impl LeaderboardSort {
	fn column(self) -> &'static str {
		match self {
			Self::Score => "score",
			Self::Wins => "wins",
			Self::LifetimeWins => "lifetime_wins",
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			Self::Score => "score",
			Self::Wins => "season wins",
			Self::LifetimeWins => "lifetime wins",
		}
	}

	#[inline]
	pub fn key(self, record: &DuelRecord) -> u64 {
		match self {
			Self::Score => record.score,
			Self::Wins => record.wins,
			Self::LifetimeWins => record.lifetime_wins,
		}
	}
}

impl FromStr for LeaderboardSort {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"" | "s" | "score" | "elo" => Ok(Self::Score),
			"w" | "wins" => Ok(Self::Wins),
			"l" | "lifetime" => Ok(Self::LifetimeWins),
			other => bail!("Unknown leaderboard `{other}`, expected one of `s`, `w` or `l`"),
		}
	}
}

/// Top members of a guild. Members who never played are left out.
pub fn leaderboard(
	conn: &Connection,
	guild_id: u64,
	sort: LeaderboardSort,
	limit: usize,
) -> Result<Vec<DuelRecord>, Error> {
	let column = sort.column();
	let records = conn
		.prepare_cached(&format!(
			"
        SELECT * FROM duel_records
        WHERE guild_id=? AND lifetime_wins + score > 0
        ORDER BY {column} DESC, lifetime_wins DESC, member_id ASC
        LIMIT ?
      "
		))?
		.query_map((guild_id, limit), DuelRecord::from_row)?
		.collect::<Result<Vec<_>, _>>()?;

	Ok(records)
}
// }}}
// {{{ Tests
#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::testing::{get_user_context, GUILD};

	#[test]
	fn tags_and_results_share_a_row() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;
		let tag: PlayerTag = "#2PY08LQ".parse()?;

		assert_eq!(DuelRecord::get(&conn, GUILD, 1)?, DuelRecord::empty(GUILD, 1));

		DuelRecord::set_tag(&conn, GUILD, 1, &tag)?;
		DuelRecord::apply_result(&conn, GUILD, 1, true, 16)?;
		DuelRecord::apply_result(&conn, GUILD, 1, false, 3)?;

		let record = DuelRecord::get(&conn, GUILD, 1)?;
		assert_eq!(record.tag, Some(tag));
		assert_eq!((record.wins, record.lifetime_wins, record.score), (1, 1, 3));

		Ok(())
	}

	#[test]
	fn season_reset_keeps_lifetime_stats() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;

		DuelRecord::apply_result(&conn, GUILD, 1, true, 16)?;
		DuelRecord::apply_result(&conn, GUILD, 1, true, 31)?;
		DuelRecord::apply_result(&conn, GUILD + 1, 1, true, 16)?;

		assert_eq!(DuelRecord::reset_season(&conn, GUILD)?, 1);

		let record = DuelRecord::get(&conn, GUILD, 1)?;
		assert_eq!((record.wins, record.lifetime_wins, record.score), (0, 2, 31));
		assert_eq!(DuelRecord::get(&conn, GUILD + 1, 1)?.wins, 1);

		Ok(())
	}

	#[test]
	fn leaderboards_sort_by_the_requested_column() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;

		// member 1: 1 lifetime win, high score
		DuelRecord::apply_result(&conn, GUILD, 1, true, 500)?;
		// member 2: 3 lifetime wins, 0 season wins, low score
		for _ in 0..3 {
			DuelRecord::apply_result(&conn, GUILD, 2, true, 50)?;
		}
		DuelRecord::reset_season(&conn, GUILD)?;
		// member 3: 2 season wins
		DuelRecord::apply_result(&conn, GUILD, 3, true, 100)?;
		DuelRecord::apply_result(&conn, GUILD, 3, true, 120)?;
		// member 4: registered but never played
		DuelRecord::set_tag(&conn, GUILD, 4, &"#9QJCUV".parse()?)?;

		let ids = |sort| -> Result<Vec<u64>, Error> {
			Ok(leaderboard(&conn, GUILD, sort, 10)?
				.into_iter()
				.map(|r| r.member_id)
				.collect())
		};

		assert_eq!(ids(LeaderboardSort::Score)?, vec![1, 3, 2]);
		assert_eq!(ids(LeaderboardSort::Wins)?, vec![3, 2, 1]);
		assert_eq!(ids(LeaderboardSort::LifetimeWins)?, vec![2, 3, 1]);
		assert_eq!(leaderboard(&conn, GUILD, LeaderboardSort::Score, 2)?.len(), 2);

		Ok(())
	}

	#[test]
	fn parses_sort_shorthands() {
		assert_eq!("".parse::<LeaderboardSort>().unwrap(), LeaderboardSort::Score);
		assert_eq!("W".parse::<LeaderboardSort>().unwrap(), LeaderboardSort::Wins);
		assert_eq!("l".parse::<LeaderboardSort>().unwrap(), LeaderboardSort::LifetimeWins);
		assert!("x".parse::<LeaderboardSort>().is_err());
	}
}
// }}}
