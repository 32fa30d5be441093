use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::context::Error;

pub const DEFAULT_MIN_BET: u64 = 100;
pub const DEFAULT_ACCEPT_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_BATTLE_TIMEOUT_SECS: u64 = 600;

/// Per-guild duel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuildSettings {
	pub guild_id: u64,
	pub min_bet: u64,
	pub accept_timeout_secs: u64,
	pub battle_timeout_secs: u64,
	/// Role mentioned when a public duel is announced.
	pub ping_role_id: Option<u64>,
}

impl GuildSettings {
	pub fn defaults(guild_id: u64) -> Self {
		Self {
			guild_id,
			min_bet: DEFAULT_MIN_BET,
			accept_timeout_secs: DEFAULT_ACCEPT_TIMEOUT_SECS,
			battle_timeout_secs: DEFAULT_BATTLE_TIMEOUT_SECS,
			ping_role_id: None,
		}
	}

	fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
		Ok(Self {
			guild_id: row.get("guild_id")?,
			min_bet: row.get("min_bet")?,
			accept_timeout_secs: row.get("accept_timeout_secs")?,
			battle_timeout_secs: row.get("battle_timeout_secs")?,
			ping_role_id: row.get("ping_role_id")?,
		})
	}

	pub fn get(conn: &Connection, guild_id: u64) -> Result<Self, Error> {
		let settings = conn
			.prepare_cached("SELECT * FROM guild_settings WHERE guild_id=?")?
			.query_row([guild_id], Self::from_row)
			.optional()?;

		Ok(settings.unwrap_or_else(|| Self::defaults(guild_id)))
	}

	pub fn save(&self, conn: &Connection) -> Result<(), Error> {
		conn.prepare_cached(
			"
        INSERT INTO guild_settings(
          guild_id, min_bet, accept_timeout_secs,
          battle_timeout_secs, ping_role_id
        )
        VALUES (?,?,?,?,?)
        ON CONFLICT(guild_id) DO UPDATE SET
          min_bet=excluded.min_bet,
          accept_timeout_secs=excluded.accept_timeout_secs,
          battle_timeout_secs=excluded.battle_timeout_secs,
          ping_role_id=excluded.ping_role_id
      ",
		)?
		.execute((
			self.guild_id,
			self.min_bet,
			self.accept_timeout_secs,
			self.battle_timeout_secs,
			self.ping_role_id,
		))?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::testing::{get_user_context, GUILD};

	#[test]
	fn missing_rows_fall_back_to_defaults() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;

		assert_eq!(GuildSettings::get(&conn, GUILD)?, GuildSettings::defaults(GUILD));
		Ok(())
	}

	#[test]
	fn saving_overwrites() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;

		let mut settings = GuildSettings::get(&conn, GUILD)?;
		settings.min_bet = 5;
		settings.ping_role_id = Some(77);
		settings.save(&conn)?;

		settings.accept_timeout_secs = 30;
		settings.save(&conn)?;

		let loaded = GuildSettings::get(&conn, GUILD)?;
		assert_eq!(loaded.min_bet, 5);
		assert_eq!(loaded.accept_timeout_secs, 30);
		assert_eq!(loaded.ping_role_id, Some(77));
		assert_eq!(GuildSettings::get(&conn, GUILD + 1)?.min_bet, DEFAULT_MIN_BET);

		Ok(())
	}
}
