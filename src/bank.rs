//! A minimal per-guild credit ledger.
//!
//! Every function takes a plain connection so callers can compose
//! them inside their own transactions. Accounts are created lazily
//! and start out empty.

use rusqlite::{Connection, OptionalExtension};

use crate::context::{Error, TaggedError};
use crate::user_error;

pub fn balance(conn: &Connection, guild_id: u64, member_id: u64) -> Result<u64, Error> {
	let balance = conn
		.prepare_cached("SELECT balance FROM bank_accounts WHERE guild_id=? AND member_id=?")?
		.query_row((guild_id, member_id), |row| row.get(0))
		.optional()?;

	Ok(balance.unwrap_or(0))
}

/// Adds credits to an account, returning the new balance.
pub fn deposit(conn: &Connection, guild_id: u64, member_id: u64, amount: u64) -> Result<u64, Error> {
	let balance = conn
		.prepare_cached(
			"
        INSERT INTO bank_accounts(guild_id, member_id, balance)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(guild_id, member_id)
        DO UPDATE SET balance = balance + excluded.balance
        RETURNING balance
      ",
		)?
		.query_row((guild_id, member_id, amount), |row| row.get(0))?;

	Ok(balance)
}

/// Removes credits from an account, returning the new balance.
///
/// Fails with a user error when the account can't cover the amount.
pub fn withdraw(
	conn: &Connection,
	guild_id: u64,
	member_id: u64,
	amount: u64,
) -> Result<u64, TaggedError> {
	if amount == 0 {
		return Ok(balance(conn, guild_id, member_id)?);
	}

	let balance = conn
		.prepare_cached(
			"
        UPDATE bank_accounts
        SET balance = balance - ?3
        WHERE guild_id=?1 AND member_id=?2 AND balance >= ?3
        RETURNING balance
      ",
		)?
		.query_row((guild_id, member_id, amount), |row| row.get(0))
		.optional()?;

	balance.ok_or_else(|| user_error!("<@{member_id}> does not have {amount} credits"))
}

pub fn set_balance(
	conn: &Connection,
	guild_id: u64,
	member_id: u64,
	amount: u64,
) -> Result<(), Error> {
	conn.prepare_cached(
		"
        INSERT INTO bank_accounts(guild_id, member_id, balance)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(guild_id, member_id)
        DO UPDATE SET balance = excluded.balance
      ",
	)?
	.execute((guild_id, member_id, amount))?;

	Ok(())
}

/// Moves credits between two accounts inside a single transaction.
/// Nothing changes if the sender can't cover the amount.
pub fn transfer(
	conn: &mut Connection,
	guild_id: u64,
	from: u64,
	to: u64,
	amount: u64,
) -> Result<(), TaggedError> {
	let tx = conn.transaction()?;
	withdraw(&tx, guild_id, from, amount)?;
	deposit(&tx, guild_id, to, amount)?;
	tx.commit()?;

	Ok(())
}

// {{{ Tests
#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::testing::{get_user_context, GUILD};

	#[test]
	fn accounts_start_empty() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;

		assert_eq!(balance(&conn, GUILD, 1)?, 0);
		Ok(())
	}

	#[test]
	fn deposit_then_withdraw() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;

		assert_eq!(deposit(&conn, GUILD, 1, 500)?, 500);
		assert_eq!(deposit(&conn, GUILD, 1, 250)?, 750);
		assert_eq!(withdraw(&conn, GUILD, 1, 700).map_err(|e| e.error)?, 50);
		assert_eq!(balance(&conn, GUILD, 1)?, 50);

		// Balances are scoped per guild
		assert_eq!(balance(&conn, GUILD + 1, 1)?, 0);

		Ok(())
	}

	#[test]
	fn overdrafts_are_user_errors() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let conn = data.db.get()?;

		deposit(&conn, GUILD, 1, 10)?;
		let err = withdraw(&conn, GUILD, 1, 11).unwrap_err();
		assert!(err.is_user());
		assert_eq!(balance(&conn, GUILD, 1)?, 10);

		let err = withdraw(&conn, GUILD, 2, 1).unwrap_err();
		assert!(err.is_user());

		Ok(())
	}

	#[test]
	fn failed_transfers_roll_back() -> Result<(), Error> {
		let (data, _guard) = get_user_context()?;
		let mut conn = data.db.get()?;

		set_balance(&conn, GUILD, 1, 100)?;
		set_balance(&conn, GUILD, 2, 5)?;

		transfer(&mut conn, GUILD, 1, 2, 60).map_err(|e| e.error)?;
		assert_eq!(balance(&conn, GUILD, 1)?, 40);
		assert_eq!(balance(&conn, GUILD, 2)?, 65);

		assert!(transfer(&mut conn, GUILD, 1, 2, 41).is_err());
		assert_eq!(balance(&conn, GUILD, 1)?, 40);
		assert_eq!(balance(&conn, GUILD, 2)?, 65);

		Ok(())
	}
}
// }}}
