// {{{ Imports
use anyhow::Context;
use include_dir::{include_dir, Dir};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite_migration::Migrations;
use std::sync::LazyLock;

use crate::context::paths::CrownPaths;
// }}}

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

pub fn connect_db(paths: &CrownPaths) -> anyhow::Result<SqlitePool> {
	let db_path = paths.db_path();
	let mut conn = rusqlite::Connection::open(&db_path)
		.with_context(|| "Could not connect to sqlite database")?;
	conn.pragma_update(None, "journal_mode", "WAL")?;
	conn.pragma_update(None, "foreign_keys", "ON")?;

	// {{{ Run migrations
	static MIGRATIONS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");
	static MIGRATIONS: LazyLock<Migrations> = LazyLock::new(|| {
		Migrations::from_directory(&MIGRATIONS_DIR).expect("Could not load migrations")
	});

	MIGRATIONS
		.to_latest(&mut conn)
		.with_context(|| "Could not run migrations")?;
	tracing::info!(path = ?db_path, "Ensured db schema is up to date");
	// }}}

	// Concurrent commands share the file, so wait on locks rather than failing.
	let manager = SqliteConnectionManager::file(&db_path).with_init(|conn| {
		conn.busy_timeout(std::time::Duration::from_secs(5))?;
		conn.pragma_update(None, "foreign_keys", "ON")
	});

	Pool::new(manager).with_context(|| "Could not open sqlite database.")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn migrations_are_valid() {
		static MIGRATIONS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");
		let migrations = Migrations::from_directory(&MIGRATIONS_DIR).unwrap();
		migrations.validate().unwrap();
	}

	#[test]
	fn connecting_twice_is_idempotent() -> anyhow::Result<()> {
		let dir = tempfile::tempdir()?;
		let paths = CrownPaths::with_data_dir(dir.path())?;

		connect_db(&paths)?;
		let pool = connect_db(&paths)?;

		let count: i64 =
			pool.get()?
				.query_row("SELECT COUNT(*) FROM duel_sessions", (), |row| row.get(0))?;
		assert_eq!(count, 0);

		Ok(())
	}
}
