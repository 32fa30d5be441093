// {{{ Imports
use db::{connect_db, SqlitePool};
use std::time::Duration;

use crate::context::paths::{parse_var_or, CrownPaths};
use crate::duel::hub::DuelHub;
use crate::royale::RoyaleApi;
use crate::timed;
// }}}

pub mod db;
pub mod paths;

// {{{ Common types
pub type Error = anyhow::Error;
pub type PoiseContext<'a> = poise::Context<'a, UserContext, Error>;
// }}}
// {{{ Error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	User,
	Internal,
}

#[derive(Debug)]
pub struct TaggedError {
	pub kind: ErrorKind,
	pub error: Error,
}

impl TaggedError {
	#[inline]
	pub fn new(kind: ErrorKind, error: Error) -> Self {
		Self { kind, error }
	}

	#[inline]
	pub fn is_user(&self) -> bool {
		self.kind == ErrorKind::User
	}
}

impl<E: Into<Error>> From<E> for TaggedError {
	fn from(value: E) -> Self {
		Self::new(ErrorKind::Internal, value.into())
	}
}

pub trait TagError {
	fn tag(self, tag: ErrorKind) -> TaggedError;
}

impl TagError for Error {
	fn tag(self, tag: ErrorKind) -> TaggedError {
		TaggedError::new(tag, self)
	}
}

/// Shorthand for a user-facing error built from a format string.
#[macro_export]
macro_rules! user_error {
	($($arg:tt)*) => {
		$crate::context::TagError::tag(
			anyhow::anyhow!($($arg)*),
			$crate::context::ErrorKind::User,
		)
	};
}
// }}}
// {{{ UserContext
/// Custom user data passed to all command functions
#[derive(Clone)]
pub struct UserContext {
	pub db: SqlitePool,
	pub royale: RoyaleApi,
	pub hub: DuelHub,

	/// How long the battle correlator waits between battle log fetches.
	pub poll_interval: Duration,
}

impl UserContext {
	#[inline]
	pub fn new() -> Result<Self, Error> {
		timed!("create_context", {
			let paths = CrownPaths::new()?;
			let db = connect_db(&paths)?;
			let royale = RoyaleApi::from_env()?;
			let poll_interval =
				Duration::from_secs(parse_var_or("CROWNDUEL_POLL_INTERVAL_SECS", 5)?.max(1));

			Ok(Self {
				db,
				royale,
				hub: DuelHub::default(),
				poll_interval,
			})
		})
	}
}
// }}}
