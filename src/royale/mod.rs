//! Thin client for the parts of the official Clash Royale api we care about.

use anyhow::{anyhow, Context};
use reqwest::StatusCode;

use crate::context::paths::{get_var_or, get_var};
use crate::context::{ErrorKind, TagError, TaggedError};

pub mod battle;
pub mod tag;

pub use battle::{Battle, BattleSide};
pub use tag::PlayerTag;

pub const DEFAULT_API_URL: &str = "https://api.clashroyale.com/v1";

#[derive(Clone, Debug)]
pub struct RoyaleApi {
	http_client: reqwest::Client,
	base_url: String,
	token: Option<String>,
}

impl RoyaleApi {
	pub fn new(base_url: String, token: Option<String>) -> Self {
		Self {
			http_client: reqwest::Client::new(),
			base_url: base_url.trim_end_matches('/').to_owned(),
			token,
		}
	}

	/// Reads `$CROWNDUEL_ROYALE_URL` and `$CROWNDUEL_ROYALE_TOKEN`.
	///
	/// A missing token is not an error here, since only the commands
	/// which actually hit the api need it.
	pub fn from_env() -> anyhow::Result<Self> {
		let base_url = get_var_or("CROWNDUEL_ROYALE_URL", DEFAULT_API_URL);
		let token = get_var("CROWNDUEL_ROYALE_TOKEN").ok();
		if token.is_none() {
			tracing::warn!("$CROWNDUEL_ROYALE_TOKEN is not set, battle lookups will fail");
		}

		Ok(Self::new(base_url, token))
	}

	// {{{ Battle log
	/// Fetches the recent battles of a player, most recent first.
	pub async fn battle_log(&self, tag: &PlayerTag) -> Result<Vec<Battle>, TaggedError> {
		let token = self.token.as_deref().ok_or_else(|| {
			anyhow!("This instance of `crownduel` is not connected to the Clash Royale api.")
				.tag(ErrorKind::User)
		})?;

		let response = self
			.http_client
			.get(format!(
				"{}/players/%23{}/battlelog",
				self.base_url,
				tag.as_str()
			))
			.bearer_auth(token)
			.send()
			.await
			.context("Failed to send request")?;

		if response.status() == StatusCode::NOT_FOUND {
			return Err(anyhow!("No player with the tag `{tag}` exists").tag(ErrorKind::User));
		}

		let battles = response
			.error_for_status()
			.context("Request has non-ok status")?
			.json::<Vec<Battle>>()
			.await
			.context("Failed to decode response")?;

		tracing::debug!(%tag, count = battles.len(), "Fetched battle log");

		Ok(battles)
	}
	// }}}
}
