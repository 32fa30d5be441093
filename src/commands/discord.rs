use poise::serenity_prelude::CreateEmbed;
use poise::CreateReply;
use serde::Serialize;

use crate::context::{Error, ErrorKind, TaggedError, UserContext};
use crate::royale::{Battle, PlayerTag};
use crate::user_error;

// {{{ Trait
pub trait MessageContext {
	/// Get the user context held by the message
	fn data(&self) -> &UserContext;
	fn author_id(&self) -> u64;
	fn guild_id(&self) -> Option<u64>;

	/// Whether the author can manage the current guild.
	async fn is_guild_admin(&self) -> Result<bool, Error>;

	/// Reply to the current message
	async fn reply(&mut self, text: &str) -> Result<(), Error>;

	/// Deliver a message containing embeds.
	async fn send(&mut self, message: CreateReply) -> Result<(), Error>;

	/// Fetch the recent battles of a player, most recent first.
	async fn battle_log(&self, tag: &PlayerTag) -> Result<Vec<Battle>, TaggedError>;

	/// The guild this message was sent in, or a user error outside guilds.
	fn require_guild(&self) -> Result<u64, TaggedError> {
		self.guild_id()
			.ok_or_else(|| user_error!("Duels only work inside of servers!"))
	}

	/// Reports user errors back to the author, and propagates internal ones.
	async fn handle_error<V>(&mut self, res: Result<V, TaggedError>) -> Result<Option<V>, Error> {
		match res {
			Ok(v) => Ok(Some(v)),
			Err(err) => match err.kind {
				ErrorKind::User => {
					self.reply(&format!("{}", err.error)).await?;
					Ok(None)
				}
				ErrorKind::Internal => Err(err.error),
			},
		}
	}
}
// }}}
// {{{ Poise implementation
impl<'a> MessageContext for poise::Context<'a, UserContext, Error> {
	fn data(&self) -> &UserContext {
		Self::data(*self)
	}

	fn author_id(&self) -> u64 {
		self.author().id.get()
	}

	fn guild_id(&self) -> Option<u64> {
		Self::guild_id(*self).map(|id| id.get())
	}

	async fn is_guild_admin(&self) -> Result<bool, Error> {
		let Some(member) = self.author_member().await else {
			return Ok(false);
		};

		let permissions = self.guild().map(|guild| guild.member_permissions(&member));
		Ok(permissions.is_some_and(|p| p.administrator() || p.manage_guild()))
	}

	async fn reply(&mut self, text: &str) -> Result<(), Error> {
		Self::reply(*self, text).await?;
		Ok(())
	}

	async fn send(&mut self, message: CreateReply) -> Result<(), Error> {
		Self::send(*self, message).await?;
		Ok(())
	}

	async fn battle_log(&self, tag: &PlayerTag) -> Result<Vec<Battle>, TaggedError> {
		Self::data(*self).royale.battle_log(tag).await
	}
}
// }}}
// {{{ Reply essence
/// The parts of a [CreateReply] we care about when inspecting
/// replies outside of discord.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyEssence {
	pub reply: bool,
	pub ephemeral: Option<bool>,
	pub content: Option<String>,
	pub embeds: Vec<CreateEmbed>,
}

impl ReplyEssence {
	pub fn from_reply(message: CreateReply) -> Self {
		Self {
			reply: message.reply,
			ephemeral: message.ephemeral,
			content: message.content,
			embeds: message.embeds,
		}
	}

	pub fn from_text(text: &str) -> Self {
		Self {
			reply: true,
			ephemeral: None,
			content: Some(text.to_owned()),
			embeds: Vec::new(),
		}
	}

	/// Content and embeds flattened into a single searchable string.
	pub fn text(&self) -> String {
		let mut text = self.content.clone().unwrap_or_default();
		for embed in &self.embeds {
			if let Ok(json) = serde_json::to_string(embed) {
				text.push('\n');
				text.push_str(&json);
			}
		}

		text
	}
}
// }}}
// {{{ Testing context
pub mod mock {
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;
	use std::time::Duration;

	use anyhow::anyhow;
	use parking_lot::Mutex;

	use super::*;

	pub struct MockContext {
		pub user_id: u64,
		pub guild_id: Option<u64>,
		pub is_admin: bool,
		pub data: UserContext,
		pub messages: Vec<ReplyEssence>,

		/// Battle logs keyed by tag, shared between every context
		/// created through [MockContext::as_user].
		pub battles: Arc<Mutex<HashMap<PlayerTag, Vec<Battle>>>>,

		/// Number of upcoming battle log fetches which should fail.
		pub failing_fetches: Arc<AtomicUsize>,

		/// Makes every message sent by this context take a while to arrive.
		pub send_delay: Option<Duration>,
	}

	impl MockContext {
		pub fn new(data: UserContext) -> Self {
			Self {
				data,
				user_id: 666,
				guild_id: Some(1000),
				is_admin: false,
				messages: vec![],
				battles: Default::default(),
				failing_fetches: Default::default(),
				send_delay: None,
			}
		}

		/// A context for another member of the same guild, sharing all state.
		pub fn as_user(&self, user_id: u64) -> Self {
			Self {
				user_id,
				guild_id: self.guild_id,
				is_admin: false,
				data: self.data.clone(),
				messages: vec![],
				battles: self.battles.clone(),
				failing_fetches: self.failing_fetches.clone(),
				send_delay: None,
			}
		}

		pub fn set_battles(&self, tag: &PlayerTag, battles: Vec<Battle>) {
			self.battles.lock().insert(tag.clone(), battles);
		}

		pub fn fail_next_fetches(&self, count: usize) {
			self.failing_fetches.store(count, Ordering::SeqCst);
		}

		pub fn last_text(&self) -> String {
			self.messages
				.last()
				.map(ReplyEssence::text)
				.unwrap_or_default()
		}
	}

	impl MessageContext for MockContext {
		fn data(&self) -> &UserContext {
			&self.data
		}

		fn author_id(&self) -> u64 {
			self.user_id
		}

		fn guild_id(&self) -> Option<u64> {
			self.guild_id
		}

		async fn is_guild_admin(&self) -> Result<bool, Error> {
			Ok(self.is_admin)
		}

		async fn reply(&mut self, text: &str) -> Result<(), Error> {
			if let Some(delay) = self.send_delay {
				tokio::time::sleep(delay).await;
			}

			self.messages.push(ReplyEssence::from_text(text));
			Ok(())
		}

		async fn send(&mut self, message: CreateReply) -> Result<(), Error> {
			if let Some(delay) = self.send_delay {
				tokio::time::sleep(delay).await;
			}

			self.messages.push(ReplyEssence::from_reply(message));
			Ok(())
		}

		async fn battle_log(&self, tag: &PlayerTag) -> Result<Vec<Battle>, TaggedError> {
			let should_fail = self
				.failing_fetches
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
				.is_ok();

			if should_fail {
				return Err(anyhow!("Simulated api outage").into());
			}

			Ok(self.battles.lock().get(tag).cloned().unwrap_or_default())
		}
	}
}
// }}}
