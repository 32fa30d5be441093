// {{{ Imports
use crownduel::commands::discord::{MessageContext, ReplyEssence};
use crownduel::context::paths::parse_var_or;
use crownduel::context::{Error, TaggedError, UserContext};
use crownduel::royale::{Battle, PlayerTag};
use poise::CreateReply;
// }}}

/// Similar in scope to [crownduel::commands::discord::mock::MockContext],
/// except replies and messages are printed to the standard output.
///
/// Messages are printed as pretty JSON. The operator running the cli
/// counts as an admin of every guild.
pub struct CliContext {
	pub user_id: u64,
	pub guild_id: Option<u64>,
	pub data: UserContext,
}

impl CliContext {
	/// Reads `$CROWNDUEL_DISCORD_USER_ID` and `$CROWNDUEL_GUILD_ID`,
	/// unless a guild is given explicitly.
	pub fn new(data: UserContext, guild_id: Option<u64>) -> Result<Self, Error> {
		let guild_id = match guild_id {
			Some(id) => id,
			None => parse_var_or::<u64>("CROWNDUEL_GUILD_ID", 0)?,
		};

		let guild_id = Some(guild_id).filter(|id| *id != 0);

		Ok(Self {
			data,
			guild_id,
			user_id: parse_var_or("CROWNDUEL_DISCORD_USER_ID", 0)?,
		})
	}
}

impl MessageContext for CliContext {
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
		Ok(true)
	}

	async fn reply(&mut self, text: &str) -> Result<(), Error> {
		println!("[Reply] {text}");
		Ok(())
	}

	async fn send(&mut self, message: CreateReply) -> Result<(), Error> {
		let all = serde_json::to_string_pretty(&ReplyEssence::from_reply(message))?;
		println!("\n========== Message ==========");
		println!("{all}");
		Ok(())
	}

	async fn battle_log(&self, tag: &PlayerTag) -> Result<Vec<Battle>, TaggedError> {
		self.data.royale.battle_log(tag).await
	}
}
