#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
	/// Print the recent battles of a player
	Battles(crate::commands::battles::Args),
	/// Print the duel leaderboard of a server
	Leaderboard(crate::commands::leaderboard::Args),
}
