use clap::Parser;
use command::{Cli, Command};
use crownduel::context::Error;
use crownduel::logs::init_tracing;

mod command;
mod commands;
mod context;

#[tokio::main]
async fn main() -> Result<(), Error> {
	init_tracing();

	let cli = Cli::parse();
	match cli.command {
		Command::Battles(args) => {
			commands::battles::run(args).await?;
		}
		Command::Leaderboard(args) => {
			commands::leaderboard::run(args).await?;
		}
	}

	Ok(())
}
