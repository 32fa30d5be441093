// {{{ Imports
use crate::context::CliContext;
use crownduel::commands::discord::MessageContext;
use crownduel::commands::duel::ldb_impl;
use crownduel::context::{Error, UserContext};
use crownduel::duel::record::LeaderboardSort;
// }}}

#[derive(clap::Args)]
pub struct Args {
	guild_id: u64,

	/// One of `s` (score), `w` (season wins) or `l` (lifetime wins)
	#[arg(default_value = "s")]
	sort: LeaderboardSort,
}

pub async fn run(args: Args) -> Result<(), Error> {
	let mut ctx = CliContext::new(UserContext::new()?, Some(args.guild_id))?;
	let res = ldb_impl(&mut ctx, args.sort).await;
	ctx.handle_error(res).await?;
	Ok(())
}
