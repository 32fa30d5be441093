// {{{ Imports
use crate::context::CliContext;
use crownduel::commands::discord::MessageContext;
use crownduel::commands::duel::battles_impl;
use crownduel::context::{Error, UserContext};
// }}}

#[derive(clap::Args)]
pub struct Args {
	/// Player tag, with or without the leading `#`
	tag: String,
}

pub async fn run(args: Args) -> Result<(), Error> {
	let mut ctx = CliContext::new(UserContext::new()?, None)?;
	let res = battles_impl(&mut ctx, &args.tag).await;
	ctx.handle_error(res).await?;
	Ok(())
}
