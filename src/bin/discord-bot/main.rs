use std::{sync::Arc, time::Duration};

use crownduel::context::paths::get_var;
use crownduel::context::{Error, UserContext};
use crownduel::logs::init_tracing;
use crownduel::{commands, log_error};
use poise::serenity_prelude::{self as serenity};

// {{{ Error handler
async fn on_error(error: poise::FrameworkError<'_, UserContext, Error>) {
	match error {
		poise::FrameworkError::Command { error, ctx, .. } => {
			tracing::error!(
				command = %ctx.command().qualified_name,
				error.message = %error,
				"{:?}",
				error
			);
			log_error!(ctx.say("Something went wrong on my end, sorry!").await);
		}
		error => log_error!(poise::builtins::on_error(error).await),
	}
}
// }}}

#[tokio::main]
async fn main() -> Result<(), Error> {
	init_tracing();

	// {{{ Poise options
	let options = poise::FrameworkOptions {
		commands: vec![
			commands::help(),
			commands::duel::duel(),
			commands::bank::bank(),
		],
		prefix_options: poise::PrefixFrameworkOptions {
			prefix: Some("!".to_owned()),
			edit_tracker: Some(Arc::new(poise::EditTracker::for_timespan(
				Duration::from_secs(3600),
			))),
			..Default::default()
		},
		on_error: |error| Box::pin(on_error(error)),
		..Default::default()
	};
	// }}}
	// {{{ Start poise
	let framework = poise::Framework::builder()
		.setup(move |ctx, ready, framework| {
			Box::pin(async move {
				tracing::info!(user = %ready.user.name, "Logged in");
				poise::builtins::register_globally(ctx, &framework.options().commands).await?;
				UserContext::new()
			})
		})
		.options(options)
		.build();

	let token = get_var("CROWNDUEL_DISCORD_TOKEN")?;
	let intents =
		serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

	let mut client = serenity::ClientBuilder::new(token, intents)
		.framework(framework)
		.await?;

	client.start().await?;
	Ok(())
	// }}}
}
