use context::AppContext;
use crownduel::context::paths::parse_var_or;
use crownduel::context::{Error, UserContext};
use crownduel::logs::init_tracing;
use routes::leaderboard::get_leaderboard;
use routes::session::get_session;

mod context;
mod error;
mod routes;

#[tokio::main]
async fn main() -> Result<(), Error> {
	init_tracing();
	let ctx = Box::leak(Box::new(UserContext::new()?));

	let app = axum::Router::new()
		.route(
			"/guilds/:guild_id/leaderboard",
			axum::routing::get(get_leaderboard),
		)
		.route("/guilds/:guild_id/duel", axum::routing::get(get_session))
		.with_state(AppContext::new(ctx));

	let port: u16 = parse_var_or("CROWNDUEL_SERVER_PORT", 8080)?;
	let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

	tracing::info!(address = %listener.local_addr()?, "Listening");

	axum::serve(listener, app).await?;

	Ok(())
}
