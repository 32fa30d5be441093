// {{{ Imports
use crate::context::AppContext;
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use crownduel::duel::session::{DuelPhase, DuelSession};
use crownduel::duel::settings::GuildSettings;
use serde::Serialize;
// }}}

#[derive(Serialize)]
pub struct SessionView {
	phase: DuelPhase,
	session: DuelSession,
	settings: GuildSettings,
}

pub async fn get_session(
	State(state): State<AppContext>,
	Path(guild_id): Path<u64>,
) -> Result<Json<SessionView>, AppError> {
	let conn = state.ctx.db.get()?;
	let session = DuelSession::get(&conn, guild_id)?;
	let settings = GuildSettings::get(&conn, guild_id)?;

	Ok(Json(SessionView {
		phase: session.phase(),
		session,
		settings,
	}))
}
