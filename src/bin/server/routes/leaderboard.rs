// {{{ Imports
use crate::context::AppContext;
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::Json;
use crownduel::commands::duel::LEADERBOARD_SIZE;
use crownduel::duel::record::{leaderboard, DuelRecord, LeaderboardSort};
use serde::Deserialize;
// }}}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
	#[serde(default)]
	sort: LeaderboardSort,
}

pub async fn get_leaderboard(
	State(state): State<AppContext>,
	Path(guild_id): Path<u64>,
	Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<DuelRecord>>, AppError> {
	let conn = state.ctx.db.get()?;
	let records = leaderboard(&conn, guild_id, query.sort, LEADERBOARD_SIZE)?;
	Ok(Json(records))
}
