use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ServiceError},
    models::team::{CreateTeamRequest, Team},
    services::{metrics::TEAMS_CREATED_COUNTER, teams::TeamService},
    AppState,
};

pub async fn create_team(
    State(state): State<AppState>,
    Json(body): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let team = TeamService::create(&state.db, &body.name).await?;
    TEAMS_CREATED_COUNTER.inc();
    info!("Team created: id={} name={}", team.id, team.name);
    Ok((StatusCode::CREATED, Json(json!({ "teamId": team.id }))))
}

pub async fn get_team(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Team>, ApiError> {
    TeamService::get(&state.db, team_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound("Team not found".into()).into())
}
