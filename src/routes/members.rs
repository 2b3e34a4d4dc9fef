use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        member::{JoinTeamRequest, Member, RenameMemberRequest, UpdateColorRequest},
        notification::TeamEvent,
    },
    services::{live, members::MemberService, metrics::MEMBERS_JOINED_COUNTER},
    AppState,
};

pub async fn list_members(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Vec<Member>>, ApiError> {
    let members = MemberService::list(&state.db, team_id).await?;
    Ok(Json(members))
}

pub async fn join_team(
    State(mut state): State<AppState>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<JoinTeamRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let member =
        MemberService::join(&state.db, team_id, &body.member_name, body.color.as_deref()).await?;
    MEMBERS_JOINED_COUNTER.inc();
    info!("Member joined: team={} member={}", team_id, member.id);

    live::publish(&mut state.redis, team_id, TeamEvent::MembersChanged).await;
    Ok((StatusCode::CREATED, Json(json!({ "memberId": member.id }))))
}

pub async fn delete_member(
    State(mut state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let member = MemberService::delete(&state.db, member_id).await?;
    info!("Member deleted: team={} member={}", member.team_id, member.id);

    live::publish(&mut state.redis, member.team_id, TeamEvent::MembersChanged).await;
    Ok(Json(json!({ "success": true })))
}

pub async fn rename_member(
    State(mut state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Json(body): Json<RenameMemberRequest>,
) -> Result<Json<Member>, ApiError> {
    let member = MemberService::rename(&state.db, member_id, &body.new_name).await?;
    live::publish(&mut state.redis, member.team_id, TeamEvent::MembersChanged).await;
    Ok(Json(member))
}

pub async fn update_member_color(
    State(mut state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Json(body): Json<UpdateColorRequest>,
) -> Result<Json<Member>, ApiError> {
    let member = MemberService::update_color(&state.db, member_id, &body.color).await?;
    live::publish(&mut state.redis, member.team_id, TeamEvent::MembersChanged).await;
    Ok(Json(member))
}
