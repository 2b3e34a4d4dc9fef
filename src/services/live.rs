//! Per-team change channel. Writers publish a [`TeamEvent`]; live
//! subscribers re-read the whole team window and push it to their clients.

use redis::AsyncCommands;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::ServiceResult,
    models::notification::{TeamEvent, TeamSnapshot},
    services::{members::MemberService, notifications::NotificationService, teams::TeamService},
};

pub fn channel(team_id: Uuid) -> String {
    format!("team:{}:changes", team_id)
}

/// Publish a change event. Failures only delay live views until the next
/// write, so they are logged and swallowed.
pub async fn publish(
    redis: &mut redis::aio::MultiplexedConnection,
    team_id: Uuid,
    event: TeamEvent,
) {
    let payload = match serde_json::to_string(&event) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Could not encode team event: {}", e);
            return;
        }
    };
    if let Err(e) = redis.publish::<_, _, ()>(channel(team_id), payload).await {
        tracing::warn!("Redis publish failed for team {}: {}", team_id, e);
    }
}

/// Current team window, or `None` once the team is gone.
pub async fn snapshot(
    pool: &PgPool,
    team_id: Uuid,
    feed_limit: i64,
) -> ServiceResult<Option<TeamSnapshot>> {
    let Some(team) = TeamService::get(pool, team_id).await? else {
        return Ok(None);
    };
    let members = MemberService::list(pool, team_id).await?;
    let notifications = NotificationService::recent(pool, team_id, feed_limit).await?;
    Ok(Some(TeamSnapshot {
        team,
        members,
        notifications,
    }))
}
