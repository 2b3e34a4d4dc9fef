use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::notification::{FeedNotification, SendNotificationRequest, TeamEvent},
    services::{live, metrics::PINGS_COUNTER, notifications::NotificationService},
    AppState,
};

/// GET /teams/{id}/notifications: recent feed, newest first.
///
/// Carries an `ETag`; pollers sending it back in `If-None-Match` get a 304
/// while nothing they can see has changed.
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let feed = NotificationService::recent(&state.db, team_id, state.config.feed_limit).await?;
    let etag = feed_etag(&feed);

    let unchanged = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);

    if unchanged {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }
    Ok(([(header::ETAG, etag)], Json(feed)).into_response())
}

pub async fn send_notification(
    State(mut state): State<AppState>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<SendNotificationRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = NotificationService::send(
        &state.db,
        team_id,
        body.from_member_id,
        body.to_member_id,
        body.message.as_deref(),
    )
    .await;

    match result {
        Ok(_) => {
            PINGS_COUNTER.with_label_values(&["api", "ok"]).inc();
            live::publish(&mut state.redis, team_id, TeamEvent::NotificationSent).await;
            Ok(Json(json!({ "success": true })))
        }
        Err(e) => {
            PINGS_COUNTER.with_label_values(&["api", "error"]).inc();
            Err(e.into())
        }
    }
}

/// Changes whenever an entry is added or a displayed member name changes.
/// Stable across restarts and toolchains.
pub fn feed_etag(feed: &[FeedNotification]) -> String {
    let mut hasher = Sha256::new();
    for n in feed {
        hasher.update(n.id.as_bytes());
        hasher.update(n.from_member_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(n.to_member_name.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    format!("\"{}-{}\"", &digest[..32], feed.len())
}
