//! `GET /ping`: fire a notification from a plain URL (bookmarks, shortcuts,
//! curl). Possession of the three ids is the only credential.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    models::notification::{PingQuery, TeamEvent},
    services::{live, metrics::PINGS_COUNTER, notifications::NotificationService},
    AppState,
};

const MISSING_PARAMS: &str = "Missing required parameters: teamId, toMemberId, fromMemberId";
const DETAIL_LIMIT: usize = 200;

pub async fn ping(
    State(mut state): State<AppState>,
    Query(query): Query<PingQuery>,
) -> (StatusCode, Json<Value>) {
    let (team_id, to_member_id, from_member_id) = match parse_ids(&query) {
        Ok(ids) => ids,
        Err(rejection) => return rejection,
    };

    let result =
        NotificationService::send(&state.db, team_id, from_member_id, to_member_id, None).await;

    match result {
        Ok(_) => {
            PINGS_COUNTER.with_label_values(&["ping_url", "ok"]).inc();
            live::publish(&mut state.redis, team_id, TeamEvent::NotificationSent).await;
            (
                StatusCode::OK,
                Json(json!({ "success": true, "message": "Notification sent successfully" })),
            )
        }
        Err(e) if e.is_internal() => {
            PINGS_COUNTER.with_label_values(&["ping_url", "error"]).inc();
            tracing::error!("Ping failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to ping", "details": truncate(&e.to_string(), DETAIL_LIMIT) })),
            )
        }
        Err(e) => {
            PINGS_COUNTER.with_label_values(&["ping_url", "error"]).inc();
            let message = e.to_string();
            (status_for_message(&message), Json(json!({ "error": message })))
        }
    }
}

/// Order of the returned tuple: team, recipient, sender.
fn parse_ids(query: &PingQuery) -> Result<(Uuid, Uuid, Uuid), (StatusCode, Json<Value>)> {
    let present = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    };

    let (Some(team), Some(to), Some(from)) = (
        present(&query.team_id),
        present(&query.to_member_id),
        present(&query.from_member_id),
    ) else {
        return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": MISSING_PARAMS }))));
    };

    let parse = |raw: &str, name: &str| {
        Uuid::parse_str(raw).map_err(|_| {
            let message = format!("Invalid {name}");
            (status_for_message(&message), Json(json!({ "error": message })))
        })
    };

    Ok((
        parse(&team, "teamId")?,
        parse(&to, "toMemberId")?,
        parse(&from, "fromMemberId")?,
    ))
}

/// Domain errors naming a missing or foreign record map to 404, anything else
/// the caller got wrong to 400.
pub fn status_for_message(message: &str) -> StatusCode {
    if message.contains("not found") || message.contains("Invalid") {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::BAD_REQUEST
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(team: Option<&str>, to: Option<&str>, from: Option<&str>) -> PingQuery {
        PingQuery {
            team_id: team.map(String::from),
            to_member_id: to.map(String::from),
            from_member_id: from.map(String::from),
        }
    }

    #[test]
    fn missing_parameter_is_bad_request() {
        let id = Uuid::new_v4().to_string();
        let (status, Json(body)) = parse_ids(&query(Some(&id), None, Some(&id))).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], MISSING_PARAMS);

        let (status, _) = parse_ids(&query(Some(""), Some(&id), Some(&id))).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_id_is_not_found() {
        let id = Uuid::new_v4().to_string();
        let (status, Json(body)) =
            parse_ids(&query(Some("team-42"), Some(&id), Some(&id))).unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Invalid teamId");
    }

    #[test]
    fn ids_come_back_in_team_to_from_order() {
        let (t, to, from) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let parsed = parse_ids(&query(
            Some(&t.to_string()),
            Some(&to.to_string()),
            Some(&from.to_string()),
        ))
        .unwrap();
        assert_eq!(parsed, (t, to, from));
    }

    #[test]
    fn status_mapping_follows_message() {
        assert_eq!(status_for_message("Team not found"), StatusCode::NOT_FOUND);
        assert_eq!(status_for_message("Invalid recipient member"), StatusCode::NOT_FOUND);
        assert_eq!(status_for_message("Member name is required"), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn details_are_bounded() {
        let long = "x".repeat(500);
        assert_eq!(truncate(&long, DETAIL_LIMIT).len(), DETAIL_LIMIT);
        assert_eq!(truncate("short", DETAIL_LIMIT), "short");
    }
}
