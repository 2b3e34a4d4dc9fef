use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{member::Member, team::Team};

/// A feed entry: the stored notification plus resolved member names.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedNotification {
    pub id: Uuid,
    pub team_id: Uuid,
    pub from_member_id: Uuid,
    pub to_member_id: Uuid,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub from_member_name: String,
    pub to_member_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    pub from_member_id: Uuid,
    pub to_member_id: Uuid,
    pub message: Option<String>,
}

/// Query string of the `/ping` convenience route. Everything arrives as raw
/// text so missing and malformed ids can be reported separately.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingQuery {
    pub team_id: Option<String>,
    pub to_member_id: Option<String>,
    pub from_member_id: Option<String>,
}

/// Event published on a team's change channel after every write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TeamEvent {
    MembersChanged,
    NotificationSent,
}

/// Full state pushed to live subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub team: Team,
    pub members: Vec<Member>,
    pub notifications: Vec<FeedNotification>,
}
