use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::palette;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub color: Option<String>, // #RRGGBB, may be absent for legacy rows
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Stored color, or the deterministic palette fallback.
    pub fn display_color(&self) -> &str {
        match self.color.as_deref() {
            Some(c) if palette::is_hex_color(c) => c,
            _ => palette::color_for_member(&self.id.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTeamRequest {
    pub member_name: String,
    pub color: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTeamResponse {
    pub member_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameMemberRequest {
    pub new_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateColorRequest {
    pub color: String,
}
