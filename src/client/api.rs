use reqwest::{header, Client, Response, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{
    member::{JoinTeamResponse, Member},
    notification::FeedNotification,
    team::{CreateTeamResponse, Team},
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The team or member referenced no longer exists (or is not in the team).
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Result of a conditional feed read.
#[derive(Debug)]
pub enum FeedFetch {
    Unchanged,
    Changed {
        feed: Vec<FeedNotification>,
        etag: Option<String>,
    },
}

/// HTTP client for the Next Speaker API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn create_team(&self, name: &str) -> ClientResult<Uuid> {
        let resp = self
            .http
            .post(self.url("/teams"))
            .json(&json!({ "name": name }))
            .send()
            .await?;
        let body: CreateTeamResponse = check(resp).await?.json().await?;
        Ok(body.team_id)
    }

    /// `None` when the team does not exist (any more).
    pub async fn get_team(&self, team_id: Uuid) -> ClientResult<Option<Team>> {
        let resp = self.http.get(self.url(&format!("/teams/{team_id}"))).send().await?;
        match check(resp).await {
            Ok(resp) => Ok(Some(resp.json().await?)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn members(&self, team_id: Uuid) -> ClientResult<Vec<Member>> {
        let resp = self
            .http
            .get(self.url(&format!("/teams/{team_id}/members")))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Read the feed, skipping the body when it still matches `etag`.
    pub async fn notifications(&self, team_id: Uuid, etag: Option<&str>) -> ClientResult<FeedFetch> {
        let mut req = self.http.get(self.url(&format!("/teams/{team_id}/notifications")));
        if let Some(tag) = etag {
            req = req.header(header::IF_NONE_MATCH, tag);
        }
        let resp = req.send().await?;
        if resp.status() == StatusCode::NOT_MODIFIED {
            return Ok(FeedFetch::Unchanged);
        }
        let resp = check(resp).await?;
        let etag = resp
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let feed = resp.json().await?;
        Ok(FeedFetch::Changed { feed, etag })
    }

    pub async fn join_team(&self, team_id: Uuid, name: &str, color: Option<&str>) -> ClientResult<Uuid> {
        let resp = self
            .http
            .post(self.url(&format!("/teams/{team_id}/members")))
            .json(&json!({ "memberName": name, "color": color }))
            .send()
            .await?;
        let body: JoinTeamResponse = check(resp).await?.json().await?;
        Ok(body.member_id)
    }

    /// One ping. Not idempotent: never call this again on failure.
    pub async fn send_notification(&self, team_id: Uuid, from: Uuid, to: Uuid) -> ClientResult<()> {
        let resp = self
            .http
            .post(self.url(&format!("/teams/{team_id}/notifications")))
            .json(&json!({ "fromMemberId": from, "toMemberId": to }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn delete_member(&self, member_id: Uuid) -> ClientResult<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/members/{member_id}")))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn rename_member(&self, member_id: Uuid, new_name: &str) -> ClientResult<Member> {
        let resp = self
            .http
            .put(self.url(&format!("/members/{member_id}/name")))
            .json(&json!({ "newName": new_name }))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn update_member_color(&self, member_id: Uuid, color: &str) -> ClientResult<Member> {
        let resp = self
            .http
            .put(self.url(&format!("/members/{member_id}/color")))
            .json(&json!({ "color": color }))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }
}

async fn check(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    if status == StatusCode::NOT_FOUND {
        Err(ClientError::NotFound(message))
    } else {
        Err(ClientError::Rejected { status, message })
    }
}

/// The `error` field of a JSON error body, else the raw body, else the
/// status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Some(msg) = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
    {
        return msg;
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Unexpected response")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_field_is_preferred() {
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, r#"{"error":"Team not found"}"#),
            "Team not found"
        );
    }

    #[test]
    fn plain_bodies_and_empty_bodies() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, "Invalid URL: UUID parsing failed\n"),
            "Invalid URL: UUID parsing failed"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let api = ApiClient::new("http://localhost:8080/");
        assert_eq!(api.url("/teams"), "http://localhost:8080/teams");
    }
}
