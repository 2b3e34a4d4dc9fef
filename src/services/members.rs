use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{require_name, ServiceError, ServiceResult},
    models::member::Member,
    palette,
    services::teams::TeamService,
};

const MEMBER_COLS: &str = "id, team_id, name, color, created_at";

pub struct MemberService;

impl MemberService {
    /// Members of a team in the order they joined.
    pub async fn list(pool: &PgPool, team_id: Uuid) -> ServiceResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(&format!(
            "SELECT {MEMBER_COLS} FROM members WHERE team_id = $1 ORDER BY seq ASC"
        ))
        .bind(team_id)
        .fetch_all(pool)
        .await?;
        Ok(members)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> ServiceResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(&format!(
            "SELECT {MEMBER_COLS} FROM members WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(member)
    }

    async fn require(pool: &PgPool, id: Uuid) -> ServiceResult<Member> {
        Self::get(pool, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Member not found".into()))
    }

    /// Add a member to an existing team. Without a color, one is picked from
    /// the palette at random.
    pub async fn join(
        pool: &PgPool,
        team_id: Uuid,
        member_name: &str,
        color: Option<&str>,
    ) -> ServiceResult<Member> {
        TeamService::require(pool, team_id).await?;
        let name = require_name(member_name, "Member")?;
        let color = match color {
            Some(c) => validate_color(c)?,
            None => palette::random_color().to_string(),
        };

        let member = sqlx::query_as::<_, Member>(&format!(
            "INSERT INTO members (team_id, name, color)
             VALUES ($1, $2, $3)
             RETURNING {MEMBER_COLS}"
        ))
        .bind(team_id)
        .bind(&name)
        .bind(&color)
        .fetch_one(pool)
        .await?;
        Ok(member)
    }

    /// Remove a member. Returns the deleted row so callers can notify its team.
    pub async fn delete(pool: &PgPool, id: Uuid) -> ServiceResult<Member> {
        let member = sqlx::query_as::<_, Member>(&format!(
            "DELETE FROM members WHERE id = $1 RETURNING {MEMBER_COLS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        member.ok_or_else(|| ServiceError::NotFound("Member not found".into()))
    }

    pub async fn rename(pool: &PgPool, id: Uuid, new_name: &str) -> ServiceResult<Member> {
        Self::require(pool, id).await?;
        let name = require_name(new_name, "Member")?;
        let member = sqlx::query_as::<_, Member>(&format!(
            "UPDATE members SET name = $1 WHERE id = $2 RETURNING {MEMBER_COLS}"
        ))
        .bind(&name)
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(member)
    }

    pub async fn update_color(pool: &PgPool, id: Uuid, color: &str) -> ServiceResult<Member> {
        Self::require(pool, id).await?;
        let color = validate_color(color)?;
        let member = sqlx::query_as::<_, Member>(&format!(
            "UPDATE members SET color = $1 WHERE id = $2 RETURNING {MEMBER_COLS}"
        ))
        .bind(&color)
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(member)
    }

    /// Team the member belongs to, if the member exists.
    pub async fn team_of(pool: &PgPool, id: Uuid) -> ServiceResult<Option<Uuid>> {
        let team_id: Option<Uuid> = sqlx::query_scalar("SELECT team_id FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(team_id)
    }
}

fn validate_color(raw: &str) -> ServiceResult<String> {
    let color = raw.trim();
    if !palette::is_hex_color(color) {
        return Err(ServiceError::Validation(
            "Color must be a #RRGGBB hex value".into(),
        ));
    }
    Ok(color.to_ascii_uppercase())
}
