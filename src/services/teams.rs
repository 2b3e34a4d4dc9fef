use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{require_name, ServiceError, ServiceResult},
    models::team::Team,
};

pub struct TeamService;

impl TeamService {
    pub async fn create(pool: &PgPool, name: &str) -> ServiceResult<Team> {
        let name = require_name(name, "Team")?;
        let team = sqlx::query_as::<_, Team>(
            "INSERT INTO teams (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(&name)
        .fetch_one(pool)
        .await?;
        Ok(team)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> ServiceResult<Option<Team>> {
        let team = sqlx::query_as::<_, Team>("SELECT id, name, created_at FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(team)
    }

    /// Like [`TeamService::get`], but a missing team is an error.
    pub async fn require(pool: &PgPool, id: Uuid) -> ServiceResult<Team> {
        Self::get(pool, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Team not found".into()))
    }
}
