use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{ServiceError, ServiceResult},
    models::notification::FeedNotification,
    services::{members::MemberService, teams::TeamService},
};

pub struct NotificationService;

impl NotificationService {
    /// Record a ping from one member to another.
    ///
    /// Both members must currently belong to `team_id`. The call is not
    /// idempotent: every successful call inserts a new row.
    pub async fn send(
        pool: &PgPool,
        team_id: Uuid,
        from_member_id: Uuid,
        to_member_id: Uuid,
        message: Option<&str>,
    ) -> ServiceResult<Uuid> {
        TeamService::require(pool, team_id).await?;

        if MemberService::team_of(pool, from_member_id).await? != Some(team_id) {
            return Err(ServiceError::NotFound("Invalid sender member".into()));
        }
        if MemberService::team_of(pool, to_member_id).await? != Some(team_id) {
            return Err(ServiceError::NotFound("Invalid recipient member".into()));
        }

        let message = message.map(str::trim).filter(|m| !m.is_empty());
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO notifications (team_id, from_member_id, to_member_id, message)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(team_id)
        .bind(from_member_id)
        .bind(to_member_id)
        .bind(message)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            "Ping recorded: team={} from={} to={} id={}",
            team_id, from_member_id, to_member_id, id
        );
        Ok(id)
    }

    /// Most recent notifications of a team, newest first, with member names
    /// resolved ("Unknown" once a member has been deleted).
    pub async fn recent(
        pool: &PgPool,
        team_id: Uuid,
        limit: i64,
    ) -> ServiceResult<Vec<FeedNotification>> {
        let feed = sqlx::query_as::<_, FeedNotification>(
            "SELECT n.id, n.team_id, n.from_member_id, n.to_member_id, n.message, n.created_at,
                    COALESCE(f.name, 'Unknown') AS from_member_name,
                    COALESCE(t.name, 'Unknown') AS to_member_name
             FROM notifications n
             LEFT JOIN members f ON f.id = n.from_member_id
             LEFT JOIN members t ON t.id = n.to_member_id
             WHERE n.team_id = $1
             ORDER BY n.seq DESC
             LIMIT $2",
        )
        .bind(team_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{members::MemberService, teams::TeamService};

    async fn team_with(pool: &PgPool, names: &[&str]) -> (Uuid, Vec<Uuid>) {
        let team = TeamService::create(pool, "Standup").await.unwrap();
        let mut ids = Vec::new();
        for name in names {
            ids.push(MemberService::join(pool, team.id, name, None).await.unwrap().id);
        }
        (team.id, ids)
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn senders_and_recipients_must_belong_to_the_team(pool: PgPool) {
        let (team, ids) = team_with(&pool, &["Ada", "Grace"]).await;
        let (_, outsiders) = team_with(&pool, &["Linus"]).await;

        let err = NotificationService::send(&pool, team, outsiders[0], ids[1], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(err.to_string(), "Invalid sender member");

        let err = NotificationService::send(&pool, team, ids[0], outsiders[0], None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid recipient member");

        let err = NotificationService::send(&pool, team, ids[0], Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid recipient member");

        let err = NotificationService::send(&pool, Uuid::new_v4(), ids[0], ids[1], None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Team not found");

        assert!(NotificationService::recent(&pool, team, 50).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn deleted_members_show_as_unknown(pool: PgPool) {
        let (team, ids) = team_with(&pool, &["Ada", "Grace"]).await;
        NotificationService::send(&pool, team, ids[0], ids[1], Some("  your turn "))
            .await
            .unwrap();

        MemberService::delete(&pool, ids[0]).await.unwrap();

        let feed = NotificationService::recent(&pool, team, 50).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].from_member_name, "Unknown");
        assert_eq!(feed[0].to_member_name, "Grace");
        assert_eq!(feed[0].message.as_deref(), Some("your turn"));
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn feed_is_newest_first_and_capped(pool: PgPool) {
        let (team, ids) = team_with(&pool, &["Ada", "Grace"]).await;
        let mut sent = Vec::new();
        for _ in 0..55 {
            sent.push(NotificationService::send(&pool, team, ids[0], ids[1], None).await.unwrap());
        }

        let feed = NotificationService::recent(&pool, team, 50).await.unwrap();
        assert_eq!(feed.len(), 50);
        let expected: Vec<Uuid> = sent.iter().rev().take(50).copied().collect();
        let got: Vec<Uuid> = feed.iter().map(|n| n.id).collect();
        assert_eq!(got, expected);
    }
}
