use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Gauge,
};
use sqlx::PgPool;
use tracing::{info, warn};

lazy_static! {
    // ── Event counters ──────────────────────────────────────────────────────
    pub static ref TEAMS_CREATED_COUNTER: Counter = register_counter!(
        "api_teams_created_total",
        "Teams created"
    ).unwrap();

    pub static ref MEMBERS_JOINED_COUNTER: Counter = register_counter!(
        "api_members_joined_total",
        "Members that joined a team"
    ).unwrap();

    pub static ref PINGS_COUNTER: CounterVec = register_counter_vec!(
        "api_pings_sent_total",
        "Pings recorded, by entry point and outcome",
        &["source", "status"]
    ).unwrap();

    pub static ref LIVE_CONNECTIONS_GAUGE: Gauge = register_gauge!(
        "api_live_connections",
        "Open live WebSocket subscriptions"
    ).unwrap();

    // ── Totals ──────────────────────────────────────────────────────────────
    pub static ref TEAMS_GAUGE: Gauge = register_gauge!(
        "nextspeaker_teams_total",
        "Teams stored"
    ).unwrap();

    pub static ref MEMBERS_GAUGE: Gauge = register_gauge!(
        "nextspeaker_members_total",
        "Members stored"
    ).unwrap();

    pub static ref NOTIFICATIONS_GAUGE: Gauge = register_gauge!(
        "nextspeaker_notifications_total",
        "Notifications stored"
    ).unwrap();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        if let Err(e) = collect(&pool).await {
            warn!("Metrics: initial collection failed: {}", e);
        }
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
            if let Err(e) = collect(&pool).await {
                warn!("Metrics: collection failed: {}", e);
            }
        }
    });
}

async fn collect(pool: &PgPool) -> anyhow::Result<()> {
    let (teams, members, notifications): (i64, i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM teams)::BIGINT,
                (SELECT COUNT(*) FROM members)::BIGINT,
                (SELECT COUNT(*) FROM notifications)::BIGINT",
    )
    .fetch_one(pool)
    .await?;

    TEAMS_GAUGE.set(teams as f64);
    MEMBERS_GAUGE.set(members as f64);
    NOTIFICATIONS_GAUGE.set(notifications as f64);

    info!("Metrics: collected ({} teams)", teams);
    Ok(())
}
