use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    models::notification::TeamEvent,
    services::{live, metrics::LIVE_CONNECTIONS_GAUGE},
    AppState,
};

/// GET /teams/{id}/live: pushes the full team window on connect and after
/// every change published for the team.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        info!("Live subscription opened: team={}", team_id);
        LIVE_CONNECTIONS_GAUGE.inc();
        handle_socket(socket, state, team_id).await;
        LIVE_CONNECTIONS_GAUGE.dec();
        info!("Live subscription closed: team={}", team_id);
    })
}

async fn handle_socket(socket: WebSocket, state: AppState, team_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let feed_limit = state.config.feed_limit;

    // Dedicated pub/sub connection per subscriber
    let mut pubsub = match state.redis_client.get_async_pubsub().await {
        Ok(c) => c,
        Err(e) => {
            error!("Redis pubsub error: {}", e);
            return;
        }
    };

    if let Err(e) = pubsub.subscribe(live::channel(team_id)).await {
        error!("Redis subscribe error: {}", e);
        return;
    }

    // Subscribe before the first read so no write can fall in between.
    if !push_snapshot(&mut sender, &state.db, team_id, feed_limit).await {
        return;
    }

    let pool = state.db.clone();
    let mut redis_task = tokio::spawn(async move {
        let mut pubsub_stream = pubsub.on_message();
        while let Some(msg) = pubsub_stream.next().await {
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(_) => continue,
            };
            match serde_json::from_str::<TeamEvent>(&payload) {
                Ok(event) => tracing::debug!("Team {} changed: {:?}", team_id, event),
                Err(e) => warn!("Unrecognised team event {:?}: {}", payload, e),
            }
            if !push_snapshot(&mut sender, &pool, team_id, feed_limit).await {
                break;
            }
        }
    });

    // The client has nothing to say; watch for it going away.
    let mut client_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    info!("Live message from client on team {}: {}", team_id, text);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut redis_task) => client_task.abort(),
        _ = (&mut client_task) => redis_task.abort(),
    }
}

/// Send the current snapshot. Returns `false` when the subscription should end
/// (socket gone or team deleted).
async fn push_snapshot(
    sender: &mut SplitSink<WebSocket, Message>,
    pool: &PgPool,
    team_id: Uuid,
    feed_limit: i64,
) -> bool {
    let ws_msg = match live::snapshot(pool, team_id, feed_limit).await {
        Ok(Some(snapshot)) => serde_json::json!({ "type": "snapshot", "payload": snapshot }),
        Ok(None) => {
            let gone = serde_json::json!({ "type": "team_not_found", "payload": { "teamId": team_id } });
            let _ = sender.send(Message::Text(gone.to_string().into())).await;
            return false;
        }
        Err(e) => {
            // Transient read failure: keep the subscription, the next event retries.
            warn!("Snapshot for team {} failed: {}", team_id, e);
            return true;
        }
    };

    sender
        .send(Message::Text(ws_msg.to_string().into()))
        .await
        .is_ok()
}
