use axum::{
    extract::{
        ws::{Message, WebSocket},
        Extension, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use shared::meal_record::MealRecord;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::auth::middleware::UserId;
use crate::error::AppError;
use crate::AppState;

pub async fn health_check() -> impl IntoResponse {
    "OK"
}

/// Streams the caller's full record list as JSON text frames: once on
/// connect, then after every write. Clients replace their copy wholesale.
pub async fn records_live(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Response, AppError> {
    let rx = state.store.subscribe_records(&user_id.0).await?;
    Ok(ws.on_upgrade(move |socket| stream_records(socket, rx, user_id.0)))
}

async fn send_snapshot(
    sender: &mut SplitSink<WebSocket, Message>,
    rx: &mut watch::Receiver<Vec<MealRecord>>,
) -> Result<(), ()> {
    // serialize before the await; the borrow guard must not be held across it
    let json = {
        let snapshot = rx.borrow_and_update();
        serde_json::to_string(&*snapshot)
    };
    let json = json.map_err(|e| error!("Failed to serialize snapshot: {}", e))?;
    sender.send(Message::Text(json)).await.map_err(|e| debug!("Snapshot send failed: {}", e))
}

async fn stream_records(socket: WebSocket, mut rx: watch::Receiver<Vec<MealRecord>>, uid: String) {
    info!("🔗 Live records connected for {}", uid);
    let (mut sender, mut receiver) = socket.split();

    if send_snapshot(&mut sender, &mut rx).await.is_ok() {
        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() || send_snapshot(&mut sender, &mut rx).await.is_err() {
                        break;
                    }
                }
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", uid, e);
                        break;
                    }
                    // clients only listen
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!("🔌 Live records disconnected for {}", uid);
}
