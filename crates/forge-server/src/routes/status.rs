//! WebSocket relay of catapult status updates.
//!
//! `GET /status/{id}` upgrades the browser connection, opens the matching
//! catapult status socket and forwards every downstream message to the
//! browser. Messages sent by the browser are not forwarded.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as Downstream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CatapultEndpoint;
use crate::error::AppError;
use crate::state::AppState;

/// GET /status/{correlation_id}
pub async fn status_socket(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
    Path(correlation_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let endpoint = CatapultEndpoint::resolve(&app.config)?;
    let url = endpoint.status_url(&correlation_id.to_string());
    Ok(ws.on_upgrade(move |socket| relay(app, correlation_id, url, socket)))
}

async fn relay(app: AppState, correlation_id: Uuid, url: String, client: WebSocket) {
    let downstream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!(%correlation_id, url = %url, error = %e, "cannot open catapult status socket");
            let mut client = client;
            let _ = client.send(Message::Close(None)).await;
            return;
        }
    };
    info!(%correlation_id, "status relay opened");

    let handle = app.relay.register(correlation_id).await;
    let (mut client_tx, mut client_rx) = client.split();
    let (mut down_tx, mut down_rx) = downstream.split();

    loop {
        tokio::select! {
            _ = handle.closed() => {
                debug!(%correlation_id, "status relay closed by registry");
                break;
            }
            msg = down_rx.next() => {
                let forward = match msg {
                    Some(Ok(Downstream::Text(text))) => Message::Text(text.as_str().to_owned().into()),
                    Some(Ok(Downstream::Binary(data))) => Message::Binary(data),
                    Some(Ok(Downstream::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(%correlation_id, error = %e, "catapult status socket failed");
                        break;
                    }
                };
                app.relay.touch(&handle).await;
                if client_tx.send(forward).await.is_err() {
                    break;
                }
            }
            msg = client_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => app.relay.touch(&handle).await,
            },
        }
    }

    let _ = client_tx.send(Message::Close(None)).await;
    let _ = down_tx.close().await;
    app.relay.remove(&handle).await;
    info!(%correlation_id, "status relay closed");
}
