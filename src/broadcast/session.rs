//! WebSocket price session
//!
//! Pumps hub snapshots to one client as JSON `{name: price}` text frames.
//! Ends when the hub closes the subscription, the client disconnects or a
//! send fails. Incoming client frames other than Close are ignored.

use super::hub::BroadcastHub;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    HubClosed,
    ClientClosed,
    SendFailed,
}

pub async fn run_price_session(socket: WebSocket, hub: Arc<BroadcastHub>) -> SessionEnd {
    let mut subscription = hub.subscribe();
    let id = subscription.id;
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!(target: "session", %id, "price session opened");

    let end = loop {
        tokio::select! {
            snapshot = subscription.recv() => {
                let Some(snapshot) = snapshot else {
                    let _ = sender.send(Message::Close(None)).await;
                    break SessionEnd::HubClosed;
                };
                let json = match serde_json::to_string(&*snapshot) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(target: "session", %id, "failed to serialize snapshot: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json)).await.is_err() {
                    break SessionEnd::SendFailed;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break SessionEnd::ClientClosed,
                Some(Err(e)) => {
                    tracing::debug!(target: "session", %id, "websocket error: {}", e);
                    break SessionEnd::ClientClosed;
                }
                Some(Ok(_)) => {}
            },
        }
    };

    hub.unsubscribe(id);
    tracing::debug!(target: "session", %id, ?end, "price session closed");
    end
}
