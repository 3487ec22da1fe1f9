use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::{broadcast::Broadcaster, proto::Inbound};

pub fn router() -> Router {
    Router::new().route("/live", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(bc): Extension<Broadcaster>,
) -> impl IntoResponse {
    ws.on_upgrade(move |sock| visitor_ws(sock, bc))
}

/* ---------------- per connection ---------------- */

async fn visitor_ws(sock: WebSocket, bc: Broadcaster) {
    let (mut sink, mut stream) = sock.split();

    // Broadcasts land in this queue; the writer drains it into the socket.
    // When the writer dies, sends into `tx` fail and the broadcaster treats
    // the connection as dead.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut registered: Option<String> = None;
    while let Some(Ok(msg)) = stream.next().await {
        let raw = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        let inbound = match serde_json::from_str::<Inbound>(&raw) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed frame");
                continue;
            }
        };
        let res = match inbound {
            Inbound::Join { visitor_id, page } => {
                registered = Some(visitor_id.clone());
                bc.join(&visitor_id, page.as_deref(), tx.clone()).await
            }
            Inbound::Heartbeat { visitor_id, page } => {
                bc.heartbeat(&visitor_id, page.as_deref(), &tx).await
            }
            Inbound::Leave { visitor_id } => {
                if registered.as_deref() == Some(visitor_id.as_str()) {
                    registered = None;
                }
                bc.leave(&visitor_id).await
            }
        };
        // persistence failure on the main path kills this connection
        if let Err(e) = res {
            tracing::error!(error = %e, "presence update failed, closing connection");
            break;
        }
    }

    if let Some(visitor_id) = registered {
        bc.disconnect(&visitor_id, &tx).await;
    }
    writer.abort();
}
