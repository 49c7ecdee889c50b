use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, Extension},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    dispatch::{Dispatcher, InputEvent},
    hub::{ViewerRx, ViewerTx},
    protocol::ServerMsg,
};

pub fn router() -> Router {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(dispatcher): Extension<Dispatcher>,
) -> impl IntoResponse {
    ws.on_upgrade(move |s| viewer_ws(s, dispatcher))
}

/* ---------------- per viewer ---------------- */
async fn viewer_ws(sock: WebSocket, d: Dispatcher) {
    let (mut sink, mut stream) = sock.split();
    let (tx, mut rx): (ViewerTx, ViewerRx) = mpsc::unbounded_channel();

    /* init 先排進自己的佇列，保證是第一則 */
    match ServerMsg::init().to_text() {
        Ok(text) => { tx.send(text).ok(); }
        Err(e) => {
            error!("serialize init: {e}");
            return;
        }
    }
    d.viewer_joined().await;
    let id = d.hub().register(tx).await;
    let viewers = d.hub().len().await;
    info!(%id, viewers, "viewer connected");

    let mut writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut writer => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(raw))) => match InputEvent::parse(&raw) {
                    Ok(ev) => {
                        let applied = d.apply(ev).await;
                        debug!(%id, outcome = ?applied.outcome, generating = applied.generation.is_some(), "event applied");
                    }
                    Err(e) => warn!(%id, "dropping message: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(%id, "socket error: {e}");
                    break;
                }
            },
        }
    }

    /* 離線 */
    d.hub().unregister(id).await;
    writer.abort();
    info!(%id, "viewer disconnected");
}
