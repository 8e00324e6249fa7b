use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use crate::store::SqliteStore;

use super::Chat;

#[debug_handler(state = crate::AppState)]
pub async fn chat_ws(
    State(chat): State<Chat<SqliteStore>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(async move |socket| serve(socket, chat).await)
}

async fn serve(socket: WebSocket, chat: Chat<SqliteStore>) {
    let (conn, outbox, mut outgoing) = chat.hub.connect().await;
    info!(%conn, "connected");

    let (mut sender, mut receiver) = socket.split();

    let mut write_task = tokio::spawn(async move {
        while let Some(event) = outgoing.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(%conn, "unserializable event: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => chat.dispatch(conn, &outbox, text.as_str()).await,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = &mut write_task => break,
        }
    }

    let user = chat.hub.disconnect(conn).await;
    write_task.abort();
    info!(%conn, user = ?user.as_ref().map(|u| u.as_str()), "disconnected");
}
