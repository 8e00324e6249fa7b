use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::{
    ChatError,
    presence::ConnId,
    store::{Message, MessageStore, ProfileDirectory, StoreError},
};

use super::{
    Chat,
    events::{EnrichedMessage, SendMessageRequest, ServerEvent},
};

impl<S> Chat<S>
where
    S: MessageStore + ProfileDirectory + Sync,
{
    /// Persists one message from `conn` and fans it out.
    ///
    /// The receiver gets `receiveMessage` if it is online; the sending socket
    /// always gets `messageSent`. Nothing is emitted when any step fails.
    pub async fn send_msg(
        &self,
        conn: ConnId,
        payload: &Value,
    ) -> Result<EnrichedMessage, ChatError> {
        let sender = self.hub.user_of(conn).await.ok_or(ChatError::NotJoined)?;
        let request = SendMessageRequest::from_payload(payload)?;

        let saving = self.store.save(request.into_message(sender));
        let message = bounded(self.store_timeout, saving).await?;
        let message = bounded(self.store_timeout, enrich(&self.store, message)).await?;

        match self.hub.connection_of(&message.receiver.id).await {
            Some(receiver_conn) => {
                let event = ServerEvent::ReceiveMessage(message.clone());
                self.hub.emit(receiver_conn, event).await;
            }
            None => debug!(receiver = %message.receiver.id, "receiver offline"),
        }
        self.hub.emit(conn, ServerEvent::MessageSent(message.clone())).await;

        Ok(message)
    }
}

async fn enrich<S: ProfileDirectory>(
    store: &S,
    message: Message,
) -> Result<EnrichedMessage, StoreError> {
    let sender = store.project(&message.sender).await?;
    let receiver = store.project(&message.receiver).await?;
    Ok(EnrichedMessage::new(message, sender, receiver))
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}
