//! JSON frames exchanged over the chat socket.
//!
//! Inbound frames are `{"event": .., "data": .., "ack": n?}` and are picked
//! apart by hand in [`super::Chat::dispatch`]; outbound frames are
//! [`ServerEvent`]s.

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    ChatError, GetField,
    presence::{ConnId, UserId},
    store::{Message, NewMessage, ProfileSummary},
};

use super::hub::{self, Outbox};

pub const DEFAULT_MESSAGE_TYPE: &str = "text";

#[derive(Debug, Clone, PartialEq)]
pub struct SendMessageRequest {
    pub receiver: UserId,
    pub content: String,
    pub message_type: String,
    pub file_url: String,
}

impl SendMessageRequest {
    /// Content comes out trimmed; `messageType` and `fileUrl` are optional.
    pub fn from_payload(payload: &Value) -> Result<Self, ChatError> {
        let receiver = payload.get_str_field("receiverId")?;
        if receiver.is_empty() {
            return Err(ChatError::InvalidPayload("empty receiverId".to_owned()));
        }

        let content = payload.get_str_field("content")?.trim();
        if content.is_empty() {
            return Err(ChatError::InvalidPayload("blank content".to_owned()));
        }

        Ok(Self {
            receiver: receiver.into(),
            content: content.to_owned(),
            message_type: payload
                .get_opt_str_field("messageType")?
                .unwrap_or(DEFAULT_MESSAGE_TYPE)
                .to_owned(),
            file_url: payload.get_opt_str_field("fileUrl")?.unwrap_or_default().to_owned(),
        })
    }

    pub fn into_message(self, sender: UserId) -> NewMessage {
        NewMessage {
            sender,
            receiver: self.receiver,
            content: self.content,
            message_type: self.message_type,
            file_url: self.file_url,
        }
    }
}

/// A user as shown next to a message. Profile fields are absent for unknown users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub id: UserId,
    #[serde(flatten)]
    pub profile: Option<ProfileSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedMessage {
    pub id: Uuid,
    pub sender: Participant,
    pub receiver: Participant,
    pub content: String,
    pub message_type: String,
    pub file_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl EnrichedMessage {
    pub fn new(
        message: Message,
        sender_profile: Option<ProfileSummary>,
        receiver_profile: Option<ProfileSummary>,
    ) -> Self {
        let Message { id, sender, receiver, content, message_type, file_url, created_at } = message;
        Self {
            id,
            sender: Participant { id: sender, profile: sender_profile },
            receiver: Participant { id: receiver, profile: receiver_profile },
            content,
            message_type,
            file_url,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    ReceiveMessage(EnrichedMessage),
    MessageSent(EnrichedMessage),
    Ack(AckFrame),
}

#[derive(Debug, Clone, Serialize)]
pub struct AckFrame {
    pub ack: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<EnrichedMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl AckFrame {
    pub fn new(ack: u64, outcome: &Result<EnrichedMessage, ChatError>) -> Self {
        match outcome {
            Ok(message) => Self {
                ack,
                success: true,
                message: Some(message.clone()),
                error: None,
                reason: None,
            },
            Err(e) => Self {
                ack,
                success: false,
                message: None,
                error: Some(e.code()),
                reason: Some(e.reason()),
            },
        }
    }
}

/// Reply slot for one `sendMessage`. Consumed on use, so it answers at most once.
#[derive(Debug)]
pub struct Ack {
    id: Option<u64>,
    conn: ConnId,
    outbox: Outbox,
}

impl Ack {
    pub fn new(id: Option<u64>, conn: ConnId, outbox: Outbox) -> Self {
        Self { id, conn, outbox }
    }

    /// No-op when the client did not ask for an ack.
    pub fn resolve(self, outcome: &Result<EnrichedMessage, ChatError>) {
        let Some(ack) = self.id else {
            return;
        };
        hub::offer(self.conn, &self.outbox, ServerEvent::Ack(AckFrame::new(ack, outcome)));
    }
}
