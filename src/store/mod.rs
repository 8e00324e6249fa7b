mod sqlite;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::presence::UserId;

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("handler aborted")]
    Aborted,
}

/// A validated message that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender: UserId,
    pub receiver: UserId,
    pub content: String,
    pub message_type: String,
    pub file_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub sender: UserId,
    pub receiver: UserId,
    pub content: String,
    pub message_type: String,
    pub file_url: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: String,
}

pub trait MessageStore {
    /// Stores `message` once and stamps its id and creation time.
    fn save(&self, message: NewMessage) -> impl Future<Output = Result<Message, StoreError>> + Send;
}

pub trait ProfileDirectory {
    /// `None` when the user has no profile.
    fn project(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<Option<ProfileSummary>, StoreError>> + Send;
}
