use sqlx::SqlitePool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::presence::UserId;

use super::{Message, MessageStore, NewMessage, ProfileDirectory, ProfileSummary, StoreError};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db_pool
    }

    pub async fn upsert_profile(
        &self,
        user: &UserId,
        profile: &ProfileSummary,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id,first_name,last_name,profile_picture) VALUES (?,?,?,?) \
             ON CONFLICT(id) DO UPDATE SET first_name=excluded.first_name, \
             last_name=excluded.last_name, profile_picture=excluded.profile_picture",
        )
        .bind(user.as_str())
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.profile_picture)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }
}

impl MessageStore for SqliteStore {
    async fn save(&self, message: NewMessage) -> Result<Message, StoreError> {
        let NewMessage { sender, receiver, content, message_type, file_url } = message;
        let id = Uuid::now_v7();
        let created_at = millis_precision(OffsetDateTime::now_utc());

        sqlx::query(
            "INSERT INTO messages \
             (id,sender_id,receiver_id,content,message_type,file_url,created_at) \
             VALUES (?,?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(sender.as_str())
        .bind(receiver.as_str())
        .bind(&content)
        .bind(&message_type)
        .bind(&file_url)
        .bind(unix_millis(created_at))
        .execute(&self.db_pool)
        .await?;

        Ok(Message { id, sender, receiver, content, message_type, file_url, created_at })
    }
}

// created_at is stored as unix millis, so what is emitted must not be finer.
fn millis_precision(at: OffsetDateTime) -> OffsetDateTime {
    at - Duration::nanoseconds(i64::from(at.nanosecond() % 1_000_000))
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

impl ProfileDirectory for SqliteStore {
    async fn project(&self, user: &UserId) -> Result<Option<ProfileSummary>, StoreError> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT first_name,last_name,profile_picture FROM users WHERE id=?")
                .bind(user.as_str())
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(row.map(|(first_name, last_name, profile_picture)| ProfileSummary {
            first_name,
            last_name,
            profile_picture,
        }))
    }
}
