pub mod chat;
pub mod config;
pub mod db;
pub mod index;
pub mod presence;
pub mod store;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method},
    routing::get,
};
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use tower_http::cors::CorsLayer;

use chat::{Chat, Hub};
use config::Config;
use store::{SqliteStore, StoreError};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub chat: Chat<SqliteStore>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: &Config) -> Self {
        Self {
            chat: Chat::new(SqliteStore::new(db_pool), Arc::new(Hub::new()), config.store_timeout),
        }
    }
}

pub fn app(state: AppState, config: &Config) -> anyhow::Result<Router> {
    let origin: HeaderValue = config
        .allowed_origin
        .parse()
        .with_context(|| format!("bad CORS origin {:?}", config.allowed_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST]);

    Ok(Router::new()
        .route("/", get(index::index))
        .merge(chat::router())
        .with_state(state)
        .layer(cors))
}

/// Failures of one `sendMessage`, reported back on its ack.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("sender has not joined")]
    NotJoined,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::NotJoined => "NotJoined",
            ChatError::InvalidPayload(_) => "InvalidPayload",
            ChatError::Store(_) => "StoreError",
        }
    }

    /// What the client is told. Store details stay in the logs.
    pub fn reason(&self) -> &'static str {
        match self {
            ChatError::NotJoined => "Not joined",
            ChatError::InvalidPayload(_) => "receiverId and non-empty content are required",
            ChatError::Store(_) => "Server error",
        }
    }
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> Result<&str, ChatError>;
    fn get_opt_str_field(&self, field: &str) -> Result<Option<&str>, ChatError>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> Result<&str, ChatError> {
        self.get_opt_str_field(field)?
            .ok_or_else(|| ChatError::InvalidPayload(format!("expected {field}")))
    }

    /// Missing and `null` both read as `None`.
    fn get_opt_str_field(&self, field: &str) -> Result<Option<&str>, ChatError> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ChatError::InvalidPayload(format!("expected {field} to be a string"))),
        }
    }
}
