use axum::{Json, debug_handler};
use serde_json::{Value, json};

#[debug_handler]
pub async fn index() -> Json<Value> {
    Json(json!({ "message": "Talkuu API is running!" }))
}
