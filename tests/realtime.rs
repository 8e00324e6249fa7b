use std::{sync::Arc, time::Duration};

use anyhow::Result;
use serde_json::{Value, json};
use talkuu::{
    chat::{Chat, Hub, Outbox, events::ServerEvent},
    db,
    presence::{ConnId, UserId},
    store::{
        Message, MessageStore, NewMessage, ProfileDirectory, ProfileSummary, SqliteStore,
        StoreError,
    },
};
use tokio::sync::mpsc::Receiver;

struct Socket {
    conn: ConnId,
    outbox: Outbox,
    rx: Receiver<ServerEvent>,
}

impl Socket {
    async fn open<S>(chat: &Chat<S>) -> Self {
        let (conn, outbox, rx) = chat.hub().connect().await;
        Self { conn, outbox, rx }
    }

    async fn send<S>(&self, chat: &Chat<S>, frame: Value)
    where
        S: MessageStore + ProfileDirectory + Sync,
    {
        chat.dispatch(self.conn, &self.outbox, &frame.to_string()).await;
    }

    /// Frames queued so far, as the client would see them.
    fn frames(&mut self) -> Vec<Value> {
        std::iter::from_fn(|| self.rx.try_recv().ok())
            .map(|event| serde_json::to_value(event).unwrap())
            .collect()
    }
}

async fn sqlite_chat() -> Result<Chat<SqliteStore>> {
    let db_pool = db::connect("sqlite::memory:", 1).await?;
    db::migrate(&db_pool).await?;
    let store = SqliteStore::new(db_pool);
    store
        .upsert_profile(
            &UserId::from("s"),
            &ProfileSummary {
                first_name: "Sam".to_owned(),
                last_name: "Sender".to_owned(),
                profile_picture: "https://img.example/s.png".to_owned(),
            },
        )
        .await?;
    Ok(Chat::new(store, Arc::new(Hub::new()), Duration::from_secs(5)))
}

async fn message_count(chat: &Chat<SqliteStore>) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(chat.store().pool())
        .await?)
}

#[tokio::test]
async fn offline_receiver_scenario() -> Result<()> {
    let chat = sqlite_chat().await?;
    let mut c1 = Socket::open(&chat).await;

    c1.send(&chat, json!({"event": "join", "data": "s"})).await;
    let hi = json!({"receiverId": "r", "content": "hi"});
    c1.send(&chat, json!({"event": "sendMessage", "data": hi, "ack": 1})).await;

    assert_eq!(message_count(&chat).await?, 1);
    let frames = c1.frames();
    assert_eq!(frames.len(), 2, "{frames:?}");
    assert_eq!(frames[0]["event"], "messageSent");
    assert_eq!(frames[0]["data"]["content"], "hi");
    assert_eq!(frames[0]["data"]["sender"]["firstName"], "Sam");
    assert_eq!(frames[1]["event"], "ack");
    assert_eq!(frames[1]["data"]["ack"], 1);
    assert_eq!(frames[1]["data"]["success"], true);
    assert_eq!(frames[1]["data"]["message"], frames[0]["data"]);
    Ok(())
}

#[tokio::test]
async fn both_online_scenario() -> Result<()> {
    let chat = sqlite_chat().await?;
    let mut c1 = Socket::open(&chat).await;
    let mut c2 = Socket::open(&chat).await;
    c1.send(&chat, json!({"event": "join", "data": "s"})).await;
    c2.send(&chat, json!({"event": "join", "data": "r"})).await;

    let hello = json!({"receiverId": "r", "content": "  hello  "});
    c1.send(&chat, json!({"event": "sendMessage", "data": hello})).await;

    let stored: String = sqlx::query_scalar("SELECT content FROM messages")
        .fetch_one(chat.store().pool())
        .await?;
    assert_eq!(stored, "hello");

    let sent = c1.frames();
    let received = c2.frames();
    assert_eq!(sent.len(), 1, "no ack id, so no ack frame: {sent:?}");
    assert_eq!(received.len(), 1);
    assert_eq!(sent[0]["event"], "messageSent");
    assert_eq!(received[0]["event"], "receiveMessage");
    assert_eq!(sent[0]["data"], received[0]["data"]);
    assert_eq!(received[0]["data"]["content"], "hello");
    Ok(())
}

#[tokio::test]
async fn failures_only_reach_the_caller() -> Result<()> {
    let chat = sqlite_chat().await?;
    let mut stranger = Socket::open(&chat).await;
    let mut c1 = Socket::open(&chat).await;
    let mut c2 = Socket::open(&chat).await;
    c2.send(&chat, json!({"event": "join", "data": "r"})).await;

    let hi = json!({"receiverId": "r", "content": "hi"});
    stranger.send(&chat, json!({"event": "sendMessage", "data": hi, "ack": 4})).await;
    c1.send(&chat, json!({"event": "join", "data": "s"})).await;
    let blank = json!({"receiverId": "r", "content": "   "});
    c1.send(&chat, json!({"event": "sendMessage", "data": blank, "ack": 5})).await;

    assert_eq!(message_count(&chat).await?, 0);
    assert_eq!(
        stranger.frames(),
        [json!({"event": "ack", "data": {
            "ack": 4,
            "success": false,
            "error": "NotJoined",
            "reason": "Not joined",
        }})]
    );
    assert_eq!(
        c1.frames(),
        [json!({"event": "ack", "data": {
            "ack": 5,
            "success": false,
            "error": "InvalidPayload",
            "reason": "receiverId and non-empty content are required",
        }})]
    );
    assert!(c2.frames().is_empty());
    Ok(())
}

#[tokio::test]
async fn garbage_frames_are_ignored() -> Result<()> {
    let chat = sqlite_chat().await?;
    let mut c1 = Socket::open(&chat).await;

    chat.dispatch(c1.conn, &c1.outbox, "not json").await;
    c1.send(&chat, json!({"data": "s"})).await;
    c1.send(&chat, json!({"event": "typing", "data": {}})).await;
    c1.send(&chat, json!({"event": "join", "data": 12})).await;

    assert!(c1.frames().is_empty());
    assert_eq!(chat.hub().user_of(c1.conn).await, None);
    Ok(())
}

#[tokio::test]
async fn receiver_that_left_gets_nothing() -> Result<()> {
    let chat = sqlite_chat().await?;
    let mut c1 = Socket::open(&chat).await;
    let mut c2 = Socket::open(&chat).await;
    c1.send(&chat, json!({"event": "join", "data": "s"})).await;
    c2.send(&chat, json!({"event": "join", "data": "r"})).await;

    assert_eq!(chat.hub().disconnect(c2.conn).await, Some(UserId::from("r")));
    let late = json!({"receiverId": "r", "content": "still there?"});
    c1.send(&chat, json!({"event": "sendMessage", "data": late})).await;

    assert_eq!(message_count(&chat).await?, 1);
    assert_eq!(c1.frames().len(), 1);
    assert!(c2.frames().is_empty());
    Ok(())
}

#[tokio::test]
async fn reconnect_survives_stale_disconnect() -> Result<()> {
    let chat = sqlite_chat().await?;
    let mut c1 = Socket::open(&chat).await;
    let old = Socket::open(&chat).await;
    let mut new = Socket::open(&chat).await;
    c1.send(&chat, json!({"event": "join", "data": "s"})).await;
    old.send(&chat, json!({"event": "join", "data": "r"})).await;
    new.send(&chat, json!({"event": "join", "data": "r"})).await;

    chat.hub().disconnect(old.conn).await;
    c1.send(&chat, json!({"event": "sendMessage", "data": {"receiverId": "r", "content": "ping"}}))
        .await;

    let received = new.frames();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["event"], "receiveMessage");
    assert_eq!(c1.frames().len(), 1);
    Ok(())
}

struct PanickingStore;

impl MessageStore for PanickingStore {
    async fn save(&self, _message: NewMessage) -> Result<Message, StoreError> {
        panic!("driver exploded");
    }
}

impl ProfileDirectory for PanickingStore {
    async fn project(&self, _user: &UserId) -> Result<Option<ProfileSummary>, StoreError> {
        Ok(None)
    }
}

#[tokio::test]
async fn panics_become_store_errors() -> Result<()> {
    let chat = Chat::new(PanickingStore, Arc::new(Hub::new()), Duration::from_secs(1));
    let mut c1 = Socket::open(&chat).await;
    c1.send(&chat, json!({"event": "join", "data": "s"})).await;

    let boom = json!({"receiverId": "r", "content": "boom"});
    c1.send(&chat, json!({"event": "sendMessage", "data": boom, "ack": 7})).await;

    let frames = c1.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["data"]["success"], false);
    assert_eq!(frames[0]["data"]["error"], "StoreError");
    assert_eq!(frames[0]["data"]["reason"], "Server error");

    // the connection keeps working afterwards
    assert_eq!(chat.hub().user_of(c1.conn).await, Some(UserId::from("s")));
    Ok(())
}
