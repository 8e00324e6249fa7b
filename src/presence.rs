//! Who is online, and on which socket.
//!
//! [`Presence`] is the bidirectional user <-> connection map. It is plain data;
//! the [`Hub`](crate::chat::Hub) owns it behind a lock.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle for one live socket. Minted on accept, dead after disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Identity a client claims in `join`. Trusted as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub struct Presence {
    by_user: HashMap<UserId, ConnId>,
    by_conn: HashMap<ConnId, UserId>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last join wins: `conn` becomes the current connection of `user`.
    pub fn join(&mut self, user: UserId, conn: ConnId) {
        if let Some(previous) = self.by_conn.insert(conn, user.clone()) {
            if previous != user && self.by_user.get(&previous) == Some(&conn) {
                self.by_user.remove(&previous);
            }
        }
        self.by_user.insert(user, conn);
    }

    pub fn lookup_connection(&self, user: &UserId) -> Option<ConnId> {
        self.by_user.get(user).copied()
    }

    pub fn lookup_user(&self, conn: ConnId) -> Option<UserId> {
        self.by_conn.get(&conn).cloned()
    }

    /// Forgets `conn`. The user keeps a newer connection if it re-joined elsewhere.
    pub fn remove(&mut self, conn: ConnId) -> Option<UserId> {
        let user = self.by_conn.remove(&conn)?;
        if self.by_user.get(&user) == Some(&conn) {
            self.by_user.remove(&user);
        }
        Some(user)
    }

    /// Number of users with a current connection.
    pub fn online(&self) -> usize {
        self.by_user.len()
    }
}
