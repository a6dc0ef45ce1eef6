use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Reference to a user as embedded in a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRef {
    pub id: String,
    pub username: String,
}

/// The logged-in user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub author: Option<UserRef>,
    /// Server timestamp. Absent for messages the backend could not date.
    pub ts: Option<DateTime<Utc>>,
    pub body: String,
    pub starred: bool,
    pub pinned: bool,
    /// Show the translated body instead of the original.
    pub auto_translate: bool,
    /// Cached translations keyed by language code.
    pub translations: HashMap<String, String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub edited_by: Option<UserRef>,
    /// Root message id when this message belongs to a thread.
    pub thread_id: Option<String>,
}

impl ChatMessage {
    pub fn is_authored_by(&self, user: &User) -> bool {
        self.author.as_ref().is_some_and(|a| a.id == user.id)
    }

    /// True when the author is known and is someone other than `user`.
    pub fn is_from_other(&self, user: &User) -> bool {
        self.author.as_ref().is_some_and(|a| a.id != user.id)
    }

    pub fn translation(&self, language: &str) -> Option<&str> {
        self.translations.get(language).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub read_only: bool,
    /// Members may still react while the room is read-only.
    pub react_when_read_only: bool,
    pub auto_translate: bool,
    pub auto_translate_language: Option<String>,
}

/// Membership of the current user in a room.
#[derive(Clone, Debug, PartialEq)]
pub struct Subscription {
    pub id: String,
    pub room_id: String,
    pub name: String,
    pub last_open: Option<DateTime<Utc>>,
}

/// Trimmed message payload sent along with a translation request.
#[derive(Clone, Debug, PartialEq)]
pub struct PartialMessage {
    pub id: String,
    pub room_id: String,
    pub author: Option<UserRef>,
    pub body: String,
}

impl From<&ChatMessage> for PartialMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id.clone(),
            room_id: message.room_id.clone(),
            author: message.author.clone(),
            body: message.body.clone(),
        }
    }
}
