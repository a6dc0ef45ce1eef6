//! In-memory reactive local store.
//!
//! Writers mutate the tables in place inside `Database::write`. Every
//! mutation journals the previous value of the row it touches, so a closure
//! returning `Err` is undone row by row. Listeners of the touched rooms are
//! notified only after a commit.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::StoreError;
use crate::model::{ChatMessage, Room, Subscription};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Change {
    Messages { room_id: String },
    Room { room_id: String },
    Subscription { room_id: String },
    Emojis,
}

/// Prior value of one row, restored when a transaction fails.
#[derive(Debug)]
enum Undo {
    Message(String, Option<ChatMessage>),
    Room(String, Option<Room>),
    Subscription(String, Option<Subscription>),
    EmojiUse(String, Option<u32>),
}

#[derive(Debug, Default)]
pub struct Tables {
    messages: HashMap<String, ChatMessage>,
    rooms: HashMap<String, Room>,
    subscriptions: HashMap<String, Subscription>,
    emoji_uses: HashMap<String, u32>,
    touched: BTreeSet<Change>,
    journal: Vec<Undo>,
}

impl Tables {
    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.get(id)
    }

    pub fn upsert_message(&mut self, message: ChatMessage) {
        self.touched.insert(Change::Messages {
            room_id: message.room_id.clone(),
        });
        let id = message.id.clone();
        let previous = self.messages.insert(id.clone(), message);
        self.journal.push(Undo::Message(id, previous));
    }

    pub fn update_message(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut ChatMessage),
    ) -> Result<(), StoreError> {
        let message = self.messages.get_mut(id).ok_or_else(|| StoreError::NotFound {
            table: "messages",
            id: id.to_owned(),
        })?;
        self.journal.push(Undo::Message(id.to_owned(), Some(message.clone())));
        f(message);
        self.touched.insert(Change::Messages {
            room_id: message.room_id.clone(),
        });
        Ok(())
    }

    pub fn remove_message(&mut self, id: &str) -> Option<ChatMessage> {
        let removed = self.messages.remove(id)?;
        self.touched.insert(Change::Messages {
            room_id: removed.room_id.clone(),
        });
        self.journal.push(Undo::Message(id.to_owned(), Some(removed.clone())));
        Some(removed)
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn subscription(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions.get(id)
    }

    pub fn upsert_room(&mut self, room: Room) {
        self.touched.insert(Change::Room {
            room_id: room.id.clone(),
        });
        let id = room.id.clone();
        let previous = self.rooms.insert(id.clone(), room);
        self.journal.push(Undo::Room(id, previous));
    }

    /// Upsert a server-side room record, keeping preferences that only live locally.
    pub fn merge_remote_room(&mut self, mut room: Room) {
        if let Some(existing) = self.rooms.get(&room.id) {
            room.auto_translate = existing.auto_translate;
            room.auto_translate_language = existing.auto_translate_language.clone();
            room.react_when_read_only = existing.react_when_read_only;
        }
        self.upsert_room(room);
    }

    pub fn upsert_subscription(&mut self, subscription: Subscription) {
        self.touched.insert(Change::Subscription {
            room_id: subscription.room_id.clone(),
        });
        let id = subscription.id.clone();
        let previous = self.subscriptions.insert(id.clone(), subscription);
        self.journal.push(Undo::Subscription(id, previous));
    }

    pub fn update_subscription_for_room(
        &mut self,
        room_id: &str,
        f: impl FnOnce(&mut Subscription),
    ) -> Result<(), StoreError> {
        let sub = self
            .subscriptions
            .values_mut()
            .find(|s| s.room_id == room_id)
            .ok_or_else(|| StoreError::NotFound {
                table: "subscriptions",
                id: room_id.to_owned(),
            })?;
        self.journal.push(Undo::Subscription(sub.id.clone(), Some(sub.clone())));
        f(sub);
        self.touched.insert(Change::Subscription {
            room_id: room_id.to_owned(),
        });
        Ok(())
    }

    pub fn record_emoji_use(&mut self, emoji: &str) {
        let count = self.emoji_uses.entry(emoji.to_owned()).or_insert(0);
        let previous = (*count > 0).then_some(*count);
        *count += 1;
        self.journal.push(Undo::EmojiUse(emoji.to_owned(), previous));
        self.touched.insert(Change::Emojis);
    }

    fn begin(&mut self) {
        self.touched.clear();
        self.journal.clear();
    }

    /// Keep everything written since `begin`; returns what changed.
    fn commit(&mut self) -> BTreeSet<Change> {
        self.journal.clear();
        std::mem::take(&mut self.touched)
    }

    /// Undo everything written since `begin`, newest first.
    fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Message(id, previous) => restore(&mut self.messages, id, previous),
                Undo::Room(id, previous) => restore(&mut self.rooms, id, previous),
                Undo::Subscription(id, previous) => restore(&mut self.subscriptions, id, previous),
                Undo::EmojiUse(emoji, previous) => restore(&mut self.emoji_uses, emoji, previous),
            }
        }
        self.touched.clear();
    }
}

fn restore<V>(table: &mut HashMap<String, V>, key: String, previous: Option<V>) {
    match previous {
        Some(value) => {
            table.insert(key, value);
        }
        None => {
            table.remove(&key);
        }
    }
}

struct Inner {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<Change>,
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Database(..)")
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                changes,
            }),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.inner.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run `f` as a transaction. Nothing is visible to readers or listeners
    /// unless `f` returns `Ok`.
    pub fn write<R>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let (result, touched) = {
            let mut guard = self.tables()?;
            guard.begin();
            match f(&mut guard) {
                Ok(result) => (result, guard.commit()),
                Err(e) => {
                    guard.rollback();
                    return Err(e);
                }
            }
        };
        for change in touched {
            // No receivers is fine.
            let _ = self.inner.changes.send(change);
        }
        Ok(result)
    }

    /// Messages of a room, newest first. Undated messages sort last.
    pub fn room_messages(&self, room_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let tables = self.tables()?;
        let mut messages: Vec<ChatMessage> = tables
            .messages
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.ts.cmp(&a.ts).then_with(|| b.id.cmp(&a.id)));
        Ok(messages)
    }

    pub fn message(&self, id: &str) -> Result<Option<ChatMessage>, StoreError> {
        Ok(self.tables()?.messages.get(id).cloned())
    }

    pub fn room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.tables()?.rooms.get(id).cloned())
    }

    pub fn subscription(&self, id: &str) -> Result<Option<Subscription>, StoreError> {
        Ok(self.tables()?.subscriptions.get(id).cloned())
    }

    /// Emoji shortcodes ordered by how often they were used, most used first.
    pub fn frequently_used_emojis(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.tables()?;
        let mut uses: Vec<(&String, &u32)> = tables.emoji_uses.iter().collect();
        uses.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        Ok(uses.into_iter().map(|(emoji, _)| emoji.clone()).collect())
    }

    /// Live listener for message changes in one room. Yields `()` per change;
    /// a lagging receiver collapses the missed changes into one.
    pub fn watch_room(&self, room_id: &str) -> impl Stream<Item = ()> + Send + 'static {
        let rx = self.inner.changes.subscribe();
        stream::unfold((rx, room_id.to_owned()), |(mut rx, room_id)| async move {
            loop {
                match rx.recv().await {
                    Ok(Change::Messages { room_id: changed }) if changed == room_id => {
                        return Some(((), (rx, room_id)));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Room {room_id} listener lagged by {skipped}");
                        return Some(((), (rx, room_id)));
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }
}
