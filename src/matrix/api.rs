//! `ChatApi` on top of a logged-in `matrix_sdk::Client`.
//!
//! Everything fetched from the homeserver is written into the local
//! `Database`; controllers observe it from there.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use matrix_sdk::room::MessagesOptions;
use matrix_sdk::ruma::api::client::receipt::create_receipt::v3::ReceiptType;
use matrix_sdk::ruma::events::reaction::ReactionEventContent;
use matrix_sdk::ruma::events::receipt::ReceiptThread;
use matrix_sdk::ruma::events::relation::{Annotation, Replacement};
use matrix_sdk::ruma::events::room::message::{
    Relation, RoomMessageEventContent, RoomMessageEventContentWithoutRelation,
};
use matrix_sdk::ruma::{EventId, OwnedEventId, OwnedRoomId, RoomId};
use matrix_sdk::{Client, Room};

use crate::api::{ChatApi, LoadOutcome, PERMISSION_DELETE_MESSAGE};
use crate::error::{ApiError, StoreError};
use crate::matrix::sync::{room_record, subscription_record};
use crate::matrix::timeline::{apply, build_display_names, convert_raw};
use crate::model::{ChatMessage, PartialMessage};
use crate::store::{Database, Tables};

pub struct MatrixChatApi {
    client: Client,
    db: Database,
    /// Backward pagination token per room. `None` once the start is reached.
    tokens: Mutex<HashMap<String, Option<String>>>,
}

impl MatrixChatApi {
    pub fn new(client: Client, db: Database) -> Self {
        Self {
            client,
            db,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    fn room(&self, room_id: &str) -> Result<Room, ApiError> {
        let id = parse_room_id(room_id)?;
        self.client
            .get_room(&id)
            .ok_or_else(|| ApiError::NotFound(room_id.to_owned()))
    }

    /// Room of a message already in the local store.
    fn room_of(&self, message_id: &str) -> Result<(Room, OwnedEventId), ApiError> {
        let message = self
            .db
            .message(message_id)
            .map_err(|e| ApiError::Request(e.to_string()))?
            .ok_or_else(|| ApiError::NotFound(message_id.to_owned()))?;
        Ok((self.room(&message.room_id)?, parse_event_id(message_id)?))
    }

    fn store(&self, f: impl FnOnce(&mut Tables) -> Result<(), StoreError>) -> Result<(), ApiError> {
        self.db.write(f).map_err(|e| ApiError::Request(e.to_string()))
    }
}

fn parse_room_id(room_id: &str) -> Result<OwnedRoomId, ApiError> {
    RoomId::parse(room_id).map_err(|e| ApiError::InvalidId {
        id: room_id.to_owned(),
        reason: e.to_string(),
    })
}

fn parse_event_id(event_id: &str) -> Result<OwnedEventId, ApiError> {
    EventId::parse(event_id).map_err(|e| ApiError::InvalidId {
        id: event_id.to_owned(),
        reason: e.to_string(),
    })
}

fn request_err(e: impl std::fmt::Display) -> ApiError {
    ApiError::Request(e.to_string())
}

/// Matrix reactions carry the emoji itself; the menu speaks in shortcodes.
fn reaction_key(shortcode: &str) -> &str {
    match shortcode {
        "clap" => "👏",
        "+1" => "👍",
        "heart_eyes" => "😍",
        "grinning" => "😀",
        "thinking_face" => "🤔",
        "smiley" => "😃",
        other => other,
    }
}

#[async_trait]
impl ChatApi for MatrixChatApi {
    async fn has_permission(
        &self,
        permissions: &[&str],
        room_id: &str,
    ) -> Result<HashMap<String, bool>, ApiError> {
        let room = self.room(room_id)?;
        let user_id = self
            .client
            .user_id()
            .ok_or_else(|| ApiError::Request("not logged in".into()))?;
        let can_redact = room.can_user_redact_other(user_id).await.map_err(request_err)?;

        Ok(permissions
            .iter()
            .map(|&name| {
                // Matrix only lets senders edit their own events and has no
                // redaction that bypasses power levels.
                (name.to_owned(), name == PERMISSION_DELETE_MESSAGE && can_redact)
            })
            .collect())
    }

    async fn get_permalink_message(&self, message: &ChatMessage) -> Result<String, ApiError> {
        let room = self.room(&message.room_id)?;
        let event_id = parse_event_id(&message.id)?;
        let uri = room
            .matrix_to_event_permalink(event_id)
            .await
            .map_err(request_err)?;
        Ok(uri.to_string())
    }

    async fn delete_message(&self, message_id: &str, room_id: &str) -> Result<(), ApiError> {
        let room = self.room(room_id)?;
        let event_id = parse_event_id(message_id)?;
        room.redact(&event_id, None, None).await.map_err(request_err)?;
        self.store(|t| {
            t.remove_message(message_id);
            Ok(())
        })
    }

    async fn mark_as_unread(&self, message_id: &str) -> Result<bool, ApiError> {
        let (room, _) = self.room_of(message_id)?;
        room.set_unread_flag(true).await.map_err(request_err)?;
        Ok(true)
    }

    async fn toggle_star_message(&self, _message_id: &str, _starred: bool) -> Result<(), ApiError> {
        Err(ApiError::Unsupported("starring messages"))
    }

    async fn toggle_pin_message(&self, _message_id: &str, _pinned: bool) -> Result<(), ApiError> {
        Err(ApiError::Unsupported("pinning messages"))
    }

    async fn report_message(&self, message_id: &str) -> Result<(), ApiError> {
        let (room, event_id) = self.room_of(message_id)?;
        room.report_content(event_id, None, None)
            .await
            .map_err(request_err)?;
        Ok(())
    }

    async fn translate_message(
        &self,
        _message: &PartialMessage,
        _language: &str,
    ) -> Result<(), ApiError> {
        Err(ApiError::Unsupported("machine translation"))
    }

    async fn set_reaction(&self, emoji: &str, message_id: &str) -> Result<(), ApiError> {
        let (room, event_id) = self.room_of(message_id)?;
        let content =
            ReactionEventContent::new(Annotation::new(event_id, reaction_key(emoji).to_owned()));
        room.send(content).await.map_err(request_err)?;
        Ok(())
    }

    async fn load_messages_for_room(
        &self,
        room_id: &str,
        before: Option<DateTime<Utc>>,
    ) -> Result<LoadOutcome, ApiError> {
        let room = self.room(room_id)?;

        let from = match before {
            None => None,
            Some(_) => {
                let tokens = self.tokens.lock().map_err(request_err)?;
                match tokens.get(room_id) {
                    Some(Some(token)) => Some(token.clone()),
                    Some(None) => return Ok(LoadOutcome { end: true }),
                    None => None,
                }
            }
        };

        let mut options = MessagesOptions::backward();
        options.from = from;
        let messages = room.messages(options).await.map_err(request_err)?;
        let display_names = build_display_names(&room).await;

        let updates: Vec<_> = messages
            .chunk
            .iter()
            .filter_map(|event| convert_raw(room_id, event.raw(), &display_names))
            .collect();
        tracing::debug!("Fetched {} events for {room_id}", updates.len());

        let record = match self.client.user_id() {
            Some(user_id) => Some(room_record(&room, user_id).await),
            None => None,
        };
        self.store(|t| {
            if let Some(record) = record {
                t.merge_remote_room(record);
            }
            // Oldest first so edits find their targets.
            for update in updates.into_iter().rev() {
                apply(t, update)?;
            }
            Ok(())
        })?;

        let end = messages.end.is_none();
        self.tokens
            .lock()
            .map_err(request_err)?
            .insert(room_id.to_owned(), messages.end);
        Ok(LoadOutcome { end })
    }

    async fn read_messages(&self, room_id: &str) -> Result<(), ApiError> {
        let room = self.room(room_id)?;
        let latest = self
            .db
            .room_messages(room_id)
            .map_err(request_err)?
            .into_iter()
            .next();
        if let Some(latest) = latest {
            let event_id = parse_event_id(&latest.id)?;
            room.send_single_receipt(ReceiptType::Read, ReceiptThread::Unthreaded, event_id)
                .await
                .map_err(request_err)?;
        }
        room.set_unread_flag(false).await.map_err(request_err)
    }

    async fn send_message(&self, room_id: &str, text: &str) -> Result<(), ApiError> {
        let room = self.room(room_id)?;
        room.send(RoomMessageEventContent::text_plain(text))
            .await
            .map_err(request_err)?;
        Ok(())
    }

    async fn edit_message(
        &self,
        message_id: &str,
        room_id: &str,
        text: &str,
    ) -> Result<(), ApiError> {
        let room = self.room(room_id)?;
        let event_id = parse_event_id(message_id)?;

        let mut content = RoomMessageEventContent::text_plain(format!("* {text}"));
        content.relates_to = Some(Relation::Replacement(Replacement::new(
            event_id,
            RoomMessageEventContentWithoutRelation::text_plain(text),
        )));
        room.send(content).await.map_err(request_err)?;
        Ok(())
    }

    async fn join_room(&self, room_id: &str) -> Result<(), ApiError> {
        let id = parse_room_id(room_id)?;
        let room = self.client.join_room_by_id(&id).await.map_err(request_err)?;
        let subscription = subscription_record(&room);
        self.store(|t| {
            t.upsert_subscription(subscription);
            Ok(())
        })
    }
}
