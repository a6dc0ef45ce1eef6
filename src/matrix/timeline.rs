use std::collections::HashMap;

use chrono::{DateTime, Utc};
use matrix_sdk::{Room, RoomMemberships};
use ruma::events::room::message::{MessageType, Relation};
use ruma::events::{AnySyncMessageLikeEvent, AnySyncTimelineEvent};
use ruma::serde::Raw;
use ruma::{MilliSecondsSinceUnixEpoch, UserId};

use crate::error::StoreError;
use crate::model::{ChatMessage, UserRef};
use crate::store::Tables;

/// What a single timeline event does to the local store.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreUpdate {
    Upsert(ChatMessage),
    Edit {
        target: String,
        body: String,
        editor: UserRef,
        at: Option<DateTime<Utc>>,
    },
    Redact(String),
}

/// Fetch all joined members from the local store and return a user_id → display name map.
pub async fn build_display_names(room: &Room) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Ok(members) = room.members_no_sync(RoomMemberships::JOIN).await {
        for member in members {
            map.insert(member.user_id().to_string(), member.name().to_owned());
        }
    }
    map
}

pub fn convert_raw(
    room_id: &str,
    raw: &Raw<AnySyncTimelineEvent>,
    display_names: &HashMap<String, String>,
) -> Option<StoreUpdate> {
    match raw.deserialize() {
        Ok(AnySyncTimelineEvent::MessageLike(event)) => {
            convert_message_event(room_id, &event, display_names)
        }
        Ok(AnySyncTimelineEvent::State(_)) => None,
        Err(e) => {
            tracing::debug!("Skipping undecodable event in {room_id}: {e}");
            None
        }
    }
}

pub fn convert_message_event(
    room_id: &str,
    event: &AnySyncMessageLikeEvent,
    display_names: &HashMap<String, String>,
) -> Option<StoreUpdate> {
    let author = user_ref(event.sender(), display_names);
    let ts = to_datetime(event.origin_server_ts());

    match event {
        AnySyncMessageLikeEvent::RoomMessage(msg) => {
            let original = msg.as_original()?;
            let mut thread_id = None;
            match &original.content.relates_to {
                Some(Relation::Replacement(replacement)) => {
                    return Some(StoreUpdate::Edit {
                        target: replacement.event_id.to_string(),
                        body: body_of(&replacement.new_content.msgtype),
                        editor: author,
                        at: ts,
                    });
                }
                Some(Relation::Thread(thread)) => thread_id = Some(thread.event_id.to_string()),
                _ => {}
            }

            Some(StoreUpdate::Upsert(ChatMessage {
                id: original.event_id.to_string(),
                room_id: room_id.to_owned(),
                author: Some(author),
                ts,
                body: body_of(&original.content.msgtype),
                updated_at: ts,
                thread_id,
                ..Default::default()
            }))
        }
        AnySyncMessageLikeEvent::RoomEncrypted(_) => Some(StoreUpdate::Upsert(ChatMessage {
            id: event.event_id().to_string(),
            room_id: room_id.to_owned(),
            author: Some(author),
            ts,
            body: "[Unable to decrypt]".to_string(),
            updated_at: ts,
            ..Default::default()
        })),
        AnySyncMessageLikeEvent::RoomRedaction(redaction) => {
            let original = redaction.as_original()?;
            let target = original
                .redacts
                .as_ref()
                .or(original.content.redacts.as_ref())?;
            Some(StoreUpdate::Redact(target.to_string()))
        }
        _ => None,
    }
}

/// Write one converted event into the store. Edits of unknown messages are dropped.
pub fn apply(tables: &mut Tables, update: StoreUpdate) -> Result<(), StoreError> {
    match update {
        StoreUpdate::Upsert(mut message) => {
            // Local-only flags survive a re-fetch of the same event.
            if let Some(existing) = tables.message(&message.id) {
                message.starred = existing.starred;
                message.pinned = existing.pinned;
                message.auto_translate = existing.auto_translate;
                message.translations = existing.translations.clone();
                if existing.edited_at.is_some() {
                    message.body = existing.body.clone();
                    message.edited_at = existing.edited_at;
                    message.edited_by = existing.edited_by.clone();
                }
            }
            tables.upsert_message(message);
        }
        StoreUpdate::Edit {
            target,
            body,
            editor,
            at,
        } => {
            if tables.message(&target).is_none() {
                tracing::debug!("Edit for unknown message {target}");
                return Ok(());
            }
            tables.update_message(&target, |m| {
                m.body = body;
                m.edited_at = at;
                m.updated_at = at;
                m.edited_by = Some(editor);
            })?;
        }
        StoreUpdate::Redact(target) => {
            tables.remove_message(&target);
        }
    }
    Ok(())
}

fn body_of(msgtype: &MessageType) -> String {
    match msgtype {
        MessageType::Text(text) => text.body.clone(),
        MessageType::Emote(emote) => format!("* {}", emote.body),
        MessageType::Notice(notice) => notice.body.clone(),
        MessageType::Image(img) => img.body.clone(),
        MessageType::File(_) => "[File]".to_string(),
        MessageType::Audio(_) => "[Audio]".to_string(),
        MessageType::Video(_) => "[Video]".to_string(),
        _ => "[Unsupported message type]".to_string(),
    }
}

fn user_ref(sender: &UserId, display_names: &HashMap<String, String>) -> UserRef {
    let id = sender.to_string();
    let username = display_names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| sender.localpart().to_string());
    UserRef { id, username }
}

fn to_datetime(ts: MilliSecondsSinceUnixEpoch) -> Option<DateTime<Utc>> {
    let millis: i64 = ts.0.into();
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> AnySyncMessageLikeEvent {
        serde_json::from_value(value).unwrap()
    }

    fn text_event(id: &str, body: &str) -> AnySyncMessageLikeEvent {
        event(json!({
            "type": "m.room.message",
            "event_id": id,
            "sender": "@bob:example.org",
            "origin_server_ts": 1_700_000_000_000u64,
            "content": { "msgtype": "m.text", "body": body },
        }))
    }

    #[test]
    fn text_message_becomes_upsert() {
        let names = HashMap::from([("@bob:example.org".to_owned(), "Bob".to_owned())]);
        let update = convert_message_event("!r:example.org", &text_event("$a", "hi"), &names);
        let Some(StoreUpdate::Upsert(message)) = update else {
            panic!("expected an upsert");
        };
        assert_eq!(message.id, "$a");
        assert_eq!(message.body, "hi");
        assert_eq!(message.author.unwrap().username, "Bob");
        assert_eq!(message.ts.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn replacement_edits_the_target() {
        let edit = event(json!({
            "type": "m.room.message",
            "event_id": "$b",
            "sender": "@bob:example.org",
            "origin_server_ts": 1_700_000_060_000u64,
            "content": {
                "msgtype": "m.text",
                "body": "* fixed",
                "m.new_content": { "msgtype": "m.text", "body": "fixed" },
                "m.relates_to": { "rel_type": "m.replace", "event_id": "$a" },
            },
        }));

        let mut tables = Tables::default();
        let original = convert_message_event("!r", &text_event("$a", "fxied"), &HashMap::new());
        apply(&mut tables, original.unwrap()).unwrap();
        let update = convert_message_event("!r", &edit, &HashMap::new()).unwrap();
        apply(&mut tables, update).unwrap();

        let message = tables.message("$a").unwrap();
        assert_eq!(message.body, "fixed");
        assert!(message.edited_at.is_some());
        assert_eq!(message.edited_by.as_ref().unwrap().username, "bob");
        assert!(tables.message("$b").is_none());
    }

    #[test]
    fn refetch_keeps_local_flags() {
        let mut tables = Tables::default();
        let first = convert_message_event("!r", &text_event("$a", "hi"), &HashMap::new());
        apply(&mut tables, first.unwrap()).unwrap();
        tables.update_message("$a", |m| m.starred = true).unwrap();

        let again = convert_message_event("!r", &text_event("$a", "hi"), &HashMap::new());
        apply(&mut tables, again.unwrap()).unwrap();
        assert!(tables.message("$a").unwrap().starred);
    }

    #[test]
    fn redaction_removes_the_message() {
        let mut tables = Tables::default();
        let first = convert_message_event("!r", &text_event("$a", "oops"), &HashMap::new());
        apply(&mut tables, first.unwrap()).unwrap();

        let redaction = event(json!({
            "type": "m.room.redaction",
            "event_id": "$c",
            "sender": "@bob:example.org",
            "origin_server_ts": 1_700_000_120_000u64,
            "redacts": "$a",
            "content": { "redacts": "$a" },
        }));
        let update = convert_message_event("!r", &redaction, &HashMap::new()).unwrap();
        assert_eq!(update, StoreUpdate::Redact("$a".into()));
        apply(&mut tables, update).unwrap();
        assert!(tables.message("$a").is_none());
    }
}
