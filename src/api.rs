use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ApiError;
use crate::model::{ChatMessage, PartialMessage};

pub const PERMISSION_EDIT_MESSAGE: &str = "edit-message";
pub const PERMISSION_DELETE_MESSAGE: &str = "delete-message";
pub const PERMISSION_FORCE_DELETE_MESSAGE: &str = "force-delete-message";

/// Result of a history page request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// The server has no messages older than the ones just loaded.
    pub end: bool,
}

/// Remote chat service as seen by the controllers.
///
/// Loading calls only populate the local store; results are observed
/// through `Database` listeners, never returned directly.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn has_permission(
        &self,
        permissions: &[&str],
        room_id: &str,
    ) -> Result<HashMap<String, bool>, ApiError>;

    async fn get_permalink_message(&self, message: &ChatMessage) -> Result<String, ApiError>;

    async fn delete_message(&self, message_id: &str, room_id: &str) -> Result<(), ApiError>;

    /// Returns the server's `success` flag.
    async fn mark_as_unread(&self, message_id: &str) -> Result<bool, ApiError>;

    /// `starred` is the current state; the server flips it.
    async fn toggle_star_message(&self, message_id: &str, starred: bool) -> Result<(), ApiError>;

    async fn toggle_pin_message(&self, message_id: &str, pinned: bool) -> Result<(), ApiError>;

    async fn report_message(&self, message_id: &str) -> Result<(), ApiError>;

    async fn translate_message(
        &self,
        message: &PartialMessage,
        language: &str,
    ) -> Result<(), ApiError>;

    async fn set_reaction(&self, emoji: &str, message_id: &str) -> Result<(), ApiError>;

    /// Fetch one page of history older than `before` (latest page when `None`).
    async fn load_messages_for_room(
        &self,
        room_id: &str,
        before: Option<DateTime<Utc>>,
    ) -> Result<LoadOutcome, ApiError>;

    async fn read_messages(&self, room_id: &str) -> Result<(), ApiError>;

    async fn send_message(&self, room_id: &str, text: &str) -> Result<(), ApiError>;

    async fn edit_message(&self, message_id: &str, room_id: &str, text: &str)
        -> Result<(), ApiError>;

    async fn join_room(&self, room_id: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording `ChatApi` used across the crate's tests.

    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        HasPermission(String),
        Permalink(String),
        Delete { message_id: String, room_id: String },
        MarkUnread(String),
        ToggleStar(String, bool),
        TogglePin(String, bool),
        Report(String),
        Translate(String, String),
        SetReaction(String, String),
        Load { room_id: String, before: Option<DateTime<Utc>> },
        Read(String),
        Send(String, String),
        Edit(String, String),
        Join(String),
    }

    #[derive(Default)]
    pub struct MockApi {
        pub calls: Mutex<Vec<Call>>,
        pub permissions: Option<HashMap<String, bool>>,
        pub permalink: Option<String>,
        pub fail_actions: bool,
        pub mark_unread_success: bool,
        pub load_end: bool,
        pub load_delay: Option<std::time::Duration>,
    }

    impl MockApi {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(call);
            if self.fail_actions {
                Err(ApiError::Request("mock failure".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ChatApi for MockApi {
        async fn has_permission(
            &self,
            _permissions: &[&str],
            room_id: &str,
        ) -> Result<HashMap<String, bool>, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::HasPermission(room_id.to_owned()));
            self.permissions
                .clone()
                .ok_or_else(|| ApiError::Request("permissions unavailable".into()))
        }

        async fn get_permalink_message(&self, message: &ChatMessage) -> Result<String, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Permalink(message.id.clone()));
            self.permalink
                .clone()
                .ok_or_else(|| ApiError::NotFound(message.id.clone()))
        }

        async fn delete_message(&self, message_id: &str, room_id: &str) -> Result<(), ApiError> {
            self.record(Call::Delete {
                message_id: message_id.to_owned(),
                room_id: room_id.to_owned(),
            })
        }

        async fn mark_as_unread(&self, message_id: &str) -> Result<bool, ApiError> {
            self.record(Call::MarkUnread(message_id.to_owned()))?;
            Ok(self.mark_unread_success)
        }

        async fn toggle_star_message(&self, message_id: &str, starred: bool) -> Result<(), ApiError> {
            self.record(Call::ToggleStar(message_id.to_owned(), starred))
        }

        async fn toggle_pin_message(&self, message_id: &str, pinned: bool) -> Result<(), ApiError> {
            self.record(Call::TogglePin(message_id.to_owned(), pinned))
        }

        async fn report_message(&self, message_id: &str) -> Result<(), ApiError> {
            self.record(Call::Report(message_id.to_owned()))
        }

        async fn translate_message(
            &self,
            message: &PartialMessage,
            language: &str,
        ) -> Result<(), ApiError> {
            self.record(Call::Translate(message.id.clone(), language.to_owned()))
        }

        async fn set_reaction(&self, emoji: &str, message_id: &str) -> Result<(), ApiError> {
            self.record(Call::SetReaction(emoji.to_owned(), message_id.to_owned()))
        }

        async fn load_messages_for_room(
            &self,
            room_id: &str,
            before: Option<DateTime<Utc>>,
        ) -> Result<LoadOutcome, ApiError> {
            if let Some(delay) = self.load_delay {
                tokio::time::sleep(delay).await;
            }
            self.record(Call::Load {
                room_id: room_id.to_owned(),
                before,
            })?;
            Ok(LoadOutcome { end: self.load_end })
        }

        async fn read_messages(&self, room_id: &str) -> Result<(), ApiError> {
            self.record(Call::Read(room_id.to_owned()))
        }

        async fn send_message(&self, room_id: &str, text: &str) -> Result<(), ApiError> {
            self.record(Call::Send(room_id.to_owned(), text.to_owned()))
        }

        async fn edit_message(
            &self,
            message_id: &str,
            _room_id: &str,
            text: &str,
        ) -> Result<(), ApiError> {
            self.record(Call::Edit(message_id.to_owned(), text.to_owned()))
        }

        async fn join_room(&self, room_id: &str) -> Result<(), ApiError> {
            self.record(Call::Join(room_id.to_owned()))
        }
    }
}
