use std::sync::Arc;

use futures::stream::{AbortHandle, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::api::ChatApi;
use crate::config::TimelineSettings;
use crate::debounce::Debouncer;
use crate::error::StoreError;
use crate::message::{Message, TimelineItem};
use crate::model::{ChatMessage, Room};
use crate::state::rows::{build_rows, quote_fallback};
use crate::store::Database;
use crate::task::Task;

/// How the screen was opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoomTarget {
    /// Bare room id: the user may not be a member yet.
    Room(String),
    /// Membership record id, resolved to its room through the store.
    Subscription(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Initial,
    Loaded,
    LoadingMore,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ComposerMode {
    Message,
    Reply {
        message_id: String,
        sender: String,
        preview: String,
        mention: bool,
    },
    Edit {
        message_id: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComposerState {
    pub text: String,
    pub mode: ComposerMode,
    pub sending: bool,
}

impl Default for ComposerState {
    fn default() -> Self {
        Self {
            text: String::new(),
            mode: ComposerMode::Message,
            sending: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Footer<'a> {
    /// Not a member: only joining is possible.
    Preview { joining: bool },
    Composer(&'a ComposerState),
}

/// What the shell draws for the current state.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineView<'a> {
    pub banner: Option<&'static str>,
    /// Shown past the oldest row.
    pub header: Option<&'static str>,
    pub rows: &'a [TimelineItem],
    pub footer: Footer<'a>,
}

pub struct RoomTimeline {
    api: Arc<dyn ChatApi>,
    db: Database,
    settings: TimelineSettings,
    room_id: String,
    room: Option<Room>,
    phase: Phase,
    reached_start: bool,
    stale: bool,
    joined: bool,
    joining: bool,
    messages: Vec<ChatMessage>,
    items: Vec<TimelineItem>,
    composer: ComposerState,
    debouncer: Debouncer,
    listener: Option<AbortHandle>,
    token: CancellationToken,
    renders: u64,
}

impl RoomTimeline {
    /// Resolve the room, render what the store already has and start loading.
    pub fn mount(
        target: RoomTarget,
        api: Arc<dyn ChatApi>,
        db: Database,
        settings: TimelineSettings,
    ) -> Result<(Self, Task<Message>), StoreError> {
        let (room_id, joined) = match target {
            RoomTarget::Room(room_id) => (room_id, false),
            RoomTarget::Subscription(sid) => {
                let sub = db.subscription(&sid)?.ok_or(StoreError::NotFound {
                    table: "subscriptions",
                    id: sid,
                })?;
                (sub.room_id, true)
            }
        };
        tracing::info!("Mounting timeline for {room_id} (member: {joined})");

        let mut timeline = Self {
            api,
            room: db.room(&room_id)?,
            db,
            debouncer: Debouncer::new(settings.debounce()),
            settings,
            room_id,
            phase: Phase::Initial,
            reached_start: false,
            stale: false,
            joined,
            joining: false,
            messages: Vec::new(),
            items: Vec::new(),
            composer: ComposerState::default(),
            listener: None,
            token: CancellationToken::new(),
            renders: 0,
        };
        timeline.render_window(Some(timeline.settings.initial_window));
        // The full query replaces the first window without waiting for the load.
        let first_flush = timeline.debouncer.schedule(Message::RowsFlush);

        let task = Task::batch(vec![
            first_flush,
            timeline.guarded({
                let api = timeline.api.clone();
                let room_id = timeline.room_id.clone();
                async move {
                    let result = api.load_messages_for_room(&room_id, None).await;
                    Message::InitialLoadFinished(result.map_err(|e| e.to_string()))
                }
            }),
            timeline.guarded({
                let stale_after = timeline.settings.stale_after();
                async move {
                    tokio::time::sleep(stale_after).await;
                    Message::StaleTimerElapsed
                }
            }),
            timeline.guarded({
                let api = timeline.api.clone();
                let room_id = timeline.room_id.clone();
                async move {
                    let result = api.read_messages(&room_id).await;
                    Message::MarkedRead(result.map_err(|e| e.to_string()))
                }
            }),
        ]);
        Ok((timeline, task))
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reached_start(&self) -> bool {
        self.reached_start
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn is_mounted(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    /// Messages behind the current rows, newest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of times the rows were re-derived.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn view(&self) -> TimelineView<'_> {
        let header = if self.phase == Phase::LoadingMore {
            Some("Loading more messages...")
        } else if self.reached_start {
            Some("Start of conversation")
        } else {
            None
        };
        TimelineView {
            banner: self.stale.then_some("Loading new messages..."),
            header,
            rows: &self.items,
            footer: if self.joined {
                Footer::Composer(&self.composer)
            } else {
                Footer::Preview {
                    joining: self.joining,
                }
            },
        }
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        // Results that land after unmount are dropped here.
        if self.token.is_cancelled() {
            return Task::none();
        }

        match message {
            Message::None => {}

            // -- Initial load --
            Message::StaleTimerElapsed => {
                if self.phase == Phase::Initial {
                    tracing::debug!("Initial load of {} is slow", self.room_id);
                    self.stale = true;
                }
            }
            Message::InitialLoadFinished(result) => {
                if self.phase != Phase::Initial {
                    return Task::none();
                }
                if let Err(e) = result {
                    tracing::error!("Failed to load messages for {}: {e}", self.room_id);
                }
                self.stale = false;
                self.phase = Phase::Loaded;
                return self.attach_listener();
            }
            Message::MarkedRead(result) => {
                if let Err(e) = result {
                    tracing::warn!("Failed to mark {} read: {e}", self.room_id);
                }
            }

            // -- Live query --
            Message::StoreChanged => {
                return self.debouncer.schedule(Message::RowsFlush);
            }
            Message::RowsFlush(generation) => {
                if self.debouncer.fire(generation) {
                    self.render_window(None);
                }
            }

            // -- Pagination --
            Message::EndReached => return self.end_reached(),
            Message::OlderLoaded(result) => {
                if self.phase == Phase::LoadingMore {
                    self.phase = Phase::Loaded;
                }
                match result {
                    Ok(outcome) => self.reached_start = outcome.end,
                    Err(e) => tracing::error!("Failed to load history for {}: {e}", self.room_id),
                }
            }

            // -- Composer --
            Message::ComposerChanged(text) => self.composer.text = text,
            Message::SendMessage => return self.submit(),
            Message::MessageSent => self.composer.sending = false,
            Message::SendError(e) => {
                self.composer.sending = false;
                tracing::error!("Send failed: {e}");
            }
            Message::ReplyTo { message, mention } => {
                self.composer.mode = ComposerMode::Reply {
                    message_id: message.id.clone(),
                    sender: message
                        .author
                        .as_ref()
                        .map(|a| a.username.clone())
                        .unwrap_or_else(|| "unknown".to_owned()),
                    preview: message.body.clone(),
                    mention,
                };
            }
            Message::EditMessage(message) => {
                self.composer.text = message.body.clone();
                self.composer.mode = ComposerMode::Edit {
                    message_id: message.id,
                };
            }
            Message::CancelComposerMode => {
                if matches!(self.composer.mode, ComposerMode::Edit { .. }) {
                    self.composer.text.clear();
                }
                self.composer.mode = ComposerMode::Message;
            }

            // -- Preview mode --
            Message::JoinRoom => {
                if self.joined || self.joining {
                    return Task::none();
                }
                self.joining = true;
                let api = self.api.clone();
                let room_id = self.room_id.clone();
                return self.guarded(async move {
                    Message::JoinResult(api.join_room(&room_id).await.map_err(|e| e.to_string()))
                });
            }
            Message::JoinResult(result) => {
                self.joining = false;
                match result {
                    Ok(()) => {
                        tracing::info!("Joined {}", self.room_id);
                        self.joined = true;
                    }
                    Err(e) => tracing::error!("Failed to join {}: {e}", self.room_id),
                }
            }

            // Handled by the host screen.
            Message::Navigate(_) | Message::PickReaction(_) => {}
        }

        Task::none()
    }

    /// Detach from the store and drop every pending effect. Idempotent.
    pub fn unmount(&mut self) {
        if self.token.is_cancelled() {
            return;
        }
        tracing::info!("Unmounting timeline for {}", self.room_id);
        self.token.cancel();
        self.debouncer.cancel();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    fn guarded(&self, fut: impl std::future::Future<Output = Message> + Send + 'static) -> Task<Message> {
        Task::guarded(&self.token, Message::None, fut)
    }

    fn attach_listener(&mut self) -> Task<Message> {
        let (changes, handle) = futures::stream::abortable(self.db.watch_room(&self.room_id));
        self.listener = Some(handle);
        let token = self.token.clone();
        let changes = changes
            .take_until(async move { token.cancelled_owned().await })
            .map(|()| Message::StoreChanged);
        // Whatever arrived while loading gets picked up by one flush.
        Task::batch(vec![
            Task::stream(changes),
            self.debouncer.schedule(Message::RowsFlush),
        ])
    }

    fn end_reached(&mut self) -> Task<Message> {
        if self.phase != Phase::Loaded || self.messages.is_empty() || self.reached_start {
            return Task::none();
        }
        let Some(oldest) = self.messages.iter().rev().find_map(|m| m.ts) else {
            return Task::none();
        };
        tracing::debug!("Loading {} history before {oldest}", self.room_id);
        self.phase = Phase::LoadingMore;
        let api = self.api.clone();
        let room_id = self.room_id.clone();
        self.guarded(async move {
            let result = api.load_messages_for_room(&room_id, Some(oldest)).await;
            Message::OlderLoaded(result.map_err(|e| e.to_string()))
        })
    }

    fn submit(&mut self) -> Task<Message> {
        if !self.joined || self.composer.sending {
            return Task::none();
        }
        let text = self.composer.text.trim().to_string();
        if text.is_empty() {
            return Task::none();
        }

        let mode = std::mem::replace(&mut self.composer.mode, ComposerMode::Message);
        self.composer.text.clear();
        self.composer.sending = true;

        let api = self.api.clone();
        let room_id = self.room_id.clone();
        self.guarded(async move {
            let result = match mode {
                ComposerMode::Message => api.send_message(&room_id, &text).await,
                ComposerMode::Reply {
                    sender,
                    preview,
                    mention,
                    ..
                } => {
                    let mention = if mention {
                        format!("@{sender} ")
                    } else {
                        String::new()
                    };
                    let body = format!("{}{mention}{text}", quote_fallback(&sender, &preview));
                    api.send_message(&room_id, &body).await
                }
                ComposerMode::Edit { message_id } => {
                    api.edit_message(&message_id, &room_id, &text).await
                }
            };
            match result {
                Ok(()) => Message::MessageSent,
                Err(e) => Message::SendError(e.to_string()),
            }
        })
    }

    /// Re-derive rows from the live query, optionally capped to `limit` rows.
    fn render_window(&mut self, limit: Option<usize>) {
        let mut messages = match self.db.room_messages(&self.room_id) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("Failed to query {}: {e}", self.room_id);
                return;
            }
        };
        if let Some(limit) = limit {
            messages.truncate(limit);
        }
        match self.db.room(&self.room_id) {
            Ok(Some(room)) => self.room = Some(room),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to refresh room {}: {e}", self.room_id),
        }
        let language = self
            .room
            .as_ref()
            .filter(|r| r.auto_translate)
            .and_then(|r| r.auto_translate_language.as_deref());
        self.items = build_rows(&messages, language);
        self.messages = messages;
        self.renders += 1;
    }
}

impl Drop for RoomTimeline {
    fn drop(&mut self) {
        self.unmount();
    }
}
