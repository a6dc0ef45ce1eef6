use crate::api::LoadOutcome;
use crate::model::ChatMessage;
use crate::shell::Route;

// ---- Core screen messages ----

#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    // -- Lifecycle --
    None,

    // -- Initial load --
    InitialLoadFinished(Result<LoadOutcome, String>),
    StaleTimerElapsed,
    MarkedRead(Result<(), String>),

    // -- Live query --
    StoreChanged,
    RowsFlush(u64),

    // -- Pagination --
    EndReached,
    OlderLoaded(Result<LoadOutcome, String>),

    // -- Composer --
    ComposerChanged(String),
    SendMessage,
    MessageSent,
    SendError(String),
    ReplyTo { message: ChatMessage, mention: bool },
    EditMessage(ChatMessage),
    CancelComposerMode,

    // -- Preview mode --
    JoinRoom,
    JoinResult(Result<(), String>),

    // -- Requests for the host screen --
    Navigate(Route),
    PickReaction(ChatMessage),
}

// ---- Rendered rows ----

#[derive(Clone, Debug, PartialEq)]
pub enum TimelineItem {
    Message(TimelineMessage),
    DateSeparator(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimelineMessage {
    pub id: String,
    pub sender: String,
    pub sender_display: String,
    /// Body text, translated when the message asks for it and a translation is cached.
    pub body: String,
    pub timestamp: String,
    /// Same sender as the chronologically previous message.
    pub is_continuation: bool,
    pub reply_to_sender: Option<String>,
    pub reply_to_body: Option<String>,
    pub edited: bool,
    pub starred: bool,
    pub pinned: bool,
}
