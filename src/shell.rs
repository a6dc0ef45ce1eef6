//! Contract between the controllers and whatever draws them.

use async_trait::async_trait;

use crate::actions::options::{ActionOptions, MessageAction};
use crate::model::{ChatMessage, Room};

/// Navigation targets reachable from the controllers.
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    RoomsList,
    CreateDiscussion { message: ChatMessage, room: Room },
    ReadReceipts { message_id: String },
}

impl Route {
    pub fn screen_name(&self) -> &'static str {
        match self {
            Route::RoomsList => "RoomsListView",
            Route::CreateDiscussion { .. } => "CreateDiscussionView",
            Route::ReadReceipts { .. } => "ReadReceiptsView",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Haptic {
    LightImpact,
}

/// Everything the user is shown when the menu opens.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionSheet {
    pub options: ActionOptions,
    /// Reaction shortcuts rendered in the sheet header.
    pub reactions: Vec<String>,
}

/// What the user picked from an `ActionSheet`.
#[derive(Clone, Debug, PartialEq)]
pub enum SheetChoice {
    Action(MessageAction),
    /// One of the header reaction shortcuts.
    React(String),
    /// The header's "more reactions" affordance.
    OpenReactionPicker,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Confirmation {
    pub message: String,
    pub call_to_action: String,
}

#[async_trait]
pub trait Shell: Send + Sync {
    /// Put the sheet on screen.
    fn show(&self, sheet: &ActionSheet);

    /// Wait for the user's pick from the sheet on screen.
    async fn choice(&self, sheet: &ActionSheet) -> SheetChoice;

    /// Destructive confirmation prompt. `true` only on explicit confirm.
    async fn confirm(&self, prompt: Confirmation) -> bool;

    fn haptic(&self, feedback: Haptic);

    fn set_clipboard(&self, text: &str);

    fn toast(&self, text: &str);

    fn share(&self, text: &str);

    fn alert(&self, text: &str);

    fn navigate(&self, route: Route);

    /// Open the composer replying to `message`. `mention` is false for quotes.
    fn reply_init(&self, message: &ChatMessage, mention: bool);

    fn edit_init(&self, message: &ChatMessage);

    fn reaction_init(&self, message: &ChatMessage);

    /// The menu is gone, whatever was chosen.
    fn dismiss(&self);
}
