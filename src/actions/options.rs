use crate::actions::policy::Eligibility;
use crate::model::ChatMessage;

/// Every operation the message menu can offer. Dispatch is by key, so the
/// order of the sheet can change without touching the handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageAction {
    Reply,
    Edit,
    CreateDiscussion,
    MarkUnread,
    Permalink,
    Copy,
    Share,
    Quote,
    Star,
    Pin,
    AddReaction,
    ReadReceipts,
    ToggleTranslation,
    Report,
    Delete,
}

impl MessageAction {
    pub fn label(self, message: &ChatMessage) -> &'static str {
        match self {
            MessageAction::Reply => "Reply",
            MessageAction::Edit => "Edit",
            MessageAction::CreateDiscussion => "Create Discussion",
            MessageAction::MarkUnread => "Mark unread",
            MessageAction::Permalink => "Permalink",
            MessageAction::Copy => "Copy",
            MessageAction::Share => "Share",
            MessageAction::Quote => "Quote",
            MessageAction::Star if message.starred => "Unstar",
            MessageAction::Star => "Star",
            MessageAction::Pin if message.pinned => "Unpin",
            MessageAction::Pin => "Pin",
            MessageAction::AddReaction => "Add Reaction",
            MessageAction::ReadReceipts => "Read Receipt",
            MessageAction::ToggleTranslation if message.auto_translate => "View Original",
            MessageAction::ToggleTranslation => "Translate",
            MessageAction::Report => "Report",
            MessageAction::Delete => "Delete",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            MessageAction::Reply => "reply",
            MessageAction::Edit => "edit",
            MessageAction::CreateDiscussion => "discussion",
            MessageAction::MarkUnread => "flag",
            MessageAction::Permalink => "permalink",
            MessageAction::Copy => "copy",
            MessageAction::Share => "share",
            MessageAction::Quote => "quote",
            MessageAction::Star => "star",
            MessageAction::Pin => "pin",
            MessageAction::AddReaction => "add-reaction",
            MessageAction::ReadReceipts => "receipt",
            MessageAction::ToggleTranslation => "translate",
            MessageAction::Report => "report",
            MessageAction::Delete => "trash",
        }
    }

    pub fn is_danger(self) -> bool {
        matches!(self, MessageAction::Report | MessageAction::Delete)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActionOption {
    pub action: MessageAction,
    pub label: &'static str,
    pub icon: &'static str,
    pub danger: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionOptions(Vec<ActionOption>);

impl ActionOptions {
    /// Assemble the permitted actions in display order.
    pub fn build(e: &Eligibility<'_>) -> Self {
        let message = e.message;
        let room = e.room;
        let read_only = room.read_only;
        let from_other = message.is_from_other(e.user);
        let settings = e.settings;

        let candidates = [
            (MessageAction::Reply, !read_only),
            (MessageAction::Edit, e.allow_edit()),
            (MessageAction::CreateDiscussion, true),
            (MessageAction::MarkUnread, from_other),
            (MessageAction::Permalink, true),
            (MessageAction::Copy, true),
            (MessageAction::Share, true),
            (MessageAction::Quote, !read_only),
            (MessageAction::Star, settings.allow_starring),
            (MessageAction::Pin, settings.allow_pinning),
            (
                MessageAction::AddReaction,
                !read_only || room.react_when_read_only,
            ),
            (MessageAction::ReadReceipts, settings.read_receipt_store_users),
            (
                MessageAction::ToggleTranslation,
                room.auto_translate && from_other,
            ),
            (MessageAction::Report, true),
            (MessageAction::Delete, e.allow_delete()),
        ];

        Self(
            candidates
                .into_iter()
                .filter(|(_, enabled)| *enabled)
                .map(|(action, _)| ActionOption {
                    action,
                    label: action.label(message),
                    icon: action.icon(),
                    danger: action.is_danger(),
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionOption> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, action: MessageAction) -> bool {
        self.0.iter().any(|o| o.action == action)
    }

    pub fn actions(&self) -> Vec<MessageAction> {
        self.0.iter().map(|o| o.action).collect()
    }

    /// Map a positional choice from a shell back to its key. Negative means cancelled.
    pub fn action_at(&self, index: isize) -> Option<MessageAction> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.0.get(i))
            .map(|o| o.action)
    }
}
