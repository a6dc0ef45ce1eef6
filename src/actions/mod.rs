//! Contextual action menu for a single message.

pub mod options;
pub mod policy;
pub mod reactions;

use std::sync::Arc;

use chrono::Utc;

use crate::api::ChatApi;
use crate::config::ServerSettings;
use crate::model::{ChatMessage, PartialMessage, Room, User};
use crate::shell::{ActionSheet, Confirmation, Haptic, Route, SheetChoice, Shell};
use crate::store::Database;

use self::options::{ActionOptions, MessageAction};
use self::policy::{Eligibility, PermissionSet};
use self::reactions::frequent_reactions;

/// Everything one menu invocation needs to know.
#[derive(Clone, Debug)]
pub struct MenuContext {
    pub message: ChatMessage,
    pub room: Room,
    pub user: User,
    pub settings: ServerSettings,
    /// Thread root currently open, when the menu is shown inside a thread.
    pub thread_id: Option<String>,
}

#[derive(Clone)]
pub struct ActionMenu {
    api: Arc<dyn ChatApi>,
    db: Database,
    shell: Arc<dyn Shell>,
}

impl ActionMenu {
    pub fn new(api: Arc<dyn ChatApi>, db: Database, shell: Arc<dyn Shell>) -> Self {
        Self { api, db, shell }
    }

    /// Permissions, then options, then display; resolves once the chosen
    /// handler has finished and the menu was dismissed.
    pub async fn present(&self, ctx: MenuContext) {
        let sheet = self.prepare(&ctx).await;
        let offered = sheet.options.clone();

        // Let the caller's current render commit before the sheet appears.
        tokio::task::yield_now().await;
        self.shell.show(&sheet);
        self.shell.haptic(Haptic::LightImpact);
        let choice = self.shell.choice(&sheet).await;

        self.handle_choice(&ctx, &offered, choice).await;
        self.shell.dismiss();
    }

    /// Build the sheet without showing it.
    pub async fn prepare(&self, ctx: &MenuContext) -> ActionSheet {
        let permissions = PermissionSet::fetch(self.api.as_ref(), &ctx.room.id).await;
        let options = ActionOptions::build(&Eligibility {
            message: &ctx.message,
            room: &ctx.room,
            user: &ctx.user,
            settings: &ctx.settings,
            permissions,
            thread_id: ctx.thread_id.as_deref(),
            now: Utc::now(),
        });
        tracing::debug!(
            "Menu for {} offers {} actions",
            ctx.message.id,
            options.len()
        );
        ActionSheet {
            options,
            reactions: frequent_reactions(self.db.frequently_used_emojis()),
        }
    }

    async fn handle_choice(&self, ctx: &MenuContext, offered: &ActionOptions, choice: SheetChoice) {
        match choice {
            SheetChoice::Action(action) if offered.contains(action) => {
                self.dispatch(ctx, action).await;
            }
            SheetChoice::Action(action) => {
                tracing::warn!("Ignoring {action:?}, it was not offered for {}", ctx.message.id);
            }
            SheetChoice::React(emoji) => self.react(&ctx.message, &emoji).await,
            SheetChoice::OpenReactionPicker => self.shell.reaction_init(&ctx.message),
            SheetChoice::Cancelled => {}
        }
    }

    pub async fn dispatch(&self, ctx: &MenuContext, action: MessageAction) {
        let message = &ctx.message;
        tracing::debug!("Action {action:?} on {}", message.id);
        match action {
            MessageAction::Reply => self.shell.reply_init(message, true),
            MessageAction::Quote => self.shell.reply_init(message, false),
            MessageAction::Edit => self.shell.edit_init(message),
            MessageAction::AddReaction => self.shell.reaction_init(message),
            MessageAction::MarkUnread => self.mark_unread(message, &ctx.room).await,
            MessageAction::Permalink => self.copy_permalink(message).await,
            MessageAction::Copy => {
                self.shell.set_clipboard(&message.body);
                self.shell.toast("Copied to clipboard!");
            }
            MessageAction::Share => {
                if let Some(permalink) = self.permalink(message).await {
                    self.shell.share(&permalink);
                }
            }
            MessageAction::Star => self.toggle_star(message).await,
            MessageAction::Pin => {
                if let Err(e) = self.api.toggle_pin_message(&message.id, message.pinned).await {
                    tracing::error!("Failed to toggle pin on {}: {e}", message.id);
                }
            }
            MessageAction::ReadReceipts => self.shell.navigate(Route::ReadReceipts {
                message_id: message.id.clone(),
            }),
            MessageAction::ToggleTranslation => self.toggle_translation(message, &ctx.room).await,
            MessageAction::Report => match self.api.report_message(&message.id).await {
                Ok(()) => self.shell.alert("Message reported"),
                Err(e) => tracing::error!("Failed to report {}: {e}", message.id),
            },
            MessageAction::Delete => self.delete(message).await,
            MessageAction::CreateDiscussion => self.shell.navigate(Route::CreateDiscussion {
                message: message.clone(),
                room: ctx.room.clone(),
            }),
        }
    }

    async fn permalink(&self, message: &ChatMessage) -> Option<String> {
        match self.api.get_permalink_message(message).await {
            Ok(link) => Some(link),
            Err(e) => {
                tracing::debug!("No permalink for {}: {e}", message.id);
                None
            }
        }
    }

    async fn copy_permalink(&self, message: &ChatMessage) {
        let permalink = self.permalink(message).await.unwrap_or_default();
        self.shell.set_clipboard(&permalink);
        self.shell.toast("Permalink copied to clipboard!");
    }

    async fn mark_unread(&self, message: &ChatMessage, room: &Room) {
        match self.api.mark_as_unread(&message.id).await {
            Ok(true) => {
                let last_open = message.ts;
                let updated = self.db.write(|t| {
                    t.update_subscription_for_room(&room.id, |sub| sub.last_open = last_open)
                });
                if let Err(e) = updated {
                    tracing::debug!("Subscription for {} not updated: {e}", room.id);
                }
                self.shell.navigate(Route::RoomsList);
            }
            Ok(false) => tracing::warn!("Server refused to mark {} unread", message.id),
            Err(e) => tracing::error!("Failed to mark {} unread: {e}", message.id),
        }
    }

    async fn toggle_star(&self, message: &ChatMessage) {
        match self.api.toggle_star_message(&message.id, message.starred).await {
            Ok(()) => self.shell.toast(if message.starred {
                "Message unstarred"
            } else {
                "Message starred"
            }),
            Err(e) => tracing::error!("Failed to toggle star on {}: {e}", message.id),
        }
    }

    async fn toggle_translation(&self, message: &ChatMessage, room: &Room) {
        let now = Utc::now();
        let flipped = self.db.write(|t| {
            t.update_message(&message.id, |m| {
                m.auto_translate = !m.auto_translate;
                m.updated_at = Some(now);
            })
        });
        if let Err(e) = flipped {
            tracing::error!("Failed to toggle translation on {}: {e}", message.id);
            return;
        }
        let Some(language) = room.auto_translate_language.as_deref() else {
            tracing::debug!("Room {} has no translation language", room.id);
            return;
        };
        if message.translation(language).is_none() {
            let partial = PartialMessage::from(message);
            if let Err(e) = self.api.translate_message(&partial, language).await {
                tracing::error!("Failed to translate {}: {e}", message.id);
            }
        }
    }

    async fn delete(&self, message: &ChatMessage) {
        let confirmed = self
            .shell
            .confirm(Confirmation {
                message: "You will not be able to recover this message!".to_owned(),
                call_to_action: "Delete".to_owned(),
            })
            .await;
        if !confirmed {
            return;
        }
        if let Err(e) = self.api.delete_message(&message.id, &message.room_id).await {
            tracing::error!("Failed to delete {}: {e}", message.id);
        }
    }

    /// Send a reaction and count the emoji towards the frequently used list.
    pub async fn react(&self, message: &ChatMessage, emoji: &str) {
        match self.api.set_reaction(emoji, &message.id).await {
            Ok(()) => {
                if let Err(e) = self.db.write(|t| {
                    t.record_emoji_use(emoji);
                    Ok(())
                }) {
                    tracing::debug!("Emoji use not recorded: {e}");
                }
            }
            Err(e) => tracing::error!("Failed to react to {}: {e}", message.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{Call, MockApi};
    use crate::model::{Subscription, UserRef};
    use crate::shell::mock::{MockShell, ShellCall};
    use chrono::Duration;
    use std::collections::HashMap;

    fn ctx(author: &str) -> MenuContext {
        MenuContext {
            message: ChatMessage {
                id: "m1".into(),
                room_id: "r1".into(),
                author: Some(UserRef {
                    id: author.into(),
                    username: author.into(),
                }),
                ts: Some(Utc::now() - Duration::minutes(3)),
                body: "hello there".into(),
                ..Default::default()
            },
            room: Room {
                id: "r1".into(),
                name: "general".into(),
                ..Default::default()
            },
            user: User {
                id: "me".into(),
                username: "me".into(),
            },
            settings: ServerSettings::default(),
            thread_id: None,
        }
    }

    fn setup(
        api: MockApi,
        db: Database,
        shell: MockShell,
    ) -> (ActionMenu, Arc<MockApi>, Arc<MockShell>) {
        let api = Arc::new(api);
        let shell = Arc::new(shell);
        let menu = ActionMenu::new(api.clone(), db, shell.clone());
        (menu, api, shell)
    }

    #[tokio::test]
    async fn cancel_dispatches_nothing_but_dismisses() {
        let (menu, api, shell) = setup(
            MockApi::default(),
            Database::new(),
            MockShell::choosing(SheetChoice::Cancelled),
        );
        menu.present(ctx("me")).await;

        assert_eq!(api.calls(), vec![Call::HasPermission("r1".into())]);
        let calls = shell.calls();
        assert!(matches!(calls[0], ShellCall::Present(_)));
        assert_eq!(calls[1], ShellCall::Haptic(Haptic::LightImpact));
        assert_eq!(calls.last(), Some(&ShellCall::Dismiss));
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn sheet_carries_permissions_and_reactions() {
        let db = Database::new();
        db.write(|t| {
            t.record_emoji_use("tada");
            Ok(())
        })
        .unwrap();
        let api = MockApi {
            permissions: Some(HashMap::from([("delete-message".to_owned(), true)])),
            ..Default::default()
        };
        let (menu, _api, shell) = setup(api, db, MockShell::choosing(SheetChoice::Cancelled));
        menu.present(ctx("other")).await;

        let sheet = shell.presented().unwrap();
        assert!(sheet.options.contains(MessageAction::Delete));
        assert!(!sheet.options.contains(MessageAction::Edit));
        assert_eq!(sheet.reactions.len(), 6);
        assert_eq!(sheet.reactions[0], "tada");
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let mut shell = MockShell::choosing(SheetChoice::Action(MessageAction::Delete));
        shell.confirm = false;
        let (menu, api, shell) = setup(MockApi::default(), Database::new(), shell);
        menu.present(ctx("me")).await;
        assert!(!api.calls().iter().any(|c| matches!(c, Call::Delete { .. })));
        assert!(shell.calls().iter().any(|c| matches!(c, ShellCall::Confirm(_))));

        let (menu, api, _shell) = menu_with_confirm();
        menu.present(ctx("me")).await;
        assert!(api.calls().contains(&Call::Delete {
            message_id: "m1".into(),
            room_id: "r1".into(),
        }));
    }

    fn menu_with_confirm() -> (ActionMenu, Arc<MockApi>, Arc<MockShell>) {
        setup(
            MockApi::default(),
            Database::new(),
            MockShell::choosing(SheetChoice::Action(MessageAction::Delete)),
        )
    }

    #[tokio::test]
    async fn reply_and_quote_differ_only_in_mention() {
        for (action, mention) in [(MessageAction::Reply, true), (MessageAction::Quote, false)] {
            let (menu, _api, shell) = setup(
                MockApi::default(),
                Database::new(),
                MockShell::choosing(SheetChoice::Action(action)),
            );
            menu.present(ctx("other")).await;
            assert!(shell.calls().contains(&ShellCall::ReplyInit {
                message_id: "m1".into(),
                mention,
            }));
        }
    }

    #[tokio::test]
    async fn share_without_permalink_is_a_no_op() {
        let (menu, _api, shell) = setup(
            MockApi::default(),
            Database::new(),
            MockShell::choosing(SheetChoice::Action(MessageAction::Share)),
        );
        menu.present(ctx("other")).await;
        assert!(!shell.calls().iter().any(|c| matches!(c, ShellCall::Share(_))));

        let api = MockApi {
            permalink: Some("https://chat.example/r1?msg=m1".into()),
            ..Default::default()
        };
        let (menu, _api, shell) = setup(
            api,
            Database::new(),
            MockShell::choosing(SheetChoice::Action(MessageAction::Share)),
        );
        menu.present(ctx("other")).await;
        assert!(shell
            .calls()
            .contains(&ShellCall::Share("https://chat.example/r1?msg=m1".into())));
    }

    #[tokio::test]
    async fn permalink_failure_copies_empty_text() {
        let (menu, _api, shell) = setup(
            MockApi::default(),
            Database::new(),
            MockShell::choosing(SheetChoice::Action(MessageAction::Permalink)),
        );
        menu.present(ctx("other")).await;
        let calls = shell.calls();
        assert!(calls.contains(&ShellCall::Clipboard(String::new())));
        assert!(calls.contains(&ShellCall::Toast("Permalink copied to clipboard!".into())));
    }

    #[tokio::test]
    async fn copy_puts_body_on_clipboard() {
        let (menu, _api, shell) = setup(
            MockApi::default(),
            Database::new(),
            MockShell::choosing(SheetChoice::Action(MessageAction::Copy)),
        );
        menu.present(ctx("other")).await;
        assert!(shell.calls().contains(&ShellCall::Clipboard("hello there".into())));
    }

    #[tokio::test]
    async fn mark_unread_moves_last_open_and_leaves_room() {
        let db = Database::new();
        db.write(|t| {
            t.upsert_subscription(Subscription {
                id: "s1".into(),
                room_id: "r1".into(),
                name: "general".into(),
                last_open: Some(Utc::now()),
            });
            Ok(())
        })
        .unwrap();
        let api = MockApi {
            mark_unread_success: true,
            ..Default::default()
        };
        let (menu, _api, shell) = setup(
            api,
            db.clone(),
            MockShell::choosing(SheetChoice::Action(MessageAction::MarkUnread)),
        );
        let ctx = ctx("other");
        let ts = ctx.message.ts;
        menu.present(ctx).await;

        assert_eq!(db.subscription("s1").unwrap().unwrap().last_open, ts);
        assert!(shell.calls().contains(&ShellCall::Navigate(Route::RoomsList)));
    }

    #[tokio::test]
    async fn failed_star_shows_no_toast() {
        let api = MockApi {
            fail_actions: true,
            ..Default::default()
        };
        let (menu, api, shell) = setup(
            api,
            Database::new(),
            MockShell::choosing(SheetChoice::Action(MessageAction::Star)),
        );
        menu.present(ctx("other")).await;
        assert!(api.calls().contains(&Call::ToggleStar("m1".into(), false)));
        assert!(!shell.calls().iter().any(|c| matches!(c, ShellCall::Toast(_))));
        assert_eq!(shell.calls().last(), Some(&ShellCall::Dismiss));
    }

    #[tokio::test]
    async fn action_not_on_the_sheet_is_ignored() {
        let (menu, _api, shell) = setup(
            MockApi::default(),
            Database::new(),
            MockShell::choosing(SheetChoice::Action(MessageAction::ReadReceipts)),
        );
        menu.present(ctx("other")).await;
        assert!(!shell.calls().iter().any(|c| matches!(c, ShellCall::Navigate(_))));
        assert_eq!(shell.calls().last(), Some(&ShellCall::Dismiss));
    }

    #[tokio::test]
    async fn report_success_alerts() {
        let (menu, _api, shell) = setup(
            MockApi::default(),
            Database::new(),
            MockShell::choosing(SheetChoice::Action(MessageAction::Report)),
        );
        menu.present(ctx("other")).await;
        assert!(shell.calls().contains(&ShellCall::Alert("Message reported".into())));
    }

    #[tokio::test]
    async fn translation_toggle_requests_missing_translation() {
        let db = Database::new();
        let mut ctx = ctx("other");
        ctx.room.auto_translate = true;
        ctx.room.auto_translate_language = Some("de".into());
        db.write(|t| {
            t.upsert_message(ctx.message.clone());
            Ok(())
        })
        .unwrap();
        let (menu, api, _shell) = setup(
            MockApi::default(),
            db.clone(),
            MockShell::choosing(SheetChoice::Action(MessageAction::ToggleTranslation)),
        );
        menu.present(ctx.clone()).await;

        let stored = db.message("m1").unwrap().unwrap();
        assert!(stored.auto_translate);
        assert!(stored.updated_at.is_some());
        assert!(api.calls().contains(&Call::Translate("m1".into(), "de".into())));

        // Cached translation: flip only.
        ctx.message.translations.insert("de".into(), "hallo".into());
        let (menu, api, _shell) = setup(
            MockApi::default(),
            db.clone(),
            MockShell::choosing(SheetChoice::Action(MessageAction::ToggleTranslation)),
        );
        menu.present(ctx).await;
        assert!(!db.message("m1").unwrap().unwrap().auto_translate);
        assert!(!api.calls().iter().any(|c| matches!(c, Call::Translate(..))));
    }

    #[tokio::test]
    async fn header_reaction_is_sent_and_counted() {
        let db = Database::new();
        let (menu, api, _shell) = setup(
            MockApi::default(),
            db.clone(),
            MockShell::choosing(SheetChoice::React("rocket".into())),
        );
        menu.present(ctx("other")).await;
        assert!(api
            .calls()
            .contains(&Call::SetReaction("rocket".into(), "m1".into())));
        assert_eq!(db.frequently_used_emojis().unwrap(), vec!["rocket"]);
    }

    #[tokio::test]
    async fn discussion_and_receipts_navigate() {
        let (menu, _api, shell) = setup(
            MockApi::default(),
            Database::new(),
            MockShell::choosing(SheetChoice::Action(MessageAction::ReadReceipts)),
        );
        let mut with_receipts = ctx("other");
        with_receipts.settings.read_receipt_store_users = true;
        menu.present(with_receipts).await;
        assert!(shell.calls().contains(&ShellCall::Navigate(Route::ReadReceipts {
            message_id: "m1".into(),
        })));

        let (menu, _api, shell) = setup(
            MockApi::default(),
            Database::new(),
            MockShell::choosing(SheetChoice::Action(MessageAction::CreateDiscussion)),
        );
        let ctx = ctx("other");
        menu.present(ctx.clone()).await;
        assert!(shell.calls().contains(&ShellCall::Navigate(Route::CreateDiscussion {
            message: ctx.message,
            room: ctx.room,
        })));
    }
}
