//! Edit/delete eligibility.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::api::{
    ChatApi, PERMISSION_DELETE_MESSAGE, PERMISSION_EDIT_MESSAGE, PERMISSION_FORCE_DELETE_MESSAGE,
};
use crate::config::ServerSettings;
use crate::model::{ChatMessage, Room, User};

/// Room-scoped privileges of the current user, fetched once per menu.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PermissionSet {
    pub edit_any: bool,
    pub delete_any: bool,
    pub force_delete_any: bool,
}

impl PermissionSet {
    fn from_map(map: &HashMap<String, bool>) -> Self {
        let has = |name: &str| map.get(name).copied().unwrap_or(false);
        Self {
            edit_any: has(PERMISSION_EDIT_MESSAGE),
            delete_any: has(PERMISSION_DELETE_MESSAGE),
            force_delete_any: has(PERMISSION_FORCE_DELETE_MESSAGE),
        }
    }

    /// A failed lookup degrades to no privileges.
    pub async fn fetch(api: &dyn ChatApi, room_id: &str) -> Self {
        let names = [
            PERMISSION_EDIT_MESSAGE,
            PERMISSION_DELETE_MESSAGE,
            PERMISSION_FORCE_DELETE_MESSAGE,
        ];
        match api.has_permission(&names, room_id).await {
            Ok(map) => Self::from_map(&map),
            Err(e) => {
                tracing::warn!("Permission lookup for {room_id} failed: {e}");
                Self::default()
            }
        }
    }
}

/// The inputs every eligibility decision looks at.
#[derive(Clone, Copy, Debug)]
pub struct Eligibility<'a> {
    pub message: &'a ChatMessage,
    pub room: &'a Room,
    pub user: &'a User,
    pub settings: &'a ServerSettings,
    pub permissions: PermissionSet,
    /// Thread root currently open, when the menu is shown inside a thread.
    pub thread_id: Option<&'a str>,
    pub now: DateTime<Utc>,
}

impl Eligibility<'_> {
    pub fn allow_edit(&self) -> bool {
        if self.room.read_only {
            return false;
        }
        let own = self.message.is_authored_by(self.user);
        if !(self.permissions.edit_any || (self.settings.allow_editing && own)) {
            return false;
        }
        within_block_window(self.message.ts, self.settings.block_edit_in_minutes, self.now)
    }

    pub fn allow_delete(&self) -> bool {
        if self.room.read_only {
            return false;
        }
        // Thread root while viewing that same thread.
        if self.thread_id == Some(self.message.id.as_str()) {
            return false;
        }
        let own = self.message.is_authored_by(self.user);
        let perms = self.permissions;
        if !(perms.delete_any || (self.settings.allow_deleting && own) || perms.force_delete_any) {
            return false;
        }
        if perms.force_delete_any {
            return true;
        }
        within_block_window(self.message.ts, self.settings.block_delete_in_minutes, self.now)
    }
}

/// Whole minutes elapsed since `ts` must be strictly below `block_minutes`.
/// No window (`None` or 0) always passes; an undated message never does.
pub fn within_block_window(
    ts: Option<DateTime<Utc>>,
    block_minutes: Option<u32>,
    now: DateTime<Utc>,
) -> bool {
    match block_minutes {
        None | Some(0) => true,
        Some(limit) => match ts {
            Some(ts) => (now - ts).num_minutes() < i64::from(limit),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserRef;
    use chrono::Duration;

    fn me() -> User {
        User {
            id: "u1".into(),
            username: "me".into(),
        }
    }

    fn own_message(minutes_ago: i64) -> ChatMessage {
        ChatMessage {
            id: "m1".into(),
            room_id: "r1".into(),
            author: Some(UserRef {
                id: "u1".into(),
                username: "me".into(),
            }),
            ts: Some(Utc::now() - Duration::minutes(minutes_ago)),
            body: "hi".into(),
            ..Default::default()
        }
    }

    fn room(read_only: bool) -> Room {
        Room {
            id: "r1".into(),
            read_only,
            ..Default::default()
        }
    }

    fn check<'a>(
        message: &'a ChatMessage,
        room: &'a Room,
        user: &'a User,
        settings: &'a ServerSettings,
        permissions: PermissionSet,
    ) -> Eligibility<'a> {
        Eligibility {
            message,
            room,
            user,
            settings,
            permissions,
            thread_id: None,
            now: Utc::now(),
        }
    }

    #[test]
    fn read_only_room_never_allows_edit_or_delete() {
        let user = me();
        let msg = own_message(0);
        let room = room(true);
        let all = PermissionSet {
            edit_any: true,
            delete_any: true,
            force_delete_any: true,
        };
        for allow in [false, true] {
            let settings = ServerSettings {
                allow_editing: allow,
                allow_deleting: allow,
                ..Default::default()
            };
            for perms in [PermissionSet::default(), all] {
                let e = check(&msg, &room, &user, &settings, perms);
                assert!(!e.allow_edit());
                assert!(!e.allow_delete());
            }
        }
    }

    #[test]
    fn edit_window_expired_hides_edit() {
        let user = me();
        let msg = own_message(10);
        let room = room(false);
        let settings = ServerSettings {
            allow_editing: true,
            block_edit_in_minutes: Some(5),
            ..Default::default()
        };
        let e = check(&msg, &room, &user, &settings, PermissionSet::default());
        assert!(!e.allow_edit());

        let fresh = own_message(2);
        let e = check(&fresh, &room, &user, &settings, PermissionSet::default());
        assert!(e.allow_edit());
    }

    #[test]
    fn edit_any_still_respects_window() {
        let user = me();
        let mut msg = own_message(10);
        msg.author = None;
        let room = room(false);
        let settings = ServerSettings {
            allow_editing: false,
            block_edit_in_minutes: Some(5),
            ..Default::default()
        };
        let perms = PermissionSet {
            edit_any: true,
            ..Default::default()
        };
        assert!(!check(&msg, &room, &user, &settings, perms).allow_edit());

        let settings = ServerSettings {
            block_edit_in_minutes: None,
            ..settings
        };
        assert!(check(&msg, &room, &user, &settings, perms).allow_edit());
    }

    #[test]
    fn force_delete_bypasses_window_and_ownership() {
        let user = me();
        let mut msg = own_message(10_000);
        msg.author = Some(UserRef {
            id: "someone".into(),
            username: "else".into(),
        });
        msg.ts = None;
        let room = room(false);
        let settings = ServerSettings {
            allow_deleting: false,
            block_delete_in_minutes: Some(1),
            ..Default::default()
        };
        let perms = PermissionSet {
            force_delete_any: true,
            ..Default::default()
        };
        assert!(check(&msg, &room, &user, &settings, perms).allow_delete());
    }

    #[test]
    fn thread_root_cannot_be_deleted_from_inside_the_thread() {
        let user = me();
        let msg = own_message(0);
        let room = room(false);
        let settings = ServerSettings::default();
        let mut e = check(&msg, &room, &user, &settings, PermissionSet::default());
        assert!(e.allow_delete());
        e.thread_id = Some("m1");
        assert!(!e.allow_delete());
    }

    #[test]
    fn undated_message_fails_any_window() {
        let now = Utc::now();
        assert!(!within_block_window(None, Some(5), now));
        assert!(within_block_window(None, None, now));
        assert!(within_block_window(None, Some(0), now));
    }

    #[test]
    fn window_counts_whole_minutes() {
        let now = Utc::now();
        let ts = now - Duration::seconds(5 * 60 - 1);
        assert!(within_block_window(Some(ts), Some(5), now));
        let ts = now - Duration::minutes(5);
        assert!(!within_block_window(Some(ts), Some(5), now));
    }

    #[tokio::test]
    async fn failed_permission_fetch_grants_nothing() {
        let api = crate::api::mock::MockApi::default();
        let perms = PermissionSet::fetch(&api, "r1").await;
        assert_eq!(perms, PermissionSet::default());
    }
}
