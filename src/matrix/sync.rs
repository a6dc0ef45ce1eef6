use std::time::Duration;

use matrix_sdk::config::SyncSettings;
use matrix_sdk::ruma::api::client::filter::FilterDefinition;
use matrix_sdk::ruma::events::MessageLikeEventType;
use matrix_sdk::ruma::{OwnedRoomId, UserId};
use matrix_sdk::sync::JoinedRoomUpdate;
use matrix_sdk::{Client, Room};
use tokio_util::sync::CancellationToken;

use crate::matrix::timeline::{apply, build_display_names, convert_raw, StoreUpdate};
use crate::model;
use crate::store::Database;

const RETRY_AFTER: Duration = Duration::from_secs(5);

/// Keep the local store in step with the homeserver until `token` is cancelled.
pub async fn run(client: Client, db: Database, token: CancellationToken) {
    let filter = FilterDefinition::with_lazy_loading();
    let mut settings = SyncSettings::default().filter(filter.into());

    tracing::info!("Sync started");
    loop {
        let response = tokio::select! {
            _ = token.cancelled() => break,
            response = client.sync_once(settings.clone()) => response,
        };
        match response {
            Ok(response) => {
                settings = settings.token(response.next_batch);
                let mut batch = Vec::new();
                for (room_id, update) in &response.rooms.join {
                    batch.extend(extract_updates(&client, room_id, update).await);
                }
                let rooms = collect_rooms(&client).await;
                if let Err(e) = db.write(|t| {
                    for (room, subscription) in rooms {
                        t.merge_remote_room(room);
                        // Keep the local read position of known subscriptions.
                        let last_open = t.subscription(&subscription.id).and_then(|s| s.last_open);
                        t.upsert_subscription(model::Subscription {
                            last_open,
                            ..subscription
                        });
                    }
                    for update in batch {
                        apply(t, update)?;
                    }
                    Ok(())
                }) {
                    tracing::error!("Failed to store sync response: {e}");
                }
            }
            Err(e) => {
                tracing::error!("Sync error: {e}");
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_AFTER) => {}
                }
            }
        }
    }
    tracing::info!("Sync stopped");
}

async fn extract_updates(
    client: &Client,
    room_id: &OwnedRoomId,
    update: &JoinedRoomUpdate,
) -> Vec<StoreUpdate> {
    let display_names = if let Some(room) = client.get_room(room_id) {
        build_display_names(&room).await
    } else {
        std::collections::HashMap::new()
    };

    update
        .timeline
        .events
        .iter()
        .filter_map(|ev| convert_raw(room_id.as_str(), ev.raw(), &display_names))
        .collect()
}

async fn collect_rooms(client: &Client) -> Vec<(model::Room, model::Subscription)> {
    let Some(user_id) = client.user_id() else {
        return Vec::new();
    };
    let mut entries = Vec::new();
    for room in client.joined_rooms() {
        entries.push((room_record(&room, user_id).await, subscription_record(&room)));
    }
    entries
}

fn display_name(room: &Room) -> String {
    room.cached_display_name()
        .map(|n| n.to_string())
        .unwrap_or_else(|| room.room_id().to_string())
}

/// Local room record. A room is read-only when power levels forbid the user
/// from sending messages.
pub async fn room_record(room: &Room, user_id: &UserId) -> model::Room {
    let read_only = match room
        .can_user_send_message(user_id, MessageLikeEventType::RoomMessage)
        .await
    {
        Ok(can_send) => !can_send,
        Err(e) => {
            tracing::warn!("Failed to read power levels of {}: {e}", room.room_id());
            false
        }
    };
    model::Room {
        id: room.room_id().to_string(),
        name: display_name(room),
        read_only,
        ..Default::default()
    }
}

/// Joined rooms are subscriptions keyed by their room id.
pub fn subscription_record(room: &Room) -> model::Subscription {
    model::Subscription {
        id: room.room_id().to_string(),
        room_id: room.room_id().to_string(),
        name: display_name(room),
        last_open: None,
    }
}
