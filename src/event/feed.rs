use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::changes::StoreChange;

const CHANNEL_CAPACITY: usize = 100;

/// Publish-on-change registry for store mutations
///
/// Room-scoped channels carry every change affecting one room; the global
/// channel carries all changes, including profile updates that are not
/// scoped to a single room. Subscribers that fall behind see a `Lagged`
/// error and should recompute from a fresh snapshot.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    /// Room-specific change channels: room_id -> sender
    room_channels: Arc<RwLock<HashMap<String, broadcast::Sender<StoreChange>>>>,
    global: broadcast::Sender<StoreChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (global, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            room_channels: Arc::new(RwLock::new(HashMap::new())),
            global,
        }
    }

    /// Publishes a committed change to the global channel and, when the
    /// change is room-scoped, to that room's channel as well.
    pub async fn publish(&self, change: StoreChange) {
        if self.global.send(change.clone()).is_err() {
            debug!(
                kind = change.change_kind(),
                "Change published with no global receivers"
            );
        }

        let Some(room_id) = change.room_id().map(str::to_string) else {
            return;
        };

        let room_channels = self.room_channels.read().await;
        if let Some(sender) = room_channels.get(&room_id) {
            match sender.send(change) {
                Ok(receiver_count) => {
                    debug!(
                        room_id = %room_id,
                        receivers = receiver_count,
                        "Room change published"
                    );
                }
                Err(_) => {
                    debug!(room_id = %room_id, "Room change published with no receivers");
                }
            }
        }
    }

    /// Subscribe to changes affecting a specific room
    pub async fn subscribe_room(&self, room_id: &str) -> broadcast::Receiver<StoreChange> {
        let room_channels = self.room_channels.read().await;

        if let Some(sender) = room_channels.get(room_id) {
            sender.subscribe()
        } else {
            debug!(room_id = %room_id, "Creating new room channel for subscription");
            drop(room_channels);

            let mut room_channels = self.room_channels.write().await;
            // Channels whose receivers have all gone are dead weight;
            // reclaim them while we hold the write lock anyway. They are
            // lazily recreated on the next subscription.
            room_channels.retain(|_, sender| sender.receiver_count() > 0);
            let sender = room_channels
                .entry(room_id.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
            sender.subscribe()
        }
    }

    /// Subscribe to every change in the store
    pub fn subscribe_all(&self) -> broadcast::Receiver<StoreChange> {
        self.global.subscribe()
    }

    /// Drops a room's channel once the room is gone; existing receivers
    /// simply observe the channel closing.
    pub async fn close_room(&self, room_id: &str) {
        let mut room_channels = self.room_channels.write().await;
        room_channels.remove(room_id);
    }
}
