use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::SlotEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for slot-cache changes per listing.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<SlotEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to changes of a listing's cache. Creates the channel if needed.
    pub fn subscribe(&self, listing_id: Ulid) -> broadcast::Receiver<SlotEvent> {
        let sender = self
            .channels
            .entry(listing_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening; a channel whose
    /// last receiver was dropped is pruned here.
    pub fn send(&self, listing_id: Ulid, event: &SlotEvent) {
        let delivered = match self.channels.get(&listing_id) {
            Some(sender) => sender.send(event.clone()).is_ok(),
            None => return,
        };
        if !delivered {
            self.channels
                .remove_if(&listing_id, |_, sender| sender.receiver_count() == 0);
        }
    }

    /// True while some picker still listens for this listing.
    pub fn is_watched(&self, listing_id: &Ulid) -> bool {
        self.channels
            .get(listing_id)
            .is_some_and(|sender| sender.receiver_count() > 0)
    }

    /// Remove a channel (e.g. when a listing is evicted).
    pub fn remove(&self, listing_id: &Ulid) {
        self.channels.remove(listing_id);
    }
}
