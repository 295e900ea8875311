//! Player-info event bus
//!
//! Music.app broadcasts `com.apple.Music.playerInfo` with a key/value payload
//! whenever playback changes. The platform observer turns the payload into
//! [`PlayerInfoEvent`]s; the UI thread publishes them on a [`PlayerInfoBus`]
//! and view-models listen for the ones that call for a refresh.
//!
//! A listener stays registered for as long as its [`Subscription`] lives.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Payload key carrying "Playing" / "Paused" / "Stopped"
pub const PLAYER_STATE_KEY: &str = "Player State";

/// Payload key carrying the track title
pub const TRACK_NAME_KEY: &str = "Name";

/// Payload keys the platform observer forwards
pub const FORWARDED_KEYS: &[&str] = &[PLAYER_STATE_KEY, TRACK_NAME_KEY];

/// One key/value pair from a player-info notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfoEvent {
    pub key: String,
    pub value: String,
}

impl PlayerInfoEvent {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether live rows/panels should re-query the player
    pub fn triggers_refresh(&self) -> bool {
        self.key == PLAYER_STATE_KEY && matches!(self.value.as_str(), "Playing" | "Paused")
    }
}

type Listener = Rc<dyn Fn(&PlayerInfoEvent)>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Single-threaded publish/subscribe for [`PlayerInfoEvent`]s
#[derive(Clone, Default)]
pub struct PlayerInfoBus {
    inner: Rc<RefCell<BusInner>>,
}

impl PlayerInfoBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`; it is removed when the returned guard drops.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl Fn(&PlayerInfoEvent) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Rc::new(listener)));
        Subscription {
            id,
            bus: Rc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every listener. Returns how many were called.
    pub fn publish(&self, event: &PlayerInfoEvent) -> usize {
        // Snapshot so listeners may subscribe or unsubscribe while handling
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

/// Registration guard returned by [`PlayerInfoBus::subscribe`]
pub struct Subscription {
    id: u64,
    bus: Weak<RefCell<BusInner>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.borrow_mut().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_triggers_refresh() {
        assert!(PlayerInfoEvent::new(PLAYER_STATE_KEY, "Playing").triggers_refresh());
        assert!(PlayerInfoEvent::new(PLAYER_STATE_KEY, "Paused").triggers_refresh());
        assert!(!PlayerInfoEvent::new(PLAYER_STATE_KEY, "Stopped").triggers_refresh());
        assert!(!PlayerInfoEvent::new(TRACK_NAME_KEY, "Playing").triggers_refresh());
    }

    #[test]
    fn test_publish_reaches_subscribers() {
        let bus = PlayerInfoBus::new();
        let hits = Rc::new(Cell::new(0));

        let h = Rc::clone(&hits);
        let _a = bus.subscribe(move |_| h.set(h.get() + 1));
        let h = Rc::clone(&hits);
        let _b = bus.subscribe(move |_| h.set(h.get() + 1));

        assert_eq!(bus.publish(&PlayerInfoEvent::new(PLAYER_STATE_KEY, "Playing")), 2);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = PlayerInfoBus::new();
        let hits = Rc::new(Cell::new(0));

        let h = Rc::clone(&hits);
        let sub = bus.subscribe(move |_| h.set(h.get() + 1));
        assert_eq!(bus.listener_count(), 1);

        drop(sub);
        assert_eq!(bus.listener_count(), 0);
        bus.publish(&PlayerInfoEvent::new(PLAYER_STATE_KEY, "Paused"));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = PlayerInfoBus::new();
        let sub = bus.subscribe(|_| {});
        drop(bus);
        drop(sub);
    }

    #[test]
    fn test_unsubscribe_during_publish() {
        let bus = PlayerInfoBus::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let s = Rc::clone(&slot);
        let sub = bus.subscribe(move |_| {
            s.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(sub);

        bus.publish(&PlayerInfoEvent::new(PLAYER_STATE_KEY, "Playing"));
        assert_eq!(bus.listener_count(), 0);
    }
}
