//! Event registry for fanning client events out to subscribers.
//!
//! Subscribers register callbacks per [`ClientEvent`]. Callbacks are held as
//! `Arc`s and compared by pointer, so removing one requires the same `Arc` that
//! was registered. The registry is independent of the connection and keeps its
//! subscriptions across reconnects.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use super::events::{ClientEvent, EventData};

/// A subscriber callback.
pub type Listener = Arc<dyn Fn(&EventData) + Send + Sync + 'static>;

/// Wrap a closure as a [`Listener`].
pub fn listener(callback: impl Fn(&EventData) + Send + Sync + 'static) -> Listener {
    Arc::new(callback)
}

#[derive(Clone, Default)]
pub struct EventRegistry {
    listeners: Arc<RwLock<HashMap<ClientEvent, Vec<Listener>>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. The same callback may be registered more than
    /// once and then fires once per registration.
    pub fn on(&self, event: ClientEvent, callback: Listener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event)
            .or_default()
            .push(callback);
    }

    /// Remove the first registration of `callback` for `event`.
    ///
    /// Returns false if it was not registered.
    pub fn off(&self, event: ClientEvent, callback: &Listener) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(callbacks) = listeners.get_mut(&event) else {
            return false;
        };
        match callbacks.iter().position(|cb| Arc::ptr_eq(cb, callback)) {
            Some(index) => {
                callbacks.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke every callback registered for `event`, in registration order.
    ///
    /// Callbacks run on a snapshot taken before the first call, outside the
    /// lock. A panicking callback is logged and skipped.
    pub fn emit(&self, event: ClientEvent, data: &EventData) {
        let snapshot = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .cloned()
            .unwrap_or_default();

        for callback in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(data))) {
                tracing::error!(
                    event = %event,
                    "Event callback failed: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    pub fn listener_count(&self, event: ClientEvent) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .map_or(0, Vec::len)
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Listener {
        let log = Arc::clone(log);
        listener(move |_| log.lock().expect("log lock").push(name))
    }

    #[test]
    fn test_emit_in_registration_order() {
        let registry = EventRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.on(ClientEvent::Status, recorder(&log, "first"));
        registry.on(ClientEvent::Status, recorder(&log, "second"));
        registry.on(ClientEvent::System, recorder(&log, "other-event"));

        registry.emit(ClientEvent::Status, &EventData::None);

        assert_eq!(*log.lock().expect("log lock"), vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_registration_fires_twice() {
        let registry = EventRegistry::new();
        let count = Arc::new(AtomicU32::new(0));

        let count_clone = Arc::clone(&count);
        let cb = listener(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        registry.on(ClientEvent::Open, Arc::clone(&cb));
        registry.on(ClientEvent::Open, Arc::clone(&cb));

        registry.emit(ClientEvent::Open, &EventData::None);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        // Only the first registration goes away
        assert!(registry.off(ClientEvent::Open, &cb));
        registry.emit(ClientEvent::Open, &EventData::None);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_off_removes_only_matching_callback() {
        let registry = EventRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = recorder(&log, "first");
        let second = recorder(&log, "second");
        registry.on(ClientEvent::Close, Arc::clone(&first));
        registry.on(ClientEvent::Close, Arc::clone(&second));

        assert!(registry.off(ClientEvent::Close, &first));
        registry.emit(ClientEvent::Close, &EventData::None);

        assert_eq!(*log.lock().expect("log lock"), vec!["second"]);
        assert_eq!(registry.listener_count(ClientEvent::Close), 1);
    }

    #[test]
    fn test_off_unknown_is_noop() {
        let registry = EventRegistry::new();
        let cb = listener(|_| {});
        assert!(!registry.off(ClientEvent::History, &cb));

        registry.on(ClientEvent::History, listener(|_| {}));
        assert!(!registry.off(ClientEvent::History, &cb));
        assert_eq!(registry.listener_count(ClientEvent::History), 1);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_siblings() {
        let registry = EventRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.on(ClientEvent::Error, recorder(&log, "before"));
        registry.on(
            ClientEvent::Error,
            listener(|_| panic!("subscriber blew up")),
        );
        registry.on(ClientEvent::Error, recorder(&log, "after"));

        registry.emit(ClientEvent::Error, &EventData::None);

        assert_eq!(*log.lock().expect("log lock"), vec!["before", "after"]);
    }

    #[test]
    fn test_callback_receives_data() {
        let registry = EventRegistry::new();
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = Arc::clone(&seen);
        registry.on(
            ClientEvent::AiResponseChunk,
            listener(move |data| {
                *seen_clone.lock().expect("seen lock") = data.text("content").map(str::to_string);
            }),
        );

        registry.emit(
            ClientEvent::AiResponseChunk,
            &EventData::Payload(serde_json::json!({"type": "ai_response_chunk", "content": "a"})),
        );

        assert_eq!(seen.lock().expect("seen lock").as_deref(), Some("a"));
    }

    #[test]
    fn test_callback_may_subscribe_during_emit() {
        let registry = EventRegistry::new();
        let registry_clone = registry.clone();

        registry.on(
            ClientEvent::Open,
            listener(move |_| registry_clone.on(ClientEvent::Open, listener(|_| {}))),
        );

        registry.emit(ClientEvent::Open, &EventData::None);
        assert_eq!(registry.listener_count(ClientEvent::Open), 2);
    }

    #[test]
    fn test_clear() {
        let registry = EventRegistry::new();
        registry.on(ClientEvent::Status, listener(|_| {}));
        registry.clear();
        assert_eq!(registry.listener_count(ClientEvent::Status), 0);
    }
}
