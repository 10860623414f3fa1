//! Change events and listener registry
//!
//! One logical operation that mutates N resources produces exactly one
//! `ChangeEvent` carrying all N ids — never one event per resource. Events
//! are delivered synchronously, in registration order, to listeners
//! registered on the instance; the external observe engine consumes them and
//! owns all suppression policy. Events are ephemeral and never persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// A coalesced notification for one instance mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Object type id
    pub object_id: u16,
    /// Instance id within the object
    pub instance_id: u16,
    /// Resource ids mutated atomically in this operation; never empty
    pub resource_ids: BTreeSet<u16>,
    /// Unix-epoch seconds at fire time
    pub timestamp: u64,
}

impl ChangeEvent {
    /// Path-style rendering for logs, e.g. `/3303/0/{5601,5700}`.
    pub fn path(&self) -> String {
        let ids: Vec<String> = self.resource_ids.iter().map(u16::to_string).collect();
        format!(
            "/{}/{}/{{{}}}",
            self.object_id,
            self.instance_id,
            ids.join(",")
        )
    }
}

/// Callback contract for change observers
pub trait ChangeListener: Send + Sync {
    fn resources_changed(&self, event: &ChangeEvent);
}

/// Per-instance listener registry and event source
///
/// Listener identity is pointer identity: adding the same `Arc` twice is a
/// no-op after the first, and removing an unregistered listener is a no-op.
pub struct ChangeNotifier {
    object_id: u16,
    instance_id: u16,
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
    /// Set on destroy; makes `fire` a permanent no-op.
    disabled: AtomicBool,
}

impl ChangeNotifier {
    pub fn new(object_id: u16, instance_id: u16) -> Self {
        Self {
            object_id,
            instance_id,
            listeners: RwLock::new(Vec::new()),
            disabled: AtomicBool::new(false),
        }
    }

    /// Register a listener. Double-add of the same `Arc` is a no-op.
    pub fn add_listener(&self, listener: Arc<dyn ChangeListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                listeners.push(listener);
            }
        }
    }

    /// Remove a listener. Unknown listeners are silently ignored.
    pub fn remove_listener(&self, listener: &Arc<dyn ChangeListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Deliver one coalesced event carrying all mutated ids.
    ///
    /// An empty id set fires nothing. After `shut_down` this is a permanent
    /// no-op.
    pub fn fire(&self, resource_ids: impl IntoIterator<Item = u16>) {
        if self.disabled.load(Ordering::Acquire) {
            return;
        }
        let resource_ids: BTreeSet<u16> = resource_ids.into_iter().collect();
        if resource_ids.is_empty() {
            return;
        }
        let event = ChangeEvent {
            object_id: self.object_id,
            instance_id: self.instance_id,
            resource_ids,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        log::debug!("resources changed: {}", event.path());

        // Snapshot under the lock, deliver outside it: listeners may
        // re-enter the registry.
        let snapshot: Vec<Arc<dyn ChangeListener>> = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        for listener in snapshot {
            listener.resources_changed(&event);
        }
    }

    /// Permanently disable event delivery. Called once at instance destroy.
    pub fn shut_down(&self) {
        self.disabled.store(true, Ordering::Release);
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Test listener recording every event it receives.
    struct Recorder {
        events: Mutex<Vec<ChangeEvent>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<ChangeEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ChangeListener for Recorder {
        fn resources_changed(&self, event: &ChangeEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_fire_delivers_one_coalesced_event() {
        let notifier = ChangeNotifier::new(3303, 0);
        let recorder = Recorder::new();
        notifier.add_listener(recorder.clone());

        notifier.fire([5700, 5602]);

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].resource_ids,
            BTreeSet::from([5700, 5602])
        );
        assert_eq!(events[0].object_id, 3303);
        assert_eq!(events[0].instance_id, 0);
    }

    #[test]
    fn test_double_add_delivers_once() {
        let notifier = ChangeNotifier::new(3303, 0);
        let recorder = Recorder::new();
        notifier.add_listener(recorder.clone());
        notifier.add_listener(recorder.clone());

        notifier.fire([5700]);
        assert_eq!(recorder.events().len(), 1);
        assert_eq!(notifier.listener_count(), 1);
    }

    #[test]
    fn test_remove_unknown_listener_is_noop() {
        let notifier = ChangeNotifier::new(3303, 0);
        let registered = Recorder::new();
        let stranger = Recorder::new();
        notifier.add_listener(registered.clone());

        notifier.remove_listener(&(stranger as Arc<dyn ChangeListener>));
        assert_eq!(notifier.listener_count(), 1);
    }

    #[test]
    fn test_remove_stops_delivery() {
        let notifier = ChangeNotifier::new(3303, 0);
        let recorder = Recorder::new();
        let handle: Arc<dyn ChangeListener> = recorder.clone();
        notifier.add_listener(handle.clone());
        notifier.remove_listener(&handle);

        notifier.fire([5700]);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        struct Tagged {
            tag: &'static str,
            order: Arc<Mutex<Vec<&'static str>>>,
        }
        impl ChangeListener for Tagged {
            fn resources_changed(&self, _event: &ChangeEvent) {
                self.order.lock().unwrap().push(self.tag);
            }
        }

        let notifier = ChangeNotifier::new(3303, 0);
        notifier.add_listener(Arc::new(Tagged {
            tag: "first",
            order: order.clone(),
        }));
        notifier.add_listener(Arc::new(Tagged {
            tag: "second",
            order: order.clone(),
        }));

        notifier.fire([5700]);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_empty_set_fires_nothing() {
        let notifier = ChangeNotifier::new(3303, 0);
        let recorder = Recorder::new();
        notifier.add_listener(recorder.clone());

        notifier.fire([]);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_no_events_after_shutdown() {
        let notifier = ChangeNotifier::new(3303, 0);
        let recorder = Recorder::new();
        notifier.add_listener(recorder.clone());

        notifier.shut_down();
        notifier.fire([5700]);
        assert!(recorder.events().is_empty());
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_event_path_rendering() {
        let event = ChangeEvent {
            object_id: 3303,
            instance_id: 0,
            resource_ids: BTreeSet::from([5700, 5601]),
            timestamp: 0,
        };
        assert_eq!(event.path(), "/3303/0/{5601,5700}");
    }

    #[test]
    fn test_event_serde_roundtrip() {
        let event = ChangeEvent {
            object_id: 3303,
            instance_id: 1,
            resource_ids: BTreeSet::from([5700]),
            timestamp: 1700000000,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
