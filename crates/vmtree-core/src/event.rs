#![forbid(unsafe_code)]

//! Change events and subscriber management.
//!
//! # Design
//!
//! An [`EventHub`] stores its subscribers as `Weak` callbacks; the strong
//! reference lives in the [`Subscription`] handed back to the caller.
//! Dropping the subscription is the detach. Dead entries are pruned lazily on
//! the next notification.
//!
//! Before invoking anything, `emit` snapshots the live callbacks and releases
//! its borrow, so a handler may subscribe, unsubscribe or write to the
//! emitting node while the notification is in flight.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 3. A cycle that started before the drop still delivers to the snapshot it
//!    took.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::value::ChangeKind;

/// A notification raised by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A stored property is about to take a new value.
    PropertyChanging(Arc<str>),
    /// A property changed, either directly or through the cascade.
    PropertyChanged(Arc<str>),
    /// A collection-valued property changed structurally.
    CollectionChanged {
        property: Arc<str>,
        kind: ChangeKind,
    },
    /// The recorded errors of a property changed.
    ErrorsChanged(Arc<str>),
}

impl NodeEvent {
    /// The property this event concerns.
    #[must_use]
    pub fn property(&self) -> &str {
        match self {
            Self::PropertyChanging(name)
            | Self::PropertyChanged(name)
            | Self::ErrorsChanged(name)
            | Self::CollectionChanged { property: name, .. } => name,
        }
    }

    /// Whether this is a "changed" notification for `name`.
    #[must_use]
    pub fn is_changed(&self, name: &str) -> bool {
        matches!(self, Self::PropertyChanged(n) if &**n == name)
    }
}

type Callback = dyn Fn(&NodeEvent);

/// RAII guard for a subscriber; the callback is detached when this drops.
#[must_use = "dropping a Subscription detaches its callback immediately"]
pub struct Subscription {
    _callback: Rc<Callback>,
}

impl Subscription {
    /// Detach now. Equivalent to dropping.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Ordered list of weakly held subscribers.
#[derive(Default)]
pub struct EventHub {
    subscribers: RefCell<Vec<Weak<Callback>>>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; it stays attached while the returned guard lives.
    pub fn subscribe(&self, callback: impl Fn(&NodeEvent) + 'static) -> Subscription {
        let callback: Rc<Callback> = Rc::new(callback);
        self.subscribers.borrow_mut().push(Rc::downgrade(&callback));
        Subscription {
            _callback: callback,
        }
    }

    /// Deliver `event` to every live subscriber, in registration order.
    pub fn emit(&self, event: &NodeEvent) {
        let live: Vec<Rc<Callback>> = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in live {
            callback(event);
        }
    }

    /// Number of subscribers whose guard is still alive.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
