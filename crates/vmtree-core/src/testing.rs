#![forbid(unsafe_code)]

//! Event capture for tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::{NodeEvent, Subscription};
use crate::node::Node;
use crate::value::ChangeKind;

/// Records every event a node raises, for as long as it lives.
#[derive(Debug)]
pub struct EventRecorder {
    log: Rc<RefCell<Vec<NodeEvent>>>,
    _subscription: Subscription,
}

impl EventRecorder {
    pub fn attach(node: &Node) -> Self {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let subscription = node.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        Self {
            log,
            _subscription: subscription,
        }
    }

    #[must_use]
    pub fn events(&self) -> Vec<NodeEvent> {
        self.log.borrow().clone()
    }

    /// Names of "changed" events, in order.
    #[must_use]
    pub fn changed(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter_map(|event| match event {
                NodeEvent::PropertyChanged(name) => Some(name.to_string()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn changed_count(&self, name: &str) -> usize {
        self.count(|event| matches!(event, NodeEvent::PropertyChanged(n) if &**n == name))
    }

    #[must_use]
    pub fn changing_count(&self, name: &str) -> usize {
        self.count(|event| matches!(event, NodeEvent::PropertyChanging(n) if &**n == name))
    }

    #[must_use]
    pub fn errors_changed_count(&self, name: &str) -> usize {
        self.count(|event| matches!(event, NodeEvent::ErrorsChanged(n) if &**n == name))
    }

    #[must_use]
    pub fn total_changed(&self) -> usize {
        self.count(|event| matches!(event, NodeEvent::PropertyChanged(_)))
    }

    #[must_use]
    pub fn collection_changes(&self) -> Vec<(String, ChangeKind)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|event| match event {
                NodeEvent::CollectionChanged { property, kind } => {
                    Some((property.to_string(), *kind))
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    fn count(&self, predicate: impl Fn(&NodeEvent) -> bool) -> usize {
        self.log.borrow().iter().filter(|event| predicate(event)).count()
    }
}
