#![forbid(unsafe_code)]

//! Per-node validation.
//!
//! # Design
//!
//! Rules are registered per property and evaluated in registration order.
//! Every rule runs; each failing rule contributes its message. The resulting
//! list replaces the property's recorded errors, and an empty list removes the
//! entry.
//!
//! Aggregation rides on the dependency graph: recording errors raises
//! "changed" for the internal `Errors` signal, whose dependents are
//! `HasErrors` and `IsValid`. A parent re-announces its own `Errors` when a
//! child's `HasErrors` changes, so the aggregate climbs the tree.
//!
//! # Invariants
//!
//! 1. Recorded error lists are never empty and hold no blank messages.
//! 2. "errors changed" fires only when a property's list actually changed.
//! 3. Removing rules never clears errors already recorded.

mod rule;
mod suspend;

pub use rule::{RuleId, ValidationRule, rules};
pub use suspend::ValidationSuspension;

use std::sync::Arc;

use crate::error::{PropertyError, Result};
use crate::event::NodeEvent;
use crate::node::Node;
use crate::schema::{PropertyKind, names};

#[derive(Debug, Default)]
pub(crate) struct ValidationState {
    rules: Vec<(Arc<str>, RuleId, ValidationRule)>,
    errors: Vec<(Arc<str>, Vec<String>)>,
    next_id: u64,
}

impl ValidationState {
    fn rules_for(&self, name: &str) -> Vec<ValidationRule> {
        self.rules
            .iter()
            .filter(|(property, ..)| &**property == name)
            .map(|(.., rule)| rule.clone())
            .collect()
    }

    fn validated_properties(&self) -> Vec<Arc<str>> {
        let mut out: Vec<Arc<str>> = Vec::new();
        for (property, ..) in &self.rules {
            if !out.contains(property) {
                out.push(Arc::clone(property));
            }
        }
        out
    }

    /// Replace the errors for `name`; returns whether anything changed.
    fn record(&mut self, name: &Arc<str>, messages: Vec<String>) -> bool {
        let slot = self.errors.iter().position(|(p, _)| p == name);
        match (slot, messages.is_empty()) {
            (None, true) => false,
            (Some(i), true) => {
                self.errors.remove(i);
                true
            }
            (Some(i), false) if self.errors[i].1 == messages => false,
            (Some(i), false) => {
                self.errors[i].1 = messages;
                true
            }
            (None, false) => {
                self.errors.push((Arc::clone(name), messages));
                true
            }
        }
    }
}

impl Node {
    /// Register `rule` for `name` and, unless suspended, evaluate it now.
    pub fn add_validation(&self, name: &str, rule: ValidationRule) -> Result<RuleId> {
        let descriptor = self.descriptor(name)?;
        match descriptor.kind() {
            PropertyKind::Collection => {
                return Err(PropertyError::Collection {
                    name: name.to_owned(),
                });
            }
            PropertyKind::Signal => {
                return Err(PropertyError::Signal {
                    name: name.to_owned(),
                });
            }
            PropertyKind::Stored { .. } | PropertyKind::Computed { .. } => {}
        }
        let name = Arc::clone(descriptor.name_arc());

        let id = {
            let mut state = self.inner.validation.borrow_mut();
            state.next_id += 1;
            let id = RuleId(state.next_id);
            state.rules.push((Arc::clone(&name), id, rule));
            id
        };
        if self.inner.config.validate_on_register && !self.is_validation_suspended() {
            self.validate_property(&name);
        }
        Ok(id)
    }

    /// Unregister one rule. Errors it already produced stay recorded.
    pub fn remove_validation(&self, id: RuleId) -> bool {
        let mut state = self.inner.validation.borrow_mut();
        let before = state.rules.len();
        state.rules.retain(|(_, rule_id, _)| *rule_id != id);
        state.rules.len() != before
    }

    /// Unregister every rule for `name`; returns how many were removed.
    pub fn remove_all_validations_for(&self, name: &str) -> usize {
        let mut state = self.inner.validation.borrow_mut();
        let before = state.rules.len();
        state.rules.retain(|(property, ..)| &**property != name);
        before - state.rules.len()
    }

    pub(crate) fn has_rules_for(&self, name: &str) -> bool {
        self.inner
            .validation
            .borrow()
            .rules
            .iter()
            .any(|(property, ..)| &**property == name)
    }

    /// Run the rules of one property and record the outcome.
    pub(crate) fn validate_property(&self, name: &Arc<str>) {
        let rules = self.inner.validation.borrow().rules_for(name);
        let value = self.get(name).unwrap_or_default();
        let messages: Vec<String> = rules
            .iter()
            .filter(|rule| !rule.passes(&value))
            .map(|rule| rule.message().to_owned())
            .collect();

        let changed = self.inner.validation.borrow_mut().record(name, messages);
        if changed {
            tracing::trace!(
                message = "validation.errors_changed",
                schema = self.inner.schema.name(),
                property = &**name
            );
            self.emit(NodeEvent::ErrorsChanged(Arc::clone(name)));
            self.inner.errors_reported.set(self.has_errors());
            self.notify_changed(&Arc::from(names::ERRORS));
        }
    }

    pub(crate) fn validate_local(&self) {
        let properties = self.inner.validation.borrow().validated_properties();
        for name in &properties {
            self.validate_property(name);
        }
    }

    /// Re-run every rule on this node and all descendants, suspended or not.
    pub fn validate(&self) {
        self.validate_local();
        for child in self.children() {
            child.validate();
        }
    }

    /// Errors on this node or any descendant.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.has_local_errors() || self.children().iter().any(Node::has_errors)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    #[must_use]
    pub fn has_local_errors(&self) -> bool {
        !self.inner.validation.borrow().errors.is_empty()
    }

    /// Recorded messages for `name`, empty when it is valid.
    #[must_use]
    pub fn errors_for(&self, name: &str) -> Vec<String> {
        self.inner
            .validation
            .borrow()
            .errors
            .iter()
            .find(|(property, _)| &**property == name)
            .map(|(_, messages)| messages.clone())
            .unwrap_or_default()
    }

    /// Error lookup for binding layers.
    ///
    /// A non-empty key yields that property's messages; an empty key yields
    /// every local message. Messages are joined with the configured separator.
    #[must_use]
    pub fn error_text(&self, key: &str) -> String {
        let separator = self.inner.config.error_separator.as_str();
        if !key.trim().is_empty() {
            return self.errors_for(key).join(separator);
        }
        let state = self.inner.validation.borrow();
        let all: Vec<&str> = state
            .errors
            .iter()
            .flat_map(|(_, messages)| messages.iter().map(String::as_str))
            .collect();
        all.join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, SchemaBuilder};
    use crate::testing::EventRecorder;
    use crate::value::Value;

    fn form() -> Arc<Schema> {
        Arc::new(
            SchemaBuilder::new("Form")
                .property("Name", "")
                .property("Age", 0)
                .build()
                .expect("form schema"),
        )
    }

    #[test]
    fn registration_validates_immediately() {
        let node = Node::new(form());
        node.add_validation("Name", rules::required("Name is required"))
            .expect("add");
        assert!(node.has_errors());
        assert_eq!(node.errors_for("Name"), vec!["Name is required"]);
    }

    #[test]
    fn registration_can_defer_evaluation() {
        let node = Node::with_config(
            form(),
            crate::config::NodeConfig::default().with_validate_on_register(false),
        );
        node.add_validation("Name", rules::required("Name is required"))
            .expect("add");
        assert!(node.is_valid());
        node.validate();
        assert!(!node.is_valid());
    }

    #[test]
    fn all_rules_run_in_order() {
        let node = Node::new(form());
        node.add_validation("Age", rules::range(18.0, 99.0, "adult"))
            .expect("add");
        node.add_validation(
            "Age",
            ValidationRule::typed::<i64>("even", |age| age % 2 == 0),
        )
        .expect("add");
        node.set("Age", 7).expect("set");
        assert_eq!(node.errors_for("Age"), vec!["adult", "even"]);
        node.set("Age", 20).expect("set");
        assert!(node.errors_for("Age").is_empty());
        assert!(node.is_valid());
    }

    #[test]
    fn fixing_a_value_announces_validity() {
        let node = Node::new(form());
        node.add_validation("Name", rules::required("required"))
            .expect("add");
        let recorder = EventRecorder::attach(&node);
        node.set("Name", "Ada").expect("set");
        assert!(!node.has_errors());
        assert_eq!(recorder.errors_changed_count("Name"), 1);
        assert_eq!(recorder.changed_count(names::HAS_ERRORS), 1);
        assert_eq!(recorder.changed_count(names::IS_VALID), 1);
    }

    #[test]
    fn no_event_when_already_valid() {
        let node = Node::new(form());
        node.add_validation("Age", rules::range(0.0, 10.0, "range"))
            .expect("add");
        let recorder = EventRecorder::attach(&node);
        node.set("Age", 3).expect("set");
        assert_eq!(recorder.errors_changed_count("Age"), 0);
        assert_eq!(recorder.changed_count(names::IS_VALID), 0);
    }

    #[test]
    fn removing_rules_keeps_recorded_errors() {
        let node = Node::new(form());
        let id = node
            .add_validation("Name", rules::required("required"))
            .expect("add");
        assert!(node.remove_validation(id));
        assert!(!node.remove_validation(id));
        assert!(node.has_errors());
        node.add_validation("Age", rules::range(5.0, 6.0, "a"))
            .expect("add");
        node.add_validation("Age", rules::range(5.0, 6.0, "b"))
            .expect("add");
        assert_eq!(node.remove_all_validations_for("Age"), 2);
        assert_eq!(node.errors_for("Age"), vec!["a", "b"]);
    }

    #[test]
    fn error_text_joins_with_separator() {
        let node = Node::with_config(
            form(),
            crate::config::NodeConfig::default().with_error_separator("; "),
        );
        node.add_validation("Name", rules::required("name"))
            .expect("add");
        node.add_validation("Age", rules::range(1.0, 2.0, "age low"))
            .expect("add");
        node.add_validation("Age", rules::predicate("age odd", |v| v.as_int() != Some(0)))
            .expect("add");
        assert_eq!(node.error_text("Age"), "age low; age odd");
        assert_eq!(node.error_text(""), "name; age low; age odd");
        assert_eq!(node.error_text("Missing"), "");
    }

    #[test]
    fn collections_and_unknown_names_cannot_carry_rules() {
        let node = Node::new(form());
        assert!(matches!(
            node.add_validation(names::CHILDREN, rules::required("x")),
            Err(PropertyError::Collection { .. })
        ));
        assert!(matches!(
            node.add_validation("Nope", rules::required("x")),
            Err(PropertyError::Unknown { .. })
        ));
    }

    #[test]
    fn child_errors_aggregate_upward() {
        let parent = Node::new(form());
        let child = Node::new(form());
        parent.add_child(&child);
        let recorder = EventRecorder::attach(&parent);

        child
            .add_validation("Name", rules::required("required"))
            .expect("add");
        assert!(parent.has_errors());
        assert!(!parent.has_local_errors());
        assert_eq!(recorder.changed_count(names::IS_VALID), 1);

        child.set("Name", "ok").expect("set");
        assert!(parent.is_valid());
        assert_eq!(recorder.changed_count(names::IS_VALID), 2);
    }

    #[test]
    fn suspended_writes_record_nothing_until_resume() {
        let node = Node::new(form());
        node.add_validation("Age", rules::range(0.0, 10.0, "range"))
            .expect("add");
        let guard = node.suspend_validation();
        assert!(node.is_validation_suspended());
        node.set("Age", 50).expect("set");
        assert!(node.is_valid());
        guard.release();
        assert!(!node.is_validation_suspended());
        assert_eq!(node.errors_for("Age"), vec!["range"]);
    }

    #[test]
    fn nested_guards_resume_once() {
        let node = Node::new(form());
        node.add_validation("Age", rules::range(0.0, 10.0, "range"))
            .expect("add");
        let outer = node.suspend_validation();
        let inner = node.suspend_validation();
        node.set("Age", 50).expect("set");
        drop(inner);
        assert!(node.is_validation_suspended());
        assert!(node.is_valid());
        drop(outer);
        assert!(!node.is_valid());
    }

    #[test]
    fn suspension_reaches_descendants_and_resume_revalidates_them() {
        let root = Node::new(form());
        let child = Node::new(form());
        let grandchild = Node::new(form());
        root.add_child(&child);
        child.add_child(&grandchild);
        grandchild
            .add_validation("Age", rules::range(0.0, 10.0, "range"))
            .expect("add");

        let guard = root.suspend_validation();
        assert!(child.is_validation_suspended());
        assert!(grandchild.is_validation_suspended());
        grandchild.set("Age", 99).expect("set");
        assert!(grandchild.is_valid());

        drop(guard);
        assert!(!grandchild.is_validation_suspended());
        assert!(!grandchild.is_valid());
        assert!(!root.is_valid());
    }

    #[test]
    fn local_guard_outlives_ancestor_resume() {
        let root = Node::new(form());
        let child = Node::new(form());
        root.add_child(&child);
        child
            .add_validation("Age", rules::range(0.0, 10.0, "range"))
            .expect("add");

        let root_guard = root.suspend_validation();
        let child_guard = child.suspend_validation();
        drop(root_guard);
        assert!(child.is_validation_suspended());
        child.set("Age", 42).expect("set");
        assert!(child.is_valid());
        drop(child_guard);
        assert!(!child.is_valid());
    }

    #[test]
    fn ancestor_resume_leaves_guarded_descendants_alone() {
        let root = Node::new(form());
        let child = Node::new(form());
        root.add_child(&child);
        child
            .add_validation("Age", rules::range(0.0, 10.0, "range"))
            .expect("add");

        let root_guard = root.suspend_validation();
        let child_guard = child.suspend_validation();
        child.set("Age", 42).expect("set");
        drop(root_guard);
        assert!(!root.is_validation_suspended());
        assert!(child.is_validation_suspended());
        assert!(child.is_valid());

        drop(child_guard);
        assert!(!child.is_validation_suspended());
        assert_eq!(child.errors_for("Age"), vec!["range"]);
    }

    #[test]
    fn detached_child_stops_inheriting_suspension() {
        let root = Node::new(form());
        let child = Node::new(form());
        root.add_child(&child);
        child
            .add_validation("Age", rules::range(0.0, 10.0, "range"))
            .expect("add");

        let guard = root.suspend_validation();
        assert!(child.is_validation_suspended());
        assert!(root.remove_child(&child));
        assert!(!child.is_validation_suspended());
        drop(guard);

        child.set("Age", 99).expect("set");
        assert!(!child.is_valid());
    }

    #[test]
    fn reparented_child_follows_its_new_parent() {
        let suspended = Node::new(form());
        let other = Node::new(form());
        let child = Node::new(form());
        suspended.add_child(&child);
        child
            .add_validation("Age", rules::range(0.0, 10.0, "range"))
            .expect("add");

        let _guard = suspended.suspend_validation();
        child.set("Age", 99).expect("set");
        assert!(child.is_valid());

        other.add_child(&child);
        assert!(!child.is_validation_suspended());
        assert_eq!(child.errors_for("Age"), vec!["range"]);
        assert!(suspended.is_valid());
        assert!(!other.is_valid());
    }

    #[test]
    fn child_attached_under_suspended_parent_inherits_it() {
        let parent = Node::new(form());
        let child = Node::new(form());
        let guard = parent.suspend_validation();
        parent.add_child(&child);
        assert!(child.is_validation_suspended());

        child
            .add_validation("Age", rules::range(0.0, 10.0, "range"))
            .expect("add");
        child.set("Age", 99).expect("set");
        assert!(child.is_valid());

        drop(guard);
        assert!(!child.is_validation_suspended());
        assert!(!child.is_valid());
        assert!(!parent.is_valid());
    }

    #[test]
    fn child_flips_under_local_errors_stay_quiet() {
        let parent = Node::new(form());
        let child = Node::new(form());
        parent.add_child(&child);
        parent
            .add_validation("Name", rules::required("parent name"))
            .expect("add");
        let recorder = EventRecorder::attach(&parent);

        child
            .add_validation("Name", rules::required("child name"))
            .expect("add");
        child.set("Name", "ok").expect("set");
        assert_eq!(recorder.changed_count(names::IS_VALID), 0);

        parent.set("Name", "ok").expect("set");
        assert!(parent.is_valid());
        assert_eq!(recorder.changed_count(names::IS_VALID), 1);
    }

    #[test]
    fn removing_an_invalid_child_announces_validity() {
        let parent = Node::new(form());
        let child = Node::new(form());
        parent.add_child(&child);
        child
            .add_validation("Name", rules::required("required"))
            .expect("add");
        assert!(!parent.is_valid());

        let recorder = EventRecorder::attach(&parent);
        parent.remove_child(&child);
        assert!(parent.is_valid());
        assert_eq!(recorder.changed_count(names::IS_VALID), 1);
    }

    #[test]
    fn explicit_validate_runs_while_suspended() {
        let node = Node::new(form());
        let _guard = node.suspend_validation();
        node.add_validation("Name", rules::required("required"))
            .expect("add");
        assert!(node.is_valid());
        node.validate();
        assert!(!node.is_valid());
        assert_eq!(node.get("Name"), Ok(Value::from("")));
    }
}
