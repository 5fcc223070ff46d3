#![forbid(unsafe_code)]

//! Tri-state check propagation for tree-shaped selection.
//!
//! # Design
//!
//! The check state lives in the stored `IsChecked` property of checkable
//! schemas: `Bool(true)`, `Bool(false)` or `Null` for indeterminate.
//!
//! Writes travel in one direction each:
//!
//! - down: an explicit value is copied onto every checkable child, with the
//!   child's upward propagation turned off;
//! - up: the parent re-derives its state from its children and continues to
//!   its own parent, never back down.
//!
//! While a node pushes down, it ignores re-evaluation requests, so a child
//! update cannot bounce back into the node that caused it.
//!
//! # Invariants
//!
//! 1. The public setter never stores indeterminate; `None` becomes unchecked.
//! 2. A re-evaluation with mixed children yields indeterminate.
//! 3. Non-checkable children neither receive nor contribute state.

use crate::node::{Node, WriteGate};
use crate::schema::names;
use crate::value::Value;

/// Check state of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CheckState {
    #[default]
    Unchecked,
    Checked,
    Indeterminate,
}

impl From<Option<bool>> for CheckState {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Checked,
            Some(false) => Self::Unchecked,
            None => Self::Indeterminate,
        }
    }
}

impl From<CheckState> for Option<bool> {
    fn from(state: CheckState) -> Self {
        match state {
            CheckState::Checked => Some(true),
            CheckState::Unchecked => Some(false),
            CheckState::Indeterminate => None,
        }
    }
}

impl Node {
    #[must_use]
    pub fn is_checkable(&self) -> bool {
        self.inner.schema.is_checkable()
    }

    /// `Some(checked)`, or `None` when indeterminate or not checkable.
    #[must_use]
    pub fn is_checked(&self) -> Option<bool> {
        if !self.is_checkable() {
            return None;
        }
        self.stored(names::IS_CHECKED).as_bool()
    }

    #[must_use]
    pub fn check_state(&self) -> CheckState {
        if !self.is_checkable() {
            return CheckState::Unchecked;
        }
        CheckState::from(self.is_checked())
    }

    /// Public check setter. `None` is coerced to unchecked; children follow
    /// the new value and the parent re-evaluates.
    pub fn set_checked(&self, checked: Option<bool>) -> bool {
        self.set_check_state(Some(checked.unwrap_or(false)), true, true)
    }

    /// Low-level check write; the only way to store indeterminate.
    ///
    /// Returns whether this node's own state changed. Children are updated
    /// only for an explicit value, and always without their own upward
    /// propagation.
    pub fn set_check_state(
        &self,
        value: Option<bool>,
        update_children: bool,
        update_parent: bool,
    ) -> bool {
        if !self.is_checkable() || self.is_checked_raw() == value {
            return false;
        }
        let changed = self.write(names::IS_CHECKED, Value::from(value), WriteGate::Public);
        if !changed {
            return false;
        }
        tracing::trace!(
            message = "check.changed",
            schema = self.inner.schema.name(),
            state = ?CheckState::from(value)
        );

        if update_children && let Some(explicit) = value {
            self.inner.check_guard.set(true);
            for child in self.children() {
                if child.is_checkable() {
                    child.set_check_state(Some(explicit), true, false);
                }
            }
            self.inner.check_guard.set(false);
        }
        if update_parent && let Some(parent) = self.parent() {
            parent.reevaluate_check_state();
        }
        true
    }

    /// Re-derive this node's state from its checkable children.
    ///
    /// Unanimous children set that value, anything else sets indeterminate.
    /// The result propagates upward only.
    pub fn reevaluate_check_state(&self) {
        if self.inner.check_guard.get() || !self.is_checkable() {
            return;
        }
        let mut states = self
            .children()
            .into_iter()
            .filter(Node::is_checkable)
            .map(|child| child.is_checked_raw());
        let Some(first) = states.next() else {
            return;
        };
        let derived = if states.all(|state| state == first) {
            first
        } else {
            None
        };
        self.set_check_state(derived, false, true);
    }

    /// Like [`is_checked`](Self::is_checked), without the schema check.
    fn is_checked_raw(&self) -> Option<bool> {
        self.stored(names::IS_CHECKED).as_bool()
    }
}
