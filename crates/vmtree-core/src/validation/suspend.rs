#![forbid(unsafe_code)]

//! Scoped validation suspension.
//!
//! Each node keeps a suspension depth. The first outstanding
//! [`ValidationSuspension`] raises the node's `ValidationSuspended` flag,
//! which children mirror through their parent link; releasing the last one
//! lowers the flag (unless an ancestor still holds it) and re-validates the
//! node's own rules. Descendants re-validate as the lowered flag reaches
//! them, except those still holding a guard of their own.

use crate::node::{Node, WriteGate};
use crate::schema::names;
use crate::value::Value;

/// Guard returned by [`Node::suspend_validation`].
///
/// Validation on writes is skipped while any guard for the node is alive.
/// Dropping the guard is the release.
#[must_use = "dropping a ValidationSuspension resumes validation immediately"]
#[derive(Debug)]
pub struct ValidationSuspension {
    node: Node,
}

impl ValidationSuspension {
    /// Resume now. Equivalent to dropping.
    pub fn release(self) {}
}

impl Drop for ValidationSuspension {
    fn drop(&mut self) {
        self.node.resume_validation();
    }
}

impl Node {
    /// Suspend validation on this node and, through the flag, on its
    /// current descendants.
    pub fn suspend_validation(&self) -> ValidationSuspension {
        let depth = self.inner.suspend_depth.get() + 1;
        self.inner.suspend_depth.set(depth);
        if depth == 1 {
            tracing::debug!(
                message = "validation.suspended",
                schema = self.inner.schema.name()
            );
            self.write(
                names::VALIDATION_SUSPENDED,
                Value::Bool(true),
                WriteGate::Engine,
            );
        }
        ValidationSuspension { node: self.clone() }
    }

    /// Whether writes currently skip validation, either from a guard on this
    /// node or inherited from an ancestor.
    #[must_use]
    pub fn is_validation_suspended(&self) -> bool {
        self.inner.suspend_depth.get() > 0
            || self
                .inner
                .values
                .borrow()
                .get(names::VALIDATION_SUSPENDED)
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    fn resume_validation(&self) {
        let depth = self.inner.suspend_depth.get().saturating_sub(1);
        self.inner.suspend_depth.set(depth);
        if depth > 0 {
            return;
        }
        let inherited = self.parent().is_some_and(|p| p.is_validation_suspended());
        tracing::debug!(
            message = "validation.resumed",
            schema = self.inner.schema.name(),
            inherited
        );
        self.write(
            names::VALIDATION_SUSPENDED,
            Value::Bool(inherited),
            WriteGate::Engine,
        );
        if !inherited {
            self.validate_local();
        }
    }

    /// Mirror an ancestor's suspension flag. An explicit local guard keeps
    /// the node suspended whatever the ancestor does.
    pub(crate) fn inherit_suspension(&self, suspended: bool) {
        if !suspended && self.inner.suspend_depth.get() > 0 {
            return;
        }
        let changed = self.write(
            names::VALIDATION_SUSPENDED,
            Value::Bool(suspended),
            WriteGate::Engine,
        );
        if changed && !suspended {
            self.validate_local();
        }
    }
}
