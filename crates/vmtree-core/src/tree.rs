#![forbid(unsafe_code)]

//! Parent/child wiring.
//!
//! A parent owns its children through [`ChildLink`]s; a child refers back
//! through a [`WeakNode`] only. Two listeners connect them:
//!
//! - the parent's *forward* subscription on the child, which re-announces
//!   every child "changed" as a change of the parent's `Children` property;
//! - the child's *parent link* subscription on the parent, which mirrors the
//!   parent's `ValidationSuspended` flag onto the child.
//!
//! Both subscriptions are dropped with the link, so removal is the detach.
//! Dirtiness climbs through the parent pointers instead (see `mark_dirty`),
//! so exempt changes stay local at any depth.

use std::sync::Arc;

use crate::event::{NodeEvent, Subscription};
use crate::node::{Node, WeakNode};
use crate::schema::names;
use crate::value::ChangeKind;

/// A child entry in its parent's ordered children list.
pub(crate) struct ChildLink {
    pub(crate) node: Node,
    _forward: Option<Subscription>,
}

impl Node {
    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().as_ref().and_then(WeakNode::upgrade)
    }

    /// Point this node at a new parent and rewire the parent listener.
    ///
    /// Without a local guard, the node's suspension flag follows the new
    /// parent (or drops with no parent) and a lowered flag re-validates the
    /// node. This does not touch any children list; [`add_child`](Self::add_child)
    /// is the normal way to attach a node.
    pub fn set_parent(&self, parent: Option<&Node>) {
        let same = match (self.inner.parent.borrow().as_ref(), parent) {
            (None, None) => true,
            (Some(current), Some(next)) => current.ptr_eq(next),
            _ => false,
        };
        if same {
            return;
        }

        drop(self.inner.parent_link.borrow_mut().take());
        *self.inner.parent.borrow_mut() = parent.map(Node::downgrade);

        if let Some(parent) = parent {
            let child = self.downgrade();
            let source = parent.downgrade();
            let link = parent.subscribe(move |event| {
                if !event.is_changed(names::VALIDATION_SUSPENDED) {
                    return;
                }
                if let (Some(child), Some(parent)) = (child.upgrade(), source.upgrade()) {
                    child.inherit_suspension(parent.is_validation_suspended());
                }
            });
            *self.inner.parent_link.borrow_mut() = Some(link);
        }
        self.inherit_suspension(parent.is_some_and(Node::is_validation_suspended));
    }

    /// Snapshot of the current children, in order.
    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        self.inner
            .children
            .borrow()
            .iter()
            .map(|link| link.node.clone())
            .collect()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Option<Node> {
        self.inner
            .children
            .borrow()
            .get(index)
            .map(|link| link.node.clone())
    }

    #[must_use]
    pub fn contains_child(&self, child: &Node) -> bool {
        self.position_of(child).is_some()
    }

    fn position_of(&self, child: &Node) -> Option<usize> {
        self.inner
            .children
            .borrow()
            .iter()
            .position(|link| link.node.ptr_eq(child))
    }

    /// Whether `self` is `other` or one of its ancestors.
    fn is_self_or_ancestor_of(&self, other: &Node) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if node.ptr_eq(self) {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Append `child`. See [`insert_child`](Self::insert_child).
    pub fn add_child(&self, child: &Node) -> bool {
        self.insert_child(self.child_count(), child)
    }

    /// Insert `child` at `index` (clamped to the end).
    ///
    /// A child that belongs to another parent is removed from it first.
    /// Returns `false` without side effects when `child` is already a child
    /// of this node, or when it is this node or one of its ancestors.
    pub fn insert_child(&self, index: usize, child: &Node) -> bool {
        if self.contains_child(child) || child.is_self_or_ancestor_of(self) {
            return false;
        }
        if let Some(previous) = child.parent() {
            previous.remove_child(child);
        }

        let link = self.link(child);
        let index = {
            let mut children = self.inner.children.borrow_mut();
            let index = index.min(children.len());
            children.insert(index, link);
            index
        };
        child.set_parent(Some(self));
        tracing::debug!(
            message = "node.child_added",
            schema = self.inner.schema.name(),
            child = child.schema().name(),
            index
        );
        self.children_changed(ChangeKind::Add);
        true
    }

    /// Detach `child`. Returns `false` if it was not a child of this node.
    pub fn remove_child(&self, child: &Node) -> bool {
        match self.position_of(child) {
            Some(index) => self.remove_child_at(index).is_some(),
            None => false,
        }
    }

    pub fn remove_child_at(&self, index: usize) -> Option<Node> {
        let link = {
            let mut children = self.inner.children.borrow_mut();
            if index >= children.len() {
                return None;
            }
            children.remove(index)
        };
        let ChildLink {
            node,
            _forward: forward,
        } = link;
        drop(forward);
        self.release(&node);
        tracing::debug!(
            message = "node.child_removed",
            schema = self.inner.schema.name(),
            child = node.schema().name(),
            index
        );
        self.children_changed(ChangeKind::Remove);
        Some(node)
    }

    /// Swap the child at `index` for `child`, returning the old one.
    ///
    /// Rejected like [`insert_child`](Self::insert_child) rejects; replacing
    /// a child with itself is a no-op.
    pub fn replace_child(&self, index: usize, child: &Node) -> Option<Node> {
        if index >= self.child_count()
            || self.contains_child(child)
            || child.is_self_or_ancestor_of(self)
        {
            return None;
        }
        if let Some(previous) = child.parent() {
            previous.remove_child(child);
        }

        let link = self.link(child);
        let old = {
            let mut children = self.inner.children.borrow_mut();
            if index >= children.len() {
                return None;
            }
            std::mem::replace(&mut children[index], link)
        };
        let ChildLink {
            node: old,
            _forward: forward,
        } = old;
        drop(forward);
        self.release(&old);
        child.set_parent(Some(self));
        self.children_changed(ChangeKind::Replace);
        Some(old)
    }

    /// Move the child at `from` to position `to` (clamped).
    pub fn move_child(&self, from: usize, to: usize) -> bool {
        {
            let mut children = self.inner.children.borrow_mut();
            if from >= children.len() {
                return false;
            }
            let to = to.min(children.len() - 1);
            if from == to {
                return false;
            }
            let link = children.remove(from);
            children.insert(to, link);
        }
        self.children_changed(ChangeKind::Move);
        true
    }

    /// Detach every child with a single reset notification.
    pub fn clear_children(&self) -> Vec<Node> {
        let links = std::mem::take(&mut *self.inner.children.borrow_mut());
        if links.is_empty() {
            return Vec::new();
        }
        let removed: Vec<Node> = links.into_iter().map(|link| link.node).collect();
        for node in &removed {
            self.release(node);
        }
        self.children_changed(ChangeKind::Reset);
        removed
    }

    fn release(&self, child: &Node) {
        let owned_here = child
            .inner
            .parent
            .borrow()
            .as_ref()
            .is_some_and(|parent| parent.ptr_eq(self));
        if owned_here {
            child.set_parent(None);
        }
    }

    fn link(&self, child: &Node) -> ChildLink {
        let forward = self.inner.config.forward_child_changes.then(|| {
            let parent = self.downgrade();
            child.subscribe(move |event| {
                if let NodeEvent::PropertyChanged(name) = event
                    && let Some(parent) = parent.upgrade()
                {
                    parent.on_child_changed(name);
                }
            })
        });
        ChildLink {
            node: child.clone(),
            _forward: forward,
        }
    }

    fn on_child_changed(&self, name: &str) {
        self.notify_changed(&Arc::from(names::CHILDREN));
        if name == names::HAS_ERRORS {
            self.refresh_error_aggregate();
        }
    }

    /// Re-announce `Errors` when the subtree's error aggregate flipped.
    fn refresh_error_aggregate(&self) {
        let now = self.has_errors();
        if self.inner.errors_reported.replace(now) != now {
            self.notify_changed(&Arc::from(names::ERRORS));
        }
    }

    fn children_changed(&self, kind: ChangeKind) {
        let Some(descriptor) = self.inner.schema.descriptor(names::CHILDREN) else {
            return;
        };
        let name = Arc::clone(descriptor.name_arc());
        let ignore_dirty = descriptor.ignores_dirty();
        self.notify_collection_changed(&name, kind);
        if !ignore_dirty {
            self.mark_dirty();
        }
        self.refresh_error_aggregate();
    }
}
