#![forbid(unsafe_code)]

//! Observable view-model nodes.
//!
//! # Design
//!
//! [`Node`] is a cheaply cloneable handle over `Rc` shared state, in the same
//! single-threaded shape as the rest of the crate: all notification happens
//! synchronously on the thread that performed the write, and handlers may
//! re-enter the node. No `RefCell` borrow is held while a handler runs.
//!
//! A successful write runs one call chain:
//!
//! 1. "changing" for the property, then the store update.
//! 2. "changed" for the property, then one "changed" per cascaded dependent.
//! 3. Validation of the property, unless suspended.
//! 4. The dirty flag, unless the property is exempt.
//!
//! # Invariants
//!
//! 1. Writing a value equal to the stored one raises nothing.
//! 2. While `IsReadOnly` is set, every public write except the one to
//!    `IsReadOnly` is dropped silently, without events.
//! 3. `IsDirty` is never cleared by the engine.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use crate::config::NodeConfig;
use crate::error::{PropertyError, Result};
use crate::event::{EventHub, NodeEvent, Subscription};
use crate::schema::{PropertyDescriptor, PropertyKind, Schema, names};
use crate::tree::ChildLink;
use crate::validation::ValidationState;
use crate::value::{ChangeKind, FromValue, Value, ValueKind};

pub(crate) struct NodeInner {
    pub(crate) schema: Arc<Schema>,
    pub(crate) config: NodeConfig,
    pub(crate) values: RefCell<AHashMap<Arc<str>, Value>>,
    pub(crate) events: EventHub,
    pub(crate) parent: RefCell<Option<WeakNode>>,
    pub(crate) parent_link: RefCell<Option<Subscription>>,
    pub(crate) children: RefCell<Vec<ChildLink>>,
    pub(crate) validation: RefCell<ValidationState>,
    pub(crate) suspend_depth: Cell<u32>,
    pub(crate) check_guard: Cell<bool>,
    /// Error aggregate as last announced through `Errors`.
    pub(crate) errors_reported: Cell<bool>,
}

/// Whether a write honours the read-only gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteGate {
    /// Caller-initiated writes.
    Public,
    /// Engine bookkeeping (dirty flag, suspension mirror).
    Engine,
}

/// A view-model instance.
///
/// Cloning creates another handle to the **same** node; identity is
/// compared with [`ptr_eq`](Node::ptr_eq).
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Rc<NodeInner>,
}

/// Non-owning handle to a [`Node`].
#[derive(Clone, Default)]
pub struct WeakNode {
    inner: Weak<NodeInner>,
}

impl WeakNode {
    #[must_use]
    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }

    #[must_use]
    pub fn ptr_eq(&self, node: &Node) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Rc::as_ptr(&node.inner))
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakNode")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Node");
        out.field("schema", &self.inner.schema.name());
        if let Ok(values) = self.inner.values.try_borrow() {
            let mut stored: Vec<_> = values.iter().collect();
            stored.sort_by(|a, b| a.0.cmp(b.0));
            out.field("values", &stored);
        }
        if let Ok(children) = self.inner.children.try_borrow() {
            out.field("children", &children.len());
        }
        out.finish()
    }
}

impl Node {
    /// Create a node of the given type with the default configuration.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, NodeConfig::default())
    }

    #[must_use]
    pub fn with_config(schema: Arc<Schema>, config: NodeConfig) -> Self {
        let values: AHashMap<Arc<str>, Value> = schema
            .properties()
            .filter_map(|p| match p.kind() {
                PropertyKind::Stored { default } => Some((Arc::clone(p.name_arc()), default.clone())),
                _ => None,
            })
            .collect();
        Self {
            inner: Rc::new(NodeInner {
                schema,
                config,
                values: RefCell::new(values),
                events: EventHub::new(),
                parent: RefCell::new(None),
                parent_link: RefCell::new(None),
                children: RefCell::new(Vec::new()),
                validation: RefCell::new(ValidationState::default()),
                suspend_depth: Cell::new(0),
                check_guard: Cell::new(false),
                errors_reported: Cell::new(false),
            }),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.inner.schema
    }

    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Observe every event this node raises.
    pub fn subscribe(&self, callback: impl Fn(&NodeEvent) + 'static) -> Subscription {
        self.inner.events.subscribe(callback)
    }

    /// Call `on_change(name)` whenever one of `names` raises "changed".
    ///
    /// This is the hook for command objects that re-check an enablement
    /// predicate when its inputs change.
    pub fn watch<I, S>(&self, names: I, on_change: impl Fn(&str) + 'static) -> Subscription
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let watched: AHashSet<String> = names.into_iter().map(|n| n.as_ref().to_owned()).collect();
        self.subscribe(move |event| {
            if let NodeEvent::PropertyChanged(name) = event
                && watched.contains(&**name)
            {
                on_change(name);
            }
        })
    }

    pub(crate) fn emit(&self, event: NodeEvent) {
        self.inner.events.emit(&event);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub(crate) fn descriptor(&self, name: &str) -> Result<&PropertyDescriptor> {
        if name.trim().is_empty() {
            return Err(PropertyError::BlankName);
        }
        self.inner
            .schema
            .descriptor(name)
            .ok_or_else(|| PropertyError::unknown(self.inner.schema.name(), name))
    }

    /// Current value of a stored or computed property.
    pub fn get(&self, name: &str) -> Result<Value> {
        let descriptor = self.descriptor(name)?;
        match descriptor.kind() {
            PropertyKind::Stored { .. } => Ok(self.stored(name)),
            PropertyKind::Computed { compute, .. } => Ok(compute(self)),
            PropertyKind::Collection => Err(PropertyError::Collection {
                name: name.to_owned(),
            }),
            PropertyKind::Signal => Err(PropertyError::Signal {
                name: name.to_owned(),
            }),
        }
    }

    /// Typed read; a value of another kind reads as a type mismatch.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get(name)?;
        T::from_value(&value).ok_or_else(|| PropertyError::TypeMismatch {
            name: name.to_owned(),
            expected: declared_kind(self.descriptor(name).ok()),
            actual: value.kind(),
        })
    }

    pub(crate) fn stored(&self, name: &str) -> Value {
        self.inner
            .values
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn stored_flag(&self, name: &str) -> bool {
        self.inner
            .values
            .borrow()
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.stored_flag(names::IS_DIRTY)
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.stored_flag(names::IS_READ_ONLY)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write a stored property.
    ///
    /// Returns `Ok(true)` when the value changed and notifications fired,
    /// `Ok(false)` for an equal value or a write dropped by the read-only
    /// gate.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let descriptor = self.descriptor(name)?;
        match descriptor.kind() {
            PropertyKind::Stored { default } => {
                if !value.fits(default.kind()) {
                    return Err(PropertyError::TypeMismatch {
                        name: name.to_owned(),
                        expected: default.kind(),
                        actual: value.kind(),
                    });
                }
            }
            PropertyKind::Computed { .. } => {
                return Err(PropertyError::Computed {
                    name: name.to_owned(),
                });
            }
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
        }

        if name == names::IS_CHECKED && self.inner.schema.is_checkable() {
            return Ok(self.set_checked(value.as_bool()));
        }
        Ok(self.write(name, value, WriteGate::Public))
    }

    pub fn set_read_only(&self, read_only: bool) -> bool {
        self.write(names::IS_READ_ONLY, Value::Bool(read_only), WriteGate::Public)
    }

    /// Explicitly reset the dirty flag. The engine never does this itself.
    pub fn mark_clean(&self) -> bool {
        self.write(names::IS_DIRTY, Value::Bool(false), WriteGate::Engine)
    }

    /// Dirty this node and every ancestor that listens to its children.
    ///
    /// Ancestors are walked directly; a forwarded `Children` change never
    /// dirties on its own.
    pub(crate) fn mark_dirty(&self) {
        if self.inner.config.track_dirty {
            self.write(names::IS_DIRTY, Value::Bool(true), WriteGate::Engine);
        }
        if let Some(parent) = self.parent()
            && parent.inner.config.forward_child_changes
            && parent.contains_child(self)
        {
            parent.mark_dirty();
        }
    }

    /// The single write path behind every stored-property change.
    pub(crate) fn write(&self, name: &str, value: Value, gate: WriteGate) -> bool {
        let Some(descriptor) = self.inner.schema.descriptor(name) else {
            return false;
        };
        let name = Arc::clone(descriptor.name_arc());
        let ignore_dirty = descriptor.ignores_dirty();

        if gate == WriteGate::Public && &*name != names::IS_READ_ONLY && self.is_read_only() {
            tracing::debug!(
                message = "node.write_blocked",
                schema = self.inner.schema.name(),
                property = &*name
            );
            return false;
        }
        if self.inner.values.borrow().get(&name) == Some(&value) {
            return false;
        }

        self.emit(NodeEvent::PropertyChanging(Arc::clone(&name)));
        self.inner.values.borrow_mut().insert(Arc::clone(&name), value);
        self.notify_changed(&name);

        if self.has_rules_for(&name) && !self.is_validation_suspended() {
            self.validate_property(&name);
        }
        if !ignore_dirty {
            self.mark_dirty();
        }
        true
    }

    // -----------------------------------------------------------------------
    // Notification
    // -----------------------------------------------------------------------

    /// Announce that `name` changed and cascade to its dependents.
    ///
    /// Use this when the data behind a computed property changed without
    /// going through [`set`](Self::set). Names outside the schema are
    /// announced as-is.
    pub fn raise_changed(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(PropertyError::BlankName);
        }
        let name = self
            .inner
            .schema
            .descriptor(name)
            .map_or_else(|| Arc::from(name), |d| Arc::clone(d.name_arc()));
        self.notify_changed(&name);
        Ok(())
    }

    pub(crate) fn notify_changed(&self, name: &Arc<str>) {
        self.emit(NodeEvent::PropertyChanged(Arc::clone(name)));
        let dependents = self.inner.schema.graph().cascade(name);
        if !dependents.is_empty() {
            tracing::trace!(
                message = "node.cascade",
                schema = self.inner.schema.name(),
                origin = &**name,
                dependents = dependents.len()
            );
        }
        for dependent in dependents {
            self.emit(NodeEvent::PropertyChanged(dependent));
        }
    }

    /// Announce a structural change of the collection `name`.
    ///
    /// Raises the collection event, cascades to the dependents keyed by
    /// `(name, kind)` and dirties the node unless the collection is exempt.
    pub fn raise_collection_changed(&self, name: &str, kind: ChangeKind) -> Result<()> {
        let descriptor = self.descriptor(name)?;
        if !matches!(descriptor.kind(), PropertyKind::Collection) {
            return Err(PropertyError::NotACollection {
                name: name.to_owned(),
            });
        }
        let name = Arc::clone(descriptor.name_arc());
        let ignore_dirty = descriptor.ignores_dirty();
        self.notify_collection_changed(&name, kind);
        if !ignore_dirty {
            self.mark_dirty();
        }
        Ok(())
    }

    pub(crate) fn notify_collection_changed(&self, name: &Arc<str>, kind: ChangeKind) {
        self.emit(NodeEvent::CollectionChanged {
            property: Arc::clone(name),
            kind,
        });
        for dependent in self.inner.schema.graph().cascade_collection(name, kind) {
            self.emit(NodeEvent::PropertyChanged(dependent));
        }
    }
}

fn declared_kind(descriptor: Option<&PropertyDescriptor>) -> ValueKind {
    match descriptor.map(PropertyDescriptor::kind) {
        Some(PropertyKind::Stored { default }) => default.kind(),
        _ => ValueKind::Null,
    }
}
