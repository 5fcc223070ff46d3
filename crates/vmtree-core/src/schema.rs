#![forbid(unsafe_code)]

//! Per-type property declarations.
//!
//! A [`Schema`] is the explicit registration table of a view-model type: the
//! stored properties with their defaults, the computed properties with their
//! source declarations, and the collection-valued properties. It is built
//! once per type through a [`SchemaBuilder`], validated at build time, and
//! shared by every [`Node`](crate::Node) of that type.
//!
//! # Built-in properties
//!
//! Every schema carries the properties the engine itself maintains (see
//! [`names`]). [`SchemaBuilder::checkable`] adds the tree-check pair.
//!
//! # Failure Modes
//!
//! - **Unknown source**: a computed property naming a property that does not
//!   exist is rejected by [`SchemaBuilder::build`].
//! - **Cycle**: declared dependencies that loop back on themselves are
//!   rejected as well; the cascade never has to under-notify a cycle.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::SchemaError;
use crate::graph::DependencyGraph;
use crate::node::Node;
use crate::value::{ChangeKinds, Value};

/// Names of the properties the engine maintains on every node.
pub mod names {
    /// Modified flag. Never cleared by the engine.
    pub const IS_DIRTY: &str = "IsDirty";
    /// Blocks every write except the write to itself.
    pub const IS_READ_ONLY: &str = "IsReadOnly";
    /// Mirrors the effective suspension state; children copy their parent's.
    pub const VALIDATION_SUSPENDED: &str = "ValidationSuspended";
    /// The ordered child set.
    pub const CHILDREN: &str = "Children";
    /// Raised whenever the node's own error state changes.
    pub const ERRORS: &str = "Errors";
    /// Local errors or any descendant's errors.
    pub const HAS_ERRORS: &str = "HasErrors";
    /// Negation of [`HAS_ERRORS`].
    pub const IS_VALID: &str = "IsValid";
    /// Tri-state check value, on checkable schemas only.
    pub const IS_CHECKED: &str = "IsChecked";
    /// UI expansion flag, on checkable schemas only.
    pub const IS_EXPANDED: &str = "IsExpanded";
}

/// Evaluates a computed property against the node it belongs to.
pub type ComputeFn = Arc<dyn Fn(&Node) -> Value + Send + Sync>;

/// One `(source, kinds?)` entry of a computed property's declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDecl {
    property: Arc<str>,
    kinds: Option<ChangeKinds>,
}

impl SourceDecl {
    /// Depend on scalar changes of `property`.
    #[must_use]
    pub fn property(property: impl AsRef<str>) -> Self {
        Self {
            property: Arc::from(property.as_ref()),
            kinds: None,
        }
    }

    /// Depend on structural changes of the collection `property`.
    #[must_use]
    pub fn collection(property: impl AsRef<str>, kinds: impl Into<ChangeKinds>) -> Self {
        Self {
            property: Arc::from(property.as_ref()),
            kinds: Some(kinds.into()),
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.property
    }

    pub(crate) fn source_arc(&self) -> &Arc<str> {
        &self.property
    }

    #[must_use]
    pub fn kinds(&self) -> Option<ChangeKinds> {
        self.kinds
    }
}

/// How a property obtains its value.
#[derive(Clone)]
pub enum PropertyKind {
    /// Independent storage initialised to `default`. The default also fixes
    /// the accepted value kind, unless it is null.
    Stored { default: Value },
    /// Derived from other properties; has no setter.
    Computed {
        sources: Vec<SourceDecl>,
        compute: ComputeFn,
    },
    /// A collection owned outside the store; only its structural changes are
    /// observed.
    Collection,
    /// A notification-only name without a value.
    Signal,
}

impl fmt::Debug for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored { default } => f.debug_struct("Stored").field("default", default).finish(),
            Self::Computed { sources, .. } => f
                .debug_struct("Computed")
                .field("sources", sources)
                .finish_non_exhaustive(),
            Self::Collection => f.write_str("Collection"),
            Self::Signal => f.write_str("Signal"),
        }
    }
}

/// Declaration of one named property.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    name: Arc<str>,
    kind: PropertyKind,
    ignore_dirty: bool,
}

impl PropertyDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    /// Whether a change of this property leaves the dirty flag alone.
    #[must_use]
    pub fn ignores_dirty(&self) -> bool {
        self.ignore_dirty
    }

    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self.kind, PropertyKind::Computed { .. })
    }

    /// Source declarations; empty unless computed.
    #[must_use]
    pub fn sources(&self) -> &[SourceDecl] {
        match &self.kind {
            PropertyKind::Computed { sources, .. } => sources,
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// The resolved declaration table of one view-model type.
///
/// Read-only once built; share it behind an `Arc` across all instances.
pub struct Schema {
    name: String,
    properties: Vec<PropertyDescriptor>,
    index: AHashMap<Arc<str>, usize>,
    graph: DependencyGraph,
    checkable: bool,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("properties", &self.properties.len())
            .field("edges", &self.graph.edge_count())
            .field("checkable", &self.checkable)
            .finish()
    }
}

impl Schema {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.index.get(name).map(|&i| &self.properties[i])
    }

    /// All descriptors in declaration order, built-ins first.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter()
    }

    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    #[must_use]
    pub fn is_checkable(&self) -> bool {
        self.checkable
    }

    /// Declared sources of `name`, for consumers that re-evaluate a
    /// predicate whenever one of them changes.
    #[must_use]
    pub fn sources_of(&self, name: &str) -> &[SourceDecl] {
        self.descriptor(name)
            .map(PropertyDescriptor::sources)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects property declarations and resolves them into a [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    properties: Vec<PropertyDescriptor>,
    checkable: bool,
}

impl SchemaBuilder {
    /// Start a schema named `name` with the engine's built-in properties.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let builder = Self {
            name: name.into(),
            properties: Vec::new(),
            checkable: false,
        };
        builder
            .stored(names::IS_DIRTY, Value::Bool(false), true)
            .stored(names::IS_READ_ONLY, Value::Bool(false), false)
            .stored(names::VALIDATION_SUSPENDED, Value::Bool(false), true)
            .push(names::CHILDREN, PropertyKind::Collection, false)
            .push(names::ERRORS, PropertyKind::Signal, true)
            .derived(
                names::HAS_ERRORS,
                vec![
                    SourceDecl::collection(names::CHILDREN, ChangeKinds::STRUCTURAL),
                    SourceDecl::property(names::ERRORS),
                ],
                Arc::new(|node: &Node| Value::Bool(node.has_errors())),
            )
            .derived(
                names::IS_VALID,
                vec![SourceDecl::property(names::HAS_ERRORS)],
                Arc::new(|node: &Node| Value::Bool(node.is_valid())),
            )
    }

    /// Declare a stored property.
    #[must_use]
    pub fn property(self, name: impl AsRef<str>, default: impl Into<Value>) -> Self {
        self.stored(name.as_ref(), default.into(), false)
    }

    /// Declare a stored property whose changes never dirty the node.
    #[must_use]
    pub fn property_ignoring_dirty(self, name: impl AsRef<str>, default: impl Into<Value>) -> Self {
        self.stored(name.as_ref(), default.into(), true)
    }

    /// Declare a computed property.
    ///
    /// `compute` runs on every read; `sources` decide when the property
    /// re-announces change.
    #[must_use]
    pub fn computed<F>(
        self,
        name: impl AsRef<str>,
        sources: impl IntoIterator<Item = SourceDecl>,
        compute: F,
    ) -> Self
    where
        F: Fn(&Node) -> Value + Send + Sync + 'static,
    {
        self.derived(
            name.as_ref(),
            sources.into_iter().collect(),
            Arc::new(compute),
        )
    }

    /// Declare a collection-valued property.
    #[must_use]
    pub fn collection(self, name: impl AsRef<str>) -> Self {
        self.push(name.as_ref(), PropertyKind::Collection, false)
    }

    /// Declare a collection-valued property whose changes never dirty the node.
    #[must_use]
    pub fn collection_ignoring_dirty(self, name: impl AsRef<str>) -> Self {
        self.push(name.as_ref(), PropertyKind::Collection, true)
    }

    /// Make nodes of this type tree-check participants.
    #[must_use]
    pub fn checkable(mut self) -> Self {
        if self.checkable {
            return self;
        }
        self.checkable = true;
        self.stored(names::IS_CHECKED, Value::Bool(false), false)
            .stored(names::IS_EXPANDED, Value::Bool(false), true)
    }

    /// Validate the declarations and resolve the dependency graph.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut index = AHashMap::with_capacity(self.properties.len());
        for (i, property) in self.properties.iter().enumerate() {
            if property.name.trim().is_empty() {
                return Err(SchemaError::BlankName);
            }
            if index.insert(Arc::clone(&property.name), i).is_some() {
                return Err(SchemaError::DuplicateProperty {
                    schema: self.name.clone(),
                    name: property.name.to_string(),
                });
            }
        }

        let graph = DependencyGraph::resolve(&self.name, &self.properties, &index)?;
        tracing::debug!(
            message = "schema.resolved",
            schema = %self.name,
            properties = self.properties.len(),
            edges = graph.edge_count()
        );

        Ok(Schema {
            name: self.name,
            properties: self.properties,
            index,
            graph,
            checkable: self.checkable,
        })
    }

    fn stored(self, name: &str, default: Value, ignore_dirty: bool) -> Self {
        self.push(name, PropertyKind::Stored { default }, ignore_dirty)
    }

    fn derived(self, name: &str, sources: Vec<SourceDecl>, compute: ComputeFn) -> Self {
        self.push(name, PropertyKind::Computed { sources, compute }, true)
    }

    fn push(mut self, name: &str, kind: PropertyKind, ignore_dirty: bool) -> Self {
        self.properties.push(PropertyDescriptor {
            name: Arc::from(name),
            kind,
            ignore_dirty,
        });
        self
    }
}
