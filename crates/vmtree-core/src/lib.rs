#![forbid(unsafe_code)]

//! Core: observable view-model nodes, dependency cascades, ownership trees,
//! validation and tri-state checks.
//!
//! A type declares its properties once in a [`Schema`]; the schema resolves
//! which computed properties re-announce when a source changes. [`Node`]s of
//! that type carry the values, raise [`NodeEvent`]s synchronously on write,
//! and link into parent/child trees that aggregate dirtiness, validation
//! errors and check state.
//!
//! ```
//! use std::sync::Arc;
//! use vmtree_core::{Node, SchemaBuilder, SourceDecl, Value};
//!
//! let schema = SchemaBuilder::new("Greeting")
//!     .property("Name", "world")
//!     .computed("Text", [SourceDecl::property("Name")], |node| {
//!         let name = node.get_as::<String>("Name").unwrap_or_default();
//!         Value::from(format!("hello {name}"))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let node = Node::new(Arc::new(schema));
//! node.set("Name", "there").unwrap();
//! assert_eq!(node.get("Text").unwrap(), Value::from("hello there"));
//! assert!(node.is_dirty());
//! ```

pub mod check;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod node;
pub mod registry;
pub mod schema;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
mod tree;
pub mod validation;
pub mod value;

pub use check::CheckState;
pub use config::NodeConfig;
pub use error::{PropertyError, SchemaError};
pub use event::{EventHub, NodeEvent, Subscription};
pub use graph::DependencyGraph;
pub use node::{Node, WeakNode};
pub use registry::{Declare, node_for, schema_for};
pub use schema::{PropertyDescriptor, PropertyKind, Schema, SchemaBuilder, SourceDecl, names};
pub use validation::{RuleId, ValidationRule, ValidationSuspension, rules};
pub use value::{ChangeKind, ChangeKinds, FromValue, Value, ValueKind};
