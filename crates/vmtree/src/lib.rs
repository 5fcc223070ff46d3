#![forbid(unsafe_code)]

//! vmtree public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use vmtree_core as core;

pub mod prelude {
    pub use vmtree_core::{
        ChangeKind, ChangeKinds, CheckState, Declare, Node, NodeConfig, NodeEvent, PropertyError,
        Schema, SchemaBuilder, SchemaError, SourceDecl, Subscription, ValidationRule,
        ValidationSuspension, Value, WeakNode, names, node_for, rules, schema_for,
    };
}
