#![forbid(unsafe_code)]

//! Process-wide schema cache keyed by Rust type.
//!
//! A view-model type declares its properties once through [`Declare`]; the
//! resolved [`Schema`] is built on first use and shared by every instance for
//! the rest of the process.

use std::any::{TypeId, type_name};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use ahash::AHashMap;

use crate::error::SchemaError;
use crate::node::Node;
use crate::schema::{Schema, SchemaBuilder};

/// Static declaration table of a view-model type.
pub trait Declare: 'static {
    /// Schema name; defaults to the Rust type name.
    fn schema_name() -> &'static str {
        type_name::<Self>()
    }

    /// Add this type's properties to `builder`.
    fn declare(builder: SchemaBuilder) -> SchemaBuilder;
}

static SCHEMAS: OnceLock<Mutex<AHashMap<TypeId, Arc<Schema>>>> = OnceLock::new();

fn schemas() -> &'static Mutex<AHashMap<TypeId, Arc<Schema>>> {
    SCHEMAS.get_or_init(|| Mutex::new(AHashMap::new()))
}

/// The resolved schema for `T`.
///
/// The build runs outside the lock. When two threads race on first use, the
/// schema inserted first is kept and both receive it.
pub fn schema_for<T: Declare>() -> Result<Arc<Schema>, SchemaError> {
    let key = TypeId::of::<T>();
    if let Some(schema) = schemas()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Ok(Arc::clone(schema));
    }

    let built = Arc::new(T::declare(SchemaBuilder::new(T::schema_name())).build()?);
    let mut cache = schemas().lock().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(cache.entry(key).or_insert(built)))
}

/// Shorthand for `Node::new(schema_for::<T>()?)`.
pub fn node_for<T: Declare>() -> Result<Node, SchemaError> {
    Ok(Node::new(schema_for::<T>()?))
}
