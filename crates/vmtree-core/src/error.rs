#![forbid(unsafe_code)]

//! Error types for schema registration and property access.
//!
//! Contract violations are reported synchronously at the call site. Failed
//! validation rules are *not* errors: they are recorded as per-property
//! messages by the validation engine.

use thiserror::Error;

use crate::value::ValueKind;

/// Registration-time violations of a dependency contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("property name must not be blank")]
    BlankName,

    #[error("property `{name}` is declared more than once on `{schema}`")]
    DuplicateProperty { schema: String, name: String },

    #[error("`{dependent}` depends on `{source_name}`, which does not exist on `{schema}`")]
    UnknownSource {
        schema: String,
        dependent: String,
        source_name: String,
    },

    #[error("`{dependent}` declares collection changes on `{source_name}`, which is not a collection")]
    NotACollection {
        dependent: String,
        source_name: String,
    },

    #[error("`{dependent}` declares an empty change-kind set for `{source_name}`")]
    EmptyChangeKinds {
        dependent: String,
        source_name: String,
    },

    #[error("dependency cycle on `{schema}` through: {}", .members.join(", "))]
    Cycle { schema: String, members: Vec<String> },
}

/// Call-site violations when reading, writing or notifying a property.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("property name must not be blank")]
    BlankName,

    #[error("no property `{name}` on `{schema}`")]
    Unknown { schema: String, name: String },

    #[error("`{name}` is computed and has no setter")]
    Computed { name: String },

    #[error("`{name}` is a collection and holds no scalar value")]
    Collection { name: String },

    #[error("`{name}` is not a collection")]
    NotACollection { name: String },

    #[error("`{name}` is a notification signal and holds no value")]
    Signal { name: String },

    #[error("`{name}` holds {expected:?} values, got {actual:?}")]
    TypeMismatch {
        name: String,
        expected: ValueKind,
        actual: ValueKind,
    },
}

impl PropertyError {
    pub(crate) fn unknown(schema: &str, name: &str) -> Self {
        Self::Unknown {
            schema: schema.to_owned(),
            name: name.to_owned(),
        }
    }
}

pub type Result<T, E = PropertyError> = std::result::Result<T, E>;
