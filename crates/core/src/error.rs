use thiserror::Error;

use crate::types::ConcreteType;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("type not registered: {0}")]
    UnknownType(ConcreteType),

    #[error("unknown type name: {0}")]
    UnknownTypeName(String),

    #[error("field {field} declared twice on {owner}")]
    DuplicateField { owner: String, field: &'static str },

    #[error("{ty} declares base {base} which is not registered")]
    UnknownBase { ty: ConcreteType, base: String },
}
