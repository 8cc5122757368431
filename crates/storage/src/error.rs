use lexmodel_core::{ConcreteType, CoreError, FieldKind, SchemaError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no factory registered for {0}")]
    NoFactory(ConcreteType),

    #[error("store is read-only")]
    ReadOnly,

    #[error("field {field} on {entity_id} holds {found}, expected {expected}")]
    KindMismatch {
        entity_id: String,
        field: String,
        expected: FieldKind,
        found: FieldKind,
    },

    #[error("no unit of work in progress")]
    NoUnitOfWork,

    #[error("a unit of work is already in progress")]
    UnitOfWorkActive,

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}
