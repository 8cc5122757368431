use lexmodel_core::{ConcreteType, CoreError, EntityId, FieldKind, SchemaError};
use lexmodel_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("source entity not found: {0}")]
    SourceNotFound(EntityId),

    #[error("no factory can instantiate {0}")]
    CloneUnsupported(ConcreteType),

    #[error("store is read-only")]
    ReadOnlyViolation,

    #[error("entity does not resolve: {0}")]
    NullEntity(EntityId),

    #[error("cannot merge {0} into itself")]
    SelfMerge(EntityId),

    #[error("cannot merge {victim} into {survivor}: the survivor is owned by it")]
    SurvivorOwnedByVictim { survivor: EntityId, victim: EntityId },

    #[error("merge report is stale: {0}")]
    StaleReport(String),

    #[error("{ty} has no field {field}")]
    FieldNotFound { ty: ConcreteType, field: String },

    #[error("field {field} is {found}, not {expected}")]
    FieldKindMismatch {
        field: String,
        expected: &'static str,
        found: FieldKind,
    },

    #[error("field {field} does not accept {ty}")]
    TargetTypeRejected { field: String, ty: ConcreteType },

    #[error("{0} keeps its owning collection sorted; positional insert rejected")]
    PositioningRejected(ConcreteType),

    #[error("{owner} holds a single child in {field}")]
    AtomicSlotOccupied { owner: EntityId, field: String },

    #[error("ownership nesting exceeds {0} levels")]
    OwnershipDepthExceeded(usize),
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NoFactory(ty) => EngineError::CloneUnsupported(ty),
            StorageError::ReadOnly => EngineError::ReadOnlyViolation,
            StorageError::Schema(e) => EngineError::Schema(e),
            other => EngineError::Storage(other),
        }
    }
}

/// Non-fatal conditions surfaced alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A reference target did not resolve; the edge was left out.
    DanglingReference {
        source: EntityId,
        field: String,
        target: EntityId,
    },
}
