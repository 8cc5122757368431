pub mod access;
pub mod config;
mod copy;
pub mod duplicate;
pub mod error;
mod fingerprint;
pub mod merge;

pub use access::{EntityCollection, EntityHandle, Wrapper};
pub use config::{AutoSortedPositioning, EngineConfig, DEFAULT_MAX_OWNED_DEPTH};
pub use duplicate::{DuplicateOutcome, PositioningApplied};
pub use error::{EngineError, Warning};
pub use merge::{CommonField, MergeOutcome, MergeReport, MergeState};

use std::sync::Arc;

use lexmodel_core::{
    ConcreteType, EntityId, FieldDescriptor, FieldKind, FieldValue, MultiString, RichText,
    SchemaRegistry, TypeRef,
};
use lexmodel_storage::{EntityRecord, OwnerSlot, Store};
use tracing::{debug, warn};

/// Duplication, merge and typed access over one store.
///
/// Every mutation takes `&mut self`; at most one structural change is in
/// flight per engine.
pub struct Engine<S: Store> {
    registry: Arc<SchemaRegistry>,
    store: S,
    config: EngineConfig,
}

impl<S: Store> Engine<S> {
    pub fn new(registry: Arc<SchemaRegistry>, store: S) -> Self {
        Self::with_config(registry, store, EngineConfig::default())
    }

    pub fn with_config(registry: Arc<SchemaRegistry>, store: S, config: EngineConfig) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn require_writable(&self) -> Result<(), EngineError> {
        if self.store.is_writable() {
            Ok(())
        } else {
            Err(EngineError::ReadOnlyViolation)
        }
    }

    fn require_live(&self, entity_id: EntityId) -> Result<EntityRecord, EngineError> {
        self.store
            .get_entity(entity_id)?
            .ok_or(EngineError::NullEntity(entity_id))
    }

    /// Resolve `field` on `ty` or fail with `FieldNotFound`.
    fn require_field(&self, ty: ConcreteType, field: &str) -> Result<FieldDescriptor, EngineError> {
        self.registry
            .field(ty, field)?
            .ok_or_else(|| EngineError::FieldNotFound {
                ty,
                field: field.to_string(),
            })
    }

    fn require_kind(
        &self,
        entity_id: EntityId,
        field: &str,
        expected: FieldKind,
    ) -> Result<FieldDescriptor, EngineError> {
        let record = self.require_live(entity_id)?;
        let descriptor = self.require_field(record.ty, field)?;
        if descriptor.kind != expected {
            return Err(EngineError::FieldKindMismatch {
                field: field.to_string(),
                expected: expected.as_str(),
                found: descriptor.kind,
            });
        }
        Ok(descriptor)
    }

    /// Run `f` as one unit of work: committed on success, rolled back on any error.
    fn unit_of_work<T>(
        &mut self,
        label: &str,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        self.store.begin_unit_of_work()?;

        let result = f(self);

        match result {
            Ok(value) => {
                self.store.commit_unit_of_work()?;
                Ok(value)
            }
            Err(e) => {
                warn!("{} rolled back: {}", label, e);
                let _ = self.store.rollback_unit_of_work();
                Err(e)
            }
        }
    }

    // ========================================================================
    // Typed Commands
    // ========================================================================

    /// Create an unowned entity.
    pub fn create(&mut self, ty: ConcreteType) -> Result<EntityHandle, EngineError> {
        self.require_writable()?;
        self.registry.schema(ty)?;
        let id = self.store.create_instance(ty, None)?;
        debug!("created {} {}", ty, id);
        Ok(EntityHandle { id, ty })
    }

    /// Create an entity appended to an owning field of `owner`.
    pub fn create_owned(
        &mut self,
        owner: EntityId,
        field: &str,
        ty: ConcreteType,
    ) -> Result<EntityHandle, EngineError> {
        self.require_writable()?;
        self.registry.schema(ty)?;
        let owner_record = self.require_live(owner)?;
        let descriptor = self.require_field(owner_record.ty, field)?;
        if !descriptor.kind.is_owning() {
            return Err(EngineError::FieldKindMismatch {
                field: field.to_string(),
                expected: "owning field",
                found: descriptor.kind,
            });
        }
        if let Some(target) = descriptor.target {
            self.require_target(target, field, ty)?;
        }
        if descriptor.kind == FieldKind::OwnedAtomic
            && !self.store.owned_children(owner, field)?.is_empty()
        {
            return Err(EngineError::AtomicSlotOccupied {
                owner,
                field: field.to_string(),
            });
        }

        let id = self
            .store
            .create_instance(ty, Some(OwnerSlot::append(owner, field)))?;
        debug!("created {} {} under {}.{}", ty, id, owner, field);
        Ok(EntityHandle { id, ty })
    }

    fn require_target(&self, target: TypeRef, field: &str, ty: ConcreteType) -> Result<(), EngineError> {
        if self.registry.accepts(target, ty) {
            Ok(())
        } else {
            Err(EngineError::TargetTypeRejected {
                field: field.to_string(),
                ty,
            })
        }
    }

    pub fn set_scalar(
        &mut self,
        entity_id: EntityId,
        field: &str,
        value: FieldValue,
    ) -> Result<(), EngineError> {
        self.require_writable()?;
        self.require_kind(entity_id, field, FieldKind::Scalar)?;
        self.store.set_scalar(entity_id, field, value)?;
        Ok(())
    }

    pub fn set_localized(
        &mut self,
        entity_id: EntityId,
        field: &str,
        value: &MultiString,
    ) -> Result<(), EngineError> {
        self.require_writable()?;
        self.require_kind(entity_id, field, FieldKind::LocalizedString)?;
        self.store.set_localized(entity_id, field, value)?;
        Ok(())
    }

    pub fn set_rich(
        &mut self,
        entity_id: EntityId,
        field: &str,
        value: &RichText,
    ) -> Result<(), EngineError> {
        self.require_writable()?;
        self.require_kind(entity_id, field, FieldKind::RichText)?;
        self.store.set_rich(entity_id, field, value)?;
        Ok(())
    }

    /// Replace the targets of a reference field. Targets are not required to resolve.
    pub fn set_references(
        &mut self,
        entity_id: EntityId,
        field: &str,
        targets: &[EntityId],
    ) -> Result<(), EngineError> {
        self.require_writable()?;
        let record = self.require_live(entity_id)?;
        let descriptor = self.require_field(record.ty, field)?;
        if !descriptor.kind.is_reference() {
            return Err(EngineError::FieldKindMismatch {
                field: field.to_string(),
                expected: "reference field",
                found: descriptor.kind,
            });
        }
        if descriptor.kind == FieldKind::RefAtomic && targets.len() > 1 {
            return Err(EngineError::AtomicSlotOccupied {
                owner: entity_id,
                field: field.to_string(),
            });
        }
        self.store.set_references(entity_id, field, targets)?;
        Ok(())
    }

    /// Add one target: replaces an atomic reference, appends to a sequence,
    /// and is a no-op on a collection that already holds it.
    pub fn add_reference(
        &mut self,
        entity_id: EntityId,
        field: &str,
        target: EntityId,
    ) -> Result<(), EngineError> {
        self.require_writable()?;
        let record = self.require_live(entity_id)?;
        let descriptor = self.require_field(record.ty, field)?;
        let targets = match descriptor.kind {
            FieldKind::RefAtomic => vec![target],
            FieldKind::RefSequence => {
                let mut targets = self.store.get_references(entity_id, field)?;
                targets.push(target);
                targets
            }
            FieldKind::RefCollection => {
                let mut targets = self.store.get_references(entity_id, field)?;
                if targets.contains(&target) {
                    return Ok(());
                }
                targets.push(target);
                targets
            }
            other => {
                return Err(EngineError::FieldKindMismatch {
                    field: field.to_string(),
                    expected: "reference field",
                    found: other,
                });
            }
        };
        self.store.set_references(entity_id, field, &targets)?;
        Ok(())
    }

    /// Delete an entity and its owned subtree. Returns every removed id.
    pub fn delete(&mut self, entity_id: EntityId) -> Result<Vec<EntityId>, EngineError> {
        self.require_writable()?;
        self.require_live(entity_id)?;
        Ok(self.store.delete_entity(entity_id)?)
    }

    // ========================================================================
    // Query Pass-Through
    // ========================================================================

    pub fn entity(&self, entity_id: EntityId) -> Result<Option<EntityRecord>, EngineError> {
        Ok(self.store.get_entity(entity_id)?)
    }

    pub fn describe(&self, ty: ConcreteType) -> Result<&[FieldDescriptor], EngineError> {
        Ok(self.registry.describe(ty)?)
    }

    /// Typed view of a live entity.
    pub fn wrap(&self, entity_id: EntityId) -> Result<Wrapper<'_, S>, EngineError> {
        let record = self.require_live(entity_id)?;
        Ok(Wrapper::new(&self.registry, &self.store, record))
    }

    /// Members of an owning field, in stored order.
    pub fn collect_owned(
        &self,
        owner: EntityId,
        field: &str,
    ) -> Result<EntityCollection, EngineError> {
        let members = self.wrap(owner)?.owned(field)?;
        let mut handles = Vec::with_capacity(members.len());
        for id in members {
            let record = self.require_live(id)?;
            handles.push(EntityHandle::from(&record));
        }
        Ok(EntityCollection::new(Arc::clone(&self.registry), handles))
    }

    /// Every live entity in the store.
    pub fn collect_all(&self) -> Result<EntityCollection, EngineError> {
        let handles = self
            .store
            .live_entities()?
            .iter()
            .map(EntityHandle::from)
            .collect();
        Ok(EntityCollection::new(Arc::clone(&self.registry), handles))
    }
}
