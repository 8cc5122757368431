//! Per-field copy strategies.
//!
//! Every field is copied by exactly one strategy chosen from its
//! [`FieldKind`]: value kinds are cloned, owning kinds are cloned
//! recursively under the new owner, reference kinds share their targets.

use lexmodel_core::{
    ConcreteType, EntityId, FieldDescriptor, FieldKind, RichText, SchemaRegistry,
};
use lexmodel_storage::{OwnerSlot, Store};
use tracing::{debug, warn};

use crate::error::{EngineError, Warning};

pub(crate) struct FieldCopier<'a, S: Store> {
    registry: &'a SchemaRegistry,
    store: &'a mut S,
    max_depth: usize,
    warnings: Vec<Warning>,
}

impl<'a, S: Store> FieldCopier<'a, S> {
    pub(crate) fn new(registry: &'a SchemaRegistry, store: &'a mut S, max_depth: usize) -> Self {
        Self {
            registry,
            store,
            max_depth,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    pub(crate) fn store(&mut self) -> &mut S {
        &mut *self.store
    }

    /// Copy every field of `source` onto `clone`, both of type `ty`. Owning
    /// fields are left empty unless `deep`.
    pub(crate) fn copy_fields(
        &mut self,
        ty: ConcreteType,
        source: EntityId,
        clone: EntityId,
        deep: bool,
        depth: usize,
    ) -> Result<(), EngineError> {
        let registry = self.registry;
        for field in registry.describe(ty)? {
            if field.kind.is_owning() && !deep {
                debug!("shallow copy leaves {}.{} empty", ty, field.name);
                continue;
            }
            self.copy_field(field, source, clone, depth)?;
        }
        Ok(())
    }

    pub(crate) fn copy_field(
        &mut self,
        field: &FieldDescriptor,
        source: EntityId,
        clone: EntityId,
        depth: usize,
    ) -> Result<(), EngineError> {
        let name = field.name;
        match field.kind {
            FieldKind::Scalar => {
                if let Some(value) = self.store.get_scalar(source, name)? {
                    self.store.set_scalar(clone, name, value)?;
                }
            }
            FieldKind::LocalizedString => {
                if let Some(value) = self.store.get_localized(source, name)? {
                    self.store.set_localized(clone, name, &value)?;
                }
            }
            FieldKind::RichText => {
                if let Some(value) = self.store.get_rich(source, name)? {
                    let rebuilt = RichText::from_plain(value.plain_text(), value.ws());
                    self.store.set_rich(clone, name, &rebuilt)?;
                }
            }
            FieldKind::OwnedAtomic | FieldKind::OwnedSequence | FieldKind::OwnedCollection => {
                for child in self.store.owned_children(source, name)? {
                    self.clone_owned(child, clone, name, depth + 1)?;
                }
            }
            FieldKind::RefAtomic | FieldKind::RefSequence | FieldKind::RefCollection => {
                let targets = self.live_targets(source, name)?;
                if !targets.is_empty() {
                    self.store.set_references(clone, name, &targets)?;
                }
            }
        }
        Ok(())
    }

    /// Reference targets of `source.field` that still resolve. Each one that
    /// does not is recorded as a warning.
    pub(crate) fn live_targets(
        &mut self,
        source: EntityId,
        field: &str,
    ) -> Result<Vec<EntityId>, EngineError> {
        let mut live = Vec::new();
        for target in self.store.get_references(source, field)? {
            if self.store.get_entity(target)?.is_some() {
                live.push(target);
            } else {
                warn!("dangling reference {}.{} -> {}", source, field, target);
                self.warnings.push(Warning::DanglingReference {
                    source,
                    field: field.to_string(),
                    target,
                });
            }
        }
        Ok(live)
    }

    fn clone_owned(
        &mut self,
        child: EntityId,
        owner: EntityId,
        field: &str,
        depth: usize,
    ) -> Result<EntityId, EngineError> {
        if depth > self.max_depth {
            return Err(EngineError::OwnershipDepthExceeded(self.max_depth));
        }
        let record = self
            .store
            .get_entity(child)?
            .ok_or(EngineError::SourceNotFound(child))?;
        // Unregistered child types fail before anything is created for them.
        self.registry.describe(record.ty)?;

        let copy = self
            .store
            .create_instance(record.ty, Some(OwnerSlot::append(owner, field)))?;
        debug!("cloned {} {} -> {} under {}.{}", record.ty, child, copy, owner, field);
        self.copy_fields(record.ty, child, copy, true, depth)?;
        Ok(copy)
    }
}
