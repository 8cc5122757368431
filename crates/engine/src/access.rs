//! Polymorphic access layer.
//!
//! [`Wrapper`] reads any field of an entity through the registry: the
//! concrete type's own fields are consulted first, then its base's.
//! [`EntityCollection`] groups and filters heterogeneous entity sets by
//! concrete type.

use std::collections::BTreeMap;
use std::ops::Index;
use std::sync::Arc;

use lexmodel_core::{
    BaseType, ConcreteType, EntityId, FieldDescriptor, FieldKind, FieldOrigin, FieldValue,
    MultiString, ResolvedField, RichText, SchemaRegistry, Value,
};
use lexmodel_storage::{EntityRecord, OwnerRef, Store};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    pub id: EntityId,
    pub ty: ConcreteType,
}

impl From<&EntityRecord> for EntityHandle {
    fn from(record: &EntityRecord) -> Self {
        Self {
            id: record.entity_id,
            ty: record.ty,
        }
    }
}

// ============================================================================
// Wrapper
// ============================================================================

pub struct Wrapper<'a, S: Store> {
    registry: &'a SchemaRegistry,
    store: &'a S,
    record: EntityRecord,
}

impl<'a, S: Store> Wrapper<'a, S> {
    pub(crate) fn new(registry: &'a SchemaRegistry, store: &'a S, record: EntityRecord) -> Self {
        Self {
            registry,
            store,
            record,
        }
    }

    pub fn id(&self) -> EntityId {
        self.record.entity_id
    }

    pub fn handle(&self) -> EntityHandle {
        EntityHandle::from(&self.record)
    }

    pub fn concrete_type(&self) -> ConcreteType {
        self.record.ty
    }

    pub fn base_type(&self) -> Option<BaseType> {
        self.registry.base_of(self.record.ty).ok().flatten()
    }

    pub fn owner(&self) -> Option<&OwnerRef> {
        self.record.owner.as_ref()
    }

    /// Every field of the entity, base fields first.
    pub fn fields(&self) -> Result<&'a [FieldDescriptor], EngineError> {
        Ok(self.registry.describe(self.record.ty)?)
    }

    pub fn has(&self, name: &str) -> bool {
        self.field_origin(name).is_some()
    }

    pub fn field_origin(&self, name: &str) -> Option<FieldOrigin> {
        self.registry
            .resolve(self.record.ty, name)
            .ok()
            .flatten()
            .map(|r| r.origin)
    }

    fn resolve(&self, name: &str) -> Result<ResolvedField, EngineError> {
        self.registry
            .resolve(self.record.ty, name)?
            .ok_or_else(|| EngineError::FieldNotFound {
                ty: self.record.ty,
                field: name.to_string(),
            })
    }

    fn expect_kind(
        &self,
        name: &str,
        expected: &'static str,
        accept: impl Fn(FieldKind) -> bool,
    ) -> Result<FieldKind, EngineError> {
        let kind = self.resolve(name)?.descriptor.kind;
        if accept(kind) {
            Ok(kind)
        } else {
            Err(EngineError::FieldKindMismatch {
                field: name.to_string(),
                expected,
                found: kind,
            })
        }
    }

    /// Read any field. Unset value fields come back empty rather than absent.
    pub fn get(&self, name: &str) -> Result<Value, EngineError> {
        let id = self.record.entity_id;
        let value = match self.resolve(name)?.descriptor.kind {
            FieldKind::Scalar => {
                Value::Scalar(self.store.get_scalar(id, name)?.unwrap_or(FieldValue::Null))
            }
            FieldKind::LocalizedString => {
                Value::Localized(self.store.get_localized(id, name)?.unwrap_or_default())
            }
            FieldKind::RichText => Value::Rich(self.store.get_rich(id, name)?),
            FieldKind::OwnedAtomic => {
                Value::OwnedAtomic(self.store.owned_children(id, name)?.into_iter().next())
            }
            FieldKind::OwnedSequence | FieldKind::OwnedCollection => {
                Value::OwnedList(self.store.owned_children(id, name)?)
            }
            FieldKind::RefAtomic => {
                Value::RefAtomic(self.store.get_references(id, name)?.into_iter().next())
            }
            FieldKind::RefSequence | FieldKind::RefCollection => {
                Value::RefList(self.store.get_references(id, name)?)
            }
        };
        Ok(value)
    }

    pub fn scalar(&self, name: &str) -> Result<Option<FieldValue>, EngineError> {
        self.expect_kind(name, "Scalar", |k| k == FieldKind::Scalar)?;
        Ok(self.store.get_scalar(self.record.entity_id, name)?)
    }

    pub fn localized(&self, name: &str) -> Result<MultiString, EngineError> {
        self.expect_kind(name, "LocalizedString", |k| k == FieldKind::LocalizedString)?;
        Ok(self
            .store
            .get_localized(self.record.entity_id, name)?
            .unwrap_or_default())
    }

    pub fn rich_text(&self, name: &str) -> Result<Option<RichText>, EngineError> {
        self.expect_kind(name, "RichText", |k| k == FieldKind::RichText)?;
        Ok(self.store.get_rich(self.record.entity_id, name)?)
    }

    /// Children of an owning field, in stored order.
    pub fn owned(&self, name: &str) -> Result<Vec<EntityId>, EngineError> {
        self.expect_kind(name, "owning field", FieldKind::is_owning)?;
        Ok(self.store.owned_children(self.record.entity_id, name)?)
    }

    /// Targets of a reference field, in stored order.
    pub fn references(&self, name: &str) -> Result<Vec<EntityId>, EngineError> {
        self.expect_kind(name, "reference field", FieldKind::is_reference)?;
        Ok(self.store.get_references(self.record.entity_id, name)?)
    }
}

// ============================================================================
// Collection
// ============================================================================

/// An ordered set of entity handles. Filters return new, independent collections.
#[derive(Debug, Clone)]
pub struct EntityCollection {
    registry: Arc<SchemaRegistry>,
    members: Vec<EntityHandle>,
}

impl EntityCollection {
    pub fn new(registry: Arc<SchemaRegistry>, members: Vec<EntityHandle>) -> Self {
        Self { registry, members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EntityHandle> {
        self.members.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityHandle> {
        self.members.iter()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.members.iter().map(|h| h.id).collect()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.iter().any(|h| h.id == id)
    }

    pub fn group_by_type(&self) -> BTreeMap<ConcreteType, usize> {
        let mut groups = BTreeMap::new();
        for handle in &self.members {
            *groups.entry(handle.ty).or_insert(0) += 1;
        }
        groups
    }

    pub fn filter(&self, predicate: impl Fn(&EntityHandle) -> bool) -> EntityCollection {
        EntityCollection {
            registry: Arc::clone(&self.registry),
            members: self.members.iter().filter(|h| predicate(h)).copied().collect(),
        }
    }

    pub fn of_type(&self, ty: ConcreteType) -> EntityCollection {
        self.filter(|h| h.ty == ty)
    }

    pub fn of_base(&self, base: BaseType) -> EntityCollection {
        let registry = Arc::clone(&self.registry);
        self.filter(|h| registry.base_of(h.ty).ok().flatten() == Some(base))
    }

    /// Members whose type declares `name`, directly or through its base.
    pub fn with_field(&self, name: &str) -> EntityCollection {
        let registry = Arc::clone(&self.registry);
        self.filter(|h| matches!(registry.resolve(h.ty, name), Ok(Some(_))))
    }
}

impl Index<usize> for EntityCollection {
    type Output = EntityHandle;

    fn index(&self, index: usize) -> &EntityHandle {
        &self.members[index]
    }
}

impl<'c> IntoIterator for &'c EntityCollection {
    type Item = &'c EntityHandle;
    type IntoIter = std::slice::Iter<'c, EntityHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}
