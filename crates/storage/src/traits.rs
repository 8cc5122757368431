//! Boundary to the backing object store.
//!
//! The engine only talks to a store through [`Store`]: a unit-of-work
//! boundary, a factory, a write guard, and typed access to value fields,
//! owned children and reference edges.

use lexmodel_core::{
    ConcreteType, EntityId, FieldData, FieldKind, FieldValue, MultiString, RichText,
};

use crate::error::StorageError;

/// Weak back-pointer from a child to the field that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    pub owner: EntityId,
    pub field: String,
    pub ordinal: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub entity_id: EntityId,
    pub ty: ConcreteType,
    pub owner: Option<OwnerRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEdge {
    pub source: EntityId,
    pub field: String,
    pub target: EntityId,
    pub ordinal: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    End,
    /// Index into the owning field's current member list; past the end appends.
    At(usize),
}

/// Where a newly created instance is attached.
#[derive(Debug, Clone, Copy)]
pub struct OwnerSlot<'a> {
    pub owner: EntityId,
    pub field: &'a str,
    pub position: InsertPosition,
}

impl<'a> OwnerSlot<'a> {
    pub fn append(owner: EntityId, field: &'a str) -> Self {
        Self {
            owner,
            field,
            position: InsertPosition::End,
        }
    }

    pub fn at(owner: EntityId, field: &'a str, index: usize) -> Self {
        Self {
            owner,
            field,
            position: InsertPosition::At(index),
        }
    }
}

fn kind_mismatch(
    entity_id: EntityId,
    field: &str,
    expected: FieldKind,
    found: &FieldData,
) -> StorageError {
    StorageError::KindMismatch {
        entity_id: entity_id.to_string(),
        field: field.to_string(),
        expected,
        found: found.kind(),
    }
}

pub trait Store {
    // ------------------------------------------------------------------
    // Write guard and unit of work
    // ------------------------------------------------------------------

    fn is_writable(&self) -> bool;

    fn begin_unit_of_work(&mut self) -> Result<(), StorageError>;

    fn commit_unit_of_work(&mut self) -> Result<(), StorageError>;

    fn rollback_unit_of_work(&mut self) -> Result<(), StorageError>;

    fn in_unit_of_work(&self) -> bool;

    // ------------------------------------------------------------------
    // Factory and lifecycle
    // ------------------------------------------------------------------

    fn has_factory(&self, ty: ConcreteType) -> bool;

    /// Create a fresh instance, optionally attached under an owner.
    /// Fails with [`StorageError::NoFactory`] if `ty` cannot be instantiated.
    fn create_instance(
        &mut self,
        ty: ConcreteType,
        slot: Option<OwnerSlot<'_>>,
    ) -> Result<EntityId, StorageError>;

    fn get_entity(&self, entity_id: EntityId) -> Result<Option<EntityRecord>, StorageError>;

    /// Delete an entity and everything it owns, transitively. Reference edges
    /// from or to any removed entity are dropped. Returns the removed ids.
    fn delete_entity(&mut self, entity_id: EntityId) -> Result<Vec<EntityId>, StorageError>;

    fn live_entities(&self) -> Result<Vec<EntityRecord>, StorageError>;

    // ------------------------------------------------------------------
    // Value fields
    // ------------------------------------------------------------------

    fn get_value(
        &self,
        entity_id: EntityId,
        field: &str,
    ) -> Result<Option<FieldData>, StorageError>;

    fn set_value(
        &mut self,
        entity_id: EntityId,
        field: &str,
        value: &FieldData,
    ) -> Result<(), StorageError>;

    fn clear_value(&mut self, entity_id: EntityId, field: &str) -> Result<(), StorageError>;

    fn get_scalar(
        &self,
        entity_id: EntityId,
        field: &str,
    ) -> Result<Option<FieldValue>, StorageError> {
        match self.get_value(entity_id, field)? {
            None => Ok(None),
            Some(FieldData::Scalar(v)) => Ok(Some(v)),
            Some(other) => Err(kind_mismatch(entity_id, field, FieldKind::Scalar, &other)),
        }
    }

    fn set_scalar(
        &mut self,
        entity_id: EntityId,
        field: &str,
        value: FieldValue,
    ) -> Result<(), StorageError> {
        self.set_value(entity_id, field, &FieldData::Scalar(value))
    }

    fn get_localized(
        &self,
        entity_id: EntityId,
        field: &str,
    ) -> Result<Option<MultiString>, StorageError> {
        match self.get_value(entity_id, field)? {
            None => Ok(None),
            Some(FieldData::Localized(v)) => Ok(Some(v)),
            Some(other) => Err(kind_mismatch(
                entity_id,
                field,
                FieldKind::LocalizedString,
                &other,
            )),
        }
    }

    fn set_localized(
        &mut self,
        entity_id: EntityId,
        field: &str,
        value: &MultiString,
    ) -> Result<(), StorageError> {
        self.set_value(entity_id, field, &FieldData::Localized(value.clone()))
    }

    fn get_rich(
        &self,
        entity_id: EntityId,
        field: &str,
    ) -> Result<Option<RichText>, StorageError> {
        match self.get_value(entity_id, field)? {
            None => Ok(None),
            Some(FieldData::Rich(v)) => Ok(Some(v)),
            Some(other) => Err(kind_mismatch(entity_id, field, FieldKind::RichText, &other)),
        }
    }

    fn set_rich(
        &mut self,
        entity_id: EntityId,
        field: &str,
        value: &RichText,
    ) -> Result<(), StorageError> {
        self.set_value(entity_id, field, &FieldData::Rich(value.clone()))
    }

    // ------------------------------------------------------------------
    // Ownership and references
    // ------------------------------------------------------------------

    /// Children owned through `field`, in stored order.
    fn owned_children(&self, owner: EntityId, field: &str) -> Result<Vec<EntityId>, StorageError>;

    /// Reference targets of `field`, in stored order. Targets are not resolved.
    fn get_references(
        &self,
        source: EntityId,
        field: &str,
    ) -> Result<Vec<EntityId>, StorageError>;

    fn set_references(
        &mut self,
        source: EntityId,
        field: &str,
        targets: &[EntityId],
    ) -> Result<(), StorageError>;

    /// Every reference edge pointing at `target`.
    fn referrers(&self, target: EntityId) -> Result<Vec<ReferenceEdge>, StorageError>;

    /// Point every edge targeting `from` at `to`. Returns the rewritten edges.
    fn retarget_references(
        &mut self,
        from: EntityId,
        to: EntityId,
    ) -> Result<Vec<ReferenceEdge>, StorageError>;
}
