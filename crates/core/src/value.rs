use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::field_value::FieldValue;
use crate::ids::EntityId;
use crate::kinds::FieldKind;
use crate::text::{MultiString, RichText};

/// Stored form of a value field. Exactly one variant per value kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldData {
    Scalar(FieldValue),
    Localized(MultiString),
    Rich(RichText),
}

impl FieldData {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Scalar(_) => FieldKind::Scalar,
            Self::Localized(_) => FieldKind::LocalizedString,
            Self::Rich(_) => FieldKind::RichText,
        }
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

/// A field as seen through the access layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(FieldValue),
    Localized(MultiString),
    Rich(Option<RichText>),
    OwnedAtomic(Option<EntityId>),
    OwnedList(Vec<EntityId>),
    RefAtomic(Option<EntityId>),
    RefList(Vec<EntityId>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&FieldValue> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_localized(&self) -> Option<&MultiString> {
        match self {
            Self::Localized(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_rich(&self) -> Option<&RichText> {
        match self {
            Self::Rich(v) => v.as_ref(),
            _ => None,
        }
    }

    /// Owned children or reference targets, in stored order. Empty for value kinds.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        match self {
            Self::OwnedAtomic(id) | Self::RefAtomic(id) => id.iter().copied().collect(),
            Self::OwnedList(ids) | Self::RefList(ids) => ids.clone(),
            Self::Scalar(_) | Self::Localized(_) | Self::Rich(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_data_msgpack_preserves_variant() {
        let rich = FieldData::Rich(RichText::new("bʊk", "en-fonipa"));
        let decoded = FieldData::from_msgpack(&rich.to_msgpack().unwrap()).unwrap();
        assert_eq!(decoded, rich);
        assert_eq!(decoded.kind(), FieldKind::RichText);
    }

    #[test]
    fn entity_ids_flatten_atomic_and_lists() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_eq!(Value::RefAtomic(Some(a)).entity_ids(), vec![a]);
        assert_eq!(Value::OwnedAtomic(None).entity_ids(), Vec::<EntityId>::new());
        assert_eq!(Value::RefList(vec![a, b]).entity_ids(), vec![a, b]);
        assert!(Value::Scalar(FieldValue::Integer(3)).entity_ids().is_empty());
    }
}
