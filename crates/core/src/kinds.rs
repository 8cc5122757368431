use std::fmt;

use crate::types::{BaseType, ConcreteType};

/// Classification of a field that drives how it is copied and merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKind {
    Scalar,
    LocalizedString,
    RichText,
    OwnedAtomic,
    OwnedSequence,
    OwnedCollection,
    RefAtomic,
    RefSequence,
    RefCollection,
}

impl FieldKind {
    /// Scalar, localized string or rich text.
    pub fn is_value(self) -> bool {
        matches!(self, Self::Scalar | Self::LocalizedString | Self::RichText)
    }

    pub fn is_owning(self) -> bool {
        matches!(
            self,
            Self::OwnedAtomic | Self::OwnedSequence | Self::OwnedCollection
        )
    }

    pub fn is_reference(self) -> bool {
        matches!(
            self,
            Self::RefAtomic | Self::RefSequence | Self::RefCollection
        )
    }

    /// Holds at most one entity.
    pub fn is_atomic(self) -> bool {
        matches!(self, Self::OwnedAtomic | Self::RefAtomic)
    }

    /// Members keep a caller-visible order.
    pub fn is_ordered(self) -> bool {
        matches!(self, Self::OwnedSequence | Self::RefSequence)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "Scalar",
            Self::LocalizedString => "LocalizedString",
            Self::RichText => "RichText",
            Self::OwnedAtomic => "OwnedAtomic",
            Self::OwnedSequence => "OwnedSequence",
            Self::OwnedCollection => "OwnedCollection",
            Self::RefAtomic => "RefAtomic",
            Self::RefSequence => "RefSequence",
            Self::RefCollection => "RefCollection",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of an owning or reference field: a concrete type or any subtype of a base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Concrete(ConcreteType),
    Base(BaseType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub target: Option<TypeRef>,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, kind: FieldKind, target: Option<TypeRef>) -> Self {
        Self { name, kind, target }
    }

    pub const fn scalar(name: &'static str) -> Self {
        Self::new(name, FieldKind::Scalar, None)
    }

    pub const fn localized(name: &'static str) -> Self {
        Self::new(name, FieldKind::LocalizedString, None)
    }

    pub const fn rich(name: &'static str) -> Self {
        Self::new(name, FieldKind::RichText, None)
    }

    pub const fn owned_atomic(name: &'static str, target: TypeRef) -> Self {
        Self::new(name, FieldKind::OwnedAtomic, Some(target))
    }

    pub const fn owned_sequence(name: &'static str, target: TypeRef) -> Self {
        Self::new(name, FieldKind::OwnedSequence, Some(target))
    }

    pub const fn owned_collection(name: &'static str, target: TypeRef) -> Self {
        Self::new(name, FieldKind::OwnedCollection, Some(target))
    }

    pub const fn ref_atomic(name: &'static str, target: TypeRef) -> Self {
        Self::new(name, FieldKind::RefAtomic, Some(target))
    }

    pub const fn ref_sequence(name: &'static str, target: TypeRef) -> Self {
        Self::new(name, FieldKind::RefSequence, Some(target))
    }

    pub const fn ref_collection(name: &'static str, target: TypeRef) -> Self {
        Self::new(name, FieldKind::RefCollection, Some(target))
    }
}

/// Whether a type honours "insert the clone right after its source".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Positioning {
    /// Lives in an ordered owning field; insert-after is honoured.
    Ordered,
    /// Lives in an unordered or atomic slot; insert-after is a no-op.
    Unsupported,
    /// The store keeps the owning collection sorted itself, so any requested
    /// position would be overwritten.
    AutoSorted,
}

impl Positioning {
    pub fn supports_positioning(self) -> bool {
        matches!(self, Self::Ordered)
    }
}
