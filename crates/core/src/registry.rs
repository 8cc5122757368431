//! Schema registry: per-type field tables, built once and shared read-only.
//!
//! Lookups are keyed by [`ConcreteType`]; nothing here inspects values at
//! runtime. `describe` hands out the flattened field list (base fields first,
//! then the type's own fields) which is computed when the registry is built.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog;
use crate::error::SchemaError;
use crate::kinds::{FieldDescriptor, Positioning, TypeRef};
use crate::types::{BaseType, ConcreteType};

#[derive(Debug, Clone)]
pub struct BaseSchema {
    pub base: BaseType,
    pub fields: &'static [FieldDescriptor],
}

impl BaseSchema {
    pub fn new(base: BaseType, fields: &'static [FieldDescriptor]) -> Self {
        Self { base, fields }
    }
}

#[derive(Debug, Clone)]
pub struct TypeSchema {
    pub ty: ConcreteType,
    pub base: Option<BaseType>,
    pub own_fields: &'static [FieldDescriptor],
    pub positioning: Positioning,
}

impl TypeSchema {
    pub fn new(
        ty: ConcreteType,
        base: Option<BaseType>,
        own_fields: &'static [FieldDescriptor],
        positioning: Positioning,
    ) -> Self {
        Self {
            ty,
            base,
            own_fields,
            positioning,
        }
    }

    pub fn supports_positioning(&self) -> bool {
        self.positioning.supports_positioning()
    }
}

/// Where a resolved field was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrigin {
    Concrete,
    Base(BaseType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedField {
    pub descriptor: FieldDescriptor,
    pub origin: FieldOrigin,
}

#[derive(Debug)]
struct RegisteredType {
    schema: TypeSchema,
    flattened: Vec<FieldDescriptor>,
}

#[derive(Debug)]
pub struct SchemaRegistry {
    types: BTreeMap<ConcreteType, RegisteredType>,
    bases: BTreeMap<BaseType, BaseSchema>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Registry over the full linguistic catalog.
    pub fn standard() -> Result<Self, SchemaError> {
        let mut builder = Self::builder();
        for base in catalog::standard_bases() {
            builder = builder.base(base);
        }
        for schema in catalog::standard_types() {
            builder = builder.register(schema);
        }
        builder.build()
    }

    /// The standard catalog limited to the types `keep` accepts. Every base
    /// stays registered.
    pub fn standard_subset(keep: impl Fn(ConcreteType) -> bool) -> Result<Self, SchemaError> {
        let mut builder = Self::builder();
        for base in catalog::standard_bases() {
            builder = builder.base(base);
        }
        for schema in catalog::standard_types() {
            if keep(schema.ty) {
                builder = builder.register(schema);
            }
        }
        builder.build()
    }

    /// Flattened field list of `ty`: base fields first, then the type's own.
    pub fn describe(&self, ty: ConcreteType) -> Result<&[FieldDescriptor], SchemaError> {
        self.types
            .get(&ty)
            .map(|t| t.flattened.as_slice())
            .ok_or(SchemaError::UnknownType(ty))
    }

    pub fn schema(&self, ty: ConcreteType) -> Result<&TypeSchema, SchemaError> {
        self.types
            .get(&ty)
            .map(|t| &t.schema)
            .ok_or(SchemaError::UnknownType(ty))
    }

    pub fn is_registered(&self, ty: ConcreteType) -> bool {
        self.types.contains_key(&ty)
    }

    pub fn types(&self) -> impl Iterator<Item = ConcreteType> + '_ {
        self.types.keys().copied()
    }

    pub fn base_of(&self, ty: ConcreteType) -> Result<Option<BaseType>, SchemaError> {
        Ok(self.schema(ty)?.base)
    }

    pub fn base_fields(&self, base: BaseType) -> &[FieldDescriptor] {
        self.bases.get(&base).map(|b| b.fields).unwrap_or(&[])
    }

    /// Registered concrete types deriving from `base`.
    pub fn subtypes_of(&self, base: BaseType) -> Vec<ConcreteType> {
        self.types
            .values()
            .filter(|t| t.schema.base == Some(base))
            .map(|t| t.schema.ty)
            .collect()
    }

    /// Whether `ty` may be stored in a field targeting `target`.
    pub fn accepts(&self, target: TypeRef, ty: ConcreteType) -> bool {
        match target {
            TypeRef::Concrete(t) => t == ty,
            TypeRef::Base(base) => self
                .types
                .get(&ty)
                .is_some_and(|t| t.schema.base == Some(base)),
        }
    }

    /// Resolve `name` against the concrete type's own fields first, then its base.
    pub fn resolve(
        &self,
        ty: ConcreteType,
        name: &str,
    ) -> Result<Option<ResolvedField>, SchemaError> {
        let schema = self.schema(ty)?;
        if let Some(descriptor) = schema.own_fields.iter().find(|f| f.name == name) {
            return Ok(Some(ResolvedField {
                descriptor: *descriptor,
                origin: FieldOrigin::Concrete,
            }));
        }
        let Some(base) = schema.base else {
            return Ok(None);
        };
        Ok(self
            .base_fields(base)
            .iter()
            .find(|f| f.name == name)
            .map(|descriptor| ResolvedField {
                descriptor: *descriptor,
                origin: FieldOrigin::Base(base),
            }))
    }

    pub fn field(
        &self,
        ty: ConcreteType,
        name: &str,
    ) -> Result<Option<FieldDescriptor>, SchemaError> {
        Ok(self.resolve(ty, name)?.map(|r| r.descriptor))
    }

    /// Owning/reference targets that name an unregistered concrete type or base.
    pub fn unregistered_targets(&self) -> Vec<(ConcreteType, &'static str)> {
        let mut missing = Vec::new();
        for registered in self.types.values() {
            for field in &registered.flattened {
                let known = match field.target {
                    None => true,
                    Some(TypeRef::Concrete(t)) => self.types.contains_key(&t),
                    Some(TypeRef::Base(b)) => self.bases.contains_key(&b),
                };
                if !known {
                    missing.push((registered.schema.ty, field.name));
                }
            }
        }
        missing
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    types: Vec<TypeSchema>,
    bases: Vec<BaseSchema>,
}

impl SchemaRegistryBuilder {
    pub fn base(mut self, base: BaseSchema) -> Self {
        self.bases.push(base);
        self
    }

    pub fn register(mut self, schema: TypeSchema) -> Self {
        self.types.push(schema);
        self
    }

    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut bases = BTreeMap::new();
        for base in self.bases {
            check_unique(base.base.as_str(), base.fields.iter())?;
            bases.insert(base.base, base);
        }

        let mut types = BTreeMap::new();
        for schema in self.types {
            let inherited: &[FieldDescriptor] = match schema.base {
                None => &[],
                Some(base) => bases
                    .get(&base)
                    .map(|b: &BaseSchema| b.fields)
                    .ok_or_else(|| SchemaError::UnknownBase {
                        ty: schema.ty,
                        base: base.as_str().to_string(),
                    })?,
            };
            let flattened: Vec<FieldDescriptor> = inherited
                .iter()
                .chain(schema.own_fields.iter())
                .copied()
                .collect();
            check_unique(schema.ty.as_str(), flattened.iter())?;
            types.insert(schema.ty, RegisteredType { schema, flattened });
        }

        Ok(SchemaRegistry { types, bases })
    }
}

fn check_unique<'a>(
    owner: &str,
    fields: impl Iterator<Item = &'a FieldDescriptor>,
) -> Result<(), SchemaError> {
    let mut seen = BTreeSet::new();
    for field in fields {
        if !seen.insert(field.name) {
            return Err(SchemaError::DuplicateField {
                owner: owner.to_string(),
                field: field.name,
            });
        }
    }
    Ok(())
}
