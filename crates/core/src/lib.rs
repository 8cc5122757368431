mod catalog;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod kinds;
pub mod registry;
pub mod text;
pub mod types;
pub mod value;

pub use error::{CoreError, SchemaError};
pub use field_value::FieldValue;
pub use ids::*;
pub use kinds::{FieldDescriptor, FieldKind, Positioning, TypeRef};
pub use registry::{
    BaseSchema, FieldOrigin, ResolvedField, SchemaRegistry, SchemaRegistryBuilder, TypeSchema,
};
pub use text::{MultiString, RichText};
pub use types::{BaseType, ConcreteType};
pub use value::{FieldData, Value};
