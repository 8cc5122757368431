use lexmodel_core::{EntityId, FieldKind};
use lexmodel_storage::Store;

use crate::error::EngineError;
use crate::Engine;

impl<S: Store> Engine<S> {
    /// BLAKE3 digest of an entity's shape: its type, value fields, reference
    /// targets and owned subtree. Ids of the entity and its owned descendants
    /// do not contribute, so a deep clone fingerprints the same as its source.
    pub fn fingerprint(&self, entity_id: EntityId) -> Result<[u8; 32], EngineError> {
        self.fingerprint_at(entity_id, 0)
    }

    fn fingerprint_at(&self, entity_id: EntityId, depth: usize) -> Result<[u8; 32], EngineError> {
        if depth > self.config.max_owned_depth {
            return Err(EngineError::OwnershipDepthExceeded(self.config.max_owned_depth));
        }
        let record = self.require_live(entity_id)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(record.ty.as_str().as_bytes());

        for field in self.registry.describe(record.ty)? {
            hasher.update(&[0]);
            hasher.update(field.name.as_bytes());
            match field.kind {
                FieldKind::Scalar | FieldKind::LocalizedString | FieldKind::RichText => {
                    match self.store.get_value(entity_id, field.name)? {
                        Some(data) => {
                            hasher.update(&[1]);
                            hasher.update(&data.to_msgpack()?);
                        }
                        None => {
                            hasher.update(&[0]);
                        }
                    }
                }
                FieldKind::OwnedAtomic | FieldKind::OwnedSequence | FieldKind::OwnedCollection => {
                    let children = self.store.owned_children(entity_id, field.name)?;
                    hasher.update(&(children.len() as u64).to_le_bytes());
                    for child in children {
                        hasher.update(&self.fingerprint_at(child, depth + 1)?);
                    }
                }
                FieldKind::RefAtomic | FieldKind::RefSequence | FieldKind::RefCollection => {
                    let targets = self.store.get_references(entity_id, field.name)?;
                    hasher.update(&(targets.len() as u64).to_le_bytes());
                    for target in targets {
                        hasher.update(target.as_bytes());
                    }
                }
            }
        }

        Ok(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lexmodel_core::{ConcreteType, MultiString, SchemaRegistry};
    use lexmodel_storage::SqliteStore;

    use super::*;

    #[test]
    fn fingerprint_ignores_ids_but_not_content() {
        let registry = Arc::new(SchemaRegistry::standard().unwrap());
        let mut engine = Engine::new(registry, SqliteStore::open_in_memory().unwrap());
        let a = engine.create(ConcreteType::WfiGloss).unwrap();
        let b = engine.create(ConcreteType::WfiGloss).unwrap();
        let form = MultiString::new().with("en", "house");
        engine.set_localized(a.id, "form", &form).unwrap();
        engine.set_localized(b.id, "form", &form).unwrap();

        assert_eq!(engine.fingerprint(a.id).unwrap(), engine.fingerprint(b.id).unwrap());

        engine
            .set_localized(b.id, "form", &MultiString::new().with("en", "home"))
            .unwrap();
        assert_ne!(engine.fingerprint(a.id).unwrap(), engine.fingerprint(b.id).unwrap());
    }
}
