use std::sync::Arc;

use lexmodel_core::{EntityId, FieldKind, Positioning};
use lexmodel_storage::{InsertPosition, OwnerRef, OwnerSlot, Store};
use tracing::{debug, info};

use crate::access::EntityHandle;
use crate::config::AutoSortedPositioning;
use crate::copy::FieldCopier;
use crate::error::{EngineError, Warning};
use crate::Engine;

/// Where the clone ended up relative to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositioningApplied {
    /// Placed immediately after the source.
    Inserted,
    /// Appended at the end of the owning field, or created unowned.
    Appended,
    /// `insert_after` was requested but the type does not take positions; appended.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct DuplicateOutcome {
    pub entity: EntityHandle,
    pub warnings: Vec<Warning>,
    pub positioning: PositioningApplied,
}

impl<S: Store> Engine<S> {
    /// Clone `source` as a sibling under the same owner.
    ///
    /// Value and reference fields are always copied. Owning fields are
    /// cloned recursively when `deep`, otherwise left empty. The whole clone
    /// is one unit of work.
    pub fn duplicate(
        &mut self,
        source: EntityId,
        deep: bool,
        insert_after: bool,
    ) -> Result<DuplicateOutcome, EngineError> {
        self.require_writable()?;
        let record = self
            .store
            .get_entity(source)?
            .ok_or(EngineError::SourceNotFound(source))?;
        let positioning = self.registry.schema(record.ty)?.positioning;

        if let Some(owner) = &record.owner {
            self.require_not_atomic_slot(owner)?;
        }

        let placement = match (insert_after, positioning) {
            (false, _) => PositioningApplied::Appended,
            (true, Positioning::Ordered) if record.owner.is_some() => PositioningApplied::Inserted,
            (true, Positioning::Ordered) => PositioningApplied::Appended,
            (true, Positioning::Unsupported) => PositioningApplied::Ignored,
            (true, Positioning::AutoSorted) => match self.config.auto_sorted_positioning {
                AutoSortedPositioning::Ignore => PositioningApplied::Ignored,
                AutoSortedPositioning::Reject => {
                    return Err(EngineError::PositioningRejected(record.ty));
                }
            },
        };
        debug!("{} positioning {:?} -> {:?}", record.ty, positioning, placement);

        info!(
            "duplicating {} {} (deep: {}, insert_after: {})",
            record.ty, source, deep, insert_after
        );

        let registry = Arc::clone(&self.registry);
        let max_depth = self.config.max_owned_depth;
        let (clone, warnings) = self.unit_of_work("duplicate", |engine| {
            let slot = match &record.owner {
                None => None,
                Some(owner) => {
                    let position = if placement == PositioningApplied::Inserted {
                        let siblings = engine.store.owned_children(owner.owner, &owner.field)?;
                        let index = siblings.iter().position(|id| *id == source);
                        index.map_or(InsertPosition::End, |i| InsertPosition::At(i + 1))
                    } else {
                        InsertPosition::End
                    };
                    Some(OwnerSlot {
                        owner: owner.owner,
                        field: owner.field.as_str(),
                        position,
                    })
                }
            };
            let clone = engine.store.create_instance(record.ty, slot)?;

            let mut copier = FieldCopier::new(&registry, &mut engine.store, max_depth);
            copier.copy_fields(record.ty, source, clone, deep, 0)?;
            Ok((clone, copier.into_warnings()))
        })?;

        info!(
            "duplicated {} {} -> {} ({} warnings)",
            record.ty,
            source,
            clone,
            warnings.len()
        );

        Ok(DuplicateOutcome {
            entity: EntityHandle {
                id: clone,
                ty: record.ty,
            },
            warnings,
            positioning: placement,
        })
    }

    /// An atomic owning slot holds one child, so its occupant has nowhere to
    /// place a sibling.
    fn require_not_atomic_slot(&self, owner: &OwnerRef) -> Result<(), EngineError> {
        let owner_record = self
            .store
            .get_entity(owner.owner)?
            .ok_or(EngineError::NullEntity(owner.owner))?;
        let kind = self
            .registry
            .field(owner_record.ty, &owner.field)?
            .map(|f| f.kind);
        if kind == Some(FieldKind::OwnedAtomic) {
            return Err(EngineError::AtomicSlotOccupied {
                owner: owner.owner,
                field: owner.field.clone(),
            });
        }
        Ok(())
    }
}
