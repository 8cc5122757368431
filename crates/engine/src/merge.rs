//! Merge analysis and execution.
//!
//! `analyze` partitions the fields of two entities without touching the
//! store. `execute` folds the victim's data into the survivor, points every
//! reference to the victim at the survivor and deletes the victim, all in one
//! unit of work. A report whose types differ needs `force` before anything is
//! written.

use std::collections::BTreeSet;
use std::sync::Arc;

use lexmodel_core::{ConcreteType, EntityId, FieldDescriptor, FieldKind, RichText};
use lexmodel_storage::{EntityRecord, Store};
use tracing::{debug, info};

use crate::copy::FieldCopier;
use crate::error::{EngineError, Warning};
use crate::Engine;

/// A field present on both sides, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonField {
    pub name: &'static str,
    pub survivor_kind: FieldKind,
    pub victim_kind: FieldKind,
}

impl CommonField {
    pub fn kind_mismatch(&self) -> bool {
        self.survivor_kind != self.victim_kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub survivor: EntityId,
    pub victim: EntityId,
    pub survivor_type: ConcreteType,
    pub victim_type: ConcreteType,
    pub type_mismatch: bool,
    pub common_fields: Vec<CommonField>,
    pub survivor_only_fields: Vec<&'static str>,
    pub victim_only_fields: Vec<&'static str>,
    /// Common owning fields where the victim holds children that the merge destroys.
    pub discarded_owned: Vec<&'static str>,
}

impl MergeReport {
    pub fn state(&self) -> MergeState {
        MergeState::Analyzed
    }

    pub fn requires_confirmation(&self) -> bool {
        self.type_mismatch
    }

    pub fn is_common(&self, name: &str) -> bool {
        self.common_fields.iter().any(|f| f.name == name)
    }

    /// Whether `name` appears in exactly one of the three partitions.
    pub fn accounts_for(&self, name: &str) -> bool {
        let hits = usize::from(self.is_common(name))
            + usize::from(self.survivor_only_fields.contains(&name))
            + usize::from(self.victim_only_fields.contains(&name));
        hits == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Analyzed,
    AwaitingConfirmation,
    Executed,
    Aborted,
}

#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// Types differ and `force` was not given. Nothing was written.
    AwaitingConfirmation(MergeReport),
    Executed {
        survivor: EntityId,
        /// Incoming references moved from the victim to the survivor.
        repointed: usize,
        warnings: Vec<Warning>,
    },
    Aborted {
        survivor: EntityId,
        victim: EntityId,
    },
}

impl MergeOutcome {
    pub fn state(&self) -> MergeState {
        match self {
            Self::AwaitingConfirmation(_) => MergeState::AwaitingConfirmation,
            Self::Executed { .. } => MergeState::Executed,
            Self::Aborted { .. } => MergeState::Aborted,
        }
    }

    /// Decline a merge that is awaiting confirmation. Other outcomes are
    /// returned unchanged.
    pub fn abort(self) -> MergeOutcome {
        match self {
            Self::AwaitingConfirmation(report) => {
                info!("merge of {} into {} aborted", report.victim, report.survivor);
                Self::Aborted {
                    survivor: report.survivor,
                    victim: report.victim,
                }
            }
            other => other,
        }
    }

    pub fn report(&self) -> Option<&MergeReport> {
        match self {
            Self::AwaitingConfirmation(report) => Some(report),
            _ => None,
        }
    }
}

impl<S: Store> Engine<S> {
    /// Partition the fields of `survivor` and `victim`. Read-only.
    pub fn analyze(&self, survivor: EntityId, victim: EntityId) -> Result<MergeReport, EngineError> {
        let survivor_record = self.require_live(survivor)?;
        let victim_record = self.require_live(victim)?;
        if survivor == victim {
            return Err(EngineError::SelfMerge(survivor));
        }
        self.require_not_owned_by(&survivor_record, victim)?;

        let survivor_fields = self.registry.describe(survivor_record.ty)?;
        let victim_fields = self.registry.describe(victim_record.ty)?;

        let mut common_fields = Vec::new();
        let mut survivor_only_fields = Vec::new();
        for field in survivor_fields {
            match victim_fields.iter().find(|f| f.name == field.name) {
                Some(other) => common_fields.push(CommonField {
                    name: field.name,
                    survivor_kind: field.kind,
                    victim_kind: other.kind,
                }),
                None => survivor_only_fields.push(field.name),
            }
        }
        let victim_only_fields = victim_fields
            .iter()
            .filter(|f| !survivor_fields.iter().any(|s| s.name == f.name))
            .map(|f| f.name)
            .collect();

        let mut discarded_owned = Vec::new();
        for field in &common_fields {
            if field.victim_kind.is_owning()
                && !self.store.owned_children(victim, field.name)?.is_empty()
            {
                discarded_owned.push(field.name);
            }
        }

        let report = MergeReport {
            survivor,
            victim,
            survivor_type: survivor_record.ty,
            victim_type: victim_record.ty,
            type_mismatch: survivor_record.ty != victim_record.ty,
            common_fields,
            survivor_only_fields,
            victim_only_fields,
            discarded_owned,
        };
        debug!(
            "analyzed {} <- {}: {} common, {} survivor-only, {} victim-only",
            report.survivor_type,
            report.victim_type,
            report.common_fields.len(),
            report.survivor_only_fields.len(),
            report.victim_only_fields.len()
        );
        Ok(report)
    }

    /// Carry out an analyzed merge. A type mismatch without `force` returns
    /// the report back unexecuted.
    pub fn execute(&mut self, report: MergeReport, force: bool) -> Result<MergeOutcome, EngineError> {
        self.require_writable()?;
        self.require_current(&report)?;

        if report.type_mismatch && !force {
            info!(
                "merge of {} {} into {} {} awaits confirmation",
                report.victim_type, report.victim, report.survivor_type, report.survivor
            );
            return Ok(MergeOutcome::AwaitingConfirmation(report));
        }

        info!(
            "merging {} {} into {} {}",
            report.victim_type, report.victim, report.survivor_type, report.survivor
        );

        let registry = Arc::clone(&self.registry);
        let max_depth = self.config.max_owned_depth;
        let (repointed, warnings) = self.unit_of_work("merge", |engine| {
            let mut warnings = Vec::new();
            for field in report.common_fields.iter().filter(|f| !f.kind_mismatch()) {
                let descriptor = engine.require_field(report.survivor_type, field.name)?;
                let mut copier = FieldCopier::new(&registry, &mut engine.store, max_depth);
                transfer(&mut copier, &descriptor, report.survivor, report.victim)?;
                warnings.extend(copier.into_warnings());
            }

            let edges = engine.store.retarget_references(report.victim, report.survivor)?;
            let mut touched = BTreeSet::new();
            for edge in &edges {
                touched.insert((edge.source, edge.field.clone()));
            }
            for (source, field) in &touched {
                engine.collapse_duplicates(*source, field, report.survivor)?;
            }

            engine.store.delete_entity(report.victim)?;
            let remaining: BTreeSet<(EntityId, String)> = engine
                .store
                .referrers(report.survivor)?
                .into_iter()
                .map(|e| (e.source, e.field))
                .collect();
            let repointed = edges
                .iter()
                .filter(|e| remaining.contains(&(e.source, e.field.clone())))
                .count();
            Ok((repointed, warnings))
        })?;

        info!(
            "merged {} into {} ({} references repointed, {} warnings)",
            report.victim,
            report.survivor,
            repointed,
            warnings.len()
        );

        Ok(MergeOutcome::Executed {
            survivor: report.survivor,
            repointed,
            warnings,
        })
    }

    /// `analyze` followed by `execute`.
    pub fn merge(
        &mut self,
        survivor: EntityId,
        victim: EntityId,
        force: bool,
    ) -> Result<MergeOutcome, EngineError> {
        let report = self.analyze(survivor, victim)?;
        self.execute(report, force)
    }

    fn require_current(&self, report: &MergeReport) -> Result<(), EngineError> {
        if report.survivor == report.victim {
            return Err(EngineError::SelfMerge(report.survivor));
        }
        for (id, ty) in [
            (report.survivor, report.survivor_type),
            (report.victim, report.victim_type),
        ] {
            match self.store.get_entity(id)? {
                Some(record) if record.ty == ty => {}
                Some(record) => {
                    return Err(EngineError::StaleReport(format!(
                        "{id} is now {}, report says {ty}",
                        record.ty
                    )));
                }
                None => return Err(EngineError::StaleReport(format!("{id} no longer exists"))),
            }
        }
        let survivor = self.require_live(report.survivor)?;
        self.require_not_owned_by(&survivor, report.victim)
    }

    /// Fail if `victim` is an owner, at any depth, of `survivor`: deleting the
    /// victim would cascade through the survivor.
    fn require_not_owned_by(
        &self,
        survivor: &EntityRecord,
        victim: EntityId,
    ) -> Result<(), EngineError> {
        let mut owner = survivor.owner.as_ref().map(|o| o.owner);
        let mut depth = 0;
        while let Some(id) = owner {
            if id == victim {
                return Err(EngineError::SurvivorOwnedByVictim {
                    survivor: survivor.entity_id,
                    victim,
                });
            }
            depth += 1;
            if depth > self.config.max_owned_depth {
                return Err(EngineError::OwnershipDepthExceeded(self.config.max_owned_depth));
            }
            owner = self
                .store
                .get_entity(id)?
                .and_then(|record| record.owner.map(|o| o.owner));
        }
        Ok(())
    }

    /// Drop repeated targets from a reference field that cannot hold them, and
    /// the survivor's references to itself that retargeting produced.
    fn collapse_duplicates(
        &mut self,
        source: EntityId,
        field: &str,
        survivor: EntityId,
    ) -> Result<(), EngineError> {
        let Some(record) = self.store.get_entity(source)? else {
            return Ok(());
        };
        let kind = self.registry.field(record.ty, field)?.map(|f| f.kind);
        let dedupe = matches!(kind, Some(FieldKind::RefAtomic | FieldKind::RefCollection));
        let targets = self.store.get_references(source, field)?;
        let mut seen = BTreeSet::new();
        let kept: Vec<EntityId> = targets
            .iter()
            .copied()
            .filter(|t| !(source == survivor && *t == survivor))
            .filter(|t| !dedupe || seen.insert(*t))
            .collect();
        if kept.len() != targets.len() {
            debug!("collapsed {} targets on {}.{}", targets.len() - kept.len(), source, field);
            self.store.set_references(source, field, &kept)?;
        }
        Ok(())
    }
}

/// Fold the victim's value of one common field into the survivor.
fn transfer<S: Store>(
    copier: &mut FieldCopier<'_, S>,
    field: &FieldDescriptor,
    survivor: EntityId,
    victim: EntityId,
) -> Result<(), EngineError> {
    let name = field.name;
    match field.kind {
        FieldKind::Scalar => {
            let store = copier.store();
            let keep = store.get_scalar(survivor, name)?;
            if keep.as_ref().is_none_or(|v| v.is_empty()) {
                if let Some(value) = store.get_scalar(victim, name)?.filter(|v| !v.is_empty()) {
                    store.set_scalar(survivor, name, value)?;
                }
            }
        }
        FieldKind::LocalizedString => {
            let store = copier.store();
            if let Some(incoming) = store.get_localized(victim, name)? {
                let mut merged = store.get_localized(survivor, name)?.unwrap_or_default();
                if merged.fill_missing_from(&incoming) > 0 {
                    store.set_localized(survivor, name, &merged)?;
                }
            }
        }
        FieldKind::RichText => {
            let store = copier.store();
            let keep = store.get_rich(survivor, name)?;
            if keep.as_ref().is_none_or(RichText::is_empty) {
                if let Some(value) = store.get_rich(victim, name)?.filter(|v| !v.is_empty()) {
                    let rebuilt = RichText::from_plain(value.plain_text(), value.ws());
                    store.set_rich(survivor, name, &rebuilt)?;
                }
            }
        }
        FieldKind::OwnedAtomic | FieldKind::OwnedSequence | FieldKind::OwnedCollection => {
            debug!("keeping survivor's {}; victim's goes with the victim", name);
        }
        FieldKind::RefAtomic => {
            if copier.store().get_references(survivor, name)?.is_empty() {
                let incoming = copier.live_targets(victim, name)?;
                if let Some(target) = incoming.iter().find(|t| **t != survivor && **t != victim) {
                    copier.store().set_references(survivor, name, &[*target])?;
                }
            }
        }
        FieldKind::RefSequence | FieldKind::RefCollection => {
            let mut targets = copier.store().get_references(survivor, name)?;
            let before = targets.len();
            for target in copier.live_targets(victim, name)? {
                if target != survivor && target != victim && !targets.contains(&target) {
                    targets.push(target);
                }
            }
            if targets.len() != before {
                copier.store().set_references(survivor, name, &targets)?;
            }
        }
    }
    Ok(())
}
