use lexmodel_core::{ConcreteType, EntityId, FieldValue, SchemaRegistry, Value};
use lexmodel_engine::{EngineError, PositioningApplied, Warning};
use lexmodel_harness::{en, init_test_logging, ws, TestProject};
use lexmodel_storage::{OwnerSlot, SqliteStore, Store};

/// Phonology with two phonemes and one regular rule "Voicing" (p -> b).
fn voicing_project() -> Result<(TestProject, EntityId, EntityId, EntityId), Box<dyn std::error::Error>> {
    init_test_logging();
    let mut project = TestProject::new()?;
    let data = project.phon_data()?;
    let p = project.phoneme(data, "voiceless bilabial stop", "p")?;
    let b = project.phoneme(data, "voiced bilabial stop", "b")?;
    let rule = project.regular_rule(data, "Voicing", p, b)?;
    Ok((project, data, rule, b))
}

// ============================================================================
// Deep duplication
// ============================================================================

#[test]
fn deep_duplicate_regular_rule() -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, data, rule, _) = voicing_project()?;

    let outcome = project.engine.duplicate(rule, true, false)?;
    let copy = outcome.entity.id;

    assert_ne!(copy, rule);
    assert_eq!(outcome.entity.ty, ConcreteType::PhRegularRule);
    assert!(outcome.warnings.is_empty());

    let source = project.engine.wrap(rule)?;
    let clone = project.engine.wrap(copy)?;
    assert_eq!(clone.localized("name")?.get(&ws("en")), Some("Voicing"));

    let source_specs = source.owned("output_specs")?;
    let clone_specs = clone.owned("output_specs")?;
    assert_eq!(source_specs.len(), 1);
    assert_eq!(clone_specs.len(), 1);
    assert_ne!(clone_specs[0], source_specs[0]);

    let owner = clone.owner().ok_or("clone has no owner")?;
    assert_eq!(owner.owner, data);
    assert_eq!(owner.field, "phon_rules");

    assert_eq!(project.engine.fingerprint(rule)?, project.engine.fingerprint(copy)?);
    Ok(())
}

#[test]
fn deep_duplicate_gives_fresh_ids_throughout_subtree() -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _, rule, _) = voicing_project()?;
    let before = project.engine.collect_all()?;

    let copy = project.engine.duplicate(rule, true, false)?.entity.id;

    let after = project.engine.collect_all()?;
    // rule + input context + output spec + struc_change segment
    assert_eq!(after.len(), before.len() + 4);

    let engine = &project.engine;
    let clone = engine.wrap(copy)?;
    let spec = clone.owned("output_specs")?[0];
    let seg = engine.wrap(spec)?.owned("struc_change")?[0];
    let input = clone.owned("input_contexts")?[0];
    for id in [spec, seg, input] {
        assert!(!before.contains(id), "{id} was reused from the source");
    }
    Ok(())
}

#[test]
fn deep_duplicate_shares_reference_targets() -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _, rule, b) = voicing_project()?;

    let copy = project.engine.duplicate(rule, true, false)?.entity.id;

    let engine = &project.engine;
    let source_spec = engine.wrap(rule)?.owned("output_specs")?[0];
    let clone_spec = engine.wrap(copy)?.owned("output_specs")?[0];
    let source_seg = engine.wrap(source_spec)?.owned("struc_change")?[0];
    let clone_seg = engine.wrap(clone_spec)?.owned("struc_change")?[0];

    assert_ne!(source_seg, clone_seg);
    assert_eq!(engine.wrap(clone_seg)?.get("segment")?, Value::RefAtomic(Some(b)));
    assert_eq!(engine.wrap(source_seg)?.get("segment")?, Value::RefAtomic(Some(b)));
    Ok(())
}

#[test]
fn mutating_clone_child_leaves_source_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _, rule, _) = voicing_project()?;
    let copy = project.engine.duplicate(rule, true, false)?.entity.id;

    let clone_input = project.engine.wrap(copy)?.owned("input_contexts")?[0];
    project
        .engine
        .set_scalar(clone_input, "max_occurrence", FieldValue::Integer(3))?;

    let source_input = project.engine.wrap(rule)?.owned("input_contexts")?[0];
    assert_eq!(
        project.engine.wrap(source_input)?.scalar("max_occurrence")?,
        Some(FieldValue::Integer(1))
    );
    assert_ne!(project.engine.fingerprint(rule)?, project.engine.fingerprint(copy)?);
    Ok(())
}

// ============================================================================
// Shallow duplication
// ============================================================================

#[test]
fn shallow_duplicate_leaves_owned_fields_empty() -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, _, rule, _) = voicing_project()?;

    let copy = project.engine.duplicate(rule, false, false)?.entity.id;

    let clone = project.engine.wrap(copy)?;
    assert_eq!(clone.localized("name")?.get(&ws("en")), Some("Voicing"));
    assert!(clone.owned("output_specs")?.is_empty());
    assert!(clone.owned("input_contexts")?.is_empty());
    Ok(())
}

#[test]
fn shallow_duplicate_shares_references() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let mut project = TestProject::new()?;
    let db = project.lexicon()?;
    let entry = project.entry(db, "nyumba")?;
    let sense = project.sense(entry, "house")?;
    project.sense(sense, "household")?;
    let domain = project.semantic_domain("Building")?;
    let noun = project.part_of_speech("noun")?;
    project.engine.set_references(sense, "semantic_domains", &[domain])?;
    project.engine.set_references(sense, "part_of_speech", &[noun])?;

    let copy = project.engine.duplicate(sense, false, false)?.entity.id;

    let clone = project.engine.wrap(copy)?;
    assert_eq!(clone.references("semantic_domains")?, vec![domain]);
    assert_eq!(clone.references("part_of_speech")?, vec![noun]);
    assert!(clone.owned("senses")?.is_empty());
    assert_eq!(clone.localized("gloss")?, en("house"));
    Ok(())
}

// ============================================================================
// Positioning
// ============================================================================

#[test]
fn unsupported_positioning_appends() -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, data, _, _) = voicing_project()?;
    let t = project.phoneme(data, "voiceless alveolar stop", "t")?;
    let phonemes_before = project.engine.wrap(data)?.owned("phonemes")?;
    let p = phonemes_before[0];

    let outcome = project.engine.duplicate(p, true, true)?;

    assert_eq!(outcome.positioning, PositioningApplied::Ignored);
    let phonemes = project.engine.wrap(data)?.owned("phonemes")?;
    assert_eq!(phonemes.len(), 4);
    assert_eq!(phonemes[..3], phonemes_before[..]);
    assert_eq!(phonemes[3], outcome.entity.id);
    assert_eq!(phonemes[2], t);
    Ok(())
}

#[test]
fn ordered_positioning_inserts_after_source() -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, data, rule, b) = voicing_project()?;
    let p = project.engine.wrap(data)?.owned("phonemes")?[0];
    let devoicing = project.regular_rule(data, "Devoicing", b, p)?;

    let outcome = project.engine.duplicate(rule, true, true)?;

    assert_eq!(outcome.positioning, PositioningApplied::Inserted);
    assert_eq!(
        project.engine.wrap(data)?.owned("phon_rules")?,
        vec![rule, outcome.entity.id, devoicing]
    );
    Ok(())
}

// ============================================================================
// Failures and rollback
// ============================================================================

#[test]
fn missing_factory_rolls_back_deep_duplicate() -> Result<(), Box<dyn std::error::Error>> {
    let (mut project, data, rule, _) = voicing_project()?;
    let before = project.engine.collect_all()?.len();
    project.engine.store_mut().set_factories(
        ConcreteType::ALL
            .iter()
            .copied()
            .filter(|ty| *ty != ConcreteType::PhSegRuleRhs),
    );

    let err = project.engine.duplicate(rule, true, false).unwrap_err();

    assert!(matches!(err, EngineError::CloneUnsupported(ConcreteType::PhSegRuleRhs)));
    assert_eq!(project.engine.collect_all()?.len(), before);
    assert_eq!(project.engine.wrap(data)?.owned("phon_rules")?, vec![rule]);
    assert!(!project.engine.store().in_unit_of_work());
    Ok(())
}

#[test]
fn unregistered_child_type_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let registry = SchemaRegistry::standard_subset(|ty| ty != ConcreteType::PhSegRuleRhs)?;
    let mut project = TestProject::with_parts(registry, SqliteStore::open_in_memory()?);
    let data = project.phon_data()?;
    let rule = project
        .engine
        .create_owned(data, "phon_rules", ConcreteType::PhRegularRule)?
        .id;
    project.engine.set_localized(rule, "name", &en("Lenition"))?;
    // The store can still hold the type even though the registry does not describe it.
    project
        .engine
        .store_mut()
        .create_instance(ConcreteType::PhSegRuleRhs, Some(OwnerSlot::append(rule, "output_specs")))?;
    let before = project.engine.collect_all()?.len();

    let err = project.engine.duplicate(rule, true, false).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Schema(lexmodel_core::SchemaError::UnknownType(ConcreteType::PhSegRuleRhs))
    ));
    assert_eq!(project.engine.collect_all()?.len(), before);

    // Shallow duplication never reaches the unregistered child.
    let shallow = project.engine.duplicate(rule, false, false)?;
    assert!(project.engine.wrap(shallow.entity.id)?.owned("output_specs")?.is_empty());
    Ok(())
}

#[test]
fn missing_source_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let mut project = TestProject::new()?;
    let ghost = EntityId::new();
    assert!(matches!(
        project.engine.duplicate(ghost, true, false),
        Err(EngineError::SourceNotFound(id)) if id == ghost
    ));
    Ok(())
}

#[test]
fn read_only_project_rejects_duplicate() -> Result<(), Box<dyn std::error::Error>> {
    let mut project = TestProject::on_disk()?;
    let db = project.lexicon()?;
    let entry = project.entry(db, "mwana")?;

    let mut project = project.reopen_read_only()?;

    assert!(matches!(
        project.engine.duplicate(entry, true, false),
        Err(EngineError::ReadOnlyViolation)
    ));
    assert_eq!(project.engine.collect_all()?.len(), 3);
    Ok(())
}

// ============================================================================
// Dangling references
// ============================================================================

#[test]
fn dangling_reference_is_warned_and_omitted() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let mut project = TestProject::new()?;
    let db = project.lexicon()?;
    let entry = project.entry(db, "mtengo")?;
    let sense = project.sense(entry, "tree")?;
    let domain = project.semantic_domain("Plant")?;
    let retired = project.semantic_domain("Retired domain")?;
    project
        .engine
        .set_references(sense, "semantic_domains", &[domain, retired])?;
    // Removing the target straight from the store leaves the edge behind.
    project.engine.store_mut().conn().execute(
        "DELETE FROM entities WHERE entity_id = ?1",
        [retired.as_bytes().as_slice()],
    )?;

    let outcome = project.engine.duplicate(entry, true, false)?;

    assert_eq!(outcome.warnings.len(), 1);
    let Warning::DanglingReference { source, field, target } = &outcome.warnings[0];
    assert_eq!(*source, sense);
    assert_eq!(field, "semantic_domains");
    assert_eq!(*target, retired);

    let clone_sense = project.engine.wrap(outcome.entity.id)?.owned("senses")?[0];
    assert_eq!(
        project.engine.wrap(clone_sense)?.references("semantic_domains")?,
        vec![domain]
    );
    Ok(())
}

#[test]
fn delete_cascade_drops_references_into_subtree() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let mut project = TestProject::new()?;
    let db = project.lexicon()?;
    let entry = project.entry(db, "nyumba")?;
    let sense = project.sense(entry, "house")?;
    let bundle = project.engine.create(ConcreteType::WfiMorphBundle)?.id;
    project.engine.set_references(bundle, "sense", &[sense])?;

    let removed = project.engine.delete(entry)?;

    // entry, lexeme form, sense
    assert_eq!(removed.len(), 3);
    assert!(project.engine.entity(sense)?.is_none());
    assert_eq!(project.engine.wrap(bundle)?.get("sense")?, Value::RefAtomic(None));
    assert!(project.engine.wrap(db)?.owned("entries")?.is_empty());
    Ok(())
}
