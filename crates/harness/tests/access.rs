use lexmodel_core::{BaseType, ConcreteType, FieldKind, FieldOrigin, RichText, Value};
use lexmodel_engine::EngineError;
use lexmodel_harness::{en, init_test_logging, TestProject, VERNACULAR_WS};

// ============================================================================
// Wrapper
// ============================================================================

#[test]
fn base_fields_resolve_through_concrete_wrapper() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let mut project = TestProject::new()?;
    let db = project.lexicon()?;
    let entry = project.entry(db, "moto")?;

    let Value::OwnedAtomic(Some(form)) = project.engine.wrap(entry)?.get("lexeme_form")? else {
        return Err("entry has no lexeme form".into());
    };
    let allomorph = project.engine.wrap(form)?;

    assert_eq!(allomorph.concrete_type(), ConcreteType::MoStemAllomorph);
    assert_eq!(allomorph.base_type(), Some(BaseType::MoForm));
    assert_eq!(allomorph.field_origin("form"), Some(FieldOrigin::Base(BaseType::MoForm)));
    assert_eq!(allomorph.field_origin("phone_env"), Some(FieldOrigin::Concrete));
    assert!(allomorph.has("morph_type"));
    assert!(!allomorph.has("position"));
    assert_eq!(
        allomorph.get("form")?.as_localized().and_then(|m| m.get(&VERNACULAR_WS.into())),
        Some("moto")
    );
    Ok(())
}

#[test]
fn unknown_field_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let mut project = TestProject::new()?;
    let data = project.phon_data()?;
    let phoneme = project.phoneme(data, "voiced velar nasal", "ŋ")?;

    let wrapper = project.engine.wrap(phoneme)?;
    assert!(matches!(
        wrapper.get("output_specs"),
        Err(EngineError::FieldNotFound { ty: ConcreteType::PhPhoneme, .. })
    ));
    assert!(!wrapper.has("output_specs"));
    Ok(())
}

#[test]
fn typed_getters_check_kind() -> Result<(), Box<dyn std::error::Error>> {
    let mut project = TestProject::new()?;
    let text = project.text("Story", &["Kalekale panali mfumu."])?;

    let wrapper = project.engine.wrap(text)?;
    assert!(matches!(
        wrapper.references("contents"),
        Err(EngineError::FieldKindMismatch { found: FieldKind::OwnedAtomic, .. })
    ));
    let body = wrapper.owned("contents")?;
    assert_eq!(body.len(), 1);

    let para = project.engine.wrap(body[0])?.owned("paragraphs")?[0];
    let para = project.engine.wrap(para)?;
    assert_eq!(
        para.rich_text("contents")?,
        Some(RichText::new("Kalekale panali mfumu.", VERNACULAR_WS))
    );
    assert!(matches!(
        para.localized("contents"),
        Err(EngineError::FieldKindMismatch { found: FieldKind::RichText, .. })
    ));
    Ok(())
}

#[test]
fn setters_are_checked_against_the_registry() -> Result<(), Box<dyn std::error::Error>> {
    let mut project = TestProject::new()?;
    let text = project.text("Story", &[])?;
    let db = project.lexicon()?;

    assert!(matches!(
        project.engine.set_localized(text, "is_translated", &en("yes")),
        Err(EngineError::FieldKindMismatch { found: FieldKind::Scalar, .. })
    ));
    assert!(matches!(
        project.engine.create_owned(text, "contents", ConcreteType::StText),
        Err(EngineError::AtomicSlotOccupied { .. })
    ));
    assert!(matches!(
        project.engine.create_owned(db, "entries", ConcreteType::LexSense),
        Err(EngineError::TargetTypeRejected { ty: ConcreteType::LexSense, .. })
    ));
    assert!(matches!(
        project.engine.create_owned(db, "gloss", ConcreteType::LexEntry),
        Err(EngineError::FieldNotFound { .. })
    ));
    Ok(())
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn owned_collection_groups_by_type() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let mut project = TestProject::new()?;
    let data = project.phon_data()?;
    let p = project.phoneme(data, "voiceless bilabial stop", "p")?;
    let b = project.phoneme(data, "voiced bilabial stop", "b")?;
    let voicing = project.regular_rule(data, "Voicing", p, b)?;
    let swap = project.metathesis_rule(data, "Swap", 1, 2)?;
    let devoicing = project.regular_rule(data, "Devoicing", b, p)?;

    let rules = project.engine.collect_owned(data, "phon_rules")?;

    assert_eq!(rules.ids(), vec![voicing, swap, devoicing]);
    assert_eq!(rules[1].ty, ConcreteType::PhMetathesisRule);
    let groups = rules.group_by_type();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[&ConcreteType::PhRegularRule], 2);
    assert_eq!(groups[&ConcreteType::PhMetathesisRule], 1);

    let regular = rules.of_type(ConcreteType::PhRegularRule);
    assert_eq!(regular.ids(), vec![voicing, devoicing]);
    assert_eq!(rules.with_field("left_metathesis_part").ids(), vec![swap]);
    assert_eq!(rules.of_base(BaseType::PhSegmentRule).len(), 3);
    assert_eq!(rules.len(), 3);
    Ok(())
}

#[test]
fn collect_all_spans_heterogeneous_types() -> Result<(), Box<dyn std::error::Error>> {
    init_test_logging();
    let mut project = TestProject::new()?;
    project.text("First", &["One.", "Two."])?;
    project.text("Second", &["Three."])?;

    let all = project.engine.collect_all()?;

    let groups = all.group_by_type();
    assert_eq!(groups[&ConcreteType::Text], 2);
    assert_eq!(groups[&ConcreteType::StText], 2);
    assert_eq!(groups[&ConcreteType::StTxtPara], 3);

    let paragraphs = all.filter(|h| h.ty == ConcreteType::StTxtPara);
    let mut with_text = 0;
    for handle in &paragraphs {
        if project.engine.wrap(handle.id)?.rich_text("contents")?.is_some() {
            with_text += 1;
        }
    }
    assert_eq!(with_text, 3);
    assert_eq!(all.with_field("paragraphs").len(), 2);
    assert!(all.of_base(BaseType::CmPossibility).is_empty());
    Ok(())
}

#[test]
fn collect_owned_rejects_reference_fields() -> Result<(), Box<dyn std::error::Error>> {
    let mut project = TestProject::new()?;
    let db = project.lexicon()?;
    let entry = project.entry(db, "chala")?;

    assert!(matches!(
        project.engine.collect_owned(entry, "complex_form_components"),
        Err(EngineError::FieldKindMismatch { found: FieldKind::RefSequence, .. })
    ));
    assert_eq!(project.engine.collect_owned(db, "entries")?.ids(), vec![entry]);
    Ok(())
}
