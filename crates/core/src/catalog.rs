//! The standard linguistic type catalog.
//!
//! Every concrete type lists only its own fields; inherited fields live on
//! the base tables and are flattened by the registry.

use crate::kinds::{FieldDescriptor as F, Positioning, TypeRef};
use crate::registry::{BaseSchema, TypeSchema};
use crate::types::{BaseType, ConcreteType as C};

const fn c(ty: C) -> TypeRef {
    TypeRef::Concrete(ty)
}

const fn b(base: BaseType) -> TypeRef {
    TypeRef::Base(base)
}

// ---------------------------------------------------------------------------
// Bases
// ---------------------------------------------------------------------------

const MO_FORM: &[F] = &[
    F::localized("form"),
    F::ref_atomic("morph_type", c(C::MoMorphType)),
    F::scalar("is_abstract"),
];

const PH_SEGMENT_RULE: &[F] = &[
    F::localized("name"),
    F::localized("description"),
    F::owned_sequence("input_contexts", c(C::PhSimpleContextSeg)),
];

const CM_POSSIBILITY: &[F] = &[
    F::localized("name"),
    F::localized("abbreviation"),
    F::localized("description"),
    F::owned_sequence("sub_possibilities", b(BaseType::CmPossibility)),
];

// ---------------------------------------------------------------------------
// Lexicon
// ---------------------------------------------------------------------------

const LEX_DB: &[F] = &[
    F::owned_collection("entries", c(C::LexEntry)),
    F::owned_atomic("morph_types", c(C::CmPossibilityList)),
    F::owned_atomic("parts_of_speech", c(C::CmPossibilityList)),
    F::owned_atomic("semantic_domains", c(C::CmPossibilityList)),
];

const LEX_ENTRY: &[F] = &[
    F::owned_atomic("lexeme_form", b(BaseType::MoForm)),
    F::localized("citation_form"),
    F::owned_sequence("alternate_forms", b(BaseType::MoForm)),
    F::owned_sequence("senses", c(C::LexSense)),
    F::owned_sequence("pronunciations", c(C::LexPronunciation)),
    F::localized("literal_meaning"),
    F::scalar("homograph_number"),
    F::scalar("do_not_use_for_parsing"),
    F::rich("import_residue"),
    F::ref_sequence("complex_form_components", c(C::LexEntry)),
];

const LEX_SENSE: &[F] = &[
    F::localized("gloss"),
    F::localized("definition"),
    F::owned_sequence("senses", c(C::LexSense)),
    F::owned_sequence("examples", c(C::LexExampleSentence)),
    F::ref_collection("semantic_domains", c(C::CmSemanticDomain)),
    F::ref_atomic("part_of_speech", c(C::PartOfSpeech)),
    F::rich("import_residue"),
];

const LEX_EXAMPLE_SENTENCE: &[F] = &[
    F::localized("example"),
    F::rich("reference"),
    F::owned_collection("translations", c(C::CmTranslation)),
];

const LEX_PRONUNCIATION: &[F] = &[
    F::localized("form"),
    F::ref_atomic("location", c(C::CmCustomItem)),
    F::rich("cv_pattern"),
    F::rich("tone"),
];

const CM_TRANSLATION: &[F] = &[
    F::localized("translation"),
    F::ref_atomic("translation_type", c(C::CmCustomItem)),
];

const MO_STEM_ALLOMORPH: &[F] = &[F::ref_sequence("phone_env", c(C::PhEnvironment))];

const MO_AFFIX_ALLOMORPH: &[F] = &[
    F::ref_sequence("phone_env", c(C::PhEnvironment)),
    F::ref_sequence("position", c(C::PhEnvironment)),
];

// ---------------------------------------------------------------------------
// Possibility lists
// ---------------------------------------------------------------------------

const MO_MORPH_TYPE: &[F] = &[
    F::scalar("prefix"),
    F::scalar("postfix"),
    F::scalar("secondary_order"),
];

const PART_OF_SPEECH: &[F] = &[F::scalar("catalog_source_id")];

const CM_SEMANTIC_DOMAIN: &[F] = &[
    F::scalar("ocm_codes"),
    F::ref_collection("related_domains", c(C::CmSemanticDomain)),
];

const CM_CUSTOM_ITEM: &[F] = &[];

const CM_POSSIBILITY_LIST: &[F] = &[
    F::localized("name"),
    F::scalar("depth"),
    F::owned_sequence("possibilities", b(BaseType::CmPossibility)),
];

// ---------------------------------------------------------------------------
// Phonology
// ---------------------------------------------------------------------------

const PH_PHON_DATA: &[F] = &[
    F::owned_collection("phonemes", c(C::PhPhoneme)),
    F::owned_sequence("environments", c(C::PhEnvironment)),
    F::owned_sequence("phon_rules", b(BaseType::PhSegmentRule)),
];

const PH_PHONEME: &[F] = &[
    F::localized("name"),
    F::localized("description"),
    F::rich("basic_ipa_symbol"),
];

const PH_ENVIRONMENT: &[F] = &[
    F::localized("name"),
    F::localized("description"),
    F::rich("string_representation"),
];

const PH_REGULAR_RULE: &[F] = &[F::owned_sequence("output_specs", c(C::PhSegRuleRhs))];

const PH_METATHESIS_RULE: &[F] = &[
    F::scalar("left_metathesis_part"),
    F::scalar("right_metathesis_part"),
];

const PH_SEG_RULE_RHS: &[F] = &[
    F::owned_sequence("struc_change", c(C::PhSimpleContextSeg)),
    F::owned_atomic("left_context", c(C::PhSimpleContextSeg)),
    F::owned_atomic("right_context", c(C::PhSimpleContextSeg)),
];

const PH_SIMPLE_CONTEXT_SEG: &[F] = &[
    F::ref_atomic("segment", c(C::PhPhoneme)),
    F::scalar("min_occurrence"),
    F::scalar("max_occurrence"),
];

// ---------------------------------------------------------------------------
// Texts
// ---------------------------------------------------------------------------

const TEXT: &[F] = &[
    F::localized("name"),
    F::localized("abbreviation"),
    F::owned_atomic("contents", c(C::StText)),
    F::ref_collection("genres", c(C::CmCustomItem)),
    F::scalar("is_translated"),
];

const ST_TEXT: &[F] = &[
    F::owned_sequence("paragraphs", c(C::StTxtPara)),
    F::scalar("right_to_left"),
];

const ST_TXT_PARA: &[F] = &[F::rich("contents"), F::scalar("style_name")];

// ---------------------------------------------------------------------------
// Wordform inventory
// ---------------------------------------------------------------------------

const WFI_WORDFORM: &[F] = &[
    F::localized("form"),
    F::scalar("spelling_status"),
    F::owned_collection("analyses", c(C::WfiAnalysis)),
];

const WFI_ANALYSIS: &[F] = &[
    F::ref_atomic("category", c(C::PartOfSpeech)),
    F::owned_collection("meanings", c(C::WfiGloss)),
    F::owned_sequence("morph_bundles", c(C::WfiMorphBundle)),
];

const WFI_GLOSS: &[F] = &[F::localized("form")];

const WFI_MORPH_BUNDLE: &[F] = &[
    F::localized("form"),
    F::ref_atomic("morph", b(BaseType::MoForm)),
    F::ref_atomic("sense", c(C::LexSense)),
];

pub(crate) fn standard_bases() -> Vec<BaseSchema> {
    vec![
        BaseSchema::new(BaseType::MoForm, MO_FORM),
        BaseSchema::new(BaseType::PhSegmentRule, PH_SEGMENT_RULE),
        BaseSchema::new(BaseType::CmPossibility, CM_POSSIBILITY),
    ]
}

pub(crate) fn standard_types() -> Vec<TypeSchema> {
    use Positioning::{AutoSorted, Ordered, Unsupported};
    let possibility = Some(BaseType::CmPossibility);
    let mo_form = Some(BaseType::MoForm);
    let seg_rule = Some(BaseType::PhSegmentRule);

    vec![
        TypeSchema::new(C::LexDb, None, LEX_DB, Unsupported),
        TypeSchema::new(C::LexEntry, None, LEX_ENTRY, AutoSorted),
        TypeSchema::new(C::LexSense, None, LEX_SENSE, Ordered),
        TypeSchema::new(C::LexExampleSentence, None, LEX_EXAMPLE_SENTENCE, Ordered),
        TypeSchema::new(C::LexPronunciation, None, LEX_PRONUNCIATION, Ordered),
        TypeSchema::new(C::CmTranslation, None, CM_TRANSLATION, Unsupported),
        TypeSchema::new(C::MoStemAllomorph, mo_form, MO_STEM_ALLOMORPH, Ordered),
        TypeSchema::new(C::MoAffixAllomorph, mo_form, MO_AFFIX_ALLOMORPH, Ordered),
        TypeSchema::new(C::MoMorphType, possibility, MO_MORPH_TYPE, Ordered),
        TypeSchema::new(C::PartOfSpeech, possibility, PART_OF_SPEECH, Ordered),
        TypeSchema::new(C::CmSemanticDomain, possibility, CM_SEMANTIC_DOMAIN, Ordered),
        TypeSchema::new(C::CmCustomItem, possibility, CM_CUSTOM_ITEM, Ordered),
        TypeSchema::new(C::CmPossibilityList, None, CM_POSSIBILITY_LIST, Unsupported),
        TypeSchema::new(C::PhPhonData, None, PH_PHON_DATA, Unsupported),
        TypeSchema::new(C::PhPhoneme, None, PH_PHONEME, Unsupported),
        TypeSchema::new(C::PhEnvironment, None, PH_ENVIRONMENT, Ordered),
        TypeSchema::new(C::PhRegularRule, seg_rule, PH_REGULAR_RULE, Ordered),
        TypeSchema::new(C::PhMetathesisRule, seg_rule, PH_METATHESIS_RULE, Ordered),
        TypeSchema::new(C::PhSegRuleRhs, None, PH_SEG_RULE_RHS, Ordered),
        TypeSchema::new(C::PhSimpleContextSeg, None, PH_SIMPLE_CONTEXT_SEG, Ordered),
        TypeSchema::new(C::Text, None, TEXT, Unsupported),
        TypeSchema::new(C::StText, None, ST_TEXT, Unsupported),
        TypeSchema::new(C::StTxtPara, None, ST_TXT_PARA, Ordered),
        TypeSchema::new(C::WfiWordform, None, WFI_WORDFORM, Unsupported),
        TypeSchema::new(C::WfiAnalysis, None, WFI_ANALYSIS, Unsupported),
        TypeSchema::new(C::WfiGloss, None, WFI_GLOSS, Unsupported),
        TypeSchema::new(C::WfiMorphBundle, None, WFI_MORPH_BUNDLE, Ordered),
    ]
}
