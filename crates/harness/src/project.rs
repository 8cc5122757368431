use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use lexmodel_core::{
    ConcreteType, EntityId, FieldValue, MultiString, RichText, SchemaRegistry, WsId,
};
use lexmodel_engine::{Engine, EngineConfig, EngineError};
use lexmodel_storage::SqliteStore;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub const ANALYSIS_WS: &str = "en";
pub const VERNACULAR_WS: &str = "seh-fonipa";

/// Install a test subscriber once per process; `RUST_LOG` overrides the default level.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn ws(tag: &str) -> WsId {
    WsId::new(tag)
}

/// Analysis-language localized string.
pub fn en(text: &str) -> MultiString {
    MultiString::new().with(ANALYSIS_WS, text)
}

type SeedResult<T> = Result<T, Box<dyn Error>>;

/// A project backed by its own SQLite store, with helpers that seed
/// realistic lexicon, phonology and text data through the engine.
pub struct TestProject {
    pub engine: Engine<SqliteStore>,
    dir: Option<TempDir>,
}

impl TestProject {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        let registry = Arc::new(SchemaRegistry::standard()?);
        let store = SqliteStore::open_in_memory()?;
        Ok(Self {
            engine: Engine::with_config(registry, store, config),
            dir: None,
        })
    }

    /// Project over an explicit registry and store.
    pub fn with_parts(registry: SchemaRegistry, store: SqliteStore) -> Self {
        Self {
            engine: Engine::new(Arc::new(registry), store),
            dir: None,
        }
    }

    /// File-backed project in a fresh temporary directory.
    pub fn on_disk() -> SeedResult<Self> {
        init_test_logging();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("project.sqlite");
        let store = SqliteStore::open(path.to_str().ok_or("non-utf8 temp path")?)?;
        Ok(Self {
            engine: Engine::new(Arc::new(SchemaRegistry::standard()?), store),
            dir: Some(dir),
        })
    }

    pub fn db_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.path().join("project.sqlite"))
    }

    /// Close this project and reopen its file without write access.
    pub fn reopen_read_only(self) -> SeedResult<Self> {
        let path = self.db_path().ok_or("project is not file-backed")?;
        let registry = Arc::clone(self.engine.registry());
        let dir = self.dir;
        drop(self.engine);
        let store = SqliteStore::open_read_only(path.to_str().ok_or("non-utf8 temp path")?)?;
        Ok(Self {
            engine: Engine::new(registry, store),
            dir,
        })
    }

    // ========================================================================
    // Phonology
    // ========================================================================

    pub fn phon_data(&mut self) -> SeedResult<EntityId> {
        Ok(self.engine.create(ConcreteType::PhPhonData)?.id)
    }

    pub fn phoneme(&mut self, data: EntityId, name: &str, ipa: &str) -> SeedResult<EntityId> {
        let phoneme = self
            .engine
            .create_owned(data, "phonemes", ConcreteType::PhPhoneme)?
            .id;
        self.engine.set_localized(phoneme, "name", &en(name))?;
        self.engine
            .set_rich(phoneme, "basic_ipa_symbol", &RichText::new(ipa, VERNACULAR_WS))?;
        Ok(phoneme)
    }

    /// Context segment matching `phoneme`, appended to `owner.field`.
    pub fn context(
        &mut self,
        owner: EntityId,
        field: &str,
        phoneme: EntityId,
    ) -> SeedResult<EntityId> {
        let seg = self
            .engine
            .create_owned(owner, field, ConcreteType::PhSimpleContextSeg)?
            .id;
        self.engine.set_references(seg, "segment", &[phoneme])?;
        self.engine
            .set_scalar(seg, "min_occurrence", FieldValue::Integer(1))?;
        self.engine
            .set_scalar(seg, "max_occurrence", FieldValue::Integer(1))?;
        Ok(seg)
    }

    /// Regular rule with one input context and one output spec whose
    /// structural change targets `output`.
    pub fn regular_rule(
        &mut self,
        data: EntityId,
        name: &str,
        input: EntityId,
        output: EntityId,
    ) -> SeedResult<EntityId> {
        let rule = self
            .engine
            .create_owned(data, "phon_rules", ConcreteType::PhRegularRule)?
            .id;
        self.engine.set_localized(rule, "name", &en(name))?;
        self.context(rule, "input_contexts", input)?;
        let spec = self
            .engine
            .create_owned(rule, "output_specs", ConcreteType::PhSegRuleRhs)?
            .id;
        self.context(spec, "struc_change", output)?;
        Ok(rule)
    }

    pub fn metathesis_rule(
        &mut self,
        data: EntityId,
        name: &str,
        left: i64,
        right: i64,
    ) -> SeedResult<EntityId> {
        let rule = self
            .engine
            .create_owned(data, "phon_rules", ConcreteType::PhMetathesisRule)?
            .id;
        self.engine.set_localized(rule, "name", &en(name))?;
        self.engine
            .set_scalar(rule, "left_metathesis_part", FieldValue::Integer(left))?;
        self.engine
            .set_scalar(rule, "right_metathesis_part", FieldValue::Integer(right))?;
        Ok(rule)
    }

    // ========================================================================
    // Lexicon
    // ========================================================================

    pub fn lexicon(&mut self) -> SeedResult<EntityId> {
        Ok(self.engine.create(ConcreteType::LexDb)?.id)
    }

    /// Entry with a stem allomorph as its lexeme form.
    pub fn entry(&mut self, db: EntityId, citation: &str) -> SeedResult<EntityId> {
        let entry = self
            .engine
            .create_owned(db, "entries", ConcreteType::LexEntry)?
            .id;
        self.engine.set_localized(
            entry,
            "citation_form",
            &MultiString::new().with(VERNACULAR_WS, citation),
        )?;
        let form = self
            .engine
            .create_owned(entry, "lexeme_form", ConcreteType::MoStemAllomorph)?
            .id;
        self.engine.set_localized(
            form,
            "form",
            &MultiString::new().with(VERNACULAR_WS, citation),
        )?;
        Ok(entry)
    }

    pub fn sense(&mut self, entry: EntityId, gloss: &str) -> SeedResult<EntityId> {
        let sense = self
            .engine
            .create_owned(entry, "senses", ConcreteType::LexSense)?
            .id;
        self.engine.set_localized(sense, "gloss", &en(gloss))?;
        Ok(sense)
    }

    pub fn semantic_domain(&mut self, name: &str) -> SeedResult<EntityId> {
        let domain = self.engine.create(ConcreteType::CmSemanticDomain)?.id;
        self.engine.set_localized(domain, "name", &en(name))?;
        Ok(domain)
    }

    pub fn part_of_speech(&mut self, name: &str) -> SeedResult<EntityId> {
        let pos = self.engine.create(ConcreteType::PartOfSpeech)?.id;
        self.engine.set_localized(pos, "name", &en(name))?;
        Ok(pos)
    }

    // ========================================================================
    // Texts
    // ========================================================================

    /// Text whose body holds one paragraph per entry of `paragraphs`.
    pub fn text(&mut self, name: &str, paragraphs: &[&str]) -> SeedResult<EntityId> {
        let text = self.engine.create(ConcreteType::Text)?.id;
        self.engine.set_localized(text, "name", &en(name))?;
        let body = self
            .engine
            .create_owned(text, "contents", ConcreteType::StText)?
            .id;
        for content in paragraphs {
            let para = self
                .engine
                .create_owned(body, "paragraphs", ConcreteType::StTxtPara)?
                .id;
            self.engine
                .set_rich(para, "contents", &RichText::new(*content, VERNACULAR_WS))?;
        }
        Ok(text)
    }
}
