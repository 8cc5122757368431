//! Type tags for every entity variant the model knows about.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

macro_rules! type_tags {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            pub fn parse(s: &str) -> Result<Self, SchemaError> {
                match s {
                    $(stringify!($variant) => Ok($name::$variant),)+
                    _ => Err(SchemaError::UnknownTypeName(s.to_string())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

type_tags! {
    /// Instantiable entity variants.
    ConcreteType {
        LexDb,
        LexEntry,
        LexSense,
        LexExampleSentence,
        LexPronunciation,
        CmTranslation,
        MoStemAllomorph,
        MoAffixAllomorph,
        MoMorphType,
        PartOfSpeech,
        CmSemanticDomain,
        CmCustomItem,
        CmPossibilityList,
        PhPhonData,
        PhPhoneme,
        PhEnvironment,
        PhRegularRule,
        PhMetathesisRule,
        PhSegRuleRhs,
        PhSimpleContextSeg,
        Text,
        StText,
        StTxtPara,
        WfiWordform,
        WfiAnalysis,
        WfiGloss,
        WfiMorphBundle,
    }
}

type_tags! {
    /// Abstract bases shared by several concrete variants.
    BaseType {
        MoForm,
        PhSegmentRule,
        CmPossibility,
    }
}
