//! Text-valued field contents.
//!
//! [`MultiString`] and [`RichText`] are deliberately unrelated types: a
//! localized string carries one alternative per writing system, a rich text
//! value is a single formatted string tagged with one writing system. There
//! is no conversion between them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::WsId;

/// One text alternative per writing system (`LocalizedString` fields).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiString {
    alternatives: BTreeMap<WsId, String>,
}

impl MultiString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, ws: impl Into<WsId>, text: impl Into<String>) -> Self {
        self.set(ws, text);
        self
    }

    pub fn set(&mut self, ws: impl Into<WsId>, text: impl Into<String>) {
        self.alternatives.insert(ws.into(), text.into());
    }

    pub fn get(&self, ws: &WsId) -> Option<&str> {
        self.alternatives.get(ws).map(String::as_str)
    }

    pub fn alternatives(&self) -> impl Iterator<Item = (&WsId, &str)> {
        self.alternatives.iter().map(|(ws, s)| (ws, s.as_str()))
    }

    pub fn writing_systems(&self) -> impl Iterator<Item = &WsId> {
        self.alternatives.keys()
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    /// True when no alternative carries any text.
    pub fn is_empty(&self) -> bool {
        self.alternatives.values().all(String::is_empty)
    }

    /// Copy every alternative of `other` for which this string has no text.
    /// Returns the number of alternatives adopted.
    pub fn fill_missing_from(&mut self, other: &MultiString) -> usize {
        let mut adopted = 0;
        for (ws, text) in &other.alternatives {
            if text.is_empty() {
                continue;
            }
            let slot = self.alternatives.entry(ws.clone()).or_default();
            if slot.is_empty() {
                slot.clone_from(text);
                adopted += 1;
            }
        }
        adopted
    }
}

/// A single formatted string tagged with one writing system (`RichText` fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    text: String,
    ws: WsId,
}

impl RichText {
    pub fn new(text: impl Into<String>, ws: impl Into<WsId>) -> Self {
        Self {
            text: text.into(),
            ws: ws.into(),
        }
    }

    /// Reconstruct a formatted value from plain content and a writing system.
    pub fn from_plain(text: &str, ws: &WsId) -> Self {
        Self {
            text: text.to_string(),
            ws: ws.clone(),
        }
    }

    pub fn plain_text(&self) -> &str {
        &self.text
    }

    pub fn ws(&self) -> &WsId {
        &self.ws
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
