//! Decoration vocabulary: which `{Name}` markers mean what.
//!
//! The built-in entries cover the two marks JPW files use (`ZhongYin`,
//! `BoYin`). A YAML file can add or override names:
//!
//! ```yaml
//! decorations:
//!   ZhongYin: accent
//!   Chan: trill
//! ```

use crate::ast::Ornament;
use crate::error::{JpwError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoration {
    Accent,
    Ornament(Ornament),
}

impl Decoration {
    fn from_kind(kind: &str) -> Option<Self> {
        match kind.trim().to_lowercase().as_str() {
            "accent" => Some(Decoration::Accent),
            "prall" => Some(Decoration::Ornament(Ornament::Prall)),
            "mordent" => Some(Decoration::Ornament(Ornament::Mordent)),
            "trill" => Some(Decoration::Ornament(Ornament::Trill)),
            "turn" => Some(Decoration::Ornament(Ornament::Turn)),
            "fermata" => Some(Decoration::Ornament(Ornament::Fermata)),
            _ => None,
        }
    }
}

/// Raw vocabulary for YAML deserialization
#[derive(Deserialize, Debug, Default)]
struct RawVocabulary {
    #[serde(default)]
    decorations: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    entries: HashMap<String, Decoration>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert("ZhongYin".to_string(), Decoration::Accent);
        entries.insert("BoYin".to_string(), Decoration::Ornament(Ornament::Prall));
        Self { entries }
    }
}

impl Vocabulary {
    pub fn lookup(&self, name: &str) -> Option<Decoration> {
        self.entries.get(name.trim()).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, decoration: Decoration) {
        self.entries.insert(name.into(), decoration);
    }

    /// Built-in entries extended by a YAML document
    pub fn from_yaml(source: &str) -> Result<Self> {
        let raw: RawVocabulary = serde_yaml::from_str(source)
            .map_err(|e| JpwError::VocabularyError(e.to_string()))?;

        let mut vocabulary = Self::default();
        for (name, kind) in raw.decorations {
            let decoration = Decoration::from_kind(&kind).ok_or_else(|| {
                JpwError::VocabularyError(format!(
                    "decoration '{}' has unknown kind '{}'",
                    name, kind
                ))
            })?;
            vocabulary.insert(name, decoration);
        }
        Ok(vocabulary)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|source| JpwError::InputUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loading decoration vocabulary from {}", path.display());
        Self::from_yaml(&source)
    }
}
