//! Mode registry
//!
//! A [`ModeRegistry`] maps mode names to compiled rule tables plus their display caption
//! and optional fold mode. Modes are compiled once when registered and shared through an
//! `Arc` afterwards.
//!
//! Built-in modes ship as YAML mode files embedded in the binary:
//!
//! | name      | caption   | folding |
//! |-----------|-----------|---------|
//! | eiffel    | Eiffel    |         |
//! | gcode     | G-code    |         |
//! | gitignore | Gitignore |         |
//! | ini       | INI       | section |
//! | lucene    | Lucene    |         |
//! | vhdl      | VHDL      |         |
//!
//! A process that wants one shared registry installs it once with [`init_global`] and
//! reads it through [`global`]. There is no way to change it afterwards.

use crate::modelex::compiler::CompiledMode;
use crate::modelex::error::{ModeError, RegistryError};
use crate::modelex::folding::{FoldMode, SectionFolding};
use crate::modelex::rules::file::{FoldingFile, ModeFile};
use crate::modelex::tokenizer::{LineTokenizer, TokenizerOptions};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const BUILTIN: &[(&str, &str)] = &[
    ("eiffel", include_str!("modes/eiffel.yaml")),
    ("gcode", include_str!("modes/gcode.yaml")),
    ("gitignore", include_str!("modes/gitignore.yaml")),
    ("ini", include_str!("modes/ini.yaml")),
    ("lucene", include_str!("modes/lucene.yaml")),
    ("vhdl", include_str!("modes/vhdl.yaml")),
];

/// Names of the modes [`ModeRegistry::with_defaults`] registers.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(name, _)| *name)
}

/// Source of a built-in mode file.
pub fn builtin_source(name: &str) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, source)| *source)
}

/// A registered mode.
#[derive(Clone)]
pub struct ModeEntry {
    pub name: String,
    pub caption: String,
    pub mode: Arc<CompiledMode>,
    pub folding: Option<Arc<dyn FoldMode>>,
}

impl ModeEntry {
    pub fn new(mode: CompiledMode) -> Self {
        ModeEntry {
            name: mode.name().to_string(),
            caption: mode.name().to_string(),
            mode: Arc::new(mode),
            folding: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn with_folding<F: FoldMode + 'static>(mut self, folding: F) -> Self {
        self.folding = Some(Arc::new(folding));
        self
    }

    /// Compile a parsed mode file.
    pub fn from_file(file: &ModeFile) -> Result<Self, ModeError> {
        let mode = file.to_definition()?.compile()?;
        let mut entry = ModeEntry::new(mode).with_caption(file.caption());

        if let Some(folding) = &file.folding {
            entry.folding = Some(fold_mode(folding)?);
        }
        Ok(entry)
    }

    pub fn tokenizer(&self, options: TokenizerOptions) -> LineTokenizer<'_> {
        LineTokenizer::with_options(&self.mode, options)
    }
}

impl fmt::Debug for ModeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeEntry")
            .field("name", &self.name)
            .field("caption", &self.caption)
            .field("states", &self.mode.state_names().count())
            .field("folding", &self.folding.as_ref().map(|f| f.name().to_string()))
            .finish()
    }
}

fn fold_mode(file: &FoldingFile) -> Result<Arc<dyn FoldMode>, ModeError> {
    match file {
        FoldingFile::Section {
            separator,
            start_marker,
        } => {
            let folding = match start_marker {
                None => SectionFolding::with_separator(separator.as_str()),
                Some(pattern) => {
                    let marker =
                        Regex::new(pattern).map_err(|source| ModeError::InvalidFoldMarker {
                            pattern: pattern.clone(),
                            source,
                        })?;
                    SectionFolding::with_marker(marker, separator.as_str())
                }
            };
            Ok(Arc::new(folding))
        }
    }
}

/// Registry of compiled modes, keyed by name.
#[derive(Debug, Default)]
pub struct ModeRegistry {
    modes: HashMap<String, ModeEntry>,
}

impl ModeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        ModeRegistry {
            modes: HashMap::new(),
        }
    }

    /// Register a mode, replacing (and returning) any mode of the same name.
    pub fn register(&mut self, entry: ModeEntry) -> Option<ModeEntry> {
        debug!(mode = %entry.name, "registered mode");
        self.modes.insert(entry.name.clone(), entry)
    }

    /// Parse, compile and register a YAML mode file.
    pub fn load_str(&mut self, source: &str) -> Result<&ModeEntry, RegistryError> {
        let file = ModeFile::from_yaml(source).map_err(|source| RegistryError::Load {
            name: "<inline>".to_string(),
            source,
        })?;
        self.load(file)
    }

    /// Parse, compile and register a mode file (YAML, or JSON for `.json` paths).
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&ModeEntry, RegistryError> {
        let path = path.as_ref();
        let file = ModeFile::from_path(path).map_err(|source| RegistryError::Load {
            name: path.display().to_string(),
            source,
        })?;
        self.load(file)
    }

    fn load(&mut self, file: ModeFile) -> Result<&ModeEntry, RegistryError> {
        let name = file.name.clone();
        let entry = ModeEntry::from_file(&file).map_err(|source| RegistryError::Load {
            name: name.clone(),
            source,
        })?;
        self.register(entry);
        self.mode(&name)
    }

    pub fn get(&self, name: &str) -> Option<&ModeEntry> {
        self.modes.get(name)
    }

    /// Like [`get`](Self::get), with an error naming the missing mode.
    pub fn mode(&self, name: &str) -> Result<&ModeEntry, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownMode(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.modes.contains_key(name)
    }

    /// All mode names (sorted)
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Entries sorted by name.
    pub fn entries(&self) -> Vec<&ModeEntry> {
        let mut entries: Vec<&ModeEntry> = self.modes.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// A registry with every built-in mode.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for (_, source) in BUILTIN {
            registry.load_str(source)?;
        }
        Ok(registry)
    }
}

static GLOBAL: OnceCell<ModeRegistry> = OnceCell::new();

/// Install the process-wide registry. Fails if one is already installed.
pub fn init_global(registry: ModeRegistry) -> Result<&'static ModeRegistry, RegistryError> {
    GLOBAL
        .try_insert(registry)
        .map_err(|_| RegistryError::AlreadyInitialized)
}

/// The process-wide registry, if [`init_global`] was called.
pub fn global() -> Option<&'static ModeRegistry> {
    GLOBAL.get()
}
