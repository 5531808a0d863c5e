//! Mode files
//!
//! The declarative form of a [`ModeDefinition`], read from YAML (or JSON):
//!
//! ```text
//! name: ini
//! caption: INI
//! keywords:
//!   main:
//!     default: identifier
//!     case_insensitive: true
//!     post_hook: uppercase-as-type
//!     kinds:
//!       keyword: if|then|else
//! folding:
//!   type: section
//! states:
//!   start:
//!     - token: comment
//!       regex: '#.*'
//!     - token: [punctuation, title, punctuation]
//!       regex: '^(\[)(.*?)(\])'
//!     - keywords: main
//!       regex: '[a-zA-Z_]\w*'
//!     - token: string
//!       regex: '"'
//!       push: string
//!   string:
//!     - default_token: string
//!     - token: string
//!       regex: '"'
//!       pop: true
//!     - include: escapes
//! ```
//!
//! Each rule entry is one of: a match rule (`regex` plus exactly one of `token` or
//! `keywords`, and at most one of `next`, `push`, `pop`), an `include`, or a
//! `default_token` setting for the state. Anything else is rejected at load time.

use crate::modelex::error::ModeError;
use crate::modelex::keywords::{named_hook, KeywordClassifier};
use crate::modelex::rules::{MatchRule, ModeDefinition, RuleSpec, TokenSpec, Transition};
use crate::modelex::token::TokenKind;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// A parsed mode file, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeFile {
    pub name: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default)]
    pub fallback_token: Option<String>,
    #[serde(default)]
    pub keywords: BTreeMap<String, KeywordFile>,
    #[serde(default)]
    pub folding: Option<FoldingFile>,
    pub states: BTreeMap<String, Vec<RuleFile>>,
}

fn default_start() -> String {
    "start".to_string()
}

fn default_identifier() -> String {
    "identifier".to_string()
}

fn default_separator() -> String {
    ".".to_string()
}

/// A named keyword classifier.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordFile {
    #[serde(default = "default_identifier")]
    pub default: String,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub post_hook: Option<String>,
    /// Kind to pipe-delimited keyword list.
    pub kinds: BTreeMap<String, String>,
}

/// Fold mode attached to the mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FoldingFile {
    Section {
        #[serde(default = "default_separator")]
        separator: String,
        #[serde(default)]
        start_marker: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TokenField {
    Single(String),
    Groups(Vec<String>),
}

/// One entry of a state's list. All fields are optional here; which combinations are
/// valid is checked by [`RuleFile::into_entry`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    #[serde(default)]
    pub token: Option<TokenField>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub push: Option<String>,
    #[serde(default)]
    pub pop: bool,
    #[serde(default)]
    pub include: Option<String>,
    #[serde(default)]
    pub default_token: Option<String>,
    #[serde(default)]
    pub case_insensitive: bool,
}

enum Entry {
    Rule(RuleSpec),
    DefaultToken(TokenKind),
}

impl RuleFile {
    fn into_entry(
        self,
        state: &str,
        classifiers: &BTreeMap<String, Arc<KeywordClassifier>>,
    ) -> Result<Entry, ModeError> {
        let invalid = |reason: &str| ModeError::InvalidRule {
            state: state.to_string(),
            reason: reason.to_string(),
        };
        let has_match_fields = self.token.is_some()
            || self.keywords.is_some()
            || self.regex.is_some()
            || self.next.is_some()
            || self.push.is_some()
            || self.pop
            || self.case_insensitive;

        if let Some(kind) = self.default_token {
            if has_match_fields || self.include.is_some() {
                return Err(invalid("'default_token' must stand alone"));
            }
            return Ok(Entry::DefaultToken(TokenKind::from(kind)));
        }

        if let Some(target) = self.include {
            if has_match_fields {
                return Err(invalid("'include' must stand alone"));
            }
            return Ok(Entry::Rule(RuleSpec::Include(target)));
        }

        let pattern = self.regex.ok_or_else(|| invalid("missing 'regex'"))?;

        let token = match (self.token, self.keywords) {
            (Some(TokenField::Single(kind)), None) => TokenSpec::Literal(TokenKind::from(kind)),
            (Some(TokenField::Groups(kinds)), None) => TokenSpec::groups(kinds),
            (None, Some(name)) => {
                let classifier = classifiers
                    .get(&name)
                    .ok_or(ModeError::UnknownClassifier(name))?;
                TokenSpec::Keywords(Arc::clone(classifier))
            }
            (Some(_), Some(_)) => return Err(invalid("both 'token' and 'keywords' given")),
            (None, None) => return Err(invalid("missing 'token' or 'keywords'")),
        };

        let transition = match (self.next, self.push, self.pop) {
            (None, None, false) => None,
            (Some(state), None, false) => Some(Transition::Next(state)),
            (None, Some(state), false) => Some(Transition::Push(state)),
            (None, None, true) => Some(Transition::Pop),
            _ => return Err(invalid("at most one of 'next', 'push', 'pop' is allowed")),
        };

        Ok(Entry::Rule(RuleSpec::Match(MatchRule {
            token,
            pattern,
            transition,
            case_insensitive: self.case_insensitive,
        })))
    }
}

impl KeywordFile {
    fn build(&self) -> Result<KeywordClassifier, ModeError> {
        let mut builder = KeywordClassifier::builder(self.default.as_str())
            .case_insensitive(self.case_insensitive);
        for (kind, list) in &self.kinds {
            builder = builder.kinds(kind.as_str(), list.as_str());
        }
        if let Some(name) = &self.post_hook {
            builder = builder.shared_hook(named_hook(name)?);
        }
        builder.build()
    }
}

impl ModeFile {
    pub fn from_yaml(source: &str) -> Result<Self, ModeError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json(source: &str) -> Result<Self, ModeError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Read a mode file, choosing JSON for `.json` files and YAML for anything else.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModeError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&source),
            _ => Self::from_yaml(&source),
        }
    }

    /// Caption for display; the mode name if none is given.
    pub fn caption(&self) -> &str {
        self.caption.as_deref().unwrap_or(&self.name)
    }

    /// Validate the entries and build the definition. Regexes are not compiled here.
    pub fn to_definition(&self) -> Result<ModeDefinition, ModeError> {
        let mut classifiers = BTreeMap::new();
        for (name, file) in &self.keywords {
            classifiers.insert(name.clone(), Arc::new(file.build()?));
        }

        let mut def = ModeDefinition::new(self.name.as_str()).with_start_state(self.start.as_str());
        if let Some(kind) = &self.fallback_token {
            def = def.with_fallback(kind.as_str());
        }

        // The start state goes first so it keeps the lowest id; the rest follow in name order.
        let mut names: Vec<&String> = self.states.keys().collect();
        names.sort_by_key(|name| **name != self.start);

        for name in names {
            let mut rules = Vec::new();
            for entry in &self.states[name] {
                match entry.clone().into_entry(name, &classifiers)? {
                    Entry::Rule(rule) => rules.push(rule),
                    Entry::DefaultToken(kind) => def.set_default_token(name, kind),
                }
            }
            def.add_rules(name, rules);
        }

        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: sample
caption: Sample
keywords:
  main:
    kinds:
      keyword: if|else
states:
  start:
    - token: comment
      regex: '#.*'
    - keywords: main
      regex: '\w+'
    - token: string
      regex: '"'
      push: string
  string:
    - default_token: string
    - token: string
      regex: '"'
      pop: true
"#;

    #[test]
    fn test_parse_sample() {
        let file = ModeFile::from_yaml(SAMPLE).unwrap();
        assert_eq!(file.caption(), "Sample");
        let def = file.to_definition().unwrap();
        assert_eq!(def.get_state("start").unwrap().rules.len(), 3);
        let string = def.get_state("string").unwrap();
        assert_eq!(string.rules.len(), 1);
        assert_eq!(string.default_token.as_ref().unwrap(), "string");
    }

    #[test]
    fn test_start_state_comes_first() {
        let file = ModeFile::from_yaml(SAMPLE).unwrap();
        let def = file.to_definition().unwrap();
        let first = def.states().next().unwrap().0;
        assert_eq!(first, "start");
    }

    #[test]
    fn test_unknown_classifier() {
        let yaml = "name: x\nstates:\n  start:\n    - keywords: nope\n      regex: a\n";
        let err = ModeFile::from_yaml(yaml).unwrap().to_definition().unwrap_err();
        assert!(matches!(err, ModeError::UnknownClassifier(ref n) if n == "nope"));
    }

    #[test]
    fn test_two_transitions_rejected() {
        let yaml = "name: x\nstates:\n  start:\n    - token: a\n      regex: a\n      next: b\n      pop: true\n";
        let err = ModeFile::from_yaml(yaml).unwrap().to_definition().unwrap_err();
        assert!(matches!(err, ModeError::InvalidRule { .. }));
    }

    #[test]
    fn test_missing_regex_rejected() {
        let yaml = "name: x\nstates:\n  start:\n    - token: a\n";
        let err = ModeFile::from_yaml(yaml).unwrap().to_definition().unwrap_err();
        assert!(err.to_string().contains("missing 'regex'"));
    }

    #[test]
    fn test_include_must_stand_alone() {
        let yaml = "name: x\nstates:\n  start:\n    - include: a\n      regex: b\n";
        let err = ModeFile::from_yaml(yaml).unwrap().to_definition().unwrap_err();
        assert!(matches!(err, ModeError::InvalidRule { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "name: x\nstates:\n  start:\n    - token: a\n      regexp: b\n";
        assert!(matches!(ModeFile::from_yaml(yaml), Err(ModeError::Yaml(_))));
    }

    #[test]
    fn test_json_mode_file() {
        let json = r#"{"name": "j", "states": {"start": [{"token": ["a", "b"], "regex": "(x)(y)"}]}}"#;
        let def = ModeFile::from_json(json).unwrap().to_definition().unwrap();
        assert_eq!(def.name(), "j");
    }

    #[test]
    fn test_section_folding_field() {
        let yaml = "name: x\nfolding:\n  type: section\nstates:\n  start: []\n";
        let file = ModeFile::from_yaml(yaml).unwrap();
        assert!(matches!(
            file.folding,
            Some(FoldingFile::Section { ref separator, start_marker: None }) if separator == "."
        ));
    }
}
