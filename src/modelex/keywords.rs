//! Keyword classification
//!
//! A [`KeywordClassifier`] maps identifier text to a token kind. It is built from several
//! `kind -> "a|b|c"` lists and a default kind for everything else:
//!
//! ```text
//! keyword:           if|then|else
//! constant.language: true|false
//! default:           identifier
//! ```
//!
//! A post-classification hook may reclassify identifiers the table does not know, for
//! instance turning all-uppercase names into type names. The hook only runs when the
//! lookup falls through to the default kind, so an explicit table entry always wins.

use crate::modelex::error::ModeError;
use crate::modelex::token::TokenKind;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reclassifies an identifier the table did not know. `None` keeps the default kind.
pub type KeywordHook = dyn Fn(&str) -> Option<TokenKind> + Send + Sync;

/// Kind assigned by [`uppercase_as_type`].
pub const TYPE_NAME: &str = "entity.name.type";

/// Exact-match lookup from identifier text to token kind.
#[derive(Clone)]
pub struct KeywordClassifier {
    table: HashMap<String, TokenKind>,
    default: TokenKind,
    case_insensitive: bool,
    hook: Option<Arc<KeywordHook>>,
}

impl KeywordClassifier {
    pub fn builder(default: impl Into<TokenKind>) -> KeywordClassifierBuilder {
        KeywordClassifierBuilder {
            groups: Vec::new(),
            default: default.into(),
            case_insensitive: false,
            hook: None,
        }
    }

    pub fn classify(&self, text: &str) -> TokenKind {
        let found = if self.case_insensitive {
            self.table.get(&text.to_lowercase())
        } else {
            self.table.get(text)
        };

        match found {
            Some(kind) => kind.clone(),
            None => self
                .hook
                .as_ref()
                .and_then(|hook| hook(text))
                .unwrap_or_else(|| self.default.clone()),
        }
    }

    /// Table lookup only, without the default kind or the hook.
    pub fn lookup(&self, text: &str) -> Option<&TokenKind> {
        if self.case_insensitive {
            self.table.get(&text.to_lowercase())
        } else {
            self.table.get(text)
        }
    }

    pub fn default_kind(&self) -> &TokenKind {
        &self.default
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl fmt::Debug for KeywordClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordClassifier")
            .field("keywords", &self.table.len())
            .field("default", &self.default)
            .field("case_insensitive", &self.case_insensitive)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// Collects keyword lists before building a [`KeywordClassifier`].
pub struct KeywordClassifierBuilder {
    groups: Vec<(TokenKind, String)>,
    default: TokenKind,
    case_insensitive: bool,
    hook: Option<Arc<KeywordHook>>,
}

impl KeywordClassifierBuilder {
    /// Add a pipe-delimited keyword list for `kind`. Empty entries are ignored.
    pub fn kinds(mut self, kind: impl Into<TokenKind>, keywords: impl Into<String>) -> Self {
        self.groups.push((kind.into(), keywords.into()));
        self
    }

    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn post_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> Option<TokenKind> + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn shared_hook(mut self, hook: Arc<KeywordHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Build the lookup table.
    ///
    /// A keyword listed under two different kinds is rejected. Under case-insensitive
    /// lookup, keywords differing only in case count as the same keyword.
    pub fn build(self) -> Result<KeywordClassifier, ModeError> {
        let mut table: HashMap<String, TokenKind> = HashMap::new();

        for (kind, list) in &self.groups {
            for word in list.split('|').filter(|w| !w.is_empty()) {
                let key = if self.case_insensitive {
                    word.to_lowercase()
                } else {
                    word.to_string()
                };
                match table.get(&key) {
                    Some(existing) if existing != kind => {
                        return Err(ModeError::AmbiguousKeyword {
                            keyword: key,
                            first: existing.to_string(),
                            second: kind.to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        table.insert(key, kind.clone());
                    }
                }
            }
        }

        Ok(KeywordClassifier {
            table,
            default: self.default,
            case_insensitive: self.case_insensitive,
            hook: self.hook,
        })
    }
}

/// All-uppercase identifiers (`STRING`, `HASH_TABLE`) become [`TYPE_NAME`].
pub fn uppercase_as_type(text: &str) -> Option<TokenKind> {
    let has_upper = text.chars().any(char::is_uppercase);
    let has_lower = text.chars().any(char::is_lowercase);
    (has_upper && !has_lower).then(|| TokenKind::from(TYPE_NAME))
}

/// Hooks that mode files can refer to by name.
pub fn named_hook(name: &str) -> Result<Arc<KeywordHook>, ModeError> {
    match name {
        "uppercase-as-type" => Ok(Arc::new(uppercase_as_type)),
        other => Err(ModeError::UnknownHook(other.to_string())),
    }
}
