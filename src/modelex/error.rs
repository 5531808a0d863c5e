//! Errors surfaced while loading modes
//!
//! Every problem with a rule table is reported when the mode is compiled. Tokenizing a
//! line never fails: unmatched input is consumed by the fallback policy instead.

use thiserror::Error;

/// A rule table could not be loaded or compiled.
#[derive(Debug, Error)]
pub enum ModeError {
    #[error("state '{state}', rule {index}: invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        state: String,
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Every rule compiled on its own but the merged alternation for the state did not,
    /// usually because two rules reuse the same named capture group.
    #[error("state '{state}': rules cannot be merged: {source}")]
    MergeFailed {
        state: String,
        #[source]
        source: regex::Error,
    },

    #[error("state '{state}' references unknown state '{target}'")]
    UnknownState { state: String, target: String },

    #[error("mode '{mode}' has no start state '{state}'")]
    MissingStartState { mode: String, state: String },

    #[error("include cycle: {}", .0.join(" -> "))]
    IncludeCycle(Vec<String>),

    #[error("state '{state}', rule {index}: {kinds} token kinds for {groups} capture groups")]
    GroupCountMismatch {
        state: String,
        index: usize,
        kinds: usize,
        groups: usize,
    },

    #[error("keyword '{keyword}' is classified as both '{first}' and '{second}'")]
    AmbiguousKeyword {
        keyword: String,
        first: String,
        second: String,
    },

    #[error("unknown keyword hook '{0}'")]
    UnknownHook(String),

    #[error("unknown keyword classifier '{0}'")]
    UnknownClassifier(String),

    #[error("invalid rule in state '{state}': {reason}")]
    InvalidRule { state: String, reason: String },

    #[error("invalid fold marker `{pattern}`: {source}")]
    InvalidFoldMarker {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid mode file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid mode file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A mode registry lookup or registration failed.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("mode '{0}' not found")]
    UnknownMode(String),

    #[error("the global mode registry is already initialized")]
    AlreadyInitialized,

    #[error("failed to load mode '{name}': {source}")]
    Load {
        name: String,
        #[source]
        source: ModeError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_cycle_display() {
        let err = ModeError::IncludeCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "include cycle: a -> b -> a");
    }

    #[test]
    fn test_group_count_display() {
        let err = ModeError::GroupCountMismatch {
            state: "start".into(),
            index: 2,
            kinds: 3,
            groups: 2,
        };
        assert_eq!(
            err.to_string(),
            "state 'start', rule 2: 3 token kinds for 2 capture groups"
        );
    }
}
