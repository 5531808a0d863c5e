//! Declarative rule definitions
//!
//! A [`ModeDefinition`] is a set of named states, each an ordered list of [`RuleSpec`]s.
//! Rules in a state are tried in the order they were authored and the first one that
//! matches at the current column wins, so order is part of the meaning of a mode.
//!
//! ```text
//! start:
//!     '#.*'            -> comment
//!     '"'              -> string, push string
//! string:
//!     '"'              -> string, pop
//!     '[^"]+'          -> string
//! ```
//!
//! Reuse is by composition rather than inheritance: [`ModeDefinition::derive`] copies a
//! base definition and applies [`Override`]s to it, and [`ModeDefinition::embed`] copies
//! another mode's states under a prefix. Both happen before compilation.
//!
//! Definitions are either built with the methods here or read from a mode file, see
//! [`file`].

pub mod file;

use crate::modelex::compiler::{self, CompiledMode};
use crate::modelex::error::ModeError;
use crate::modelex::keywords::KeywordClassifier;
use crate::modelex::token::{TokenKind, TEXT};
use std::fmt;
use std::sync::Arc;

/// Computes a token kind from the matched text.
pub type KindFn = dyn Fn(&str) -> TokenKind + Send + Sync;

/// How a rule decides the kind of the token it emits.
#[derive(Clone)]
pub enum TokenSpec {
    /// A fixed kind.
    Literal(TokenKind),
    /// One kind per capture group, in group order. The pattern must have exactly as
    /// many capture groups as there are kinds.
    Groups(Vec<TokenKind>),
    /// Look the matched text up in a keyword table.
    Keywords(Arc<KeywordClassifier>),
    /// Any function of the matched text.
    Dynamic(Arc<KindFn>),
}

impl TokenSpec {
    pub fn groups<I, K>(kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<TokenKind>,
    {
        TokenSpec::Groups(kinds.into_iter().map(Into::into).collect())
    }

    pub fn keywords(classifier: KeywordClassifier) -> Self {
        TokenSpec::Keywords(Arc::new(classifier))
    }

    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&str) -> TokenKind + Send + Sync + 'static,
    {
        TokenSpec::Dynamic(Arc::new(f))
    }

    /// Kind for a whole match. `None` for [`TokenSpec::Groups`], which is resolved per group.
    pub fn resolve(&self, text: &str) -> Option<TokenKind> {
        match self {
            TokenSpec::Literal(kind) => Some(kind.clone()),
            TokenSpec::Groups(_) => None,
            TokenSpec::Keywords(classifier) => Some(classifier.classify(text)),
            TokenSpec::Dynamic(f) => Some(f(text)),
        }
    }
}

impl fmt::Debug for TokenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSpec::Literal(kind) => f.debug_tuple("Literal").field(kind).finish(),
            TokenSpec::Groups(kinds) => f.debug_tuple("Groups").field(kinds).finish(),
            TokenSpec::Keywords(c) => f.debug_tuple("Keywords").field(c).finish(),
            TokenSpec::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for TokenSpec {
    fn from(kind: &str) -> Self {
        TokenSpec::Literal(TokenKind::from(kind))
    }
}

impl From<TokenKind> for TokenSpec {
    fn from(kind: TokenKind) -> Self {
        TokenSpec::Literal(kind)
    }
}

impl From<KeywordClassifier> for TokenSpec {
    fn from(classifier: KeywordClassifier) -> Self {
        TokenSpec::keywords(classifier)
    }
}

/// What happens to the state after a rule matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Replace the current state.
    Next(String),
    /// Save the current state and enter another.
    Push(String),
    /// Return to the most recently saved state, or the start state if none is saved.
    Pop,
}

impl Transition {
    pub fn target(&self) -> Option<&str> {
        match self {
            Transition::Next(state) | Transition::Push(state) => Some(state),
            Transition::Pop => None,
        }
    }

    fn map_target(&self, f: &impl Fn(&str) -> String) -> Transition {
        match self {
            Transition::Next(state) => Transition::Next(f(state)),
            Transition::Push(state) => Transition::Push(f(state)),
            Transition::Pop => Transition::Pop,
        }
    }
}

/// A single pattern with its token kind and optional transition.
#[derive(Debug, Clone)]
pub struct MatchRule {
    pub token: TokenSpec,
    /// Regex source, not anchored. Anchoring to the scan position happens at tokenize time.
    pub pattern: String,
    pub transition: Option<Transition>,
    pub case_insensitive: bool,
}

/// One entry of a state's rule list.
#[derive(Debug, Clone)]
pub enum RuleSpec {
    Match(MatchRule),
    /// Splice in the rules of another state, at this position.
    Include(String),
}

impl RuleSpec {
    pub fn new(token: impl Into<TokenSpec>, pattern: impl Into<String>) -> Self {
        RuleSpec::Match(MatchRule {
            token: token.into(),
            pattern: pattern.into(),
            transition: None,
            case_insensitive: false,
        })
    }

    pub fn include(state: impl Into<String>) -> Self {
        RuleSpec::Include(state.into())
    }

    pub fn next(self, state: impl Into<String>) -> Self {
        self.with_transition(Transition::Next(state.into()))
    }

    pub fn push(self, state: impl Into<String>) -> Self {
        self.with_transition(Transition::Push(state.into()))
    }

    pub fn pop(self) -> Self {
        self.with_transition(Transition::Pop)
    }

    pub fn ignore_case(mut self) -> Self {
        if let RuleSpec::Match(rule) = &mut self {
            rule.case_insensitive = true;
        }
        self
    }

    /// Has no effect on [`RuleSpec::Include`].
    pub fn with_transition(mut self, transition: Transition) -> Self {
        if let RuleSpec::Match(rule) = &mut self {
            rule.transition = Some(transition);
        }
        self
    }

    fn map_states(&self, f: &impl Fn(&str) -> String) -> RuleSpec {
        match self {
            RuleSpec::Match(rule) => RuleSpec::Match(MatchRule {
                transition: rule.transition.as_ref().map(|t| t.map_target(f)),
                ..rule.clone()
            }),
            RuleSpec::Include(state) => RuleSpec::Include(f(state)),
        }
    }
}

/// The rules of one state.
#[derive(Debug, Clone, Default)]
pub struct StateDefinition {
    pub rules: Vec<RuleSpec>,
    /// Kind for characters no rule in this state matches. Falls back to the mode's kind.
    pub default_token: Option<TokenKind>,
}

/// Where an [`Override`] puts its rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Prepend,
    Append,
    Replace,
}

/// A change applied to one state of a base definition.
#[derive(Debug, Clone)]
pub struct Override {
    pub state: String,
    pub position: Position,
    pub rules: Vec<RuleSpec>,
}

impl Override {
    pub fn prepend(state: impl Into<String>, rules: Vec<RuleSpec>) -> Self {
        Override {
            state: state.into(),
            position: Position::Prepend,
            rules,
        }
    }

    pub fn append(state: impl Into<String>, rules: Vec<RuleSpec>) -> Self {
        Override {
            state: state.into(),
            position: Position::Append,
            rules,
        }
    }

    pub fn replace(state: impl Into<String>, rules: Vec<RuleSpec>) -> Self {
        Override {
            state: state.into(),
            position: Position::Replace,
            rules,
        }
    }
}

/// A mode: named states with ordered rules.
#[derive(Debug, Clone)]
pub struct ModeDefinition {
    name: String,
    start: String,
    fallback: TokenKind,
    states: Vec<(String, StateDefinition)>,
}

impl ModeDefinition {
    /// An empty mode whose start state is `start` and whose fallback kind is `text`.
    pub fn new(name: impl Into<String>) -> Self {
        ModeDefinition {
            name: name.into(),
            start: "start".to_string(),
            fallback: TokenKind::from(TEXT),
            states: Vec::new(),
        }
    }

    pub fn with_start_state(mut self, state: impl Into<String>) -> Self {
        self.start = state.into();
        self
    }

    pub fn with_fallback(mut self, kind: impl Into<TokenKind>) -> Self {
        self.fallback = kind.into();
        self
    }

    /// Append `rules` to `state`, creating it if needed.
    pub fn state(mut self, state: &str, rules: Vec<RuleSpec>) -> Self {
        self.add_rules(state, rules);
        self
    }

    pub fn default_token(mut self, state: &str, kind: impl Into<TokenKind>) -> Self {
        self.set_default_token(state, kind);
        self
    }

    pub fn add_rules(&mut self, state: &str, rules: Vec<RuleSpec>) {
        self.state_mut(state).rules.extend(rules);
    }

    pub fn set_default_token(&mut self, state: &str, kind: impl Into<TokenKind>) {
        self.state_mut(state).default_token = Some(kind.into());
    }

    pub fn apply(&mut self, change: Override) {
        let state = self.state_mut(&change.state);
        match change.position {
            Position::Prepend => {
                let mut rules = change.rules;
                rules.append(&mut state.rules);
                state.rules = rules;
            }
            Position::Append => state.rules.extend(change.rules),
            Position::Replace => state.rules = change.rules,
        }
    }

    /// A new mode built from `base` plus a list of overrides.
    pub fn derive(
        name: impl Into<String>,
        base: &ModeDefinition,
        overrides: impl IntoIterator<Item = Override>,
    ) -> ModeDefinition {
        let mut derived = ModeDefinition {
            name: name.into(),
            ..base.clone()
        };
        for change in overrides {
            derived.apply(change);
        }
        derived
    }

    /// Copy every state of `other` into this mode, renamed to `prefix + name`.
    ///
    /// Transitions and includes inside the copied states are renamed too, so the embedded
    /// mode keeps working on its own states. `escape` rules are put in front of every
    /// embedded state; they are how the host language takes over again, typically with a
    /// `next` back to one of this mode's states.
    pub fn embed(&mut self, other: &ModeDefinition, prefix: &str, escape: Vec<RuleSpec>) {
        let rename = |state: &str| {
            if other.get_state(state).is_some() {
                format!("{prefix}{state}")
            } else {
                state.to_string()
            }
        };

        for (name, state) in &other.states {
            let mut rules = escape.clone();
            rules.extend(state.rules.iter().map(|rule| rule.map_states(&rename)));
            let embedded = self.state_mut(&format!("{prefix}{name}"));
            embedded.rules = rules;
            embedded.default_token = state.default_token.clone();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_state(&self) -> &str {
        &self.start
    }

    pub fn fallback(&self) -> &TokenKind {
        &self.fallback
    }

    pub fn get_state(&self, name: &str) -> Option<&StateDefinition> {
        self.states.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// States in the order they were first defined.
    pub fn states(&self) -> impl Iterator<Item = (&str, &StateDefinition)> {
        self.states.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn compile(&self) -> Result<CompiledMode, ModeError> {
        compiler::compile(self)
    }

    fn state_mut(&mut self, name: &str) -> &mut StateDefinition {
        let index = match self.states.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.states
                    .push((name.to_string(), StateDefinition::default()));
                self.states.len() - 1
            }
        };
        &mut self.states[index].1
    }
}
