//! # modelex
//!
//! A rule-driven, line-oriented syntax highlighting tokenizer.
//!
//! File Layout
//!
//! A mode is a set of named states, each an ordered list of regex rules. Modes are
//! authored either through the builder API or as YAML mode files, compiled once into an
//! immutable table, and then used to tokenize one line at a time. The state a line ends
//! in is handed back to the host, which feeds it into the next line.
//!
//! src/modelex
//!   ├── rules        Declarative rule definitions, composition and the YAML schema
//!   ├── keywords     Keyword classification tables and post-classification hooks
//!   ├── compiler     Rule table compilation and load-time validation
//!   ├── tokenizer    The line tokenizer / state machine driver and the line state cache
//!   ├── folding      Fold ranges (INI style sections)
//!   ├── modes        Built-in modes and the mode registry
//!   └── settings     Layered configuration for applications
//!
//! For testing helpers, see the [testing module](modelex::testing).

#![allow(rustdoc::invalid_html_tags)]

pub mod modelex;

pub use modelex::{
    CompiledMode, FoldMode, FoldRange, KeywordClassifier, LineState, LineTokenizer, LineTokens,
    ModeDefinition, ModeError, ModeRegistry, RuleSpec, Token, TokenKind, TokenSpec, Transition,
};
