//! Main module for modelex library functionality
//!
//! The pipeline per visible line is:
//! 1. [`rules`] describe a mode (built in Rust or loaded from a YAML mode file)
//! 2. [`compiler`] turns the description into a [`CompiledMode`], rejecting broken rules up front
//! 3. [`tokenizer`] runs the state machine over one line, given the state the previous line ended in
//! 4. [`folding`] optionally computes fold ranges over the raw lines

pub mod compiler;
pub mod error;
pub mod folding;
pub mod keywords;
pub mod modes;
pub mod rules;
pub mod settings;
pub mod testing;
pub mod token;
pub mod tokenizer;

pub use compiler::{CompiledMode, RuleRef};
pub use error::{ModeError, RegistryError};
pub use folding::{FoldMarker, FoldMode, FoldRange, SectionFolding};
pub use keywords::{KeywordClassifier, KeywordClassifierBuilder};
pub use modes::{ModeEntry, ModeRegistry};
pub use rules::{ModeDefinition, Override, Position, RuleSpec, TokenSpec, Transition};
pub use token::{LineState, StateId, Token, TokenKind};
pub use tokenizer::{LineStateCache, LineTokenizer, LineTokens, TokenizerOptions};
