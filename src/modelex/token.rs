//! Tokens and line states
//!
//! A [`Token`] is a classified slice of one line. Tokens produced for a line are ordered,
//! never overlap and cover the whole line.
//!
//! A [`LineState`] is what a line ends in: the current state plus the stack of states
//! saved by `push` rules. Hosts store it per line and hand it back verbatim when
//! tokenizing the next line. It is only meaningful for the compiled mode that produced it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// The kind assigned to input no rule matched, unless the state declares its own default.
pub const TEXT: &str = "text";

/// A token kind label such as `keyword` or `constant.language`.
///
/// Cloning is cheap: the label is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKind(Arc<str>);

impl TokenKind {
    pub fn new(kind: impl AsRef<str>) -> Self {
        TokenKind(Arc::from(kind.as_ref()))
    }

    /// The `text` kind.
    pub fn text() -> Self {
        TokenKind::new(TEXT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TokenKind {
    fn from(kind: &str) -> Self {
        TokenKind::new(kind)
    }
}

impl From<String> for TokenKind {
    fn from(kind: String) -> Self {
        TokenKind(Arc::from(kind))
    }
}

impl PartialEq<str> for TokenKind {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for TokenKind {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for TokenKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TokenKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(TokenKind::from)
    }
}

/// A classified slice of a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte range of `text` within the line.
    pub span: Range<usize>,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, line: &'a str, span: Range<usize>) -> Self {
        Token {
            kind,
            text: &line[span.clone()],
            span,
        }
    }

    pub fn len(&self) -> usize {
        self.span.len()
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }
}

/// Index of a state within a compiled mode. The start state is always `StateId(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct StateId(pub(crate) u32);

impl StateId {
    pub const START: StateId = StateId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The state a line ends in, including every state saved by `push`.
///
/// `LineState::default()` is the start state of any mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LineState {
    state: StateId,
    stack: Vec<StateId>,
}

impl LineState {
    pub(crate) fn from_parts(state: StateId, stack: Vec<StateId>) -> Self {
        LineState { state, stack }
    }

    pub(crate) fn into_parts(self) -> (StateId, Vec<StateId>) {
        (self.state, self.stack)
    }

    /// The state the next line starts in.
    pub fn state(&self) -> StateId {
        self.state
    }

    /// States saved by `push`, innermost last.
    pub fn stack(&self) -> &[StateId] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_start(&self) -> bool {
        self.state == StateId::START && self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_kind_compares_with_str() {
        let kind = TokenKind::from("keyword");
        assert_eq!(kind, "keyword");
        assert_eq!(kind.to_string(), "keyword");
        assert_eq!(format!("{:?}", kind), "\"keyword\"");
    }

    #[test]
    fn test_token_slices_line() {
        let line = "let x";
        let token = Token::new(TokenKind::from("keyword"), line, 0..3);
        assert_eq!(token.text, "let");
        assert_eq!(token.len(), 3);
    }

    #[test]
    fn test_default_line_state_is_start() {
        let state = LineState::default();
        assert!(state.is_start());
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn test_line_state_serde_roundtrip() {
        let state = LineState::from_parts(StateId(2), vec![StateId(0), StateId(1)]);
        let json = serde_json::to_string(&state).unwrap();
        let back: LineState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
