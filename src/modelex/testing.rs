//! Testing utilities for tokenizer output
//!
//! Mode tests should check the whole token stream of a line, not just a count, so this
//! module provides a fluent assertion API over [`LineTokens`]:
//!
//! ```rust-example
//! let out = mode.tokenize_line("[section]", &mode.start_state());
//! assert_tokens(&out)
//!     .covers("[section]")
//!     .count(3)
//!     .token(1, "constant.section.group-title.ini", "section")
//!     .ends_in(&mode, &["start"]);
//! ```
//!
//! For multi-line scenarios, [`render`] produces a stable text form suitable for inline
//! snapshots: one row per line, tokens as `kind:"text"`, followed by the end state path.

use crate::modelex::compiler::CompiledMode;
use crate::modelex::token::LineState;
use crate::modelex::tokenizer::{LineTokenizer, LineTokens};

/// Create an assertion builder for one line's output.
pub fn assert_tokens<'t, 'a>(tokens: &'t LineTokens<'a>) -> TokensAssertion<'t, 'a> {
    TokensAssertion { tokens }
}

/// `(kind, text)` pairs, in order.
pub fn pairs<'a>(tokens: &LineTokens<'a>) -> Vec<(String, &'a str)> {
    tokens
        .tokens
        .iter()
        .map(|t| (t.kind.to_string(), t.text))
        .collect()
}

pub struct TokensAssertion<'t, 'a> {
    tokens: &'t LineTokens<'a>,
}

impl<'t, 'a> TokensAssertion<'t, 'a> {
    /// Assert the tokens cover `line` exactly: contiguous spans, in order, no empty tokens.
    pub fn covers(self, line: &str) -> Self {
        let mut cursor = 0;
        for (i, token) in self.tokens.tokens.iter().enumerate() {
            assert_eq!(
                token.span.start, cursor,
                "token {} starts at {}, expected {}: {}",
                i, token.span.start, cursor,
                summarize(self.tokens)
            );
            assert!(!token.is_empty(), "token {} is empty: {}", i, summarize(self.tokens));
            assert_eq!(&line[token.span.clone()], token.text);
            cursor = token.span.end;
        }
        assert_eq!(cursor, line.len(), "tokens stop at {}: {}", cursor, summarize(self.tokens));
        self
    }

    /// Assert the number of tokens
    pub fn count(self, expected: usize) -> Self {
        let actual = self.tokens.tokens.len();
        assert_eq!(
            actual,
            expected,
            "Expected {} tokens, found {}: {}",
            expected,
            actual,
            summarize(self.tokens)
        );
        self
    }

    /// Assert the kind and text of the token at `index`
    pub fn token(self, index: usize, kind: &str, text: &str) -> Self {
        let token = self.tokens.tokens.get(index).unwrap_or_else(|| {
            panic!(
                "Token index {} out of bounds: {}",
                index,
                summarize(self.tokens)
            )
        });
        assert_eq!(
            (token.kind.as_str(), token.text),
            (kind, text),
            "tokens[{}] mismatch: {}",
            index,
            summarize(self.tokens)
        );
        self
    }

    /// Assert the kinds of all tokens, in order
    pub fn kinds(self, expected: &[&str]) -> Self {
        let actual: Vec<&str> = self.tokens.tokens.iter().map(|t| t.kind.as_str()).collect();
        assert_eq!(actual, expected, "{}", summarize(self.tokens));
        self
    }

    /// Assert every token has `kind`
    pub fn all(self, kind: &str) -> Self {
        for (i, token) in self.tokens.tokens.iter().enumerate() {
            assert_eq!(token.kind, kind, "tokens[{}]: {}", i, summarize(self.tokens));
        }
        self
    }

    /// Assert the end state, as a path of state names (outermost saved state first)
    pub fn ends_in(self, mode: &CompiledMode, path: &[&str]) -> Self {
        assert_eq!(mode.state_path(&self.tokens.end_state), path);
        self
    }
}

fn summarize(tokens: &LineTokens<'_>) -> String {
    let items: Vec<String> = tokens
        .tokens
        .iter()
        .map(|t| format!("{}:{:?}", t.kind, t.text))
        .collect();
    format!("[{}]", items.join(", "))
}

/// Tokenize `lines` in sequence from the start state and render each line's tokens and
/// end state.
pub fn render(mode: &CompiledMode, lines: &[&str]) -> String {
    let tokenizer = LineTokenizer::new(mode);
    let mut state = LineState::default();
    let mut out = String::new();

    for line in lines {
        let result = tokenizer.tokenize(line, &state);
        let items: Vec<String> = result
            .tokens
            .iter()
            .map(|t| format!("{}:{:?}", t.kind, t.text))
            .collect();
        out.push_str(&items.join(" "));
        out.push_str(" -> ");
        out.push_str(&mode.state_path(&result.end_state).join("/"));
        out.push('\n');
        state = result.end_state;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modelex::rules::{ModeDefinition, RuleSpec};

    fn mode() -> CompiledMode {
        ModeDefinition::new("t")
            .state(
                "start",
                vec![
                    RuleSpec::new("word", r"\w+"),
                    RuleSpec::new("string", "\"").push("string"),
                ],
            )
            .state("string", vec![RuleSpec::new("string", "\"").pop()])
            .default_token("string", "string")
            .compile()
            .unwrap()
    }

    #[test]
    fn test_fluent_assertions() {
        let mode = mode();
        let out = mode.tokenize_line("ab \"c", &mode.start_state());
        assert_tokens(&out)
            .covers("ab \"c")
            .count(4)
            .token(0, "word", "ab")
            .kinds(&["word", "text", "string", "string"])
            .ends_in(&mode, &["start", "string"]);
    }

    #[test]
    #[should_panic(expected = "Expected 2 tokens")]
    fn test_count_mismatch_panics() {
        let mode = mode();
        let out = mode.tokenize_line("ab", &mode.start_state());
        assert_tokens(&out).count(2);
    }

    #[test]
    fn test_pairs() {
        let mode = mode();
        let out = mode.tokenize_line("a b", &mode.start_state());
        assert_eq!(
            pairs(&out),
            vec![
                ("word".to_string(), "a"),
                ("text".to_string(), " "),
                ("word".to_string(), "b"),
            ]
        );
    }

    #[test]
    fn test_render() {
        let mode = mode();
        let rendered = render(&mode, &["a \"b", "c\""]);
        assert_eq!(
            rendered,
            "word:\"a\" text:\" \" string:\"\\\"\" string:\"b\" -> start/string\n\
             string:\"c\" string:\"\\\"\" -> start\n"
        );
    }
}
