//! Line tokenizer
//!
//! The state machine driver. Given a compiled mode, a line and the state the previous line
//! ended in, it produces the line's tokens and the state to carry into the next line.
//!
//! Scanning a line:
//! 1. At the current column, try the current state's rules in order; the first one that
//!    matches starting exactly at the column, and consumes at least one character, wins.
//! 2. Emit its token(s), move past the match and apply its transition (`next`, `push`, `pop`).
//! 3. If nothing matches, emit the character at the column on its own, with the state's
//!    default kind, and move on by one character.
//!
//! Every step consumes input, so a line of `n` characters takes at most `n` steps, and the
//! emitted tokens always cover the line exactly. Patterns are matched against the whole
//! line, so `^`, `$` and `\b` see the real line boundaries.
//!
//! The driver keeps nothing between calls. The returned [`LineState`] is the only thing a
//! host has to store per line; [`LineStateCache`] is a ready-made store for it.

use crate::modelex::compiler::{CompiledMode, CompiledRule, CompiledState, CompiledTransition};
use crate::modelex::rules::TokenSpec;
use crate::modelex::token::{LineState, StateId, Token, TokenKind};
use regex::CaptureLocations;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{trace, warn};

/// Knobs for [`LineTokenizer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerOptions {
    /// Join adjacent tokens of the same kind into one token. Off by default, which keeps
    /// unmatched characters as one token each.
    pub merge_adjacent: bool,
}

/// The tokens of one line and the state the line ends in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineTokens<'a> {
    pub tokens: Vec<Token<'a>>,
    pub end_state: LineState,
}

impl<'a> LineTokens<'a> {
    /// Concatenation of all token texts. Always equal to the input line.
    pub fn text(&self) -> String {
        self.tokens.iter().map(|t| t.text).collect()
    }
}

/// Tokenizes lines against a borrowed [`CompiledMode`].
#[derive(Debug, Clone, Copy)]
pub struct LineTokenizer<'m> {
    mode: &'m CompiledMode,
    options: TokenizerOptions,
}

enum Step {
    /// A rule matched `start..end`. `groups` is filled for token arrays only.
    Matched {
        rule: usize,
        end: usize,
        groups: Vec<Option<Range<usize>>>,
    },
    /// No rule matches anywhere in `start..until`.
    Unmatched { until: usize },
}

impl<'m> LineTokenizer<'m> {
    pub fn new(mode: &'m CompiledMode) -> Self {
        Self::with_options(mode, TokenizerOptions::default())
    }

    pub fn with_options(mode: &'m CompiledMode, options: TokenizerOptions) -> Self {
        LineTokenizer { mode, options }
    }

    pub fn mode(&self) -> &'m CompiledMode {
        self.mode
    }

    /// Tokenize one line starting in `entry`.
    ///
    /// `line` should not contain the line terminator. An `entry` state from a different
    /// mode is replaced by the start state.
    pub fn tokenize<'a>(&self, line: &'a str, entry: &LineState) -> LineTokens<'a> {
        let (mut state, mut stack) = if self.mode.is_valid_state(entry) {
            entry.clone().into_parts()
        } else {
            warn!(
                mode = %self.mode.name(),
                "line state does not belong to this mode; restarting from the start state"
            );
            (StateId::START, Vec::new())
        };

        let mut session = Session {
            line,
            tokens: Vec::new(),
            merge: self.options.merge_adjacent,
        };
        let mut scratch: Vec<Scratch> = (0..self.mode.states.len())
            .map(|_| Scratch::default())
            .collect();

        let mut column = 0;
        while column < line.len() {
            let current = &self.mode.states[state.index()];
            let scratch = &mut scratch[state.index()];

            match find_rule(current, line, column, scratch) {
                Step::Matched { rule, end, groups } => {
                    let rule = &current.rules[rule];
                    session.emit_rule(rule, &current.default_token, column..end, &groups);
                    if let Some(transition) = rule.transition {
                        match transition {
                            CompiledTransition::Next(target) => state = target,
                            CompiledTransition::Push(target) => {
                                stack.push(state);
                                state = target;
                            }
                            CompiledTransition::Pop => {
                                state = stack.pop().unwrap_or(StateId::START);
                            }
                        }
                    }
                    column = end;
                }
                Step::Unmatched { until } => {
                    for (offset, ch) in line[column..until].char_indices() {
                        let start = column + offset;
                        session.emit(current.default_token.clone(), start..start + ch.len_utf8());
                    }
                    column = until;
                }
            }
        }

        trace!(
            mode = %self.mode.name(),
            tokens = session.tokens.len(),
            depth = stack.len(),
            "tokenized line"
        );

        LineTokens {
            tokens: session.tokens,
            end_state: LineState::from_parts(state, stack),
        }
    }

    /// Tokenize consecutive lines, threading each end state into the next line.
    pub fn tokenize_lines<'a, I>(&self, lines: I, entry: &LineState) -> Vec<LineTokens<'a>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = entry.clone();
        lines
            .into_iter()
            .map(|line| {
                let result = self.tokenize(line, &state);
                state = result.end_state.clone();
                result
            })
            .collect()
    }
}

/// Per-state search buffers, reused for the whole line.
#[derive(Default)]
struct Scratch {
    locs: Option<CaptureLocations>,
    /// Per rule, the first column where a match can start. Searches run to the end of
    /// the line, so a miss or a later match rules out every column before it.
    no_match_before: Vec<usize>,
}

/// Find the rule matching at `column`, or how far the unmatched run extends.
fn find_rule(state: &CompiledState, line: &str, column: usize, scratch: &mut Scratch) -> Step {
    let Some(merged) = &state.merged else {
        return Step::Unmatched { until: line.len() };
    };
    let locs = scratch.locs.get_or_insert_with(|| merged.capture_locations());

    let Some(found) = merged.captures_read_at(locs, line, column) else {
        return Step::Unmatched { until: line.len() };
    };

    // Leftmost-first: no rule matches anywhere before the start of this match.
    if found.start() > column {
        return Step::Unmatched {
            until: found.start(),
        };
    }

    let Some(index) = state.rules.iter().position(|r| locs.get(r.group).is_some()) else {
        return Step::Unmatched {
            until: next_char_end(line, column),
        };
    };

    if found.end() > column {
        let rule = &state.rules[index];
        let groups = match rule.token {
            TokenSpec::Groups(_) => (1..=rule.inner_groups)
                .map(|k| locs.get(rule.group + k).map(|(s, e)| s..e))
                .collect(),
            _ => Vec::new(),
        };
        return Step::Matched {
            rule: index,
            end: found.end(),
            groups,
        };
    }

    // The winning rule matched nothing. Skip it and try the later rules on their own.
    if scratch.no_match_before.len() != state.rules.len() {
        scratch.no_match_before = vec![0; state.rules.len()];
    }
    for (offset, rule) in state.rules[index + 1..].iter().enumerate() {
        let index = index + 1 + offset;
        if scratch.no_match_before[index] > column {
            continue;
        }
        match match_single(rule, index, line, column) {
            Ok(step) => return step,
            Err(next) => scratch.no_match_before[index] = next,
        }
    }
    Step::Unmatched {
        until: next_char_end(line, column),
    }
}

/// Match one rule at `column`. On failure, returns the first column where the rule could
/// still start a match.
fn match_single(
    rule: &CompiledRule,
    index: usize,
    line: &str,
    column: usize,
) -> Result<Step, usize> {
    let Some(caps) = rule.regex.captures_at(line, column) else {
        return Err(line.len() + 1);
    };
    let Some(whole) = caps.get(0) else {
        return Err(line.len() + 1);
    };
    if whole.start() != column {
        return Err(whole.start());
    }
    if whole.end() == column {
        return Err(column);
    }
    let groups = match rule.token {
        TokenSpec::Groups(_) => (1..=rule.inner_groups)
            .map(|k| caps.get(k).map(|m| m.range()))
            .collect(),
        _ => Vec::new(),
    };
    Ok(Step::Matched {
        rule: index,
        end: whole.end(),
        groups,
    })
}

fn next_char_end(line: &str, column: usize) -> usize {
    line[column..]
        .chars()
        .next()
        .map_or(line.len(), |ch| column + ch.len_utf8())
}

/// Per-call scan output.
struct Session<'a> {
    line: &'a str,
    tokens: Vec<Token<'a>>,
    merge: bool,
}

impl<'a> Session<'a> {
    fn emit(&mut self, kind: TokenKind, span: Range<usize>) {
        if span.is_empty() {
            return;
        }
        if self.merge {
            if let Some(last) = self.tokens.last_mut() {
                if last.kind == kind && last.span.end == span.start {
                    last.span.end = span.end;
                    last.text = &self.line[last.span.clone()];
                    return;
                }
            }
        }
        self.tokens.push(Token::new(kind, self.line, span));
    }

    fn emit_rule(
        &mut self,
        rule: &CompiledRule,
        default: &TokenKind,
        span: Range<usize>,
        groups: &[Option<Range<usize>>],
    ) {
        let TokenSpec::Groups(kinds) = &rule.token else {
            let text = &self.line[span.clone()];
            let kind = rule.token.resolve(text).unwrap_or_else(|| default.clone());
            self.emit(kind, span);
            return;
        };

        // Groups that did not participate, are empty or overlap an earlier group emit
        // nothing; text no group covers gets the state's default kind.
        let mut cursor = span.start;
        for (kind, group) in kinds.iter().zip(groups) {
            let Some(group) = group else { continue };
            if group.is_empty() || group.start < cursor {
                continue;
            }
            if group.start > cursor {
                self.emit(default.clone(), cursor..group.start);
            }
            self.emit(kind.clone(), group.clone());
            cursor = group.end;
        }
        if cursor < span.end {
            self.emit(default.clone(), cursor..span.end);
        }
    }
}

/// Per-line end states for one document, kept by the host.
///
/// Row `r` is tokenized with the end state of row `r - 1`. After an edit, call
/// [`invalidate`](Self::invalidate) (or the line insert/remove methods), then
/// [`update`](Self::update) to bring states up to date. A row is only reused when its text
/// is untouched and it was last tokenized from the same entry state, so updating stops
/// re-tokenizing as soon as the states converge again.
#[derive(Debug, Clone, Default)]
pub struct LineStateCache {
    slots: Vec<Slot>,
    valid: usize,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    /// The state `end_state` was computed from.
    entry: Option<LineState>,
    /// Last computed end state, possibly stale.
    end_state: Option<LineState>,
    /// The line's text changed since `end_state` was computed.
    dirty: bool,
}

impl LineStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leading rows whose end states are up to date.
    pub fn valid_rows(&self) -> usize {
        self.valid
    }

    /// The state to tokenize `row` with, if known.
    pub fn entry_state(&self, row: usize) -> Option<LineState> {
        if row == 0 {
            Some(LineState::default())
        } else if row <= self.valid {
            self.slots[row - 1].end_state.clone()
        } else {
            None
        }
    }

    pub fn end_state(&self, row: usize) -> Option<&LineState> {
        if row < self.valid {
            self.slots[row].end_state.as_ref()
        } else {
            None
        }
    }

    /// The text of `row` changed.
    pub fn invalidate(&mut self, row: usize) {
        if let Some(slot) = self.slots.get_mut(row) {
            slot.dirty = true;
        }
        self.valid = self.valid.min(row);
    }

    pub fn insert_lines(&mut self, row: usize, count: usize) {
        let at = row.min(self.slots.len());
        self.slots
            .splice(at..at, std::iter::repeat_with(Slot::default).take(count));
        self.valid = self.valid.min(row);
    }

    pub fn remove_lines(&mut self, row: usize, count: usize) {
        let len = self.slots.len();
        if row < len {
            self.slots.drain(row..(row + count).min(len));
        }
        self.valid = self.valid.min(row);
    }

    /// Re-tokenize stale rows up to and including `through`. Returns how many lines were
    /// tokenized.
    pub fn update<S: AsRef<str>>(
        &mut self,
        tokenizer: &LineTokenizer<'_>,
        lines: &[S],
        through: usize,
    ) -> usize {
        self.slots.resize_with(lines.len(), Slot::default);
        self.valid = self.valid.min(lines.len());

        let until = through.saturating_add(1).min(lines.len());
        let mut row = self.valid;
        let mut tokenized = 0;

        while row < lines.len() {
            let entry = self.entry_state(row).unwrap_or_default();
            let slot = &mut self.slots[row];
            let reusable =
                !slot.dirty && slot.end_state.is_some() && slot.entry.as_ref() == Some(&entry);

            if !reusable {
                if row >= until {
                    break;
                }
                let end = tokenizer.tokenize(lines[row].as_ref(), &entry).end_state;
                tokenized += 1;
                *slot = Slot {
                    entry: Some(entry),
                    end_state: Some(end),
                    dirty: false,
                };
            }
            row += 1;
            self.valid = row;
        }
        tokenized
    }
}
