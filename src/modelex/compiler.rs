//! Rule table compilation
//!
//! Compiling a [`ModeDefinition`] does all validation up front, so that tokenizing can
//! never fail:
//! - the start state exists
//! - every `next`, `push` and `include` names a known state, and includes do not loop
//! - every pattern is a valid regex
//! - token arrays have one kind per capture group
//!
//! Includes are inlined, so each compiled state is a flat, ordered rule list. Each state
//! also gets one merged regex, the alternation of all its rules in order:
//!
//! ```text
//! rules:   #.*        \s+        (\w+)(=)
//! merged:  ((?:#.*))|((?:\s+))|((?:(\w+)(=)))
//! groups:  1          2          3  4    5
//! ```
//!
//! The regex crate picks the first alternative that matches at the leftmost position,
//! which is exactly ordered first-match-wins. A single search also tells the tokenizer how
//! far the next possible match is, so runs of unmatched characters are found in one pass.
//!
//! Patterns that can match the empty string are reported with a warning. Empty matches
//! never consume input, so the tokenizer skips them.

use crate::modelex::error::ModeError;
use crate::modelex::rules::{MatchRule, ModeDefinition, RuleSpec, StateDefinition, TokenSpec, Transition};
use crate::modelex::token::{LineState, StateId, TokenKind};
use crate::modelex::tokenizer::{LineTokenizer, LineTokens};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Where a compiled rule was authored: its state and position in that state's list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRef {
    pub state: String,
    pub index: usize,
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompiledTransition {
    Next(StateId),
    Push(StateId),
    Pop,
}

#[derive(Debug)]
pub(crate) struct CompiledRule {
    /// The rule on its own, used when the merged search only found an empty match.
    pub(crate) regex: Regex,
    /// Index of the group wrapping this rule in the state's merged regex.
    pub(crate) group: usize,
    pub(crate) inner_groups: usize,
    pub(crate) token: TokenSpec,
    pub(crate) transition: Option<CompiledTransition>,
    pub(crate) nullable: bool,
    pub(crate) origin: RuleRef,
}

#[derive(Debug)]
pub(crate) struct CompiledState {
    pub(crate) name: String,
    /// `None` for a state without rules.
    pub(crate) merged: Option<Regex>,
    pub(crate) rules: Vec<CompiledRule>,
    pub(crate) default_token: TokenKind,
}

/// An immutable, compiled rule table.
///
/// It is `Send + Sync` and meant to be shared (usually in an `Arc`) by every document
/// using the mode. Tokenizing only borrows it.
#[derive(Debug)]
pub struct CompiledMode {
    name: String,
    pub(crate) states: Vec<CompiledState>,
    ids: HashMap<String, StateId>,
}

impl CompiledMode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The state to tokenize the first line with.
    pub fn start_state(&self) -> LineState {
        LineState::default()
    }

    /// A line state sitting in `state` with nothing saved on the stack.
    pub fn line_state(&self, state: &str) -> Option<LineState> {
        self.state_id(state)
            .map(|id| LineState::from_parts(id, Vec::new()))
    }

    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.ids.get(name).copied()
    }

    pub fn state_name(&self, id: StateId) -> Option<&str> {
        self.states.get(id.index()).map(|s| s.name.as_str())
    }

    /// State names, start state first.
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.name.as_str())
    }

    /// Names along a line state, outermost saved state first and the current state last.
    pub fn state_path(&self, state: &LineState) -> Vec<&str> {
        state
            .stack()
            .iter()
            .chain(std::iter::once(&state.state()))
            .filter_map(|id| self.state_name(*id))
            .collect()
    }

    /// Whether every id in `state` belongs to this mode.
    pub fn is_valid_state(&self, state: &LineState) -> bool {
        let known = |id: &StateId| id.index() < self.states.len();
        known(&state.state()) && state.stack().iter().all(known)
    }

    /// Number of rules after includes were inlined.
    pub fn rule_count(&self) -> usize {
        self.states.iter().map(|s| s.rules.len()).sum()
    }

    /// Rules whose pattern matches the empty string. Such rules are skipped whenever they
    /// would match without consuming anything, which usually points at a mistake.
    pub fn nullable_rules(&self) -> Vec<&RuleRef> {
        self.states
            .iter()
            .flat_map(|s| s.rules.iter())
            .filter(|r| r.nullable)
            .map(|r| &r.origin)
            .collect()
    }

    /// Tokenize one line with default options. See [`LineTokenizer`].
    pub fn tokenize_line<'a>(&self, line: &'a str, entry: &LineState) -> LineTokens<'a> {
        LineTokenizer::new(self).tokenize(line, entry)
    }
}

pub(crate) fn compile(def: &ModeDefinition) -> Result<CompiledMode, ModeError> {
    let start = def
        .get_state(def.start_state())
        .ok_or_else(|| ModeError::MissingStartState {
            mode: def.name().to_string(),
            state: def.start_state().to_string(),
        })?;

    // The start state always gets id 0, so a default LineState is valid for every mode.
    let mut order: Vec<(&str, &StateDefinition)> = vec![(def.start_state(), start)];
    order.extend(def.states().filter(|(name, _)| *name != def.start_state()));

    let ids: HashMap<String, StateId> = order
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.to_string(), StateId(i as u32)))
        .collect();

    let mut states = Vec::with_capacity(order.len());
    for (name, state) in &order {
        let mut flat = Vec::new();
        let mut path = vec![name.to_string()];
        flatten(def, name, &mut path, &mut flat)?;

        let default_token = state
            .default_token
            .clone()
            .unwrap_or_else(|| def.fallback().clone());
        states.push(compile_state(def.name(), name, flat, &ids, default_token)?);
    }

    let mode = CompiledMode {
        name: def.name().to_string(),
        states,
        ids,
    };
    debug!(
        mode = %mode.name,
        states = mode.states.len(),
        rules = mode.rule_count(),
        "compiled mode"
    );
    Ok(mode)
}

/// Inline includes, depth first, keeping rule order.
fn flatten<'d>(
    def: &'d ModeDefinition,
    state: &str,
    path: &mut Vec<String>,
    out: &mut Vec<(&'d MatchRule, RuleRef)>,
) -> Result<(), ModeError> {
    let Some(definition) = def.get_state(state) else {
        return Ok(());
    };

    for (index, rule) in definition.rules.iter().enumerate() {
        match rule {
            RuleSpec::Match(m) => out.push((
                m,
                RuleRef {
                    state: state.to_string(),
                    index,
                    pattern: m.pattern.clone(),
                },
            )),
            RuleSpec::Include(target) => {
                if path.iter().any(|s| s == target) {
                    let mut cycle = path.clone();
                    cycle.push(target.clone());
                    return Err(ModeError::IncludeCycle(cycle));
                }
                if def.get_state(target).is_none() {
                    return Err(ModeError::UnknownState {
                        state: state.to_string(),
                        target: target.clone(),
                    });
                }
                path.push(target.clone());
                flatten(def, target, path, out)?;
                path.pop();
            }
        }
    }
    Ok(())
}

fn compile_state(
    mode: &str,
    name: &str,
    flat: Vec<(&MatchRule, RuleRef)>,
    ids: &HashMap<String, StateId>,
    default_token: TokenKind,
) -> Result<CompiledState, ModeError> {
    let resolve = |target: &str| {
        ids.get(target).copied().ok_or_else(|| ModeError::UnknownState {
            state: name.to_string(),
            target: target.to_string(),
        })
    };

    let mut rules = Vec::with_capacity(flat.len());
    let mut alternatives = Vec::with_capacity(flat.len());
    let mut group = 1;

    for (rule, origin) in flat {
        let source = if rule.case_insensitive {
            format!("(?i:{})", rule.pattern)
        } else {
            format!("(?:{})", rule.pattern)
        };
        let regex = Regex::new(&source).map_err(|source| ModeError::InvalidPattern {
            state: origin.state.clone(),
            index: origin.index,
            pattern: rule.pattern.clone(),
            source,
        })?;
        let inner_groups = regex.captures_len() - 1;

        if let TokenSpec::Groups(kinds) = &rule.token {
            if kinds.len() != inner_groups {
                return Err(ModeError::GroupCountMismatch {
                    state: origin.state.clone(),
                    index: origin.index,
                    kinds: kinds.len(),
                    groups: inner_groups,
                });
            }
        }

        let transition = match &rule.transition {
            None => None,
            Some(Transition::Next(target)) => Some(CompiledTransition::Next(resolve(target)?)),
            Some(Transition::Push(target)) => Some(CompiledTransition::Push(resolve(target)?)),
            Some(Transition::Pop) => Some(CompiledTransition::Pop),
        };

        let nullable = regex.is_match("");
        if nullable {
            warn!(
                mode,
                state = %origin.state,
                index = origin.index,
                pattern = %origin.pattern,
                "pattern matches the empty string; empty matches are skipped"
            );
        }

        alternatives.push(format!("({source})"));
        rules.push(CompiledRule {
            regex,
            group,
            inner_groups,
            token: rule.token.clone(),
            transition,
            nullable,
            origin,
        });
        group += 1 + inner_groups;
    }

    let merged = if alternatives.is_empty() {
        None
    } else {
        let merged = Regex::new(&alternatives.join("|")).map_err(|source| {
            ModeError::MergeFailed {
                state: name.to_string(),
                source,
            }
        })?;
        Some(merged)
    };

    Ok(CompiledState {
        name: name.to_string(),
        merged,
        rules,
        default_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modelex::rules::RuleSpec;

    fn simple() -> ModeDefinition {
        ModeDefinition::new("simple")
            .state(
                "start",
                vec![
                    RuleSpec::new("comment", "#.*"),
                    RuleSpec::new("string", "\"").push("string"),
                ],
            )
            .state("string", vec![RuleSpec::new("string", "\"").pop()])
    }

    #[test]
    fn test_start_state_gets_id_zero() {
        let def = ModeDefinition::new("m")
            .state("other", vec![RuleSpec::new("a", "a")])
            .state("start", vec![RuleSpec::new("b", "b")]);
        let mode = def.compile().unwrap();
        assert_eq!(mode.state_id("start"), Some(StateId::START));
        assert_eq!(mode.state_names().collect::<Vec<_>>(), vec!["start", "other"]);
    }

    #[test]
    fn test_missing_start_state() {
        let def = ModeDefinition::new("m").state("other", vec![]);
        assert!(matches!(
            def.compile(),
            Err(ModeError::MissingStartState { .. })
        ));
    }

    #[test]
    fn test_invalid_pattern_reports_location() {
        let def = ModeDefinition::new("m").state(
            "start",
            vec![RuleSpec::new("a", "a"), RuleSpec::new("b", "(unclosed")],
        );
        match def.compile() {
            Err(ModeError::InvalidPattern { state, index, pattern, .. }) => {
                assert_eq!(state, "start");
                assert_eq!(index, 1);
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("expected InvalidPattern, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_transition_target() {
        let def = ModeDefinition::new("m")
            .state("start", vec![RuleSpec::new("a", "a").next("nowhere")]);
        assert!(matches!(
            def.compile(),
            Err(ModeError::UnknownState { ref target, .. }) if target == "nowhere"
        ));
    }

    #[test]
    fn test_unknown_include_target() {
        let def = ModeDefinition::new("m").state("start", vec![RuleSpec::include("nowhere")]);
        assert!(matches!(def.compile(), Err(ModeError::UnknownState { .. })));
    }

    #[test]
    fn test_include_cycle() {
        let def = ModeDefinition::new("m")
            .state("start", vec![RuleSpec::include("a")])
            .state("a", vec![RuleSpec::include("b")])
            .state("b", vec![RuleSpec::include("a")]);
        match def.compile() {
            Err(ModeError::IncludeCycle(path)) => assert_eq!(path, vec!["start", "a", "b", "a"]),
            other => panic!("expected IncludeCycle, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_include_is_inlined_in_place() {
        let def = ModeDefinition::new("m")
            .state(
                "start",
                vec![
                    RuleSpec::new("a", "a"),
                    RuleSpec::include("common"),
                    RuleSpec::new("z", "z"),
                ],
            )
            .state("common", vec![RuleSpec::new("b", "b"), RuleSpec::new("c", "c")]);
        let mode = def.compile().unwrap();
        let patterns: Vec<_> = mode.states[0]
            .rules
            .iter()
            .map(|r| r.origin.pattern.as_str())
            .collect();
        assert_eq!(patterns, vec!["a", "b", "c", "z"]);
        assert_eq!(mode.states[0].rules[1].origin.state, "common");
    }

    #[test]
    fn test_group_count_mismatch() {
        let def = ModeDefinition::new("m").state(
            "start",
            vec![RuleSpec::new(TokenSpec::groups(["a", "b", "c"]), "(x)(y)")],
        );
        assert!(matches!(
            def.compile(),
            Err(ModeError::GroupCountMismatch { kinds: 3, groups: 2, .. })
        ));
    }

    #[test]
    fn test_group_offsets_in_merged_regex() {
        let def = ModeDefinition::new("m").state(
            "start",
            vec![
                RuleSpec::new("comment", "#.*"),
                RuleSpec::new(TokenSpec::groups(["key", "op"]), r"(\w+)(=)"),
                RuleSpec::new("text", r"\s+"),
            ],
        );
        let mode = def.compile().unwrap();
        let groups: Vec<_> = mode.states[0].rules.iter().map(|r| r.group).collect();
        assert_eq!(groups, vec![1, 2, 5]);
    }

    #[test]
    fn test_nullable_rules_are_reported() {
        let def = ModeDefinition::new("m").state(
            "start",
            vec![RuleSpec::new("a", "a*"), RuleSpec::new("b", "b+")],
        );
        let mode = def.compile().unwrap();
        let nullable = mode.nullable_rules();
        assert_eq!(nullable.len(), 1);
        assert_eq!(nullable[0].pattern, "a*");
    }

    #[test]
    fn test_state_path() {
        let mode = simple().compile().unwrap();
        let string = mode.state_id("string").unwrap();
        let state = LineState::from_parts(string, vec![StateId::START]);
        assert_eq!(mode.state_path(&state), vec!["start", "string"]);
        assert!(mode.is_valid_state(&state));
        assert!(!mode.is_valid_state(&LineState::from_parts(StateId(9), vec![])));
    }

    #[test]
    fn test_line_state_for_named_state() {
        let mode = simple().compile().unwrap();
        let state = mode.line_state("string").unwrap();
        assert_eq!(mode.state_name(state.state()), Some("string"));
        assert!(mode.line_state("missing").is_none());
    }

    #[test]
    fn test_compiled_mode_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledMode>();
    }
}
