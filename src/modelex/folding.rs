//! Fold ranges
//!
//! A [`FoldMode`] answers two questions for a row: does a fold start here
//! ([`FoldMode::fold_widget`]), and if so, what does it cover ([`FoldMode::fold_range`]).
//!
//! [`SectionFolding`] folds INI style sections. A section runs from its header to the last
//! non-blank line before the next header that is not one of its children:
//!
//! ```text
//! 0  [a]          <- fold start
//! 1  x=1
//! 2  [a.b]        <- child of [a], stays inside
//! 3  y=2          <- fold end
//! 4  [c]          <- sibling, ends the fold
//! ```
//!
//! Columns are byte offsets into the line, like token spans.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// A collapsible region, from the end of its first line to the end of its last line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FoldRange {
    pub start_row: usize,
    pub start_column: usize,
    pub end_row: usize,
    pub end_column: usize,
}

impl FoldRange {
    /// Rows hidden when the range is folded.
    pub fn hidden_rows(&self) -> usize {
        self.end_row - self.start_row
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FoldMarker {
    Start,
    End,
}

/// Fold computation over raw lines.
pub trait FoldMode: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `row` opens (or closes) a fold.
    fn fold_widget(&self, lines: &[&str], row: usize) -> Option<FoldMarker>;

    /// The range folded from `row`, if `row` opens a non-empty fold.
    fn fold_range(&self, lines: &[&str], row: usize) -> Option<FoldRange>;
}

/// `[name]` at the start of a line, optionally followed by a comment.
static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\[([^\])]*)]\s*(?:$|[;#])").expect("section header pattern is valid")
});

static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*$").expect("blank line pattern is valid"));

/// Folds sections whose headers match a start marker with the section name in group 1.
///
/// A header `[parent<separator>child]` is nested in `[parent]` and does not end its fold.
#[derive(Debug, Clone)]
pub struct SectionFolding {
    start_marker: Regex,
    separator: String,
}

impl SectionFolding {
    /// INI headers, `.` as the nesting separator.
    pub fn new() -> Self {
        SectionFolding {
            start_marker: SECTION_HEADER.clone(),
            separator: ".".to_string(),
        }
    }

    /// INI headers with another nesting separator.
    pub fn with_separator(separator: impl Into<String>) -> Self {
        SectionFolding {
            start_marker: SECTION_HEADER.clone(),
            separator: separator.into(),
        }
    }

    /// A custom header pattern. Group 1 must capture the section name.
    pub fn with_marker(start_marker: Regex, separator: impl Into<String>) -> Self {
        SectionFolding {
            start_marker,
            separator: separator.into(),
        }
    }

    fn section_name<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.start_marker
            .captures(line)
            .map(|caps| caps.get(1).map_or("", |m| m.as_str()))
    }
}

impl Default for SectionFolding {
    fn default() -> Self {
        Self::new()
    }
}

impl FoldMode for SectionFolding {
    fn name(&self) -> &str {
        "section"
    }

    fn fold_widget(&self, lines: &[&str], row: usize) -> Option<FoldMarker> {
        let line = lines.get(row)?;
        self.start_marker
            .is_match(line)
            .then_some(FoldMarker::Start)
    }

    fn fold_range(&self, lines: &[&str], row: usize) -> Option<FoldRange> {
        let header = lines.get(row)?;
        let name = self.section_name(header)?;
        let child_prefix = format!("{}{}", name, self.separator);

        let mut end_row = row;
        for (offset, line) in lines[row + 1..].iter().enumerate() {
            if BLANK_LINE.is_match(line) {
                continue;
            }
            if let Some(other) = self.section_name(line) {
                if !other.starts_with(&child_prefix) {
                    break;
                }
            }
            end_row = row + 1 + offset;
        }

        (end_row > row).then(|| FoldRange {
            start_row: row,
            start_column: header.len(),
            end_row,
            end_column: lines[end_row].len(),
        })
    }
}
