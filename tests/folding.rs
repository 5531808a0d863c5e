//! Section folding through the INI mode.

use modelex::modelex::{FoldMarker, FoldMode, FoldRange, ModeRegistry};
use rstest::rstest;

const CONFIG: [&str; 11] = [
    "[server]",
    "host = example.org",
    "",
    "[server.tls]",
    "cert = a.pem",
    "",
    "",
    "[client]  ; local",
    "retries = 3",
    "[empty]",
    "",
];

fn ini_folding() -> std::sync::Arc<dyn FoldMode> {
    let registry = ModeRegistry::with_defaults().unwrap();
    let entry = registry.get("ini").unwrap();
    entry.folding.clone().expect("ini folds sections")
}

#[test]
fn test_nested_section_stays_inside_parent() {
    let lines = ["[a]", "x=1", "[a.b]", "y=2", "[c]"];
    let range = ini_folding().fold_range(&lines, 0).unwrap();
    assert_eq!(
        range,
        FoldRange {
            start_row: 0,
            start_column: 3,
            end_row: 3,
            end_column: 3,
        }
    );
}

#[rstest]
#[case(0, Some((0, 8, 4, 12)))]
#[case(3, Some((3, 12, 4, 12)))]
#[case(7, Some((7, 17, 8, 11)))]
#[case(9, None)]
#[case(1, None)]
#[case(42, None)]
fn test_fold_ranges(#[case] row: usize, #[case] expected: Option<(usize, usize, usize, usize)>) {
    let range = ini_folding().fold_range(&CONFIG, row);
    let actual = range.map(|r| (r.start_row, r.start_column, r.end_row, r.end_column));
    assert_eq!(actual, expected);
}

#[test]
fn test_fold_widgets_mark_headers() {
    let folding = ini_folding();
    let starts: Vec<usize> = (0..CONFIG.len())
        .filter(|row| folding.fold_widget(&CONFIG, *row) == Some(FoldMarker::Start))
        .collect();
    assert_eq!(starts, vec![0, 3, 7, 9]);
}

#[test]
fn test_fold_range_serializes() {
    let range = ini_folding().fold_range(&CONFIG, 3).unwrap();
    let json = serde_json::to_value(range).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"start_row": 3, "start_column": 12, "end_row": 4, "end_column": 12})
    );
}
