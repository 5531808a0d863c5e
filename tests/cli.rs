use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn temp_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const EXTRA_MODE: &str = r#"
name: todo
caption: TODO list
states:
  start:
    - token: keyword
      regex: '^\s*(?:TODO|DONE)\b'
"#;

#[test]
fn list_modes_shows_builtins() {
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("list-modes");

    let output_pred = predicate::str::contains("ini")
        .and(predicate::str::contains("INI"))
        .and(predicate::str::contains("section folding"))
        .and(predicate::str::contains("vhdl"));

    cmd.assert().success().stdout(output_pred);
}

#[test]
fn list_modes_as_json() {
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("list-modes").arg("--format").arg("json");

    let output = cmd.assert().success().get_output().stdout.clone();
    let modes: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let names: Vec<&str> = modes
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["eiffel", "gcode", "gitignore", "ini", "lucene", "vhdl"]);
    assert_eq!(modes[3]["folding"], "section");
}

#[test]
fn tokenize_ini_as_json() {
    let input = temp_file(".ini", "[section]\nkey=\"open\nclosed\"\n");
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("tokenize")
        .arg(input.path())
        .arg("--mode")
        .arg("ini")
        .arg("--format")
        .arg("json")
        .arg("--merge");

    let output = cmd.assert().success().get_output().stdout.clone();
    let lines: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(lines.as_array().unwrap().len(), 3);

    let first = &lines[0];
    assert_eq!(first["tokens"].as_array().unwrap().len(), 3);
    assert_eq!(first["tokens"][1]["kind"], "constant.section.group-title.ini");
    assert_eq!(first["tokens"][1]["text"], "section");
    assert_eq!(first["tokens"][1]["span"]["start"], 1);
    assert_eq!(first["end_state"], serde_json::json!(["start"]));

    assert_eq!(lines[1]["end_state"], serde_json::json!(["start", "double_quoted"]));
    assert_eq!(lines[2]["tokens"][0]["kind"], "string.quoted.double.ini");
    assert_eq!(lines[2]["tokens"][0]["text"], "closed");
    assert_eq!(lines[2]["end_state"], serde_json::json!(["start"]));
}

#[test]
fn tokenize_reads_stdin() {
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("tokenize")
        .arg("-")
        .arg("--mode")
        .arg("gitignore")
        .write_stdin("# comment\n!keep\n");

    let output_pred = predicate::str::contains("comment")
        .and(predicate::str::contains("\"# comment\""))
        .and(predicate::str::contains("\"!keep\""));

    cmd.assert().success().stdout(output_pred);
}

#[test]
fn tokenize_unknown_mode_fails() {
    let input = temp_file(".txt", "x\n");
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("tokenize").arg(input.path()).arg("--mode").arg("cobol");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("mode 'cobol' not found").and(predicate::str::contains("gitignore")));
}

#[test]
fn fold_prints_section_ranges() {
    let input = temp_file(".ini", "[a]\nx=1\n[a.b]\ny=2\n[c]\nz=3\n");
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("fold").arg(input.path()).arg("--mode").arg("ini");

    let output_pred = predicate::str::contains("0:3-3:3  [a]")
        .and(predicate::str::contains("2:5-3:3  [a.b]"))
        .and(predicate::str::contains("4:3-5:3  [c]"));

    cmd.assert().success().stdout(output_pred);
}

#[test]
fn fold_single_row_as_json() {
    let input = temp_file(".ini", "[a]\nx=1\n[a.b]\ny=2\n[c]\n");
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("fold")
        .arg(input.path())
        .arg("--mode")
        .arg("ini")
        .arg("--row")
        .arg("0")
        .arg("--format")
        .arg("json");

    let output = cmd.assert().success().get_output().stdout.clone();
    let ranges: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(
        ranges,
        serde_json::json!([{"start_row": 0, "start_column": 3, "end_row": 3, "end_column": 3}])
    );
}

#[test]
fn fold_without_fold_mode_fails() {
    let input = temp_file(".v", "x\n");
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("fold").arg(input.path()).arg("--mode").arg("vhdl");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("mode 'vhdl' has no fold mode"));
}

#[test]
fn check_reports_valid_and_broken_files() {
    let good = temp_file(".yaml", EXTRA_MODE);
    let broken = temp_file(
        ".yaml",
        "name: broken\nstates:\n  start:\n    - token: a\n      regex: '(unclosed'\n",
    );
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("check").arg(good.path()).arg(broken.path());

    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("mode 'todo', 1 states, 1 rules"))
        .stderr(predicate::str::contains("invalid pattern `(unclosed`"));
}

#[test]
fn check_warns_about_empty_matches() {
    let file = temp_file(
        ".yaml",
        "name: lax\nstates:\n  start:\n    - token: a\n      regex: 'a*'\n",
    );
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("check").arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("`a*` matches the empty string"));
}

#[test]
fn mode_file_registers_extra_mode() {
    let mode = temp_file(".yaml", EXTRA_MODE);
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("--mode-file").arg(mode.path()).arg("list-modes");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("todo").and(predicate::str::contains("TODO list")));
}

#[test]
fn config_file_sets_output_format() {
    let config = temp_file(".toml", "[output]\nformat = \"json\"\n");
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.arg("--config").arg(config.path()).arg("list-modes");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("["));
}

#[test]
fn local_config_file_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("modelex.toml"), "[output]\nformat = \"json\"\n").unwrap();
    let mut cmd = cargo_bin_cmd!("modelex");
    cmd.current_dir(dir.path()).arg("list-modes");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("["));
}
