use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

const BUNDLE: &str = r#"{
  "name": "unit",
  "participants": [
    {"hadm_id": 10, "subject_id": 1},
    {"hadm_id": 11, "subject_id": 2},
    {"hadm_id": 12, "subject_id": 3}
  ],
  "demographics": [
    {"subject_id": 1, "hadm_id": 10, "age": 60, "gender": "M"},
    {"subject_id": 2, "hadm_id": 11, "age": 30, "gender": "F"},
    {"subject_id": 3, "hadm_id": 12, "age": 60, "gender": "M"}
  ],
  "diagnoses": [
    {"hadm_id": 10, "icd_code": "A1", "icd_version": 10, "seq_num": 1},
    {"hadm_id": 10, "icd_code": "A2", "icd_version": 10, "seq_num": 2},
    {"hadm_id": 11, "icd_code": "B1", "icd_version": 10, "seq_num": 1},
    {"hadm_id": 12, "icd_code": "A1", "icd_version": 10, "seq_num": 1}
  ],
  "labevents": [
    {"itemid": 50912, "hadm_id": 10, "value": 3.0, "mean": 1.0, "std": 0.5, "ref_lower": 0.5, "ref_upper": 1.2},
    {"itemid": 50912, "hadm_id": 11, "value": "___", "mean": 1.0, "std": 0.5},
    {"itemid": 50912, "hadm_id": 12, "value": "2.5", "mean": 1.0, "std": 0.5, "ref_lower": 0.5, "ref_upper": 1.2}
  ],
  "vitalsigns": [
    {"hadm_id": 10, "name": "heart_rate", "value": 120},
    {"hadm_id": 11, "name": "heart_rate", "value": 70},
    {"hadm_id": 12, "name": "heart_rate", "value": 130}
  ],
  "inputevents": [
    {"hadm_id": 10, "itemid": 225158},
    {"hadm_id": 10, "itemid": 220949},
    {"hadm_id": 11, "itemid": 225158},
    {"hadm_id": 12, "itemid": 220949}
  ],
  "prescriptions": [
    {"hadm_id": 10, "drug": "Heparin"},
    {"hadm_id": 12, "drug": "Heparin"},
    {"hadm_id": 12, "drug": "Insulin"}
  ]
}"#;

const EDGES: &str = "ROOT\tA\nROOT\tB\nA\tA1\nA\tA2\nB\tB1\n";

fn write_inputs(dir: &Path) {
    fs::write(dir.join("bundle.json"), BUNDLE).unwrap();
    fs::write(dir.join("edges.tsv"), EDGES).unwrap();
}

fn run_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kira-encsim").unwrap();
    cmd.arg("run")
        .arg("--input")
        .arg(dir.join("bundle.json"))
        .arg("--taxonomy")
        .arg(dir.join("edges.tsv"))
        .arg("--out")
        .arg(dir.join("out"))
        .arg("--threads")
        .arg("1");
    cmd
}

#[test]
fn run_writes_requested_outputs() {
    let tmp = TempDir::new().unwrap();
    write_inputs(tmp.path());

    let mut cmd = run_cmd(tmp.path());
    cmd.args(["--aggregate", "mean", "--json", "--tsv", "--matrix"]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(out).unwrap();
    assert!(stdout.contains("kira-encsim v"));
    assert!(stdout.contains("9 entries"));

    let out_dir = tmp.path().join("out");
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("similarity.json")).unwrap())
            .unwrap();
    assert_eq!(json["schema_version"], "v1");
    assert_eq!(json["pairs"]["raw_entries"], 9);
    assert_eq!(json["config"]["aggregate"], "mean");

    let tsv = fs::read_to_string(out_dir.join("similarities.tsv")).unwrap();
    assert_eq!(tsv.lines().count(), 10);
    assert!(out_dir.join("matrix_similarity.tsv").exists());
}

#[test]
fn run_without_output_flags_only_prints() {
    let tmp = TempDir::new().unwrap();
    write_inputs(tmp.path());
    run_cmd(tmp.path()).assert().success();
    assert!(!tmp.path().join("out").join("similarity.json").exists());
    assert!(!tmp.path().join("out").join("similarities.tsv").exists());
}

#[test]
fn run_stream_writes_raw_pairs() {
    let tmp = TempDir::new().unwrap();
    write_inputs(tmp.path());
    let mut cmd = run_cmd(tmp.path());
    cmd.args(["--stream", "--batch-size", "1", "--no-normalize"]);
    cmd.assert().success();
    let tsv = fs::read_to_string(tmp.path().join("out").join("similarities.tsv")).unwrap();
    assert_eq!(tsv.lines().count(), 4);
}

#[test]
fn run_rejects_bad_flags() {
    let tmp = TempDir::new().unwrap();
    write_inputs(tmp.path());

    let mut cmd = run_cmd(tmp.path());
    cmd.args(["--aggregate", "median"]);
    cmd.assert().failure();

    let mut cmd = run_cmd(tmp.path());
    cmd.args(["--start-batch", "2"]);
    cmd.assert().failure();

    let mut cmd = run_cmd(tmp.path());
    cmd.args(["--aggregate", "rms", "--w-labevents=-0.5", "--json"]);
    cmd.assert().failure();
    assert!(!tmp.path().join("out").join("similarity.json").exists());
}

#[test]
fn run_with_code_map_and_drop_incomplete() {
    let tmp = TempDir::new().unwrap();
    write_inputs(tmp.path());
    fs::write(tmp.path().join("map.tsv"), "4019\tA1\n").unwrap();

    let mut cmd = run_cmd(tmp.path());
    cmd.arg("--code-map")
        .arg(tmp.path().join("map.tsv"))
        .args(["--drop-incomplete", "--json", "--ic-metric", "seco", "--measure", "resnik"]);
    cmd.assert().success();

    let json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join("out").join("similarity.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["cohort"]["encounters"], 2);
    assert_eq!(json["cohort"]["dropped_encounters"], 1);
    assert_eq!(json["pairs"]["raw_entries"], 4);
    assert_eq!(json["config"]["measure"], "resnik");
}
