use std::fs;

use assert_cmd::Command;
use tempfile::TempDir;

#[test]
fn validate_command_ok() {
    let tmp = TempDir::new().unwrap();
    let bundle = r#"{
      "participants": [{"hadm_id": 1}, {"hadm_id": 2}],
      "diagnoses": [{"hadm_id": 1, "icd_code": "A1"}, {"hadm_id": 2, "icd_code": "Z9"}]
    }"#;
    fs::write(tmp.path().join("bundle.json"), bundle).unwrap();
    fs::write(tmp.path().join("edges.tsv"), "ROOT\tA1\nROOT\tB1\n").unwrap();

    let mut cmd = Command::cargo_bin("kira-encsim").unwrap();
    cmd.arg("validate")
        .arg("--input")
        .arg(tmp.path().join("bundle.json"))
        .arg("--taxonomy")
        .arg(tmp.path().join("edges.tsv"));
    let out = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(out).unwrap();
    assert!(stdout.contains("kira-encsim validate ok"));
    assert!(stdout.contains("encounters: 2"));
    assert!(stdout.contains("diagnoses: 1 kept, 0 remapped, 1 dropped"));
}

#[test]
fn validate_rejects_cyclic_taxonomy() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("bundle.json"),
        r#"{"participants": [{"hadm_id": 1}]}"#,
    )
    .unwrap();
    fs::write(tmp.path().join("edges.tsv"), "A\tB\nB\tA\n").unwrap();

    let mut cmd = Command::cargo_bin("kira-encsim").unwrap();
    cmd.arg("validate")
        .arg("--input")
        .arg(tmp.path().join("bundle.json"))
        .arg("--taxonomy")
        .arg(tmp.path().join("edges.tsv"));
    cmd.assert().failure();
}
