use assert_cmd::Command;

#[test]
fn cli_help_smoke() {
    let mut cmd = Command::cargo_bin("kira-encsim").unwrap();
    cmd.arg("--help");
    cmd.assert().success();
}

#[test]
fn run_help_lists_options() {
    let mut cmd = Command::cargo_bin("kira-encsim").unwrap();
    cmd.arg("run").arg("--help");
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("--aggregate"));
    assert!(text.contains("--batch-size"));
    assert!(text.contains("--w-labevents"));
}
