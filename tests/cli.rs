use assert_cmd::Command;

#[test]
fn help_lists_service_options() {
    let output = Command::cargo_bin("task-intake")
        .expect("binary present")
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());

    let help = String::from_utf8(output.stdout).unwrap();
    for flag in ["--listen", "--otel-endpoint", "--firstname", "--ready-after", "--no-latency"] {
        assert!(help.contains(flag), "missing {flag} in help:\n{help}");
    }
}

#[test]
fn rejects_invalid_listen_address() {
    Command::cargo_bin("task-intake")
        .expect("binary present")
        .args(["--listen", "not-an-address"])
        .assert()
        .failure();
}
