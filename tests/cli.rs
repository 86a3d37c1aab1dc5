// End-to-end CLI tests for the wikisubmit binary.

use assert_cmd::Command;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use wikisubmit::DEFAULT_EDIT_SUMMARY;

fn wikisubmit() -> Command {
    let mut cmd = Command::cargo_bin("wikisubmit").unwrap();
    for var in [
        "ARCHWIKI_USERNAME",
        "ARCHWIKI_PASSWORD",
        "ARCHWIKI_API_URL",
        "ARCHWIKI_COOKIE_JAR",
        "ARCHWIKI_LOG_FILE",
        "ARCHWIKI_CURL",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_submit_command() {
    wikisubmit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("submit"));
}

#[test]
fn test_missing_credentials_exit_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let content = dir.path().join("page.txt");
    std::fs::write(&content, "Test content").unwrap();

    wikisubmit()
        .env("ARCHWIKI_USERNAME", "ExampleBot")
        .args(["submit", "Sandbox"])
        .arg(&content)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ARCHWIKI_PASSWORD"));
}

#[test]
fn test_missing_content_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("submission.log");
    let cookie_jar = dir.path().join("cookies.txt");
    std::fs::write(&cookie_jar, "# Netscape HTTP Cookie File\n").unwrap();

    wikisubmit()
        .env("ARCHWIKI_USERNAME", "ExampleBot")
        .env("ARCHWIKI_PASSWORD", "s3cret")
        .args(["submit", "Sandbox"])
        .arg(dir.path().join("missing.txt"))
        .arg("--log-file")
        .arg(&log_file)
        .arg("--cookie-jar")
        .arg(&cookie_jar)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read content file"));

    let log = std::fs::read_to_string(&log_file).unwrap();
    assert!(log.contains("Failed to read content file"), "{log}");
    assert!(log.contains("Submission run finished."), "{log}");
    assert!(!cookie_jar.exists());
}

#[test]
fn test_submit_with_default_summary_logs_revision() {
    let mut server = Server::new();
    let dir = tempfile::tempdir().unwrap();
    let content = dir.path().join("page.txt");
    let log_file = dir.path().join("submission.log");
    let cookie_jar = dir.path().join("cookies.txt");
    std::fs::write(&content, "Test content").unwrap();

    server
        .mock("POST", "/api.php")
        .match_body(Matcher::UrlEncoded("type".into(), "login".into()))
        .with_body(r#"{"query":{"tokens":{"logintoken":"LT"}}}"#)
        .create();
    server
        .mock("POST", "/api.php")
        .match_body(Matcher::UrlEncoded("action".into(), "login".into()))
        .with_body(r#"{"login":{"result":"Success"}}"#)
        .create();
    server
        .mock("POST", "/api.php")
        .match_body(Matcher::UrlEncoded("type".into(), "csrf".into()))
        .with_body(r#"{"query":{"tokens":{"csrftoken":"CT"}}}"#)
        .create();
    let edit = server
        .mock("POST", "/api.php")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("action".into(), "edit".into()),
            Matcher::UrlEncoded("text".into(), "Test content".into()),
            Matcher::UrlEncoded("summary".into(), DEFAULT_EDIT_SUMMARY.into()),
        ]))
        .with_body(r#"{"edit":{"result":"Success","newrevid":1234}}"#)
        .create();

    wikisubmit()
        .env("ARCHWIKI_USERNAME", "ExampleBot")
        .env("ARCHWIKI_PASSWORD", "s3cret")
        .args(["submit", "Sandbox"])
        .arg(&content)
        .args(["--backend", "http", "--api-url"])
        .arg(format!("{}/api.php", server.url()))
        .arg("--log-file")
        .arg(&log_file)
        .arg("--cookie-jar")
        .arg(&cookie_jar)
        .assert()
        .success()
        .stdout(predicate::str::contains("revision 1234"));

    edit.assert();
    let log = std::fs::read_to_string(&log_file).unwrap();
    assert!(log.contains("New revision ID: 1234"), "{log}");
    assert!(log.contains("Submission run finished."), "{log}");
    assert!(!log.contains("s3cret"));
    assert!(!cookie_jar.exists());
}

#[test]
fn test_failed_login_exits_non_zero_and_logs_reason() {
    let mut server = Server::new();
    let dir = tempfile::tempdir().unwrap();
    let content = dir.path().join("page.txt");
    let log_file = dir.path().join("submission.log");
    std::fs::write(&content, "Test content").unwrap();

    server
        .mock("POST", "/api.php")
        .match_body(Matcher::UrlEncoded("type".into(), "login".into()))
        .with_body(r#"{"query":{"tokens":{"logintoken":"LT"}}}"#)
        .create();
    server
        .mock("POST", "/api.php")
        .match_body(Matcher::UrlEncoded("action".into(), "login".into()))
        .with_body(r#"{"login":{"result":"Failed","reason":"Incorrect username or password entered."}}"#)
        .create();
    let csrf = server
        .mock("POST", "/api.php")
        .match_body(Matcher::UrlEncoded("type".into(), "csrf".into()))
        .expect(0)
        .create();

    wikisubmit()
        .env("ARCHWIKI_USERNAME", "ExampleBot")
        .env("ARCHWIKI_PASSWORD", "wrong")
        .args(["submit", "Sandbox"])
        .arg(&content)
        .args(["--backend", "http", "--api-url"])
        .arg(format!("{}/api.php", server.url()))
        .arg("--log-file")
        .arg(&log_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("login failed"));

    csrf.assert();
    let log = std::fs::read_to_string(&log_file).unwrap();
    assert!(log.contains("Incorrect username or password"), "{log}");
}
