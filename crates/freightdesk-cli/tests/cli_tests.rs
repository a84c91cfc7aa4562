use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread::{self, JoinHandle};
use tempfile::tempdir;

const USER_KEY: &str = "@freightdesk:user:v1";
const ACCESS_TOKEN_KEY: &str = "@freightdesk:access_token:v1";
const REFRESH_TOKEN_KEY: &str = "@freightdesk:refresh_token:v1";

fn freightdesk(data_dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("freightdesk").unwrap();
    cmd.arg("--data-dir").arg(data_dir);
    // nothing listens on the discard port
    cmd.env("FREIGHTDESK_API_URL", "http://127.0.0.1:9");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

fn read_session(data_dir: &Path) -> Value {
    serde_json::from_slice(&fs::read(data_dir.join("session.json")).unwrap()).unwrap()
}

/// Answers a single request with `status` and `body`; the join handle yields
/// the request head (request line and headers).
fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut head = Vec::new();
        let mut chunk = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&chunk[..n]);
        }
        let response = format!(
            "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        String::from_utf8_lossy(&head).to_string()
    });
    (url, handle)
}

fn seed_logged_in(data_dir: &Path) {
    write_json(
        &data_dir.join("session.json"),
        &json!({
            USER_KEY: "{\"name\":\"Ana\"}",
            ACCESS_TOKEN_KEY: "tok",
            REFRESH_TOKEN_KEY: "ref"
        }),
    );
}

#[test]
fn diff_prints_changed_fields_only() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.json");
    let edited = dir.path().join("edited.json");
    write_json(&original, &json!({"name": "Ana", "city": "Goiânia", "age": 30}));
    write_json(&edited, &json!({"name": "Bob", "city": " Goiânia ", "phone": ""}));

    let out = freightdesk(dir.path())
        .arg("diff")
        .arg("--original")
        .arg(&original)
        .arg("--edited")
        .arg(&edited)
        .output()
        .unwrap();
    assert!(out.status.success());
    let printed: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(printed, json!({"name": "Bob"}));
}

#[test]
fn diff_without_original_cleans_the_edit() {
    let dir = tempdir().unwrap();
    let edited = dir.path().join("edited.json");
    write_json(&edited, &json!({"a": 1, "b": ""}));

    let out = freightdesk(dir.path())
        .arg("diff")
        .arg("--edited")
        .arg(&edited)
        .output()
        .unwrap();
    assert!(out.status.success());
    let printed: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(printed, json!({"a": 1}));
}

#[test]
fn diff_rejects_non_object_input() {
    let dir = tempdir().unwrap();
    let edited = dir.path().join("edited.json");
    write_json(&edited, &json!([1, 2]));
    freightdesk(dir.path())
        .arg("diff")
        .arg("--edited")
        .arg(&edited)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a JSON object"));
}

#[test]
fn whoami_on_fresh_install() {
    let dir = tempdir().unwrap();
    freightdesk(dir.path())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("not logged in"));
}

#[test]
fn whoami_restores_stored_user() {
    let dir = tempdir().unwrap();
    write_json(
        &dir.path().join("session.json"),
        &json!({
            USER_KEY: "{\"name\":\"Ana\",\"email\":\"ana@example.com\"}",
            ACCESS_TOKEN_KEY: "tok"
        }),
    );
    freightdesk(dir.path())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("ana@example.com"));
}

#[test]
fn corrupted_session_is_wiped() {
    let dir = tempdir().unwrap();
    write_json(
        &dir.path().join("session.json"),
        &json!({
            USER_KEY: "{broken",
            ACCESS_TOKEN_KEY: "tok",
            REFRESH_TOKEN_KEY: "ref"
        }),
    );
    freightdesk(dir.path())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("not logged in"));
    assert_eq!(read_session(dir.path()), json!({}));
}

#[test]
fn logout_clears_stored_session() {
    let dir = tempdir().unwrap();
    write_json(
        &dir.path().join("session.json"),
        &json!({
            USER_KEY: "{\"name\":\"Ana\"}",
            ACCESS_TOKEN_KEY: "tok",
            REFRESH_TOKEN_KEY: "ref",
            "unrelated": "kept"
        }),
    );
    freightdesk(dir.path())
        .arg("logout")
        .assert()
        .success()
        .stderr(predicate::str::contains("freightdesk login"));
    assert_eq!(read_session(dir.path()), json!({"unrelated": "kept"}));
}

#[test]
fn login_against_unreachable_backend_reports_invalid_credentials() {
    let dir = tempdir().unwrap();
    freightdesk(dir.path())
        .args(["login", "--identifier", "ana", "--password", "pw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid credentials (401)"));
    assert!(!dir.path().join("session.json").exists());
}

#[test]
fn resource_commands_require_login() {
    let dir = tempdir().unwrap();
    freightdesk(dir.path())
        .args(["list", "freights"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not logged in"));
}

#[test]
fn unknown_resource_kind_is_rejected() {
    let dir = tempdir().unwrap();
    freightdesk(dir.path())
        .args(["get", "trucks", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource kind"));
}

#[test]
fn truncated_session_file_is_discarded() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("session.json"), r#"{"@freightdesk:user:v1": "x""#).unwrap();
    freightdesk(dir.path()).arg("logout").assert().success();
    freightdesk(dir.path())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("not logged in"));
}

#[test]
fn rejected_token_ends_the_session() {
    let dir = tempdir().unwrap();
    seed_logged_in(dir.path());
    let (url, server) = serve_once(401, r#"{"message": "jwt expired"}"#);

    freightdesk(dir.path())
        .env("FREIGHTDESK_API_URL", &url)
        .args(["list", "freights"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session ended"));

    let head = server.join().unwrap();
    assert!(head.starts_with("GET /freights "));
    assert!(head.to_ascii_lowercase().contains("authorization: bearer tok"));
    assert_eq!(read_session(dir.path()), json!({}));
}

#[test]
fn list_summary_formats_names_and_plates() {
    let dir = tempdir().unwrap();
    seed_logged_in(dir.path());
    let (url, server) = serve_once(
        200,
        r#"{"data": [{"id": 2, "name": "joana   dos santos", "plate": "qwe9r87", "status": "loading"},
                      {"id": 1, "name": "ana lima", "plate": "abc1d23"}]}"#,
    );

    freightdesk(dir.path())
        .env("FREIGHTDESK_API_URL", &url)
        .args(["list", "drivers", "--sort", "id", "--summary"])
        .assert()
        .success()
        .stdout("#1  Ana Lima  ABC-1D23\n#2  Joana Dos Santos  QWE-9R87  loading\n");

    assert!(server.join().unwrap().starts_with("GET /drivers "));
    assert_eq!(
        read_session(dir.path())[ACCESS_TOKEN_KEY],
        json!("tok")
    );
}

#[test]
fn config_writes_settings_file() {
    let dir = tempdir().unwrap();
    freightdesk(dir.path())
        .args(["config", "--api-url", "https://api.freightdesk.test", "--login-route", "/entrar"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://api.freightdesk.test"));

    let saved: Value =
        serde_json::from_slice(&fs::read(dir.path().join("settings.json")).unwrap()).unwrap();
    assert_eq!(saved["apiBaseUrl"], json!("https://api.freightdesk.test"));
    assert_eq!(saved["loginRoute"], json!("/entrar"));
    assert!(saved["requestTimeoutSecs"].is_u64());
}

#[test]
fn config_without_flags_leaves_disk_alone() {
    let dir = tempdir().unwrap();
    freightdesk(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("apiBaseUrl"));
    assert!(!dir.path().join("settings.json").exists());
}
