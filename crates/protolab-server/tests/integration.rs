use axum::http::StatusCode;
use http_body_util::BodyExt;
use protolab_core::config::Config;
use protolab_core::error::{ProtolabError, Result};
use protolab_core::registry::{FileRegistry, PrototypeFile};
use protolab_server::terminator::ProcessTerminator;
use protolab_server::AppState;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Config tuned for tests: loopback-only probes with a short timeout and a
/// harmless long-running "dev server".
fn test_config() -> Config {
    let mut config = Config::new();
    config.probe.host = "127.0.0.1".into();
    config.probe.timeout_ms = 500;
    config.launcher.program = "sh".into();
    config.launcher.args = vec!["-c".into(), "sleep 3".into()];
    config.launcher.spawn_grace_ms = 100;
    config
}

/// Register a prototype and create its directory. `descriptor` controls
/// whether `package.json` is written.
fn register(dir: &TempDir, id: &str, port: u16, descriptor: bool) {
    let proto_dir = dir.path().join("prototypes").join(id);
    std::fs::create_dir_all(&proto_dir).unwrap();
    if descriptor {
        std::fs::write(proto_dir.join("package.json"), r#"{"scripts":{"dev":"vite"}}"#).unwrap();
    }
    let mut file = PrototypeFile::load(dir.path()).unwrap();
    file.add(id, port, format!("prototypes/{id}")).unwrap();
    file.save(dir.path()).unwrap();
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Terminator double: reports `pid` until it is killed.
#[derive(Default)]
struct FakeTerminator {
    pid: Mutex<Option<u32>>,
    fail: bool,
    killed: Mutex<Vec<u32>>,
}

impl FakeTerminator {
    fn with_pid(pid: u32) -> Self {
        Self {
            pid: Mutex::new(Some(pid)),
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl ProcessTerminator for FakeTerminator {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn find_pid(&self, _port: u16) -> Result<Option<u32>> {
        if self.fail {
            return Err(ProtolabError::CommandFailed("lsof: permission denied".into()));
        }
        Ok(*self.pid.lock().unwrap())
    }

    fn kill_pid(&self, pid: u32) -> Result<()> {
        self.killed.lock().unwrap().push(pid);
        *self.pid.lock().unwrap() = None;
        Ok(())
    }
}

fn app_with(dir: &TempDir, config: Config, terminator: Arc<dyn ProcessTerminator>) -> axum::Router {
    let registry = Arc::new(FileRegistry::new(dir.path()));
    let state = AppState::new(config, registry, terminator);
    protolab_server::build_router(state)
}

fn app(dir: &TempDir) -> axum::Router {
    app_with(dir, test_config(), Arc::new(FakeTerminator::default()))
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri).await
}

async fn post(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri).await
}

async fn is_running(app: &axum::Router, port: u16) -> bool {
    let (status, json) = get(app, &format!("/prototypes/{port}/status")).await;
    assert_eq!(status, StatusCode::OK);
    json["running"].as_bool().expect("running must be a boolean")
}

/// Poll status every 500ms until it equals `want` or `limit` elapses.
async fn wait_for_running(app: &axum::Router, port: u16, want: bool, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if is_running(app, port).await == want {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_ports_are_rejected_on_every_endpoint() {
    let dir = TempDir::new().unwrap();
    let terminator = Arc::new(FakeTerminator::with_pid(4242));
    let app = app_with(&dir, test_config(), terminator.clone());

    for raw in ["0", "65536", "-5", "abc", "70000"] {
        for (method, action) in [("POST", "start"), ("POST", "stop"), ("GET", "status")] {
            let (status, json) = send(&app, method, &format!("/prototypes/{raw}/{action}")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {raw}/{action}");
            assert!(
                json["error"].as_str().unwrap().contains("invalid port"),
                "got {json}"
            );
        }
    }

    assert!(
        terminator.killed.lock().unwrap().is_empty(),
        "invalid requests must have no side effects"
    );
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_unregistered_port_is_404_and_spawns_nothing() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let port = free_port();

    assert!(!is_running(&app, port).await);
    let (status, json) = post(&app, &format!("/prototypes/{port}/start")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("no prototype registered"));
    assert!(!is_running(&app, port).await);
}

#[tokio::test]
async fn start_with_missing_directory_is_404() {
    let dir = TempDir::new().unwrap();
    register(&dir, "landing", 4021, true);
    std::fs::remove_dir_all(dir.path().join("prototypes/landing")).unwrap();

    let (status, json) = post(&app(&dir), "/prototypes/4021/start").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("directory not found"));
}

#[tokio::test]
async fn start_without_descriptor_is_404_with_distinct_message() {
    let dir = TempDir::new().unwrap();
    register(&dir, "landing", 4021, false);

    let (status, json) = post(&app(&dir), "/prototypes/4021/start").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let msg = json["error"].as_str().unwrap();
    assert!(msg.contains("descriptor not found"), "got {msg}");
    assert!(msg.contains("package.json"), "got {msg}");
}

#[cfg(unix)]
#[tokio::test]
async fn start_registered_prototype_reports_starting() {
    let dir = TempDir::new().unwrap();
    register(&dir, "landing", 4021, true);

    let (status, json) = post(&app(&dir), "/prototypes/4021/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        serde_json::json!({ "success": true, "message": "Server starting", "port": 4021 })
    );
}

#[tokio::test]
async fn start_spawn_failure_is_500() {
    let dir = TempDir::new().unwrap();
    register(&dir, "landing", 4021, true);
    let mut config = test_config();
    config.launcher.program = "__protolab_no_such_program__".into();
    config.launcher.args = vec![];

    let app = app_with(&dir, config, Arc::new(FakeTerminator::default()));
    let (status, json) = post(&app, "/prototypes/4021/start").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("__protolab_no_such_program__"));
}

#[cfg(unix)]
#[tokio::test]
async fn start_guard_rejects_second_start_until_stop() {
    let dir = TempDir::new().unwrap();
    register(&dir, "landing", 4021, true);
    let mut config = test_config();
    config.guard.enabled = true;
    config.guard.window_secs = 60;
    let app = app_with(&dir, config, Arc::new(FakeTerminator::default()));

    let (status, _) = post(&app, "/prototypes/4021/start").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = post(&app, "/prototypes/4021/start").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("already in progress"));

    let (status, _) = post(&app, "/prototypes/4021/stop").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(&app, "/prototypes/4021/start").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn start_guard_rejects_busy_port() {
    let dir = TempDir::new().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    register(&dir, "landing", port, true);
    let mut config = test_config();
    config.guard.enabled = true;
    let app = app_with(&dir, config, Arc::new(FakeTerminator::default()));

    let (status, json) = post(&app, &format!("/prototypes/{port}/start")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("already in use"));
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_follows_the_listener() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (status, json) = get(&app, &format!("/prototypes/{port}/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({ "running": true }));

    drop(listener);
    assert!(!is_running(&app, port).await);
}

// ---------------------------------------------------------------------------
// Stop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_on_idle_port_is_not_an_error_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let port = free_port();

    assert!(!is_running(&app, port).await);
    for _ in 0..2 {
        let (status, json) = post(&app, &format!("/prototypes/{port}/stop")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "No process found on this port");
        assert_eq!(json["port"], port);
    }
    assert!(!is_running(&app, port).await);
}

#[tokio::test]
async fn stop_kills_first_pid_then_reports_nothing() {
    let dir = TempDir::new().unwrap();
    let terminator = Arc::new(FakeTerminator::with_pid(4242));
    let app = app_with(&dir, test_config(), terminator.clone());

    let (status, json) = post(&app, "/prototypes/4021/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        serde_json::json!({ "success": true, "message": "Server stopped", "port": 4021 })
    );

    let (status, json) = post(&app, "/prototypes/4021/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);

    assert_eq!(*terminator.killed.lock().unwrap(), vec![4242]);
}

#[tokio::test]
async fn stop_does_not_need_a_registry_entry() {
    let dir = TempDir::new().unwrap();
    // No prototypes.yaml at all.
    let app = app_with(&dir, test_config(), Arc::new(FakeTerminator::with_pid(77)));
    let (status, json) = post(&app, "/prototypes/5173/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn stop_command_failure_is_500() {
    let dir = TempDir::new().unwrap();
    let app = app_with(&dir, test_config(), Arc::new(FakeTerminator::failing()));
    let (status, json) = post(&app, "/prototypes/4021/stop").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("permission denied"));
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_reports_each_prototype_with_live_status() {
    let dir = TempDir::new().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live = listener.local_addr().unwrap().port();
    let idle = free_port();
    register(&dir, "live", live, true);
    register(&dir, "idle", idle, true);

    let (status, json) = get(&app(&dir), "/prototypes").await;
    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().expect("expected JSON array");
    assert_eq!(rows.len(), 2);

    let row = |id: &str| rows.iter().find(|r| r["id"] == id).unwrap().clone();
    assert_eq!(row("live")["running"], true);
    assert_eq!(row("live")["port"], live);
    assert_eq!(row("idle")["running"], false);
    assert!(row("idle")["directory_path"]
        .as_str()
        .unwrap()
        .ends_with("prototypes/idle"));
}

#[tokio::test]
async fn list_on_empty_registry_is_empty_array() {
    let dir = TempDir::new().unwrap();
    let (status, json) = get(&app(&dir), "/prototypes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// End to end: real dev server, real lsof
// ---------------------------------------------------------------------------

/// Start → poll until running → stop → poll until stopped, against a real
/// listener (`python3 -m http.server`) and the real lsof terminator. Skipped
/// when either tool is missing.
#[cfg(unix)]
#[tokio::test]
async fn start_poll_stop_scenario() {
    if which::which("python3").is_err() || which::which("lsof").is_err() {
        eprintln!("skipping: python3 and lsof are required");
        return;
    }

    let dir = TempDir::new().unwrap();
    let port = free_port();
    register(&dir, "landing", port, true);

    let mut config = test_config();
    config.launcher.args = vec![
        "-c".into(),
        r#"exec python3 -m http.server --bind 127.0.0.1 "$PORT""#.into(),
    ];
    config.launcher.spawn_grace_ms = 1000;
    let app = app_with(
        &dir,
        config,
        Arc::new(protolab_server::terminator::LsofTerminator),
    );

    let (status, json) = post(&app, &format!("/prototypes/{port}/start")).await;
    assert_eq!(status, StatusCode::OK, "start failed: {json}");
    assert_eq!(json["success"], true);
    assert_eq!(json["port"], port);

    assert!(
        wait_for_running(&app, port, true, Duration::from_secs(10)).await,
        "dev server never started listening on {port}"
    );

    let (status, json) = post(&app, &format!("/prototypes/{port}/stop")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true, "stop: {json}");

    assert!(
        wait_for_running(&app, port, false, Duration::from_secs(5)).await,
        "port {port} still answering after stop"
    );
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

#[tokio::test]
async fn default_bind_is_loopback_only() {
    let config = Config::new();
    let listener = protolab_server::bind(&config.server.host, 0).await.unwrap();
    assert!(listener.local_addr().unwrap().ip().is_loopback());
}

#[tokio::test]
async fn bind_accepts_bracketed_ipv6() {
    // Hosts without IPv6 cannot bind ::1 at all.
    if std::net::TcpListener::bind("[::1]:0").is_err() {
        return;
    }
    let listener = protolab_server::bind("[::1]", 0).await.unwrap();
    assert!(listener.local_addr().unwrap().is_ipv6());
}
