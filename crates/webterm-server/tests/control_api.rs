use axum::http::StatusCode;
use axum_test::TestServer;
use webterm_core::{Ack, ErrorBody, SessionSummary};
use webterm_server::{ServerConfig, ShellSpec, TermServer};

fn config(max_sessions: usize, base_path: &str) -> ServerConfig {
    ServerConfig {
        max_sessions,
        base_path: base_path.to_string(),
        shell: ShellSpec::new("/bin/sh"),
        ..ServerConfig::default()
    }
}

#[tokio::test]
async fn health_is_ok() {
    let term = TermServer::new(config(10, ""));
    let server = TestServer::new(term.router()).unwrap();

    let response = server.get("/api/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Ack>(), Ack::OK);
}

#[tokio::test]
async fn create_then_list_then_delete() {
    let term = TermServer::new(config(10, ""));
    let registry = term.registry().clone();
    let server = TestServer::new(term.router()).unwrap();

    let response = server.get("/api/sessions").await;
    response.assert_status_ok();
    assert!(response.json::<Vec<SessionSummary>>().is_empty());

    let created = server.post("/api/sessions").await;
    created.assert_status_ok();
    let created: SessionSummary = created.json();
    assert!(!created.id.is_empty());

    let listed: Vec<SessionSummary> = server.get("/api/sessions").await.json();
    assert_eq!(listed, vec![created.clone()]);

    let deleted = server.delete(&format!("/api/sessions/{}", created.id)).await;
    deleted.assert_status_ok();
    assert_eq!(deleted.json::<Ack>(), Ack::OK);

    let listed: Vec<SessionSummary> = server.get("/api/sessions").await.json();
    assert!(listed.is_empty());
    assert!(registry.get(&created.id).await.is_none());
}

#[tokio::test]
async fn delete_unknown_session_succeeds() {
    let term = TermServer::new(config(10, ""));
    let server = TestServer::new(term.router()).unwrap();

    let response = server.delete("/api/sessions/does-not-exist").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Ack>(), Ack::OK);
}

#[tokio::test]
async fn created_ids_are_unique() {
    let term = TermServer::new(config(10, ""));
    let registry = term.registry().clone();
    let server = TestServer::new(term.router()).unwrap();

    let a: SessionSummary = server.post("/api/sessions").await.json();
    let b: SessionSummary = server.post("/api/sessions").await.json();
    assert_ne!(a.id, b.id);

    registry.shutdown().await;
}

#[tokio::test]
async fn session_cap_returns_503() {
    let term = TermServer::new(config(1, ""));
    let registry = term.registry().clone();
    let server = TestServer::new(term.router()).unwrap();

    server.post("/api/sessions").await.assert_status_ok();

    let response = server.post("/api/sessions").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: ErrorBody = response.json();
    assert_eq!(body.status, 503);
    assert!(body.error.contains("session limit"));

    assert_eq!(registry.count().await, 1);
    registry.shutdown().await;
}

#[tokio::test]
async fn spawn_failure_returns_500() {
    let mut cfg = config(10, "");
    cfg.shell = ShellSpec::new("/definitely/not/a/shell");
    let term = TermServer::new(cfg);
    let server = TestServer::new(term.router()).unwrap();

    let response = server.post("/api/sessions").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let listed: Vec<SessionSummary> = server.get("/api/sessions").await.json();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn routes_nest_under_base_path() {
    let term = TermServer::new(config(10, "/terminal"));
    let server = TestServer::new(term.router()).unwrap();

    server.get("/terminal/api/health").await.assert_status_ok();
    server
        .get("/api/health")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
