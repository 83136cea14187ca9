//! In-memory stand-in for the loopback vault service, speaking the same HTTP
//! API. Used by the `mock_vault` binary and the end-to-end tests.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tracing::info;
use url::Url;

pub const DEMO_DB_PATH: &str = "/vault.kdbx";
pub const DEMO_PASSWORD: &str = "correct";

#[derive(Debug, Clone)]
pub struct MockEntry {
    pub uuid: String,
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: String,
}

impl MockEntry {
    pub fn new(title: &str, username: &str, password: &str, url: &str) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockVault {
    pub db_path: String,
    pub password: String,
    pub entries: Vec<MockEntry>,
    pub unlocked: bool,
}

impl MockVault {
    pub fn demo() -> Self {
        Self {
            db_path: DEMO_DB_PATH.to_string(),
            password: DEMO_PASSWORD.to_string(),
            entries: vec![
                MockEntry::new("Example", "alice", "alice-pw", "https://example.com/login"),
                MockEntry::new("Example (work)", "bob", "bob-pw", "https://example.com"),
                MockEntry::new("GitHub", "octocat", "gh-pw", "https://github.com"),
            ],
            unlocked: false,
        }
    }

    fn matching(&self, page_url: &str) -> Vec<&MockEntry> {
        let domain = domain_of(page_url).to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                e.url.to_lowercase().contains(&domain) || e.title.to_lowercase().contains(&domain)
            })
            .collect()
    }
}

/// `host[:port]` of a URL, or the raw input when it does not parse.
fn domain_of(page_url: &str) -> String {
    match Url::parse(page_url) {
        Ok(u) => match (u.host_str(), u.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => u.path().to_string(),
        },
        Err(_) => page_url.to_string(),
    }
}

pub type SharedVault = Arc<Mutex<MockVault>>;

fn guard(vault: &SharedVault) -> MutexGuard<'_, MockVault> {
    vault.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn router(vault: SharedVault) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/unlock", post(unlock))
        .route("/lock", post(lock))
        .route("/search", post(search))
        .route("/get-credentials", post(get_credentials))
        .with_state(vault)
}

pub async fn serve(listener: TcpListener, vault: SharedVault) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock vault listening");
    }
    axum::serve(listener, router(vault)).await
}

async fn status(State(vault): State<SharedVault>) -> Json<Value> {
    Json(json!({ "locked": !guard(&vault).unlocked }))
}

#[derive(Deserialize)]
struct UnlockBody {
    #[serde(rename = "dbPath", default)]
    db_path: String,
    #[serde(default)]
    password: String,
}

async fn unlock(
    State(vault): State<SharedVault>,
    Json(body): Json<UnlockBody>,
) -> (StatusCode, Json<Value>) {
    let mut v = guard(&vault);
    if body.db_path != v.db_path {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": format!("Database file not found: {}", body.db_path)
            })),
        );
    }
    if body.password != v.password {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "Invalid credentials" })),
        );
    }
    v.unlocked = true;
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Database unlocked successfully",
            "dbPath": v.db_path
        })),
    )
}

async fn lock(State(vault): State<SharedVault>) -> Json<Value> {
    guard(&vault).unlocked = false;
    Json(json!({ "success": true }))
}

#[derive(Deserialize)]
struct SearchBody {
    #[serde(default)]
    url: String,
}

async fn search(
    State(vault): State<SharedVault>,
    Json(body): Json<SearchBody>,
) -> (StatusCode, Json<Value>) {
    let v = guard(&vault);
    if !v.unlocked {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Database locked" })),
        );
    }
    let entries: Vec<Value> = v
        .matching(&body.url)
        .into_iter()
        .map(|e| {
            json!({
                "uuid": e.uuid,
                "title": e.title,
                "username": e.username,
                "url": e.url
            })
        })
        .collect();
    (
        StatusCode::OK,
        Json(json!({ "success": true, "entries": entries })),
    )
}

#[derive(Deserialize)]
struct UuidBody {
    #[serde(default)]
    uuid: String,
}

async fn get_credentials(
    State(vault): State<SharedVault>,
    Json(body): Json<UuidBody>,
) -> (StatusCode, Json<Value>) {
    let v = guard(&vault);
    if !v.unlocked {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Database locked" })),
        );
    }
    match v.entries.iter().find(|e| e.uuid == body.uuid) {
        Some(e) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "username": e.username,
                "password": e.password,
                "url": e.url
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Entry not found" })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_match_ignores_path_and_case() {
        let vault = MockVault::demo();
        let titles: Vec<&str> = vault
            .matching("https://EXAMPLE.com/account/login?next=/")
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Example", "Example (work)"]);
        assert!(vault.matching("https://nowhere.test").is_empty());
    }

    #[test]
    fn domain_keeps_port_and_falls_back_to_raw() {
        assert_eq!(domain_of("http://localhost:8080/x"), "localhost:8080");
        assert_eq!(domain_of("github.com"), "github.com");
    }
}
