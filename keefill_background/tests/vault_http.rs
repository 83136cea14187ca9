use keefill_background::vault_client::{HttpVaultClient, UnlockRequest, VaultApi, VaultError};
use keefill_protocol::Secret;
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> HttpVaultClient {
    HttpVaultClient::with_base_url(&server.uri()).expect("client")
}

#[tokio::test]
async fn status_reads_locked_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"locked": false})))
        .mount(&server)
        .await;

    let status = client_for(&server).await.status().await.unwrap();
    assert!(!status.locked);
}

#[tokio::test]
async fn unlock_sends_wire_body_and_surfaces_refusal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/unlock"))
        .and(body_json(json!({
            "dbPath": "/vault.kdbx",
            "password": "wrong",
            "keyfile": null
        })))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"success": false, "error": "Invalid credentials"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ack = client_for(&server)
        .await
        .unlock(&UnlockRequest {
            db_path: "/vault.kdbx".to_string(),
            password: Secret::new("wrong"),
            keyfile: None,
        })
        .await
        .unwrap();
    assert!(!ack.success);
    assert_eq!(ack.error.as_deref(), Some("Invalid credentials"));
}

#[tokio::test]
async fn search_non_2xx_is_bad_status_not_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_json(json!({"url": "https://example.com/login"})))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Database locked"})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .search("https://example.com/login")
        .await
        .unwrap_err();
    assert!(!err.is_transport());
    assert!(matches!(
        err,
        VaultError::BadStatus { status, .. } if status == StatusCode::UNAUTHORIZED
    ));
}

#[tokio::test]
async fn search_and_credentials_decode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "entries": [
                {"uuid": "u1", "title": "Example", "username": "alice", "url": "https://example.com", "notes": null},
                {"uuid": "u2", "title": null, "username": "bob"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/get-credentials"))
        .and(body_json(json!({"uuid": "u1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "username": "alice", "password": "s3cret", "url": "https://example.com"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let entries = client.search("https://example.com").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].title, "");

    let cred = client.get_credentials("u1").await.unwrap();
    assert_eq!(cred.username, "alice");
    assert_eq!(cred.password.expose(), "s3cret");
}

#[tokio::test]
async fn missing_entry_is_not_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/get-credentials"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"success": false, "error": "Entry not found"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).await.get_credentials("zzz").await.unwrap_err();
    assert!(!err.is_transport());
}

#[tokio::test]
async fn closed_port_is_transport() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpVaultClient::with_base_url(&format!("http://{addr}")).unwrap();
    assert!(client.status().await.unwrap_err().is_transport());
}
