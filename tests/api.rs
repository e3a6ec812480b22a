//! Integration tests driving the HTTP API end to end

use rss_creator::auth::{TokenCodec, TokenKind};
use rss_creator::configuration::{HashingSettings, JwtSettings};
use rss_creator::startup::run;
use rss_creator::store::{CredentialStore, InMemoryCredentialStore};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryCredentialStore>,
    pub codec: TokenCodec,
    pub client: reqwest::Client,
}

fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "integration-test-secret-at-least-32-chars".to_string(),
        access_token_expiry: 7200,
        refresh_token_expiry: 5184000,
        issuer: "rss-creator-test".to_string(),
    }
}

fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryCredentialStore::new());
    let server = run(
        listener,
        store.clone(),
        jwt_settings(),
        HashingSettings { cost: 4 },
    )
    .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        codec: TokenCodec::new(&jwt_settings()),
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn create_user(&self, username: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}/v1/users", &self.address))
            .json(&json!({
                "username": username,
                "password": PASSWORD,
                "email": format!("{}@example.com", username)
            }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn authorize(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .get(&format!("{}/v1/users/{}/authorize", &self.address, username))
            .header("Password", password)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Sign in and return (access token, refresh token)
    async fn sign_in(&self, username: &str) -> (String, String) {
        let response = self.authorize(username, PASSWORD).await;
        assert_eq!(200, response.status().as_u16());

        let body: Value = response.json().await.expect("Failed to parse response");
        (
            body["data"]["accessToken"].as_str().expect("No access token").to_string(),
            body["data"]["refreshToken"].as_str().expect("No refresh token").to_string(),
        )
    }

    async fn exchange(&self, username: &str, bearer: Option<&str>) -> reqwest::Response {
        let mut request = self
            .client
            .get(&format!("{}/v1/users/{}/token", &self.address, username));
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// The post-sign-in flag update runs detached; wait until it lands
    async fn wait_until_live(&self, username: &str) {
        for _ in 0..100 {
            let user = self.store.get_user(username).await.unwrap();
            if !user.invalidated_tokens {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("tokens for {} were never marked valid", username);
    }
}

// --- Health ---

#[tokio::test]
async fn health_returns_200() {
    let app = spawn_app();

    let response = app
        .client
        .get(&format!("{}/health", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
}

// --- Accounts ---

#[tokio::test]
async fn create_user_returns_204_and_hashes_password() {
    let app = spawn_app();

    let response = app.create_user("alice").await;
    assert_eq!(204, response.status().as_u16());

    let user = app.store.get_user("alice").await.unwrap();
    assert_ne!(user.password_hash, PASSWORD);
    assert!(user.password_hash.starts_with("$2"));
    assert!(!user.invalidated_tokens);
}

#[tokio::test]
async fn create_user_returns_409_for_duplicate() {
    let app = spawn_app();

    assert_eq!(204, app.create_user("alice").await.status().as_u16());
    assert_eq!(409, app.create_user("alice").await.status().as_u16());
}

#[tokio::test]
async fn create_user_returns_400_for_invalid_input() {
    let app = spawn_app();

    let test_cases = vec![
        (json!({"password": PASSWORD, "email": "a@example.com"}), "missing username"),
        (json!({"username": "alice", "email": "a@example.com"}), "missing password"),
        (json!({"username": "alice", "password": "short", "email": "a@example.com"}), "short password"),
        (json!({"username": "alice", "password": PASSWORD, "email": "not-an-email"}), "bad email"),
        (json!({"username": "has space", "password": PASSWORD, "email": "a@example.com"}), "bad username"),
    ];

    for (body, reason) in test_cases {
        let response = app
            .client
            .post(&format!("{}/v1/users", &app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(400, response.status().as_u16(), "Should reject request: {}", reason);
        let body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(body["error"]["code"], 400);
        assert!(body.get("data").is_none());
    }
}

#[tokio::test]
async fn create_user_returns_400_for_malformed_json() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/v1/users", &app.address))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"]["message"], "Could not parse body as JSON");
}

#[tokio::test]
async fn user_exists_reports_presence() {
    let app = spawn_app();
    app.create_user("alice").await;

    for (username, exists) in [("alice", true), ("bob", false)] {
        let response = app
            .client
            .get(&format!("{}/v1/users/exists", &app.address))
            .query(&[("username", username)])
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(body, json!({"data": {"exists": exists}}));
    }

    let response = app
        .client
        .get(&format!("{}/v1/users/exists", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());
}

// --- Sign-in ---

#[tokio::test]
async fn authorize_returns_both_token_kinds_for_alice() {
    let app = spawn_app();
    app.create_user("alice").await;

    let (access_token, refresh_token) = app.sign_in("alice").await;

    let access = app.codec.parse(&access_token).expect("Invalid access token");
    let refresh = app.codec.parse(&refresh_token).expect("Invalid refresh token");
    assert_eq!(access.kind, TokenKind::Access);
    assert_eq!(refresh.kind, TokenKind::Refresh);
    assert_eq!(access.username, "alice");
    assert_eq!(refresh.username, "alice");
}

#[tokio::test]
async fn authorize_returns_401_for_wrong_password() {
    let app = spawn_app();
    app.create_user("alice").await;
    app.store.set_token_validity("alice", false).await.unwrap();

    let response = app.authorize("alice", "battery staple").await;

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body, json!({"error": {"code": 401, "message": "Password incorrect"}}));

    // No partial mutation on a failed sign-in
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(app.store.get_user("alice").await.unwrap().invalidated_tokens);
}

#[tokio::test]
async fn authorize_returns_400_without_password_header() {
    let app = spawn_app();
    app.create_user("alice").await;

    let response = app
        .client
        .get(&format!("{}/v1/users/alice/authorize", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"]["message"], "Password header required");
}

#[tokio::test]
async fn authorize_returns_404_for_unknown_user() {
    let app = spawn_app();

    let response = app.authorize("ghost", PASSWORD).await;

    assert_eq!(404, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"]["message"], "User ghost not found");
}

// --- Refresh-to-access exchange ---

#[tokio::test]
async fn exchange_returns_fresh_access_token() {
    let app = spawn_app();
    app.create_user("alice").await;
    let (access_token, refresh_token) = app.sign_in("alice").await;

    let response = app.exchange("alice", Some(&refresh_token)).await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"].get("refreshToken").is_none());

    let fresh = app
        .codec
        .parse(body["data"]["accessToken"].as_str().expect("No access token"))
        .expect("Invalid access token");
    let original = app.codec.parse(&access_token).unwrap();
    assert_eq!(fresh.kind, TokenKind::Access);
    assert_eq!(fresh.username, "alice");
    assert!(fresh.exp >= original.exp);
}

#[tokio::test]
async fn exchange_returns_401_without_bearer_token() {
    let app = spawn_app();
    app.create_user("alice").await;

    let response = app.exchange("alice", None).await;

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body,
        json!({"error": {"code": 401, "message": "Bearer token required"}})
    );
}

#[tokio::test]
async fn exchange_returns_400_for_access_token() {
    let app = spawn_app();
    app.create_user("alice").await;
    let (access_token, _) = app.sign_in("alice").await;

    let response = app.exchange("alice", Some(&access_token)).await;

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body["error"]["message"],
        "Invalid token provided, 'refresh' token expected, got token with type 'access'"
    );
}

#[tokio::test]
async fn exchange_returns_400_for_refresh_token_of_other_user() {
    let app = spawn_app();
    app.create_user("alice").await;
    app.create_user("bob").await;
    let (_, alice_refresh) = app.sign_in("alice").await;

    let response = app.exchange("bob", Some(&alice_refresh)).await;

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn sign_out_invalidates_refresh_tokens_until_next_sign_in() {
    let app = spawn_app();
    app.create_user("alice").await;
    let (access_token, refresh_token) = app.sign_in("alice").await;
    app.wait_until_live("alice").await;

    let response = app
        .client
        .delete(&format!("{}/v1/users/alice/sessions", &app.address))
        .bearer_auth(&access_token)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, response.status().as_u16());

    let response = app.exchange("alice", Some(&refresh_token)).await;
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"]["message"], "Refresh token has been invalidated");

    // Signing in again reopens the account, old refresh tokens included
    let (_, new_refresh_token) = app.sign_in("alice").await;
    app.wait_until_live("alice").await;

    assert_eq!(200, app.exchange("alice", Some(&new_refresh_token)).await.status().as_u16());
    assert_eq!(200, app.exchange("alice", Some(&refresh_token)).await.status().as_u16());
}

// --- Guarded account resources ---

#[tokio::test]
async fn get_user_returns_record_without_password() {
    let app = spawn_app();
    app.create_user("alice").await;
    let (access_token, _) = app.sign_in("alice").await;

    let response = app
        .client
        .get(&format!("{}/v1/users/alice", &app.address))
        .bearer_auth(&access_token)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body,
        json!({"data": {"username": "alice", "email": "alice@example.com"}})
    );
}

#[tokio::test]
async fn guarded_resources_reject_missing_or_malformed_authorization() {
    let app = spawn_app();
    app.create_user("alice").await;

    let malformed_headers = vec![
        None,
        Some("Bearer"),
        Some("Basic dXNlcjpwYXNz"),
        Some("BearerToken"),
        Some(""),
    ];

    for header in malformed_headers {
        let mut request = app.client.get(&format!("{}/v1/users/alice", &app.address));
        if let Some(value) = header {
            request = request.header("Authorization", value);
        }
        let response = request.send().await.expect("Failed to execute request.");

        assert_eq!(401, response.status().as_u16(), "Should reject header: {:?}", header);
        let body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(
            body,
            json!({"error": {"code": 401, "message": "Bearer token required"}})
        );
    }
}

#[tokio::test]
async fn guarded_resources_reject_refresh_tokens() {
    let app = spawn_app();
    app.create_user("alice").await;
    let (_, refresh_token) = app.sign_in("alice").await;

    let response = app
        .client
        .get(&format!("{}/v1/users/alice", &app.address))
        .bearer_auth(&refresh_token)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn guarded_resources_reject_expired_access_token() {
    let app = spawn_app();
    app.create_user("alice").await;
    let expired = app
        .codec
        .issue("alice", TokenKind::Access, chrono::Duration::seconds(-30))
        .unwrap();

    let response = app
        .client
        .delete(&format!("{}/v1/users/alice", &app.address))
        .bearer_auth(&expired)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    // The delete handler never ran
    assert!(app.store.get_user("alice").await.is_ok());
}

#[tokio::test]
async fn guarded_resources_reject_token_of_other_user() {
    let app = spawn_app();
    app.create_user("alice").await;
    app.create_user("bob").await;
    let (alice_access, _) = app.sign_in("alice").await;

    let response = app
        .client
        .delete(&format!("{}/v1/users/bob", &app.address))
        .bearer_auth(&alice_access)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    assert!(app.store.get_user("bob").await.is_ok());
}

#[tokio::test]
async fn update_user_rehashes_password() {
    let app = spawn_app();
    app.create_user("alice").await;
    let (access_token, _) = app.sign_in("alice").await;

    let response = app
        .client
        .put(&format!("{}/v1/users/alice", &app.address))
        .bearer_auth(&access_token)
        .json(&json!({"password": "battery staple"}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, response.status().as_u16());

    assert_eq!(401, app.authorize("alice", PASSWORD).await.status().as_u16());
    assert_eq!(200, app.authorize("alice", "battery staple").await.status().as_u16());
}

#[tokio::test]
async fn update_user_returns_400_for_short_password() {
    let app = spawn_app();
    app.create_user("alice").await;
    let (access_token, _) = app.sign_in("alice").await;

    let response = app
        .client
        .put(&format!("{}/v1/users/alice", &app.address))
        .bearer_auth(&access_token)
        .json(&json!({"password": "short"}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"]["message"], "Password must be at least 8 characters");
}

#[tokio::test]
async fn delete_user_removes_account() {
    let app = spawn_app();
    app.create_user("alice").await;
    let (access_token, _) = app.sign_in("alice").await;

    let response = app
        .client
        .delete(&format!("{}/v1/users/alice", &app.address))
        .bearer_auth(&access_token)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, response.status().as_u16());

    let response = app
        .client
        .get(&format!("{}/v1/users/alice", &app.address))
        .bearer_auth(&access_token)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn empty_update_of_deleted_account_returns_404() {
    let app = spawn_app();
    app.create_user("alice").await;
    let (access_token, _) = app.sign_in("alice").await;
    app.wait_until_live("alice").await;
    app.store.delete_user("alice").await.unwrap();

    let response = app
        .client
        .put(&format!("{}/v1/users/alice", &app.address))
        .bearer_auth(&access_token)
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(404, response.status().as_u16());
}
