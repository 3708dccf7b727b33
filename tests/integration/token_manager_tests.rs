//! Token manager tests against a mock registry over HTTP

use agent_auth::keys::strip_pem_armor;
use agent_auth::{AgentAuthError, RegistryTokenManager, TokenManager, TokenParams};
use agent_auth_tests::{token_body, PUBLIC_KEY};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn params(server: &MockServer) -> TokenParams {
    TokenParams {
        agent_id: "agent-a".to_string(),
        agent_secret: "agent-a-secret".to_string(),
        target_agent_id: "agent-b".to_string(),
        dpop_proof: "create-proof".to_string(),
        dpop_public_key: PUBLIC_KEY.to_string(),
        registry_url: Some(server.uri()),
    }
}

fn manager() -> RegistryTokenManager {
    RegistryTokenManager::new("https://registry.invalid")
}

#[tokio::test]
async fn test_fetches_once_then_serves_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens/create"))
        .and(header("agent-id", "agent-a"))
        .and(header("agent-secret", "agent-a-secret"))
        .and(header("dpop", "create-proof"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "target_agent_id": "agent-b",
            "dpop_proof": "create-proof"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T", "agent-b", 300)))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager();
    assert!(!manager.is_token_valid("agent-a", "agent-b"));

    assert_eq!(manager.get_token(params(&server)).await.unwrap(), "T");
    assert!(manager.is_token_valid("agent-a", "agent-b"));
    assert_eq!(manager.get_token(params(&server)).await.unwrap(), "T");
}

#[tokio::test]
async fn test_public_key_sent_without_pem_armor() {
    let server = MockServer::start().await;
    let bare_key = strip_pem_armor(PUBLIC_KEY);
    assert!(!bare_key.contains('\n'));

    Mock::given(method("POST"))
        .and(path("/tokens/create"))
        .and(header("dpop-public-key", bare_key.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T", "agent-b", 300)))
        .expect(1)
        .mount(&server)
        .await;

    manager().get_token(params(&server)).await.unwrap();
}

#[tokio::test]
async fn test_expired_response_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("stale", "agent-b", -10)))
        .expect(2)
        .mount(&server)
        .await;

    let manager = manager();
    assert_eq!(manager.get_token(params(&server)).await.unwrap(), "stale");
    assert!(!manager.is_token_valid("agent-a", "agent-b"));
    assert_eq!(manager.get_token(params(&server)).await.unwrap(), "stale");
}

#[tokio::test]
async fn test_401_is_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens/create"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager();
    let err = manager.get_token(params(&server)).await.unwrap_err();

    assert!(matches!(err, AgentAuthError::InvalidCredentials));
    assert!(!manager.is_token_valid("agent-a", "agent-b"));
}

#[tokio::test]
async fn test_other_status_is_registry_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens/create"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let err = manager().get_token(params(&server)).await.unwrap_err();

    match err {
        AgentAuthError::RegistryError { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("Expected registry error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_json_error_body_passed_through() {
    let server = MockServer::start().await;
    let body = serde_json::json!({"detail": "Target agent not found", "code": "E404"});
    Mock::given(method("POST"))
        .and(path("/tokens/create"))
        .respond_with(ResponseTemplate::new(404).set_body_json(body.clone()))
        .mount(&server)
        .await;

    let err = manager().get_token(params(&server)).await.unwrap_err();

    match err {
        AgentAuthError::RegistryError { status, message } => {
            assert_eq!(status, 404);
            let returned: serde_json::Value = serde_json::from_str(&message).unwrap();
            assert_eq!(returned, body);
        }
        other => panic!("Expected registry error, got {:?}", other),
    }
}
