//! End-to-end tests: agent A protects a request, agent B verifies it, both
//! against the same mock registry

use agent_auth::dpop::decode_proof;
use agent_auth::AgentAuthError;
use agent_auth_tests::{agent_auth, identity, token_body};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing_test::traced_test;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_create(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/tokens/create"))
        .and(header("agent-id", "agent-a"))
        .and(header_exists("dpop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T", "agent-b", 300)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn test_protect_reuses_token_then_verifies() {
    let server = MockServer::start().await;
    mount_create(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/tokens/verify"))
        .and(header("authorization", "Bearer T"))
        .and(header("target-agent-id", "agent-b"))
        .and(header_exists("dpop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "agent_id": "agent-a",
            "target_agent_id": "agent-b"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent_a = agent_auth(identity("agent-a"), &server.uri());
    let agent_b = agent_auth(identity("agent-b"), &server.uri());

    let first = agent_a
        .protect_request("GET", "http://agent-b.local/data", "agent-b", None)
        .await
        .unwrap();
    assert!(agent_a.has_valid_token("agent-b"));

    let second = agent_a
        .protect_request("GET", "http://agent-b.local/data", "agent-b", None)
        .await
        .unwrap();

    assert_eq!(header_str(&first, "authorization"), "Bearer T");
    assert_eq!(header_str(&second, "authorization"), "Bearer T");
    assert_ne!(header_str(&first, "dpop"), header_str(&second, "dpop"));

    assert!(agent_b
        .verify_request("GET", "http://agent-b.local/data", &second)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_proofs_bind_method_and_urls() {
    let server = MockServer::start().await;
    mount_create(&server, 1).await;

    let agent_a = agent_auth(identity("agent-a"), &server.uri());
    let headers = agent_a
        .protect_request("post", "http://agent-b.local:80/run?debug=1", "agent-b", None)
        .await
        .unwrap();

    let (proof_header, claims) = decode_proof(header_str(&headers, "dpop")).unwrap();
    assert_eq!(proof_header.typ.as_deref(), Some("dpop+jwt"));
    assert_eq!(claims.htm, "POST");
    assert_eq!(claims.htu, "http://agent-b.local/run");
    assert_eq!(claims.exp - claims.iat, 300);

    let requests = server.received_requests().await.unwrap();
    let create_proof = requests[0].headers.get("dpop").unwrap().to_str().unwrap();
    let (_, create_claims) = decode_proof(create_proof).unwrap();
    assert_eq!(create_claims.htm, "POST");
    assert_eq!(
        create_claims.htu,
        format!("{}/tokens/create", server.uri().replacen("http://", "https://", 1))
    );
}

#[tokio::test]
async fn test_protect_preserves_caller_headers() {
    let server = MockServer::start().await;
    mount_create(&server, 1).await;

    let mut caller = HeaderMap::new();
    caller.insert("x-trace-id", HeaderValue::from_static("trace-1"));
    caller.insert("target-agent-id", HeaderValue::from_static("someone-else"));

    let agent_a = agent_auth(identity("agent-a"), &server.uri());
    let headers = agent_a
        .protect_request("GET", "http://agent-b.local/data", "agent-b", Some(&caller))
        .await
        .unwrap();

    assert_eq!(header_str(&headers, "x-trace-id"), "trace-1");
    assert_eq!(header_str(&headers, "target-agent-id"), "agent-b");
    assert_eq!(header_str(&caller, "target-agent-id"), "someone-else");
}

#[tokio::test]
#[traced_test]
async fn test_create_401_rejects_protect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens/create"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(2)
        .mount(&server)
        .await;

    let agent_a = agent_auth(identity("agent-a"), &server.uri());

    let err = agent_a.get_interaction_token("agent-b", None).await.unwrap_err();
    assert!(matches!(err, AgentAuthError::InvalidCredentials));

    let err = agent_a
        .protect_request("GET", "http://agent-b.local/data", "agent-b", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentAuthError::InvalidCredentials));
    assert!(!agent_a.has_valid_token("agent-b"));

    assert!(logs_contain("Agent auth failed"));
    assert!(!logs_contain("agent-a-secret"));
}

#[tokio::test]
async fn test_verify_without_dpop_skips_registry() {
    let server = MockServer::start().await;
    let agent_b = agent_auth(identity("agent-b"), &server.uri());

    let mut inbound = HeaderMap::new();
    inbound.insert("authorization", HeaderValue::from_static("Bearer T"));

    let err = agent_b
        .verify_request("GET", "http://agent-b.local/data", &inbound)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentAuthError::MissingDpopHeader));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_verify_rejected_by_registry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tokens/verify"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid token"))
        .expect(1)
        .mount(&server)
        .await;

    let agent_b = agent_auth(identity("agent-b"), &server.uri());

    let mut inbound = HeaderMap::new();
    inbound.insert("authorization", HeaderValue::from_static("Bearer forged"));
    inbound.insert("dpop", HeaderValue::from_static("forged-proof"));

    let err = agent_b
        .verify_request("GET", "http://agent-b.local/data", &inbound)
        .await
        .unwrap_err();

    assert!(matches!(err, AgentAuthError::InvalidCredentials));
    assert!(err.is_auth_failure());
    assert_eq!(err.status_code(), 401);
}
