use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GatewayClient {
    let config = GatewayConfig {
        base_url: format!("{}/api/v1/webhook/", server.uri()),
        api_key: "test-key".to_string(),
        timeout_secs: 5,
        ..Default::default()
    };
    GatewayClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_find_contact_returns_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/webhook/subscriber/get_by_phone/5531999999999/"))
        .and(header("API-KEY", "test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 4242, "full_name": "Maria"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let id = client.find_contact("5531999999999").await.unwrap();
    assert_eq!(id, Some(4242));
}

#[tokio::test]
async fn test_find_contact_not_found_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.find_contact("5531999999999").await.unwrap(), None);
}

#[tokio::test]
async fn test_find_contact_server_error_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.find_contact("5531999999999").await.unwrap_err();
    assert!(matches!(err, ConfirmaError::GatewayCallFailed(_)));
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_create_contact_posts_names() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/webhook/subscriber/"))
        .and(body_json(json!({
            "phone": "5531999999999",
            "first_name": "Maria",
            "last_name": "da Silva"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let id = client
        .create_contact("5531999999999", "Maria", "da Silva")
        .await
        .unwrap();
    assert_eq!(id, 7);
}

#[tokio::test]
async fn test_create_contact_without_id_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.create_contact("55", "A", "").await.is_err());
}

#[tokio::test]
async fn test_send_message_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/webhook/subscriber/7/send_message/"))
        .and(header("API-KEY", "test-key"))
        .and(body_json(json!({"type": "text", "value": "Olá"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.send_message(7, "Olá").await.unwrap();
}

#[tokio::test]
async fn test_send_message_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid subscriber"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.send_message(7, "hi").await.unwrap_err();
    assert!(err.to_string().contains("invalid subscriber"));
}

#[tokio::test]
async fn test_send_flow_with_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/webhook/subscriber/7/send_flow/"))
        .and(body_json(json!({"flow": 99})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.send_flow(7, Some(99)).await.unwrap();
}

#[tokio::test]
async fn test_tag_and_custom_field_paths() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/webhook/subscriber/7/tags/15/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/webhook/subscriber/7/custom_fields/3/"))
        .and(body_json(json!({"value": "100"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.add_tag(7, 15).await.unwrap();
    client.set_custom_field(7, 3, "100").await.unwrap();
}

#[tokio::test]
async fn test_unreachable_gateway_fails() {
    let config = GatewayConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 1,
        ..Default::default()
    };
    let client = GatewayClient::new(&config).unwrap();
    let err = client.send_message(1, "x").await.unwrap_err();
    assert!(matches!(err, ConfirmaError::GatewayCallFailed(_)));
}
