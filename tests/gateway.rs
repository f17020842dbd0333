use std::time::Duration;

use mspace::{
    Credentials, DeliveryReportRequest, ErrorCode, MessageId, MessageText, MspaceClient,
    MspaceError, ProviderFailure, Recipient, SendText, SenderId, classify,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> MspaceClient {
    MspaceClient::builder(Credentials::new("secret-key", "acme").unwrap())
        .base_url(server.uri())
        .build()
        .unwrap()
}

fn send_text(recipient: &str) -> SendText {
    SendText::new(
        Recipient::new(recipient).unwrap(),
        MessageText::new("Your code is 1234").unwrap(),
        SenderId::new("ACME").unwrap(),
    )
}

#[tokio::test]
async fn sendtext_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/smsapi/v2/sendtext"))
        .and(header("apikey", "secret-key"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .and(body_json(json!({
            "username": "acme",
            "senderId": "ACME",
            "recipient": "254712345678",
            "message": "Your code is 1234"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": [{
                "messageId": "4f2a",
                "recipient": "254712345678",
                "status": "111",
                "statusDescription": "Message sent"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .send_text(&send_text("+254 712 345 678"))
        .await
        .unwrap();

    assert_eq!(response.entries.len(), 1);
    let entry = &response.entries[0];
    assert!(entry.status.is_accepted());
    assert_eq!(entry.message_id.as_ref().unwrap().as_str(), "4f2a");
    assert_eq!(response.raw["message"][0]["statusDescription"], "Message sent");
}

#[tokio::test]
async fn non_success_status_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/smsapi/v2/sendtext"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = client(&server)
        .send_text(&send_text("254712345678"))
        .await
        .unwrap_err();

    match err {
        MspaceError::HttpStatus { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body.as_deref(), Some("bad key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn error_text_instead_of_entries_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/smsapi/v2/sendtext"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Insufficient balance" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .send_text(&send_text("254712345678"))
        .await
        .unwrap_err();

    assert!(matches!(err, MspaceError::Api { ref message } if message == "Insufficient balance"));
}

#[tokio::test]
async fn delivery_report_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/smsapi/v2/deliveryreport"))
        .and(header("apikey", "secret-key"))
        .and(body_json(json!({ "username": "acme", "messageId": "4f2a" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": [{
                "messageId": "4f2a",
                "recipient": "254712345678",
                "status": 1,
                "statusDescription": "Delivered"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let report = client(&server)
        .delivery_report(&DeliveryReportRequest::new(MessageId::new("4f2a").unwrap()))
        .await
        .unwrap();

    assert_eq!(report.recipient.as_deref(), Some("254712345678"));
    assert_eq!(report.status_description.as_deref(), Some("Delivered"));
    assert_eq!(report.raw["statusDescription"], "Delivered");
}

#[tokio::test]
async fn request_timeout_classifies_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/smsapi/v2/sendtext"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": [] }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let client = MspaceClient::builder(Credentials::new("secret-key", "acme").unwrap())
        .base_url(server.uri())
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let err = client
        .send_text(&send_text("254712345678"))
        .await
        .unwrap_err();

    assert!(matches!(err, MspaceError::Transport(_)));
    let failure = ProviderFailure::from(&err);
    assert!(matches!(failure, ProviderFailure::Timeout { .. }));
    let classified = classify(&failure, "sendtext");
    assert_eq!(classified.code, ErrorCode::Timeout);
    assert!(classified.retryable);
    assert_eq!(classified.http_status, 408);
}
