//! Client layer: orchestrates transport calls and maps transport ↔ domain.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::BoxFuture;
use crate::domain::{
    ApiKey, DeliveryReport, DeliveryReportRequest, SendText, SendTextResponse, Username,
    ValidationError,
};
use crate::transport::TransportError;

pub const DEFAULT_BASE_URL: &str = "https://api.mspace.co.ke";
const SEND_TEXT_PATH: &str = "smsapi/v2/sendtext";
const DELIVERY_REPORT_PATH: &str = "smsapi/v2/deliveryreport";

#[derive(Debug, Clone)]
pub(crate) struct HttpResponse {
    pub(crate) status: u16,
    pub(crate) body: String,
}

pub(crate) trait HttpTransport: Send + Sync {
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        api_key: &'a ApiKey,
        body: serde_json::Value,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>>;
}

#[derive(Debug, Clone)]
struct ReqwestTransport {
    client: reqwest::Client,
}

impl HttpTransport for ReqwestTransport {
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        api_key: &'a ApiKey,
        body: serde_json::Value,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
        Box::pin(async move {
            let response = self
                .client
                .post(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .header(ApiKey::HEADER, api_key.as_str())
                .json(&body)
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok(HttpResponse { status, body })
        })
    }
}

#[derive(Debug, Clone)]
/// Credentials for Mspace API calls: the `apikey` header plus the account `username`
/// that goes into every request body.
pub struct Credentials {
    api_key: ApiKey,
    username: Username,
}

impl Credentials {
    /// Validate and pair an API key with its account username.
    pub fn new(
        api_key: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            api_key: ApiKey::new(api_key)?,
            username: Username::new(username)?,
        })
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub fn username(&self) -> &Username {
        &self.username
    }
}

#[derive(Debug, thiserror::Error)]
/// Errors returned by [`MspaceClient`].
///
/// This error preserves:
/// - HTTP-level failures (non-2xx status or transport failures),
/// - API-level failures (the gateway answered with an error text instead of entries),
/// - validation/parse failures.
pub enum MspaceError {
    /// HTTP client / transport failure (DNS, TLS, connect, timeouts, etc).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),

    /// Non-successful HTTP status code returned by the server.
    #[error("unexpected HTTP status: {status}")]
    HttpStatus { status: u16, body: Option<String> },

    /// Mspace returned an error text instead of delivery entries.
    #[error("API error: {message}")]
    Api { message: String },

    /// Response body could not be parsed as the expected format.
    #[error("parse error: {0}")]
    Parse(#[source] Box<dyn StdError + Send + Sync>),

    /// One of the domain constructors rejected an invalid value.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<TransportError> for MspaceError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Provider { text } => Self::Api { message: text },
            other => Self::Parse(Box::new(other)),
        }
    }
}

#[derive(Debug, Clone)]
/// Builder for [`MspaceClient`].
///
/// Use this when you need to customize the endpoints, timeout, or user-agent.
pub struct MspaceClientBuilder {
    credentials: Credentials,
    base_url: String,
    send_endpoint: Option<String>,
    report_endpoint: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl MspaceClientBuilder {
    /// Create a builder with the default host and no timeout/user-agent override.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_BASE_URL.to_owned(),
            send_endpoint: None,
            report_endpoint: None,
            timeout: None,
            user_agent: None,
        }
    }

    /// Override the gateway host; both endpoint paths are resolved against it.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the full URL for `sendtext`.
    pub fn send_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.send_endpoint = Some(endpoint.into());
        self
    }

    /// Override the full URL for `deliveryreport`.
    pub fn report_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.report_endpoint = Some(endpoint.into());
        self
    }

    /// Set an HTTP client timeout applied to each request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the HTTP `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build a [`MspaceClient`].
    pub fn build(self) -> Result<MspaceClient, MspaceError> {
        let send_endpoint = match self.send_endpoint {
            Some(endpoint) => endpoint,
            None => join_endpoint(&self.base_url, SEND_TEXT_PATH)?,
        };
        let report_endpoint = match self.report_endpoint {
            Some(endpoint) => endpoint,
            None => join_endpoint(&self.base_url, DELIVERY_REPORT_PATH)?,
        };

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }

        let client = builder
            .build()
            .map_err(|err| MspaceError::Transport(Box::new(err)))?;

        Ok(MspaceClient {
            credentials: self.credentials,
            send_endpoint,
            report_endpoint,
            http: Arc::new(ReqwestTransport { client }),
        })
    }
}

fn join_endpoint(base_url: &str, path: &str) -> Result<String, ValidationError> {
    let invalid = || ValidationError::InvalidEndpoint {
        input: base_url.to_owned(),
    };
    let mut base = url::Url::parse(base_url).map_err(|_| invalid())?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(path)
        .map(String::from)
        .map_err(|_| invalid())
}

#[derive(Clone)]
/// High-level Mspace client.
///
/// This type orchestrates request validation, JSON encoding, and response parsing.
/// By default it talks to:
/// - `https://api.mspace.co.ke/smsapi/v2/sendtext` for sending messages
/// - `https://api.mspace.co.ke/smsapi/v2/deliveryreport` for delivery reports
pub struct MspaceClient {
    credentials: Credentials,
    send_endpoint: String,
    report_endpoint: String,
    http: Arc<dyn HttpTransport>,
}

impl MspaceClient {
    /// Create a client using the default endpoints.
    ///
    /// For more customization, use [`MspaceClient::builder`].
    pub fn new(credentials: Credentials) -> Result<Self, MspaceError> {
        MspaceClientBuilder::new(credentials).build()
    }

    /// Start building a client with custom settings.
    pub fn builder(credentials: Credentials) -> MspaceClientBuilder {
        MspaceClientBuilder::new(credentials)
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Resolved `sendtext` URL.
    pub fn send_endpoint(&self) -> &str {
        &self.send_endpoint
    }

    pub fn report_endpoint(&self) -> &str {
        &self.report_endpoint
    }

    /// Send one message to one recipient.
    ///
    /// The recipient goes out digits-only. A 2xx response only means the request
    /// was understood; check each entry's status for acceptance.
    ///
    /// Errors:
    /// - [`MspaceError::Transport`] when the request never got an answer,
    /// - [`MspaceError::HttpStatus`] for non-2xx HTTP responses,
    /// - [`MspaceError::Api`] when the body carries an error text instead of entries,
    /// - [`MspaceError::Parse`] for malformed bodies.
    pub async fn send_text(&self, request: &SendText) -> Result<SendTextResponse, MspaceError> {
        let body = crate::transport::encode_send_text_body(self.credentials.username(), request);
        let response = self.post(&self.send_endpoint, body).await?;
        debug!(
            recipient = request.recipient().digits(),
            status = response.status,
            "sendtext response received"
        );
        Ok(crate::transport::decode_send_text_response(&response.body)?)
    }

    /// Look up the delivery report for a message id.
    ///
    /// Errors mirror [`MspaceClient::send_text`].
    pub async fn delivery_report(
        &self,
        request: &DeliveryReportRequest,
    ) -> Result<DeliveryReport, MspaceError> {
        let body =
            crate::transport::encode_delivery_report_body(self.credentials.username(), request);
        let response = self.post(&self.report_endpoint, body).await?;
        Ok(crate::transport::decode_delivery_report_response(
            &response.body,
        )?)
    }

    async fn post(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<HttpResponse, MspaceError> {
        let response = self
            .http
            .post_json(url, self.credentials.api_key(), body)
            .await
            .map_err(MspaceError::Transport)?;

        if !(200..=299).contains(&response.status) {
            let body = if response.body.trim().is_empty() {
                None
            } else {
                Some(response.body)
            };
            return Err(MspaceError::HttpStatus {
                status: response.status,
                body,
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Scripted transport: pops one reply per call and records every request.
    #[derive(Clone, Default)]
    pub(crate) struct FakeTransport {
        state: Arc<Mutex<FakeTransportState>>,
    }

    #[derive(Default)]
    struct FakeTransportState {
        requests: Vec<RecordedRequest>,
        replies: VecDeque<FakeReply>,
    }

    #[derive(Debug, Clone)]
    pub(crate) struct RecordedRequest {
        pub(crate) url: String,
        pub(crate) api_key: String,
        pub(crate) body: serde_json::Value,
    }

    pub(crate) enum FakeReply {
        Response(u16, String),
        ConnectionRefused,
    }

    impl FakeTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn reply(self, status: u16, body: impl Into<String>) -> Self {
            self.push(FakeReply::Response(status, body.into()));
            self
        }

        pub(crate) fn refuse(self) -> Self {
            self.push(FakeReply::ConnectionRefused);
            self
        }

        pub(crate) fn push(&self, reply: FakeReply) {
            self.state.lock().unwrap().replies.push_back(reply);
        }

        pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
            self.state.lock().unwrap().requests.clone()
        }

        pub(crate) fn calls(&self) -> usize {
            self.state.lock().unwrap().requests.len()
        }
    }

    impl HttpTransport for FakeTransport {
        fn post_json<'a>(
            &'a self,
            url: &'a str,
            api_key: &'a ApiKey,
            body: serde_json::Value,
        ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
            Box::pin(async move {
                let reply = {
                    let mut state = self.state.lock().unwrap();
                    state.requests.push(RecordedRequest {
                        url: url.to_owned(),
                        api_key: api_key.as_str().to_owned(),
                        body,
                    });
                    state.replies.pop_front()
                };
                match reply {
                    Some(FakeReply::Response(status, body)) => Ok(HttpResponse { status, body }),
                    Some(FakeReply::ConnectionRefused) | None => Err(Box::new(
                        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
                    )
                        as Box<dyn StdError + Send + Sync>),
                }
            })
        }
    }

    pub(crate) fn make_client(transport: FakeTransport) -> MspaceClient {
        MspaceClient {
            credentials: Credentials::new("test_key", "acme").unwrap(),
            send_endpoint: "https://example.invalid/smsapi/v2/sendtext".to_owned(),
            report_endpoint: "https://example.invalid/smsapi/v2/deliveryreport".to_owned(),
            http: Arc::new(transport),
        }
    }

    pub(crate) fn accepted_body(recipient: &str, message_id: &str) -> String {
        serde_json::json!({
            "message": [{
                "messageId": message_id,
                "recipient": recipient,
                "status": 111,
                "statusDescription": "Message sent"
            }]
        })
        .to_string()
    }
}
