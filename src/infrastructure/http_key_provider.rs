use crate::domain::ports::EphemeralKeyProvider;
use crate::domain::session::KeyRequest;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use reqwest::{Client, Request};
use serde_json::Value;
use tracing::error;
use url::Url;

const KEY_PATH: &str = "ephemeral-key";
const API_KEY_HEADER: &str = "Token-Transit-Api-Key";
const API_VERSION_HEADER: &str = "Token-Transit-Api-Version";
const SESSION_HEADER: &str = "token-transit-session-id";
const SESSION_PREFIX: &str = "user_session_id";
const API_VERSION_FIELD: &str = "stripe_api_version";

/// Fetches ephemeral keys from the merchant backend over HTTP.
///
/// `POST {endpoint}/ephemeral-key` with partner credentials in headers, the
/// session id in `token-transit-session-id` as `user_session_id=<id>`, and the
/// requested API version form-encoded in the body. The JSON response is passed
/// on untouched.
#[derive(Debug, Clone)]
pub struct HttpKeyProvider {
    client: Client,
    endpoint: Url,
}

impl HttpKeyProvider {
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    fn key_url(&self) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PaymentError::validation(format!("Invalid key endpoint: {}", self.endpoint))
            })?
            .pop_if_empty()
            .push(KEY_PATH);
        Ok(url)
    }

    pub fn build_request(&self, request: &KeyRequest) -> Result<Request> {
        let mut builder = self
            .client
            .post(self.key_url()?)
            .form(&[(API_VERSION_FIELD, request.api_version.as_str())]);

        if let Some(key) = &request.partner_api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        if let Some(version) = &request.partner_api_version {
            builder = builder.header(API_VERSION_HEADER, version);
        }
        if let Some(session_id) = &request.session_id {
            builder = builder.header(SESSION_HEADER, format!("{SESSION_PREFIX}={session_id}"));
        }

        builder
            .build()
            .map_err(|e| PaymentError::Provider(e.to_string()))
    }
}

#[async_trait]
impl EphemeralKeyProvider for HttpKeyProvider {
    async fn fetch_ephemeral_key(&self, request: KeyRequest) -> Result<Value> {
        let http_request = self.build_request(&request)?;
        let response = self
            .client
            .execute(http_request)
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Ephemeral key request rejected");
            return Err(PaymentError::Provider(format!(
                "Ephemeral key request failed with {status}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PaymentError::Provider(format!("Invalid ephemeral key response: {e}")))
    }
}
