//! Shared HTTP transport for the info and exchange endpoints.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-POST client bound to one API base URL.
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body and parse the JSON response.
    ///
    /// 4xx responses become [`ClientError::Api`] with the endpoint's
    /// code/message pair; 5xx become [`ClientError::Server`] with the
    /// raw body.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "posting request");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = parse_error_body(&body);
            return Err(ClientError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

/// Pull the `code`/`msg` pair out of an error body; a body that is not
/// JSON (or carries neither field) is passed through as the message.
fn parse_error_body(body: &str) -> (String, String) {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => {
            let code = v
                .get("code")
                .map(|c| match c {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default();
            let message = v
                .get("msg")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            (code, message)
        }
        Err(_) => (String::new(), body.to_string()),
    }
}
