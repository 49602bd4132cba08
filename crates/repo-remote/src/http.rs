//! Plain HTTP transport
//!
//! Request signing is left to a proxy in front of the server; this client
//! only speaks JSON over HTTP.

use std::io::Read;
use std::time::Duration;

use serde_json::Value;

use crate::error::{RestError, Result};
use crate::rest::RestApi;

const TIMEOUT: Duration = Duration::from_secs(60);

/// A [`RestApi`] over HTTP(S), rooted at a server URL such as
/// `https://chef.example.com/organizations/acme`.
pub struct HttpRestApi {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpRestApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(TIMEOUT).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method, url = %url, "HTTP request");
        self.agent
            .request(method, &url)
            .set("Accept", "application/json")
    }

    fn send_json(&self, method: &str, path: &str, body: Option<&Value>) -> Result<Value> {
        let request = self.request(method, path);
        let response = match body {
            Some(body) => request
                .set("Content-Type", "application/json")
                .send_string(&body.to_string()),
            None => request.call(),
        };
        let text = response
            .map_err(transport_error)?
            .into_string()
            .map_err(|e| RestError::Transport(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| RestError::Status {
            status: 200,
            message: format!("invalid JSON in response: {}", e),
        })
    }
}

impl RestApi for HttpRestApi {
    fn get(&self, path: &str) -> Result<Value> {
        self.send_json("GET", path, None)
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.send_json("PUT", path, Some(body))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send_json("POST", path, Some(body))
    }

    fn delete(&self, path: &str) -> Result<Value> {
        self.send_json("DELETE", path, None)
    }

    fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let response = self.request("GET", path).call().map_err(transport_error)?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| RestError::Transport(e.to_string()))?;
        Ok(bytes)
    }

    fn put_bytes(&self, path: &str, body: &[u8]) -> Result<()> {
        self.request("PUT", path)
            .set("Content-Type", "application/octet-stream")
            .send_bytes(body)
            .map_err(transport_error)?;
        Ok(())
    }
}

fn transport_error(error: ureq::Error) -> RestError {
    match error {
        ureq::Error::Status(status, response) => {
            let message = response.into_string().unwrap_or_default();
            RestError::from_status(status, message)
        }
        ureq::Error::Transport(transport) => RestError::Transport(transport.to_string()),
    }
}
