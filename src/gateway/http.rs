//! Thin HTTP wrapper around the provider API.
//!
//! Every request body the provider accepts is form-encoded and every
//! response is JSON. Failures are surfaced immediately as Transport errors;
//! callers decide whether to re-submit, nothing here retries on its own.

use crate::error::{GatewayError, GatewayResult};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

/// Per-request authentication scheme.
#[derive(Debug, Clone)]
pub enum Auth {
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

#[derive(Debug, Clone)]
pub struct GatewayHttpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GatewayHttpClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        GatewayHttpClient {
            client: Client::new(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Joins a path onto the configured base URL. The base is expected to
    /// carry a trailing slash; one is inserted when missing.
    pub fn endpoint(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.base_url.ends_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub async fn post_form<T: Serialize + ?Sized>(
        &self,
        path: &str,
        auth: &Auth,
        form: &T,
    ) -> GatewayResult<JsonValue> {
        let url = self.endpoint(path);
        debug!(%url, "posting form request to provider");

        let request = self.apply_auth(self.client.post(&url), auth);
        let response = request
            .timeout(self.timeout)
            .form(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        self.read_json(response).await
    }

    pub async fn get(&self, path: &str, auth: &Auth) -> GatewayResult<JsonValue> {
        let url = self.endpoint(path);
        self.get_absolute(&url, auth).await
    }

    /// GET against a fully-qualified URL outside the configured base. Used
    /// for the separately-hosted transaction status endpoint.
    pub async fn get_absolute(&self, url: &str, auth: &Auth) -> GatewayResult<JsonValue> {
        debug!(%url, "sending GET request to provider");

        let request = self.apply_auth(self.client.get(url), auth);
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        self.read_json(response).await
    }

    fn apply_auth(
        &self,
        builder: reqwest::RequestBuilder,
        auth: &Auth,
    ) -> reqwest::RequestBuilder {
        match auth {
            Auth::None => builder,
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
        }
    }

    async fn read_json(&self, response: reqwest::Response) -> GatewayResult<JsonValue> {
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        serde_json::from_str(&body).map_err(|_| GatewayError::Transport {
            message: format!(
                "provider returned non-JSON body (HTTP {}): {}",
                status.as_u16(),
                truncate(&body, 200)
            ),
            timed_out: false,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> GatewayError {
    GatewayError::Transport {
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}

fn truncate(body: &str, limit: usize) -> &str {
    match body.char_indices().nth(limit) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_with_and_without_trailing_slash() {
        let with_slash = GatewayHttpClient::new("https://api.example.com/Transaction/", 30);
        assert_eq!(
            with_slash.endpoint("token"),
            "https://api.example.com/Transaction/token"
        );
        assert_eq!(
            with_slash.endpoint("/customer/validate"),
            "https://api.example.com/Transaction/customer/validate"
        );

        let without_slash = GatewayHttpClient::new("https://api.example.com/Transaction", 30);
        assert_eq!(
            without_slash.endpoint("token"),
            "https://api.example.com/Transaction/token"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 200), "hello");
        assert_eq!(truncate("hello world", 5), "hello");
    }
}
