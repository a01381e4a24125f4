//! REST collaborator
//!
//! The session core only needs three calls from the platform's REST API:
//! gateway endpoint discovery, password login, and the TOTP follow-up when
//! the account has multi-factor authentication enabled. Everything else the
//! REST surface offers is out of scope here.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Default API base URL
pub const DEFAULT_API_BASE: &str = "https://api.chat.example.com/v1";

/// REST errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Building the client or performing the request failed
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("unexpected status {status} from {endpoint}")]
    Status {
        status: StatusCode,
        endpoint: String,
    },
}

/// Result of a login or TOTP call
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Authentication token; empty while MFA is still pending
    #[serde(default)]
    pub token: String,

    /// Whether the account requires a one-time code to finish logging in
    #[serde(default)]
    pub mfa: bool,

    /// Ticket to echo back in the TOTP call
    #[serde(default)]
    pub ticket: Option<String>,
}

/// Thin REST client for the calls the gateway core consumes
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Request timeout for every REST call
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a client against the default API base
    ///
    /// An empty token makes an anonymous client, used for login.
    pub fn new(token: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_base_url(DEFAULT_API_BASE, token)
    }

    /// Create a client against a custom API base
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// The API base this client talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Discover the websocket gateway base URL
    pub async fn gateway_url(&self) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        struct GatewayInfo {
            url: String,
        }

        let info: GatewayInfo = self.get_json("/gateway").await?;
        Ok(info.url)
    }

    /// Log in with email and password
    ///
    /// When the account has MFA enabled the response carries `mfa = true`
    /// and a ticket instead of a token; follow up with [`ApiClient::totp`].
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.post_json(
            "/auth/login",
            &json!({"email": email, "password": password}),
        )
        .await
    }

    /// Finish an MFA login with a one-time code
    pub async fn totp(&self, code: &str, ticket: &str) -> Result<LoginResponse, ApiError> {
        self.post_json("/auth/totp", &json!({"code": code, "ticket": ticket}))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.authorize(self.http.get(&url));
        Self::read_json(request, path).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.authorize(self.http.post(&url)).json(body);
        Self::read_json(request, path).await
    }

    async fn read_json<T: DeserializeOwned>(
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            tracing::debug!(endpoint, status = %status, "api request failed");
            return Err(ApiError::Status {
                status,
                endpoint: endpoint.to_string(),
            });
        }

        Ok(response.json().await?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.header(reqwest::header::AUTHORIZATION, self.token.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = ApiClient::with_base_url("https://api.example.com/v1/", "").unwrap();
        assert_eq!(api.base_url(), "https://api.example.com/v1");
    }

    #[test]
    fn test_login_response_full() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"token": "tok", "mfa": false}"#).unwrap();
        assert_eq!(response.token, "tok");
        assert!(!response.mfa);
        assert!(response.ticket.is_none());
    }

    #[test]
    fn test_login_response_mfa_pending() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"mfa": true, "ticket": "t-123"}"#).unwrap();
        assert!(response.token.is_empty());
        assert!(response.mfa);
        assert_eq!(response.ticket.as_deref(), Some("t-123"));
    }
}
