//! Remote login collaborator and the login result types.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::ApiError;
use crate::settings::ClientSettings;

pub const LOGIN_ROUTE: &str = "/auth/login";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";
pub const UNAUTHORIZED_STATUS: u16 = 401;

/// Authenticated user profile. Fields the client does not know about are kept
/// in `profile` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("unknown user")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub user: User,
    #[serde(default, alias = "token", skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginResult {
    Success(AuthPayload),
    Failure { status: u16, message: String },
}

impl LoginResult {
    /// Result reported when the login call itself faulted.
    pub fn invalid_credentials() -> Self {
        LoginResult::Failure {
            status: UNAUTHORIZED_STATUS,
            message: INVALID_CREDENTIALS_MESSAGE.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoginResult::Success(_))
    }

    pub fn to_envelope(&self) -> LoginEnvelope {
        self.clone().into()
    }
}

/// `{ success, data, message, status }` as exchanged with the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<AuthPayload>,
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<LoginResult> for LoginEnvelope {
    fn from(result: LoginResult) -> Self {
        match result {
            LoginResult::Success(payload) => LoginEnvelope {
                success: true,
                data: Some(payload),
                message: None,
                status: Some(200),
            },
            LoginResult::Failure { status, message } => LoginEnvelope {
                success: false,
                data: None,
                message: Some(message),
                status: Some(status),
            },
        }
    }
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `Ok` covers both outcomes the server reports; `Err` means the call faulted.
    async fn login(&self, identifier: &str, secret: &str) -> Result<LoginResult, ApiError>;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    url: String,
}

impl HttpAuthApi {
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("freightdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: settings.endpoint(LOGIN_ROUTE),
        })
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, identifier: &str, secret: &str) -> Result<LoginResult, ApiError> {
        debug!(url = %self.url, "sending login request");
        let res = self
            .client
            .post(&self.url)
            .json(&LoginRequest {
                identifier,
                password: secret,
            })
            .send()
            .await?;
        let status = res.status();
        let body = res.bytes().await?;
        interpret_login_response(status, &body)
    }
}

/// Maps an HTTP response to a login outcome. A body that is not a login
/// envelope is a fault, not an explicit failure.
pub fn interpret_login_response(status: StatusCode, body: &[u8]) -> Result<LoginResult, ApiError> {
    let envelope: LoginEnvelope =
        serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    if envelope.success && status.is_success() {
        return match envelope.data {
            Some(payload) => Ok(LoginResult::Success(payload)),
            None => Err(ApiError::Decode("login succeeded without data".into())),
        };
    }
    let status_code = envelope.status.unwrap_or_else(|| {
        if status.is_success() {
            UNAUTHORIZED_STATUS
        } else {
            status.as_u16()
        }
    });
    let message = envelope.message.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Login failed")
            .to_string()
    });
    Ok(LoginResult::Failure {
        status: status_code,
        message,
    })
}
