//! Token lifecycle: parsing sign-in replies and tracking expiration.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AylaError;

/// Margin before expiration at which a token counts as expiring soon.
/// Matches the proactive-refresh window the vendor mobile apps use.
pub const EXPIRING_SOON_MARGIN_SECS: i64 = 600;

/// Bearer credentials returned by the sign-in and refresh calls.
#[derive(Debug, Clone)]
pub struct Authorization {
    /// Token attached to every authenticated call.
    pub access_token: String,
    /// Token exchanged for a fresh access token.
    pub refresh_token: String,
    /// Instant at which the access token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

impl Authorization {
    /// Build the credential store from a sign-in or refresh response.
    ///
    /// The user-field service answers 404 when the application credentials
    /// are wrong and 401 when the user credentials are.
    pub(crate) fn from_response(status: u16, body: Value) -> Result<Self, AylaError> {
        match status {
            200 => {
                let login: LoginResult = serde_json::from_value(body)?;
                Ok(Self {
                    access_token: login.access_token,
                    refresh_token: login.refresh_token,
                    expires_at: Utc::now() + Duration::seconds(login.expires_in),
                })
            }
            404 => Err(AylaError::Auth(format!(
                "{} (confirm app_id and app_secret are correct)",
                error_message(&body)
            ))),
            401 => Err(AylaError::Auth(error_message(&body))),
            other => Err(AylaError::Auth(format!(
                "unexpected sign-in status {}: {}",
                other,
                error_message(&body)
            ))),
        }
    }

    /// True once the expiration instant has passed.
    pub fn expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// True inside the proactive-refresh margin.
    pub fn expiring_soon(&self) -> bool {
        Utc::now() > self.expires_at - Duration::seconds(EXPIRING_SOON_MARGIN_SECS)
    }

    /// Value for the `Authorization` header on authenticated calls.
    pub fn auth_header(&self) -> String {
        format!("auth_token {}", self.access_token)
    }
}

/// Pull the vendor error message out of a reply body, falling back to the
/// raw JSON when the shape is unfamiliar.
pub(crate) fn error_message(body: &Value) -> String {
    serde_json::from_value::<ErrorBody>(body.clone())
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}
