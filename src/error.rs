//! Library error type.

use thiserror::Error;

/// Errors surfaced by the Ayla client and device operations.
#[derive(Debug, Error)]
pub enum AylaError {
    /// Sign-in or refresh rejected, or an authenticated call answered 401.
    #[error("error authenticating to Ayla Networks: {0}")]
    Auth(String),

    /// The token is inside the expiry margin. Refresh and retry.
    #[error("Ayla Networks API authentication expired, re-authenticate and retry")]
    AuthExpiring,

    /// Authenticated call attempted without a valid token.
    #[error("Ayla Networks API not authenticated, authenticate first and retry")]
    NotAuthed,

    /// Attempted to set a property the vendor marks read-only.
    #[error("property {0} is read only")]
    ReadOnlyProperty(String),

    /// Unknown device, property or other missing resource.
    #[error("{0} not found")]
    NotFound(String),

    /// The service answered with an unexpected status or body shape.
    #[error("unexpected Ayla API response: {0}")]
    Api(String),

    /// Network-level failure from the HTTP client.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected schema.
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Device model is not handled by the requested typed wrapper.
    #[error("device is not supported by this client")]
    DeviceNotSupported,

    /// The device lacks the capability behind the requested setting.
    #[error("setting not supported: {0}")]
    SettingNotSupported(String),

    /// The cloud reports the device offline; control calls are refused.
    #[error("device is offline")]
    DeviceOffline,
}
