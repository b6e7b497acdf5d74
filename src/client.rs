//! Ayla cloud API client: sign-in, token refresh and account-level calls.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::auth::{error_message, Authorization};
use crate::device::{DeviceEntry, TypedDevice};
use crate::error::AylaError;
use crate::region::Region;
use crate::Result;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

struct ClientInner {
    email: String,
    password: String,
    app_id: String,
    app_secret: String,
    region: Region,
    http: reqwest::Client,
    auth: RwLock<Option<Authorization>>,
}

/// Handle to the Ayla cloud API.
///
/// Cheap to clone; clones share the HTTP connection pool and the token
/// store, so a refresh performed through one handle is visible to all of
/// them (device objects hold such a clone).
#[derive(Clone)]
pub struct AylaClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for AylaClient {
    /// Credentials stay out of debug output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AylaClient")
            .field("email", &self.inner.email)
            .field("app_id", &self.inner.app_id)
            .field("region", &self.inner.region)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AylaClient`].
pub struct AylaClientBuilder {
    email: String,
    password: String,
    app_id: String,
    app_secret: String,
    region: Region,
    timeout: Duration,
    http: Option<reqwest::Client>,
}

impl AylaClientBuilder {
    /// Select the cloud region (US/global by default).
    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Per-request timeout for the built-in HTTP client (default 10 s).
    /// Ignored when a custom client is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a caller-provided `reqwest::Client` instead of building one.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Build the client. Fails only if the HTTP client cannot be
    /// constructed.
    pub fn build(self) -> Result<AylaClient> {
        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder().timeout(self.timeout).build()?,
        };
        Ok(AylaClient {
            inner: Arc::new(ClientInner {
                email: self.email,
                password: self.password,
                app_id: self.app_id,
                app_secret: self.app_secret,
                region: self.region,
                http,
                auth: RwLock::new(None),
            }),
        })
    }
}

#[derive(Debug, Deserialize)]
struct DeviceWrapper {
    device: DeviceEntry,
}

impl AylaClient {
    /// Client for the US/global cloud with default settings.
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Result<Self> {
        Self::builder(email, password, app_id, app_secret).build()
    }

    /// Start building a client from the account and application credentials.
    /// The username must be the account email address.
    pub fn builder(
        email: impl Into<String>,
        password: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> AylaClientBuilder {
        AylaClientBuilder {
            email: email.into(),
            password: password.into(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            region: Region::default(),
            timeout: DEFAULT_TIMEOUT,
            http: None,
        }
    }

    /// The region this client talks to.
    pub fn region(&self) -> Region {
        self.inner.region
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    fn user_url(&self, path: &str) -> String {
        format!("{}{}", self.inner.region.user_field_url(), path)
    }

    pub(crate) fn ads_url(&self, path: &str) -> String {
        format!("{}{}", self.inner.region.ads_url(), path)
    }

    fn rules_url(&self, path: &str) -> String {
        format!("{}{}", self.inner.region.rulesservice_url(), path)
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    fn login_payload(&self) -> Value {
        json!({
            "user": {
                "email": self.inner.email,
                "password": self.inner.password,
                "application": {
                    "app_id": self.inner.app_id,
                    "app_secret": self.inner.app_secret,
                },
            }
        })
    }

    async fn request_credentials(&self, path: &str, payload: Value) -> Result<()> {
        let resp = self
            .inner
            .http
            .post(self.user_url(path))
            .json(&payload)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body: Value = resp.json().await?;
        let auth = Authorization::from_response(status, body)?;
        tracing::debug!(expires_at = %auth.expires_at, "Ayla access token acquired");
        *self.inner.auth.write().await = Some(auth);
        Ok(())
    }

    /// Exchange the account credentials for an access token.
    pub async fn sign_in(&self) -> Result<()> {
        self.request_credentials("/users/sign_in.json", self.login_payload())
            .await
    }

    /// Exchange the stored refresh token for a fresh access token.
    pub async fn refresh_auth(&self) -> Result<()> {
        let refresh_token = {
            let auth = self.inner.auth.read().await;
            auth.as_ref()
                .map(|a| a.refresh_token.clone())
                .ok_or(AylaError::NotAuthed)?
        };
        self.request_credentials(
            "/users/refresh_token.json",
            json!({"user": {"refresh_token": refresh_token}}),
        )
        .await
    }

    /// Invalidate the access token server-side and clear the local state.
    /// Local state is cleared even when the request fails.
    pub async fn sign_out(&self) -> Result<()> {
        let access_token = {
            let auth = self.inner.auth.read().await;
            match auth.as_ref() {
                Some(a) => a.access_token.clone(),
                None => return Ok(()),
            }
        };
        let payload = json!({"user": {"access_token": access_token}});
        if let Err(e) = self
            .inner
            .http
            .post(self.user_url("/users/sign_out.json"))
            .json(&payload)
            .send()
            .await
        {
            tracing::warn!("sign-out request failed: {e}");
        }
        *self.inner.auth.write().await = None;
        Ok(())
    }

    /// When the current token expires, or `None` before sign-in.
    pub async fn auth_expiration(&self) -> Option<DateTime<Utc>> {
        let auth = self.inner.auth.read().await;
        auth.as_ref().map(|a| a.expires_at)
    }

    /// True when there is no token or it has already expired.
    pub async fn token_expired(&self) -> bool {
        let auth = self.inner.auth.read().await;
        auth.as_ref().map(|a| a.expired()).unwrap_or(true)
    }

    /// True when there is no token or it expires within the refresh margin.
    pub async fn token_expiring_soon(&self) -> bool {
        let auth = self.inner.auth.read().await;
        auth.as_ref().map(|a| a.expiring_soon()).unwrap_or(true)
    }

    /// Confirm a usable token is present. `NotAuthed` without one (or past
    /// expiry). With `raise_expiring_soon`, also `AuthExpiring` inside the
    /// refresh margin so callers refresh before the token lapses
    /// mid-flight; without it a still-valid token inside the margin passes.
    pub async fn check_auth(&self, raise_expiring_soon: bool) -> Result<()> {
        let auth = self.inner.auth.read().await;
        let auth = auth.as_ref().ok_or(AylaError::NotAuthed)?;
        if auth.expired() {
            return Err(AylaError::NotAuthed);
        }
        if raise_expiring_soon && auth.expiring_soon() {
            return Err(AylaError::AuthExpiring);
        }
        Ok(())
    }

    async fn bearer(&self) -> Result<String> {
        let auth = self.inner.auth.read().await;
        let auth = auth.as_ref().ok_or(AylaError::NotAuthed)?;
        if auth.expired() {
            return Err(AylaError::NotAuthed);
        }
        if auth.expiring_soon() {
            return Err(AylaError::AuthExpiring);
        }
        Ok(auth.auth_header())
    }

    // ------------------------------------------------------------------
    // Authenticated request plumbing
    // ------------------------------------------------------------------

    async fn dispatch(
        &self,
        method: Method,
        url: String,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let bearer = self.bearer().await?;
        let mut req = self
            .inner
            .http
            .request(method, &url)
            .header(header::AUTHORIZATION, bearer);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let value: Value = resp.json().await.unwrap_or(Value::Null);

        match status {
            StatusCode::UNAUTHORIZED => Err(AylaError::Auth(error_message(&value))),
            StatusCode::NOT_FOUND => Err(AylaError::NotFound(url)),
            s if s.is_success() => Ok(value),
            s => Err(AylaError::Api(format!("status {s}: {value}"))),
        }
    }

    pub(crate) async fn get(&self, url: String) -> Result<Value> {
        self.dispatch(Method::GET, url, &[], None).await
    }

    pub(crate) async fn get_query(&self, url: String, query: &[(String, String)]) -> Result<Value> {
        self.dispatch(Method::GET, url, query, None).await
    }

    pub(crate) async fn post_json(&self, url: String, body: &Value) -> Result<Value> {
        self.dispatch(Method::POST, url, &[], Some(body)).await
    }

    // ------------------------------------------------------------------
    // Account-level calls
    // ------------------------------------------------------------------

    /// Profile of the signed-in user.
    pub async fn get_user_profile(&self) -> Result<Value> {
        self.get(self.user_url("/users/get_user_profile.json")).await
    }

    /// Raw device listing as returned by the device service.
    pub async fn list_devices(&self) -> Result<Vec<DeviceEntry>> {
        let value = self.get(self.ads_url("/apiv1/devices.json")).await?;
        let wrappers: Vec<DeviceWrapper> = serde_json::from_value(value)?;
        Ok(wrappers.into_iter().map(|w| w.device).collect())
    }

    /// Device objects classified by product kind. Call
    /// [`Device::update`](crate::Device::update) on each to populate the
    /// property map.
    pub async fn get_devices(&self) -> Result<Vec<TypedDevice>> {
        let entries = self.list_devices().await?;
        tracing::debug!(count = entries.len(), "classified Ayla device listing");
        Ok(entries
            .into_iter()
            .map(|entry| TypedDevice::classify(self.clone(), entry))
            .collect())
    }

    /// Rules-service actions registered to the account.
    pub async fn get_actions(&self) -> Result<Value> {
        let value = self
            .get(self.rules_url("/rulesservice/v1/actions.json"))
            .await?;
        extract(value, "actions")
    }

    /// Rules-service rules registered to the account.
    pub async fn get_rules(&self) -> Result<Value> {
        let value = self
            .get(self.rules_url("/rulesservice/v1/rules.json"))
            .await?;
        extract(value, "rules")
    }

    /// Actions attached to one rule.
    pub async fn get_rule_actions(&self, rule_uuid: &str) -> Result<Value> {
        let value = self
            .get(self.rules_url(&format!("/rulesservice/v1/rules/{rule_uuid}/actions.json")))
            .await?;
        extract(value, "actions")
    }

    /// Pending commands for a device, addressed by its numeric key.
    pub async fn get_commands(&self, device_key: u64) -> Result<Value> {
        self.get(self.ads_url(&format!("/apiv1/devices/{device_key}/commands.json")))
            .await
    }

    /// All notifications configured on a device.
    pub async fn get_all_notifications(&self, device_key: u64) -> Result<Value> {
        let value = self
            .get(self.ads_url(&format!(
                "/apiv1/devices/{device_key}/notifications/all.json"
            )))
            .await?;
        extract(value, "notification")
    }
}

/// Unwrap a single-key envelope, failing with `Api` when the key is absent.
fn extract(mut value: Value, key: &str) -> Result<Value> {
    match value.get_mut(key) {
        Some(inner) => Ok(inner.take()),
        None => Err(AylaError::Api(format!("missing `{key}` in response: {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_client() -> AylaClient {
        AylaClient::new("myusername@mysite.com", "mypassword", "app_id_123", "appsecret_123")
            .unwrap()
    }

    async fn authorize(client: &AylaClient, expires_in: i64) {
        *client.inner.auth.write().await = Some(Authorization {
            access_token: "token123".into(),
            refresh_token: "token321".into(),
            expires_at: Utc::now() + Duration::seconds(expires_in),
        });
    }

    #[test]
    fn test_login_payload_shape() {
        let client = test_client();
        assert_eq!(
            client.login_payload(),
            json!({
                "user": {
                    "email": "myusername@mysite.com",
                    "password": "mypassword",
                    "application": {
                        "app_id": "app_id_123",
                        "app_secret": "appsecret_123",
                    },
                }
            })
        );
    }

    #[test]
    fn test_url_construction_follows_region() {
        let us = test_client();
        assert_eq!(
            us.user_url("/users/sign_in.json"),
            "https://user-field.aylanetworks.com/users/sign_in.json"
        );
        assert_eq!(
            us.ads_url("/apiv1/devices.json"),
            "https://ads-field.aylanetworks.com/apiv1/devices.json"
        );

        let eu = AylaClient::builder("a@b.c", "p", "id", "secret")
            .region(Region::Europe)
            .build()
            .unwrap();
        assert_eq!(
            eu.ads_url("/apiv1/devices.json"),
            "https://ads-eu.aylanetworks.com/apiv1/devices.json"
        );
        assert_eq!(
            eu.rules_url("/rulesservice/v1/rules.json"),
            "https://rulesservice-eu.aylanetworks.com/rulesservice/v1/rules.json"
        );
    }

    #[tokio::test]
    async fn test_check_auth_before_sign_in() {
        let client = test_client();
        assert!(matches!(
            client.check_auth(true).await,
            Err(AylaError::NotAuthed)
        ));
        assert!(matches!(
            client.check_auth(false).await,
            Err(AylaError::NotAuthed)
        ));
        assert!(client.token_expired().await);
        assert!(client.token_expiring_soon().await);
        assert!(client.auth_expiration().await.is_none());
    }

    #[tokio::test]
    async fn test_check_auth_valid_token() {
        let client = test_client();
        authorize(&client, 3600).await;
        assert!(client.check_auth(true).await.is_ok());
        assert!(!client.token_expired().await);
        assert!(!client.token_expiring_soon().await);
    }

    #[tokio::test]
    async fn test_check_auth_expiring_soon() {
        let client = test_client();
        authorize(&client, 400).await;
        assert!(matches!(
            client.check_auth(true).await,
            Err(AylaError::AuthExpiring)
        ));
        // A still-valid token inside the margin passes the lenient check.
        assert!(client.check_auth(false).await.is_ok());
        assert!(!client.token_expired().await);
        assert!(client.token_expiring_soon().await);
    }

    #[tokio::test]
    async fn test_check_auth_expired_token() {
        let client = test_client();
        authorize(&client, -100).await;
        assert!(matches!(
            client.check_auth(true).await,
            Err(AylaError::NotAuthed)
        ));
        // Past expiry fails regardless of the margin switch.
        assert!(matches!(
            client.check_auth(false).await,
            Err(AylaError::NotAuthed)
        ));
    }

    #[tokio::test]
    async fn test_bearer_header_value() {
        let client = test_client();
        authorize(&client, 3600).await;
        assert_eq!(client.bearer().await.unwrap(), "auth_token token123");
    }

    #[tokio::test]
    async fn test_refresh_without_token_fails() {
        let client = test_client();
        assert!(matches!(
            client.refresh_auth().await,
            Err(AylaError::NotAuthed)
        ));
    }

    #[tokio::test]
    async fn test_sign_out_without_token_is_noop() {
        let client = test_client();
        assert!(client.sign_out().await.is_ok());
    }

    #[test]
    fn test_extract_envelope() {
        let value = json!({"actions": [{"name": "a1"}]});
        assert_eq!(
            extract(value, "actions").unwrap(),
            json!([{"name": "a1"}])
        );

        let err = extract(json!({"other": 1}), "actions").unwrap_err();
        assert!(matches!(err, AylaError::Api(_)));
    }

    #[test]
    fn test_device_listing_envelope_parses() {
        let body = json!([
            {"device": {
                "dsn": "AC000W000000001",
                "key": 1234,
                "product_name": "Vacuum",
                "oem_model": "RV1001AE",
                "model": "AY001MRT1",
                "mac": "c0ffee000001",
                "lan_ip": "192.168.1.23",
                "connection_status": "Online"
            }},
            {"device": {
                "dsn": "AC000W000000002",
                "key": 5678,
                "product_name": "Smart HE"
            }}
        ]);
        let wrappers: Vec<DeviceWrapper> = serde_json::from_value(body).unwrap();
        assert_eq!(wrappers.len(), 2);
        assert_eq!(wrappers[0].device.dsn, "AC000W000000001");
        assert_eq!(wrappers[0].device.key, 1234);
        assert_eq!(wrappers[1].device.product_name, "Smart HE");
        assert!(wrappers[1].device.oem_model.is_none());
    }
}
