//! Licensing, free-trial and auth-session endpoints.

use std::time::Duration;

use scout_core::{LicenseType, STORE_ID};
use scout_logging::{scout_debug, scout_info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use async_trait::async_trait;

use crate::orchestrator::SessionProbe;
use crate::store::{PremiumActivation, StoreError, UserProfile};

pub const DEFAULT_API_BASE: &str = "https://api.focusapps.app";
/// Trial contacts are registered as `<fingerprint>@` this domain.
pub const TRIAL_EMAIL_DOMAIN: &str = "producthunt.scaper.com";
const ACTIVE_STATUS: &str = "active";

#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("invalid api url: {0}")]
    InvalidUrl(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
    #[error("license rejected: {0}")]
    Rejected(String),
    #[error("trial opportunity has been used, please purchase a premium license")]
    TrialAlreadyUsed,
    #[error("no license is activated")]
    NotActivated,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LicenseError {
    /// Errors that say nothing about the license itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LicenseError::Timeout(_) | LicenseError::Network(_) | LicenseError::HttpStatus(_)
        )
    }
}

fn map_reqwest_error(err: reqwest::Error) -> LicenseError {
    if err.is_timeout() {
        return LicenseError::Timeout(err.to_string());
    }
    LicenseError::Network(err.to_string())
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub api_base: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
        }
    }
}

fn build_client(settings: &ApiSettings) -> Result<reqwest::Client, LicenseError> {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .build()
        .map_err(|err| LicenseError::Network(err.to_string()))
}

fn parse_base(base: &str) -> Result<Url, LicenseError> {
    let mut base = base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base).map_err(|err| LicenseError::InvalidUrl(format!("{base}: {err}")))
}

/// Result of a license validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub license_type: LicenseType,
    pub error: Option<String>,
}

impl Validation {
    fn invalid(error: Option<String>) -> Self {
        Self {
            valid: false,
            license_type: LicenseType::Unknown,
            error,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Instance {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    store_id: u64,
    #[serde(default)]
    product_id: u64,
}

#[derive(Debug, Deserialize)]
struct KeyInfo {
    status: String,
    #[serde(default)]
    status_formatted: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivateResponse {
    activated: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    instance: Option<Instance>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    valid: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    license_key: Option<KeyInfo>,
    #[serde(default)]
    meta: Option<Meta>,
}

impl ValidateResponse {
    fn into_validation(self) -> Validation {
        if !self.valid {
            return Validation::invalid(self.error);
        }
        let Some(key) = self.license_key else {
            return Validation::invalid(Some("missing license key status".into()));
        };
        if key.status != ACTIVE_STATUS {
            return Validation::invalid(Some(key.status_formatted.unwrap_or(key.status)));
        }
        let meta = self.meta.unwrap_or_default();
        if meta.store_id != STORE_ID {
            return Validation::invalid(Some("Invalid license key".into()));
        }
        Validation {
            valid: true,
            license_type: LicenseType::from_product_id(meta.product_id),
            error: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrialResponse {
    id: serde_json::Value,
}

/// Client for the license and trial endpoints.
#[derive(Debug, Clone)]
pub struct LicenseClient {
    client: reqwest::Client,
    base: Url,
}

impl LicenseClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, LicenseError> {
        Ok(Self {
            client: build_client(settings)?,
            base: parse_base(&settings.api_base)?,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, LicenseError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| LicenseError::InvalidUrl(err.to_string()))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Send and decode a JSON body. Client errors still carry a decodable
    /// body from the license API, so those are parsed too.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, LicenseError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        match serde_json::from_slice::<T>(&body) {
            Ok(parsed) if status.is_success() || status.is_client_error() => Ok(parsed),
            _ if !status.is_success() => Err(LicenseError::HttpStatus(status.as_u16())),
            Err(err) => Err(LicenseError::InvalidResponse(err.to_string())),
            Ok(_) => Err(LicenseError::HttpStatus(status.as_u16())),
        }
    }

    /// Activate `key` for this machine, then validate the new instance.
    pub async fn activate(
        &self,
        key: &str,
        instance_name: &str,
    ) -> Result<PremiumActivation, LicenseError> {
        let url = self.endpoint(
            "lemonsqueezy/licenses/activate",
            &[("license_key", key), ("instance_name", instance_name)],
        )?;
        let resp: ActivateResponse = self.send_json(self.client.post(url)).await?;
        if !resp.activated {
            return Err(LicenseError::Rejected(
                resp.error.unwrap_or_else(|| "activation refused".into()),
            ));
        }
        let instance_id = resp
            .instance
            .map(|i| i.id)
            .ok_or_else(|| LicenseError::InvalidResponse("activation without instance".into()))?;

        let validation = self.validate(key, &instance_id).await?;
        if !validation.valid {
            return Err(LicenseError::Rejected(
                validation.error.unwrap_or_else(|| "license is not valid".into()),
            ));
        }
        let product_id = resp.meta.map(|m| m.product_id).unwrap_or_default();
        scout_info!("license activated as instance {instance_id}");
        Ok(PremiumActivation {
            license_key: key.to_string(),
            instance_id,
            license_type: LicenseType::from_product_id(product_id),
        })
    }

    pub async fn validate(&self, key: &str, instance_id: &str) -> Result<Validation, LicenseError> {
        let url = self.endpoint(
            "lemonsqueezy/licenses/validate",
            &[("license_key", key), ("instance_id", instance_id)],
        )?;
        let resp: ValidateResponse = self.send_json(self.client.post(url)).await?;
        let validation = resp.into_validation();
        scout_debug!("license validation: {validation:?}");
        Ok(validation)
    }

    pub async fn deactivate(&self, key: &str, instance_id: &str) -> Result<(), LicenseError> {
        let url = self.endpoint(
            "lemonsqueezy/licenses/deactivate",
            &[("license_key", key), ("instance_id", instance_id)],
        )?;
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        if !response.status().is_success() {
            return Err(LicenseError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }

    /// Register a free trial for this device. Returns the trial contact id.
    pub async fn start_trial(&self, fingerprint: &str) -> Result<String, LicenseError> {
        let email = format!("{fingerprint}@{TRIAL_EMAIL_DOMAIN}");
        let url = self.endpoint("free-trial", &[("email", &email)])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            return Err(LicenseError::TrialAlreadyUsed);
        }
        if !status.is_success() {
            return Err(LicenseError::HttpStatus(status.as_u16()));
        }
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let resp: TrialResponse = serde_json::from_slice(&body)
            .map_err(|err| LicenseError::InvalidResponse(err.to_string()))?;
        match resp.id {
            serde_json::Value::String(id) => Ok(id),
            serde_json::Value::Number(id) => Ok(id.to_string()),
            other => Err(LicenseError::InvalidResponse(format!(
                "unexpected contact id {other}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    user: Option<UserProfile>,
}

/// Polls `{auth_base}/api/auth/get-session`.
#[derive(Debug, Clone)]
pub struct HttpSessionProbe {
    client: reqwest::Client,
    url: Url,
}

impl HttpSessionProbe {
    pub fn new(auth_base: &str, settings: &ApiSettings) -> Result<Self, LicenseError> {
        let url = parse_base(auth_base)?
            .join("api/auth/get-session")
            .map_err(|err| LicenseError::InvalidUrl(err.to_string()))?;
        Ok(Self {
            client: build_client(settings)?,
            url,
        })
    }
}

#[async_trait]
impl SessionProbe for HttpSessionProbe {
    async fn current_user(&self) -> Result<Option<UserProfile>, LicenseError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LicenseError::HttpStatus(status.as_u16()));
        }
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        // A signed-out session is a JSON `null`.
        let session: Option<SessionResponse> = serde_json::from_slice(&body)
            .map_err(|err| LicenseError::InvalidResponse(err.to_string()))?;
        Ok(session.and_then(|s| s.user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_json(json: &str) -> Validation {
        serde_json::from_str::<ValidateResponse>(json)
            .unwrap()
            .into_validation()
    }

    #[test]
    fn active_key_from_our_store_is_valid() {
        let v = validate_json(
            r#"{"valid":true,"license_key":{"status":"active"},"meta":{"store_id":162254,"product_id":709187}}"#,
        );
        assert!(v.valid);
        assert_eq!(v.license_type, LicenseType::Onetime);
    }

    #[test]
    fn foreign_store_is_rejected() {
        let v = validate_json(
            r#"{"valid":true,"license_key":{"status":"active"},"meta":{"store_id":1,"product_id":622075}}"#,
        );
        assert_eq!(v.error.as_deref(), Some("Invalid license key"));
        assert!(!v.valid);
    }

    #[test]
    fn inactive_key_reports_formatted_status() {
        let v = validate_json(
            r#"{"valid":true,"license_key":{"status":"expired","status_formatted":"Expired"},"meta":{"store_id":162254}}"#,
        );
        assert_eq!(v.error.as_deref(), Some("Expired"));
    }

    #[test]
    fn base_urls_gain_a_trailing_slash() {
        let base = parse_base("https://api.example.com/v1").unwrap();
        assert_eq!(
            base.join("free-trial").unwrap().as_str(),
            "https://api.example.com/v1/free-trial"
        );
    }
}
