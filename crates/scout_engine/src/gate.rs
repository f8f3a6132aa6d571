//! Permission checks consulted before any content script touches a page.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scout_core::{trial_status, Entitlement, TrialWindow};
use scout_logging::{scout_debug, scout_info, scout_warn};
use tokio::sync::OnceCell;

use crate::fingerprint::device_fingerprint;
use crate::license::{LicenseClient, LicenseError};
use crate::store::{LocalStore, PremiumActivation, TrialRecord};

/// Purchased license or running trial.
#[async_trait]
pub trait EntitlementGate: Send + Sync {
    async fn is_entitled(&self) -> bool;
}

/// The user's master switch for content scripts.
#[async_trait]
pub trait FeatureFlags: Send + Sync {
    async fn scraper_enabled(&self) -> bool;
}

#[async_trait]
impl FeatureFlags for LocalStore {
    async fn scraper_enabled(&self) -> bool {
        self.content_script_enabled()
    }
}

/// Fixed answers, for dry runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticGate {
    pub enabled: bool,
    pub entitled: bool,
}

#[async_trait]
impl EntitlementGate for StaticGate {
    async fn is_entitled(&self) -> bool {
        self.entitled
    }
}

#[async_trait]
impl FeatureFlags for StaticGate {
    async fn scraper_enabled(&self) -> bool {
        self.enabled
    }
}

/// Entitlement backed by the local store and, when reachable, the license API.
///
/// The license is validated online at most once per gate; a transport
/// failure falls back to trusting the stored activation.
pub struct StoreGate {
    store: Arc<LocalStore>,
    licenses: Option<LicenseClient>,
    licensed: OnceCell<bool>,
}

impl StoreGate {
    pub fn new(store: Arc<LocalStore>, licenses: Option<LicenseClient>) -> Self {
        Self {
            store,
            licenses,
            licensed: OnceCell::new(),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub async fn entitlement(&self) -> Entitlement {
        self.entitlement_at(Utc::now()).await
    }

    pub async fn entitlement_at(&self, now: DateTime<Utc>) -> Entitlement {
        let licensed = *self.licensed.get_or_init(|| self.check_license()).await;
        let trial = self.store.trial();
        Entitlement {
            licensed,
            trial: trial_status(trial.as_ref().map(|t| &t.window), now),
        }
    }

    async fn check_license(&self) -> bool {
        let Some(premium) = self.store.premium() else {
            return false;
        };
        let Some(client) = &self.licenses else {
            return true;
        };
        match client
            .validate(&premium.license_key, &premium.instance_id)
            .await
        {
            Ok(validation) if validation.valid => true,
            Ok(validation) => {
                scout_warn!(
                    "stored license is no longer valid: {}",
                    validation.error.unwrap_or_default()
                );
                false
            }
            Err(err) if err.is_transport() => {
                scout_debug!("license check offline ({err}), trusting stored activation");
                true
            }
            Err(err) => {
                scout_warn!("license check failed: {err}");
                false
            }
        }
    }

    fn client(&self) -> Result<&LicenseClient, LicenseError> {
        self.licenses
            .as_ref()
            .ok_or_else(|| LicenseError::InvalidUrl("no license api configured".into()))
    }

    /// Activate `key` on this device and store the activation.
    pub async fn activate(&self, key: &str) -> Result<PremiumActivation, LicenseError> {
        let instance_name = self.store.device_fingerprint_or_insert(device_fingerprint)?;
        let activation = self.client()?.activate(key.trim(), &instance_name).await?;
        self.store.set_premium(Some(activation.clone()))?;
        Ok(activation)
    }

    /// Release the stored activation, locally even when the API refuses.
    pub async fn deactivate(&self) -> Result<(), LicenseError> {
        let premium = self.store.premium().ok_or(LicenseError::NotActivated)?;
        let remote = self
            .client()?
            .deactivate(&premium.license_key, &premium.instance_id)
            .await;
        self.store.set_premium(None)?;
        remote
    }

    /// Register the free trial for this device, once.
    pub async fn start_trial(
        &self,
        length_days: u32,
        now: DateTime<Utc>,
    ) -> Result<TrialRecord, LicenseError> {
        if self.store.trial().is_some() {
            return Err(LicenseError::TrialAlreadyUsed);
        }
        let fingerprint = self.store.device_fingerprint_or_insert(device_fingerprint)?;
        let contact_id = self.client()?.start_trial(&fingerprint).await?;
        let record = TrialRecord {
            contact_id,
            window: TrialWindow {
                started_at: now,
                length_days,
            },
        };
        self.store.set_trial(record.clone())?;
        scout_info!("free trial started for {length_days} days");
        Ok(record)
    }
}

#[async_trait]
impl EntitlementGate for StoreGate {
    async fn is_entitled(&self) -> bool {
        self.entitlement().await.is_entitled()
    }
}
