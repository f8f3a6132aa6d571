//! Local key/value store backing the master switch, license activation,
//! trial record, device fingerprint and signed-in user.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use scout_core::{LicenseType, TrialWindow};
use scout_logging::{scout_info, scout_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::ProfileStore;
use crate::persist::{AtomicFileWriter, PersistError};

pub const STORE_FILE: &str = "scout_store.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Signed-in user as reported by the auth server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

impl UserProfile {
    /// The user's name, falling back to the local part of the email.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or_else(|| self.email.as_deref().and_then(|e| e.split('@').next()))
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumActivation {
    pub license_key: String,
    pub instance_id: String,
    #[serde(rename = "type")]
    pub license_type: LicenseType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub contact_id: String,
    pub window: TrialWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreData {
    pub content_script_enabled: bool,
    pub premium: Option<PremiumActivation>,
    pub trial: Option<TrialRecord>,
    pub device_fingerprint: Option<String>,
    pub user: Option<UserProfile>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            content_script_enabled: true,
            premium: None,
            trial: None,
            device_fingerprint: None,
            user: None,
        }
    }
}

/// JSON file store, rewritten atomically on every change.
#[derive(Debug)]
pub struct LocalStore {
    writer: AtomicFileWriter,
    data: Mutex<StoreData>,
}

impl LocalStore {
    /// Open the store in `dir`. A missing file yields defaults; an unreadable
    /// or corrupt one is logged and replaced by defaults on the next write.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let data = load(&dir.join(STORE_FILE));
        Self {
            writer: AtomicFileWriter::new(dir),
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.writer.dir().join(STORE_FILE)
    }

    pub fn snapshot(&self) -> StoreData {
        self.lock().clone()
    }

    pub fn content_script_enabled(&self) -> bool {
        self.lock().content_script_enabled
    }

    pub fn set_content_script_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.update(|data| data.content_script_enabled = enabled)
    }

    pub fn premium(&self) -> Option<PremiumActivation> {
        self.lock().premium.clone()
    }

    pub fn set_premium(&self, premium: Option<PremiumActivation>) -> Result<(), StoreError> {
        self.update(|data| data.premium = premium)
    }

    pub fn trial(&self) -> Option<TrialRecord> {
        self.lock().trial.clone()
    }

    pub fn set_trial(&self, trial: TrialRecord) -> Result<(), StoreError> {
        self.update(|data| data.trial = Some(trial))
    }

    /// The stored device fingerprint, computing and persisting it on first use.
    pub fn device_fingerprint_or_insert(
        &self,
        compute: impl FnOnce() -> String,
    ) -> Result<String, StoreError> {
        if let Some(existing) = self.lock().device_fingerprint.clone() {
            return Ok(existing);
        }
        let fingerprint = compute();
        let stored = fingerprint.clone();
        self.update(|data| data.device_fingerprint = Some(stored))?;
        Ok(fingerprint)
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.lock().user.clone()
    }

    pub fn set_user(&self, user: Option<UserProfile>) -> Result<(), StoreError> {
        self.update(|data| data.user = user)
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, change: impl FnOnce(&mut StoreData)) -> Result<(), StoreError> {
        let mut data = self.lock();
        change(&mut *data);
        let bytes = serde_json::to_vec_pretty(&*data)?;
        self.writer.write(STORE_FILE, &bytes)?;
        Ok(())
    }
}

fn load(path: &Path) -> StoreData {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return StoreData::default(),
        Err(err) => {
            scout_warn!("Failed to read store {:?}: {}", path, err);
            return StoreData::default();
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(data) => {
            scout_info!("Loaded local store from {:?}", path);
            data
        }
        Err(err) => {
            scout_warn!("Failed to parse store {:?}: {}", path, err);
            StoreData::default()
        }
    }
}

#[async_trait]
impl ProfileStore for LocalStore {
    async fn user(&self) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.lock().user.clone())
    }

    async fn save_user(&self, user: UserProfile) -> Result<(), StoreError> {
        self.set_user(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_email() {
        let user = UserProfile {
            id: "u1".into(),
            name: None,
            email: Some("ada@example.com".into()),
            image: None,
            email_verified: true,
        };
        assert_eq!(user.display_name(), Some("ada"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let data: StoreData = serde_json::from_str(r#"{"deviceFingerprint":"abc"}"#).unwrap();
        assert!(data.content_script_enabled);
        assert_eq!(data.device_fingerprint.as_deref(), Some("abc"));
    }
}
