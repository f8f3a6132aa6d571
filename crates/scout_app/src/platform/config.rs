use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scout_core::{BackgroundTimings, ScriptId, TimingOverrides};
use scout_engine::{ApiSettings, FetchSettings, DEFAULT_API_BASE, OPTIONS_URL};
use scout_logging::{scout_info, scout_warn};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "launch_scout.ron";

/// Settings read from `launch_scout.ron`. Every field may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the local store.
    pub store_dir: PathBuf,
    /// Licensing and trial API.
    pub api_base: String,
    /// Server answering `api/auth/get-session`.
    pub auth_base: String,
    /// Page shown once a sign-in is confirmed.
    pub options_url: String,
    pub trial_days: u32,
    pub api_timeout_secs: u64,
    pub closure_delay_secs: u64,
    pub session_poll_secs: u64,
    pub page_timeout_secs: u64,
    pub max_page_bytes: u64,
    /// Per-script timing overrides keyed by script id.
    pub timings: BTreeMap<String, TimingOverrides>,
    pub browser: BrowserOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(".scout"),
            api_base: DEFAULT_API_BASE.to_string(),
            auth_base: "http://localhost:3000".to_string(),
            options_url: OPTIONS_URL.to_string(),
            trial_days: 3,
            api_timeout_secs: 20,
            closure_delay_secs: 120,
            session_poll_secs: 3,
            page_timeout_secs: 30,
            max_page_bytes: 5 * 1024 * 1024,
            timings: BTreeMap::new(),
            browser: BrowserOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub args: Vec<String>,
}

impl AppConfig {
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            api_base: self.api_base.clone(),
            request_timeout: Duration::from_secs(self.api_timeout_secs),
            ..ApiSettings::default()
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            request_timeout: Duration::from_secs(self.page_timeout_secs),
            max_bytes: self.max_page_bytes,
            ..FetchSettings::default()
        }
    }

    pub fn background_timings(&self) -> BackgroundTimings {
        BackgroundTimings {
            closure_delay: Duration::from_secs(self.closure_delay_secs),
            session_poll: Duration::from_secs(self.session_poll_secs),
        }
    }

    /// Overrides for known scripts; unknown keys are reported and skipped.
    pub fn timing_overrides(&self) -> BTreeMap<ScriptId, TimingOverrides> {
        let mut overrides = BTreeMap::new();
        for (key, value) in &self.timings {
            match key.parse::<ScriptId>() {
                Ok(script) => {
                    overrides.insert(script, value.clone());
                }
                Err(err) => scout_warn!("ignoring timing override: {}", err),
            }
        }
        overrides
    }

    #[cfg(feature = "browser")]
    pub fn browser_settings(&self) -> scout_engine::BrowserSettings {
        scout_engine::BrowserSettings {
            headless: self.browser.headless,
            executable: self.browser.executable.clone(),
            args: self.browser.args.clone(),
        }
    }
}

/// Read the configuration; a missing or unreadable file yields the defaults.
pub fn load(path: &Path) -> AppConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return AppConfig::default();
        }
        Err(err) => {
            scout_warn!("Failed to read config from {:?}: {}", path, err);
            return AppConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            scout_info!("Loaded config from {:?}", path);
            config
        }
        Err(err) => {
            scout_warn!("Failed to parse config from {:?}: {}", path, err);
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load(&temp.path().join(DEFAULT_CONFIG_FILE));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.background_timings(), BackgroundTimings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"(
                store_dir: "state",
                trial_days: 7,
                closure_delay_secs: 30,
                timings: {
                    "uneed": (initial_wait_ms: Some(2000)),
                    "peerlist-detail": (inter_tab_delay_ms: Some(0)),
                    "hackernews": (initial_wait_ms: Some(1)),
                },
                browser: (headless: true),
            )"#,
        )
        .unwrap();

        let config = load(&path);
        assert_eq!(config.store_dir, PathBuf::from("state"));
        assert_eq!(config.trial_days, 7);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.background_timings().closure_delay, Duration::from_secs(30));
        assert!(config.browser.headless);

        let overrides = config.timing_overrides();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[&ScriptId::Uneed].initial_wait_ms, Some(2000));
        assert_eq!(overrides[&ScriptId::PeerlistDetail].inter_tab_delay_ms, Some(0));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "(trial_days: \"three\"").unwrap();
        assert_eq!(load(&path), AppConfig::default());
    }

    #[test]
    fn settings_carry_configured_limits() {
        let config = AppConfig {
            api_base: "http://127.0.0.1:8080".into(),
            page_timeout_secs: 5,
            max_page_bytes: 1024,
            ..AppConfig::default()
        };
        assert_eq!(config.api_settings().api_base, "http://127.0.0.1:8080");
        assert_eq!(config.fetch_settings().request_timeout, Duration::from_secs(5));
        assert_eq!(config.fetch_settings().max_bytes, 1024);
    }
}
