use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use scout_core::TabId;
use scout_logging::{scout_debug, scout_info};
use tokio::sync::mpsc;

use crate::orchestrator::TabPlatform;
use crate::TabError;

/// A page that was opened. Pages backed by a tab the platform tracks carry
/// its id; snapshot `window.open`s and launch seeds carry none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPage {
    pub tab_id: Option<TabId>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunTab {
    pub url: String,
    pub active: bool,
}

/// Tab platform that only keeps a ledger of open tabs.
#[derive(Debug)]
pub struct DryRunTabs {
    next_id: AtomicU64,
    tabs: Mutex<BTreeMap<TabId, DryRunTab>>,
    listener: Option<mpsc::UnboundedSender<OpenedPage>>,
}

impl Default for DryRunTabs {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            tabs: Mutex::new(BTreeMap::new()),
            listener: None,
        }
    }
}

impl DryRunTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every created tab to `listener`.
    pub fn with_listener(listener: mpsc::UnboundedSender<OpenedPage>) -> Self {
        Self {
            listener: Some(listener),
            ..Self::default()
        }
    }

    pub fn open_tabs(&self) -> BTreeMap<TabId, DryRunTab> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<TabId, DryRunTab>> {
        self.tabs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TabPlatform for DryRunTabs {
    async fn create_tab(&self, url: &str, active: bool) -> Result<TabId, TabError> {
        let tab_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            tab_id,
            DryRunTab {
                url: url.to_string(),
                active,
            },
        );
        scout_info!("[tab {tab_id}] open {url}");
        if let Some(listener) = &self.listener {
            let _ = listener.send(OpenedPage {
                tab_id: Some(tab_id),
                url: url.to_string(),
            });
        }
        Ok(tab_id)
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<(), TabError> {
        match self.lock().remove(&tab_id) {
            Some(tab) => {
                scout_info!("[tab {tab_id}] close {}", tab.url);
                Ok(())
            }
            None => Err(TabError::NotFound(tab_id)),
        }
    }

    async fn find_tab(&self, url: &str) -> Result<Option<TabId>, TabError> {
        Ok(self
            .lock()
            .iter()
            .find(|(_, tab)| tab.url == url)
            .map(|(id, _)| *id))
    }

    async fn activate_tab(&self, tab_id: TabId) -> Result<(), TabError> {
        let mut tabs = self.lock();
        if !tabs.contains_key(&tab_id) {
            return Err(TabError::NotFound(tab_id));
        }
        for (id, tab) in tabs.iter_mut() {
            tab.active = *id == tab_id;
        }
        scout_debug!("[tab {tab_id}] activated");
        Ok(())
    }
}
