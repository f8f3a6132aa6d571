use std::collections::BTreeMap;

use crate::timings::BackgroundTimings;

pub type TabId = u64;

/// State owned by the background coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackgroundState {
    timings: BackgroundTimings,
    /// Tabs with a pending close alarm, keyed by tab id.
    scheduled: BTreeMap<TabId, String>,
    pending_auth: Option<TabId>,
    polling: bool,
    opened_total: u64,
    closed_total: u64,
}

impl BackgroundState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timings(timings: BackgroundTimings) -> Self {
        Self {
            timings,
            ..Self::default()
        }
    }

    pub fn timings(&self) -> &BackgroundTimings {
        &self.timings
    }

    pub fn scheduled_tabs(&self) -> impl Iterator<Item = TabId> + '_ {
        self.scheduled.keys().copied()
    }

    pub fn is_scheduled(&self, tab_id: TabId) -> bool {
        self.scheduled.contains_key(&tab_id)
    }

    pub fn pending_auth(&self) -> Option<TabId> {
        self.pending_auth
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn opened_total(&self) -> u64 {
        self.opened_total
    }

    pub fn closed_total(&self) -> u64 {
        self.closed_total
    }

    pub(crate) fn schedule(&mut self, tab_id: TabId, alarm: String) {
        self.opened_total += 1;
        self.scheduled.insert(tab_id, alarm);
    }

    pub(crate) fn take_scheduled(&mut self, tab_id: TabId) -> bool {
        let removed = self.scheduled.remove(&tab_id).is_some();
        if removed {
            self.closed_total += 1;
        }
        removed
    }

    /// Remember the auth origin tab. Returns `true` when a poll must start.
    pub(crate) fn begin_auth(&mut self, origin_tab: TabId) -> bool {
        self.pending_auth = Some(origin_tab);
        let start = !self.polling;
        self.polling = true;
        start
    }

    pub(crate) fn finish_auth(&mut self) -> Option<TabId> {
        if !self.polling {
            return None;
        }
        self.polling = false;
        self.pending_auth.take()
    }
}
