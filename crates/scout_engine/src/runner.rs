//! One content-script run: gate, wait, extract, then request tabs in order.

use std::collections::BTreeMap;
use std::sync::Arc;

use scout_core::{Extraction, RunStatus, ScriptId, SiteTimings, TimingOverrides};
use scout_logging::{scout_debug, scout_error, scout_info, scout_warn};
use thiserror::Error;

use crate::extract::{static_extractor, ExtractError};
use crate::gate::{EntitlementGate, FeatureFlags};
use crate::interact::{InteractionSimulator, TileReport};
use crate::jitter::{Jitter, ThreadJitter};
use crate::messaging::TabRequester;
use crate::pagination::PaginationDriver;
use crate::scan::ItemScanner;
use crate::status::{LogStatusSink, StatusPanel, StatusSink};
use crate::{Page, PageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NotEntitled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub script: ScriptId,
    pub candidates: Vec<String>,
    pub opened: usize,
    pub failed: usize,
    /// Set for image-tile scripts, which open pages by clicking.
    pub tiles: Option<TileReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    Skipped(SkipReason),
    Completed(RunSummary),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

pub struct ScriptRunner {
    flags: Arc<dyn FeatureFlags>,
    gate: Arc<dyn EntitlementGate>,
    requester: Arc<dyn TabRequester>,
    status: Arc<dyn StatusSink>,
    jitter: Arc<dyn Jitter>,
    overrides: BTreeMap<ScriptId, TimingOverrides>,
}

impl ScriptRunner {
    pub fn new(
        flags: Arc<dyn FeatureFlags>,
        gate: Arc<dyn EntitlementGate>,
        requester: Arc<dyn TabRequester>,
    ) -> Self {
        Self {
            flags,
            gate,
            requester,
            status: Arc::new(LogStatusSink),
            jitter: Arc::new(ThreadJitter),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_status_sink(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<ScriptId, TimingOverrides>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn timings(&self, script: ScriptId) -> SiteTimings {
        let mut timings = script.default_timings();
        if let Some(overrides) = self.overrides.get(&script) {
            overrides.apply(&mut timings);
        }
        timings
    }

    pub async fn run(&self, script: ScriptId, page: &dyn Page) -> Result<RunReport, RunError> {
        if !self.flags.scraper_enabled().await {
            scout_info!("{script}: content scripts are disabled");
            return Ok(RunReport::Skipped(SkipReason::Disabled));
        }
        if !self.gate.is_entitled().await {
            scout_info!("{script}: no active license or trial");
            return Ok(RunReport::Skipped(SkipReason::NotEntitled));
        }

        let timings = self.timings(script);
        let extraction = script.extraction();
        let mut panel = StatusPanel::new(Arc::clone(&self.status), noun(&extraction));
        tokio::time::sleep(timings.initial_wait).await;

        let result = self.collect(script, &extraction, &timings, page, &mut panel).await;
        let (candidates, tiles) = match result {
            Ok(collected) => collected,
            Err(err) => {
                scout_error!("{script}: {err}");
                panel
                    .show(RunStatus::Error, 0, 0, err.to_string())
                    .await;
                return Err(err);
            }
        };

        let mut summary = RunSummary {
            script,
            candidates,
            opened: 0,
            failed: 0,
            tiles,
        };
        if let Some(report) = tiles {
            summary.opened = report.clicked;
            summary.failed = report.exhausted + report.failed;
            return Ok(RunReport::Completed(summary));
        }

        if summary.candidates.is_empty() {
            scout_info!("{script}: no links found");
            return Ok(RunReport::Completed(summary));
        }
        tokio::time::sleep(timings.pre_open_pause).await;
        self.open_all(&mut summary, &timings, &mut panel).await;
        Ok(RunReport::Completed(summary))
    }

    async fn collect(
        &self,
        script: ScriptId,
        extraction: &Extraction,
        timings: &SiteTimings,
        page: &dyn Page,
        panel: &mut StatusPanel,
    ) -> Result<(Vec<String>, Option<TileReport>), RunError> {
        match extraction {
            Extraction::Paginated(spec) => {
                let driver = PaginationDriver::new(
                    ItemScanner::new(*spec)?,
                    timings.clone(),
                    Arc::clone(&self.jitter),
                );
                let outcome = driver.run(page, panel).await?;
                Ok((outcome.candidates.into_vec(), None))
            }
            Extraction::Tiles { selector } => {
                let report = InteractionSimulator::new(timings.click.clone())
                    .with_visibility_poll(timings.visibility_poll)
                    .run(page, selector, timings.pre_open_pause, panel)
                    .await?;
                Ok((Vec::new(), Some(report)))
            }
            Extraction::Anchors(_) | Extraction::VisitLink { .. } => {
                let extractor = static_extractor(script)?;
                let html = page.html().await?;
                let links = extractor.extract(&html);
                scout_debug!("{script}: extracted {} links", links.len());
                Ok((links, None))
            }
        }
    }

    /// Request one tab per candidate, in order. Failures are counted and
    /// never stop the loop.
    async fn open_all(&self, summary: &mut RunSummary, timings: &SiteTimings, panel: &mut StatusPanel) {
        let total = summary.candidates.len();
        for (index, url) in summary.candidates.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(timings.inter_tab_delay).await;
            }
            match self.requester.open_tab(url).await {
                Ok(tab_id) => {
                    scout_debug!("{}: {url} opened in tab {tab_id}", summary.script);
                    summary.opened += 1;
                }
                Err(err) => {
                    scout_warn!("{}: failed to open {url}: {err}", summary.script);
                    summary.failed += 1;
                }
            }
            let percent = ((index + 1) * 100 / total) as u32;
            panel
                .show(
                    RunStatus::Running,
                    total,
                    percent,
                    format!("Opening {} of {total}", index + 1),
                )
                .await;
        }
        panel
            .show(
                RunStatus::Completed,
                total,
                100,
                format!("Opened {} tabs", summary.opened),
            )
            .await;
    }
}

fn noun(extraction: &Extraction) -> &'static str {
    match extraction {
        Extraction::Paginated(_) => "products",
        Extraction::Tiles { .. } => "images",
        Extraction::Anchors(_) | Extraction::VisitLink { .. } => "links",
    }
}
