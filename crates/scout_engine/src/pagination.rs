use std::sync::Arc;
use std::time::Duration;

use scout_core::{
    scroll_target, step_fraction, CandidateSet, Observation, RunStatus, ScrollState, SiteTimings,
    Termination,
};
use scout_logging::{scout_debug, scout_info};

use crate::jitter::Jitter;
use crate::scan::ItemScanner;
use crate::status::StatusPanel;
use crate::{Page, PageError};

/// Result of one infinite-scroll run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationOutcome {
    pub candidates: CandidateSet,
    pub attempts: u32,
    pub termination: Termination,
}

/// Scrolls an infinite-scroll listing until it stops growing or the attempt
/// budget runs out, collecting item URLs along the way.
pub struct PaginationDriver {
    scanner: ItemScanner,
    timings: SiteTimings,
    jitter: Arc<dyn Jitter>,
}

impl PaginationDriver {
    pub fn new(scanner: ItemScanner, timings: SiteTimings, jitter: Arc<dyn Jitter>) -> Self {
        Self {
            scanner,
            timings,
            jitter,
        }
    }

    pub async fn run(
        &self,
        page: &dyn Page,
        panel: &mut StatusPanel,
    ) -> Result<PaginationOutcome, PageError> {
        let initial = page.metrics().await?;
        let mut state = ScrollState::new(initial.document_height, self.timings.scroll_limits);
        let mut candidates = CandidateSet::new();
        panel
            .show(RunStatus::Running, 0, 0, "Starting scroll task")
            .await;

        while state.should_continue() {
            // Hidden time consumes no attempt.
            wait_until_visible(
                page,
                panel,
                self.timings.visibility_poll,
                candidates.len(),
                state.progress_percent(),
            )
            .await?;

            let attempt = state.begin_attempt();
            let geometry = page.metrics().await?;
            let target = scroll_target(geometry, step_fraction(self.jitter.unit()));
            page.scroll_to(target).await?;
            tokio::time::sleep(self.timings.scroll_wait(self.jitter.unit())).await;

            let html = page.html().await?;
            let after = page.metrics().await?;
            let items = self.scanner.scan(&html);
            let snapshot_count = items.len();
            for item in items {
                candidates.insert_keyed(item.id, item.url);
            }

            match state.record(after.document_height, snapshot_count) {
                Observation::Changed => {
                    scout_debug!(
                        "scroll {attempt}: height {} items {snapshot_count} total {}",
                        after.document_height,
                        candidates.len()
                    );
                }
                Observation::Unchanged { streak } => {
                    scout_debug!(
                        "scroll {attempt}: no change ({streak}/{})",
                        state.limits().max_no_change
                    );
                }
            }
            panel
                .show(
                    RunStatus::Running,
                    candidates.len(),
                    state.progress_percent(),
                    format!(
                        "Position {}/{}px",
                        after.scroll_y.round(),
                        after.document_height
                    ),
                )
                .await;
        }

        // The loop only exits once a termination condition holds.
        let termination = state.termination().unwrap_or(Termination::BudgetExhausted);
        scout_info!(
            "scrolling finished after {} attempts ({termination:?}), {} items",
            state.attempts(),
            candidates.len()
        );
        panel
            .show(
                RunStatus::Completed,
                candidates.len(),
                100,
                "Scroll completed",
            )
            .await;

        Ok(PaginationOutcome {
            attempts: state.attempts(),
            candidates,
            termination,
        })
    }
}

/// Suspend while the page is hidden, showing the run as paused meanwhile.
pub(crate) async fn wait_until_visible(
    page: &dyn Page,
    panel: &mut StatusPanel,
    poll: Duration,
    collected: usize,
    progress_percent: u32,
) -> Result<(), PageError> {
    if !page.is_hidden().await? {
        return Ok(());
    }
    panel
        .show(
            RunStatus::Paused,
            collected,
            progress_percent,
            "Keep this tab in the foreground; the run resumes automatically",
        )
        .await;
    while page.is_hidden().await? {
        tokio::time::sleep(poll).await;
    }
    panel
        .show(RunStatus::Running, collected, progress_percent, "Resuming")
        .await;
    Ok(())
}
