use std::sync::Arc;

use async_trait::async_trait;
use scout_core::{RunStatus, StatusView};
use scout_logging::{scout_info, scout_warn};

/// Where a run's status overlay is rendered.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn render(&self, view: &StatusView);
}

/// Renders status lines to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

#[async_trait]
impl StatusSink for LogStatusSink {
    async fn render(&self, view: &StatusView) {
        match view.status {
            RunStatus::Error | RunStatus::Paused => scout_warn!("{view}"),
            _ => scout_info!("{view}"),
        }
    }
}

/// Status overlay owned by one content-script run.
pub struct StatusPanel {
    sink: Arc<dyn StatusSink>,
    view: StatusView,
}

impl StatusPanel {
    pub fn new(sink: Arc<dyn StatusSink>, noun: &'static str) -> Self {
        Self {
            sink,
            view: StatusView::new(noun),
        }
    }

    pub async fn show(
        &mut self,
        status: RunStatus,
        item_count: usize,
        progress_percent: u32,
        detail: impl Into<String>,
    ) {
        self.view = self.view.with(status, item_count, progress_percent, detail);
        self.sink.render(&self.view).await;
    }

    pub fn current(&self) -> &StatusView {
        &self.view
    }
}
