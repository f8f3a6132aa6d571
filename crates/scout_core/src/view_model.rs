use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Running,
    Paused,
    Completed,
    Error,
}

impl RunStatus {
    pub fn headline(self) -> &'static str {
        match self {
            RunStatus::Running => "Scrolling",
            RunStatus::Paused => "Paused",
            RunStatus::Completed => "Completed",
            RunStatus::Error => "Error",
        }
    }

    /// Accent color used by overlays.
    pub fn color(self) -> &'static str {
        match self {
            RunStatus::Running => "#4CAF50",
            RunStatus::Paused => "#ff6b6b",
            RunStatus::Completed => "#2196F3",
            RunStatus::Error => "#f44336",
        }
    }
}

/// What the status overlay of one run shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusView {
    pub status: RunStatus,
    pub item_count: usize,
    /// Noun for the collected items ("products", "images", ...).
    pub noun: &'static str,
    pub progress_percent: u32,
    pub detail: Option<String>,
}

impl StatusView {
    pub fn new(noun: &'static str) -> Self {
        Self {
            noun,
            ..Self::default()
        }
    }

    pub fn with(
        &self,
        status: RunStatus,
        item_count: usize,
        progress_percent: u32,
        detail: impl Into<String>,
    ) -> Self {
        let detail = detail.into();
        Self {
            status,
            item_count,
            noun: self.noun,
            progress_percent: progress_percent.min(100),
            detail: if detail.is_empty() { None } else { Some(detail) },
        }
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: collected {} {}, progress {}%",
            self.status.headline(),
            self.item_count,
            self.noun,
            self.progress_percent
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail_when_present() {
        let view = StatusView::new("products").with(RunStatus::Paused, 12, 40, "tab hidden");
        assert_eq!(
            view.to_string(),
            "Paused: collected 12 products, progress 40% (tab hidden)"
        );
        let view = view.with(RunStatus::Completed, 12, 100, "");
        assert_eq!(view.detail, None);
    }
}
