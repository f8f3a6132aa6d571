use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scroll::ScrollLimits;

/// Named delays and budgets for one content script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteTimings {
    /// Wait after the page loads before the first DOM read.
    pub initial_wait: Duration,
    /// Pause between finishing collection and the first open request.
    pub pre_open_pause: Duration,
    /// Delay between successive open requests of one run.
    pub inter_tab_delay: Duration,
    pub scroll_wait_min: Duration,
    pub scroll_wait_max: Duration,
    pub visibility_poll: Duration,
    pub scroll_limits: ScrollLimits,
    pub click: ClickTimings,
}

impl Default for SiteTimings {
    fn default() -> Self {
        Self {
            initial_wait: Duration::ZERO,
            pre_open_pause: Duration::ZERO,
            inter_tab_delay: Duration::from_secs(3),
            scroll_wait_min: Duration::from_secs(5),
            scroll_wait_max: Duration::from_secs(7),
            visibility_poll: Duration::from_secs(1),
            scroll_limits: ScrollLimits::default(),
            click: ClickTimings::default(),
        }
    }
}

impl SiteTimings {
    /// Scroll wait for a unit random value in `[0, 1]`.
    pub fn scroll_wait(&self, unit: f64) -> Duration {
        let span = self.scroll_wait_max.saturating_sub(self.scroll_wait_min);
        self.scroll_wait_min + span.mul_f64(unit.clamp(0.0, 1.0))
    }
}

/// Delays used by the click strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTimings {
    /// Wait after each strategy before judging success.
    pub settle: Duration,
    /// Gap between the events of one pointer sequence.
    pub event_gap: Duration,
    /// Wait between the hover sequence and the click sequence.
    pub hover_settle: Duration,
    /// Wait between hover and click in the simplified pair.
    pub pair_gap: Duration,
    /// Wait after delegating a click to the parent element.
    pub parent_settle: Duration,
    /// Wait between tiles.
    pub inter_tile_delay: Duration,
}

impl Default for ClickTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            event_gap: Duration::from_millis(50),
            hover_settle: Duration::from_millis(300),
            pair_gap: Duration::from_millis(200),
            parent_settle: Duration::from_millis(500),
            inter_tile_delay: Duration::from_secs(3),
        }
    }
}

/// Delays used by the background coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundTimings {
    pub closure_delay: Duration,
    pub session_poll: Duration,
}

impl Default for BackgroundTimings {
    fn default() -> Self {
        Self {
            closure_delay: Duration::from_secs(120),
            session_poll: Duration::from_secs(3),
        }
    }
}

/// User-supplied overrides, in milliseconds, as they appear in config files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingOverrides {
    pub initial_wait_ms: Option<u64>,
    pub pre_open_pause_ms: Option<u64>,
    pub inter_tab_delay_ms: Option<u64>,
    pub scroll_wait_min_ms: Option<u64>,
    pub scroll_wait_max_ms: Option<u64>,
    pub max_scroll_attempts: Option<u32>,
    pub max_no_change: Option<u32>,
    pub settle_ms: Option<u64>,
    pub inter_tile_delay_ms: Option<u64>,
}

impl TimingOverrides {
    pub fn apply(&self, timings: &mut SiteTimings) {
        let ms = Duration::from_millis;
        if let Some(v) = self.initial_wait_ms {
            timings.initial_wait = ms(v);
        }
        if let Some(v) = self.pre_open_pause_ms {
            timings.pre_open_pause = ms(v);
        }
        if let Some(v) = self.inter_tab_delay_ms {
            timings.inter_tab_delay = ms(v);
        }
        if let Some(v) = self.scroll_wait_min_ms {
            timings.scroll_wait_min = ms(v);
        }
        if let Some(v) = self.scroll_wait_max_ms {
            timings.scroll_wait_max = ms(v);
        }
        if let Some(v) = self.max_scroll_attempts {
            timings.scroll_limits.max_attempts = v;
        }
        if let Some(v) = self.max_no_change {
            timings.scroll_limits.max_no_change = v;
        }
        if let Some(v) = self.settle_ms {
            timings.click.settle = ms(v);
        }
        if let Some(v) = self.inter_tile_delay_ms {
            timings.click.inter_tile_delay = ms(v);
        }
        // A min above max would make the jitter span negative.
        if timings.scroll_wait_max < timings.scroll_wait_min {
            timings.scroll_wait_max = timings.scroll_wait_min;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_wait_spans_min_to_max() {
        let timings = SiteTimings::default();
        assert_eq!(timings.scroll_wait(0.0), Duration::from_secs(5));
        assert_eq!(timings.scroll_wait(1.0), Duration::from_secs(7));
        assert_eq!(timings.scroll_wait(0.5), Duration::from_secs(6));
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let mut timings = SiteTimings::default();
        TimingOverrides {
            inter_tab_delay_ms: Some(500),
            max_scroll_attempts: Some(10),
            ..TimingOverrides::default()
        }
        .apply(&mut timings);
        assert_eq!(timings.inter_tab_delay, Duration::from_millis(500));
        assert_eq!(timings.scroll_limits.max_attempts, 10);
        assert_eq!(timings.scroll_wait_min, Duration::from_secs(5));
    }

    #[test]
    fn inverted_scroll_window_is_clamped() {
        let mut timings = SiteTimings::default();
        TimingOverrides {
            scroll_wait_min_ms: Some(9_000),
            ..TimingOverrides::default()
        }
        .apply(&mut timings);
        assert_eq!(timings.scroll_wait_max, Duration::from_secs(9));
    }
}
