//! Scroll-termination state machine for infinite-scroll feeds.

/// Fraction of the viewport left below the scroll target so the page keeps
/// triggering its lazy loader.
pub const BOTTOM_MARGIN_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollLimits {
    pub max_attempts: u32,
    pub max_no_change: u32,
}

impl Default for ScrollLimits {
    fn default() -> Self {
        Self {
            max_attempts: 80,
            max_no_change: 5,
        }
    }
}

/// Viewport and document measurements taken from a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollGeometry {
    pub viewport_height: f64,
    pub scroll_y: f64,
    pub document_height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Changed,
    Unchanged { streak: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `max_no_change` consecutive attempts saw neither height nor item count move.
    Stable,
    /// `max_attempts` scrolls were performed.
    BudgetExhausted,
}

/// Mutable record owned by one pagination run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollState {
    attempts: u32,
    previous_height: u64,
    current_height: u64,
    no_change_streak: u32,
    previous_item_count: usize,
    limits: ScrollLimits,
}

impl ScrollState {
    pub fn new(initial_height: u64, limits: ScrollLimits) -> Self {
        Self {
            attempts: 0,
            previous_height: 0,
            current_height: initial_height,
            no_change_streak: 0,
            previous_item_count: 0,
            limits,
        }
    }

    pub fn termination(&self) -> Option<Termination> {
        if self.no_change_streak >= self.limits.max_no_change {
            Some(Termination::Stable)
        } else if self.attempts >= self.limits.max_attempts {
            Some(Termination::BudgetExhausted)
        } else {
            None
        }
    }

    pub fn should_continue(&self) -> bool {
        self.termination().is_none()
    }

    /// Start a scroll attempt. Returns the 1-based attempt number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.previous_height = self.current_height;
        self.attempts
    }

    /// Record the page after the wait: its height and the number of distinct
    /// items visible in this snapshot.
    pub fn record(&mut self, height: u64, item_count: usize) -> Observation {
        self.current_height = height;
        if self.previous_height == height && self.previous_item_count == item_count {
            self.no_change_streak += 1;
            Observation::Unchanged {
                streak: self.no_change_streak,
            }
        } else {
            self.no_change_streak = 0;
            self.previous_item_count = item_count;
            Observation::Changed
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn no_change_streak(&self) -> u32 {
        self.no_change_streak
    }

    pub fn current_height(&self) -> u64 {
        self.current_height
    }

    pub fn previous_item_count(&self) -> usize {
        self.previous_item_count
    }

    pub fn limits(&self) -> ScrollLimits {
        self.limits
    }

    pub fn progress_percent(&self) -> u32 {
        if self.limits.max_attempts == 0 {
            return 100;
        }
        let pct = f64::from(self.attempts) * 100.0 / f64::from(self.limits.max_attempts);
        pct.round().min(100.0) as u32
    }
}

/// Map a unit random value in `[0, 1]` onto the 50-100% viewport step.
pub fn step_fraction(unit: f64) -> f64 {
    0.5 + 0.5 * unit.clamp(0.0, 1.0)
}

/// Where to scroll next: one randomized step down, never past
/// `document_height - 20% of the viewport`.
pub fn scroll_target(geometry: ScrollGeometry, fraction: f64) -> f64 {
    let step = geometry.viewport_height * fraction;
    let ceiling = geometry.document_height as f64 - geometry.viewport_height * BOTTOM_MARGIN_FRACTION;
    (geometry.scroll_y + step).min(ceiling)
}
