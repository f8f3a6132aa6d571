//! Launch scout core: pure state machines, site tables and view-model helpers.
mod alarm;
mod candidates;
mod effect;
mod entitlement;
mod msg;
mod pattern;
mod scroll;
mod sites;
mod state;
mod timings;
mod update;
mod view_model;

pub use alarm::{close_tab_alarm, parse_close_tab_alarm, CLOSE_TAB_PREFIX};
pub use candidates::CandidateSet;
pub use effect::Effect;
pub use entitlement::{
    trial_status, Entitlement, LicenseType, TrialStatus, TrialWindow, STORE_ID,
};
pub use msg::Msg;
pub use pattern::{PatternError, UrlPattern};
pub use scroll::{
    scroll_target, step_fraction, Observation, ScrollGeometry, ScrollLimits, ScrollState,
    Termination, BOTTOM_MARGIN_FRACTION,
};
pub use sites::{
    AnchorSpec, Extraction, ListingSite, ScanSpec, ScriptId, SiteGroup, TitleRule, UnknownSite,
    OPEN_LAUNCH_MARKER,
};
pub use state::{BackgroundState, TabId};
pub use timings::{BackgroundTimings, ClickTimings, SiteTimings, TimingOverrides};
pub use update::update;
pub use view_model::{RunStatus, StatusView};
