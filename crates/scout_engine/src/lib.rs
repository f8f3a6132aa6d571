//! Launch scout engine: pages, extraction, pacing and tab orchestration.
#[cfg(feature = "browser")]
mod chrome;
mod extract;
mod fetch;
mod fingerprint;
mod gate;
mod interact;
mod jitter;
mod license;
mod messaging;
mod orchestrator;
mod page;
mod pagination;
mod persist;
mod runner;
mod scan;
mod snapshot;
mod status;
mod store;
mod tabs;
mod types;

#[cfg(feature = "browser")]
pub use chrome::{
    BrowserSettings, ChromeBrowser, ChromePage, ChromeTabs, OverlayStatusSink, Placement,
};
pub use extract::{static_extractor, AnchorRule, ExtractError, Extractor, VisitLinkRule};
pub use fetch::{decode_html, fetch_html, FetchSettings, Fetcher, ReqwestFetcher};
pub use fingerprint::{device_fingerprint, fingerprint_of};
pub use gate::{EntitlementGate, FeatureFlags, StaticGate, StoreGate};
pub use interact::{
    find_clickable_target, Attempt, ClickOutcome, ClickStrategy, ClickTarget,
    InteractionSimulator, TileReport, ANCESTOR_DEPTH,
};
pub use jitter::{FixedJitter, Jitter, ThreadJitter};
pub use license::{
    ApiSettings, HttpSessionProbe, LicenseClient, LicenseError, Validation, DEFAULT_API_BASE,
    TRIAL_EMAIL_DOMAIN,
};
pub use messaging::{Message, Messenger, Reply, TabRequester};
pub use orchestrator::{
    Alarms, ProfileStore, SessionProbe, TabOrchestrator, TabPlatform, TokioAlarms, OPTIONS_URL,
};
pub use page::{ElementHandle, ElementInfo, Page, Rect, SyntheticEvent};
pub use pagination::{PaginationDriver, PaginationOutcome};
pub use persist::{ensure_store_dir, AtomicFileWriter, PersistError};
pub use runner::{RunError, RunReport, RunSummary, ScriptRunner, SkipReason};
pub use scan::{ItemScanner, ScannedItem};
pub use snapshot::SnapshotPage;
pub use status::{LogStatusSink, StatusPanel, StatusSink};
pub use store::{
    LocalStore, PremiumActivation, StoreData, StoreError, TrialRecord, UserProfile, STORE_FILE,
};
pub use tabs::{DryRunTab, DryRunTabs, OpenedPage};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, PageError, TabError};
