use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use scout_core::{ListingSite, ScriptId, TimingOverrides};
use scout_engine::{
    fetch_html, DryRunTabs, EntitlementGate, FeatureFlags, Fetcher, HttpSessionProbe, Jitter,
    LogStatusSink, OpenedPage, Page, ReqwestFetcher, RunReport, ScriptRunner, SnapshotPage,
    StatusSink, TabOrchestrator, TabPlatform, TabRequester, ThreadJitter, TokioAlarms,
};
use scout_logging::{scout_debug, scout_error, scout_info, scout_warn};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::cli::LaunchArgs;
use super::commands::{open_gate, open_store};
use super::config::AppConfig;

/// Where pages come from: HTTP snapshots or a live browser.
enum PageSource {
    Snapshot(Arc<dyn Fetcher>),
    #[cfg(feature = "browser")]
    Browser {
        browser: Arc<scout_engine::ChromeBrowser>,
        tabs: Arc<scout_engine::ChromeTabs>,
        /// Launch URLs that open in a window of their own.
        own_windows: BTreeSet<String>,
    },
}

struct LoadedPage {
    script: ScriptId,
    page: Box<dyn Page>,
    status: Arc<dyn StatusSink>,
}

impl PageSource {
    /// Load `opened` when a script is bound to it.
    async fn load(
        &self,
        opened: &OpenedPage,
        listener: &mpsc::UnboundedSender<OpenedPage>,
    ) -> Result<Option<LoadedPage>> {
        let Some(script) = ScriptId::for_url(&opened.url) else {
            scout_debug!("no script for {}", opened.url);
            return Ok(None);
        };
        match self {
            PageSource::Snapshot(fetcher) => {
                let (final_url, html) = fetch_html(fetcher.as_ref(), &opened.url).await?;
                let script = ScriptId::for_url(&final_url).unwrap_or(script);
                let page = SnapshotPage::new(final_url, html).with_listener(listener.clone());
                Ok(Some(LoadedPage {
                    script,
                    page: Box::new(page),
                    status: Arc::new(LogStatusSink),
                }))
            }
            #[cfg(feature = "browser")]
            PageSource::Browser {
                browser,
                tabs,
                own_windows,
            } => {
                let page = match opened.tab_id {
                    Some(tab_id) => match tabs.page(tab_id) {
                        Some(page) => page,
                        None => {
                            scout_debug!("tab {tab_id} closed before its script ran");
                            return Ok(None);
                        }
                    },
                    None if own_windows.contains(&opened.url) => {
                        scout_debug!("opening {} in its own window", opened.url);
                        browser
                            .open(&opened.url, scout_engine::Placement::NewWindow)
                            .await?
                    }
                    None => {
                        browser
                            .open(&opened.url, scout_engine::Placement::Foreground)
                            .await?
                    }
                };
                let status: Arc<dyn StatusSink> =
                    Arc::new(scout_engine::OverlayStatusSink::new(&page));
                Ok(Some(LoadedPage {
                    script,
                    page: Box::new(page),
                    status,
                }))
            }
        }
    }

    fn has_real_tabs(&self) -> bool {
        !matches!(self, PageSource::Snapshot(_))
    }
}

/// Everything a content-script run shares.
struct Runners {
    flags: Arc<dyn FeatureFlags>,
    gate: Arc<dyn EntitlementGate>,
    requester: Arc<dyn TabRequester>,
    overrides: BTreeMap<ScriptId, TimingOverrides>,
    jitter: Arc<dyn Jitter>,
}

impl Runners {
    fn runner(&self, status: Arc<dyn StatusSink>) -> ScriptRunner {
        ScriptRunner::new(
            Arc::clone(&self.flags),
            Arc::clone(&self.gate),
            Arc::clone(&self.requester),
        )
        .with_status_sink(status)
        .with_jitter(Arc::clone(&self.jitter))
        .with_overrides(self.overrides.clone())
    }
}

struct PageOutcome {
    url: String,
    result: Result<Option<RunReport>>,
}

pub async fn run(config: &AppConfig, args: LaunchArgs) -> Result<()> {
    let store = open_store(config);
    if !store.content_script_enabled() {
        bail!("the scraper is switched off; run `scout toggle on` first");
    }
    let gate = Arc::new(open_gate(config, Arc::clone(&store))?);
    let entitlement = gate.entitlement().await;
    if !entitlement.is_entitled() {
        bail!("a license or a running trial is required (`scout license activate <key>` or `scout trial start`)");
    }
    if let Some(notice) = entitlement.trial_notice() {
        println!("{notice}");
    }

    let today = Local::now().date_naive();
    let (listener, pages) = mpsc::unbounded_channel();
    let (source, platform) = backend(config, &args, today, listener.clone()).await?;
    let alarms = Arc::new(TokioAlarms::new());
    let session = Arc::new(HttpSessionProbe::new(&config.auth_base, &config.api_settings())?);
    let messenger = TabOrchestrator::new(platform, alarms.clone(), session, store.clone())
        .with_options_url(config.options_url.as_str())
        .spawn(config.background_timings());

    let runners = Arc::new(Runners {
        flags: store,
        gate,
        requester: Arc::new(messenger.clone()),
        overrides: config.timing_overrides(),
        jitter: Arc::new(ThreadJitter),
    });

    for site in args.selected_sites() {
        let url = site.launch_url(today);
        scout_info!("opening {} at {url}", site.name());
        let _ = listener.send(OpenedPage { tab_id: None, url });
    }

    let source = Arc::new(source);
    let outcomes = drive(Arc::clone(&source), runners, listener, pages).await;
    print_outcomes(&outcomes);

    if source.has_real_tabs() && !args.no_wait {
        wait_for_closures(&alarms).await;
    }
    let state = messenger.shutdown().await?;
    scout_info!(
        "launch finished: {} tabs opened, {} closed",
        state.opened_total(),
        state.closed_total()
    );
    Ok(())
}

/// Launch URLs of the selected sites that want a window of their own.
fn own_window_urls(sites: &[ListingSite], today: NaiveDate) -> BTreeSet<String> {
    sites
        .iter()
        .filter(|site| site.own_window())
        .map(|site| site.launch_url(today))
        .collect()
}

async fn backend(
    config: &AppConfig,
    args: &LaunchArgs,
    today: NaiveDate,
    listener: mpsc::UnboundedSender<OpenedPage>,
) -> Result<(PageSource, Arc<dyn TabPlatform>)> {
    let own_windows = own_window_urls(&args.selected_sites(), today);
    #[cfg(feature = "browser")]
    if !args.dry_run {
        let browser = Arc::new(scout_engine::ChromeBrowser::launch(&config.browser_settings()).await?);
        let tabs = Arc::new(browser.tabs(Some(listener)).await?);
        let platform: Arc<dyn TabPlatform> = tabs.clone();
        let source = PageSource::Browser {
            browser,
            tabs,
            own_windows,
        };
        return Ok((source, platform));
    }
    if !own_windows.is_empty() {
        scout_debug!("snapshot pages share no windows; ignoring own-window sites");
    }
    #[cfg(not(feature = "browser"))]
    if !args.dry_run {
        scout_info!("built without browser support; loading page snapshots");
    }
    let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(config.fetch_settings()));
    Ok((
        PageSource::Snapshot(fetcher),
        Arc::new(DryRunTabs::with_listener(listener)),
    ))
}

/// Run the bound script on every page that arrives on `pages` until no run
/// is left and nothing new was opened.
async fn drive(
    source: Arc<PageSource>,
    runners: Arc<Runners>,
    listener: mpsc::UnboundedSender<OpenedPage>,
    mut pages: mpsc::UnboundedReceiver<OpenedPage>,
) -> Vec<PageOutcome> {
    let mut runs = JoinSet::new();
    let mut outcomes = Vec::new();

    let spawn = |runs: &mut JoinSet<PageOutcome>, opened: OpenedPage| {
        let source = Arc::clone(&source);
        let runners = Arc::clone(&runners);
        let listener = listener.clone();
        runs.spawn(async move {
            let result = run_page(&source, &runners, &opened, &listener).await;
            PageOutcome {
                url: opened.url,
                result,
            }
        });
    };

    while let Ok(opened) = pages.try_recv() {
        spawn(&mut runs, opened);
    }

    while !runs.is_empty() {
        tokio::select! {
            Some(opened) = pages.recv() => spawn(&mut runs, opened),
            Some(joined) = runs.join_next() => {
                match joined {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(err) => scout_error!("script task failed: {err}"),
                }
                if runs.is_empty() {
                    while let Ok(opened) = pages.try_recv() {
                        spawn(&mut runs, opened);
                    }
                }
            }
            else => break,
        }
    }
    outcomes
}

async fn run_page(
    source: &PageSource,
    runners: &Runners,
    opened: &OpenedPage,
    listener: &mpsc::UnboundedSender<OpenedPage>,
) -> Result<Option<RunReport>> {
    let Some(loaded) = source.load(opened, listener).await? else {
        return Ok(None);
    };
    let kind = if loaded.script.is_detail() { "detail" } else { "listing" };
    scout_info!("running {} on {kind} page {}", loaded.script, opened.url);
    let report = runners
        .runner(loaded.status)
        .run(loaded.script, loaded.page.as_ref())
        .await?;
    Ok(Some(report))
}

fn print_outcomes(outcomes: &[PageOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(None) => {}
            Ok(Some(RunReport::Completed(summary))) => println!(
                "{}: {} found, {} opened, {} failed",
                summary.script,
                summary.candidates.len(),
                summary.opened,
                summary.failed
            ),
            Ok(Some(RunReport::Skipped(reason))) => {
                println!("{}: skipped ({reason:?})", outcome.url)
            }
            Err(err) => {
                scout_warn!("{} failed: {err:#}", outcome.url);
                println!("{}: failed: {err:#}", outcome.url);
            }
        }
    }
}

async fn wait_for_closures(alarms: &TokioAlarms) {
    let pending = alarms.pending();
    if pending == 0 {
        return;
    }
    println!("Waiting for {pending} tabs to close (use --no-wait to skip).");
    while alarms.pending() > 0 {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Once;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use scout_core::BackgroundTimings;
    use scout_engine::{
        FailureKind, FetchError, FetchMetadata, FetchOutput, FixedJitter, LicenseError,
        LocalStore, SessionProbe, StaticGate, UserProfile,
    };
    use tempfile::TempDir;

    fn init_logging() {
        static INIT: Once = Once::new();
        INIT.call_once(scout_logging::initialize_for_tests);
    }

    /// Serves saved pages by URL; anything else is a 404.
    struct SavedPages(HashMap<String, String>);

    #[async_trait]
    impl Fetcher for SavedPages {
        async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
            let html = self.0.get(url).ok_or_else(|| FetchError {
                kind: FailureKind::HttpStatus(404),
                message: url.to_string(),
            })?;
            Ok(FetchOutput {
                bytes: html.clone().into_bytes(),
                metadata: FetchMetadata {
                    original_url: url.to_string(),
                    final_url: url.to_string(),
                    redirect_count: 0,
                    content_type: Some("text/html; charset=utf-8".into()),
                    byte_len: html.len() as u64,
                },
            })
        }
    }

    struct SignedOut;

    #[async_trait]
    impl SessionProbe for SignedOut {
        async fn current_user(&self) -> Result<Option<UserProfile>, LicenseError> {
            Ok(None)
        }
    }

    const FAZIER_LISTING: &str = "https://fazier.com/leaderboard/daily/2026/10/19";

    fn saved_pages() -> SavedPages {
        SavedPages(HashMap::from([
            (
                FAZIER_LISTING.to_string(),
                r#"<a href="/launches/alpha">Alpha</a>
                   <a href="/launches/beta">Beta</a>
                   <a href="/about">About</a>"#
                    .to_string(),
            ),
            (
                "https://fazier.com/launches/alpha".to_string(),
                r#"<a href="https://alpha.dev/?ref=fazier">Visit</a>
                   <a href="https://alpha.dev/pricing?ref=fazier">Pricing</a>"#
                    .to_string(),
            ),
            (
                "https://fazier.com/launches/beta".to_string(),
                r#"<a href="https://beta.dev/?ref=fazier">Visit</a>"#.to_string(),
            ),
        ]))
    }

    #[tokio::test(start_paused = true)]
    async fn detail_pages_opened_by_a_listing_get_their_own_run() {
        init_logging();
        let temp = TempDir::new().unwrap();
        let (listener, pages) = mpsc::unbounded_channel();
        let tabs = Arc::new(DryRunTabs::with_listener(listener.clone()));
        let profiles = Arc::new(LocalStore::open(temp.path()));
        let messenger = TabOrchestrator::new(
            tabs.clone(),
            Arc::new(TokioAlarms::new()),
            Arc::new(SignedOut),
            profiles,
        )
        .spawn(BackgroundTimings::default());

        let gate = Arc::new(StaticGate {
            enabled: true,
            entitled: true,
        });
        let runners = Arc::new(Runners {
            flags: gate.clone(),
            gate,
            requester: Arc::new(messenger.clone()),
            overrides: BTreeMap::new(),
            jitter: Arc::new(FixedJitter(0.0)),
        });
        let source = Arc::new(PageSource::Snapshot(Arc::new(saved_pages())));

        listener
            .send(OpenedPage {
                tab_id: None,
                url: FAZIER_LISTING.to_string(),
            })
            .unwrap();
        listener
            .send(OpenedPage {
                tab_id: None,
                url: "https://firsto.co/trending?filter=today".to_string(),
            })
            .unwrap();

        let outcomes = drive(source, runners, listener, pages).await;

        let mut opened: Vec<String> = tabs.open_tabs().into_values().map(|tab| tab.url).collect();
        opened.sort();
        assert_eq!(
            opened,
            vec![
                "https://alpha.dev/?ref=fazier",
                "https://beta.dev/?ref=fazier",
                "https://fazier.com/launches/alpha",
                "https://fazier.com/launches/beta",
            ]
        );

        let mut completed: Vec<(ScriptId, usize)> = outcomes
            .iter()
            .filter_map(|outcome| match &outcome.result {
                Ok(Some(RunReport::Completed(summary))) => Some((summary.script, summary.opened)),
                _ => None,
            })
            .collect();
        completed.sort();
        assert_eq!(
            completed,
            vec![
                (ScriptId::Fazier, 2),
                (ScriptId::FazierDetail, 1),
                (ScriptId::FazierDetail, 1),
            ]
        );

        // The firsto listing was not saved, so its fetch failed on its own.
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .map(|outcome| outcome.url.as_str())
            .collect();
        assert_eq!(failed, vec!["https://firsto.co/trending?filter=today"]);

        messenger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn pages_without_a_script_are_not_loaded() {
        let (listener, _pages) = mpsc::unbounded_channel();
        let source = PageSource::Snapshot(Arc::new(SavedPages(HashMap::new())));
        let loaded = source
            .load(
                &OpenedPage {
                    tab_id: Some(3),
                    url: "https://alpha.dev/?ref=fazier".into(),
                },
                &listener,
            )
            .await
            .unwrap();
        assert!(loaded.is_none());
        assert!(!source.has_real_tabs());
    }

    #[test]
    fn only_peerpush_asks_for_its_own_window() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let urls = own_window_urls(&[ListingSite::Fazier, ListingSite::PeerPush], today);
        assert_eq!(
            urls.into_iter().collect::<Vec<_>>(),
            vec!["https://peerpush.net/?view=live".to_string()]
        );
        assert!(own_window_urls(&ListingSite::in_group(scout_core::SiteGroup::Daily), today).is_empty());
    }
}
