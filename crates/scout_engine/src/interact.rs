//! Simulated clicks on image tiles that carry no anchor of their own.
//!
//! Each tile is resolved to the element most likely to react to a click,
//! then a fixed sequence of click strategies is tried until one of them
//! visibly opens something.

use std::time::Duration;

use scout_core::{ClickTimings, RunStatus};
use scout_logging::{scout_debug, scout_error, scout_info, scout_warn};

use crate::pagination::wait_until_visible;
use crate::page::{ElementHandle, ElementInfo, Page, SyntheticEvent};
use crate::status::StatusPanel;
use crate::PageError;

/// How many ancestors of a tile are inspected for a click target.
pub const ANCESTOR_DEPTH: usize = 3;

/// A tile together with the element chosen to receive clicks.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickTarget {
    pub tile: ElementHandle,
    pub target: ElementHandle,
    pub target_info: ElementInfo,
    /// The tile's direct parent.
    pub parent: Option<(ElementHandle, ElementInfo)>,
}

fn looks_clickable(info: &ElementInfo) -> bool {
    info.href().is_some()
        || info.has_onclick
        || info.has_clickable_class()
        || info.data_target().is_some()
}

/// Resolve the element that should receive clicks for `tile`.
///
/// Order: the nearest of up to three ancestors that looks clickable, the
/// tile itself if it has a handler or href, the element hit-tested at the
/// tile's center, the last inspected ancestor, the tile.
pub async fn find_clickable_target(
    page: &dyn Page,
    tile: ElementHandle,
) -> Result<ClickTarget, PageError> {
    let tile_info = page.describe(tile).await?;
    let parent = match tile_info.parent {
        Some(handle) => Some((handle, page.describe(handle).await?)),
        None => None,
    };

    let mut current = (tile, tile_info.clone());
    for level in 1..=ANCESTOR_DEPTH {
        let next = match current.1.parent {
            Some(handle) => handle,
            None => break,
        };
        current = (next, page.describe(next).await?);
        if looks_clickable(&current.1) {
            scout_debug!("click target found at ancestor level {level}");
            return Ok(ClickTarget {
                tile,
                target: current.0,
                target_info: current.1,
                parent,
            });
        }
    }

    if tile_info.has_onclick || tile_info.href().is_some() {
        return Ok(ClickTarget {
            tile,
            target: tile,
            target_info: tile_info,
            parent,
        });
    }

    let (x, y) = tile_info.rect.center();
    let (target, target_info) = match page.element_at(x, y).await {
        Ok(Some(hit)) => (hit, page.describe(hit).await?),
        Ok(None) | Err(PageError::Unsupported(_)) => current,
        Err(err) => return Err(err),
    };
    Ok(ClickTarget {
        tile,
        target,
        target_info,
        parent,
    })
}

/// What a strategy did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// Events were dispatched; success is judged by the window count.
    Dispatched,
    /// The strategy opened this URL itself.
    OpenedUrl(String),
    /// Nothing to do for this target.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickStrategy {
    HoverThenClick,
    DirectActivate,
    HoverClickPair,
    OpenHref,
    OpenDataUrl,
    OpenParentDataUrl,
    BroadcastEvents,
    ForceClick,
    ParentClick,
}

impl ClickStrategy {
    pub const ORDER: [ClickStrategy; 9] = [
        ClickStrategy::HoverThenClick,
        ClickStrategy::DirectActivate,
        ClickStrategy::HoverClickPair,
        ClickStrategy::OpenHref,
        ClickStrategy::OpenDataUrl,
        ClickStrategy::OpenParentDataUrl,
        ClickStrategy::BroadcastEvents,
        ClickStrategy::ForceClick,
        ClickStrategy::ParentClick,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ClickStrategy::HoverThenClick => "hover then click",
            ClickStrategy::DirectActivate => "direct activate",
            ClickStrategy::HoverClickPair => "hover/click pair",
            ClickStrategy::OpenHref => "open href",
            ClickStrategy::OpenDataUrl => "open data url",
            ClickStrategy::OpenParentDataUrl => "open parent data url",
            ClickStrategy::BroadcastEvents => "broadcast events",
            ClickStrategy::ForceClick => "force click",
            ClickStrategy::ParentClick => "parent click",
        }
    }

    pub async fn attempt(
        self,
        page: &dyn Page,
        target: &ClickTarget,
        timings: &ClickTimings,
    ) -> Result<Attempt, PageError> {
        let el = target.target;
        match self {
            ClickStrategy::HoverThenClick => {
                for event in [
                    SyntheticEvent::MouseOver,
                    SyntheticEvent::MouseEnter,
                    SyntheticEvent::MouseMove,
                ] {
                    page.dispatch(el, event).await?;
                    tokio::time::sleep(timings.event_gap).await;
                }
                tokio::time::sleep(timings.hover_settle).await;
                for event in [
                    SyntheticEvent::MouseDown,
                    SyntheticEvent::MouseUp,
                    SyntheticEvent::Click,
                ] {
                    page.dispatch(el, event).await?;
                    tokio::time::sleep(timings.event_gap).await;
                }
                Ok(Attempt::Dispatched)
            }
            ClickStrategy::DirectActivate => {
                page.activate(el).await?;
                Ok(Attempt::Dispatched)
            }
            ClickStrategy::HoverClickPair => {
                page.dispatch(el, SyntheticEvent::MouseOver).await?;
                tokio::time::sleep(timings.pair_gap).await;
                page.dispatch(el, SyntheticEvent::Click).await?;
                Ok(Attempt::Dispatched)
            }
            ClickStrategy::OpenHref => open_if_some(page, target.target_info.href()).await,
            ClickStrategy::OpenDataUrl => {
                open_if_some(page, target.target_info.data_target()).await
            }
            ClickStrategy::OpenParentDataUrl => {
                let url = target.parent.as_ref().and_then(|(_, info)| info.data_target());
                open_if_some(page, url).await
            }
            ClickStrategy::BroadcastEvents => {
                for event in [
                    SyntheticEvent::Click,
                    SyntheticEvent::DoubleClick,
                    SyntheticEvent::ContextMenu,
                ] {
                    page.dispatch(el, event).await?;
                }
                Ok(Attempt::Dispatched)
            }
            ClickStrategy::ForceClick => force_click(page, target).await,
            ClickStrategy::ParentClick => match &target.parent {
                Some((parent, _)) if *parent != el => {
                    page.activate(*parent).await?;
                    tokio::time::sleep(timings.parent_settle).await;
                    Ok(Attempt::Dispatched)
                }
                _ => Ok(Attempt::Skipped),
            },
        }
    }
}

async fn open_if_some(page: &dyn Page, url: Option<&str>) -> Result<Attempt, PageError> {
    match url {
        Some(url) => {
            page.open_url(url).await?;
            Ok(Attempt::OpenedUrl(url.to_string()))
        }
        None => Ok(Attempt::Skipped),
    }
}

/// Uncancelable click plus direct handler call on the target, the tile's
/// parent and the tile, stopping at the first element with an href.
async fn force_click(page: &dyn Page, target: &ClickTarget) -> Result<Attempt, PageError> {
    let mut chain: Vec<(ElementHandle, Option<String>)> =
        vec![(target.target, target.target_info.href().map(str::to_string))];
    if let Some((parent, info)) = &target.parent {
        chain.push((*parent, info.href().map(str::to_string)));
    }
    chain.push((target.tile, None));

    for (element, href) in chain {
        if let Err(err) = page.dispatch(element, SyntheticEvent::ForcedClick).await {
            scout_debug!("forced click dispatch failed: {err}");
        }
        if let Err(err) = page.invoke_click_handler(element).await {
            scout_debug!("onclick invocation failed: {err}");
        }
        if let Some(href) = href {
            page.open_url(&href).await?;
            return Ok(Attempt::OpenedUrl(href));
        }
    }
    Ok(Attempt::Dispatched)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Succeeded {
        strategy: ClickStrategy,
        opened: Option<String>,
    },
    Exhausted,
}

/// Totals for one tile run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileReport {
    pub tiles: usize,
    pub clicked: usize,
    pub exhausted: usize,
    pub failed: usize,
}

pub struct InteractionSimulator {
    timings: ClickTimings,
    strategies: Vec<ClickStrategy>,
    visibility_poll: Duration,
}

impl InteractionSimulator {
    pub fn new(timings: ClickTimings) -> Self {
        Self {
            timings,
            strategies: ClickStrategy::ORDER.to_vec(),
            visibility_poll: Duration::from_secs(1),
        }
    }

    pub fn with_visibility_poll(mut self, poll: Duration) -> Self {
        self.visibility_poll = poll;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<ClickStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Run strategies in order until one succeeds. A strategy succeeds when
    /// the window count grew after its settle delay, or when it opened a
    /// URL itself.
    pub async fn first_success(
        &self,
        page: &dyn Page,
        target: &ClickTarget,
    ) -> ClickOutcome {
        let windows_before = page.window_count().await.ok();
        for (index, strategy) in self.strategies.iter().copied().enumerate() {
            scout_debug!("trying click strategy {} ({})", index + 1, strategy.name());
            let attempt = match strategy.attempt(page, target, &self.timings).await {
                Ok(attempt) => attempt,
                Err(err) => {
                    scout_warn!("click strategy {} failed: {err}", strategy.name());
                    continue;
                }
            };
            if attempt == Attempt::Skipped {
                continue;
            }
            tokio::time::sleep(self.timings.settle).await;

            let windows_after = page.window_count().await.ok();
            let grew = matches!((windows_before, windows_after), (Some(b), Some(a)) if a > b);
            if grew {
                return ClickOutcome::Succeeded {
                    strategy,
                    opened: None,
                };
            }
            if let Attempt::OpenedUrl(url) = attempt {
                return ClickOutcome::Succeeded {
                    strategy,
                    opened: Some(url),
                };
            }
        }
        ClickOutcome::Exhausted
    }

    /// Collect the tiles matching `selector` and click each in turn. Tiles
    /// are only collected once the page is visible.
    pub async fn run(
        &self,
        page: &dyn Page,
        selector: &str,
        pre_click_pause: Duration,
        panel: &mut StatusPanel,
    ) -> Result<TileReport, PageError> {
        wait_until_visible(page, panel, self.visibility_poll, 0, 0).await?;
        let tiles = page.query_all(selector).await?;
        let mut report = TileReport {
            tiles: tiles.len(),
            ..TileReport::default()
        };
        scout_info!("collected {} tiles for {selector}", tiles.len());
        panel
            .show(
                RunStatus::Completed,
                tiles.len(),
                100,
                format!("Preparing to click {} images", tiles.len()),
            )
            .await;
        tokio::time::sleep(pre_click_pause).await;

        for (index, tile) in tiles.iter().copied().enumerate() {
            match find_clickable_target(page, tile).await {
                Ok(target) => match self.first_success(page, &target).await {
                    ClickOutcome::Succeeded { strategy, opened } => {
                        scout_info!(
                            "tile {} opened via {}{}",
                            index + 1,
                            strategy.name(),
                            opened.map(|url| format!(" ({url})")).unwrap_or_default()
                        );
                        report.clicked += 1;
                    }
                    ClickOutcome::Exhausted => {
                        scout_warn!("all click strategies failed for tile {}", index + 1);
                        report.exhausted += 1;
                    }
                },
                Err(err) => {
                    scout_error!("error processing tile {}: {err}", index + 1);
                    report.failed += 1;
                }
            }
            panel
                .show(
                    RunStatus::Running,
                    tiles.len(),
                    100,
                    format!("Processed {} / {}", index + 1, tiles.len()),
                )
                .await;
            tokio::time::sleep(self.timings.inter_tile_delay).await;
        }

        panel
            .show(
                RunStatus::Completed,
                tiles.len(),
                100,
                format!("Clicked {} images", report.clicked),
            )
            .await;
        Ok(report)
    }
}
