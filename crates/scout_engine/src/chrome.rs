//! Chromium over CDP: live pages, real tabs and an in-page status overlay.
//!
//! Elements are addressed by a `data-scout-id` attribute stamped on them the
//! first time a query returns them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateTargetParams, EventTargetCreated, EventTargetInfoChanged, TargetId,
};
use chromiumoxide::{Browser, BrowserConfig};
use futures_util::StreamExt;
use scout_core::{ScrollGeometry, StatusView, TabId};
use scout_logging::{scout_debug, scout_info, scout_warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::orchestrator::TabPlatform;
use crate::page::{ElementHandle, ElementInfo, Page, Rect, SyntheticEvent};
use crate::status::StatusSink;
use crate::tabs::OpenedPage;
use crate::{PageError, TabError};

#[derive(Debug, Clone, Default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub executable: Option<std::path::PathBuf>,
    pub args: Vec<String>,
}

const ATTACH_ATTEMPTS: u32 = 10;
const ATTACH_RETRY: Duration = Duration::from_millis(200);

/// Where a newly created target shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A focused tab in the current window.
    Foreground,
    /// A tab that does not take focus.
    Background,
    NewWindow,
}

fn target_params(url: &str, placement: Placement) -> Result<CreateTargetParams, TabError> {
    let builder = CreateTargetParams::builder().url(url);
    let builder = match placement {
        Placement::Foreground => builder,
        Placement::Background => builder.background(true),
        Placement::NewWindow => builder.new_window(true),
    };
    builder.build().map_err(TabError::Create)
}

/// Targets opened by another page, as opposed to ones created over CDP.
fn is_popup(kind: &str, has_opener: bool) -> bool {
    kind == "page" && has_opener
}

fn is_web_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// A launched Chromium and the task pumping its CDP connection.
pub struct ChromeBrowser {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

impl ChromeBrowser {
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, TabError> {
        let mut builder = BrowserConfig::builder();
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.executable {
            builder = builder.chrome_executable(path);
        }
        builder = builder
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        for arg in &settings.args {
            builder = builder.arg(arg);
        }
        let config = builder.build().map_err(TabError::Platform)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| TabError::Platform(err.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        scout_info!("browser launched (headless={})", settings.headless);
        Ok(Self {
            browser: Arc::new(browser),
            handler,
        })
    }

    /// Open `url` in a new target and wrap it as a [`Page`].
    pub async fn open(&self, url: &str, placement: Placement) -> Result<ChromePage, TabError> {
        let page = self
            .browser
            .new_page(target_params(url, placement)?)
            .await
            .map_err(|err| TabError::Create(err.to_string()))?;
        Ok(ChromePage::new(page, Arc::clone(&self.browser)))
    }

    /// Tab platform over this browser. With a listener, pages that other
    /// pages open are adopted as tabs and reported too.
    pub async fn tabs(
        &self,
        listener: Option<mpsc::UnboundedSender<OpenedPage>>,
    ) -> Result<ChromeTabs, TabError> {
        let table = Arc::new(TabTable::default());
        let popups = match &listener {
            Some(listener) => Some(
                watch_popups(
                    Arc::clone(&self.browser),
                    Arc::clone(&table),
                    listener.clone(),
                )
                .await?,
            ),
            None => None,
        };
        Ok(ChromeTabs {
            browser: Arc::clone(&self.browser),
            table,
            listener,
            popups,
        })
    }
}

impl Drop for ChromeBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

fn script_error(err: impl std::fmt::Display) -> PageError {
    PageError::Script(err.to_string())
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Wrap `body` so it runs with `el` bound to the tagged element, or yields
/// `null` when the element is gone.
fn with_element(element: ElementHandle, body: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector('[data-scout-id="{}"]');
            if (!el) return null;
            {body}
        }})()"#,
        element.0
    )
}

const TAG_FN: &str = r#"
    const tag = (el) => {
        if (!el) return null;
        if (!el.dataset.scoutId) {
            window.__scoutNext = (window.__scoutNext || 0) + 1;
            el.dataset.scoutId = String(window.__scoutNext);
        }
        return Number(el.dataset.scoutId);
    };
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfo {
    tag: String,
    href: Option<String>,
    has_onclick: bool,
    class_name: String,
    data_href: Option<String>,
    data_url: Option<String>,
    data_link: Option<String>,
    parent: Option<u64>,
    rect: [f64; 4],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetrics {
    viewport_height: f64,
    scroll_y: f64,
    document_height: f64,
}

pub struct ChromePage {
    page: chromiumoxide::Page,
    browser: Arc<Browser>,
}

impl ChromePage {
    fn new(page: chromiumoxide::Page, browser: Arc<Browser>) -> Self {
        Self { page, browser }
    }

    pub fn inner(&self) -> &chromiumoxide::Page {
        &self.page
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, PageError> {
        self.page
            .evaluate(script)
            .await
            .map_err(script_error)?
            .into_value::<T>()
            .map_err(script_error)
    }

    async fn eval_on<T: DeserializeOwned>(
        &self,
        element: ElementHandle,
        body: &str,
    ) -> Result<T, PageError> {
        let value: Option<T> = self.eval(with_element(element, body)).await?;
        value.ok_or(PageError::Detached(element))
    }
}

#[async_trait]
impl Page for ChromePage {
    async fn html(&self) -> Result<String, PageError> {
        self.page.content().await.map_err(script_error)
    }

    async fn metrics(&self) -> Result<ScrollGeometry, PageError> {
        let raw: RawMetrics = self
            .eval(
                "({ viewportHeight: window.innerHeight, scrollY: window.scrollY, \
                 documentHeight: document.body ? document.body.scrollHeight : 0 })"
                    .to_string(),
            )
            .await?;
        Ok(ScrollGeometry {
            viewport_height: raw.viewport_height,
            scroll_y: raw.scroll_y,
            document_height: raw.document_height.max(0.0) as u64,
        })
    }

    async fn is_hidden(&self) -> Result<bool, PageError> {
        self.eval("document.hidden".to_string()).await
    }

    async fn scroll_to(&self, y: f64) -> Result<(), PageError> {
        self.eval::<serde_json::Value>(format!(
            "(() => {{ window.scrollTo({{ top: {y}, behavior: 'smooth' }}); return true; }})()"
        ))
        .await
        .map(|_| ())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, PageError> {
        let ids: Vec<u64> = self
            .eval(format!(
                "(() => {{ {TAG_FN} return Array.from(document.querySelectorAll({})).map(tag); }})()",
                js_string(selector)
            ))
            .await?;
        Ok(ids.into_iter().map(ElementHandle).collect())
    }

    async fn describe(&self, element: ElementHandle) -> Result<ElementInfo, PageError> {
        let body = format!(
            r#"{TAG_FN}
            const r = el.getBoundingClientRect();
            return {{
                tag: el.tagName.toLowerCase(),
                href: typeof el.href === 'string' ? el.href : null,
                hasOnclick: typeof el.onclick === 'function' || el.hasAttribute('onclick'),
                className: typeof el.className === 'string' ? el.className : '',
                dataHref: el.getAttribute('data-href'),
                dataUrl: el.getAttribute('data-url'),
                dataLink: el.getAttribute('data-link'),
                parent: tag(el.parentElement),
                rect: [r.left, r.top, r.width, r.height],
            }};"#
        );
        let raw: RawInfo = self.eval_on(element, &body).await?;
        Ok(ElementInfo {
            tag: raw.tag,
            href: raw.href,
            has_onclick: raw.has_onclick,
            class_name: raw.class_name,
            data_href: raw.data_href,
            data_url: raw.data_url,
            data_link: raw.data_link,
            parent: raw.parent.map(ElementHandle),
            rect: Rect {
                x: raw.rect[0],
                y: raw.rect[1],
                width: raw.rect[2],
                height: raw.rect[3],
            },
        })
    }

    async fn element_at(&self, x: f64, y: f64) -> Result<Option<ElementHandle>, PageError> {
        let id: Option<u64> = self
            .eval(format!(
                "(() => {{ {TAG_FN} return tag(document.elementFromPoint({x}, {y})); }})()"
            ))
            .await?;
        Ok(id.map(ElementHandle))
    }

    async fn dispatch(&self, element: ElementHandle, event: SyntheticEvent) -> Result<(), PageError> {
        let body = format!(
            r#"const r = el.getBoundingClientRect();
            el.dispatchEvent(new MouseEvent('{}', {{
                view: window, bubbles: true, cancelable: {}, button: 0,
                clientX: r.left + r.width / 2, clientY: r.top + r.height / 2,
            }}));
            return true;"#,
            event.dom_name(),
            event.cancelable()
        );
        self.eval_on::<bool>(element, &body).await.map(|_| ())
    }

    async fn activate(&self, element: ElementHandle) -> Result<(), PageError> {
        self.eval_on::<bool>(element, "el.click(); return true;")
            .await
            .map(|_| ())
    }

    async fn invoke_click_handler(&self, element: ElementHandle) -> Result<bool, PageError> {
        self.eval_on(
            element,
            "if (typeof el.onclick !== 'function') return false; \
             el.onclick.call(el, new MouseEvent('click')); return true;",
        )
        .await
    }

    async fn open_url(&self, url: &str) -> Result<(), PageError> {
        self.eval::<serde_json::Value>(format!(
            "(() => {{ window.open({}, '_blank'); return true; }})()",
            js_string(url)
        ))
        .await
        .map(|_| ())
    }

    async fn window_count(&self) -> Result<usize, PageError> {
        self.browser
            .pages()
            .await
            .map(|pages| pages.len())
            .map_err(script_error)
    }
}

#[derive(Default)]
struct TabTable {
    last_id: AtomicU64,
    pages: Mutex<BTreeMap<TabId, chromiumoxide::Page>>,
}

impl TabTable {
    fn lock(&self) -> MutexGuard<'_, BTreeMap<TabId, chromiumoxide::Page>> {
        self.pages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, page: chromiumoxide::Page) -> TabId {
        let tab_id = self.last_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().insert(tab_id, page);
        tab_id
    }
}

async fn attach(browser: &Browser, target: TargetId) -> Result<chromiumoxide::Page, TabError> {
    let mut last_error = String::new();
    for _ in 0..ATTACH_ATTEMPTS {
        match browser.get_page(target.clone()).await {
            Ok(page) => return Ok(page),
            Err(err) => last_error = err.to_string(),
        }
        tokio::time::sleep(ATTACH_RETRY).await;
    }
    Err(TabError::Platform(last_error))
}

/// Adopt every page another page opens once it has navigated to a web URL.
async fn watch_popups(
    browser: Arc<Browser>,
    table: Arc<TabTable>,
    listener: mpsc::UnboundedSender<OpenedPage>,
) -> Result<JoinHandle<()>, TabError> {
    let mut created = browser
        .event_listener::<EventTargetCreated>()
        .await
        .map_err(|err| TabError::Platform(err.to_string()))?;
    let mut changed = browser
        .event_listener::<EventTargetInfoChanged>()
        .await
        .map_err(|err| TabError::Platform(err.to_string()))?;
    Ok(tokio::spawn(async move {
        // Popups that have not reached a web URL yet.
        let mut pending: BTreeSet<String> = BTreeSet::new();
        loop {
            let info = tokio::select! {
                Some(event) = created.next() => {
                    let info = event.target_info.clone();
                    if is_popup(&info.r#type, info.opener_id.is_some()) {
                        pending.insert(info.target_id.inner().clone());
                    }
                    info
                }
                Some(event) = changed.next() => event.target_info.clone(),
                else => break,
            };
            if !is_web_url(&info.url) || !pending.remove(info.target_id.inner()) {
                continue;
            }
            match attach(&browser, info.target_id.clone()).await {
                Ok(page) => {
                    let tab_id = table.insert(page);
                    scout_debug!("adopted {} as tab {tab_id}", info.url);
                    let opened = OpenedPage {
                        tab_id: Some(tab_id),
                        url: info.url.clone(),
                    };
                    if listener.send(opened).is_err() {
                        break;
                    }
                }
                Err(err) => scout_warn!("could not attach to {}: {err}", info.url),
            }
        }
    }))
}

/// Tabs of a launched browser.
pub struct ChromeTabs {
    browser: Arc<Browser>,
    table: Arc<TabTable>,
    listener: Option<mpsc::UnboundedSender<OpenedPage>>,
    popups: Option<JoinHandle<()>>,
}

impl Drop for ChromeTabs {
    fn drop(&mut self) {
        if let Some(popups) = &self.popups {
            popups.abort();
        }
    }
}

impl ChromeTabs {
    fn lock(&self) -> MutexGuard<'_, BTreeMap<TabId, chromiumoxide::Page>> {
        self.table.lock()
    }

    /// Live page of a tab this platform created.
    pub fn page(&self, tab_id: TabId) -> Option<ChromePage> {
        let page = self.lock().get(&tab_id).cloned()?;
        Some(ChromePage::new(page, Arc::clone(&self.browser)))
    }
}

#[async_trait]
impl TabPlatform for ChromeTabs {
    async fn create_tab(&self, url: &str, active: bool) -> Result<TabId, TabError> {
        let placement = if active {
            Placement::Foreground
        } else {
            Placement::Background
        };
        let page = self
            .browser
            .new_page(target_params(url, placement)?)
            .await
            .map_err(|err| TabError::Create(err.to_string()))?;
        if active {
            if let Err(err) = page.bring_to_front().await {
                scout_warn!("could not focus new tab: {err}");
            }
        }
        let tab_id = self.table.insert(page);
        if let Some(listener) = &self.listener {
            let _ = listener.send(OpenedPage {
                tab_id: Some(tab_id),
                url: url.to_string(),
            });
        }
        Ok(tab_id)
    }

    async fn remove_tab(&self, tab_id: TabId) -> Result<(), TabError> {
        let page = self.lock().remove(&tab_id).ok_or(TabError::NotFound(tab_id))?;
        page.close()
            .await
            .map_err(|err| TabError::Platform(err.to_string()))
    }

    async fn find_tab(&self, url: &str) -> Result<Option<TabId>, TabError> {
        let tabs: Vec<(TabId, chromiumoxide::Page)> = self
            .lock()
            .iter()
            .map(|(id, page)| (*id, page.clone()))
            .collect();
        for (tab_id, page) in tabs {
            if let Ok(Some(current)) = page.url().await {
                if current == url {
                    return Ok(Some(tab_id));
                }
            }
        }
        Ok(None)
    }

    async fn activate_tab(&self, tab_id: TabId) -> Result<(), TabError> {
        let page = self.lock().get(&tab_id).cloned().ok_or(TabError::NotFound(tab_id))?;
        page.bring_to_front()
            .await
            .map(|_| ())
            .map_err(|err| TabError::Platform(err.to_string()))
    }
}

/// Renders the run status as a fixed box in the page's top right corner.
pub struct OverlayStatusSink {
    page: chromiumoxide::Page,
}

impl OverlayStatusSink {
    pub fn new(page: &ChromePage) -> Self {
        Self {
            page: page.inner().clone(),
        }
    }
}

#[async_trait]
impl StatusSink for OverlayStatusSink {
    async fn render(&self, view: &StatusView) {
        let script = format!(
            r#"(() => {{
                let box = document.getElementById('scout-status');
                if (!box) {{
                    box = document.createElement('div');
                    box.id = 'scout-status';
                    box.style.cssText = 'position:fixed;top:20px;right:20px;z-index:2147483647;' +
                        'padding:12px 16px;border-radius:8px;color:#fff;font:13px sans-serif;' +
                        'box-shadow:0 4px 12px rgba(0,0,0,.3);max-width:320px';
                    document.body.appendChild(box);
                }}
                box.style.background = {color};
                box.textContent = {text};
                return true;
            }})()"#,
            color = js_string(view.status.color()),
            text = js_string(&view.to_string()),
        );
        if let Err(err) = self.page.evaluate(script).await {
            scout_debug!("status overlay not rendered: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_tabs_do_not_take_focus() {
        let params = target_params("https://a.example/", Placement::Background).unwrap();
        assert_eq!(params.url, "https://a.example/");
        assert_eq!(params.background, Some(true));
        assert_eq!(params.new_window, None);
    }

    #[test]
    fn own_window_targets_ask_for_a_new_window() {
        let params = target_params("https://peerpush.net/", Placement::NewWindow).unwrap();
        assert_eq!(params.new_window, Some(true));
        assert_eq!(params.background, None);

        let params = target_params("https://peerpush.net/", Placement::Foreground).unwrap();
        assert_eq!(params.new_window, None);
        assert_eq!(params.background, None);
    }

    #[test]
    fn only_page_opened_targets_are_popups() {
        assert!(is_popup("page", true));
        assert!(!is_popup("page", false));
        assert!(!is_popup("service_worker", true));
        assert!(is_web_url("https://peerpush.net/p/x"));
        assert!(!is_web_url("about:blank"));
        assert!(!is_web_url(""));
    }
}
