//! A fetched document standing in for a live page.
//!
//! Snapshots never scroll, never hide and never run page scripts. Element
//! handles index a table built once, in document order, at construction.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use scout_core::ScrollGeometry;
use scout_logging::scout_info;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::mpsc;
use url::Url;

use crate::page::{ElementHandle, ElementInfo, Page, SyntheticEvent};
use crate::tabs::OpenedPage;
use crate::PageError;

const VIEWPORT_HEIGHT: f64 = 900.0;
const DOCUMENT_HEIGHT: u64 = 2000;

pub struct SnapshotPage {
    url: String,
    html: String,
    elements: Vec<ElementInfo>,
    scroll_y: Mutex<f64>,
    opened: Mutex<Vec<String>>,
    listener: Option<mpsc::UnboundedSender<OpenedPage>>,
}

impl SnapshotPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        let html = html.into();
        let elements = element_table(&html, Url::parse(&url).ok().as_ref());
        Self {
            url,
            html,
            elements,
            scroll_y: Mutex::new(0.0),
            opened: Mutex::new(Vec::new()),
            listener: None,
        }
    }

    /// Report every `window.open` to `listener`.
    pub fn with_listener(mut self, listener: mpsc::UnboundedSender<OpenedPage>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn info(&self, element: ElementHandle) -> Result<&ElementInfo, PageError> {
        usize::try_from(element.0)
            .ok()
            .and_then(|index| self.elements.get(index))
            .ok_or(PageError::Detached(element))
    }
}

fn element_table(html: &str, base: Option<&Url>) -> Vec<ElementInfo> {
    let document = Html::parse_document(html);
    let elements: Vec<ElementRef<'_>> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect();
    let index: HashMap<_, usize> = elements
        .iter()
        .enumerate()
        .map(|(i, el)| (el.id(), i))
        .collect();

    elements
        .iter()
        .map(|el| {
            let value = el.value();
            let attr = |name: &str| value.attr(name).map(str::to_string);
            let href = match value.name() {
                "a" | "area" => value.attr("href").map(|raw| match base {
                    Some(base) => base
                        .join(raw)
                        .map(String::from)
                        .unwrap_or_else(|_| raw.to_string()),
                    None => raw.to_string(),
                }),
                _ => None,
            };
            let parent = el
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|p| index.get(&p.id()))
                .map(|i| ElementHandle(*i as u64));
            ElementInfo {
                tag: value.name().to_string(),
                href,
                has_onclick: value.attr("onclick").is_some(),
                class_name: attr("class").unwrap_or_default(),
                data_href: attr("data-href"),
                data_url: attr("data-url"),
                data_link: attr("data-link"),
                parent,
                ..ElementInfo::default()
            }
        })
        .collect()
}

fn matching_indices(html: &str, selector: &str) -> Result<Vec<u64>, PageError> {
    let selector = Selector::parse(selector)
        .map_err(|err| PageError::Script(format!("invalid selector {selector}: {err}")))?;
    let document = Html::parse_document(html);
    let index: HashMap<_, u64> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .enumerate()
        .map(|(i, el)| (el.id(), i as u64))
        .collect();
    Ok(document
        .select(&selector)
        .filter_map(|el| index.get(&el.id()).copied())
        .collect())
}

#[async_trait]
impl Page for SnapshotPage {
    async fn html(&self) -> Result<String, PageError> {
        Ok(self.html.clone())
    }

    async fn metrics(&self) -> Result<ScrollGeometry, PageError> {
        let scroll_y = *self
            .scroll_y
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(ScrollGeometry {
            viewport_height: VIEWPORT_HEIGHT,
            scroll_y,
            document_height: DOCUMENT_HEIGHT,
        })
    }

    async fn scroll_to(&self, y: f64) -> Result<(), PageError> {
        let max = DOCUMENT_HEIGHT as f64 - VIEWPORT_HEIGHT;
        *self
            .scroll_y
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = y.clamp(0.0, max);
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, PageError> {
        Ok(matching_indices(&self.html, selector)?
            .into_iter()
            .map(ElementHandle)
            .collect())
    }

    async fn describe(&self, element: ElementHandle) -> Result<ElementInfo, PageError> {
        self.info(element).cloned()
    }

    async fn element_at(&self, _x: f64, _y: f64) -> Result<Option<ElementHandle>, PageError> {
        Ok(None)
    }

    async fn dispatch(
        &self,
        element: ElementHandle,
        _event: SyntheticEvent,
    ) -> Result<(), PageError> {
        self.info(element).map(|_| ())
    }

    async fn activate(&self, element: ElementHandle) -> Result<(), PageError> {
        self.info(element).map(|_| ())
    }

    async fn invoke_click_handler(&self, element: ElementHandle) -> Result<bool, PageError> {
        Ok(self.info(element)?.has_onclick)
    }

    async fn open_url(&self, url: &str) -> Result<(), PageError> {
        scout_info!("window.open {url}");
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());
        if let Some(listener) = &self.listener {
            let _ = listener.send(OpenedPage {
                tab_id: None,
                url: url.to_string(),
            });
        }
        Ok(())
    }

    async fn window_count(&self) -> Result<usize, PageError> {
        Ok(1 + self
            .opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILES: &str = r#"<html><body><div id="launches">
        <a href="/p/one"><img src="1.png"></a>
        <div class="card" data-href="https://two.example"><img src="2.png"></div>
    </div></body></html>"#;

    #[tokio::test]
    async fn handles_resolve_to_elements_with_parents() {
        let page = SnapshotPage::new("https://peerpush.net/", TILES);
        let tiles = page.query_all("#launches img").await.unwrap();
        assert_eq!(tiles.len(), 2);

        let first = page.describe(tiles[0]).await.unwrap();
        assert_eq!(first.tag, "img");
        let anchor = page.describe(first.parent.unwrap()).await.unwrap();
        assert_eq!(anchor.href.as_deref(), Some("https://peerpush.net/p/one"));

        let second = page.describe(tiles[1]).await.unwrap();
        let card = page.describe(second.parent.unwrap()).await.unwrap();
        assert_eq!(card.data_target(), Some("https://two.example"));
    }

    #[tokio::test]
    async fn window_open_is_recorded_and_counted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let page = SnapshotPage::new("https://peerpush.net/", TILES).with_listener(tx);
        assert_eq!(page.window_count().await.unwrap(), 1);
        page.open_url("https://two.example").await.unwrap();
        assert_eq!(page.window_count().await.unwrap(), 2);
        assert_eq!(rx.recv().await.unwrap().url, "https://two.example");
    }

    #[tokio::test]
    async fn unknown_handles_are_detached() {
        let page = SnapshotPage::new("https://a.com/", "<p>x</p>");
        assert_eq!(
            page.describe(ElementHandle(999)).await,
            Err(PageError::Detached(ElementHandle(999)))
        );
    }
}
