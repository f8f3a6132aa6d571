//! The live document a content script runs against.
//!
//! Only [`Page::html`] and [`Page::metrics`] are required; static snapshots
//! answer nothing else. Interactive backends (CDP) override the rest.

use async_trait::async_trait;
use scout_core::ScrollGeometry;

use crate::PageError;

/// Opaque reference to an element inside one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Attributes of an element that matter when deciding how to click it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementInfo {
    pub tag: String,
    /// Resolved `href` property, if the element has one.
    pub href: Option<String>,
    /// An `onclick` property or attribute is present.
    pub has_onclick: bool,
    pub class_name: String,
    pub data_href: Option<String>,
    pub data_url: Option<String>,
    pub data_link: Option<String>,
    pub parent: Option<ElementHandle>,
    pub rect: Rect,
}

impl ElementInfo {
    /// The first non-empty of `data-href`, `data-link`, `data-url`.
    pub fn data_target(&self) -> Option<&str> {
        [&self.data_href, &self.data_link, &self.data_url]
            .into_iter()
            .filter_map(|value| value.as_deref())
            .find(|url| !url.is_empty())
    }

    pub fn has_clickable_class(&self) -> bool {
        ["click", "link", "button"]
            .iter()
            .any(|hint| self.class_name.contains(hint))
    }

    pub fn href(&self) -> Option<&str> {
        self.href.as_deref().filter(|href| !href.is_empty())
    }
}

/// Synthetic DOM events dispatched by click strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticEvent {
    MouseOver,
    MouseEnter,
    MouseMove,
    MouseDown,
    MouseUp,
    Click,
    /// A click event that listeners cannot cancel.
    ForcedClick,
    DoubleClick,
    ContextMenu,
}

impl SyntheticEvent {
    pub fn dom_name(self) -> &'static str {
        match self {
            SyntheticEvent::MouseOver => "mouseover",
            SyntheticEvent::MouseEnter => "mouseenter",
            SyntheticEvent::MouseMove => "mousemove",
            SyntheticEvent::MouseDown => "mousedown",
            SyntheticEvent::MouseUp => "mouseup",
            SyntheticEvent::Click | SyntheticEvent::ForcedClick => "click",
            SyntheticEvent::DoubleClick => "dblclick",
            SyntheticEvent::ContextMenu => "contextmenu",
        }
    }

    pub fn cancelable(self) -> bool {
        !matches!(self, SyntheticEvent::ForcedClick)
    }
}

#[async_trait]
pub trait Page: Send + Sync {
    /// Serialized document as currently rendered.
    async fn html(&self) -> Result<String, PageError>;

    async fn metrics(&self) -> Result<ScrollGeometry, PageError>;

    async fn is_hidden(&self) -> Result<bool, PageError> {
        Ok(false)
    }

    /// Smooth-scroll the window to the given vertical offset.
    async fn scroll_to(&self, _y: f64) -> Result<(), PageError> {
        Err(PageError::Unsupported("scrolling"))
    }

    async fn query_all(&self, _selector: &str) -> Result<Vec<ElementHandle>, PageError> {
        Err(PageError::Unsupported("element queries"))
    }

    async fn describe(&self, _element: ElementHandle) -> Result<ElementInfo, PageError> {
        Err(PageError::Unsupported("element inspection"))
    }

    /// Topmost element at a viewport point.
    async fn element_at(&self, _x: f64, _y: f64) -> Result<Option<ElementHandle>, PageError> {
        Err(PageError::Unsupported("hit testing"))
    }

    async fn dispatch(
        &self,
        _element: ElementHandle,
        _event: SyntheticEvent,
    ) -> Result<(), PageError> {
        Err(PageError::Unsupported("event dispatch"))
    }

    /// Native `element.click()`.
    async fn activate(&self, _element: ElementHandle) -> Result<(), PageError> {
        Err(PageError::Unsupported("activation"))
    }

    /// Call the element's `onclick` handler directly. Returns whether one ran.
    async fn invoke_click_handler(&self, _element: ElementHandle) -> Result<bool, PageError> {
        Err(PageError::Unsupported("handler invocation"))
    }

    /// `window.open(url, "_blank")`.
    async fn open_url(&self, _url: &str) -> Result<(), PageError> {
        Err(PageError::Unsupported("opening windows"))
    }

    /// Number of windows/frames reachable from this page.
    async fn window_count(&self) -> Result<usize, PageError> {
        Err(PageError::Unsupported("window counting"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_target_prefers_href_then_link_then_url() {
        let info = ElementInfo {
            data_url: Some("https://u".into()),
            data_link: Some("https://l".into()),
            ..ElementInfo::default()
        };
        assert_eq!(info.data_target(), Some("https://l"));

        let info = ElementInfo {
            data_href: Some("https://h".into()),
            data_link: Some("https://l".into()),
            ..ElementInfo::default()
        };
        assert_eq!(info.data_target(), Some("https://h"));
    }

    #[test]
    fn empty_data_attributes_are_skipped() {
        let info = ElementInfo {
            data_href: Some(String::new()),
            data_url: Some("https://u.example".into()),
            ..ElementInfo::default()
        };
        assert_eq!(info.data_target(), Some("https://u.example"));

        let info = ElementInfo {
            data_href: Some(String::new()),
            data_link: Some(String::new()),
            ..ElementInfo::default()
        };
        assert_eq!(info.data_target(), None);
    }

    #[test]
    fn clickable_class_hints() {
        let info = ElementInfo {
            class_name: "card card-link".into(),
            ..ElementInfo::default()
        };
        assert!(info.has_clickable_class());
        assert!(!ElementInfo::default().has_clickable_class());
    }
}
