use scout_core::{AnchorSpec, CandidateSet, Extraction, ScriptId, TitleRule};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Pure link extraction over one document snapshot.
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("invalid selector `{0}`")]
    Selector(String),
    #[error("invalid item pattern `{0}`")]
    Pattern(String),
    #[error("invalid base url `{0}`")]
    BaseUrl(String),
    #[error("{0} has no static extractor")]
    NotStatic(ScriptId),
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|_| ExtractError::Selector(selector.to_string()))
}

/// Anchor-style rule: one URL attribute per matching element, filtered by
/// the predicates of its [`AnchorSpec`].
#[derive(Debug)]
pub struct AnchorRule {
    spec: AnchorSpec,
    selector: Selector,
    base: Option<Url>,
}

impl AnchorRule {
    pub fn new(spec: AnchorSpec) -> Result<Self, ExtractError> {
        let selector = parse_selector(spec.selector)?;
        let base = spec
            .base_url
            .map(|base| Url::parse(base).map_err(|_| ExtractError::BaseUrl(base.to_string())))
            .transpose()?;
        Ok(Self {
            spec,
            selector,
            base,
        })
    }

    fn candidate(&self, element: ElementRef<'_>) -> Option<String> {
        let el = element.value();
        let raw = el.attr(self.spec.url_attr)?.trim();
        if raw.is_empty() {
            return None;
        }
        let url = match &self.base {
            Some(base) => base.join(raw).ok()?.to_string(),
            None => raw.to_string(),
        };

        if self.spec.require_https && !url.starts_with("https") {
            return None;
        }
        if let Some(needle) = self.spec.must_contain {
            if !url.contains(needle) {
                return None;
            }
        }
        if self.spec.exclude.iter().any(|marker| url.contains(marker)) {
            return None;
        }
        let title_ok = match self.spec.title {
            TitleRule::Any => true,
            TitleRule::Required => el.attr("title").is_some_and(|t| !t.trim().is_empty()),
            TitleRule::Forbidden => el.attr("title").is_none(),
        };
        if !title_ok {
            return None;
        }
        if let Some(attr) = self.spec.required_attr {
            el.attr(attr)?;
        }
        Some(url)
    }
}

impl Extractor for AnchorRule {
    fn extract(&self, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        let mut found = CandidateSet::new();
        for element in doc.select(&self.selector) {
            let Some(url) = self.candidate(element) else {
                continue;
            };
            if found.insert(url) && self.spec.first_only {
                break;
            }
        }
        found.into_vec()
    }
}

/// First anchor whose visible text equals a label, e.g. "Visit Website".
#[derive(Debug)]
pub struct VisitLinkRule {
    label: String,
    anchors: Selector,
}

impl VisitLinkRule {
    pub fn new(label: impl Into<String>) -> Result<Self, ExtractError> {
        Ok(Self {
            label: label.into(),
            anchors: parse_selector("a[href]")?,
        })
    }
}

impl Extractor for VisitLinkRule {
    fn extract(&self, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        doc.select(&self.anchors)
            .find(|a| collapse_whitespace(&a.text().collect::<String>()) == self.label)
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.trim().to_string())
            .filter(|href| !href.is_empty())
            .into_iter()
            .collect()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the static extractor for a script, if its extraction is static.
pub fn static_extractor(script: ScriptId) -> Result<Box<dyn Extractor>, ExtractError> {
    match script.extraction() {
        Extraction::Anchors(spec) => Ok(Box::new(AnchorRule::new(spec)?)),
        Extraction::VisitLink { label } => Ok(Box::new(VisitLinkRule::new(label)?)),
        Extraction::Paginated(_) | Extraction::Tiles { .. } => Err(ExtractError::NotStatic(script)),
    }
}
