use std::collections::HashSet;

use regex::Regex;
use scout_core::ScanSpec;

use crate::extract::ExtractError;

/// Scans a serialized document for item identifiers and maps each to its
/// canonical URL.
#[derive(Debug, Clone)]
pub struct ItemScanner {
    pattern: Regex,
    url_template: String,
}

/// One identifier found in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedItem {
    pub id: String,
    pub url: String,
}

impl ItemScanner {
    pub fn new(spec: ScanSpec) -> Result<Self, ExtractError> {
        let pattern =
            Regex::new(spec.pattern).map_err(|_| ExtractError::Pattern(spec.pattern.to_string()))?;
        Ok(Self {
            pattern,
            url_template: spec.url_template.to_string(),
        })
    }

    /// Distinct identifiers of this snapshot, in document order.
    pub fn scan(&self, html: &str) -> Vec<ScannedItem> {
        let mut seen = HashSet::new();
        self.pattern
            .captures_iter(html)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str())
            .filter(|id| seen.insert(*id))
            .map(|id| ScannedItem {
                id: id.to_string(),
                url: self.url_template.replace("{id}", id),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::{Extraction, ScriptId};

    fn scanner(script: ScriptId) -> ItemScanner {
        match script.extraction() {
            Extraction::Paginated(spec) => ItemScanner::new(spec).unwrap(),
            other => panic!("{script} is not paginated: {other:?}"),
        }
    }

    #[test]
    fn product_hunt_ids_map_to_redirect_urls() {
        let html = r#"<section data-test="post-item-101"></section>
            <section data-test="post-item-202"><a data-test="post-item-101"></a></section>"#;
        let items = scanner(ScriptId::ProductHunt).scan(html);
        assert_eq!(
            items,
            vec![
                ScannedItem {
                    id: "101".into(),
                    url: "https://www.producthunt.com/r/p/101".into()
                },
                ScannedItem {
                    id: "202".into(),
                    url: "https://www.producthunt.com/r/p/202".into()
                },
            ]
        );
    }

    #[test]
    fn peerlist_paths_are_absolutised_without_double_slash() {
        let html = r#"<a href="/jane/project/notes">x</a><a href="/bob/project/kite">y</a>"#;
        let urls: Vec<_> = scanner(ScriptId::Peerlist)
            .scan(html)
            .into_iter()
            .map(|item| item.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://peerlist.io/jane/project/notes",
                "https://peerlist.io/bob/project/kite"
            ]
        );
    }
}
