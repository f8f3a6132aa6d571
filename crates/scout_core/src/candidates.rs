use std::collections::HashSet;

/// Ordered, duplicate-free collection of candidate URLs gathered during one run.
///
/// Insertion order is output order. Plain inserts deduplicate by exact URL
/// string; keyed inserts (used while paginating) deduplicate by an item
/// identifier so the same item found in several DOM locations is kept once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    urls: Vec<String>,
    seen_urls: HashSet<String>,
    seen_keys: HashSet<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a URL, deduplicated by exact string. Returns `true` when added.
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.seen_urls.contains(&url) {
            return false;
        }
        self.seen_urls.insert(url.clone());
        self.urls.push(url);
        true
    }

    /// Insert a URL under an item identifier. Returns `true` when added.
    pub fn insert_keyed(&mut self, key: impl Into<String>, url: impl Into<String>) -> bool {
        let key = key.into();
        if self.seen_keys.contains(&key) {
            return false;
        }
        if !self.insert(url) {
            return false;
        }
        self.seen_keys.insert(key);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen_urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }

    pub fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

impl<S: Into<String>> FromIterator<S> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = CandidateSet::new();
        for url in iter {
            set.insert(url);
        }
        set
    }
}

impl<S: Into<String>> Extend<S> for CandidateSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for url in iter {
            self.insert(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_inserts_keep_first_occurrence_order() {
        let set: CandidateSet = ["https://b.com", "https://a.com", "https://b.com"]
            .into_iter()
            .collect();
        assert_eq!(set.as_slice(), ["https://b.com", "https://a.com"]);
    }

    #[test]
    fn keyed_inserts_skip_known_identifiers() {
        let mut set = CandidateSet::new();
        assert!(set.insert_keyed("42", "https://x.com/r/p/42"));
        assert!(!set.insert_keyed("42", "https://x.com/r/p/42?again"));
        assert_eq!(set.len(), 1);
    }
}
