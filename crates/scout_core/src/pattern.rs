use std::fmt;

use url::Url;

/// A page match pattern of the form `scheme://host/path`, where `*` in the
/// path (which includes the query string) matches any run of characters.
///
/// `https://fazier.com/launches/*` matches every launch page, while
/// `https://www.tinylaunch.com/` matches the home page only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    scheme: String,
    host: String,
    path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError(pub String);

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid match pattern: {}", self.0)
    }
}

impl std::error::Error for PatternError {}

impl UrlPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let (scheme, rest) = pattern
            .split_once("://")
            .ok_or_else(|| PatternError(pattern.to_string()))?;
        let (host, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => return Err(PatternError(pattern.to_string())),
        };
        if scheme.is_empty() || host.is_empty() {
            return Err(PatternError(pattern.to_string()));
        }
        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            path: path.to_string(),
        })
    }

    pub fn matches(&self, url: &Url) -> bool {
        if url.scheme() != self.scheme {
            return false;
        }
        match url.host_str() {
            Some(host) if host.eq_ignore_ascii_case(&self.host) => {}
            _ => return false,
        }
        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        glob_match(&self.path, &target)
    }

    pub fn matches_str(&self, url: &str) -> bool {
        Url::parse(url).map(|u| self.matches(&u)).unwrap_or(false)
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host, self.path)
    }
}

/// Glob match where `*` matches any sequence (including `/`).
fn glob_match(pattern: &str, text: &str) -> bool {
    let pieces: Vec<&str> = pattern.split('*').collect();
    if pieces.len() == 1 {
        return pattern == text;
    }

    let first = pieces[0];
    let last = pieces[pieces.len() - 1];
    if !text.starts_with(first) || text.len() < first.len() + last.len() {
        return false;
    }
    if !text.ends_with(last) {
        return false;
    }

    let mut cursor = first.len();
    let end = text.len() - last.len();
    for piece in &pieces[1..pieces.len() - 1] {
        if piece.is_empty() {
            continue;
        }
        match text[cursor..end].find(piece) {
            Some(offset) => cursor += offset + piece.len(),
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> UrlPattern {
        UrlPattern::parse(p).unwrap()
    }

    #[test]
    fn exact_path_requires_exact_match() {
        let p = pattern("https://www.tinylaunch.com/");
        assert!(p.matches_str("https://www.tinylaunch.com/"));
        assert!(!p.matches_str("https://www.tinylaunch.com/about"));
    }

    #[test]
    fn query_is_part_of_the_path() {
        let p = pattern("https://firsto.co/trending?filter=today");
        assert!(p.matches_str("https://firsto.co/trending?filter=today"));
        assert!(!p.matches_str("https://firsto.co/trending?filter=week"));
    }

    #[test]
    fn wildcards_span_segments() {
        let p = pattern("https://www.producthunt.com/leaderboard/daily/*/*/*/*");
        assert!(p.matches_str("https://www.producthunt.com/leaderboard/daily/2026/10/18/all"));
        assert!(!p.matches_str("https://www.producthunt.com/leaderboard/weekly/2026/42"));
    }

    #[test]
    fn host_and_scheme_must_match() {
        let p = pattern("https://peerpush.net/p/*");
        assert!(!p.matches_str("http://peerpush.net/p/x"));
        assert!(!p.matches_str("https://evil.net/p/x"));
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(UrlPattern::parse("peerpush.net/p/*").is_err());
        assert!(UrlPattern::parse("https://peerpush.net").is_err());
    }
}
