//! Listing snapshots: bounded HTTP downloads decoded to UTF-8 HTML.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use scout_logging::scout_debug;

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

const DEFAULT_USER_AGENT: &str = concat!("launch-scout/", env!("CARGO_PKG_VERSION"));

/// Fetch `url` and decode the body. Returns the final URL with the HTML.
pub async fn fetch_html(fetcher: &dyn Fetcher, url: &str) -> Result<(String, String), FetchError> {
    let FetchOutput { bytes, metadata } = fetcher.fetch(url).await?;
    let html = decode_html(&bytes, metadata.content_type.as_deref())?;
    Ok((metadata.final_url, html))
}

/// Decode raw bytes into UTF-8: BOM, then Content-Type charset, then
/// chardetng detection.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> Result<String, FetchError> {
    let declared = content_type
        .and_then(charset_of)
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    let encoding = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => encoding,
        None => declared.unwrap_or_else(|| {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        }),
    };

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(FetchError::new(
            FailureKind::Decode,
            format!("invalid {} sequence", encoding.name()),
        ));
    }
    Ok(text.into_owned())
}

fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
    })
}

/// `text/html; charset=utf-8` -> `text/html`.
fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or(content_type).trim()
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: ["text/html", "application/xhtml+xml"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl FetchSettings {
    fn accepts(&self, content_type: &str) -> bool {
        let media = media_type(content_type);
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media))
    }

    fn over_limit(&self, actual: u64) -> Option<FetchError> {
        (actual > self.max_bytes).then(|| {
            FetchError::new(
                FailureKind::TooLarge {
                    max_bytes: self.max_bytes,
                    actual: Some(actual),
                },
                "response too large",
            )
        })
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError>;
}

/// [`Fetcher`] over reqwest. Each request gets its own client so its
/// redirect policy can count the hops of that request alone.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn client(&self, hops: Arc<AtomicUsize>) -> Result<reqwest::Client, FetchError> {
        let limit = self.settings.redirect_limit;
        let policy = Policy::custom(move |attempt| {
            let previous = attempt.previous().len();
            hops.store(previous, Ordering::Relaxed);
            if previous < limit {
                attempt.follow()
            } else {
                attempt.error("redirect limit exceeded")
            }
        });
        reqwest::Client::builder()
            .user_agent(self.settings.user_agent.as_str())
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    /// Reject a response by status, declared length or content type before
    /// its body is read. Returns the content type.
    fn screen(&self, response: &reqwest::Response) -> Result<Option<String>, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        if let Some(err) = response
            .content_length()
            .and_then(|len| self.settings.over_limit(len))
        {
            return Err(err);
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        match content_type.as_deref() {
            Some(ct) if !self.settings.accepts(ct) => Err(FetchError::new(
                FailureKind::UnsupportedContentType {
                    content_type: ct.to_string(),
                },
                "unsupported content type",
            )),
            _ => Ok(content_type),
        }
    }

    /// Stream the body, failing as soon as it outgrows the byte limit.
    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(classify)?;
            if let Some(err) = self
                .settings
                .over_limit((body.len() + chunk.len()) as u64)
            {
                return Err(err);
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let target = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let hops = Arc::new(AtomicUsize::new(0));
        let response = self
            .client(Arc::clone(&hops))?
            .get(target)
            .send()
            .await
            .map_err(classify)?;

        let content_type = self.screen(&response)?;
        let final_url = response.url().to_string();
        let bytes = self.read_body(response).await?;
        scout_debug!("fetched {} bytes from {final_url}", bytes.len());

        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url,
                redirect_count: hops.load(Ordering::Relaxed),
                content_type,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::RedirectLimitExceeded
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_header_wins_over_detection() {
        let bytes = [0x63, 0x61, 0x66, 0xe9];
        let html = decode_html(&bytes, Some("text/html; Charset=\"ISO-8859-1\"")).unwrap();
        assert_eq!(html, "café");
    }

    #[test]
    fn bom_wins_over_header() {
        let bytes = [0xef, 0xbb, 0xbf, b'o', b'k'];
        assert_eq!(decode_html(&bytes, Some("text/html; charset=latin1")).unwrap(), "ok");
    }

    #[test]
    fn truncated_utf8_is_a_decode_failure() {
        let err = decode_html(&[b'a', 0xc3], Some("text/html; charset=utf-8")).unwrap_err();
        assert_eq!(err.kind, FailureKind::Decode);
    }

    #[test]
    fn content_types_are_matched_without_parameters() {
        let settings = FetchSettings::default();
        assert!(settings.accepts("Text/HTML; charset=utf-8"));
        assert!(!settings.accepts("application/json"));
        assert!(settings.over_limit(settings.max_bytes).is_none());
        assert!(settings.over_limit(settings.max_bytes + 1).is_some());
    }
}
