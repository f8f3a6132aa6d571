use std::fmt;

use scout_core::TabId;
use thiserror::Error;

use crate::page::ElementHandle;

/// Failures reported by a [`crate::Page`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("page does not support {0}")]
    Unsupported(&'static str),
    #[error("element {0:?} is no longer attached")]
    Detached(ElementHandle),
    #[error("page script failed: {0}")]
    Script(String),
    #[error("page is closed")]
    Closed,
}

/// Failures of the tab platform or of the message bus in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TabError {
    #[error("tab creation failed: {0}")]
    Create(String),
    #[error("tab {0} not found")]
    NotFound(TabId),
    #[error("tab platform error: {0}")]
    Platform(String),
    #[error("background coordinator is not running")]
    Disconnected,
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "undecodable body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
