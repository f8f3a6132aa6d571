#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A content script asked for a URL to be opened.
    OpenTabRequested { url: String },
    /// The platform created the tab for an open request.
    TabCreated { tab_id: crate::TabId, url: String },
    /// A named alarm went off.
    AlarmFired { name: String },
    /// The sign-in page reported success; `origin_tab` is the page to close
    /// once a session is confirmed.
    AuthSucceeded { origin_tab: crate::TabId },
    /// The session poll found a signed-in user.
    SessionConfirmed,
}
