//! Request/reply bus between content-script runs and the background
//! coordinator.

use async_trait::async_trait;
use scout_core::{BackgroundState, TabId};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::store::UserProfile;
use crate::TabError;

/// Messages a content script may send to the background coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum Message {
    User,
    AuthSuccess(TabId),
    OpenTab(String),
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::User => "user",
            Message::AuthSuccess(_) => "auth-success",
            Message::OpenTab(_) => "open-tab",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum Reply {
    User(Option<UserProfile>),
    AuthSuccess,
    OpenTab(TabId),
}

pub(crate) enum Command {
    Deliver {
        message: Message,
        reply: oneshot::Sender<Result<Reply, TabError>>,
    },
    AlarmFired(String),
    SessionConfirmed,
    Shutdown(oneshot::Sender<BackgroundState>),
}

/// Cloneable handle to a running coordinator.
#[derive(Debug, Clone)]
pub struct Messenger {
    tx: mpsc::UnboundedSender<Command>,
}

impl Messenger {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    fn post(&self, command: Command) -> Result<(), TabError> {
        self.tx.send(command).map_err(|_| TabError::Disconnected)
    }

    pub async fn send(&self, message: Message) -> Result<Reply, TabError> {
        let (reply, rx) = oneshot::channel();
        self.post(Command::Deliver { message, reply })?;
        rx.await.map_err(|_| TabError::Disconnected)?
    }

    pub async fn open_tab(&self, url: impl Into<String>) -> Result<TabId, TabError> {
        match self.send(Message::OpenTab(url.into())).await? {
            Reply::OpenTab(tab_id) => Ok(tab_id),
            _ => Err(TabError::UnexpectedReply("open-tab")),
        }
    }

    pub async fn user(&self) -> Result<Option<UserProfile>, TabError> {
        match self.send(Message::User).await? {
            Reply::User(user) => Ok(user),
            _ => Err(TabError::UnexpectedReply("user")),
        }
    }

    pub async fn auth_success(&self, tab_id: TabId) -> Result<(), TabError> {
        match self.send(Message::AuthSuccess(tab_id)).await? {
            Reply::AuthSuccess => Ok(()),
            _ => Err(TabError::UnexpectedReply("auth-success")),
        }
    }

    /// Deliver a fired alarm. Dropped silently once the coordinator is gone.
    pub fn alarm_fired(&self, name: impl Into<String>) {
        let _ = self.post(Command::AlarmFired(name.into()));
    }

    pub(crate) fn session_confirmed(&self) {
        let _ = self.post(Command::SessionConfirmed);
    }

    /// Stop the coordinator and return its final state. Pending alarms are
    /// dropped.
    pub async fn shutdown(&self) -> Result<BackgroundState, TabError> {
        let (reply, rx) = oneshot::channel();
        self.post(Command::Shutdown(reply))?;
        rx.await.map_err(|_| TabError::Disconnected)
    }
}

/// Anything that can ask for a background tab.
#[async_trait]
pub trait TabRequester: Send + Sync {
    async fn open_tab(&self, url: &str) -> Result<TabId, TabError>;
}

#[async_trait]
impl TabRequester for Messenger {
    async fn open_tab(&self, url: &str) -> Result<TabId, TabError> {
        Messenger::open_tab(self, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_use_type_and_data_fields() {
        assert_eq!(
            serde_json::to_value(Message::OpenTab("https://a.com".into())).unwrap(),
            json!({"type": "open-tab", "data": "https://a.com"})
        );
        assert_eq!(
            serde_json::to_value(Message::AuthSuccess(7)).unwrap(),
            json!({"type": "auth-success", "data": 7})
        );
        assert_eq!(
            serde_json::to_value(Message::User).unwrap(),
            json!({"type": "user"})
        );
    }

    #[test]
    fn messages_parse_from_wire_form() {
        let parsed: Message = serde_json::from_str(r#"{"type":"auth-success","data":12}"#).unwrap();
        assert_eq!(parsed, Message::AuthSuccess(12));
        assert_eq!(parsed.name(), "auth-success");
    }
}
