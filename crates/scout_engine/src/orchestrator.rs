//! Background coordinator task: owns the [`BackgroundState`] and executes
//! the effects returned by [`scout_core::update`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scout_core::{update, BackgroundState, BackgroundTimings, Effect, Msg, TabId};
use scout_logging::{scout_debug, scout_info, scout_trace, scout_warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::license::LicenseError;
use crate::messaging::{Command, Message, Messenger, Reply};
use crate::store::{StoreError, UserProfile};
use crate::TabError;

/// Page shown after a successful sign-in.
pub const OPTIONS_URL: &str = "scout://options";

#[async_trait]
pub trait TabPlatform: Send + Sync {
    async fn create_tab(&self, url: &str, active: bool) -> Result<TabId, TabError>;
    /// Fails with [`TabError::NotFound`] when the tab is already gone.
    async fn remove_tab(&self, tab_id: TabId) -> Result<(), TabError>;
    async fn find_tab(&self, url: &str) -> Result<Option<TabId>, TabError>;
    async fn activate_tab(&self, tab_id: TabId) -> Result<(), TabError>;
}

/// Named one-shot timers. Creating an alarm replaces any pending alarm of
/// the same name.
pub trait Alarms: Send + Sync {
    fn create(&self, name: &str, delay: Duration, wake: Messenger);
    fn clear(&self, name: &str) -> bool;
}

/// Alarms backed by tokio timers.
#[derive(Debug, Default)]
pub struct TokioAlarms {
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.lock().values().filter(|h| !h.is_finished()).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Alarms for TokioAlarms {
    fn create(&self, name: &str, delay: Duration, wake: Messenger) {
        let alarm = name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            wake.alarm_fired(alarm);
        });
        let mut pending = self.lock();
        pending.retain(|_, h| !h.is_finished());
        if let Some(previous) = pending.insert(name.to_string(), handle) {
            previous.abort();
        }
    }

    fn clear(&self, name: &str) -> bool {
        match self.lock().remove(name) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

/// Asks the auth server whether the browser now holds a session.
#[async_trait]
pub trait SessionProbe: Send + Sync {
    async fn current_user(&self) -> Result<Option<UserProfile>, LicenseError>;
}

/// Answers the `user` message and records the signed-in user.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn user(&self) -> Result<Option<UserProfile>, StoreError>;
    async fn save_user(&self, user: UserProfile) -> Result<(), StoreError>;
}

pub struct TabOrchestrator {
    platform: Arc<dyn TabPlatform>,
    alarms: Arc<dyn Alarms>,
    session: Arc<dyn SessionProbe>,
    profiles: Arc<dyn ProfileStore>,
    options_url: String,
}

impl TabOrchestrator {
    pub fn new(
        platform: Arc<dyn TabPlatform>,
        alarms: Arc<dyn Alarms>,
        session: Arc<dyn SessionProbe>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            platform,
            alarms,
            session,
            profiles,
            options_url: OPTIONS_URL.to_string(),
        }
    }

    pub fn with_options_url(mut self, url: impl Into<String>) -> Self {
        self.options_url = url.into();
        self
    }

    /// Start the coordinator on the current tokio runtime.
    pub fn spawn(self, timings: BackgroundTimings) -> Messenger {
        let (tx, rx) = mpsc::unbounded_channel();
        let messenger = Messenger::new(tx);
        let state = BackgroundState::with_timings(timings);
        tokio::spawn(self.run(state, rx, messenger.clone()));
        messenger
    }

    async fn run(
        self,
        mut state: BackgroundState,
        mut rx: mpsc::UnboundedReceiver<Command>,
        messenger: Messenger,
    ) {
        let mut poll: Option<JoinHandle<()>> = None;
        while let Some(command) = rx.recv().await {
            match command {
                Command::Deliver { message, reply } => {
                    scout_trace!("message {}", message.name());
                    let (next, result) = self.deliver(state, message, &mut poll, &messenger).await;
                    state = next;
                    let _ = reply.send(result);
                }
                Command::AlarmFired(name) => {
                    state = self
                        .apply(state, Msg::AlarmFired { name }, &mut poll, &messenger)
                        .await
                        .0;
                }
                Command::SessionConfirmed => {
                    state = self
                        .apply(state, Msg::SessionConfirmed, &mut poll, &messenger)
                        .await
                        .0;
                }
                Command::Shutdown(reply) => {
                    if let Some(handle) = poll.take() {
                        handle.abort();
                    }
                    scout_info!(
                        "coordinator stopping: {} tabs opened, {} closed, {} pending",
                        state.opened_total(),
                        state.closed_total(),
                        state.scheduled_tabs().count()
                    );
                    let _ = reply.send(state);
                    return;
                }
            }
        }
    }

    async fn deliver(
        &self,
        state: BackgroundState,
        message: Message,
        poll: &mut Option<JoinHandle<()>>,
        messenger: &Messenger,
    ) -> (BackgroundState, Result<Reply, TabError>) {
        match message {
            Message::User => {
                let user = self
                    .profiles
                    .user()
                    .await
                    .map(Reply::User)
                    .map_err(|err| TabError::Platform(err.to_string()));
                (state, user)
            }
            Message::AuthSuccess(origin_tab) => {
                let (state, _) = self
                    .apply(state, Msg::AuthSucceeded { origin_tab }, poll, messenger)
                    .await;
                (state, Ok(Reply::AuthSuccess))
            }
            Message::OpenTab(url) => {
                let (state, created) = self
                    .apply(state, Msg::OpenTabRequested { url }, poll, messenger)
                    .await;
                let result = created
                    .unwrap_or_else(|| Err(TabError::Create("no tab was created".into())))
                    .map(Reply::OpenTab);
                (state, result)
            }
        }
    }

    /// Feed `msg` through `update` and execute the effects, including the
    /// follow-up messages they produce. Returns the outcome of any tab
    /// creation along the way.
    async fn apply(
        &self,
        mut state: BackgroundState,
        msg: Msg,
        poll: &mut Option<JoinHandle<()>>,
        messenger: &Messenger,
    ) -> (BackgroundState, Option<Result<TabId, TabError>>) {
        let mut queue = VecDeque::from([msg]);
        let mut created = None;
        while let Some(msg) = queue.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;
            for effect in effects {
                match effect {
                    Effect::CreateTab { url, active } => {
                        match self.platform.create_tab(&url, active).await {
                            Ok(tab_id) => {
                                scout_debug!("opened tab {tab_id} for {url}");
                                queue.push_back(Msg::TabCreated { tab_id, url });
                                created = Some(Ok(tab_id));
                            }
                            Err(err) => {
                                scout_warn!("failed to open {url}: {err}");
                                created = Some(Err(err));
                            }
                        }
                    }
                    Effect::ScheduleAlarm { name, delay } => {
                        scout_trace!("alarm {name} in {delay:?}");
                        self.alarms.create(&name, delay, messenger.clone());
                    }
                    Effect::CloseTab { tab_id } => self.close_tab(tab_id).await,
                    Effect::StartSessionPoll { interval } => {
                        if let Some(previous) = poll.take() {
                            previous.abort();
                        }
                        *poll = Some(self.start_session_poll(interval, messenger.clone()));
                    }
                    Effect::StopSessionPoll => {
                        if let Some(handle) = poll.take() {
                            handle.abort();
                        }
                    }
                    Effect::ShowOptions => self.show_options().await,
                }
            }
        }
        (state, created)
    }

    async fn close_tab(&self, tab_id: TabId) {
        match self.platform.remove_tab(tab_id).await {
            Ok(()) => scout_debug!("closed tab {tab_id}"),
            Err(TabError::NotFound(_)) => scout_debug!("tab {tab_id} was already closed"),
            Err(err) => scout_warn!("failed to close tab {tab_id}: {err}"),
        }
    }

    async fn show_options(&self) {
        let result = match self.platform.find_tab(&self.options_url).await {
            Ok(Some(tab_id)) => self.platform.activate_tab(tab_id).await,
            Ok(None) => self
                .platform
                .create_tab(&self.options_url, true)
                .await
                .map(|_| ()),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            scout_warn!("failed to show options: {err}");
        }
    }

    fn start_session_poll(&self, interval: Duration, messenger: Messenger) -> JoinHandle<()> {
        let session = Arc::clone(&self.session);
        let profiles = Arc::clone(&self.profiles);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match session.current_user().await {
                    Ok(Some(user)) => {
                        scout_info!("signed in as {}", user.display_name().unwrap_or(&user.id));
                        if let Err(err) = profiles.save_user(user).await {
                            scout_warn!("failed to store user profile: {err}");
                        }
                        messenger.session_confirmed();
                        return;
                    }
                    Ok(None) => scout_trace!("no session yet"),
                    Err(err) => scout_debug!("session probe failed: {err}"),
                }
            }
        })
    }
}
