use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    CreateTab { url: String, active: bool },
    ScheduleAlarm { name: String, delay: Duration },
    CloseTab { tab_id: crate::TabId },
    StartSessionPoll { interval: Duration },
    StopSessionPoll,
    /// Focus the options page, opening it if needed.
    ShowOptions,
}
