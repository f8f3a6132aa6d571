use crate::alarm::{close_tab_alarm, parse_close_tab_alarm};
use crate::{BackgroundState, Effect, Msg};

/// Pure update function: applies a message to the background state and
/// returns the effects the executor must perform.
pub fn update(mut state: BackgroundState, msg: Msg) -> (BackgroundState, Vec<Effect>) {
    let effects = match msg {
        Msg::OpenTabRequested { url } => {
            vec![Effect::CreateTab { url, active: false }]
        }
        Msg::TabCreated { tab_id, url: _ } => {
            if state.is_scheduled(tab_id) {
                // Duplicate report for a tab already on the clock.
                return (state, Vec::new());
            }
            let name = close_tab_alarm(tab_id);
            let delay = state.timings().closure_delay;
            state.schedule(tab_id, name.clone());
            vec![Effect::ScheduleAlarm { name, delay }]
        }
        Msg::AlarmFired { name } => match parse_close_tab_alarm(&name) {
            Some(tab_id) if state.take_scheduled(tab_id) => vec![Effect::CloseTab { tab_id }],
            _ => Vec::new(),
        },
        Msg::AuthSucceeded { origin_tab } => {
            if state.begin_auth(origin_tab) {
                vec![Effect::StartSessionPoll {
                    interval: state.timings().session_poll,
                }]
            } else {
                Vec::new()
            }
        }
        Msg::SessionConfirmed => match state.finish_auth() {
            Some(origin_tab) => vec![
                Effect::StopSessionPoll,
                Effect::ShowOptions,
                Effect::CloseTab { tab_id: origin_tab },
            ],
            None => Vec::new(),
        },
    };

    (state, effects)
}
