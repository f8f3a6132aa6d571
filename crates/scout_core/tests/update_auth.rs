use std::time::Duration;

use scout_core::{update, BackgroundState, Effect, Msg};

#[test]
fn auth_success_starts_a_single_session_poll() {
    let (state, effects) = update(BackgroundState::new(), Msg::AuthSucceeded { origin_tab: 9 });
    assert_eq!(
        effects,
        vec![Effect::StartSessionPoll {
            interval: Duration::from_secs(3),
        }]
    );
    assert!(state.is_polling());

    // A second signal retargets the origin tab without a second poll.
    let (state, effects) = update(state, Msg::AuthSucceeded { origin_tab: 11 });
    assert!(effects.is_empty());
    assert_eq!(state.pending_auth(), Some(11));
}

#[test]
fn confirmed_session_surfaces_options_and_closes_origin() {
    let (state, _) = update(BackgroundState::new(), Msg::AuthSucceeded { origin_tab: 9 });
    let (state, effects) = update(state, Msg::SessionConfirmed);

    assert_eq!(
        effects,
        vec![
            Effect::StopSessionPoll,
            Effect::ShowOptions,
            Effect::CloseTab { tab_id: 9 },
        ]
    );
    assert!(!state.is_polling());
    assert_eq!(state.pending_auth(), None);
}

#[test]
fn stray_session_confirmation_is_ignored() {
    let (_, effects) = update(BackgroundState::new(), Msg::SessionConfirmed);
    assert!(effects.is_empty());
}
