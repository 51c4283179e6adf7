#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// A rendition source failed to load; the attempt is over, the caller
    /// may re-initiate.
    SourceLoadFailed,
    /// The engine faulted during established playback.
    PlaybackFault,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No source attached yet.
    #[default]
    Idle,
    /// Initial source attached, waiting for the engine's data-ready signal.
    Loading,
    /// Source ready, playback held by user intent.
    Paused,
    Playing,
    /// Playback involuntarily halted waiting for data. Observational;
    /// clears when the engine reports playing again.
    Stalled,
    /// A source swap is in flight. `resume` is the captured play intent to
    /// restore once the new source is ready.
    Switching { resume: bool },
    Ended,
    Failed(FailureReason),
    /// Session torn down; no further transitions.
    Closed,
}

impl SessionState {
    /// Playback phases in which the periodic quality evaluator runs.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Playing | SessionState::Paused | SessionState::Stalled
        )
    }

    pub fn is_switching(&self) -> bool {
        matches!(self, SessionState::Switching { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTrigger {
    SourceAttached,
    SourceReady,
    Play,
    Pause,
    StallDetected,
    PlaybackResumed,
    SwitchStarted { resume: bool },
    SwitchCommitted,
    PlaybackEnded,
    SourceFailed,
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionStateError {
    #[error("invalid transition from {from:?} with trigger {trigger:?}")]
    InvalidTransition {
        from: SessionState,
        trigger: SessionTrigger,
    },
}

/// Lifecycle state machine for one playback session.
///
/// Constructed when a media asset is loaded, fed triggers derived from
/// engine events and user intent, and discarded on teardown. The
/// `Switching` state is what keeps overlapping source swaps out: a second
/// switch cannot start until the first commits or fails.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn apply(&mut self, trigger: SessionTrigger) -> Result<Transition, SessionStateError> {
        let from = self.state.clone();
        let to = match (&self.state, &trigger) {
            (SessionState::Idle, SessionTrigger::SourceAttached)
            | (SessionState::Failed(_), SessionTrigger::SourceAttached) => SessionState::Loading,
            (SessionState::Loading, SessionTrigger::SourceReady) => SessionState::Paused,
            (SessionState::Paused, SessionTrigger::Play)
            | (SessionState::Ended, SessionTrigger::Play) => SessionState::Playing,
            (SessionState::Playing, SessionTrigger::Pause)
            | (SessionState::Stalled, SessionTrigger::Pause) => SessionState::Paused,
            (SessionState::Playing, SessionTrigger::StallDetected) => SessionState::Stalled,
            (SessionState::Stalled, SessionTrigger::PlaybackResumed) => SessionState::Playing,
            (
                SessionState::Playing
                | SessionState::Paused
                | SessionState::Stalled
                | SessionState::Ended
                | SessionState::Failed(_),
                SessionTrigger::SwitchStarted { resume },
            ) => SessionState::Switching { resume: *resume },
            (SessionState::Switching { resume: true }, SessionTrigger::SwitchCommitted) => {
                SessionState::Playing
            }
            (SessionState::Switching { resume: false }, SessionTrigger::SwitchCommitted) => {
                SessionState::Paused
            }
            (SessionState::Playing, SessionTrigger::PlaybackEnded) => SessionState::Ended,
            (
                SessionState::Loading | SessionState::Switching { .. },
                SessionTrigger::SourceFailed,
            ) => SessionState::Failed(FailureReason::SourceLoadFailed),
            (
                SessionState::Playing | SessionState::Paused | SessionState::Stalled,
                SessionTrigger::SourceFailed,
            ) => SessionState::Failed(FailureReason::PlaybackFault),
            (state, SessionTrigger::Teardown) if *state != SessionState::Closed => {
                SessionState::Closed
            }
            _ => {
                return Err(SessionStateError::InvalidTransition { from, trigger });
            }
        };

        self.state = to.clone();
        Ok(Transition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_then_play() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionTrigger::SourceAttached).unwrap();
        sm.apply(SessionTrigger::SourceReady).unwrap();
        sm.apply(SessionTrigger::Play).unwrap();
        assert_eq!(sm.state(), &SessionState::Playing);
        assert!(sm.state().is_active());
    }

    #[test]
    fn stall_clears_on_resume() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionTrigger::SourceAttached).unwrap();
        sm.apply(SessionTrigger::SourceReady).unwrap();
        sm.apply(SessionTrigger::Play).unwrap();
        sm.apply(SessionTrigger::StallDetected).unwrap();
        assert_eq!(sm.state(), &SessionState::Stalled);
        sm.apply(SessionTrigger::PlaybackResumed).unwrap();
        assert_eq!(sm.state(), &SessionState::Playing);
    }

    #[test]
    fn switch_commit_restores_play_intent() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionTrigger::SourceAttached).unwrap();
        sm.apply(SessionTrigger::SourceReady).unwrap();
        sm.apply(SessionTrigger::Play).unwrap();
        sm.apply(SessionTrigger::SwitchStarted { resume: true }).unwrap();
        assert!(sm.state().is_switching());
        assert!(!sm.state().is_active());
        sm.apply(SessionTrigger::SwitchCommitted).unwrap();
        assert_eq!(sm.state(), &SessionState::Playing);
    }

    #[test]
    fn switch_commit_keeps_paused_session_paused() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionTrigger::SourceAttached).unwrap();
        sm.apply(SessionTrigger::SourceReady).unwrap();
        sm.apply(SessionTrigger::SwitchStarted { resume: false }).unwrap();
        sm.apply(SessionTrigger::SwitchCommitted).unwrap();
        assert_eq!(sm.state(), &SessionState::Paused);
    }

    #[test]
    fn switch_failure_is_terminal_for_the_attempt() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionTrigger::SourceAttached).unwrap();
        sm.apply(SessionTrigger::SourceReady).unwrap();
        sm.apply(SessionTrigger::Play).unwrap();
        sm.apply(SessionTrigger::SwitchStarted { resume: true }).unwrap();
        sm.apply(SessionTrigger::SourceFailed).unwrap();
        assert_eq!(
            sm.state(),
            &SessionState::Failed(FailureReason::SourceLoadFailed)
        );

        // The caller may re-initiate with a fresh switch or source attach.
        sm.apply(SessionTrigger::SwitchStarted { resume: true }).unwrap();
        assert!(sm.state().is_switching());
    }

    #[test]
    fn replay_after_ended() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionTrigger::SourceAttached).unwrap();
        sm.apply(SessionTrigger::SourceReady).unwrap();
        sm.apply(SessionTrigger::Play).unwrap();
        sm.apply(SessionTrigger::PlaybackEnded).unwrap();
        assert_eq!(sm.state(), &SessionState::Ended);
        sm.apply(SessionTrigger::Play).unwrap();
        assert_eq!(sm.state(), &SessionState::Playing);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut sm = SessionStateMachine::new();
        let err = sm.apply(SessionTrigger::SwitchCommitted).unwrap_err();
        assert!(matches!(
            err,
            SessionStateError::InvalidTransition {
                from: SessionState::Idle,
                trigger: SessionTrigger::SwitchCommitted,
            }
        ));
        assert_eq!(sm.state(), &SessionState::Idle);
    }

    #[test]
    fn teardown_closes_from_any_state() {
        for build in [
            vec![],
            vec![SessionTrigger::SourceAttached],
            vec![SessionTrigger::SourceAttached, SessionTrigger::SourceReady],
            vec![
                SessionTrigger::SourceAttached,
                SessionTrigger::SourceReady,
                SessionTrigger::SwitchStarted { resume: false },
            ],
        ] {
            let mut sm = SessionStateMachine::new();
            for trigger in build {
                sm.apply(trigger).unwrap();
            }
            sm.apply(SessionTrigger::Teardown).unwrap();
            assert_eq!(sm.state(), &SessionState::Closed);
            assert!(sm.apply(SessionTrigger::Play).is_err());
        }
    }
}
