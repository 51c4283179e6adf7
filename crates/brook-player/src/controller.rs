use std::time::Duration;

use brook_core::{SessionState, SessionStateError, SessionStateMachine, SessionTrigger};
use brook_media::{
    AdaptiveThresholds, LadderError, QualityDecision, Rendition, RenditionLadder,
    ThroughputEstimator, buffer_health, evaluate_quality,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::engine::{EngineEvent, PlaybackEngine};
use crate::observer::PlayerObserver;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayerError {
    #[error("unknown rendition id: {id}")]
    UnknownRendition { id: String },
    #[error("a rendition switch is already in flight")]
    SwitchInProgress,
    #[error("invalid rendition ladder: {0}")]
    Ladder(#[from] LadderError),
    #[error("rendition source failed to load: {detail}")]
    SourceLoadFailed { detail: String },
    #[error(transparent)]
    Session(#[from] SessionStateError),
}

/// Tuning knobs for one controller instance.
#[derive(Debug, Clone)]
pub struct PlayerProfile {
    /// Wall-clock spacing of quality evaluation cycles. The host drives
    /// the cycle; this value is what it should schedule with.
    pub evaluation_interval: Duration,
    /// Throughput samples older than this are discarded unread.
    pub throughput_sample_max_age: Duration,
    pub thresholds: AdaptiveThresholds,
    /// Whether automatic adaptation starts enabled.
    pub auto_adaptation: bool,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            evaluation_interval: Duration::from_secs(5),
            throughput_sample_max_age: Duration::from_secs(5),
            thresholds: AdaptiveThresholds::default(),
            auto_adaptation: true,
        }
    }
}

/// State captured when a switch starts and consumed exactly once when the
/// new source signals data-ready.
#[derive(Debug, Clone)]
struct PendingSwitch {
    target: usize,
    position: f64,
    resume: bool,
}

/// The adaptive playback controller.
///
/// Owns one playback session: the validated rendition ladder, the session
/// state machine, playback metrics, and the in-flight switch (at most
/// one). All mutation happens on delivery of discrete events —
/// [`on_engine_event`](Self::on_engine_event), the periodic
/// [`evaluate`](Self::evaluate) cycle, and user-intent calls.
pub struct PlayerController<E: PlaybackEngine> {
    engine: E,
    ladder: Option<RenditionLadder>,
    session: SessionStateMachine,
    profile: PlayerProfile,
    current: usize,
    pending_switch: Option<PendingSwitch>,
    estimator: ThroughputEstimator,
    auto_adaptation: bool,
    play_intent: bool,
    buffer_health: f64,
    is_buffering: bool,
    duration: Option<f64>,
    position: f64,
    observers: Vec<Box<dyn PlayerObserver>>,
}

impl<E: PlaybackEngine + std::fmt::Debug> std::fmt::Debug for PlayerController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerController")
            .field("engine", &self.engine)
            .field("ladder", &self.ladder)
            .field("session", &self.session)
            .field("profile", &self.profile)
            .field("current", &self.current)
            .field("pending_switch", &self.pending_switch)
            .field("estimator", &self.estimator)
            .field("auto_adaptation", &self.auto_adaptation)
            .field("play_intent", &self.play_intent)
            .field("buffer_health", &self.buffer_health)
            .field("is_buffering", &self.is_buffering)
            .field("duration", &self.duration)
            .field("position", &self.position)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl<E: PlaybackEngine> PlayerController<E> {
    /// Build a controller for one media asset.
    ///
    /// An empty rendition list is not an error: the controller comes up
    /// with no ladder and never evaluates or switches. Any other ladder
    /// defect is rejected.
    pub fn new(
        engine: E,
        renditions: Vec<Rendition>,
        profile: PlayerProfile,
    ) -> Result<Self, PlayerError> {
        let ladder = match RenditionLadder::new(renditions) {
            Ok(ladder) => Some(ladder),
            Err(LadderError::Empty) => None,
            Err(err) => return Err(PlayerError::Ladder(err)),
        };
        let current = ladder.as_ref().map(RenditionLadder::initial_index).unwrap_or(0);
        let estimator = ThroughputEstimator::new(profile.throughput_sample_max_age);
        let auto_adaptation = profile.auto_adaptation;

        Ok(Self {
            engine,
            ladder,
            session: SessionStateMachine::new(),
            profile,
            current,
            pending_switch: None,
            estimator,
            auto_adaptation,
            play_intent: false,
            buffer_health: 0.0,
            is_buffering: false,
            duration: None,
            position: 0.0,
            observers: Vec::new(),
        })
    }

    pub fn add_observer(&mut self, observer: Box<dyn PlayerObserver>) {
        self.observers.push(observer);
    }

    /// Attach and load the initial rendition (the default-flagged one,
    /// else the lowest bitrate).
    pub fn start(&mut self) -> Result<(), PlayerError> {
        let url = match self.ladder.as_ref().and_then(|l| l.get(self.current)) {
            Some(rendition) => rendition.url.clone(),
            None => {
                warn!("no renditions available; playback session stays idle");
                return Ok(());
            }
        };
        self.session.apply(SessionTrigger::SourceAttached)?;
        self.engine.load(&url);
        Ok(())
    }

    /// Forward user play intent to the engine. The session transition
    /// follows from the engine's own play event.
    pub fn play(&mut self) {
        self.engine.play();
    }

    pub fn pause(&mut self) {
        self.engine.pause();
    }

    /// Sole entry point for engine lifecycle events. `now` is the host's
    /// monotonic wall clock.
    pub fn on_engine_event(&mut self, event: EngineEvent, now: Duration) {
        if *self.session.state() == SessionState::Closed {
            // Torn down: stale events and one-shot callbacks are inert.
            return;
        }
        match event {
            EngineEvent::LoadStart => {
                debug!("engine started loading a source");
            }
            EngineEvent::LoadedMetadata { duration } => {
                self.duration = Some(duration);
            }
            EngineEvent::LoadedData => self.on_source_ready(),
            EngineEvent::TimeUpdate { position } => {
                self.position = position;
                if self.engine.is_network_loading()
                    && let Some(bps) = self.estimator.record(self.engine.bytes_loaded(), now)
                {
                    debug!("throughput sample: {bps} bps");
                }
                self.refresh_buffer_health();
                self.notify(|observer| observer.on_time_update(position));
            }
            EngineEvent::Progress => self.refresh_buffer_health(),
            EngineEvent::Play => {
                self.play_intent = true;
                if self.session.apply(SessionTrigger::Play).is_ok() {
                    self.notify(|o| PlayerObserver::on_playback_started(o));
                }
            }
            EngineEvent::Pause => {
                self.play_intent = false;
                let _ = self.session.apply(SessionTrigger::Pause);
            }
            EngineEvent::Waiting => {
                if !self.is_buffering {
                    self.is_buffering = true;
                    self.notify(|observer| observer.on_buffering_changed(true));
                }
                // Observational only; during an in-flight switch the
                // session stays in Switching and no transition fires.
                let _ = self.session.apply(SessionTrigger::StallDetected);
            }
            EngineEvent::Playing => {
                if self.is_buffering {
                    self.is_buffering = false;
                    self.notify(|observer| observer.on_buffering_changed(false));
                }
                let _ = self.session.apply(SessionTrigger::PlaybackResumed);
            }
            EngineEvent::Ended => {
                if self.session.apply(SessionTrigger::PlaybackEnded).is_ok() {
                    self.notify(|o| PlayerObserver::on_playback_ended(o));
                }
            }
            EngineEvent::Error { detail } => self.on_engine_error(detail),
        }
    }

    /// One quality evaluation cycle. The host calls this on a fixed
    /// wall-clock interval; at most one rendition step results.
    ///
    /// Skipped while a switch is in flight, while auto-adaptation is
    /// disabled, and outside active playback phases.
    pub fn evaluate(&mut self, now: Duration) {
        if !self.auto_adaptation
            || self.pending_switch.is_some()
            || !self.session.state().is_active()
        {
            return;
        }
        let Some(ladder) = &self.ladder else { return };

        let throughput = self.estimator.estimate(now);
        let decision = evaluate_quality(
            self.current,
            ladder,
            self.buffer_health,
            throughput,
            &self.profile.thresholds,
        );
        match decision {
            QualityDecision::Hold => {}
            QualityDecision::StepDown { target } => {
                info!(
                    "buffer health {:.2} below floor, stepping down to index {target}",
                    self.buffer_health
                );
                if let Err(err) = self.begin_switch(target) {
                    warn!("downshift could not start: {err}");
                }
            }
            QualityDecision::StepUp { target } => {
                info!(
                    "throughput {:?} bps clears headroom, stepping up to index {target}",
                    throughput
                );
                if let Err(err) = self.begin_switch(target) {
                    warn!("upshift could not start: {err}");
                }
            }
        }
    }

    /// Explicit user quality selection. Bypasses the decision policy,
    /// follows the same switch contract, and disables auto-adaptation for
    /// the rest of the session (until re-enabled).
    pub fn select_rendition(&mut self, id: &str) -> Result<(), PlayerError> {
        let Some(target) = self.ladder.as_ref().and_then(|l| l.position_of(id)) else {
            return Err(PlayerError::UnknownRendition { id: id.to_string() });
        };
        self.begin_switch(target)?;
        if self.auto_adaptation {
            info!("manual quality selection, auto-adaptation disabled");
            self.auto_adaptation = false;
        }
        Ok(())
    }

    pub fn set_auto_adaptation(&mut self, enabled: bool) {
        self.auto_adaptation = enabled;
    }

    pub fn auto_adaptation(&self) -> bool {
        self.auto_adaptation
    }

    /// Close the session. Pending one-shot restore state is discarded, so
    /// late engine callbacks cannot act on a replaced session.
    pub fn teardown(&mut self) {
        self.pending_switch = None;
        self.estimator.invalidate();
        if self.session.apply(SessionTrigger::Teardown).is_ok() {
            info!("playback session closed");
        }
    }

    pub fn current_rendition(&self) -> Option<&Rendition> {
        self.ladder.as_ref().and_then(|l| l.get(self.current))
    }

    pub fn renditions(&self) -> &[Rendition] {
        self.ladder.as_ref().map(RenditionLadder::renditions).unwrap_or(&[])
    }

    pub fn session_state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn buffer_health(&self) -> f64 {
        self.buffer_health
    }

    pub fn is_buffering(&self) -> bool {
        self.is_buffering
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Start the switch contract toward `target`. A request for the
    /// current rendition is a no-op: no reload, no notification.
    fn begin_switch(&mut self, target: usize) -> Result<(), PlayerError> {
        if target == self.current {
            return Ok(());
        }
        if self.pending_switch.is_some() {
            return Err(PlayerError::SwitchInProgress);
        }
        let Some(url) = self
            .ladder
            .as_ref()
            .and_then(|l| l.get(target))
            .map(|r| r.url.clone())
        else {
            return Err(PlayerError::UnknownRendition {
                id: target.to_string(),
            });
        };

        let resume = matches!(
            self.session.state(),
            SessionState::Playing | SessionState::Stalled
        );
        self.session
            .apply(SessionTrigger::SwitchStarted { resume })?;
        let position = self.engine.position();
        self.pending_switch = Some(PendingSwitch {
            target,
            position,
            resume,
        });
        self.estimator.invalidate();
        self.engine.load(&url);
        debug!("switch started toward index {target}, captured position {position:.3}s, resume={resume}");
        Ok(())
    }

    /// The engine's data-ready signal. With a switch pending this is the
    /// one-shot restore: seek back to the captured position, restore the
    /// captured play intent, and only then tell observers.
    fn on_source_ready(&mut self) {
        let Some(pending) = self.pending_switch.take() else {
            if self.session.apply(SessionTrigger::SourceReady).is_ok() && self.play_intent {
                self.engine.play();
                if self.session.apply(SessionTrigger::Play).is_ok() {
                    self.notify(|o| PlayerObserver::on_playback_started(o));
                }
            }
            return;
        };

        self.engine.seek(pending.position);
        self.position = pending.position;
        if pending.resume {
            self.engine.play();
        }
        if let Err(err) = self.session.apply(SessionTrigger::SwitchCommitted) {
            warn!("switch restore outside switching state: {err}");
        }
        self.current = pending.target;
        let committed = self.current_rendition().cloned();
        if let Some(rendition) = committed {
            info!(
                "now playing rendition {} ({} bps) at {:.3}s",
                rendition.id, rendition.bitrate_bps, pending.position
            );
            self.notify(|observer| observer.on_rendition_changed(&rendition));
        }
    }

    fn on_engine_error(&mut self, detail: String) {
        self.pending_switch = None;
        let _ = self.session.apply(SessionTrigger::SourceFailed);
        let error = PlayerError::SourceLoadFailed { detail };
        warn!("engine error: {error}");
        self.notify(|observer| observer.on_error(&error));
    }

    fn refresh_buffer_health(&mut self) {
        let duration = self.duration.unwrap_or(0.0);
        let buffered_end = self
            .engine
            .buffered_end(self.position)
            .unwrap_or(self.position);
        self.buffer_health = buffer_health(self.position, buffered_end, duration);
    }

    fn notify(&mut self, callback: impl Fn(&mut dyn PlayerObserver)) {
        for observer in &mut self.observers {
            callback(observer.as_mut());
        }
    }
}
