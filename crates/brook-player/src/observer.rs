use brook_media::Rendition;

use crate::controller::PlayerError;

/// Synchronous notifications toward the host UI or telemetry layer.
///
/// All methods default to no-ops so observers implement only what they
/// care about. Callbacks fire after the controller has committed the state
/// they describe.
pub trait PlayerObserver {
    fn on_time_update(&mut self, _position: f64) {}
    fn on_playback_started(&mut self) {}
    fn on_playback_ended(&mut self) {}
    fn on_rendition_changed(&mut self, _rendition: &Rendition) {}
    fn on_buffering_changed(&mut self, _buffering: bool) {}
    fn on_error(&mut self, _error: &PlayerError) {}
}
