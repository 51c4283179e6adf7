/// Narrow interface onto the host's media pipeline.
///
/// The controller never talks to a concrete media element; any playback
/// stack that can load a source, seek, and report buffered ranges can sit
/// behind this trait.
pub trait PlaybackEngine {
    /// Swap the active source. Resets the engine's byte counter.
    fn load(&mut self, url: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    /// Current playback time in seconds.
    fn position(&self) -> f64;
    /// Total content duration, once known.
    fn duration(&self) -> Option<f64>;
    /// End of the furthest contiguous buffered range covering `position`,
    /// or `None` when no buffered range covers it.
    fn buffered_end(&self, position: f64) -> Option<f64>;
    /// Cumulative bytes downloaded for the current source.
    fn bytes_loaded(&self) -> u64;
    /// Whether the engine is actively fetching data.
    fn is_network_loading(&self) -> bool;
}

/// Lifecycle events the host forwards from its media pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    LoadStart,
    LoadedMetadata { duration: f64 },
    /// The current source has enough data to render at the playhead.
    /// Fired once per source load; drives the one-shot switch restore.
    LoadedData,
    TimeUpdate { position: f64 },
    /// Buffered ranges changed.
    Progress,
    Play,
    Pause,
    /// Playback halted waiting for data.
    Waiting,
    /// Playback running again after a stall or a play request.
    Playing,
    Ended,
    Error { detail: String },
}
