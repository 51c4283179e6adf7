//! Adaptive playback controller.
//!
//! Observes buffer health and estimated throughput of an active media
//! stream and switches between pre-encoded quality renditions to keep
//! playback smooth at the highest affordable quality. The host supplies a
//! [`PlaybackEngine`] over its native media stack and forwards engine
//! events; the controller owns the session state and the switch contract.

#![forbid(unsafe_code)]

mod controller;
mod engine;
mod observer;

pub use controller::{PlayerController, PlayerError, PlayerProfile};
pub use engine::{EngineEvent, PlaybackEngine};
pub use observer::PlayerObserver;
