//! Media quality modelling for adaptive playback.
//!
//! - [`rendition`]: fixed-quality encodings of one asset and the validated
//!   quality ladder built from them
//! - [`metrics`]: buffer health and opportunistic throughput estimation
//! - [`policy`]: the step-up/step-down decision rule

#![forbid(unsafe_code)]

mod metrics;
mod policy;
mod rendition;

pub use metrics::{ThroughputEstimator, ThroughputSample, buffer_health};
pub use policy::{AdaptiveThresholds, QualityDecision, evaluate_quality};
pub use rendition::{LadderError, Rendition, RenditionLadder};
