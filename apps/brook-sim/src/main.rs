#![forbid(unsafe_code)]

use std::{
    collections::{HashMap, VecDeque},
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow, ensure};
use brook_core::SessionState;
use brook_media::Rendition;
use brook_player::{
    EngineEvent, PlaybackEngine, PlayerController, PlayerError, PlayerObserver, PlayerProfile,
};
use clap::{ArgAction, Parser};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Deserialize;
use tracing::{info, warn};

const MANIFEST_VERSION: u32 = 1;
/// Seconds of content that must be buffered before a fresh source reports
/// data-ready, and before a stalled playhead resumes.
const DATA_READY_MARGIN_SECS: f64 = 2.0;

#[derive(Debug, Parser)]
#[command(
    name = "brook-sim",
    version,
    about = "Headless adaptive playback simulator"
)]
struct Args {
    #[arg(long, help = "Path to rendition manifest JSON (built-in ladder when omitted)")]
    manifest: Option<PathBuf>,

    #[arg(long, default_value_t = 180.0, help = "Simulated content duration (seconds)")]
    media_duration_secs: f64,

    #[arg(long, default_value_t = 60, help = "Wall-clock simulation budget (seconds)")]
    run_secs: u64,

    #[arg(long, default_value_t = 250, help = "Simulation tick interval (milliseconds)")]
    tick_ms: u64,

    #[arg(
        long,
        default_value_t = 5_000,
        help = "Quality evaluation interval (milliseconds)"
    )]
    eval_interval_ms: u64,

    #[arg(
        long,
        default_value_t = 6_000,
        help = "Baseline link bandwidth (kilobits per second)"
    )]
    bandwidth_kbps: u64,

    #[arg(
        long,
        help = "Drop the link to --drop-to-kbps at this wall-clock time (seconds)"
    )]
    drop_at_secs: Option<u64>,

    #[arg(
        long,
        default_value_t = 800,
        help = "Degraded link bandwidth (kilobits per second)"
    )]
    drop_to_kbps: u64,

    #[arg(long, help = "Restore baseline bandwidth at this wall-clock time (seconds)")]
    recover_at_secs: Option<u64>,

    #[arg(
        long,
        help = "Manually select this rendition id once playback is up (disables auto-adaptation)"
    )]
    select: Option<String>,

    #[arg(
        long,
        default_value_t = false,
        action = ArgAction::SetTrue,
        help = "Disable automatic quality adaptation"
    )]
    no_auto: bool,

    #[arg(long, help = "RNG seed for reproducible bandwidth jitter")]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestFileV1 {
    version: u32,
    renditions: Vec<Rendition>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let renditions = match &args.manifest {
        Some(path) => load_manifest(path)?,
        None => builtin_renditions(),
    };
    info!(
        "rendition ladder: {}",
        renditions
            .iter()
            .map(|r| format!("{} ({} kbps)", r.id, r.bitrate_bps / 1_000))
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let engine = SimEngine::new(args.media_duration_secs, &renditions);
    let profile = PlayerProfile {
        evaluation_interval: Duration::from_millis(args.eval_interval_ms.max(100)),
        throughput_sample_max_age: Duration::from_millis(args.eval_interval_ms.max(100)),
        auto_adaptation: !args.no_auto,
        ..PlayerProfile::default()
    };
    let mut controller = PlayerController::new(engine, renditions, profile.clone())
        .context("build playback controller")?;

    let stats = Arc::new(Mutex::new(SimStats::default()));
    controller.add_observer(Box::new(StatsObserver {
        stats: stats.clone(),
    }));

    controller.start().context("start playback session")?;
    controller.play();

    let schedule = LinkSchedule {
        baseline_bps: args.bandwidth_kbps.saturating_mul(1_000),
        drop_at: args.drop_at_secs.map(Duration::from_secs),
        drop_to_bps: args.drop_to_kbps.saturating_mul(1_000),
        recover_at: args.recover_at_secs.map(Duration::from_secs),
    };
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let started = Instant::now();
    let tick_interval = Duration::from_millis(args.tick_ms.max(10));
    let mut tick = tokio::time::interval(tick_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let run_budget = Duration::from_secs(args.run_secs);
    let mut last_eval = Duration::ZERO;
    let mut manual_pending = args.select.clone();

    loop {
        tick.tick().await;
        let now = started.elapsed();
        if now >= run_budget {
            info!("simulation budget reached");
            break;
        }

        let bandwidth_bps = jittered(schedule.bandwidth_bps(now), &mut rng);
        controller
            .engine_mut()
            .advance(tick_interval.as_secs_f64(), bandwidth_bps);
        while let Some(event) = controller.engine_mut().take_event() {
            controller.on_engine_event(event, now);
        }

        if manual_pending.is_some() && controller.session_state().is_active() {
            if let Some(id) = manual_pending.take() {
                match controller.select_rendition(&id) {
                    Ok(()) => info!("manual selection applied: {id}"),
                    Err(err) => warn!("manual selection rejected: {err}"),
                }
            }
        }

        if now.saturating_sub(last_eval) >= profile.evaluation_interval {
            controller.evaluate(now);
            last_eval = now;
        }

        match controller.session_state() {
            SessionState::Ended => {
                info!("content finished");
                break;
            }
            SessionState::Failed(reason) => {
                warn!("session failed ({reason:?}); stopping simulation");
                break;
            }
            _ => {}
        }
    }

    let stats = stats
        .lock()
        .map_err(|_| anyhow!("stats lock poisoned"))?
        .clone();
    info!(
        "simulation done: position={:.1}s, rendition={}, switches={}, stalls={}, errors={}",
        controller.position(),
        controller
            .current_rendition()
            .map(|r| r.id.clone())
            .unwrap_or_else(|| "none".to_string()),
        stats.switches,
        stats.stalls,
        stats.errors
    );
    Ok(())
}

fn load_manifest(path: &Path) -> Result<Vec<Rendition>> {
    let bytes =
        fs::read(path).with_context(|| format!("read manifest failed: {}", path.display()))?;
    let parsed: ManifestFileV1 = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse manifest failed: {}", path.display()))?;
    ensure!(
        parsed.version == MANIFEST_VERSION,
        "unsupported manifest version: {}",
        parsed.version
    );
    Ok(parsed.renditions)
}

fn builtin_renditions() -> Vec<Rendition> {
    let rendition = |id: &str, bitrate_bps: u64| Rendition {
        id: id.to_string(),
        label: id.to_string(),
        bitrate_bps,
        url: format!("sim://rendition/{id}"),
        is_default: false,
    };
    vec![
        rendition("240p", 500_000),
        rendition("480p", 1_200_000),
        rendition("720p", 2_500_000),
        rendition("1080p", 4_000_000),
    ]
}

fn jittered(bandwidth_bps: u64, rng: &mut StdRng) -> u64 {
    (bandwidth_bps as f64 * rng.random_range(0.9..=1.1)) as u64
}

#[derive(Debug, Clone, Copy)]
struct LinkSchedule {
    baseline_bps: u64,
    drop_at: Option<Duration>,
    drop_to_bps: u64,
    recover_at: Option<Duration>,
}

impl LinkSchedule {
    fn bandwidth_bps(&self, now: Duration) -> u64 {
        if let Some(drop_at) = self.drop_at
            && now >= drop_at
        {
            if let Some(recover_at) = self.recover_at
                && now >= recover_at
            {
                return self.baseline_bps;
            }
            return self.drop_to_bps;
        }
        self.baseline_bps
    }
}

#[derive(Debug, Clone, Default)]
struct SimStats {
    switches: u32,
    stalls: u32,
    errors: u32,
}

struct StatsObserver {
    stats: Arc<Mutex<SimStats>>,
}

impl PlayerObserver for StatsObserver {
    fn on_rendition_changed(&mut self, _rendition: &Rendition) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.switches += 1;
        }
    }

    fn on_buffering_changed(&mut self, buffering: bool) {
        if buffering {
            info!("playback stalled, rebuffering");
            if let Ok(mut stats) = self.stats.lock() {
                stats.stalls += 1;
            }
        } else {
            info!("playback resumed");
        }
    }

    fn on_error(&mut self, error: &PlayerError) {
        warn!("playback error surfaced: {error}");
        if let Ok(mut stats) = self.stats.lock() {
            stats.errors += 1;
        }
    }
}

/// Scripted media engine: downloads at the offered link rate, advances the
/// playhead while data is buffered, stalls when the buffer runs dry, and
/// emits the event sequence a real media element would.
struct SimEngine {
    media_duration: f64,
    bitrate_by_url: HashMap<String, u64>,
    current_bitrate: u64,
    loaded: bool,
    ready: bool,
    playing: bool,
    stalled: bool,
    advancing: bool,
    network_loading: bool,
    position: f64,
    buffered_end: f64,
    bytes_loaded: u64,
    events: VecDeque<EngineEvent>,
}

impl SimEngine {
    fn new(media_duration: f64, renditions: &[Rendition]) -> Self {
        Self {
            media_duration,
            bitrate_by_url: renditions
                .iter()
                .map(|r| (r.url.clone(), r.bitrate_bps))
                .collect(),
            current_bitrate: 0,
            loaded: false,
            ready: false,
            playing: false,
            stalled: false,
            advancing: false,
            network_loading: false,
            position: 0.0,
            buffered_end: 0.0,
            bytes_loaded: 0,
            events: VecDeque::new(),
        }
    }

    fn take_event(&mut self) -> Option<EngineEvent> {
        self.events.pop_front()
    }

    /// Advance simulated time by `dt` seconds at the given link rate.
    fn advance(&mut self, dt: f64, bandwidth_bps: u64) {
        if !self.loaded {
            return;
        }

        if self.buffered_end < self.media_duration {
            self.network_loading = true;
            let bytes = (bandwidth_bps as f64 / 8.0 * dt) as u64;
            self.bytes_loaded = self.bytes_loaded.saturating_add(bytes);
            let content_secs_gained = bytes as f64 * 8.0 / self.current_bitrate.max(1) as f64;
            self.buffered_end = (self.buffered_end + content_secs_gained).min(self.media_duration);
            self.events.push_back(EngineEvent::Progress);
        } else {
            self.network_loading = false;
        }

        let buffered_ahead = self.buffered_end - self.position;
        if !self.ready
            && (buffered_ahead >= DATA_READY_MARGIN_SECS || self.buffered_end >= self.media_duration)
        {
            self.ready = true;
            self.events.push_back(EngineEvent::LoadedData);
        }

        if !self.playing || !self.ready {
            return;
        }

        if self.stalled {
            if buffered_ahead >= DATA_READY_MARGIN_SECS || self.buffered_end >= self.media_duration
            {
                // Enough data again; the playhead moves on the next tick
                // and reports a playing event then.
                self.stalled = false;
            }
            return;
        }

        let next = self.position + dt;
        if next <= self.buffered_end {
            self.position = next;
            if !self.advancing {
                self.advancing = true;
                self.events.push_back(EngineEvent::Playing);
            }
        } else {
            self.position = self.buffered_end;
            if self.position < self.media_duration {
                self.stalled = true;
                self.advancing = false;
                self.events.push_back(EngineEvent::Waiting);
            }
        }
        self.events
            .push_back(EngineEvent::TimeUpdate {
                position: self.position,
            });
        if self.position >= self.media_duration {
            self.playing = false;
            self.events.push_back(EngineEvent::Ended);
        }
    }
}

impl PlaybackEngine for SimEngine {
    fn load(&mut self, url: &str) {
        self.current_bitrate = self.bitrate_by_url.get(url).copied().unwrap_or(1_000_000);
        self.loaded = true;
        self.ready = false;
        self.stalled = false;
        self.advancing = false;
        self.network_loading = true;
        self.position = 0.0;
        self.buffered_end = 0.0;
        self.bytes_loaded = 0;
        self.events.push_back(EngineEvent::LoadStart);
        self.events.push_back(EngineEvent::LoadedMetadata {
            duration: self.media_duration,
        });
    }

    fn play(&mut self) {
        self.playing = true;
        self.events.push_back(EngineEvent::Play);
    }

    fn pause(&mut self) {
        self.playing = false;
        self.advancing = false;
        self.events.push_back(EngineEvent::Pause);
    }

    fn seek(&mut self, position: f64) {
        self.position = position.clamp(0.0, self.media_duration);
        // A source swap buffers from scratch at the new playhead.
        self.buffered_end = self.position;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> Option<f64> {
        self.loaded.then_some(self.media_duration)
    }

    fn buffered_end(&self, position: f64) -> Option<f64> {
        (self.loaded && self.buffered_end > position).then_some(self.buffered_end)
    }

    fn bytes_loaded(&self) -> u64 {
        self.bytes_loaded
    }

    fn is_network_loading(&self) -> bool {
        self.network_loading
    }
}
