//! Headless Strata driver.
//!
//! Streams a world around one scripted observer that walks along +X,
//! logging pipeline snapshots as it goes. Configuration is loaded from
//! `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p strata-demo -- --draw-range 4 --ticks 900`.

mod backend;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::Vec3;
use strata_config::{CliArgs, Config};
use strata_stream::{EditIntent, Engine, Observer, ScriptedObserver, WorldEvent};
use tracing::{error, info, warn};

use crate::backend::LoggingBackend;

/// Target frame time of the render loop.
const FRAME: Duration = Duration::from_millis(16);
/// Observer walking speed in blocks per second.
const WALK_SPEED: f32 = 12.0;
/// Frames after world generation before the placement intent is issued.
const PLACE_AFTER_FRAMES: u32 = 30;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(|| Config::default_dir().ok())
        .unwrap_or_else(|| PathBuf::from(".strata"));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    strata_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!(
        config_dir = %config_dir.display(),
        draw_range = config.world.draw_range,
        ticks = args.ticks,
        "starting headless driver"
    );

    let observer = Arc::new(ScriptedObserver::new(Vec3::ZERO, Vec3::new(1.0, -0.6, 0.0)));
    let observers: Vec<Arc<dyn Observer>> = vec![observer.clone()];
    let mut backend = LoggingBackend::default();

    let mut engine = match Engine::start(&config, observers, &mut backend) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "failed to start streaming engine");
            return ExitCode::FAILURE;
        }
    };
    let events = engine.subscribe();

    let snapshot_every = Duration::from_millis(config.debug.snapshot_interval_ms.max(1));
    let mut last_snapshot = Instant::now();
    let mut walking_frames = 0u32;
    let mut placed = false;

    for _ in 0..args.ticks {
        let frame_start = Instant::now();
        engine.tick(&mut backend);

        for event in events.try_iter() {
            match event {
                WorldEvent::Generated {
                    spawn_chunk,
                    spawn_position,
                } => info!(chunk = ?spawn_chunk, position = ?spawn_position, "spawned"),
                WorldEvent::PassCompleted {
                    center,
                    active,
                    queued_instances,
                    queued_unloads,
                    ..
                } => info!(
                    center = ?center,
                    active,
                    queued_instances,
                    queued_unloads,
                    "window moved"
                ),
            }
        }

        if engine.is_world_generated() {
            let step = WALK_SPEED * FRAME.as_secs_f32();
            observer.set_position(observer.position() + Vec3::X * step);
            walking_frames += 1;
            if !placed && walking_frames >= PLACE_AFTER_FRAMES {
                observer.push_intent(EditIntent::Place);
                placed = true;
            }
        }

        if last_snapshot.elapsed() >= snapshot_every {
            match engine.snapshot().to_json() {
                Ok(json) => info!(snapshot = %json, "pipeline"),
                Err(e) => warn!(error = %e, "failed to serialize pipeline snapshot"),
            }
            last_snapshot = Instant::now();
        }

        if let Some(rest) = FRAME.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    if !engine.is_world_generated() {
        warn!("tick budget ran out before the initial world finished generating");
    }
    engine.shutdown();

    info!(
        submissions = backend.submissions,
        uploaded_bytes = backend.uploaded_bytes,
        resident_bytes = backend.resident_bytes(),
        live_meshes = backend.live_meshes(),
        live_visuals = backend.live_visuals(),
        "headless driver finished"
    );
    ExitCode::SUCCESS
}
