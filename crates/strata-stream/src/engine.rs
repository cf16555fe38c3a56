//! The streaming engine: owns the pipeline, its threads and the window.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use glam::{UVec2, Vec2, Vec3};
use parking_lot::Mutex;
use strata_config::{BlockAtlasConfig, Config};
use strata_terrain::{HeightmapSampler, NoiseParams, TerrainGenerator, resolve_seed};
use strata_voxel::{
    AtlasError, BlockAtlas, BlockTiles, BlockType, CHUNK_HEIGHT, CHUNK_SIZE, ChunkCoord,
};

use crate::chunk::Chunk;
use crate::edit;
use crate::error::StreamError;
use crate::events::WorldEvent;
use crate::observer::Observer;
use crate::pipeline::Pipeline;
use crate::render::RenderBackend;
use crate::scheduler::{self, TickReport};
use crate::snapshot::PipelineSnapshot;
use crate::window::{WindowController, run_window_thread};
use crate::workers::{WorkerCounts, spawn_named, spawn_workers};

/// Builds the block atlas described by the `blocks` config section.
pub fn atlas_from_config(config: &BlockAtlasConfig) -> Result<BlockAtlas, AtlasError> {
    let [w, h] = config.tile_size;
    BlockAtlas::from_named(
        Vec2::new(w, h),
        config.blocks.iter().map(|b| {
            let tiles = BlockTiles {
                top: UVec2::from(b.top),
                bottom: UVec2::from(b.bottom),
                side: UVec2::from(b.side),
            };
            (b.name.as_str(), tiles, b.solid)
        }),
    )
}

/// Where observers are placed once `spawn_chunk` is generated: its middle
/// column, at the first open non-fluid cell above the ground.
pub fn spawn_position(pipeline: &Pipeline, spawn_chunk: ChunkCoord) -> Vec3 {
    let mid = spawn_chunk.middle_point();
    let column = (CHUNK_SIZE / 2) as u8;
    let height = pipeline
        .world
        .get(spawn_chunk)
        .filter(|c| c.is_data_ready())
        .and_then(|c| c.blocks().spawn_height(column, column));
    let y = match height {
        Some(y) => f32::from(y),
        None => {
            tracing::warn!(chunk = ?spawn_chunk, "no open cell in spawn column, spawning at the top");
            CHUNK_HEIGHT as f32
        }
    };
    Vec3::new(mid.x, y, mid.z)
}

/// A running world-streaming engine.
///
/// Worker pools and the window and interaction threads start with the
/// engine. The render-thread stages only advance when the owner calls
/// [`tick`](Self::tick) with its backend.
pub struct Engine {
    pipeline: Arc<Pipeline>,
    controller: Arc<Mutex<WindowController>>,
    observers: Vec<Arc<dyn Observer>>,
    world_generated: Arc<AtomicBool>,
    spawn_chunk: ChunkCoord,
    initial_window: Vec<ChunkCoord>,
    handles: Vec<JoinHandle<()>>,
    shut_down: bool,
}

impl Engine {
    /// Builds the world around the origin and starts every stage thread.
    ///
    /// The first window is instantiated synchronously through `backend`
    /// before any thread starts.
    pub fn start(
        config: &Config,
        observers: Vec<Arc<dyn Observer>>,
        backend: &mut impl RenderBackend,
    ) -> Result<Self, StreamError> {
        let atlas = atlas_from_config(&config.blocks).inspect_err(|err| {
            tracing::error!(error = %err, "block configuration rejected");
        })?;
        let placement_kind: BlockType = config
            .blocks
            .placement_block
            .parse()
            .map_err(AtlasError::from)?;
        let placement = atlas.block(placement_kind)?;

        let seed = resolve_seed(&config.world);
        let sampler = HeightmapSampler::new(NoiseParams::from_config(&config.noise, &seed));
        let generator = TerrainGenerator::new(sampler, config.world.sea_level, Arc::new(atlas));
        let poll = Duration::from_millis(config.pipeline.idle_poll_ms.max(1));
        let pipeline = Arc::new(Pipeline::new(generator, placement, poll));

        let draw_range = config.world.draw_range;
        let spawn_chunk = ChunkCoord::new(0, 0);
        let mut controller = WindowController::new(
            draw_range,
            config.world.regen_threshold,
            observers.len().max(1),
        );
        controller.generation_pass(&pipeline, 0, spawn_chunk);
        scheduler::instantiate_pending(&pipeline, backend);

        let mut engine = Self {
            pipeline,
            controller: Arc::new(Mutex::new(controller)),
            observers,
            world_generated: Arc::new(AtomicBool::new(false)),
            spawn_chunk,
            initial_window: spawn_chunk.window(draw_range).collect(),
            handles: Vec::new(),
            shut_down: false,
        };
        engine.spawn_threads(WorkerCounts::from_config(&config.pipeline))?;

        tracing::info!(
            draw_range,
            regen_threshold = config.world.regen_threshold,
            observers = engine.observers.len(),
            "streaming engine started"
        );
        Ok(engine)
    }

    fn spawn_threads(&mut self, counts: WorkerCounts) -> Result<(), StreamError> {
        self.handles = spawn_workers(&self.pipeline, counts)?;

        let pipeline = Arc::clone(&self.pipeline);
        let controller = Arc::clone(&self.controller);
        let observers = self.observers.clone();
        let generated = Arc::clone(&self.world_generated);
        self.handles.push(spawn_named("strata-window".into(), move || {
            run_window_thread(pipeline, controller, observers, generated)
        })?);

        let pipeline = Arc::clone(&self.pipeline);
        let observers = self.observers.clone();
        let generated = Arc::clone(&self.world_generated);
        self.handles.push(spawn_named("strata-interact".into(), move || {
            edit::run_interaction_thread(pipeline, observers, generated)
        })?);
        Ok(())
    }

    /// Runs the render-thread stages once. Call every frame.
    pub fn tick(&mut self, backend: &mut impl RenderBackend) -> TickReport {
        if self.shut_down {
            return TickReport::default();
        }
        let report = scheduler::run_tick(&self.pipeline, backend);
        if !self.world_generated.load(Ordering::Acquire) {
            self.check_generated();
        }
        report
    }

    fn check_generated(&mut self) {
        let rendered = self.initial_window.iter().all(|coord| {
            self.pipeline
                .world
                .get(*coord)
                .is_some_and(|c| c.is_mesh_rendered())
        });
        if !rendered {
            return;
        }

        let position = spawn_position(&self.pipeline, self.spawn_chunk);
        for observer in &self.observers {
            observer.teleport(position);
        }
        self.controller.lock().place_all(self.spawn_chunk);
        self.world_generated.store(true, Ordering::Release);

        tracing::info!(
            chunk = ?self.spawn_chunk,
            x = position.x,
            y = position.y,
            z = position.z,
            "initial world generated"
        );
        self.pipeline.events.broadcast(WorldEvent::Generated {
            spawn_chunk: self.spawn_chunk,
            spawn_position: position,
        });
    }

    pub fn is_world_generated(&self) -> bool {
        self.world_generated.load(Ordering::Acquire)
    }

    pub fn spawn_chunk(&self) -> ChunkCoord {
        self.spawn_chunk
    }

    pub fn subscribe(&self) -> Receiver<WorldEvent> {
        self.pipeline.events.subscribe()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot::capture(&self.pipeline)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The live chunk at `coord`, if any.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.pipeline.world.get(coord)
    }

    pub fn active_coords(&self) -> Vec<ChunkCoord> {
        self.pipeline.active.coords()
    }

    pub fn alive_coords(&self) -> Vec<ChunkCoord> {
        self.pipeline.world.alive_coords()
    }

    /// Places the configured block in front of the first solid block along
    /// the ray. Returns the edited chunk.
    pub fn place_from(&self, origin: Vec3, forward: Vec3) -> Result<Option<ChunkCoord>, StreamError> {
        if self.shut_down {
            return Err(StreamError::ShutDown);
        }
        Ok(edit::place_from(&self.pipeline, origin, forward))
    }

    /// Stops every stage thread and waits for it to exit.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.pipeline.signals.cancel_all();
        self.pipeline.gate.close();

        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("stage").to_string();
            if handle.join().is_err() {
                tracing::error!(thread = %name, "stage thread panicked");
            }
        }
        tracing::info!("streaming engine stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use rustc_hash::FxHashSet;
    use strata_voxel::{BlockCoord, ChunkDirection};

    use super::*;
    use crate::observer::{EditIntent, ScriptedObserver};
    use crate::render::RecordingBackend;

    fn test_config(draw_range: u32) -> Config {
        let mut config = Config::default();
        config.world.draw_range = draw_range;
        config.world.regen_threshold = 2;
        config.pipeline.data_workers = 2;
        config.pipeline.mesh_workers = 2;
        config.pipeline.update_workers = 1;
        config.pipeline.idle_poll_ms = 2;
        config
    }

    /// Ticks until `done` holds or panics after a generous timeout.
    fn tick_until(
        engine: &mut Engine,
        backend: &mut RecordingBackend,
        what: &str,
        mut done: impl FnMut(&Engine, &RecordingBackend) -> bool,
    ) {
        let start = Instant::now();
        while !done(engine, backend) {
            assert!(start.elapsed() < Duration::from_secs(60), "timed out waiting for {what}");
            engine.tick(backend);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn coords(center: ChunkCoord, range: u32) -> FxHashSet<ChunkCoord> {
        center.window(range).collect()
    }

    fn start(
        draw_range: u32,
    ) -> (Engine, RecordingBackend, Arc<ScriptedObserver>, Receiver<WorldEvent>) {
        let mut backend = RecordingBackend::new();
        let observer = Arc::new(ScriptedObserver::new(Vec3::ZERO, Vec3::Z));
        let observers: Vec<Arc<dyn Observer>> = vec![observer.clone()];
        let engine = Engine::start(&test_config(draw_range), observers, &mut backend).unwrap();
        let events = engine.subscribe();
        (engine, backend, observer, events)
    }

    #[test]
    fn test_invalid_placement_block_is_rejected() {
        let mut config = test_config(1);
        config.blocks.placement_block = "marble".into();
        let mut backend = RecordingBackend::new();
        let result = Engine::start(&config, Vec::new(), &mut backend);
        assert!(matches!(result, Err(StreamError::Config(_))));
    }

    #[test]
    fn test_initial_window_of_nine_chunks_renders() {
        let (mut engine, mut backend, observer, events) = start(1);
        tick_until(&mut engine, &mut backend, "world generation", |e, _| e.is_world_generated());

        let expected = coords(ChunkCoord::new(0, 0), 1);
        assert_eq!(expected.len(), 9);
        let active: FxHashSet<_> = engine.active_coords().into_iter().collect();
        assert_eq!(active, expected);
        for coord in &expected {
            assert!(engine.chunk(*coord).is_some_and(|c| c.is_mesh_rendered()));
            assert_eq!(backend.submission_count(*coord), 1);
        }

        let spawn = events
            .iter()
            .find_map(|event| match event {
                WorldEvent::Generated { spawn_position, .. } => Some(spawn_position),
                WorldEvent::PassCompleted { .. } => None,
            })
            .unwrap();
        assert_eq!((spawn.x, spawn.z), (8.0, 8.0));
        assert_eq!(observer.position(), spawn);
        engine.shutdown();
    }

    #[test]
    fn test_moving_observer_runs_one_pass_and_unloads() {
        let (mut engine, mut backend, observer, events) = start(1);
        tick_until(&mut engine, &mut backend, "world generation", |e, _| e.is_world_generated());

        let y = observer.position().y;
        observer.set_position(Vec3::new(40.0, y, 8.0));
        let target = coords(ChunkCoord::new(32, 0), 1);
        tick_until(&mut engine, &mut backend, "window move", |e, _| {
            let alive: FxHashSet<_> = e.alive_coords().into_iter().collect();
            alive == target
                && target
                    .iter()
                    .all(|c| e.chunk(*c).is_some_and(|c| c.is_mesh_rendered()))
                && e.snapshot().is_idle()
        });

        let active: FxHashSet<_> = engine.active_coords().into_iter().collect();
        assert_eq!(active, target);
        for gone in coords(ChunkCoord::new(0, 0), 1).difference(&target) {
            assert!(engine.chunk(*gone).is_none());
            assert!(!backend.has_visual(*gone));
        }
        assert_eq!(backend.live_visual_count(), target.len());

        let passes: Vec<_> = events
            .try_iter()
            .filter_map(|event| match event {
                WorldEvent::PassCompleted { center, .. } => Some(center),
                WorldEvent::Generated { .. } => None,
            })
            .collect();
        assert_eq!(passes, vec![ChunkCoord::new(32, 0)]);
        engine.shutdown();
    }

    #[test]
    fn test_placed_block_triggers_one_remesh() {
        let (mut engine, mut backend, observer, _events) = start(1);
        tick_until(&mut engine, &mut backend, "world generation", |e, _| e.is_world_generated());
        tick_until(&mut engine, &mut backend, "idle pipeline", |e, _| e.snapshot().is_idle());

        let coord = ChunkCoord::new(0, 0);
        let chunk = engine.chunk(coord).unwrap();
        let before = *backend.latest(coord).unwrap();

        // An interior column whose open neighbours at the placement level
        // outnumber or undercut its solid ones, so the face count changes.
        let (cell, expected_delta) = {
            let blocks = chunk.blocks();
            let mut found = None;
            'search: for x in 1..15u8 {
                for z in 1..15u8 {
                    let Some(top) = (0..255u8).rev().find(|y| blocks.get(BlockCoord::new(x, *y, z)).solid) else {
                        continue;
                    };
                    let cell = BlockCoord::new(x, top + 1, z);
                    if !blocks.get(cell).is_air() {
                        continue;
                    }
                    let mut delta = 0i64;
                    let mut fluid = false;
                    for dir in ChunkDirection::ALL {
                        let n = blocks.get(cell.neighbor(dir.face()).unwrap());
                        if n.solid {
                            delta -= 4;
                        } else if n.is_air() {
                            delta += 4;
                        } else {
                            fluid = true;
                        }
                    }
                    if !fluid && delta != 0 {
                        found = Some((cell, delta));
                        break 'search;
                    }
                }
            }
            found.unwrap()
        };

        let origin = Vec3::new(f32::from(cell.x), f32::from(cell.y) + 2.0, f32::from(cell.z));
        observer.set_position(origin);
        observer.set_forward(Vec3::NEG_Y);
        observer.push_intent(EditIntent::Place);

        tick_until(&mut engine, &mut backend, "remesh", |e, b| {
            b.submission_count(coord) == 2 && e.snapshot().is_idle()
        });
        assert_eq!(chunk.block(cell).map(|b| b.kind), Some(BlockType::Sand));
        let after = backend.latest(coord).unwrap();
        assert_eq!(
            after.vertex_count as i64,
            before.vertex_count as i64 + expected_delta
        );
        engine.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent_and_rejects_edits() {
        let (mut engine, _backend, _observer, _events) = start(1);
        engine.shutdown();
        engine.shutdown();
        assert!(matches!(
            engine.place_from(Vec3::ZERO, Vec3::NEG_Y),
            Err(StreamError::ShutDown)
        ));
    }
}
