//! World window controller.
//!
//! Decides which chunk coordinates must be live, from the source chunk of
//! every observer, and feeds the differences into the pipeline: missing
//! coordinates to instantiation, former edge chunks that gained a neighbour
//! to mesh update, and everything outside the window to unload.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use strata_voxel::ChunkCoord;

use crate::claims::Stage;
use crate::events::WorldEvent;
use crate::observer::{Observer, ObserverState, regeneration_threshold};
use crate::pipeline::{Enqueued, Pipeline};

/// Counts from one generation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub center: ChunkCoord,
    pub window: usize,
    pub reactivated: usize,
    pub queued_instances: usize,
    pub queued_updates: usize,
    pub queued_unloads: usize,
}

/// `true` if any of `coord`'s four neighbours is outside `window`.
pub fn is_window_edge(window: &FxHashSet<ChunkCoord>, coord: ChunkCoord) -> bool {
    coord.neighbors().iter().any(|n| !window.contains(n))
}

/// Window state shared by the startup pass and the window thread.
pub struct WindowController {
    draw_range: u32,
    threshold: f32,
    /// Source chunk per observer index.
    sources: FxHashMap<usize, ChunkCoord>,
    states: Vec<ObserverState>,
    /// Window coordinates that were on the edge after the last pass.
    edges: FxHashSet<ChunkCoord>,
}

impl WindowController {
    pub fn new(draw_range: u32, regen_threshold: u32, observers: usize) -> Self {
        let origin = ChunkCoord::new(0, 0);
        Self {
            draw_range,
            threshold: regeneration_threshold(regen_threshold, draw_range),
            sources: (0..observers).map(|i| (i, origin)).collect(),
            states: vec![ObserverState::new(origin); observers],
            edges: FxHashSet::default(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn state(&self, observer: usize) -> Option<&ObserverState> {
        self.states.get(observer)
    }

    /// Resets every observer to track from `spawn`.
    pub fn place_all(&mut self, spawn: ChunkCoord) {
        for state in &mut self.states {
            *state = ObserverState::new(spawn);
        }
    }

    /// Union of every observer's window, in a stable order.
    fn desired_window(&self) -> Vec<ChunkCoord> {
        let mut seen = FxHashSet::default();
        let mut sources: Vec<_> = self.sources.iter().collect();
        sources.sort_by_key(|(i, _)| **i);
        sources
            .into_iter()
            .flat_map(|(_, c)| c.window(self.draw_range))
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Recomputes the window with `observer` centred on `center`.
    ///
    /// Holds the pass lock for its whole duration, and the generation gate
    /// while the active table is being rebuilt.
    pub fn generation_pass(
        &mut self,
        pipeline: &Pipeline,
        observer: usize,
        center: ChunkCoord,
    ) -> PassReport {
        let _serial = pipeline.pass_lock.lock();
        self.sources.insert(observer, center);

        let order = self.desired_window();
        let window: FxHashSet<ChunkCoord> = order.iter().copied().collect();
        let previous = std::mem::replace(&mut *pipeline.window.write(), window.clone());

        let mut report = PassReport {
            center,
            window: window.len(),
            ..PassReport::default()
        };

        {
            let _gate = pipeline.gate.begin();
            pipeline.active.clear();
            for &coord in &order {
                // Back in range: cancel any unload still waiting on a holder.
                pipeline.pending_unload.remove(&coord);
                match pipeline.world.get(coord) {
                    Some(chunk) => {
                        pipeline.active.insert(chunk);
                        report.reactivated += 1;
                    }
                    None if pipeline.claims.stage_of(coord) == Some(Stage::BuildInstance) => {}
                    None => {
                        if pipeline.enqueue_instance(coord) == Enqueued::Queued {
                            report.queued_instances += 1;
                        }
                    }
                }
            }
        }

        report.queued_updates = self.refresh_edges(pipeline, &window, &previous);

        for coord in pipeline.world.alive_coords() {
            if !window.contains(&coord) && pipeline.request_unload(coord) == Enqueued::Queued {
                report.queued_unloads += 1;
            }
        }

        tracing::info!(
            observer,
            center = ?center,
            window = report.window,
            reactivated = report.reactivated,
            instances = report.queued_instances,
            updates = report.queued_updates,
            unloads = report.queued_unloads,
            "generation pass complete"
        );
        pipeline.events.broadcast(WorldEvent::PassCompleted {
            center,
            active: pipeline.active.len(),
            queued_instances: report.queued_instances,
            queued_updates: report.queued_updates,
            queued_unloads: report.queued_unloads,
        });
        report
    }

    /// Queues mesh updates for former edge chunks that now border a newly
    /// added coordinate, then records the new edge set.
    fn refresh_edges(
        &mut self,
        pipeline: &Pipeline,
        window: &FxHashSet<ChunkCoord>,
        previous: &FxHashSet<ChunkCoord>,
    ) -> usize {
        let mut queued = 0;
        for &coord in &self.edges {
            if !window.contains(&coord) {
                continue;
            }
            let gained = coord
                .neighbors()
                .iter()
                .any(|n| window.contains(n) && !previous.contains(n));
            if !gained {
                continue;
            }
            let Some(chunk) = pipeline.active.get(coord) else {
                continue;
            };
            if !chunk.is_mesh_rendered() {
                continue;
            }
            if let Some(stage) = pipeline.claims.stage_of(coord) {
                tracing::debug!(chunk = ?coord, ?stage, "edge update skipped, chunk is busy");
                continue;
            }
            if pipeline.enqueue_update(chunk) == Enqueued::Queued {
                queued += 1;
            }
        }

        self.edges = window
            .iter()
            .copied()
            .filter(|c| is_window_edge(window, *c))
            .collect();
        queued
    }

    /// One tracking step over every observer. Runs at most one pass per
    /// observer that moved past the threshold.
    pub fn poll_observers(
        &mut self,
        pipeline: &Pipeline,
        observers: &[Arc<dyn Observer>],
    ) -> Vec<PassReport> {
        let mut reports = Vec::new();
        for (i, observer) in observers.iter().enumerate() {
            let Some(state) = self.states.get_mut(i) else {
                continue;
            };
            if let Some(center) = state.update(observer.position(), self.threshold) {
                tracing::debug!(observer = i, center = ?center, "observer crossed regeneration threshold");
                let report = self.generation_pass(pipeline, i, center);
                if let Some(state) = self.states.get_mut(i) {
                    state.complete(center);
                }
                reports.push(report);
            }
        }
        reports
    }
}

/// Body of the `strata-window` thread.
pub(crate) fn run_window_thread(
    pipeline: Arc<Pipeline>,
    controller: Arc<Mutex<WindowController>>,
    observers: Vec<Arc<dyn Observer>>,
    world_generated: Arc<AtomicBool>,
) {
    let cancel = &pipeline.signals.services;
    while !cancel.load(Ordering::Acquire) {
        if world_generated.load(Ordering::Acquire) {
            controller.lock().poll_observers(&pipeline, &observers);
        }
        std::thread::sleep(pipeline.poll);
    }
    tracing::debug!("window thread exiting");
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::chunk::Chunk;
    use crate::observer::ScriptedObserver;
    use crate::pipeline::tests::test_pipeline;

    fn window_of(center: ChunkCoord, range: u32) -> FxHashSet<ChunkCoord> {
        center.window(range).collect()
    }

    #[test]
    fn test_edge_predicate_checks_all_four_neighbors() {
        let window = window_of(ChunkCoord::new(0, 0), 1);
        assert!(!is_window_edge(&window, ChunkCoord::new(0, 0)));
        assert!(is_window_edge(&window, ChunkCoord::new(16, 0)));
        assert!(is_window_edge(&window, ChunkCoord::new(0, -16)));
        assert!(is_window_edge(&window, ChunkCoord::new(-16, 16)));
    }

    #[test]
    fn test_first_pass_queues_whole_window() {
        let p = test_pipeline();
        let mut controller = WindowController::new(1, 2, 1);
        let report = controller.generation_pass(&p, 0, ChunkCoord::new(0, 0));
        assert_eq!(report.window, 9);
        assert_eq!(report.queued_instances, 9);
        assert_eq!(p.queues.instance.len(), 9);
        assert_eq!(p.window.read().len(), 9);
        assert!(!p.gate.is_in_progress());
    }

    #[test]
    fn test_repeated_pass_does_not_requeue() {
        let p = test_pipeline();
        let mut controller = WindowController::new(1, 2, 1);
        controller.generation_pass(&p, 0, ChunkCoord::new(0, 0));
        let again = controller.generation_pass(&p, 0, ChunkCoord::new(0, 0));
        assert_eq!(again.queued_instances, 0);
        assert_eq!(p.queues.instance.len(), 9);
    }

    #[test]
    fn test_pass_reactivates_and_unloads() {
        let p = test_pipeline();
        let mut controller = WindowController::new(1, 2, 1);
        for coord in ChunkCoord::new(0, 0).window(1) {
            let chunk = Arc::new(Chunk::new(coord));
            p.world.insert(Arc::clone(&chunk));
        }

        let report = controller.generation_pass(&p, 0, ChunkCoord::new(16, 0));
        // Columns x=0 and x=16 survive; x=32 is new; x=-16 leaves.
        assert_eq!(report.reactivated, 6);
        assert_eq!(report.queued_instances, 3);
        assert_eq!(report.queued_unloads, 3);
        assert_eq!(p.active.len(), 6);
        for z in [-16, 0, 16] {
            assert_eq!(
                p.claims.stage_of(ChunkCoord::new(-16, z)),
                Some(Stage::Unload)
            );
        }
    }

    #[test]
    fn test_old_edges_gaining_neighbors_are_updated() {
        let p = test_pipeline();
        let mut controller = WindowController::new(1, 2, 1);
        controller.generation_pass(&p, 0, ChunkCoord::new(0, 0));
        // Pretend the first window finished rendering.
        while p.queues.instance.receiver().try_recv().is_ok() {}
        for coord in ChunkCoord::new(0, 0).window(1) {
            p.claims.release(coord, Stage::BuildInstance);
            let chunk = Arc::new(Chunk::new(coord));
            chunk.set_mesh_rendered(true);
            p.world.insert(chunk);
        }

        let report = controller.generation_pass(&p, 0, ChunkCoord::new(16, 0));
        // The x=16 column gains x=32 neighbours.
        assert_eq!(report.queued_updates, 3);
        for z in [-16, 0, 16] {
            assert_eq!(
                p.claims.stage_of(ChunkCoord::new(16, z)),
                Some(Stage::UpdateMesh)
            );
        }
    }

    #[test]
    fn test_poll_runs_one_pass_per_crossing() {
        let p = test_pipeline();
        let mut controller = WindowController::new(4, 2, 1);
        assert_eq!(controller.threshold(), 40.0);
        let observer = Arc::new(ScriptedObserver::new(Vec3::new(0.0, 80.0, 0.0), Vec3::Z));
        let observers: Vec<Arc<dyn Observer>> = vec![observer.clone()];
        controller.generation_pass(&p, 0, ChunkCoord::new(0, 0));

        assert!(controller.poll_observers(&p, &observers).is_empty());
        observer.set_position(Vec3::new(50.0, 80.0, 0.0));
        let reports = controller.poll_observers(&p, &observers);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].center, ChunkCoord::new(48, 0));
        assert!(controller.poll_observers(&p, &observers).is_empty());
        assert_eq!(controller.state(0).map(|s| s.source_chunk), Some(ChunkCoord::new(48, 0)));
    }
}
