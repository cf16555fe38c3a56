//! Point-in-time view of the pipeline for logs and debugging tools.

use std::sync::atomic::Ordering;

use serde::Serialize;

use crate::claims::Stage;
use crate::pipeline::Pipeline;

/// Depth of every stage queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
    pub build_instance: usize,
    pub build_data: usize,
    pub build_mesh: usize,
    pub render_load: usize,
    pub update_mesh: usize,
    pub render_update: usize,
    pub unload: usize,
}

impl QueueDepths {
    pub fn total(&self) -> usize {
        self.build_instance
            + self.build_data
            + self.build_mesh
            + self.render_load
            + self.update_mesh
            + self.render_update
            + self.unload
    }
}

/// Table sizes, queue depths and busy flags.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSnapshot {
    pub world_chunks: usize,
    pub alive_chunks: usize,
    pub active_chunks: usize,
    pub queues: QueueDepths,
    /// Coordinates waiting on their current holder before unloading.
    pub pending_unload: usize,
    /// Edited coordinates waiting on their current holder before remeshing.
    pub pending_remesh: usize,
    /// Coordinates held by any stage.
    pub claimed: usize,
    /// Claims per stage, in pipeline order.
    pub claims_by_stage: Vec<(Stage, usize)>,
    pub data_busy: bool,
    pub mesh_busy: bool,
    pub update_busy: bool,
    pub generation_in_progress: bool,
    pub instantiating: bool,
}

impl PipelineSnapshot {
    pub fn capture(pipeline: &Pipeline) -> Self {
        let q = &pipeline.queues;
        Self {
            world_chunks: pipeline.world.len(),
            alive_chunks: pipeline.world.alive_count(),
            active_chunks: pipeline.active.len(),
            queues: QueueDepths {
                build_instance: q.instance.len(),
                build_data: q.data.len(),
                build_mesh: q.mesh.len(),
                render_load: q.render_load.len(),
                update_mesh: q.update.len(),
                render_update: q.render_update.len(),
                unload: q.unload.len(),
            },
            pending_unload: pipeline.pending_unload.len(),
            pending_remesh: pipeline.pending_remesh.len(),
            claimed: pipeline.claims.len(),
            claims_by_stage: Stage::ALL
                .into_iter()
                .map(|s| (s, pipeline.claims.count(s)))
                .collect(),
            data_busy: pipeline.busy.data.load(Ordering::Relaxed) > 0,
            mesh_busy: pipeline.busy.mesh.load(Ordering::Relaxed) > 0,
            update_busy: pipeline.busy.update.load(Ordering::Relaxed) > 0,
            generation_in_progress: pipeline.gate.is_in_progress(),
            instantiating: pipeline.busy.instantiating.load(Ordering::Relaxed),
        }
    }

    /// `true` when nothing is queued, claimed or being worked on.
    pub fn is_idle(&self) -> bool {
        self.queues.total() == 0
            && self.claimed == 0
            && self.pending_unload == 0
            && self.pending_remesh == 0
            && !self.data_busy
            && !self.mesh_busy
            && !self.update_busy
            && !self.generation_in_progress
            && !self.instantiating
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use strata_voxel::ChunkCoord;

    use super::*;
    use crate::pipeline::tests::test_pipeline;

    #[test]
    fn test_fresh_pipeline_is_idle() {
        let p = test_pipeline();
        let snap = PipelineSnapshot::capture(&p);
        assert!(snap.is_idle());
        assert_eq!(snap.claims_by_stage.len(), Stage::ALL.len());
    }

    #[test]
    fn test_snapshot_counts_queued_work() {
        let p = test_pipeline();
        p.enqueue_instance(ChunkCoord::new(0, 0));
        p.enqueue_instance(ChunkCoord::new(16, 0));
        let snap = PipelineSnapshot::capture(&p);
        assert_eq!(snap.queues.build_instance, 2);
        assert_eq!(snap.claimed, 2);
        assert!(!snap.is_idle());

        let json = snap.to_json().unwrap();
        assert!(json.contains("\"build_instance\":2"));
        assert!(json.contains("\"build_instance\",2"));
    }
}
