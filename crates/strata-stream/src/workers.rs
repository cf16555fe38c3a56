//! Worker pools for the data, mesh and mesh-update stages.
//!
//! Each pool is a set of named OS threads draining one stage queue. Idle
//! workers block on the queue for at most the configured poll interval and
//! then re-check their stage's cancellation flag, so shutdown never waits
//! on an empty queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use strata_config::PipelineConfig;
use strata_mesh::{MeshError, build_chunk_mesh};
use strata_terrain::GenerationError;

use crate::chunk::Chunk;
use crate::claims::Stage;
use crate::error::StreamError;
use crate::pipeline::{BusyGuard, MeshJob, Pipeline, StageQueue};

/// Resolved thread counts for the three worker pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerCounts {
    pub data: usize,
    pub mesh: usize,
    pub update: usize,
}

impl WorkerCounts {
    /// Replaces zero entries with a count derived from the CPU count.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let derived = (num_cpus::get() / 2).max(1);
        let or_derived = |n: usize| if n == 0 { derived } else { n };
        Self {
            data: or_derived(config.data_workers),
            mesh: or_derived(config.mesh_workers),
            update: or_derived(config.update_workers),
        }
    }
}

/// Spawns a named thread, mapping the spawn failure into [`StreamError`].
pub(crate) fn spawn_named(
    name: String,
    body: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>, StreamError> {
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|source| StreamError::Spawn { name, source })
}

/// Starts every worker pool. Handles are returned in spawn order.
pub(crate) fn spawn_workers(
    pipeline: &Arc<Pipeline>,
    counts: WorkerCounts,
) -> Result<Vec<JoinHandle<()>>, StreamError> {
    let mut handles = Vec::with_capacity(counts.data + counts.mesh + counts.update);

    for i in 0..counts.data {
        let p = Arc::clone(pipeline);
        handles.push(spawn_named(format!("strata-data-{i}"), move || {
            let rx = p.queues.data.receiver().clone();
            drain(&rx, &p.signals.data, p.poll, |chunk| build_data(&p, chunk));
        })?);
    }
    for i in 0..counts.mesh {
        let p = Arc::clone(pipeline);
        handles.push(spawn_named(format!("strata-mesh-{i}"), move || {
            let rx = p.queues.mesh.receiver().clone();
            drain(&rx, &p.signals.mesh, p.poll, |chunk| {
                let _busy = BusyGuard::enter(&p.busy.mesh);
                build_mesh(&p, chunk, MeshStage::Initial);
            });
        })?);
    }
    for i in 0..counts.update {
        let p = Arc::clone(pipeline);
        handles.push(spawn_named(format!("strata-update-{i}"), move || {
            let rx = p.queues.update.receiver().clone();
            drain(&rx, &p.signals.update, p.poll, |chunk| {
                let _busy = BusyGuard::enter(&p.busy.update);
                build_mesh(&p, chunk, MeshStage::Update);
            });
        })?);
    }

    tracing::info!(
        data = counts.data,
        mesh = counts.mesh,
        update = counts.update,
        "worker pools started"
    );
    Ok(handles)
}

/// Pulls items off `rx` until `cancel` is raised or the queue disconnects.
fn drain<T>(rx: &Receiver<T>, cancel: &AtomicBool, poll: Duration, mut handle: impl FnMut(T)) {
    while !cancel.load(Ordering::Acquire) {
        match rx.recv_timeout(poll) {
            Ok(item) => handle(item),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!(
        thread = std::thread::current().name().unwrap_or("worker"),
        "worker exiting"
    );
}

// ---------------------------------------------------------------------------
// Data stage
// ---------------------------------------------------------------------------

/// Generates block data for a freshly instantiated chunk and hands it to
/// the mesh stage.
pub(crate) fn build_data(p: &Pipeline, chunk: Arc<Chunk>) {
    let _busy = BusyGuard::enter(&p.busy.data);
    let coord = chunk.coord();
    if p.divert_pending_unload(coord, Stage::BuildData) {
        return;
    }

    match p.generator.generate_chunk(coord, &p.signals.data) {
        Ok(blocks) => chunk.fill(blocks),
        Err(GenerationError::Cancelled(_)) => {
            tracing::debug!(chunk = ?coord, "generation cancelled");
            p.finish(coord, Stage::BuildData);
            return;
        }
    }

    if p.divert_pending_unload(coord, Stage::BuildData) {
        return;
    }
    p.advance(coord, Stage::BuildData, Stage::BuildMesh, || {
        p.queues.mesh.push(chunk)
    });
}

// ---------------------------------------------------------------------------
// Mesh stages
// ---------------------------------------------------------------------------

/// Which of the two meshing stages is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MeshStage {
    /// First mesh of a new chunk, delivered to the render-load stage.
    Initial,
    /// Rebuild of an edited chunk, delivered to the render-update stage.
    Update,
}

impl MeshStage {
    fn held(self) -> Stage {
        match self {
            Self::Initial => Stage::BuildMesh,
            Self::Update => Stage::UpdateMesh,
        }
    }

    fn next(self) -> Stage {
        match self {
            Self::Initial => Stage::RenderLoad,
            Self::Update => Stage::RenderUpdate,
        }
    }

    fn cancel(self, p: &Pipeline) -> &AtomicBool {
        match self {
            Self::Initial => &p.signals.mesh,
            Self::Update => &p.signals.update,
        }
    }

    fn output(self, p: &Pipeline) -> &StageQueue<MeshJob> {
        match self {
            Self::Initial => &p.queues.render_load,
            Self::Update => &p.queues.render_update,
        }
    }
}

/// Builds the mesh of an active, data-ready chunk.
///
/// Chunks that left the window, or were marked for unload, are dropped or
/// forwarded without meshing.
pub(crate) fn build_mesh(p: &Pipeline, chunk: Arc<Chunk>, stage: MeshStage) {
    let coord = chunk.coord();
    let held = stage.held();
    let cancel = stage.cancel(p);

    if !p.wait_for_pass(cancel) {
        p.finish(coord, held);
        return;
    }
    if p.divert_pending_unload(coord, held) {
        return;
    }
    if !p.active.contains(coord) {
        tracing::debug!(chunk = ?coord, ?stage, "chunk left the window before meshing");
        p.finish(coord, held);
        return;
    }
    if !chunk.is_data_ready() {
        tracing::warn!(chunk = ?coord, ?stage, "mesh requested before block data");
        p.finish(coord, held);
        return;
    }

    let neighborhood = p.neighborhood(coord);
    let mut mesh = chunk.take_mesh();
    let result = {
        let blocks = chunk.blocks();
        build_chunk_mesh(coord, &blocks, &neighborhood, &p.atlas, &mut mesh, cancel)
    };

    match result {
        Ok(()) => {
            if p.divert_pending_unload(coord, held) {
                chunk.return_mesh(mesh);
                return;
            }
            if p.claims.transition(coord, held, stage.next()) {
                tracing::trace!(chunk = ?coord, vertices = mesh.vertex_count(), ?stage, "mesh built");
                stage.output(p).push(MeshJob { chunk, mesh });
            } else {
                tracing::error!(chunk = ?coord, ?stage, "stage claim lost after meshing");
                chunk.return_mesh(mesh);
            }
        }
        Err(err) => {
            match err {
                MeshError::Cancelled(_) => tracing::debug!(chunk = ?coord, ?stage, "meshing cancelled"),
                MeshError::Atlas(_) => {
                    tracing::error!(chunk = ?coord, ?stage, error = %err, "meshing failed")
                }
            }
            chunk.return_mesh(mesh);
            p.finish(coord, held);
        }
    }
}
