//! Stages that run on the render thread.
//!
//! Instantiation, mesh submission and unloading all touch backend
//! resources, so they are driven cooperatively from
//! [`Engine::tick`](crate::Engine::tick) rather than from worker pools.
//! Instantiation and unloading hold the pass lock so they never interleave
//! with a window pass.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use strata_mesh::SubmittedMesh;
use strata_voxel::ChunkCoord;

use crate::chunk::Chunk;
use crate::claims::Stage;
use crate::pipeline::{MeshJob, Pipeline};
use crate::render::RenderBackend;

/// Work done by one scheduler tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub instantiated: usize,
    pub loaded: usize,
    pub updated: usize,
    pub unloaded: usize,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Runs every render-thread stage once, draining what is queued.
pub(crate) fn run_tick(pipeline: &Pipeline, backend: &mut impl RenderBackend) -> TickReport {
    let mut report = TickReport {
        instantiated: instantiate_pending(pipeline, backend),
        ..TickReport::default()
    };

    while let Ok(job) = pipeline.queues.render_load.receiver().try_recv() {
        if submit(pipeline, backend, job, Stage::RenderLoad) {
            report.loaded += 1;
        }
    }
    while let Ok(job) = pipeline.queues.render_update.receiver().try_recv() {
        if submit(pipeline, backend, job, Stage::RenderUpdate) {
            report.updated += 1;
        }
    }

    report.unloaded = unload_pending(pipeline, backend);
    report
}

/// Creates chunks for queued coordinates and hands them to the data stage.
pub(crate) fn instantiate_pending(pipeline: &Pipeline, backend: &mut impl RenderBackend) -> usize {
    let rx = pipeline.queues.instance.receiver();
    if rx.is_empty() {
        return 0;
    }
    let _serial = pipeline.pass_lock.lock();
    pipeline.busy.instantiating.store(true, Ordering::Relaxed);

    let mut created = 0;
    while let Ok(coord) = rx.try_recv() {
        if !pipeline.in_window(coord) {
            tracing::trace!(chunk = ?coord, "instance request outside the window dropped");
            pipeline.claims.release(coord, Stage::BuildInstance);
            continue;
        }
        if let Some(existing) = pipeline.world.get(coord) {
            tracing::warn!(chunk = ?coord, "instance requested for a live chunk");
            pipeline.active.insert(existing);
            pipeline.claims.release(coord, Stage::BuildInstance);
            continue;
        }

        let chunk = Arc::new(Chunk::new(coord));
        chunk.set_visual(backend.attach_visual(coord));
        pipeline.world.insert(Arc::clone(&chunk));
        pipeline.active.insert(Arc::clone(&chunk));
        pipeline.advance(coord, Stage::BuildInstance, Stage::BuildData, || {
            pipeline.queues.data.push(chunk)
        });
        created += 1;
    }

    pipeline.busy.instantiating.store(false, Ordering::Relaxed);
    if created > 0 {
        tracing::debug!(created, "chunks instantiated");
    }
    created
}

/// Hands a built mesh to the backend. Returns `true` if it was submitted.
fn submit(
    pipeline: &Pipeline,
    backend: &mut impl RenderBackend,
    job: MeshJob,
    held: Stage,
) -> bool {
    let MeshJob { chunk, mut mesh } = job;
    let coord = chunk.coord();

    if pipeline.divert_pending_unload(coord, held) {
        chunk.return_mesh(mesh);
        return false;
    }
    if !pipeline.active.contains(coord) {
        tracing::debug!(chunk = ?coord, stage = ?held, "mesh for inactive chunk discarded");
        chunk.return_mesh(mesh);
        pipeline.finish(coord, held);
        return false;
    }

    let submitted = SubmittedMesh::take_from(&mut mesh);
    let handle = backend.submit_mesh(coord, submitted);
    if let Some(previous) = chunk.set_mesh_handle(handle) {
        backend.release_mesh(previous);
    }
    chunk.return_mesh(mesh);
    chunk.set_mesh_rendered(true);

    if held == Stage::RenderUpdate {
        pipeline.world.insert(Arc::clone(&chunk));
        pipeline.active.insert(Arc::clone(&chunk));
    }
    pipeline.finish(coord, held);
    true
}

/// Evicts queued coordinates that are still outside the window.
pub(crate) fn unload_pending(pipeline: &Pipeline, backend: &mut impl RenderBackend) -> usize {
    let rx = pipeline.queues.unload.receiver();
    if rx.is_empty() {
        return 0;
    }
    let _serial = pipeline.pass_lock.lock();

    let mut evicted = 0;
    while let Ok(coord) = rx.try_recv() {
        pipeline.pending_unload.remove(&coord);
        if pipeline.in_window(coord) {
            tracing::trace!(chunk = ?coord, "unload cancelled, chunk is back in range");
            pipeline.resume_after_cancelled_unload(coord);
            continue;
        }
        if let Some(chunk) = pipeline.world.unload(coord) {
            release_resources(backend, &chunk, coord);
            evicted += 1;
        }
        pipeline.pending_remesh.remove(&coord);
        pipeline.claims.release(coord, Stage::Unload);
    }
    if evicted > 0 {
        tracing::debug!(evicted, "chunks unloaded");
    }
    evicted
}

fn release_resources(backend: &mut impl RenderBackend, chunk: &Chunk, coord: ChunkCoord) {
    if let Some(mesh) = chunk.take_mesh_handle() {
        backend.release_mesh(mesh);
    }
    if let Some(visual) = chunk.take_visual() {
        backend.detach_visual(visual);
    }
    chunk.set_mesh_rendered(false);
    tracing::trace!(chunk = ?coord, "chunk resources released");
}
