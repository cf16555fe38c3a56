//! Shared pipeline state: tables, queues, claims and the stage handoffs.
//!
//! Queue membership is a chunk's stage. Every enqueue goes through a claim
//! in [`StageClaims`] first, and every hand-off between stages is a claim
//! transition followed by a send, so a coordinate is in at most one queue
//! at any time.
//!
//! Unloading a coordinate that another stage holds cannot take the claim.
//! Such coordinates go to the pending-unload set instead; the holder sees
//! the mark when it next handles the chunk and forwards it to the unload
//! queue rather than passing it on.
//!
//! Edits follow the same pattern. A remesh request for a held coordinate
//! lands in the pending-remesh set, and the holder queues the update after
//! it releases the claim, so the rebuild always runs after the in-flight one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::DashSet;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use strata_mesh::{BoundarySlice, ChunkMeshData, ChunkNeighborhood};
use strata_terrain::TerrainGenerator;
use strata_voxel::{Block, BlockAtlas, ChunkCoord};

use crate::chunk::Chunk;
use crate::claims::{Stage, StageClaims};
use crate::events::EventHub;
use crate::gate::GenerationGate;
use crate::tables::{ActiveTable, WorldTable};

/// A built mesh on its way to a render stage. The buffer travels with the
/// message and is returned to the chunk after submission.
pub struct MeshJob {
    pub chunk: Arc<Chunk>,
    pub mesh: ChunkMeshData,
}

/// An unbounded FIFO between two stages.
pub struct StageQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> StageQueue<T> {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub(crate) fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }

    pub(crate) fn push(&self, item: T) {
        if let Err(err) = self.tx.send(item) {
            tracing::error!(error = %err, "stage queue disconnected, item dropped");
        }
    }
}

/// One queue per pipeline stage.
pub struct PipelineQueues {
    pub instance: StageQueue<ChunkCoord>,
    pub data: StageQueue<Arc<Chunk>>,
    pub mesh: StageQueue<Arc<Chunk>>,
    pub render_load: StageQueue<MeshJob>,
    pub update: StageQueue<Arc<Chunk>>,
    pub render_update: StageQueue<MeshJob>,
    pub unload: StageQueue<ChunkCoord>,
}

impl PipelineQueues {
    fn new() -> Self {
        Self {
            instance: StageQueue::new(),
            data: StageQueue::new(),
            mesh: StageQueue::new(),
            render_load: StageQueue::new(),
            update: StageQueue::new(),
            render_update: StageQueue::new(),
            unload: StageQueue::new(),
        }
    }
}

/// Cancellation signals, one per worker-pool stage plus the service threads.
#[derive(Default)]
pub struct StageSignals {
    pub data: AtomicBool,
    pub mesh: AtomicBool,
    pub update: AtomicBool,
    pub services: AtomicBool,
}

impl StageSignals {
    pub fn cancel_all(&self) {
        for flag in [&self.data, &self.mesh, &self.update, &self.services] {
            flag.store(true, Ordering::Release);
        }
    }
}

/// Number of workers currently processing an item, per stage.
#[derive(Default)]
pub struct BusyCounters {
    pub data: AtomicUsize,
    pub mesh: AtomicUsize,
    pub update: AtomicUsize,
    pub instantiating: AtomicBool,
}

/// Increments a busy counter for the lifetime of the guard.
pub(crate) struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    pub(crate) fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Result of asking a stage to take a coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// Another stage holds the coordinate; the request was dropped.
    Duplicate(Stage),
}

/// State shared by every stage thread.
pub struct Pipeline {
    pub world: WorldTable,
    pub active: ActiveTable,
    pub claims: StageClaims,
    pub queues: PipelineQueues,
    /// Coordinates to unload as soon as their current holder lets go.
    pub pending_unload: DashSet<ChunkCoord>,
    /// Edited coordinates to remesh once their current holder lets go.
    pub pending_remesh: DashSet<ChunkCoord>,
    pub gate: GenerationGate,
    /// Serializes window passes with the instantiation stage.
    pub pass_lock: Mutex<()>,
    /// Union of every observer's window after the last pass.
    pub window: RwLock<FxHashSet<ChunkCoord>>,
    pub generator: TerrainGenerator,
    pub atlas: Arc<BlockAtlas>,
    pub placement_block: Block,
    pub signals: StageSignals,
    pub busy: BusyCounters,
    pub events: EventHub,
    pub poll: Duration,
}

impl Pipeline {
    pub fn new(
        generator: TerrainGenerator,
        placement_block: Block,
        poll: Duration,
    ) -> Self {
        let atlas = Arc::clone(generator.atlas());
        Self {
            world: WorldTable::new(),
            active: ActiveTable::new(),
            claims: StageClaims::new(),
            queues: PipelineQueues::new(),
            pending_unload: DashSet::new(),
            pending_remesh: DashSet::new(),
            gate: GenerationGate::new(),
            pass_lock: Mutex::new(()),
            window: RwLock::new(FxHashSet::default()),
            generator,
            atlas,
            placement_block,
            signals: StageSignals::default(),
            busy: BusyCounters::default(),
            events: EventHub::new(),
            poll,
        }
    }

    pub fn in_window(&self, coord: ChunkCoord) -> bool {
        self.window.read().contains(&coord)
    }

    // -- entry points ---------------------------------------------------------

    /// Requests instantiation of a coordinate with no live chunk.
    pub fn enqueue_instance(&self, coord: ChunkCoord) -> Enqueued {
        self.claim_and_push(coord, Stage::BuildInstance, || {
            self.queues.instance.push(coord)
        })
    }

    /// Requests a mesh rebuild of a live chunk.
    pub fn enqueue_update(&self, chunk: Arc<Chunk>) -> Enqueued {
        let coord = chunk.coord();
        if self.pending_unload.contains(&coord) {
            tracing::debug!(chunk = ?coord, "update dropped, chunk is pending unload");
            return Enqueued::Duplicate(Stage::Unload);
        }
        self.claim_and_push(coord, Stage::UpdateMesh, || self.queues.update.push(chunk))
    }

    /// Requests a mesh rebuild after an edit.
    ///
    /// Unlike [`enqueue_update`](Self::enqueue_update), a coordinate held by
    /// another stage is not dropped: it is marked and requeued by the holder
    /// once it finishes.
    pub fn request_remesh(&self, chunk: Arc<Chunk>) -> Enqueued {
        let coord = chunk.coord();
        loop {
            if self.pending_unload.contains(&coord) {
                tracing::debug!(chunk = ?coord, "remesh dropped, chunk is pending unload");
                return Enqueued::Duplicate(Stage::Unload);
            }
            let held = match self.claims.try_claim(coord, Stage::UpdateMesh) {
                Ok(()) => {
                    self.queues.update.push(chunk);
                    return Enqueued::Queued;
                }
                Err(Stage::Unload) => return Enqueued::Duplicate(Stage::Unload),
                Err(held) => held,
            };
            self.pending_remesh.insert(coord);
            // Released between the failed claim and the insert.
            if self.claims.stage_of(coord).is_none() && self.pending_remesh.remove(&coord).is_some() {
                continue;
            }
            tracing::debug!(chunk = ?coord, stage = ?held, "remesh deferred to current holder");
            return Enqueued::Duplicate(held);
        }
    }

    /// Requests eviction of a coordinate.
    ///
    /// If another stage holds it, the coordinate is marked pending and the
    /// holder forwards it once done.
    pub fn request_unload(&self, coord: ChunkCoord) -> Enqueued {
        match self.claims.try_claim(coord, Stage::Unload) {
            Ok(()) => {
                self.queues.unload.push(coord);
                Enqueued::Queued
            }
            Err(Stage::Unload) => Enqueued::Duplicate(Stage::Unload),
            Err(held) => {
                self.pending_unload.insert(coord);
                // The holder may have released between the failed claim and
                // the insert; retry so the mark cannot be stranded.
                if self.claims.stage_of(coord).is_none() {
                    self.pending_unload.remove(&coord);
                    return self.request_unload(coord);
                }
                tracing::trace!(chunk = ?coord, stage = ?held, "unload deferred to current holder");
                Enqueued::Duplicate(held)
            }
        }
    }

    fn claim_and_push(&self, coord: ChunkCoord, stage: Stage, push: impl FnOnce()) -> Enqueued {
        match self.claims.try_claim(coord, stage) {
            Ok(()) => {
                push();
                Enqueued::Queued
            }
            Err(held) => {
                tracing::warn!(chunk = ?coord, requested = ?stage, held = ?held, "duplicate enqueue dropped");
                Enqueued::Duplicate(held)
            }
        }
    }

    // -- hand-offs --------------------------------------------------------------

    /// Moves a held coordinate to `to` and pushes it with `push`.
    pub(crate) fn advance(&self, coord: ChunkCoord, from: Stage, to: Stage, push: impl FnOnce()) {
        if self.claims.transition(coord, from, to) {
            push();
        } else {
            tracing::error!(chunk = ?coord, ?from, ?to, "stage claim lost before hand-off");
        }
    }

    /// If `coord` was marked for unload while `from` held it, forwards it to
    /// the unload queue and returns `true`.
    pub(crate) fn divert_pending_unload(&self, coord: ChunkCoord, from: Stage) -> bool {
        if self.pending_unload.remove(&coord).is_none() {
            return false;
        }
        if self.claims.transition(coord, from, Stage::Unload) {
            self.queues.unload.push(coord);
            tracing::debug!(chunk = ?coord, stage = ?from, "pending unload forwarded");
        }
        true
    }

    /// Drops the claim held by `from`, or forwards a pending unload.
    ///
    /// A pending remesh is queued once the claim is released.
    pub(crate) fn finish(&self, coord: ChunkCoord, from: Stage) {
        if self.divert_pending_unload(coord, from) {
            return;
        }
        self.claims.release(coord, from);
        // Marked between the check and the release: nobody holds it now.
        if self.pending_unload.remove(&coord).is_some() {
            self.request_unload(coord);
            return;
        }
        if self.pending_remesh.remove(&coord).is_some() {
            // Active may be mid-rebuild by a pass; the window is already current.
            match self.world.get(coord).filter(|c| c.is_data_ready() && self.in_window(coord)) {
                Some(chunk) => {
                    self.request_remesh(chunk);
                }
                None => tracing::trace!(chunk = ?coord, "remesh dropped, chunk left the window"),
            }
        }
    }

    /// Picks a chunk's lifecycle back up after its unload was cancelled.
    ///
    /// A chunk diverted to unload before its data or first mesh was built
    /// goes back to the stage it left; a rendered chunk is simply released.
    pub(crate) fn resume_after_cancelled_unload(&self, coord: ChunkCoord) {
        let Some(chunk) = self.world.get(coord) else {
            self.claims.release(coord, Stage::Unload);
            self.enqueue_instance(coord);
            return;
        };
        if !chunk.is_data_ready() {
            tracing::debug!(chunk = ?coord, "unload cancelled, resuming block data");
            self.advance(coord, Stage::Unload, Stage::BuildData, || {
                self.queues.data.push(chunk)
            });
        } else if !chunk.is_mesh_rendered() {
            tracing::debug!(chunk = ?coord, "unload cancelled, resuming meshing");
            self.advance(coord, Stage::Unload, Stage::BuildMesh, || {
                self.queues.mesh.push(chunk)
            });
        } else {
            self.finish(coord, Stage::Unload);
        }
    }

    // -- meshing support ---------------------------------------------------------

    /// Snapshot of the four neighbour boundary layers of `coord`.
    ///
    /// A data-ready neighbour supplies its stored blocks. Otherwise the
    /// terrain generator is sampled for the touching cells, which yields
    /// what that neighbour will hold once generated.
    pub fn neighborhood(&self, coord: ChunkCoord) -> ChunkNeighborhood {
        ChunkNeighborhood::gather(|dir| {
            let neighbor = coord.neighbor(dir);
            let slice = match self.world.get(neighbor).filter(|c| c.is_data_ready()) {
                Some(chunk) => BoundarySlice::from_chunk(dir, &chunk.blocks()),
                None => BoundarySlice::from_fn(dir, |local| {
                    self.generator.block_at(neighbor.world_position(local))
                }),
            };
            Some(slice)
        })
    }

    /// Waits out a running window pass. Returns `false` on shutdown.
    pub(crate) fn wait_for_pass(&self, cancel: &AtomicBool) -> bool {
        loop {
            if cancel.load(Ordering::Acquire) || self.gate.is_closed() {
                return false;
            }
            if self.gate.wait_idle(self.poll) {
                return true;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use glam::Vec2;
    use strata_config::Config;
    use strata_mesh::visible_faces;
    use strata_terrain::{HeightmapSampler, NoiseParams};
    use strata_voxel::{
        AtlasEntry, BlockCoord, BlockTiles, BlockType, CHUNK_HEIGHT, CHUNK_SIZE, FaceDirection,
    };

    use super::*;

    pub(crate) fn test_pipeline() -> Pipeline {
        let config = Config::default();
        let entries = BlockType::ALL.into_iter().filter(|k| *k != BlockType::Air).map(|k| {
            (
                k,
                AtlasEntry {
                    tiles: BlockTiles::uniform(glam::UVec2::ZERO),
                    solid: k != BlockType::Water,
                },
            )
        });
        let atlas = Arc::new(BlockAtlas::new(Vec2::splat(0.25), entries).unwrap());
        let generator = TerrainGenerator::new(
            HeightmapSampler::new(NoiseParams::default()),
            config.world.sea_level,
            atlas,
        );
        Pipeline::new(
            generator,
            Block::new(BlockType::Sand, true),
            Duration::from_millis(5),
        )
    }

    /// Empties every queue, tagging each item with the stage it was in.
    fn drain_all(p: &Pipeline) -> Vec<(Stage, ChunkCoord)> {
        let q = &p.queues;
        let mut out = Vec::new();
        out.extend(q.instance.rx.try_iter().map(|c| (Stage::BuildInstance, c)));
        out.extend(q.data.rx.try_iter().map(|c| (Stage::BuildData, c.coord())));
        out.extend(q.mesh.rx.try_iter().map(|c| (Stage::BuildMesh, c.coord())));
        out.extend(q.render_load.rx.try_iter().map(|j| (Stage::RenderLoad, j.chunk.coord())));
        out.extend(q.update.rx.try_iter().map(|c| (Stage::UpdateMesh, c.coord())));
        out.extend(q.render_update.rx.try_iter().map(|j| (Stage::RenderUpdate, j.chunk.coord())));
        out.extend(q.unload.rx.try_iter().map(|c| (Stage::Unload, c)));
        out
    }

    #[test]
    fn test_no_coordinate_is_queued_twice() {
        let p = test_pipeline();
        let coords: Vec<_> = ChunkCoord::new(0, 0).window(1).collect();
        for &c in &coords {
            p.enqueue_instance(c);
        }
        // Move a few along and pile conflicting requests on top.
        for _ in 0..4 {
            let c = p.queues.instance.rx.try_recv().unwrap();
            let chunk = Arc::new(Chunk::new(c));
            p.advance(c, Stage::BuildInstance, Stage::BuildData, || {
                p.queues.data.push(Arc::clone(&chunk))
            });
            p.enqueue_instance(c);
            p.enqueue_update(Arc::clone(&chunk));
            p.request_unload(c);
        }
        for &c in &coords[4..6] {
            p.request_unload(c);
            p.enqueue_update(Arc::new(Chunk::new(c)));
        }

        let queued = drain_all(&p);
        assert_eq!(queued.len(), coords.len());
        for (stage, coord) in &queued {
            assert_eq!(queued.iter().filter(|(_, c)| c == coord).count(), 1);
            assert_eq!(p.claims.stage_of(*coord), Some(*stage));
        }
    }

    #[test]
    fn test_duplicate_instance_is_dropped() {
        let p = test_pipeline();
        let c = ChunkCoord::new(0, 0);
        assert_eq!(p.enqueue_instance(c), Enqueued::Queued);
        assert_eq!(p.enqueue_instance(c), Enqueued::Duplicate(Stage::BuildInstance));
        assert_eq!(p.queues.instance.len(), 1);
    }

    #[test]
    fn test_update_rejected_while_building() {
        let p = test_pipeline();
        let chunk = Arc::new(Chunk::new(ChunkCoord::new(16, 0)));
        p.claims.try_claim(chunk.coord(), Stage::BuildMesh).unwrap();
        assert_eq!(p.enqueue_update(Arc::clone(&chunk)), Enqueued::Duplicate(Stage::BuildMesh));
        assert!(p.queues.update.is_empty());
    }

    #[test]
    fn test_unload_of_held_chunk_is_deferred_then_forwarded() {
        let p = test_pipeline();
        let c = ChunkCoord::new(-16, 0);
        p.claims.try_claim(c, Stage::BuildData).unwrap();
        assert_eq!(p.request_unload(c), Enqueued::Duplicate(Stage::BuildData));
        assert!(p.pending_unload.contains(&c));
        assert!(p.queues.unload.is_empty());

        p.finish(c, Stage::BuildData);
        assert!(!p.pending_unload.contains(&c));
        assert_eq!(p.claims.stage_of(c), Some(Stage::Unload));
        assert_eq!(p.queues.unload.len(), 1);
    }

    #[test]
    fn test_unload_of_idle_chunk_is_queued() {
        let p = test_pipeline();
        let c = ChunkCoord::new(0, 32);
        assert_eq!(p.request_unload(c), Enqueued::Queued);
        assert_eq!(p.request_unload(c), Enqueued::Duplicate(Stage::Unload));
        assert_eq!(p.queues.unload.len(), 1);
    }

    #[test]
    fn test_advance_moves_claim_and_pushes() {
        let p = test_pipeline();
        let chunk = Arc::new(Chunk::new(ChunkCoord::new(0, 0)));
        p.claims.try_claim(chunk.coord(), Stage::BuildData).unwrap();
        p.advance(chunk.coord(), Stage::BuildData, Stage::BuildMesh, || {
            p.queues.mesh.push(Arc::clone(&chunk))
        });
        assert_eq!(p.claims.stage_of(chunk.coord()), Some(Stage::BuildMesh));
        assert_eq!(p.queues.mesh.len(), 1);
    }

    #[test]
    fn test_neighborhood_prefers_ready_chunks() {
        let p = test_pipeline();
        let center = ChunkCoord::new(0, 0);
        let east = Arc::new(Chunk::new(ChunkCoord::new(16, 0)));
        east.fill(strata_voxel::ChunkBlocks::filled(Block::new(BlockType::Stone, true)));
        p.world.insert(Arc::clone(&east));

        let hood = p.neighborhood(center);
        let source = strata_voxel::BlockCoord::new(15, 250, 4);
        assert_eq!(
            hood.block_across(source, strata_voxel::ChunkDirection::East).kind,
            BlockType::Stone
        );
        // Unknown neighbours come from the generator: open sky near the top.
        let west_source = strata_voxel::BlockCoord::new(0, 250, 4);
        assert!(hood.block_across(west_source, strata_voxel::ChunkDirection::West).is_air());
    }

    #[test]
    fn test_generated_neighbors_agree_on_shared_boundary() {
        let p = test_pipeline();
        let cancel = AtomicBool::new(false);
        let west = Arc::new(Chunk::new(ChunkCoord::new(0, 0)));
        let east = Arc::new(Chunk::new(ChunkCoord::new(16, 0)));

        west.fill(p.generator.generate_chunk(west.coord(), &cancel).unwrap());
        p.world.insert(Arc::clone(&west));
        // East has no data yet, so its boundary is sampled from the generator.
        let sampled = p.neighborhood(west.coord());

        east.fill(p.generator.generate_chunk(east.coord(), &cancel).unwrap());
        p.world.insert(Arc::clone(&east));
        let west_hood = p.neighborhood(west.coord());
        let east_hood = p.neighborhood(east.coord());

        let (west_blocks, east_blocks) = (west.blocks(), east.blocks());
        let mut shared_solid = 0;
        for y in 0..CHUNK_HEIGHT {
            for z in 0..CHUNK_SIZE {
                let w = BlockCoord::new(15, y as u8, z as u8);
                let e = BlockCoord::new(0, y as u8, z as u8);
                let west_faces = visible_faces(&west_blocks, &west_hood, w);
                assert_eq!(west_faces, visible_faces(&west_blocks, &sampled, w));

                if west_blocks.get(w).solid && east_blocks.get(e).solid {
                    shared_solid += 1;
                    assert!(!west_faces.is_visible(FaceDirection::East));
                    let east_faces = visible_faces(&east_blocks, &east_hood, e);
                    assert!(!east_faces.is_visible(FaceDirection::West));
                }
            }
        }
        assert!(shared_solid > 0);
    }

    #[test]
    fn test_remesh_of_held_chunk_waits_for_holder() {
        let p = test_pipeline();
        let chunk = Arc::new(Chunk::new(ChunkCoord::new(0, 0)));
        chunk.fill(strata_voxel::ChunkBlocks::filled(Block::AIR));
        p.world.insert(Arc::clone(&chunk));
        p.window.write().insert(chunk.coord());
        p.claims.try_claim(chunk.coord(), Stage::RenderUpdate).unwrap();

        assert_eq!(
            p.request_remesh(Arc::clone(&chunk)),
            Enqueued::Duplicate(Stage::RenderUpdate)
        );
        assert!(p.pending_remesh.contains(&chunk.coord()));
        assert!(p.queues.update.is_empty());

        p.finish(chunk.coord(), Stage::RenderUpdate);
        assert!(!p.pending_remesh.contains(&chunk.coord()));
        assert_eq!(p.claims.stage_of(chunk.coord()), Some(Stage::UpdateMesh));
        assert_eq!(p.queues.update.len(), 1);
    }

    #[test]
    fn test_pending_remesh_outside_window_is_dropped() {
        let p = test_pipeline();
        let chunk = Arc::new(Chunk::new(ChunkCoord::new(0, 0)));
        chunk.fill(strata_voxel::ChunkBlocks::filled(Block::AIR));
        p.claims.try_claim(chunk.coord(), Stage::RenderLoad).unwrap();
        p.request_remesh(Arc::clone(&chunk));

        p.finish(chunk.coord(), Stage::RenderLoad);
        assert!(!p.pending_remesh.contains(&chunk.coord()));
        assert_eq!(p.claims.stage_of(chunk.coord()), None);
        assert!(p.queues.update.is_empty());
    }

    #[test]
    fn test_push_to_disconnected_queue_is_dropped() {
        let (tx, rx) = unbounded::<ChunkCoord>();
        drop(rx);
        let (_, unrelated) = unbounded();
        let queue = StageQueue { tx, rx: unrelated };
        queue.push(ChunkCoord::new(0, 0));
        assert!(queue.is_empty());
    }
}
