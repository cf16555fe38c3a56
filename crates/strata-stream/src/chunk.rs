//! The chunk entity shared between pipeline stages.
//!
//! A [`Chunk`] is created by the instantiation stage and lives behind an
//! `Arc` in the world table. Block storage is written once by the data
//! stage and afterwards only through single-block edits. The mesh buffer
//! is moved out by whichever stage is building and moved back by the render
//! stage after submission.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use strata_mesh::ChunkMeshData;
use strata_voxel::{Block, BlockCoord, ChunkBlocks, ChunkCoord};

use crate::render::{MeshHandle, VisualHandle};

/// One chunk column and its pipeline flags.
pub struct Chunk {
    coord: ChunkCoord,
    neighbors: [ChunkCoord; 4],
    blocks: RwLock<ChunkBlocks>,
    data_ready: AtomicBool,
    mesh_rendered: AtomicBool,
    mesh: Mutex<Option<ChunkMeshData>>,
    visual: Mutex<Option<VisualHandle>>,
    mesh_handle: Mutex<Option<MeshHandle>>,
}

impl Chunk {
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            neighbors: coord.neighbors(),
            blocks: RwLock::new(ChunkBlocks::air()),
            data_ready: AtomicBool::new(false),
            mesh_rendered: AtomicBool::new(false),
            mesh: Mutex::new(Some(ChunkMeshData::new())),
            visual: Mutex::new(None),
            mesh_handle: Mutex::new(None),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// The four horizontally adjacent chunk coordinates (N, E, S, W).
    pub fn neighbors(&self) -> &[ChunkCoord; 4] {
        &self.neighbors
    }

    // -- block data --------------------------------------------------------

    pub fn is_data_ready(&self) -> bool {
        self.data_ready.load(Ordering::Acquire)
    }

    /// Installs generated blocks and marks the chunk data-ready.
    pub fn fill(&self, blocks: ChunkBlocks) {
        *self.blocks.write() = blocks;
        self.data_ready.store(true, Ordering::Release);
    }

    /// Read access to the block storage. Only meaningful once data-ready.
    pub fn blocks(&self) -> RwLockReadGuard<'_, ChunkBlocks> {
        self.blocks.read()
    }

    /// The block at `local`, or `None` before the data stage has run.
    pub fn block(&self, local: BlockCoord) -> Option<Block> {
        self.is_data_ready().then(|| self.blocks.read().get(local))
    }

    /// Replaces the block at `local` if the chunk is data-ready and the cell holds air.
    ///
    /// Returns `true` when the block was stored.
    pub fn replace_air(&self, local: BlockCoord, block: Block) -> bool {
        if !self.is_data_ready() {
            return false;
        }
        let mut blocks = self.blocks.write();
        if !blocks.get(local).is_air() {
            return false;
        }
        blocks.set(local, block);
        true
    }

    // -- mesh ---------------------------------------------------------------

    pub fn is_mesh_rendered(&self) -> bool {
        self.mesh_rendered.load(Ordering::Acquire)
    }

    pub(crate) fn set_mesh_rendered(&self, rendered: bool) {
        self.mesh_rendered.store(rendered, Ordering::Release);
    }

    /// Data-ready and rendered: safe to read and edit from gameplay code.
    pub fn is_accessible(&self) -> bool {
        self.is_data_ready() && self.is_mesh_rendered()
    }

    /// Moves the mesh buffer out for a build. A missing buffer is replaced
    /// with a fresh one.
    pub(crate) fn take_mesh(&self) -> ChunkMeshData {
        self.mesh.lock().take().unwrap_or_else(|| {
            tracing::warn!(chunk = ?self.coord, "mesh buffer was not returned by its last holder");
            ChunkMeshData::new()
        })
    }

    /// Returns the mesh buffer after its holder is done with it.
    pub(crate) fn return_mesh(&self, mesh: ChunkMeshData) {
        *self.mesh.lock() = Some(mesh);
    }

    // -- render resources -----------------------------------------------------

    pub(crate) fn set_visual(&self, handle: VisualHandle) -> Option<VisualHandle> {
        self.visual.lock().replace(handle)
    }

    pub(crate) fn take_visual(&self) -> Option<VisualHandle> {
        self.visual.lock().take()
    }

    pub(crate) fn set_mesh_handle(&self, handle: MeshHandle) -> Option<MeshHandle> {
        self.mesh_handle.lock().replace(handle)
    }

    pub(crate) fn take_mesh_handle(&self) -> Option<MeshHandle> {
        self.mesh_handle.lock().take()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("data_ready", &self.is_data_ready())
            .field("mesh_rendered", &self.is_mesh_rendered())
            .finish()
    }
}
