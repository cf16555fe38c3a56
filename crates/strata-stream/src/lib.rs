//! World streaming: keeps a window of generated, meshed chunks around a set
//! of moving observers.
//!
//! Chunks move through a network of stage queues:
//!
//! ```text
//! instance -> data -> mesh -> render load            (new chunks)
//!                     update -> render update        (edits, new neighbours)
//!                     unload                         (out of range)
//! ```
//!
//! Data, mesh and update stages run on worker pools. Instantiation,
//! submission and unloading run on the caller's render thread through
//! [`Engine::tick`].

pub mod chunk;
pub mod claims;
pub mod edit;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod observer;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod snapshot;
pub mod tables;
pub mod window;
mod workers;

pub use chunk::Chunk;
pub use claims::{Stage, StageClaims};
pub use edit::{place_block, resolve_placement};
pub use engine::{Engine, atlas_from_config, spawn_position};
pub use error::StreamError;
pub use events::{EventHub, WorldEvent};
pub use gate::GenerationGate;
pub use observer::{EditIntent, Observer, ObserverState, ScriptedObserver, regeneration_threshold};
pub use pipeline::{Enqueued, MeshJob, Pipeline};
pub use render::{MeshHandle, RecordingBackend, RenderBackend, SubmissionRecord, VisualHandle};
pub use scheduler::TickReport;
pub use snapshot::{PipelineSnapshot, QueueDepths};
pub use tables::{ActiveTable, WorldTable};
pub use window::{PassReport, WindowController, is_window_edge};
pub use workers::WorkerCounts;
