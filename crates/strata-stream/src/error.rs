use strata_voxel::AtlasError;
use thiserror::Error;

/// Errors returned while starting or driving the streaming engine.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The configured block atlas is unusable.
    #[error("invalid block configuration: {0}")]
    Config(#[from] AtlasError),
    /// A stage thread could not be spawned.
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    /// The engine has already been shut down.
    #[error("engine is shut down")]
    ShutDown,
}
