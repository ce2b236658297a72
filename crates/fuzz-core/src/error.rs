use std::io;

/// Errors a caller of the runner layer might want to branch on.
///
/// Everything above this layer (CLI argument handling, directory
/// enumeration) is reported with `anyhow` instead.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("forkserver handshake did not complete within {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("failed to allocate shared memory segment: {0}")]
    ShMemSetup(String),

    #[error("failed to spawn target process: {0}")]
    Spawn(#[source] io::Error),

    #[error("target exited before completing handshake")]
    TargetExitedEarly,
}
