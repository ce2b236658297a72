//! Target execution: a persistent forkserver runner (the fast path) with a
//! one-process-per-exec subprocess runner as a fallback when the target
//! was not built with forkserver support.

pub mod fork_server;
pub mod subprocess;

use std::path::Path;
use std::time::Duration;

pub use fork_server::ForkServerRunner;
pub use subprocess::SubprocessRunner;

/// Result of a single exec, uniform across both runner kinds.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub crashed: bool,
    pub hung: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Either runner kind, selected once per target at startup.
pub enum Runner {
    ForkServer(ForkServerRunner),
    Subprocess(SubprocessRunner),
}

impl Runner {
    /// Tries to start a forkserver runner against `target`; falls back to
    /// the subprocess runner on any failure (missing instrumentation,
    /// handshake timeout, spawn failure).
    pub fn start(target: &Path, cov_size: usize) -> Self {
        match ForkServerRunner::start(target, cov_size) {
            Ok(runner) => {
                tracing::info!(target = %target.display(), "forkserver enabled");
                Runner::ForkServer(runner)
            }
            Err(err) => {
                tracing::warn!(target = %target.display(), error = %err, "forkserver unavailable, falling back to subprocess");
                Runner::Subprocess(SubprocessRunner::new(target.to_path_buf()))
            }
        }
    }

    pub fn run_one(&mut self, input: &[u8], timeout: Duration) -> RunOutcome {
        match self {
            Runner::ForkServer(r) => {
                r.clear_coverage();
                r.run_one(input, timeout)
            }
            Runner::Subprocess(r) => r.run_one(input, timeout),
        }
    }

    /// `Some` only for the forkserver runner; the subprocess runner has no
    /// coverage channel and callers fall back to the behavioral signature.
    pub fn coverage_indices(&self) -> Option<Vec<u32>> {
        match self {
            Runner::ForkServer(r) => Some(r.read_coverage_indices()),
            Runner::Subprocess(_) => None,
        }
    }
}
