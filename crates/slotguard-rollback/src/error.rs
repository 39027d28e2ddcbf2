//! Rollback error types.

use thiserror::Error;

use slotguard_core::ConfigError;

/// Errors from the swap orchestrator.
///
/// Any of these is fatal to the run. A swap is never retried automatically.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("pre-swap check failed: {0}")]
    PreCheck(String),

    #[error("swap command is empty")]
    EmptyCommand,

    #[error("failed to launch swap command {program:?}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("swap command exited with {status}: {stderr}")]
    Command {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("swap failed: {0}")]
    Backend(String),

    #[error("post-swap check failed: {0}")]
    PostCheck(String),
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Swap(#[from] SwapError),
}

pub type RunResult<T> = Result<T, RunError>;
