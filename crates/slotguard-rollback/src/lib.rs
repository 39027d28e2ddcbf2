//! slotguard-rollback: deciding on, performing, and verifying a slot swap.
//!
//! # Components
//!
//! - **`decision`**: two-rule heuristic (absolute delta, relative ratio)
//! - **`swap`**: swap orchestrator, command-backed swapper, verification hooks
//! - **`recovery`**: bounded recovery polling state machine
//! - **`pipeline`**: wires the components into one run and reports a summary
//!
//! Probe failures never surface as errors here. A run aborts only on an
//! invalid configuration or a failed swap.

pub mod decision;
pub mod error;
pub mod pipeline;
pub mod recovery;
pub mod swap;

pub use decision::{decide, DecisionOutcome, DecisionThresholds, MissingEstimate, SwapReason};
pub use error::{RunError, RunResult, SwapError};
pub use pipeline::{run_pipeline, RecoveryReport, RunSummary};
pub use recovery::{poll_for_recovery, RecoveryPolicy, RecoverySession, RecoveryStatus};
pub use swap::{
    CommandSwapper, HookFuture, SlotSwapper, SwapFuture, SwapHook, SwapOrchestrator, SwapResult,
    SwapTarget,
};
