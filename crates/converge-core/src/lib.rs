//! Converge Core
//!
//! This crate drives a single state-changing remote call to a terminal
//! outcome: submit the mutation, then poll the task the remote side hands
//! back until it reports success, reports failure, or the deadline passes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │        resource code (converge-cloud, CLI)      │
//! └─────────────────┬───────────────────────────────┘
//!                   │ Operation
//! ┌─────────────────▼───────────────────────────────┐
//! │                 converge-core                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Converger / converge()                   │   │
//! │  │  SUBMITTED → POLLING → SUCCESS            │   │
//! │  │                      → FAILED             │   │
//! │  │                      → TIMED_OUT          │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  StatusMap   │  │ RetryConfig  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait TaskBackend { submit, poll }
//!           ┌───────▼───────┐
//!           │ remote API    │
//!           └───────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod mutator;
pub mod outcome;
pub mod retry;
pub mod status;
pub mod task;

// Re-exports
pub use backend::TaskBackend;
pub use error::{ConvergeError, ConvergeResult, StatusError, TransitionError};
pub use mutator::{ConvergeConfig, Converger, converge};
pub use outcome::Convergence;
pub use retry::{ErrorClass, RetryConfig, Retryable};
pub use status::StatusMap;
pub use task::{AsyncTask, Operation, PollResult, TaskId, TaskStatus};
