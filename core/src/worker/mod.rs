//! Worker module: the simulated client loop
//!
//! Each Worker is a tokio task that repeats one iteration until the pool's
//! cancellation token fires:
//!
//! 1. Generate a synthetic trace (random depth, span work, attributes)
//! 2. Export it with a bounded send timeout
//! 3. Wait for the confirmation, a receive timeout, or cancellation
//! 4. Write one result line and update metrics
//! 5. Cool down after a success, then repeat
//!
//! Per-iteration failures never end the loop. The pool manager supervises
//! each worker and restarts it on anything other than cancellation.
//!
//! # Example
//!
//! ```ignore
//! use tracebench_core::worker::{WorkerBuilder, WorkerExit};
//!
//! let mut worker = WorkerBuilder::new("plan-a", 1)
//!     .config(config)
//!     .exporter(exporter)
//!     .mailbox(rx)
//!     .cancel_token(token)
//!     .result_log(log)
//!     .build()?;
//!
//! match worker.run().await {
//!     WorkerExit::Cancelled => {}
//!     WorkerExit::Transient(e) => eprintln!("worker broke: {e}"),
//! }
//! ```

mod builder;
mod executor;
mod generator;
mod record;
mod stats;

pub use builder::WorkerBuilder;
pub use executor::{IterationOutcome, Worker, WorkerExit};
pub use generator::{random_duration, ChildPlan, TraceGenerator, TracePlan};
pub use record::{IterationRecord, WorkerStatus};
pub use stats::WorkerStats;

#[cfg(test)]
mod tests;
