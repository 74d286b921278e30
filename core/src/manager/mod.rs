//! Pool manager
//!
//! A manager owns one pool of workers:
//! - Creating workers in batches with sequential IDs
//! - Supervising each worker and restarting it after transient exits
//! - Routing confirmations from the receiver to worker mailboxes
//! - Cancelling every worker and collecting their statistics on stop
//!
//! # Example
//!
//! ```ignore
//! use tracebench_core::{ManagerBuilder, WorkerConfig};
//!
//! let manager = ManagerBuilder::new("plan-a").result_log(log).build()?;
//! manager.configure(WorkerConfig::new("collector:4318", "0.0.0.0:4319"))?;
//! manager.start().await?;
//! manager.add_workers(5)?;
//!
//! let stats = manager.stop().await?;
//! ```

mod aggregator;
mod builder;
mod executor;

pub use aggregator::{aggregate_worker_stats, AggregatedStats};
pub use builder::{ManagerBuilder, DEFAULT_DRAIN_INTERVAL, DEFAULT_SHUTDOWN_GRACE};
pub use executor::{Manager, PoolStatus};
