//! Benchmark lifecycle and registry
//!
//! A [`Benchmark`] ties a [`BenchConfig`](crate::config::BenchConfig) to one
//! pool manager per run and drives it with a scaling engine. The
//! [`BenchmarkRegistry`] holds benchmarks by name.
//!
//! # Example
//!
//! ```ignore
//! use tracebench_core::{BenchmarkOptions, BenchmarkRegistry};
//!
//! let registry = BenchmarkRegistry::new(BenchmarkOptions::default());
//! let benchmark = registry.get_or_create("checkout");
//! benchmark.configure(plan).await?;
//! benchmark.start().await?;
//! // ...
//! let stats = benchmark.stop().await?;
//! registry.destroy("checkout").await?;
//! ```

mod executor;
mod registry;
mod state;

pub use executor::{Benchmark, BenchmarkOptions, BenchmarkStatus};
pub use registry::BenchmarkRegistry;
pub use state::{BenchmarkState, UnknownState};
