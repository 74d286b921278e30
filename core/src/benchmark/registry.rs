//! Named benchmarks

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::{BenchError, BenchResult};

use super::executor::{Benchmark, BenchmarkOptions};

/// Benchmarks by name, created on first reference
#[derive(Debug, Default)]
pub struct BenchmarkRegistry {
    options: BenchmarkOptions,
    benchmarks: Mutex<BTreeMap<String, Arc<Benchmark>>>,
}

impl BenchmarkRegistry {
    /// Create an empty registry whose benchmarks share `options`
    pub fn new(options: BenchmarkOptions) -> Self {
        Self {
            options,
            benchmarks: Mutex::new(BTreeMap::new()),
        }
    }

    /// The benchmark called `name`, created unconfigured if unknown
    pub fn get_or_create(&self, name: &str) -> Arc<Benchmark> {
        let mut benchmarks = self.benchmarks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(benchmarks.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(benchmark = name, "Creating benchmark");
            Arc::new(Benchmark::new(name, self.options.clone()))
        }))
    }

    /// The benchmark called `name`, if any
    pub fn get(&self, name: &str) -> Option<Arc<Benchmark>> {
        self.benchmarks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Names of all benchmarks, sorted
    pub fn names(&self) -> Vec<String> {
        self.benchmarks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Destroy the benchmark called `name` and forget it
    ///
    /// # Errors
    ///
    /// `BenchmarkNotFound` for an unknown name; otherwise whatever
    /// [`Benchmark::destroy`] returns, in which case the benchmark stays
    /// registered.
    pub async fn destroy(&self, name: &str) -> BenchResult<()> {
        let benchmark = self
            .get(name)
            .ok_or_else(|| BenchError::BenchmarkNotFound(name.to_string()))?;
        benchmark.destroy().await?;

        let mut benchmarks = self.benchmarks.lock().unwrap_or_else(|e| e.into_inner());
        if benchmarks
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, &benchmark))
        {
            benchmarks.remove(name);
        }
        Ok(())
    }
}
