// RunParser: typed reads of closed MetricsStores with a per-path cache.
// The whole cache is dropped when system memory crosses the high-water mark.

use crate::counter_source;
use crate::error::{MetricsError, Result};
use crate::models::Sample;
use crate::store;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use sysinfo::System;
use tracing::{debug, info, instrument};

pub const DEFAULT_HIGH_WATER_PERCENT: f64 = 85.0;

type MemoryProbe = Box<dyn Fn() -> f64 + Send + Sync>;

pub struct RunParser {
    cache: Mutex<HashMap<PathBuf, Arc<Vec<Sample>>>>,
    high_water_percent: f64,
    memory_probe: MemoryProbe,
}

impl Default for RunParser {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WATER_PERCENT)
    }
}

impl RunParser {
    /// Parser whose cache is dropped when system RAM utilisation exceeds `high_water_percent`.
    pub fn new(high_water_percent: f64) -> Self {
        let sys = Mutex::new(System::new());
        Self::with_memory_probe(high_water_percent, move || match sys.lock() {
            Ok(mut sys) => counter_source::memory_utilization_percent(&mut sys),
            Err(_) => 0.0,
        })
    }

    /// Same as `new` with a custom utilisation probe (percent).
    pub fn with_memory_probe<F>(high_water_percent: f64, probe: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self {
            cache: Mutex::new(HashMap::new()),
            high_water_percent,
            memory_probe: Box::new(probe),
        }
    }

    /// Samples of the store at `metrics_path`, all of them or only those of `step`.
    /// `run_id` is only used to report a missing file.
    #[instrument(skip(self), fields(operation = "parse_run"))]
    pub fn parse(&self, run_id: u32, metrics_path: &Path, step: Option<u32>) -> Result<Vec<Sample>> {
        let samples = self.load(run_id, metrics_path)?;
        Ok(match step {
            Some(step) => samples.iter().filter(|s| s.step == step).cloned().collect(),
            None => samples.as_ref().clone(),
        })
    }

    pub fn cached_runs(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn load(&self, run_id: u32, metrics_path: &Path) -> Result<Arc<Vec<Sample>>> {
        self.relieve_memory_pressure();

        if let Ok(cache) = self.cache.lock()
            && let Some(hit) = cache.get(metrics_path)
        {
            return Ok(hit.clone());
        }

        if !metrics_path.is_file() {
            return Err(MetricsError::MissingArtifact {
                run_id,
                path: metrics_path.to_path_buf(),
            });
        }
        let samples = Arc::new(store::read_samples(metrics_path)?);
        debug!(
            run_id,
            samples = samples.len(),
            path = %metrics_path.display(),
            "run parsed"
        );

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(metrics_path.to_path_buf(), samples.clone());
        }
        Ok(samples)
    }

    fn relieve_memory_pressure(&self) {
        let utilization = (self.memory_probe)();
        if utilization <= self.high_water_percent {
            return;
        }
        if let Ok(mut cache) = self.cache.lock()
            && !cache.is_empty()
        {
            info!(
                utilization_percent = utilization,
                high_water_percent = self.high_water_percent,
                dropped = cache.len(),
                "memory pressure, run cache dropped"
            );
            cache.clear();
        }
    }
}
