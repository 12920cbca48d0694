use crate::aggregator::AggregatorOptions;
use crate::store::METRICS_FILE_NAME;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub collector: CollectorConfig,
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    pub sample_interval_ms: u64,
    #[serde(default = "default_metrics_file_name")]
    pub metrics_file_name: String,
    /// Write case-info.json (host provenance) next to the metrics.
    #[serde(default = "default_true")]
    pub write_case_info: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    /// Directory containing the run_<N> directories.
    pub results_path: String,
    pub number_of_steps: u32,
    #[serde(default)]
    pub extended_statistics: bool,
    /// Drop the parsed-run cache when system RAM use exceeds this percentage.
    #[serde(default = "default_cache_high_water_percent")]
    pub cache_high_water_percent: f64,
}

fn default_metrics_file_name() -> String {
    METRICS_FILE_NAME.into()
}

fn default_true() -> bool {
    true
}

fn default_cache_high_water_percent() -> f64 {
    crate::parser::DEFAULT_HIGH_WATER_PERCENT
}

impl CollectorConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.collector.sample_interval_ms > 0,
            "collector.sample_interval_ms must be > 0, got {}",
            self.collector.sample_interval_ms
        );
        anyhow::ensure!(
            !self.collector.metrics_file_name.is_empty(),
            "collector.metrics_file_name must be non-empty"
        );
        anyhow::ensure!(
            !self.aggregation.results_path.is_empty(),
            "aggregation.results_path must be non-empty"
        );
        anyhow::ensure!(
            self.aggregation.number_of_steps > 0,
            "aggregation.number_of_steps must be > 0, got {}",
            self.aggregation.number_of_steps
        );
        anyhow::ensure!(
            self.aggregation.cache_high_water_percent > 0.0
                && self.aggregation.cache_high_water_percent <= 100.0,
            "aggregation.cache_high_water_percent must be in (0, 100], got {}",
            self.aggregation.cache_high_water_percent
        );
        Ok(())
    }

    /// Aggregator options, optionally pointing at another results directory.
    pub fn aggregator_options(&self, results_path: Option<PathBuf>) -> AggregatorOptions {
        AggregatorOptions {
            results_path: results_path
                .unwrap_or_else(|| PathBuf::from(&self.aggregation.results_path)),
            number_of_steps: self.aggregation.number_of_steps,
            metrics_file_name: self.collector.metrics_file_name.clone(),
            extended_statistics: self.aggregation.extended_statistics,
        }
    }
}
