// Per-step summary rows and cross-run statistics rows.

use serde::{Deserialize, Serialize};

pub const SUMMARY_COLUMNS: [&str; 30] = [
    "number_of_samples",
    "step",
    "duration",
    "version",
    "cpu_user_diff",
    "cpu_system_diff",
    "cpu_user_system_diff",
    "cpu_idle_diff",
    "cpu_iowait_diff",
    "memory_ram_max",
    "memory_swap_max",
    "memory_ram_swap_max",
    "memory_ram_min",
    "memory_swap_min",
    "memory_ram_swap_min",
    "disk_read_count_diff",
    "disk_write_count_diff",
    "disk_read_bytes_diff",
    "disk_write_bytes_diff",
    "disk_read_time_diff",
    "disk_write_time_diff",
    "disk_busy_time_diff",
    "network_received_count_diff",
    "network_sent_count_diff",
    "network_received_bytes_diff",
    "network_sent_bytes_diff",
    "network_received_error_diff",
    "network_sent_error_diff",
    "network_received_drop_diff",
    "network_sent_drop_diff",
];

/// One row per step: `_diff` = last - first within the step, memory = min/max over the step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub number_of_samples: u64,
    pub step: u32,
    pub duration: f64,
    pub version: u32,
    pub cpu_user_diff: f64,
    pub cpu_system_diff: f64,
    pub cpu_user_system_diff: f64,
    pub cpu_idle_diff: f64,
    pub cpu_iowait_diff: f64,
    pub memory_ram_max: u64,
    pub memory_swap_max: u64,
    pub memory_ram_swap_max: u64,
    pub memory_ram_min: u64,
    pub memory_swap_min: u64,
    pub memory_ram_swap_min: u64,
    pub disk_read_count_diff: Option<u64>,
    pub disk_write_count_diff: Option<u64>,
    pub disk_read_bytes_diff: Option<u64>,
    pub disk_write_bytes_diff: Option<u64>,
    pub disk_read_time_diff: Option<u64>,
    pub disk_write_time_diff: Option<u64>,
    pub disk_busy_time_diff: Option<u64>,
    pub network_received_count_diff: Option<u64>,
    pub network_sent_count_diff: Option<u64>,
    pub network_received_bytes_diff: Option<u64>,
    pub network_sent_bytes_diff: Option<u64>,
    pub network_received_error_diff: Option<u64>,
    pub network_sent_error_diff: Option<u64>,
    pub network_received_drop_diff: Option<u64>,
    pub network_sent_drop_diff: Option<u64>,
}

impl SummaryEntry {
    /// Numeric metrics compared across runs in extended statistics mode.
    /// Absent counters are skipped.
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![
            ("duration", self.duration),
            ("cpu_user_diff", self.cpu_user_diff),
            ("cpu_system_diff", self.cpu_system_diff),
            ("cpu_user_system_diff", self.cpu_user_system_diff),
            ("cpu_idle_diff", self.cpu_idle_diff),
            ("cpu_iowait_diff", self.cpu_iowait_diff),
            ("memory_ram_max", self.memory_ram_max as f64),
            ("memory_swap_max", self.memory_swap_max as f64),
            ("memory_ram_swap_max", self.memory_ram_swap_max as f64),
        ];
        let counters = [
            ("disk_read_count_diff", self.disk_read_count_diff),
            ("disk_write_count_diff", self.disk_write_count_diff),
            ("disk_read_bytes_diff", self.disk_read_bytes_diff),
            ("disk_write_bytes_diff", self.disk_write_bytes_diff),
            ("disk_read_time_diff", self.disk_read_time_diff),
            ("disk_write_time_diff", self.disk_write_time_diff),
            ("disk_busy_time_diff", self.disk_busy_time_diff),
            ("network_received_count_diff", self.network_received_count_diff),
            ("network_sent_count_diff", self.network_sent_count_diff),
            ("network_received_bytes_diff", self.network_received_bytes_diff),
            ("network_sent_bytes_diff", self.network_sent_bytes_diff),
            ("network_received_error_diff", self.network_received_error_diff),
            ("network_sent_error_diff", self.network_sent_error_diff),
            ("network_received_drop_diff", self.network_received_drop_diff),
            ("network_sent_drop_diff", self.network_sent_drop_diff),
        ];
        out.extend(
            counters
                .into_iter()
                .filter_map(|(name, v)| v.map(|v| (name, v as f64))),
        );
        out
    }
}

pub const STATISTICS_COLUMNS: [&str; 8] = [
    "step", "metric", "runs", "median", "mean", "min", "max", "stddev",
];

/// Spread of one metric of one step over every valid run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStatistics {
    pub step: u32,
    pub metric: String,
    pub runs: usize,
    pub median: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}
