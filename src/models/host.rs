// Provenance written next to each run's metrics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskInfo {
    pub mount: String,
    pub total_space: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub mac_address: String,
    /// Link speed in bits per second, 0 when unknown.
    pub speed: u64,
}

/// Static host identity, read once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostInfo {
    pub host_name: String,
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    pub architecture: String,
    pub cpu_model: String,
    pub cpu_cores: u32,
    pub ram_total: u64,
    pub swap_total: u64,
    pub disks: Vec<DiskInfo>,
    pub interfaces: Vec<InterfaceInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseInfo {
    pub tool: String,
    pub tool_version: String,
    /// UTC, RFC 3339.
    pub started_at: String,
    pub sample_interval_ms: u64,
    pub number_of_steps: u32,
    pub host: HostInfo,
}
