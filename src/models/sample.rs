// One row of a MetricsStore. Field order is the on-disk column order.

use serde::{Deserialize, Serialize};

use super::{CounterSnapshot, DiskIo, NetworkIo};

/// Schema version written into every row.
pub const METRICS_VERSION: u32 = 2;

/// Column order of a MetricsStore and of the aggregated output.
pub const SAMPLE_COLUMNS: [&str; 27] = [
    "index",
    "step",
    "timestamp",
    "version",
    "cpu_user",
    "cpu_system",
    "cpu_user_system",
    "cpu_idle",
    "cpu_iowait",
    "memory_ram",
    "memory_swap",
    "memory_ram_swap",
    "disk_read_count",
    "disk_write_count",
    "disk_read_bytes",
    "disk_write_bytes",
    "disk_read_time",
    "disk_write_time",
    "disk_busy_time",
    "network_received_count",
    "network_sent_count",
    "network_received_bytes",
    "network_sent_bytes",
    "network_received_error",
    "network_sent_error",
    "network_received_drop",
    "network_sent_drop",
];

/// Round time-based values to 4 decimal places.
pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Disk and network columns are empty when the host has no such counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub index: u64,
    pub step: u32,
    pub timestamp: f64,
    pub version: u32,
    pub cpu_user: f64,
    pub cpu_system: f64,
    pub cpu_user_system: f64,
    pub cpu_idle: f64,
    pub cpu_iowait: f64,
    pub memory_ram: u64,
    pub memory_swap: u64,
    pub memory_ram_swap: u64,
    pub disk_read_count: Option<u64>,
    pub disk_write_count: Option<u64>,
    pub disk_read_bytes: Option<u64>,
    pub disk_write_bytes: Option<u64>,
    pub disk_read_time: Option<u64>,
    pub disk_write_time: Option<u64>,
    pub disk_busy_time: Option<u64>,
    pub network_received_count: Option<u64>,
    pub network_sent_count: Option<u64>,
    pub network_received_bytes: Option<u64>,
    pub network_sent_bytes: Option<u64>,
    pub network_received_error: Option<u64>,
    pub network_sent_error: Option<u64>,
    pub network_received_drop: Option<u64>,
    pub network_sent_drop: Option<u64>,
}

impl Sample {
    /// Builds a row from counter deltas (memory absolute). Time fields are rounded.
    pub fn from_delta(index: u64, step: u32, timestamp: f64, delta: &CounterSnapshot) -> Self {
        let cpu_user = round4(delta.cpu.user);
        let cpu_system = round4(delta.cpu.system);
        let mut sample = Sample {
            index,
            step,
            timestamp: round4(timestamp),
            version: METRICS_VERSION,
            cpu_user,
            cpu_system,
            cpu_user_system: round4(cpu_user + cpu_system),
            cpu_idle: round4(delta.cpu.idle),
            cpu_iowait: round4(delta.cpu.iowait),
            memory_ram: delta.memory.ram_used,
            memory_swap: delta.memory.swap_used,
            memory_ram_swap: delta.memory.ram_used.saturating_add(delta.memory.swap_used),
            disk_read_count: None,
            disk_write_count: None,
            disk_read_bytes: None,
            disk_write_bytes: None,
            disk_read_time: None,
            disk_write_time: None,
            disk_busy_time: None,
            network_received_count: None,
            network_sent_count: None,
            network_received_bytes: None,
            network_sent_bytes: None,
            network_received_error: None,
            network_sent_error: None,
            network_received_drop: None,
            network_sent_drop: None,
        };
        if let Some(disk) = &delta.disk {
            sample.set_disk(disk);
        }
        if let Some(network) = &delta.network {
            sample.set_network(network);
        }
        sample
    }

    /// The first row of a run: timestamp and every delta zero, memory at its baseline value.
    pub fn initial(step: u32, baseline: &CounterSnapshot) -> Self {
        let zero = CounterSnapshot {
            cpu: Default::default(),
            memory: baseline.memory,
            disk: baseline.disk.map(|_| DiskIo::default()),
            network: baseline.network.map(|_| NetworkIo::default()),
        };
        Self::from_delta(1, step, 0.0, &zero)
    }

    fn set_disk(&mut self, d: &DiskIo) {
        self.disk_read_count = Some(d.read_count);
        self.disk_write_count = Some(d.write_count);
        self.disk_read_bytes = Some(d.read_bytes);
        self.disk_write_bytes = Some(d.write_bytes);
        self.disk_read_time = Some(d.read_time);
        self.disk_write_time = Some(d.write_time);
        self.disk_busy_time = Some(d.busy_time);
    }

    fn set_network(&mut self, n: &NetworkIo) {
        self.network_received_count = Some(n.packets_recv);
        self.network_sent_count = Some(n.packets_sent);
        self.network_received_bytes = Some(n.bytes_recv);
        self.network_sent_bytes = Some(n.bytes_sent);
        self.network_received_error = Some(n.errin);
        self.network_sent_error = Some(n.errout);
        self.network_received_drop = Some(n.dropin);
        self.network_sent_drop = Some(n.dropout);
    }
}
