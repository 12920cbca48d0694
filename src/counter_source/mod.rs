// Cumulative OS counters via sysinfo and /proc

mod linux;

use crate::error::CounterError;
use crate::models::{
    CounterSnapshot, Cumulative, DiskInfo, DiskIo, HostInfo, InterfaceInfo, MemoryUsage,
    NetworkIo,
};
use std::collections::BTreeMap;
use sysinfo::{Disks, Networks, System};
use tracing::instrument;

/// Point-in-time reader of cumulative counters. Owned by exactly one sampling thread.
pub trait CounterSource: Send {
    fn snapshot(&mut self) -> Result<CounterSnapshot, CounterError>;
}

/// Last reading of each device or interface seen during the run. One that disappears
/// keeps its last value in the sum, so host-wide totals do not drop when a NIC or
/// disk goes away mid-run.
#[derive(Debug, Default)]
pub struct RetainedTotals<T> {
    last: BTreeMap<String, T>,
}

impl<T: Cumulative> RetainedTotals<T> {
    pub fn record(&mut self, name: &str, reading: T) {
        self.last.insert(name.to_string(), reading);
    }

    /// Sum over every entry ever recorded, None before the first one.
    pub fn total(&self) -> Option<T> {
        if self.last.is_empty() {
            return None;
        }
        Some(self.last.values().fold(T::default(), |acc, v| acc.plus(v)))
    }
}

/// Host-wide counters: CPU and disk from /proc, memory and network from sysinfo.
pub struct SysinfoSource {
    sys: System,
    networks: Networks,
    disk_totals: RetainedTotals<DiskIo>,
    network_totals: RetainedTotals<NetworkIo>,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let networks = Networks::new_with_refreshed_list();
        Self {
            sys,
            networks,
            disk_totals: RetainedTotals::default(),
            network_totals: RetainedTotals::default(),
        }
    }

    fn read_memory(&mut self) -> MemoryUsage {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        let available = self.sys.available_memory();
        MemoryUsage {
            ram_used: total.saturating_sub(available),
            swap_used: self.sys.used_swap(),
        }
    }

    fn read_disk(&mut self) -> Option<DiskIo> {
        for (device, io) in linux::read_disk_io() {
            self.disk_totals.record(&device, io);
        }
        self.disk_totals.total()
    }

    fn read_network(&mut self) -> Option<NetworkIo> {
        self.networks.refresh(true);
        for (name, data) in self.networks.list() {
            let (dropin, dropout) = linux::read_interface_drops(name);
            self.network_totals.record(
                name,
                NetworkIo {
                    packets_recv: data.total_packets_received(),
                    packets_sent: data.total_packets_transmitted(),
                    bytes_recv: data.total_received(),
                    bytes_sent: data.total_transmitted(),
                    errin: data.total_errors_on_received(),
                    errout: data.total_errors_on_transmitted(),
                    dropin,
                    dropout,
                },
            );
        }
        self.network_totals.total()
    }
}

impl CounterSource for SysinfoSource {
    fn snapshot(&mut self) -> Result<CounterSnapshot, CounterError> {
        let cpu = linux::read_cpu_times()?;
        let memory = self.read_memory();
        let disk = self.read_disk();
        let network = self.read_network();
        Ok(CounterSnapshot {
            cpu,
            memory,
            disk,
            network,
        })
    }
}

/// Share of physical RAM in use, in percent.
pub fn memory_utilization_percent(sys: &mut System) -> f64 {
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(sys.available_memory());
    (used as f64 / total as f64) * 100.0
}

/// Static host identity for the case info file.
#[instrument(fields(operation = "host_info"))]
pub fn host_info() -> HostInfo {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu_all();

    let cpu_model = linux::read_cpu_model_linux()
        .or_else(|| {
            sys.cpus()
                .first()
                .map(|c| c.brand().to_string())
                .filter(|s| !s.is_empty() && s != "cpu0")
        })
        .unwrap_or_else(|| "Unknown".into());

    let disks = Disks::new_with_refreshed_list()
        .list()
        .iter()
        .filter(|d| !d.file_system().is_empty())
        .map(|d| DiskInfo {
            mount: d.mount_point().to_string_lossy().into_owned(),
            total_space: d.total_space(),
        })
        .filter(|d| !d.mount.contains("docker"))
        .collect();

    let interfaces = Networks::new_with_refreshed_list()
        .list()
        .iter()
        .map(|(name, data)| InterfaceInfo {
            name: name.clone(),
            mac_address: data.mac_address().to_string(),
            speed: linux::get_interface_speed(name),
        })
        .collect();

    HostInfo {
        host_name: System::host_name().unwrap_or_default(),
        os_name: linux::read_os_pretty_name()
            .or_else(System::name)
            .unwrap_or_else(|| std::env::consts::OS.into()),
        os_version: System::os_version().unwrap_or_default(),
        kernel_version: System::kernel_version().unwrap_or_default(),
        architecture: std::env::consts::ARCH.into(),
        cpu_model,
        cpu_cores: sys.cpus().len() as u32,
        ram_total: sys.total_memory(),
        swap_total: sys.total_swap(),
        disks,
        interfaces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rx(bytes: u64) -> NetworkIo {
        NetworkIo {
            bytes_recv: bytes,
            ..Default::default()
        }
    }

    #[test]
    fn vanished_interface_keeps_its_last_total() {
        let mut totals = RetainedTotals::default();
        assert!(totals.total().is_none());

        totals.record("eth0", rx(100));
        totals.record("veth1", rx(50_000));
        assert_eq!(totals.total().unwrap().bytes_recv, 50_100);

        // veth1 is gone from the next listing
        totals.record("eth0", rx(200));
        assert_eq!(totals.total().unwrap().bytes_recv, 50_200);
    }
}
