// Point-in-time cumulative counters and their deltas against a baseline.

use crate::error::CounterError;

/// CPU time breakdown in seconds, summed over all cores.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
}

/// Gauges in bytes; never diffed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub ram_used: u64,
    pub swap_used: u64,
}

/// Disk IO summed over physical devices. Times in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskIo {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_time: u64,
    pub write_time: u64,
    pub busy_time: u64,
}

/// Network IO summed over all interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkIo {
    pub packets_recv: u64,
    pub packets_sent: u64,
    pub bytes_recv: u64,
    pub bytes_sent: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
}

/// One read of every counter domain. `None` means the domain does not exist on this host
/// (e.g. a diskless machine), not zero usage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CounterSnapshot {
    pub cpu: CpuTimes,
    pub memory: MemoryUsage,
    pub disk: Option<DiskIo>,
    pub network: Option<NetworkIo>,
}

fn sub_u64(counter: &'static str, now: u64, base: u64) -> Result<u64, CounterError> {
    now.checked_sub(base).ok_or(CounterError::Reset { counter })
}

fn sub_f64(counter: &'static str, now: f64, base: f64) -> Result<f64, CounterError> {
    let d = now - base;
    if d < 0.0 {
        return Err(CounterError::Reset { counter });
    }
    Ok(d)
}

/// A set of cumulative counters that can be diffed against a baseline.
pub trait Cumulative: Copy + Default {
    fn delta_since(&self, base: &Self) -> Result<Self, CounterError>;
    fn plus(&self, other: &Self) -> Self;
}

impl Cumulative for CpuTimes {
    fn delta_since(&self, base: &CpuTimes) -> Result<CpuTimes, CounterError> {
        Ok(CpuTimes {
            user: sub_f64("cpu_user", self.user, base.user)?,
            system: sub_f64("cpu_system", self.system, base.system)?,
            idle: sub_f64("cpu_idle", self.idle, base.idle)?,
            iowait: sub_f64("cpu_iowait", self.iowait, base.iowait)?,
        })
    }

    fn plus(&self, other: &CpuTimes) -> CpuTimes {
        CpuTimes {
            user: self.user + other.user,
            system: self.system + other.system,
            idle: self.idle + other.idle,
            iowait: self.iowait + other.iowait,
        }
    }
}

impl Cumulative for DiskIo {
    fn delta_since(&self, base: &DiskIo) -> Result<DiskIo, CounterError> {
        Ok(DiskIo {
            read_count: sub_u64("disk_read_count", self.read_count, base.read_count)?,
            write_count: sub_u64("disk_write_count", self.write_count, base.write_count)?,
            read_bytes: sub_u64("disk_read_bytes", self.read_bytes, base.read_bytes)?,
            write_bytes: sub_u64("disk_write_bytes", self.write_bytes, base.write_bytes)?,
            read_time: sub_u64("disk_read_time", self.read_time, base.read_time)?,
            write_time: sub_u64("disk_write_time", self.write_time, base.write_time)?,
            busy_time: sub_u64("disk_busy_time", self.busy_time, base.busy_time)?,
        })
    }

    fn plus(&self, other: &DiskIo) -> DiskIo {
        DiskIo {
            read_count: self.read_count.saturating_add(other.read_count),
            write_count: self.write_count.saturating_add(other.write_count),
            read_bytes: self.read_bytes.saturating_add(other.read_bytes),
            write_bytes: self.write_bytes.saturating_add(other.write_bytes),
            read_time: self.read_time.saturating_add(other.read_time),
            write_time: self.write_time.saturating_add(other.write_time),
            busy_time: self.busy_time.saturating_add(other.busy_time),
        }
    }
}

impl Cumulative for NetworkIo {
    fn delta_since(&self, base: &NetworkIo) -> Result<NetworkIo, CounterError> {
        Ok(NetworkIo {
            packets_recv: sub_u64("network_received_count", self.packets_recv, base.packets_recv)?,
            packets_sent: sub_u64("network_sent_count", self.packets_sent, base.packets_sent)?,
            bytes_recv: sub_u64("network_received_bytes", self.bytes_recv, base.bytes_recv)?,
            bytes_sent: sub_u64("network_sent_bytes", self.bytes_sent, base.bytes_sent)?,
            errin: sub_u64("network_received_error", self.errin, base.errin)?,
            errout: sub_u64("network_sent_error", self.errout, base.errout)?,
            dropin: sub_u64("network_received_drop", self.dropin, base.dropin)?,
            dropout: sub_u64("network_sent_drop", self.dropout, base.dropout)?,
        })
    }

    fn plus(&self, other: &NetworkIo) -> NetworkIo {
        NetworkIo {
            packets_recv: self.packets_recv.saturating_add(other.packets_recv),
            packets_sent: self.packets_sent.saturating_add(other.packets_sent),
            bytes_recv: self.bytes_recv.saturating_add(other.bytes_recv),
            bytes_sent: self.bytes_sent.saturating_add(other.bytes_sent),
            errin: self.errin.saturating_add(other.errin),
            errout: self.errout.saturating_add(other.errout),
            dropin: self.dropin.saturating_add(other.dropin),
            dropout: self.dropout.saturating_add(other.dropout),
        }
    }
}

/// Baseline of one counter domain.
///
/// When a reading falls below the baseline the domain is re-based on that reading and
/// later deltas continue from the last good delta, so written values never go down.
/// The reading that triggered the re-base is reported as an error.
#[derive(Debug, Clone, Copy)]
pub struct DomainBaseline<T> {
    base: T,
    carried: T,
    last: T,
}

impl<T: Cumulative> DomainBaseline<T> {
    pub fn new(base: T) -> Self {
        Self {
            base,
            carried: T::default(),
            last: T::default(),
        }
    }

    pub fn delta(&mut self, now: &T) -> Result<T, CounterError> {
        match now.delta_since(&self.base) {
            Ok(d) => {
                self.last = self.carried.plus(&d);
                Ok(self.last)
            }
            Err(e) => {
                self.carried = self.last;
                self.base = *now;
                Err(e)
            }
        }
    }
}

/// Deltas of one reading, plus the domains that reset and were left out of it.
#[derive(Debug)]
pub struct SnapshotDelta {
    pub delta: CounterSnapshot,
    pub resets: Vec<CounterError>,
}

fn optional_delta<T: Cumulative>(
    base: &mut Option<DomainBaseline<T>>,
    now: &Option<T>,
    resets: &mut Vec<CounterError>,
) -> Option<T> {
    let (Some(base), Some(now)) = (base.as_mut(), now.as_ref()) else {
        return None;
    };
    match base.delta(now) {
        Ok(d) => Some(d),
        Err(e) => {
            resets.push(e);
            None
        }
    }
}

/// Baselines of every domain captured at collector start.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotBaseline {
    cpu: DomainBaseline<CpuTimes>,
    disk: Option<DomainBaseline<DiskIo>>,
    network: Option<DomainBaseline<NetworkIo>>,
}

impl SnapshotBaseline {
    pub fn new(base: &CounterSnapshot) -> Self {
        Self {
            cpu: DomainBaseline::new(base.cpu),
            disk: base.disk.map(DomainBaseline::new),
            network: base.network.map(DomainBaseline::new),
        }
    }

    /// Deltas of `now`; memory stays absolute.
    ///
    /// A disk or network reset omits that domain from this reading only. CPU columns
    /// cannot be empty, so a CPU reset fails the whole reading. Either way the domain
    /// is re-based. A domain missing from either side is omitted.
    pub fn delta(&mut self, now: &CounterSnapshot) -> Result<SnapshotDelta, CounterError> {
        let cpu = self.cpu.delta(&now.cpu)?;
        let mut resets = Vec::new();
        let disk = optional_delta(&mut self.disk, &now.disk, &mut resets);
        let network = optional_delta(&mut self.network, &now.network, &mut resets);
        Ok(SnapshotDelta {
            delta: CounterSnapshot {
                cpu,
                memory: now.memory,
                disk,
                network,
            },
            resets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_delta_flags_wraparound() {
        let base = DiskIo {
            read_bytes: 5_000,
            ..Default::default()
        };
        let now = DiskIo {
            read_bytes: 10,
            ..Default::default()
        };
        let err = now.delta_since(&base).unwrap_err();
        assert!(matches!(
            err,
            CounterError::Reset {
                counter: "disk_read_bytes"
            }
        ));
    }

    #[test]
    fn snapshot_delta_omits_domain_missing_on_one_side() {
        let base = CounterSnapshot {
            disk: None,
            network: Some(NetworkIo::default()),
            ..Default::default()
        };
        let now = CounterSnapshot {
            disk: Some(DiskIo::default()),
            network: Some(NetworkIo {
                bytes_recv: 42,
                ..Default::default()
            }),
            memory: MemoryUsage {
                ram_used: 7,
                swap_used: 1,
            },
            ..Default::default()
        };
        let d = SnapshotBaseline::new(&base).delta(&now).unwrap().delta;
        assert!(d.disk.is_none());
        assert_eq!(d.network.unwrap().bytes_recv, 42);
        assert_eq!(d.memory.ram_used, 7);
    }

    #[test]
    fn network_reset_rebases_and_keeps_cpu() {
        let reading = |bytes: u64, user: f64| CounterSnapshot {
            cpu: CpuTimes {
                user,
                ..Default::default()
            },
            network: Some(NetworkIo {
                bytes_recv: bytes,
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut baseline = SnapshotBaseline::new(&reading(50_100, 1.0));

        let d = baseline.delta(&reading(50_300, 2.0)).unwrap();
        assert_eq!(d.delta.network.unwrap().bytes_recv, 200);

        // an interface vanished: the sum drops below the baseline
        let d = baseline.delta(&reading(400, 3.0)).unwrap();
        assert!(d.delta.network.is_none());
        assert_eq!(d.delta.cpu.user, 2.0);
        assert!(matches!(
            d.resets.as_slice(),
            [CounterError::Reset {
                counter: "network_received_bytes"
            }]
        ));

        // continues from the last good delta
        let d = baseline.delta(&reading(500, 4.0)).unwrap();
        assert_eq!(d.delta.network.unwrap().bytes_recv, 300);
        assert!(d.resets.is_empty());
    }

    #[test]
    fn cpu_reset_fails_only_that_reading() {
        let reading = |user: f64| CounterSnapshot {
            cpu: CpuTimes {
                user,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut baseline = SnapshotBaseline::new(&reading(10.0));
        assert_eq!(baseline.delta(&reading(12.0)).unwrap().delta.cpu.user, 2.0);
        assert!(baseline.delta(&reading(1.0)).is_err());
        assert_eq!(baseline.delta(&reading(1.5)).unwrap().delta.cpu.user, 2.5);
    }
}
