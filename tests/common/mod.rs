// Shared test helpers: synthetic samples, run directories, scripted counter sources.
#![allow(dead_code)]

use bench_metrics::aggregator::run_dir_name;
use bench_metrics::counter_source::CounterSource;
use bench_metrics::error::CounterError;
use bench_metrics::models::*;
use bench_metrics::store::{METRICS_FILE_NAME, MetricsWriter};
use std::path::{Path, PathBuf};

pub fn sample(index: u64, step: u32, timestamp: f64) -> Sample {
    Sample {
        index,
        step,
        timestamp,
        version: METRICS_VERSION,
        cpu_user: 0.0,
        cpu_system: 0.0,
        cpu_user_system: 0.0,
        cpu_idle: 0.0,
        cpu_iowait: 0.0,
        memory_ram: 1024,
        memory_swap: 0,
        memory_ram_swap: 1024,
        disk_read_count: Some(0),
        disk_write_count: Some(0),
        disk_read_bytes: Some(0),
        disk_write_bytes: Some(0),
        disk_read_time: Some(0),
        disk_write_time: Some(0),
        disk_busy_time: Some(0),
        network_received_count: Some(0),
        network_sent_count: Some(0),
        network_received_bytes: Some(0),
        network_sent_bytes: Some(0),
        network_received_error: Some(0),
        network_sent_error: Some(0),
        network_received_drop: Some(0),
        network_sent_drop: Some(0),
    }
}

/// Writes `samples` as run `id` under `results`; returns the metrics file path.
pub fn write_run(results: &Path, id: u32, samples: &[Sample]) -> PathBuf {
    let path = results.join(run_dir_name(id)).join(METRICS_FILE_NAME);
    let mut w = MetricsWriter::create(&path).unwrap();
    w.write_header().unwrap();
    for s in samples {
        w.append(s).unwrap();
    }
    w.into_inner().unwrap();
    path
}

/// Three samples per step (start, middle, end) so each step lasts exactly its duration.
/// `cpu_user` carries the run id to tell contributors apart.
pub fn samples_with_durations(run_id: u32, durations: &[f64]) -> Vec<Sample> {
    let mut out = Vec::new();
    let mut t = 0.0;
    let mut index = 1;
    for (i, d) in durations.iter().enumerate() {
        let step = i as u32 + 1;
        for ts in [t, t + d / 2.0, t + d] {
            let mut s = sample(index, step, ts);
            s.cpu_user = run_id as f64;
            out.push(s);
            index += 1;
        }
        t += d + 1.0;
    }
    out
}

pub fn write_run_with_durations(results: &Path, id: u32, durations: &[f64]) -> PathBuf {
    write_run(results, id, &samples_with_durations(id, durations))
}

/// Counters growing linearly with the call number; call 0 is the baseline.
pub struct RampSource {
    calls: u64,
    fail_on: Option<u64>,
    with_disk: bool,
}

impl RampSource {
    pub const DISK_BYTES_PER_CALL: u64 = 1000;
    pub const CPU_USER_PER_CALL: f64 = 0.5;

    pub fn new() -> Self {
        Self {
            calls: 0,
            fail_on: None,
            with_disk: true,
        }
    }

    pub fn failing_on(call: u64) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::new()
        }
    }

    pub fn diskless() -> Self {
        Self {
            with_disk: false,
            ..Self::new()
        }
    }
}

impl CounterSource for RampSource {
    fn snapshot(&mut self) -> Result<CounterSnapshot, CounterError> {
        let n = self.calls;
        self.calls += 1;
        if self.fail_on == Some(n) {
            return Err(CounterError::Unavailable("scripted failure"));
        }
        Ok(CounterSnapshot {
            cpu: CpuTimes {
                user: 100.0 + n as f64 * Self::CPU_USER_PER_CALL,
                system: 50.0 + n as f64 * 0.25,
                idle: 1000.0 + n as f64,
                iowait: 1.0,
            },
            memory: MemoryUsage {
                ram_used: 4096 + n,
                swap_used: 16,
            },
            disk: self.with_disk.then(|| DiskIo {
                read_count: 10 + n,
                read_bytes: 1_000_000 + n * Self::DISK_BYTES_PER_CALL,
                ..Default::default()
            }),
            network: Some(NetworkIo {
                bytes_recv: 500 + n * 7,
                ..Default::default()
            }),
        })
    }
}

/// Two NICs: `eth0` grows by 100 bytes per call, `veth0` holds 50 000 bytes and is
/// gone from call `vanish_on` onwards, so the host-wide sum drops once.
pub struct VanishingNicSource {
    calls: u64,
    vanish_on: u64,
}

impl VanishingNicSource {
    pub const ETH0_BYTES_PER_CALL: u64 = 100;

    pub fn new(vanish_on: u64) -> Self {
        Self {
            calls: 0,
            vanish_on,
        }
    }
}

impl CounterSource for VanishingNicSource {
    fn snapshot(&mut self) -> Result<CounterSnapshot, CounterError> {
        let n = self.calls;
        self.calls += 1;
        let mut bytes_recv = 1000 + n * Self::ETH0_BYTES_PER_CALL;
        if n < self.vanish_on {
            bytes_recv += 50_000;
        }
        Ok(CounterSnapshot {
            cpu: CpuTimes {
                user: 10.0 + n as f64,
                ..Default::default()
            },
            memory: MemoryUsage {
                ram_used: 2048,
                swap_used: 0,
            },
            disk: None,
            network: Some(NetworkIo {
                bytes_recv,
                ..Default::default()
            }),
        })
    }
}
