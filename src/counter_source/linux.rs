// Linux-specific readers: /proc/stat, /proc/diskstats, /sys/class/net, /proc/cpuinfo, /etc/os-release.

use crate::error::CounterError;
use crate::models::{CpuTimes, DiskIo};
use tracing::warn;

/// Kernel clock ticks per second for /proc/stat (USER_HZ, 100 on every mainstream arch).
const USER_HZ: f64 = 100.0;
const SECTOR_SIZE: u64 = 512;

/// Aggregate CPU line of /proc/stat, converted to seconds.
pub(super) fn parse_proc_stat(content: &str) -> Result<CpuTimes, CounterError> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| CounterError::Parse("no aggregate cpu line in /proc/stat".into()))?;
    let ticks: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|v| v.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| CounterError::Parse(format!("/proc/stat: {}", e)))?;
    if ticks.len() < 5 {
        return Err(CounterError::Parse(format!(
            "/proc/stat: expected at least 5 cpu columns, got {}",
            ticks.len()
        )));
    }
    Ok(CpuTimes {
        user: ticks[0] as f64 / USER_HZ,
        system: ticks[2] as f64 / USER_HZ,
        idle: ticks[3] as f64 / USER_HZ,
        iowait: ticks[4] as f64 / USER_HZ,
    })
}

/// Counters of every whole device in /proc/diskstats (partitions would double count).
/// Lines with a malformed field are skipped.
pub(super) fn parse_diskstats(
    content: &str,
    is_device: impl Fn(&str) -> bool,
) -> Vec<(String, DiskIo)> {
    let mut devices = Vec::new();
    for line in content.lines() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 14 || !is_device(cols[2]) {
            continue;
        }
        let fields: Result<Vec<u64>, _> = [3, 5, 6, 7, 9, 10, 12]
            .iter()
            .map(|&i| cols[i].parse::<u64>())
            .collect();
        let f = match fields {
            Ok(f) => f,
            Err(e) => {
                warn!(device = cols[2], error = %e, "malformed /proc/diskstats line skipped");
                continue;
            }
        };
        devices.push((
            cols[2].to_string(),
            DiskIo {
                read_count: f[0],
                read_bytes: f[1] * SECTOR_SIZE,
                read_time: f[2],
                write_count: f[3],
                write_bytes: f[4] * SECTOR_SIZE,
                write_time: f[5],
                busy_time: f[6],
            },
        ));
    }
    devices
}

pub(super) fn read_cpu_times() -> Result<CpuTimes, CounterError> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/stat")?;
        parse_proc_stat(&content)
    }
    #[cfg(not(target_os = "linux"))]
    Err(CounterError::Unavailable("cpu times require /proc/stat"))
}

/// Empty on diskless hosts or when /proc/diskstats is absent.
pub(super) fn read_disk_io() -> Vec<(String, DiskIo)> {
    #[cfg(target_os = "linux")]
    {
        let Ok(content) = std::fs::read_to_string("/proc/diskstats") else {
            return Vec::new();
        };
        parse_diskstats(&content, |name| {
            std::path::Path::new("/sys/block")
                .join(name.replace('/', "!"))
                .exists()
        })
    }
    #[cfg(not(target_os = "linux"))]
    Vec::new()
}

/// (rx_dropped, tx_dropped) of one interface.
pub(super) fn read_interface_drops(interface_name: &str) -> (u64, u64) {
    #[cfg(target_os = "linux")]
    {
        let read = |counter: &str| {
            std::fs::read_to_string(format!(
                "/sys/class/net/{}/statistics/{}",
                interface_name, counter
            ))
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0)
        };
        (read("rx_dropped"), read("tx_dropped"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = interface_name;
        (0, 0)
    }
}

/// Link speed in bits per second from /sys/class/net/<interface>/speed, or 0 if unavailable.
pub(super) fn get_interface_speed(interface_name: &str) -> u64 {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/class/net/{}/speed", interface_name);
        if let Ok(content) = std::fs::read_to_string(&path)
            && let Ok(mbps) = content.trim().parse::<i64>()
            && mbps > 0
        {
            return (mbps as u64) * 1_000_000;
        }
    }
    0
}

/// First "model name" from /proc/cpuinfo. Preferred over sysinfo when it reports "cpu0".
pub(super) fn read_cpu_model_linux() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        for line in content.lines() {
            if line.starts_with("model name") {
                let name = line
                    .find(": ")
                    .map(|i| line[i + 2..].trim())
                    .filter(|s| !s.is_empty() && *s != "cpu0")?;
                return Some(name.to_string());
            }
        }
    }
    None
}

/// PRETTY_NAME from /etc/os-release.
pub(super) fn read_os_pretty_name() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/etc/os-release").ok()?;
        for line in content.lines() {
            if let Some(v) = line.strip_prefix("PRETTY_NAME=") {
                let v = v.trim_matches('"');
                return (!v.is_empty()).then(|| v.to_string());
            }
        }
    }
    None
}
