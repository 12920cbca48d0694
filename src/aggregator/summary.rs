// Per-step views of one run: durations for median selection, summary rows for output.

use std::collections::BTreeMap;

use crate::models::{Sample, SummaryEntry, round4};
use tracing::warn;

/// A run whose `step` column goes backwards cannot be split into steps.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDecreased {
    pub index: u64,
    pub from: u32,
    pub to: u32,
}

struct StepSpan {
    first: f64,
    last: f64,
    samples: usize,
}

/// Duration of every step seen in `samples`: last minus first timestamp of the step.
///
/// A step with a single sample falls back to that sample's absolute timestamp. This is a
/// known approximation kept for compatibility with existing result sets; it ranks runs
/// by when the step happened rather than how long it took.
pub fn step_durations(samples: &[Sample]) -> Result<BTreeMap<u32, f64>, StepDecreased> {
    let mut spans: BTreeMap<u32, StepSpan> = BTreeMap::new();
    let mut prev: Option<u32> = None;

    for s in samples {
        if let Some(p) = prev {
            if s.step < p {
                return Err(StepDecreased {
                    index: s.index,
                    from: p,
                    to: s.step,
                });
            }
            if s.step > p + 1 {
                warn!(
                    missing = s.step - p - 1,
                    from = p,
                    to = s.step,
                    "steps missing between samples, sample interval too coarse"
                );
            }
        }
        prev = Some(s.step);
        spans
            .entry(s.step)
            .and_modify(|span| {
                span.last = s.timestamp;
                span.samples += 1;
            })
            .or_insert(StepSpan {
                first: s.timestamp,
                last: s.timestamp,
                samples: 1,
            });
    }

    Ok(spans
        .into_iter()
        .map(|(step, span)| {
            let duration = if span.samples == 1 {
                warn!(step, "only 1 sample for step, using its timestamp as duration");
                span.first
            } else {
                span.last - span.first
            };
            (step, duration)
        })
        .collect())
}

fn counter_diff(name: &'static str, first: Option<u64>, last: Option<u64>) -> Option<u64> {
    let (first, last) = (first?, last?);
    let diff = last.checked_sub(first);
    if diff.is_none() {
        warn!(counter = name, first, last, "counter decreased within step, diff omitted");
    }
    diff
}

fn min_max(samples: &[Sample], field: impl Fn(&Sample) -> u64) -> (u64, u64) {
    samples.iter().map(&field).fold((u64::MAX, 0), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Summary row of one step's samples. `None` for an empty slice.
pub fn summarize_step(samples: &[Sample]) -> Option<SummaryEntry> {
    let first = samples.first()?;
    let last = samples.last()?;

    let (memory_ram_min, memory_ram_max) = min_max(samples, |s| s.memory_ram);
    let (memory_swap_min, memory_swap_max) = min_max(samples, |s| s.memory_swap);
    let (memory_ram_swap_min, memory_ram_swap_max) = min_max(samples, |s| s.memory_ram_swap);

    Some(SummaryEntry {
        number_of_samples: last.index.saturating_sub(first.index) + 1,
        step: first.step,
        duration: round4(last.timestamp - first.timestamp),
        version: first.version,
        cpu_user_diff: round4(last.cpu_user - first.cpu_user),
        cpu_system_diff: round4(last.cpu_system - first.cpu_system),
        cpu_user_system_diff: round4(last.cpu_user_system - first.cpu_user_system),
        cpu_idle_diff: round4(last.cpu_idle - first.cpu_idle),
        cpu_iowait_diff: round4(last.cpu_iowait - first.cpu_iowait),
        memory_ram_max,
        memory_swap_max,
        memory_ram_swap_max,
        memory_ram_min,
        memory_swap_min,
        memory_ram_swap_min,
        disk_read_count_diff: counter_diff(
            "disk_read_count",
            first.disk_read_count,
            last.disk_read_count,
        ),
        disk_write_count_diff: counter_diff(
            "disk_write_count",
            first.disk_write_count,
            last.disk_write_count,
        ),
        disk_read_bytes_diff: counter_diff(
            "disk_read_bytes",
            first.disk_read_bytes,
            last.disk_read_bytes,
        ),
        disk_write_bytes_diff: counter_diff(
            "disk_write_bytes",
            first.disk_write_bytes,
            last.disk_write_bytes,
        ),
        disk_read_time_diff: counter_diff(
            "disk_read_time",
            first.disk_read_time,
            last.disk_read_time,
        ),
        disk_write_time_diff: counter_diff(
            "disk_write_time",
            first.disk_write_time,
            last.disk_write_time,
        ),
        disk_busy_time_diff: counter_diff(
            "disk_busy_time",
            first.disk_busy_time,
            last.disk_busy_time,
        ),
        network_received_count_diff: counter_diff(
            "network_received_count",
            first.network_received_count,
            last.network_received_count,
        ),
        network_sent_count_diff: counter_diff(
            "network_sent_count",
            first.network_sent_count,
            last.network_sent_count,
        ),
        network_received_bytes_diff: counter_diff(
            "network_received_bytes",
            first.network_received_bytes,
            last.network_received_bytes,
        ),
        network_sent_bytes_diff: counter_diff(
            "network_sent_bytes",
            first.network_sent_bytes,
            last.network_sent_bytes,
        ),
        network_received_error_diff: counter_diff(
            "network_received_error",
            first.network_received_error,
            last.network_received_error,
        ),
        network_sent_error_diff: counter_diff(
            "network_sent_error",
            first.network_sent_error,
            last.network_sent_error,
        ),
        network_received_drop_diff: counter_diff(
            "network_received_drop",
            first.network_received_drop,
            last.network_received_drop,
        ),
        network_sent_drop_diff: counter_diff(
            "network_sent_drop",
            first.network_sent_drop,
            last.network_sent_drop,
        ),
    })
}
