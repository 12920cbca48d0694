// Domain models: samples, counters, summaries, provenance

mod counters;
mod host;
mod sample;
mod summary;

pub use counters::{
    CounterSnapshot, CpuTimes, Cumulative, DiskIo, DomainBaseline, MemoryUsage, NetworkIo,
    SnapshotBaseline, SnapshotDelta,
};
pub use host::{CaseInfo, DiskInfo, HostInfo, InterfaceInfo};
pub use sample::{METRICS_VERSION, SAMPLE_COLUMNS, Sample, round4};
pub use summary::{STATISTICS_COLUMNS, SUMMARY_COLUMNS, StepStatistics, SummaryEntry};
