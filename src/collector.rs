// Background sampler: one thread per run, writing counter deltas against a baseline.
// Cancellation is cooperative: the stop flag is checked at the top of every iteration.

use crate::config::CollectorConfig;
use crate::counter_source::{self, CounterSource};
use crate::error::{MetricsError, Result};
use crate::models::{CaseInfo, Sample, SnapshotBaseline};
use crate::run_state::RunState;
use crate::store::{CASE_INFO_FILE_NAME, MetricsWriter};
use crate::version;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Handle to a running sampler. Dropping it stops the sampler.
pub struct Collector {
    state: Arc<RunState>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<u64>>>,
    metrics_path: PathBuf,
    samples_written: u64,
}

/// Everything the sampling thread owns.
struct SampleLoop<S> {
    source: S,
    writer: MetricsWriter,
    baseline: SnapshotBaseline,
    started: Instant,
    interval: Duration,
    state: Arc<RunState>,
    stop: Arc<AtomicBool>,
}

impl Collector {
    /// Captures the baseline, writes the initial zero sample and starts sampling at step 1.
    /// A failing baseline read is fatal; later read failures only skip a sample.
    #[instrument(skip(source), fields(operation = "collector_start", path = %metrics_path.display()))]
    pub fn start<S>(
        metrics_path: &Path,
        sample_interval: Duration,
        number_of_steps: u32,
        mut source: S,
    ) -> Result<Self>
    where
        S: CounterSource + 'static,
    {
        if sample_interval.is_zero() {
            return Err(MetricsError::Config("sample interval must be > 0".into()));
        }
        let state = Arc::new(RunState::new(number_of_steps)?);

        let started = Instant::now();
        let baseline = source.snapshot()?;

        let mut writer = MetricsWriter::create(metrics_path)?;
        writer.write_header()?;
        writer.append(&Sample::initial(state.current_step(), &baseline))?;

        let stop = Arc::new(AtomicBool::new(false));
        let sample_loop = SampleLoop {
            source,
            writer,
            baseline: SnapshotBaseline::new(&baseline),
            started,
            interval: sample_interval,
            state: state.clone(),
            stop: stop.clone(),
        };
        let span = tracing::Span::current();
        let handle = thread::Builder::new()
            .name("metrics-collector".into())
            .spawn(move || {
                let _guard = span.enter();
                sample_loop.run()
            })?;

        info!(
            interval_ms = sample_interval.as_millis() as u64,
            number_of_steps, "collector started"
        );
        Ok(Self {
            state,
            stop,
            handle: Some(handle),
            metrics_path: metrics_path.to_path_buf(),
            samples_written: 0,
        })
    }

    /// Starts sampling into `run_dir` as configured: the store is named
    /// `metrics_file_name` and `case-info.json` is written first when enabled.
    /// A case info write failure is logged and does not stop the run.
    pub fn start_run<S>(
        run_dir: &Path,
        config: &CollectorConfig,
        number_of_steps: u32,
        source: S,
    ) -> Result<Self>
    where
        S: CounterSource + 'static,
    {
        let interval = config.sample_interval();
        if config.write_case_info
            && let Err(e) = write_case_info(run_dir, interval, number_of_steps)
        {
            warn!(error = %e, operation = "write_case_info", "case info not written");
        }
        Self::start(
            &run_dir.join(&config.metrics_file_name),
            interval,
            number_of_steps,
            source,
        )
    }

    /// Shared step counter, for callers advancing steps from another thread.
    pub fn run_state(&self) -> Arc<RunState> {
        self.state.clone()
    }

    pub fn current_step(&self) -> u32 {
        self.state.current_step()
    }

    /// Samples taken from now on carry the next step number.
    pub fn next_step(&self) -> Result<u32> {
        let step = self.state.next_step()?;
        debug!(step, "step advanced");
        Ok(step)
    }

    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }

    /// Stops the sampler after its current iteration and closes the store.
    /// Returns the number of samples in the store. Idempotent.
    pub fn stop(&mut self) -> Result<u64> {
        let Some(handle) = self.handle.take() else {
            return Ok(self.samples_written);
        };
        self.stop.store(true, Ordering::Release);
        handle.thread().unpark();
        let written = handle
            .join()
            .map_err(|_| MetricsError::CollectorPanicked)??;
        self.samples_written = written;
        info!(samples = written, path = %self.metrics_path.display(), "collector stopped");
        Ok(written)
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if self.handle.is_some()
            && let Err(e) = self.stop()
        {
            warn!(error = %e, "collector stop on drop failed");
        }
    }
}

impl<S: CounterSource> SampleLoop<S> {
    fn run(mut self) -> Result<u64> {
        // the initial sample is already on disk
        let mut index: u64 = 2;
        self.sleep_until(self.started + self.interval);

        while !self.stop.load(Ordering::Acquire) {
            let tick = Instant::now();
            let delta = self
                .source
                .snapshot()
                .and_then(|now| self.baseline.delta(&now));
            match delta {
                Ok(delta) => {
                    for reset in &delta.resets {
                        warn!(error = %reset, index, "counter reset, domain re-based and left empty");
                    }
                    let timestamp = tick.duration_since(self.started).as_secs_f64();
                    let sample = Sample::from_delta(
                        index,
                        self.state.current_step(),
                        timestamp,
                        &delta.delta,
                    );
                    self.writer.append(&sample)?;
                    index += 1;
                }
                Err(e) => {
                    warn!(error = %e, index, operation = "read_counters", "sample skipped");
                }
            }
            // keep the cadence at `interval` regardless of sampling cost
            self.sleep_until(tick + self.interval);
        }

        self.writer.into_inner()?;
        Ok(index - 1)
    }

    /// Parks until `deadline` or until stop is requested.
    fn sleep_until(&self, deadline: Instant) {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::park_timeout(deadline - now);
        }
    }
}

/// Writes the run's provenance file (`case-info.json`) into `run_dir`.
#[instrument(fields(operation = "write_case_info"))]
pub fn write_case_info(
    run_dir: &Path,
    sample_interval: Duration,
    number_of_steps: u32,
) -> Result<PathBuf> {
    let info = CaseInfo {
        tool: version::NAME.into(),
        tool_version: version::VERSION.into(),
        started_at: chrono::Utc::now().to_rfc3339(),
        sample_interval_ms: sample_interval.as_millis() as u64,
        number_of_steps,
        host: counter_source::host_info(),
    };
    std::fs::create_dir_all(run_dir)?;
    let path = run_dir.join(CASE_INFO_FILE_NAME);
    std::fs::write(&path, serde_json::to_string_pretty(&info)?)?;
    Ok(path)
}
