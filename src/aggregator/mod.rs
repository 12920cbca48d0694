// Cross-run aggregation: pick, per step, the run with the median duration and stitch
// those steps into one representative run plus a per-step summary.
// Offline and single-threaded; every input store must already be closed.

pub mod statistics;
pub mod summary;

use crate::error::{MetricsError, Result};
use crate::models::{
    SAMPLE_COLUMNS, STATISTICS_COLUMNS, SUMMARY_COLUMNS, Sample, StepStatistics, SummaryEntry,
};
use crate::parser::RunParser;
use crate::store::{self, AGGREGATED_FILE_NAME, STATISTICS_FILE_NAME, SUMMARY_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

const RUN_DIR_PREFIX: &str = "run_";

#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Directory holding the `run_<N>` directories; outputs are written here.
    pub results_path: PathBuf,
    pub number_of_steps: u32,
    pub metrics_file_name: String,
    pub extended_statistics: bool,
}

/// A `run_<N>` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    pub id: u32,
    pub path: PathBuf,
}

/// A run that passed validation, with one duration per declared step.
#[derive(Debug, Clone)]
struct ValidRun {
    id: u32,
    metrics_path: PathBuf,
    durations: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct AggregationReport {
    pub aggregated: Vec<Sample>,
    pub summary: Vec<SummaryEntry>,
    /// (step, run id) of the run contributing each step.
    pub median_runs: Vec<(u32, u32)>,
    pub skipped_runs: Vec<u32>,
    pub statistics: Option<Vec<StepStatistics>>,
}

/// All `run_*` directories under `results_path`, ascending by run id.
/// A directory whose suffix is not an integer is a fatal input error.
pub fn discover_runs(results_path: &Path) -> Result<Vec<RunDir>> {
    let mut runs = Vec::new();
    for entry in std::fs::read_dir(results_path)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(suffix) = name.to_str().and_then(|n| n.strip_prefix(RUN_DIR_PREFIX)) else {
            continue;
        };
        let id = suffix
            .parse::<u32>()
            .map_err(|_| MetricsError::InvalidRunId { path: entry.path() })?;
        runs.push(RunDir {
            id,
            path: entry.path(),
        });
    }
    runs.sort_by_key(|r| r.id);
    Ok(runs)
}

/// Directory name of run `id`.
pub fn run_dir_name(id: u32) -> String {
    format!("{}{}", RUN_DIR_PREFIX, id)
}

pub struct Aggregator {
    options: AggregatorOptions,
    parser: RunParser,
}

impl Aggregator {
    pub fn new(options: AggregatorOptions) -> Result<Self> {
        Self::with_parser(options, RunParser::default())
    }

    pub fn with_parser(options: AggregatorOptions, parser: RunParser) -> Result<Self> {
        if options.number_of_steps == 0 {
            return Err(MetricsError::Config("number_of_steps must be > 0".into()));
        }
        if !options.results_path.is_dir() {
            return Err(MetricsError::Config(format!(
                "results path does not exist: {}",
                options.results_path.display()
            )));
        }
        Ok(Self { options, parser })
    }

    /// Computes the aggregation and writes `aggregated.csv`, `summary.csv` and, in extended
    /// mode, `statistics.csv`. Nothing is written when any step fails.
    #[instrument(skip(self), fields(operation = "aggregate", results = %self.options.results_path.display()))]
    pub fn aggregate(&self) -> Result<AggregationReport> {
        let report = self.compute()?;
        let root = &self.options.results_path;

        store::write_table(
            &root.join(AGGREGATED_FILE_NAME),
            &SAMPLE_COLUMNS,
            &report.aggregated,
        )?;
        store::write_table(&root.join(SUMMARY_FILE_NAME), &SUMMARY_COLUMNS, &report.summary)?;
        if let Some(stats) = &report.statistics {
            store::write_table(&root.join(STATISTICS_FILE_NAME), &STATISTICS_COLUMNS, stats)?;
        }

        info!(
            samples = report.aggregated.len(),
            steps = report.summary.len(),
            skipped_runs = report.skipped_runs.len(),
            "aggregation complete"
        );
        Ok(report)
    }

    /// Aggregation without touching the filesystem beyond reading runs.
    pub fn compute(&self) -> Result<AggregationReport> {
        let runs = discover_runs(&self.options.results_path)?;
        if runs.len() % 2 == 0 {
            return Err(MetricsError::Config(format!(
                "number of runs must be odd so the median is a measured run, found {}",
                runs.len()
            )));
        }

        let mut valid = Vec::with_capacity(runs.len());
        let mut skipped_runs = Vec::new();
        for run in &runs {
            match self.validate_run(run)? {
                Some(v) => valid.push(v),
                None => skipped_runs.push(run.id),
            }
        }
        if valid.len() % 2 == 0 && !valid.is_empty() {
            warn!(
                valid_runs = valid.len(),
                "even number of valid runs, the lower median is used"
            );
        }

        let mut aggregated = Vec::new();
        let mut summary = Vec::with_capacity(self.options.number_of_steps as usize);
        let mut median_runs = Vec::with_capacity(self.options.number_of_steps as usize);
        let mut next_index: u64 = 1;

        for step in 1..=self.options.number_of_steps {
            let contributors: Vec<(u32, f64)> = valid
                .iter()
                .map(|r| (r.id, r.durations[step as usize - 1]))
                .collect();
            let Some((run_id, duration)) = statistics::select_median_run(&contributors) else {
                return Err(MetricsError::Statistics(format!(
                    "step {} has no contributing runs",
                    step
                )));
            };
            info!(step, run_id, duration, "median run selected");

            let run = valid
                .iter()
                .find(|r| r.id == run_id)
                .ok_or_else(|| MetricsError::Statistics(format!("run {} vanished", run_id)))?;
            let mut step_samples = self.parser.parse(run.id, &run.metrics_path, Some(step))?;
            for s in &mut step_samples {
                s.index = next_index;
                next_index += 1;
            }
            if let Some(entry) = summary::summarize_step(&step_samples) {
                summary.push(entry);
            }
            aggregated.extend(step_samples);
            median_runs.push((step, run_id));
        }

        let statistics = if self.options.extended_statistics {
            Some(self.extended_statistics(&valid)?)
        } else {
            None
        };

        Ok(AggregationReport {
            aggregated,
            summary,
            median_runs,
            skipped_runs,
            statistics,
        })
    }

    fn metrics_path(&self, run: &RunDir) -> PathBuf {
        run.path.join(&self.options.metrics_file_name)
    }

    /// Step durations of `run`, or None (logged) when it cannot contribute.
    fn validate_run(&self, run: &RunDir) -> Result<Option<ValidRun>> {
        let metrics_path = self.metrics_path(run);
        let samples = self.parser.parse(run.id, &metrics_path, None)?;

        let durations = match summary::step_durations(&samples) {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    run_id = run.id,
                    index = e.index,
                    from = e.from,
                    to = e.to,
                    "step decreased over time, skipping run"
                );
                return Ok(None);
            }
        };

        let declared = self.options.number_of_steps;
        let complete = durations.len() == declared as usize
            && durations.keys().copied().eq(1..=declared);
        if !complete {
            warn!(
                run_id = run.id,
                declared,
                observed = durations.len(),
                "step count does not match the case, skipping run"
            );
            return Ok(None);
        }

        Ok(Some(ValidRun {
            id: run.id,
            metrics_path,
            durations: durations.into_values().collect(),
        }))
    }

    /// Median/mean/min/max/stddev of every summary metric across all valid runs.
    fn extended_statistics(&self, valid: &[ValidRun]) -> Result<Vec<StepStatistics>> {
        if valid.len() < 2 {
            return Err(MetricsError::Statistics(format!(
                "extended statistics need at least 2 valid runs, got {}",
                valid.len()
            )));
        }

        let mut out = Vec::new();
        for step in 1..=self.options.number_of_steps {
            // metric name -> one value per run, in first-seen column order
            let mut by_metric: Vec<(&'static str, Vec<f64>)> = Vec::new();
            for run in valid {
                let samples = self.parser.parse(run.id, &run.metrics_path, Some(step))?;
                let Some(entry) = summary::summarize_step(&samples) else {
                    continue;
                };
                for (name, value) in entry.metrics() {
                    match by_metric.iter_mut().find(|(n, _)| *n == name) {
                        Some((_, values)) => values.push(value),
                        None => by_metric.push((name, vec![value])),
                    }
                }
            }
            for (metric, values) in by_metric {
                if values.len() < 2 {
                    warn!(step, metric, runs = values.len(), "metric present in < 2 runs, skipped");
                    continue;
                }
                let d = statistics::describe(&values)?;
                out.push(StepStatistics {
                    step,
                    metric: metric.to_string(),
                    runs: values.len(),
                    median: d.median,
                    mean: d.mean,
                    min: d.min,
                    max: d.max,
                    stddev: d.stddev,
                });
            }
        }
        Ok(out)
    }
}
