use anyhow::Result;
use bench_metrics::aggregator::Aggregator;
use bench_metrics::collector::Collector;
use bench_metrics::config::AppConfig;
use bench_metrics::counter_source::SysinfoSource;
use bench_metrics::parser::RunParser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

const USAGE: &str = "usage: bench-metrics aggregate [results_path] | bench-metrics collect <run_dir>";

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = AppConfig::load()?;
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("aggregate") => aggregate(app_config, args.next().map(PathBuf::from)).await,
        Some("collect") => {
            let Some(run_dir) = args.next() else {
                anyhow::bail!(USAGE);
            };
            collect(app_config, PathBuf::from(run_dir)).await
        }
        _ => anyhow::bail!(USAGE),
    }
}

async fn aggregate(app_config: AppConfig, results_path: Option<PathBuf>) -> Result<()> {
    let options = app_config.aggregator_options(results_path);
    let parser = RunParser::new(app_config.aggregation.cache_high_water_percent);
    let result = tokio::task::spawn_blocking(move || {
        Aggregator::with_parser(options, parser).and_then(|a| a.aggregate())
    })
    .await
    .map_err(|e| anyhow::anyhow!("aggregation task join: {}", e))?;

    match result {
        Ok(report) => {
            for (step, run_id) in &report.median_runs {
                tracing::info!(step, run_id, "step taken from median run");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, operation = "aggregate", "aggregation failed");
            Err(e.into())
        }
    }
}

async fn collect(app_config: AppConfig, run_dir: PathBuf) -> Result<()> {
    let mut collector = Collector::start_run(
        &run_dir,
        &app_config.collector,
        app_config.aggregation.number_of_steps,
        SysinfoSource::new(),
    )?;
    let metrics_path = collector.metrics_path().to_path_buf();
    let state = collector.run_state();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigusr1 = signal(SignalKind::user_defined1())?;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = sigterm.recv() => break,
                _ = sigusr1.recv() => match state.next_step() {
                    Ok(step) => tracing::info!(step, "advanced to next step"),
                    Err(e) => tracing::warn!(error = %e, "step not advanced"),
                },
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = state;
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("Received shutdown signal");
    let samples = tokio::task::spawn_blocking(move || collector.stop())
        .await
        .map_err(|e| anyhow::anyhow!("collector task join: {}", e))??;
    tracing::info!(samples, path = %metrics_path.display(), "metrics written");
    Ok(())
}
