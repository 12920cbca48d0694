// MetricsStore and RunParser: round trip, corrupt rows, step filter, cache

mod common;

use bench_metrics::error::MetricsError;
use bench_metrics::models::{SAMPLE_COLUMNS, Sample};
use bench_metrics::parser::RunParser;
use bench_metrics::store::read_samples;
use common::{sample, write_run};
use tempfile::TempDir;

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() <= 1e-4, "{} != {}", a, b);
}

fn assert_same(a: &Sample, b: &Sample) {
    assert_eq!(a.index, b.index);
    assert_eq!(a.step, b.step);
    assert_eq!(a.version, b.version);
    assert_close(a.timestamp, b.timestamp);
    assert_close(a.cpu_user, b.cpu_user);
    assert_close(a.cpu_system, b.cpu_system);
    assert_close(a.cpu_user_system, b.cpu_user_system);
    assert_close(a.cpu_idle, b.cpu_idle);
    assert_close(a.cpu_iowait, b.cpu_iowait);
    assert_eq!(a.memory_ram, b.memory_ram);
    assert_eq!(a.memory_swap, b.memory_swap);
    assert_eq!(a.memory_ram_swap, b.memory_ram_swap);
    assert_eq!(a.disk_read_count, b.disk_read_count);
    assert_eq!(a.disk_write_count, b.disk_write_count);
    assert_eq!(a.disk_read_bytes, b.disk_read_bytes);
    assert_eq!(a.disk_write_bytes, b.disk_write_bytes);
    assert_eq!(a.disk_read_time, b.disk_read_time);
    assert_eq!(a.disk_write_time, b.disk_write_time);
    assert_eq!(a.disk_busy_time, b.disk_busy_time);
    assert_eq!(a.network_received_count, b.network_received_count);
    assert_eq!(a.network_sent_count, b.network_sent_count);
    assert_eq!(a.network_received_bytes, b.network_received_bytes);
    assert_eq!(a.network_sent_bytes, b.network_sent_bytes);
    assert_eq!(a.network_received_error, b.network_received_error);
    assert_eq!(a.network_sent_error, b.network_sent_error);
    assert_eq!(a.network_received_drop, b.network_received_drop);
    assert_eq!(a.network_sent_drop, b.network_sent_drop);
}

#[test]
fn written_samples_parse_back() {
    let dir = TempDir::new().unwrap();
    let mut samples = Vec::new();
    for i in 1..=25u64 {
        let mut s = sample(i, 1 + (i as u32 - 1) / 10, i as f64 * 0.1234);
        s.cpu_user = i as f64 / 3.0;
        s.cpu_idle = 1.0 / 7.0;
        s.disk_read_bytes = Some(i * 4096);
        s.network_sent_bytes = Some(i * 3);
        s.cpu_system = i as f64 * 0.01;
        s.cpu_user_system = s.cpu_user + s.cpu_system;
        s.cpu_iowait = 0.0005 * i as f64;
        s.memory_swap = i * 7;
        s.memory_ram_swap = s.memory_ram + s.memory_swap;
        s.disk_read_count = Some(i);
        s.disk_write_count = Some(i * 2);
        s.disk_write_bytes = Some(i * 8192);
        s.disk_read_time = Some(i * 11);
        s.disk_write_time = Some(i * 13);
        s.network_received_count = Some(i * 17);
        s.network_sent_count = Some(i * 19);
        s.network_received_bytes = Some(i * 1500);
        s.network_received_error = Some(i % 2);
        s.network_sent_error = Some(i % 3);
        s.network_received_drop = Some(i % 4);
        s.network_sent_drop = (i % 7 != 0).then_some(i % 5);
        if i % 5 == 0 {
            s.disk_busy_time = None;
        }
        samples.push(s);
    }
    let path = write_run(dir.path(), 1, &samples);

    let parsed = read_samples(&path).unwrap();
    assert_eq!(parsed.len(), samples.len());
    for (a, b) in parsed.iter().zip(&samples) {
        assert_same(a, b);
    }
}

fn write_raw(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("metrics.csv");
    let mut content = SAMPLE_COLUMNS.join(",");
    content.push('\n');
    content.push_str(body);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn corrupt_rows_are_skipped() {
    let dir = TempDir::new().unwrap();
    let good = "1,1,0.0,2,0,0,0,0,0,10,0,10,,,,,,,,0,0,0,0,0,0,0,0\n";
    let bad = "2,1,abc,2,0,0,0,0,0,10,0,10,,,,,,,,0,0,0,0,0,0,0,0\n";
    let bad_int = "3,1,1.0,2,0,0,0,0,0,ten,0,10,,,,,,,,0,0,0,0,0,0,0,0\n";
    let good2 = "4,1,2.0,2,0,0,0,0,0,10,0,10,,,,,,,,0,0,0,0,0,0,0,0\n";
    let path = write_raw(&dir, &format!("{}{}{}{}", good, bad, bad_int, good2));

    let parsed = read_samples(&path).unwrap();
    let indexes: Vec<u64> = parsed.iter().map(|s| s.index).collect();
    assert_eq!(indexes, vec![1, 4]);
    assert_eq!(parsed[0].disk_read_bytes, None);
}

#[test]
fn rows_from_a_newer_schema_are_skipped() {
    let dir = TempDir::new().unwrap();
    let v2 = "1,1,0.0,2,0,0,0,0,0,10,0,10,,,,,,,,0,0,0,0,0,0,0,0\n";
    let v9 = "2,1,1.0,9,0,0,0,0,0,10,0,10,,,,,,,,0,0,0,0,0,0,0,0\n";
    let path = write_raw(&dir, &format!("{}{}", v2, v9));
    let parsed = read_samples(&path).unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].version, 2);
}

#[test]
fn parser_filters_by_step() {
    let dir = TempDir::new().unwrap();
    let samples = vec![
        sample(1, 1, 0.0),
        sample(2, 1, 1.0),
        sample(3, 2, 2.0),
        sample(4, 3, 3.0),
    ];
    let path = write_run(dir.path(), 1, &samples);
    let parser = RunParser::with_memory_probe(85.0, || 10.0);

    assert_eq!(parser.parse(1, &path, None).unwrap().len(), 4);
    let step2 = parser.parse(1, &path, Some(2)).unwrap();
    assert_eq!(step2.len(), 1);
    assert_eq!(step2[0].index, 3);
    assert!(parser.parse(1, &path, Some(7)).unwrap().is_empty());
}

#[test]
fn parser_caches_runs_until_memory_pressure() {
    let dir = TempDir::new().unwrap();
    let run1 = write_run(dir.path(), 1, &[sample(1, 1, 0.0)]);
    let run2 = write_run(dir.path(), 2, &[sample(1, 1, 0.0)]);

    let relaxed = RunParser::with_memory_probe(85.0, || 40.0);
    relaxed.parse(1, &run1, None).unwrap();
    relaxed.parse(2, &run2, None).unwrap();
    relaxed.parse(1, &run1, Some(1)).unwrap();
    assert_eq!(relaxed.cached_runs(), 2);

    let pressured = RunParser::with_memory_probe(85.0, || 92.5);
    pressured.parse(1, &run1, None).unwrap();
    pressured.parse(2, &run2, None).unwrap();
    assert_eq!(pressured.cached_runs(), 1);
}

#[test]
fn parser_serves_cached_samples_after_file_is_gone() {
    let dir = TempDir::new().unwrap();
    let path = write_run(dir.path(), 1, &[sample(1, 1, 0.0), sample(2, 1, 1.0)]);
    let parser = RunParser::with_memory_probe(85.0, || 0.0);
    parser.parse(1, &path, None).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(parser.parse(1, &path, None).unwrap().len(), 2);

    parser.clear();
    let err = parser.parse(1, &path, None).unwrap_err();
    assert!(matches!(err, MetricsError::MissingArtifact { run_id: 1, .. }));
}

#[test]
fn missing_metrics_file_names_run_and_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run_7").join("metrics.csv");
    let parser = RunParser::default();
    match parser.parse(7, &path, None) {
        Err(MetricsError::MissingArtifact { run_id, path: p }) => {
            assert_eq!(run_id, 7);
            assert_eq!(p, path);
        }
        other => panic!("expected MissingArtifact, got {:?}", other),
    }
}
