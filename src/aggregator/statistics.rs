// Descriptive statistics over per-run values of one step.

use crate::error::{MetricsError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Description {
    pub median: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Median that is always one of the inputs: the middle value, or the lower of the two
/// middle values for an even count.
pub fn lower_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let v = sorted(values);
    Some(v[(v.len() - 1) / 2])
}

/// Conventional median (mean of the two middle values for an even count).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let v = sorted(values);
    let mid = v.len() / 2;
    Some(if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1). Needs at least two values.
pub fn stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Full description of `values`; fewer than two values is a statistics error.
pub fn describe(values: &[f64]) -> Result<Description> {
    let (Some(median), Some(mean), Some(stddev)) = (median(values), mean(values), stddev(values))
    else {
        return Err(MetricsError::Statistics(format!(
            "standard deviation needs at least 2 runs, got {}",
            values.len()
        )));
    };
    Ok(Description {
        median,
        mean,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        stddev,
    })
}

/// Picks the run whose duration equals the (lower) median. `contributors` is
/// (run id, duration); ties go to the lowest run id.
pub fn select_median_run(contributors: &[(u32, f64)]) -> Option<(u32, f64)> {
    let durations: Vec<f64> = contributors.iter().map(|(_, d)| *d).collect();
    let m = lower_median(&durations)?;
    contributors
        .iter()
        .filter(|(_, d)| *d == m)
        .min_by_key(|(id, _)| *id)
        .copied()
}
