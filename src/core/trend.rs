use crate::types::{FeatureSeries, TrendError, TrendFit, TrendResult};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Fit `value = slope * t + intercept` by ordinary least squares over
/// a feature series.
///
/// The time axis is fractional days since the first point, which keeps
/// the normal equations well-conditioned without epoch-scale offsets.
/// Every point carries equal weight; there is no outlier rejection —
/// this is a descriptive trend line, not a forecasting model.
///
/// Fails with `InsufficientData` for fewer than 2 points or a series
/// whose timestamps all coincide.
pub fn fit_trend(series: &FeatureSeries) -> TrendResult<TrendFit> {
    let n = series.len();
    if n < 2 {
        return Err(TrendError::InsufficientData { points: n });
    }

    let t0 = series.points[0].timestamp;
    let xs: Vec<f64> = series
        .points
        .iter()
        .map(|p| (p.timestamp - t0).num_milliseconds() as f64 / MS_PER_DAY)
        .collect();

    let nf = n as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = series.points.iter().map(|p| p.value).sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();
    let sum_xy: f64 = xs
        .iter()
        .zip(&series.points)
        .map(|(x, p)| x * p.value)
        .sum();

    let denom = nf * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        // all timestamps coincide, the line is undetermined
        return Err(TrendError::InsufficientData { points: n });
    }

    let slope = (nf * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / nf;

    let start_value = intercept; // t = 0 at the first point
    let end_value = slope * xs[n - 1] + intercept;

    let mean_y = sum_y / nf;
    let ss_tot: f64 = series.points.iter().map(|p| (p.value - mean_y).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(&series.points)
        .map(|(x, p)| (p.value - (slope * x + intercept)).powi(2))
        .sum();
    let r_squared = if ss_tot.abs() < f64::EPSILON {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    };

    log::debug!(
        "trend '{}': slope {:.6}/day over {} points, delta {:.6}",
        series.feature,
        slope,
        n,
        end_value - start_value
    );

    Ok(TrendFit {
        slope_per_day: slope,
        intercept,
        start_value,
        end_value,
        delta: end_value - start_value,
        r_squared,
    })
}
