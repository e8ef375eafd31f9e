use crate::types::{FeatureSeries, SeriesPoint};
use chrono::{DateTime, Utc};

/// One reduced scalar for one acquisition, before assembly.
/// `value: None` marks an acquisition whose reduction produced no data.
#[derive(Debug, Clone)]
pub struct SeriesSample {
    pub acquisition_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

/// Assemble per-acquisition scalars into a feature series.
///
/// No-data entries are dropped, the remainder is sorted by timestamp
/// ascending, and timestamp ties are broken by acquisition id so the
/// output order is reproducible across runs.
pub fn assemble_series(feature: impl Into<String>, samples: Vec<SeriesSample>) -> FeatureSeries {
    let feature = feature.into();
    let total = samples.len();

    let mut kept: Vec<SeriesSample> = samples.into_iter().filter(|s| s.value.is_some()).collect();
    kept.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.acquisition_id.cmp(&b.acquisition_id))
    });

    log::debug!("series '{}': {} of {} samples kept", feature, kept.len(), total);

    let points = kept
        .into_iter()
        .map(|s| SeriesPoint {
            timestamp: s.timestamp,
            // filter above guarantees Some
            value: s.value.unwrap_or_default(),
        })
        .collect();

    FeatureSeries { feature, points }
}
