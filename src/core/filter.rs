use crate::io::ImageryProvider;
use crate::types::{Collection, Region, TrendError, TrendResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Acquisition selection parameters: spatial bound, half-open date
/// range and optional scalar-metadata upper bounds (e.g. cloud cover).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionFilter {
    pub product_id: String,
    pub region: Region,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// `metadata[key] < threshold` predicates, all of which must hold.
    /// Acquisitions missing a thresholded key are excluded.
    pub max_metadata: Vec<(String, f64)>,
}

impl CollectionFilter {
    pub fn new(
        product_id: impl Into<String>,
        region: Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            region,
            start,
            end,
            max_metadata: Vec::new(),
        }
    }

    /// Add a `metadata[key] < threshold` predicate.
    pub fn with_max(mut self, key: impl Into<String>, threshold: f64) -> Self {
        self.max_metadata.push((key.into(), threshold));
        self
    }

    /// Query the provider and apply all predicates once, producing an
    /// immutable collection. No ordering is imposed at this stage.
    ///
    /// Returns `EmptyCollection` when zero acquisitions match; the
    /// caller decides whether that is fatal or an empty-result signal.
    pub fn apply(&self, provider: &dyn ImageryProvider) -> TrendResult<Collection> {
        let candidates =
            provider.query_collection(&self.product_id, &self.region, self.start, self.end)?;
        let candidate_count = candidates.len();

        let acquisitions: Vec<_> = candidates
            .into_iter()
            .filter(|acq| acq.timestamp >= self.start && acq.timestamp < self.end)
            .filter(|acq| {
                self.max_metadata.iter().all(|(key, threshold)| {
                    match acq.metadata.get(key) {
                        Some(value) => value < threshold,
                        None => {
                            log::debug!("{}: missing metadata '{}', excluded", acq.id, key);
                            false
                        }
                    }
                })
            })
            .collect();

        log::info!(
            "filter '{}': {} of {} acquisitions pass",
            self.product_id,
            acquisitions.len(),
            candidate_count
        );

        if acquisitions.is_empty() {
            return Err(TrendError::EmptyCollection {
                product: self.product_id.clone(),
            });
        }

        Ok(Collection {
            region: self.region.clone(),
            start: self.start,
            end: self.end,
            acquisitions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::InMemoryProvider;
    use crate::types::Acquisition;
    use chrono::TimeZone;
    use ndarray::Array2;

    fn region() -> Region {
        Region::Point {
            lon: 8.0,
            lat: 47.0,
            buffer_m: 2_000.0,
        }
    }

    fn scene(id: &str, day: u32, cloud_pct: f64) -> Acquisition {
        let mut acq = Acquisition::new(id, Utc.with_ymd_and_hms(2022, 5, day, 10, 30, 0).unwrap());
        acq.add_band("B4", Array2::from_elem((3, 3), Some(0.2)))
            .unwrap();
        acq.metadata
            .insert("CLOUDY_PIXEL_PERCENTAGE".to_string(), cloud_pct);
        acq
    }

    fn provider() -> InMemoryProvider {
        let mut p = InMemoryProvider::new();
        p.add_scene("S2_SR", scene("s1", 1, 5.0));
        p.add_scene("S2_SR", scene("s2", 10, 60.0));
        p.add_scene("S2_SR", scene("s3", 20, 12.0));
        p
    }

    #[test]
    fn test_cloud_threshold_predicate() {
        let start = Utc.with_ymd_and_hms(2022, 5, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap();

        let collection = CollectionFilter::new("S2_SR", region(), start, end)
            .with_max("CLOUDY_PIXEL_PERCENTAGE", 20.0)
            .apply(&provider())
            .unwrap();

        let mut ids: Vec<_> = collection.acquisitions.iter().map(|a| a.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["s1", "s3"]);
    }

    #[test]
    fn test_missing_metadata_key_excludes() {
        let mut p = InMemoryProvider::new();
        let mut acq = scene("bare", 5, 0.0);
        acq.metadata.clear();
        p.add_scene("S2_SR", acq);

        let start = Utc.with_ymd_and_hms(2022, 5, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap();

        let result = CollectionFilter::new("S2_SR", region(), start, end)
            .with_max("CLOUDY_PIXEL_PERCENTAGE", 20.0)
            .apply(&p);

        assert!(matches!(
            result.unwrap_err(),
            TrendError::EmptyCollection { .. }
        ));
    }

    #[test]
    fn test_empty_collection_error_carries_product() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap();

        let err = CollectionFilter::new("S2_SR", region(), start, end)
            .apply(&provider())
            .unwrap_err();

        match err {
            TrendError::EmptyCollection { product } => assert_eq!(product, "S2_SR"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
