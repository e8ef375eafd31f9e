use crate::types::{Acquisition, Region, TrendResult};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Named spatial aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReducerKind {
    #[default]
    Mean,
    Median,
}

/// Collapses one acquisition's raster, restricted to a region, to one
/// scalar per requested band.
///
/// A pixel contributes only when it lies inside the region (per the
/// acquisition's geotransform; rasters without one are taken as
/// provider-clipped, so every pixel counts), its mask entry is valid,
/// and its value is not the no-data sentinel. Zero valid pixels yield
/// a no-data scalar, never zero.
pub struct SpatialReducer {
    region: Region,
    kind: ReducerKind,
    /// Ground sample distance of the reduction in meters. Carried as
    /// configuration; it affects the provider's resampling precision,
    /// not the masking/no-data policy.
    scale_m: f64,
}

impl SpatialReducer {
    pub fn new(region: Region, kind: ReducerKind, scale_m: f64) -> Self {
        Self {
            region,
            kind,
            scale_m,
        }
    }

    pub fn scale_m(&self) -> f64 {
        self.scale_m
    }

    /// Reduce one band to a scalar. `Ok(None)` means no valid pixels.
    pub fn reduce_band(&self, acquisition: &Acquisition, band: &str) -> TrendResult<Option<f64>> {
        let grid = acquisition.band(band)?;
        let mut values: Vec<f64> = Vec::new();

        for ((row, col), px) in grid.indexed_iter() {
            let value = match px {
                Some(v) => *v,
                None => continue,
            };
            if !acquisition.pixel_valid(row, col) {
                continue;
            }
            if let Some(gt) = &acquisition.geo_transform {
                let (lon, lat) = gt.pixel_to_geo(row, col);
                if !self.region.contains(lon, lat) {
                    continue;
                }
            }
            values.push(value);
        }

        if values.is_empty() {
            log::debug!("{}/{}: no valid pixels in region", acquisition.id, band);
            return Ok(None);
        }

        Ok(aggregate(&mut values, self.kind))
    }

    /// Reduce all requested bands of one acquisition.
    pub fn reduce(
        &self,
        acquisition: &Acquisition,
        bands: &[String],
    ) -> TrendResult<Vec<(String, Option<f64>)>> {
        bands
            .iter()
            .map(|band| Ok((band.clone(), self.reduce_band(acquisition, band)?)))
            .collect()
    }
}

/// Aggregate a non-empty slice of valid values.
fn aggregate<T: Float>(values: &mut Vec<T>, kind: ReducerKind) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    match kind {
        ReducerKind::Mean => {
            let count = T::from(values.len())?;
            let sum = values.iter().fold(T::zero(), |acc, &v| acc + v);
            Some(sum / count)
        }
        ReducerKind::Median => {
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let mid = values.len() / 2;
            if values.len() % 2 == 1 {
                Some(values[mid])
            } else {
                Some((values[mid - 1] + values[mid]) / T::from(2.0)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BandGrid, GeoTransform};
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use ndarray::Array2;

    fn unbounded_region() -> Region {
        Region::Point {
            lon: 0.0,
            lat: 0.0,
            buffer_m: 1e7,
        }
    }

    fn scene(grid: BandGrid) -> Acquisition {
        let mut acq = Acquisition::new("s", Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap());
        acq.add_band("NDVI", grid).unwrap();
        acq
    }

    #[test]
    fn test_mean_over_valid_pixels() {
        let mut grid = Array2::from_elem((2, 2), Some(0.4));
        grid[[0, 1]] = Some(0.8);
        let acq = scene(grid);

        let reducer = SpatialReducer::new(unbounded_region(), ReducerKind::Mean, 30.0);
        let value = reducer.reduce_band(&acq, "NDVI").unwrap().unwrap();
        assert_relative_eq!(value, (0.4 * 3.0 + 0.8) / 4.0, max_relative = 1e-12);
    }

    #[test]
    fn test_masked_pixel_cannot_influence_mean() {
        // Poison pixel with an absurd value behind an invalid mask entry
        let mut grid = Array2::from_elem((2, 2), Some(0.5));
        grid[[1, 1]] = Some(1e9);
        let mut acq = scene(grid);
        let mut mask = Array2::from_elem((2, 2), true);
        mask[[1, 1]] = false;
        acq.mask = Some(mask);

        let reducer = SpatialReducer::new(unbounded_region(), ReducerKind::Mean, 30.0);
        let value = reducer.reduce_band(&acq, "NDVI").unwrap().unwrap();
        assert_relative_eq!(value, 0.5, max_relative = 1e-12);
    }

    #[test]
    fn test_no_data_pixels_are_skipped() {
        let mut grid = Array2::from_elem((2, 2), Some(0.2));
        grid[[0, 0]] = None;
        let acq = scene(grid);

        let reducer = SpatialReducer::new(unbounded_region(), ReducerKind::Mean, 30.0);
        let value = reducer.reduce_band(&acq, "NDVI").unwrap().unwrap();
        assert_relative_eq!(value, 0.2, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_valid_pixels_is_no_data_not_zero() {
        let acq = {
            let mut a = scene(Array2::from_elem((2, 2), Some(0.7)));
            a.mask = Some(Array2::from_elem((2, 2), false));
            a
        };

        let reducer = SpatialReducer::new(unbounded_region(), ReducerKind::Mean, 30.0);
        assert_eq!(reducer.reduce_band(&acq, "NDVI").unwrap(), None);
    }

    #[test]
    fn test_region_restriction_via_geotransform() {
        // 2x2 raster at ~1 degree spacing; region covers only pixel (0,0)
        let mut grid = Array2::from_elem((2, 2), Some(10.0));
        grid[[0, 0]] = Some(2.0);
        let mut acq = scene(grid);
        acq.geo_transform = Some(GeoTransform::north_up(0.0, 1.0, 1.0, -1.0));

        // pixel (0,0) center is (0.5, 0.5); 30 km buffer around it
        let region = Region::Point {
            lon: 0.5,
            lat: 0.5,
            buffer_m: 30_000.0,
        };
        let reducer = SpatialReducer::new(region, ReducerKind::Mean, 30.0);
        let value = reducer.reduce_band(&acq, "NDVI").unwrap().unwrap();
        assert_relative_eq!(value, 2.0, max_relative = 1e-12);
    }

    #[test]
    fn test_median_odd_and_even() {
        let mut odd = vec![3.0, 1.0, 2.0];
        assert_eq!(aggregate(&mut odd, ReducerKind::Median), Some(2.0));

        let mut even = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(aggregate(&mut even, ReducerKind::Median), Some(2.5));
    }

    #[test]
    fn test_missing_band_is_error() {
        let acq = scene(Array2::from_elem((2, 2), Some(0.1)));
        let reducer = SpatialReducer::new(unbounded_region(), ReducerKind::Mean, 30.0);
        assert!(reducer.reduce_band(&acq, "EVI").is_err());
    }
}
