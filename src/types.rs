use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-pixel value with an explicit "no data" marker.
///
/// `None` means the pixel is missing or numerically undefined (zero
/// denominator, non-positive power under log10, provider nodata).
/// NaN is never used as the missing marker: every computation has to
/// pattern-match before it can read a pixel as a number.
pub type PixelValue = Option<f64>;

/// 2D band data array (rows x cols)
pub type BandGrid = Array2<PixelValue>;

/// Per-pixel validity mask aligned to an acquisition's bands
/// (true = valid/usable)
pub type MaskGrid = Array2<bool>;

/// Geospatial transformation parameters (pixel -> geographic)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation terms.
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x,
            pixel_width,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height,
        }
    }

    /// Geographic coordinates of a pixel center.
    pub fn pixel_to_geo(&self, row: usize, col: usize) -> (f64, f64) {
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        let x = self.top_left_x + c * self.pixel_width + r * self.rotation_x;
        let y = self.top_left_y + c * self.rotation_y + r * self.pixel_height;
        (x, y)
    }
}

/// Analysis region: a buffered point or a polygon.
///
/// Immutable for the duration of one analysis run; used both for
/// spatial filtering and for restricting the spatial reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Region {
    /// Point with a buffer radius in meters
    Point { lon: f64, lat: f64, buffer_m: f64 },
    /// Closed polygon of (lon, lat) vertices
    Polygon(Vec<(f64, f64)>),
}

const EARTH_RADIUS_M: f64 = 6_371_000.0;

impl Region {
    /// Test whether a geographic coordinate lies inside the region.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        match self {
            Region::Point {
                lon: clon,
                lat: clat,
                buffer_m,
            } => haversine_m(*clon, *clat, lon, lat) <= *buffer_m,
            Region::Polygon(vertices) => point_in_polygon(lon, lat, vertices),
        }
    }
}

/// Great-circle distance between two (lon, lat) points in meters.
fn haversine_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Ray-casting point-in-polygon test.
fn point_in_polygon(lon: f64, lat: f64, vertices: &[(f64, f64)]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// One satellite image capture with its bands and metadata.
///
/// Immutable once ingested: derived bands are added, never mutated in
/// place, and original metadata is copied through every stage.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    bands: HashMap<String, BandGrid>,
    pub metadata: HashMap<String, f64>,
    pub mask: Option<MaskGrid>,
    pub geo_transform: Option<GeoTransform>,
}

impl Acquisition {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            bands: HashMap::new(),
            metadata: HashMap::new(),
            mask: None,
            geo_transform: None,
        }
    }

    /// Append a band. The band set is append-only: re-adding an
    /// existing name or a grid with mismatched dimensions is an error.
    pub fn add_band(&mut self, name: impl Into<String>, grid: BandGrid) -> TrendResult<()> {
        let name = name.into();
        if self.bands.contains_key(&name) {
            return Err(TrendError::DuplicateBand(name));
        }
        if let Some(expected) = self.dims() {
            if grid.dim() != expected {
                return Err(TrendError::ShapeMismatch {
                    expected,
                    actual: grid.dim(),
                });
            }
        }
        self.bands.insert(name, grid);
        Ok(())
    }

    pub fn band(&self, name: &str) -> TrendResult<&BandGrid> {
        self.bands
            .get(name)
            .ok_or_else(|| TrendError::MissingBand(name.to_string()))
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.contains_key(name)
    }

    pub fn band_names(&self) -> impl Iterator<Item = &String> {
        self.bands.keys()
    }

    /// Drop all bands not in `keep`. Mask and metadata are untouched.
    pub fn retain_bands(&mut self, keep: &[String]) {
        self.bands.retain(|name, _| keep.contains(name));
    }

    /// (rows, cols) of the band grids, if any band is present.
    pub fn dims(&self) -> Option<(usize, usize)> {
        self.bands.values().next().map(|g| g.dim())
    }

    /// Whether a pixel is usable: true when no mask is attached or the
    /// mask marks it valid.
    pub fn pixel_valid(&self, row: usize, col: usize) -> bool {
        self.mask.as_ref().map_or(true, |m| m[[row, col]])
    }
}

/// Timestamp-ordered set of acquisitions sharing a region and date
/// range. Membership is fixed at construction; the filters that
/// produced it are applied exactly once.
#[derive(Debug, Clone)]
pub struct Collection {
    pub region: Region,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub acquisitions: Vec<Acquisition>,
}

impl Collection {
    pub fn len(&self) -> usize {
        self.acquisitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acquisitions.is_empty()
    }
}

/// One point of a feature series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Time-ordered scalar values of one derived feature for one region.
///
/// Built once per (collection, feature) pair and never mutated; a new
/// analysis run produces a new series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSeries {
    pub feature: String,
    pub points: Vec<SeriesPoint>,
}

impl FeatureSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Ordinary least-squares line fitted to a feature series.
///
/// The time axis is fractional days since the first series point, so
/// `slope_per_day` reads directly as change per day and the axis stays
/// well-conditioned for long epochs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendFit {
    pub slope_per_day: f64,
    pub intercept: f64,
    /// Predicted value at the first series instant
    pub start_value: f64,
    /// Predicted value at the last series instant
    pub end_value: f64,
    /// Headline change over the period: `end_value - start_value`
    pub delta: f64,
    /// Coefficient of determination (descriptive, 1.0 for a constant series)
    pub r_squared: f64,
}

/// Error types for time-series processing
#[derive(Debug, thiserror::Error)]
pub enum TrendError {
    #[error("no acquisitions match the filters for product '{product}'")]
    EmptyCollection { product: String },

    #[error("masking failed: {0}")]
    Masking(String),

    #[error("missing band: {0}")]
    MissingBand(String),

    #[error("band already present: {0}")]
    DuplicateBand(String),

    #[error("grid shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("insufficient data for trend fit: {points} point(s), need at least 2")]
    InsufficientData { points: usize },

    #[error("provider error: {0}")]
    Provider(String),
}

/// Result type for time-series operations
pub type TrendResult<T> = Result<T, TrendError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::Array2;

    fn grid(rows: usize, cols: usize, value: f64) -> BandGrid {
        Array2::from_elem((rows, cols), Some(value))
    }

    #[test]
    fn test_band_set_is_append_only() {
        let mut acq = Acquisition::new("S2_001", Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        acq.add_band("B4", grid(4, 4, 100.0)).unwrap();

        let err = acq.add_band("B4", grid(4, 4, 200.0)).unwrap_err();
        assert!(matches!(err, TrendError::DuplicateBand(_)));

        // Original band untouched
        assert_eq!(acq.band("B4").unwrap()[[0, 0]], Some(100.0));
    }

    #[test]
    fn test_band_shape_mismatch() {
        let mut acq = Acquisition::new("S2_001", Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        acq.add_band("B4", grid(4, 4, 1.0)).unwrap();

        let err = acq.add_band("B8", grid(4, 5, 1.0)).unwrap_err();
        assert!(matches!(err, TrendError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_retain_bands_keeps_mask_and_metadata() {
        let mut acq = Acquisition::new("S2_001", Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        acq.add_band("B4", grid(2, 2, 1.0)).unwrap();
        acq.add_band("NDVI", grid(2, 2, 0.5)).unwrap();
        acq.metadata.insert("CLOUDY_PIXEL_PERCENTAGE".to_string(), 3.0);
        acq.mask = Some(Array2::from_elem((2, 2), true));

        acq.retain_bands(&["NDVI".to_string()]);

        assert!(!acq.has_band("B4"));
        assert!(acq.has_band("NDVI"));
        assert!(acq.mask.is_some());
        assert_eq!(acq.metadata.get("CLOUDY_PIXEL_PERCENTAGE"), Some(&3.0));
    }

    #[test]
    fn test_point_region_contains() {
        let region = Region::Point {
            lon: 10.0,
            lat: 45.0,
            buffer_m: 5_000.0,
        };
        assert!(region.contains(10.0, 45.0));
        assert!(region.contains(10.01, 45.0));
        // ~79 km east at this latitude
        assert!(!region.contains(11.0, 45.0));
    }

    #[test]
    fn test_polygon_region_contains() {
        let region = Region::Polygon(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]);
        assert!(region.contains(1.0, 1.0));
        assert!(!region.contains(3.0, 1.0));
        assert!(!region.contains(-0.5, -0.5));
    }

    #[test]
    fn test_geo_transform_pixel_center() {
        let gt = GeoTransform::north_up(10.0, 46.0, 0.001, -0.001);
        let (lon, lat) = gt.pixel_to_geo(0, 0);
        assert!((lon - 10.0005).abs() < 1e-12);
        assert!((lat - 45.9995).abs() < 1e-12);
    }
}
