use crate::types::{Acquisition, BandGrid, TrendResult};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Denominators smaller than this are treated as division by zero and
/// yield the no-data sentinel instead of a runaway ratio.
const DENOM_EPS: f64 = 1e-10;

/// Supported optical vegetation/moisture indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpticalIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Enhanced Vegetation Index
    Evi,
    /// Normalized Difference Moisture Index
    Ndmi,
    /// Normalized Burn Ratio
    Nbr,
    /// Normalized Difference Water Index (McFeeters)
    Ndwi,
}

impl OpticalIndex {
    /// Name of the derived band this index appends.
    pub fn band_name(&self) -> &'static str {
        match self {
            OpticalIndex::Ndvi => "NDVI",
            OpticalIndex::Evi => "EVI",
            OpticalIndex::Ndmi => "NDMI",
            OpticalIndex::Nbr => "NBR",
            OpticalIndex::Ndwi => "NDWI",
        }
    }
}

impl std::fmt::Display for OpticalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.band_name())
    }
}

/// Band-role table mapping spectral roles to provider band names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandRoles {
    pub nir: String,
    pub red: String,
    pub blue: String,
    pub green: String,
    pub swir1: String,
    pub swir2: String,
}

impl Default for BandRoles {
    /// Sentinel-2 surface-reflectance band names.
    fn default() -> Self {
        Self {
            nir: "B8".to_string(),
            red: "B4".to_string(),
            blue: "B2".to_string(),
            green: "B3".to_string(),
            swir1: "B11".to_string(),
            swir2: "B12".to_string(),
        }
    }
}

/// Optical index engine.
///
/// Computes the requested band-ratio indices for one masked
/// acquisition, appends them as new bands, then drops the unrequested
/// source bands to bound memory. The attached mask passes through
/// unchanged.
pub struct OpticalIndexProcessor {
    roles: BandRoles,
    indices: Vec<OpticalIndex>,
    /// Reflectance scaling divisor for integer-scaled bands (EVI)
    reflectance_scale: f64,
}

impl OpticalIndexProcessor {
    pub fn new(roles: BandRoles, indices: Vec<OpticalIndex>) -> Self {
        Self {
            roles,
            indices,
            reflectance_scale: 10_000.0,
        }
    }

    pub fn with_reflectance_scale(mut self, scale: f64) -> Self {
        self.reflectance_scale = scale;
        self
    }

    /// Compute and append all requested indices, then retain only the
    /// index bands.
    pub fn process(&self, mut acquisition: Acquisition) -> TrendResult<Acquisition> {
        log::debug!(
            "optical indices for {}: {:?}",
            acquisition.id,
            self.indices.iter().map(|i| i.band_name()).collect::<Vec<_>>()
        );

        for index in &self.indices {
            let grid = self.compute(*index, &acquisition)?;
            acquisition.add_band(index.band_name(), grid)?;
        }

        let keep: Vec<String> = self
            .indices
            .iter()
            .map(|i| i.band_name().to_string())
            .collect();
        acquisition.retain_bands(&keep);

        Ok(acquisition)
    }

    fn compute(&self, index: OpticalIndex, acquisition: &Acquisition) -> TrendResult<BandGrid> {
        let r = &self.roles;
        match index {
            OpticalIndex::Ndvi => Ok(normalized_difference(
                acquisition.band(&r.nir)?,
                acquisition.band(&r.red)?,
            )),
            OpticalIndex::Ndmi => Ok(normalized_difference(
                acquisition.band(&r.nir)?,
                acquisition.band(&r.swir1)?,
            )),
            OpticalIndex::Nbr => Ok(normalized_difference(
                acquisition.band(&r.nir)?,
                acquisition.band(&r.swir2)?,
            )),
            OpticalIndex::Ndwi => Ok(normalized_difference(
                acquisition.band(&r.green)?,
                acquisition.band(&r.nir)?,
            )),
            OpticalIndex::Evi => Ok(evi(
                acquisition.band(&r.nir)?,
                acquisition.band(&r.red)?,
                acquisition.band(&r.blue)?,
                self.reflectance_scale,
            )),
        }
    }
}

/// `(a - b) / (a + b)` per pixel; zero denominator or a missing input
/// pixel yields the no-data sentinel.
pub fn normalized_difference(band_a: &BandGrid, band_b: &BandGrid) -> BandGrid {
    Zip::from(band_a).and(band_b).map_collect(|&a, &b| match (a, b) {
        (Some(a), Some(b)) => {
            let sum = a + b;
            if sum.abs() < DENOM_EPS {
                None
            } else {
                Some((a - b) / sum)
            }
        }
        _ => None,
    })
}

/// Enhanced Vegetation Index (Huete et al., 2002):
///
/// `EVI = 2.5 * (nNIR - nRed) / (nNIR + 6*nRed - 7.5*nBlue + 1)`
///
/// where `nX = X / scale` rescales integer-coded reflectances.
pub fn evi(nir: &BandGrid, red: &BandGrid, blue: &BandGrid, scale: f64) -> BandGrid {
    Zip::from(nir)
        .and(red)
        .and(blue)
        .map_collect(|&n, &r, &b| match (n, r, b) {
            (Some(n), Some(r), Some(b)) => {
                let (nn, nr, nb) = (n / scale, r / scale, b / scale);
                let denom = nn + 6.0 * nr - 7.5 * nb + 1.0;
                if denom.abs() < DENOM_EPS {
                    None
                } else {
                    Some(2.5 * (nn - nr) / denom)
                }
            }
            _ => None,
        })
}
