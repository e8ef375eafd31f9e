use crate::types::{Acquisition, BandGrid, TrendResult};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

const DENOM_EPS: f64 = 1e-10;

/// Radar features derivable from a dual-polarization acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadarFeature {
    /// Co-pol backscatter in decibel scale
    VvDb,
    /// Cross-pol backscatter in decibel scale
    VhDb,
    /// Radar Vegetation Index (from linear power)
    Rvi,
    /// Radar Forest Degradation Index (from linear power)
    Rfdi,
    /// Incidence angle, passed through unmodified
    IncidenceAngle,
}

impl RadarFeature {
    pub fn band_name(&self) -> &'static str {
        match self {
            RadarFeature::VvDb => "VV_dB",
            RadarFeature::VhDb => "VH_dB",
            RadarFeature::Rvi => "RVI",
            RadarFeature::Rfdi => "RFDI",
            RadarFeature::IncidenceAngle => "angle",
        }
    }
}

impl std::fmt::Display for RadarFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.band_name())
    }
}

/// Input band names for a dual-polarization radar product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarBands {
    pub vv: String,
    pub vh: String,
    pub incidence_angle: String,
}

impl Default for RadarBands {
    /// Sentinel-1 GRD band names.
    fn default() -> Self {
        Self {
            vv: "VV".to_string(),
            vh: "VH".to_string(),
            incidence_angle: "angle".to_string(),
        }
    }
}

/// Radar preprocessing engine.
///
/// Takes VV/VH in linear power plus an incidence-angle band. The
/// polarimetric ratios (RVI, RFDI) are computed from the linear-power
/// bands *before* decibel conversion; the ratios only carry physical
/// meaning in linear units. VV/VH are then converted to decibel scale
/// and only the requested feature subset is retained.
pub struct RadarProcessor {
    bands: RadarBands,
    features: Vec<RadarFeature>,
}

impl RadarProcessor {
    pub fn new(bands: RadarBands, features: Vec<RadarFeature>) -> Self {
        Self { bands, features }
    }

    pub fn process(&self, mut acquisition: Acquisition) -> TrendResult<Acquisition> {
        log::debug!(
            "radar features for {}: {:?}",
            acquisition.id,
            self.features.iter().map(|f| f.band_name()).collect::<Vec<_>>()
        );

        let vv = acquisition.band(&self.bands.vv)?.clone();
        let vh = acquisition.band(&self.bands.vh)?.clone();

        for feature in &self.features {
            let grid = match feature {
                RadarFeature::Rvi => rvi(&vv, &vh),
                RadarFeature::Rfdi => rfdi(&vv, &vh),
                RadarFeature::VvDb => to_db(&vv),
                RadarFeature::VhDb => to_db(&vh),
                // Already present as a source band; renamed copy only
                // when the provider uses a different name.
                RadarFeature::IncidenceAngle => {
                    if self.bands.incidence_angle == feature.band_name() {
                        continue;
                    }
                    acquisition.band(&self.bands.incidence_angle)?.clone()
                }
            };
            acquisition.add_band(feature.band_name(), grid)?;
        }

        let keep: Vec<String> = self
            .features
            .iter()
            .map(|f| f.band_name().to_string())
            .collect();
        acquisition.retain_bands(&keep);

        Ok(acquisition)
    }
}

/// Linear power to decibel: `dB = 10 * log10(power)`.
///
/// log10 is undefined for non-positive power, so those pixels become
/// the no-data sentinel rather than an unchecked non-finite value.
pub fn to_db(linear: &BandGrid) -> BandGrid {
    linear.mapv(|px| match px {
        Some(power) if power > 0.0 => Some(10.0 * power.log10()),
        _ => None,
    })
}

/// Radar Vegetation Index from linear-power VV/VH:
/// `RVI = 4 * VH / (VV + VH)`
pub fn rvi(vv: &BandGrid, vh: &BandGrid) -> BandGrid {
    Zip::from(vv).and(vh).map_collect(|&vv, &vh| match (vv, vh) {
        (Some(vv), Some(vh)) => {
            let sum = vv + vh;
            if sum.abs() < DENOM_EPS {
                None
            } else {
                Some(4.0 * vh / sum)
            }
        }
        _ => None,
    })
}

/// Radar Forest Degradation Index from linear-power VV/VH:
/// `RFDI = (VV - VH) / (VV + VH)`
pub fn rfdi(vv: &BandGrid, vh: &BandGrid) -> BandGrid {
    Zip::from(vv).and(vh).map_collect(|&vv, &vh| match (vv, vh) {
        (Some(vv), Some(vh)) => {
            let sum = vv + vh;
            if sum.abs() < DENOM_EPS {
                None
            } else {
                Some((vv - vh) / sum)
            }
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use ndarray::Array2;

    fn grid(value: f64) -> BandGrid {
        Array2::from_elem((2, 2), Some(value))
    }

    fn s1_scene(vv: f64, vh: f64) -> Acquisition {
        let mut acq = Acquisition::new("s1", Utc.with_ymd_and_hms(2022, 6, 1, 5, 30, 0).unwrap());
        acq.add_band("VV", grid(vv)).unwrap();
        acq.add_band("VH", grid(vh)).unwrap();
        acq.add_band("angle", grid(38.5)).unwrap();
        acq
    }

    #[test]
    fn test_db_conversion_round_trip() {
        for power in [0.001, 0.5, 1.0, 100.0] {
            let db = to_db(&grid(power));
            let recovered = 10f64.powf(db[[0, 0]].unwrap() / 10.0);
            assert_relative_eq!(recovered, power, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_db_of_non_positive_power_is_no_data() {
        for power in [0.0, -0.3] {
            let db = to_db(&grid(power));
            assert_eq!(db[[0, 0]], None, "power {} must yield no data", power);
        }
    }

    #[test]
    fn test_rvi_rfdi_use_linear_power() {
        // VV=1.0, VH=0.5 linear: RVI = 4*0.5/1.5, RFDI = 0.5/1.5
        let vv = grid(1.0);
        let vh = grid(0.5);

        assert_relative_eq!(
            rvi(&vv, &vh)[[0, 0]].unwrap(),
            4.0 * 0.5 / 1.5,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            rfdi(&vv, &vh)[[0, 0]].unwrap(),
            0.5 / 1.5,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_zero_power_sum_is_no_data() {
        let zero = grid(0.0);
        assert_eq!(rvi(&zero, &zero)[[0, 0]], None);
        assert_eq!(rfdi(&zero, &zero)[[0, 0]], None);
    }

    #[test]
    fn test_process_retains_requested_subset() {
        let processor = RadarProcessor::new(
            RadarBands::default(),
            vec![
                RadarFeature::VvDb,
                RadarFeature::Rvi,
                RadarFeature::IncidenceAngle,
            ],
        );

        let result = processor.process(s1_scene(1.0, 0.5)).unwrap();

        assert!(result.has_band("VV_dB"));
        assert!(result.has_band("RVI"));
        assert!(result.has_band("angle"));
        assert!(!result.has_band("VV"), "linear bands dropped");
        assert!(!result.has_band("RFDI"), "unrequested feature not kept");

        // dB of linear power 1.0 is exactly 0
        assert_relative_eq!(
            result.band("VV_dB").unwrap()[[0, 0]].unwrap(),
            0.0,
            epsilon = 1e-12
        );
        // RVI came from linear power, not from the dB values
        assert_relative_eq!(
            result.band("RVI").unwrap()[[0, 0]].unwrap(),
            4.0 / 3.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_incidence_angle_passes_through_unmodified() {
        let processor =
            RadarProcessor::new(RadarBands::default(), vec![RadarFeature::IncidenceAngle]);

        let result = processor.process(s1_scene(1.0, 0.5)).unwrap();
        assert_eq!(result.band("angle").unwrap()[[0, 0]], Some(38.5));
    }
}
