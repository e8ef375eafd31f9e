use crate::core::filter::CollectionFilter;
use crate::core::mask::{MaskApplier, MaskingStrategy};
use crate::core::optical::{BandRoles, OpticalIndex, OpticalIndexProcessor};
use crate::core::radar::{RadarBands, RadarFeature, RadarProcessor};
use crate::core::reduce::{ReducerKind, SpatialReducer};
use crate::core::series::{assemble_series, SeriesSample};
use crate::core::trend::fit_trend;
use crate::io::ImageryProvider;
use crate::types::{Acquisition, FeatureSeries, Region, TrendFit, TrendResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Full configuration surface of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub optical_product: String,
    pub radar_product: String,
    pub region: Region,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Maximum per-acquisition cloud-coverage percentage
    pub max_cloud_pct: f64,
    /// Metadata key carrying the cloud-coverage percentage
    pub cloud_metadata_key: String,
    pub optical_indices: Vec<OpticalIndex>,
    pub band_roles: BandRoles,
    pub radar_features: Vec<RadarFeature>,
    pub radar_bands: RadarBands,
    /// Spatial reduction scale (ground sample distance, meters)
    pub scale_m: f64,
    pub reducer: ReducerKind,
}

impl AnalysisConfig {
    /// Sentinel-2 / Sentinel-1 defaults for a region and period.
    pub fn new(region: Region, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            optical_product: "S2_SR".to_string(),
            radar_product: "S1_GRD".to_string(),
            region,
            start,
            end,
            max_cloud_pct: 30.0,
            cloud_metadata_key: "CLOUDY_PIXEL_PERCENTAGE".to_string(),
            optical_indices: vec![OpticalIndex::Ndvi],
            band_roles: BandRoles::default(),
            radar_features: vec![
                RadarFeature::VvDb,
                RadarFeature::VhDb,
                RadarFeature::Rvi,
                RadarFeature::Rfdi,
            ],
            radar_bands: RadarBands::default(),
            scale_m: 30.0,
            reducer: ReducerKind::Mean,
        }
    }
}

/// Per-feature result of a run: the assembled series plus its trend
/// fit. `fit` is `None` when the series had too few points — the
/// caller's "no trend available" degrade path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTrend {
    pub series: FeatureSeries,
    pub fit: Option<TrendFit>,
}

struct ReducedScene {
    acquisition_id: String,
    timestamp: DateTime<Utc>,
    values: Vec<(String, Option<f64>)>,
}

/// Unordered map over acquisitions. Stages have no cross-acquisition
/// dependency, so each scene is processed by exactly one worker with
/// exclusive ownership; failed scenes are dropped with a warning.
fn map_scenes<F>(acquisitions: Vec<Acquisition>, op: F) -> Vec<ReducedScene>
where
    F: Fn(Acquisition) -> TrendResult<ReducedScene> + Send + Sync,
{
    let run = |acq: Acquisition| {
        let id = acq.id.clone();
        match op(acq) {
            Ok(reduced) => Some(reduced),
            Err(e) => {
                log::warn!("dropping acquisition {}: {}", id, e);
                None
            }
        }
    };

    #[cfg(feature = "parallel")]
    return acquisitions.into_par_iter().filter_map(run).collect();

    #[cfg(not(feature = "parallel"))]
    acquisitions.into_iter().filter_map(run).collect()
}

/// Join point: per-acquisition scalars become one series and one fit
/// per feature.
fn assemble_trends(reduced: Vec<ReducedScene>, features: &[String]) -> Vec<FeatureTrend> {
    features
        .iter()
        .map(|feature| {
            let samples: Vec<SeriesSample> = reduced
                .iter()
                .map(|scene| SeriesSample {
                    acquisition_id: scene.acquisition_id.clone(),
                    timestamp: scene.timestamp,
                    value: scene
                        .values
                        .iter()
                        .find(|(name, _)| name == feature)
                        .and_then(|(_, v)| *v),
                })
                .collect();

            let series = assemble_series(feature.clone(), samples);
            let fit = match fit_trend(&series) {
                Ok(fit) => Some(fit),
                Err(e) => {
                    log::warn!("no trend for '{}': {}", feature, e);
                    None
                }
            };
            FeatureTrend { series, fit }
        })
        .collect()
}

/// Optical branch: filter -> mask -> indices -> reduce -> assemble -> fit.
///
/// `EmptyCollection` propagates to the caller, who decides whether it
/// is fatal or an empty-result signal.
pub fn run_optical(
    provider: &dyn ImageryProvider,
    masking: &dyn MaskingStrategy,
    config: &AnalysisConfig,
) -> TrendResult<Vec<FeatureTrend>> {
    log::info!(
        "optical run: '{}' {} to {}",
        config.optical_product,
        config.start,
        config.end
    );

    let collection = CollectionFilter::new(
        config.optical_product.as_str(),
        config.region.clone(),
        config.start,
        config.end,
    )
    .with_max(config.cloud_metadata_key.as_str(), config.max_cloud_pct)
    .apply(provider)?;

    let collection = MaskApplier::new(masking).apply(collection);

    let processor =
        OpticalIndexProcessor::new(config.band_roles.clone(), config.optical_indices.clone());
    let reducer = SpatialReducer::new(config.region.clone(), config.reducer, config.scale_m);
    let features: Vec<String> = config
        .optical_indices
        .iter()
        .map(|i| i.band_name().to_string())
        .collect();

    let reduced = map_scenes(collection.acquisitions, |acq| {
        let processed = processor.process(acq)?;
        let values = reducer.reduce(&processed, &features)?;
        Ok(ReducedScene {
            acquisition_id: processed.id.clone(),
            timestamp: processed.timestamp,
            values,
        })
    });

    log::info!("optical run: {} scenes reduced", reduced.len());
    Ok(assemble_trends(reduced, &features))
}

/// Radar branch: filter -> dB/polarimetric features -> reduce ->
/// assemble -> fit. No cloud predicate and no optical mask; radar
/// quality screening is the provider's concern.
pub fn run_radar(
    provider: &dyn ImageryProvider,
    config: &AnalysisConfig,
) -> TrendResult<Vec<FeatureTrend>> {
    log::info!(
        "radar run: '{}' {} to {}",
        config.radar_product,
        config.start,
        config.end
    );

    let collection = CollectionFilter::new(
        config.radar_product.as_str(),
        config.region.clone(),
        config.start,
        config.end,
    )
    .apply(provider)?;

    let processor = RadarProcessor::new(config.radar_bands.clone(), config.radar_features.clone());
    let reducer = SpatialReducer::new(config.region.clone(), config.reducer, config.scale_m);
    let features: Vec<String> = config
        .radar_features
        .iter()
        .map(|f| f.band_name().to_string())
        .collect();

    let reduced = map_scenes(collection.acquisitions, |acq| {
        let processed = processor.process(acq)?;
        let values = reducer.reduce(&processed, &features)?;
        Ok(ReducedScene {
            acquisition_id: processed.id.clone(),
            timestamp: processed.timestamp,
            values,
        })
    });

    log::info!("radar run: {} scenes reduced", reduced.len());
    Ok(assemble_trends(reduced, &features))
}
