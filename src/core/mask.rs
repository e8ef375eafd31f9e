use crate::types::{Acquisition, Collection, MaskGrid, TrendError, TrendResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Black-box cloud/shadow/snow masking capability.
///
/// Implementations decide how a scene's bands and metadata turn into a
/// per-pixel validity mask; callers inject whichever strategy is
/// configured without touching the processing core.
pub trait MaskingStrategy: Send + Sync {
    fn compute(&self, acquisition: &Acquisition) -> TrendResult<MaskGrid>;
}

/// Simple reflectance-threshold screen.
///
/// Marks a pixel invalid when the configured band is missing data or
/// its value reaches `max_value` (bright pixels read as cloud/snow).
/// A deliberately plain default; real deployments inject a proper
/// scene-classification strategy instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectanceThreshold {
    pub band: String,
    pub max_value: f64,
}

impl ReflectanceThreshold {
    pub fn new(band: impl Into<String>, max_value: f64) -> Self {
        Self {
            band: band.into(),
            max_value,
        }
    }
}

impl MaskingStrategy for ReflectanceThreshold {
    fn compute(&self, acquisition: &Acquisition) -> TrendResult<MaskGrid> {
        let grid = acquisition.band(&self.band)?;
        Ok(grid.mapv(|px| matches!(px, Some(v) if v < self.max_value)))
    }
}

/// Attaches masks to a collection's acquisitions, one strategy call
/// per scene, before any index computation reads the rasters.
pub struct MaskApplier<'a> {
    strategy: &'a dyn MaskingStrategy,
}

impl<'a> MaskApplier<'a> {
    pub fn new(strategy: &'a dyn MaskingStrategy) -> Self {
        Self { strategy }
    }

    /// Compute and attach the mask for one acquisition. Bands and
    /// metadata are copied through untouched; a mask whose shape does
    /// not match the acquisition counts as a masking failure.
    pub fn attach(&self, mut acquisition: Acquisition) -> TrendResult<Acquisition> {
        let mask = self.strategy.compute(&acquisition)?;

        if let Some(dims) = acquisition.dims() {
            if mask.dim() != dims {
                return Err(TrendError::Masking(format!(
                    "mask shape {:?} does not match acquisition {:?}",
                    mask.dim(),
                    dims
                )));
            }
        }

        acquisition.mask = Some(mask);
        Ok(acquisition)
    }

    /// Apply the strategy across a collection.
    ///
    /// A per-acquisition failure drops that scene and logs it instead
    /// of aborting the run: single scenes with unrecoverable masking
    /// issues are common at scale.
    pub fn apply(&self, collection: Collection) -> Collection {
        let Collection {
            region,
            start,
            end,
            acquisitions,
        } = collection;
        let total = acquisitions.len();

        let acquisitions: Vec<Acquisition> = acquisitions
            .into_iter()
            .filter_map(|acq| {
                let id = acq.id.clone();
                match self.attach(acq) {
                    Ok(masked) => Some(masked),
                    Err(e) => {
                        log::warn!("dropping acquisition {}: {}", id, e);
                        None
                    }
                }
            })
            .collect();

        log::info!("masking: {} of {} acquisitions retained", acquisitions.len(), total);

        Collection {
            region,
            start,
            end,
            acquisitions,
        }
    }
}

/// Fully valid mask, for products that need no screening.
pub fn all_valid(rows: usize, cols: usize) -> MaskGrid {
    Array2::from_elem((rows, cols), true)
}
