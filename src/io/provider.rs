use crate::types::{Acquisition, BandGrid, Region, TrendError, TrendResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Imagery catalog contract.
///
/// The processing core depends only on this interface, never on how a
/// provider stores or indexes its tiles. `query_collection` returns
/// acquisitions intersecting the region within `[start, end)`, each
/// already carrying its band grids clipped to the region footprint.
pub trait ImageryProvider: Send + Sync {
    fn query_collection(
        &self,
        product_id: &str,
        region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TrendResult<Vec<Acquisition>>;

    fn get_band(&self, acquisition_id: &str, band: &str) -> TrendResult<BandGrid>;
}

/// Deterministic in-memory provider.
///
/// Scenes are registered per product id; spatial clipping is assumed
/// to have happened at registration time, so queries filter on the
/// date range only. Used as the reference adapter and by tests.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    products: HashMap<String, Vec<Acquisition>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scene under a product id.
    pub fn add_scene(&mut self, product_id: impl Into<String>, acquisition: Acquisition) {
        self.products
            .entry(product_id.into())
            .or_default()
            .push(acquisition);
    }

    pub fn scene_count(&self, product_id: &str) -> usize {
        self.products.get(product_id).map_or(0, |v| v.len())
    }
}

impl ImageryProvider for InMemoryProvider {
    fn query_collection(
        &self,
        product_id: &str,
        _region: &Region,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TrendResult<Vec<Acquisition>> {
        let scenes = self
            .products
            .get(product_id)
            .ok_or_else(|| TrendError::Provider(format!("unknown product: {}", product_id)))?;

        let matched: Vec<Acquisition> = scenes
            .iter()
            .filter(|a| a.timestamp >= start && a.timestamp < end)
            .cloned()
            .collect();

        log::debug!(
            "query '{}': {} of {} scenes in [{}, {})",
            product_id,
            matched.len(),
            scenes.len(),
            start,
            end
        );

        Ok(matched)
    }

    fn get_band(&self, acquisition_id: &str, band: &str) -> TrendResult<BandGrid> {
        for scenes in self.products.values() {
            if let Some(acq) = scenes.iter().find(|a| a.id == acquisition_id) {
                return acq.band(band).cloned();
            }
        }
        Err(TrendError::Provider(format!(
            "unknown acquisition: {}",
            acquisition_id
        )))
    }
}
