//! Core time-series processing modules

pub mod filter;
pub mod mask;
pub mod optical;
pub mod radar;
pub mod reduce;
pub mod series;
pub mod trend;
pub mod pipeline;

// Re-export main types
pub use filter::CollectionFilter;
pub use mask::{all_valid, MaskApplier, MaskingStrategy, ReflectanceThreshold};
pub use optical::{normalized_difference, BandRoles, OpticalIndex, OpticalIndexProcessor};
pub use radar::{rfdi, rvi, to_db, RadarBands, RadarFeature, RadarProcessor};
pub use reduce::{ReducerKind, SpatialReducer};
pub use series::{assemble_series, SeriesSample};
pub use trend::fit_trend;
pub use pipeline::{run_optical, run_radar, AnalysisConfig, FeatureTrend};
