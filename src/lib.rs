//! terratrend: A Fast, Modular Satellite Index Time-Series and Trend Processor
//!
//! This library derives time-ordered, per-region scalar feature series from
//! optical and radar satellite imagery — vegetation/moisture indices from
//! multispectral bands, decibel backscatter and polarimetric ratios from
//! dual-polarization radar — and fits an ordinary least-squares trend line
//! to quantify change over a period.
//!
//! The pipeline runs per acquisition: mask, index, reduce to one scalar per
//! feature, then join into per-feature series and fit. Pixel-level problems
//! become explicit no-data values, acquisition-level problems drop that
//! scene, and only series-level insufficiency aborts a trend computation.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    Acquisition, BandGrid, Collection, FeatureSeries, GeoTransform, MaskGrid, PixelValue, Region,
    SeriesPoint, TrendError, TrendFit, TrendResult,
};

pub use io::{ImageryProvider, InMemoryProvider};

pub use core::{
    assemble_series, fit_trend, run_optical, run_radar, AnalysisConfig, BandRoles,
    CollectionFilter, FeatureTrend, MaskApplier, MaskingStrategy, OpticalIndex,
    OpticalIndexProcessor, RadarBands, RadarFeature, RadarProcessor, ReducerKind,
    ReflectanceThreshold, SpatialReducer,
};
