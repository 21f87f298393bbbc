pub mod buhlmann;
pub mod config;
pub mod deco;
pub mod error;
pub mod ffi;
pub mod metrics;
pub mod models;
pub mod storage;
pub mod trip;
pub mod units;

uniffi::include_scaffolding!("divelog");

pub use buhlmann::{TissueModel, Zhl16c};
pub use config::{DiveLogConfig, UnitSystem};
pub use deco::{preload, preload_cancellable, CancelToken};
pub use error::{ConfigError, PreloadError, SessionError};
pub use ffi::{
    compute_dive_metrics, dive_gas_label, CylinderRecord, DiveLogSession, DiveMetricsRecord,
    DiveRecord, GasChangeRecord, GasMixRecord, SampleRecord, TripSummary,
};
pub use metrics::{DiveMetrics, GasSummary};
pub use models::{
    Cylinder, Dive, DiveId, GasChange, GasMix, Sample, Trip, TripFlag, TripId, TripOrigin,
    WeightSystem,
};
pub use storage::DiveStore;
pub use trip::{DiveLog, TripRegistry};
