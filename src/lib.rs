//! Mock detector signal pipeline.
//!
//! Three batch stages exchange line-delimited JSON records:
//!
//! 1. **extract** – curvature records → mode signatures
//! 2. **synthesize** – signatures + instrument spec → sampled time-series
//! 3. **evaluate** – time-series + sensitivity curve → SNR and detection verdict

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod signal;
pub mod stage;

pub use config::PipelineConfig;
pub use data::codec::{read_records, write_records, RecordSource, Summary};
pub use data::curve::{CurvePoint, SensitivityCurve};
pub use data::instrument::InstrumentSpec;
pub use data::model::{
    CurvatureRecord, DetectionResult, ModeSignature, Record, SimulationSummary, TimeSeries,
};
pub use error::{PipelineError, Result};
pub use signal::detect::DetectabilityEvaluator;
pub use signal::extract::{LinearScaling, MissingSummaryPolicy, SignatureExtractor, SignatureModel};
pub use signal::spectrum::Window;
pub use signal::synth::{record_rng, Envelope, SignalSynthesizer};
