/// Data layer: typed records, the line-record codec, curves and instrument specs.
///
/// Architecture:
/// ```text
///  .ndjson / .am / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  codec    │  line → typed Record (validated), Record → line
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  CurvatureRecord, ModeSignature, TimeSeries, ...
///   └──────────┘
///
///   ┌──────────┐     ┌────────────┐
///   │  curve    │     │ instrument │  read-only inputs shared per run
///   └──────────┘     └────────────┘
/// ```

pub mod codec;
pub mod curve;
pub mod instrument;
pub mod model;
