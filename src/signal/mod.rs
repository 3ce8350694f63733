/// Signal layer: the three numeric transforms of the pipeline.
///
/// ```text
///   CurvatureRecord ─► extract ─► ModeSignature
///                                     │  + InstrumentSpec, seeded RNG
///                                     ▼
///                                   synth ─► TimeSeries
///                                              │  + SensitivityCurve
///                                              ▼
///                          spectrum ──► detect ─► DetectionResult
/// ```

pub mod detect;
pub mod extract;
pub mod spectrum;
pub mod synth;
