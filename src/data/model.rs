use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{PipelineError, Result};

/// Relative tolerance on the sample spacing of a [`TimeSeries`].
pub const SPACING_TOLERANCE: f64 = 1e-6;

/// Spacing slack in units of the time stamps' own resolution, for series
/// with a large absolute offset (GPS seconds and the like).
const SPACING_ULPS: f64 = 8.0;

// ---------------------------------------------------------------------------
// Record – anything that travels through a line-record file
// ---------------------------------------------------------------------------

/// A typed line record.  `validate` runs at the parse boundary so that
/// downstream numeric code never sees an out-of-range field.
pub trait Record: Serialize + DeserializeOwned {
    /// Label identifying the record within its batch.
    fn label(&self) -> &str;

    /// Check field invariants that serde cannot express.
    fn validate(&self) -> Result<()>;
}

fn require_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(PipelineError::Validation("empty label".into()));
    }
    Ok(())
}

fn require_finite(label: &str, field: &str, v: f64) -> Result<()> {
    if !v.is_finite() {
        return Err(PipelineError::Validation(format!(
            "record '{label}': {field} = {v} is not finite"
        )));
    }
    Ok(())
}

fn require_non_negative(label: &str, field: &str, v: f64) -> Result<()> {
    require_finite(label, field, v)?;
    if v < 0.0 {
        return Err(PipelineError::Validation(format!(
            "record '{label}': {field} = {v} must be >= 0"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CurvatureRecord – exported by the curvature simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvatureRecord {
    pub label: String,
    #[serde(rename = "max_R")]
    pub max_r: f64,
    #[serde(rename = "peak_R")]
    pub peak_r: f64,
    pub constraint_violation: f64,
}

impl Record for CurvatureRecord {
    fn label(&self) -> &str {
        &self.label
    }

    fn validate(&self) -> Result<()> {
        require_label(&self.label)?;
        require_finite(&self.label, "max_R", self.max_r)?;
        require_finite(&self.label, "peak_R", self.peak_r)?;
        require_non_negative(&self.label, "constraint_violation", self.constraint_violation)
    }
}

// ---------------------------------------------------------------------------
// SimulationSummary – per-label simulation metadata
// ---------------------------------------------------------------------------

/// Simulation summary for one label.  Besides the label the schema is open;
/// extra fields are handed untouched to the signature model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub label: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, JsonValue>,
}

impl SimulationSummary {
    /// Numeric field by name, if present and a number.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(JsonValue::as_f64)
    }
}

impl Record for SimulationSummary {
    fn label(&self) -> &str {
        &self.label
    }

    fn validate(&self) -> Result<()> {
        require_label(&self.label)
    }
}

// ---------------------------------------------------------------------------
// ModeSignature – output of extraction, input of synthesis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeSignature {
    pub label: String,
    /// Carrier frequency in Hz.
    pub frequency: f64,
    /// Spectral width in Hz.
    pub width: f64,
    /// Amplitude in strain units.
    pub amplitude: f64,
}

impl Record for ModeSignature {
    fn label(&self) -> &str {
        &self.label
    }

    fn validate(&self) -> Result<()> {
        require_label(&self.label)?;
        require_finite(&self.label, "frequency", self.frequency)?;
        if self.frequency <= 0.0 {
            return Err(PipelineError::Validation(format!(
                "record '{}': frequency = {} must be > 0",
                self.label, self.frequency
            )));
        }
        require_non_negative(&self.label, "width", self.width)?;
        require_non_negative(&self.label, "amplitude", self.amplitude)
    }
}

// ---------------------------------------------------------------------------
// TimeSeries – a frozen, uniformly sampled signal
// ---------------------------------------------------------------------------

/// Uniformly sampled mock detector output.  Built once by the synthesizer
/// (or parsed and validated by the codec) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    label: String,
    #[serde(rename = "time_series")]
    samples: Vec<(f64, f64)>,
}

impl TimeSeries {
    /// Build a validated series.
    pub fn new(label: impl Into<String>, samples: Vec<(f64, f64)>) -> Result<Self> {
        let ts = TimeSeries {
            label: label.into(),
            samples,
        };
        ts.validate()?;
        Ok(ts)
    }

    pub fn samples(&self) -> &[(f64, f64)] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|&(_, v)| v)
    }

    /// Sample rate implied by the spacing (mean over the whole span).
    pub fn sample_rate(&self) -> f64 {
        let n = self.samples.len();
        let span = self.samples[n - 1].0 - self.samples[0].0;
        (n - 1) as f64 / span
    }

    /// Largest absolute sample value.
    pub fn peak_abs(&self) -> f64 {
        self.values().map(f64::abs).fold(0.0, f64::max)
    }
}

impl Record for TimeSeries {
    fn label(&self) -> &str {
        &self.label
    }

    fn validate(&self) -> Result<()> {
        require_label(&self.label)?;
        let label = &self.label;
        if self.samples.len() < 2 {
            return Err(PipelineError::Validation(format!(
                "record '{label}': time series needs at least 2 samples, got {}",
                self.samples.len()
            )));
        }
        for (i, &(t, v)) in self.samples.iter().enumerate() {
            require_finite(label, &format!("time[{i}]"), t)?;
            require_finite(label, &format!("value[{i}]"), v)?;
        }

        let step = self.samples[1].0 - self.samples[0].0;
        if step <= 0.0 {
            return Err(PipelineError::Validation(format!(
                "record '{label}': times must be strictly increasing"
            )));
        }
        let t_abs_max = self
            .samples
            .iter()
            .map(|&(t, _)| t.abs())
            .fold(0.0, f64::max);
        let tolerance = (step * SPACING_TOLERANCE).max(SPACING_ULPS * f64::EPSILON * t_abs_max);
        for (i, pair) in self.samples.windows(2).enumerate() {
            let dt = pair[1].0 - pair[0].0;
            if dt <= 0.0 {
                return Err(PipelineError::Validation(format!(
                    "record '{label}': time[{}] = {} does not increase",
                    i + 1,
                    pair[1].0
                )));
            }
            if (dt - step).abs() > tolerance {
                return Err(PipelineError::Validation(format!(
                    "record '{label}': spacing {dt} at sample {} differs from {step}",
                    i + 1
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DetectionResult – terminal output of the pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub label: String,
    pub snr: f64,
    pub detectable: bool,
    /// Frequency the SNR was measured at; absent for a silent series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_frequency: Option<f64>,
}

impl Record for DetectionResult {
    fn label(&self) -> &str {
        &self.label
    }

    fn validate(&self) -> Result<()> {
        require_label(&self.label)?;
        require_non_negative(&self.label, "snr", self.snr)?;
        if let Some(f) = self.dominant_frequency {
            require_non_negative(&self.label, "dominant_frequency", f)?;
        }
        Ok(())
    }
}
