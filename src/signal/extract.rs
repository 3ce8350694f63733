use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::data::model::{CurvatureRecord, ModeSignature, Record, SimulationSummary};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// SignatureModel – pluggable curvature → mode mapping
// ---------------------------------------------------------------------------

/// Physical parameters of one mode, before they are attached to a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeParameters {
    pub frequency: f64,
    pub width: f64,
    pub amplitude: f64,
}

/// Maps a curvature record (and its simulation summary) to mode parameters.
///
/// Extraction plumbing only ever sees this trait, so a physically validated
/// model can replace [`LinearScaling`] without touching the rest of the
/// pipeline.
pub trait SignatureModel: Send + Sync {
    /// Name written into the stage summary.
    fn name(&self) -> &str;

    fn derive(&self, record: &CurvatureRecord, summary: &SimulationSummary) -> Result<ModeParameters>;
}

/// Linear scaling of curvature extrema:
/// `frequency = max_R · a`, `width = peak_R · b`, `amplitude = violation · c`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearScaling {
    pub frequency_per_max_r: f64,
    pub width_per_peak_r: f64,
    pub amplitude_per_violation: f64,
}

impl Default for LinearScaling {
    fn default() -> Self {
        Self {
            frequency_per_max_r: 0.1,
            width_per_peak_r: 0.05,
            amplitude_per_violation: 0.01,
        }
    }
}

impl SignatureModel for LinearScaling {
    fn name(&self) -> &str {
        "linear-scaling"
    }

    fn derive(&self, record: &CurvatureRecord, _summary: &SimulationSummary) -> Result<ModeParameters> {
        Ok(ModeParameters {
            frequency: record.max_r * self.frequency_per_max_r,
            width: record.peak_r * self.width_per_peak_r,
            amplitude: record.constraint_violation * self.amplitude_per_violation,
        })
    }
}

// ---------------------------------------------------------------------------
// SignatureExtractor
// ---------------------------------------------------------------------------

/// What to do with a curvature label that has no simulation summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSummaryPolicy {
    #[default]
    Fail,
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Signatures in curvature-record order.
    pub signatures: Vec<ModeSignature>,
    /// Labels dropped under [`MissingSummaryPolicy::Skip`].
    pub skipped: Vec<String>,
}

pub struct SignatureExtractor {
    model: Box<dyn SignatureModel>,
    policy: MissingSummaryPolicy,
}

impl SignatureExtractor {
    pub fn new(model: Box<dyn SignatureModel>, policy: MissingSummaryPolicy) -> Self {
        Self { model, policy }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn extract(
        &self,
        curvature: &[CurvatureRecord],
        summaries: &[SimulationSummary],
    ) -> Result<Extraction> {
        let mut by_label: HashMap<&str, &SimulationSummary> = HashMap::with_capacity(summaries.len());
        for s in summaries {
            if by_label.insert(s.label.as_str(), s).is_some() {
                return Err(PipelineError::Validation(format!(
                    "simulation summary label '{}' appears more than once",
                    s.label
                )));
            }
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(curvature.len());
        let mut out = Extraction::default();

        for record in curvature {
            let label = record.label.as_str();
            if !seen.insert(label) {
                return Err(PipelineError::Validation(format!(
                    "curvature label '{label}' appears more than once"
                )));
            }

            let Some(summary) = by_label.get(label) else {
                match self.policy {
                    MissingSummaryPolicy::Fail => {
                        return Err(PipelineError::Validation(format!(
                            "label '{label}' has no simulation summary"
                        )))
                    }
                    MissingSummaryPolicy::Skip => {
                        log::warn!("Skipping label '{label}': no simulation summary");
                        out.skipped.push(label.to_string());
                        continue;
                    }
                }
            };

            let params = self
                .model
                .derive(record, summary)
                .map_err(|e| e.within(format!("label '{label}'")))?;
            let signature = ModeSignature {
                label: label.to_string(),
                frequency: params.frequency,
                width: params.width,
                amplitude: params.amplitude,
            };
            signature.validate()?;
            log::debug!(
                "{label}: f = {} Hz, width = {} Hz, amplitude = {}",
                signature.frequency,
                signature.width,
                signature.amplitude
            );
            out.signatures.push(signature);
        }

        Ok(out)
    }
}
