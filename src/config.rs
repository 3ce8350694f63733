use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::signal::detect::DEFAULT_THRESHOLD;
use crate::signal::extract::{LinearScaling, MissingSummaryPolicy};
use crate::signal::spectrum::Window;
use crate::signal::synth::Envelope;

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "MOCKWAVE_CONFIG";

// ---------------------------------------------------------------------------
// PipelineConfig – optional TOML file, every field defaulted
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Map records across a rayon pool in synthesis and evaluation.
    pub parallel: bool,
    pub extract: ExtractConfig,
    pub synthesize: SynthesizeConfig,
    pub evaluate: EvaluateConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            extract: ExtractConfig::default(),
            synthesize: SynthesizeConfig::default(),
            evaluate: EvaluateConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    pub missing_summary: MissingSummaryPolicy,
    /// Free-form theory name echoed into the summary.
    pub theory_variant: String,
    pub linear: LinearScaling,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            missing_summary: MissingSummaryPolicy::default(),
            theory_variant: "warp-curvature".to_string(),
            linear: LinearScaling::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesizeConfig {
    pub seed: u64,
    pub envelope: Envelope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluateConfig {
    pub threshold: f64,
    pub window: Window,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window: Window::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config = Self::from_toml(&text).map_err(|e| e.within(path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Config from `path`, else from `$MOCKWAVE_CONFIG`, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(p) if !p.is_empty() => Self::load(Path::new(&p)),
                _ => Ok(Self::default()),
            },
        }
    }
}
