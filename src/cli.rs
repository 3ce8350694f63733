use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{PipelineConfig, CONFIG_ENV};
use crate::error::Result;
use crate::signal::extract::MissingSummaryPolicy;
use crate::signal::spectrum::Window;
use crate::signal::synth::Envelope;
use crate::stage::{EvaluatePaths, ExtractPaths, SynthesizePaths};

#[derive(Debug, Parser)]
#[command(name = "mockwave", version, about = "Mock detector signal synthesis and detectability pipeline")]
pub struct Cli {
    /// Pipeline config file (TOML)
    #[arg(long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Process records on a single thread
    #[arg(long, global = true)]
    pub no_parallel: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compute mode signatures from curvature records and simulation summaries
    Extract(ExtractArgs),
    /// Generate mock detector time-series from signatures
    Synthesize(SynthesizeArgs),
    /// Compare mock signals against a sensitivity curve
    Evaluate(EvaluateArgs),
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    #[arg(long)]
    pub input_json: PathBuf,
    #[arg(long)]
    pub input_am: PathBuf,
    #[arg(long)]
    pub summary_json: PathBuf,
    #[arg(long)]
    pub summary_am: PathBuf,
    #[arg(long)]
    pub output_json: PathBuf,
    #[arg(long)]
    pub output_am: PathBuf,

    /// Drop labels without a simulation summary instead of failing
    #[arg(long)]
    pub skip_missing: bool,
}

#[derive(Debug, Args)]
pub struct SynthesizeArgs {
    #[arg(long)]
    pub signatures_json: PathBuf,
    #[arg(long)]
    pub signatures_am: PathBuf,
    /// Instrument spec (sample_rate, duration, noise_floor)
    #[arg(long)]
    pub instr_am: PathBuf,
    #[arg(long)]
    pub output_json: PathBuf,
    #[arg(long)]
    pub output_am: PathBuf,

    /// Noise RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum)]
    pub envelope: Option<Envelope>,
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub mock_json: PathBuf,
    #[arg(long)]
    pub mock_am: PathBuf,
    /// Sensitivity curve (.am/.txt, .csv, .ndjson or .parquet)
    #[arg(long)]
    pub sens_am: PathBuf,
    #[arg(long)]
    pub output_json: PathBuf,
    #[arg(long)]
    pub output_am: PathBuf,

    /// Minimum SNR for a detection (inclusive)
    #[arg(long)]
    pub threshold: Option<f64>,

    #[arg(long, value_enum)]
    pub window: Option<Window>,
}

impl Cli {
    /// Config file (if any) with command-line overrides applied.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::resolve(self.config.as_deref())?;
        if self.no_parallel {
            config.parallel = false;
        }
        match &self.command {
            Commands::Extract(args) => {
                if args.skip_missing {
                    config.extract.missing_summary = MissingSummaryPolicy::Skip;
                }
            }
            Commands::Synthesize(args) => {
                if let Some(seed) = args.seed {
                    config.synthesize.seed = seed;
                }
                if let Some(envelope) = args.envelope {
                    config.synthesize.envelope = envelope;
                }
            }
            Commands::Evaluate(args) => {
                if let Some(threshold) = args.threshold {
                    config.evaluate.threshold = threshold;
                }
                if let Some(window) = args.window {
                    config.evaluate.window = window;
                }
            }
        }
        Ok(config)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

impl From<ExtractArgs> for ExtractPaths {
    fn from(a: ExtractArgs) -> Self {
        ExtractPaths {
            input_json: a.input_json,
            input_am: a.input_am,
            summary_json: a.summary_json,
            summary_am: a.summary_am,
            output_json: a.output_json,
            output_am: a.output_am,
        }
    }
}

impl From<SynthesizeArgs> for SynthesizePaths {
    fn from(a: SynthesizeArgs) -> Self {
        SynthesizePaths {
            signatures_json: a.signatures_json,
            signatures_am: a.signatures_am,
            instr_am: a.instr_am,
            output_json: a.output_json,
            output_am: a.output_am,
        }
    }
}

impl From<EvaluateArgs> for EvaluatePaths {
    fn from(a: EvaluateArgs) -> Self {
        EvaluatePaths {
            mock_json: a.mock_json,
            mock_am: a.mock_am,
            sens_am: a.sens_am,
            output_json: a.output_json,
            output_am: a.output_am,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_defaults() {
        let cli = Cli::try_parse_from([
            "mockwave",
            "--no-parallel",
            "evaluate",
            "--mock-json", "m.ndjson",
            "--mock-am", "m.am",
            "--sens-am", "s.am",
            "--output-json", "o.ndjson",
            "--output-am", "o.am",
            "--threshold", "2.5",
            "--window", "hann",
        ])
        .unwrap();
        let config = cli.pipeline_config().unwrap();
        assert!(!config.parallel);
        assert_eq!(config.evaluate.threshold, 2.5);
        assert_eq!(config.evaluate.window, Window::Hann);
    }

    #[test]
    fn missing_required_output_is_rejected() {
        let parsed = Cli::try_parse_from([
            "mockwave",
            "synthesize",
            "--signatures-json", "s.ndjson",
            "--signatures-am", "s.am",
            "--instr-am", "i.am",
            "--output-json", "o.ndjson",
        ]);
        assert!(parsed.is_err());
    }
}
