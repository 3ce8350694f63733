//! Stage runners: read every input, compute, then write both outputs.
//!
//! Outputs go to temporary files next to their destinations and are only
//! persisted once the whole stage has succeeded, so a failing stage leaves
//! no output files behind.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::PipelineConfig;
use crate::data::codec::{read_records, read_text, write_records, Summary};
use crate::data::curve::{self, SensitivityCurve};
use crate::data::instrument::InstrumentSpec;
use crate::data::model::{
    CurvatureRecord, DetectionResult, ModeSignature, SimulationSummary, TimeSeries,
};
use crate::error::{PipelineError, Result};
use crate::signal::detect::DetectabilityEvaluator;
use crate::signal::extract::SignatureExtractor;
use crate::signal::synth::{record_rng, SignalSynthesizer};

/// What a stage produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub records_written: usize,
    pub summary: Summary,
}

// ---------------------------------------------------------------------------
// extract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExtractPaths {
    pub input_json: PathBuf,
    pub input_am: PathBuf,
    pub summary_json: PathBuf,
    pub summary_am: PathBuf,
    pub output_json: PathBuf,
    pub output_am: PathBuf,
}

pub fn run_extract(paths: &ExtractPaths, config: &PipelineConfig) -> Result<StageReport> {
    let curvature: Vec<CurvatureRecord> = read_records(&paths.input_json).read_all()?;
    read_companion(&paths.input_am)?;
    let summaries: Vec<SimulationSummary> = read_records(&paths.summary_json).read_all()?;
    read_companion(&paths.summary_am)?;
    log::info!(
        "Extracting signatures from {} curvature records ({} simulation summaries)",
        curvature.len(),
        summaries.len()
    );

    let extractor = SignatureExtractor::new(
        Box::new(config.extract.linear),
        config.extract.missing_summary,
    );
    let extraction = extractor
        .extract(&curvature, &summaries)
        .map_err(|e| e.within(paths.input_json.display()))?;

    let summary = Summary::new()
        .line("TheoryVariant", &config.extract.theory_variant)
        .line("SignatureModel", extractor.model_name())
        .line("NumSignatures", extraction.signatures.len())
        .line("NumSkipped", extraction.skipped.len());

    commit(&extraction.signatures, summary, &paths.output_json, &paths.output_am)
}

// ---------------------------------------------------------------------------
// synthesize
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SynthesizePaths {
    pub signatures_json: PathBuf,
    pub signatures_am: PathBuf,
    pub instr_am: PathBuf,
    pub output_json: PathBuf,
    pub output_am: PathBuf,
}

/// Synthesize every signature; record `i` draws from RNG stream `i`.
pub fn synthesize_all(
    signatures: &[ModeSignature],
    spec: &InstrumentSpec,
    synth: &SignalSynthesizer,
    seed: u64,
    parallel: bool,
) -> Result<Vec<TimeSeries>> {
    map_records(signatures, parallel, |i, sig| {
        synth
            .synthesize(sig, spec, &mut record_rng(seed, i))
            .map_err(|e| e.within(format!("label '{}'", sig.label)))
    })
}

pub fn run_synthesize(paths: &SynthesizePaths, config: &PipelineConfig) -> Result<StageReport> {
    let signatures: Vec<ModeSignature> = read_records(&paths.signatures_json).read_all()?;
    read_companion(&paths.signatures_am)?;
    let spec = InstrumentSpec::load(&paths.instr_am)?;
    log::info!(
        "Synthesizing {} signals at {} Hz for {} s (noise floor {})",
        signatures.len(),
        spec.sample_rate,
        spec.duration,
        spec.noise_floor
    );

    let synth = SignalSynthesizer::new(config.synthesize.envelope);
    let seed = config.synthesize.seed;
    let series = synthesize_all(&signatures, &spec, &synth, seed, config.parallel)
        .map_err(|e| e.within(paths.signatures_json.display()))?;

    let summary = Summary::new()
        .blob("InstrumentSpec", spec.raw.clone())
        .line("Seed", seed)
        .line("Envelope", synth.envelope().name())
        .line("NumSignals", series.len());

    commit(&series, summary, &paths.output_json, &paths.output_am)
}

// ---------------------------------------------------------------------------
// evaluate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EvaluatePaths {
    pub mock_json: PathBuf,
    pub mock_am: PathBuf,
    pub sens_am: PathBuf,
    pub output_json: PathBuf,
    pub output_am: PathBuf,
}

pub fn evaluate_all(
    series: &[TimeSeries],
    curve: &SensitivityCurve,
    evaluator: &DetectabilityEvaluator,
    parallel: bool,
) -> Result<Vec<DetectionResult>> {
    map_records(series, parallel, |_, ts| evaluator.evaluate(ts, curve))
}

pub fn run_evaluate(paths: &EvaluatePaths, config: &PipelineConfig) -> Result<StageReport> {
    let series: Vec<TimeSeries> = read_records(&paths.mock_json).read_all()?;
    read_companion(&paths.mock_am)?;
    let curve = curve::load(&paths.sens_am)?;
    let evaluator = DetectabilityEvaluator::new(config.evaluate.threshold, config.evaluate.window)?;
    log::info!(
        "Evaluating {} signals (threshold {}, {} window)",
        series.len(),
        evaluator.threshold(),
        evaluator.window().name()
    );

    let results = evaluate_all(&series, &curve, &evaluator, config.parallel)
        .map_err(|e| e.within(paths.mock_json.display()))?;
    let detectable = results.iter().filter(|r| r.detectable).count();

    let summary = Summary::new()
        .blob("DetectionThresholds", curve.render())
        .line("Threshold", evaluator.threshold())
        .line("Window", evaluator.window().name())
        .line("NumChecked", results.len())
        .line("NumDetectable", detectable);

    commit(&results, summary, &paths.output_json, &paths.output_am)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Companion summaries are provenance only, but they must be readable.
fn read_companion(path: &Path) -> Result<()> {
    let text = read_text(path)?;
    log::debug!("{}: {} bytes of provenance", path.display(), text.len());
    Ok(())
}

/// Map every record, optionally across the rayon pool.  Output keeps input
/// order, and on failure the error of the lowest failing index is returned.
fn map_records<T, U, F>(items: &[T], parallel: bool, f: F) -> Result<Vec<U>>
where
    T: Sync,
    U: Send,
    F: Fn(usize, &T) -> Result<U> + Sync,
{
    let results: Vec<Result<U>> = if parallel {
        items.par_iter().enumerate().map(|(i, t)| f(i, t)).collect()
    } else {
        items.iter().enumerate().map(|(i, t)| f(i, t)).collect()
    };
    results.into_iter().collect()
}

fn temp_beside(path: &Path) -> Result<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(dir, e))
}

/// Write records and summary to temporaries, then move both into place.
fn commit<T: Serialize>(
    records: &[T],
    summary: Summary,
    json_path: &Path,
    am_path: &Path,
) -> Result<StageReport> {
    let mut json_tmp = temp_beside(json_path)?;
    let written = write_records(records, BufWriter::new(json_tmp.as_file_mut()))
        .map_err(|e| PipelineError::io(json_path, e))?;

    let mut am_tmp = temp_beside(am_path)?;
    summary
        .write_to(BufWriter::new(am_tmp.as_file_mut()))
        .map_err(|e| PipelineError::io(am_path, e))?;

    // summary first: a failure there leaves any earlier record file intact
    am_tmp
        .persist(am_path)
        .map_err(|e| PipelineError::io(am_path, e.error))?;
    json_tmp
        .persist(json_path)
        .map_err(|e| PipelineError::io(json_path, e.error))?;

    log::info!(
        "Wrote {written} records to {} and summary to {}",
        json_path.display(),
        am_path.display()
    );
    Ok(StageReport {
        records_written: written,
        summary,
    })
}
