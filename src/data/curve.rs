use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Float32Array, Float64Array};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// SensitivityCurve – frequency → noise amplitude spectral density
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub frequency: f64,
    pub noise_amplitude: f64,
}

/// A validated instrument sensitivity curve.  Points are strictly increasing
/// in frequency and every value is finite and positive.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityCurve {
    points: Vec<CurvePoint>,
}

impl SensitivityCurve {
    pub fn from_points(points: Vec<CurvePoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(PipelineError::Format("sensitivity curve has no points".into()));
        }
        for (i, p) in points.iter().enumerate() {
            if !(p.frequency.is_finite() && p.frequency > 0.0) {
                return Err(PipelineError::Format(format!(
                    "point {i}: frequency {} must be finite and > 0",
                    p.frequency
                )));
            }
            if !(p.noise_amplitude.is_finite() && p.noise_amplitude > 0.0) {
                return Err(PipelineError::Format(format!(
                    "point {i}: noise amplitude {} must be finite and > 0",
                    p.noise_amplitude
                )));
            }
        }
        if let Some(i) = points
            .windows(2)
            .position(|w| w[1].frequency <= w[0].frequency)
        {
            return Err(PipelineError::Format(format!(
                "frequencies not strictly increasing at point {}: {} after {}",
                i + 1,
                points[i + 1].frequency,
                points[i].frequency
            )));
        }
        Ok(SensitivityCurve { points })
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Inclusive frequency domain `(f_min, f_max)`.
    pub fn domain(&self) -> (f64, f64) {
        (
            self.points[0].frequency,
            self.points[self.points.len() - 1].frequency,
        )
    }

    /// Noise amplitude at `frequency`, interpolated linearly in log-log
    /// space between the bracketing points.  Outside the curve's domain this
    /// is a [`PipelineError::Range`]; values are never clamped.
    pub fn lookup(&self, frequency: f64) -> Result<f64> {
        let (f_min, f_max) = self.domain();
        if !frequency.is_finite() || frequency < f_min || frequency > f_max {
            return Err(PipelineError::Range(format!(
                "frequency {frequency} Hz outside sensitivity curve domain [{f_min}, {f_max}] Hz"
            )));
        }

        let idx = self.points.partition_point(|p| p.frequency < frequency);
        let hi = self.points[idx];
        if hi.frequency == frequency {
            return Ok(hi.noise_amplitude);
        }
        // frequency > f_min, so idx >= 1
        let lo = self.points[idx - 1];

        let t = (frequency.ln() - lo.frequency.ln()) / (hi.frequency.ln() - lo.frequency.ln());
        let log_a = lo.noise_amplitude.ln() + t * (hi.noise_amplitude.ln() - lo.noise_amplitude.ln());
        Ok(log_a.exp())
    }

    /// Two-column text rendering, used in summaries.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for p in &self.points {
            let _ = writeln!(out, "{} {}", p.frequency, p.noise_amplitude);
        }
        out
    }
}

/// Interpolated noise amplitude of `curve` at `frequency`.
pub fn lookup(curve: &SensitivityCurve, frequency: f64) -> Result<f64> {
    curve.lookup(frequency)
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a sensitivity curve from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `frequency` and `noise_amplitude` Float64/Float32 columns
/// * `.json` / `.ndjson` / `.jsonl` – one `{"frequency", "noise_amplitude"}`
///   object per line, or a single top-level array of them
/// * `.csv` – header row with `frequency` and `noise_amplitude` columns
/// * anything else – two whitespace- or comma-separated numeric columns
pub fn load(path: &Path) -> Result<SensitivityCurve> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let points = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" | "ndjson" | "jsonl" => load_json(path),
        "csv" => load_csv(path),
        _ => {
            let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
            parse_text(&text)
        }
    }
    .map_err(|e| e.within(path.display()))?;

    let curve = SensitivityCurve::from_points(points).map_err(|e| e.within(path.display()))?;
    let (f_min, f_max) = curve.domain();
    log::info!(
        "Loaded sensitivity curve {} ({} points, {f_min}–{f_max} Hz)",
        path.display(),
        curve.points().len()
    );
    Ok(curve)
}

// ---------------------------------------------------------------------------
// Plain-text loader
// ---------------------------------------------------------------------------

/// Two numeric columns per line.  Blank lines and `#`/`%` comments are
/// skipped; a leading non-numeric line is taken as a header.
pub fn parse_text(text: &str) -> Result<Vec<CurvePoint>> {
    let mut points = Vec::new();
    let mut seen_data = false;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            continue;
        }
        let tokens: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();

        let parsed: Option<(f64, f64)> = match tokens.as_slice() {
            [f, a, ..] => f.parse().ok().zip(a.parse().ok()),
            _ => None,
        };
        match parsed {
            Some((frequency, noise_amplitude)) => {
                seen_data = true;
                points.push(CurvePoint {
                    frequency,
                    noise_amplitude,
                });
            }
            None if !seen_data => continue,
            None => {
                return Err(PipelineError::Format(format!(
                    "line {}: expected two numbers, got '{line}'",
                    line_no + 1
                )))
            }
        }
    }
    Ok(points)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<Vec<CurvePoint>> {
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;

    if text.trim_start().starts_with('[') {
        return serde_json::from_str(&text)
            .map_err(|e| PipelineError::Format(format!("parsing JSON array: {e}")));
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<CurvePoint>(line)
                .map_err(|e| PipelineError::Format(format!("line {}: {e}", i + 1)))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

const FREQUENCY_COLUMNS: &[&str] = &["frequency", "freq", "f"];
const AMPLITUDE_COLUMNS: &[&str] = &["noise_amplitude", "asd", "noise"];

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim().to_ascii_lowercase().as_str()))
}

/// CSV layout: header row, `frequency` and `noise_amplitude` columns
/// (aliases `freq`/`f` and `asd`/`noise`).  Other columns are ignored.
fn load_csv(path: &Path) -> Result<Vec<CurvePoint>> {
    let csv_err = |e: csv::Error| PipelineError::Format(format!("CSV: {e}"));

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let f_idx = find_column(&headers, FREQUENCY_COLUMNS)
        .ok_or_else(|| PipelineError::Format("CSV missing 'frequency' column".into()))?;
    let a_idx = find_column(&headers, AMPLITUDE_COLUMNS)
        .ok_or_else(|| PipelineError::Format("CSV missing 'noise_amplitude' column".into()))?;

    let mut points = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(csv_err)?;
        // file line, header included
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(row_no as u64 + 2);
        let cell = |idx: usize, col: &str| -> Result<f64> {
            let raw = record.get(idx).unwrap_or("");
            raw.trim().parse::<f64>().map_err(|_| {
                PipelineError::Format(format!("CSV line {line}, {col}: '{raw}' is not a number"))
            })
        };
        points.push(CurvePoint {
            frequency: cell(f_idx, "frequency")?,
            noise_amplitude: cell(a_idx, "noise_amplitude")?,
        });
    }
    Ok(points)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Expected schema: `frequency` and `noise_amplitude`, each Float64 or
/// Float32.  Other columns are ignored.
fn load_parquet(path: &Path) -> Result<Vec<CurvePoint>> {
    let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| PipelineError::Format(format!("reading parquet metadata: {e}")))?;
    let reader = builder
        .build()
        .map_err(|e| PipelineError::Format(format!("building parquet reader: {e}")))?;

    let mut points = Vec::new();

    for batch_result in reader {
        let batch = batch_result
            .map_err(|e| PipelineError::Format(format!("reading parquet record batch: {e}")))?;
        let schema = batch.schema();

        let column = |name: &str| -> Result<Vec<f64>> {
            let idx = schema.index_of(name).map_err(|_| {
                PipelineError::Format(format!("parquet file missing '{name}' column"))
            })?;
            extract_f64_column(batch.column(idx), name)
        };
        let freqs = column("frequency")?;
        let amps = column("noise_amplitude")?;

        points.extend(
            freqs
                .into_iter()
                .zip(amps)
                .map(|(frequency, noise_amplitude)| CurvePoint {
                    frequency,
                    noise_amplitude,
                }),
        );
    }

    Ok(points)
}

/// Extract a numeric column as `Vec<f64>`; nulls are a format error.
fn extract_f64_column(col: &Arc<dyn Array>, name: &str) -> Result<Vec<f64>> {
    if col.null_count() > 0 {
        return Err(PipelineError::Format(format!("column '{name}' contains nulls")));
    }
    match col.data_type() {
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| PipelineError::Format(format!("column '{name}': expected Float64Array")))?;
            Ok(arr.values().iter().copied().collect())
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| PipelineError::Format(format!("column '{name}': expected Float32Array")))?;
            Ok(arr.values().iter().map(|&v| v as f64).collect())
        }
        other => Err(PipelineError::Format(format!(
            "column '{name}' is {other:?}, expected Float64 or Float32"
        ))),
    }
}
