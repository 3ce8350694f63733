use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Float32Array, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use mockwave::data::curve;
use mockwave::stage::{
    run_evaluate, run_extract, run_synthesize, EvaluatePaths, ExtractPaths, SynthesizePaths,
};
use mockwave::{
    read_records, DetectionResult, ModeSignature, PipelineConfig, PipelineError, Record,
    TimeSeries,
};

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn synth_paths(dir: &TempDir, signatures: &str, instrument: &str) -> SynthesizePaths {
    SynthesizePaths {
        signatures_json: write(dir, "signatures.ndjson", signatures),
        signatures_am: write(dir, "signatures.am", "NumSignatures: 1\n"),
        instr_am: write(dir, "instrument.am", instrument),
        output_json: dir.path().join("mock_data.ndjson"),
        output_am: dir.path().join("mock_data.am"),
    }
}

fn eval_paths(dir: &TempDir, mock_json: &Path, curve_name: &str, curve_text: &str) -> EvaluatePaths {
    EvaluatePaths {
        mock_json: mock_json.to_path_buf(),
        mock_am: write(dir, "mock_data_in.am", "NumSignals: 1\n"),
        sens_am: write(dir, curve_name, curve_text),
        output_json: dir.path().join("sensitivity_comparison.ndjson"),
        output_am: dir.path().join("sensitivity_comparison.am"),
    }
}

const SIGNATURE_A: &str = "{\"label\":\"A\",\"frequency\":50.0,\"width\":1.0,\"amplitude\":2.0}\n";
const QUIET_INSTRUMENT: &str = "sample_rate: 200\nduration: 1.0\nnoise_floor: 0.0\n";

#[test]
fn end_to_end_single_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();

    let paths = synth_paths(&dir, SIGNATURE_A, QUIET_INSTRUMENT);
    let report = run_synthesize(&paths, &config).unwrap();
    assert_eq!(report.records_written, 1);

    let series: Vec<TimeSeries> = read_records(&paths.output_json).read_all().unwrap();
    assert_eq!(series.len(), 1);
    let ts = &series[0];
    assert_eq!(ts.label(), "A");
    assert_eq!(ts.len(), 200);
    assert!((ts.peak_abs() - 2.0).abs() < 1e-9);
    for &(t, v) in ts.samples() {
        let phase = (2.0 * std::f64::consts::PI * 50.0 * t).sin();
        if (phase - 1.0).abs() < 1e-9 {
            assert!((v - 2.0).abs() < 1e-9, "t = {t}: {v}");
        }
    }
    let summary = std::fs::read_to_string(&paths.output_am).unwrap();
    assert!(summary.starts_with("InstrumentSpec:\nsample_rate: 200\n"));
    assert!(summary.contains("NumSignals: 1\n"));

    let eval = eval_paths(&dir, &paths.output_json, "flat.am", "1 1.0\n100 1.0\n");
    run_evaluate(&eval, &config).unwrap();
    let results: Vec<DetectionResult> = read_records(&eval.output_json).read_all().unwrap();
    assert_eq!(results.len(), 1);
    assert!((results[0].snr - 2.0).abs() < 1e-9, "{}", results[0].snr);
    assert!(results[0].detectable);

    let summary = std::fs::read_to_string(&eval.output_am).unwrap();
    assert!(summary.starts_with("DetectionThresholds:\n1 1\n100 1\n"));
    assert!(summary.contains("NumChecked: 1\n"));
    assert!(summary.contains("NumDetectable: 1\n"));
}

#[test]
fn empty_input_succeeds_with_zero_records() {
    let dir = tempfile::tempdir().unwrap();
    let paths = synth_paths(&dir, "", QUIET_INSTRUMENT);
    let report = run_synthesize(&paths, &PipelineConfig::default()).unwrap();
    assert_eq!(report.records_written, 0);
    assert_eq!(std::fs::read_to_string(&paths.output_json).unwrap(), "");
    assert!(std::fs::read_to_string(&paths.output_am)
        .unwrap()
        .contains("NumSignals: 0\n"));
}

#[test]
fn domain_violation_fails_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();
    let paths = synth_paths(
        &dir,
        "{\"label\":\"high\",\"frequency\":2000.0,\"width\":0.0,\"amplitude\":1.0}\n",
        "sample_rate: 8000\nduration: 1.0\nnoise_floor: 0.0\n",
    );
    run_synthesize(&paths, &config).unwrap();

    let eval = eval_paths(&dir, &paths.output_json, "curve.am", "10 1.0\n1000 1.0\n");
    let err = run_evaluate(&eval, &config).unwrap_err();
    assert!(matches!(err, PipelineError::Range(_)), "{err}");
    assert!(err.to_string().contains("'high'"));
    assert!(!eval.output_json.exists());
    assert!(!eval.output_am.exists());
}

#[test]
fn bad_instrument_spec_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let paths = synth_paths(&dir, SIGNATURE_A, "sample_rate: 0\nduration: 1.0\nnoise_floor: 0\n");
    let err = run_synthesize(&paths, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)), "{err}");
    assert!(!paths.output_json.exists());
}

#[test]
fn malformed_signature_file_aborts_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let paths = synth_paths(&dir, &format!("{SIGNATURE_A}{{\"label\": \"B\",\n"), QUIET_INSTRUMENT);
    let err = run_synthesize(&paths, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Format(_)), "{err}");
    assert!(!paths.output_json.exists());
    assert!(!paths.output_am.exists());
}

#[test]
fn existing_outputs_survive_a_failed_run() {
    let dir = tempfile::tempdir().unwrap();
    let paths = synth_paths(&dir, "not json\n", QUIET_INSTRUMENT);
    std::fs::write(&paths.output_json, "previous\n").unwrap();
    assert!(run_synthesize(&paths, &PipelineConfig::default()).is_err());
    assert_eq!(std::fs::read_to_string(&paths.output_json).unwrap(), "previous\n");
}

#[test]
fn extract_then_synthesize_then_evaluate() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();

    let extract = ExtractPaths {
        input_json: write(
            &dir,
            "strong_curvature.ndjson",
            "{\"label\":\"A\",\"max_R\":500.0,\"peak_R\":20.0,\"constraint_violation\":200.0}\n\
             {\"label\":\"B\",\"max_R\":300.0,\"peak_R\":10.0,\"constraint_violation\":10.0}\n",
        ),
        input_am: write(&dir, "strong_curvature.am", "Source: test\n"),
        summary_json: write(
            &dir,
            "simulation_summary.ndjson",
            "{\"label\":\"B\",\"steps\":10}\n{\"label\":\"A\",\"steps\":20}\n",
        ),
        summary_am: write(&dir, "simulation_summary.am", "Source: test\n"),
        output_json: dir.path().join("signatures.ndjson"),
        output_am: dir.path().join("signatures.am"),
    };
    run_extract(&extract, &config).unwrap();
    let sigs: Vec<ModeSignature> = read_records(&extract.output_json).read_all().unwrap();
    let labels: Vec<&str> = sigs.iter().map(|s| s.label()).collect();
    assert_eq!(labels, vec!["A", "B"]);
    assert_eq!(sigs[0].frequency, 50.0);
    let summary = std::fs::read_to_string(&extract.output_am).unwrap();
    assert!(summary.contains("TheoryVariant: warp-curvature\n"));
    assert!(summary.contains("NumSignatures: 2\n"));

    let synth = SynthesizePaths {
        signatures_json: extract.output_json.clone(),
        signatures_am: extract.output_am.clone(),
        instr_am: write(&dir, "instrument.am", QUIET_INSTRUMENT),
        output_json: dir.path().join("mock_data.ndjson"),
        output_am: dir.path().join("mock_data.am"),
    };
    run_synthesize(&synth, &config).unwrap();

    let eval = EvaluatePaths {
        mock_json: synth.output_json.clone(),
        mock_am: synth.output_am.clone(),
        sens_am: write(&dir, "sensitivity.csv", "frequency,noise_amplitude\n1,1.0\n100,1.0\n"),
        output_json: dir.path().join("results.ndjson"),
        output_am: dir.path().join("results.am"),
    };
    run_evaluate(&eval, &config).unwrap();
    let results: Vec<DetectionResult> = read_records(&eval.output_json).read_all().unwrap();
    assert_eq!(results[0].label, "A");
    assert!(results[0].detectable);
    // B: amplitude 0.1 at 30 Hz
    assert_eq!(results[1].label, "B");
    assert!((results[1].snr - 0.1).abs() < 1e-9);
    assert!(!results[1].detectable);
}

#[test]
fn extract_missing_summary_fails_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let extract = ExtractPaths {
        input_json: write(
            &dir,
            "c.ndjson",
            "{\"label\":\"A\",\"max_R\":500.0,\"peak_R\":20.0,\"constraint_violation\":200.0}\n",
        ),
        input_am: write(&dir, "c.am", ""),
        summary_json: write(&dir, "s.ndjson", ""),
        summary_am: write(&dir, "s.am", ""),
        output_json: dir.path().join("o.ndjson"),
        output_am: dir.path().join("o.am"),
    };
    let err = run_extract(&extract, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(!extract.output_json.exists());
}

#[test]
fn parquet_curve_loads_float64_and_float32() {
    let dir = tempfile::tempdir().unwrap();

    let path64 = dir.path().join("curve64.parquet");
    let schema = Arc::new(Schema::new(vec![
        Field::new("frequency", DataType::Float64, false),
        Field::new("noise_amplitude", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(vec![10.0, 100.0, 1000.0])),
            Arc::new(Float64Array::from(vec![1.0, 0.1, 0.5])),
        ],
    )
    .unwrap();
    let mut writer = ArrowWriter::try_new(std::fs::File::create(&path64).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let c = curve::load(&path64).unwrap();
    assert_eq!(c.domain(), (10.0, 1000.0));
    assert_eq!(c.lookup(100.0).unwrap(), 0.1);

    let path32 = dir.path().join("curve32.parquet");
    let schema = Arc::new(Schema::new(vec![
        Field::new("frequency", DataType::Float32, false),
        Field::new("noise_amplitude", DataType::Float32, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float32Array::from(vec![10.0f32, 20.0])),
            Arc::new(Float32Array::from(vec![2.0f32, 4.0])),
        ],
    )
    .unwrap();
    let mut writer = ArrowWriter::try_new(std::fs::File::create(&path32).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    assert_eq!(curve::load(&path32).unwrap().lookup(20.0).unwrap(), 4.0);
}

#[test]
fn non_monotonic_curve_file_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "bad.am", "100 1.0\n10 1.0\n");
    let err = curve::load(&path).unwrap_err();
    assert!(matches!(err, PipelineError::Format(_)), "{err}");
    assert!(err.to_string().contains("bad.am"));
}
