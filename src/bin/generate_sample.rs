use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::Float64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use mockwave::{write_records, CurvatureRecord, SimulationSummary};

/// Bucket-shaped noise amplitude: seismic wall below `f0`, shot noise above.
fn bucket_noise(f: f64, f0: f64, floor: f64) -> f64 {
    let x = f / f0;
    floor * (x.powi(-4) + 2.0 + 2.0 * x * x).sqrt() / 2.0
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

fn write_curve_parquet(path: &Path, freqs: &[f64], amps: &[f64]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("frequency", DataType::Float64, false),
        Field::new("noise_amplitude", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(freqs.to_vec())),
            Arc::new(Float64Array::from(amps.to_vec())),
        ],
    )
    .context("building record batch")?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn write_curve_csv(path: &Path, freqs: &[f64], amps: &[f64]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["frequency", "noise_amplitude"])?;
    for (f, a) in freqs.iter().zip(amps) {
        writer.write_record([f.to_string(), a.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let jitter = Normal::new(1.0, 0.05).context("jitter distribution")?;

    // (label, max_R, peak_R, constraint_violation)
    let modes = [
        ("warp_a", 400.0, 20.0, 150.0),
        ("warp_b", 900.0, 35.0, 60.0),
        ("warp_c", 1500.0, 10.0, 400.0),
        ("warp_d", 2600.0, 60.0, 25.0),
    ];

    let curvature: Vec<CurvatureRecord> = modes
        .iter()
        .map(|&(label, max_r, peak_r, violation)| CurvatureRecord {
            label: label.to_string(),
            max_r: max_r * jitter.sample(&mut rng),
            peak_r: peak_r * jitter.sample(&mut rng),
            constraint_violation: violation * jitter.sample(&mut rng),
        })
        .collect();

    let summaries: Vec<SimulationSummary> = curvature
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            let mut s = SimulationSummary {
                label: rec.label.clone(),
                fields: Default::default(),
            };
            s.fields.insert("steps".into(), serde_json::json!(1000 * (i + 1)));
            s.fields.insert("converged".into(), serde_json::json!(true));
            s
        })
        .collect();

    let curvature_path = out_dir.join("strong_curvature.ndjson");
    let file = File::create(&curvature_path).with_context(|| format!("creating {}", curvature_path.display()))?;
    write_records(&curvature, BufWriter::new(file)).context("writing curvature records")?;
    write_text(&out_dir.join("strong_curvature.am"), "Source: generate_sample\nSeed: 42\n")?;

    let summary_path = out_dir.join("simulation_summary.ndjson");
    let file = File::create(&summary_path).with_context(|| format!("creating {}", summary_path.display()))?;
    write_records(&summaries, BufWriter::new(file)).context("writing simulation summaries")?;
    write_text(&out_dir.join("simulation_summary.am"), "Source: generate_sample\n")?;

    write_text(
        &out_dir.join("instrument.am"),
        "# mock interferometer\nsample_rate: 1024 Hz\nduration: 4.0 s\nnoise_floor: 0.05\n",
    )?;

    // Log-spaced curve, 10 Hz → 500 Hz
    let n_points = 64;
    let freqs: Vec<f64> = (0..n_points)
        .map(|i| 10.0 * 50f64.powf(i as f64 / (n_points - 1) as f64))
        .collect();
    let amps: Vec<f64> = freqs.iter().map(|&f| bucket_noise(f, 100.0, 1.0)).collect();
    write_curve_parquet(&out_dir.join("sensitivity.parquet"), &freqs, &amps)?;
    write_curve_csv(&out_dir.join("sensitivity.csv"), &freqs, &amps)?;

    println!(
        "Wrote {} curvature records and a {}-point sensitivity curve to {}",
        curvature.len(),
        n_points,
        out_dir.display()
    );
    Ok(())
}
