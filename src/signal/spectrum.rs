use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use crate::data::model::TimeSeries;

/// Bins whose power is within this fraction of the peak count as tied.
pub const TIE_TOLERANCE: f64 = 0.01;

// ---------------------------------------------------------------------------
// Window functions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    #[default]
    Rectangular,
    /// Periodic Hann window, `0.5 · (1 − cos(2πn/N))`.
    Hann,
}

impl Window {
    pub fn coefficients(self, n: usize) -> Vec<f64> {
        match self {
            Window::Rectangular => vec![1.0; n],
            Window::Hann => (0..n)
                .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / n as f64).cos()))
                .collect(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Window::Rectangular => "rectangular",
            Window::Hann => "hann",
        }
    }
}

// ---------------------------------------------------------------------------
// AmplitudeSpectrum – one-sided, window-corrected
// ---------------------------------------------------------------------------

/// One-sided amplitude spectrum of a real series, bins `0 ..= N/2`.
///
/// Amplitudes are corrected for the window's coherent gain, so a sinusoid
/// of amplitude `A` centred on a bin reads back as `A`.
#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeSpectrum {
    /// Bin centre frequencies in Hz.
    pub frequencies: Vec<f64>,
    /// Amplitude per bin – same length as `frequencies`.
    pub amplitudes: Vec<f64>,
    /// Round-off level of the transform for this input.  Bins at or below
    /// it carry no content.
    pub floor: f64,
}

/// The bin a detectability estimate is measured at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantComponent {
    pub bin: usize,
    pub frequency: f64,
    pub amplitude: f64,
}

pub fn amplitude_spectrum(series: &TimeSeries, window: Window) -> AmplitudeSpectrum {
    let n = series.len();
    let coeffs = window.coefficients(n);
    let coherent_gain = coeffs.iter().sum::<f64>() / n as f64;

    let mut buf: Vec<Complex<f64>> = series
        .values()
        .zip(&coeffs)
        .map(|(v, w)| Complex::new(v * w, 0.0))
        .collect();
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut buf);

    let bin_width = series.sample_rate() / n as f64;
    let scale = 1.0 / (n as f64 * coherent_gain);
    let half = n / 2;

    let (frequencies, amplitudes): (Vec<f64>, Vec<f64>) = (0..=half)
        .map(|k| {
            // DC and (for even n) Nyquist have no mirrored partner
            let one_sided = if k == 0 || (n % 2 == 0 && k == half) { 1.0 } else { 2.0 };
            (k as f64 * bin_width, one_sided * buf[k].norm() * scale)
        })
        .unzip();

    AmplitudeSpectrum {
        frequencies,
        amplitudes,
        floor: n as f64 * f64::EPSILON * series.peak_abs(),
    }
}

impl AmplitudeSpectrum {
    /// Strongest non-DC bin.  Bins within [`TIE_TOLERANCE`] of the peak power
    /// resolve to the lowest frequency.  `None` when no non-DC bin rises
    /// above [`floor`](Self::floor), e.g. a constant series.
    pub fn dominant(&self) -> Option<DominantComponent> {
        let peak_power = self
            .amplitudes
            .iter()
            .skip(1)
            .map(|a| a * a)
            .fold(0.0, f64::max);
        if peak_power <= self.floor * self.floor {
            return None;
        }

        let cutoff = (1.0 - TIE_TOLERANCE) * peak_power;
        let bin = (1..self.amplitudes.len()).find(|&k| self.amplitudes[k].powi(2) >= cutoff)?;
        Some(DominantComponent {
            bin,
            frequency: self.frequencies[bin],
            amplitude: self.amplitudes[bin],
        })
    }
}
