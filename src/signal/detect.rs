use crate::data::curve::SensitivityCurve;
use crate::data::model::{DetectionResult, Record, TimeSeries};
use crate::error::{PipelineError, Result};
use crate::signal::spectrum::{amplitude_spectrum, Window};

pub const DEFAULT_THRESHOLD: f64 = 1.0;

/// Frequency-domain detectability test of a series against a curve.
///
/// `snr = A(f_dom) / noise(f_dom)` where `f_dom` is the dominant non-DC
/// bin of the windowed amplitude spectrum and `noise` is the curve's
/// interpolated noise amplitude there.  `detectable` is `snr >= threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectabilityEvaluator {
    threshold: f64,
    window: Window,
}

impl Default for DetectabilityEvaluator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window: Window::default(),
        }
    }
}

impl DetectabilityEvaluator {
    pub fn new(threshold: f64, window: Window) -> Result<Self> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(PipelineError::Config(format!(
                "detection threshold must be finite and >= 0, got {threshold}"
            )));
        }
        Ok(Self { threshold, window })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn evaluate(&self, series: &TimeSeries, curve: &SensitivityCurve) -> Result<DetectionResult> {
        let label = series.label().to_string();
        let spectrum = amplitude_spectrum(series, self.window);

        let Some(dominant) = spectrum.dominant() else {
            log::debug!("{label}: silent series, snr = 0");
            return Ok(DetectionResult {
                label,
                snr: 0.0,
                detectable: 0.0 >= self.threshold,
                dominant_frequency: None,
            });
        };

        let noise = curve
            .lookup(dominant.frequency)
            .map_err(|e| e.within(format!("label '{label}'")))?;
        let snr = dominant.amplitude / noise;
        log::debug!(
            "{label}: dominant {} Hz, amplitude {}, noise {noise}, snr {snr}",
            dominant.frequency,
            dominant.amplitude
        );

        Ok(DetectionResult {
            label,
            snr,
            detectable: snr >= self.threshold,
            dominant_frequency: Some(dominant.frequency),
        })
    }
}

/// Evaluate with a rectangular window.
pub fn evaluate(
    series: &TimeSeries,
    curve: &SensitivityCurve,
    threshold: f64,
) -> Result<DetectionResult> {
    DetectabilityEvaluator::new(threshold, Window::Rectangular)?.evaluate(series, curve)
}
