use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::error::{PipelineError, Result};

/// Instrument description shared read-only by every synthesis in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSpec {
    /// Samples per second.
    pub sample_rate: f64,
    /// Observation length in seconds.
    pub duration: f64,
    /// Standard deviation of the additive Gaussian noise.
    pub noise_floor: f64,
    /// Text the spec was parsed from, echoed into summaries.
    pub raw: String,
}

impl InstrumentSpec {
    pub fn new(sample_rate: f64, duration: f64, noise_floor: f64) -> Self {
        InstrumentSpec {
            sample_rate,
            duration,
            noise_floor,
            raw: format!(
                "sample_rate: {sample_rate}\nduration: {duration}\nnoise_floor: {noise_floor}\n"
            ),
        }
    }

    /// Parse a spec blob.  Either a JSON object or `key: value` /
    /// `key = value` lines.  Keys are matched case-insensitively with
    /// separators and camel case folded (`SampleRate`, `sample-rate`).
    /// Unknown keys are ignored; a missing required key is a config error.
    pub fn parse(text: &str) -> Result<Self> {
        let fields = if text.trim_start().starts_with('{') {
            parse_json_fields(text)?
        } else {
            parse_line_fields(text)
        };

        let required = |name: &str| -> Result<f64> {
            let raw = fields.get(&normalize_key(name)).ok_or_else(|| {
                PipelineError::Config(format!("instrument spec missing required field '{name}'"))
            })?;
            parse_number(raw).ok_or_else(|| {
                PipelineError::Config(format!("instrument spec field '{name}': '{raw}' is not a number"))
            })
        };

        Ok(InstrumentSpec {
            sample_rate: required("sample_rate")?,
            duration: required("duration")?,
            noise_floor: required("noise_floor")?,
            raw: text.to_string(),
        })
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::parse(&text).map_err(|e| e.within(path.display()))
    }
}

/// `Sample_Rate`, `sample-rate`, `SampleRate` → `samplerate`.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Leading number of a value, ignoring a trailing unit (`200 Hz`).
fn parse_number(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

fn parse_line_fields(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        // several `key: value` pairs may share a line, separated by `;`
        for part in line.split(';') {
            let Some(sep) = part.find([':', '=']) else {
                continue;
            };
            let key = normalize_key(&part[..sep]);
            let value = part[sep + 1..].trim();
            if !key.is_empty() && !value.is_empty() {
                fields.entry(key).or_insert_with(|| value.to_string());
            }
        }
    }
    fields
}

fn parse_json_fields(text: &str) -> Result<BTreeMap<String, String>> {
    let value: JsonValue = serde_json::from_str(text)
        .map_err(|e| PipelineError::Config(format!("instrument spec is not valid JSON: {e}")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| PipelineError::Config("instrument spec JSON must be an object".into()))?;
    Ok(obj
        .iter()
        .map(|(k, v)| {
            let text = match v {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            (normalize_key(k), text)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines_with_units_and_comments() {
        let spec = InstrumentSpec::parse(
            "# test rig\nSampleRate: 4096 Hz\nduration = 2.0\nnoise-floor: 1e-3\ndetector: L1\n",
        )
        .unwrap();
        assert_eq!(spec.sample_rate, 4096.0);
        assert_eq!(spec.duration, 2.0);
        assert_eq!(spec.noise_floor, 1e-3);
    }

    #[test]
    fn parses_semicolon_separated_pairs() {
        let spec = InstrumentSpec::parse("sample_rate: 200; duration: 1.0; noise_floor: 0").unwrap();
        assert_eq!(spec.sample_rate, 200.0);
        assert_eq!(spec.noise_floor, 0.0);
    }

    #[test]
    fn parses_json_object() {
        let spec =
            InstrumentSpec::parse(r#"{"sample_rate": 200, "duration": "1.5", "noise_floor": 0.1, "x": []}"#)
                .unwrap();
        assert_eq!(spec.duration, 1.5);
    }

    #[test]
    fn missing_field_is_a_config_error() {
        let err = InstrumentSpec::parse("sample_rate: 200\nduration: 1.0\n").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(err.to_string().contains("noise_floor"));
    }

    #[test]
    fn keeps_raw_text() {
        let text = "sample_rate: 1\nduration: 1\nnoise_floor: 0\n";
        assert_eq!(InstrumentSpec::parse(text).unwrap().raw, text);
    }
}
