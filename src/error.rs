use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// PipelineError – the four failure kinds every stage can abort with
// ---------------------------------------------------------------------------

/// Errors raised by the pipeline core.
///
/// Every kind aborts the current stage: nothing is retried and no output
/// file is written.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed record or file (bad JSON, non-monotonic curve, ...).
    #[error("format error: {0}")]
    Format(String),

    /// Semantically invalid record (missing field, unmatched label, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// Bad instrument, curve, or pipeline configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Lookup or extrapolation outside a curve's domain.
    #[error("range error: {0}")]
    Range(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

impl PipelineError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Short name of the error kind, as shown to users.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Format(_) => "FormatError",
            PipelineError::Validation(_) => "ValidationError",
            PipelineError::Config(_) => "ConfigError",
            PipelineError::Range(_) => "RangeError",
            PipelineError::Io { .. } => "IoError",
        }
    }

    /// Prefix the message with where it happened (file, record label).
    /// I/O errors already carry their path and are returned unchanged.
    pub fn within(self, location: impl std::fmt::Display) -> Self {
        match self {
            PipelineError::Format(m) => PipelineError::Format(format!("{location}: {m}")),
            PipelineError::Validation(m) => PipelineError::Validation(format!("{location}: {m}")),
            PipelineError::Config(m) => PipelineError::Config(format!("{location}: {m}")),
            PipelineError::Range(m) => PipelineError::Range(format!("{location}: {m}")),
            io @ PipelineError::Io { .. } => io,
        }
    }
}
