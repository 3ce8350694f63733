use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::model::Record;
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Reading: lazy, restartable line-record sources
// ---------------------------------------------------------------------------

/// A line-record file of `T`.  Each call to [`RecordSource::iter`] reopens
/// the file, so the sequence can be walked any number of times.
#[derive(Debug, Clone)]
pub struct RecordSource<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

/// Open a line-record file for reading.  Nothing is read until iteration.
pub fn read_records<T: Record>(path: impl Into<PathBuf>) -> RecordSource<T> {
    RecordSource {
        path: path.into(),
        _marker: PhantomData,
    }
}

impl<T: Record> RecordSource<T> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a fresh pass over the file.
    pub fn iter(&self) -> Result<RecordIter<T>> {
        let file = File::open(&self.path).map_err(|e| PipelineError::io(&self.path, e))?;
        Ok(RecordIter {
            path: self.path.clone(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            done: false,
            _marker: PhantomData,
        })
    }

    /// Read every record, failing the whole read on the first bad line.
    pub fn read_all(&self) -> Result<Vec<T>> {
        self.iter()?.collect()
    }
}

/// One pass over a [`RecordSource`].  Yields at most one error, then stops.
pub struct RecordIter<T> {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> RecordIter<T> {
    fn location(&self) -> String {
        format!("{}:{}", self.path.display(), self.line_no)
    }

    fn parse_line(&self, line: &str) -> Result<T> {
        let value: JsonValue = serde_json::from_str(line)
            .map_err(|e| PipelineError::Format(format!("{}: {e}", self.location())))?;

        if !value.is_object() {
            return Err(PipelineError::Format(format!(
                "{}: expected a JSON object",
                self.location()
            )));
        }
        let location = match value.get("label").and_then(JsonValue::as_str) {
            Some(label) => format!("{} (label '{label}')", self.location()),
            None => self.location(),
        };

        let record: T = serde_json::from_value(value)
            .map_err(|e| PipelineError::Validation(format!("{location}: {e}")))?;
        record.validate().map_err(|e| e.within(&location))?;
        Ok(record)
    }
}

impl<T: Record> Iterator for RecordIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    self.line_no += 1;
                    return Some(Err(PipelineError::Format(format!(
                        "{}: {e}",
                        self.location()
                    ))));
                }
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let parsed = self.parse_line(&line);
            if parsed.is_err() {
                self.done = true;
            }
            return Some(parsed);
        }
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write one compact JSON object per line, in order, then flush.
/// Returns the number of records written.  On error the sink holds a
/// partial file and must not be trusted.
pub fn write_records<'a, T, I, W>(records: I, mut sink: W) -> std::io::Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
    W: Write,
{
    let mut count = 0;
    for record in records {
        serde_json::to_writer(&mut sink, record)?;
        sink.write_all(b"\n")?;
        count += 1;
    }
    sink.flush()?;
    Ok(count)
}

/// Read a companion text file (summaries, instrument specs, curve text).
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))
}

// ---------------------------------------------------------------------------
// Textual summary – provenance only, never parsed downstream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum SummaryValue {
    Inline(String),
    Blob(String),
}

/// Ordered `Key: value` / `Key:\n<blob>` entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    entries: Vec<(String, SummaryValue)>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-line `Key: value` entry.
    pub fn line(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.entries
            .push((key.to_string(), SummaryValue::Inline(value.to_string())));
        self
    }

    /// Add a multi-line `Key:\n<blob>` entry.
    pub fn blob(mut self, key: &str, text: impl Into<String>) -> Self {
        self.entries
            .push((key.to_string(), SummaryValue::Blob(text.into())));
        self
    }

    pub fn write_to<W: Write>(&self, mut sink: W) -> std::io::Result<()> {
        sink.write_all(self.to_string().as_bytes())?;
        sink.flush()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            match value {
                SummaryValue::Inline(v) => writeln!(f, "{key}: {v}")?,
                SummaryValue::Blob(text) => {
                    writeln!(f, "{key}:")?;
                    f.write_str(text)?;
                    if !text.ends_with('\n') {
                        writeln!(f)?;
                    }
                }
            }
        }
        Ok(())
    }
}
