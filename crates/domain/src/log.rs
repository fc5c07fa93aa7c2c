use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::DomainError;

pub const LOG_HEADER: [&str; 5] = ["timestamp", "source", "emotion", "female_gate", "note"];

/// Source identifier used for microphone captures.
pub const RECORD_SOURCE: &str = "record";

/// One row of the request log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub timestamp: String,
    pub source: String,
    pub emotion: Option<String>,
    /// Whether the pitch-band gate accepted the clip. Stored as `0`/`1` under the
    /// historical column name.
    #[serde(rename = "female_gate", with = "gate_flag")]
    pub gate_passed: bool,
    pub note: String,
}

impl LogRecord {
    pub fn new(
        source: impl Into<String>,
        emotion: Option<String>,
        gate_passed: bool,
        note: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: local_timestamp(),
            source: source.into(),
            emotion,
            gate_passed,
            note: note.into(),
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS` in local time, UTC when the local offset is unknown.
pub fn local_timestamp() -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format).unwrap_or_default()
}

mod gate_flag {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(D::Error::custom(format!("gate flag must be 0 or 1, got {other}"))),
        }
    }
}

/// Append-only destination for request records.
pub trait LogSink {
    fn append(&mut self, record: &LogRecord) -> Result<(), DomainError>;
}

/// CSV file log. The header is written whenever the file is missing or empty.
#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DomainError> {
        let log = Self {
            path: path.as_ref().to_path_buf(),
        };
        log.ensure_header()?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> DomainError {
        DomainError::LogIo {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn ensure_header(&self) -> Result<(), DomainError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let len = file.metadata().map_err(|e| self.io_error(e))?.len();
        if len == 0 {
            debug!(path = %self.path.display(), "writing log header");
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            writer.write_record(LOG_HEADER)?;
            writer.flush().map_err(|e| self.io_error(e))?;
        }
        Ok(())
    }
}

impl LogSink for CsvLog {
    fn append(&mut self, record: &LogRecord) -> Result<(), DomainError> {
        self.ensure_header()?;
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush().map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

/// In-memory sink, handy for tests and previews.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    pub records: Vec<LogRecord>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for MemoryLog {
    fn append(&mut self, record: &LogRecord) -> Result<(), DomainError> {
        self.records.push(record.clone());
        Ok(())
    }
}

pub fn read_log<P: AsRef<Path>>(path: P) -> Result<Vec<LogRecord>, DomainError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let headers = reader.headers()?.clone();
    if headers.iter().ne(LOG_HEADER.iter().copied()) {
        warn!(?headers, "unexpected log header");
        return Err(DomainError::validation(format!(
            "unexpected log header: {:?}",
            headers
        )));
    }
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
