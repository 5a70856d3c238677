//! Append-only JSON-lines session log.
//!
//! One writer per session, one compact JSON object per line, flushed on
//! every record. The log is a consistency boundary: a failed write aborts
//! the session rather than risk silent truncation. Read-back tolerates a
//! single malformed trailing line (the crash-during-write case) and
//! nothing else.

use std::cmp::Ordering;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VoicelogError};

/// Where a log entry came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Voice,
    Text,
}

/// One committed line of the session log. Commit order follows
/// transcription arrival, not capture order; sort by `start_ts` when
/// capture order matters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub user_id: String,
    pub display_name: String,
    pub start_ts: f64,
    pub end_ts: f64,
    pub origin: Origin,
    pub text: String,
}

pub struct SessionLog {
    file: File,
    path: PathBuf,
}

impl SessionLog {
    /// Creates `<data_dir>/<session_name>/` if needed and opens
    /// `log.jsonl` for append.
    pub fn open(data_dir: &Path, session_name: &str) -> Result<Self> {
        let dir = data_dir.join(session_name);
        fs::create_dir_all(&dir).map_err(VoicelogError::LogWrite)?;
        let path = dir.join("log.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(VoicelogError::LogWrite)?;
        info!(path = %path.display(), "session log opened");
        Ok(Self { file, path })
    }

    /// Appends one record and flushes it to the OS.
    pub fn append(&mut self, entry: &LogEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| VoicelogError::LogWrite(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .map_err(VoicelogError::LogWrite)?;
        self.file.flush().map_err(VoicelogError::LogWrite)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and closes the log.
    pub fn close(self) -> Result<()> {
        self.file.sync_all().map_err(VoicelogError::LogWrite)?;
        info!(path = %self.path.display(), "session log closed");
        Ok(())
    }
}

/// Reads a session log back. A single malformed final non-blank line is
/// dropped (interrupted write); a malformed line anywhere else is
/// `CorruptLog` with its 1-based line number.
pub fn read_back(path: &Path) -> Result<Vec<LogEntry>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    let mut failed: Option<(usize, String)> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some((bad_line, message)) = failed.take() {
            // A malformed line followed by more content is real corruption.
            return Err(VoicelogError::CorruptLog {
                line: bad_line,
                message,
            });
        }
        match serde_json::from_str::<LogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => failed = Some((idx + 1, e.to_string())),
        }
    }

    if let Some((bad_line, _)) = failed {
        warn!(line = bad_line, "dropping malformed trailing log line");
    }
    Ok(entries)
}

/// Renders entries as a plain transcript, ordered by capture time.
pub fn render_transcript(entries: &[LogEntry]) -> String {
    let mut sorted: Vec<&LogEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        a.start_ts
            .partial_cmp(&b.start_ts)
            .unwrap_or(Ordering::Equal)
    });
    let mut out = String::new();
    for entry in sorted {
        out.push_str(&entry.display_name);
        out.push_str(": ");
        out.push_str(&entry.text);
        out.push('\n');
    }
    out
}
