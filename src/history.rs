//! Journal of bucket moves, one JSON record per line, so a run can be undone.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HISTORY_FILE: &str = ".history.jsonl";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode history record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No history records to restore")]
    Empty,

    #[error("Invalid history index {index}; valid range is 0..{len}")]
    InvalidIndex { index: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Filter,
    Dedup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEntry {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: String,
    pub stage: Stage,
    pub moves: Vec<MoveEntry>,
}

#[derive(Debug, Clone, Copy)]
pub enum Selection {
    Latest,
    Record(usize),
    All,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub records: usize,
    pub restored: usize,
    pub skipped: usize,
}

pub struct History {
    path: PathBuf,
}

impl History {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Append one record for `stage`. Nothing is written when `moves` is empty.
    pub fn append(&self, stage: Stage, moves: Vec<MoveEntry>) -> Result<(), HistoryError> {
        if moves.is_empty() {
            return Ok(());
        }

        let record = HistoryRecord {
            timestamp: Utc::now().to_rfc3339(),
            stage,
            moves,
        };
        let line = serde_json::to_string(&record)?;

        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        writeln!(out, "{line}").map_err(|e| self.io_err(e))
    }

    /// Parsed records in journal order. Malformed lines are skipped with a
    /// warning; a missing journal is an empty history.
    pub fn load(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        let mut records = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_err(e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => log::warn!("Skipping malformed history entry {}: {}", i, err),
            }
        }
        Ok(records)
    }

    /// Move files back to where they were, newest record first and each
    /// record's moves in reverse, then drop the restored records.
    pub fn restore(&self, selection: Selection) -> Result<RestoreSummary, HistoryError> {
        let records = self.load()?;
        if records.is_empty() {
            return Err(HistoryError::Empty);
        }

        let selected: Vec<usize> = match selection {
            Selection::Latest => vec![records.len() - 1],
            Selection::All => (0..records.len()).collect(),
            Selection::Record(index) if index < records.len() => vec![index],
            Selection::Record(index) => {
                return Err(HistoryError::InvalidIndex {
                    index,
                    len: records.len(),
                });
            }
        };

        let mut summary = RestoreSummary {
            records: selected.len(),
            ..Default::default()
        };

        for &i in selected.iter().rev() {
            for entry in records[i].moves.iter().rev() {
                if !entry.to.exists() {
                    log::warn!("{} no longer exists; skipping", entry.to.display());
                    summary.skipped += 1;
                    continue;
                }
                if entry.from.exists() {
                    log::warn!("{} already exists; skipping", entry.from.display());
                    summary.skipped += 1;
                    continue;
                }
                fs::rename(&entry.to, &entry.from).map_err(|e| self.io_err(e))?;
                log::info!("Restored {} -> {}", entry.to.display(), entry.from.display());
                summary.restored += 1;
            }
        }

        let remaining: Vec<String> = records
            .iter()
            .enumerate()
            .filter(|(i, _)| !selected.contains(i))
            .map(|(_, record)| serde_json::to_string(record))
            .collect::<Result<_, _>>()?;
        let content = if remaining.is_empty() {
            String::new()
        } else {
            remaining.join("\n") + "\n"
        };
        fs::write(&self.path, content).map_err(|e| self.io_err(e))?;

        Ok(summary)
    }
}
