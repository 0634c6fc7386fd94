//! Append-only JSON Lines ledger with a hash chain.
//!
//! Every entry carries the hash of the entry before it (`prev_hash`) and its
//! own hash over a canonical payload (`entry_hash`). Editing, removing, or
//! truncating any line breaks the chain from that line onward, and `verify`
//! reports the first broken line.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::integrity::{parse_key, IntegrityError, Sealer};

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// How far back from the end of the file to look for the last entry.
const TAIL_WINDOW: u64 = 8192;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ledger serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("ledger integrity setup failed: {0}")]
    Integrity(#[from] IntegrityError),
    #[error("ledger line {line} is unreadable: {detail}")]
    CorruptLine { line: usize, detail: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: String,
    pub ts_utc: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub data: Value,
    pub prev_hash: String,
    pub entry_hash: String,
}

/// Fields covered by `entry_hash`, declared in sorted key order so the compact
/// JSON rendering is canonical.
#[derive(Serialize)]
struct CanonicalPayload<'a> {
    data: &'a Value,
    id: &'a str,
    prev_hash: &'a str,
    ts_utc: &'a str,
    #[serde(rename = "type")]
    entry_type: &'a str,
}

impl<'a> CanonicalPayload<'a> {
    fn of(entry: &'a LedgerEntry) -> Self {
        Self {
            data: &entry.data,
            id: &entry.id,
            prev_hash: &entry.prev_hash,
            ts_utc: &entry.ts_utc,
            entry_type: &entry.entry_type,
        }
    }
}

/// Outcome of a full chain check.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityReport {
    EmptyLedger {
        count: usize,
    },
    Ok {
        count: usize,
    },
    CorruptLineOrPartialWrite {
        line: usize,
        detail: String,
    },
    PrevHashMismatch {
        line: usize,
        expected_prev: String,
        found_prev: String,
        found_entry_hash: String,
    },
    EntryHashMismatch {
        line: usize,
        expected_hash: String,
        found_hash: String,
    },
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            IntegrityReport::EmptyLedger { .. } | IntegrityReport::Ok { .. }
        )
    }
}

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    sealer: Sealer,
}

impl Ledger {
    /// Opens a ledger handle. With a hex `key` entries are sealed with
    /// HMAC-SHA256, otherwise with plain SHA-256. The file is created lazily on
    /// the first append.
    pub fn open(path: impl Into<PathBuf>, key: Option<&str>) -> Result<Self, LedgerError> {
        let sealer = match key {
            Some(raw) => Sealer::Hmac(parse_key(raw)?),
            None => Sealer::Sha256,
        };
        Ok(Self {
            path: path.into(),
            sealer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn seal(&self, entry: &LedgerEntry) -> Result<String, LedgerError> {
        let canonical = serde_json::to_vec(&CanonicalPayload::of(entry))?;
        Ok(self.sealer.seal(&canonical)?)
    }

    /// Appends one entry and syncs it to disk before returning it. An
    /// exclusive advisory lock is held from reading the previous hash until the
    /// line is synced, so concurrent writers cannot fork the chain.
    pub fn append(&self, entry_type: &str, data: Value) -> Result<LedgerEntry, LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        file.lock().map_err(|e| self.io_err(e))?;

        let prev_hash = self.tail_hash(&mut file)?;

        let mut entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            ts_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            entry_type: entry_type.to_string(),
            data,
            prev_hash,
            entry_hash: String::new(),
        };
        entry.entry_hash = self.seal(&entry)?;

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        file.write_all(&line).map_err(|e| self.io_err(e))?;
        file.flush().map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))?;
        file.unlock().map_err(|e| self.io_err(e))?;

        debug!("ledger append {} -> {}", entry.id, self.path.display());
        Ok(entry)
    }

    /// Hash of the last entry, or the genesis hash for an empty file. A corrupt
    /// final line also yields genesis; `verify` flags it.
    fn tail_hash(&self, file: &mut File) -> Result<String, LedgerError> {
        let size = file.metadata().map_err(|e| self.io_err(e))?.len();
        if size == 0 {
            return Ok(GENESIS_HASH.to_string());
        }
        file.seek(SeekFrom::Start(size.saturating_sub(TAIL_WINDOW)))
            .map_err(|e| self.io_err(e))?;
        let mut tail = Vec::new();
        file.read_to_end(&mut tail).map_err(|e| self.io_err(e))?;

        let last = tail
            .split(|b| *b == b'\n')
            .rev()
            .find(|line| !line.iter().all(u8::is_ascii_whitespace));

        let Some(last) = last else {
            return Ok(GENESIS_HASH.to_string());
        };

        match serde_json::from_slice::<LedgerEntry>(last) {
            Ok(entry) if entry.entry_hash.len() == 64 => Ok(entry.entry_hash),
            _ => {
                warn!(
                    "last line of {} is unreadable; chaining from genesis",
                    self.path.display()
                );
                Ok(GENESIS_HASH.to_string())
            }
        }
    }

    /// Recomputes the whole chain and reports the first broken line.
    pub fn verify(&self) -> Result<IntegrityReport, LedgerError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(IntegrityReport::EmptyLedger { count: 0 })
            }
            Err(err) => return Err(self.io_err(err)),
        };
        file.lock_shared().map_err(|e| self.io_err(e))?;

        let mut prev = GENESIS_HASH.to_string();
        let mut count = 0usize;

        for (index, raw) in BufReader::new(file).split(b'\n').enumerate() {
            let line_no = index + 1;
            let raw = raw.map_err(|e| self.io_err(e))?;
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let entry: LedgerEntry = match serde_json::from_slice(&raw) {
                Ok(entry) => entry,
                Err(err) => {
                    return Ok(IntegrityReport::CorruptLineOrPartialWrite {
                        line: line_no,
                        detail: err.to_string(),
                    })
                }
            };

            if entry.prev_hash != prev {
                return Ok(IntegrityReport::PrevHashMismatch {
                    line: line_no,
                    expected_prev: prev,
                    found_prev: entry.prev_hash,
                    found_entry_hash: entry.entry_hash,
                });
            }

            let expected_hash = self.seal(&entry)?;
            if entry.entry_hash != expected_hash {
                return Ok(IntegrityReport::EntryHashMismatch {
                    line: line_no,
                    expected_hash,
                    found_hash: entry.entry_hash,
                });
            }

            prev = entry.entry_hash;
            count += 1;
        }

        Ok(IntegrityReport::Ok { count })
    }

    /// Reads entries in file order; with `Some(n)` and `n > 0` only the last
    /// `n` are returned.
    pub fn read_entries(&self, limit: Option<usize>) -> Result<Vec<LedgerEntry>, LedgerError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.io_err(err)),
        };

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_err(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| LedgerError::CorruptLine {
                line: index + 1,
                detail: e.to_string(),
            })?;
            entries.push(entry);
        }

        match limit {
            Some(n) if n > 0 && entries.len() > n => Ok(entries.split_off(entries.len() - n)),
            _ => Ok(entries),
        }
    }
}
