//! Write-ahead log of appended versions.
//!
//! Every `insert` is framed (see [`codec`](super::codec)) and appended here
//! before the version becomes visible in the read index. On open the log is
//! replayed from the start. A torn final entry (cut short by a crash) is cut
//! off so later appends land right after the last good entry; damage anywhere
//! else fails the open and leaves the file untouched.
//!
//! # File Format
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [ENTRY 1: codec frame of WalEntry]
//! [ENTRY 2: codec frame of WalEntry]
//! ...
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Error as IoError, ErrorKind, Result as IoResult, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::codec;

/// A single logged append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number, starting at 1.
    pub sequence: u64,
    /// Wall-clock time the entry was written (not the version's `known_at`).
    pub written_at: DateTime<Utc>,
    /// The version in flattened record form.
    pub record: serde_json::Map<String, serde_json::Value>,
}

struct WalWriter {
    file: File,
    sequence: u64,
    /// Length of the file up to the end of the last committed frame.
    committed_len: u64,
    /// Set when a failed append could not be rolled back.
    failed: bool,
}

/// Append-only log. Thread-safe via an internal mutex.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    sync_on_write: bool,
}

impl std::fmt::Debug for WriteAheadLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAheadLog")
            .field("path", &self.path)
            .field("sync_on_write", &self.sync_on_write)
            .finish_non_exhaustive()
    }
}

fn poisoned() -> IoError {
    IoError::new(ErrorKind::Other, "write-ahead log lock poisoned")
}

fn write_frame(file: &mut File, frame: &[u8], sync: bool) -> IoResult<()> {
    file.write_all(frame)?;
    file.flush()?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

impl WriteAheadLog {
    /// Opens or creates the log at `path` and returns every intact entry.
    ///
    /// # Errors
    /// - `ErrorKind::InvalidData` if the header is not a bitempo log, or an
    ///   entry before the final one is damaged
    /// - any other I/O error
    pub fn open(path: &Path, sync_on_write: bool) -> IoResult<(Self, Vec<WalEntry>)> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        // A file shorter than the header never finished being created.
        let (entries, committed_len) = if file.metadata()?.len() < codec::HEADER_LEN {
            file.set_len(0)?;
            codec::write_header(&mut file)?;
            if sync_on_write {
                file.sync_all()?;
            }
            (Vec::new(), codec::HEADER_LEN)
        } else {
            let (entries, valid_len) = Self::scan(&file)?;
            if valid_len < file.metadata()?.len() {
                warn!(
                    path = %path.display(),
                    valid_len,
                    "truncating torn entry at end of write-ahead log"
                );
                file.set_len(valid_len)?;
                file.sync_all()?;
            }
            (entries, valid_len)
        };

        let sequence = entries.last().map_or(0, |e| e.sequence);
        let file = OpenOptions::new().append(true).open(path)?;

        Ok((
            Self {
                path: path.to_path_buf(),
                writer: Mutex::new(WalWriter {
                    file,
                    sequence,
                    committed_len,
                    failed: false,
                }),
                sync_on_write,
            },
            entries,
        ))
    }

    /// Reads every entry, stopping early only at a torn final entry.
    ///
    /// Returns the entries and the byte length of the intact prefix. A frame
    /// that runs past end of file, or a damaged frame with nothing after it,
    /// is a torn tail. A damaged frame followed by more bytes is an error.
    fn scan(file: &File) -> IoResult<(Vec<WalEntry>, u64)> {
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file.try_clone()?);
        reader.rewind()?;
        codec::read_header(&mut reader)?;

        let mut entries = Vec::new();
        let mut valid_len = reader.stream_position()?;
        while valid_len < file_len {
            match codec::decode::<WalEntry>(&mut reader) {
                Ok(entry) => {
                    entries.push(entry);
                    valid_len = reader.stream_position()?;
                }
                Err(e) => {
                    let after_sequence = entries.last().map_or(0, |last: &WalEntry| last.sequence);
                    let torn = e.kind() == ErrorKind::UnexpectedEof
                        || reader.stream_position()? >= file_len;
                    if !torn {
                        return Err(IoError::new(
                            ErrorKind::InvalidData,
                            format!(
                                "corrupt write-ahead log entry at offset {valid_len} \
                                 (after sequence {after_sequence}): {e}"
                            ),
                        ));
                    }
                    warn!(
                        after_sequence,
                        offset = valid_len,
                        error = %e,
                        "write-ahead log replay stopped at torn final entry"
                    );
                    break;
                }
            }
        }
        Ok((entries, valid_len))
    }

    /// Appends one record. Returns the sequence number assigned to it.
    ///
    /// Either the whole frame is committed or the file is rolled back to the
    /// previous committed length. Stray bytes past that length are discarded
    /// before writing, so a new frame always follows the last good one. If a
    /// rollback itself fails, every later append is refused.
    pub fn append(&self, record: serde_json::Map<String, serde_json::Value>) -> IoResult<u64> {
        let mut guard = self.writer.lock().map_err(|_| poisoned())?;
        let writer = &mut *guard;
        if writer.failed {
            return Err(IoError::new(
                ErrorKind::Other,
                "write-ahead log refused append after a failed rollback",
            ));
        }

        let entry = WalEntry {
            sequence: writer.sequence + 1,
            written_at: Utc::now(),
            record,
        };
        let frame = codec::encode(&entry)?;

        let committed = writer.committed_len;
        let on_disk = writer.file.metadata()?.len();
        if on_disk != committed {
            warn!(
                path = %self.path.display(),
                on_disk,
                committed,
                "discarding bytes after last committed write-ahead log entry"
            );
            writer.file.set_len(committed)?;
        }

        if let Err(e) = write_frame(&mut writer.file, &frame, self.sync_on_write) {
            if let Err(rollback) = writer.file.set_len(committed) {
                writer.failed = true;
                error!(
                    path = %self.path.display(),
                    error = %e,
                    rollback_error = %rollback,
                    "write-ahead log append failed and could not be rolled back"
                );
            }
            return Err(e);
        }

        writer.committed_len = committed + frame.len() as u64;
        writer.sequence = entry.sequence;
        Ok(entry.sequence)
    }

    /// Sequence number of the last appended entry.
    pub fn current_sequence(&self) -> IoResult<u64> {
        Ok(self.writer.lock().map_err(|_| poisoned())?.sequence)
    }

    /// Size of the log file in bytes.
    pub fn size_bytes(&self) -> IoResult<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
