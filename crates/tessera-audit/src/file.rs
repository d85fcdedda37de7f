//! Append-only JSONL file implementation of `EventStore`.
//!
//! One event per line, serialized as JSON.  The line number (zero-based) is
//! the event's sequence number, so blank lines are rejected on load.  The
//! file is only ever opened in append mode; no code path rewrites or
//! deletes a committed line.
//!
//! Each append writes the whole line, flushes, and `fsync`s before the event
//! becomes visible to readers.  If any of those steps fails the file is
//! truncated back to its last committed length, so a failed append leaves
//! no partial line behind.
//!
//! A crash in the middle of an append can still leave an unterminated final
//! line.  On open, such a line is dropped if it does not parse (the append
//! never returned `Ok`) and terminated if it does.  Unparseable lines
//! anywhere else are a `StorageRead` error.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};

use tessera_contracts::{
    error::{TesseraError, TesseraResult},
    event::AuditEvent,
};
use tessera_core::traits::EventStore;

struct Writer {
    file: File,
    /// Byte length of the file after the last successful append.
    committed_len: u64,
}

/// A durable, append-only event store backed by a JSONL file.
///
/// Committed events are also cached in memory so that snapshots and
/// lookups do not re-read the file.
pub struct JsonlEventStore {
    path: PathBuf,
    writer: Mutex<Writer>,
    events: RwLock<Vec<AuditEvent>>,
}

impl JsonlEventStore {
    /// Open (or create) the log at `path` and load its committed events.
    ///
    /// Loading does not verify the chain; a tampered file opens normally and
    /// the break is reported by the verifier.  A complete line that is not a
    /// valid event is a `StorageRead` error.
    pub fn open(path: impl AsRef<Path>) -> TesseraResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TesseraError::StorageWrite {
                reason: format!("failed to create log directory '{}': {}", parent.display(), e),
            })?;
        }

        let Loaded { events, tail } = if path.exists() {
            load_events(&path)?
        } else {
            Loaded {
                events: Vec::new(),
                tail: Tail::Clean,
            }
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TesseraError::StorageWrite {
                reason: format!("failed to open audit log '{}': {}", path.display(), e),
            })?;
        match tail {
            Tail::Clean => {}
            Tail::Torn { complete_len } => {
                file.set_len(complete_len)
                    .map_err(|e| TesseraError::StorageWrite {
                        reason: format!(
                            "failed to drop torn final line of '{}': {}",
                            path.display(),
                            e
                        ),
                    })?;
                warn!(
                    path = %path.display(),
                    kept_bytes = complete_len,
                    "dropped torn final line left by an interrupted append"
                );
            }
            Tail::Unterminated => {
                write_line(&mut file, b"\n").map_err(|e| TesseraError::StorageWrite {
                    reason: format!(
                        "failed to terminate final line of '{}': {}",
                        path.display(),
                        e
                    ),
                })?;
                warn!(
                    path = %path.display(),
                    "terminated final line left by an interrupted append"
                );
            }
        }

        let committed_len = file
            .metadata()
            .map_err(|e| TesseraError::StorageRead {
                reason: format!("failed to stat audit log '{}': {}", path.display(), e),
            })?
            .len();

        info!(
            path = %path.display(),
            events = events.len(),
            "opened audit log"
        );

        Ok(Self {
            path,
            writer: Mutex::new(Writer {
                file,
                committed_len,
            }),
            events: RwLock::new(events),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // The cache is only ever pushed to, so a poisoned lock still holds a
    // consistent prefix of the file.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<AuditEvent>> {
        self.events.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventStore for JsonlEventStore {
    fn append(&self, event: &AuditEvent) -> TesseraResult<u64> {
        let mut line = serde_json::to_vec(event).map_err(|e| TesseraError::StorageWrite {
            reason: format!("failed to serialize event {}: {}", event.event_id, e),
        })?;
        line.push(b'\n');

        let mut writer = self.writer.lock().map_err(|e| TesseraError::StorageWrite {
            reason: format!("audit log writer lock poisoned: {}", e),
        })?;

        if let Err(e) = write_line(&mut writer.file, &line) {
            let committed_len = writer.committed_len;
            if let Err(trunc) = writer.file.set_len(committed_len) {
                warn!(
                    path = %self.path.display(),
                    error = %trunc,
                    "failed to roll back partial append"
                );
            }
            return Err(TesseraError::StorageWrite {
                reason: format!("failed to append to '{}': {}", self.path.display(), e),
            });
        }
        writer.committed_len += line.len() as u64;

        // Still holding the writer lock, so cache order matches file order.
        // The line is already durable; the cache must follow it.
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        events.push(event.clone());
        let sequence = events.len() as u64 - 1;

        debug!(sequence, event_id = %event.event_id, "event appended to audit log");
        Ok(sequence)
    }

    fn snapshot(&self) -> TesseraResult<Vec<AuditEvent>> {
        Ok(self.read().clone())
    }

    fn get(&self, sequence: u64) -> TesseraResult<Option<AuditEvent>> {
        Ok(self.read().get(sequence as usize).cloned())
    }

    fn last(&self) -> TesseraResult<Option<AuditEvent>> {
        Ok(self.read().last().cloned())
    }

    fn len(&self) -> TesseraResult<u64> {
        Ok(self.read().len() as u64)
    }
}

fn write_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line)?;
    file.flush()?;
    file.sync_data()
}

/// State of the file's final line as found on open.
enum Tail {
    Clean,
    /// Unterminated and unparseable; the file should end at `complete_len`.
    Torn { complete_len: u64 },
    /// Unterminated but a valid event; only the newline is missing.
    Unterminated,
}

struct Loaded {
    events: Vec<AuditEvent>,
    tail: Tail,
}

fn load_events(path: &Path) -> TesseraResult<Loaded> {
    let bytes = std::fs::read(path).map_err(|e| TesseraError::StorageRead {
        reason: format!("failed to read audit log '{}': {}", path.display(), e),
    })?;

    let mut events = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let line_no = events.len() + 1;
        let rest = &bytes[offset..];
        let Some(end) = rest.iter().position(|b| *b == b'\n') else {
            let tail = match parse_line(rest, line_no) {
                Ok(event) => {
                    events.push(event);
                    Tail::Unterminated
                }
                Err(_) => Tail::Torn {
                    complete_len: offset as u64,
                },
            };
            return Ok(Loaded { events, tail });
        };
        events.push(parse_line(&rest[..end], line_no)?);
        offset += end + 1;
    }

    Ok(Loaded {
        events,
        tail: Tail::Clean,
    })
}

fn parse_line(line: &[u8], line_no: usize) -> TesseraResult<AuditEvent> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Err(TesseraError::StorageRead {
            reason: format!("line {} is blank", line_no),
        });
    }
    serde_json::from_slice(line).map_err(|e| TesseraError::StorageRead {
        reason: format!("line {} is not a valid audit event: {}", line_no, e),
    })
}
