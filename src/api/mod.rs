use crate::error::{lock_mutex, Error, Result};
use crate::storage::file_lock::FileLock;
use crate::storage::framing::{decode_frame, frame_bytes, scan_frames};
use crate::storage::line_reader::LineReader;
use crate::storage::offset_index::OffsetIndex;
use crate::types::{Config, DurabilityMode, Record, StoreStats};
use chrono::{DateTime, Datelike, Utc};
use std::collections::{BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Open the log for sequential reading. A missing file is an empty store,
/// not an error.
fn open_reader(log_path: &Path) -> Result<Option<LineReader<File>>> {
    match File::open(log_path) {
        Ok(file) => Ok(Some(LineReader::new(file))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// An embedded record store backed by one append-only text log file.
///
/// Records are appended as separator-delimited frames; point lookups go
/// through an in-memory identifier → byte-offset index rebuilt from a full
/// scan at open and maintained incrementally on writes and deletes.
/// Deletes are logical: a tombstone frame is appended and the identifier
/// drops out of the index, while every older frame stays in the file.
///
/// Per identifier the lifecycle is absent → live → tombstoned, and a
/// tombstoned identifier never comes back.
pub struct Logbook<T: Record> {
    base_path: PathBuf,
    config: Config,
    index: Mutex<OffsetIndex>,
    file_lock: FileLock,
    _record: PhantomData<T>,
}

impl<T: Record> Logbook<T> {
    /// Open (or create) a store in `path` with the default [`Config`].
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    pub fn open_with_config(path: &Path, config: Config) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let file_lock = FileLock::new(path)?;
        let _guard = file_lock.lock_exclusive()?;

        let log_path = path.join(&config.file_name);
        let mut index = OffsetIndex::new();
        if let Some(mut reader) = open_reader(&log_path)? {
            index.rebuild::<T, _>(&mut reader)?;
        }

        tracing::debug!(
            path = %log_path.display(),
            live_records = index.len(),
            "opened record store"
        );

        Ok(Self {
            base_path: path.to_path_buf(),
            config,
            index: Mutex::new(index),
            file_lock,
            _record: PhantomData,
        })
    }

    fn log_path(&self) -> PathBuf {
        self.base_path.join(&self.config.file_name)
    }

    /// The store's single critical section: the cross-process flock, then
    /// the in-process index guard. Every operation that touches the file
    /// or the index runs inside it, so reads and writes are mutually
    /// exclusive and the index can never disagree with the file mid-flight.
    /// Both guards release when `op` returns, on success and error alike.
    fn with_store_lock<F, O>(&self, op: F) -> Result<O>
    where
        F: FnOnce(&mut OffsetIndex) -> Result<O>,
    {
        let _flock = self.file_lock.lock_exclusive()?;
        let mut index = lock_mutex(&self.index)?;
        op(&mut index)
    }

    fn apply_durability(&self, file: &mut File) -> Result<()> {
        match self.config.durability {
            DurabilityMode::Fsync => {
                file.flush()?;
                file.sync_all()?;
            }
            DurabilityMode::FlushOnly => {
                file.flush()?;
            }
            DurabilityMode::None => {}
        }
        Ok(())
    }

    /// Append one frame to the tail of the log, returning the byte offset
    /// of its identifier line. The frame is built as a single contiguous
    /// buffer so the append is one write syscall. Must be called with the
    /// store lock held; the file handle closes before the lock releases.
    fn append_frame(&self, record: &T) -> Result<u64> {
        let payload = serde_json::to_string(record)?;
        let (buf, id_line_offset) = frame_bytes(record.id(), &payload);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        let end = file.metadata()?.len();

        file.write_all(&buf)?;
        self.apply_durability(&mut file)?;

        Ok(end + id_line_offset)
    }

    /// Truncate the log and reseed it from `records`, assigning a fresh
    /// identifier to any record that arrives without one (pre-set
    /// identifiers are kept). The index is wiped and rebuilt as a
    /// byproduct of the appends. Intended for bulk (re)seeding, not as an
    /// incremental operation.
    pub fn initialize<I>(&self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        self.with_store_lock(|index| {
            index.clear();

            let mut file = File::create(self.log_path())?;
            let mut len: u64 = 0;

            for mut record in records {
                if record.id().is_nil() {
                    record.set_id(Uuid::new_v4());
                }

                let payload = serde_json::to_string(&record)?;
                let (buf, id_line_offset) = frame_bytes(record.id(), &payload);
                file.write_all(&buf)?;

                if record.is_deleted() {
                    index.remove(record.id());
                } else {
                    index.set(record.id(), len + id_line_offset);
                }
                len += buf.len() as u64;
            }

            self.apply_durability(&mut file)?;

            tracing::info!(live_records = index.len(), "initialized store");
            Ok(())
        })
    }

    /// Append `record` with a freshly assigned identifier and return it.
    ///
    /// Identifiers are assigned by the store, never by the caller: a
    /// record arriving with a non-nil identifier is rejected before any
    /// I/O happens. This is a pure append — no existing content is read.
    pub fn create(&self, mut record: T) -> Result<Uuid> {
        if !record.id().is_nil() {
            return Err(Error::IdentifierPreassigned(record.id()));
        }

        self.with_store_lock(move |index| {
            record.set_id(Uuid::new_v4());

            let offset = self.append_frame(&record)?;
            index.set(record.id(), offset);

            tracing::debug!(id = %record.id(), offset, "appended record");
            Ok(record.id())
        })
    }

    /// Point lookup. An identifier absent from the index — unknown or
    /// tombstoned — returns `None` without touching the file; otherwise
    /// the log is seeked to the indexed offset and decoded forward until
    /// the frame whose identifier line matches, which is the first frame
    /// encountered since the index points exactly there.
    pub fn get_by_id(&self, id: Uuid) -> Result<Option<T>> {
        self.with_store_lock(|index| {
            let Some(offset) = index.get(id) else {
                return Ok(None);
            };

            let Some(mut reader) = open_reader(&self.log_path())? else {
                return Ok(None);
            };
            reader.seek(offset)?;

            let mut found: Option<T> = None;
            scan_frames(&mut reader, |frame| {
                let matches = Uuid::parse_str(frame.id_text.trim()).is_ok_and(|line| line == id);
                if !matches {
                    return Ok(false);
                }
                if let Some(record) = decode_frame::<T>(frame)? {
                    found = Some(record);
                    return Ok(true);
                }
                Ok(false)
            })?;

            // The index never holds tombstoned identifiers; the flag check
            // is defensive.
            Ok(found.filter(|record| !record.is_deleted()))
        })
    }

    /// All live records, newest first. Equivalent to
    /// [`list_where`](Self::list_where) with an always-true predicate.
    pub fn list(&self) -> Result<Vec<T>> {
        self.list_where(|_| true)
    }

    /// Full sequential scan, folding each identifier to its last frame in
    /// file order. Tombstones take part in the fold — a delete overrides
    /// every earlier version of its identifier — and are then excluded
    /// from the output unconditionally; the predicate only ever sees live
    /// records. Results are ordered by timestamp, most recent first.
    pub fn list_where<P>(&self, predicate: P) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool,
    {
        self.with_store_lock(|_index| {
            let mut newest: HashMap<Uuid, T> = HashMap::new();

            if let Some(mut reader) = open_reader(&self.log_path())? {
                scan_frames(&mut reader, |frame| {
                    if let Some(record) = decode_frame::<T>(frame)? {
                        newest.insert(record.id(), record);
                    }
                    Ok(false)
                })?;
            }

            let mut records: Vec<T> = newest
                .into_values()
                .filter(|record| !record.is_deleted() && predicate(record))
                .collect();

            records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
            Ok(records)
        })
    }

    /// Distinct years carrying at least one live record, most recent
    /// first. A tombstone removes its identifier's entry from the fold
    /// entirely — only the presence of a live record matters for a year.
    pub fn list_years(&self) -> Result<Vec<i32>> {
        self.with_store_lock(|_index| {
            let mut stamps: HashMap<Uuid, DateTime<Utc>> = HashMap::new();

            if let Some(mut reader) = open_reader(&self.log_path())? {
                scan_frames(&mut reader, |frame| {
                    if let Some(record) = decode_frame::<T>(frame)? {
                        if record.is_deleted() {
                            stamps.remove(&record.id());
                        } else {
                            stamps.insert(record.id(), record.timestamp());
                        }
                    }
                    Ok(false)
                })?;
            }

            let years: BTreeSet<i32> = stamps.values().map(|ts| ts.year()).collect();
            Ok(years.into_iter().rev().collect())
        })
    }

    /// Logically delete `id`: append a tombstone frame and drop the
    /// identifier from the index. The original frames are never erased —
    /// the history stays in the file but becomes invisible to every read
    /// operation.
    pub fn delete_by_id(&self, id: Uuid) -> Result<()> {
        self.with_store_lock(|index| {
            let tombstone = T::tombstone(id);
            self.append_frame(&tombstone)?;
            index.remove(id);

            tracing::debug!(%id, "tombstoned record");
            Ok(())
        })
    }

    /// Live-record count and current log size.
    pub fn stats(&self) -> Result<StoreStats> {
        self.with_store_lock(|index| {
            let file_size_bytes = match std::fs::metadata(self.log_path()) {
                Ok(meta) => meta.len(),
                Err(err) if err.kind() == ErrorKind::NotFound => 0,
                Err(err) => return Err(err.into()),
            };

            Ok(StoreStats {
                live_records: index.len() as u64,
                file_size_bytes,
            })
        })
    }

    /// Walk the whole log and check the identifier cross-check of every
    /// complete frame, reporting rather than failing: `Ok(false)` on the
    /// first frame that does not decode cleanly.
    pub fn verify(&self) -> Result<bool> {
        self.with_store_lock(|_index| {
            let Some(mut reader) = open_reader(&self.log_path())? else {
                return Ok(true);
            };

            let mut intact = true;
            scan_frames(&mut reader, |frame| match decode_frame::<T>(frame) {
                Ok(_) => Ok(false),
                Err(
                    Error::Corruption { .. }
                    | Error::InvalidIdentifier { .. }
                    | Error::Serialization(_),
                ) => {
                    intact = false;
                    Ok(true)
                }
                Err(err) => Err(err),
            })?;

            Ok(intact)
        })
    }
}
