use std::collections::HashMap;
use std::io::{Read, Seek};

use uuid::Uuid;

use crate::error::Result;
use crate::storage::framing::{decode_frame, scan_frames};
use crate::storage::line_reader::LineReader;
use crate::types::Record;

/// Identifier → byte offset of the identifier line of that identifier's
/// most recent frame.
///
/// Owned by one store instance and guarded by its lock; never persisted.
/// The log is the sole source of truth — the index can be thrown away and
/// rebuilt from a full scan at any time. Deleted identifiers are simply
/// absent, even though their older frames remain in the file.
#[derive(Debug, Default)]
pub struct OffsetIndex {
    map: HashMap<Uuid, u64>,
}

impl OffsetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<u64> {
        self.map.get(&id).copied()
    }

    /// Overwrite semantics: last write wins.
    pub fn set(&mut self, id: Uuid, offset: u64) {
        self.map.insert(id, offset);
    }

    pub fn remove(&mut self, id: Uuid) {
        self.map.remove(&id);
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Reconstruct the index from a reader positioned at the start of the
    /// log. Frames are replayed in file order, so the offset recorded for
    /// each identifier is that of its last frame; a tombstone as the last
    /// frame removes the identifier entirely.
    pub fn rebuild<T, R>(&mut self, reader: &mut LineReader<R>) -> Result<()>
    where
        T: Record,
        R: Read + Seek,
    {
        self.map.clear();

        scan_frames(reader, |frame| {
            if let Some(record) = decode_frame::<T>(frame)? {
                if record.is_deleted() {
                    self.map.remove(&record.id());
                } else {
                    self.map.insert(record.id(), frame.offset);
                }
            }
            Ok(false)
        })
    }
}
