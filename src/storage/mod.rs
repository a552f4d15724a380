//! Low-level storage primitives for the append-only text log.
//!
//! This module contains the seekable line reader, the frame codec, the
//! byte-offset index, and advisory file locking. These are internal
//! implementation details; most users should interact through
//! [`Logbook`](crate::Logbook) instead.

pub mod file_lock;
pub(crate) mod framing;
pub mod line_reader;
pub mod offset_index;

pub use file_lock::FileLock;
pub use line_reader::LineReader;
pub use offset_index::OffsetIndex;
