//! On-disk frame format and forward scanning.
//!
//! A frame is three parts, each on its own line: the separator token, the
//! record identifier, and the serde_json payload. Everything between an
//! identifier line and the next separator is one payload unit, so a
//! payload serialization that spans lines still decodes as one record.

use std::io::{Read, Seek};

use uuid::Uuid;

use crate::constants::FRAME_SEPARATOR;
use crate::error::{Error, Result};
use crate::storage::line_reader::LineReader;
use crate::types::Record;

/// One scanned frame, before decoding.
pub(crate) struct RawFrame<'a> {
    /// The identifier line, as written.
    pub id_text: &'a str,
    /// The payload lines, joined back with `\n`.
    pub payload: &'a str,
    /// Byte offset of the identifier line. This is what the index stores.
    pub offset: u64,
    /// False only for a final frame terminated by end-of-stream instead of
    /// a separator: an interrupted append may have left it without its
    /// tail, so decode failures on it are skippable rather than fatal.
    pub complete: bool,
}

/// Encode one frame as a single contiguous buffer, so the append is one
/// write syscall. Returns the buffer and the offset of the identifier line
/// within it; the caller adds the current file length to get the offset
/// the index should record.
pub(crate) fn frame_bytes(id: Uuid, payload_json: &str) -> (Vec<u8>, u64) {
    let id_text = id.to_string();

    let mut buf =
        Vec::with_capacity(FRAME_SEPARATOR.len() + id_text.len() + payload_json.len() + 3);
    buf.extend_from_slice(FRAME_SEPARATOR.as_bytes());
    buf.push(b'\n');
    let id_line_offset = buf.len() as u64;
    buf.extend_from_slice(id_text.as_bytes());
    buf.push(b'\n');
    buf.extend_from_slice(payload_json.as_bytes());
    buf.push(b'\n');

    (buf, id_line_offset)
}

/// Scan frames forward from the reader's current position, invoking
/// `on_frame` as each one closes (at the next separator, or at end of
/// stream). The callback returns `Ok(true)` to stop scanning early.
///
/// The scan may start either at a separator (full-file scans) or directly
/// at an identifier line (point lookups seeking to an indexed offset);
/// in both cases the first line after a separator is the identifier and
/// the frame's offset is the reader's committed position at that line.
pub(crate) fn scan_frames<R, F>(reader: &mut LineReader<R>, mut on_frame: F) -> Result<()>
where
    R: Read + Seek,
    F: FnMut(&RawFrame<'_>) -> Result<bool>,
{
    let mut id_line: Option<String> = None;
    let mut payload = String::new();
    let mut frame_start = reader.position();

    while let Some(line) = reader.read_line()? {
        if line == FRAME_SEPARATOR {
            if let Some(id) = id_line.take() {
                // A leading separator opens an empty frame; skip it.
                if !(id.is_empty() && payload.is_empty()) {
                    let frame = RawFrame {
                        id_text: &id,
                        payload: &payload,
                        offset: frame_start,
                        complete: true,
                    };
                    if on_frame(&frame)? {
                        return Ok(());
                    }
                }
            }
            payload.clear();
            frame_start = reader.position();
        } else if id_line.is_none() {
            id_line = Some(line);
        } else {
            if !payload.is_empty() {
                payload.push('\n');
            }
            payload.push_str(&line);
        }
    }

    if let Some(id) = id_line {
        if !(id.is_empty() && payload.is_empty()) {
            let frame = RawFrame {
                id_text: &id,
                payload: &payload,
                offset: frame_start,
                complete: false,
            };
            on_frame(&frame)?;
        }
    }

    Ok(())
}

/// Decode a scanned frame into a record, enforcing the frame invariant:
/// the identifier line must equal the identifier embedded in the payload.
///
/// A mismatch is data corruption and always fatal. Parse failures are
/// fatal too, except on an incomplete trailing frame, which an interrupted
/// append can legitimately leave behind; those are logged and skipped.
pub(crate) fn decode_frame<T: Record>(frame: &RawFrame<'_>) -> Result<Option<T>> {
    let line_id = match Uuid::parse_str(frame.id_text.trim()) {
        Ok(id) => id,
        Err(source) if frame.complete => {
            return Err(Error::InvalidIdentifier {
                offset: frame.offset,
                source,
            });
        }
        Err(_) => {
            tracing::warn!(
                offset = frame.offset,
                "skipping truncated trailing frame with unparseable identifier line"
            );
            return Ok(None);
        }
    };

    let record: T = match serde_json::from_str(frame.payload) {
        Ok(record) => record,
        Err(err) if frame.complete => return Err(Error::Serialization(err)),
        Err(err) => {
            tracing::warn!(
                offset = frame.offset,
                error = %err,
                "skipping truncated trailing frame"
            );
            return Ok(None);
        }
    };

    if record.id() != line_id {
        return Err(Error::Corruption {
            offset: frame.offset,
            line_id,
            embedded_id: record.id(),
        });
    }

    Ok(Some(record))
}
