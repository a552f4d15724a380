use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};

/// Line-oriented reader over a seekable byte stream that knows exactly how
/// many bytes it has handed out.
///
/// The wrapped [`BufReader`] is free to read ahead as much as it likes;
/// [`position`](Self::position) advances only by the bytes consumed into
/// lines actually returned from [`read_line`](Self::read_line). That
/// committed offset is the only kind of offset the store's index is
/// allowed to hold: it always lands on a line boundary, so a later
/// [`seek`](Self::seek) to it resumes decoding cleanly.
pub struct LineReader<R> {
    inner: BufReader<R>,
    position: u64,
}

impl<R: Read + Seek> LineReader<R> {
    /// Wrap a stream positioned at its start.
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            position: 0,
        }
    }

    /// Byte offset of the next unread line: the count of underlying bytes
    /// consumed into returned lines so far, relative to the stream start.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next line, without its terminator. `Ok(None)` at end of
    /// stream. A final line without a trailing newline is still returned,
    /// and its bytes still count toward [`position`](Self::position).
    pub fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let consumed = self.inner.read_line(&mut line)?;

        if consumed == 0 {
            return Ok(None);
        }

        self.position += consumed as u64;

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    /// Reposition to an arbitrary byte offset. Any read-ahead buffering is
    /// discarded (`BufReader`'s `Seek` impl drops its internal buffer), so
    /// the next [`read_line`](Self::read_line) decodes from exactly
    /// `offset` and [`position`](Self::position) tracks from there.
    pub fn seek(&mut self, offset: u64) -> std::io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }
}
