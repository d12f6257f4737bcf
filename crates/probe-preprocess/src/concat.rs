//! Line-continuation reader.
//!
//! Wraps a line-buffered reader and yields its content one logical line at
//! a time: a physical line ending in `\` is emitted without its marker and
//! without a terminator, so the next physical line continues it. All other
//! lines get the platform [`LINE_SEPARATOR`](crate::LINE_SEPARATOR).
//!
//! The transformation is strictly forward; rewinding is rejected.

use std::io::{self, BufRead, Read, Seek, SeekFrom};

use crate::LINE_SEPARATOR;

const CONTINUATION: u8 = b'\\';

/// Reader that joins backslash-continued lines.
#[derive(Debug)]
pub struct ConcatenatingReader<R> {
    inner: R,
    /// Bytes of the current logical line still to be handed out.
    current: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<R: BufRead> ConcatenatingReader<R> {
    /// Wrap a line-buffered reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            current: Vec::new(),
            pos: 0,
            done: false,
        }
    }

    /// Whether a read would return data without reaching end of stream.
    pub fn ready(&mut self) -> io::Result<bool> {
        if self.pos < self.current.len() {
            return Ok(true);
        }
        if self.done {
            return Ok(false);
        }
        Ok(!self.inner.fill_buf()?.is_empty())
    }

    /// Discard up to `n` bytes of output, returning how many were skipped.
    /// Fewer than `n` means end of stream was reached.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut skipped = 0u64;
        while skipped < n {
            if self.pos == self.current.len() && !self.next_line()? {
                break;
            }
            let available = (self.current.len() - self.pos) as u64;
            let step = available.min(n - skipped);
            self.pos += step as usize;
            skipped += step;
        }
        Ok(skipped)
    }

    /// Always `false`: the stream cannot be rewound.
    pub fn mark_supported(&self) -> bool {
        false
    }

    /// Unsupported; always fails.
    pub fn mark(&mut self, _read_ahead_limit: usize) -> io::Result<()> {
        Err(rewind_unsupported())
    }

    /// Unsupported; always fails.
    pub fn reset(&mut self) -> io::Result<()> {
        Err(rewind_unsupported())
    }

    /// Recover the wrapped reader. Buffered but unread output is lost.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Load the next physical line into `current`. Returns `false` at end
    /// of input.
    fn next_line(&mut self) -> io::Result<bool> {
        self.current.clear();
        self.pos = 0;
        if self.done {
            return Ok(false);
        }

        let read = self.inner.read_until(b'\n', &mut self.current)?;
        if read == 0 {
            self.done = true;
            return Ok(false);
        }

        // Drop the physical terminator; it is put back below unless the
        // line is continued.
        if self.current.last() == Some(&b'\n') {
            self.current.pop();
            if self.current.last() == Some(&b'\r') {
                self.current.pop();
            }
        }

        let content_end = self
            .current
            .iter()
            .rposition(|b| !matches!(b, b' ' | b'\t'))
            .map_or(0, |i| i + 1);
        if content_end > 0 && self.current[content_end - 1] == CONTINUATION {
            self.current.truncate(content_end - 1);
        } else {
            self.current.extend_from_slice(LINE_SEPARATOR.as_bytes());
        }
        Ok(true)
    }
}

impl<R: BufRead> Read for ConcatenatingReader<R> {
    /// Fills `buf` completely unless the end of stream is reached.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            if self.pos == self.current.len() && !self.next_line()? {
                break;
            }
            let available = &self.current[self.pos..];
            let n = available.len().min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&available[..n]);
            self.pos += n;
            written += n;
        }
        Ok(written)
    }
}

impl<R> Seek for ConcatenatingReader<R> {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(rewind_unsupported())
    }
}

fn rewind_unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "mark/reset not supported")
}
