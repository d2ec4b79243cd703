//! Scripted sources for exercising the pipeline at chunk boundaries.

use std::cell::Cell;
use std::io::{self, Read};
use std::rc::Rc;

use super::source::{ReadClose, StreamError};

/// Serves a fixed list of fragments, one fragment per read, then EOF.
///
/// An empty fragment is reported as `ErrorKind::Interrupted`, the "no data
/// this time, call again" signal that `read_to_end` retries on.
pub struct FragmentSource {
    fragments: Vec<Vec<u8>>,
    index: usize,
    offset: usize,
    closes: Rc<Cell<usize>>,
    close_error: Option<io::ErrorKind>,
}

impl FragmentSource {
    pub fn new<S: AsRef<[u8]>>(fragments: &[S]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.as_ref().to_vec()).collect(),
            index: 0,
            offset: 0,
            closes: Rc::new(Cell::new(0)),
            close_error: None,
        }
    }

    /// Make `close` fail with the given kind.
    pub fn failing_close(mut self, kind: io::ErrorKind) -> Self {
        self.close_error = Some(kind);
        self
    }

    /// Shared counter of how many times `close` reached this source.
    pub fn close_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.closes)
    }
}

impl Read for FragmentSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(fragment) = self.fragments.get(self.index) else {
            return Ok(0);
        };
        if fragment.is_empty() {
            self.index += 1;
            return Err(io::ErrorKind::Interrupted.into());
        }
        let n = (fragment.len() - self.offset).min(buf.len());
        buf[..n].copy_from_slice(&fragment[self.offset..self.offset + n]);
        self.offset += n;
        if self.offset == fragment.len() {
            self.index += 1;
            self.offset = 0;
        }
        Ok(n)
    }
}

impl ReadClose for FragmentSource {
    fn close(&mut self) -> Result<(), StreamError> {
        self.closes.set(self.closes.get() + 1);
        match self.close_error {
            Some(kind) => Err(StreamError::Io(kind.into())),
            None => Ok(()),
        }
    }
}

/// Split `s` into three fragments at `i` and `j`, clamped so the first and
/// last fragments are non-empty. The middle one may be empty.
pub fn three_fragments(s: &[u8], i: usize, j: usize) -> [&[u8]; 3] {
    let last = s.len().saturating_sub(1);
    let i = i.clamp(1, last);
    let j = j.clamp(i, last);
    [&s[..i], &s[i..j], &s[j..]]
}

/// Read `reader` to the end, one `read` call per fragment, using a buffer
/// of `buf_size` bytes. Retries `Interrupted`.
pub fn drain<R: Read>(reader: &mut R, buf_size: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; buf_size];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(out),
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
