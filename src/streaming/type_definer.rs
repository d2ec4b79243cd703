//! Type Definition Injector
//!
//! Serves the preamble before anything from the wrapped stream, then turns
//! into a pass-through. One instance per inbound push.

use std::io::{self, Read};

use super::preamble::Preamble;
use super::source::{read_after_close, CloseGuard, ReadClose, StreamError};

/// Stream decorator that prepends a `Preamble` to the wrapped stream.
///
/// A read returns either preamble bytes or wrapped-stream bytes, never a
/// mix of both.
pub struct TypeDefiner<R: ReadClose> {
    inner: R,
    preamble: Preamble,
    /// Preamble bytes already delivered
    cursor: usize,
    guard: CloseGuard,
}

impl<R: ReadClose> TypeDefiner<R> {
    pub fn new(inner: R, preamble: Preamble) -> Self {
        Self {
            inner,
            preamble,
            cursor: 0,
            guard: CloseGuard::default(),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Preamble bytes not yet delivered
    pub fn preamble_remaining(&self) -> usize {
        self.preamble.len() - self.cursor
    }
}

impl<R: ReadClose> Read for TypeDefiner<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.guard.is_closed() {
            return Err(read_after_close());
        }

        let remaining = &self.preamble.as_bytes()[self.cursor..];
        if !remaining.is_empty() {
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.cursor += n;
            return Ok(n);
        }

        self.inner.read(buf)
    }
}

impl<R: ReadClose> ReadClose for TypeDefiner<R> {
    fn close(&mut self) -> Result<(), StreamError> {
        self.guard.close(&mut self.inner)
    }
}

impl<R: ReadClose> Drop for TypeDefiner<R> {
    fn drop(&mut self) {
        self.guard.close_on_drop(&mut self.inner, "type definer");
    }
}
