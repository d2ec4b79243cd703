//! Readable, closable byte sources
//!
//! Every stage of the push pipeline speaks the same capability: pull bytes
//! with `std::io::Read`, release the underlying resource with `close`.
//! Decorators own exactly one inner source and forward `close` to it once.

use std::fmt;
use std::io::{self, Read};

/// A byte stream that can be pulled from and closed.
pub trait ReadClose: Read {
    /// Release the underlying resource.
    ///
    /// The first call closes and reports the resource's own result. Later
    /// calls return `StreamError::AlreadyClosed` and touch nothing.
    fn close(&mut self) -> Result<(), StreamError>;
}

impl<T: ReadClose + ?Sized> ReadClose for Box<T> {
    fn close(&mut self) -> Result<(), StreamError> {
        (**self).close()
    }
}

/// Stream lifecycle errors
#[derive(Debug)]
pub enum StreamError {
    /// The wrapped resource failed to close
    Io(io::Error),
    /// `close` was already called on this stream
    AlreadyClosed,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Io(e) => write!(f, "close failed: {}", e),
            StreamError::AlreadyClosed => write!(f, "stream already closed"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Io(e) => Some(e),
            StreamError::AlreadyClosed => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        StreamError::Io(e)
    }
}

/// Error returned by reads on a stream that has been closed.
pub(crate) fn read_after_close() -> io::Error {
    io::Error::new(io::ErrorKind::Other, StreamError::AlreadyClosed)
}

/// Close tracking shared by the decorators.
///
/// Holds the "closed" bit so each decorator forwards `close` to its inner
/// source at most once, whether it is called explicitly or from `Drop`.
#[derive(Debug, Default)]
pub(crate) struct CloseGuard {
    closed: bool,
}

impl CloseGuard {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn close<R: ReadClose + ?Sized>(&mut self, inner: &mut R) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::AlreadyClosed);
        }
        self.closed = true;
        inner.close()
    }

    /// Close from a destructor, logging instead of returning the error.
    pub(crate) fn close_on_drop<R: ReadClose + ?Sized>(&mut self, inner: &mut R, stage: &str) {
        if self.closed {
            return;
        }
        if let Err(e) = self.close(inner) {
            log::warn!("{} dropped without close, closing wrapped stream failed: {}", stage, e);
        }
    }
}

/// Adapts any `Read` into a `ReadClose` whose close does nothing but
/// mark the stream closed.
pub struct NopClose<R> {
    inner: R,
    closed: bool,
}

impl<R: Read> NopClose<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, closed: false }
    }
}

impl<R: Read> Read for NopClose<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(read_after_close());
        }
        self.inner.read(buf)
    }
}

impl<R: Read> ReadClose for NopClose<R> {
    fn close(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::AlreadyClosed);
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nop_close_reads_through() {
        let mut src = NopClose::new(&b"abc"[..]);
        let mut out = Vec::new();
        src.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_nop_close_twice() {
        let mut src = NopClose::new(&b""[..]);
        assert!(src.close().is_ok());
        assert!(matches!(src.close(), Err(StreamError::AlreadyClosed)));
    }

    #[test]
    fn test_read_after_close() {
        let mut src = NopClose::new(&b"abc"[..]);
        src.close().unwrap();
        let mut buf = [0u8; 4];
        let err = src.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(err.to_string().contains("already closed"));
    }

    #[test]
    fn test_stream_error_display() {
        let err = StreamError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(err.to_string().contains("gone"));
    }
}
