//! Type Declaration Filter
//!
//! Neutralizes `# TYPE` lines in a Prometheus text exposition stream.
//! The filter recognizes `#[ \t]+TYPE[ \t]` and overwrites the single
//! trailing whitespace byte with `X`, so `# TYPE foo counter` becomes
//! `# TYPEXfoo counter`. The Pushgateway then treats the line as a plain
//! comment and every pushed metric falls back to `untyped`.
//!
//! Properties:
//! - O(1) per byte, no buffering, output length == input length
//! - State survives across reads, so any chunking gives the same output
//! - Byte-wise scanning is UTF-8 safe: ASCII bytes never appear inside a
//!   multi-byte sequence, whose bytes all have the high bit set
//!
//! A mismatching byte is consumed by the failed attempt and is not looked
//! at again as a potential `#`, so `"# # TYPE foo"` passes unchanged.
//! Output compatibility with existing deployments depends on keeping this.

use std::io::{self, Read};

use memchr::memchr;

use super::source::{read_after_close, CloseGuard, ReadClose, StreamError};

const HASH: u8 = b'#';

/// Written over the whitespace byte that completes a match.
pub const SENTINEL: u8 = b'X';

#[inline]
fn is_space_or_tab(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

/// Position of the recognizer within `#[ \t]+TYPE[ \t]`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanState {
    /// Searching for `#`
    #[default]
    Start,
    /// Just saw `#`
    Comment,
    /// Inside the whitespace run after `#`
    Whitespace,
    SawT,
    SawTY,
    SawTYP,
    /// Next byte decides the match
    SawTYPE,
}

/// The recognizer on its own, independent of any stream.
#[derive(Clone, Debug, Default)]
pub struct TypeLineScanner {
    state: ScanState,
    rewrites: u64,
}

impl TypeLineScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite `buf` in place, carrying state over from the previous call.
    ///
    /// Returns the number of type lines neutralized in this buffer.
    pub fn rewrite(&mut self, buf: &mut [u8]) -> usize {
        let mut neutralized = 0;
        let mut i = 0;

        while i < buf.len() {
            self.state = match self.state {
                ScanState::Start => match memchr(HASH, &buf[i..]) {
                    Some(offset) => {
                        i += offset;
                        ScanState::Comment
                    }
                    // Nothing to remember, the next buffer starts fresh
                    None => break,
                },
                ScanState::Comment if is_space_or_tab(buf[i]) => ScanState::Whitespace,
                ScanState::Whitespace if is_space_or_tab(buf[i]) => ScanState::Whitespace,
                ScanState::Whitespace if buf[i] == b'T' => ScanState::SawT,
                ScanState::SawT if buf[i] == b'Y' => ScanState::SawTY,
                ScanState::SawTY if buf[i] == b'P' => ScanState::SawTYP,
                ScanState::SawTYP if buf[i] == b'E' => ScanState::SawTYPE,
                ScanState::SawTYPE => {
                    if is_space_or_tab(buf[i]) {
                        buf[i] = SENTINEL;
                        neutralized += 1;
                    }
                    ScanState::Start
                }
                _ => ScanState::Start,
            };
            i += 1;
        }

        self.rewrites += neutralized as u64;
        neutralized
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Total type lines neutralized since creation
    pub fn rewrites(&self) -> u64 {
        self.rewrites
    }
}

/// Stream decorator applying `TypeLineScanner` to everything read through it.
pub struct TypeFilter<R: ReadClose> {
    inner: R,
    scanner: TypeLineScanner,
    guard: CloseGuard,
}

impl<R: ReadClose> TypeFilter<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            scanner: TypeLineScanner::new(),
            guard: CloseGuard::default(),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn state(&self) -> ScanState {
        self.scanner.state()
    }

    /// Type lines neutralized so far
    pub fn rewrites(&self) -> u64 {
        self.scanner.rewrites()
    }
}

impl<R: ReadClose> Read for TypeFilter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.guard.is_closed() {
            return Err(read_after_close());
        }
        // Errors, EOF and empty reads pass through untouched
        let n = self.inner.read(buf)?;
        self.scanner.rewrite(&mut buf[..n]);
        Ok(n)
    }
}

impl<R: ReadClose> ReadClose for TypeFilter<R> {
    fn close(&mut self) -> Result<(), StreamError> {
        self.guard.close(&mut self.inner)
    }
}

impl<R: ReadClose> Drop for TypeFilter<R> {
    fn drop(&mut self) {
        self.guard.close_on_drop(&mut self.inner, "type filter");
    }
}
