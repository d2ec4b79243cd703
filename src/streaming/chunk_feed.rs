//! Push-to-pull bridge
//!
//! Envoy hands the filter body chunks through callbacks, while the rewrite
//! pipeline pulls with `Read`. `ChunkFeed` queues pushed chunks for the
//! pipeline to drain.

use std::collections::VecDeque;
use std::io::{self, Read};

use super::source::{read_after_close, ReadClose, StreamError};

/// Queue of body chunks readable as a stream.
///
/// While empty and not finished, reads fail with `WouldBlock`. After
/// `finish`, an empty queue reads as EOF.
#[derive(Debug, Default)]
pub struct ChunkFeed {
    chunks: VecDeque<Vec<u8>>,
    /// Read offset into the front chunk
    offset: usize,
    finished: bool,
    closed: bool,
}

impl ChunkFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a chunk. Empty chunks are ignored.
    pub fn push(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.chunks.push_back(chunk);
        }
    }

    /// No more chunks will be pushed.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Bytes queued but not yet read
    pub fn pending(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum::<usize>() - self.offset
    }
}

impl Read for ChunkFeed {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(read_after_close());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let Some(front) = self.chunks.front() else {
            return if self.finished {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        };

        let n = (front.len() - self.offset).min(buf.len());
        buf[..n].copy_from_slice(&front[self.offset..self.offset + n]);
        self.offset += n;
        if self.offset == front.len() {
            self.chunks.pop_front();
            self.offset = 0;
        }
        Ok(n)
    }
}

impl ReadClose for ChunkFeed {
    fn close(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::AlreadyClosed);
        }
        self.closed = true;
        self.chunks.clear();
        self.offset = 0;
        Ok(())
    }
}
