//! Streaming Push Rewriter
//!
//! This rewriter does NOT accumulate the body. Each Envoy chunk is pushed
//! through `TypeDefiner<TypeFilter<ChunkFeed>>` and the rewritten bytes are
//! handed straight back. Memory usage is one read buffer regardless of
//! body size.

use std::io::{self, Read};

use crate::streaming::{ChunkFeed, Preamble, ReadClose, StreamError, TypeDefiner, TypeFilter};
use crate::telemetry::PushStats;

const READ_BUF_SIZE: usize = 8 * 1024;

type Pipeline = TypeDefiner<TypeFilter<ChunkFeed>>;

/// Rewrites one push body, chunk by chunk
pub struct PushRewriter {
    pipeline: Pipeline,
    read_buf: Vec<u8>,
    preamble_len: usize,
    bytes_in: u64,
    bytes_out: u64,
    complete: bool,
}

impl PushRewriter {
    pub fn new(preamble: Preamble) -> Self {
        let preamble_len = preamble.len();
        Self {
            pipeline: TypeDefiner::new(TypeFilter::new(ChunkFeed::new()), preamble),
            read_buf: vec![0u8; READ_BUF_SIZE],
            preamble_len,
            bytes_in: 0,
            bytes_out: 0,
            complete: false,
        }
    }

    /// Process a body chunk and return the bytes to forward in its place.
    ///
    /// The first call also returns the preamble. On `end_of_stream` the
    /// pipeline is drained and closed.
    pub fn on_body_chunk(&mut self, chunk: &[u8], end_of_stream: bool) -> Result<Vec<u8>, StreamError> {
        if self.complete {
            return Err(StreamError::AlreadyClosed);
        }

        self.bytes_in += chunk.len() as u64;
        let feed = self.pipeline.get_mut().get_mut();
        feed.push(chunk.to_vec());
        if end_of_stream {
            feed.finish();
        }

        let out = self.pump()?;
        self.bytes_out += out.len() as u64;

        if end_of_stream {
            self.complete = true;
            self.pipeline.close()?;
        }
        Ok(out)
    }

    /// Read until the feed runs dry or hits EOF
    fn pump(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.pipeline.preamble_remaining() + self.pipeline.get_ref().get_ref().pending());
        loop {
            match self.pipeline.read(&mut self.read_buf) {
                Ok(0) => return Ok(out),
                Ok(n) => out.extend_from_slice(&self.read_buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(out),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Check if the body has been fully processed
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn stats(&self) -> PushStats {
        PushStats {
            bytes_in: self.bytes_in,
            bytes_out: self.bytes_out,
            type_lines_neutralized: self.pipeline.get_ref().rewrites(),
            preamble_bytes: (self.preamble_len - self.pipeline.preamble_remaining()) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preamble() -> Preamble {
        Preamble::from_static(b"# TYPE pushgateway_build_info gauge\n")
    }

    #[test]
    fn test_single_chunk() {
        let mut rewriter = PushRewriter::new(preamble());
        let out = rewriter
            .on_body_chunk(b"# TYPE jobs counter\njobs 3\n", true)
            .unwrap();

        assert_eq!(
            out,
            b"# TYPE pushgateway_build_info gauge\n# TYPEXjobs counter\njobs 3\n"
        );
        assert!(rewriter.is_complete());
    }

    #[test]
    fn test_chunked_push() {
        let mut rewriter = PushRewriter::new(preamble());

        let first = rewriter.on_body_chunk(b"# TY", false).unwrap();
        assert_eq!(first, b"# TYPE pushgateway_build_info gauge\n# TY");

        let second = rewriter.on_body_chunk(b"PE\tjobs gauge\n", false).unwrap();
        assert_eq!(second, b"PEXjobs gauge\n");

        let last = rewriter.on_body_chunk(b"jobs 1\n", true).unwrap();
        assert_eq!(last, b"jobs 1\n");

        let stats = rewriter.stats();
        assert_eq!(stats.bytes_in, 4 + 14 + 7);
        assert_eq!(stats.bytes_out, stats.bytes_in + preamble().len() as u64);
        assert_eq!(stats.type_lines_neutralized, 1);
        assert_eq!(stats.preamble_bytes, preamble().len() as u64);
    }

    #[test]
    fn test_large_chunk_spans_read_buffers() {
        let line = "# TYPE m counter\nm 1\n";
        let body = line.repeat(READ_BUF_SIZE / line.len() * 3);
        let mut rewriter = PushRewriter::new(Preamble::default());
        let out = rewriter.on_body_chunk(body.as_bytes(), true).unwrap();

        let expected = [
            Preamble::default().as_bytes(),
            body.replace("# TYPE ", "# TYPEX").as_bytes(),
        ]
        .concat();
        assert_eq!(out, expected);
        assert_eq!(
            rewriter.stats().type_lines_neutralized,
            (READ_BUF_SIZE / line.len() * 3) as u64
        );
    }

    #[test]
    fn test_empty_body_gets_preamble() {
        let mut rewriter = PushRewriter::new(preamble());
        let out = rewriter.on_body_chunk(b"", true).unwrap();
        assert_eq!(out, preamble().as_bytes());
    }

    #[test]
    fn test_empty_intermediate_chunk() {
        let mut rewriter = PushRewriter::new(preamble());
        assert_eq!(rewriter.on_body_chunk(b"", false).unwrap(), preamble().as_bytes());
        assert!(rewriter.on_body_chunk(b"", false).unwrap().is_empty());
        assert_eq!(rewriter.on_body_chunk(b"a 1\n", true).unwrap(), b"a 1\n");
    }

    #[test]
    fn test_chunk_after_end_rejected() {
        let mut rewriter = PushRewriter::new(preamble());
        rewriter.on_body_chunk(b"a 1\n", true).unwrap();
        assert!(matches!(
            rewriter.on_body_chunk(b"b 2\n", true),
            Err(StreamError::AlreadyClosed)
        ));
    }
}
