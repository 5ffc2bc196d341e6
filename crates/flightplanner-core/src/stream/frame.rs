// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Splits a byte stream into text blocks delimited by a blank line.
///
/// Bytes of a code point split across reads are held back until the rest
/// arrives. Invalid sequences decode to U+FFFD instead of failing the stream.
/// `\r\n` becomes `\n`; a `\r` ending a chunk waits for the next one.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    pending_cr: bool,
    buffer: String,
    /// Offset in `buffer` below which no separator can start.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every block it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);
        self.drain_blocks()
    }

    /// Ends the stream. Whatever is left never saw its separator and is dropped;
    /// returns the number of bytes discarded.
    pub fn finish(&mut self) -> usize {
        let leftover = self.buffered_len();
        if leftover > 0 {
            log::debug!("Discarding incomplete trailing block — bytes={}", leftover);
        }
        self.buffer.clear();
        self.pending.clear();
        self.pending_cr = false;
        self.scanned = 0;
        leftover
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len() + self.pending.len() + usize::from(self.pending_cr)
    }

    fn decode(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let mut fresh = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    fresh.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
                        fresh.push_str(text);
                    }
                    match e.error_len() {
                        // Truncated code point at the end: wait for the next chunk
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(bad) => {
                            fresh.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
        self.append_normalized(&fresh);
    }

    fn append_normalized(&mut self, text: &str) {
        for c in text.chars() {
            if self.pending_cr {
                self.pending_cr = false;
                if c == '\n' {
                    self.buffer.push('\n');
                    continue;
                }
                self.buffer.push('\r');
            }
            if c == '\r' {
                self.pending_cr = true;
            } else {
                self.buffer.push(c);
            }
        }
    }

    fn drain_blocks(&mut self) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut consumed = 0;
        let mut from = self.scanned;
        while let Some(pos) = self.buffer[from..].find(BLOCK_SEPARATOR) {
            let end = from + pos;
            let block = &self.buffer[consumed..end];
            if !block.trim().is_empty() {
                blocks.push(block.to_string());
            }
            consumed = end + BLOCK_SEPARATOR.len();
            from = consumed;
        }
        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        // A trailing '\n' may be the first half of the next separator
        self.scanned = if self.buffer.ends_with('\n') {
            self.buffer.len() - 1
        } else {
            self.buffer.len()
        };
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = "event: progress\ndata: {\"message\":\"Überflug — Zürich ✈\"}\n\n\
                          \n\n\
                          event: done\ndata: {\"plan\":{\"route\":[\"LSZH\",\"EDDM\"]}}\n\n\
                          event: progress\ndata: {\"message\":\"trailing\"}";

    fn feed_in_chunks(bytes: &[u8], size: usize) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut blocks = Vec::new();
        for chunk in bytes.chunks(size) {
            blocks.extend(decoder.push(chunk));
        }
        decoder.finish();
        blocks
    }

    #[test]
    fn test_whole_stream_blocks() {
        let blocks = feed_in_chunks(STREAM.as_bytes(), STREAM.len());
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("event: progress"));
        assert!(blocks[1].starts_with("event: done"));
    }

    #[test]
    fn test_chunking_is_invariant() {
        let crlf = STREAM.replace('\n', "\r\n");
        let inputs: Vec<Vec<u8>> = vec![
            STREAM.as_bytes().to_vec(),
            crlf.into_bytes(),
            b"event: x\r\r\ndata: 1\n\n\r\n\r\nevent: y\rdata: 2\r\n\r\n".to_vec(),
            b"data: a\xFFb\xE2\x9C\n\nevent: z\ndata: \xF0\x9F\x9B\xA9\xC3\n\n".to_vec(),
        ];
        for bytes in &inputs {
            let expected = feed_in_chunks(bytes, bytes.len());
            assert!(!expected.is_empty());
            // Size 1 splits every multi-byte code point, CRLF pair and separator
            for size in 1..=bytes.len() {
                assert_eq!(feed_in_chunks(bytes, size), expected, "chunk size {}", size);
            }
        }
    }

    #[test]
    fn test_lone_cr_kept_before_crlf() {
        let whole = feed_in_chunks(b"event: x\r\r\ndata: 1\n\n", 64);
        assert_eq!(whole, vec!["event: x\r\ndata: 1"]);
        assert_eq!(feed_in_chunks(b"event: x\r\r\ndata: 1\n\n", 1), whole);
    }

    #[test]
    fn test_pending_cr_counts_as_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: 1\r").is_empty());
        assert_eq!(decoder.buffered_len(), "data: 1\r".len());
        assert_eq!(decoder.finish(), "data: 1\r".len());
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_long_block_in_small_chunks() {
        let payload = "é".repeat(5000);
        let text = format!("event: done\ndata: {}\n\n", payload);
        let mut decoder = FrameDecoder::new();
        let mut blocks = Vec::new();
        for chunk in text.as_bytes().chunks(3) {
            blocks.extend(decoder.push(chunk));
        }
        assert_eq!(blocks, vec![format!("event: done\ndata: {}", payload)]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_split_exactly_at_separator() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"event: a\ndata: 1\n").is_empty());
        assert_eq!(decoder.push(b"\nevent: b"), vec!["event: a\ndata: 1"]);
        assert_eq!(decoder.push(b"\ndata: 2\n\n"), vec!["event: b\ndata: 2"]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_split_inside_code_point() {
        let text = "data: ✈\n\n";
        let bytes = text.as_bytes();
        let plane = text.find('✈').unwrap();
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&bytes[..plane + 1]).is_empty());
        assert!(decoder.push(&bytes[plane + 1..plane + 2]).is_empty());
        assert_eq!(decoder.push(&bytes[plane + 2..]), vec!["data: ✈"]);
    }

    #[test]
    fn test_leftover_discarded_on_finish() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"event: done\ndata: {}").is_empty());
        assert_eq!(decoder.finish(), "event: done\ndata: {}".len());
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_whitespace_blocks_skipped() {
        let mut decoder = FrameDecoder::new();
        let blocks = decoder.push(b"  \n\n\t\n\nevent: x\ndata: 1\n\n");
        assert_eq!(blocks, vec!["event: x\ndata: 1"]);
    }

    #[test]
    fn test_crlf_framing() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"event: x\r\ndata: 1\r").is_empty());
        assert_eq!(decoder.push(b"\n\r\n"), vec!["event: x\ndata: 1"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = FrameDecoder::new();
        let blocks = decoder.push(b"data: a\xFFb\n\n");
        assert_eq!(blocks, vec!["data: a\u{FFFD}b"]);
    }
}
