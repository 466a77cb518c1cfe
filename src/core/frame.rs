// Incremental SSE frame decoding: bytes in, blank-line delimited text blocks out.
use crate::core::error::{Error, ErrorKind};
use std::io::{self, Read};

pub const FRAME_DELIMITER: &str = "\n\n";
pub const READ_CHUNK_LEN: usize = 8 * 1024;

/// Buffers decoded text across chunks and splits it on `"\n\n"`.
///
/// UTF-8 sequences split across chunk boundaries are held back in `pending`
/// until the rest of the sequence arrives. Invalid sequences decode to
/// U+FFFD. Bytes after the last delimiter stay buffered until a later chunk
/// completes the frame.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();
    }

    /// Pops the oldest complete frame, trimmed. Empty frames are returned as-is.
    pub fn next_frame(&mut self) -> Option<String> {
        let idx = self.buffer.find(FRAME_DELIMITER)?;
        let frame = self.buffer[..idx].trim().to_string();
        self.buffer.drain(..idx + FRAME_DELIMITER.len());
        Some(frame)
    }

    pub fn drain_frames(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    fn decode_pending(&mut self) {
        let mut consumed = 0;
        while consumed < self.pending.len() {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    let prefix = &self.pending[consumed..consumed + valid];
                    self.buffer
                        .push_str(std::str::from_utf8(prefix).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + len;
                        }
                        None => {
                            // Incomplete trailing sequence; wait for more bytes.
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }
}

/// Pulls chunks from a byte stream and hands back every frame each chunk completes.
pub struct FrameReader<R> {
    reader: R,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(),
            chunk: vec![0u8; READ_CHUNK_LEN],
        }
    }

    /// Reads one chunk. Returns `Ok(None)` at end of stream, otherwise all
    /// frames completed by this chunk in stream order (possibly none).
    pub fn read_batch(&mut self) -> Result<Option<Vec<String>>, Error> {
        loop {
            match self.reader.read(&mut self.chunk) {
                Ok(0) => return Ok(None),
                Ok(read) => {
                    self.decoder.push(&self.chunk[..read]);
                    return Ok(Some(self.decoder.drain_frames()));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(Error::new(ErrorKind::Io)
                        .with_message("failed to read event stream")
                        .with_source(err));
                }
            }
        }
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameDecoder, FrameReader};
    use crate::core::error::ErrorKind;
    use std::io::{self, Read};

    const BODY: &str = "event: repo\ndata: {\"Name\":\"alpha\"}\n\n\
                        \n\n\
                        event: repo\ndata: {\"Name\":\"βeta ✓\"}\n\n\
                        : comment only\n\n\
                        event: fetch\ndata: {}\n\ntrailing-without-delimiter";

    fn frames_for_whole_body() -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        decoder.push(BODY.as_bytes());
        decoder.drain_frames()
    }

    #[test]
    fn splits_on_blank_line_and_trims() {
        let frames = frames_for_whole_body();
        assert_eq!(
            frames,
            vec![
                "event: repo\ndata: {\"Name\":\"alpha\"}".to_string(),
                String::new(),
                "event: repo\ndata: {\"Name\":\"βeta ✓\"}".to_string(),
                ": comment only".to_string(),
                "event: fetch\ndata: {}".to_string(),
            ]
        );
    }

    #[test]
    fn keeps_partial_trailing_bytes_buffered() {
        let mut decoder = FrameDecoder::new();
        decoder.push(BODY.as_bytes());
        let _ = decoder.drain_frames();
        assert_eq!(decoder.buffered(), "trailing-without-delimiter");

        decoder.push(b"\n\n");
        assert_eq!(
            decoder.next_frame().as_deref(),
            Some("trailing-without-delimiter")
        );
        assert_eq!(decoder.buffered(), "");
    }

    #[test]
    fn every_split_point_yields_identical_frames() {
        let expected = frames_for_whole_body();
        let bytes = BODY.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = FrameDecoder::new();
            decoder.push(&bytes[..split]);
            let mut frames = decoder.drain_frames();
            decoder.push(&bytes[split..]);
            frames.extend(decoder.drain_frames());
            assert_eq!(frames, expected, "split at byte {split}");
        }
    }

    #[test]
    fn byte_at_a_time_matches_whole_body() {
        let expected = frames_for_whole_body();
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in BODY.as_bytes() {
            decoder.push(std::slice::from_ref(byte));
            frames.extend(decoder.drain_frames());
        }
        assert_eq!(frames, expected);
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn split_multibyte_char_waits_for_continuation() {
        let mut decoder = FrameDecoder::new();
        let check = "✓".as_bytes();
        decoder.push(b"data: ");
        decoder.push(&check[..1]);
        assert_eq!(decoder.pending_bytes(), 1);
        assert_eq!(decoder.buffered(), "data: ");
        decoder.push(&check[1..]);
        decoder.push(b"\n\n");
        assert_eq!(decoder.next_frame().as_deref(), Some("data: ✓"));
    }

    #[test]
    fn invalid_utf8_becomes_replacement_char() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: a\xFFb\n\n");
        assert_eq!(decoder.next_frame().as_deref(), Some("data: a\u{FFFD}b"));
    }

    struct Chunked {
        chunks: Vec<Vec<u8>>,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn reader_drains_all_frames_of_a_chunk_before_next_read() {
        let chunks = vec![
            b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\nevent: c\nda".to_vec(),
            b"ta: 3\n\n".to_vec(),
        ];
        let mut reader = FrameReader::new(Chunked { chunks });
        let first = reader.read_batch().expect("read").expect("batch");
        assert_eq!(first, vec!["event: a\ndata: 1", "event: b\ndata: 2"]);
        let second = reader.read_batch().expect("read").expect("batch");
        assert_eq!(second, vec!["event: c\ndata: 3"]);
        assert!(reader.read_batch().expect("read").is_none());
        assert_eq!(reader.decoder().buffered(), "");
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn reader_maps_read_failure_to_io_error() {
        let mut reader = FrameReader::new(Broken);
        let err = reader.read_batch().expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
