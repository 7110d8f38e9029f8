// Newline-delimited message framing over TCP.
//
// One message per line: a JSON payload followed by a single `\n`. Both
// `write_line` and `FrameBuffer::feed` operate on raw `&[u8]` — the caller
// handles JSON serialization separately, keeping this module format-agnostic.
//
// `FrameBuffer` turns an arbitrary sequence of byte deliveries back into
// discrete lines: a message split across two reads, several messages
// concatenated in one read, and everything in between. Blank lines carry no
// message and are skipped.
//
// A `MAX_LINE_LEN` constant protects against unbounded buffering from a peer
// that never sends a delimiter. Full state snapshots are the largest expected
// messages and stay well under a kilobyte; 64 KB is generous headroom.

use std::io::{self, Write};

/// Maximum allowed line length (64 KB). Protects against unbounded buffering
/// from a peer that never terminates a line.
pub const MAX_LINE_LEN: usize = 64 * 1024;

const DELIMITER: u8 = b'\n';

/// Write one newline-terminated line: payload bytes, then `\n`, then flush.
///
/// Returns `InvalidInput` if the payload embeds the delimiter (it would be
/// read back as two messages) or exceeds `MAX_LINE_LEN`.
pub fn write_line<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    if payload.len() > MAX_LINE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message too large: {} bytes (max {MAX_LINE_LEN})", payload.len()),
        ));
    }
    if payload.contains(&DELIMITER) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "message payload embeds the line delimiter",
        ));
    }
    writer.write_all(payload)?;
    writer.write_all(&[DELIMITER])?;
    writer.flush()
}

/// Incremental line splitter for a continuous byte stream.
///
/// Feed it whatever each read delivers; it returns every complete line found
/// so far (delimiter stripped) and retains any trailing partial line for the
/// next call.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and extract every complete line now present.
    ///
    /// Returns `InvalidData` if the retained partial line exceeds
    /// `MAX_LINE_LEN`. A peer that never terminates a line is not speaking
    /// the protocol and the connection should be dropped.
    pub fn feed(&mut self, bytes: &[u8]) -> io::Result<Vec<Vec<u8>>> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == DELIMITER) {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if !line.is_empty() {
                lines.push(line);
            }
        }

        if self.buf.len() > MAX_LINE_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "unterminated line exceeds {MAX_LINE_LEN} bytes ({} buffered)",
                    self.buf.len()
                ),
            ));
        }
        Ok(lines)
    }

    /// Bytes held back waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_single_delivery() {
        let mut wire = Vec::new();
        write_line(&mut wire, b"hello, server!").unwrap();

        let mut frames = FrameBuffer::new();
        let lines = frames.feed(&wire).unwrap();
        assert_eq!(lines, vec![b"hello, server!".to_vec()]);
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn split_across_two_deliveries() {
        let mut wire = Vec::new();
        write_line(&mut wire, b"split me").unwrap();

        // Every split offset must reassemble to the same single message.
        for cut in 0..wire.len() {
            let mut frames = FrameBuffer::new();
            let first = frames.feed(&wire[..cut]).unwrap();
            let second = frames.feed(&wire[cut..]).unwrap();
            let all: Vec<Vec<u8>> = first.into_iter().chain(second).collect();
            assert_eq!(all, vec![b"split me".to_vec()], "cut at {cut}");
        }
    }

    #[test]
    fn concatenated_messages_in_order() {
        let mut wire = Vec::new();
        write_line(&mut wire, b"first").unwrap();
        write_line(&mut wire, b"second").unwrap();

        let mut frames = FrameBuffer::new();
        let lines = frames.feed(&wire).unwrap();
        assert_eq!(lines, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn empty_delivery_yields_nothing() {
        let mut frames = FrameBuffer::new();
        assert!(frames.feed(&[]).unwrap().is_empty());
    }

    #[test]
    fn partial_line_retained() {
        let mut frames = FrameBuffer::new();
        assert!(frames.feed(b"incompl").unwrap().is_empty());
        assert_eq!(frames.pending(), 7);

        let lines = frames.feed(b"ete\n").unwrap();
        assert_eq!(lines, vec![b"incomplete".to_vec()]);
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn blank_lines_skipped() {
        let mut frames = FrameBuffer::new();
        let lines = frames.feed(b"\n\na\n\n").unwrap();
        assert_eq!(lines, vec![b"a".to_vec()]);
    }

    #[test]
    fn rejects_oversized_write() {
        let big = vec![b'x'; MAX_LINE_LEN + 1];
        let mut wire = Vec::new();
        let err = write_line(&mut wire, &big).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_embedded_delimiter() {
        let mut wire = Vec::new();
        let err = write_line(&mut wire, b"two\nlines").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_unterminated_overrun() {
        let mut frames = FrameBuffer::new();
        let err = frames.feed(&vec![b'x'; MAX_LINE_LEN + 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
