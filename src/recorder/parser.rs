// src/recorder/parser.rs
//
// Splits the encoder's combined stdout/stderr into lines and recognises the
// segment muxer's "Opening '<path>' for writing" events.

use std::io::{self, Read};

use crossbeam::channel::Sender;

/// Size of each read from the encoder pipe.
pub const READ_CHUNK: usize = 100;

const SEGMENT_PREFIX: &str = "[segment";
const WRITING_MARKER: &str = "writing";

/// Reassembles text lines from arbitrary byte chunks.
///
/// `\n` terminates a line. `\r` drops whatever was buffered since the last
/// `\n`, which is how progress lines rewrite themselves in place.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            match b {
                b'\n' => {
                    lines.push(String::from_utf8_lossy(&self.buf).into_owned());
                    self.buf.clear();
                }
                b'\r' => self.buf.clear(),
                _ => self.buf.push(b),
            }
        }
        lines
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent<'a> {
    /// The muxer opened a new segment file.
    SegmentOpened(&'a str),
    /// Looked like a segment event but carried no quoted path.
    MalformedSegment,
    Other,
}

pub fn parse_line(line: &str) -> LineEvent<'_> {
    if !line.starts_with(SEGMENT_PREFIX) || !line.contains(WRITING_MARKER) {
        return LineEvent::Other;
    }
    match quoted(line) {
        Some(path) => LineEvent::SegmentOpened(path),
        None => LineEvent::MalformedSegment,
    }
}

/// Text between the first pair of single quotes, if non-empty.
fn quoted(line: &str) -> Option<&str> {
    let start = line.find('\'')? + 1;
    let len = line[start..].find('\'')?;
    (len > 0).then(|| &line[start..start + len])
}

/// Reads `reader` to end of stream in `READ_CHUNK` pieces and sends every
/// completed line to `tx`. Returns when the stream closes or the receiving
/// side has gone away; dropping `tx` then tells the consumer no more lines
/// follow.
pub fn pump_lines<R: Read>(mut reader: R, tx: Sender<String>) -> io::Result<()> {
    let mut splitter = LineSplitter::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        for line in splitter.feed(&chunk[..n]) {
            if tx.send(line).is_err() {
                return Ok(());
            }
        }
    }

    if splitter.pending() > 0 {
        log::debug!(
            "[parser] dropping {} unterminated bytes at end of stream",
            splitter.pending()
        );
    }
    Ok(())
}
