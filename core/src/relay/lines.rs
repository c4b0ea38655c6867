//! Encoding detection and the forward-only line sequence

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;
use flate2::read::GzDecoder;
use std::io::{self, BufRead, BufReader, Cursor, Read};

/// Bytes inspected to guess the encoding
const SNIFF_LEN: usize = 512;

/// Guess the text encoding from the first bytes of a stream.
///
/// A byte order mark decides outright. Without one, a stream whose odd
/// (or even) bytes are mostly NUL is taken as UTF-16 LE (or BE).
/// `None` means UTF-8.
pub fn detect_encoding(prefix: &[u8]) -> Option<&'static Encoding> {
    if let Some((encoding, _)) = Encoding::for_bom(prefix) {
        return Some(encoding);
    }
    if prefix.len() < 2 {
        return None;
    }

    let pairs = prefix.len() / 2;
    let (mut even_nul, mut odd_nul) = (0usize, 0usize);
    for pair in prefix.chunks_exact(2) {
        if pair[0] == 0 {
            even_nul += 1;
        }
        if pair[1] == 0 {
            odd_nul += 1;
        }
    }

    if odd_nul * 2 > pairs && even_nul * 4 < pairs {
        Some(UTF_16LE)
    } else if even_nul * 2 > pairs && odd_nul * 4 < pairs {
        Some(UTF_16BE)
    } else {
        None
    }
}

/// Lazy, finite sequence of decoded text lines.
///
/// Iteration ends at end of stream or at the first read error; the error
/// is kept for [`LineStream::take_error`].
pub struct LineStream {
    reader: Box<dyn BufRead + Send>,
    error: Option<io::Error>,
    lines_read: u64,
    done: bool,
}

impl LineStream {
    pub fn new(reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            reader,
            error: None,
            lines_read: 0,
            done: false,
        }
    }

    /// The read error that ended iteration, if any
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Lines yielded so far
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl Iterator for LineStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                while line.ends_with(['\n', '\r']) {
                    line.pop();
                }
                self.lines_read += 1;
                Some(line)
            }
            Err(e) => {
                self.done = true;
                self.error = Some(e);
                None
            }
        }
    }
}

/// Detect the encoding of `reader` and expose it as lines
pub fn decode_lines<R: Read + Send + 'static>(mut reader: R) -> io::Result<LineStream> {
    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    (&mut reader).take(SNIFF_LEN as u64).read_to_end(&mut prefix)?;
    let encoding = detect_encoding(&prefix);

    let decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding.unwrap_or(UTF_8)))
        .bom_override(true)
        .strip_bom(true)
        .build(Cursor::new(prefix).chain(reader));

    Ok(LineStream::new(Box::new(BufReader::new(decoder))))
}

/// Lines of a gzip-compressed file
pub fn gzip_lines(file: std::fs::File) -> io::Result<LineStream> {
    decode_lines(GzDecoder::new(BufReader::new(file)))
}
