//! Reader for `Transfer-Encoding: chunked` request bodies.
//!
//! The framing is line oriented: a hex size line (extensions after `;` are
//! ignored), that many data bytes, a CRLF, and so on until a zero size line.
//! Trailer fields after the last chunk are read and dropped.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadItem};

/// Longest size or trailer line accepted before the input is rejected.
const MAX_LINE_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    SizeLine,
    Data { remaining: u64 },
    DataCrlf,
    Trailers,
    Done,
}

/// Decodes chunk data as it arrives, without waiting for whole chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    stage: Stage,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { stage: Stage::SizeLine }
    }

    /// True once the terminating zero-size chunk and trailers were consumed.
    pub fn is_finish(&self) -> bool {
        self.stage == Stage::Done
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.stage {
                Stage::SizeLine => {
                    let Some(line) = next_line(src)? else {
                        return Ok(None);
                    };
                    let size = parse_size(&line)?;
                    trace!(size, "chunk size line");
                    self.stage = if size == 0 { Stage::Trailers } else { Stage::Data { remaining: size } };
                }

                Stage::Data { remaining } => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let take = usize::try_from(remaining).map_or(src.len(), |r| r.min(src.len()));
                    let left = remaining - take as u64;
                    self.stage = if left == 0 { Stage::DataCrlf } else { Stage::Data { remaining: left } };
                    return Ok(Some(PayloadItem::Chunk(src.split_to(take).freeze())));
                }

                Stage::DataCrlf => {
                    if src.len() < 2 {
                        ensure!(src.first().is_none_or(|b| *b == b'\r'), ParseError::invalid_chunk("missing CRLF after chunk data"));
                        return Ok(None);
                    }
                    ensure!(src.starts_with(b"\r\n"), ParseError::invalid_chunk("missing CRLF after chunk data"));
                    src.advance(2);
                    self.stage = Stage::SizeLine;
                }

                Stage::Trailers => {
                    let Some(line) = next_line(src)? else {
                        return Ok(None);
                    };
                    if line.is_empty() {
                        trace!("finished reading chunked body");
                        self.stage = Stage::Done;
                    } else {
                        trace!(len = line.len(), "dropping trailer field");
                    }
                }

                Stage::Done => return Ok(Some(PayloadItem::Eof)),
            }
        }
    }
}

/// Splits one CRLF terminated line off `src`, without the terminator.
fn next_line(src: &mut BytesMut) -> Result<Option<BytesMut>, ParseError> {
    let Some(lf) = src.iter().position(|b| *b == b'\n') else {
        ensure!(src.len() <= MAX_LINE_BYTES, ParseError::invalid_chunk("chunk line too long"));
        return Ok(None);
    };

    ensure!(lf > 0 && src[lf - 1] == b'\r', ParseError::invalid_chunk("chunk line not terminated by CRLF"));
    ensure!(lf <= MAX_LINE_BYTES, ParseError::invalid_chunk("chunk line too long"));

    let mut line = src.split_to(lf + 1);
    line.truncate(lf - 1);
    Ok(Some(line))
}

/// Parses the hex size of a size line; extensions and trailing blanks are skipped.
fn parse_size(line: &[u8]) -> Result<u64, ParseError> {
    let digits = line.split(|b| *b == b';').next().unwrap_or_default();
    let digits = match digits.iter().rposition(|b| !matches!(b, b' ' | b'\t')) {
        Some(end) => &digits[..=end],
        None => &[][..],
    };
    ensure!(!digits.is_empty(), ParseError::invalid_chunk("empty chunk size"));

    digits.iter().try_fold(0u64, |size, b| {
        let digit = char::from(*b).to_digit(16).ok_or(ParseError::invalid_chunk("invalid chunk size digit"))?;
        size.checked_mul(16)
            .and_then(|size| size.checked_add(u64::from(digit)))
            .ok_or(ParseError::invalid_chunk("chunk size overflows"))
    })
}
