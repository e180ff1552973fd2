use bytes::BytesMut;

use crate::utils::{Scratch, fmt_hex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false }
    }

    /// Frames `data` as one chunk. Empty input writes nothing, since a
    /// zero-size chunk would end the body.
    pub fn encode(&mut self, data: &[u8], dst: &mut BytesMut, scratch: &mut Scratch) {
        if self.eof || data.is_empty() {
            return;
        }

        let size = fmt_hex(data.len() as u64, scratch);
        dst.reserve(size.len() + data.len() + 4);
        dst.extend_from_slice(size);
        dst.extend_from_slice(b"\r\n");
        dst.extend_from_slice(data);
        dst.extend_from_slice(b"\r\n");
    }

    pub fn finish(&mut self, dst: &mut BytesMut) {
        if self.eof {
            return;
        }
        self.eof = true;
        dst.extend_from_slice(b"0\r\n\r\n");
    }
}
