// Stream framing: [u32 BE length of the rest][u16 type][u32 request id for
// REQUEST and RESPONSE kinds][payload]. The length prefix lets a reader skip
// frames it cannot parse without losing its place in the stream.

use crate::error::{NodeError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const LENGTH_BYTES: usize = 4;
const TYPE_BYTES: usize = 2;
pub const REQUEST_ID_BYTES: usize = 4;

/// One frame with its length prefix stripped and the type code read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub type_code: u16,
    /// Request id (if the type carries one) followed by the payload
    pub body: Bytes,
}

pub fn encode_frame(type_code: u16, request_id: Option<u32>, payload: &[u8]) -> Result<Bytes> {
    let id_len = if request_id.is_some() { REQUEST_ID_BYTES } else { 0 };
    let length = TYPE_BYTES + id_len + payload.len();
    if length > MAX_FRAME_SIZE {
        return Err(NodeError::Protocol(format!(
            "Frame of {length} bytes exceeds the {MAX_FRAME_SIZE} byte limit"
        )));
    }

    let mut buf = BytesMut::with_capacity(LENGTH_BYTES + length);
    buf.put_u32(length as u32);
    buf.put_u16(type_code);
    if let Some(id) = request_id {
        buf.put_u32(id);
    }
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Accumulates stream bytes and cuts them into frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> FrameDecoder {
        FrameDecoder {
            buffer: BytesMut::with_capacity(8 * 1024),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete frame, or None until more bytes arrive. A length the
    /// stream can never satisfy is a protocol error: the connection has to
    /// go because framing cannot resynchronise.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.buffer.len() < LENGTH_BYTES {
            return Ok(None);
        }
        let mut length_bytes = [0u8; LENGTH_BYTES];
        length_bytes.copy_from_slice(&self.buffer[..LENGTH_BYTES]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        if length > MAX_FRAME_SIZE {
            return Err(NodeError::Protocol(format!(
                "Peer announced a {length} byte frame"
            )));
        }
        if length < TYPE_BYTES {
            return Err(NodeError::Protocol(format!(
                "Frame of {length} bytes has no type code"
            )));
        }
        if self.buffer.len() < LENGTH_BYTES + length {
            self.buffer.reserve(LENGTH_BYTES + length - self.buffer.len());
            return Ok(None);
        }

        self.buffer.advance(LENGTH_BYTES);
        let mut frame = self.buffer.split_to(length);
        let type_code = frame.get_u16();
        Ok(Some(RawFrame {
            type_code,
            body: frame.freeze(),
        }))
    }
}
