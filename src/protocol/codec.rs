use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use super::frame::{CommandFrame, Opcode};
use super::{HEADER_LEN, MAX_PAYLOAD};
use crate::core::Error;

/// Frame codec for encoding/decoding control protocol frames
///
/// Wire layout, all multi-byte integers big-endian:
///
/// ```text
/// opcode: u8 | parameter_id: u8 | sequence_id: u16 | payload_len: u16 | payload
/// ```
///
/// Decoding is incremental: a buffer may hold zero, one, or many frames and
/// a truncated trailing frame is left in place for the next read. A frame
/// with an unrecognized opcode but a plausible length is consumed and
/// skipped; a declared length above [`MAX_PAYLOAD`] means framing is lost
/// and decoding fails.
#[derive(Clone, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Creates a new frame codec
    pub fn new() -> Self {
        FrameCodec
    }
}

impl Decoder for FrameCodec {
    type Item = CommandFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < HEADER_LEN {
                // Need more data to read the header
                return Ok(None);
            }

            let payload_len = u16::from_be_bytes([src[4], src[5]]) as usize;
            if payload_len > MAX_PAYLOAD {
                return Err(Error::protocol(format!(
                    "declared payload length {} exceeds maximum {}",
                    payload_len, MAX_PAYLOAD
                )));
            }

            if src.len() < HEADER_LEN + payload_len {
                // Need more data to read the full frame
                src.reserve(HEADER_LEN + payload_len - src.len());
                return Ok(None);
            }

            let opcode_byte = src[0];
            let Some(opcode) = Opcode::from_u8(opcode_byte) else {
                // Well-framed but unrecognized; skip it and keep decoding
                debug!(opcode = opcode_byte, "skipping frame with unrecognized opcode");
                src.advance(HEADER_LEN + payload_len);
                continue;
            };

            let parameter_id = src[1];
            let sequence_id = u16::from_be_bytes([src[2], src[3]]);
            src.advance(HEADER_LEN);
            let payload = src.split_to(payload_len).freeze();

            return Ok(Some(CommandFrame {
                opcode,
                parameter_id,
                sequence_id,
                payload,
            }));
        }
    }
}

impl Encoder<CommandFrame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: CommandFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > MAX_PAYLOAD {
            return Err(Error::protocol(format!(
                "payload length {} exceeds maximum {}",
                item.payload.len(),
                MAX_PAYLOAD
            )));
        }

        dst.reserve(HEADER_LEN + item.payload.len());
        dst.put_u8(item.opcode as u8);
        dst.put_u8(item.parameter_id);
        dst.put_u16(item.sequence_id);
        dst.put_u16(item.payload.len() as u16);
        dst.extend_from_slice(&item.payload);

        Ok(())
    }
}
