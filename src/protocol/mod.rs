//! Control protocol frames and wire codec
//!
//! This module defines the framed binary command protocol spoken over the
//! control connection and the discovery channel. No I/O happens here.

pub mod codec;
pub mod frame;

pub use self::codec::FrameCodec;
pub use self::frame::{CommandFrame, Opcode};

/// Fixed frame header length in bytes
pub const HEADER_LEN: usize = 6;

/// Maximum plausible payload length in bytes; anything larger means the
/// stream framing has been lost
pub const MAX_PAYLOAD: usize = 512;
