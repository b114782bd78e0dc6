use bytes::Bytes;

/// Command opcodes understood by the appliance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Read a parameter value
    Get = 0x01,
    /// Write a parameter value
    Set = 0x02,
    /// Discovery probe, broadcast to the discovery port
    DiscoverProbe = 0x03,
    /// Discovery reply carrying the device model string
    DiscoverReply = 0x04,
    /// Start/stop streaming; payload is a single boolean byte
    StreamToggle = 0x05,
}

impl Opcode {
    /// Maps a wire byte to an opcode, `None` for unrecognized values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Opcode::Get),
            0x02 => Some(Opcode::Set),
            0x03 => Some(Opcode::DiscoverProbe),
            0x04 => Some(Opcode::DiscoverReply),
            0x05 => Some(Opcode::StreamToggle),
            _ => None,
        }
    }
}

/// One unit of the control protocol: fixed header plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// Command opcode
    pub opcode: Opcode,
    /// Device parameter id this command addresses (0 when not applicable)
    pub parameter_id: u8,
    /// Per-request correlation token; 0 is reserved for discovery
    pub sequence_id: u16,
    /// Command payload
    pub payload: Bytes,
}

impl CommandFrame {
    /// Creates a new command frame
    pub fn new(opcode: Opcode, parameter_id: u8, sequence_id: u16, payload: Bytes) -> Self {
        CommandFrame {
            opcode,
            parameter_id,
            sequence_id,
            payload,
        }
    }

    /// Builds the discovery probe frame
    pub fn discover_probe() -> Self {
        CommandFrame::new(Opcode::DiscoverProbe, 0, 0, Bytes::new())
    }

    /// Builds a discovery reply frame carrying a model string
    pub fn discover_reply(model: &str) -> Self {
        CommandFrame::new(
            Opcode::DiscoverReply,
            0,
            0,
            Bytes::copy_from_slice(model.as_bytes()),
        )
    }
}
