use bytes::{BufMut, Bytes, BytesMut};

use super::value::Value;
use crate::core::{Error, Result};

/// Whether a parameter accepts writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    /// Reported by the device but never writable through SET
    ReadOnly,
}

/// Value kind of a parameter: how it is validated and laid out on the wire
#[derive(Debug, Clone, Copy)]
pub enum ValueKind {
    /// Integer in an inclusive range, encoded as u32 big-endian
    Int { min: i64, max: i64 },
    /// UTF-8 string up to `max_len` bytes
    Text { max_len: usize },
    /// One of a fixed set of labels, encoded as a single byte
    Choice {
        variants: &'static [(&'static str, u8)],
    },
    /// A "WxH" pair, encoded as width u32 then height u32, big-endian
    Size { max_width: u32, max_height: u32 },
}

/// Static descriptor of one device parameter
#[derive(Debug)]
pub struct Parameter {
    pub name: &'static str,
    /// Protocol-level parameter id
    pub id: u8,
    pub kind: ValueKind,
    pub access: Access,
}

/// Fixed catalog of device parameters, ids per the appliance firmware.
pub static PARAMETERS: &[Parameter] = &[
    Parameter {
        name: "source",
        id: 1,
        kind: ValueKind::Choice {
            variants: &[("analogue", 2), ("hdmi", 3)],
        },
        access: Access::ReadWrite,
    },
    Parameter {
        name: "bitrate",
        id: 2,
        kind: ValueKind::Int { min: 500, max: 20_000 },
        access: Access::ReadWrite,
    },
    Parameter {
        name: "picture_size",
        id: 3,
        kind: ValueKind::Size {
            max_width: 1920,
            max_height: 1080,
        },
        access: Access::ReadWrite,
    },
    Parameter {
        name: "hdcp",
        id: 5,
        kind: ValueKind::Int { min: 0, max: 1 },
        access: Access::ReadOnly,
    },
    Parameter {
        name: "brightness",
        id: 10,
        kind: ValueKind::Int { min: 0, max: 255 },
        access: Access::ReadWrite,
    },
    Parameter {
        name: "contrast",
        id: 11,
        kind: ValueKind::Int { min: 0, max: 255 },
        access: Access::ReadWrite,
    },
    Parameter {
        name: "hue",
        id: 12,
        kind: ValueKind::Int { min: 0, max: 255 },
        access: Access::ReadWrite,
    },
    Parameter {
        name: "saturation",
        id: 13,
        kind: ValueKind::Int { min: 0, max: 255 },
        access: Access::ReadWrite,
    },
    // Written only through the STREAM_TOGGLE opcode, never via SET.
    Parameter {
        name: "streaming",
        id: 15,
        kind: ValueKind::Int { min: 0, max: 1 },
        access: Access::ReadOnly,
    },
    Parameter {
        name: "rtmp_url",
        id: 16,
        kind: ValueKind::Text { max_len: 255 },
        access: Access::ReadWrite,
    },
    Parameter {
        name: "rtmp_key",
        id: 17,
        kind: ValueKind::Text { max_len: 255 },
        access: Access::ReadWrite,
    },
    Parameter {
        name: "fps",
        id: 19,
        kind: ValueKind::Int { min: 1, max: 60 },
        access: Access::ReadWrite,
    },
    Parameter {
        name: "firmware",
        id: 56,
        kind: ValueKind::Text { max_len: 32 },
        access: Access::ReadOnly,
    },
];

/// Looks up a parameter descriptor by name.
///
/// An unknown name is a programming error on the caller's side, not a
/// device error.
pub fn lookup(name: &str) -> Result<&'static Parameter> {
    PARAMETERS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| Error::UnknownParameter(name.to_owned()))
}

impl Parameter {
    /// Validates a value against this descriptor and encodes it for a SET
    /// payload. Fails fast without any network involvement.
    pub fn validate_and_encode(&self, value: &Value) -> Result<Bytes> {
        if self.access == Access::ReadOnly {
            return Err(Error::validation(format!("{} is read-only", self.name)));
        }

        match (&self.kind, value) {
            (ValueKind::Int { min, max }, Value::Int(v)) => {
                if v < min || v > max {
                    return Err(Error::validation(format!(
                        "{} must be between {} and {}, got {}",
                        self.name, min, max, v
                    )));
                }
                let mut buf = BytesMut::with_capacity(4);
                buf.put_u32(*v as u32);
                Ok(buf.freeze())
            }

            (ValueKind::Text { max_len }, Value::Str(s)) => {
                if s.is_empty() || s.len() > *max_len {
                    return Err(Error::validation(format!(
                        "{} requires a string of 1-{} bytes",
                        self.name, max_len
                    )));
                }
                Ok(Bytes::copy_from_slice(s.as_bytes()))
            }

            (ValueKind::Choice { variants }, Value::Str(s)) => {
                let Some((_, byte)) = variants.iter().find(|(label, _)| *label == s.as_str()) else {
                    let labels: Vec<_> = variants.iter().map(|(label, _)| *label).collect();
                    return Err(Error::validation(format!(
                        "{} must be one of {:?}, got {:?}",
                        self.name, labels, s
                    )));
                };
                Ok(Bytes::copy_from_slice(&[*byte]))
            }

            (ValueKind::Size { max_width, max_height }, Value::Str(s)) => {
                let (width, height) = parse_size(s).ok_or_else(|| {
                    Error::validation(format!(
                        "{} must be \"WIDTHxHEIGHT\", e.g. \"1920x1080\"",
                        self.name
                    ))
                })?;
                if width == 0 || height == 0 || width > *max_width || height > *max_height {
                    return Err(Error::validation(format!(
                        "{} out of range, maximum {}x{}",
                        self.name, max_width, max_height
                    )));
                }
                let mut buf = BytesMut::with_capacity(8);
                buf.put_u32(width);
                buf.put_u32(height);
                Ok(buf.freeze())
            }

            (ValueKind::Int { .. }, Value::Str(_)) => Err(Error::validation(format!(
                "{} expects an integer value",
                self.name
            ))),
            (_, Value::Int(_)) => Err(Error::validation(format!(
                "{} expects a string value",
                self.name
            ))),
        }
    }

    /// Decodes a GET response payload into a value.
    pub fn decode(&self, payload: &[u8]) -> Result<Value> {
        match &self.kind {
            ValueKind::Int { .. } => {
                let bytes: [u8; 4] = payload
                    .get(..4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| {
                        Error::protocol(format!("{}: short integer payload", self.name))
                    })?;
                Ok(Value::Int(u32::from_be_bytes(bytes) as i64))
            }

            ValueKind::Text { .. } => {
                let s = std::str::from_utf8(payload).map_err(|_| {
                    Error::protocol(format!("{}: payload is not valid UTF-8", self.name))
                })?;
                Ok(Value::Str(s.to_owned()))
            }

            ValueKind::Choice { variants } => {
                let byte = payload.first().ok_or_else(|| {
                    Error::protocol(format!("{}: empty choice payload", self.name))
                })?;
                let (label, _) = variants
                    .iter()
                    .find(|(_, b)| b == byte)
                    .ok_or_else(|| {
                        Error::protocol(format!("{}: unknown choice byte {}", self.name, byte))
                    })?;
                Ok(Value::Str((*label).to_owned()))
            }

            ValueKind::Size { .. } => {
                if payload.len() < 8 {
                    return Err(Error::protocol(format!(
                        "{}: short size payload",
                        self.name
                    )));
                }
                let width = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                let height = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
                Ok(Value::Str(format!("{}x{}", width, height)))
            }
        }
    }
}

/// Parses a "WxH" string into (width, height).
fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown() {
        assert_eq!(lookup("bitrate").unwrap().id, 2);
        assert_eq!(lookup("rtmp_url").unwrap().id, 16);
        assert!(matches!(
            lookup("sharpness"),
            Err(Error::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_int_validation_rejects_out_of_range() {
        let bitrate = lookup("bitrate").unwrap();
        assert!(bitrate.validate_and_encode(&Value::Int(-1)).is_err());
        assert!(bitrate.validate_and_encode(&Value::Int(100)).is_err());
        assert!(bitrate.validate_and_encode(&Value::Int(30_000)).is_err());
        assert!(bitrate.validate_and_encode(&Value::Int(6000)).is_ok());
    }

    #[test]
    fn test_int_encode_decode_round_trip() {
        let bitrate = lookup("bitrate").unwrap();
        let encoded = bitrate.validate_and_encode(&Value::Int(6000)).unwrap();
        assert_eq!(&encoded[..], &6000u32.to_be_bytes());
        assert_eq!(bitrate.decode(&encoded).unwrap(), Value::Int(6000));
    }

    #[test]
    fn test_int_rejects_string() {
        let brightness = lookup("brightness").unwrap();
        assert!(brightness
            .validate_and_encode(&Value::from("bright"))
            .is_err());
    }

    #[test]
    fn test_choice_validation() {
        let source = lookup("source").unwrap();
        let encoded = source.validate_and_encode(&Value::from("hdmi")).unwrap();
        assert_eq!(&encoded[..], &[3]);
        assert_eq!(source.decode(&[2]).unwrap(), Value::from("analogue"));
        assert!(source.validate_and_encode(&Value::from("svideo")).is_err());
        assert!(matches!(source.decode(&[9]), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_text_validation() {
        let url = lookup("rtmp_url").unwrap();
        let value = Value::from("rtmp://live.example.com/app");
        let encoded = url.validate_and_encode(&value).unwrap();
        assert_eq!(url.decode(&encoded).unwrap(), value);

        assert!(url.validate_and_encode(&Value::from("")).is_err());
        let too_long = "a".repeat(256);
        assert!(url.validate_and_encode(&Value::Str(too_long)).is_err());
    }

    #[test]
    fn test_size_validation() {
        let size = lookup("picture_size").unwrap();
        let encoded = size.validate_and_encode(&Value::from("1920x1080")).unwrap();
        assert_eq!(&encoded[..4], &1920u32.to_be_bytes());
        assert_eq!(&encoded[4..], &1080u32.to_be_bytes());
        assert_eq!(size.decode(&encoded).unwrap(), Value::from("1920x1080"));

        assert!(size.validate_and_encode(&Value::from("4096x2160")).is_err());
        assert!(size.validate_and_encode(&Value::from("0x1080")).is_err());
        assert!(size.validate_and_encode(&Value::from("widexhigh")).is_err());
    }

    #[test]
    fn test_read_only_rejects_set() {
        for name in ["streaming", "firmware", "hdcp"] {
            let param = lookup(name).unwrap();
            let err = param.validate_and_encode(&Value::Int(1)).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{} must be read-only", name);
        }
    }

    #[test]
    fn test_parameter_ids_unique() {
        let mut ids: Vec<u8> = PARAMETERS.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), PARAMETERS.len());
    }
}
