use crate::shm::codec::{expect_len, read_i32, write_i32};
use crate::shm::DecodeError;

/// `int32 × 4`: kind, pin, value, timestamp
pub const RECORD_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Encoder = 0,
    Button = 1,
}

impl TryFrom<i32> for RecordKind {
    type Error = DecodeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Encoder),
            1 => Ok(Self::Button),
            other => Err(DecodeError::UnknownVariant {
                field: "event_kind",
                value: other,
            }),
        }
    }
}

/// One slot of the GPIO driver's ring, validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareEventRecord {
    pub kind: RecordKind,
    pub pin: i32,
    /// Encoder: signed direction. Button: 1 pressed, anything else released.
    pub value: i32,
    /// Driver tick, opaque to this side
    pub timestamp: i32,
}

impl HardwareEventRecord {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        expect_len(bytes, RECORD_SIZE)?;

        let kind = RecordKind::try_from(read_i32(bytes, 0))?;
        let pin = read_i32(bytes, 4);
        if pin < 0 {
            return Err(DecodeError::InvalidField {
                field: "pin",
                value: pin,
            });
        }

        Ok(Self {
            kind,
            pin,
            value: read_i32(bytes, 8),
            timestamp: read_i32(bytes, 12),
        })
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        write_i32(&mut bytes, 0, self.kind as i32);
        write_i32(&mut bytes, 4, self.pin);
        write_i32(&mut bytes, 8, self.value);
        write_i32(&mut bytes, 12, self.timestamp);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: i32, pin: i32, value: i32, timestamp: i32) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        write_i32(&mut bytes, 0, kind);
        write_i32(&mut bytes, 4, pin);
        write_i32(&mut bytes, 8, value);
        write_i32(&mut bytes, 12, timestamp);
        bytes
    }

    #[test]
    fn decodes_encoder_record() {
        let record = HardwareEventRecord::decode(&raw(0, 5, -1, 1000)).unwrap();
        assert_eq!(record.kind, RecordKind::Encoder);
        assert_eq!(record.pin, 5);
        assert_eq!(record.value, -1);
        assert_eq!(record.timestamp, 1000);
    }

    #[test]
    fn rejects_unknown_kind_and_negative_pin() {
        assert_eq!(
            HardwareEventRecord::decode(&raw(2, 5, 1, 0)),
            Err(DecodeError::UnknownVariant {
                field: "event_kind",
                value: 2
            })
        );
        assert_eq!(
            HardwareEventRecord::decode(&raw(1, -3, 1, 0)),
            Err(DecodeError::InvalidField {
                field: "pin",
                value: -3
            })
        );
    }

    #[test]
    fn encode_matches_driver_layout() {
        let record = HardwareEventRecord {
            kind: RecordKind::Button,
            pin: 21,
            value: 1,
            timestamp: 42,
        };
        assert_eq!(record.encode(), raw(1, 21, 1, 42));
    }
}
