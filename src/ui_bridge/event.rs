use crate::shm::codec::{expect_len, read_i32, write_i32};
use crate::shm::DecodeError;

/// `int32 × 4`: kind, id, value, timestamp
pub const EVENT_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEventKind {
    ButtonDown = 0,
    ButtonUp = 1,
    FaderChange = 2,
    TouchMove = 3,
}

impl TryFrom<i32> for UiEventKind {
    type Error = DecodeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ButtonDown),
            1 => Ok(Self::ButtonUp),
            2 => Ok(Self::FaderChange),
            3 => Ok(Self::TouchMove),
            other => Err(DecodeError::UnknownVariant {
                field: "ui_event_kind",
                value: other,
            }),
        }
    }
}

/// Event reported by the renderer for one of its elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiEvent {
    pub kind: UiEventKind,
    pub id: i32,
    pub value: i32,
    pub timestamp: i32,
}

impl UiEvent {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        expect_len(bytes, EVENT_SIZE)?;
        Ok(Self {
            kind: UiEventKind::try_from(read_i32(bytes, 0))?,
            id: read_i32(bytes, 4),
            value: read_i32(bytes, 8),
            timestamp: read_i32(bytes, 12),
        })
    }

    pub fn encode(&self) -> [u8; EVENT_SIZE] {
        let mut bytes = [0u8; EVENT_SIZE];
        write_i32(&mut bytes, 0, self.kind as i32);
        write_i32(&mut bytes, 4, self.id);
        write_i32(&mut bytes, 8, self.value);
        write_i32(&mut bytes, 12, self.timestamp);
        bytes
    }
}
