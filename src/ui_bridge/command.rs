// Outbound renderer commands. Layout follows the renderer's C struct:
//
//   0..32   int32 × 8   op, id, element_kind, x, y, width, height, value
//   32      bool        visible
//   33..97  char[64]    text, NUL terminated
//   97..100             padding
//   100     int32       color

use crate::shm::codec::{expect_len, read_i32, write_i32};
use crate::shm::DecodeError;
use crate::widgets::fader::FaderMode;

pub const COMMAND_SIZE: usize = 104;
pub const TEXT_CAPACITY: usize = 64;

const VISIBLE_OFFSET: usize = 32;
const TEXT_OFFSET: usize = 33;
const COLOR_OFFSET: usize = 100;

pub const DEFAULT_ELEMENT_COLOR: i32 = 0x5A825A;
pub const DEFAULT_LABEL_COLOR: i32 = 0xFFFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOp {
    Create = 0,
    Update = 1,
    Delete = 2,
    Show = 3,
    Hide = 4,
}

impl TryFrom<i32> for CommandOp {
    type Error = DecodeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Create),
            1 => Ok(Self::Update),
            2 => Ok(Self::Delete),
            3 => Ok(Self::Show),
            4 => Ok(Self::Hide),
            other => Err(DecodeError::UnknownVariant {
                field: "op",
                value: other,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Button = 0,
    Fader = 1,
    Label = 2,
    Toggle = 3,
}

impl TryFrom<i32> for ElementKind {
    type Error = DecodeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Button),
            1 => Ok(Self::Fader),
            2 => Ok(Self::Label),
            3 => Ok(Self::Toggle),
            other => Err(DecodeError::UnknownVariant {
                field: "element_kind",
                value: other,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiCommand {
    pub op: CommandOp,
    pub id: i32,
    pub kind: ElementKind,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub value: i32,
    pub visible: bool,
    pub text: String,
    pub color: i32,
}

impl UiCommand {
    /// Zeroed command; unset fields go out as zero like the renderer expects
    pub fn new(op: CommandOp, id: i32) -> Self {
        Self {
            op,
            id,
            kind: ElementKind::Button,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            value: 0,
            visible: false,
            text: String::new(),
            color: 0,
        }
    }

    /// Text longer than 63 bytes is cut on a char boundary here, callers pass
    /// whatever they have.
    pub fn encode(&self) -> [u8; COMMAND_SIZE] {
        let mut bytes = [0u8; COMMAND_SIZE];
        write_i32(&mut bytes, 0, self.op as i32);
        write_i32(&mut bytes, 4, self.id);
        write_i32(&mut bytes, 8, self.kind as i32);
        write_i32(&mut bytes, 12, self.x);
        write_i32(&mut bytes, 16, self.y);
        write_i32(&mut bytes, 20, self.width);
        write_i32(&mut bytes, 24, self.height);
        write_i32(&mut bytes, 28, self.value);
        bytes[VISIBLE_OFFSET] = u8::from(self.visible);

        let text = truncate_text(&self.text);
        bytes[TEXT_OFFSET..TEXT_OFFSET + text.len()].copy_from_slice(text.as_bytes());

        write_i32(&mut bytes, COLOR_OFFSET, self.color);
        bytes
    }

    /// Renderer side of the contract, used to inspect what went out
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        expect_len(bytes, COMMAND_SIZE)?;

        let field = &bytes[TEXT_OFFSET..TEXT_OFFSET + TEXT_CAPACITY];
        let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
        let text = std::str::from_utf8(&field[..end])
            .map_err(|e| DecodeError::Text(e.to_string()))?
            .to_string();

        Ok(Self {
            op: CommandOp::try_from(read_i32(bytes, 0))?,
            id: read_i32(bytes, 4),
            kind: ElementKind::try_from(read_i32(bytes, 8))?,
            x: read_i32(bytes, 12),
            y: read_i32(bytes, 16),
            width: read_i32(bytes, 20),
            height: read_i32(bytes, 24),
            value: read_i32(bytes, 28),
            visible: bytes[VISIBLE_OFFSET] != 0,
            text,
            color: read_i32(bytes, COLOR_OFFSET),
        })
    }
}

/// Longest prefix that fits the text field with its terminator
pub fn truncate_text(text: &str) -> &str {
    truncate_to(text, TEXT_CAPACITY - 1)
}

fn truncate_to(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Fader metadata packed into the text field of a CREATE: `label|mode|speed`
///
/// Mode and speed never contain `|`, so the text is split from the right and
/// the label may hold anything.
#[derive(Debug, Clone, PartialEq)]
pub struct FaderSpec {
    pub label: String,
    pub mode: FaderMode,
    pub smooth_speed: f32,
}

impl FaderSpec {
    /// Only the label is shortened when the text field would overflow
    pub fn encode(&self) -> String {
        let tail = format!("|{}|{}", self.mode, self.smooth_speed);
        let room = (TEXT_CAPACITY - 1).saturating_sub(tail.len());
        format!("{}{}", truncate_to(&self.label, room), tail)
    }

    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let mut parts = text.rsplitn(3, '|');
        let (Some(speed), Some(mode), Some(label)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(DecodeError::Text(format!(
                "expected label|mode|speed, got '{}'",
                text
            )));
        };

        let mode = mode
            .parse::<FaderMode>()
            .map_err(|e| DecodeError::Text(e.to_string()))?;
        let smooth_speed = speed
            .parse::<f32>()
            .map_err(|e| DecodeError::Text(format!("speed '{}': {}", speed, e)))?;

        Ok(Self {
            label: label.to_string(),
            mode,
            smooth_speed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_renderer_struct() {
        let mut command = UiCommand::new(CommandOp::Create, 3);
        command.kind = ElementKind::Fader;
        command.x = 50;
        command.y = 150;
        command.width = 700;
        command.height = 40;
        command.value = 75;
        command.visible = true;
        command.text = "VOLUME".to_string();
        command.color = DEFAULT_ELEMENT_COLOR;

        let bytes = command.encode();
        assert_eq!(read_i32(&bytes, 8), ElementKind::Fader as i32);
        assert_eq!(read_i32(&bytes, 28), 75);
        assert_eq!(bytes[32], 1);
        assert_eq!(&bytes[33..39], b"VOLUME");
        assert_eq!(bytes[39], 0);
        assert_eq!(read_i32(&bytes, 100), 0x5A825A);

        assert_eq!(UiCommand::decode(&bytes).unwrap(), command);
    }

    #[test]
    fn long_text_is_cut_to_63_bytes() {
        let mut command = UiCommand::new(CommandOp::Update, 1);
        command.text = "x".repeat(80);

        let bytes = command.encode();
        let decoded = UiCommand::decode(&bytes).unwrap();
        assert_eq!(decoded.text.len(), 63);
        assert_eq!(bytes[33 + 63], 0);
    }

    #[test]
    fn truncation_keeps_utf8_intact() {
        // 62 ASCII bytes followed by a two-byte char that would straddle the limit
        let text = format!("{}ä", "a".repeat(62));
        assert_eq!(truncate_text(&text), "a".repeat(62));
        assert_eq!(truncate_text("kurz"), "kurz");
    }

    #[test]
    fn fader_spec_round_trips_through_text_field() {
        let spec = FaderSpec {
            label: "BPM".to_string(),
            mode: FaderMode::Smooth,
            smooth_speed: 0.1,
        };
        assert_eq!(spec.encode(), "BPM|smooth|0.1");
        assert_eq!(FaderSpec::parse("BPM|smooth|0.1").unwrap(), spec);
    }

    #[test]
    fn fader_spec_rejects_malformed_text() {
        assert!(FaderSpec::parse("BPM|smooth").is_err());
        assert!(FaderSpec::parse("BPM|wobbly|0.1").is_err());
        assert!(FaderSpec::parse("BPM|jump|fast").is_err());
        assert!(FaderSpec::parse("a|jump|0.1|extra").is_err());
    }

    #[test]
    fn fader_spec_survives_pipes_and_long_labels() {
        let piped = FaderSpec {
            label: "IN|OUT".to_string(),
            mode: FaderMode::Jump,
            smooth_speed: 0.25,
        };
        assert_eq!(FaderSpec::parse(&piped.encode()).unwrap(), piped);

        let long = FaderSpec {
            label: "ä".repeat(40),
            mode: FaderMode::Incremental,
            smooth_speed: 0.1,
        };
        let text = long.encode();
        assert!(text.len() <= TEXT_CAPACITY - 1);
        assert!(text.ends_with("|incremental|0.1"));

        let sent = UiCommand {
            text,
            ..UiCommand::new(CommandOp::Create, 1)
        };
        let decoded = UiCommand::decode(&sent.encode()).unwrap();
        let parsed = FaderSpec::parse(&decoded.text).unwrap();
        assert_eq!(parsed.mode, FaderMode::Incremental);
        assert_eq!(parsed.smooth_speed, 0.1);
        assert!(long.label.starts_with(&parsed.label));
    }

    #[test]
    fn unknown_op_is_malformed() {
        let mut bytes = UiCommand::new(CommandOp::Hide, 9).encode();
        write_i32(&mut bytes, 0, 12);
        assert_eq!(
            UiCommand::decode(&bytes),
            Err(DecodeError::UnknownVariant {
                field: "op",
                value: 12
            })
        );
    }
}
