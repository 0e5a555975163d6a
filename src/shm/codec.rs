// Field access for fixed-layout binary records. All integers are native-endian
// 32-bit, matching the C structs on the other side of the shared memory.

/// Reasons a record pulled from a ring is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Record has {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },

    #[error("Unknown {field} value: {value}")]
    UnknownVariant { field: &'static str, value: i32 },

    #[error("Invalid {field} value: {value}")]
    InvalidField { field: &'static str, value: i32 },

    #[error("Malformed text field: {0}")]
    Text(String),
}

pub fn expect_len(bytes: &[u8], expected: usize) -> Result<(), DecodeError> {
    if bytes.len() != expected {
        return Err(DecodeError::Length {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

// Callers check the record length first, offsets are compile-time constants.
pub fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_ne_bytes(word)
}

pub fn write_i32(bytes: &mut [u8], offset: usize, value: i32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_fields_use_native_layout() {
        let mut buf = [0u8; 8];
        write_i32(&mut buf, 4, -2);
        assert_eq!(&buf[4..8], &(-2i32).to_ne_bytes());
        assert_eq!(read_i32(&buf, 4), -2);
        assert_eq!(read_i32(&buf, 0), 0);
    }

    #[test]
    fn length_check_reports_both_sizes() {
        let err = expect_len(&[0u8; 3], 16).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Length {
                expected: 16,
                actual: 3
            }
        );
    }
}
