use crate::error::{ProtolabError, Result};

pub const MIN_PORT: i64 = 1;
pub const MAX_PORT: i64 = 65535;

/// Parse a port as it arrives on the wire (a path segment or CLI argument).
///
/// Anything that is not an integer in `[1, 65535]` is `InvalidPort`,
/// including `0`, negatives, and values that overflow `u16`.
pub fn validate_port(raw: &str) -> Result<u16> {
    let trimmed = raw.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ProtolabError::InvalidPort(raw.to_string()))?;
    if !(MIN_PORT..=MAX_PORT).contains(&value) {
        return Err(ProtolabError::InvalidPort(raw.to_string()));
    }
    Ok(value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_range_bounds() {
        assert_eq!(validate_port("1").unwrap(), 1);
        assert_eq!(validate_port("4021").unwrap(), 4021);
        assert_eq!(validate_port("65535").unwrap(), 65535);
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        for raw in ["0", "-1", "65536", "99999999999", "", "abc", "40.21", "4021x"] {
            assert!(
                matches!(validate_port(raw), Err(ProtolabError::InvalidPort(_))),
                "expected InvalidPort for {raw:?}"
            );
        }
    }
}
