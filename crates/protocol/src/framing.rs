use crate::{ProtocolError, Result, WireRecord};

/// Width of the zero-padded channel prefix unless configured otherwise.
pub const DEFAULT_PREFIX_WIDTH: usize = 4;

/// Transport messages above this many bytes are rejected before routing.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 16_384;

/// Liveness check payload. Routed like any message but never reaches a subscriber.
pub const STATUS_CHECK: &str = "STATUSCHECK";

/// Number of distinct prefixes available at `width` characters.
#[must_use]
pub fn prefix_capacity(width: usize) -> u64 {
    u32::try_from(width)
        .ok()
        .and_then(|w| 10u64.checked_pow(w))
        .unwrap_or(u64::MAX)
}

/// Render `ordinal` as a prefix of exactly `width` characters.
pub fn format_prefix(ordinal: u64, width: usize) -> Result<String> {
    if width == 0 {
        return Err(ProtocolError::MalformedFrame(
            "prefix width must be > 0".to_string(),
        ));
    }
    if ordinal >= prefix_capacity(width) {
        return Err(ProtocolError::MalformedFrame(format!(
            "ordinal {ordinal} does not fit in a {width}-character prefix"
        )));
    }
    Ok(format!("{ordinal:0width$}"))
}

/// Split a raw transport message into `(prefix, payload)`.
///
/// Returns `None` when the message is shorter than the prefix or the prefix is not all
/// ASCII digits.
#[must_use]
pub fn split_prefix(raw: &str, width: usize) -> Option<(&str, &str)> {
    if width == 0 || raw.len() < width || !raw.is_char_boundary(width) {
        return None;
    }
    let (prefix, payload) = raw.split_at(width);
    prefix
        .bytes()
        .all(|b| b.is_ascii_digit())
        .then_some((prefix, payload))
}

/// Length guard applied to whole transport messages.
pub fn check_len(raw: &str, max: usize) -> Result<()> {
    if raw.len() > max {
        return Err(ProtocolError::TooLong {
            len: raw.len(),
            max,
        });
    }
    Ok(())
}

/// Frame a record for the channel at `prefix`.
pub fn compose(prefix: &str, record: &WireRecord) -> Result<String> {
    let body = serde_json::to_string(record)?;
    Ok(format!("{prefix}{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_zero_padded() {
        assert_eq!(format_prefix(0, 4).unwrap(), "0000");
        assert_eq!(format_prefix(42, 4).unwrap(), "0042");
        assert_eq!(format_prefix(9999, 4).unwrap(), "9999");
    }

    #[test]
    fn prefix_overflow_is_rejected() {
        assert!(format_prefix(10_000, 4).is_err());
        assert!(format_prefix(1, 0).is_err());
    }

    #[test]
    fn split_requires_numeric_prefix() {
        assert_eq!(split_prefix("0003{}", 4), Some(("0003", "{}")));
        assert_eq!(split_prefix("0003", 4), Some(("0003", "")));
        assert_eq!(split_prefix("00a3{}", 4), None);
        assert_eq!(split_prefix("000", 4), None);
    }

    #[test]
    fn split_does_not_cut_multibyte_chars() {
        assert_eq!(split_prefix("00é{}", 4), None);
    }

    #[test]
    fn length_guard() {
        assert!(check_len("0000abc", 7).is_ok());
        assert!(matches!(
            check_len("0000abcd", 7),
            Err(ProtocolError::TooLong { len: 8, max: 7 })
        ));
    }
}
