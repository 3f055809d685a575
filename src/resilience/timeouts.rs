//! Call deadlines.
//!
//! # Responsibilities
//! - Parse the `Grpc-Timeout` request header
//! - Combine it with the configured default call timeout
//!
//! # Design Decisions
//! - Header format follows the gRPC wire format: 1 to 8 ASCII digits followed
//!   by one unit (`H`, `M`, `S`, `m`, `u`, `n`)
//! - A client supplied timeout replaces the default, so clients can ask for
//!   longer calls than the default
//! - Timed-out calls return 504 Gateway Timeout

use std::time::Duration;

use crate::error::GatewayError;

/// Header carrying the client's requested call timeout.
pub const GRPC_TIMEOUT: &str = "grpc-timeout";

const MAX_DIGITS: usize = 8;

/// Parse a `Grpc-Timeout` value such as `100m` or `5S`.
pub fn parse_grpc_timeout(raw: &str) -> Result<Duration, GatewayError> {
    let invalid = || GatewayError::InvalidTimeout(raw.to_string());

    let raw_trimmed = raw.trim();
    if raw_trimmed.len() < 2 {
        return Err(invalid());
    }
    let (digits, unit) = raw_trimmed.split_at(raw_trimmed.len() - 1);
    if digits.len() > MAX_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "H" => Duration::from_secs(value * 3600),
        "M" => Duration::from_secs(value * 60),
        "S" => Duration::from_secs(value),
        "m" => Duration::from_millis(value),
        "u" => Duration::from_micros(value),
        "n" => Duration::from_nanos(value),
        _ => return Err(invalid()),
    };
    Ok(duration)
}

/// Timeout for one call: the client's header when present, else the
/// configured default. A zero default means "no timeout".
pub fn effective_timeout(header: Option<Duration>, default: Duration) -> Option<Duration> {
    header.or_else(|| (!default.is_zero()).then_some(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_grpc_timeout("1H").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_grpc_timeout("2M").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_grpc_timeout("5S").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_grpc_timeout("100m").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_grpc_timeout("7u").unwrap(), Duration::from_micros(7));
        assert_eq!(parse_grpc_timeout("9n").unwrap(), Duration::from_nanos(9));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for raw in ["", "S", "10", "10x", "-1S", "1.5S", "123456789S", "abcS"] {
            assert!(
                matches!(parse_grpc_timeout(raw), Err(GatewayError::InvalidTimeout(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_effective_timeout() {
        let default = Duration::from_secs(30);
        assert_eq!(effective_timeout(None, default), Some(default));
        assert_eq!(
            effective_timeout(Some(Duration::from_secs(60)), default),
            Some(Duration::from_secs(60))
        );
        assert_eq!(effective_timeout(None, Duration::ZERO), None);
    }
}
