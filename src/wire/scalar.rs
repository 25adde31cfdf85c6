//! Scalar decoders for element text
//!
//! Numbers are parsed with Rust's locale-independent parsers, which accept
//! exactly the '.'-decimal, ungrouped notation the daemon writes.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::{RpcError, RpcResult};

pub fn parse_int(element: &str, text: &str) -> RpcResult<i64> {
	text.trim().parse::<i64>().map_err(|e| RpcError::decode(element, text, e))
}

pub fn parse_double(element: &str, text: &str) -> RpcResult<f64> {
	let value = text.trim().parse::<f64>().map_err(|e| RpcError::decode(element, text, e))?;
	if value.is_nan() {
		return Err(RpcError::decode(element, text, "not a number"));
	}
	Ok(value)
}

/// Seconds since the Unix epoch, possibly fractional.
pub fn parse_timestamp(element: &str, text: &str) -> RpcResult<DateTime<Utc>> {
	let secs = parse_double(element, text)?;
	let whole = secs.floor();
	let nanos = ((secs - whole) * 1e9) as u32;
	DateTime::from_timestamp(whole as i64, nanos)
		.ok_or_else(|| RpcError::decode(element, text, "timestamp out of range"))
}

/// Seconds as a duration. Negative values (used by the daemon for
/// "unknown") decode as zero.
pub fn parse_timespan(element: &str, text: &str) -> RpcResult<Duration> {
	let secs = parse_double(element, text)?;
	if secs <= 0.0 {
		return Ok(Duration::ZERO);
	}
	Duration::try_from_secs_f64(secs).map_err(|e| RpcError::decode(element, text, e))
}

/// A `0`/`1` boolean.
pub fn parse_bool(element: &str, text: &str) -> RpcResult<bool> {
	Ok(parse_int(element, text)? != 0)
}

/// A presence flag: an empty body means set, `0` means cleared.
pub fn parse_flag(text: &str) -> bool {
	let text = text.trim();
	text.is_empty() || text.parse::<f64>().map(|v| v != 0.0).unwrap_or(true)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_parse_int() {
		assert_eq!(parse_int("exit_status", " -3 ").unwrap(), -3);
		let err = parse_int("exit_status", "x").unwrap_err();
		assert_eq!(err.kind(), crate::error::ErrorKind::Decode);
	}

	#[test]
	fn test_parse_double_ignores_locale() {
		assert_eq!(parse_double("fraction_done", "0.250000").unwrap(), 0.25);
		assert!(parse_double("fraction_done", "0,25").is_err());
		assert!(parse_double("fraction_done", "1,000.5").is_err());
		assert!(parse_double("fraction_done", "NaN").is_err());
	}

	#[test]
	fn test_parse_timestamp() {
		let t = parse_timestamp("received_time", "1700000000.500000").unwrap();
		assert_eq!(t.timestamp(), 1_700_000_000);
		assert_eq!(t.timestamp_subsec_millis(), 500);
		assert_eq!(
			parse_timestamp("report_deadline", "0").unwrap(),
			Utc.timestamp_opt(0, 0).unwrap()
		);
	}

	#[test]
	fn test_parse_timespan() {
		assert_eq!(parse_timespan("current_cpu_time", "90.5").unwrap(), Duration::from_millis(90_500));
		assert_eq!(parse_timespan("estimated_cpu_time_remaining", "-1").unwrap(), Duration::ZERO);
		assert!(parse_timespan("elapsed_time", "soon").is_err());
	}

	#[test]
	fn test_parse_flag() {
		assert!(parse_flag(""));
		assert!(parse_flag("1"));
		assert!(!parse_flag("0"));
		assert!(!parse_flag(" 0 "));
	}
}

// vim: ts=4
