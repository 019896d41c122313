//! Lenient timestamp parsing for stored orders.
//!
//! Records written by earlier clients carry creation times as locale strings
//! (`2024/5/20 10:30:00`, `2024/5/20 下午2:05:09`, `5/20/2024, 2:05:09 PM`) or
//! epoch milliseconds instead of RFC 3339. Locale strings have no zone and
//! are read at [`LOCALE_UTC_OFFSET_SECONDS`].

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Deserializer};

/// Offset applied to zone-less locale strings (UTC+8, campus time).
pub const LOCALE_UTC_OFFSET_SECONDS: i32 = 8 * 3600;

const NAIVE_FORMATS: [&str; 4] = [
	"%Y/%m/%d %H:%M:%S",
	"%Y-%m-%d %H:%M:%S",
	"%Y/%m/%d %H:%M",
	"%Y-%m-%dT%H:%M:%S",
];

const TWELVE_HOUR_FORMATS: [&str; 2] = ["%m/%d/%Y, %I:%M:%S %p", "%m/%d/%Y %I:%M:%S %p"];

/// Parses a stored timestamp string in any of the accepted shapes.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
	let input = input.trim();
	if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
		return Some(parsed.with_timezone(&Utc));
	}
	if let Ok(millis) = input.parse::<i64>() {
		return Utc.timestamp_millis_opt(millis).single();
	}
	parse_locale(input).and_then(|naive| {
		FixedOffset::east_opt(LOCALE_UTC_OFFSET_SECONDS)?
			.from_local_datetime(&naive)
			.single()
			.map(|local| local.with_timezone(&Utc))
	})
}

fn parse_locale(input: &str) -> Option<NaiveDateTime> {
	// Chinese locales mark the half of the day before the hour
	let (text, afternoon) = if input.contains("下午") {
		(input.replace("下午", ""), Some(true))
	} else if input.contains("上午") {
		(input.replace("上午", ""), Some(false))
	} else {
		(input.to_string(), None)
	};

	let naive = NAIVE_FORMATS
		.iter()
		.chain(TWELVE_HOUR_FORMATS.iter())
		.find_map(|format| NaiveDateTime::parse_from_str(&text, format).ok())?;

	match (afternoon, naive.hour()) {
		(Some(true), hour) if hour < 12 => naive.with_hour(hour + 12),
		(Some(false), 12) => naive.with_hour(0),
		_ => Some(naive),
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
	Millis(i64),
	Text(String),
}

impl RawTimestamp {
	fn parse(self) -> Option<DateTime<Utc>> {
		match self {
			RawTimestamp::Millis(millis) => Utc.timestamp_millis_opt(millis).single(),
			RawTimestamp::Text(text) => parse_timestamp(&text),
		}
	}
}

/// `deserialize_with` for required timestamps.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
	D: Deserializer<'de>,
{
	RawTimestamp::deserialize(deserializer)?
		.parse()
		.ok_or_else(|| serde::de::Error::custom("unrecognized timestamp"))
}

/// `deserialize_with` for optional display timestamps. Unrecognized values
/// read as `None`.
pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<RawTimestamp>::deserialize(deserializer)?.and_then(RawTimestamp::parse))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
	}

	#[test]
	fn test_rfc3339_and_millis() {
		assert_eq!(
			parse_timestamp("2024-05-20T10:30:00Z"),
			Some(utc(2024, 5, 20, 10, 30, 0))
		);
		assert_eq!(
			parse_timestamp("1716201000000"),
			Some(utc(2024, 5, 20, 10, 30, 0))
		);
	}

	#[test]
	fn test_locale_strings_are_campus_time() {
		assert_eq!(
			parse_timestamp("2024/5/20 18:30:00"),
			Some(utc(2024, 5, 20, 10, 30, 0))
		);
		assert_eq!(
			parse_timestamp("2024/5/20 下午6:30:00"),
			Some(utc(2024, 5, 20, 10, 30, 0))
		);
		assert_eq!(
			parse_timestamp("2024/5/20 上午12:05:00"),
			Some(utc(2024, 5, 19, 16, 5, 0))
		);
		assert_eq!(
			parse_timestamp("5/20/2024, 6:30:00 PM"),
			Some(utc(2024, 5, 20, 10, 30, 0))
		);
	}

	#[test]
	fn test_garbage_is_rejected() {
		assert_eq!(parse_timestamp("yesterday"), None);
		assert_eq!(parse_timestamp(""), None);
	}
}
