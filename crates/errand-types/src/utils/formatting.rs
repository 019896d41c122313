//! Formatting utilities for logs and listings.

/// Formats a countdown as `MM:SS`.
///
/// Minutes are not wrapped into hours, so a one day window renders as
/// `1440:00`.
pub fn format_countdown(seconds: u64) -> String {
	if seconds == 0 {
		return "00:00".to_string();
	}
	format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Shortens an order number for log lines, keeping the prefix and tail.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 || !id.is_ascii() {
		id.to_string()
	} else {
		format!("{}..{}", &id[..4], &id[id.len() - 4..])
	}
}
