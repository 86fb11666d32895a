//! Text formatting for the rate, bandwidth and value columns.

/// Default maximum width of the value column.
pub const VALUE_COLUMN_MAX: u16 = 150;

/// Text shown when a monitored topic has no measurement yet.
pub const UNKNOWN: &str = "unknown";

/// Text shown in the value column of a topic that is not monitored.
pub const NOT_MONITORED: &str = "not monitored";

/// Format a message rate in Hz with two decimals.
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.2}", r),
        None => UNKNOWN.to_string(),
    }
}

/// Format a bandwidth in bytes per second with a B/KB/MB suffix.
pub fn format_bandwidth(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        None => UNKNOWN.to_string(),
        Some(b) if b < 1000.0 => format!("{:.2}B/s", b),
        Some(b) if b < 1_000_000.0 => format!("{:.2}KB/s", b / 1000.0),
        Some(b) => format!("{:.2}MB/s", b / 1_000_000.0),
    }
}

/// Limit the value column to `max`; never widens it.
pub fn clamp_value_width(width: u16, max: u16) -> u16 {
    width.min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_two_decimals() {
        assert_eq!(format_rate(Some(10.0)), "10.00");
        assert_eq!(format_rate(Some(0.333)), "0.33");
        assert_eq!(format_rate(None), "unknown");
    }

    #[test]
    fn bandwidth_units() {
        assert_eq!(format_bandwidth(Some(512.0)), "512.00B/s");
        assert_eq!(format_bandwidth(Some(2500.0)), "2.50KB/s");
        assert_eq!(format_bandwidth(Some(3_500_000.0)), "3.50MB/s");
        assert_eq!(format_bandwidth(None), "unknown");
    }

    #[test]
    fn bandwidth_unit_boundaries() {
        assert_eq!(format_bandwidth(Some(999.0)), "999.00B/s");
        assert_eq!(format_bandwidth(Some(1000.0)), "1.00KB/s");
        assert_eq!(format_bandwidth(Some(1_000_000.0)), "1.00MB/s");
    }

    #[test]
    fn value_width_is_clamped_not_widened() {
        assert_eq!(clamp_value_width(400, VALUE_COLUMN_MAX), 150);
        assert_eq!(clamp_value_width(20, VALUE_COLUMN_MAX), 20);
    }
}
