use chrono::Duration;

/// Format a duration as `HH:MM:SS`. Negative durations render as `00:00:00`;
/// hours are not wrapped at 24.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_seconds_minutes_hours() {
        assert_eq!(format_hms(Duration::seconds(5)), "00:00:05");
        assert_eq!(format_hms(Duration::seconds(65)), "00:01:05");
        assert_eq!(format_hms(Duration::seconds(3 * 3600 + 7)), "03:00:07");
    }

    #[test]
    fn truncates_sub_second_and_clamps_negative() {
        assert_eq!(format_hms(Duration::milliseconds(5_999)), "00:00:05");
        assert_eq!(format_hms(Duration::seconds(-10)), "00:00:00");
    }

    #[test]
    fn does_not_wrap_past_a_day() {
        assert_eq!(format_hms(Duration::hours(30)), "30:00:00");
    }
}
