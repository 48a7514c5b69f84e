/// Parse the hour field of an `"HH:MM"` time string.
///
/// Only the hour is read; minutes are ignored. A bare hour without a colon
/// (`"9"`) is accepted as well.
///
/// # Example
///```
/// use shared::time::parse_hour;
/// assert_eq!(parse_hour("09:30"), Some(9));
/// assert_eq!(parse_hour("22:00"), Some(22));
/// assert_eq!(parse_hour("late"), None);
/// ```
pub fn parse_hour(time: &str) -> Option<u32> {
    time.split(':').next()?.trim().parse().ok()
}
