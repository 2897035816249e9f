/// Returns the current wall-clock time in microseconds since the UNIX epoch.
///
/// Falls back to `0` for clocks set before the epoch.
///
/// # Example:
/// ```rust
/// use headunit_wire::utils::now;
/// let timestamp = now();
/// assert!(timestamp > 0);
/// ```
pub fn now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0)
}
