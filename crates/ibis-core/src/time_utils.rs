/// Returns the current Unix timestamp in milliseconds.
pub fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn now_unix_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns true when `deadline_unix_ms` is present and no longer in the
/// future. Used by the dispatcher's short-term message cache sweep.
pub fn unix_expired(deadline_unix_ms: Option<u64>, now_unix_ms: u64) -> bool {
    matches!(deadline_unix_ms, Some(value) if value <= now_unix_ms)
}
