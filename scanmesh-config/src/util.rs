use std::time::Duration;

/// Parses a millisecond count such as `REDIS_COMMAND_TIMEOUT_MS=2500`.
pub fn parse_millis(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_millis)
}

/// Returns `None` for unset or whitespace-only values.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_reject_garbage() {
        assert_eq!(parse_millis("2500"), Some(Duration::from_millis(2500)));
        assert_eq!(parse_millis("-1"), None);
        assert_eq!(parse_millis("5s"), None);
    }
}
