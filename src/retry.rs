use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Maximum retry attempts after the initial request attempt.
pub const MAX_RETRIES: u32 = 3;
/// Base delay before the first retry.
pub const BASE_DELAY_MS: u64 = 500;

/// Statuses the agent service emits for transient conditions.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

fn transient_error_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(
            r"(?i)overloaded|temporarily unavailable|too many requests|try again|connection (reset|refused|closed)|timed out",
        )
        .expect("transient error regex must compile")
    })
}

/// Whether a failed dispatch is worth another attempt: a transient status,
/// or an error body whose message reads as a transient service condition.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    RETRYABLE_STATUSES.contains(&status) || transient_error_regex().is_match(error_text)
}

/// Exponential backoff delay for a retry attempt, doubling from
/// [`BASE_DELAY_MS`].
pub fn retry_delay_ms(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS << attempt.min(10))
}

#[cfg(test)]
mod tests {
    use super::{is_retryable_http_error, retry_delay_ms, BASE_DELAY_MS};

    #[test]
    fn transient_statuses_are_retryable() {
        assert!(is_retryable_http_error(429, ""));
        assert!(is_retryable_http_error(503, ""));
        assert!(!is_retryable_http_error(400, "invalid request"));
        assert!(!is_retryable_http_error(404, "conversation not found"));
    }

    #[test]
    fn transient_body_text_is_retryable_regardless_of_status() {
        assert!(is_retryable_http_error(200, "service overloaded"));
        assert!(is_retryable_http_error(400, "connection reset by peer"));
        assert!(is_retryable_http_error(400, "please try again later"));
        assert!(!is_retryable_http_error(400, "malformed tool decision"));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(retry_delay_ms(0).as_millis() as u64, BASE_DELAY_MS);
        assert_eq!(retry_delay_ms(1).as_millis() as u64, BASE_DELAY_MS * 2);
        assert_eq!(retry_delay_ms(2).as_millis() as u64, BASE_DELAY_MS * 4);
    }
}
