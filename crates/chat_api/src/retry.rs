use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Maximum retry attempts after an initial request attempt.
pub const MAX_RETRIES: u32 = 3;
/// Base delay before the first retry.
pub const BASE_DELAY_MS: u64 = 1000;

fn retryable_status_regex() -> Option<&'static Regex> {
    static CACHED: OnceLock<Option<Regex>> = OnceLock::new();
    CACHED
        .get_or_init(|| {
            Regex::new(
                r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused",
            )
            .ok()
        })
        .as_ref()
}

/// Retry policy for transient failures and retryable statuses.
///
/// Client errors other than 408/429 are never retried, whatever their text.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    if matches!(status, 408 | 429 | 500 | 502 | 503 | 504) {
        return true;
    }
    if (400..500).contains(&status) {
        return false;
    }
    retryable_status_regex().is_some_and(|regex| regex.is_match(error_text))
}

/// Compute exponential backoff delay for a retry attempt.
pub fn retry_delay_ms(attempt: u32) -> Duration {
    let exponent = attempt.min(30);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(exponent)))
}
