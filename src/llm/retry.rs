//! Rate-limit aware retry around LLM calls.
//!
//! DESIGN
//! ======
//! Only rate-limit failures are retried. The wait before retry `k` (1-based)
//! is `base * 2^(k-1)` capped at `max_delay`, where `base` comes from the
//! provider's `retryDelay` hint when present. Every other error surfaces on
//! the first attempt. Callers decide how to phrase exhaustion; the standard
//! apology is [`RATE_LIMIT_APOLOGY`].

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::warn;

use super::types::LlmError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

const RATE_LIMIT_DEFAULT_DELAY: Duration = Duration::from_secs(10);
const GENERIC_DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Text returned to the user once rate-limit retries are exhausted.
pub const RATE_LIMIT_APOLOGY: &str = "I'm experiencing high API usage at the moment. Please wait a moment and try \
                                      again, or consider upgrading your API plan for higher rate limits.";

const RATE_LIMIT_MARKERS: [&str; 4] = ["429 Too Many Requests", "rate-limits", "quota", "retryDelay"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, max_delay: DEFAULT_MAX_DELAY }
    }
}

/// A scheduled retry, reported to the caller before sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryNotice {
    /// Attempt that just failed (1-based).
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("rate limited after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: LlmError },
    #[error(transparent)]
    Fatal(LlmError),
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// True when the error signals a provider rate limit or quota exhaustion.
#[must_use]
pub fn is_rate_limited(err: &LlmError) -> bool {
    if matches!(err, LlmError::ApiResponse { status: 429, .. }) {
        return true;
    }
    let text = err.to_string();
    RATE_LIMIT_MARKERS.iter().any(|m| text.contains(m))
}

fn retry_delay_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"retryDelay"\s*:\s*"(\d+)(?:\.\d+)?s""#).expect("retryDelay pattern is valid"))
}

/// Base delay hinted by the error text.
///
/// `retryDelay":"<N>s"` wins; otherwise 10s for explicit rate-limit text and
/// 5s for anything else.
#[must_use]
pub fn extract_retry_delay(error_text: &str) -> Duration {
    if let Some(secs) = retry_delay_re()
        .captures(error_text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
    {
        return Duration::from_secs(secs);
    }
    if error_text.contains("429 Too Many Requests") || error_text.contains("rate-limits") {
        return RATE_LIMIT_DEFAULT_DELAY;
    }
    GENERIC_DEFAULT_DELAY
}

/// Exponential backoff for the given 1-based attempt, capped.
#[must_use]
pub fn backoff_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.checked_mul(1u32 << exponent).map_or(cap, |d| d.min(cap))
}

fn delay_for(err: &LlmError, attempt: u32, cap: Duration) -> Duration {
    let base = match err {
        LlmError::ApiResponse { status: 429, body } if !body.contains("retryDelay") => RATE_LIMIT_DEFAULT_DELAY,
        other => extract_retry_delay(&other.to_string()),
    };
    backoff_delay(base, attempt, cap)
}

// =============================================================================
// RETRY LOOP
// =============================================================================

/// Run `call` until it succeeds, fails with a non-rate-limit error, or the
/// policy's attempts are used up.
///
/// `on_retry` runs before each backoff sleep.
///
/// # Errors
///
/// [`RetryError::Fatal`] for the first non-rate-limit error,
/// [`RetryError::Exhausted`] when every attempt was rate limited.
pub async fn call_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    mut call: F,
    mut on_retry: impl FnMut(RetryNotice),
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_rate_limited(&err) {
            return Err(RetryError::Fatal(err));
        }
        if attempt >= max_attempts {
            warn!(attempt, max_attempts, "llm: rate limit retries exhausted");
            return Err(RetryError::Exhausted { attempts: attempt, last: err });
        }

        let delay = delay_for(&err, attempt, policy.max_delay);
        warn!(attempt, max_attempts, delay_secs = delay.as_secs(), "llm: rate limited, backing off");
        on_retry(RetryNotice { attempt, max_attempts, delay });
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
