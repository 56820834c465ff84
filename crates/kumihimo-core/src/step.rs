//! Step identity and configuration types.

use crate::error::TaskError;
use crate::traits::Validator;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

/// Type-safe step name wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepName(String);

impl StepName {
    /// Creates a new StepName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the step name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the name is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StepName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StepName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Delay policy between retry attempts.
///
/// Serializes with a `type` tag and millisecond durations, so a policy can be
/// read from a host application's config file:
///
/// ```
/// use kumihimo_core::Backoff;
/// use std::time::Duration;
///
/// let backoff: Backoff = serde_json::from_str(r#"{"type": "fixed", "delay_ms": 250}"#)?;
/// assert_eq!(backoff, Backoff::fixed(Duration::from_millis(250)));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "RawBackoff")]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed {
        /// Delay between each attempt.
        #[serde(rename = "delay_ms", serialize_with = "duration_ms::serialize")]
        delay: Duration,
    },
    /// Delay grows by `multiplier` after every failed attempt.
    Exponential {
        /// Delay before the second attempt.
        #[serde(rename = "initial_delay_ms", serialize_with = "duration_ms::serialize")]
        initial_delay: Duration,
        /// Maximum delay cap.
        #[serde(rename = "max_delay_ms", serialize_with = "duration_ms::serialize")]
        max_delay: Duration,
        /// Growth factor per attempt.
        multiplier: u32,
    },
}

/// Wire form of [`Backoff`]; checked by `Backoff::try_from` before use.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawBackoff {
    Fixed {
        #[serde(rename = "delay_ms", with = "duration_ms")]
        delay: Duration,
    },
    Exponential {
        #[serde(rename = "initial_delay_ms", with = "duration_ms")]
        initial_delay: Duration,
        #[serde(
            rename = "max_delay_ms",
            with = "duration_ms",
            default = "default_max_delay"
        )]
        max_delay: Duration,
        #[serde(default = "default_multiplier")]
        multiplier: u32,
    },
}

impl TryFrom<RawBackoff> for Backoff {
    type Error = BackoffError;

    fn try_from(raw: RawBackoff) -> Result<Self, Self::Error> {
        match raw {
            RawBackoff::Fixed { delay } => Ok(Backoff::fixed(delay)),
            RawBackoff::Exponential {
                initial_delay,
                max_delay,
                multiplier,
            } => Backoff::exponential_with(initial_delay, max_delay, multiplier),
        }
    }
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_multiplier() -> u32 {
    2
}

/// Error returned when a [`Backoff`] configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffError(pub &'static str);

impl fmt::Display for BackoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackoffError {}

impl Backoff {
    /// Constant delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Backoff::Fixed { delay }
    }

    /// Doubling delay starting at `initial_delay`, capped at 60 seconds.
    ///
    /// ```
    /// use kumihimo_core::Backoff;
    /// use std::time::Duration;
    ///
    /// let backoff = Backoff::exponential(Duration::from_millis(100));
    /// assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(100));
    /// assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(200));
    /// assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(400));
    /// ```
    pub fn exponential(initial_delay: Duration) -> Self {
        Backoff::Exponential {
            initial_delay,
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }

    /// Exponential backoff with custom settings.
    ///
    /// # Errors
    ///
    /// Returns [`BackoffError`] if `multiplier` is 0 or greater than 10, or if
    /// `max_delay` is less than `initial_delay`.
    pub fn exponential_with(
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: u32,
    ) -> Result<Self, BackoffError> {
        if multiplier == 0 {
            return Err(BackoffError("multiplier must be greater than 0"));
        }
        if multiplier > 10 {
            return Err(BackoffError(
                "multiplier must be 10 or less to avoid overflow",
            ));
        }
        if max_delay < initial_delay {
            return Err(BackoffError("max_delay must be >= initial_delay"));
        }
        Ok(Backoff::Exponential {
            initial_delay,
            max_delay,
            multiplier,
        })
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential {
                initial_delay,
                max_delay,
                multiplier,
            } => {
                let factor = multiplier.saturating_pow(attempt.saturating_sub(1));
                initial_delay.saturating_mul(factor).min(*max_delay)
            }
        }
    }
}

/// Decides whether a failed attempt should be retried.
pub type RetryPredicate = Arc<dyn Fn(&TaskError) -> bool + Send + Sync>;

/// Retry behaviour of a step.
///
/// Attempts are counted from 1. The default is a single attempt with no
/// backoff.
///
/// ```
/// use kumihimo_core::RetryConfig;
/// use std::time::Duration;
///
/// let retry = RetryConfig::exponential(3, Duration::from_millis(100))
///     .with_should_retry(|error| !error.message().contains("forbidden"));
/// assert_eq!(retry.max_attempts(), 3);
/// assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(200));
/// ```
#[derive(Clone, Default)]
pub struct RetryConfig {
    max_attempts: u32,
    backoff: Option<Backoff>,
    should_retry: Option<RetryPredicate>,
}

impl Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts())
            .field("backoff", &self.backoff)
            .field("should_retry", &self.should_retry.is_some())
            .finish()
    }
}

impl RetryConfig {
    /// Up to `max_attempts` attempts with immediate retries. 0 is treated as 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: None,
            should_retry: None,
        }
    }

    /// Up to `max_attempts` attempts with a constant delay between them.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts).with_backoff(Backoff::fixed(delay))
    }

    /// Up to `max_attempts` attempts with a doubling delay.
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self::new(max_attempts).with_backoff(Backoff::exponential(initial_delay))
    }

    /// Sets the backoff policy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Sets the predicate that decides whether an error is worth retrying.
    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TaskError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Maximum number of attempts, always at least 1.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// The configured backoff policy, if any.
    pub fn backoff(&self) -> Option<&Backoff> {
        self.backoff.as_ref()
    }

    /// Returns `false` only when a predicate is set and rejects the error.
    pub fn should_retry(&self, error: &TaskError) -> bool {
        self.should_retry
            .as_ref()
            .map_or(true, |predicate| predicate(error))
    }

    /// Delay after the given failed attempt; zero without a backoff policy.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff
            .as_ref()
            .map_or(Duration::ZERO, |backoff| backoff.delay_for_attempt(attempt))
    }
}

/// Configuration for a workflow step.
///
/// ```
/// use kumihimo_core::{RetryConfig, StepConfig};
/// use std::time::Duration;
///
/// let config = StepConfig::new("fetch-user")
///     .retry(RetryConfig::fixed(3, Duration::from_secs(1)))
///     .timeout(Duration::from_secs(10));
/// assert_eq!(config.name().as_str(), "fetch-user");
/// ```
#[derive(Clone)]
pub struct StepConfig {
    name: StepName,
    validator: Option<Arc<dyn Validator>>,
    retry: RetryConfig,
    timeout: Option<Duration>,
}

impl Debug for StepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepConfig")
            .field("name", &self.name)
            .field("validator", &self.validator.is_some())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StepConfig {
    /// Single attempt, no validator, no timeout.
    pub fn new(name: impl Into<StepName>) -> Self {
        Self {
            name: name.into(),
            validator: None,
            retry: RetryConfig::default(),
            timeout: None,
        }
    }

    /// Validates the context before the first attempt.
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Sets the retry behaviour.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Limits every attempt to `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &StepName {
        &self.name
    }

    pub fn validator_ref(&self) -> Option<&dyn Validator> {
        self.validator.as_deref()
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn timeout_limit(&self) -> Option<Duration> {
        self.timeout
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
