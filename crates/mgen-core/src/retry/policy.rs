use std::time::Duration;

/// How a failed provider call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The provider is rate-limiting (429, 503). A retried submit goes back
    /// through the credential pool instead of hammering the same account.
    Throttled,
    /// Network trouble or a server-side error; worth another try after a pause.
    Transient,
    /// Rejections, auth failures, unreadable responses. Never retried.
    Fatal,
}

impl FailureClass {
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureClass::Fatal)
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    GiveUp,
    /// Sleep, then repeat the call.
    Backoff(Duration),
    /// Re-acquire from the credential pool: fresh spacing wait and the next
    /// least-recently-used credential.
    NextCredential,
}

/// Attempt budget and exponential backoff shared by submit and poll.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per call, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// `base * 2^(attempt-1)`, capped at `max_delay`. `attempt` is 1-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }

    /// Decide after attempt number `attempt` failed with `class`.
    pub fn decide(&self, attempt: u32, class: FailureClass) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        match class {
            FailureClass::Fatal => RetryDecision::GiveUp,
            FailureClass::Throttled => RetryDecision::NextCredential,
            FailureClass::Transient => RetryDecision::Backoff(self.backoff(attempt)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        }
    }

    #[test]
    fn fatal_is_never_retried() {
        assert_eq!(policy(5).decide(1, FailureClass::Fatal), RetryDecision::GiveUp);
    }

    #[test]
    fn throttling_goes_back_to_the_pool() {
        assert_eq!(
            policy(5).decide(1, FailureClass::Throttled),
            RetryDecision::NextCredential
        );
    }

    #[test]
    fn transient_backoff_doubles_and_is_capped() {
        let p = policy(20);
        assert_eq!(
            p.decide(1, FailureClass::Transient),
            RetryDecision::Backoff(Duration::from_millis(500))
        );
        assert_eq!(
            p.decide(3, FailureClass::Transient),
            RetryDecision::Backoff(Duration::from_secs(2))
        );
        assert_eq!(p.backoff(10), Duration::from_secs(3));
    }

    #[test]
    fn attempt_budget_covers_every_class() {
        let p = policy(3);
        assert_eq!(p.decide(2, FailureClass::Throttled), RetryDecision::NextCredential);
        assert_eq!(p.decide(3, FailureClass::Throttled), RetryDecision::GiveUp);
        assert_eq!(p.decide(3, FailureClass::Transient), RetryDecision::GiveUp);
    }
}
