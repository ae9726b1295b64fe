use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::time::Duration;

/// Breaker type guarding calls to the notification API.
pub type NotifierBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates the circuit breaker for admin notifications.
///
/// # Configuration
///
/// - **Failure threshold**: 3 consecutive failures open the breaker.
/// - **Backoff**: Exponential from 30s up to 5 minutes before a trial call.
///
/// While open, notifications are skipped and reported as warnings instead of
/// waiting on the request timeout.
pub fn create_notifier_circuit_breaker() -> NotifierBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(30),  // Initial delay
        Duration::from_secs(300), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(3, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::{CircuitBreaker, Error};

    #[test]
    fn test_opens_after_three_failures() {
        let cb = create_notifier_circuit_breaker();

        for _ in 0..3 {
            let result: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("smtp relay down"));
            assert!(result.is_err());
        }

        assert!(!cb.is_call_permitted());
        let result: Result<(), Error<&str>> = cb.call(|| Ok::<(), &str>(()));
        assert!(matches!(result, Err(Error::Rejected)));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = create_notifier_circuit_breaker();

        for _ in 0..2 {
            let _: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("timeout"));
        }
        let _: Result<(), Error<&str>> = cb.call(|| Ok::<(), &str>(()));
        for _ in 0..2 {
            let _: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("timeout"));
        }

        assert!(cb.is_call_permitted());
    }
}
