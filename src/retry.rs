//! Bounded fixed-interval retry loop.
//!
//! License resolution and readiness polling share [`retry_until`], so both
//! loops have identical attempt counting and timeout semantics.

use crate::RetryBudget;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// A probe that eventually succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled<T> {
    /// The value returned by the successful probe.
    pub value: T,

    /// 1-based number of the successful attempt.
    pub attempts: u32,
}

/// The budget ran out before any probe succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// Probes made.
    pub attempts: u32,

    /// Time spent, sleeps included.
    pub elapsed: Duration,

    /// What the final probe observed.
    pub last: E,
}

/// Call `probe` until it returns `Ok`, at most `budget.max_attempts` times,
/// sleeping `budget.interval` between attempts.
///
/// `probe` receives the 1-based attempt number. There is no sleep before
/// the first attempt or after the last one, and a zero `max_attempts` is
/// treated as one.
///
/// # Example
///
/// ```rust
/// use vendor_deploy::{retry_until, RetryBudget};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let budget = RetryBudget::new(5, Duration::from_millis(1));
/// let settled = retry_until(budget, |attempt| async move {
///     if attempt == 3 { Ok("up") } else { Err("down") }
/// })
/// .await
/// .unwrap();
/// assert_eq!(settled.attempts, 3);
/// # }
/// ```
pub async fn retry_until<T, E, F, Fut>(
    budget: RetryBudget,
    mut probe: F,
) -> Result<Settled<T>, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let max_attempts = budget.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match probe(attempt).await {
            Ok(value) => {
                return Ok(Settled {
                    value,
                    attempts: attempt,
                })
            }
            Err(last) if attempt >= max_attempts => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    elapsed: started.elapsed(),
                    last,
                })
            }
            Err(_) => {
                sleep(budget.interval).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_first_success() {
        let calls = Cell::new(0);
        let budget = RetryBudget::new(12, Duration::from_secs(10));

        let result = retry_until(budget, |attempt| {
            calls.set(calls.get() + 1);
            async move {
                if attempt == 5 {
                    Ok(attempt)
                } else {
                    Err(())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.attempts, 5);
        assert_eq!(result.value, 5);
        assert_eq!(calls.get(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_bounded() {
        let calls = Cell::new(0);
        let budget = RetryBudget::new(30, Duration::from_secs(10));

        let err = retry_until(budget, |attempt| {
            calls.set(calls.get() + 1);
            async move { Err::<(), _>(attempt) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.attempts, 30);
        assert_eq!(err.last, 30);
        assert_eq!(calls.get(), 30);
        // 29 sleeps between 30 probes
        assert_eq!(err.elapsed, Duration::from_secs(290));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_does_not_sleep() {
        let started = Instant::now();
        let result = retry_until(RetryBudget::readiness(), |_| async { Ok::<_, ()>(()) })
            .await
            .unwrap();

        assert_eq!(result.attempts, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_probes_once() {
        let budget = RetryBudget::new(0, Duration::from_secs(10));
        let err = retry_until(budget, |_| async { Err::<(), _>("down") })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.last, "down");
    }
}
