//! Exponential backoff schedule and the suspension capability retry loops sleep through.
//!
//! Retry index `n` maps to `2^n` seconds with no jitter, so a budget of three retries waits
//! 1s, 2s, and 4s. The same schedule drives token-endpoint retries and unauthorized-response
//! retries.

// self
use crate::_prelude::*;

/// Boxed future returned by [`Sleeper::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Suspends the calling task between retry attempts.
pub trait Sleeper
where
	Self: Send + Sync,
{
	/// Resolves once `delay` has elapsed.
	fn sleep(&self, delay: Duration) -> SleepFuture<'_>;
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;
impl Sleeper for TokioSleeper {
	fn sleep(&self, delay: Duration) -> SleepFuture<'_> {
		Box::pin(tokio::time::sleep(delay.unsigned_abs()))
	}
}

/// Returns the wait before retry `attempt` (zero-based): `2^attempt` seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
	Duration::seconds(2_i64.checked_pow(attempt).unwrap_or(i64::MAX))
}

/// Iterator over `(attempt, delay)` pairs for a fixed retry budget.
#[derive(Clone, Debug)]
pub struct BackoffSchedule {
	next: u32,
	retries: u32,
}
impl BackoffSchedule {
	/// Creates a schedule yielding `retries` steps.
	pub fn new(retries: u32) -> Self {
		Self { next: 0, retries }
	}
}
impl Iterator for BackoffSchedule {
	type Item = (u32, Duration);

	fn next(&mut self) -> Option<Self::Item> {
		if self.next >= self.retries {
			return None;
		}

		let attempt = self.next;

		self.next += 1;

		Some((attempt, backoff_delay(attempt)))
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		let remaining = usize::try_from(self.retries - self.next).unwrap_or(usize::MAX);

		(remaining, Some(remaining))
	}
}
impl ExactSizeIterator for BackoffSchedule {}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn delays_double_from_one_second() {
		let delays = (0..5).map(|n| backoff_delay(n).whole_seconds()).collect::<Vec<_>>();

		assert_eq!(delays, vec![1, 2, 4, 8, 16]);
	}

	#[test]
	fn delays_saturate_instead_of_overflowing() {
		assert_eq!(backoff_delay(62), Duration::seconds(1 << 62));
		assert_eq!(backoff_delay(63), Duration::seconds(i64::MAX));
		assert_eq!(backoff_delay(u32::MAX), Duration::seconds(i64::MAX));
	}

	#[test]
	fn schedule_yields_budgeted_steps() {
		let schedule = BackoffSchedule::new(3);

		assert_eq!(schedule.len(), 3);
		assert_eq!(
			schedule.collect::<Vec<_>>(),
			vec![(0, Duration::seconds(1)), (1, Duration::seconds(2)), (2, Duration::seconds(4))]
		);
		assert_eq!(BackoffSchedule::new(0).next(), None);
	}

	#[tokio::test]
	async fn tokio_sleeper_waits_for_short_delays() {
		let started = std::time::Instant::now();

		TokioSleeper.sleep(Duration::milliseconds(5)).await;

		assert!(started.elapsed() >= std::time::Duration::from_millis(5));
	}
}
