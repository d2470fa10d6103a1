//! Timer plumbing for the collector.
//!
//! Every bounded wait in the crate goes through the [`Clock`] trait so the
//! race logic can be driven by browser timers in production and by scripted
//! clocks in native tests.

mod sleep;
mod time;

pub use sleep::BrowserClock;
pub use time::now_ms;

use std::future::Future;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::{pin_mut, select_biased, FutureExt};

/// Source of sleep futures.
///
/// Dropping a sleep future before it fires must cancel the underlying timer.
pub trait Clock {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        (**self).sleep(duration)
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        (**self).sleep(duration)
    }
}

/// Run `future` for at most `duration`.
///
/// Returns `None` when the deadline fired first. If both are ready on the
/// same poll the future's output wins.
pub async fn timeout<C, F>(clock: &C, duration: Duration, future: F) -> Option<F::Output>
where
    C: Clock + ?Sized,
    F: Future,
{
    let future = future.fuse();
    let deadline = clock.sleep(duration).fuse();
    pin_mut!(future, deadline);

    select_biased! {
        output = future => Some(output),
        () = deadline => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::future::{pending, ready};

    /// Sleeps of at most `fires_within` are ready immediately, longer ones never fire.
    struct ThresholdClock {
        fires_within: Duration,
    }

    impl Clock for ThresholdClock {
        fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
            if duration <= self.fires_within {
                ready(()).boxed_local()
            } else {
                pending().boxed_local()
            }
        }
    }

    #[test]
    fn test_timeout_passes_through_ready_output() {
        let clock = ThresholdClock {
            fires_within: Duration::from_secs(10),
        };
        let out = block_on(timeout(&clock, Duration::from_millis(5), ready(42)));
        assert_eq!(out, Some(42));
    }

    #[test]
    fn test_timeout_fires_on_stalled_future() {
        let clock = ThresholdClock {
            fires_within: Duration::from_secs(10),
        };
        let out = block_on(timeout(&clock, Duration::from_millis(5), pending::<u8>()));
        assert_eq!(out, None);
    }
}
