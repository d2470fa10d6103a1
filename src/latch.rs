//! One-shot latch.
//!
//! Several asynchronous paths race to finish the same piece of work
//! (sampler convergence, sampler deadline, the global ceiling). The first
//! one to call [`Latch::settle`] wins; every later call is a no-op that
//! returns `false` and leaves the stored value untouched.
//!
//! WASM is single-threaded, so the shared state lives in an `Rc<RefCell<_>>`
//! and borrows are never held across an await point.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct LatchState<T> {
    value: Option<T>,
    wakers: Vec<Waker>,
}

/// A cloneable handle to a single-assignment slot.
pub struct Latch<T> {
    state: Rc<RefCell<LatchState<T>>>,
}

impl<T> Clone for Latch<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> Default for Latch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Latch<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LatchState {
                value: None,
                wakers: Vec::new(),
            })),
        }
    }

    /// Store `value` if nothing has been stored yet.
    ///
    /// Returns `true` for the caller that won the race.
    pub fn settle(&self, value: T) -> bool {
        let wakers = {
            let mut st = self.state.borrow_mut();
            if st.value.is_some() {
                return false;
            }
            st.value = Some(value);
            std::mem::take(&mut st.wakers)
        };
        // Wake outside the borrow: a waker may poll synchronously.
        for waker in wakers {
            waker.wake();
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        self.state.borrow().value.is_some()
    }

    /// Future that resolves once the latch has been settled.
    pub fn wait(&self) -> LatchWait<T> {
        LatchWait {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone> Latch<T> {
    /// The settled value, if any
    pub fn get(&self) -> Option<T> {
        self.state.borrow().value.clone()
    }
}

/// Future returned by [`Latch::wait`].
pub struct LatchWait<T> {
    state: Rc<RefCell<LatchState<T>>>,
}

impl<T: Clone> Future for LatchWait<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut st = self.state.borrow_mut();
        match &st.value {
            Some(value) => Poll::Ready(value.clone()),
            None => {
                if !st.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    st.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::FutureExt;

    #[test]
    fn test_first_settle_wins() {
        let latch = Latch::new();
        assert!(!latch.is_settled());

        assert!(latch.settle("converged"));
        assert!(!latch.settle("ceiling"));
        assert!(!latch.settle("timed out"));

        assert_eq!(latch.get(), Some("converged"));
    }

    #[test]
    fn test_clones_share_the_slot() {
        let latch = Latch::new();
        let other = latch.clone();

        assert!(other.settle(7u32));
        assert!(!latch.settle(9));
        assert_eq!(latch.get(), Some(7));
    }

    #[test]
    fn test_wait_resolves_after_settle() {
        let latch: Latch<u8> = Latch::new();
        let mut wait = latch.wait();

        assert!((&mut wait).now_or_never().is_none());
        latch.settle(3);
        assert_eq!(block_on(wait), 3);
    }

    #[test]
    fn test_wait_after_settle_is_ready() {
        let latch = Latch::new();
        latch.settle(String::from("done"));
        assert_eq!(latch.wait().now_or_never(), Some("done".to_string()));
    }
}
