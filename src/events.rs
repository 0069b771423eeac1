//! Latching event flags, through which the protocol layer tasks signal each other.
//!
//! A set of events is owned by the task that waits on it. Any other task (or interrupt handler)
//! may signal events at any time. Signaled events stay pending until the owner observes them,
//! either by waiting for any of a set of events, or by polling without blocking.
use core::cell::RefCell;
use core::future::poll_fn;
use core::marker::PhantomData;
use core::task::Poll;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::waitqueue::WakerRegistration;

struct Inner {
    pending: u8,
    waker: WakerRegistration,
}

/// A set of latching event flags with a single waiter.
///
/// `F` is a flag type that converts to and from its `u8` storage, such as the bitfields in
/// [`crate::protocol_layer`].
pub struct Events<M: RawMutex, F> {
    inner: Mutex<M, RefCell<Inner>>,
    _flags: PhantomData<F>,
}

impl<M: RawMutex, F> Events<M, F> {
    /// Create an event set without pending events.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                pending: 0,
                waker: WakerRegistration::new(),
            })),
            _flags: PhantomData,
        }
    }
}

impl<M: RawMutex, F> Default for Events<M, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, F: Copy + From<u8> + Into<u8>> Events<M, F> {
    /// Signal events, waking the waiter if it waits for any of them.
    pub fn signal(&self, events: F) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            inner.pending |= events.into();
            inner.waker.wake();
        })
    }

    /// Wait until any of the events in `mask` is pending.
    ///
    /// Returns all pending events of `mask`, and clears them. Events outside of `mask` stay pending.
    pub async fn wait_any(&self, mask: F) -> F {
        let mask: u8 = mask.into();

        poll_fn(|cx| {
            self.inner.lock(|inner| {
                let mut inner = inner.borrow_mut();
                let events = inner.pending & mask;

                if events != 0 {
                    inner.pending &= !events;
                    Poll::Ready(F::from(events))
                } else {
                    inner.waker.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await
    }

    /// Return and clear the pending events of `mask`, without waiting.
    pub fn take(&self, mask: F) -> F {
        let mask: u8 = mask.into();

        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let events = inner.pending & mask;
            inner.pending &= !events;
            F::from(events)
        })
    }

    /// All pending events, left untouched.
    pub fn pending(&self) -> F {
        self.inner.lock(|inner| F::from(inner.borrow().pending))
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::join::join;
    use embassy_futures::yield_now;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::Events;
    use crate::protocol_layer::TxEvents;

    #[test]
    fn test_signals_latch_until_taken() {
        let events: Events<NoopRawMutex, TxEvents> = Events::new();

        events.signal(TxEvents::RESET);
        events.signal(TxEvents::MESSAGE_TX);
        assert_eq!(events.pending(), TxEvents::RESET | TxEvents::MESSAGE_TX);

        let taken = events.take(TxEvents::RESET | TxEvents::DISCARD);
        assert_eq!(taken, TxEvents::RESET);

        // Events outside of the mask are untouched.
        assert_eq!(events.pending(), TxEvents::MESSAGE_TX);
        assert_eq!(events.take(TxEvents::RESET), TxEvents::default());
    }

    #[tokio::test]
    async fn test_wait_any_returns_all_pending_of_mask() {
        let events: Events<NoopRawMutex, TxEvents> = Events::new();

        events.signal(TxEvents::DISCARD | TxEvents::TX_SENT | TxEvents::RETRY_FAIL);

        let observed = events.wait_any(TxEvents::DISCARD | TxEvents::TX_SENT).await;
        assert!(observed.discard());
        assert!(observed.tx_sent());
        assert!(!observed.retry_fail());

        assert_eq!(events.pending(), TxEvents::RETRY_FAIL);
    }

    #[tokio::test]
    async fn test_wait_any_wakes_on_later_signal() {
        let events: Events<NoopRawMutex, TxEvents> = Events::new();

        let (observed, _) = join(events.wait_any(TxEvents::RESET), async {
            yield_now().await;

            // Not part of the mask, must not wake the waiter.
            events.signal(TxEvents::TX_SENT);
            yield_now().await;

            events.signal(TxEvents::RESET);
        })
        .await;

        assert_eq!(observed, TxEvents::RESET);
        assert_eq!(events.pending(), TxEvents::TX_SENT);
    }
}
