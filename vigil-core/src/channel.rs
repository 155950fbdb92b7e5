//! Latest-value channels
//!
//! A single-slot mailbox between one producer task and any number of
//! readers. Publishing always overwrites whatever is in the slot and never
//! blocks; peeking never removes the value. Readers therefore see either
//! "nothing published yet" or the most recent sample, never a backlog.
//!
//! The slot lives inside a critical-section mutex, so a publish is atomic
//! with respect to every concurrent peek, including peeks from interrupt
//! context and from other executors.

use core::cell::RefCell;
use core::future::{poll_fn, Future};
use core::task::Poll;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::MultiWakerRegistration;

/// Maximum number of async readers parked on an empty channel at once
///
/// Registering more wakes everyone early; they simply poll again.
pub const MAX_WAITERS: usize = 4;

/// A published value together with its publish sequence number
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample<T> {
    /// The value itself
    pub value: T,
    /// 1-based number of the publish that produced this value
    pub seq: u32,
}

struct Slot<T> {
    latest: Option<Sample<T>>,
    publishes: u32,
    waiters: MultiWakerRegistration<MAX_WAITERS>,
}

/// Single-slot, overwrite-on-publish channel
pub struct LatestValue<T: Copy> {
    slot: Mutex<CriticalSectionRawMutex, RefCell<Slot<T>>>,
}

impl<T: Copy> LatestValue<T> {
    /// Create an empty channel
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(Slot {
                latest: None,
                publishes: 0,
                waiters: MultiWakerRegistration::new(),
            })),
        }
    }

    /// Replace the stored value
    ///
    /// Always succeeds, whether or not anyone read the previous value.
    pub fn publish(&self, value: T) {
        self.slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            slot.publishes = slot.publishes.wrapping_add(1);
            let seq = slot.publishes;
            slot.latest = Some(Sample { value, seq });
            slot.waiters.wake();
        });
    }

    /// Read the latest value without waiting
    ///
    /// This is a peek with a zero timeout: `None` means nothing has been
    /// published yet.
    pub fn try_peek(&self) -> Option<T> {
        self.try_peek_sample().map(|s| s.value)
    }

    /// Read the latest value and its sequence number without waiting
    pub fn try_peek_sample(&self) -> Option<Sample<T>> {
        self.slot.lock(|slot| slot.borrow().latest)
    }

    /// Wait until a value exists, then return it without removing it
    ///
    /// Resolves immediately once anything has been published. Callers that
    /// need a bounded wait wrap this in a timeout.
    pub async fn peek(&self) -> T {
        poll_fn(|cx| {
            self.slot.lock(|slot| {
                let mut slot = slot.borrow_mut();
                match slot.latest {
                    Some(sample) => Poll::Ready(sample.value),
                    None => {
                        slot.waiters.register(cx.waker());
                        Poll::Pending
                    }
                }
            })
        })
        .await
    }

    /// Peek, giving up when `deadline` completes first
    ///
    /// `deadline` is any future that resolves when the wait should end,
    /// normally a timer. A value that is already present wins even over a
    /// deadline that has already passed.
    pub async fn peek_until<D: Future>(&self, deadline: D) -> Option<T> {
        match select(self.peek(), deadline).await {
            Either::First(value) => Some(value),
            Either::Second(_) => None,
        }
    }

    /// Whether anything has ever been published
    pub fn has_value(&self) -> bool {
        self.slot.lock(|slot| slot.borrow().latest.is_some())
    }

    /// Number of publishes so far (wraps)
    pub fn publish_count(&self) -> u32 {
        self.slot.lock(|slot| slot.borrow().publishes)
    }
}

impl<T: Copy> Default for LatestValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::pin::pin;
    use embassy_futures::poll_once;
    use proptest::prelude::*;

    #[test]
    fn test_empty_channel_has_no_value() {
        let chan: LatestValue<u32> = LatestValue::new();
        assert_eq!(chan.try_peek(), None);
        assert!(!chan.has_value());
        assert_eq!(chan.publish_count(), 0);
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let chan = LatestValue::new();
        chan.publish(42u32);

        assert_eq!(chan.try_peek(), Some(42));
        assert_eq!(chan.try_peek(), Some(42));
        assert!(chan.has_value());
    }

    #[test]
    fn test_publish_overwrites_unread_value() {
        let chan = LatestValue::new();
        chan.publish(1u32);
        chan.publish(2);
        chan.publish(3);

        assert_eq!(chan.try_peek(), Some(3));
        assert_eq!(chan.publish_count(), 3);
    }

    #[test]
    fn test_republishing_same_value_leaves_peek_unchanged() {
        let chan = LatestValue::new();
        chan.publish(23.7f32);
        let before = chan.try_peek();
        chan.publish(23.7f32);

        assert_eq!(chan.try_peek(), before);
        assert_eq!(chan.try_peek_sample().map(|s| s.seq), Some(2));
    }

    #[test]
    fn test_async_peek_waits_for_first_publish() {
        let chan = LatestValue::new();
        let mut fut = pin!(chan.peek());

        assert!(poll_once(fut.as_mut()).is_pending());

        chan.publish(7u32);
        assert_eq!(poll_once(fut.as_mut()), Poll::Ready(7));
    }

    #[test]
    fn test_async_peek_ready_when_value_present() {
        let chan = LatestValue::new();
        chan.publish(9u32);

        assert_eq!(embassy_futures::block_on(chan.peek()), 9);
        // Still there for the next reader
        assert_eq!(chan.try_peek(), Some(9));
    }

    #[test]
    fn test_peek_until_expired_deadline_on_empty_channel() {
        let chan: LatestValue<u32> = LatestValue::new();

        let peeked = embassy_futures::block_on(chan.peek_until(core::future::ready(())));
        assert_eq!(peeked, None);
        assert!(!chan.has_value());
    }

    #[test]
    fn test_peek_until_value_published_before_deadline() {
        let chan = LatestValue::new();
        let mut fut = pin!(chan.peek_until(core::future::pending::<()>()));

        assert!(poll_once(fut.as_mut()).is_pending());

        chan.publish(5u32);
        assert_eq!(poll_once(fut.as_mut()), Poll::Ready(Some(5)));
    }

    #[test]
    fn test_peek_until_present_value_beats_passed_deadline() {
        let chan = LatestValue::new();
        chan.publish(11u32);

        let peeked = embassy_futures::block_on(chan.peek_until(core::future::ready(())));
        assert_eq!(peeked, Some(11));
    }

    #[test]
    fn test_readers_never_observe_torn_values() {
        // Both halves are written together; a torn read would mismatch.
        let chan: LatestValue<(u64, u64)> = LatestValue::new();

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..20_000u64 {
                    chan.publish((i, !i));
                }
            });

            for _ in 0..2 {
                s.spawn(|| {
                    let mut last_seen = 0u64;
                    for _ in 0..20_000 {
                        if let Some((a, b)) = chan.try_peek() {
                            assert_eq!(b, !a);
                            // Single producer, so values only move forward
                            assert!(a >= last_seen);
                            last_seen = a;
                        }
                    }
                });
            }
        });

        assert_eq!(chan.try_peek(), Some((19_999, !19_999)));
    }

    proptest! {
        #[test]
        fn prop_peek_returns_most_recent_publish(values in proptest::collection::vec(any::<i32>(), 0..64)) {
            let chan = LatestValue::new();
            for v in &values {
                chan.publish(*v);
            }

            prop_assert_eq!(chan.try_peek(), values.last().copied());
            prop_assert_eq!(chan.publish_count() as usize, values.len());
        }
    }
}
