#![forbid(unsafe_code)]

//! Hot broadcast streams for control change notifications.
//!
//! Every control owns two [`EventStream`]s: one for its value and one for its
//! status. A stream is a plain observer list with synchronous delivery:
//! `emit` calls every live subscriber, in registration order, before it
//! returns. There is no buffering and no replay, so a subscriber added after
//! an emission never sees it.
//!
//! # Architecture
//!
//! Subscribers are stored as `Weak` callbacks. The strong side lives in the
//! [`Subscription`] guard returned by [`EventStream::subscribe`]; dropping the
//! guard unsubscribes. Dead entries are pruned lazily on the next emission.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. Each live subscriber receives every emission made while it is alive.
//! 3. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 4. No internal borrow is held while a callback runs, so callbacks may
//!    freely read or mutate the form tree and subscribe to other streams.
//!
//! # Failure Modes
//!
//! - Callback panic: propagates to the caller of the mutation that emitted.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Box<dyn Fn(&T)>;

/// A multi-subscriber, hot event stream.
pub struct EventStream<T> {
    subscribers: RefCell<Vec<Weak<Callback<T>>>>,
    emitted: Cell<u64>,
}

impl<T: 'static> EventStream<T> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            emitted: Cell::new(0),
        }
    }

    /// Register `callback` for every future emission.
    ///
    /// The callback stays registered for as long as the returned
    /// [`Subscription`] is alive.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: Rc<Callback<T>> = Rc::new(Box::new(callback));
        self.subscribers.borrow_mut().push(Rc::downgrade(&strong));
        Subscription { _guard: strong }
    }

    /// Deliver `value` to every live subscriber.
    pub(crate) fn emit(&self, value: &T) {
        self.emitted.set(self.emitted.get() + 1);
        let live: Vec<Rc<Callback<T>>> = {
            let mut subs = self.subscribers.borrow_mut();
            subs.retain(|weak| weak.strong_count() > 0);
            subs.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in live {
            callback(value);
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Total number of emissions since the stream was created.
    #[must_use]
    pub fn emit_count(&self) -> u64 {
        self.emitted.get()
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("subscribers", &self.subscribers.borrow().len())
            .field("emitted", &self.emitted.get())
            .finish()
    }
}

/// RAII guard for a stream subscription. Dropping it unsubscribes.
pub struct Subscription {
    _guard: Rc<dyn Any>,
}

impl Subscription {
    /// Explicitly end the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Holds the subscriptions of one consumer (a widget, a test harness).
///
/// When the scope is dropped every held subscription is released.
///
/// # Invariants
///
/// 1. After drop or [`clear`](Self::clear), no callback registered through
///    this scope fires again.
/// 2. [`len`](Self::len) always equals the number of held subscriptions.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `sub` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Subscribe to `stream` and hold the subscription. Returns `self` for
    /// chaining.
    pub fn subscribe<T: 'static>(
        &mut self,
        stream: &EventStream<T>,
        callback: impl Fn(&T) + 'static,
    ) -> &mut Self {
        let sub = stream.subscribe(callback);
        self.subscriptions.push(sub);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every held subscription. The scope stays usable.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("len", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_registration_order() {
        let stream = EventStream::<i32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l1 = Rc::clone(&log);
        let _a = stream.subscribe(move |v| l1.borrow_mut().push(format!("a{v}")));
        let l2 = Rc::clone(&log);
        let _b = stream.subscribe(move |v| l2.borrow_mut().push(format!("b{v}")));

        stream.emit(&1);
        stream.emit(&2);
        assert_eq!(*log.borrow(), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn late_subscriber_sees_no_replay() {
        let stream = EventStream::<&'static str>::new();
        stream.emit(&"early");

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = stream.subscribe(move |v| s.borrow_mut().push(*v));
        assert!(seen.borrow().is_empty());

        stream.emit(&"late");
        assert_eq!(*seen.borrow(), vec!["late"]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let stream = EventStream::<u8>::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = stream.subscribe(move |_| h.set(h.get() + 1));
        assert_eq!(stream.subscriber_count(), 1);

        stream.emit(&0);
        sub.unsubscribe();
        stream.emit(&0);

        assert_eq!(hits.get(), 1);
        assert_eq!(stream.subscriber_count(), 0);
        assert_eq!(stream.emit_count(), 2);
    }

    #[test]
    fn callback_may_subscribe_during_emit() {
        let stream = Rc::new(EventStream::<u8>::new());
        let held = Rc::new(RefCell::new(Vec::new()));

        let s = Rc::clone(&stream);
        let h = Rc::clone(&held);
        let _outer = stream.subscribe(move |_| {
            let sub = s.subscribe(|_| {});
            h.borrow_mut().push(sub);
        });

        stream.emit(&1);
        assert_eq!(stream.subscriber_count(), 2);
    }

    #[test]
    fn scope_releases_on_drop() {
        let stream = EventStream::<i32>::new();
        let seen = Rc::new(Cell::new(0));
        {
            let mut scope = SubscriptionScope::new();
            let s = Rc::clone(&seen);
            scope.subscribe(&stream, move |v| s.set(*v));
            assert_eq!(scope.len(), 1);
            stream.emit(&7);
        }
        stream.emit(&9);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn scope_clear_is_reusable() {
        let stream = EventStream::<i32>::new();
        let mut scope = SubscriptionScope::new();

        let first = Rc::new(Cell::new(false));
        let f = Rc::clone(&first);
        scope.subscribe(&stream, move |_| f.set(true));
        scope.clear();
        assert!(scope.is_empty());

        let second = Rc::new(Cell::new(false));
        let s = Rc::clone(&second);
        let sub = stream.subscribe(move |_| s.set(true));
        scope.hold(sub);

        stream.emit(&1);
        assert!(!first.get());
        assert!(second.get());
        assert!(format!("{scope:?}").contains("len: 1"));
    }
}
