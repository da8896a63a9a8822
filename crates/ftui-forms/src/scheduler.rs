#![forbid(unsafe_code)]

//! Thread-local cooperative scheduler for asynchronous validation.
//!
//! Async validators never run inline. A control that starts an async run
//! spawns a task here and returns immediately with status `Pending`; the
//! result is applied only when the host drives the scheduler:
//!
//! - [`flush`] polls every ready task until none can make progress (the
//!   host's "end of turn").
//! - [`advance`] moves the lab clock forward, waking [`sleep`] timers in
//!   deadline order and flushing after each step.
//!
//! Because nothing here runs on its own, every synchronous propagation of a
//! mutation completes before any async result lands.
//!
//! # Lab clock
//!
//! Time is virtual and starts at zero on every thread. [`sleep`] is the only
//! time source; validators that model latency await it. This keeps async
//! validation fully deterministic under test.
//!
//! # Failure Modes
//!
//! - Re-entrant [`flush`] (from inside a task or a subscriber that runs
//!   during a flush) is a no-op returning `false`; the outer flush keeps
//!   polling until stalled, so no work is lost.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use web_time::Duration;

#[derive(Default)]
struct LabClock {
    now: Duration,
    next_timer_id: u64,
    timers: BTreeMap<(Duration, u64), Waker>,
}

thread_local! {
    static POOL: RefCell<LocalPool> = RefCell::new(LocalPool::new());
    static SPAWNER: LocalSpawner = POOL.with(|pool| pool.borrow().spawner());
    static CLOCK: RefCell<LabClock> = RefCell::new(LabClock::default());
    static ACTIVE_TASKS: Cell<usize> = const { Cell::new(0) };
}

/// Queue `task` on this thread's scheduler. It first runs at the next
/// [`flush`] or [`advance`].
pub fn spawn(task: impl Future<Output = ()> + 'static) {
    ACTIVE_TASKS.with(|n| n.set(n.get() + 1));
    let tracked = async move {
        task.await;
        ACTIVE_TASKS.with(|n| n.set(n.get().saturating_sub(1)));
    };
    if let Err(err) = SPAWNER.with(|spawner| spawner.spawn_local(tracked)) {
        ACTIVE_TASKS.with(|n| n.set(n.get().saturating_sub(1)));
        tracing::warn!(error = %err, "scheduler rejected task");
    } else {
        tracing::trace!(active = active_tasks(), "task spawned");
    }
}

/// Run every ready task until no task can make progress.
///
/// Returns `false` if called re-entrantly while a flush is in progress.
pub fn flush() -> bool {
    SPAWNER.with(|_| ());
    POOL.with(|pool| match pool.try_borrow_mut() {
        Ok(mut pool) => {
            pool.run_until_stalled();
            true
        }
        Err(_) => {
            tracing::debug!("flush requested while the scheduler is already running");
            false
        }
    })
}

/// Move the lab clock forward by `by`, firing due timers in deadline order
/// and flushing after each step.
pub fn advance(by: Duration) {
    let target = now() + by;
    loop {
        flush();
        let due = CLOCK.with(|clock| {
            let mut clock = clock.borrow_mut();
            let (&(deadline, _), _) = clock.timers.iter().next()?;
            if deadline > target {
                return None;
            }
            clock.now = clock.now.max(deadline);
            let keys: Vec<(Duration, u64)> = clock
                .timers
                .range(..=(deadline, u64::MAX))
                .map(|(key, _)| *key)
                .collect();
            Some(
                keys.into_iter()
                    .filter_map(|key| clock.timers.remove(&key))
                    .collect::<Vec<Waker>>(),
            )
        });
        match due {
            Some(wakers) => {
                tracing::trace!(
                    fired = wakers.len(),
                    now_ms = now().as_millis() as u64,
                    "timers fired"
                );
                wakers.into_iter().for_each(Waker::wake);
            }
            None => break,
        }
    }
    CLOCK.with(|clock| {
        let mut clock = clock.borrow_mut();
        clock.now = clock.now.max(target);
    });
    flush();
}

/// Current lab-clock time on this thread.
#[must_use]
pub fn now() -> Duration {
    CLOCK.with(|clock| clock.borrow().now)
}

/// Number of spawned tasks that have not completed yet.
#[must_use]
pub fn active_tasks() -> usize {
    ACTIVE_TASKS.with(Cell::get)
}

/// Number of registered, not yet fired timers.
#[must_use]
pub fn pending_timers() -> usize {
    CLOCK.with(|clock| clock.borrow().timers.len())
}

/// A future that completes once the lab clock reaches `now() + duration`.
///
/// The deadline is fixed when `sleep` is called, not when first polled.
#[must_use]
pub fn sleep(duration: Duration) -> Sleep {
    Sleep {
        deadline: now() + duration,
        timer_id: None,
    }
}

/// Future returned by [`sleep`].
#[derive(Debug)]
pub struct Sleep {
    deadline: Duration,
    timer_id: Option<u64>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let deadline = self.deadline;
        let ready = CLOCK.with(|clock| clock.borrow().now >= deadline);
        if ready {
            self.release();
            return Poll::Ready(());
        }
        let id = CLOCK.with(|clock| {
            let mut clock = clock.borrow_mut();
            let id = match self.timer_id {
                Some(id) => id,
                None => {
                    let id = clock.next_timer_id;
                    clock.next_timer_id += 1;
                    id
                }
            };
            clock.timers.insert((deadline, id), cx.waker().clone());
            id
        });
        self.timer_id = Some(id);
        Poll::Pending
    }
}

impl Sleep {
    fn release(&mut self) {
        if let Some(id) = self.timer_id.take() {
            let deadline = self.deadline;
            let _ = CLOCK.try_with(|clock| {
                if let Ok(mut clock) = clock.try_borrow_mut() {
                    clock.timers.remove(&(deadline, id));
                }
            });
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn spawned_task_waits_for_flush() {
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        spawn(async move { r.set(true) });

        assert!(!ran.get());
        assert_eq!(active_tasks(), 1);
        assert!(flush());
        assert!(ran.get());
        assert_eq!(active_tasks(), 0);
    }

    #[test]
    fn sleep_resolves_only_after_advance() {
        let log = Rc::new(RefCell::new(Vec::new()));
        for (label, ms) in [("slow", 200u64), ("fast", 100)] {
            let l = Rc::clone(&log);
            let timer = sleep(Duration::from_millis(ms));
            spawn(async move {
                timer.await;
                l.borrow_mut().push((label, now().as_millis()));
            });
        }

        flush();
        assert!(log.borrow().is_empty());
        assert_eq!(pending_timers(), 2);

        advance(Duration::from_millis(150));
        assert_eq!(*log.borrow(), vec![("fast", 100)]);
        assert_eq!(now(), Duration::from_millis(150));

        advance(Duration::from_millis(100));
        assert_eq!(*log.borrow(), vec![("fast", 100), ("slow", 200)]);
        assert_eq!(pending_timers(), 0);
        assert_eq!(active_tasks(), 0);
    }

    #[test]
    fn nested_flush_is_noop() {
        let inner = Rc::new(Cell::new(None));
        let i = Rc::clone(&inner);
        spawn(async move { i.set(Some(flush())) });
        assert!(flush());
        assert_eq!(inner.get(), Some(false));
    }

    #[test]
    fn tasks_spawned_during_flush_also_run() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        spawn(async move {
            h.set(h.get() + 1);
            let h2 = Rc::clone(&h);
            spawn(async move { h2.set(h2.get() + 1) });
        });
        flush();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn dropped_sleep_releases_timer() {
        let timer = sleep(Duration::from_millis(10));
        let (fut, handle) = futures::future::abortable(timer);
        spawn(async move {
            let _ = fut.await;
        });
        flush();
        assert_eq!(pending_timers(), 1);
        handle.abort();
        flush();
        assert_eq!(pending_timers(), 0);
        assert_eq!(active_tasks(), 0);
    }
}
