#![forbid(unsafe_code)]

//! End-to-end async validation scenarios driven by the lab clock.
//!
//! Validates that:
//! 1. A control is `Pending` synchronously and resolves only when the
//!    scheduler is driven.
//! 2. Superseded runs never overwrite the latest result.
//! 3. Ancestors report `PENDING` before the final status, never skipping it.
//! 4. Status event sequences match the sync-then-async pipeline.
//! 5. Stale results are reported on the debug log.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use ftui_forms::validators::{self, single_error};
use ftui_forms::{
    AsyncValidator, ControlOptions, ControlStatus, FormControl, FormGroup, SubscriptionScope,
    Value, scheduler,
};
use serde_json::json;
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use web_time::Duration;

// ============================================================================
// Helpers
// ============================================================================

/// Fails with `{"async": true}` unless the value equals `expected`. Values
/// listed in `delays` resolve after that many lab-clock milliseconds.
fn async_expecting(
    expected: &'static str,
    delays: &'static [(&'static str, u64)],
) -> AsyncValidator {
    AsyncValidator::new(move |value: &Value| {
        let ms = delays
            .iter()
            .find(|(v, _)| value == &json!(v))
            .map_or(0, |(_, ms)| *ms);
        let timer = scheduler::sleep(Duration::from_millis(ms));
        let failed = value != &json!(expected);
        async move {
            timer.await;
            failed.then(|| single_error("async", json!(true)))
        }
    })
}

fn record_statuses(
    scope: &mut SubscriptionScope,
    control: &ftui_forms::Control,
) -> Rc<RefCell<Vec<ControlStatus>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let l = Rc::clone(&log);
    scope.subscribe(control.status_changes(), move |s| l.borrow_mut().push(*s));
    log
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn initial_async_run_resolves_on_flush() {
    let options = ControlOptions::new().async_validator(async_expecting("expected", &[]));
    let c = FormControl::with_options("value", options);
    assert!(c.pending());
    assert_eq!(scheduler::active_tasks(), 1);

    scheduler::flush();
    assert!(!c.valid());
    assert_eq!(c.errors(), Some(single_error("async", json!(true))));
}

#[test]
fn latest_run_wins_over_slower_earlier_run() {
    let c = FormControl::with_options(
        "",
        ControlOptions::new().async_validator(async_expecting(
            "expected",
            &[("long", 200), ("expected", 100)],
        )),
    );

    c.set_value("long");
    c.set_value("expected");
    assert!(c.pending());

    scheduler::advance(Duration::from_millis(150));
    assert!(c.valid());

    scheduler::advance(Duration::from_millis(150));
    assert!(c.valid(), "the superseded 'long' run must not land");
    assert_eq!(scheduler::pending_timers(), 0);
}

#[test]
fn composite_reports_pending_before_resolution() {
    let slow = FormControl::with_options(
        "x",
        ControlOptions::new().async_validator(async_expecting("expected", &[("x", 500)])),
    );
    let quick = FormControl::new("a");
    let form = FormGroup::new([("slow", slow.clone()), ("quick", quick.clone())]);

    let mut scope = SubscriptionScope::new();
    let statuses = record_statuses(&mut scope, &form);

    slow.set_value("x");
    quick.set_value("b");
    assert!(form.pending());

    scheduler::advance(Duration::from_millis(600));
    assert_eq!(
        *statuses.borrow(),
        vec![ControlStatus::Pending, ControlStatus::Pending, ControlStatus::Invalid]
    );
    assert!(form.invalid());
    assert_eq!(form.value(), json!({"slow": "x", "quick": "b"}));
}

#[test]
fn status_sequence_follows_sync_then_async() {
    let c = FormControl::with_options(
        "old",
        ControlOptions::new()
            .validator(validators::required())
            .async_validator(async_expecting("expected", &[])),
    );
    scheduler::flush();

    let log = Rc::new(RefCell::new(Vec::new()));
    let mut scope = SubscriptionScope::new();
    let l = Rc::clone(&log);
    scope.subscribe(c.value_changes(), move |v| {
        l.borrow_mut().push(format!("value: {v}"));
    });
    let l = Rc::clone(&log);
    scope.subscribe(c.status_changes(), move |s| {
        l.borrow_mut().push(format!("status: {s}"));
    });

    for next in ["", "nonEmpty", "expected"] {
        c.set_value(next);
        scheduler::flush();
    }

    assert_eq!(
        *log.borrow(),
        vec![
            "value: \"\"",
            "status: INVALID",
            "value: \"nonEmpty\"",
            "status: PENDING",
            "status: INVALID",
            "value: \"expected\"",
            "status: PENDING",
            "status: VALID",
        ]
    );
}

#[test]
fn composed_async_validators_merge() {
    let other = AsyncValidator::new(|_| async { Some(single_error("other", json!(true))) });
    let c = FormControl::with_options(
        "value",
        ControlOptions::new()
            .async_validator(async_expecting("expected", &[]))
            .async_validator(other),
    );
    scheduler::flush();
    assert_eq!(c.errors().map(|e| e.len()), Some(2));
    assert!(c.has_error("async"));
    assert!(c.has_error("other"));
}

#[test]
fn async_validators_can_be_added_and_cleared() {
    let c = FormControl::new("value");
    c.set_async_validators([async_expecting("expected", &[])]);
    assert!(c.async_validator().is_some());

    c.set_value("expected");
    scheduler::flush();
    assert!(c.valid());

    c.clear_async_validators();
    assert!(c.async_validator().is_none());
    c.set_value("anything");
    assert!(c.valid());
}

#[test]
fn silent_update_resolves_silently() {
    let options = ControlOptions::new().async_validator(async_expecting("expected", &[]));
    let c = FormControl::with_options("v", options);
    scheduler::flush();

    let mut scope = SubscriptionScope::new();
    let statuses = record_statuses(&mut scope, &c);
    c.set_value_with("w", ftui_forms::UpdateOptions::new().silent());
    scheduler::flush();

    assert!(statuses.borrow().is_empty());
    assert!(c.invalid());
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Default)]
struct Captured {
    messages: Vec<String>,
}

struct CaptureLayer {
    state: Arc<Mutex<Captured>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg {
            message: Option<String>,
        }
        impl tracing::field::Visit for Msg {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.message = Some(value.to_string());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        let mut msg = Msg { message: None };
        event.record(&mut msg);
        if let Some(message) = msg.message {
            let mut state = self.state.lock().expect("capture lock");
            state.messages.push(message);
        }
    }
}

#[test]
fn superseded_runs_are_logged() {
    let state = Arc::new(Mutex::new(Captured::default()));
    let subscriber = tracing_subscriber::registry().with(CaptureLayer {
        state: Arc::clone(&state),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let c = FormControl::with_options(
        "",
        ControlOptions::new().async_validator(async_expecting("expected", &[("long", 200)])),
    );
    c.set_value("long");
    c.set_value("expected");
    scheduler::advance(Duration::from_millis(300));

    let form = FormGroup::new([("c", c.clone())]);
    assert!(form.set_value(json!({"missing": 1})).is_err());

    let snapshot = state.lock().expect("capture lock");
    assert!(
        snapshot
            .messages
            .iter()
            .any(|m| m == "superseded async validation aborted"),
        "expected abort event, got {:?}",
        snapshot.messages
    );
    assert!(snapshot.messages.iter().any(|m| m == "set_value rejected"));
    assert!(snapshot.messages.iter().any(|m| m == "value and validity updated"));
}
