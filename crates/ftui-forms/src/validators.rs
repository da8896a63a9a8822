#![forbid(unsafe_code)]

//! Validator functions and their composition.
//!
//! A [`Validator`] maps a control's value to `Some(errors)` or `None`. An
//! [`AsyncValidator`] maps a value to a [`ValidationFuture`] resolving to the
//! same. Several validators compose into one with [`compose`] /
//! [`compose_async`].
//!
//! # Merge policy
//!
//! Composed results are merged in registration order. When two validators
//! report the same key, the later validator's detail wins. A result that is
//! `Some` but empty counts as passing.
//!
//! # Failure Modes
//!
//! - Validator panic: not caught; propagates to the caller of the mutation
//!   that triggered validation.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all};
use serde_json::{Map, Value, json};

/// Error key → detail. `None` (not an empty map) means "no errors".
pub type ValidationErrors = Map<String, Value>;

/// Pending result of an asynchronous validator.
pub type ValidationFuture = LocalBoxFuture<'static, Option<ValidationErrors>>;

/// A synchronous validator.
#[derive(Clone)]
pub struct Validator {
    run: Rc<dyn Fn(&Value) -> Option<ValidationErrors>>,
}

impl Validator {
    pub fn new(f: impl Fn(&Value) -> Option<ValidationErrors> + 'static) -> Self {
        Self { run: Rc::new(f) }
    }

    #[must_use]
    pub fn validate(&self, value: &Value) -> Option<ValidationErrors> {
        (self.run)(value)
    }

    /// Whether both handles wrap the same function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.run, &other.run)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

/// An asynchronous validator.
#[derive(Clone)]
pub struct AsyncValidator {
    run: Rc<dyn Fn(&Value) -> ValidationFuture>,
}

impl AsyncValidator {
    /// Wrap a function returning any `'static` future.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(&Value) -> Fut + 'static,
        Fut: Future<Output = Option<ValidationErrors>> + 'static,
    {
        Self::from_fn(move |value| f(value).boxed_local())
    }

    /// Wrap a function that already returns a boxed future.
    pub fn from_fn(f: impl Fn(&Value) -> ValidationFuture + 'static) -> Self {
        Self { run: Rc::new(f) }
    }

    /// Start a validation run for `value`.
    #[must_use]
    pub fn validate(&self, value: &Value) -> ValidationFuture {
        (self.run)(value)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.run, &other.run)
    }
}

impl fmt::Debug for AsyncValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncValidator").finish_non_exhaustive()
    }
}

/// Build a one-entry error map.
#[must_use]
pub fn single_error(key: impl Into<String>, detail: Value) -> ValidationErrors {
    let mut errors = Map::new();
    errors.insert(key.into(), detail);
    errors
}

/// Merge results in order; later keys overwrite earlier ones.
pub(crate) fn merge_errors(
    results: impl IntoIterator<Item = Option<ValidationErrors>>,
) -> Option<ValidationErrors> {
    let mut merged = Map::new();
    for errors in results.into_iter().flatten() {
        merged.extend(errors);
    }
    if merged.is_empty() { None } else { Some(merged) }
}

/// Compose synchronous validators into one.
///
/// Returns `None` for an empty input and the validator itself for a single
/// one.
#[must_use]
pub fn compose(validators: impl IntoIterator<Item = Validator>) -> Option<Validator> {
    let mut list: Vec<Validator> = validators.into_iter().collect();
    match list.len() {
        0 => None,
        1 => list.pop(),
        _ => {
            let list: Rc<[Validator]> = list.into();
            Some(Validator::new(move |value| {
                merge_errors(list.iter().map(|v| v.validate(value)))
            }))
        }
    }
}

/// Compose asynchronous validators into one that runs every constituent
/// concurrently and resolves once all of them have resolved.
#[must_use]
pub fn compose_async(
    validators: impl IntoIterator<Item = AsyncValidator>,
) -> Option<AsyncValidator> {
    let mut list: Vec<AsyncValidator> = validators.into_iter().collect();
    match list.len() {
        0 => None,
        1 => list.pop(),
        _ => {
            let list: Rc<[AsyncValidator]> = list.into();
            Some(AsyncValidator::from_fn(move |value| {
                let runs: Vec<ValidationFuture> = list.iter().map(|v| v.validate(value)).collect();
                async move { merge_errors(join_all(runs).await) }.boxed_local()
            }))
        }
    }
}

fn is_empty_input(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn input_length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Fails with `{"required": true}` on `null`, `""` or `[]`.
#[must_use]
pub fn required() -> Validator {
    Validator::new(|value| {
        if is_empty_input(value) {
            Some(single_error("required", Value::Bool(true)))
        } else {
            None
        }
    })
}

/// Fails when a string (in chars) or array is shorter than `min`.
/// Empty input passes; combine with [`required`] to reject it.
#[must_use]
pub fn min_length(min: usize) -> Validator {
    Validator::new(move |value| {
        if is_empty_input(value) {
            return None;
        }
        let actual = input_length(value)?;
        (actual < min).then(|| {
            single_error(
                "minlength",
                json!({"requiredLength": min, "actualLength": actual}),
            )
        })
    })
}

/// Fails when a string (in chars) or array is longer than `max`.
#[must_use]
pub fn max_length(max: usize) -> Validator {
    Validator::new(move |value| {
        if is_empty_input(value) {
            return None;
        }
        let actual = input_length(value)?;
        (actual > max).then(|| {
            single_error(
                "maxlength",
                json!({"requiredLength": max, "actualLength": actual}),
            )
        })
    })
}

/// Fails when a string does not fully match `pattern`. Empty input passes.
///
/// # Errors
///
/// Returns the regex compile error if `pattern` is not a valid expression.
pub fn pattern(pattern: &str) -> Result<Validator, regex::Error> {
    let anchored = format!("^(?:{pattern})$");
    let regex = regex::Regex::new(&anchored)?;
    let required_pattern = format!("^{pattern}$");
    Ok(Validator::new(move |value| {
        if is_empty_input(value) {
            return None;
        }
        let text = value.as_str()?;
        if regex.is_match(text) {
            None
        } else {
            Some(single_error(
                "pattern",
                json!({"requiredPattern": required_pattern, "actualValue": text}),
            ))
        }
    }))
}

/// Always passes.
#[must_use]
pub fn null_validator() -> Validator {
    Validator::new(|_| None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn flag(key: &str) -> Validator {
        let key = key.to_string();
        Validator::new(move |_| Some(single_error(key.clone(), Value::Bool(true))))
    }

    #[test]
    fn required_rejects_empty_inputs() {
        let v = required();
        assert_eq!(v.validate(&json!(null)), Some(single_error("required", json!(true))));
        assert!(v.validate(&json!("")).is_some());
        assert!(v.validate(&json!([])).is_some());
        assert!(v.validate(&json!("x")).is_none());
        assert!(v.validate(&json!(0)).is_none());
        assert!(v.validate(&json!(false)).is_none());
    }

    #[test]
    fn min_and_max_length() {
        let min = min_length(3);
        assert!(min.validate(&json!("a")).is_some());
        assert!(min.validate(&json!("aaa")).is_none());
        assert!(min.validate(&json!("")).is_none());
        assert_eq!(
            min.validate(&json!("ab")),
            Some(single_error(
                "minlength",
                json!({"requiredLength": 3, "actualLength": 2})
            ))
        );

        let max = max_length(2);
        assert!(max.validate(&json!([1, 2, 3])).is_some());
        assert!(max.validate(&json!([1, 2])).is_none());
        assert!(max.validate(&json!(12345)).is_none());
    }

    #[test]
    fn length_counts_chars_not_bytes() {
        assert!(max_length(2).validate(&json!("éé")).is_none());
    }

    #[test]
    fn pattern_is_anchored() {
        let digits = pattern("[0-9]+").expect("valid regex");
        assert!(digits.validate(&json!("123")).is_none());
        assert!(digits.validate(&json!("12a")).is_some());
        assert!(digits.validate(&json!("")).is_none());
        let errors = digits.validate(&json!("x")).expect("mismatch");
        assert_eq!(errors["pattern"]["requiredPattern"], json!("^[0-9]+$"));
    }

    #[test]
    fn pattern_rejects_bad_regex() {
        assert!(pattern("(").is_err());
    }

    #[test]
    fn compose_empty_and_single() {
        assert!(compose(Vec::new()).is_none());
        let only = required();
        let composed = compose([only.clone()]).expect("single");
        assert!(composed.ptr_eq(&only));
    }

    #[test]
    fn compose_merges_all_failures() {
        let v = compose([flag("a"), null_validator(), flag("b")]).expect("composed");
        let errors = v.validate(&json!(null)).expect("errors");
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_key("a"));
        assert!(errors.contains_key("b"));
    }

    #[test]
    fn compose_last_writer_wins_on_collision() {
        let first = Validator::new(|_| Some(single_error("k", json!(1))));
        let second = Validator::new(|_| Some(single_error("k", json!(2))));
        let v = compose([first, second]).expect("composed");
        assert_eq!(v.validate(&json!(null)), Some(single_error("k", json!(2))));
    }

    #[test]
    fn compose_all_passing_is_none() {
        let empty = Validator::new(|_| Some(Map::new()));
        let v = compose([null_validator(), empty]).expect("composed");
        assert!(v.validate(&json!("x")).is_none());
    }

    #[test]
    fn compose_async_merges_after_all_resolve() {
        let a = AsyncValidator::new(|_| async { Some(single_error("async", json!(true))) });
        let b = AsyncValidator::new(|_| async { Some(single_error("other", json!(true))) });
        let composed = compose_async([a, b]).expect("composed");
        let errors = block_on(composed.validate(&json!("value"))).expect("errors");
        assert_eq!(errors.get("async"), Some(&json!(true)));
        assert_eq!(errors.get("other"), Some(&json!(true)));
    }

    #[test]
    fn compose_async_sees_the_value() {
        let v = AsyncValidator::new(|value: &Value| {
            let bad = value != &json!("expected");
            async move { bad.then(|| single_error("async", json!(true))) }
        });
        let passing = AsyncValidator::new(|_| async { None });
        let composed = compose_async([v, passing]).expect("composed");
        assert!(block_on(composed.validate(&json!("expected"))).is_none());
        assert!(block_on(composed.validate(&json!("nope"))).is_some());
    }

    #[test]
    fn compose_async_empty_is_none() {
        assert!(compose_async(Vec::new()).is_none());
    }
}
