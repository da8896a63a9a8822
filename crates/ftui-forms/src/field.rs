#![forbid(unsafe_code)]

//! Leaf controls.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use serde_json::Value;

use crate::control::{ChangeCallback, Children, Control};
use crate::options::{ControlOptions, UpdateOptions};

/// A leaf control holding a single value.
///
/// `set_value` never marks the control dirty; interaction flags change only
/// through the `mark_as_*` family and [`reset`](Control::reset).
#[derive(Clone)]
pub struct FormControl {
    control: Control,
}

impl FormControl {
    pub fn new(value: impl Into<Value>) -> Self {
        Self::with_options(value, ControlOptions::default())
    }

    pub fn with_options(value: impl Into<Value>, options: ControlOptions) -> Self {
        Self {
            control: Control::build(value.into(), Children::Field(Vec::new()), options),
        }
    }

    pub(crate) fn from_control(control: Control) -> Self {
        Self { control }
    }

    /// Set the value and revalidate. Fields accept any value, so this never
    /// fails.
    pub fn set_value(&self, value: impl Into<Value>) {
        self.set_value_with(value, UpdateOptions::default());
    }

    pub fn set_value_with(&self, value: impl Into<Value>, opts: UpdateOptions) {
        apply_value(&self.control, value.into(), opts);
    }

    /// Register a view-synchronization callback.
    ///
    /// Callbacks run in registration order on every `set_value` /
    /// `patch_value` / `reset`, after the value is stored and before
    /// revalidation, unless `emit_model_to_view_change` is `false`.
    pub fn register_on_change(&self, callback: impl Fn(&Value) + 'static) {
        if let Children::Field(callbacks) = &mut *self.control.children_mut() {
            callbacks.push(Rc::new(callback));
        }
    }
}

impl Default for FormControl {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl Deref for FormControl {
    type Target = Control;

    fn deref(&self) -> &Control {
        &self.control
    }
}

impl From<FormControl> for Control {
    fn from(field: FormControl) -> Self {
        field.control
    }
}

impl fmt::Debug for FormControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FormControl").field(&self.control).finish()
    }
}

pub(crate) fn apply_value(control: &Control, value: Value, opts: UpdateOptions) {
    control.store_value(value.clone());
    if opts.emit_model_to_view_change {
        let callbacks: Vec<ChangeCallback> = match &*control.children() {
            Children::Field(callbacks) => callbacks.clone(),
            _ => Vec::new(),
        };
        for callback in callbacks {
            callback(&value);
        }
    }
    control.update_value_and_validity_with(opts);
}

pub(crate) fn reset(control: &Control, value: Value, opts: UpdateOptions) {
    control.mark_as_pristine_with(opts);
    control.mark_as_untouched_with(opts);
    apply_value(control, value, opts);
}
