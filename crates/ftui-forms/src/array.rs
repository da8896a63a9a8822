#![forbid(unsafe_code)]

//! Index-keyed composite controls.

use std::fmt;
use std::ops::Deref;

use serde_json::Value;

use crate::control::{Children, Control};
use crate::error::{CompositeKind, FormError, Result, json_type_name};
use crate::options::{ControlOptions, UpdateOptions};

/// A composite of ordered children whose value is a JSON array.
///
/// Structural mutations (`push`, `insert`, `remove_at`, `set_control`)
/// recompute the array and its ancestors and emit like any other change.
#[derive(Clone)]
pub struct FormArray {
    control: Control,
}

impl FormArray {
    /// # Panics
    ///
    /// Panics if a control is already attached elsewhere or passed twice.
    /// Use [`try_new`](Self::try_new) to handle that case.
    pub fn new<C: Into<Control>>(controls: impl IntoIterator<Item = C>) -> Self {
        Self::with_options(controls, ControlOptions::default())
    }

    /// # Panics
    ///
    /// See [`new`](Self::new).
    pub fn with_options<C: Into<Control>>(
        controls: impl IntoIterator<Item = C>,
        options: ControlOptions,
    ) -> Self {
        match Self::try_new(controls, options) {
            Ok(array) => array,
            Err(err) => panic!("invalid form array: {err}"),
        }
    }

    /// # Errors
    ///
    /// [`FormError::AlreadyAttached`] if a control already has a parent or
    /// is passed twice.
    pub fn try_new<C: Into<Control>>(
        controls: impl IntoIterator<Item = C>,
        options: ControlOptions,
    ) -> Result<Self> {
        let mut items: Vec<Control> = Vec::new();
        for control in controls {
            let control = control.into();
            if control.parent().is_some() || items.iter().any(|item| item.ptr_eq(&control)) {
                return Err(FormError::AlreadyAttached {
                    id: control.id().get(),
                });
            }
            items.push(control);
        }
        Ok(Self {
            control: Control::build(Value::Array(Vec::new()), Children::Array(items), options),
        })
    }

    pub(crate) fn from_control(control: Control) -> Self {
        Self { control }
    }

    #[must_use]
    pub fn at(&self, index: usize) -> Option<Control> {
        match &*self.children() {
            Children::Array(items) => items.get(index).cloned(),
            _ => None,
        }
    }

    #[must_use]
    pub fn controls(&self) -> Vec<Control> {
        self.child_controls()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &*self.children() {
            Children::Array(items) => items.len(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `control` and recompute.
    ///
    /// # Errors
    ///
    /// [`FormError::AlreadyAttached`] or [`FormError::WouldCreateCycle`].
    pub fn push(&self, control: impl Into<Control>) -> Result<()> {
        let len = self.len();
        self.insert(len, control)
    }

    /// Insert `control` before `index` and recompute.
    ///
    /// # Errors
    ///
    /// [`FormError::IndexOutOfBounds`] if `index > len`, otherwise as
    /// [`push`](Self::push).
    pub fn insert(&self, index: usize, control: impl Into<Control>) -> Result<()> {
        let child = control.into();
        self.try_attach(index, &child).inspect_err(|err| {
            tracing::debug!(array = %self.id(), error = %err, "insert rejected");
        })?;
        if let Children::Array(items) = &mut *self.children_mut() {
            items.insert(index, child);
        }
        self.update_after_restructure();
        Ok(())
    }

    fn try_attach(&self, index: usize, child: &Control) -> Result<()> {
        let len = self.len();
        if index > len {
            return Err(FormError::IndexOutOfBounds { index, len });
        }
        self.check_attachable(child)?;
        child.set_parent(Some(&self.control));
        Ok(())
    }

    /// Detach the child at `index` and recompute.
    ///
    /// # Errors
    ///
    /// [`FormError::IndexOutOfBounds`] if there is no child at `index`.
    pub fn remove_at(&self, index: usize) -> Result<Control> {
        let len = self.len();
        if index >= len {
            return Err(FormError::IndexOutOfBounds { index, len });
        }
        let removed = match &mut *self.children_mut() {
            Children::Array(items) => items.remove(index),
            _ => return Err(FormError::IndexOutOfBounds { index, len: 0 }),
        };
        removed.set_parent(None);
        self.update_after_restructure();
        Ok(removed)
    }

    /// Replace the child at `index` and recompute. Returns the detached
    /// previous child.
    ///
    /// # Errors
    ///
    /// [`FormError::IndexOutOfBounds`] if there is no child at `index`,
    /// otherwise as [`push`](Self::push).
    pub fn set_control(&self, index: usize, control: impl Into<Control>) -> Result<Control> {
        let child = control.into();
        let len = self.len();
        if index >= len {
            return Err(FormError::IndexOutOfBounds { index, len });
        }
        self.check_attachable(&child)?;
        child.set_parent(Some(&self.control));
        let replaced = match &mut *self.children_mut() {
            Children::Array(items) => std::mem::replace(&mut items[index], child),
            _ => return Err(FormError::IndexOutOfBounds { index, len: 0 }),
        };
        replaced.set_parent(None);
        self.update_after_restructure();
        Ok(replaced)
    }

    /// Patch positionally, skipping `None` holes.
    pub fn patch_entries(&self, entries: impl IntoIterator<Item = Option<Value>>) {
        self.patch_entries_with(entries, UpdateOptions::default());
    }

    pub fn patch_entries_with(
        &self,
        entries: impl IntoIterator<Item = Option<Value>>,
        opts: UpdateOptions,
    ) {
        for (child, entry) in self.child_controls().into_iter().zip(entries) {
            if let Some(value) = entry {
                child.patch_value_with(value, opts.for_child());
            }
        }
        self.update_value_and_validity_with(opts);
    }
}

impl Deref for FormArray {
    type Target = Control;

    fn deref(&self) -> &Control {
        &self.control
    }
}

impl From<FormArray> for Control {
    fn from(array: FormArray) -> Self {
        array.control
    }
}

impl fmt::Debug for FormArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormArray")
            .field("control", &self.control)
            .field("len", &self.len())
            .finish()
    }
}

/// Index-set check for `set_value`, recursing into nested composites.
pub(crate) fn check_value(control: &Control, value: &Value) -> Result<()> {
    let Value::Array(values) = value else {
        return Err(FormError::ShapeMismatch {
            kind: CompositeKind::Array,
            expected: "array",
            found: json_type_name(value),
        });
    };
    let items = control.child_controls();
    if items.is_empty() {
        return Err(FormError::NoControlsRegistered {
            kind: CompositeKind::Array,
        });
    }
    if values.len() < items.len() {
        return Err(FormError::MissingIndex { index: values.len() });
    }
    if values.len() > items.len() {
        return Err(FormError::UnknownIndex { index: items.len() });
    }
    for (child, child_value) in items.iter().zip(values) {
        child.check_value(child_value)?;
    }
    Ok(())
}

pub(crate) fn apply_value(control: &Control, value: Value, opts: UpdateOptions) {
    if let Value::Array(values) = value {
        for (child, child_value) in control.child_controls().into_iter().zip(values) {
            child.apply_value(child_value, opts.for_child());
        }
    }
    control.update_value_and_validity_with(opts);
}

pub(crate) fn patch_value(control: &Control, value: Value, opts: UpdateOptions) {
    let Value::Array(values) = value else {
        tracing::debug!(
            array = %control.id(),
            found = json_type_name(&value),
            "patch_value ignored"
        );
        return;
    };
    for (child, child_value) in control.child_controls().into_iter().zip(values) {
        child.patch_value_with(child_value, opts.for_child());
    }
    control.update_value_and_validity_with(opts);
}

pub(crate) fn reset(control: &Control, value: Value, opts: UpdateOptions) {
    let mut values = match value {
        Value::Array(values) => values.into_iter(),
        _ => Vec::new().into_iter(),
    };
    for child in control.child_controls() {
        child.reset_with(values.next().unwrap_or(Value::Null), opts.for_child());
    }
    control.update_value_and_validity_with(opts);
    control.update_pristine(opts);
    control.update_touched(opts);
}
