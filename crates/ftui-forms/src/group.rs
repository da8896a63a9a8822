#![forbid(unsafe_code)]

//! Name-keyed composite controls.
//!
//! A [`FormGroup`] owns its children in registration order. Each child has
//! an *active* flag; inactive children stay registered and addressable
//! through [`Control::get`] but are left out of the group's value, status
//! and interaction flags.

use std::fmt;
use std::ops::Deref;

use serde_json::{Map, Value};

use crate::control::{Children, Control};
use crate::error::{CompositeKind, FormError, Result, json_type_name};
use crate::options::{ControlOptions, UpdateOptions};

pub(crate) struct GroupEntry {
    pub(crate) name: String,
    pub(crate) control: Control,
    pub(crate) active: bool,
}

/// A composite of named children whose value is a JSON object.
#[derive(Clone)]
pub struct FormGroup {
    control: Control,
}

impl FormGroup {
    /// Build a group from `(name, control)` pairs, all active.
    ///
    /// # Panics
    ///
    /// Panics if a name repeats or a control is already attached elsewhere.
    /// Use [`try_new`](Self::try_new) to handle those cases.
    pub fn new<N, C>(controls: impl IntoIterator<Item = (N, C)>) -> Self
    where
        N: Into<String>,
        C: Into<Control>,
    {
        Self::with_options(controls, ControlOptions::default())
    }

    /// # Panics
    ///
    /// See [`new`](Self::new).
    pub fn with_options<N, C>(
        controls: impl IntoIterator<Item = (N, C)>,
        options: ControlOptions,
    ) -> Self
    where
        N: Into<String>,
        C: Into<Control>,
    {
        Self::with_active_set(controls, &[], options)
    }

    /// Build a group where `active` marks some children inactive
    /// (`("name", false)`). Names not listed are active.
    ///
    /// # Panics
    ///
    /// See [`new`](Self::new).
    pub fn with_active_set<N, C>(
        controls: impl IntoIterator<Item = (N, C)>,
        active: &[(&str, bool)],
        options: ControlOptions,
    ) -> Self
    where
        N: Into<String>,
        C: Into<Control>,
    {
        match Self::try_new(controls, active, options) {
            Ok(group) => group,
            Err(err) => panic!("invalid form group: {err}"),
        }
    }

    /// Fallible constructor.
    ///
    /// # Errors
    ///
    /// [`FormError::DuplicateName`] if a name repeats,
    /// [`FormError::AlreadyAttached`] if a control already has a parent or
    /// is passed twice.
    pub fn try_new<N, C>(
        controls: impl IntoIterator<Item = (N, C)>,
        active: &[(&str, bool)],
        options: ControlOptions,
    ) -> Result<Self>
    where
        N: Into<String>,
        C: Into<Control>,
    {
        let mut entries: Vec<GroupEntry> = Vec::new();
        for (name, control) in controls {
            let name = name.into();
            let control = control.into();
            if entries.iter().any(|entry| entry.name == name) {
                return Err(FormError::DuplicateName { name });
            }
            let repeated = entries.iter().any(|entry| entry.control.ptr_eq(&control));
            if control.parent().is_some() || repeated {
                return Err(FormError::AlreadyAttached {
                    id: control.id().get(),
                });
            }
            let is_active = active
                .iter()
                .find(|(key, _)| *key == name)
                .is_none_or(|(_, flag)| *flag);
            entries.push(GroupEntry {
                name,
                control,
                active: is_active,
            });
        }
        for (key, _) in active {
            if !entries.iter().any(|entry| entry.name == *key) {
                tracing::debug!(name = *key, "active-set entry names no control");
            }
        }
        Ok(Self {
            control: Control::build(Value::Object(Map::new()), Children::Group(entries), options),
        })
    }

    pub(crate) fn from_control(control: Control) -> Self {
        Self { control }
    }

    /// The child registered as `name`, active or not.
    #[must_use]
    pub fn control(&self, name: &str) -> Option<Control> {
        match &*self.children() {
            Children::Group(entries) => entries
                .iter()
                .find(|entry| entry.name == name)
                .map(|entry| entry.control.clone()),
            _ => None,
        }
    }

    /// Every registered child in registration order.
    #[must_use]
    pub fn controls(&self) -> Vec<(String, Control)> {
        entries(&self.control)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &*self.children() {
            Children::Group(entries) => entries.len(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a child named `name` exists and is active.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        match &*self.children() {
            Children::Group(entries) => entries
                .iter()
                .any(|entry| entry.name == name && entry.active),
            _ => false,
        }
    }

    /// Register `control` as `name` and recompute.
    ///
    /// # Errors
    ///
    /// [`FormError::DuplicateName`], [`FormError::AlreadyAttached`] or
    /// [`FormError::WouldCreateCycle`]. Nothing changes on error.
    pub fn add_control(&self, name: impl Into<String>, control: impl Into<Control>) -> Result<()> {
        let name = name.into();
        let child = control.into();
        self.try_attach(&name, &child).inspect_err(|err| {
            tracing::debug!(group = %self.id(), error = %err, "add_control rejected");
        })?;
        if let Children::Group(entries) = &mut *self.children_mut() {
            entries.push(GroupEntry {
                name,
                control: child,
                active: true,
            });
        }
        self.update_after_restructure();
        Ok(())
    }

    fn try_attach(&self, name: &str, child: &Control) -> Result<()> {
        if self.control(name).is_some() {
            return Err(FormError::DuplicateName { name: name.to_string() });
        }
        self.check_attachable(child)?;
        child.set_parent(Some(&self.control));
        Ok(())
    }

    /// Detach the child named `name` and recompute. Returns the detached
    /// control.
    pub fn remove_control(&self, name: &str) -> Option<Control> {
        let removed = match &mut *self.children_mut() {
            Children::Group(entries) => entries
                .iter()
                .position(|entry| entry.name == name)
                .map(|index| entries.remove(index).control),
            _ => None,
        }?;
        removed.set_parent(None);
        self.update_after_restructure();
        Some(removed)
    }

    /// Replace (or add) the child named `name` and recompute. A replaced
    /// child keeps its slot and active flag; the old control is detached and
    /// returned.
    ///
    /// # Errors
    ///
    /// [`FormError::AlreadyAttached`] or [`FormError::WouldCreateCycle`].
    pub fn set_control(
        &self,
        name: impl Into<String>,
        control: impl Into<Control>,
    ) -> Result<Option<Control>> {
        let name = name.into();
        let child = control.into();
        self.check_attachable(&child).inspect_err(|err| {
            tracing::debug!(group = %self.id(), error = %err, "set_control rejected");
        })?;
        child.set_parent(Some(&self.control));
        let replaced = match &mut *self.children_mut() {
            Children::Group(entries) => match entries.iter_mut().find(|entry| entry.name == name) {
                Some(entry) => Some(std::mem::replace(&mut entry.control, child)),
                None => {
                    entries.push(GroupEntry {
                        name,
                        control: child,
                        active: true,
                    });
                    None
                }
            },
            _ => None,
        };
        if let Some(old) = &replaced {
            old.set_parent(None);
        }
        self.update_after_restructure();
        Ok(replaced)
    }

    /// Mark `name` active and recompute. Returns `false` if no such child.
    pub fn include(&self, name: &str) -> bool {
        self.set_active(name, true)
    }

    /// Mark `name` inactive and recompute. Returns `false` if no such child.
    pub fn exclude(&self, name: &str) -> bool {
        self.set_active(name, false)
    }

    fn set_active(&self, name: &str, active: bool) -> bool {
        let found = match &mut *self.children_mut() {
            Children::Group(entries) => entries
                .iter_mut()
                .find(|entry| entry.name == name)
                .map(|entry| entry.active = active)
                .is_some(),
            _ => false,
        };
        if found {
            self.update_after_restructure();
        } else {
            tracing::debug!(group = %self.id(), name, "no control to toggle");
        }
        found
    }
}

impl Deref for FormGroup {
    type Target = Control;

    fn deref(&self) -> &Control {
        &self.control
    }
}

impl From<FormGroup> for Control {
    fn from(group: FormGroup) -> Self {
        group.control
    }
}

impl fmt::Debug for FormGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .controls()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        f.debug_struct("FormGroup")
            .field("control", &self.control)
            .field("names", &names)
            .finish()
    }
}

fn entries(control: &Control) -> Vec<(String, Control)> {
    match &*control.children() {
        Children::Group(entries) => entries
            .iter()
            .map(|entry| (entry.name.clone(), entry.control.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Key-set check for `set_value`, recursing into nested composites.
pub(crate) fn check_value(control: &Control, value: &Value) -> Result<()> {
    let Value::Object(map) = value else {
        return Err(FormError::ShapeMismatch {
            kind: CompositeKind::Group,
            expected: "object",
            found: json_type_name(value),
        });
    };
    let entries = entries(control);
    if entries.is_empty() {
        return Err(FormError::NoControlsRegistered {
            kind: CompositeKind::Group,
        });
    }
    if let Some((name, _)) = entries.iter().find(|(name, _)| !map.contains_key(name)) {
        return Err(FormError::MissingName { name: name.clone() });
    }
    if let Some(key) = map
        .keys()
        .find(|key| !entries.iter().any(|(name, _)| name == *key))
    {
        return Err(FormError::UnknownName { name: key.clone() });
    }
    for (name, child) in &entries {
        if let Some(child_value) = map.get(name) {
            child.check_value(child_value)?;
        }
    }
    Ok(())
}

pub(crate) fn apply_value(control: &Control, value: Value, opts: UpdateOptions) {
    if let Value::Object(mut map) = value {
        for (name, child) in entries(control) {
            if let Some(child_value) = map.remove(&name) {
                child.apply_value(child_value, opts.for_child());
            }
        }
    }
    control.update_value_and_validity_with(opts);
}

pub(crate) fn patch_value(control: &Control, value: Value, opts: UpdateOptions) {
    let Value::Object(mut map) = value else {
        tracing::debug!(
            group = %control.id(),
            found = json_type_name(&value),
            "patch_value ignored"
        );
        return;
    };
    for (name, child) in entries(control) {
        if let Some(child_value) = map.remove(&name) {
            child.patch_value_with(child_value, opts.for_child());
        }
    }
    control.update_value_and_validity_with(opts);
}

pub(crate) fn reset(control: &Control, value: Value, opts: UpdateOptions) {
    let mut map = match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (name, child) in entries(control) {
        let child_value = map.remove(&name).unwrap_or(Value::Null);
        child.reset_with(child_value, opts.for_child());
    }
    control.update_value_and_validity_with(opts);
    control.update_pristine(opts);
    control.update_touched(opts);
}
