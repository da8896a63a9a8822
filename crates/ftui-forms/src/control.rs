#![forbid(unsafe_code)]

//! The shared control state machine.
//!
//! [`Control`] is a cheap, clonable handle to one node of a form tree. The
//! typed wrappers [`FormControl`], [`FormGroup`] and [`FormArray`] deref to
//! it; everything that does not depend on the variant lives here.
//!
//! # Architecture
//!
//! A node owns its mutable state behind a `RefCell` and its children behind a
//! second `RefCell`. Parents hold children strongly, children hold their
//! parent as `Weak`. No borrow is ever held across a call that may re-enter
//! the tree: validators, view callbacks, event subscribers and recursion into
//! relatives all run with every borrow released.
//!
//! Recomputation goes bottom-up. [`Control::update_value_and_validity`]:
//!
//! 1. resets the status to its initial value (`Disabled` if every
//!    participating control is disabled, `Valid` otherwise),
//! 2. recomputes the aggregate value (composites only),
//! 3. if enabled: cancels the in-flight async run, runs the sync validator,
//!    derives the status and, when it allows async validation, starts a new
//!    async run (status becomes `Pending`),
//! 4. emits `value_changes` then `status_changes`,
//! 5. recurses into the parent unless `only_self`.
//!
//! # Async runs
//!
//! Every run is spawned on the thread-local [`scheduler`](crate::scheduler)
//! and tagged with the control's generation counter. Starting a new run or
//! cancelling bumps the generation and aborts the previous task; a result is
//! applied only if its generation is still current.
//!
//! # Failure Modes
//!
//! - A control dropped while its async run is in flight: the run completes
//!   into nothing (the task holds only a `Weak` reference).
//! - Re-entrant mutation from a subscriber: allowed; the nested mutation
//!   runs to completion before the outer emission loop continues.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{AbortHandle, abortable};
use serde_json::Value;

use crate::array::{self, FormArray};
use crate::error::{FormError, Result};
use crate::events::EventStream;
use crate::field::{self, FormControl};
use crate::group::{self, FormGroup, GroupEntry};
use crate::options::{ControlOptions, UpdateOptions};
use crate::path::{ControlPath, PathSegment};
use crate::scheduler;
use crate::status::ControlStatus;
use crate::validators::{self, AsyncValidator, ValidationErrors, Validator};

static NEXT_CONTROL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControlId(u64);

impl ControlId {
    fn next() -> Self {
        Self(NEXT_CONTROL_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which variant a [`Control`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Field,
    Group,
    Array,
}

/// View-synchronization callback registered on a field.
pub(crate) type ChangeCallback = Rc<dyn Fn(&Value)>;

pub(crate) enum Children {
    Field(Vec<ChangeCallback>),
    Group(Vec<GroupEntry>),
    Array(Vec<Control>),
}

impl Children {
    fn kind(&self) -> ControlKind {
        match self {
            Self::Field(_) => ControlKind::Field,
            Self::Group(_) => ControlKind::Group,
            Self::Array(_) => ControlKind::Array,
        }
    }
}

struct ControlState {
    value: Value,
    status: ControlStatus,
    errors: Option<ValidationErrors>,
    pristine: bool,
    touched: bool,
    parent: Option<Weak<ControlNode>>,
    validator: Option<Validator>,
    async_validator: Option<AsyncValidator>,
    generation: u64,
    in_flight: Option<AbortHandle>,
}

pub(crate) struct ControlNode {
    id: ControlId,
    state: RefCell<ControlState>,
    children: RefCell<Children>,
    value_changes: EventStream<Value>,
    status_changes: EventStream<ControlStatus>,
}

/// A shared handle to a node of a form tree.
///
/// Cloning the handle does not clone the control; both handles observe and
/// mutate the same node.
#[derive(Clone)]
pub struct Control {
    node: Rc<ControlNode>,
}

impl Control {
    /// Create a node, attach `children`'s controls to it and compute the
    /// initial state without emitting.
    ///
    /// Callers must have checked that no child is already attached.
    pub(crate) fn build(value: Value, children: Children, options: ControlOptions) -> Self {
        let ControlOptions {
            validators,
            async_validators,
            disabled,
        } = options;
        let control = Self {
            node: Rc::new(ControlNode {
                id: ControlId::next(),
                state: RefCell::new(ControlState {
                    value,
                    status: ControlStatus::Valid,
                    errors: None,
                    pristine: true,
                    touched: false,
                    parent: None,
                    validator: validators::compose(validators),
                    async_validator: validators::compose_async(async_validators),
                    generation: 0,
                    in_flight: None,
                }),
                children: RefCell::new(children),
                value_changes: EventStream::new(),
                status_changes: EventStream::new(),
            }),
        };
        for child in control.child_controls() {
            child.set_parent(Some(&control));
        }
        if disabled {
            let quiet = UpdateOptions::new().only_self(true).silent();
            for child in control.child_controls() {
                child.disable_with(quiet);
            }
            control.state_mut().status = ControlStatus::Disabled;
        }
        control.update_value_and_validity_with(UpdateOptions::new().only_self(true).silent());
        control
    }

    fn state(&self) -> Ref<'_, ControlState> {
        self.node.state.borrow()
    }

    fn state_mut(&self) -> RefMut<'_, ControlState> {
        self.node.state.borrow_mut()
    }

    pub(crate) fn children(&self) -> Ref<'_, Children> {
        self.node.children.borrow()
    }

    pub(crate) fn children_mut(&self) -> RefMut<'_, Children> {
        self.node.children.borrow_mut()
    }

    // --- identity -------------------------------------------------------

    #[must_use]
    pub fn id(&self) -> ControlId {
        self.node.id
    }

    #[must_use]
    pub fn kind(&self) -> ControlKind {
        self.children().kind()
    }

    /// Whether both handles point at the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    #[must_use]
    pub fn as_field(&self) -> Option<FormControl> {
        (self.kind() == ControlKind::Field).then(|| FormControl::from_control(self.clone()))
    }

    #[must_use]
    pub fn as_group(&self) -> Option<FormGroup> {
        (self.kind() == ControlKind::Group).then(|| FormGroup::from_control(self.clone()))
    }

    #[must_use]
    pub fn as_array(&self) -> Option<FormArray> {
        (self.kind() == ControlKind::Array).then(|| FormArray::from_control(self.clone()))
    }

    // --- value and status -----------------------------------------------

    /// A clone of the current value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.state().value.clone()
    }

    /// Overwrite the stored value without recomputing anything.
    pub(crate) fn store_value(&self, value: Value) {
        self.state_mut().value = value;
    }

    /// Borrow the current value without cloning it.
    ///
    /// `f` must not mutate the tree.
    pub fn with_value<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.state().value)
    }

    #[must_use]
    pub fn status(&self) -> ControlStatus {
        self.state().status
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.status() == ControlStatus::Valid
    }

    #[must_use]
    pub fn invalid(&self) -> bool {
        self.status() == ControlStatus::Invalid
    }

    #[must_use]
    pub fn pending(&self) -> bool {
        self.status() == ControlStatus::Pending
    }

    #[must_use]
    pub fn disabled(&self) -> bool {
        self.status() == ControlStatus::Disabled
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        !self.disabled()
    }

    /// This control's own errors. Children's errors are not included.
    #[must_use]
    pub fn errors(&self) -> Option<ValidationErrors> {
        self.state().errors.clone()
    }

    /// The detail recorded under `key`, if any.
    #[must_use]
    pub fn get_error(&self, key: &str) -> Option<Value> {
        self.state().errors.as_ref()?.get(key).cloned()
    }

    /// The detail recorded under `key` on the descendant at `path`.
    #[must_use]
    pub fn get_error_at(&self, key: &str, path: impl Into<ControlPath>) -> Option<Value> {
        self.get(path)?.get_error(key)
    }

    #[must_use]
    pub fn has_error(&self, key: &str) -> bool {
        self.get_error(key).is_some()
    }

    #[must_use]
    pub fn has_error_at(&self, key: &str, path: impl Into<ControlPath>) -> bool {
        self.get_error_at(key, path).is_some()
    }

    #[must_use]
    pub fn pristine(&self) -> bool {
        self.state().pristine
    }

    #[must_use]
    pub fn dirty(&self) -> bool {
        !self.pristine()
    }

    #[must_use]
    pub fn touched(&self) -> bool {
        self.state().touched
    }

    #[must_use]
    pub fn untouched(&self) -> bool {
        !self.touched()
    }

    /// Emits this control's value after every recomputation.
    #[must_use]
    pub fn value_changes(&self) -> &EventStream<Value> {
        &self.node.value_changes
    }

    /// Emits this control's status after every recomputation.
    #[must_use]
    pub fn status_changes(&self) -> &EventStream<ControlStatus> {
        &self.node.status_changes
    }

    // --- tree navigation ------------------------------------------------

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let node = self.state().parent.as_ref()?.upgrade()?;
        Some(Self { node })
    }

    /// The topmost ancestor, or `self` when detached.
    #[must_use]
    pub fn root(&self) -> Self {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Resolve a descendant.
    ///
    /// Returns `None` for the empty path, for a malformed path (one with a
    /// blank component such as `"a..b"`) and for any segment that does not
    /// resolve. Inactive group children are still addressable.
    ///
    /// ```
    /// use ftui_forms::{FormArray, FormControl, FormGroup, path};
    ///
    /// let form = FormGroup::new([(
    ///     "items",
    ///     FormArray::new([FormGroup::new([("title", FormControl::new("a"))])]),
    /// )]);
    /// assert!(form.get("items.0.title").is_some());
    /// assert!(form.get(path!["items", 0usize, "title"]).is_some());
    /// assert!(form.get("items.1").is_none());
    /// assert!(form.get("").is_none());
    /// ```
    #[must_use]
    pub fn get(&self, path: impl Into<ControlPath>) -> Option<Self> {
        let path = path.into();
        if path.is_empty() || path.is_malformed() {
            return None;
        }
        let mut current = self.clone();
        for segment in path.segments() {
            current = current.child(segment)?;
        }
        Some(current)
    }

    fn child(&self, segment: &PathSegment) -> Option<Self> {
        match &*self.children() {
            Children::Field(_) => None,
            Children::Group(entries) => {
                let name = segment.as_name();
                entries
                    .iter()
                    .find(|entry| entry.name == name)
                    .map(|entry| entry.control.clone())
            }
            Children::Array(items) => items.get(segment.as_index()?).cloned(),
        }
    }

    /// Every child, in order, regardless of activity or status.
    pub(crate) fn child_controls(&self) -> Vec<Self> {
        match &*self.children() {
            Children::Field(_) => Vec::new(),
            Children::Group(entries) => entries.iter().map(|entry| entry.control.clone()).collect(),
            Children::Array(items) => items.clone(),
        }
    }

    /// Children that count toward this control's aggregates.
    fn active_children(&self) -> Vec<Self> {
        match &*self.children() {
            Children::Field(_) => Vec::new(),
            Children::Group(entries) => entries
                .iter()
                .filter(|entry| entry.active)
                .map(|entry| entry.control.clone())
                .collect(),
            Children::Array(items) => items.clone(),
        }
    }

    fn participating_children(&self) -> Vec<Self> {
        self.active_children()
            .into_iter()
            .filter(Self::enabled)
            .collect()
    }

    /// The parent, if this control is active and enabled within it.
    fn participating_parent(&self) -> Option<Self> {
        let parent = self.parent()?;
        parent
            .participating_children()
            .iter()
            .any(|child| child.ptr_eq(self))
            .then_some(parent)
    }

    pub(crate) fn set_parent(&self, parent: Option<&Self>) {
        self.state_mut().parent = parent.map(|p| Rc::downgrade(&p.node));
    }

    /// Check that `child` may become a child of `self`.
    pub(crate) fn check_attachable(&self, child: &Self) -> Result<()> {
        let mut cursor = Some(self.clone());
        while let Some(ancestor) = cursor {
            if ancestor.ptr_eq(child) {
                return Err(FormError::WouldCreateCycle {
                    id: child.id().get(),
                });
            }
            cursor = ancestor.parent();
        }
        if child.parent().is_some() {
            return Err(FormError::AlreadyAttached {
                id: child.id().get(),
            });
        }
        Ok(())
    }

    // --- validators -----------------------------------------------------

    /// Replace the sync validators. Does not revalidate.
    pub fn set_validators(&self, validators: impl IntoIterator<Item = Validator>) {
        self.state_mut().validator = validators::compose(validators);
    }

    /// Replace the async validators. Does not revalidate.
    pub fn set_async_validators(&self, validators: impl IntoIterator<Item = AsyncValidator>) {
        self.state_mut().async_validator = validators::compose_async(validators);
    }

    pub fn clear_validators(&self) {
        self.state_mut().validator = None;
    }

    pub fn clear_async_validators(&self) {
        self.state_mut().async_validator = None;
    }

    #[must_use]
    pub fn validator(&self) -> Option<Validator> {
        self.state().validator.clone()
    }

    #[must_use]
    pub fn async_validator(&self) -> Option<AsyncValidator> {
        self.state().async_validator.clone()
    }

    // --- recomputation --------------------------------------------------

    pub fn update_value_and_validity(&self) {
        self.update_value_and_validity_with(UpdateOptions::default());
    }

    /// Recompute value and status, emit, then recompute the ancestors
    /// unless `only_self`.
    pub fn update_value_and_validity_with(&self, opts: UpdateOptions) {
        self.set_initial_status();
        self.update_value();

        if self.enabled() {
            self.cancel_async();
            let (validator, value) = {
                let state = self.state();
                (state.validator.clone(), state.value.clone())
            };
            let errors = validator.and_then(|v| v.validate(&value));
            self.state_mut().errors = errors.filter(|e| !e.is_empty());
            let status = self.calculate_status();
            self.state_mut().status = status;
            if status.allows_async() {
                self.run_async_validator(opts.emit_event);
            }
        }

        tracing::trace!(
            control = %self.id(),
            status = %self.status(),
            "value and validity updated"
        );

        if opts.emit_event {
            self.emit_value();
            self.emit_status();
        }

        if !opts.only_self {
            if let Some(parent) = self.parent() {
                parent.update_value_and_validity_with(opts);
            }
        }
    }

    fn emit_value(&self) {
        let value = self.value();
        self.node.value_changes.emit(&value);
    }

    fn emit_status(&self) {
        let status = self.status();
        self.node.status_changes.emit(&status);
    }

    fn set_initial_status(&self) {
        let status = if self.all_controls_disabled() {
            ControlStatus::Disabled
        } else {
            ControlStatus::Valid
        };
        self.state_mut().status = status;
    }

    fn all_controls_disabled(&self) -> bool {
        if self.kind() == ControlKind::Field {
            return self.disabled();
        }
        let active = self.active_children();
        if active.iter().any(Self::enabled) {
            return false;
        }
        !active.is_empty() || self.disabled()
    }

    fn update_value(&self) {
        let self_disabled = self.disabled();
        let value = match &*self.children() {
            Children::Field(_) => return,
            Children::Group(entries) => Value::Object(
                entries
                    .iter()
                    .filter(|entry| entry.active && (entry.control.enabled() || self_disabled))
                    .map(|entry| (entry.name.clone(), entry.control.value()))
                    .collect(),
            ),
            Children::Array(items) => Value::Array(
                items
                    .iter()
                    .filter(|item| item.enabled() || self_disabled)
                    .map(Self::value)
                    .collect(),
            ),
        };
        self.state_mut().value = value;
    }

    fn calculate_status(&self) -> ControlStatus {
        if self.all_controls_disabled() {
            return ControlStatus::Disabled;
        }
        {
            let state = self.state();
            if state.errors.is_some() {
                return ControlStatus::Invalid;
            }
            if state.in_flight.is_some() {
                return ControlStatus::Pending;
            }
        }
        let children = self.participating_children();
        if children.iter().any(Self::pending) {
            ControlStatus::Pending
        } else if children.iter().any(Self::invalid) {
            ControlStatus::Invalid
        } else {
            ControlStatus::Valid
        }
    }

    fn cancel_async(&self) {
        let aborted = {
            let mut state = self.state_mut();
            state.generation += 1;
            state.in_flight.take()
        };
        if let Some(handle) = aborted {
            handle.abort();
            tracing::debug!(control = %self.id(), "superseded async validation aborted");
        }
    }

    fn run_async_validator(&self, emit_event: bool) {
        let Some(validator) = self.async_validator() else {
            return;
        };
        let value = self.value();
        let generation = {
            let mut state = self.state_mut();
            state.status = ControlStatus::Pending;
            state.generation += 1;
            state.generation
        };
        let (run, handle) = abortable(validator.validate(&value));
        self.state_mut().in_flight = Some(handle);

        let weak = Rc::downgrade(&self.node);
        scheduler::spawn(async move {
            let Ok(errors) = run.await else {
                return;
            };
            if let Some(node) = weak.upgrade() {
                Self { node }.apply_async_result(generation, errors, emit_event);
            }
        });
    }

    fn apply_async_result(
        &self,
        generation: u64,
        errors: Option<ValidationErrors>,
        emit_event: bool,
    ) {
        {
            let mut state = self.state_mut();
            if state.generation != generation {
                tracing::debug!(
                    control = %self.id(),
                    run = generation,
                    current = state.generation,
                    "discarding stale async validation result"
                );
                return;
            }
            state.in_flight = None;
        }
        self.set_errors_with(errors, UpdateOptions::new().emit_event(emit_event));
    }

    // --- errors ---------------------------------------------------------

    pub fn set_errors(&self, errors: Option<ValidationErrors>) {
        self.set_errors_with(errors, UpdateOptions::default());
    }

    /// Force this control's errors and recompute its status and its
    /// ancestors' statuses. Ancestors keep their own errors.
    ///
    /// The next recomputation (for example a `set_value`) replaces forced
    /// errors with the validator's result. An empty map counts as `None`.
    pub fn set_errors_with(&self, errors: Option<ValidationErrors>, opts: UpdateOptions) {
        self.state_mut().errors = errors.filter(|e| !e.is_empty());
        self.update_controls_errors(opts.emit_event);
    }

    fn update_controls_errors(&self, emit_event: bool) {
        let status = self.calculate_status();
        self.state_mut().status = status;
        if emit_event {
            self.emit_status();
        }
        if let Some(parent) = self.parent() {
            parent.update_controls_errors(emit_event);
        }
    }

    // --- interaction flags ----------------------------------------------

    pub fn mark_as_dirty(&self) {
        self.mark_as_dirty_with(UpdateOptions::default());
    }

    /// Mark dirty, and every ancestor unless `only_self`. Propagation stops
    /// at a parent this control does not participate in.
    pub fn mark_as_dirty_with(&self, opts: UpdateOptions) {
        self.state_mut().pristine = false;
        if !opts.only_self {
            if let Some(parent) = self.participating_parent() {
                parent.mark_as_dirty_with(opts);
            }
        }
    }

    pub fn mark_as_pristine(&self) {
        self.mark_as_pristine_with(UpdateOptions::default());
    }

    /// Mark this control and all descendants pristine. Ancestors recompute
    /// their flag from their participating children unless `only_self`.
    pub fn mark_as_pristine_with(&self, opts: UpdateOptions) {
        self.state_mut().pristine = true;
        for child in self.child_controls() {
            child.mark_as_pristine_with(UpdateOptions::new().only_self(true));
        }
        if !opts.only_self {
            if let Some(parent) = self.parent() {
                parent.update_pristine(opts);
            }
        }
    }

    pub fn mark_as_touched(&self) {
        self.mark_as_touched_with(UpdateOptions::default());
    }

    /// Mark touched, and every ancestor unless `only_self`. Propagation
    /// stops like [`mark_as_dirty_with`](Self::mark_as_dirty_with).
    pub fn mark_as_touched_with(&self, opts: UpdateOptions) {
        self.state_mut().touched = true;
        if !opts.only_self {
            if let Some(parent) = self.participating_parent() {
                parent.mark_as_touched_with(opts);
            }
        }
    }

    pub fn mark_as_untouched(&self) {
        self.mark_as_untouched_with(UpdateOptions::default());
    }

    pub fn mark_as_untouched_with(&self, opts: UpdateOptions) {
        self.state_mut().touched = false;
        for child in self.child_controls() {
            child.mark_as_untouched_with(UpdateOptions::new().only_self(true));
        }
        if !opts.only_self {
            if let Some(parent) = self.parent() {
                parent.update_touched(opts);
            }
        }
    }

    pub fn mark_as_pending(&self) {
        self.mark_as_pending_with(UpdateOptions::default());
    }

    /// Force `Pending` on this control, and every ancestor unless
    /// `only_self`. Emits the status when `emit_event` is set.
    pub fn mark_as_pending_with(&self, opts: UpdateOptions) {
        self.state_mut().status = ControlStatus::Pending;
        if opts.emit_event {
            self.emit_status();
        }
        if !opts.only_self {
            if let Some(parent) = self.parent() {
                parent.mark_as_pending_with(opts);
            }
        }
    }

    pub(crate) fn update_pristine(&self, opts: UpdateOptions) {
        let any_dirty = self.participating_children().iter().any(Self::dirty);
        self.state_mut().pristine = !any_dirty;
        if !opts.only_self {
            if let Some(parent) = self.parent() {
                parent.update_pristine(opts);
            }
        }
    }

    pub(crate) fn update_touched(&self, opts: UpdateOptions) {
        let any_touched = self.participating_children().iter().any(Self::touched);
        self.state_mut().touched = any_touched;
        if !opts.only_self {
            if let Some(parent) = self.parent() {
                parent.update_touched(opts);
            }
        }
    }

    // --- enable / disable -----------------------------------------------

    pub fn disable(&self) {
        self.disable_with(UpdateOptions::default());
    }

    /// Disable this control and every descendant.
    ///
    /// Errors are cleared and any in-flight async run is cancelled. A
    /// disabled control is left out of its parent's value and status.
    pub fn disable_with(&self, opts: UpdateOptions) {
        self.cancel_async();
        {
            let mut state = self.state_mut();
            state.status = ControlStatus::Disabled;
            state.errors = None;
        }
        for child in self.child_controls() {
            child.disable_with(opts.for_child());
        }
        self.update_value();
        if opts.emit_event {
            self.emit_value();
            self.emit_status();
        }
        self.update_ancestors(opts);
    }

    pub fn enable(&self) {
        self.enable_with(UpdateOptions::default());
    }

    /// Enable this control and every descendant, then revalidate.
    pub fn enable_with(&self, opts: UpdateOptions) {
        self.state_mut().status = ControlStatus::Valid;
        for child in self.child_controls() {
            child.enable_with(opts.for_child());
        }
        self.update_value_and_validity_with(opts.only_self(true));
        self.update_ancestors(opts);
    }

    /// Recompute after a child was attached, detached, replaced or toggled.
    /// The interaction flags are rebuilt from the new set of participating
    /// children, up to the root.
    pub(crate) fn update_after_restructure(&self) {
        self.update_value_and_validity();
        self.update_pristine(UpdateOptions::default());
        self.update_touched(UpdateOptions::default());
    }

    fn update_ancestors(&self, opts: UpdateOptions) {
        if opts.only_self {
            return;
        }
        if let Some(parent) = self.parent() {
            parent.update_value_and_validity_with(opts);
            parent.update_pristine(opts);
            parent.update_touched(opts);
        }
    }

    // --- bulk value operations ------------------------------------------

    /// Replace the value of this control and, for composites, every
    /// descendant.
    ///
    /// A composite requires a value of the same shape with exactly its
    /// registered keys. Fields accept any value.
    ///
    /// # Errors
    ///
    /// Returns a shape error (see [`FormError::is_value_shape_error`]) when
    /// the value does not match the tree. Nothing is mutated in that case.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        self.set_value_with(value, UpdateOptions::default())
    }

    /// [`set_value`](Self::set_value) with explicit options.
    ///
    /// # Errors
    ///
    /// See [`set_value`](Self::set_value).
    pub fn set_value_with(&self, value: impl Into<Value>, opts: UpdateOptions) -> Result<()> {
        let value = value.into();
        if let Err(err) = self.check_value(&value) {
            tracing::debug!(control = %self.id(), error = %err, "set_value rejected");
            return Err(err);
        }
        self.apply_value(value, opts);
        Ok(())
    }

    pub(crate) fn check_value(&self, value: &Value) -> Result<()> {
        match self.kind() {
            ControlKind::Field => Ok(()),
            ControlKind::Group => group::check_value(self, value),
            ControlKind::Array => array::check_value(self, value),
        }
    }

    /// Apply an already checked value.
    pub(crate) fn apply_value(&self, value: Value, opts: UpdateOptions) {
        match self.kind() {
            ControlKind::Field => field::apply_value(self, value, opts),
            ControlKind::Group => group::apply_value(self, value, opts),
            ControlKind::Array => array::apply_value(self, value, opts),
        }
    }

    pub fn patch_value(&self, value: impl Into<Value>) {
        self.patch_value_with(value, UpdateOptions::default());
    }

    /// Apply whatever part of `value` matches the tree. Missing keys are
    /// skipped and unknown keys ignored; never fails.
    pub fn patch_value_with(&self, value: impl Into<Value>, opts: UpdateOptions) {
        let value = value.into();
        match self.kind() {
            ControlKind::Field => field::apply_value(self, value, opts),
            ControlKind::Group => group::patch_value(self, value, opts),
            ControlKind::Array => array::patch_value(self, value, opts),
        }
    }

    /// Reset to the empty value, pristine and untouched.
    pub fn reset(&self) {
        self.reset_with(Value::Null, UpdateOptions::default());
    }

    /// Reset to `value`, pristine and untouched. For composites `value` is
    /// distributed to the children; children without an entry reset to
    /// `null`.
    pub fn reset_with(&self, value: impl Into<Value>, opts: UpdateOptions) {
        let value = value.into();
        match self.kind() {
            ControlKind::Field => field::reset(self, value, opts),
            ControlKind::Group => group::reset(self, value, opts),
            ControlKind::Array => array::reset(self, value, opts),
        }
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Control")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("value", &state.value)
            .field("status", &state.status)
            .field("errors", &state.errors)
            .field("pristine", &state.pristine)
            .field("touched", &state.touched)
            .finish_non_exhaustive()
    }
}
