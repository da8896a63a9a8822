#![forbid(unsafe_code)]

//! Typed configuration for control construction and mutation.

use crate::validators::{AsyncValidator, Validator};

/// Flags accepted by every mutating operation.
///
/// Not every flag is meaningful for every operation; irrelevant flags are
/// ignored (for example `emit_model_to_view_change` only affects leaf
/// `set_value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Recompute/mark only this control, not its ancestors.
    pub only_self: bool,
    /// Emit on `value_changes` / `status_changes`.
    pub emit_event: bool,
    /// Invoke callbacks registered with
    /// [`FormControl::register_on_change`](crate::FormControl::register_on_change).
    pub emit_model_to_view_change: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            only_self: false,
            emit_event: true,
            emit_model_to_view_change: true,
        }
    }
}

impl UpdateOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn only_self(mut self, only_self: bool) -> Self {
        self.only_self = only_self;
        self
    }

    #[must_use]
    pub fn emit_event(mut self, emit_event: bool) -> Self {
        self.emit_event = emit_event;
        self
    }

    #[must_use]
    pub fn emit_model_to_view_change(mut self, emit: bool) -> Self {
        self.emit_model_to_view_change = emit;
        self
    }

    /// Shorthand for `emit_event(false)`.
    #[must_use]
    pub fn silent(self) -> Self {
        self.emit_event(false)
    }

    /// Options handed to children by a composite bulk operation: children
    /// never notify their parent themselves, the composite does.
    #[must_use]
    pub(crate) fn for_child(self) -> Self {
        self.only_self(true)
    }
}

/// Construction-time configuration shared by all control kinds.
#[derive(Clone, Default)]
pub struct ControlOptions {
    pub(crate) validators: Vec<Validator>,
    pub(crate) async_validators: Vec<AsyncValidator>,
    pub(crate) disabled: bool,
}

impl ControlOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a synchronous validator. Validators compose in the order added.
    #[must_use]
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    #[must_use]
    pub fn validators(mut self, validators: impl IntoIterator<Item = Validator>) -> Self {
        self.validators.extend(validators);
        self
    }

    /// Add an asynchronous validator.
    #[must_use]
    pub fn async_validator(mut self, validator: AsyncValidator) -> Self {
        self.async_validators.push(validator);
        self
    }

    #[must_use]
    pub fn async_validators(
        mut self,
        validators: impl IntoIterator<Item = AsyncValidator>,
    ) -> Self {
        self.async_validators.extend(validators);
        self
    }

    /// Start the control in the [`Disabled`](crate::ControlStatus::Disabled)
    /// state.
    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

impl std::fmt::Debug for ControlOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlOptions")
            .field("validators", &self.validators.len())
            .field("async_validators", &self.async_validators.len())
            .field("disabled", &self.disabled)
            .finish()
    }
}
