#![forbid(unsafe_code)]

//! Validity status of a control.

use std::fmt;

/// The validity state of a control.
///
/// Status is always derived: from the control's own errors, the state of its
/// async validator, and (for composites) the status of its participating
/// children. It can only be forced through
/// [`Control::set_errors`](crate::Control::set_errors),
/// [`Control::mark_as_pending`](crate::Control::mark_as_pending) and
/// [`Control::disable`](crate::Control::disable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlStatus {
    /// All validators pass and no participating child is invalid or pending.
    #[default]
    Valid,
    /// A validator failed, errors were forced, or a participating child is
    /// invalid.
    Invalid,
    /// An async validator is in flight for this control or a participating
    /// child.
    Pending,
    /// The control is excluded from validation and from its parent's value.
    Disabled,
}

impl ControlStatus {
    /// Canonical upper-case name (`"VALID"`, `"INVALID"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Pending => "PENDING",
            Self::Disabled => "DISABLED",
        }
    }

    /// Async validation only runs from `Valid` or `Pending`.
    #[must_use]
    pub(crate) const fn allows_async(self) -> bool {
        matches!(self, Self::Valid | Self::Pending)
    }
}

impl fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
