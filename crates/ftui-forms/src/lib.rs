#![forbid(unsafe_code)]

//! Reactive form-state model for FrankenTUI.
//!
//! A form is a tree of controls:
//!
//! - [`FormControl`]: a leaf holding a single value.
//! - [`FormGroup`]: a composite of named children, reduced to a JSON object.
//! - [`FormArray`]: a composite of ordered children, reduced to a JSON array.
//!
//! Every control tracks its value, a [`ControlStatus`], validation errors and
//! the pristine/dirty and untouched/touched interaction flags. Changes flow
//! upward: a leaf recomputes itself, then its parent recomputes its aggregate,
//! and so on to the root. Each level emits on its own
//! [`value_changes`](Control::value_changes) and
//! [`status_changes`](Control::status_changes) streams after recomputing.
//!
//! # Architecture
//!
//! Controls are `Rc`-shared handles. Parents own their children; children
//! hold a `Weak` back-reference that is cleared on detach. Everything is
//! single-threaded.
//!
//! Asynchronous validators run on the thread-local cooperative
//! [`scheduler`]. A control becomes [`ControlStatus::Pending`] synchronously
//! and the result is applied when the host drives the scheduler with
//! [`scheduler::flush`] or [`scheduler::advance`]. Each validation run is
//! tagged with a generation; results from superseded runs are discarded.
//!
//! # Invariants
//!
//! 1. A composite's value equals the reduction of its participating
//!    children's values once a mutation returns.
//! 2. A composite is invalid if any participating child is invalid or its
//!    own validator fails; pending if any participating child is pending or
//!    its own async validator is running.
//! 3. `pristine == !dirty` and `untouched == !touched` at all times.
//! 4. Bulk mutations emit one value/status pair per touched control,
//!    descendants strictly before ancestors.
//! 5. An attached control has exactly one parent.
//!
//! # Example
//!
//! ```
//! use ftui_forms::{FormControl, FormGroup, ControlOptions, validators};
//! use serde_json::json;
//!
//! let required = ControlOptions::new().validator(validators::required());
//! let name = FormControl::with_options("", required);
//! let form = FormGroup::new([("name", name.clone())]);
//! assert!(form.invalid());
//!
//! name.set_value("Ada");
//! assert!(form.valid());
//! assert_eq!(form.value(), json!({"name": "Ada"}));
//! ```

pub mod array;
pub mod control;
pub mod error;
pub mod events;
pub mod field;
pub mod group;
pub mod options;
pub mod path;
pub mod scheduler;
pub mod status;
pub mod validators;

pub use array::FormArray;
pub use control::{Control, ControlId, ControlKind};
pub use error::{FormError, Result};
pub use events::{EventStream, Subscription, SubscriptionScope};
pub use field::FormControl;
pub use group::FormGroup;
pub use options::{ControlOptions, UpdateOptions};
pub use path::{ControlPath, PathSegment};
pub use status::ControlStatus;
pub use validators::{AsyncValidator, ValidationErrors, ValidationFuture, Validator};

pub use serde_json::Value;
