//! Error taxonomy for the kernel.
//!
//! Every public operation that can fail returns [`SimError`]. Variants are
//! grouped, in doc comments only, by the precondition / state / dispatch /
//! resource-bounds taxonomy the kernel distinguishes; the enum itself is
//! flat so callers can match on a single type.

use thiserror::Error;

/// Errors produced by the simulation kernel.
#[derive(Error, Debug)]
pub enum SimError {
    /// `interEventTime` passed to `schedule` was negative.
    #[error("inter-event time must be >= 0, got {0}")]
    NegativeInterEventTime(f64),

    /// A schedule item's duration was not strictly positive.
    #[error("duration must be > 0, got {0}")]
    NonPositiveDuration(f64),

    /// An `ExperimentParameters` builder argument failed validation.
    #[error("invalid experiment parameter: {0}")]
    InvalidExperimentParameter(&'static str),

    /// A generator's max-events was unbounded while its time-between source
    /// is a constant zero, which would spin forever.
    #[error("generator with unbounded max events cannot use a constant-zero time-between source")]
    UnboundedGeneratorWithZeroInterEvent,

    /// Two elements in the same model were given the same name.
    #[error("element name {0:?} is already in use")]
    DuplicateElementName(String),

    /// An element name contained the disallowed `.` character.
    #[error("element name {0:?} must not contain '.'")]
    InvalidElementName(String),

    /// `cancel` was called on an event that is not currently scheduled.
    #[error("event {0:?} is not currently scheduled")]
    CancelUnscheduled(super::event::EventId),

    /// An experiment or generator "initial" parameter was changed while the
    /// model is running.
    #[error("cannot change {0} while the model is running")]
    InitialParameterChangeWhileRunning(&'static str),

    /// An iterative-process operation was called from an illegal state.
    #[error("cannot call {operation} from state {from:?}")]
    IllegalStateTransition {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state it was attempted from.
        from: &'static str,
    },

    /// `schedule` was called while the executive is in `Created` or
    /// `AfterExecution`.
    #[error("cannot schedule events while the executive is in state {0:?}")]
    ScheduleBeforeInitOrAfterEnd(&'static str),

    /// A model element was added or removed while the model is running.
    #[error("cannot mutate the model element tree while the simulation is running")]
    ElementMutationWhileRunning,

    /// The conditional-action processor exceeded its max-scan guard.
    #[error("conditional-action C-phase exceeded {0} scans without converging")]
    TooManyConditionalScans(u32),

    /// A replication exceeded its configured max wall time.
    #[error("replication exceeded its maximum wall time")]
    ExceededExecutionTime,

    /// Two items in the same schedule were given the same name.
    #[error("schedule item name {0:?} is already in use on this schedule")]
    DuplicateScheduleItemName(String),

    /// `removeItem` named an item not present on the schedule.
    #[error("schedule has no item named {0:?}")]
    UnknownScheduleItem(String),

    /// A schedule item's derived end time exceeds the schedule's length.
    #[error("schedule item {name:?} ends at {end_offset} past schedule length {length}")]
    ScheduleItemExceedsLength {
        /// The offending item's name.
        name: String,
        /// The item's derived end offset (`start_offset + duration`).
        end_offset: f64,
        /// The schedule's configured length.
        length: f64,
    },

    /// An event's action panicked during dispatch. Carries the contextual
    /// fields needed so the log line and the propagated error agree.
    #[error(
        "event action failed: event={event_id:?} time={event_time} element={element_name:?} replication={replication}: {reason}"
    )]
    DispatchFailure {
        /// The event whose action failed.
        event_id: super::event::EventId,
        /// Simulated time at which the event fired.
        event_time: f64,
        /// Name of the element that scheduled the event, if known.
        element_name: Option<String>,
        /// The replication number during which the failure occurred.
        replication: u32,
        /// Human-readable description of the failure.
        reason: String,
    },
}

/// Convenience alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;
