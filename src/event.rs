//! Events: immutable-after-schedule records dispatched by the [`crate::Executive`].

use crate::element::ElementId;
use crate::model::Model;
use crate::time::SimTime;
use std::any::Any;

/// Unique, monotonically increasing identifier for a scheduled event,
/// assigned by the executive at scheduling time. Per-model, not
/// process-global (Design Notes: "global counters" re-architecture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub(crate) u64);

impl EventId {
    pub(crate) fn new(raw: u64) -> Self {
        EventId(raw)
    }
}

/// Default numeric priorities, lower runs first.
pub mod priority {
    /// Default priority for an ordinary user-scheduled event.
    pub const DEFAULT: i32 = 10;
    /// Priority for the end-of-replication event; fires after ties at the
    /// same time.
    pub const END_REPLICATION: i32 = 10_000;
    /// Priority for an element's warmup event.
    pub const WARMUP: i32 = 9_000;
    /// Priority for batch-style events.
    pub const BATCH: i32 = 8_000;
    /// Priority for a timed-update event.
    pub const TIMED_UPDATE: i32 = 3;
    /// Default priority for an event generator's own events: one step
    /// ahead of ordinary events so generator arrivals win ties.
    pub const GENERATOR: i32 = DEFAULT - 1;
    /// Default priority for a schedule's start event.
    pub const SCHEDULE_START: i32 = DEFAULT - 5;
    /// Default priority for a schedule item's start event.
    pub const SCHEDULE_ITEM_START: i32 = DEFAULT - 4;
}

/// A handle to a scheduled (or detached) event.
///
/// Once returned from [`Model::schedule`], `time` and `priority` never
/// change; the only permitted post-schedule mutation is cancellation,
/// performed through [`Model::cancel`], not through this handle.
#[derive(Debug, Clone)]
pub struct Event {
    pub(crate) id: EventId,
    pub(crate) time: SimTime,
    pub(crate) priority: i32,
    pub(crate) name: Option<String>,
    pub(crate) created_at: SimTime,
    pub(crate) source: Option<ElementId>,
    /// `false` for an event returned beyond the scheduled end time: a
    /// detached event that will never be inserted into the calendar.
    pub(crate) is_scheduled: bool,
}

impl Event {
    /// The event's unique id.
    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The simulated time at which this event is (or would be) dispatched.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// The event's tie-break priority; lower runs first.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// The event's optional name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The simulated time at which this event was scheduled.
    #[must_use]
    pub fn created_at(&self) -> SimTime {
        self.created_at
    }

    /// The element that scheduled this event, if any.
    #[must_use]
    pub fn source(&self) -> Option<ElementId> {
        self.source
    }

    /// `true` if this event was actually inserted into the calendar.
    /// `false` for a detached event returned because its computed time
    /// fell beyond the scheduled end time; callers must not treat
    /// that as a failure, only as a signal the event will never fire.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.is_scheduled
    }
}

/// The action invoked when an event fires: given mutable access to the
/// model and the event's own metadata and optional message payload.
///
/// `FnOnce` because an `Event` is not reusable: recurring behavior
/// (generators, schedules, timed updates) is implemented by having an
/// action reschedule a brand-new event, not by re-invoking itself.
pub type EventAction = Box<dyn FnOnce(&mut Model, Event, Option<Box<dyn Any>>)>;

/// The calendar's internal record: the public [`Event`] view, its optional
/// message payload, and the action to invoke at dispatch time.
pub(crate) struct CalendarEntry {
    pub(crate) event: Event,
    pub(crate) message: Option<Box<dyn Any>>,
    pub(crate) action: EventAction,
}
