//! The executive: owns the calendar and current simulated time, and
//! enforces the scheduling rules and state machine of the event dispatch
//! loop.
//!
//! The main dispatch loop itself lives on [`crate::Model`] (see
//! `model.rs`), because dispatching an event's action requires `&mut
//! Model`, not just `&mut Executive`. This module owns everything that
//! *doesn't* need that: the calendar, the clock, the id counter, and the
//! executive's own state machine.

use crate::adapters::WallClock;
use crate::calendar::EventCalendar;
use crate::element::ElementId;
use crate::error::{SimError, SimResult};
use crate::event::{CalendarEntry, Event, EventAction, EventId, priority};
use crate::time::SimTime;
use std::any::Any;
use std::time::Duration;

/// States of the executive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutiveState {
    /// Never initialized.
    Created,
    /// Initialized, between dispatches.
    Initialized,
    /// Currently inside an event's action.
    BeforeEvent,
    /// Just finished an event's action.
    AfterEvent,
    /// The replication's event loop has finished.
    AfterExecution,
}

impl ExecutiveState {
    pub(crate) fn name(self) -> &'static str {
        match self {
            ExecutiveState::Created => "Created",
            ExecutiveState::Initialized => "Initialized",
            ExecutiveState::BeforeEvent => "BeforeEvent",
            ExecutiveState::AfterEvent => "AfterEvent",
            ExecutiveState::AfterExecution => "AfterExecution",
        }
    }

    fn can_schedule(self) -> bool {
        matches!(
            self,
            ExecutiveState::Initialized | ExecutiveState::BeforeEvent | ExecutiveState::AfterEvent
        )
    }
}

/// The result of popping the calendar's minimum entry, used by
/// `Model::dispatch_loop` to drive the main loop.
pub(crate) struct PoppedEntry {
    pub(crate) event: Event,
    pub(crate) message: Option<Box<dyn Any>>,
    pub(crate) action: EventAction,
    pub(crate) was_live: bool,
}

pub struct Executive {
    calendar: EventCalendar,
    current_time: SimTime,
    scheduled_end_time: SimTime,
    next_event_id: u64,
    state: ExecutiveState,
    events_executed: u64,
    end_replication_event_id: Option<EventId>,
    end_replication_priority: i32,
    wall_clock: Box<dyn WallClock>,
    max_wall_time: Option<Duration>,
}

impl Executive {
    /// Creates a new executive in the `Created` state, using `wall_clock`
    /// for the per-replication timeout check.
    #[must_use]
    pub fn new(wall_clock: Box<dyn WallClock>) -> Self {
        Self {
            calendar: EventCalendar::new(),
            current_time: SimTime::ZERO,
            scheduled_end_time: SimTime::INFINITE,
            next_event_id: 0,
            state: ExecutiveState::Created,
            events_executed: 0,
            end_replication_event_id: None,
            end_replication_priority: priority::END_REPLICATION,
            wall_clock,
            max_wall_time: None,
        }
    }

    /// Initializes (or re-initializes) the executive: clears the
    /// calendar, zeroes the clock, resets counters, moves to
    /// `Initialized`.
    pub fn initialize(&mut self, scheduled_end_time: SimTime, max_wall_time: Option<Duration>) {
        self.calendar.clear();
        self.current_time = SimTime::ZERO;
        self.scheduled_end_time = scheduled_end_time;
        self.next_event_id = 0;
        self.events_executed = 0;
        self.end_replication_event_id = None;
        self.max_wall_time = max_wall_time;
        self.state = ExecutiveState::Initialized;
    }

    /// Current executive state.
    #[must_use]
    pub fn state(&self) -> ExecutiveState {
        self.state
    }

    /// Current simulated time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.current_time
    }

    /// Number of events dispatched (action invoked) since initialization.
    #[must_use]
    pub fn events_executed(&self) -> u64 {
        self.events_executed
    }

    /// `true` if the calendar holds no further entries.
    #[must_use]
    pub fn is_calendar_empty(&self) -> bool {
        self.calendar.is_empty()
    }

    /// The simulated time of the calendar's minimum entry, if any.
    #[must_use]
    pub fn peek_time(&self) -> Option<SimTime> {
        self.calendar.peek_time()
    }

    /// Schedules an event `inter_event_time` ticks from now. If the
    /// computed time exceeds the scheduled end time, a detached event is
    /// returned (not inserted) rather than an error; callers must not
    /// treat that as a failure.
    #[allow(clippy::too_many_arguments)]
    pub fn schedule(
        &mut self,
        source: Option<ElementId>,
        action: EventAction,
        inter_event_time: f64,
        message: Option<Box<dyn Any>>,
        priority: i32,
        name: Option<String>,
    ) -> SimResult<Event> {
        if inter_event_time < 0.0 {
            return Err(SimError::NegativeInterEventTime(inter_event_time));
        }
        if !self.state.can_schedule() {
            return Err(SimError::ScheduleBeforeInitOrAfterEnd(self.state.name()));
        }

        let id = EventId::new(self.next_event_id);
        self.next_event_id += 1;
        let time = self.current_time.saturating_add(SimTime::new(inter_event_time));

        let event = Event {
            id,
            time,
            priority,
            name,
            created_at: self.current_time,
            source,
            is_scheduled: time <= self.scheduled_end_time,
        };

        if event.is_scheduled {
            self.calendar.insert(CalendarEntry {
                event: event.clone(),
                message,
                action,
            });
            tracing::trace!(event_id = ?event.id, time = %event.time, priority, "event scheduled");
        }

        Ok(event)
    }

    /// Schedules (replacing any prior) the distinguished end-of-replication
    /// event at `time`, with the executive's configured end-replication
    /// priority.
    pub fn schedule_end_of_replication(
        &mut self,
        action: EventAction,
        time: SimTime,
    ) -> SimResult<Event> {
        if let Some(prior) = self.end_replication_event_id.take() {
            self.calendar.cancel(prior);
        }
        let inter_event_time = (time - self.current_time).as_f64();
        let event = self.schedule(
            None,
            action,
            inter_event_time,
            None,
            self.end_replication_priority,
            Some("endOfReplication".to_string()),
        )?;
        self.end_replication_event_id = Some(event.id);
        Ok(event)
    }

    /// Sets the priority used for the end-of-replication event.
    pub fn set_end_replication_priority(&mut self, priority: i32) {
        self.end_replication_priority = priority;
    }

    /// Cancels a previously scheduled event. Fails with
    /// [`SimError::CancelUnscheduled`] if the event is not currently live.
    pub fn cancel(&mut self, id: EventId) -> SimResult<()> {
        if self.calendar.cancel(id) {
            tracing::trace!(event_id = ?id, "event cancelled");
            Ok(())
        } else {
            Err(SimError::CancelUnscheduled(id))
        }
    }

    /// Arms the wall-clock timeout check for the current replication.
    pub fn check_wall_time(&self) -> SimResult<()> {
        if let Some(max) = self.max_wall_time {
            if self.wall_clock.elapsed() > max {
                return Err(SimError::ExceededExecutionTime);
            }
        }
        Ok(())
    }

    /// Pops the calendar's minimum entry, if any, splitting it into the
    /// pieces `Model::dispatch_loop` needs. Does not itself advance
    /// `current_time` or change `state`; the caller (which has `&mut
    /// Model` in scope) does that as part of the main loop.
    pub(crate) fn pop_next(&mut self) -> Option<PoppedEntry> {
        let (entry, was_live) = self.calendar.pop_next()?;
        Some(PoppedEntry {
            event: entry.event,
            message: entry.message,
            action: entry.action,
            was_live,
        })
    }

    /// Advances current time to `time`. Only legal to move forward; the
    /// calendar's ordering invariant guarantees the caller never asks to
    /// move backward.
    pub(crate) fn advance_time_to(&mut self, time: SimTime) {
        debug_assert!(time >= self.current_time, "executive time cannot move backward");
        self.current_time = time;
    }

    pub(crate) fn set_state(&mut self, state: ExecutiveState) {
        self.state = state;
    }

    pub(crate) fn increment_events_executed(&mut self) {
        self.events_executed += 1;
    }

    pub(crate) fn end_replication_event_id(&self) -> Option<EventId> {
        self.end_replication_event_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ManualWallClock;

    fn new_executive() -> Executive {
        let mut exec = Executive::new(Box::new(ManualWallClock::new()));
        exec.initialize(SimTime::new(100.0), None);
        exec
    }

    #[test]
    fn schedule_before_initialize_fails() {
        let mut exec = Executive::new(Box::new(ManualWallClock::new()));
        let result = exec.schedule(None, Box::new(|_, _, _| {}), 0.0, None, 10, None);
        assert!(matches!(
            result,
            Err(SimError::ScheduleBeforeInitOrAfterEnd("Created"))
        ));
    }

    #[test]
    fn negative_inter_event_time_fails() {
        let mut exec = new_executive();
        let result = exec.schedule(None, Box::new(|_, _, _| {}), -1.0, None, 10, None);
        assert!(matches!(result, Err(SimError::NegativeInterEventTime(t)) if t == -1.0));
    }

    #[test]
    fn scheduling_beyond_end_time_returns_detached_event() {
        let mut exec = new_executive();
        let event = exec
            .schedule(None, Box::new(|_, _, _| {}), 200.0, None, 10, None)
            .unwrap();
        assert!(!event.is_scheduled());
        assert!(exec.is_calendar_empty());
    }

    #[test]
    fn scheduling_within_end_time_inserts_into_calendar() {
        let mut exec = new_executive();
        let event = exec
            .schedule(None, Box::new(|_, _, _| {}), 5.0, None, 10, None)
            .unwrap();
        assert!(event.is_scheduled());
        assert!(!exec.is_calendar_empty());
    }

    #[test]
    fn cancel_unscheduled_event_fails() {
        let mut exec = new_executive();
        let result = exec.cancel(EventId::new(42));
        assert!(matches!(result, Err(SimError::CancelUnscheduled(_))));
    }

    #[test]
    fn end_of_replication_reschedule_cancels_prior() {
        let mut exec = new_executive();
        let first = exec
            .schedule_end_of_replication(Box::new(|_, _, _| {}), SimTime::new(50.0))
            .unwrap();
        let second = exec
            .schedule_end_of_replication(Box::new(|_, _, _| {}), SimTime::new(60.0))
            .unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(exec.end_replication_event_id(), Some(second.id()));
    }

    #[test]
    fn wall_time_check_passes_under_limit() {
        let mut exec = Executive::new(Box::new(ManualWallClock::new()));
        exec.initialize(SimTime::INFINITE, Some(Duration::from_secs(10)));
        assert!(exec.check_wall_time().is_ok());
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    use proptest::prelude::*;

    proptest! {
        /// Event count strictly increases across executions within a
        /// replication (by exactly one per live pop) and resets to zero at
        /// the next `initialize`.
        #[test]
        fn events_executed_increases_by_one_per_live_pop_and_resets(
            inter_event_times in proptest::collection::vec(0.0_f64..50.0, 0..30),
        ) {
            let mut exec = new_executive();
            for t in &inter_event_times {
                exec.schedule(None, Box::new(|_, _, _| {}), *t, None, 10, None).unwrap();
            }

            let mut executed = 0_u64;
            while let Some(popped) = exec.pop_next() {
                if popped.was_live {
                    exec.increment_events_executed();
                    executed += 1;
                    prop_assert_eq!(exec.events_executed(), executed);
                }
            }
            prop_assert_eq!(exec.events_executed() as usize, inter_event_times.len());

            exec.initialize(SimTime::new(100.0), None);
            prop_assert_eq!(exec.events_executed(), 0);
        }
    }
}
