//! Fixed-pattern calendar schedules built on top of the kernel.
//!
//! A schedule holds a sorted list of named items, each with an offset and
//! duration relative to the start of a cycle, and notifies a listener at
//! four points: the cycle starting, each item starting and ending, and the
//! cycle ending (after which it repeats if configured). Like
//! [`crate::generator::EventGenerator`] it is an ordinary
//! [`ModelElementBehavior`] that schedules its own events through
//! `Model::schedule` and re-enters itself via `Model::with_behavior`.

use crate::element::{ElementId, ModelElementBehavior};
use crate::error::{SimError, SimResult};
use crate::event::priority;
use crate::model::Model;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Lifecycle state of a schedule (mirrors [`crate::generator::GeneratorState`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Constructed, or reset at replication initialization; no cycle
    /// running.
    NotStarted,
    /// A cycle is in progress.
    Running,
    /// `cancelScheduleStart` was called, or a non-repeating schedule ran
    /// its one cycle to completion.
    Done,
}

/// A single named interval within a schedule's cycle.
#[derive(Debug, Clone)]
pub struct ScheduleItem {
    name: String,
    start_offset: f64,
    duration: f64,
    sequence: u64,
}

impl ScheduleItem {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn start_offset(&self) -> f64 {
        self.start_offset
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[must_use]
    pub fn end_offset(&self) -> f64 {
        self.start_offset + self.duration
    }
}

/// Wire-format record for a single schedule item: the shape an
/// external reporter or configuration file sends in, deserialized with
/// `serde_json` and handed to [`Schedule::add_item_data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleItemData {
    pub name: String,
    pub start_offset: f64,
    pub duration: f64,
}

/// Wire-format record for an entire schedule, consumed by
/// [`Schedule::from_data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleData {
    pub length: f64,
    #[serde(default)]
    pub initial_start_time: f64,
    pub repeat: bool,
    pub items: Vec<ScheduleItemData>,
}

/// Notification sink for a schedule's cycle and item transitions.
/// All methods default to no-ops; an implementor overrides only what it
/// needs, the same shape as [`crate::element::StatusObserver`].
#[allow(unused_variables)]
pub trait ScheduleChangeListener {
    /// Fires at the start of every cycle, at the cycle's own offset 0.
    fn schedule_started(&mut self, model: &mut Model, me: ElementId) {}

    /// Fires when an item's `start_offset` is reached.
    fn item_started(&mut self, model: &mut Model, me: ElementId, item_name: &str) {}

    /// Fires when an item's `start_offset + duration` is reached.
    fn item_ended(&mut self, model: &mut Model, me: ElementId, item_name: &str) {}

    /// Fires at the schedule's configured length, ending the cycle. If the
    /// schedule repeats, a fresh cycle begins immediately afterward.
    fn schedule_ended(&mut self, model: &mut Model, me: ElementId) {}
}

/// A fixed-pattern calendar schedule.
pub struct Schedule {
    items: Vec<ScheduleItem>,
    initial_start_time: f64,
    length: f64,
    repeat: bool,
    auto_start: bool,
    start_priority: i32,
    item_priority: i32,
    next_sequence: u64,
    listeners: Vec<Box<dyn ScheduleChangeListener>>,
    pending_events: Vec<crate::event::EventId>,
    state: ScheduleState,
}

impl Schedule {
    /// Creates an empty schedule with the given cycle length. `length`
    /// must be strictly positive.
    pub fn new(length: f64) -> SimResult<Self> {
        if length <= 0.0 {
            return Err(SimError::NonPositiveDuration(length));
        }
        Ok(Self {
            items: Vec::new(),
            initial_start_time: 0.0,
            length,
            repeat: false,
            auto_start: true,
            start_priority: priority::SCHEDULE_START,
            item_priority: priority::SCHEDULE_ITEM_START,
            next_sequence: 0,
            listeners: Vec::new(),
            pending_events: Vec::new(),
            state: ScheduleState::NotStarted,
        })
    }

    /// Builds a schedule from its wire-format record, validating
    /// every item the same way [`Schedule::add_item`] would.
    pub fn from_data(data: ScheduleData) -> SimResult<Self> {
        let mut schedule = Self::new(data.length)?
            .with_repeat(data.repeat)
            .with_start_time(data.initial_start_time)?;
        for item in data.items {
            schedule.add_item_data(item)?;
        }
        Ok(schedule)
    }

    /// Sets whether the schedule begins a fresh cycle immediately after
    /// the previous one ends. Defaults to `false` (runs exactly once).
    #[must_use]
    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Sets whether the schedule begins its first cycle automatically at
    /// replication initialization. Defaults to `true`.
    #[must_use]
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Sets the delay, from replication start, at which an auto-started
    /// schedule begins its first cycle.
    /// Has no effect if `auto_start` is `false`; a schedule started
    /// manually via [`Schedule::schedule_start`] always begins at the
    /// time it is called, regardless of this setting.
    pub fn with_start_time(mut self, initial_start_time: f64) -> SimResult<Self> {
        if initial_start_time < 0.0 {
            return Err(SimError::NegativeInterEventTime(initial_start_time));
        }
        self.initial_start_time = initial_start_time;
        Ok(self)
    }

    /// Overrides the priority used for the schedule's own start and
    /// end-of-cycle events. Defaults to [`priority::SCHEDULE_START`].
    #[must_use]
    pub fn with_start_priority(mut self, start_priority: i32) -> Self {
        self.start_priority = start_priority;
        self
    }

    /// Overrides the priority used for item-start and item-end events.
    /// Defaults to [`priority::SCHEDULE_ITEM_START`].
    #[must_use]
    pub fn with_item_priority(mut self, item_priority: i32) -> Self {
        self.item_priority = item_priority;
        self
    }

    /// Attaches a listener, notified of every subsequent cycle/item
    /// transition.
    pub fn add_schedule_change_listener(&mut self, listener: Box<dyn ScheduleChangeListener>) {
        self.listeners.push(listener);
    }

    /// The schedule's configured cycle length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Items currently on the schedule, sorted by `(start_offset,
    /// insertion order)`.
    #[must_use]
    pub fn items(&self) -> &[ScheduleItem] {
        &self.items
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// Adds a named item. Rejects a duplicate name, a non-positive
    /// duration, or an item whose `start_offset + duration` exceeds the
    /// schedule's length.
    pub fn add_item(&mut self, name: impl Into<String>, start_offset: f64, duration: f64) -> SimResult<()> {
        let name = name.into();
        if duration <= 0.0 {
            return Err(SimError::NonPositiveDuration(duration));
        }
        if self.items.iter().any(|item| item.name == name) {
            return Err(SimError::DuplicateScheduleItemName(name));
        }
        let end_offset = start_offset + duration;
        if end_offset > self.length {
            return Err(SimError::ScheduleItemExceedsLength {
                name,
                end_offset,
                length: self.length,
            });
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let item = ScheduleItem { name, start_offset, duration, sequence };
        let insert_at = self
            .items
            .partition_point(|existing| (existing.start_offset, existing.sequence) <= (item.start_offset, item.sequence));
        self.items.insert(insert_at, item);
        Ok(())
    }

    /// Adds an item from its wire-format record.
    pub fn add_item_data(&mut self, data: ScheduleItemData) -> SimResult<()> {
        self.add_item(data.name, data.start_offset, data.duration)
    }

    /// Removes a named item. Fails with [`SimError::UnknownScheduleItem`]
    /// if no item by that name exists.
    pub fn remove_item(&mut self, name: &str) -> SimResult<()> {
        let before = self.items.len();
        self.items.retain(|item| item.name != name);
        if self.items.len() == before {
            return Err(SimError::UnknownScheduleItem(name.to_string()));
        }
        Ok(())
    }

    /// Removes every item from the schedule. Does not affect an
    /// in-progress cycle's already-scheduled events.
    pub fn clear_schedule(&mut self) {
        self.items.clear();
    }

    /// `scheduleStart`: begins a cycle at the current time if not
    /// already running. No-op if already `Running`.
    pub fn schedule_start(&mut self, model: &mut Model, me: ElementId) -> SimResult<()> {
        if self.state == ScheduleState::Running {
            return Ok(());
        }
        self.begin_cycle(model, me)
    }

    /// `cancelScheduleStart`: cancels every pending event from the
    /// current cycle and stops the schedule; it will not repeat even if
    /// `repeat` is set.
    pub fn cancel_schedule_start(&mut self, model: &mut Model) {
        self.state = ScheduleState::Done;
        for event_id in self.pending_events.drain(..) {
            let _ = model.cancel(event_id);
        }
    }

    /// Priority for the deferred auto-start event: normally
    /// `start_priority`, but lowered below `item_priority` when an item
    /// begins at offset 0, so the start fires (and notifies
    /// `schedule_started`) before that item's own start event at the same
    /// instant.
    fn effective_start_priority(&self) -> i32 {
        if self.items.iter().any(|item| item.start_offset == 0.0) {
            self.start_priority.min(self.item_priority - 1)
        } else {
            self.start_priority
        }
    }

    fn begin_cycle(&mut self, model: &mut Model, me: ElementId) -> SimResult<()> {
        self.state = ScheduleState::Running;
        self.pending_events.clear();

        for listener in &mut self.listeners {
            listener.schedule_started(model, me);
        }

        for item in self.items.clone() {
            let item_name = item.name.clone();
            let started_name = item_name.clone();
            let event = model.schedule(
                Some(me),
                Box::new(move |model: &mut Model, _event, _message| {
                    let _ = model.with_behavior::<Schedule, _>(me, |schedule, model| {
                        for listener in &mut schedule.listeners {
                            listener.item_started(model, me, &started_name);
                        }
                    });
                }),
                item.start_offset,
                None,
                self.item_priority,
                Some(format!("itemStarted:{me:?}:{item_name}")),
            )?;
            if event.is_scheduled() {
                self.pending_events.push(event.id());
            }

            let ended_name = item.name.clone();
            let event = model.schedule(
                Some(me),
                Box::new(move |model: &mut Model, _event, _message| {
                    let _ = model.with_behavior::<Schedule, _>(me, |schedule, model| {
                        for listener in &mut schedule.listeners {
                            listener.item_ended(model, me, &ended_name);
                        }
                    });
                }),
                item.end_offset(),
                None,
                self.item_priority,
                Some(format!("itemEnded:{me:?}:{}", item.name)),
            )?;
            if event.is_scheduled() {
                self.pending_events.push(event.id());
            }
        }

        // Biased to fire one tick of priority after item events: an
        // item whose `end_offset` lands exactly on the schedule's length
        // must have already notified `item_ended` before `schedule_ended`
        // fires at the same instant.
        let event = model.schedule(
            Some(me),
            Box::new(move |model: &mut Model, _event, _message| {
                let _ = model.with_behavior::<Schedule, _>(me, |schedule, model| {
                    schedule.end_cycle(model, me);
                });
            }),
            self.length,
            None,
            self.item_priority.saturating_add(1),
            Some(format!("scheduleEnded:{me:?}")),
        )?;
        if event.is_scheduled() {
            self.pending_events.push(event.id());
        }

        Ok(())
    }

    fn end_cycle(&mut self, model: &mut Model, me: ElementId) {
        self.pending_events.clear();
        for listener in &mut self.listeners {
            listener.schedule_ended(model, me);
        }
        if self.repeat {
            let _ = self.begin_cycle(model, me);
        } else {
            self.state = ScheduleState::Done;
        }
    }
}

impl ModelElementBehavior for Schedule {
    /// Replication initialization: clear runtime state and
    /// auto-start the first cycle if configured, at `initial_start_time`
    /// ticks from the start of the replication. The item list itself is
    /// static configuration, not per-replication state, so it is left
    /// untouched.
    fn initialize(&mut self, model: &mut Model, me: ElementId) {
        self.state = ScheduleState::NotStarted;
        self.pending_events.clear();
        if !self.auto_start {
            return;
        }

        if self.initial_start_time == 0.0 {
            if let Err(err) = self.schedule_start(model, me) {
                tracing::warn!(element = ?me, error = %err, "schedule auto-start failed");
            }
            return;
        }

        let start_priority = self.effective_start_priority();
        let result = model.schedule(
            Some(me),
            Box::new(move |model: &mut Model, _event, _message| {
                let _ = model.with_behavior::<Schedule, _>(me, |schedule, model| {
                    let _ = schedule.begin_cycle(model, me);
                });
            }),
            self.initial_start_time,
            None,
            start_priority,
            Some(format!("scheduleStart:{me:?}")),
        );
        match result {
            Ok(event) if event.is_scheduled() => self.pending_events.push(event.id()),
            Ok(_) => {}
            Err(err) => tracing::warn!(element = ?me, error = %err, "schedule auto-start failed"),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::ExperimentParameters;
    use crate::time::SimTime;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn new_schedule_rejects_non_positive_length() {
        assert!(matches!(Schedule::new(0.0), Err(SimError::NonPositiveDuration(_))));
        assert!(matches!(Schedule::new(-5.0), Err(SimError::NonPositiveDuration(_))));
    }

    #[test]
    fn add_item_rejects_duplicate_names() {
        let mut schedule = Schedule::new(100.0).unwrap();
        schedule.add_item("a", 0.0, 10.0).unwrap();
        let result = schedule.add_item("a", 20.0, 5.0);
        assert!(matches!(result, Err(SimError::DuplicateScheduleItemName(name)) if name == "a"));
    }

    #[test]
    fn add_item_rejects_end_offset_past_length() {
        let mut schedule = Schedule::new(100.0).unwrap();
        let result = schedule.add_item("a", 95.0, 10.0);
        assert!(matches!(
            result,
            Err(SimError::ScheduleItemExceedsLength { end_offset, length, .. })
                if end_offset == 105.0 && length == 100.0
        ));
    }

    #[test]
    fn add_item_rejects_non_positive_duration() {
        let mut schedule = Schedule::new(100.0).unwrap();
        assert!(matches!(
            schedule.add_item("a", 0.0, 0.0),
            Err(SimError::NonPositiveDuration(_))
        ));
    }

    #[test]
    fn items_are_kept_sorted_by_start_offset() {
        let mut schedule = Schedule::new(100.0).unwrap();
        schedule.add_item("late", 50.0, 10.0).unwrap();
        schedule.add_item("early", 5.0, 10.0).unwrap();
        let names: Vec<&str> = schedule.items().iter().map(ScheduleItem::name).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn remove_item_fails_for_unknown_name() {
        let mut schedule = Schedule::new(100.0).unwrap();
        let result = schedule.remove_item("nope");
        assert!(matches!(result, Err(SimError::UnknownScheduleItem(name)) if name == "nope"));
    }

    #[test]
    fn from_data_round_trips_wire_format() {
        let data = ScheduleData {
            length: 480.0,
            initial_start_time: 0.0,
            repeat: true,
            items: vec![
                ScheduleItemData { name: "morning".to_string(), start_offset: 120.0, duration: 15.0 },
                ScheduleItemData { name: "afternoon".to_string(), start_offset: 240.0, duration: 30.0 },
            ],
        };
        let schedule = Schedule::from_data(data).unwrap();
        assert_eq!(schedule.items().len(), 2);
        assert_eq!(schedule.length(), 480.0);
    }

    #[test]
    fn schedule_data_round_trips_through_json() {
        let data = ScheduleData {
            length: 480.0,
            initial_start_time: 0.0,
            repeat: false,
            items: vec![ScheduleItemData { name: "break1".to_string(), start_offset: 120.0, duration: 15.0 }],
        };
        let json = serde_json::to_string(&data).unwrap();
        let parsed: ScheduleData = serde_json::from_str(&json).unwrap();
        let schedule = Schedule::from_data(parsed).unwrap();
        assert_eq!(schedule.items().len(), 1);
        assert_eq!(schedule.items()[0].name(), "break1");
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl ScheduleChangeListener for RecordingListener {
        fn schedule_started(&mut self, model: &mut Model, _me: ElementId) {
            self.events.borrow_mut().push(format!("scheduleStarted@{}", model.now().as_f64()));
        }

        fn item_started(&mut self, model: &mut Model, _me: ElementId, item_name: &str) {
            self.events
                .borrow_mut()
                .push(format!("itemStarted:{item_name}@{}", model.now().as_f64()));
        }

        fn item_ended(&mut self, model: &mut Model, _me: ElementId, item_name: &str) {
            self.events
                .borrow_mut()
                .push(format!("itemEnded:{item_name}@{}", model.now().as_f64()));
        }

        fn schedule_ended(&mut self, model: &mut Model, _me: ElementId) {
            self.events.borrow_mut().push(format!("scheduleEnded@{}", model.now().as_f64()));
        }
    }

    #[test]
    fn non_repeating_schedule_fires_listener_events_in_order() {
        let mut model = Model::new("m", ".");
        let events = Rc::new(RefCell::new(Vec::new()));

        let mut schedule = Schedule::new(480.0).unwrap();
        schedule.add_item("morning", 120.0, 15.0).unwrap();
        schedule.add_item("afternoon", 240.0, 30.0).unwrap();
        schedule.add_schedule_change_listener(Box::new(RecordingListener { events: Rc::clone(&events) }));

        model.add_element(model.root_id(), "sched", Box::new(schedule)).unwrap();

        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(1000.0));
        model.simulate(params).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                "scheduleStarted@0".to_string(),
                "itemStarted:morning@120".to_string(),
                "itemEnded:morning@135".to_string(),
                "itemStarted:afternoon@240".to_string(),
                "itemEnded:afternoon@270".to_string(),
                "scheduleEnded@480".to_string(),
            ]
        );
    }

    #[test]
    fn repeating_schedule_runs_a_second_cycle() {
        let mut model = Model::new("m", ".");
        let events = Rc::new(RefCell::new(Vec::new()));

        let mut schedule = Schedule::new(100.0).unwrap().with_repeat(true);
        schedule.add_item("a", 10.0, 5.0).unwrap();
        schedule.add_schedule_change_listener(Box::new(RecordingListener { events: Rc::clone(&events) }));

        let id = model.add_element(model.root_id(), "sched", Box::new(schedule)).unwrap();

        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(250.0));
        model.simulate(params).unwrap();

        let started_count = events.borrow().iter().filter(|e| e.starts_with("scheduleStarted")).count();
        assert_eq!(started_count, 3);
        assert_eq!(
            model.behavior_ref::<Schedule>(id).unwrap().state(),
            ScheduleState::Running
        );
    }

    /// Schedules a one-off `cancel_schedule_start` call against another
    /// element's schedule at a fixed absolute time. A listener cannot do
    /// this itself from inside `schedule_ended`: at that point the
    /// schedule's own behavior is already taken out of the model's
    /// behavior map for the duration of the call, so a nested
    /// `with_behavior` on the same id would find nothing there.
    struct CancelScheduleAt {
        target: ElementId,
        at: f64,
    }

    impl ModelElementBehavior for CancelScheduleAt {
        fn initialize(&mut self, model: &mut Model, _me: ElementId) {
            let target = self.target;
            model
                .schedule(
                    None,
                    Box::new(move |model: &mut Model, _event, _message| {
                        let _ = model.with_behavior::<Schedule, _>(target, |schedule, model| {
                            schedule.cancel_schedule_start(model);
                        });
                    }),
                    self.at,
                    None,
                    priority::DEFAULT,
                    None,
                )
                .unwrap();
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn cancel_schedule_start_stops_future_cycles() {
        let mut model = Model::new("m", ".");
        let events = Rc::new(RefCell::new(Vec::new()));

        let mut schedule = Schedule::new(10.0).unwrap().with_repeat(true);
        schedule.add_item("a", 1.0, 1.0).unwrap();
        schedule.add_schedule_change_listener(Box::new(RecordingListener { events: Rc::clone(&events) }));
        let sched_id = model.add_element(model.root_id(), "sched", Box::new(schedule)).unwrap();

        // Cycle 1: scheduleStarted@0, itemStarted@1, itemEnded@2,
        // scheduleEnded@10 (which immediately begins cycle 2). Cancelling
        // at t=15, mid-cycle-2 but before its own scheduleEnded@20, means
        // cycle 2's itemStarted/itemEnded still fire but no cycle 3 ever
        // begins.
        model
            .add_element(
                model.root_id(),
                "canceller",
                Box::new(CancelScheduleAt { target: sched_id, at: 15.0 }),
            )
            .unwrap();

        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(100.0));
        model.simulate(params).unwrap();

        let started_count = events.borrow().iter().filter(|e| e.starts_with("scheduleStarted")).count();
        assert_eq!(started_count, 2);
        assert_eq!(
            model.behavior_ref::<Schedule>(sched_id).unwrap().state(),
            ScheduleState::Done
        );
    }

    #[test]
    fn with_start_time_delays_first_cycle() {
        let mut model = Model::new("m", ".");
        let events = Rc::new(RefCell::new(Vec::new()));

        let mut schedule = Schedule::new(100.0).unwrap().with_start_time(50.0).unwrap();
        schedule.add_item("a", 10.0, 5.0).unwrap();
        schedule.add_schedule_change_listener(Box::new(RecordingListener { events: Rc::clone(&events) }));
        model.add_element(model.root_id(), "sched", Box::new(schedule)).unwrap();

        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(200.0));
        model.simulate(params).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                "scheduleStarted@50".to_string(),
                "itemStarted:a@60".to_string(),
                "itemEnded:a@65".to_string(),
                "scheduleEnded@150".to_string(),
            ]
        );
    }

    #[test]
    fn with_start_time_rejects_negative_offset() {
        let schedule = Schedule::new(10.0).unwrap();
        assert!(matches!(
            schedule.with_start_time(-1.0),
            Err(SimError::NegativeInterEventTime(t)) if t == -1.0
        ));
    }

    /// An item ending exactly when the schedule's cycle length is reached
    /// must notify `itemEnded` before `scheduleEnded` fires at the same
    /// instant.
    #[test]
    fn item_ending_at_schedule_length_fires_before_schedule_ended() {
        let mut model = Model::new("m", ".");
        let events = Rc::new(RefCell::new(Vec::new()));

        let mut schedule = Schedule::new(20.0).unwrap();
        schedule.add_item("tail", 15.0, 5.0).unwrap();
        schedule.add_schedule_change_listener(Box::new(RecordingListener { events: Rc::clone(&events) }));
        model.add_element(model.root_id(), "sched", Box::new(schedule)).unwrap();

        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(20.0));
        model.simulate(params).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                "scheduleStarted@0".to_string(),
                "itemStarted:tail@15".to_string(),
                "itemEnded:tail@20".to_string(),
                "scheduleEnded@20".to_string(),
            ]
        );
    }
}
