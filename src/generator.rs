//! Arrival-stream event generators built on top of the kernel.
//!
//! A generator is an ordinary [`ModelElementBehavior`]: it schedules its
//! own events through the same `Model::schedule` facade any other element
//! uses, and re-schedules itself from within its own event action — the
//! same self-rescheduling idiom periodic plan evaluators use, generalized
//! here to a sampled (not fixed) inter-event time and an explicit
//! four-state lifecycle.

use crate::adapters::ValueSource;
use crate::element::{ElementId, ModelElementBehavior};
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventId, priority};
use crate::model::Model;
use crate::time::SimTime;
use std::any::Any;

/// States of an event generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Constructed, or reset at replication initialization; no event
    /// pending.
    NotStarted,
    /// Firing on schedule.
    Running,
    /// `suspend`ed: no pending event, but `resume` picks back up.
    Suspended,
    /// Turned off, exhausted its max count, or past its ending time; will
    /// not fire again this replication.
    Done,
}

/// Invoked each time the generator fires, after the internal event count
/// has been incremented. `None` is a valid (no-op) callback.
pub type GenerateCallback = Box<dyn FnMut(&mut Model, ElementId)>;

/// An inter-event-time-driven arrival stream.
///
/// Keeps an "initial" and a "current" counterpart of every tunable value
/// (time-until-first, time-between, max events, ending time): the current
/// ones may be changed mid-run via [`EventGenerator::set_time_between_events`]
/// and take effect immediately, but every replication's initialization
/// restores current from initial — changes to current values never
/// persist across replications.
pub struct EventGenerator {
    current_time_until_first: Box<dyn ValueSource>,
    current_time_between: Box<dyn ValueSource>,
    current_max_events: Option<u64>,
    current_ending_time: SimTime,

    initial_time_until_first: Box<dyn ValueSource>,
    initial_time_between: Box<dyn ValueSource>,
    initial_max_events: Option<u64>,
    initial_ending_time: SimTime,

    auto_start: bool,
    event_priority: i32,
    generate: Option<GenerateCallback>,

    next_event: Option<EventId>,
    count: u64,
    state: GeneratorState,
}

impl EventGenerator {
    /// Creates a generator. Construction itself never fails: a
    /// constant-zero `time_between_events` paired with unbounded max
    /// events (the default) is only rejected once the generator actually
    /// tries to start, at [`EventGenerator::turn_on`] — by then
    /// `with_max_events` may already have bounded it.
    #[must_use]
    pub fn new(
        time_until_first_event: Box<dyn ValueSource>,
        time_between_events: Box<dyn ValueSource>,
    ) -> Self {
        Self {
            initial_time_until_first: time_until_first_event.box_clone(),
            initial_time_between: time_between_events.box_clone(),
            initial_max_events: None,
            initial_ending_time: SimTime::INFINITE,
            current_time_until_first: time_until_first_event,
            current_time_between: time_between_events,
            current_max_events: None,
            current_ending_time: SimTime::INFINITE,
            auto_start: true,
            event_priority: priority::GENERATOR,
            generate: None,
            next_event: None,
            count: 0,
            state: GeneratorState::NotStarted,
        }
    }

    /// Bounds the number of events this generator will ever produce in a
    /// replication.
    #[must_use]
    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.initial_max_events = Some(max_events);
        self.current_max_events = Some(max_events);
        self
    }

    /// Sets the absolute ending time past which no further events fire.
    #[must_use]
    pub fn with_ending_time(mut self, ending_time: SimTime) -> Self {
        self.initial_ending_time = ending_time;
        self.current_ending_time = ending_time;
        self
    }

    /// Sets whether the generator schedules its first event automatically
    /// at replication initialization. Defaults to `true`.
    #[must_use]
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Overrides the generator event priority (default
    /// [`priority::GENERATOR`]).
    #[must_use]
    pub fn with_priority(mut self, event_priority: i32) -> Self {
        self.event_priority = event_priority;
        self
    }

    /// Sets the callback invoked on every firing.
    #[must_use]
    pub fn with_generate_callback(
        mut self,
        callback: impl FnMut(&mut Model, ElementId) + 'static,
    ) -> Self {
        self.generate = Some(Box::new(callback));
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Number of events fired since the last replication initialization.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.count
    }

    fn validate(max_events: Option<u64>, time_between: &dyn ValueSource) -> SimResult<()> {
        if max_events.is_none() && time_between.is_constant_zero() {
            return Err(SimError::UnboundedGeneratorWithZeroInterEvent);
        }
        Ok(())
    }

    /// `turnOn(offset)`: from `NotStarted`, schedules the first
    /// event `offset` ticks from now. No-op from any other state. Rejects
    /// an unbounded generator still paired with a constant-zero
    /// time-between source.
    pub fn turn_on(&mut self, model: &mut Model, me: ElementId, offset: f64) -> SimResult<()> {
        Self::validate(self.current_max_events, self.current_time_between.as_ref())?;
        if self.state != GeneratorState::NotStarted {
            return Ok(());
        }
        if matches!(self.current_max_events, Some(0)) {
            self.state = GeneratorState::Done;
            return Ok(());
        }
        let absolute = model.now() + SimTime::new(offset.max(0.0));
        if absolute > self.current_ending_time {
            self.state = GeneratorState::Done;
            return Ok(());
        }
        self.state = GeneratorState::Running;
        self.schedule_next_event(model, me, offset)
    }

    /// `turnOff`: cancels the pending event (if any) and moves to
    /// `Done`, from which no further events fire.
    pub fn turn_off(&mut self, model: &mut Model) {
        self.state = GeneratorState::Done;
        if let Some(id) = self.next_event.take() {
            let _ = model.cancel(id);
        }
    }

    /// `suspend`: from `Running`, cancels the pending event and
    /// moves to `Suspended`. No-op otherwise.
    pub fn suspend(&mut self, model: &mut Model) {
        if self.state != GeneratorState::Running {
            return;
        }
        self.state = GeneratorState::Suspended;
        if let Some(id) = self.next_event.take() {
            let _ = model.cancel(id);
        }
    }

    /// `resume`: from `Suspended`, samples the next inter-event
    /// time and either schedules it or, if it would fall past the ending
    /// time, moves to `Done`. No-op otherwise.
    pub fn resume(&mut self, model: &mut Model, me: ElementId) -> SimResult<()> {
        if self.state != GeneratorState::Suspended {
            return Ok(());
        }
        let next_inter_event = self.current_time_between.value();
        let absolute = model.now() + SimTime::new(next_inter_event.max(0.0));
        if absolute > self.current_ending_time {
            self.state = GeneratorState::Done;
            return Ok(());
        }
        self.state = GeneratorState::Running;
        self.schedule_next_event(model, me, next_inter_event)
    }

    /// `setTimeBetweenEvents(source, maxN)`: validates and replaces
    /// the current time-between source and max count. If the generator has
    /// already fired at least `maxN` events it turns off immediately.
    pub fn set_time_between_events(
        &mut self,
        model: &mut Model,
        source: Box<dyn ValueSource>,
        max_events: Option<u64>,
    ) -> SimResult<()> {
        Self::validate(max_events, source.as_ref())?;
        self.current_time_between = source;
        self.current_max_events = max_events;
        if max_events.is_some_and(|max| self.count >= max) {
            self.turn_off(model);
        }
        Ok(())
    }

    fn schedule_next_event(
        &mut self,
        model: &mut Model,
        me: ElementId,
        inter_event_time: f64,
    ) -> SimResult<()> {
        let event = model.schedule(
            Some(me),
            Box::new(move |model: &mut Model, event: Event, _message| {
                let _ = model.with_behavior::<EventGenerator, _>(me, |generator, model| {
                    generator.fire(model, me, event);
                });
            }),
            inter_event_time,
            None,
            self.event_priority,
            Some(format!("generator:{me:?}")),
        )?;
        self.next_event = event.is_scheduled().then_some(event.id());
        Ok(())
    }

    /// The generator's event action: increments the
    /// count, invokes `generate`, samples the next inter-event time, and
    /// either reschedules or turns itself off.
    fn fire(&mut self, model: &mut Model, me: ElementId, _event: Event) {
        if self.state == GeneratorState::Done {
            return;
        }
        self.count += 1;
        if let Some(mut callback) = self.generate.take() {
            callback(model, me);
            self.generate = Some(callback);
        }

        if self.current_max_events.is_some_and(|max| self.count >= max) {
            self.state = GeneratorState::Done;
            self.next_event = None;
            return;
        }

        let next_inter_event = self.current_time_between.value();
        let next_absolute = model.now() + SimTime::new(next_inter_event.max(0.0));
        if next_absolute > self.current_ending_time {
            self.state = GeneratorState::Done;
            self.next_event = None;
            return;
        }

        if self.state != GeneratorState::Suspended {
            let _ = self.schedule_next_event(model, me, next_inter_event);
        }
    }
}

impl ModelElementBehavior for EventGenerator {
    /// Replication initialization: zero the count, clear state,
    /// restore current values from the initial counterparts, and
    /// auto-start if configured.
    fn initialize(&mut self, model: &mut Model, me: ElementId) {
        self.count = 0;
        self.state = GeneratorState::NotStarted;
        self.next_event = None;
        self.current_time_until_first = self.initial_time_until_first.box_clone();
        self.current_time_between = self.initial_time_between.box_clone();
        self.current_max_events = self.initial_max_events;
        self.current_ending_time = self.initial_ending_time;

        if self.auto_start && !matches!(self.current_max_events, Some(0)) {
            let offset = self.current_time_until_first.value();
            if let Err(err) = self.turn_on(model, me, offset) {
                tracing::warn!(element = ?me, error = %err, "generator auto-start rejected");
            }
        }

        if !self.current_ending_time.is_infinite() {
            let inter_event_time = (self.current_ending_time - model.now()).as_f64();
            if inter_event_time >= 0.0 {
                let _ = model.schedule(
                    Some(me),
                    Box::new(move |model: &mut Model, _event, _message| {
                        let _ = model.with_behavior::<EventGenerator, _>(me, |generator, model| {
                            generator.turn_off(model);
                        });
                    }),
                    inter_event_time,
                    None,
                    self.event_priority,
                    Some(format!("generatorEnd:{me:?}")),
                );
            }
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
    use crate::adapters::ConstantValueSource;
    use crate::replication::ExperimentParameters;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn constant_generator(first: f64, between: f64) -> EventGenerator {
        EventGenerator::new(
            Box::new(ConstantValueSource(first)),
            Box::new(ConstantValueSource(between)),
        )
    }

    /// Manually invokes `turn_on` on another element's generator from
    /// inside its own `initialize`, once the executive is already
    /// `Initialized` — the only state in which `Model::schedule` accepts
    /// calls — and records whether it succeeded.
    struct TurnOnProbe {
        target: ElementId,
        succeeded: Rc<Cell<Option<bool>>>,
    }

    impl ModelElementBehavior for TurnOnProbe {
        fn initialize(&mut self, model: &mut Model, _me: ElementId) {
            let target = self.target;
            let outcome =
                model.with_behavior::<EventGenerator, _>(target, |gen, model| gen.turn_on(model, target, 1.0));
            self.succeeded.set(Some(matches!(outcome, Ok(Ok(())))));
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn unbounded_generator_with_zero_time_between_is_rejected_at_turn_on() {
        let mut model = Model::new("m", ".");
        let generator = constant_generator(1.0, 0.0).with_auto_start(false);
        let gen_id = model
            .add_element(model.root_id(), "gen", Box::new(generator))
            .unwrap();
        let succeeded = Rc::new(Cell::new(None));
        model
            .add_element(
                model.root_id(),
                "probe",
                Box::new(TurnOnProbe { target: gen_id, succeeded: Rc::clone(&succeeded) }),
            )
            .unwrap();

        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(10.0));
        model.simulate(params).unwrap();

        assert_eq!(succeeded.get(), Some(false));
    }

    #[test]
    fn bounded_generator_with_zero_time_between_is_allowed_at_turn_on() {
        let mut model = Model::new("m", ".");
        let generator = constant_generator(1.0, 0.0).with_max_events(3).with_auto_start(false);
        let gen_id = model
            .add_element(model.root_id(), "gen", Box::new(generator))
            .unwrap();
        let succeeded = Rc::new(Cell::new(None));
        model
            .add_element(
                model.root_id(),
                "probe",
                Box::new(TurnOnProbe { target: gen_id, succeeded: Rc::clone(&succeeded) }),
            )
            .unwrap();

        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(10.0));
        model.simulate(params).unwrap();

        assert_eq!(succeeded.get(), Some(true));
    }

    #[test]
    fn bounded_constant_generator_fires_exactly_max_events_times() {
        let mut model = Model::new("m", ".");
        let fire_times = Rc::new(RefCell::new(Vec::new()));
        let recorded = Rc::clone(&fire_times);

        let generator = constant_generator(2.0, 3.0)
            .with_max_events(4)
            .with_generate_callback(move |model, _me| {
                recorded.borrow_mut().push(model.now().as_f64());
            });
        let id = model
            .add_element(model.root_id(), "gen", Box::new(generator))
            .unwrap();

        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(100.0));
        model.simulate(params).unwrap();

        assert_eq!(*fire_times.borrow(), vec![2.0, 5.0, 8.0, 11.0]);
        assert_eq!(model.behavior_ref::<EventGenerator>(id).unwrap().event_count(), 4);
        assert_eq!(
            model.behavior_ref::<EventGenerator>(id).unwrap().state(),
            GeneratorState::Done
        );
    }

    #[test]
    fn disabling_initialization_option_suppresses_auto_start() {
        let mut model = Model::new("m", ".");
        let fired = Rc::new(Cell::new(false));
        let recorded = Rc::clone(&fired);

        let generator = constant_generator(5.0, 5.0)
            .with_max_events(10)
            .with_generate_callback(move |_model, _me| recorded.set(true));
        let id = model
            .add_element(model.root_id(), "gen", Box::new(generator))
            .unwrap();

        // Disabling the `initialization` lifecycle option means the
        // generator's `ModelElementBehavior::initialize` (and therefore its
        // auto-start) never runs this replication.
        model
            .set_element_options(
                id,
                crate::element::ElementOptions {
                    initialization: false,
                    ..Default::default()
                },
            )
            .unwrap();

        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(20.0));
        model.simulate(params).unwrap();

        assert!(!fired.get());
        assert_eq!(
            model.behavior_ref::<EventGenerator>(id).unwrap().state(),
            GeneratorState::NotStarted
        );
    }

    /// A helper element whose sole job is to schedule a suspend and a
    /// resume against another element's generator at fixed times, so the
    /// generator's own event action never has to re-enter its own behavior
    /// (which is unavailable mid-fire, since it is taken out of the
    /// model's behavior map for the duration of the call).
    struct SuspendThenResume {
        target: ElementId,
    }

    impl ModelElementBehavior for SuspendThenResume {
        fn initialize(&mut self, model: &mut Model, _me: ElementId) {
            let target = self.target;
            model
                .schedule(
                    None,
                    Box::new(move |model: &mut Model, _event, _message| {
                        let _ = model
                            .with_behavior::<EventGenerator, _>(target, |gen, model| gen.suspend(model));
                    }),
                    1.5,
                    None,
                    priority::DEFAULT,
                    None,
                )
                .unwrap();
            model
                .schedule(
                    None,
                    Box::new(move |model: &mut Model, _event, _message| {
                        let _ = model.with_behavior::<EventGenerator, _>(target, |gen, model| {
                            gen.resume(model, target)
                        });
                    }),
                    3.0,
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
    fn suspend_cancels_pending_event_and_resume_reschedules() {
        let mut model = Model::new("m", ".");
        let count = Rc::new(Cell::new(0u32));
        let recorded = Rc::clone(&count);

        let generator = constant_generator(1.0, 1.0)
            .with_generate_callback(move |_model, _me| recorded.set(recorded.get() + 1));
        let id = model
            .add_element(model.root_id(), "gen", Box::new(generator))
            .unwrap();
        model
            .add_element(model.root_id(), "controller", Box::new(SuspendThenResume { target: id }))
            .unwrap();

        // Fires at t=1. Suspended at t=1.5 (cancels the t=2 event). Resumed
        // at t=3, which samples inter-event time 1.0 and fires again at
        // t=4. The replication ends at t=4.5, before the generator's next
        // attempt (t=5) would even be inserted.
        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(4.5));
        model.simulate(params).unwrap();

        assert_eq!(count.get(), 2);
        assert_eq!(
            model.behavior_ref::<EventGenerator>(id).unwrap().state(),
            GeneratorState::Running
        );
    }
}
