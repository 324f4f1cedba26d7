//! The model: owns the element arena, the executive, the conditional-action
//! processor, and the stream provider, and drives the main dispatch loop
//! and the replication lifecycle.
//!
//! Behaviors live in a map separate from [`ElementNode`] bookkeeping so a
//! behavior can be taken out (owned), invoked with `&mut Model` in scope,
//! and put back — the same pattern the executive's dispatch loop uses for
//! a popped calendar entry's action (see `executive.rs`).

use crate::adapters::{RandomStreamProvider, StreamProvider, SystemWallClock, WallClock};
use crate::element::{
    ElementId, ElementNode, ElementOptions, ElementStatus, ModelElementBehavior, NullBehavior,
    StatusObserver,
};
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventAction, EventId, priority};
use crate::executive::{Executive, ExecutiveState};
use crate::conditional::ConditionalActionProcessor;
use crate::iterative_process::EndingStatus;
use crate::replication::{ExperimentParameters, ReplicationController};
use crate::time::SimTime;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const DEFAULT_SEED: u64 = 0x5EED;

/// Recovers a human-readable message from a caught panic payload, the same
/// `&str` / `String` downcast the standard panic hook itself uses.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "event action panicked with a non-string payload".to_string()
    }
}

/// The simulation model: a tree of elements, the executive that dispatches
/// their events, and the controller that steps them through replications.
pub struct Model {
    simulation_name: String,
    output_path: String,
    elements: HashMap<ElementId, ElementNode>,
    behaviors: HashMap<ElementId, Box<dyn ModelElementBehavior>>,
    name_index: HashMap<String, ElementId>,
    next_element_id: u64,
    root_id: ElementId,
    executive: Executive,
    conditional: ConditionalActionProcessor,
    stream: Rc<RefCell<dyn StreamProvider>>,
    experiment: ExperimentParameters,
    replication: ReplicationController,
    is_running: bool,
    status_observers: Vec<Box<dyn StatusObserver>>,
}

impl Model {
    /// Creates an empty model with a single root element, a system wall
    /// clock, and a deterministically-seeded stream provider.
    #[must_use]
    pub fn new(simulation_name: impl Into<String>, output_path: impl Into<String>) -> Self {
        let root_id = ElementId::ROOT;
        let mut elements = HashMap::new();
        elements.insert(root_id, ElementNode::new(root_id, "root".to_string(), None));

        let mut behaviors: HashMap<ElementId, Box<dyn ModelElementBehavior>> = HashMap::new();
        behaviors.insert(root_id, Box::new(NullBehavior));

        let mut name_index = HashMap::new();
        name_index.insert("root".to_string(), root_id);

        Self {
            simulation_name: simulation_name.into(),
            output_path: output_path.into(),
            elements,
            behaviors,
            name_index,
            next_element_id: 1,
            root_id,
            executive: Executive::new(Box::new(SystemWallClock::new())),
            conditional: ConditionalActionProcessor::new(),
            stream: Rc::new(RefCell::new(RandomStreamProvider::new(DEFAULT_SEED))),
            experiment: ExperimentParameters::default(),
            replication: ReplicationController::new(),
            is_running: false,
            status_observers: Vec::new(),
        }
    }

    /// Replaces the stream provider's seed. Intended for tests and for
    /// callers that want a reproducible run distinct from the default.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.stream = Rc::new(RefCell::new(RandomStreamProvider::new(seed)));
        self
    }

    /// Replaces the executive's wall clock, e.g. with a manual clock in
    /// tests that exercise the max-wall-time path deterministically.
    #[must_use]
    pub fn with_wall_clock(mut self, wall_clock: Box<dyn WallClock>) -> Self {
        self.executive = Executive::new(wall_clock);
        self
    }

    #[must_use]
    pub fn simulation_name(&self) -> &str {
        &self.simulation_name
    }

    #[must_use]
    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    #[must_use]
    pub fn root_id(&self) -> ElementId {
        self.root_id
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    #[must_use]
    pub fn executive_state(&self) -> ExecutiveState {
        self.executive.state()
    }

    /// Count of events dispatched so far in the current replication.
    /// Strictly increases across executions within a replication; resets
    /// to zero at every `Executive::initialize`.
    #[must_use]
    pub fn events_executed(&self) -> u64 {
        self.executive.events_executed()
    }

    /// The shared stream provider, for model elements that need their own
    /// [`crate::adapters::ValueSource`] handle onto it.
    #[must_use]
    pub fn stream(&self) -> Rc<RefCell<dyn StreamProvider>> {
        Rc::clone(&self.stream)
    }

    #[must_use]
    pub fn experiment(&self) -> &ExperimentParameters {
        &self.experiment
    }

    #[must_use]
    pub fn current_replication_number(&self) -> u32 {
        self.replication.current_replication_number()
    }

    /// The experiment's recorded ending status, once [`Model::simulate`]
    /// has returned. External reporters read this (and
    /// [`Model::stopping_message`]) to present why the run ended.
    #[must_use]
    pub fn ending_status(&self) -> Option<EndingStatus> {
        self.replication.process.ending_status()
    }

    /// The human-readable reason the experiment ended, if it has.
    #[must_use]
    pub fn stopping_message(&self) -> Option<&str> {
        self.replication.process.stopping_message()
    }

    /// Attaches a model-wide status observer, notified of every element's
    /// status change and every executive event dispatch.
    pub fn add_status_observer(&mut self, observer: Box<dyn StatusObserver>) {
        self.status_observers.push(observer);
    }

    /// Attaches an observer to a single element, notified only of that
    /// element's own status changes.
    pub fn add_element_observer(
        &mut self,
        id: ElementId,
        observer: Box<dyn StatusObserver>,
    ) -> SimResult<()> {
        let node = self
            .elements
            .get_mut(&id)
            .ok_or(SimError::InvalidElementName(format!("{id:?}")))?;
        node.observers.push(observer);
        Ok(())
    }

    // ---- element tree ----

    /// Adds a new element under `parent`, owning `behavior`. Rejects dot
    /// characters and duplicate names, and rejects mutation while the
    /// model is running.
    pub fn add_element(
        &mut self,
        parent: ElementId,
        name: impl Into<String>,
        behavior: Box<dyn ModelElementBehavior>,
    ) -> SimResult<ElementId> {
        if self.is_running {
            return Err(SimError::ElementMutationWhileRunning);
        }
        let name = name.into();
        if name.contains('.') {
            return Err(SimError::InvalidElementName(name));
        }
        if self.name_index.contains_key(&name) {
            return Err(SimError::DuplicateElementName(name));
        }
        if !self.elements.contains_key(&parent) {
            return Err(SimError::InvalidElementName(format!(
                "parent {parent:?} does not exist"
            )));
        }

        let id = ElementId(self.next_element_id);
        self.next_element_id += 1;

        self.name_index.insert(name.clone(), id);
        self.elements
            .insert(id, ElementNode::new(id, name, Some(parent)));
        self.behaviors.insert(id, behavior);
        if let Some(parent_node) = self.elements.get_mut(&parent) {
            parent_node.children.push(id);
        }

        self.recompute_pre_order();
        self.set_element_status(id, ElementStatus::ModelElementAdded);
        Ok(id)
    }

    /// Removes an element and its entire subtree, invoking
    /// `removed_from_model` on each in pre-order, then detaching it from
    /// its parent. The root element cannot be removed.
    pub fn remove_element(&mut self, id: ElementId) -> SimResult<()> {
        if self.is_running {
            return Err(SimError::ElementMutationWhileRunning);
        }
        if id == self.root_id {
            return Err(SimError::IllegalStateTransition {
                operation: "removeElement",
                from: "Root",
            });
        }
        if !self.elements.contains_key(&id) {
            return Err(SimError::IllegalStateTransition {
                operation: "removeElement",
                from: "NotInModel",
            });
        }

        let subtree = self.subtree_ids(id);

        for &descendant in &subtree {
            if let Some(mut behavior) = self.behaviors.remove(&descendant) {
                behavior.removed_from_model(self, descendant);
            }
            self.set_element_status(descendant, ElementStatus::RemovedFromModel);

            let events_to_cancel: Vec<EventId> = self
                .elements
                .get(&descendant)
                .into_iter()
                .flat_map(|n| [n.warm_up_event, n.timed_update_event])
                .flatten()
                .collect();
            for event_id in events_to_cancel {
                let _ = self.executive.cancel(event_id);
            }
        }

        let parent_id = self.elements.get(&id).and_then(|n| n.parent);
        if let Some(parent_id) = parent_id {
            if let Some(parent_node) = self.elements.get_mut(&parent_id) {
                parent_node.children.retain(|&c| c != id);
            }
        }

        for &descendant in &subtree {
            if let Some(node) = self.elements.remove(&descendant) {
                self.name_index.remove(&node.name);
            }
        }

        self.recompute_pre_order();
        Ok(())
    }

    /// Looks up an element by its unique name.
    #[must_use]
    pub fn find_element(&self, name: &str) -> Option<ElementId> {
        self.name_index.get(name).copied()
    }

    #[must_use]
    pub fn element_name(&self, id: ElementId) -> Option<&str> {
        self.elements.get(&id).map(|n| n.name.as_str())
    }

    #[must_use]
    pub fn element_parent(&self, id: ElementId) -> Option<ElementId> {
        self.elements.get(&id).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn element_children(&self, id: ElementId) -> &[ElementId] {
        self.elements
            .get(&id)
            .map_or(&[][..], |n| n.children.as_slice())
    }

    #[must_use]
    pub fn element_status(&self, id: ElementId) -> Option<ElementStatus> {
        self.elements.get(&id).map(|n| n.status)
    }

    /// Replaces an element's lifecycle option flags.
    pub fn set_element_options(&mut self, id: ElementId, options: ElementOptions) -> SimResult<()> {
        let node = self
            .elements
            .get_mut(&id)
            .ok_or(SimError::InvalidElementName(format!("{id:?}")))?;
        node.options = options;
        Ok(())
    }

    /// Sets an element's individual warmup length, scheduled as its own
    /// warmup event the next time a replication starts. A positive length
    /// switches the element off the experiment-wide warmup (`warmUpOption`
    /// becomes `false`, so [`Model::run_warm_up`]'s global phase skips it);
    /// setting it back to zero re-enables inheriting the parent/experiment
    /// warmup.
    pub fn set_individual_warm_up_length(&mut self, id: ElementId, length: SimTime) -> SimResult<()> {
        let node = self
            .elements
            .get_mut(&id)
            .ok_or(SimError::InvalidElementName(format!("{id:?}")))?;
        node.individual_warm_up_length = length;
        node.options.warm_up = length == SimTime::ZERO;
        Ok(())
    }

    /// Sets an element's timed-update interval; zero disables it.
    pub fn set_timed_update_interval(&mut self, id: ElementId, interval: SimTime) -> SimResult<()> {
        let node = self
            .elements
            .get_mut(&id)
            .ok_or(SimError::InvalidElementName(format!("{id:?}")))?;
        node.timed_update_interval = interval;
        Ok(())
    }

    /// Read-only downcast onto a concrete behavior type, e.g. to inspect an
    /// [`crate::generator::EventGenerator`]'s current state or an
    /// [`crate::schedule::Schedule`]'s item list without needing `&mut
    /// Model`.
    #[must_use]
    pub fn behavior_ref<B: ModelElementBehavior + 'static>(&self, id: ElementId) -> Option<&B> {
        self.behaviors.get(&id)?.as_any().downcast_ref::<B>()
    }

    /// Invokes `f` with a downcast `&mut B` and `&mut Model` both in scope,
    /// by temporarily removing the behavior from its map (the same
    /// take-out/put-back pattern [`Model::for_each_element_in_preorder`]
    /// uses), so generator/schedule operations like `turnOn`/`suspend` or
    /// `scheduleStart` can call back into `Model::schedule` while mutating
    /// their own state.
    pub fn with_behavior<B, R>(
        &mut self,
        id: ElementId,
        f: impl FnOnce(&mut B, &mut Model) -> R,
    ) -> SimResult<R>
    where
        B: ModelElementBehavior + 'static,
    {
        let mut behavior = self
            .behaviors
            .remove(&id)
            .ok_or(SimError::InvalidElementName(format!("{id:?}")))?;
        let result = behavior
            .as_any_mut()
            .downcast_mut::<B>()
            .map(|concrete| f(concrete, self));
        self.behaviors.insert(id, behavior);
        result.ok_or_else(|| {
            SimError::InvalidElementName(format!("{id:?} is not a {}", std::any::type_name::<B>()))
        })
    }

    // ---- scheduling facade ----

    /// Current simulated time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.executive.now()
    }

    /// Schedules `action` to fire `inter_event_time` ticks from now.
    #[allow(clippy::too_many_arguments)]
    pub fn schedule(
        &mut self,
        source: Option<ElementId>,
        action: EventAction,
        inter_event_time: f64,
        message: Option<Box<dyn std::any::Any>>,
        event_priority: i32,
        name: Option<String>,
    ) -> SimResult<Event> {
        self.executive
            .schedule(source, action, inter_event_time, message, event_priority, name)
    }

    /// Cancels a previously scheduled event.
    pub fn cancel(&mut self, id: EventId) -> SimResult<()> {
        self.executive.cancel(id)
    }

    // ---- experiment / replication orchestration ----

    /// Configures the experiment, resets the replication controller, and
    /// runs the once-per-experiment `before_experiment` phase: parameters,
    /// stream reset, `beforeExperiment`, then controls.
    pub fn set_up_experiment(&mut self, params: ExperimentParameters) -> SimResult<()> {
        self.experiment = params;
        self.replication.process.initialize()?;
        self.replication.current_replication_number = 0;
        self.replication.warned_infinite_replication = false;

        if self.experiment.reset_start_stream_option() {
            self.stream.borrow_mut().reset_start_stream();
        }
        let advances = self.experiment.number_of_stream_advances_before_running();
        if advances > 0 {
            self.stream.borrow_mut().advance_substreams(advances);
        }

        if self.experiment.length_of_replication().is_infinite()
            && self.experiment.max_wall_time_per_replication().is_none()
            && !self.replication.warned_infinite_replication
        {
            tracing::warn!(
                experiment = %self.experiment.experiment_name(),
                "experiment has an infinite replication length and no max wall time per replication"
            );
            self.replication.warned_infinite_replication = true;
        }

        self.run_before_experiment();

        let controls = self.experiment.controls().clone();
        if let Some(mut manager) = self.replication.configuration_manager.take() {
            manager.configure(self, &controls);
            self.replication.configuration_manager = Some(manager);
        }

        Ok(())
    }

    /// `true` if another replication remains to run.
    #[must_use]
    pub fn has_next_replication(&self) -> bool {
        self.replication.current_replication_number < self.experiment.number_of_replications()
    }

    /// Runs the next replication end-to-end: antithetic/substream stream
    /// control, executive re-initialization, the per-replication lifecycle
    /// phases, the main dispatch loop, and the after-replication phases.
    pub fn run_next_replication(&mut self) -> SimResult<()> {
        if !self.has_next_replication() {
            return Err(SimError::IllegalStateTransition {
                operation: "runNextReplication",
                from: "NoReplicationsRemaining",
            });
        }
        self.replication.current_replication_number += 1;
        let replication_number = self.replication.current_replication_number;

        // Antithetic rule: even replications reset to the current
        // sub-stream (replaying it with the antithetic transform on) so
        // they pair with the preceding odd replication; odd replications
        // from the third on advance to a fresh sub-stream with the
        // transform off. This takes over sub-stream advancement entirely,
        // overriding `advance_next_substream_option` for the duration of
        // the experiment.
        if self.experiment.antithetic_option() {
            let mut stream = self.stream.borrow_mut();
            if replication_number % 2 == 0 {
                stream.reset_start_substream();
                stream.set_antithetic(true);
            } else {
                stream.set_antithetic(false);
                if replication_number >= 3 {
                    stream.advance_to_next_substream();
                }
            }
        } else if self.experiment.advance_next_substream_option() && replication_number > 1 {
            self.stream.borrow_mut().advance_to_next_substream();
        }

        self.executive.initialize(
            self.experiment.length_of_replication(),
            self.experiment.max_wall_time_per_replication(),
        );
        self.conditional.clear();
        self.is_running = true;

        // `beforeReplication` runs before `initialize` (open question,
        // resolved in favor of source order): elements see pre-replication
        // setup hooks before their own state is brought up.
        self.run_before_replication();
        self.run_initialize();
        self.run_register_conditional_actions();
        self.run_monte_carlo();

        self.schedule_warm_up_events()?;
        self.schedule_timed_update_events()?;

        if !self.experiment.length_of_replication().is_infinite() {
            self.executive
                .schedule_end_of_replication(Box::new(|_, _, _| {}), self.experiment.length_of_replication())?;
        }

        let loop_result = self.dispatch_loop();
        self.is_running = false;
        loop_result?;

        self.run_replication_ended();
        self.run_after_replication();
        self.replication.process.record_step()?;

        if self.experiment.garbage_collect_after_replication() {
            tracing::debug!(replication = replication_number, "replication garbage collection requested");
        }

        Ok(())
    }

    /// Runs every configured replication, then the once-per-experiment
    /// `after_experiment` phase.
    pub fn simulate(&mut self, params: ExperimentParameters) -> SimResult<()> {
        self.set_up_experiment(params)?;

        while self.has_next_replication() && !self.replication.process.is_stop_requested() {
            if let Err(err) = self.run_next_replication() {
                // A wall-time timeout gets its own ending status; every
                // other replication failure (dispatch panic, C-phase scan
                // guard, ...) is classified `Unfinished`.
                let status = if matches!(err, SimError::ExceededExecutionTime) {
                    EndingStatus::ExceededExecutionTime
                } else {
                    EndingStatus::Unfinished
                };
                self.replication.process.end(status, Some(err.to_string()))?;
                return Err(err);
            }
        }

        let status = if self.replication.process.is_stop_requested() {
            EndingStatus::MetStoppingCondition
        } else {
            EndingStatus::CompletedAllSteps
        };
        self.replication.process.end(status, None)?;
        self.run_after_experiment();
        Ok(())
    }

    /// Requests an orderly stop: the current replication finishes, but no
    /// further replication starts.
    pub fn stop_experiment(&mut self, message: impl Into<String>) {
        self.replication.process.stop(message);
    }

    /// Attaches a configuration manager, invoked once at experiment setup
    /// with the experiment's controls map.
    pub fn set_configuration_manager(
        &mut self,
        manager: Box<dyn crate::replication::ConfigurationManager>,
    ) {
        self.replication.set_configuration_manager(manager);
    }

    // ---- main dispatch loop ----

    /// Pops and dispatches calendar entries until the calendar is empty or
    /// the end-of-replication event fires. The conditional-action C-phase
    /// runs only once the calendar's next entry is strictly later than the
    /// time that just finished (or nothing remains): two events at the
    /// same instant do not get a scan between them, only after the last of
    /// them.
    fn dispatch_loop(&mut self) -> SimResult<()> {
        loop {
            self.executive.check_wall_time()?;

            let Some(popped) = self.executive.pop_next() else {
                break;
            };

            let mut is_end_replication = false;
            if popped.was_live {
                let event = popped.event;
                self.executive.advance_time_to(event.time());
                self.executive.set_state(ExecutiveState::BeforeEvent);
                self.notify_event_observers(Some(&event));

                is_end_replication = self.executive.end_replication_event_id() == Some(event.id());
                self.dispatch_action(popped.action, event.clone(), popped.message)?;

                self.executive.increment_events_executed();
                self.executive.set_state(ExecutiveState::AfterEvent);
                self.notify_event_observers(Some(&event));
            }

            // A cancelled event never advances current time, so the
            // C-phase trigger compares against whatever time the executive
            // is already at, not the popped event's own time.
            let runs_now = self.executive.peek_time().is_none_or(|next| next > self.executive.now());
            if runs_now {
                let conditional = std::mem::take(&mut self.conditional);
                let result = conditional.run(self);
                self.conditional = conditional;
                result?;
            }

            if is_end_replication {
                break;
            }
        }
        self.executive.set_state(ExecutiveState::AfterExecution);
        Ok(())
    }

    /// Invokes `action`, converting a panic into a logged
    /// [`SimError::DispatchFailure`] carrying contextual fields (event
    /// id/time, scheduling element name, replication number) instead of
    /// letting it unwind raw through the dispatch loop.
    /// The kernel does not attempt to recover: the error propagates out of
    /// `simulate`/`run_next_replication`, which already ends the
    /// replication controller with `EndingStatus::Unfinished`.
    fn dispatch_action(
        &mut self,
        action: EventAction,
        event: Event,
        message: Option<Box<dyn std::any::Any>>,
    ) -> SimResult<()> {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            action(&mut *self, event.clone(), message);
        }));

        match outcome {
            Ok(()) => Ok(()),
            Err(payload) => {
                let reason = panic_message(&*payload);
                let element_name = event
                    .source()
                    .and_then(|id| self.element_name(id))
                    .map(str::to_string);
                let replication = self.replication.current_replication_number;
                let error = SimError::DispatchFailure {
                    event_id: event.id(),
                    event_time: event.time().as_f64(),
                    element_name,
                    replication,
                    reason,
                };
                tracing::error!(
                    event_id = ?event.id(),
                    time = event.time().as_f64(),
                    element = ?event.source(),
                    replication,
                    "event action failed: {error}"
                );
                Err(error)
            }
        }
    }

    fn notify_event_observers(&mut self, event: Option<&Event>) {
        let current_time = self.executive.now();
        for observer in &mut self.status_observers {
            observer.on_event(current_time, event);
        }
    }

    // ---- lifecycle phase dispatch ----

    fn for_each_element_in_preorder<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Model, ElementId, &mut dyn ModelElementBehavior),
    {
        let ids = self.preorder_ids();
        for id in ids {
            let Some(mut behavior) = self.behaviors.remove(&id) else {
                continue;
            };
            f(self, id, behavior.as_mut());
            self.behaviors.insert(id, behavior);
        }
    }

    fn run_phase<G, H>(&mut self, status: ElementStatus, gate: G, hook: H)
    where
        G: Fn(&ElementOptions) -> bool,
        H: Fn(&mut dyn ModelElementBehavior, &mut Model, ElementId),
    {
        self.for_each_element_in_preorder(|model, id, behavior| {
            let enabled = model.elements.get(&id).is_some_and(|n| gate(&n.options));
            if enabled {
                hook(behavior, model, id);
                model.set_element_status(id, status);
            }
        });
    }

    fn run_before_experiment(&mut self) {
        self.run_phase(ElementStatus::BeforeExperiment, |o| o.before_experiment, |b, m, id| {
            b.before_experiment(m, id);
        });
    }

    fn run_before_replication(&mut self) {
        self.run_phase(ElementStatus::BeforeReplication, |o| o.before_replication, |b, m, id| {
            b.before_replication(m, id);
        });
    }

    fn run_initialize(&mut self) {
        self.run_phase(ElementStatus::Initialized, |o| o.initialization, |b, m, id| {
            b.initialize(m, id);
        });
    }

    fn run_register_conditional_actions(&mut self) {
        self.run_phase(ElementStatus::ConditionalActionRegistration, |_| true, |b, m, id| {
            b.register_conditional_actions(m, id);
        });
    }

    fn run_monte_carlo(&mut self) {
        self.run_phase(ElementStatus::MonteCarlo, |o| o.monte_carlo, |b, m, id| {
            b.monte_carlo(m, id);
        });
    }

    fn run_replication_ended(&mut self) {
        self.run_phase(ElementStatus::ReplicationEnded, |o| o.replication_ended, |b, m, id| {
            b.replication_ended(m, id);
        });
    }

    fn run_after_replication(&mut self) {
        self.run_phase(ElementStatus::AfterReplication, |o| o.after_replication, |b, m, id| {
            b.after_replication(m, id);
        });
    }

    fn run_after_experiment(&mut self) {
        self.run_phase(ElementStatus::AfterExperiment, |o| o.after_experiment, |b, m, id| {
            b.after_experiment(m, id);
        });
    }

    fn run_warm_up(&mut self) {
        self.run_phase(ElementStatus::Warmup, |o| o.warm_up, |b, m, id| {
            b.warm_up(m, id);
        });
    }

    fn run_warm_up_for(&mut self, id: ElementId) {
        if let Some(mut behavior) = self.behaviors.remove(&id) {
            behavior.warm_up(self, id);
            self.behaviors.insert(id, behavior);
            self.set_element_status(id, ElementStatus::Warmup);
        }
    }

    fn run_timed_update_for(&mut self, id: ElementId) {
        if let Some(mut behavior) = self.behaviors.remove(&id) {
            behavior.timed_update(self, id);
            self.behaviors.insert(id, behavior);
            self.set_element_status(id, ElementStatus::TimedUpdate);
        }
    }

    fn schedule_warm_up_events(&mut self) -> SimResult<()> {
        let length = self.experiment.length_of_warm_up();
        if length > SimTime::ZERO {
            let action: EventAction = Box::new(|model: &mut Model, _event, _message| {
                model.run_warm_up();
            });
            self.executive
                .schedule(None, action, length.as_f64(), None, priority::WARMUP, Some("warmUp".to_string()))?;
        }

        for id in self.preorder_ids() {
            let individual_length = self
                .elements
                .get(&id)
                .map(|n| n.individual_warm_up_length)
                .unwrap_or(SimTime::ZERO);
            if individual_length > SimTime::ZERO {
                let event = self.executive.schedule(
                    Some(id),
                    Box::new(move |model: &mut Model, _event, _message| {
                        model.run_warm_up_for(id);
                    }),
                    individual_length.as_f64(),
                    None,
                    priority::WARMUP,
                    Some(format!("warmUp:{id:?}")),
                )?;
                if let Some(node) = self.elements.get_mut(&id) {
                    node.warm_up_event = Some(event.id());
                }
            }
        }
        Ok(())
    }

    fn schedule_timed_update_events(&mut self) -> SimResult<()> {
        for id in self.preorder_ids() {
            let (enabled, interval) = match self.elements.get(&id) {
                Some(n) => (n.options.timed_update, n.timed_update_interval),
                None => continue,
            };
            if enabled && interval > SimTime::ZERO {
                self.schedule_next_timed_update(id, interval)?;
            }
        }
        Ok(())
    }

    fn schedule_next_timed_update(&mut self, id: ElementId, interval: SimTime) -> SimResult<()> {
        let event = self.executive.schedule(
            Some(id),
            Box::new(move |model: &mut Model, _event, _message| {
                model.run_timed_update_for(id);
                let _ = model.schedule_next_timed_update(id, interval);
            }),
            interval.as_f64(),
            None,
            priority::TIMED_UPDATE,
            Some(format!("timedUpdate:{id:?}")),
        )?;
        if let Some(node) = self.elements.get_mut(&id) {
            node.timed_update_event = Some(event.id());
        }
        Ok(())
    }

    fn set_element_status(&mut self, id: ElementId, new: ElementStatus) {
        let Some(previous) = self.elements.get_mut(&id).map(|n| {
            let previous = n.status;
            n.status = new;
            previous
        }) else {
            return;
        };
        if let Some(node) = self.elements.get_mut(&id) {
            for observer in &mut node.observers {
                observer.on_change(id, previous, new);
            }
        }
        for observer in &mut self.status_observers {
            observer.on_change(id, previous, new);
        }
    }

    // ---- element tree traversal helpers ----

    fn preorder_ids(&self) -> Vec<ElementId> {
        let mut result = Vec::new();
        let mut stack = vec![self.root_id];
        while let Some(id) = stack.pop() {
            result.push(id);
            if let Some(node) = self.elements.get(&id) {
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        result
    }

    fn subtree_ids(&self, root: ElementId) -> Vec<ElementId> {
        let mut result = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            result.push(id);
            if let Some(node) = self.elements.get(&id) {
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        result
    }

    /// Recomputes the nested-set `(pre_order_left, pre_order_right)` bounds
    /// for every element, so ancestor/descendant membership can later be
    /// tested without a tree walk (Design Notes: arena-of-elements keyed by
    /// stable ids).
    fn recompute_pre_order(&mut self) {
        let root = self.root_id;
        let mut counter: u64 = 0;
        self.assign_pre_order(root, &mut counter);
    }

    fn assign_pre_order(&mut self, id: ElementId, counter: &mut u64) {
        *counter += 1;
        if let Some(node) = self.elements.get_mut(&id) {
            node.pre_order_left = *counter;
        }
        let children = self
            .elements
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.assign_pre_order(child, counter);
        }
        *counter += 1;
        if let Some(node) = self.elements.get_mut(&id) {
            node.pre_order_right = *counter;
        }
    }
}
