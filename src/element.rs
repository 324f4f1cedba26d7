//! The model element hierarchy: a capability trait for lifecycle hooks
//! plus an arena of elements keyed by stable integer ids.

use crate::event::EventId;
use crate::model::Model;
use crate::time::SimTime;
use std::any::Any;

/// Unique, per-model identifier for a model element. Stable across the
/// element's lifetime; never reused within a model even after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub(crate) u64);

impl ElementId {
    /// The id of the root model element.
    pub const ROOT: ElementId = ElementId(0);
}

/// The current lifecycle status of a model element. Observers are
/// notified with the previous and new status on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementStatus {
    /// No lifecycle phase has touched this element yet.
    None,
    BeforeExperiment,
    BeforeReplication,
    Initialized,
    ConditionalActionRegistration,
    MonteCarlo,
    Warmup,
    Update,
    TimedUpdate,
    ReplicationEnded,
    AfterReplication,
    AfterExperiment,
    ModelElementAdded,
    ModelElementRemoved,
    RemovedFromModel,
}

/// Per-element, independently adjustable lifecycle option flags.
/// Plain bools rather than a bitflags type: these are ordinary,
/// independently-set configuration switches, not a packed representation.
#[derive(Debug, Clone, Copy)]
pub struct ElementOptions {
    pub before_experiment: bool,
    pub before_replication: bool,
    pub initialization: bool,
    pub monte_carlo: bool,
    pub replication_ended: bool,
    pub after_replication: bool,
    pub after_experiment: bool,
    pub warm_up: bool,
    pub timed_update: bool,
}

impl Default for ElementOptions {
    fn default() -> Self {
        Self {
            before_experiment: true,
            before_replication: true,
            initialization: true,
            monte_carlo: false,
            replication_ended: true,
            after_replication: true,
            after_experiment: true,
            warm_up: true,
            timed_update: true,
        }
    }
}

/// Notification sink attached while the model is not running. The
/// same shape serves two attachment points: a model-wide "status
/// observer" list (notified of every element's status change and of
/// every executive event dispatch) and a per-element "model-element
/// observer" list (notified only of that element's own status changes).
/// Both methods default to no-ops so an observer overrides only what it
/// needs.
#[allow(unused_variables)]
pub trait StatusObserver {
    /// Invoked whenever an observed element's status changes.
    fn on_change(&mut self, element: ElementId, previous: ElementStatus, new: ElementStatus) {}

    /// Invoked by the executive before and after dispatching an event
    /// (`event` is `None` at other notable transitions, e.g. replication
    /// end).
    fn on_event(&mut self, current_time: crate::time::SimTime, event: Option<&crate::event::Event>) {}
}

/// The capability trait user code implements to participate in the model
/// element lifecycle, in place of open inheritance: a vtable of lifecycle
/// callbacks rather than a base class to extend. Every method has a no-op
/// default; implementors override only the hooks they need, gated by that
/// element's [`ElementOptions`].
#[allow(unused_variables)]
pub trait ModelElementBehavior {
    /// Runs once per experiment, in pre-order, before any replication.
    fn before_experiment(&mut self, model: &mut Model, me: ElementId) {}

    /// Runs once per replication, in pre-order, before `initialize`.
    fn before_replication(&mut self, model: &mut Model, me: ElementId) {}

    /// Runs once per replication, in pre-order, after `before_replication`.
    fn initialize(&mut self, model: &mut Model, me: ElementId) {}

    /// Runs once per replication, after `initialize`: register this
    /// element's conditional actions with the model's C-phase processor.
    fn register_conditional_actions(&mut self, model: &mut Model, me: ElementId) {}

    /// Runs once per replication if `ElementOptions::monte_carlo` is set.
    fn monte_carlo(&mut self, model: &mut Model, me: ElementId) {}

    /// Runs at this element's warmup event, if it has one.
    fn warm_up(&mut self, model: &mut Model, me: ElementId) {}

    /// Runs at each firing of this element's timed-update event, if it
    /// has one and `ElementOptions::timed_update` is set.
    fn timed_update(&mut self, model: &mut Model, me: ElementId) {}

    /// Runs once per replication, in pre-order, at replication end.
    fn replication_ended(&mut self, model: &mut Model, me: ElementId) {}

    /// Runs once per replication, in pre-order, after `replication_ended`.
    fn after_replication(&mut self, model: &mut Model, me: ElementId) {}

    /// Runs once per experiment, in pre-order, after the last replication.
    fn after_experiment(&mut self, model: &mut Model, me: ElementId) {}

    /// Runs once, when this element is removed from the model.
    fn removed_from_model(&mut self, model: &mut Model, me: ElementId) {}

    /// Downcasting hook: lets [`Model::with_behavior`]/[`Model::behavior_ref`]
    /// recover a concrete type (e.g. [`crate::generator::EventGenerator`],
    /// [`crate::schedule::Schedule`]) from the type-erased behavior map.
    /// Every implementor's body is simply `self`; there is no way to
    /// provide this as a default method on a trait object (it would
    /// require `Self: Sized`, which isn't available through `dyn`).
    fn as_any(&self) -> &dyn Any;

    /// Mutable counterpart of [`ModelElementBehavior::as_any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A no-op behavior, used for elements (including the root) that only
/// participate in the tree for structural purposes.
#[derive(Default)]
pub struct NullBehavior;

impl ModelElementBehavior for NullBehavior {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Arena bookkeeping for a single model element. Owns no behavior
/// directly: behaviors live in a sibling map on [`Model`] so a behavior
/// can be taken out, invoked with `&mut Model` in scope, and put back,
/// without any interior mutability.
pub(crate) struct ElementNode {
    pub(crate) id: ElementId,
    pub(crate) name: String,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Vec<ElementId>,
    pub(crate) status: ElementStatus,
    pub(crate) options: ElementOptions,
    pub(crate) individual_warm_up_length: SimTime,
    pub(crate) timed_update_interval: SimTime,
    pub(crate) warm_up_event: Option<EventId>,
    pub(crate) timed_update_event: Option<EventId>,
    pub(crate) pre_order_left: u64,
    pub(crate) pre_order_right: u64,
    pub(crate) observers: Vec<Box<dyn StatusObserver>>,
}

impl ElementNode {
    pub(crate) fn new(id: ElementId, name: String, parent: Option<ElementId>) -> Self {
        Self {
            id,
            name,
            parent,
            children: Vec::new(),
            status: ElementStatus::None,
            options: ElementOptions::default(),
            individual_warm_up_length: SimTime::ZERO,
            timed_update_interval: SimTime::ZERO,
            warm_up_event: None,
            timed_update_event: None,
            pre_order_left: 0,
            pre_order_right: 0,
            observers: Vec::new(),
        }
    }
}
