//! # desk-sim: a general-purpose discrete-event simulation kernel
//!
//! This crate provides the executive, replication controller, model
//! element hierarchy, and event-generation facilities of a discrete-event
//! simulation (DES) kernel, independent of any particular domain model.
//! Applications build a tree of [`ModelElementBehavior`] implementors on
//! top of [`Model`] and let the kernel drive their lifecycle through one
//! or many replications.

#![cfg_attr(test, allow(clippy::float_cmp))] // Test assertions use exact float comparisons
#![cfg_attr(test, allow(clippy::similar_names))]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Model                                   │
//! │  ┌─────────────┐   ┌──────────────┐   ┌─────────────────────┐   │
//! │  │ Executive   │   │ Conditional  │   │ Replication         │   │
//! │  │ (calendar,  │   │ Action       │   │ Controller          │   │
//! │  │  dispatch)  │   │ Processor    │   │ (iterative process) │   │
//! │  └─────────────┘   └──────────────┘   └─────────────────────┘   │
//! │                                                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐ │
//! │  │              Model Element Hierarchy                         │ │
//! │  │   EventGenerator    Schedule    (user-defined behaviors)     │ │
//! │  └─────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use desk_sim::{ExperimentParameters, Model};
//!
//! let params = ExperimentParameters::new("demo")
//!     .with_length_of_replication(100.0.into());
//! let mut model = Model::new("demo", "demo-output");
//! model.simulate(params)?;
//! ```
//!
//! ## Key Concepts
//!
//! - **[`Model`]**: owns the element arena, the executive, and the
//!   conditional-action processor, and drives the main dispatch loop.
//! - **[`Executive`]**: the event calendar and the scheduling state
//!   machine.
//! - **[`ModelElementBehavior`]**: the capability trait user code
//!   implements to participate in the replication lifecycle.
//! - **[`EventGenerator`]** / **[`Schedule`]**: ready-made behaviors for
//!   recurring arrivals and fixed-pattern calendars.
//! - **[`ExperimentParameters`]**: the knobs of a multi-replication
//!   experiment (length, warm-up, antithetic pairing, wall-clock bound).

pub mod adapters;
pub mod calendar;
pub mod conditional;
pub mod element;
pub mod error;
pub mod event;
pub mod executive;
pub mod generator;
pub mod iterative_process;
pub mod model;
pub mod replication;
pub mod schedule;
pub mod time;

pub use adapters::{
    ConstantValueSource, ManualWallClock, RandomStreamProvider, StreamProvider, SystemWallClock,
    UniformValueSource, ValueSource, WallClock,
};
pub use calendar::EventCalendar;
pub use conditional::{ConditionalActionProcessor, DEFAULT_MAX_SCANS};
pub use element::{
    ElementId, ElementOptions, ElementStatus, ModelElementBehavior, NullBehavior, StatusObserver,
};
pub use error::{SimError, SimResult};
pub use event::{Event, EventAction, EventId, priority};
pub use executive::{Executive, ExecutiveState};
pub use generator::{EventGenerator, GenerateCallback, GeneratorState};
pub use iterative_process::{EndingStatus, IterativeProcess, ProcessState};
pub use model::Model;
pub use replication::{ConfigurationManager, ExperimentParameters, ReplicationController};
pub use schedule::{
    Schedule, ScheduleChangeListener, ScheduleData, ScheduleItem, ScheduleItemData, ScheduleState,
};
pub use time::SimTime;
