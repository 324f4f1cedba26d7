//! The abstract iterative-process state machine, specialized by the
//! [`crate::ReplicationController`] into "replications as steps".

use crate::error::{SimError, SimResult};

/// States of the iterative process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Constructed but never initialized.
    Created,
    /// Initialized and ready for the first step.
    Initialized,
    /// At least one step has completed; ready for the next, or to end.
    StepCompleted,
    /// Finished; no further steps may run without re-initializing.
    Ended,
}

impl ProcessState {
    fn name(self) -> &'static str {
        match self {
            ProcessState::Created => "Created",
            ProcessState::Initialized => "Initialized",
            ProcessState::StepCompleted => "StepCompleted",
            ProcessState::Ended => "Ended",
        }
    }
}

/// Classifies why an iterative process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndingStatus {
    /// `end` was called before any step ran.
    NoStepsExecuted,
    /// `run` completed every step without early termination.
    CompletedAllSteps,
    /// A step exceeded its configured wall-time bound.
    ExceededExecutionTime,
    /// A step's stopping condition was met.
    MetStoppingCondition,
    /// The process ended in an incomplete or failed state.
    Unfinished,
}

impl EndingStatus {
    /// The canonical human-readable message for this status.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            EndingStatus::NoStepsExecuted => "ended before any step executed",
            EndingStatus::CompletedAllSteps => "completed all steps",
            EndingStatus::ExceededExecutionTime => "exceeded the maximum execution time",
            EndingStatus::MetStoppingCondition => "met its stopping condition",
            EndingStatus::Unfinished => "ended unfinished",
        }
    }
}

/// Base state-machine bookkeeping shared by any iterative process. The
/// replication controller embeds one of these and drives it through
/// `initialize` / `run_next` / `run` / `end` / `stop`.
#[derive(Debug)]
pub struct IterativeProcess {
    state: ProcessState,
    stop_requested: bool,
    steps_executed: u32,
    ending_status: Option<EndingStatus>,
    stopping_message: Option<String>,
}

impl Default for IterativeProcess {
    fn default() -> Self {
        Self {
            state: ProcessState::Created,
            stop_requested: false,
            steps_executed: 0,
            ending_status: None,
            stopping_message: None,
        }
    }
}

impl IterativeProcess {
    /// Creates a process in the `Created` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Number of steps executed since the last `initialize`.
    #[must_use]
    pub fn steps_executed(&self) -> u32 {
        self.steps_executed
    }

    /// The recorded ending status, if the process has ended.
    #[must_use]
    pub fn ending_status(&self) -> Option<EndingStatus> {
        self.ending_status
    }

    /// The recorded stopping message, if any.
    #[must_use]
    pub fn stopping_message(&self) -> Option<&str> {
        self.stopping_message.as_deref()
    }

    /// Transitions `Created`/`Ended` → `Initialized`, clearing stop flags
    /// and counters.
    pub fn initialize(&mut self) -> SimResult<()> {
        match self.state {
            ProcessState::Created | ProcessState::Ended => {
                self.state = ProcessState::Initialized;
                self.stop_requested = false;
                self.steps_executed = 0;
                self.ending_status = None;
                self.stopping_message = None;
                Ok(())
            }
            other => Err(illegal(other, "initialize")),
        }
    }

    /// Requests an orderly stop after the current step. Legal from any
    /// state; it only sets a flag, it is not itself a transition.
    pub fn stop(&mut self, message: impl Into<String>) {
        self.stop_requested = true;
        self.stopping_message = Some(message.into());
    }

    /// `true` if `stop` has been called since the last `initialize`.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Marks that exactly one step executed, transitioning `Initialized`/
    /// `StepCompleted` → `StepCompleted`. The caller performs the actual
    /// step logic; this only advances the state machine's bookkeeping.
    pub fn record_step(&mut self) -> SimResult<()> {
        match self.state {
            ProcessState::Initialized | ProcessState::StepCompleted => {
                self.state = ProcessState::StepCompleted;
                self.steps_executed += 1;
                Ok(())
            }
            other => Err(illegal(other, "runNext")),
        }
    }

    /// Finalizes the process, transitioning to `Ended` with the given
    /// status. Legal from any state except `Created`.
    pub fn end(&mut self, status: EndingStatus, message: Option<String>) -> SimResult<()> {
        if self.state == ProcessState::Created {
            return Err(illegal(self.state, "end"));
        }
        self.state = ProcessState::Ended;
        self.ending_status = Some(status);
        if let Some(message) = message {
            self.stopping_message = Some(message);
        } else if self.stopping_message.is_none() {
            self.stopping_message = Some(status.message().to_string());
        }
        Ok(())
    }
}

fn illegal(from: ProcessState, operation: &'static str) -> SimError {
    SimError::IllegalStateTransition {
        operation,
        from: from.name(),
    }
}
