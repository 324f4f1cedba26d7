//! Experiment parameters and the replication controller's state. The
//! controller's actual orchestration algorithm
//! (`setUpExperiment`/`runReplication`) is implemented on [`crate::Model`]
//! in `model.rs`, since it needs `&mut Model` throughout; this module
//! holds the data the algorithm operates on.

use crate::error::{SimError, SimResult};
use crate::iterative_process::IterativeProcess;
use crate::model::Model;
use crate::time::SimTime;
use std::collections::HashMap;
use std::time::Duration;

/// Experiment-level configuration: replication count, length, warmup,
/// wall-time bound, stream-control options, and experiment controls.
///
/// Constructed via [`ExperimentParameters::new`] and `with_*` builders
/// rather than public mutable fields, so the antithetic/warmup invariants
/// are checked at every mutation instead of left to the caller.
#[derive(Debug, Clone)]
pub struct ExperimentParameters {
    experiment_name: String,
    number_of_replications: u32,
    starting_replication_id: u32,
    length_of_replication: SimTime,
    length_of_warm_up: SimTime,
    max_wall_time_per_replication: Option<Duration>,
    replication_initialization_option: bool,
    reset_start_stream_option: bool,
    advance_next_substream_option: bool,
    antithetic_option: bool,
    number_of_stream_advances_before_running: u32,
    garbage_collect_after_replication: bool,
    controls: HashMap<String, String>,
}

impl Default for ExperimentParameters {
    fn default() -> Self {
        Self {
            experiment_name: "experiment".to_string(),
            number_of_replications: 1,
            starting_replication_id: 1,
            length_of_replication: SimTime::INFINITE,
            length_of_warm_up: SimTime::ZERO,
            max_wall_time_per_replication: None,
            replication_initialization_option: true,
            reset_start_stream_option: false,
            advance_next_substream_option: true,
            antithetic_option: false,
            number_of_stream_advances_before_running: 0,
            garbage_collect_after_replication: false,
            controls: HashMap::new(),
        }
    }
}

impl ExperimentParameters {
    /// Creates experiment parameters with default values.
    #[must_use]
    pub fn new(experiment_name: impl Into<String>) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            ..Self::default()
        }
    }

    /// Sets the number of replications to run. Must be `> 0`, and even if
    /// `antithetic` is (or will be) enabled.
    pub fn with_number_of_replications(mut self, n: u32) -> SimResult<Self> {
        self.validate_replication_count(n, self.antithetic_option)?;
        self.number_of_replications = n;
        Ok(self)
    }

    /// Sets the replication length (may be [`SimTime::INFINITE`]).
    #[must_use]
    pub fn with_length_of_replication(mut self, length: SimTime) -> Self {
        self.length_of_replication = length;
        self
    }

    /// Sets the warmup length. Must be `< length_of_replication` when
    /// warmup is used (non-zero).
    pub fn with_length_of_warm_up(mut self, warm_up: SimTime) -> SimResult<Self> {
        if warm_up > SimTime::ZERO && warm_up >= self.length_of_replication {
            return Err(SimError::InvalidExperimentParameter(
                "lengthOfWarmUp must be < lengthOfReplication",
            ));
        }
        self.length_of_warm_up = warm_up;
        Ok(self)
    }

    /// Sets the max wall time allowed per replication. `None` disables
    /// the check.
    #[must_use]
    pub fn with_max_wall_time_per_replication(mut self, max: Option<Duration>) -> Self {
        self.max_wall_time_per_replication = max;
        self
    }

    /// Enables or disables antithetic replication pairing. Requires an
    /// even `number_of_replications`.
    pub fn with_antithetic_option(mut self, antithetic: bool) -> SimResult<Self> {
        self.validate_replication_count(self.number_of_replications, antithetic)?;
        self.antithetic_option = antithetic;
        Ok(self)
    }

    /// Sets whether to reset to the start of each registered stream at
    /// experiment setup.
    #[must_use]
    pub fn with_reset_start_stream_option(mut self, reset: bool) -> Self {
        self.reset_start_stream_option = reset;
        self
    }

    /// Sets whether streams advance to their next substream between
    /// replications.
    #[must_use]
    pub fn with_advance_next_substream_option(mut self, advance: bool) -> Self {
        self.advance_next_substream_option = advance;
        self
    }

    /// Sets how many substream advances to perform once, before the
    /// first replication runs.
    #[must_use]
    pub fn with_number_of_stream_advances_before_running(mut self, n: u32) -> Self {
        self.number_of_stream_advances_before_running = n;
        self
    }

    /// Inserts an experiment control value, applied to the model at
    /// experiment setup via the configuration manager collaborator.
    #[must_use]
    pub fn with_control(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.controls.insert(key.into(), value.into());
        self
    }

    fn validate_replication_count(&self, n: u32, antithetic: bool) -> SimResult<()> {
        if n == 0 {
            return Err(SimError::InvalidExperimentParameter("numberOfReplications must be > 0"));
        }
        if antithetic && n % 2 != 0 {
            return Err(SimError::InvalidExperimentParameter(
                "numberOfReplications must be even when antithetic is enabled",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    #[must_use]
    pub fn number_of_replications(&self) -> u32 {
        self.number_of_replications
    }

    #[must_use]
    pub fn starting_replication_id(&self) -> u32 {
        self.starting_replication_id
    }

    #[must_use]
    pub fn length_of_replication(&self) -> SimTime {
        self.length_of_replication
    }

    #[must_use]
    pub fn length_of_warm_up(&self) -> SimTime {
        self.length_of_warm_up
    }

    #[must_use]
    pub fn max_wall_time_per_replication(&self) -> Option<Duration> {
        self.max_wall_time_per_replication
    }

    #[must_use]
    pub fn replication_initialization_option(&self) -> bool {
        self.replication_initialization_option
    }

    #[must_use]
    pub fn reset_start_stream_option(&self) -> bool {
        self.reset_start_stream_option
    }

    #[must_use]
    pub fn advance_next_substream_option(&self) -> bool {
        self.advance_next_substream_option
    }

    #[must_use]
    pub fn antithetic_option(&self) -> bool {
        self.antithetic_option
    }

    #[must_use]
    pub fn number_of_stream_advances_before_running(&self) -> u32 {
        self.number_of_stream_advances_before_running
    }

    #[must_use]
    pub fn garbage_collect_after_replication(&self) -> bool {
        self.garbage_collect_after_replication
    }

    #[must_use]
    pub fn controls(&self) -> &HashMap<String, String> {
        &self.controls
    }
}

/// Applies experiment controls to the model once, at experiment setup,
/// after parameter application.
pub trait ConfigurationManager {
    /// Invoked once per experiment with the full controls map.
    fn configure(&mut self, model: &mut Model, controls: &HashMap<String, String>);
}

/// Specializes [`IterativeProcess`] with step = "one replication". Owns
/// only the state-machine bookkeeping; the orchestration algorithm
/// (`setUpExperiment`/`runReplication`) lives on [`Model`] because it
/// needs `&mut Model` throughout.
pub struct ReplicationController {
    pub(crate) process: IterativeProcess,
    pub(crate) current_replication_number: u32,
    pub(crate) configuration_manager: Option<Box<dyn ConfigurationManager>>,
    pub(crate) warned_infinite_replication: bool,
}

impl Default for ReplicationController {
    fn default() -> Self {
        Self {
            process: IterativeProcess::new(),
            current_replication_number: 0,
            configuration_manager: None,
            warned_infinite_replication: false,
        }
    }
}

impl ReplicationController {
    /// Creates a controller in the `Created` state, with no replications
    /// run yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current replication number, in `[0, numberOfReplications]`; 0
    /// before the first replication has started.
    #[must_use]
    pub fn current_replication_number(&self) -> u32 {
        self.current_replication_number
    }

    /// Attaches a configuration manager, invoked once at experiment setup.
    pub fn set_configuration_manager(&mut self, manager: Box<dyn ConfigurationManager>) {
        self.configuration_manager = Some(manager);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_are_valid() {
        let params = ExperimentParameters::default();
        assert_eq!(params.number_of_replications(), 1);
        assert!(!params.antithetic_option());
    }

    #[test]
    fn odd_replication_count_with_antithetic_is_rejected() {
        let params = ExperimentParameters::new("exp").with_number_of_replications(4).unwrap();
        let result = params.with_antithetic_option(true);
        assert!(result.is_ok());

        let odd = ExperimentParameters::new("exp").with_number_of_replications(3).unwrap();
        let result = odd.with_antithetic_option(true);
        assert!(result.is_err());
    }

    #[test]
    fn zero_replications_is_rejected() {
        let result = ExperimentParameters::new("exp").with_number_of_replications(0);
        assert!(result.is_err());
    }

    #[test]
    fn warm_up_must_be_less_than_replication_length() {
        let params = ExperimentParameters::new("exp").with_length_of_replication(SimTime::new(100.0));
        assert!(params.clone().with_length_of_warm_up(SimTime::new(50.0)).is_ok());
        assert!(params.with_length_of_warm_up(SimTime::new(200.0)).is_err());
    }
}
