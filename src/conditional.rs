//! The conditional-action ("C-phase") processor: a bounded, ordered
//! registry of predicate/action pairs rescanned after every event until a
//! full scan changes nothing.

use crate::error::{SimError, SimResult};
use crate::model::Model;

/// Default guard against infinite conditional-action cycling.
pub const DEFAULT_MAX_SCANS: u32 = 1_000;

type Predicate = Box<dyn Fn(&Model) -> bool>;
type ConditionalAction = Box<dyn Fn(&mut Model)>;

struct Registration {
    priority: i32,
    predicate: Predicate,
    action: ConditionalAction,
}

/// A bounded, ordered registry of `(predicate, action)` pairs, repeatedly
/// scanned after each event dispatch until a full scan fires nothing.
pub struct ConditionalActionProcessor {
    registrations: Vec<Registration>,
    max_scans: Option<u32>,
}

impl Default for ConditionalActionProcessor {
    fn default() -> Self {
        Self {
            registrations: Vec::new(),
            max_scans: Some(DEFAULT_MAX_SCANS),
        }
    }
}

impl ConditionalActionProcessor {
    /// Creates an empty processor with the default max-scan guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `(predicate, action)` pair. Lower `priority` scans
    /// first within a pass.
    pub fn register(
        &mut self,
        priority: i32,
        predicate: impl Fn(&Model) -> bool + 'static,
        action: impl Fn(&mut Model) + 'static,
    ) {
        self.registrations.push(Registration {
            priority,
            predicate: Box::new(predicate),
            action: Box::new(action),
        });
        self.registrations.sort_by_key(|r| r.priority);
    }

    /// Removes all registrations, e.g. at replication initialization.
    pub fn clear(&mut self) {
        self.registrations.clear();
    }

    /// Sets the max-scan guard. `None` disables the guard.
    pub fn set_max_scans(&mut self, max_scans: Option<u32>) {
        self.max_scans = max_scans;
    }

    /// Repeatedly scans all registered pairs, executing the action for
    /// each whose predicate currently holds, until a full scan fires
    /// nothing. Fails with [`SimError::TooManyConditionalScans`] if the
    /// guard is exceeded.
    pub fn run(&self, model: &mut Model) -> SimResult<()> {
        let mut scans: u32 = 0;
        loop {
            let mut fired_any = false;
            for reg in &self.registrations {
                if (reg.predicate)(model) {
                    (reg.action)(model);
                    fired_any = true;
                }
            }
            if !fired_any {
                return Ok(());
            }
            scans += 1;
            if let Some(max) = self.max_scans {
                if scans >= max {
                    return Err(SimError::TooManyConditionalScans(max));
                }
            }
        }
    }
}
