//! The stream-provider collaborator: reproducible pseudo-random streams
//! with sub-stream reset/advance and antithetic-pair support.
//!
//! Random-variable *distribution* tooling is treated as an external
//! collaborator — this module supplies only the underlying uniform draw
//! and the stream-control operations the replication controller needs; it
//! is not a statistics library.

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use std::cell::RefCell;
use std::rc::Rc;

/// A nullary value source, called once per sampling point (inter-event
/// time, time-until-first-event, schedule item payload, ...). Owned by
/// generators and schedules; constant sources and uniform-draw sources
/// are the two simplest implementations, trivial enough to ship with the
/// kernel without becoming a distribution library.
pub trait ValueSource {
    /// Samples the next value.
    fn value(&mut self) -> f64;

    /// Clones this source into a fresh boxed trait object. Generators keep
    /// an "initial" and a "current" counterpart of each of their value
    /// sources and restore the latter from the former at every
    /// replication's initialization; this is how that restoration copies a
    /// trait object without requiring `ValueSource: Clone` (not object
    /// safe).
    fn box_clone(&self) -> Box<dyn ValueSource>;

    /// `true` if this source always yields exactly `0.0`. An unbounded
    /// generator (`maxEvents` unset) paired with such a source would never
    /// stop scheduling itself, which is rejected at generator construction;
    /// only [`ConstantValueSource`] can answer `true` here, since any other
    /// source's output isn't known ahead of a draw.
    fn is_constant_zero(&self) -> bool {
        false
    }
}

/// A value source that always returns the same constant. Useful both in
/// tests and for any model that wants a deterministic inter-event time.
#[derive(Debug, Clone, Copy)]
pub struct ConstantValueSource(pub f64);

impl ValueSource for ConstantValueSource {
    fn value(&mut self) -> f64 {
        self.0
    }

    fn box_clone(&self) -> Box<dyn ValueSource> {
        Box::new(*self)
    }

    fn is_constant_zero(&self) -> bool {
        self.0 == 0.0
    }
}

/// Stream-control operations consumed by the replication controller:
/// reset-start-stream, reset-start-substream, advance-to-next-substream,
/// set-antithetic. Also the source of the underlying uniform draw that
/// simple [`ValueSource`] implementations (like [`UniformValueSource`])
/// sample from.
pub trait StreamProvider {
    /// Returns a uniform draw in `[0, 1)`, applying the antithetic
    /// transform (`1 - u`) if antithetic mode is currently on.
    fn next_uniform(&mut self) -> f64;

    /// Resets to the very start of the stream: substream index 0,
    /// position 0.
    fn reset_start_stream(&mut self);

    /// Replays the current substream from its own position 0, without
    /// changing which substream is selected.
    fn reset_start_substream(&mut self);

    /// Advances to the next substream, positioned at 0.
    fn advance_to_next_substream(&mut self);

    /// Advances `n` substreams in a row.
    fn advance_substreams(&mut self, n: u32) {
        for _ in 0..n {
            self.advance_to_next_substream();
        }
    }

    /// Turns the antithetic transform on or off.
    fn set_antithetic(&mut self, antithetic: bool);

    /// `true` if the antithetic transform is currently applied.
    fn is_antithetic(&self) -> bool;
}

/// A [`StreamProvider`] backed by `rand`'s `SmallRng`, seeded
/// deterministically per substream so the same `(seed, substream index)`
/// pair always reproduces the same draw sequence.
pub struct RandomStreamProvider {
    base_seed: u64,
    substream_index: u64,
    rng: SmallRng,
    antithetic: bool,
}

impl RandomStreamProvider {
    /// Creates a provider seeded from `seed`, starting at substream 0.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut provider = Self {
            base_seed: seed,
            substream_index: 0,
            rng: SmallRng::seed_from_u64(seed),
            antithetic: false,
        };
        provider.reseed_current_substream();
        provider
    }

    fn reseed_current_substream(&mut self) {
        // Deterministically derive a per-substream seed from the base
        // seed and the substream index so distinct substreams never
        // collide and `reset_start_substream` always replays identically.
        let derived = self
            .base_seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(self.substream_index);
        self.rng = SmallRng::seed_from_u64(derived);
    }

    /// The substream index currently selected.
    #[must_use]
    pub fn substream_index(&self) -> u64 {
        self.substream_index
    }
}

impl StreamProvider for RandomStreamProvider {
    fn next_uniform(&mut self) -> f64 {
        // 53 bits of a u64 give a uniform double in [0, 1) without bias
        // toward either endpoint.
        let raw = (self.rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64);
        if self.antithetic { 1.0 - raw } else { raw }
    }

    fn reset_start_stream(&mut self) {
        self.substream_index = 0;
        self.reseed_current_substream();
    }

    fn reset_start_substream(&mut self) {
        self.reseed_current_substream();
    }

    fn advance_to_next_substream(&mut self) {
        self.substream_index += 1;
        self.reseed_current_substream();
    }

    fn set_antithetic(&mut self, antithetic: bool) {
        self.antithetic = antithetic;
    }

    fn is_antithetic(&self) -> bool {
        self.antithetic
    }
}

/// A [`ValueSource`] that draws directly from a shared
/// [`StreamProvider`], honoring the antithetic transform automatically.
/// Shared via `Rc<RefCell<_>>` because a model's stream provider is owned
/// by the [`crate::Model`] while multiple generators each need their own
/// `ValueSource` handle onto the same underlying stream.
#[derive(Clone)]
pub struct UniformValueSource {
    stream: Rc<RefCell<dyn StreamProvider>>,
}

impl UniformValueSource {
    /// Wraps a shared stream provider handle.
    #[must_use]
    pub fn new(stream: Rc<RefCell<dyn StreamProvider>>) -> Self {
        Self { stream }
    }
}

impl ValueSource for UniformValueSource {
    fn value(&mut self) -> f64 {
        self.stream.borrow_mut().next_uniform()
    }

    fn box_clone(&self) -> Box<dyn ValueSource> {
        Box::new(self.clone())
    }
}
