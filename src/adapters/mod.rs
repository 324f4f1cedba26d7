//! Reality adapters: the narrow seam between the kernel's pure core and
//! the two things a host process genuinely cannot simulate away — wall
//! time and randomness.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Functional Core                     │
//! │   Executive · Calendar · Replication Controller ·     │
//! │   Model Element Tree                                  │
//! └───────────────────────┬───────────────────────────────┘
//!                         │ trait objects
//! ┌───────────────────────┴───────────────────────────────┐
//! │                  Imperative Shell                      │
//! │   WallClock (timeout checks)                           │
//! │   StreamProvider (inter-event-time sampling)            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Simulated time itself is not behind a trait here: this kernel offers
//! no "swap simulated time for real time" axis — that is exactly what
//! real-time synchronization, out of scope here, would require. Only wall
//! time (for the replication wall-time bound) and randomness (for
//! reproducible streams) need a production/test split.

pub mod clock;
pub mod stream;

pub use clock::{ManualWallClock, SystemWallClock, WallClock};
pub use stream::{ConstantValueSource, RandomStreamProvider, StreamProvider, UniformValueSource, ValueSource};
