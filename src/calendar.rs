//! The event calendar: an ordered multiset of events keyed by
//! `(time, priority, id)`, all compared ascending.

use crate::event::{CalendarEntry, EventId};
use crate::time::SimTime;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Heap key used purely for ordering; kept separate from [`CalendarEntry`]
/// so the heap's `Ord` impl never has to look inside a boxed action.
struct HeapKey {
    time: SimTime,
    priority: i32,
    id: EventId,
}

impl PartialEq for HeapKey {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.priority == other.priority && self.id == other.id
    }
}

impl Eq for HeapKey {}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// `BinaryHeap` is a max-heap; reversing the comparison turns it into the
// min-heap the calendar needs without wrapping every entry in
// `std::cmp::Reverse`.
impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.time, other.priority, other.id).cmp(&(self.time, self.priority, self.id))
    }
}

struct HeapEntry {
    key: HeapKey,
    entry: CalendarEntry,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// An ordered structure yielding the minimum event under `(time, priority,
/// id)` order.
///
/// Cancellation avoids a mutable cancel flag mutated in place on a heap
/// node: the calendar instead keeps a "live" id set. Cancelling removes the
/// id from that set; a popped entry whose id is no longer live is still
/// returned to the caller (the Executive needs to know an event *was*
/// popped, even if cancelled, so it can still run the conditional-action
/// check for that instant), but its cancellation is visible via
/// [`EventCalendar::is_live`].
#[derive(Default)]
pub struct EventCalendar {
    heap: BinaryHeap<HeapEntry>,
    live: HashSet<EventId>,
}

impl EventCalendar {
    /// Creates an empty calendar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an event into the calendar and marks its id live.
    pub fn insert(&mut self, entry: CalendarEntry) {
        let key = HeapKey {
            time: entry.event.time,
            priority: entry.event.priority,
            id: entry.event.id,
        };
        self.live.insert(entry.event.id);
        self.heap.push(HeapEntry { key, entry });
    }

    /// Removes and returns the minimum entry, if any. The returned
    /// entry's liveness must be checked by the caller via
    /// [`EventCalendar::take_live`] semantics: this method already
    /// consumes the live marker for the returned id so a stale duplicate
    /// of the same id (there is none by construction, ids are unique)
    /// cannot resurrect it.
    pub fn pop_next(&mut self) -> Option<(CalendarEntry, bool)> {
        let HeapEntry { entry, .. } = self.heap.pop()?;
        let was_live = self.live.remove(&entry.event.id);
        Some((entry, was_live))
    }

    /// Returns the time of the minimum event without removing it.
    #[must_use]
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.key.time)
    }

    /// Marks an id as cancelled. Returns `true` if the id was live (i.e.
    /// cancellation had an effect).
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.live.remove(&id)
    }

    /// `true` if `id` is currently scheduled and not cancelled.
    #[must_use]
    pub fn is_live(&self, id: EventId) -> bool {
        self.live.contains(&id)
    }

    /// `true` if the calendar holds no entries (live or cancelled-but-not-
    /// yet-popped).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of entries still in the heap, including cancelled-but-not-
    /// yet-popped ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Discards all entries and liveness information.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }
}
