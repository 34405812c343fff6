//! A priority queue that stores arbitrary data sorted by time
//!
//! Defines a `Queue<T>` that is intended to store a queue of items of type
//! `T`, sorted by `f64` time, called 'plans'. This queue has methods for adding
//! plans, cancelling plans, peeking at and retrieving the earliest plan, and
//! searching the pending plans. Adding a plan is *O*(log(*n*)) while
//! cancellation is *O*(1) and retrieval is amortized *O*(log(*n*)).
//!
//! This queue is used by the `Scheduler` to store future events.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::hashing::HashMap;

/// A priority queue that stores arbitrary data sorted by time
///
/// Items of type `T` are stored in order by `f64` time and called `Plan<T>`.
/// When plans are created they are sequentially assigned a `PlanId` that is a
/// wrapped `u64`. If two plans are scheduled for the same time then the plan
/// that is scheduled first (i.e., that has the lowest id) is placed earlier.
///
/// The time and plan id are stored in a binary heap of `Entry` objects. The
/// data payload of the plan is stored in a hash map by plan id. Plan
/// cancellation occurs by removing the corresponding entry from the data hash
/// map; stale heap entries are skipped lazily.
pub struct Queue<T> {
    queue: BinaryHeap<Entry>,
    data_map: HashMap<u64, (f64, T)>,
    plan_counter: u64,
}

impl<T> Queue<T> {
    /// Create a new empty `Queue<T>`
    #[must_use]
    pub fn new() -> Queue<T> {
        Queue {
            queue: BinaryHeap::new(),
            data_map: HashMap::default(),
            plan_counter: 0,
        }
    }

    /// Add a plan to the queue at the specified time
    ///
    /// Returns a `PlanId` for the newly-added plan that can be used to cancel it
    /// if needed.
    pub fn add_plan(&mut self, time: f64, data: T) -> PlanId {
        let id = self.plan_counter;
        self.queue.push(Entry { time, id });
        self.data_map.insert(id, (time, data));
        self.plan_counter += 1;
        PlanId(id)
    }

    /// Cancel a plan that has been added to the queue
    ///
    /// Returns the plan's data, or `None` if the plan has already been
    /// executed or cancelled.
    pub fn cancel_plan(&mut self, id: PlanId) -> Option<T> {
        // The heap entry stays behind and is skipped when it reaches the top.
        self.data_map.remove(&id.0).map(|(_, data)| data)
    }

    /// Returns the time and data of the earliest plan without removing it
    pub fn peek_plan(&mut self) -> Option<(PlanId, f64, &T)> {
        self.discard_cancelled();
        let entry = self.queue.peek()?;
        self.data_map
            .get(&entry.id)
            .map(|(time, data)| (PlanId(entry.id), *time, data))
    }

    /// Retrieve the earliest plan in the queue
    ///
    /// Returns the next plan if it exists or else `None` if the queue is empty
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        loop {
            let entry = self.queue.pop()?;
            // Skip plans that have been cancelled and thus have no data
            if let Some((time, data)) = self.data_map.remove(&entry.id) {
                return Some(Plan {
                    id: PlanId(entry.id),
                    time,
                    data,
                });
            }
        }
    }

    /// Returns every pending plan for which `predicate` holds, in the order in
    /// which the plans would be retrieved.
    pub fn find(&self, mut predicate: impl FnMut(f64, &T) -> bool) -> Vec<(PlanId, f64, &T)> {
        let mut matches: Vec<(PlanId, f64, &T)> = self
            .data_map
            .iter()
            .filter(|(_, (time, data))| predicate(*time, data))
            .map(|(id, (time, data))| (PlanId(*id), *time, data))
            .collect();
        matches.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        matches
    }

    /// Returns true if the plan is still waiting to be retrieved
    #[must_use]
    pub fn contains(&self, id: PlanId) -> bool {
        self.data_map.contains_key(&id.0)
    }

    /// Number of pending (not cancelled, not retrieved) plans
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.is_empty()
    }

    /// Drops every pending plan. Plan ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.data_map.clear();
    }

    fn discard_cancelled(&mut self) {
        while let Some(entry) = self.queue.peek() {
            if self.data_map.contains_key(&entry.id) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A time and id object used to order plans in the `Queue<T>`
#[derive(PartialEq, Debug)]
struct Entry {
    time: f64,
    id: u64,
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Entry objects are ordered in increasing order by time and then plan id.
/// `BinaryHeap` is a max-heap, so both comparisons are reversed.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.total_cmp(&other.time).reverse() {
            // Break time ties in order of plan id
            Ordering::Equal => self.id.cmp(&other.id).reverse(),
            time_ordering => time_ordering,
        }
    }
}

/// A unique identifier for a plan added to a `Queue<T>`
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanId(u64);

/// A plan that holds data of type `T` intended to be used at the specified time
pub struct Plan<T> {
    pub id: PlanId,
    pub time: f64,
    pub data: T,
}
