//! Timestamped units of work and the queue that orders them.
//!
//! An [`Event`] is scheduled at a time, ordered by the [`Scheduler`] and, once
//! popped, consumed by [`Event::execute`]. Re-running an event means
//! scheduling a new one.
use std::any::Any;
use std::fmt;

use crate::error::EpinetError;
use crate::plan::{PlanId, Queue};
use crate::population::AgentId;
use crate::simulator::Simulator;

/// A unit of work executed at a point in simulated time.
///
/// Executing an event may mutate the population or the network and may
/// schedule further events through the simulator. The descriptive methods
/// are used by predicates passed to `Simulator::find`/`cancel_where`, e.g. to
/// drop all pending transitions of an agent who died.
pub trait Event: Any {
    fn execute(self: Box<Self>, simulator: &mut Simulator) -> Result<(), EpinetError>;

    fn name(&self) -> &str {
        "event"
    }

    /// The agent this event is about, if any.
    fn agent(&self) -> Option<AgentId> {
        None
    }

    /// The disease this event belongs to, if any.
    fn disease(&self) -> Option<&str> {
        None
    }
}

impl dyn Event {
    /// Returns the concrete event if it is of type `T`.
    #[must_use]
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    #[must_use]
    pub fn is<T: Event>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }
}

impl fmt::Debug for dyn Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name())
            .field("agent", &self.agent())
            .field("disease", &self.disease())
            .finish()
    }
}

/// An event built from a closure.
pub(crate) struct CallbackEvent<F> {
    name: &'static str,
    callback: F,
}

impl<F> CallbackEvent<F>
where
    F: FnOnce(&mut Simulator) -> Result<(), EpinetError> + 'static,
{
    pub(crate) fn new(name: &'static str, callback: F) -> Self {
        CallbackEvent { name, callback }
    }
}

impl<F> Event for CallbackEvent<F>
where
    F: FnOnce(&mut Simulator) -> Result<(), EpinetError> + 'static,
{
    fn execute(self: Box<Self>, simulator: &mut Simulator) -> Result<(), EpinetError> {
        (self.callback)(simulator)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Identifies a scheduled event. Ids are never reused within a simulator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(PlanId);

/// A view of a pending event returned by `peek`.
#[derive(Debug)]
pub struct PendingEvent<'a> {
    pub id: EventId,
    pub time: f64,
    pub event: &'a (dyn Event + 'static),
}

/// Time-ordered queue of pending events.
///
/// Events are ordered by time; events at the same time run in the order they
/// were added.
#[derive(Default)]
pub struct Scheduler {
    queue: Queue<Box<dyn Event>>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Scheduler {
        Scheduler::default()
    }

    /// Adds an event at `time`. Negative, infinite and NaN times are rejected.
    pub fn add(&mut self, time: f64, event: Box<dyn Event>) -> Result<EventId, EpinetError> {
        if !time.is_finite() || time < 0.0 {
            return Err(EpinetError::InvalidTime(time));
        }
        Ok(EventId(self.queue.add_plan(time, event)))
    }

    /// Removes a pending event. Returns `None` when the event already ran or
    /// was already cancelled.
    pub fn cancel(&mut self, id: EventId) -> Option<Box<dyn Event>> {
        self.queue.cancel_plan(id.0)
    }

    pub fn peek(&mut self) -> Option<PendingEvent<'_>> {
        self.queue
            .peek_plan()
            .map(|(id, time, event)| PendingEvent {
                id: EventId(id),
                time,
                event: event.as_ref(),
            })
    }

    /// Removes and returns the earliest event.
    pub fn pop(&mut self) -> Option<(EventId, f64, Box<dyn Event>)> {
        self.queue
            .get_next_plan()
            .map(|plan| (EventId(plan.id), plan.time, plan.data))
    }

    /// Ids of every pending event matching `predicate`, in execution order.
    pub fn find(
        &self,
        mut predicate: impl FnMut(f64, &(dyn Event + 'static)) -> bool,
    ) -> Vec<EventId> {
        self.queue
            .find(|time, event| predicate(time, event.as_ref()))
            .into_iter()
            .map(|(id, _, _)| EventId(id))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, id: EventId) -> bool {
        self.queue.contains(id.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
