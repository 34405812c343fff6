//! Per-run observation collection.
//!
//! A [`StatsCollector`] is an append-only mapping from label to an ordered
//! sequence of [`Observation`]s. The simulator owns one for the duration of a
//! run and hands its contents back from `Simulator::run`.
use indexmap::IndexMap;
use serde::Serialize;

use crate::disease::StateCode;

/// A single recorded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Observation {
    Integer(i64),
    Real(f64),
    /// A value paired with the simulation time it was taken at.
    TimePoint { time: f64, value: f64 },
    /// A full copy of one disease's state array.
    States(Vec<StateCode>),
}

impl From<i64> for Observation {
    fn from(value: i64) -> Self {
        Observation::Integer(value)
    }
}

impl From<usize> for Observation {
    fn from(value: usize) -> Self {
        Observation::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Observation {
    fn from(value: f64) -> Self {
        Observation::Real(value)
    }
}

impl From<(f64, f64)> for Observation {
    fn from((time, value): (f64, f64)) -> Self {
        Observation::TimePoint { time, value }
    }
}

impl From<Vec<StateCode>> for Observation {
    fn from(states: Vec<StateCode>) -> Self {
        Observation::States(states)
    }
}

/// Label to observations, labels in first-collected order.
pub type Statistics = IndexMap<String, Vec<Observation>>;

#[derive(Debug, Default)]
pub struct StatsCollector {
    data: Statistics,
}

impl StatsCollector {
    #[must_use]
    pub fn new() -> StatsCollector {
        StatsCollector::default()
    }

    pub fn collect(&mut self, label: &str, observation: impl Into<Observation>) {
        let observation = observation.into();
        if let Some(series) = self.data.get_mut(label) {
            series.push(observation);
        } else {
            self.data.insert(label.to_string(), vec![observation]);
        }
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&[Observation]> {
        self.data.get(label).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Hands back everything collected so far and leaves the collector empty.
    pub fn take(&mut self) -> Statistics {
        std::mem::take(&mut self.data)
    }
}
