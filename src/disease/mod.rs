//! Diseases and the capabilities the engine expects from them.
//!
//! A disease declares its own state set and decides how contacts turn into
//! infections. The engine calls into it at fixed points:
//!
//! - [`Disease::initialize`] once, when the disease is introduced into a
//!   population,
//! - [`Disease::schedule_initial_events`] at the start of every run,
//! - [`Disease::infect`] on every step,
//! - [`Disease::compute_transmission_probabilities`] whenever edge weights
//!   are recomputed (after masking, quarantine and the like).
//!
//! [`ProgressionDisease`] is a configurable implementation covering models
//! built from stochastic state-to-state transitions.

mod delay;
mod progression;

use std::any::Any;

pub use delay::Delay;
pub use progression::{
    BranchConfig, ImportCases, ProgressionConfig, ProgressionDisease, QuarantinePolicy,
    Transition, TransmissionModifier,
};

use crate::error::EpinetError;
use crate::population::{AgentId, Population};
use crate::simulator::Simulator;

/// Integer code of a disease state. Codes are dense from 0 in declaration
/// order.
pub type StateCode = u32;

/// A bijection between state labels and dense codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSet {
    labels: Vec<String>,
}

impl StateSet {
    /// Builds a state set; labels must be unique and there must be at least
    /// one.
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Result<StateSet, EpinetError> {
        if labels.is_empty() {
            return Err(EpinetError::InvalidParameter(
                "a disease needs at least one state".to_string(),
            ));
        }
        let mut owned: Vec<String> = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.as_ref();
            if owned.iter().any(|existing| existing == label) {
                return Err(EpinetError::InvalidParameter(format!(
                    "state '{label}' is declared twice"
                )));
            }
            owned.push(label.to_string());
        }
        Ok(StateSet { labels: owned })
    }

    #[must_use]
    pub fn code(&self, label: &str) -> Option<StateCode> {
        self.labels
            .iter()
            .position(|existing| existing == label)
            .and_then(|index| StateCode::try_from(index).ok())
    }

    #[must_use]
    pub fn label(&self, code: StateCode) -> Option<&str> {
        self.labels.get(code as usize).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, code: StateCode) -> bool {
        (code as usize) < self.labels.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in code order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

pub trait Disease: Any {
    /// Unique label; also names the disease's state column, its random
    /// stream and its per-edge transmission attribute.
    fn label(&self) -> &str;

    fn states(&self) -> &StateSet;

    /// Per-contact transmission probability written on every edge when the
    /// disease is introduced.
    fn infection_probability(&self) -> f64;

    fn state_id(&self, state: &str) -> Result<StateCode, EpinetError> {
        self.states()
            .code(state)
            .ok_or_else(|| EpinetError::UnknownState {
                disease: self.label().to_string(),
                state: state.to_string(),
            })
    }

    /// One-time setup when the disease is introduced, e.g. extra columns.
    fn initialize(&self, _population: &mut Population) -> Result<(), EpinetError> {
        Ok(())
    }

    /// Schedules whatever must happen when a run starts.
    fn schedule_initial_events(&self, _simulator: &mut Simulator) -> Result<(), EpinetError> {
        Ok(())
    }

    /// Samples new infections and schedules their transitions.
    fn infect(&self, simulator: &mut Simulator) -> Result<(), EpinetError>;

    /// Streams drawn from besides the disease's own one, which is always
    /// required. A run fails up front when one of them has no seed.
    fn required_streams(&self) -> Vec<String> {
        Vec::new()
    }

    /// Transmission probability for each contact pair, in the same order.
    fn compute_transmission_probabilities(
        &self,
        _population: &Population,
        pairs: &[(AgentId, AgentId)],
    ) -> Result<Vec<f64>, EpinetError> {
        Ok(vec![self.infection_probability(); pairs.len()])
    }
}

impl dyn Disease {
    /// Returns the concrete disease if it is of type `T`.
    #[must_use]
    pub fn downcast_ref<T: Disease>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }
}
