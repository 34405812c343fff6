//! A discrete-event engine for epidemic simulations on contact networks
//!
//! The central object of an epinet model is the [`Simulator`], which owns a
//! [`Population`] of agents and drives it through simulated time. Agents are
//! stored as parallel attribute columns and connected by a multi-layer
//! [`Network`]; diseases track each agent's state in a column of their own.
//!
//! A model usually consists of:
//! * A population, loaded from attribute columns or sampled from a table of
//!   attribute combinations.
//! * Network layers (household, work, school...) that can be closed and
//!   reopened independently.
//! * One or more diseases implementing [`Disease`], for instance a
//!   [`ProgressionDisease`] configured from JSON.
//! * Interventions such as masking, quarantine and vaccination.
//! * A [`Step`] that lets the diseases infect at regular times.
//!
//! Every random draw goes through a named [`Stream`] seeded from the
//! [`Seeds`] given to [`Simulator::run`], so runs with equal seeds are
//! identical.
pub mod config;
pub mod disease;
pub mod error;
pub mod event;
pub mod hashing;
pub mod intervention;
pub mod log;
pub mod network;
pub mod plan;
pub mod population;
pub mod random;
pub mod simulator;
pub mod statistics;
pub mod step;

pub use config::{load_json, Calendar, RunConfig, Seeds, TimeUnit};
pub use disease::{Disease, ProgressionConfig, ProgressionDisease, StateCode, StateSet};
pub use error::EpinetError;
pub use event::{Event, EventId};
pub use intervention::{Intervention, LayerClosure, Masking, Vaccination};
pub use network::{Graph, LayerSource, Network};
pub use population::{AgentId, AttributeValues, InitialStates, Population};
pub use random::Stream;
pub use simulator::{Simulator, SimulatorState};
pub use statistics::{Observation, Statistics};
pub use step::{DailyStep, Step};

// Re-exported so models use the same version as the engine
pub use rand;
