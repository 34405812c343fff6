use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `EpinetError` and maps other errors to it
///
/// Configuration and contract violations are reported synchronously by the
/// call that introduced them. Conditions such as "no pending event" or "no
/// infected agent" are not errors and are represented with `Option` or empty
/// collections instead.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum EpinetError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    SizeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
    UnknownDisease(String),
    UnknownState {
        disease: String,
        state: String,
    },
    UnknownLayer(String),
    UnknownAttribute(String),
    AttributeTypeMismatch {
        attribute: String,
        expected: &'static str,
    },
    DuplicateDisease(String),
    DuplicateLayer(String),
    MissingSeed {
        disease: String,
    },
    MissingStream(String),
    InvalidProbability(f64),
    InvalidParameter(String),
    InvalidTime(f64),
    AgentOutOfRange {
        agent: usize,
        population_size: usize,
    },
    InvalidEdge {
        source: usize,
        target: usize,
    },
    CausalityViolation {
        time: f64,
        now: f64,
    },
    UnboundedStep,
    EpinetError(String),
}

impl From<io::Error> for EpinetError {
    fn from(error: io::Error) -> Self {
        EpinetError::IoError(error)
    }
}

impl From<serde_json::Error> for EpinetError {
    fn from(error: serde_json::Error) -> Self {
        EpinetError::JsonError(error)
    }
}

impl From<csv::Error> for EpinetError {
    fn from(error: csv::Error) -> Self {
        EpinetError::CSVError(error)
    }
}

impl From<String> for EpinetError {
    fn from(error: String) -> Self {
        EpinetError::EpinetError(error)
    }
}

impl From<&str> for EpinetError {
    fn from(error: &str) -> Self {
        EpinetError::EpinetError(error.to_string())
    }
}

impl std::error::Error for EpinetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EpinetError::IoError(e) => Some(e),
            EpinetError::JsonError(e) => Some(e),
            EpinetError::CSVError(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for EpinetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EpinetError::IoError(e) => write!(f, "I/O error: {e}"),
            EpinetError::JsonError(e) => write!(f, "JSON error: {e}"),
            EpinetError::CSVError(e) => write!(f, "CSV error: {e}"),
            EpinetError::SizeMismatch {
                what,
                expected,
                actual,
            } => write!(
                f,
                "size of {what} ({actual}) doesn't match population size ({expected})"
            ),
            EpinetError::UnknownDisease(disease) => {
                write!(f, "disease '{disease}' has not been introduced")
            }
            EpinetError::UnknownState { disease, state } => {
                write!(f, "'{state}' is not a state of {disease}")
            }
            EpinetError::UnknownLayer(layer) => {
                write!(f, "layer '{layer}' not found in the network")
            }
            EpinetError::UnknownAttribute(attribute) => {
                write!(f, "population has no attribute '{attribute}'")
            }
            EpinetError::AttributeTypeMismatch {
                attribute,
                expected,
            } => write!(f, "attribute '{attribute}' is not a column of {expected} values"),
            EpinetError::DuplicateDisease(disease) => {
                write!(f, "disease '{disease}' has already been introduced")
            }
            EpinetError::DuplicateLayer(layer) => write!(f, "layer '{layer}' already exists"),
            EpinetError::MissingSeed { disease } => {
                write!(f, "no random seed supplied for disease '{disease}'")
            }
            EpinetError::MissingStream(label) => {
                write!(f, "no random stream named '{label}' was seeded for this run")
            }
            EpinetError::InvalidProbability(p) => write!(f, "invalid probability {p}"),
            EpinetError::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            EpinetError::InvalidTime(t) => write!(f, "invalid event time {t}"),
            EpinetError::AgentOutOfRange {
                agent,
                population_size,
            } => write!(
                f,
                "agent {agent} is out of range for a population of {population_size}"
            ),
            EpinetError::InvalidEdge { source, target } => {
                write!(f, "invalid edge ({source}, {target})")
            }
            EpinetError::CausalityViolation { time, now } => {
                write!(f, "cannot schedule an event at time {time}, before the current time {now}")
            }
            EpinetError::UnboundedStep => {
                write!(f, "a step is registered, so the stop time must be finite")
            }
            EpinetError::EpinetError(msg) => write!(f, "{msg}"),
        }
    }
}
