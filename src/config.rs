//! JSON configuration of runs and models.
//!
//! Any deserializable type (a [`RunConfig`], a
//! [`ProgressionConfig`](crate::disease::ProgressionConfig), a
//! [`LayerSource`](crate::network::LayerSource)) can be read from a file
//! with [`load_json`].
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use log::trace;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::EpinetError;

/// Reads and deserializes a JSON file.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, EpinetError> {
    let path = path.as_ref();
    trace!("loading configuration from {}", path.display());
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Seed of every random stream of a run, keyed by stream label.
///
/// Every disease needs an entry under its own label. Interventions read the
/// streams `masking`, `vaccination` and `quarantine` when they draw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seeds(IndexMap<String, u64>);

impl Seeds {
    #[must_use]
    pub fn new() -> Seeds {
        Seeds::default()
    }

    /// Builder-style `insert`.
    #[must_use]
    pub fn with(mut self, label: &str, seed: u64) -> Seeds {
        self.insert(label, seed);
        self
    }

    pub fn insert(&mut self, label: &str, seed: u64) {
        self.0.insert(label.to_string(), seed);
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<u64> {
        self.0.get(label).copied()
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(label, seed)| (label.as_str(), *seed))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for Seeds {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Seeds(iter.into_iter().map(|(label, seed)| (label.into(), seed)).collect())
    }
}

/// The inputs that fully determine a run, together with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub stop_time: f64,
    pub seeds: Seeds,
}

/// Unit of simulation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Days => 86_400.0,
            TimeUnit::Hours => 3_600.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Seconds => 1.0,
        }
    }
}

/// Converts calendar dates to simulation times, time 0 being `start`.
///
/// Dates are `YYYY-MM-DD`, optionally followed by a UTC time of day
/// (`2020-03-15 12:00:00`, `2020-03-15T12:00:00Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    start: SystemTime,
    unit: TimeUnit,
}

impl Calendar {
    pub fn new(start: &str, unit: TimeUnit) -> Result<Calendar, EpinetError> {
        Ok(Calendar {
            start: parse_date(start)?,
            unit,
        })
    }

    #[must_use]
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Simulation time of `date`; negative before the start.
    pub fn to_sim_time(&self, date: &str) -> Result<f64, EpinetError> {
        let seconds = match parse_date(date)?.duration_since(self.start) {
            Ok(after) => after.as_secs_f64(),
            Err(before) => -before.duration().as_secs_f64(),
        };
        Ok(seconds / self.unit.seconds())
    }
}

impl Default for Calendar {
    /// Days since 2020-01-01.
    fn default() -> Self {
        Calendar {
            start: SystemTime::UNIX_EPOCH + Duration::from_secs(18_262 * 86_400),
            unit: TimeUnit::Days,
        }
    }
}

fn parse_date(date: &str) -> Result<SystemTime, EpinetError> {
    let date = date.trim();
    let timestamp = if date.len() == "YYYY-MM-DD".len() {
        format!("{date} 00:00:00")
    } else {
        date.to_string()
    };
    humantime::parse_rfc3339_weak(&timestamp)
        .map_err(|e| EpinetError::InvalidParameter(format!("date '{date}': {e}")))
}
