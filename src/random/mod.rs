//! Seeded, independently reseedable random number streams.
//!
//! Every logical actor of a model (a disease, the masking intervention, the
//! vaccination campaign, a graph generator) draws from its own [`Stream`], so
//! reseeding or consuming one actor's randomness never perturbs another's.
//! Streams are bound for a run by [`Streams::bind`] from the run's seed map.
mod sampling_algorithms;

use indexmap::IndexMap;
use log::trace;
use rand_distr::{Exp, Gamma, Weibull};

pub use sampling_algorithms::{sample_multiple_from_known_length, sample_single_from_known_length};

use crate::error::EpinetError;
use crate::rand::distr::uniform::{SampleRange, SampleUniform};
use crate::rand::distr::weighted::WeightedIndex;
use crate::rand::distr::Distribution;
use crate::rand::rngs::SmallRng;
use crate::rand::{Rng, SeedableRng};

/// A named pseudo-random generator bound to one logical actor.
#[derive(Debug, Clone)]
pub struct Stream {
    label: String,
    seed: u64,
    rng: SmallRng,
}

impl Stream {
    #[must_use]
    pub fn new(label: &str, seed: u64) -> Stream {
        trace!("creating random stream '{label}' (seed={seed})");
        Stream {
            label: label.to_string(),
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restarts the stream from `seed`. Subsequent draws repeat exactly for
    /// equal seeds.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Applies `sampler` to the underlying generator.
    pub fn sample<T>(&mut self, sampler: impl FnOnce(&mut SmallRng) -> T) -> T {
        sampler(&mut self.rng)
    }

    pub fn sample_distr<T>(&mut self, distribution: impl Distribution<T>) -> T {
        distribution.sample(&mut self.rng)
    }

    /// A uniform draw from `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    pub fn sample_range<S, T>(&mut self, range: S) -> T
    where
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.rng.random_range(range)
    }

    /// Returns true with probability `p`.
    pub fn sample_bool(&mut self, p: f64) -> Result<bool, EpinetError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(EpinetError::InvalidProbability(p));
        }
        Ok(self.rng.random_bool(p))
    }

    /// Draws an index into `weights` with probability proportional to its weight.
    pub fn sample_weighted(&mut self, weights: &[f64]) -> Result<usize, EpinetError> {
        let index = WeightedIndex::new(weights)
            .map_err(|e| EpinetError::InvalidParameter(format!("weights {weights:?}: {e}")))?;
        Ok(index.sample(&mut self.rng))
    }

    /// Exponential waiting time with the given mean.
    pub fn exponential(&mut self, mean: f64) -> Result<f64, EpinetError> {
        if !(mean > 0.0 && mean.is_finite()) {
            return Err(EpinetError::InvalidParameter(format!(
                "exponential mean must be positive, got {mean}"
            )));
        }
        let distribution = Exp::new(1.0 / mean)
            .map_err(|e| EpinetError::InvalidParameter(format!("exponential({mean}): {e}")))?;
        Ok(self.sample_distr(distribution))
    }

    pub fn gamma(&mut self, shape: f64, scale: f64) -> Result<f64, EpinetError> {
        let distribution = Gamma::new(shape, scale).map_err(|e| {
            EpinetError::InvalidParameter(format!("gamma({shape}, {scale}): {e}"))
        })?;
        Ok(self.sample_distr(distribution))
    }

    /// Weibull draw; `shape` is the `k` parameter.
    pub fn weibull(&mut self, shape: f64, scale: f64) -> Result<f64, EpinetError> {
        let distribution = Weibull::new(scale, shape).map_err(|e| {
            EpinetError::InvalidParameter(format!("weibull({shape}, {scale}): {e}"))
        })?;
        Ok(self.sample_distr(distribution))
    }

    /// Samples `requested` items from `items` without replacement, keeping
    /// their original relative order. Asking for more than there are returns
    /// all of them.
    pub fn choose_multiple<T: Copy>(&mut self, items: &[T], requested: usize) -> Vec<T> {
        let requested = requested.min(items.len());
        sample_multiple_from_known_length(&mut self.rng, items.iter().copied(), requested)
    }

    /// Picks one item uniformly, or `None` from an empty slice.
    pub fn choose<T: Copy>(&mut self, items: &[T]) -> Option<T> {
        sample_single_from_known_length(&mut self.rng, items.iter().copied())
    }
}

/// The streams bound for one run, keyed by actor label in binding order.
#[derive(Debug, Default)]
pub struct Streams {
    streams: IndexMap<String, Stream>,
}

impl Streams {
    #[must_use]
    pub fn new() -> Streams {
        Streams::default()
    }

    /// Binds (or rebinds) the stream for `label`.
    pub fn bind(&mut self, label: &str, seed: u64) {
        match self.streams.get_mut(label) {
            Some(stream) => stream.reseed(seed),
            None => {
                self.streams
                    .insert(label.to_string(), Stream::new(label, seed));
            }
        }
    }

    pub fn get_mut(&mut self, label: &str) -> Result<&mut Stream, EpinetError> {
        self.streams
            .get_mut(label)
            .ok_or_else(|| EpinetError::MissingStream(label.to_string()))
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.streams.contains_key(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.streams.clear();
    }
}
