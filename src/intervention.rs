//! Interventions applied to a running model.
//!
//! An [`Intervention`] is registered with `Simulator::add_intervention` at a
//! time and applied once per run when the clock reaches it. Interventions
//! that change attributes read by transmission (masking, quarantine)
//! recompute the affected edge weights before returning.
use std::rc::Rc;

use log::{debug, info};

use crate::disease::{ProgressionDisease, Transition};
use crate::error::EpinetError;
use crate::event::Event;
use crate::population::{AgentId, AttributeValues};
use crate::simulator::Simulator;

pub trait Intervention {
    fn name(&self) -> &str;

    fn apply(&self, simulator: &mut Simulator) -> Result<(), EpinetError>;

    /// Labels of the streams `apply` draws from. A run fails up front when
    /// one of them has no seed.
    fn required_streams(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Applies a registered intervention.
pub(crate) struct ApplyIntervention {
    intervention: Rc<dyn Intervention>,
}

impl ApplyIntervention {
    pub(crate) fn new(intervention: Rc<dyn Intervention>) -> Self {
        ApplyIntervention { intervention }
    }
}

impl Event for ApplyIntervention {
    fn execute(self: Box<Self>, simulator: &mut Simulator) -> Result<(), EpinetError> {
        info!(
            "applying intervention '{}' at t={}",
            self.intervention.name(),
            simulator.now()
        );
        self.intervention.apply(simulator)
    }

    fn name(&self) -> &str {
        self.intervention.name()
    }
}

/// Who wears a mask.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskUsage {
    /// Each agent masks with this probability, drawn from the `masking`
    /// stream.
    Coverage(f64),
    /// One value per agent; non-zero means masked.
    Values(Vec<i64>),
}

/// Overwrites the `masking` column and recomputes every edge weight.
#[derive(Debug, Clone)]
pub struct Masking {
    usage: MaskUsage,
}

impl Masking {
    #[must_use]
    pub fn new(usage: MaskUsage) -> Masking {
        Masking { usage }
    }

    #[must_use]
    pub fn coverage(p: f64) -> Masking {
        Masking::new(MaskUsage::Coverage(p))
    }
}

impl Intervention for Masking {
    fn name(&self) -> &str {
        "masking"
    }

    fn required_streams(&self) -> Vec<String> {
        match self.usage {
            MaskUsage::Coverage(_) => vec!["masking".to_string()],
            MaskUsage::Values(_) => Vec::new(),
        }
    }

    fn apply(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
        let size = simulator.population().size();
        let values = match &self.usage {
            MaskUsage::Values(values) => values.clone(),
            MaskUsage::Coverage(p) => {
                let stream = simulator.stream("masking")?;
                (0..size)
                    .map(|_| stream.sample_bool(*p).map(i64::from))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        let population = simulator.population_mut();
        population.add_attribute("masking", AttributeValues::Integer(values))?;
        population.update_transmission_probabilities(None, None, None)?;
        debug!(
            "{} of {size} agents masked",
            population
                .integers("masking")?
                .iter()
                .filter(|&&m| m != 0)
                .count()
        );
        Ok(())
    }
}

/// Puts agents into quarantine now and releases them after `duration`.
#[derive(Debug, Clone)]
pub struct BeginQuarantine {
    agents: Vec<AgentId>,
    duration: f64,
}

impl BeginQuarantine {
    #[must_use]
    pub fn new(agents: Vec<AgentId>, duration: f64) -> BeginQuarantine {
        BeginQuarantine { agents, duration }
    }
}

impl Event for BeginQuarantine {
    fn execute(self: Box<Self>, simulator: &mut Simulator) -> Result<(), EpinetError> {
        if !(self.duration >= 0.0 && self.duration.is_finite()) {
            return Err(EpinetError::InvalidParameter(format!(
                "quarantine duration must be non-negative, got {}",
                self.duration
            )));
        }
        set_quarantine(simulator, &self.agents, 1)?;
        let now = simulator.now();
        #[allow(clippy::cast_precision_loss)]
        simulator.collect("quarantine", (now, self.agents.len() as f64));
        simulator.schedule(
            now + self.duration,
            EndQuarantine {
                agents: self.agents,
            },
        )?;
        Ok(())
    }

    fn name(&self) -> &str {
        "begin_quarantine"
    }

    fn agent(&self) -> Option<AgentId> {
        match self.agents.as_slice() {
            [agent] => Some(*agent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EndQuarantine {
    agents: Vec<AgentId>,
}

impl Event for EndQuarantine {
    fn execute(self: Box<Self>, simulator: &mut Simulator) -> Result<(), EpinetError> {
        set_quarantine(simulator, &self.agents, 0)?;
        let now = simulator.now();
        #[allow(clippy::cast_precision_loss)]
        simulator.collect("quarantine", (now, -(self.agents.len() as f64)));
        Ok(())
    }

    fn name(&self) -> &str {
        "end_quarantine"
    }

    fn agent(&self) -> Option<AgentId> {
        match self.agents.as_slice() {
            [agent] => Some(*agent),
            _ => None,
        }
    }
}

fn set_quarantine(
    simulator: &mut Simulator,
    agents: &[AgentId],
    value: i64,
) -> Result<(), EpinetError> {
    let population = simulator.population_mut();
    population.set_integer("quarantine", agents, value)?;
    population.update_transmission_probabilities(None, None, Some(agents))
}

/// Vaccinates a share of the agents in an age range.
///
/// `coverage` of the agents aged within `age_range` (inclusive) are drawn
/// from the `vaccination` stream, rounded down. Of those, the ones still
/// susceptible and not yet vaccinated get their `<disease>_vaccine` flag set
/// and move to `immune_state` right away.
#[derive(Debug, Clone)]
pub struct Vaccination {
    disease: String,
    age_attribute: String,
    age_range: (f64, f64),
    coverage: f64,
    eligible_state: String,
    immune_state: String,
}

impl Vaccination {
    pub fn new(
        disease: &str,
        age_range: (f64, f64),
        coverage: f64,
        immune_state: &str,
    ) -> Result<Vaccination, EpinetError> {
        if !(0.0..=1.0).contains(&coverage) {
            return Err(EpinetError::InvalidProbability(coverage));
        }
        if age_range.0 > age_range.1 {
            return Err(EpinetError::InvalidParameter(format!(
                "empty age range {age_range:?}"
            )));
        }
        Ok(Vaccination {
            disease: disease.to_string(),
            age_attribute: "age".to_string(),
            age_range,
            coverage,
            eligible_state: "susceptible".to_string(),
            immune_state: immune_state.to_string(),
        })
    }

    /// Reads ages from another attribute than `age`.
    #[must_use]
    pub fn with_age_attribute(mut self, attribute: &str) -> Vaccination {
        self.age_attribute = attribute.to_string();
        self
    }

    /// Only agents in this state are vaccinated; `susceptible` by default.
    #[must_use]
    pub fn with_eligible_state(mut self, state: &str) -> Vaccination {
        self.eligible_state = state.to_string();
        self
    }
}

impl Intervention for Vaccination {
    fn name(&self) -> &str {
        "vaccination"
    }

    fn required_streams(&self) -> Vec<String> {
        vec!["vaccination".to_string()]
    }

    fn apply(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
        let population = simulator.population();
        let disease = population.disease(&self.disease)?;
        let eligible = disease.state_id(&self.eligible_state)?;
        let immune = disease.state_id(&self.immune_state)?;
        let vaccine_column = format!("{}_vaccine", self.disease);

        let ages = population.attribute(&self.age_attribute)?;
        let in_range: Vec<AgentId> = (0..population.size())
            .filter(|&agent| {
                ages.value(agent)
                    .is_some_and(|age| age >= self.age_range.0 && age <= self.age_range.1)
            })
            .collect();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let requested = (in_range.len() as f64 * self.coverage).floor() as usize;

        if population.attribute(&vaccine_column).is_err() {
            let size = population.size();
            simulator
                .population_mut()
                .add_attribute(&vaccine_column, AttributeValues::Integer(vec![0; size]))?;
        }
        let chosen = simulator
            .stream("vaccination")?
            .choose_multiple(&in_range, requested);

        let population = simulator.population();
        let states = population.disease_states(&self.disease)?;
        let vaccinated = population.integers(&vaccine_column)?;
        let targets: Vec<AgentId> = chosen
            .into_iter()
            .filter(|&agent| states[agent] == eligible && vaccinated[agent] == 0)
            .collect();
        info!(
            "vaccinating {} of {} agents aged {:?} against {}",
            targets.len(),
            in_range.len(),
            self.age_range,
            self.disease
        );

        simulator
            .population_mut()
            .set_integer(&vaccine_column, &targets, 1)?;
        if disease.downcast_ref::<ProgressionDisease>().is_some() {
            let now = simulator.now();
            for &agent in &targets {
                simulator.schedule(now, Transition::new(&self.disease, agent, eligible, immune))?;
            }
        } else {
            simulator
                .population_mut()
                .set_state_code(&targets, &self.disease, immune)?;
        }
        Ok(())
    }
}

/// Switches a network layer off, and back on after `reopen_after` if given.
#[derive(Debug, Clone)]
pub struct LayerClosure {
    layer: String,
    reopen_after: Option<f64>,
}

impl LayerClosure {
    #[must_use]
    pub fn new(layer: &str, reopen_after: Option<f64>) -> LayerClosure {
        LayerClosure {
            layer: layer.to_string(),
            reopen_after,
        }
    }
}

impl Intervention for LayerClosure {
    fn name(&self) -> &str {
        "layer_closure"
    }

    fn apply(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
        simulator
            .population_mut()
            .network_mut()
            .deactivate_layer(&self.layer)?;
        if let Some(duration) = self.reopen_after {
            let layer = self.layer.clone();
            let time = simulator.now() + duration;
            simulator.add_plan(time, move |simulator| {
                simulator
                    .population_mut()
                    .network_mut()
                    .activate_layer(&layer)
            })?;
        }
        Ok(())
    }
}
