//! Agents stored as parallel columns.
//!
//! A [`Population`] of `n` agents identifies agents by dense ids `0..n`.
//! Every attribute is a full column of length `n`, and every introduced
//! disease owns one column of state codes. The population also owns the
//! contact [`Network`] whose vertex ids are the agent ids, and computes
//! infection risk from the two together.

mod builder;

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

pub use builder::{CategoryCodes, ProportionTable};

use crate::disease::{Disease, StateCode};
use crate::error::EpinetError;
use crate::network::{EdgeValues, LayerSource, Network};

/// Dense agent identifier in `0..population.size()`.
pub type AgentId = usize;

/// Default columns every population starts with.
const DEFAULT_FLAG_ATTRIBUTES: [&str; 2] = ["masking", "quarantine"];

/// One attribute column.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValues {
    Integer(Vec<i64>),
    Real(Vec<f64>),
}

impl AttributeValues {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            AttributeValues::Integer(values) => values.len(),
            AttributeValues::Real(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the agent's value is non-zero. Out-of-range ids are unset.
    #[must_use]
    pub fn is_set(&self, agent: AgentId) -> bool {
        match self {
            AttributeValues::Integer(values) => values.get(agent).is_some_and(|v| *v != 0),
            AttributeValues::Real(values) => values.get(agent).is_some_and(|v| *v != 0.0),
        }
    }

    /// The value as `f64`, whatever the column type.
    #[must_use]
    pub fn value(&self, agent: AgentId) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            AttributeValues::Integer(values) => values.get(agent).map(|v| *v as f64),
            AttributeValues::Real(values) => values.get(agent).copied(),
        }
    }
}

/// Initial disease states of all agents.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialStates {
    /// Every agent starts in this state.
    Uniform(String),
    /// One state label per agent.
    PerAgent(Vec<String>),
}

impl From<&str> for InitialStates {
    fn from(state: &str) -> Self {
        InitialStates::Uniform(state.to_string())
    }
}

/// Susceptible agents exposed to at least one infectious contact, each with
/// the probability of being infected by any of those contacts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransmissionRisk {
    pub agents: Vec<AgentId>,
    pub probabilities: Vec<f64>,
}

impl TransmissionRisk {
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, f64)> + '_ {
        self.agents
            .iter()
            .copied()
            .zip(self.probabilities.iter().copied())
    }
}

#[derive(Clone)]
pub struct Population {
    size: usize,
    attributes: IndexMap<String, AttributeValues>,
    diseases: IndexMap<String, Rc<dyn Disease>>,
    states: IndexMap<String, Vec<StateCode>>,
    network: Network,
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("size", &self.size)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("diseases", &self.diseases.keys().collect::<Vec<_>>())
            .field("layers", &self.network.layer_labels().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Population {
    /// A population of `size` agents with all-zero `masking` and
    /// `quarantine` columns and an empty network.
    #[must_use]
    pub fn new(size: usize) -> Population {
        let attributes = DEFAULT_FLAG_ATTRIBUTES
            .iter()
            .map(|label| (label.to_string(), AttributeValues::Integer(vec![0; size])))
            .collect();
        Population {
            size,
            attributes,
            diseases: IndexMap::new(),
            states: IndexMap::new(),
            network: Network::new(size),
        }
    }

    /// Builds a population from attribute columns, which must all have the
    /// same length.
    pub fn from_attributes(
        columns: IndexMap<String, AttributeValues>,
    ) -> Result<Population, EpinetError> {
        let Some(size) = columns.values().next().map(AttributeValues::len) else {
            return Err(EpinetError::InvalidParameter(
                "no attribute columns given".to_string(),
            ));
        };
        let mut population = Population::new(size);
        for (label, values) in columns {
            population.add_attribute(&label, values)?;
        }
        Ok(population)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    // Attributes

    /// Adds or replaces an attribute column.
    pub fn add_attribute(
        &mut self,
        label: &str,
        values: AttributeValues,
    ) -> Result<(), EpinetError> {
        if values.len() != self.size {
            return Err(EpinetError::SizeMismatch {
                what: format!("attribute '{label}'"),
                expected: self.size,
                actual: values.len(),
            });
        }
        self.attributes.insert(label.to_string(), values);
        Ok(())
    }

    pub fn attribute(&self, label: &str) -> Result<&AttributeValues, EpinetError> {
        self.attributes
            .get(label)
            .ok_or_else(|| EpinetError::UnknownAttribute(label.to_string()))
    }

    pub fn attribute_labels(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn integers(&self, label: &str) -> Result<&[i64], EpinetError> {
        match self.attribute(label)? {
            AttributeValues::Integer(values) => Ok(values),
            AttributeValues::Real(_) => Err(EpinetError::AttributeTypeMismatch {
                attribute: label.to_string(),
                expected: "integer",
            }),
        }
    }

    pub fn reals(&self, label: &str) -> Result<&[f64], EpinetError> {
        match self.attribute(label)? {
            AttributeValues::Real(values) => Ok(values),
            AttributeValues::Integer(_) => Err(EpinetError::AttributeTypeMismatch {
                attribute: label.to_string(),
                expected: "real",
            }),
        }
    }

    /// Sets an integer attribute of the given agents.
    pub fn set_integer(
        &mut self,
        label: &str,
        ids: &[AgentId],
        value: i64,
    ) -> Result<(), EpinetError> {
        self.check_agents(ids)?;
        match self.attributes.get_mut(label) {
            Some(AttributeValues::Integer(values)) => {
                for &id in ids {
                    values[id] = value;
                }
                Ok(())
            }
            Some(AttributeValues::Real(_)) => Err(EpinetError::AttributeTypeMismatch {
                attribute: label.to_string(),
                expected: "integer",
            }),
            None => Err(EpinetError::UnknownAttribute(label.to_string())),
        }
    }

    pub fn set_real(
        &mut self,
        label: &str,
        ids: &[AgentId],
        value: f64,
    ) -> Result<(), EpinetError> {
        self.check_agents(ids)?;
        match self.attributes.get_mut(label) {
            Some(AttributeValues::Real(values)) => {
                for &id in ids {
                    values[id] = value;
                }
                Ok(())
            }
            Some(AttributeValues::Integer(_)) => Err(EpinetError::AttributeTypeMismatch {
                attribute: label.to_string(),
                expected: "real",
            }),
            None => Err(EpinetError::UnknownAttribute(label.to_string())),
        }
    }

    /// Copies the named columns for an external writer. Disease labels
    /// export that disease's state codes; `None` exports every attribute and
    /// every disease.
    pub fn export(
        &self,
        labels: Option<&[&str]>,
    ) -> Result<IndexMap<String, AttributeValues>, EpinetError> {
        let states_column = |codes: &Vec<StateCode>| {
            AttributeValues::Integer(codes.iter().map(|&c| i64::from(c)).collect())
        };
        match labels {
            None => Ok(self
                .attributes
                .iter()
                .map(|(label, values)| (label.clone(), values.clone()))
                .chain(
                    self.states
                        .iter()
                        .map(|(label, codes)| (label.clone(), states_column(codes))),
                )
                .collect()),
            Some(labels) => labels
                .iter()
                .map(|&label| {
                    let column = match self.states.get(label) {
                        Some(codes) => states_column(codes),
                        None => self.attribute(label)?.clone(),
                    };
                    Ok((label.to_string(), column))
                })
                .collect(),
        }
    }

    // Network

    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// Adds a layer and gives it the transmission attribute of every
    /// introduced disease.
    pub fn add_layer(&mut self, label: &str, source: LayerSource) -> Result<(), EpinetError> {
        let graph = source.build(label, self.size)?;
        self.network.add_layer(label, graph)?;
        let diseases: Vec<Rc<dyn Disease>> = self.diseases.values().cloned().collect();
        for disease in &diseases {
            self.network.add_attributes_edges(
                label,
                disease.label(),
                EdgeValues::Uniform(disease.infection_probability()),
                None,
            )?;
        }
        if !diseases.is_empty() {
            self.update_transmission_probabilities(None, Some(&[label]), None)?;
        }
        Ok(())
    }

    // Diseases

    /// Registers a disease and allocates its state column.
    ///
    /// The disease's `initialize` hook runs once, and every layer gets a
    /// per-edge attribute named after the disease holding its infection
    /// probability.
    pub fn introduce_disease(
        &mut self,
        disease: Rc<dyn Disease>,
        initial: InitialStates,
    ) -> Result<(), EpinetError> {
        let label = disease.label().to_string();
        if self.diseases.contains_key(&label) {
            return Err(EpinetError::DuplicateDisease(label));
        }
        let codes = match &initial {
            InitialStates::Uniform(state) => vec![disease.state_id(state)?; self.size],
            InitialStates::PerAgent(states) => {
                if states.len() != self.size {
                    return Err(EpinetError::SizeMismatch {
                        what: format!("initial states of {label}"),
                        expected: self.size,
                        actual: states.len(),
                    });
                }
                states
                    .iter()
                    .map(|state| disease.state_id(state))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        let probability = disease.infection_probability();
        if !(0.0..=1.0).contains(&probability) {
            return Err(EpinetError::InvalidProbability(probability));
        }

        self.states.insert(label.clone(), codes);
        self.diseases.insert(label.clone(), Rc::clone(&disease));
        if let Err(e) = disease.initialize(self) {
            self.states.shift_remove(&label);
            self.diseases.shift_remove(&label);
            return Err(e);
        }

        let layers: Vec<String> = self.network.layer_labels().map(str::to_string).collect();
        for layer in &layers {
            self.network.add_attributes_edges(
                layer,
                &label,
                EdgeValues::Uniform(probability),
                None,
            )?;
        }
        debug!("introduced disease '{label}' into a population of {}", self.size);
        Ok(())
    }

    pub fn disease(&self, label: &str) -> Result<Rc<dyn Disease>, EpinetError> {
        self.diseases
            .get(label)
            .cloned()
            .ok_or_else(|| EpinetError::UnknownDisease(label.to_string()))
    }

    /// Introduced diseases in introduction order.
    pub fn diseases(&self) -> impl Iterator<Item = &Rc<dyn Disease>> {
        self.diseases.values()
    }

    pub fn disease_labels(&self) -> impl Iterator<Item = &str> {
        self.diseases.keys().map(String::as_str)
    }

    /// The state column of a disease.
    pub fn disease_states(&self, disease: &str) -> Result<&[StateCode], EpinetError> {
        self.states
            .get(disease)
            .map(Vec::as_slice)
            .ok_or_else(|| EpinetError::UnknownDisease(disease.to_string()))
    }

    pub fn disease_state_id(&self, disease: &str, state: &str) -> Result<StateCode, EpinetError> {
        self.diseases
            .get(disease)
            .ok_or_else(|| EpinetError::UnknownDisease(disease.to_string()))?
            .state_id(state)
    }

    pub fn state_of(&self, disease: &str, agent: AgentId) -> Result<StateCode, EpinetError> {
        self.check_agents(&[agent])?;
        Ok(self.disease_states(disease)?[agent])
    }

    /// Agents currently in `state`, ascending.
    pub fn get_state(&self, disease: &str, state: &str) -> Result<Vec<AgentId>, EpinetError> {
        let code = self.disease_state_id(disease, state)?;
        self.agents_in(disease, &[code])
    }

    /// Agents currently in any of `states`, ascending.
    pub fn agents_in(
        &self,
        disease: &str,
        states: &[StateCode],
    ) -> Result<Vec<AgentId>, EpinetError> {
        Ok(self
            .disease_states(disease)?
            .iter()
            .enumerate()
            .filter(|(_, code)| states.contains(code))
            .map(|(agent, _)| agent)
            .collect())
    }

    /// Moves the given agents to `state`. Nothing else changes; scheduling
    /// follow-up transitions is up to the caller.
    pub fn change_state(
        &mut self,
        ids: &[AgentId],
        disease: &str,
        state: &str,
    ) -> Result<(), EpinetError> {
        let code = self.disease_state_id(disease, state)?;
        self.set_state_code(ids, disease, code)
    }

    /// Like `change_state` with a state code, which must belong to the
    /// disease.
    pub fn set_state_code(
        &mut self,
        ids: &[AgentId],
        disease: &str,
        code: StateCode,
    ) -> Result<(), EpinetError> {
        self.check_agents(ids)?;
        let known = self
            .diseases
            .get(disease)
            .ok_or_else(|| EpinetError::UnknownDisease(disease.to_string()))?;
        if !known.states().contains(code) {
            return Err(EpinetError::UnknownState {
                disease: disease.to_string(),
                state: code.to_string(),
            });
        }
        let column = self
            .states
            .get_mut(disease)
            .ok_or_else(|| EpinetError::UnknownDisease(disease.to_string()))?;
        for &id in ids {
            column[id] = code;
        }
        Ok(())
    }

    pub fn count_state(&self, disease: &str, state: &str) -> Result<usize, EpinetError> {
        let code = self.disease_state_id(disease, state)?;
        Ok(self
            .disease_states(disease)?
            .iter()
            .filter(|&&c| c == code)
            .count())
    }

    /// Number of agents per state, in state-code order.
    pub fn state_counts(&self, disease: &str) -> Result<IndexMap<String, usize>, EpinetError> {
        let states = self.disease(disease)?;
        let mut counts = vec![0_usize; states.states().len()];
        for &code in self.disease_states(disease)? {
            counts[code as usize] += 1;
        }
        Ok(states
            .states()
            .labels()
            .map(str::to_string)
            .zip(counts)
            .collect())
    }

    // Transmission

    /// Infection risk of susceptible agents with at least one infectious
    /// neighbor on an active layer.
    ///
    /// For each such agent the probabilities `p` of its edges to infectious
    /// neighbors, across all active layers, combine as independent events:
    /// `1 - Π(1 - p)`. No infectious agent means no risk at all.
    pub fn get_transmission_probabilities(
        &self,
        disease: &str,
        susceptible_states: &[&str],
        infectee_states: &[&str],
    ) -> Result<TransmissionRisk, EpinetError> {
        let resolve = |states: &[&str]| {
            states
                .iter()
                .map(|state| self.disease_state_id(disease, state))
                .collect::<Result<Vec<_>, _>>()
        };
        let susceptible = resolve(susceptible_states)?;
        let infectious = resolve(infectee_states)?;
        self.transmission_risk(disease, &susceptible, &infectious)
    }

    /// `get_transmission_probabilities` with state codes.
    pub fn transmission_risk(
        &self,
        disease: &str,
        susceptible_states: &[StateCode],
        infectee_states: &[StateCode],
    ) -> Result<TransmissionRisk, EpinetError> {
        let states = self.disease_states(disease)?;
        let is_infectious = |agent: AgentId| infectee_states.contains(&states[agent]);
        let is_susceptible = |agent: AgentId| susceptible_states.contains(&states[agent]);

        let infected: Vec<AgentId> = (0..self.size).filter(|&a| is_infectious(a)).collect();
        if infected.is_empty() {
            return Ok(TransmissionRisk::default());
        }

        let layers = self
            .network
            .active_layers()
            .map(|layer| {
                layer
                    .edge_attribute(disease)
                    .map(|weights| (layer.graph(), weights))
                    .ok_or_else(|| {
                        EpinetError::UnknownAttribute(format!(
                            "{disease} (layer '{}')",
                            layer.label()
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut at_risk = vec![false; self.size];
        for (graph, _) in &layers {
            for &agent in &infected {
                for neighbor in graph.neighbors(agent) {
                    if is_susceptible(neighbor) {
                        at_risk[neighbor] = true;
                    }
                }
            }
        }

        let mut risk = TransmissionRisk::default();
        for agent in (0..self.size).filter(|&a| at_risk[a]) {
            let mut escape = 1.0;
            for (graph, weights) in &layers {
                for &(neighbor, edge) in graph.incident(agent) {
                    if is_infectious(neighbor) {
                        escape *= 1.0 - weights[edge];
                    }
                }
            }
            risk.agents.push(agent);
            risk.probabilities.push(1.0 - escape);
        }
        Ok(risk)
    }

    /// Recomputes per-edge transmission probabilities through each disease's
    /// `compute_transmission_probabilities`.
    ///
    /// `None` selects every disease, every layer (active or not) and every
    /// edge. With `targets`, only edges incident to those agents are touched.
    pub fn update_transmission_probabilities(
        &mut self,
        diseases: Option<&[&str]>,
        layers: Option<&[&str]>,
        targets: Option<&[AgentId]>,
    ) -> Result<(), EpinetError> {
        let diseases: Vec<Rc<dyn Disease>> = match diseases {
            Some(labels) => labels
                .iter()
                .map(|label| self.disease(label))
                .collect::<Result<_, _>>()?,
            None => self.diseases.values().cloned().collect(),
        };
        let layers: Vec<String> = match layers {
            Some(labels) => {
                for label in labels {
                    self.network.layer(label)?;
                }
                labels.iter().map(|label| (*label).to_string()).collect()
            }
            None => self.network.layer_labels().map(str::to_string).collect(),
        };

        for layer in &layers {
            let edges = self.network.get_edges(layer, targets)?;
            if edges.is_empty() {
                continue;
            }
            for disease in &diseases {
                let probabilities = disease.compute_transmission_probabilities(self, &edges.pairs)?;
                if probabilities.len() != edges.len() {
                    return Err(EpinetError::SizeMismatch {
                        what: format!("transmission probabilities of {}", disease.label()),
                        expected: edges.len(),
                        actual: probabilities.len(),
                    });
                }
                if let Some(&p) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
                    return Err(EpinetError::InvalidProbability(p));
                }
                self.network.add_attributes_edges(
                    layer,
                    disease.label(),
                    EdgeValues::PerEdge(probabilities),
                    Some(&edges.ids),
                )?;
            }
        }
        Ok(())
    }

    fn check_agents(&self, ids: &[AgentId]) -> Result<(), EpinetError> {
        match ids.iter().find(|&&id| id >= self.size) {
            Some(&agent) => Err(EpinetError::AgentOutOfRange {
                agent,
                population_size: self.size,
            }),
            None => Ok(()),
        }
    }
}
