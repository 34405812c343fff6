//! Diseases described as a directed graph of stochastic state transitions.
//!
//! Every agent moves through the states on its own: entering a state samples
//! one of that state's outgoing branches and schedules a [`Transition`]
//! after the branch's delay. Infection moves susceptible agents with an
//! infectious contact into the infection state; [`ImportCases`] seeds the
//! first cases when a run starts.

use std::rc::Rc;

use approx::abs_diff_eq;
use indexmap::IndexMap;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::disease::delay::Delay;
use crate::disease::{Disease, StateCode, StateSet};
use crate::error::EpinetError;
use crate::event::Event;
use crate::intervention::BeginQuarantine;
use crate::population::{AgentId, Population};
use crate::simulator::Simulator;

/// Branch probabilities of a state must add up to one within this tolerance.
const BRANCH_PROBABILITY_TOLERANCE: f64 = 1e-9;

fn one() -> f64 {
    1.0
}

fn masking_attribute() -> String {
    "masking".to_string()
}

fn quarantine_attribute() -> String {
    "quarantine".to_string()
}

fn one_masked_factor() -> f64 {
    0.5
}

fn both_masked_factor() -> f64 {
    0.3
}

/// One outgoing transition of a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchConfig {
    pub to: String,
    #[serde(default = "one")]
    pub probability: f64,
    pub delay: Delay,
    /// Constant added to every sampled delay.
    #[serde(default)]
    pub offset: f64,
}

/// Agents entering `state` start a quarantine of `duration` with
/// `probability`, drawn from the `quarantine` stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantinePolicy {
    pub state: String,
    pub probability: f64,
    pub duration: f64,
}

/// A factor applied to the base transmission probability of a contact,
/// driven by population attributes of both endpoints. An endpoint counts as
/// flagged when its attribute value is non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransmissionModifier {
    Masking {
        #[serde(default = "masking_attribute")]
        attribute: String,
        #[serde(default = "one_masked_factor")]
        one_masked: f64,
        #[serde(default = "both_masked_factor")]
        both_masked: f64,
    },
    /// No transmission if either endpoint is quarantined.
    Quarantine {
        #[serde(default = "quarantine_attribute")]
        attribute: String,
    },
}

impl TransmissionModifier {
    /// The usual mask factors (1, 0.5, 0.3) on the `masking` column.
    #[must_use]
    pub fn masking() -> TransmissionModifier {
        TransmissionModifier::Masking {
            attribute: masking_attribute(),
            one_masked: one_masked_factor(),
            both_masked: both_masked_factor(),
        }
    }

    #[must_use]
    pub fn quarantine() -> TransmissionModifier {
        TransmissionModifier::Quarantine {
            attribute: quarantine_attribute(),
        }
    }

    fn attribute(&self) -> &str {
        match self {
            TransmissionModifier::Masking { attribute, .. }
            | TransmissionModifier::Quarantine { attribute } => attribute,
        }
    }

    /// Factor for one contact. Missing attribute columns leave the
    /// probability unchanged.
    fn factor(&self, population: &Population, (a, b): (AgentId, AgentId)) -> f64 {
        let Ok(column) = population.attribute(self.attribute()) else {
            return 1.0;
        };
        let flagged = usize::from(column.is_set(a)) + usize::from(column.is_set(b));
        match (self, flagged) {
            (_, 0) => 1.0,
            (TransmissionModifier::Masking { one_masked, .. }, 1) => *one_masked,
            (TransmissionModifier::Masking { both_masked, .. }, _) => *both_masked,
            (TransmissionModifier::Quarantine { .. }, _) => 0.0,
        }
    }
}

/// Everything needed to build a [`ProgressionDisease`]; loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    pub label: String,
    /// State labels in code order.
    pub states: Vec<String>,
    pub susceptible_states: Vec<String>,
    pub infectious_states: Vec<String>,
    /// State entered on infection.
    pub infection_state: String,
    pub infection_probability: f64,
    /// Outgoing branches by source state. States without branches are
    /// absorbing.
    #[serde(default)]
    pub transitions: IndexMap<String, Vec<BranchConfig>>,
    /// Cases imported at time 0 of every run.
    #[serde(default)]
    pub initial_cases: usize,
    /// State of imported cases; defaults to `infection_state`.
    #[serde(default)]
    pub import_state: Option<String>,
    /// Entering one of these states cancels the agent's pending events for
    /// this disease.
    #[serde(default)]
    pub cancel_on_entry: Vec<String>,
    #[serde(default)]
    pub quarantine: Option<QuarantinePolicy>,
    #[serde(default)]
    pub modifiers: Vec<TransmissionModifier>,
}

#[derive(Debug, Clone)]
struct Branch {
    to: StateCode,
    probability: f64,
    delay: Delay,
    offset: f64,
}

#[derive(Debug, Clone)]
struct Quarantine {
    state: StateCode,
    probability: f64,
    duration: f64,
}

/// A disease whose course is a per-agent stochastic state machine.
#[derive(Debug)]
pub struct ProgressionDisease {
    label: Rc<str>,
    states: StateSet,
    susceptible: Vec<StateCode>,
    infectious: Vec<StateCode>,
    infection_state: StateCode,
    infection_probability: f64,
    // Indexed by source state code
    branches: Vec<Vec<Branch>>,
    initial_cases: usize,
    import_state: StateCode,
    cancel_on_entry: Vec<StateCode>,
    quarantine: Option<Quarantine>,
    modifiers: Vec<TransmissionModifier>,
}

impl ProgressionDisease {
    /// Resolves and checks a configuration: every label must be a declared
    /// state, probabilities must lie in `[0, 1]` and each state's branch
    /// probabilities must sum to one.
    pub fn new(config: ProgressionConfig) -> Result<ProgressionDisease, EpinetError> {
        let states = StateSet::new(&config.states)?;
        let resolve = |state: &str| {
            states.code(state).ok_or_else(|| EpinetError::UnknownState {
                disease: config.label.clone(),
                state: state.to_string(),
            })
        };
        let resolve_all = |labels: &[String]| -> Result<Vec<StateCode>, EpinetError> {
            labels.iter().map(|label| resolve(label)).collect()
        };
        check_probability(config.infection_probability)?;

        let mut branches = vec![Vec::new(); states.len()];
        for (from, outgoing) in &config.transitions {
            let from = resolve(from)?;
            let mut total = 0.0;
            for branch in outgoing {
                check_probability(branch.probability)?;
                branch.delay.validate()?;
                if !(branch.offset >= 0.0 && branch.offset.is_finite()) {
                    return Err(EpinetError::InvalidParameter(format!(
                        "delay offset must be non-negative, got {}",
                        branch.offset
                    )));
                }
                total += branch.probability;
                branches[from as usize].push(Branch {
                    to: resolve(&branch.to)?,
                    probability: branch.probability,
                    delay: branch.delay,
                    offset: branch.offset,
                });
            }
            if !outgoing.is_empty()
                && !abs_diff_eq!(total, 1.0, epsilon = BRANCH_PROBABILITY_TOLERANCE)
            {
                return Err(EpinetError::InvalidParameter(format!(
                    "branch probabilities out of '{}' sum to {total}, not 1",
                    states.label(from).unwrap_or_default()
                )));
            }
        }

        let quarantine = match &config.quarantine {
            Some(policy) => {
                check_probability(policy.probability)?;
                if !(policy.duration >= 0.0 && policy.duration.is_finite()) {
                    return Err(EpinetError::InvalidParameter(format!(
                        "quarantine duration must be non-negative, got {}",
                        policy.duration
                    )));
                }
                Some(Quarantine {
                    state: resolve(&policy.state)?,
                    probability: policy.probability,
                    duration: policy.duration,
                })
            }
            None => None,
        };
        let infection_state = resolve(&config.infection_state)?;
        let import_state = match &config.import_state {
            Some(state) => resolve(state)?,
            None => infection_state,
        };

        Ok(ProgressionDisease {
            susceptible: resolve_all(&config.susceptible_states)?,
            infectious: resolve_all(&config.infectious_states)?,
            cancel_on_entry: resolve_all(&config.cancel_on_entry)?,
            infection_state,
            infection_probability: config.infection_probability,
            branches,
            initial_cases: config.initial_cases,
            import_state,
            quarantine,
            modifiers: config.modifiers,
            label: Rc::from(config.label.as_str()),
            states,
        })
    }

    #[must_use]
    pub fn susceptible_states(&self) -> &[StateCode] {
        &self.susceptible
    }

    #[must_use]
    pub fn infectious_states(&self) -> &[StateCode] {
        &self.infectious
    }

    /// Name of the vaccination status column created on introduction.
    #[must_use]
    pub fn vaccine_attribute(&self) -> String {
        vaccine_attribute(&self.label)
    }

    /// Moves `agent` into `state` now and runs the consequences of entering
    /// it: cancellation of pending events, a possible quarantine and the
    /// scheduling of the next transition.
    pub fn enter_state(
        &self,
        simulator: &mut Simulator,
        agent: AgentId,
        state: StateCode,
    ) -> Result<(), EpinetError> {
        simulator
            .population_mut()
            .set_state_code(&[agent], &self.label, state)?;
        debug!(
            "agent {agent} entered {}:{} at {}",
            self.label,
            self.states.label(state).unwrap_or_default(),
            simulator.now()
        );

        if self.cancel_on_entry.contains(&state) {
            let cancelled = simulator.cancel_agent_events(agent, Some(&self.label));
            trace!("cancelled {cancelled} pending events of agent {agent}");
        }

        if let Some(quarantine) = self.quarantine.as_ref().filter(|q| q.state == state) {
            if simulator
                .stream("quarantine")?
                .sample_bool(quarantine.probability)?
            {
                let now = simulator.now();
                simulator.schedule(now, BeginQuarantine::new(vec![agent], quarantine.duration))?;
            }
        }

        let outgoing = &self.branches[state as usize];
        let branch = match outgoing.len() {
            0 => return Ok(()),
            1 => &outgoing[0],
            _ => {
                let weights: Vec<f64> = outgoing.iter().map(|b| b.probability).collect();
                let index = simulator.stream(&self.label)?.sample_weighted(&weights)?;
                &outgoing[index]
            }
        };
        let delay = branch.delay.sample(simulator.stream(&self.label)?)? + branch.offset;
        let time = simulator.now() + delay;
        simulator.schedule(
            time,
            Transition {
                disease: Rc::clone(&self.label),
                agent,
                from: state,
                to: branch.to,
            },
        )?;
        Ok(())
    }
}

pub(crate) fn vaccine_attribute(disease: &str) -> String {
    format!("{disease}_vaccine")
}

fn check_probability(p: f64) -> Result<(), EpinetError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(EpinetError::InvalidProbability(p))
    }
}

fn progression_disease(
    simulator: &Simulator,
    label: &str,
) -> Result<Rc<dyn Disease>, EpinetError> {
    let disease = simulator.population().disease(label)?;
    if disease.downcast_ref::<ProgressionDisease>().is_none() {
        return Err(EpinetError::EpinetError(format!(
            "disease '{label}' is not a progression disease"
        )));
    }
    Ok(disease)
}

impl Disease for ProgressionDisease {
    fn label(&self) -> &str {
        &self.label
    }

    fn states(&self) -> &StateSet {
        &self.states
    }

    fn infection_probability(&self) -> f64 {
        self.infection_probability
    }

    fn initialize(&self, population: &mut Population) -> Result<(), EpinetError> {
        let column = self.vaccine_attribute();
        if population.attribute(&column).is_err() {
            population.add_attribute(
                &column,
                crate::population::AttributeValues::Integer(vec![0; population.size()]),
            )?;
        }
        Ok(())
    }

    fn required_streams(&self) -> Vec<String> {
        match self.quarantine {
            Some(_) => vec!["quarantine".to_string()],
            None => Vec::new(),
        }
    }

    fn schedule_initial_events(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
        if self.initial_cases > 0 {
            simulator.schedule(
                0.0,
                ImportCases {
                    disease: Rc::clone(&self.label),
                    cases: self.initial_cases,
                },
            )?;
        }
        Ok(())
    }

    fn infect(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
        let risk = simulator.population().transmission_risk(
            &self.label,
            &self.susceptible,
            &self.infectious,
        )?;
        if risk.is_empty() {
            return Ok(());
        }

        let stream = simulator.stream(&self.label)?;
        let mut infected = Vec::new();
        for (agent, probability) in risk.iter() {
            if stream.random() < probability {
                infected.push(agent);
            }
        }
        debug!(
            "{}: {} of {} agents at risk infected at {}",
            self.label,
            infected.len(),
            risk.len(),
            simulator.now()
        );

        let now = simulator.now();
        for agent in infected {
            let from = simulator.population().state_of(&self.label, agent)?;
            simulator.schedule(
                now,
                Transition {
                    disease: Rc::clone(&self.label),
                    agent,
                    from,
                    to: self.infection_state,
                },
            )?;
        }
        Ok(())
    }

    fn compute_transmission_probabilities(
        &self,
        population: &Population,
        pairs: &[(AgentId, AgentId)],
    ) -> Result<Vec<f64>, EpinetError> {
        Ok(pairs
            .iter()
            .map(|&pair| {
                self.modifiers
                    .iter()
                    .fold(self.infection_probability, |p, modifier| {
                        p * modifier.factor(population, pair)
                    })
            })
            .collect())
    }
}

/// Moves one agent from `from` to `to`. Skipped if the agent is no longer in
/// `from` when it fires.
#[derive(Debug)]
pub struct Transition {
    disease: Rc<str>,
    agent: AgentId,
    from: StateCode,
    to: StateCode,
}

impl Transition {
    #[must_use]
    pub fn new(disease: &str, agent: AgentId, from: StateCode, to: StateCode) -> Transition {
        Transition {
            disease: Rc::from(disease),
            agent,
            from,
            to,
        }
    }

    #[must_use]
    pub fn from_state(&self) -> StateCode {
        self.from
    }

    #[must_use]
    pub fn to_state(&self) -> StateCode {
        self.to
    }
}

impl Event for Transition {
    fn execute(self: Box<Self>, simulator: &mut Simulator) -> Result<(), EpinetError> {
        let disease = progression_disease(simulator, &self.disease)?;
        let current = simulator.population().state_of(&self.disease, self.agent)?;
        if current != self.from {
            trace!(
                "skipping stale {} transition of agent {} ({} -> {}, now in {current})",
                self.disease,
                self.agent,
                self.from,
                self.to
            );
            return Ok(());
        }
        if let Some(model) = disease.downcast_ref::<ProgressionDisease>() {
            model.enter_state(simulator, self.agent, self.to)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "transition"
    }

    fn agent(&self) -> Option<AgentId> {
        Some(self.agent)
    }

    fn disease(&self) -> Option<&str> {
        Some(&self.disease)
    }
}

/// Moves up to `cases` randomly chosen susceptible agents into the import
/// state.
#[derive(Debug)]
pub struct ImportCases {
    disease: Rc<str>,
    cases: usize,
}

impl ImportCases {
    #[must_use]
    pub fn new(disease: &str, cases: usize) -> ImportCases {
        ImportCases {
            disease: Rc::from(disease),
            cases,
        }
    }
}

impl Event for ImportCases {
    fn execute(self: Box<Self>, simulator: &mut Simulator) -> Result<(), EpinetError> {
        let disease = progression_disease(simulator, &self.disease)?;
        let Some(model) = disease.downcast_ref::<ProgressionDisease>() else {
            return Ok(());
        };
        let susceptibles = simulator
            .population()
            .agents_in(&self.disease, &model.susceptible)?;
        if susceptibles.len() < self.cases {
            warn!(
                "{}: {} cases requested but only {} susceptible agents; importing all of them",
                self.disease,
                self.cases,
                susceptibles.len()
            );
        }
        let chosen = simulator
            .stream(&self.disease)?
            .choose_multiple(&susceptibles, self.cases);
        debug!("{}: importing {} cases", self.disease, chosen.len());
        for agent in chosen {
            model.enter_state(simulator, agent, model.import_state)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "import_cases"
    }

    fn disease(&self) -> Option<&str> {
        Some(&self.disease)
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::config::Seeds;
    use crate::intervention::Intervention;
    use crate::population::InitialStates;
    use crate::statistics::Observation;

    /// Runs a closure when a run starts.
    struct AtStart<F>(F);

    impl<F> Intervention for AtStart<F>
    where
        F: Fn(&mut Simulator) -> Result<(), EpinetError>,
    {
        fn name(&self) -> &str {
            "at_start"
        }

        fn apply(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
            (self.0)(simulator)
        }
    }

    fn sir_config() -> ProgressionConfig {
        serde_json::from_str(
            r#"{
                "label": "flu",
                "states": ["susceptible", "infected", "recovered"],
                "susceptible_states": ["susceptible"],
                "infectious_states": ["infected"],
                "infection_state": "infected",
                "infection_probability": 0.4,
                "transitions": {
                    "infected": [
                        {"to": "recovered", "delay": {"distribution": "exponential", "mean": 3.0}}
                    ]
                },
                "initial_cases": 2
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_from_json() {
        let disease = ProgressionDisease::new(sir_config()).unwrap();
        assert_eq!(disease.label(), "flu");
        assert_eq!(disease.susceptible_states(), &[0]);
        assert_eq!(disease.infectious_states(), &[1]);
        assert_eq!(disease.state_id("recovered").unwrap(), 2);
        assert_eq!(disease.import_state, 1);
        assert_eq!(disease.vaccine_attribute(), "flu_vaccine");
    }

    #[test]
    fn unknown_state_in_branch() {
        let mut config = sir_config();
        config.transitions["infected"][0].to = "dead".to_string();
        assert!(matches!(
            ProgressionDisease::new(config),
            Err(EpinetError::UnknownState { state, .. }) if state == "dead"
        ));
    }

    #[test]
    fn branch_probabilities_must_sum_to_one() {
        let mut config = sir_config();
        let branch = config.transitions["infected"][0].clone();
        config.transitions["infected"][0].probability = 0.5;
        config.transitions["infected"].push(BranchConfig {
            probability: 0.4,
            ..branch
        });
        assert!(matches!(
            ProgressionDisease::new(config),
            Err(EpinetError::InvalidParameter(_))
        ));
    }

    #[test]
    fn invalid_infection_probability() {
        let mut config = sir_config();
        config.infection_probability = 1.2;
        assert!(matches!(
            ProgressionDisease::new(config),
            Err(EpinetError::InvalidProbability(_))
        ));
    }

    #[test]
    fn modifiers_scale_the_base_probability() {
        let mut config = sir_config();
        config.modifiers = vec![
            TransmissionModifier::masking(),
            TransmissionModifier::quarantine(),
        ];
        let disease = ProgressionDisease::new(config).unwrap();
        let mut population = Population::new(4);
        population.set_integer("masking", &[1, 2], 1).unwrap();
        population.set_integer("quarantine", &[3], 1).unwrap();

        let probabilities = disease
            .compute_transmission_probabilities(&population, &[(0, 0), (0, 1), (1, 2), (0, 3)])
            .unwrap();
        assert_approx_eq!(probabilities[0], 0.4);
        assert_approx_eq!(probabilities[1], 0.4 * 0.5);
        assert_approx_eq!(probabilities[2], 0.4 * 0.3);
        assert_approx_eq!(probabilities[3], 0.0);
    }

    #[test]
    fn modifier_without_column_is_neutral() {
        let modifier = TransmissionModifier::Masking {
            attribute: "respirator".to_string(),
            one_masked: 0.5,
            both_masked: 0.3,
        };
        let population = Population::new(2);
        assert_approx_eq!(modifier.factor(&population, (0, 1)), 1.0);
    }

    #[test]
    fn modifier_from_json_uses_defaults() {
        let modifier: TransmissionModifier =
            serde_json::from_str(r#"{"kind": "masking", "both_masked": 0.2}"#).unwrap();
        assert_eq!(
            modifier,
            TransmissionModifier::Masking {
                attribute: "masking".to_string(),
                one_masked: 0.5,
                both_masked: 0.2
            }
        );
    }

    #[test]
    fn initialize_adds_vaccine_column() {
        let disease = ProgressionDisease::new(sir_config()).unwrap();
        let mut population = Population::new(3);
        disease.initialize(&mut population).unwrap();
        assert_eq!(population.integers("flu_vaccine").unwrap(), &[0, 0, 0]);
    }

    fn config(json: &str) -> ProgressionConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn stale_transitions_are_skipped() {
        let mut flu = sir_config();
        flu.initial_cases = 0;
        let mut simulator = Simulator::new(Population::new(3));
        simulator
            .add_disease(ProgressionDisease::new(flu).unwrap(), "susceptible")
            .unwrap();
        let schedule = |simulator: &mut Simulator| -> Result<(), EpinetError> {
            // Agent 0 recovers before its infection fires
            simulator.schedule(0.5, Transition::new("flu", 0, 0, 2))?;
            simulator.schedule(1.0, Transition::new("flu", 0, 0, 1))?;
            simulator.schedule(1.0, Transition::new("flu", 1, 0, 1))?;
            Ok(())
        };
        simulator.add_intervention(0.0, AtStart(schedule)).unwrap();
        simulator.run(1.0, &Seeds::new().with("flu", 3)).unwrap();

        let population = simulator.population();
        assert_eq!(population.get_state("flu", "recovered").unwrap(), vec![0]);
        assert_eq!(population.get_state("flu", "infected").unwrap(), vec![1]);
        assert_eq!(population.get_state("flu", "susceptible").unwrap(), vec![2]);
        // Only agent 1's recovery is left
        assert!(simulator.find(|_, event| event.agent() == Some(0)).is_empty());
        let pending = simulator.find(|_, event| event.agent() == Some(1));
        assert_eq!(pending.len(), 1);
        let next = simulator.peek().unwrap();
        let recovery = next.event.downcast_ref::<Transition>().unwrap();
        assert_eq!((recovery.from_state(), recovery.to_state()), (1, 2));
        assert!(next.time > 1.0);
    }

    #[test]
    fn branches_are_chosen_by_probability() {
        let outcome = config(
            r#"{
                "label": "flu",
                "states": ["susceptible", "infected", "recovered", "dead"],
                "susceptible_states": ["susceptible"],
                "infectious_states": ["infected"],
                "infection_state": "infected",
                "infection_probability": 0.0,
                "transitions": {
                    "infected": [
                        {"to": "recovered", "probability": 0.7,
                         "delay": {"distribution": "fixed", "value": 1.0}},
                        {"to": "dead", "probability": 0.3,
                         "delay": {"distribution": "fixed", "value": 2.0}}
                    ]
                },
                "initial_cases": 1000
            }"#,
        );
        let mut simulator = Simulator::new(Population::new(1000));
        simulator
            .add_disease(ProgressionDisease::new(outcome).unwrap(), "susceptible")
            .unwrap();
        let seeds = Seeds::new().with("flu", 11);

        simulator.run(1.5, &seeds).unwrap();
        let count = |simulator: &Simulator, state: &str| {
            simulator.population().count_state("flu", state).unwrap()
        };
        let recovered = count(&simulator, "recovered");
        assert_eq!(count(&simulator, "dead"), 0);
        assert_eq!(count(&simulator, "infected"), 1000 - recovered);

        // Same seeds, same branches; the deaths have happened by now
        simulator.run(5.0, &seeds).unwrap();
        assert_eq!(count(&simulator, "recovered"), recovered);
        let dead = count(&simulator, "dead");
        assert_eq!(dead, 1000 - recovered);
        assert!((230..=370).contains(&dead), "dead = {dead}");
    }

    #[test]
    fn entering_a_terminal_state_cancels_pending_events() {
        let outcome = config(
            r#"{
                "label": "flu",
                "states": ["susceptible", "infected", "dead"],
                "susceptible_states": ["susceptible"],
                "infectious_states": ["infected"],
                "infection_state": "infected",
                "infection_probability": 0.0,
                "cancel_on_entry": ["dead"]
            }"#,
        );
        let mut simulator = Simulator::new(Population::new(2));
        simulator
            .add_disease(ProgressionDisease::new(outcome).unwrap(), "susceptible")
            .unwrap();
        let schedule = |simulator: &mut Simulator| -> Result<(), EpinetError> {
            simulator.schedule(5.0, Transition::new("flu", 0, 0, 1))?;
            simulator.schedule(1.0, Transition::new("flu", 0, 0, 2))?;
            simulator.schedule(5.0, Transition::new("flu", 1, 0, 1))?;
            Ok(())
        };
        simulator.add_intervention(0.0, AtStart(schedule)).unwrap();
        simulator.run(3.0, &Seeds::new().with("flu", 1)).unwrap();

        assert_eq!(
            simulator.population().get_state("flu", "dead").unwrap(),
            vec![0]
        );
        assert_eq!(simulator.pending_events(), 1);
        assert_eq!(simulator.peek().unwrap().event.agent(), Some(1));
    }

    #[test]
    fn quarantine_starts_on_entering_the_state() {
        let mut flu = config(
            r#"{
                "label": "flu",
                "states": ["susceptible", "infected"],
                "susceptible_states": ["susceptible"],
                "infectious_states": ["infected"],
                "infection_state": "infected",
                "infection_probability": 0.5,
                "quarantine": {"state": "infected", "probability": 1.0, "duration": 2.0},
                "modifiers": [{"kind": "quarantine"}]
            }"#,
        );
        flu.initial_cases = 5;
        let mut simulator = Simulator::new(Population::new(5));
        simulator
            .add_disease(ProgressionDisease::new(flu).unwrap(), "susceptible")
            .unwrap();
        assert!(matches!(
            simulator.run(1.0, &Seeds::new().with("flu", 4)),
            Err(EpinetError::MissingStream(label)) if label == "quarantine"
        ));

        let seeds = Seeds::new().with("flu", 4).with("quarantine", 5);
        let stats = simulator.run(1.0, &seeds).unwrap();
        assert_eq!(
            simulator.population().integers("quarantine").unwrap(),
            &[1; 5]
        );
        let started = Observation::TimePoint {
            time: 0.0,
            value: 1.0,
        };
        assert_eq!(stats["quarantine"], vec![started.clone(); 5]);

        let stats = simulator.run(3.0, &seeds).unwrap();
        assert_eq!(
            simulator.population().integers("quarantine").unwrap(),
            &[0; 5]
        );
        let ended = Observation::TimePoint {
            time: 2.0,
            value: -1.0,
        };
        assert_eq!(stats["quarantine"][..5], vec![started; 5][..]);
        assert_eq!(stats["quarantine"][5..], vec![ended; 5][..]);
    }

    #[test]
    fn imports_at_most_the_susceptible_agents() {
        let mut flu = sir_config();
        flu.initial_cases = 10;
        let initial = ["susceptible", "recovered", "susceptible"]
            .map(String::from)
            .to_vec();
        let mut simulator = Simulator::new(Population::new(3));
        simulator
            .add_disease(
                ProgressionDisease::new(flu).unwrap(),
                InitialStates::PerAgent(initial),
            )
            .unwrap();
        simulator.run(0.0, &Seeds::new().with("flu", 9)).unwrap();

        let population = simulator.population();
        assert_eq!(population.get_state("flu", "infected").unwrap(), vec![0, 2]);
        assert_eq!(population.get_state("flu", "recovered").unwrap(), vec![1]);
        // Both imported cases wait for their recovery
        assert_eq!(simulator.pending_events(), 2);
    }
}
