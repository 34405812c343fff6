//! The simulation clock and driver loop.
//!
//! A [`Simulator`] owns the population, the event queue, the random streams
//! and the statistics of the current run. Models are assembled before the
//! first run (diseases, layers, interventions, a step) and [`Simulator::run`]
//! then drains events in time order until the stop time is passed or nothing
//! is left to do.
//!
//! Runs are reproducible: the population as configured before the first run
//! is kept aside, and every run starts again from it with freshly seeded
//! streams, so two runs with the same seeds produce the same statistics.
use std::rc::Rc;

use log::{debug, info, trace};

use crate::config::Seeds;
use crate::disease::Disease;
use crate::error::EpinetError;
use crate::event::{CallbackEvent, Event, EventId, PendingEvent, Scheduler};
use crate::intervention::{ApplyIntervention, Intervention};
use crate::network::LayerSource;
use crate::population::{AgentId, InitialStates, Population};
use crate::random::{Stream, Streams};
use crate::statistics::{Observation, Statistics, StatsCollector};
use crate::step::Step;

/// Lifecycle of a simulator. `Stopped` is reached at the end of every run,
/// successful or not; a new run starts over from `Initialized`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimulatorState {
    Idle,
    Initialized,
    Running,
    Stopped,
}

pub struct Simulator {
    population: Population,
    baseline: Option<Population>,
    scheduler: Scheduler,
    streams: Streams,
    stats: StatsCollector,
    interventions: Vec<(f64, Rc<dyn Intervention>)>,
    step: Option<Rc<dyn Step>>,
    current_time: f64,
    stop_time: f64,
    state: SimulatorState,
}

impl Simulator {
    #[must_use]
    pub fn new(population: Population) -> Simulator {
        Simulator {
            population,
            baseline: None,
            scheduler: Scheduler::new(),
            streams: Streams::new(),
            stats: StatsCollector::new(),
            interventions: Vec::new(),
            step: None,
            current_time: 0.0,
            stop_time: 0.0,
            state: SimulatorState::Idle,
        }
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Mutable access to the population.
    ///
    /// Outside of a run this is the population every run starts from: what
    /// the last run left behind is discarded first, and changes become part
    /// of the starting point of the next run.
    pub fn population_mut(&mut self) -> &mut Population {
        if matches!(self.state, SimulatorState::Idle | SimulatorState::Stopped) {
            if let Some(baseline) = self.baseline.take() {
                self.population = baseline;
            }
        }
        &mut self.population
    }

    /// Introduces a disease into the population.
    pub fn add_disease(
        &mut self,
        disease: impl Disease,
        initial: impl Into<InitialStates>,
    ) -> Result<(), EpinetError> {
        self.population_mut()
            .introduce_disease(Rc::new(disease), initial.into())
    }

    pub fn add_layer(&mut self, label: &str, source: LayerSource) -> Result<(), EpinetError> {
        self.population_mut().add_layer(label, source)
    }

    /// Registers an intervention applied at `time` in every run.
    pub fn add_intervention(
        &mut self,
        time: f64,
        intervention: impl Intervention + 'static,
    ) -> Result<(), EpinetError> {
        if !time.is_finite() || time < 0.0 {
            return Err(EpinetError::InvalidTime(time));
        }
        self.interventions.push((time, Rc::new(intervention)));
        Ok(())
    }

    /// Sets the step driving infections; replaces any previous one.
    pub fn set_step(&mut self, step: impl Step + 'static) {
        self.step = Some(Rc::new(step));
    }

    // Scheduling

    /// Schedules an event at `time`, which can't be earlier than `now()`.
    pub fn schedule(&mut self, time: f64, event: impl Event) -> Result<EventId, EpinetError> {
        self.schedule_boxed(time, Box::new(event))
    }

    pub fn schedule_boxed(
        &mut self,
        time: f64,
        event: Box<dyn Event>,
    ) -> Result<EventId, EpinetError> {
        if time < self.current_time {
            return Err(EpinetError::CausalityViolation {
                time,
                now: self.current_time,
            });
        }
        self.scheduler.add(time, event)
    }

    /// Schedules a closure as an event.
    pub fn add_plan(
        &mut self,
        time: f64,
        callback: impl FnOnce(&mut Simulator) -> Result<(), EpinetError> + 'static,
    ) -> Result<EventId, EpinetError> {
        self.schedule(time, CallbackEvent::new("plan", callback))
    }

    /// Removes a pending event; `None` if it already ran or was cancelled.
    pub fn cancel(&mut self, id: EventId) -> Option<Box<dyn Event>> {
        self.scheduler.cancel(id)
    }

    pub fn peek(&mut self) -> Option<PendingEvent<'_>> {
        self.scheduler.peek()
    }

    /// Ids of the pending events matching `predicate`, in execution order.
    pub fn find(
        &self,
        predicate: impl FnMut(f64, &(dyn Event + 'static)) -> bool,
    ) -> Vec<EventId> {
        self.scheduler.find(predicate)
    }

    /// Cancels every pending event matching `predicate` and returns how many
    /// there were.
    pub fn cancel_where(
        &mut self,
        predicate: impl FnMut(f64, &(dyn Event + 'static)) -> bool,
    ) -> usize {
        let ids = self.scheduler.find(predicate);
        for id in &ids {
            self.scheduler.cancel(*id);
        }
        ids.len()
    }

    /// Cancels the pending events about `agent`, only those of `disease` if
    /// one is given.
    pub fn cancel_agent_events(&mut self, agent: AgentId, disease: Option<&str>) -> usize {
        self.cancel_where(|_, event| {
            event.agent() == Some(agent) && disease.is_none_or(|d| event.disease() == Some(d))
        })
    }

    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    /// Executes the earliest pending event, advancing the clock to its time.
    /// Returns `false` if there was nothing to execute.
    pub fn pop_and_execute(&mut self) -> Result<bool, EpinetError> {
        let Some((_, time, event)) = self.scheduler.pop() else {
            return Ok(false);
        };
        self.current_time = time;
        trace!("executing {:?} at {time}", &*event);
        event.execute(self)?;
        Ok(true)
    }

    // Run state

    #[must_use]
    pub fn now(&self) -> f64 {
        self.current_time
    }

    /// Stop time of the current (or last) run.
    #[must_use]
    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    #[must_use]
    pub fn state(&self) -> SimulatorState {
        self.state
    }

    /// The random stream bound under `label` for this run.
    pub fn stream(&mut self, label: &str) -> Result<&mut Stream, EpinetError> {
        self.streams.get_mut(label)
    }

    pub fn collect(&mut self, label: &str, observation: impl Into<Observation>) {
        self.stats.collect(label, observation);
    }

    /// Runs the model from time 0 until `stop_time` and returns what was
    /// collected.
    ///
    /// Every disease must have a seed under its label; the run fails with
    /// `MissingSeed` before anything is touched otherwise. Streams the
    /// diseases and interventions declare they draw from must be seeded too
    /// (`MissingStream`). Any other seed binds the stream of the same label.
    /// An event that fails aborts the run and its error is returned.
    pub fn run(&mut self, stop_time: f64, seeds: &Seeds) -> Result<Statistics, EpinetError> {
        if stop_time.is_nan() || stop_time < 0.0 {
            return Err(EpinetError::InvalidTime(stop_time));
        }
        if let Some(disease) = self
            .population
            .disease_labels()
            .find(|label| !seeds.contains(label))
        {
            return Err(EpinetError::MissingSeed {
                disease: disease.to_string(),
            });
        }
        if let Some(label) = self
            .required_streams()
            .into_iter()
            .find(|label| !seeds.contains(label))
        {
            return Err(EpinetError::MissingStream(label));
        }
        if self.step.is_some() && stop_time.is_infinite() {
            return Err(EpinetError::UnboundedStep);
        }

        if let Some(baseline) = &self.baseline {
            self.population = baseline.clone();
        } else {
            self.baseline = Some(self.population.clone());
        }
        self.current_time = 0.0;
        self.stop_time = stop_time;
        self.scheduler.clear();
        self.stats.clear();
        self.streams.clear();
        for (label, seed) in seeds.iter() {
            self.streams.bind(label, seed);
        }
        self.state = SimulatorState::Initialized;
        info!(
            "starting run until t={stop_time} ({} agents, {} seeds)",
            self.population.size(),
            seeds.len()
        );

        let result = self.initialize_run().and_then(|()| self.drain());
        self.state = SimulatorState::Stopped;
        result?;
        info!("run stopped at t={}", self.current_time);
        Ok(self.stats.take())
    }

    fn required_streams(&self) -> Vec<String> {
        let diseases = self.population.diseases().flat_map(|d| d.required_streams());
        let interventions = self
            .interventions
            .iter()
            .flat_map(|(_, intervention)| intervention.required_streams());
        diseases.chain(interventions).collect()
    }

    fn initialize_run(&mut self) -> Result<(), EpinetError> {
        if let Some(step) = self.step.clone() {
            step.initialize(self)?;
        }
        for (time, intervention) in self.interventions.clone() {
            debug!("scheduling intervention '{}' at {time}", intervention.name());
            self.schedule(time, ApplyIntervention::new(intervention))?;
        }
        let diseases: Vec<Rc<dyn Disease>> = self.population.diseases().cloned().collect();
        for disease in diseases {
            disease.schedule_initial_events(self)?;
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), EpinetError> {
        self.state = SimulatorState::Running;
        loop {
            match self.scheduler.peek() {
                Some(next) if next.time <= self.stop_time => {}
                Some(_) => {
                    self.current_time = self.stop_time;
                    break;
                }
                None => break,
            }
            self.pop_and_execute()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::disease::StateSet;

    fn add_plan(
        simulator: &mut Simulator,
        time: f64,
        value: u32,
        log: &Rc<RefCell<Vec<u32>>>,
    ) -> EventId {
        let log = Rc::clone(log);
        simulator
            .add_plan(time, move |_| {
                log.borrow_mut().push(value);
                Ok(())
            })
            .unwrap()
    }

    struct Inert {
        states: StateSet,
    }

    impl Disease for Inert {
        fn label(&self) -> &str {
            "inert"
        }

        fn states(&self) -> &StateSet {
            &self.states
        }

        fn infection_probability(&self) -> f64 {
            0.0
        }

        fn infect(&self, _simulator: &mut Simulator) -> Result<(), EpinetError> {
            Ok(())
        }
    }

    struct Schedule {
        times: Vec<f64>,
        log: Rc<RefCell<Vec<u32>>>,
    }

    impl Intervention for Schedule {
        fn name(&self) -> &str {
            "schedule"
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        fn apply(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
            for &time in &self.times {
                add_plan(simulator, time, time as u32, &self.log);
            }
            Ok(())
        }
    }

    struct Infect {
        agents: Vec<AgentId>,
    }

    impl Intervention for Infect {
        fn name(&self) -> &str {
            "infect"
        }

        fn apply(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
            simulator
                .population_mut()
                .change_state(&self.agents, "inert", "infected")
        }
    }

    fn inert() -> Inert {
        Inert {
            states: StateSet::new(&["susceptible", "infected"]).unwrap(),
        }
    }

    #[test]
    fn empty_simulator() {
        let mut simulator = Simulator::new(Population::new(1));
        assert_eq!(simulator.state(), SimulatorState::Idle);
        let stats = simulator.run(10.0, &Seeds::new()).unwrap();
        assert!(stats.is_empty());
        assert_eq!(simulator.now(), 0.0);
        assert_eq!(simulator.state(), SimulatorState::Stopped);
    }

    #[test]
    fn invalid_plan_times() {
        let mut simulator = Simulator::new(Population::new(1));
        for time in [-1.0, f64::INFINITY, f64::NAN] {
            assert!(simulator.add_plan(time, |_| Ok(())).is_err());
        }
    }

    #[test]
    fn timed_plans_run_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut simulator = Simulator::new(Population::new(1));
        add_plan(&mut simulator, 2.0, 2, &log);
        add_plan(&mut simulator, 1.0, 1, &log);
        add_plan(&mut simulator, 1.0, 3, &log);
        while simulator.pop_and_execute().unwrap() {}
        assert_eq!(*log.borrow(), vec![1, 3, 2]);
        assert_eq!(simulator.now(), 2.0);
        assert!(!simulator.pop_and_execute().unwrap());
    }

    #[test]
    fn plan_adds_plan() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut simulator = Simulator::new(Population::new(1));
        let inner = Rc::clone(&log);
        simulator
            .add_plan(1.0, move |simulator| {
                inner.borrow_mut().push(1);
                let inner = Rc::clone(&inner);
                simulator.add_plan(1.5, move |_| {
                    inner.borrow_mut().push(2);
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();
        while simulator.pop_and_execute().unwrap() {}
        assert_eq!(*log.borrow(), vec![1, 2]);
        assert_eq!(simulator.now(), 1.5);
    }

    #[test]
    fn scheduling_in_the_past_fails() {
        let mut simulator = Simulator::new(Population::new(1));
        simulator
            .add_plan(2.0, |simulator| {
                simulator.add_plan(1.0, |_| Ok(()))?;
                Ok(())
            })
            .unwrap();
        assert!(matches!(
            simulator.pop_and_execute(),
            Err(EpinetError::CausalityViolation { time, now }) if time == 1.0 && now == 2.0
        ));
    }

    #[test]
    fn cancel_plan() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut simulator = Simulator::new(Population::new(1));
        let id = add_plan(&mut simulator, 1.0, 1, &log);
        add_plan(&mut simulator, 2.0, 2, &log);
        assert!(simulator.cancel(id).is_some());
        assert!(simulator.cancel(id).is_none());
        while simulator.pop_and_execute().unwrap() {}
        assert_eq!(*log.borrow(), vec![2]);
    }

    #[test]
    fn run_stops_at_stop_time() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut simulator = Simulator::new(Population::new(1));
        simulator
            .add_intervention(
                0.0,
                Schedule {
                    times: vec![3.0, 5.0, 8.0],
                    log: Rc::clone(&log),
                },
            )
            .unwrap();
        simulator.run(5.0, &Seeds::new()).unwrap();
        assert_eq!(*log.borrow(), vec![3, 5]);
        assert_eq!(simulator.now(), 5.0);
        assert_eq!(simulator.stop_time(), 5.0);
        // The event past the stop time is still pending
        assert_eq!(simulator.pending_events(), 1);

        // A second run starts over
        simulator.run(4.0, &Seeds::new()).unwrap();
        assert_eq!(*log.borrow(), vec![3, 5, 3]);
        assert_eq!(simulator.now(), 4.0);
    }

    #[test]
    fn failing_event_aborts_the_run() {
        let mut simulator = Simulator::new(Population::new(1));
        simulator
            .add_intervention(1.0, crate::intervention::LayerClosure::new("school", None))
            .unwrap();
        assert!(matches!(
            simulator.run(5.0, &Seeds::new()),
            Err(EpinetError::UnknownLayer(label)) if label == "school"
        ));
        assert_eq!(simulator.state(), SimulatorState::Stopped);
        assert_eq!(simulator.now(), 1.0);
    }

    #[test]
    fn missing_seed_is_reported_before_running() {
        let mut simulator = Simulator::new(Population::new(3));
        simulator.add_disease(inert(), "susceptible").unwrap();
        simulator.add_plan(1.0, |_| Ok(())).unwrap();
        assert!(matches!(
            simulator.run(10.0, &Seeds::new().with("masking", 1)),
            Err(EpinetError::MissingSeed { disease }) if disease == "inert"
        ));
        assert_eq!(simulator.state(), SimulatorState::Idle);
        assert_eq!(simulator.now(), 0.0);
        assert_eq!(simulator.pending_events(), 1);
    }

    #[test]
    fn streams_are_bound_from_seeds() {
        let mut simulator = Simulator::new(Population::new(3));
        simulator.add_disease(inert(), "susceptible").unwrap();
        let seeds = Seeds::new().with("inert", 5).with("masking", 6);
        simulator.run(1.0, &seeds).unwrap();
        assert_eq!(simulator.stream("inert").unwrap().seed(), 5);
        assert_eq!(simulator.stream("masking").unwrap().seed(), 6);
        assert!(matches!(
            simulator.stream("vaccination"),
            Err(EpinetError::MissingStream(_))
        ));
    }

    #[test]
    fn each_run_starts_from_the_configured_population() {
        let mut simulator = Simulator::new(Population::new(3));
        simulator.add_disease(inert(), "susceptible").unwrap();
        simulator
            .add_intervention(1.0, Infect { agents: vec![0] })
            .unwrap();
        let seeds = Seeds::new().with("inert", 1);
        for _ in 0..2 {
            simulator.run(2.0, &seeds).unwrap();
            assert_eq!(
                simulator.population().get_state("inert", "infected").unwrap(),
                vec![0]
            );
        }
        assert_eq!(simulator.state(), SimulatorState::Stopped);

        // Changes made between runs apply to the configured population, not
        // to what the last run left behind
        simulator
            .population_mut()
            .change_state(&[2], "inert", "infected")
            .unwrap();
        assert_eq!(
            simulator.population().get_state("inert", "infected").unwrap(),
            vec![2]
        );
        simulator.run(0.5, &seeds).unwrap();
        assert_eq!(
            simulator.population().get_state("inert", "infected").unwrap(),
            vec![2]
        );
        simulator.run(2.0, &seeds).unwrap();
        assert_eq!(
            simulator.population().get_state("inert", "infected").unwrap(),
            vec![0, 2]
        );
    }

    #[test]
    fn adding_a_layer_after_a_run_keeps_the_initial_states() {
        let mut simulator = Simulator::new(Population::new(4));
        simulator.add_disease(inert(), "susceptible").unwrap();
        simulator
            .add_intervention(0.0, Infect { agents: vec![1, 3] })
            .unwrap();
        let seeds = Seeds::new().with("inert", 1);
        simulator.run(1.0, &seeds).unwrap();
        assert_eq!(simulator.population().count_state("inert", "infected").unwrap(), 2);

        simulator
            .add_layer("home", LayerSource::Graph(crate::network::Graph::new(4)))
            .unwrap();
        assert_eq!(simulator.population().count_state("inert", "infected").unwrap(), 0);
        simulator.run(1.0, &seeds).unwrap();
        assert_eq!(
            simulator.population().get_state("inert", "infected").unwrap(),
            vec![1, 3]
        );
        assert!(simulator.population().network().is_active("home").unwrap());
    }

    #[test]
    fn unseeded_intervention_stream_fails_before_running() {
        let mut simulator = Simulator::new(Population::new(10));
        simulator.add_disease(inert(), "susceptible").unwrap();
        simulator
            .add_intervention(5.0, crate::intervention::Masking::coverage(0.5))
            .unwrap();
        assert!(matches!(
            simulator.run(10.0, &Seeds::new().with("inert", 1)),
            Err(EpinetError::MissingStream(label)) if label == "masking"
        ));
        assert_eq!(simulator.now(), 0.0);
        assert_eq!(simulator.state(), SimulatorState::Idle);

        let stats = simulator
            .run(10.0, &Seeds::new().with("inert", 1).with("masking", 2))
            .unwrap();
        assert!(stats.is_empty());
        assert_eq!(simulator.now(), 5.0);
    }

    #[test]
    fn infinite_stop_time_with_step() {
        let mut simulator = Simulator::new(Population::new(1));
        simulator.set_step(crate::step::DailyStep::default());
        assert!(matches!(
            simulator.run(f64::INFINITY, &Seeds::new()),
            Err(EpinetError::UnboundedStep)
        ));
    }

    #[test]
    fn cancel_agent_events_by_disease() {
        let mut simulator = Simulator::new(Population::new(3));
        simulator.add_disease(inert(), "susceptible").unwrap();
        simulator
            .schedule(1.0, crate::disease::Transition::new("inert", 0, 0, 1))
            .unwrap();
        simulator
            .schedule(2.0, crate::disease::Transition::new("inert", 0, 1, 0))
            .unwrap();
        simulator
            .schedule(2.0, crate::disease::Transition::new("other", 0, 1, 0))
            .unwrap();
        simulator
            .schedule(2.0, crate::disease::Transition::new("inert", 1, 0, 1))
            .unwrap();

        assert_eq!(simulator.cancel_agent_events(0, Some("inert")), 2);
        assert_eq!(simulator.cancel_agent_events(0, None), 1);
        assert_eq!(simulator.find(|_, event| event.agent() == Some(1)).len(), 1);
        assert_eq!(simulator.peek().unwrap().time, 2.0);
    }
}
