#![allow(clippy::float_cmp)]

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use assert_approx_eq::assert_approx_eq;
use epinet::disease::ProgressionConfig;
use epinet::network::EdgeValues;
use epinet::{
    load_json, DailyStep, EpinetError, Graph, InitialStates, Intervention, LayerClosure,
    LayerSource, Observation, Population, ProgressionDisease, Seeds, Simulator, SimulatorState,
};

fn sir(infection_probability: f64, initial_cases: usize) -> ProgressionDisease {
    let mut config: ProgressionConfig = serde_json::from_str(
        r#"{
            "label": "flu",
            "states": ["susceptible", "infected", "recovered"],
            "susceptible_states": ["susceptible"],
            "infectious_states": ["infected"],
            "infection_state": "infected",
            "infection_probability": 0.0,
            "transitions": {
                "infected": [
                    {"to": "recovered", "delay": {"distribution": "exponential", "mean": 4.0}}
                ]
            }
        }"#,
    )
    .unwrap();
    config.infection_probability = infection_probability;
    config.initial_cases = initial_cases;
    ProgressionDisease::new(config).unwrap()
}

fn graph(n: usize, edges: &[(usize, usize)]) -> LayerSource {
    LayerSource::Graph(Graph::from_edges(n, edges.iter().copied()).unwrap())
}

fn outbreak() -> Simulator {
    let mut simulator = Simulator::new(Population::new(300));
    simulator
        .add_layer("community", LayerSource::Barabasi { m: 3, seed: 17 })
        .unwrap();
    simulator
        .add_layer("work", LayerSource::ErdosRenyi { p: 0.01, seed: 18 })
        .unwrap();
    simulator.add_disease(sir(0.1, 5), "susceptible").unwrap();
    simulator.set_step(DailyStep::default());
    simulator
        .add_intervention(10.0, LayerClosure::new("work", Some(10.0)))
        .unwrap();
    simulator
}

#[test]
fn same_seeds_same_statistics() {
    let seeds = Seeds::new().with("flu", 2024);
    let mut first = outbreak();
    let a = first.run(40.0, &seeds).unwrap();
    // Again on the same simulator, and on a fresh one
    let b = first.run(40.0, &seeds).unwrap();
    let c = outbreak().run(40.0, &seeds).unwrap();

    assert!(!a.is_empty());
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert_eq!(a["flu:susceptible"].len(), 41);
}

#[test]
fn counts_always_add_up_to_the_population() {
    let stats = outbreak().run(30.0, &Seeds::new().with("flu", 7)).unwrap();
    let value = |label: &str, day: usize| match &stats[label][day] {
        Observation::Integer(v) => *v,
        other => panic!("unexpected observation {other:?}"),
    };
    for day in 0..=30 {
        let total = value("flu:susceptible", day)
            + value("flu:infected", day)
            + value("flu:recovered", day);
        assert_eq!(total, 300);
        let Observation::States(states) = &stats["flu:states"][day] else {
            panic!("expected a state array");
        };
        assert_eq!(states.len(), 300);
        assert!(states.iter().all(|&code| code < 3));
    }
    // The step at time 0 runs before the cases are imported
    assert_eq!(value("flu:susceptible", 0), 300);
    assert!(value("flu:susceptible", 1) <= 295);
}

#[test]
fn missing_disease_seed() {
    let mut simulator = outbreak();
    let result = simulator.run(10.0, &Seeds::new().with("masking", 1));
    assert!(matches!(
        result,
        Err(EpinetError::MissingSeed { disease }) if disease == "flu"
    ));
    assert_eq!(simulator.now(), 0.0);
    assert_eq!(simulator.state(), SimulatorState::Idle);
    assert_eq!(
        simulator.population().count_state("flu", "susceptible").unwrap(),
        300
    );
}

#[test]
fn probabilities_compose_over_active_layers() {
    let mut population = Population::new(3);
    population.add_layer("home", graph(3, &[(0, 1)])).unwrap();
    population.add_layer("work", graph(3, &[(0, 2)])).unwrap();
    let states = ["susceptible", "infected", "infected"]
        .map(String::from)
        .to_vec();
    population
        .introduce_disease(Rc::new(sir(0.3, 0)), InitialStates::PerAgent(states))
        .unwrap();
    population
        .network_mut()
        .add_attributes_edges("work", "flu", EdgeValues::Uniform(0.5), None)
        .unwrap();

    let risk = population
        .get_transmission_probabilities("flu", &["susceptible"], &["infected"])
        .unwrap();
    assert_eq!(risk.agents, vec![0]);
    assert_approx_eq!(risk.probabilities[0], 0.65);

    population.network_mut().deactivate_layer("home").unwrap();
    let risk = population
        .get_transmission_probabilities("flu", &["susceptible"], &["infected"])
        .unwrap();
    assert_approx_eq!(risk.probabilities[0], 0.5);
}

#[test]
fn no_infectious_agents_no_risk() {
    let mut population = Population::new(50);
    population
        .add_layer("community", LayerSource::KRegular { k: 4, seed: 3 })
        .unwrap();
    population
        .introduce_disease(Rc::new(sir(0.9, 0)), "susceptible".into())
        .unwrap();
    let risk = population
        .get_transmission_probabilities("flu", &["susceptible"], &["infected"])
        .unwrap();
    assert!(risk.agents.is_empty());
    assert!(risk.probabilities.is_empty());
}

#[test]
fn closed_layer_carries_no_infection() {
    // 0 - 1 at home, 1 - 2 - 3 at work; agent 0 stays infected forever
    let mut config: ProgressionConfig = serde_json::from_str(
        r#"{
            "label": "flu",
            "states": ["susceptible", "infected"],
            "susceptible_states": ["susceptible"],
            "infectious_states": ["infected"],
            "infection_state": "infected",
            "infection_probability": 1.0
        }"#,
    )
    .unwrap();
    config.initial_cases = 0;
    let initial = ["infected", "susceptible", "susceptible", "susceptible"]
        .map(String::from)
        .to_vec();
    let build = |close_work: bool| {
        let mut simulator = Simulator::new(Population::new(4));
        simulator.add_layer("home", graph(4, &[(0, 1)])).unwrap();
        simulator.add_layer("work", graph(4, &[(1, 2), (2, 3)])).unwrap();
        simulator
            .add_disease(
                ProgressionDisease::new(config.clone()).unwrap(),
                InitialStates::PerAgent(initial.clone()),
            )
            .unwrap();
        simulator.set_step(DailyStep::default());
        if close_work {
            simulator
                .add_intervention(0.0, LayerClosure::new("work", None))
                .unwrap();
        }
        simulator
    };
    let seeds = Seeds::new().with("flu", 1);

    let mut open = build(false);
    open.run(5.0, &seeds).unwrap();
    assert_eq!(open.population().count_state("flu", "infected").unwrap(), 4);

    let mut closed = build(true);
    closed.run(5.0, &seeds).unwrap();
    assert_eq!(
        closed.population().get_state("flu", "infected").unwrap(),
        vec![0, 1]
    );
    assert_eq!(
        closed
            .population()
            .network()
            .get_neighborhood(&[2], None)
            .unwrap(),
        vec![Vec::<usize>::new()]
    );
}

#[test]
fn events_run_in_time_order_with_fifo_ties() {
    struct Plans {
        log: Rc<RefCell<Vec<(f64, &'static str)>>>,
    }

    impl Intervention for Plans {
        fn name(&self) -> &str {
            "plans"
        }

        fn apply(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
            for (time, name) in [(3.0, "c"), (1.0, "a"), (3.0, "d"), (2.0, "b"), (1.0, "a2")] {
                let log = Rc::clone(&self.log);
                simulator.add_plan(time, move |simulator| {
                    log.borrow_mut().push((simulator.now(), name));
                    Ok(())
                })?;
            }
            Ok(())
        }
    }

    let log = Rc::new(RefCell::new(Vec::new()));
    let mut simulator = Simulator::new(Population::new(1));
    simulator
        .add_intervention(
            0.0,
            Plans {
                log: Rc::clone(&log),
            },
        )
        .unwrap();
    simulator.run(10.0, &Seeds::new()).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![(1.0, "a"), (1.0, "a2"), (2.0, "b"), (3.0, "c"), (3.0, "d")]
    );
}

#[test]
fn scheduling_before_now_is_rejected() {
    struct Backwards;

    impl Intervention for Backwards {
        fn name(&self) -> &str {
            "backwards"
        }

        fn apply(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
            simulator.add_plan(simulator.now() - 1.0, |_| Ok(()))?;
            Ok(())
        }
    }

    let mut simulator = Simulator::new(Population::new(1));
    simulator.add_intervention(4.0, Backwards).unwrap();
    assert!(matches!(
        simulator.run(10.0, &Seeds::new()),
        Err(EpinetError::CausalityViolation { time, now }) if time == 3.0 && now == 4.0
    ));
    assert_eq!(simulator.state(), SimulatorState::Stopped);
}

#[test]
fn demo_covid_model_runs() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join("covid");
    let config: ProgressionConfig = load_json(dir.join("covid.json")).unwrap();
    let seeds: Seeds = load_json::<epinet::RunConfig>(dir.join("run.json"))
        .unwrap()
        .seeds;

    let mut simulator = Simulator::new(Population::new(200));
    simulator
        .add_layer("community", LayerSource::Barabasi { m: 2, seed: 5 })
        .unwrap();
    simulator
        .add_disease(ProgressionDisease::new(config).unwrap(), "susceptible")
        .unwrap();
    simulator.set_step(DailyStep::default());
    let stats = simulator.run(20.0, &seeds).unwrap();

    assert_eq!(stats["covid:exposed"].len(), 21);
    let population = simulator.population();
    assert_eq!(population.integers("covid_vaccine").unwrap().len(), 200);
    let touched = 200 - population.count_state("covid", "susceptible").unwrap();
    assert!(touched >= 5);
}
