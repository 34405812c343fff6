use std::path::PathBuf;

use epinet::disease::ProgressionConfig;
use epinet::log::{info, set_log_level, LevelFilter};
use epinet::population::ProportionTable;
use epinet::{
    load_json, AttributeValues, DailyStep, EpinetError, LayerClosure, LayerSource, Masking,
    Observation, Population, ProgressionDisease, RunConfig, Simulator, Stream, Vaccination,
};
use indexmap::IndexMap;

const POPULATION_SIZE: usize = 1000;

fn count(series: &[Observation], day: usize) -> i64 {
    match series.get(day) {
        Some(Observation::Integer(value)) => *value,
        _ => 0,
    }
}

fn main() -> Result<(), EpinetError> {
    // Try running the following:
    // cargo run --example covid
    set_log_level(LevelFilter::Info);
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join("covid");
    let run: RunConfig = load_json(dir.join("run.json"))?;

    // Ages are categorical in the table; turn the codes back into years
    let table = ProportionTable::from_csv(dir.join("population.csv"))?;
    let population_seed = run.seeds.get("population").unwrap_or_default();
    let (mut population, codes) = Population::from_proportions(
        &table,
        POPULATION_SIZE,
        &mut Stream::new("population", population_seed),
    )?;
    let years_by_code: IndexMap<i64, i64> = codes["age"]
        .iter()
        .map(|(years, code)| {
            years
                .parse::<i64>()
                .map(|years| (*code, years))
                .map_err(|e| EpinetError::InvalidParameter(format!("age '{years}': {e}")))
        })
        .collect::<Result<_, _>>()?;
    let ages = population
        .integers("age")?
        .iter()
        .map(|code| years_by_code[code])
        .collect();
    population.add_attribute("age", AttributeValues::Integer(ages))?;

    let mut simulator = Simulator::new(population);
    let layers: IndexMap<String, LayerSource> = load_json(dir.join("layers.json"))?;
    for (label, source) in layers {
        simulator.add_layer(&label, source)?;
    }
    let covid: ProgressionConfig = load_json(dir.join("covid.json"))?;
    simulator.add_disease(ProgressionDisease::new(covid)?, "susceptible")?;

    simulator.add_intervention(3.0, Masking::coverage(0.2))?;
    simulator.add_intervention(10.0, LayerClosure::new("school", Some(21.0)))?;
    for day in [50.0, 55.0] {
        simulator.add_intervention(
            day,
            Vaccination::new("covid", (50.0, 65.0), 0.6, "recovered")?,
        )?;
    }
    simulator.set_step(DailyStep::default());

    let stats = simulator.run(run.stop_time, &run.seeds)?;
    info!("collected {} series", stats.len());

    let series = |label: &str| stats.get(label).map_or(&[][..], Vec::as_slice);
    let (s, e, i, r) = (
        series("covid:susceptible"),
        series("covid:exposed"),
        series("covid:infected"),
        series("covid:recovered"),
    );
    println!("day\tS\tE\tI\tR");
    for day in (0..s.len()).step_by(5) {
        println!(
            "{day}\t{}\t{}\t{}\t{}",
            count(s, day),
            count(e, day),
            count(i, day),
            count(r, day)
        );
    }
    let quarantines = stats.get("quarantine").map_or(0, Vec::len);
    println!("Simulation complete at t={} ({quarantines} quarantine changes)", simulator.now());
    Ok(())
}
