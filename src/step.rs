//! Periodic infection steps.
//!
//! A [`Step`] decides when diseases get to infect. The usual choice is
//! [`DailyStep`]: one step at time 0 and then every `step_size` up to the
//! stop time, each step infecting with every disease and recording counts.
use log::trace;

use crate::disease::Disease;
use crate::error::EpinetError;
use crate::event::Event;
use crate::simulator::Simulator;

pub trait Step {
    /// Schedules the first step(s) of a run.
    fn initialize(&self, simulator: &mut Simulator) -> Result<(), EpinetError>;
}

/// Infects at t = 0, `step_size`, `2 * step_size`, ... while `t <= stop_time`.
///
/// After infecting, each step records:
/// - `<disease>:<state>`: the number of agents in every state,
/// - `<disease>:states`: a copy of the disease's state array,
/// - `masking`: the number of masked agents,
/// - `<disease>_vaccine`: the number of vaccinated agents, when that column
///   exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyStep {
    step_size: f64,
}

impl DailyStep {
    pub fn new(step_size: f64) -> Result<DailyStep, EpinetError> {
        if !(step_size > 0.0 && step_size.is_finite()) {
            return Err(EpinetError::InvalidParameter(format!(
                "step size must be positive, got {step_size}"
            )));
        }
        Ok(DailyStep { step_size })
    }

    #[must_use]
    pub fn step_size(&self) -> f64 {
        self.step_size
    }
}

impl Default for DailyStep {
    fn default() -> Self {
        DailyStep { step_size: 1.0 }
    }
}

impl Step for DailyStep {
    fn initialize(&self, simulator: &mut Simulator) -> Result<(), EpinetError> {
        if simulator.stop_time().is_infinite() {
            return Err(EpinetError::UnboundedStep);
        }
        simulator.schedule(
            0.0,
            StepEvent {
                index: 0,
                step_size: self.step_size,
            },
        )?;
        Ok(())
    }
}

/// The `index`-th step, due at `index * step_size`.
struct StepEvent {
    index: u64,
    step_size: f64,
}

impl Event for StepEvent {
    fn execute(self: Box<Self>, simulator: &mut Simulator) -> Result<(), EpinetError> {
        trace!("step {} at t={}", self.index, simulator.now());
        let diseases: Vec<_> = simulator.population().diseases().cloned().collect();
        for disease in &diseases {
            disease.infect(simulator)?;
        }
        for disease in &diseases {
            collect_disease(simulator, disease.as_ref())?;
        }
        let masked = count_set(simulator, "masking");
        if let Some(masked) = masked {
            simulator.collect("masking", masked);
        }

        // Times are index * step_size, never accumulated
        let next = self.index + 1;
        #[allow(clippy::cast_precision_loss)]
        let time = next as f64 * self.step_size;
        if time <= simulator.stop_time() {
            simulator.schedule(
                time,
                StepEvent {
                    index: next,
                    step_size: self.step_size,
                },
            )?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "step"
    }
}

fn collect_disease(simulator: &mut Simulator, disease: &dyn Disease) -> Result<(), EpinetError> {
    let label = disease.label();
    let counts = simulator.population().state_counts(label)?;
    for (state, count) in counts {
        simulator.collect(&format!("{label}:{state}"), count);
    }
    let states = simulator.population().disease_states(label)?.to_vec();
    simulator.collect(&format!("{label}:states"), states);

    let vaccine_column = format!("{label}_vaccine");
    if let Some(vaccinated) = count_set(simulator, &vaccine_column) {
        simulator.collect(&vaccine_column, vaccinated);
    }
    Ok(())
}

/// Number of agents with a non-zero value, or `None` without such a column.
fn count_set(simulator: &Simulator, attribute: &str) -> Option<usize> {
    let population = simulator.population();
    let column = population.attribute(attribute).ok()?;
    Some((0..population.size()).filter(|&a| column.is_set(a)).count())
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::Seeds;
    use crate::population::Population;
    use crate::statistics::Observation;

    #[test]
    fn step_size_must_be_positive() {
        assert!(DailyStep::new(0.0).is_err());
        assert!(DailyStep::new(-1.0).is_err());
        assert!(DailyStep::new(f64::NAN).is_err());
        assert_eq!(DailyStep::new(0.5).unwrap().step_size(), 0.5);
    }

    #[test]
    fn steps_up_to_and_including_stop_time() {
        let mut simulator = Simulator::new(Population::new(4));
        simulator.set_step(DailyStep::default());
        let stats = simulator.run(3.0, &Seeds::new()).unwrap();
        // Steps at 0, 1, 2 and 3
        assert_eq!(stats["masking"], vec![Observation::Integer(0); 4]);
        assert_eq!(simulator.now(), 3.0);

        let stats = simulator.run(2.5, &Seeds::new()).unwrap();
        assert_eq!(stats["masking"].len(), 3);
        // Nothing was left to do after the step at 2
        assert_eq!(simulator.now(), 2.0);
    }

    #[test]
    fn many_small_steps() {
        let mut simulator = Simulator::new(Population::new(1));
        simulator.set_step(DailyStep::new(1e-6).unwrap());
        let stats = simulator.run(0.05, &Seeds::new()).unwrap();
        // 0, 1e-6, ..., 0.05 give 50_001 steps, give or take rounding at the end
        let steps = stats["masking"].len();
        assert!((50_000..=50_001).contains(&steps), "steps = {steps}");
    }

    #[test]
    fn fractional_steps() {
        let mut simulator = Simulator::new(Population::new(1));
        simulator.set_step(DailyStep::new(0.1).unwrap());
        let stats = simulator.run(1.0, &Seeds::new()).unwrap();
        assert_eq!(stats["masking"].len(), 11);
    }
}
