use crate::{
    context::Context,
    define_rng,
    error::SimError,
    logging::{debug, trace},
    parameters::ContextParametersExt,
    population::{AgentId, InfectionStatus, Population, data::grid_side},
    random::ContextRandomExt,
};
use rand::distr::Uniform;
use std::f64::consts::TAU;

define_rng!(SeedingRng);
define_rng!(MovementRng);

const MIN_AGE: u8 = 1;
const MAX_AGE: u8 = 100;

pub trait ContextPopulationExt {
    /// Builds the agent grid from the stored parameters and seeds the initial exposed,
    /// infected, recovered and dead agents uniformly at random.
    fn seed_population(&mut self) -> Result<(), SimError>;

    fn get_population(&self) -> Result<&Population, SimError>;

    /// Moves every agent one step in a uniformly random direction.
    fn move_agents(&mut self);

    /// The agent in `target` closest to `origin`, excluding `origin` itself.
    fn find_closest(&mut self, origin: AgentId, target: InfectionStatus) -> Result<AgentId, SimError>;
}

impl ContextPopulationExt for Context {
    fn seed_population(&mut self) -> Result<(), SimError> {
        let config = self.get_parameters()?.clone();
        let rates = &config.rates;
        // Checked before anything is drawn or allocated.
        grid_side(rates.total_population)?;

        trace!("seeding {} agents", rates.total_population);
        let age_distribution = Uniform::new_inclusive(MIN_AGE, MAX_AGE)
            .map_err(|e| SimError::InvalidParameters(e.to_string()))?;
        let ages: Vec<u8> = (0..rates.total_population)
            .map(|_| self.sample_distr::<SeedingRng, u8>(&age_distribution))
            .collect();

        let mut population = Population::from_grid(rates.total_population, config.step_size, &ages)?;
        population.set_neighbor_search(config.neighbor_search.build());

        let seeds = [
            (InfectionStatus::Exposed, rates.initial_exposed),
            (InfectionStatus::Infected, rates.initial_infected),
            (InfectionStatus::Recovered, rates.initial_recovered),
            (InfectionStatus::Dead, rates.initial_dead),
        ];
        for (status, count) in seeds {
            for _ in 0..count {
                let available = population.count(InfectionStatus::Susceptible);
                let slot = self.sample_range::<SeedingRng, _, usize>(0..available);
                population.place(slot, status);
            }
        }
        debug!("seeded population: {:?}", population.counts());

        *self.get_data_container_mut::<Population>() = population;
        Ok(())
    }

    fn get_population(&self) -> Result<&Population, SimError> {
        self.get_data_container::<Population>()
            .ok_or(SimError::NotInitialized("population"))
    }

    fn move_agents(&mut self) {
        let count = self
            .get_data_container::<Population>()
            .map_or(0, Population::len);
        let thetas: Vec<f64> = (0..count)
            .map(|_| self.sample_range::<MovementRng, _, f64>(0.0..TAU))
            .collect();
        self.get_data_container_mut::<Population>().move_agents(&thetas);
    }

    fn find_closest(&mut self, origin: AgentId, target: InfectionStatus) -> Result<AgentId, SimError> {
        self.get_data_container_mut::<Population>()
            .find_closest(origin, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{RateParameters, SimulationConfig};
    use crate::population::PerState;

    fn context_with(rates: RateParameters, seed: u64) -> Context {
        let mut context = Context::new();
        context.init_random(seed);
        context
            .set_parameters(SimulationConfig {
                rates,
                seed,
                ..SimulationConfig::default()
            })
            .unwrap();
        context
    }

    #[test]
    fn seeding_splits_the_population() {
        let rates = RateParameters {
            initial_exposed: 5,
            initial_infected: 3,
            initial_recovered: 2,
            initial_dead: 1,
            total_population: 400,
            ..RateParameters::default()
        };
        let mut context = context_with(rates, 11);
        context.seed_population().unwrap();

        let population = context.get_population().unwrap();
        assert_eq!(population.len(), 400);
        assert_eq!(population.counts(), PerState::new(389, 5, 3, 2, 1));
        population.check_invariants().unwrap();
        for agent in population.agents() {
            assert!((1..=100).contains(&agent.age()));
            assert_eq!(agent.step_size(), 0.1);
        }
    }

    #[test]
    fn seeding_can_leave_no_susceptibles() {
        let rates = RateParameters {
            initial_exposed: 2,
            initial_infected: 1,
            initial_recovered: 1,
            initial_dead: 0,
            total_population: 4,
            ..RateParameters::default()
        };
        let mut context = context_with(rates, 13);
        context.seed_population().unwrap();

        let population = context.get_population().unwrap();
        assert_eq!(population.counts(), PerState::new(0, 2, 1, 1, 0));
        population.check_invariants().unwrap();
    }

    #[test]
    fn single_agent_population() {
        let rates = RateParameters {
            initial_exposed: 1,
            total_population: 1,
            ..RateParameters::default()
        };
        let mut context = context_with(rates, 17);
        context.seed_population().unwrap();

        let population = context.get_population().unwrap();
        assert_eq!(population.counts(), PerState::new(0, 1, 0, 0, 0));
        assert_eq!(population.agent(AgentId(0)).position().x, 1.0);
    }

    #[test]
    fn non_square_population_fails_before_seeding() {
        let rates = RateParameters {
            total_population: 99,
            ..RateParameters::default()
        };
        let mut context = context_with(rates, 0);
        assert!(matches!(
            context.seed_population(),
            Err(SimError::InvalidPopulationSize(99))
        ));
        assert!(context.get_population().is_err());
    }

    #[test]
    fn seeding_is_reproducible() {
        let seeded_pool = |seed| {
            let mut context = context_with(RateParameters::default(), seed);
            context.seed_population().unwrap();
            context.get_population().unwrap().pool(InfectionStatus::Exposed).to_vec()
        };
        assert_eq!(seeded_pool(3), seeded_pool(3));
    }

    #[test]
    fn movement_keeps_step_size_and_states() {
        let mut context = context_with(RateParameters::default(), 5);
        context.seed_population().unwrap();
        let before: Vec<_> = context
            .get_population()
            .unwrap()
            .agents()
            .iter()
            .map(|agent| agent.position())
            .collect();

        context.move_agents();

        let population = context.get_population().unwrap();
        for (agent, old) in population.agents().iter().zip(before) {
            let dx = agent.position().x - old.x;
            let dy = agent.position().y - old.y;
            assert!(((dx * dx + dy * dy).sqrt() - 0.1).abs() < 1e-9);
        }
        assert_eq!(population.counts(), PerState::new(99, 1, 0, 0, 0));
    }
}
