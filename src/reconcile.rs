/*!

Daily reconciliation of the agent population against the compartment trajectory.

Each day the trajectory says how big every compartment should be. The population only ever
moves agents *forward* (S -> E -> I -> {R, D}), so for each transition kind the number of
agents to move is the rounded target minus the current pool size, clamped at zero. The kinds
run in a fixed order, each measured against the pools as the previous kinds left them:

 1. recoveries and deaths, drawn uniformly from Infected;
 2. infections, drawn uniformly from Exposed (then Susceptible);
 3. exposures: a random infector is chosen from Infected (then Exposed) and the susceptible
    agent closest to it becomes exposed. The susceptible pool is re-queried after every
    exposure, so earlier exposures that day shape later ones.

A pool that cannot cover its request is not an error. The request is clamped or served by the
fallback pool, and the difference is recorded in the day's [`DayReconciliation`]. Whatever is
not realised today is not carried over; tomorrow's deltas are recomputed from scratch.

*/

use crate::{
    compartment::ContextCompartmentExt,
    context::{Context, DataPlugin},
    define_rng,
    error::SimError,
    logging::{debug, warn},
    parameters::ContextParametersExt,
    population::{AgentId, ContextPopulationExt, InfectionStatus, PerState, Population},
    random::ContextRandomExt,
};
use serde::{Deserialize, Serialize};
use InfectionStatus::*;

define_rng!(ReconciliationRng);

/// How a real-valued compartment size becomes an integer target.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaPolicy {
    /// Round half away from zero.
    #[default]
    Round,
    Floor,
}

impl DeltaPolicy {
    /// The integer compartment size for `value`. Negative and NaN values map to zero.
    #[must_use]
    pub fn target(self, value: f64) -> usize {
        let value = match self {
            DeltaPolicy::Round => value.round(),
            DeltaPolicy::Floor => value.floor(),
        };
        // `as` saturates: NaN becomes 0, negatives clamp to 0.
        value as usize
    }
}

/// How many agents must enter a compartment of size `current` to reach `value` under
/// `policy`. Never negative: the discrete population does not un-transition.
#[must_use]
pub fn target_delta(policy: DeltaPolicy, value: f64, current: usize) -> usize {
    policy.target(value).saturating_sub(current)
}

/// The kinds of transition, in the order they are applied each day.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    Recovery,
    Death,
    Infection,
    Exposure,
}

impl TransitionKind {
    pub const ORDER: [TransitionKind; 4] = [
        TransitionKind::Recovery,
        TransitionKind::Death,
        TransitionKind::Infection,
        TransitionKind::Exposure,
    ];

    #[must_use]
    pub fn destination(self) -> InfectionStatus {
        match self {
            TransitionKind::Recovery => Recovered,
            TransitionKind::Death => Dead,
            TransitionKind::Infection => Infected,
            TransitionKind::Exposure => Exposed,
        }
    }

    /// Pools the transitioning agents are drawn from, in fallback order. Exposures draw from
    /// Susceptible by proximity; their fallback chain applies to the infector instead.
    #[must_use]
    pub fn sources(self) -> &'static [InfectionStatus] {
        match self {
            TransitionKind::Recovery | TransitionKind::Death => &[Infected],
            TransitionKind::Infection => &[Exposed, Susceptible],
            TransitionKind::Exposure => &[Susceptible],
        }
    }
}

/// Where the infector for a new exposure is drawn from, in fallback order.
pub const INFECTOR_SOURCES: [InfectionStatus; 2] = [Infected, Exposed];

/// The result of one batch of transitions of a single kind.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
    pub applied: usize,
    /// Draws served by a fallback pool.
    pub fallback_draws: usize,
    /// Requested transitions that could not be realised.
    pub shortfall: usize,
}

/// What happened on one day of reconciliation. `requested` and `applied` are indexed by the
/// destination compartment; the susceptible entry is always zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DayReconciliation {
    pub day: usize,
    pub requested: PerState<usize>,
    pub applied: PerState<usize>,
    pub fallback_draws: usize,
    pub shortfall: usize,
    /// Set when Susceptible, Exposed and Infected were all empty before every requested
    /// transition was applied. The unapplied requests are counted in `shortfall`.
    pub exhausted: bool,
}

impl DayReconciliation {
    /// True when no agent changed state.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.values().iter().all(|&count| count == 0)
    }
}

/// Running totals over every reconciled day.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReconciliationStats {
    pub days: usize,
    pub transitions: PerState<usize>,
    pub fallback_draws: usize,
    pub shortfall: usize,
    pub exhausted_days: usize,
}

impl ReconciliationStats {
    fn record(&mut self, outcome: &DayReconciliation) {
        self.days += 1;
        for status in InfectionStatus::ALL {
            self.transitions[status] += outcome.applied[status];
        }
        self.fallback_draws += outcome.fallback_draws;
        self.shortfall += outcome.shortfall;
        if outcome.exhausted {
            self.exhausted_days += 1;
        }
    }
}

impl DataPlugin for ReconciliationStats {
    fn create() -> Self {
        ReconciliationStats::default()
    }
}

/// The first non-empty pool in `sources`, with its position in the chain.
fn first_available(population: &Population, sources: &[InfectionStatus]) -> Option<(usize, InfectionStatus)> {
    sources
        .iter()
        .copied()
        .enumerate()
        .find(|(_, status)| population.count(*status) > 0)
}

pub trait ContextReconcileExt {
    /// Moves agents between pools so the population tracks the trajectory row for `day`.
    fn reconcile(&mut self, day: usize) -> Result<DayReconciliation, SimError>;

    /// Moves up to `count` random infected agents to Recovered.
    fn assign_recovered(&mut self, count: usize) -> Result<Assignment, SimError>;

    /// Moves up to `count` random infected agents to Dead.
    fn assign_dead(&mut self, count: usize) -> Result<Assignment, SimError>;

    /// Moves `count` random exposed agents to Infected, taking any shortfall from Susceptible.
    fn assign_infected(&mut self, count: usize) -> Result<Assignment, SimError>;

    /// Exposes `count` susceptible agents, each the closest one to a randomly chosen infector.
    fn assign_exposed(&mut self, count: usize) -> Result<Assignment, SimError>;

    fn get_reconciliation_stats(&self) -> ReconciliationStats;
}

trait ContextReconcileExtInternal {
    fn draw_slot(&mut self, pool: InfectionStatus) -> usize;
    fn remove_infected(&mut self, count: usize, to: InfectionStatus) -> Result<Assignment, SimError>;
}

impl ContextReconcileExtInternal for Context {
    /// A uniformly random slot in `pool`, which must be non-empty.
    fn draw_slot(&mut self, pool: InfectionStatus) -> usize {
        let len = self.get_data_container_mut::<Population>().count(pool);
        self.sample_range::<ReconciliationRng, _, usize>(0..len)
    }

    fn remove_infected(&mut self, count: usize, to: InfectionStatus) -> Result<Assignment, SimError> {
        let available = self.get_data_container_mut::<Population>().count(Infected);
        let draws = count.min(available);
        if draws < count {
            let error = SimError::InsufficientPool {
                pool: Infected,
                requested: count,
                available,
            };
            warn!("{error}; moving {draws} to {to}");
        }

        for _ in 0..draws {
            let slot = self.draw_slot(Infected);
            self.get_data_container_mut::<Population>()
                .transition_at(Infected, slot, to)?;
        }

        Ok(Assignment {
            applied: draws,
            fallback_draws: 0,
            shortfall: count - draws,
        })
    }
}

impl ContextReconcileExt for Context {
    fn reconcile(&mut self, day: usize) -> Result<DayReconciliation, SimError> {
        let row = self.compartment_row(day)?;
        let policy = self
            .get_parameters()
            .map(|config| config.delta_policy)
            .unwrap_or_default();

        let mut outcome = DayReconciliation {
            day,
            ..DayReconciliation::default()
        };

        for kind in TransitionKind::ORDER {
            let status = kind.destination();
            let population = self.get_population()?;
            let requested = target_delta(policy, row[status], population.count(status));
            outcome.requested[status] = requested;
            if requested == 0 {
                continue;
            }

            let drained = [Susceptible, Exposed, Infected]
                .iter()
                .all(|pool| population.count(*pool) == 0);
            // No source pool left; later kinds are still measured into the shortfall.
            if drained {
                outcome.exhausted = true;
                outcome.shortfall += requested;
                continue;
            }

            let assignment = match kind {
                TransitionKind::Recovery => self.assign_recovered(requested)?,
                TransitionKind::Death => self.assign_dead(requested)?,
                TransitionKind::Infection => self.assign_infected(requested)?,
                TransitionKind::Exposure => self.assign_exposed(requested)?,
            };
            outcome.applied[status] = assignment.applied;
            outcome.fallback_draws += assignment.fallback_draws;
            outcome.shortfall += assignment.shortfall;
        }

        debug!(
            "day {day}: applied {:?}, counts {:?}",
            outcome.applied,
            self.get_population()?.counts()
        );
        self.get_data_container_mut::<ReconciliationStats>()
            .record(&outcome);
        Ok(outcome)
    }

    fn assign_recovered(&mut self, count: usize) -> Result<Assignment, SimError> {
        self.remove_infected(count, Recovered)
    }

    fn assign_dead(&mut self, count: usize) -> Result<Assignment, SimError> {
        self.remove_infected(count, Dead)
    }

    fn assign_infected(&mut self, count: usize) -> Result<Assignment, SimError> {
        let mut assignment = Assignment::default();
        let sources = TransitionKind::Infection.sources();

        for drawn in 0..count {
            let population = self.get_data_container_mut::<Population>();
            let Some((rank, source)) = first_available(population, sources) else {
                warn!("{}; {} infections not realised", SimError::EmptyPool(Susceptible), count - drawn);
                assignment.shortfall = count - drawn;
                break;
            };
            if rank > 0 {
                assignment.fallback_draws += 1;
            }

            let slot = self.draw_slot(source);
            self.get_data_container_mut::<Population>()
                .transition_at(source, slot, Infected)?;
            assignment.applied += 1;
        }

        if assignment.fallback_draws > 0 {
            warn!(
                "exposed pool short by {}; infected directly from susceptible",
                assignment.fallback_draws
            );
        }
        Ok(assignment)
    }

    fn assign_exposed(&mut self, count: usize) -> Result<Assignment, SimError> {
        let mut assignment = Assignment::default();

        for drawn in 0..count {
            let population = self.get_data_container_mut::<Population>();
            let Some((rank, infector_pool)) = first_available(population, &INFECTOR_SOURCES) else {
                warn!("no infected or exposed agent to expose from; {} exposures not realised", count - drawn);
                assignment.shortfall = count - drawn;
                break;
            };
            if rank > 0 {
                assignment.fallback_draws += 1;
            }

            let slot = self.draw_slot(infector_pool);
            let infector: AgentId = self.get_population()?.pool(infector_pool)[slot];
            let exposed = match self.find_closest(infector, Susceptible) {
                Ok(agent_id) => agent_id,
                Err(error @ SimError::EmptyPool(_)) => {
                    warn!("{error}; {} exposures not realised", count - drawn);
                    assignment.shortfall = count - drawn;
                    break;
                }
                Err(error) => return Err(error),
            };
            self.get_data_container_mut::<Population>()
                .transition(exposed, Exposed)?;
            assignment.applied += 1;
        }

        if assignment.fallback_draws > 0 {
            warn!(
                "no infected agents; {} infectors drawn from the exposed pool",
                assignment.fallback_draws
            );
        }
        Ok(assignment)
    }

    fn get_reconciliation_stats(&self) -> ReconciliationStats {
        self.get_data_container::<ReconciliationStats>()
            .cloned()
            .unwrap_or_default()
    }
}
