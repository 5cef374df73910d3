//! The daily driver: move everyone, reconcile against the trajectory, publish a snapshot.
//!
//! A [`Snapshot`] is an owned copy of the population taken after reconciliation, so observers
//! never see a day half-applied and never hold on to live agent state.

use crate::{
    compartment::{CompartmentRow, ContextCompartmentExt},
    context::{Context, DataPlugin},
    error::SimError,
    logging::{info, trace},
    parameters::{ContextParametersExt, SimulationConfig},
    population::{ContextPopulationExt, InfectionStatus, PerState, Position, grid_side},
    random::ContextRandomExt,
    reconcile::{ContextReconcileExt, DayReconciliation, ReconciliationStats},
};
use serde::Serialize;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulationClock {
    /// The next day to simulate.
    day: usize,
    horizon_days: usize,
}

impl SimulationClock {
    #[must_use]
    pub fn day(&self) -> usize {
        self.day
    }

    #[must_use]
    pub fn horizon_days(&self) -> usize {
        self.horizon_days
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.day >= self.horizon_days
    }
}

impl DataPlugin for SimulationClock {
    fn create() -> Self {
        SimulationClock::default()
    }
}

/// The population as it stood at the end of one day.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub day: usize,
    pub positions: PerState<Vec<Position>>,
    pub counts: PerState<usize>,
    /// The trajectory row the day was reconciled against.
    pub targets: CompartmentRow,
    pub reconciliation: DayReconciliation,
}

/// Receives one snapshot per simulated day, in order.
pub trait SnapshotObserver {
    fn observe(&mut self, snapshot: &Snapshot) -> Result<(), SimError>;
}

impl SnapshotObserver for Vec<Snapshot> {
    fn observe(&mut self, snapshot: &Snapshot) -> Result<(), SimError> {
        self.push(snapshot.clone());
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub days: usize,
    pub final_counts: PerState<usize>,
    pub stats: ReconciliationStats,
}

pub trait ContextSimulationExt {
    /// Validates `config`, seeds the random streams, integrates the trajectory and builds the
    /// initial population. An invalid `config` is rejected before anything is stored.
    fn init_simulation(&mut self, config: SimulationConfig) -> Result<(), SimError>;

    /// Runs the next day and returns its snapshot, or `None` once the horizon is reached.
    fn step_day(&mut self) -> Result<Option<Snapshot>, SimError>;

    /// Runs every remaining day, handing each snapshot to `observer`.
    fn run_simulation(&mut self, observer: &mut dyn SnapshotObserver) -> Result<RunSummary, SimError>;

    /// The current population alongside the trajectory row for `day`.
    fn snapshot(&self, day: usize, reconciliation: DayReconciliation) -> Result<Snapshot, SimError>;

    fn get_clock(&self) -> SimulationClock;
}

impl ContextSimulationExt for Context {
    fn init_simulation(&mut self, config: SimulationConfig) -> Result<(), SimError> {
        config.validate()?;
        grid_side(config.rates.total_population)?;
        let seed = config.seed;
        let horizon_days = config.rates.horizon_days;

        self.set_parameters(config)?;
        self.init_random(seed);
        self.init_trajectory()?;
        self.seed_population()?;
        *self.get_data_container_mut::<ReconciliationStats>() = ReconciliationStats::default();
        *self.get_data_container_mut::<SimulationClock>() = SimulationClock {
            day: 0,
            horizon_days,
        };

        info!(
            "initialized simulation: {} agents, {horizon_days} days, seed {seed}",
            self.get_population()?.len()
        );
        Ok(())
    }

    fn step_day(&mut self) -> Result<Option<Snapshot>, SimError> {
        let clock = self.get_clock();
        if clock.is_finished() {
            return Ok(None);
        }
        let day = clock.day();
        trace!("day {day}");

        self.move_agents();
        let reconciliation = self.reconcile(day)?;
        let snapshot = self.snapshot(day, reconciliation)?;
        self.get_data_container_mut::<SimulationClock>().day = day + 1;
        Ok(Some(snapshot))
    }

    fn run_simulation(&mut self, observer: &mut dyn SnapshotObserver) -> Result<RunSummary, SimError> {
        let mut days = 0;
        while let Some(snapshot) = self.step_day()? {
            observer.observe(&snapshot)?;
            days += 1;
        }

        let summary = RunSummary {
            days,
            final_counts: self.get_population()?.counts(),
            stats: self.get_reconciliation_stats(),
        };
        info!(
            "simulation finished after {days} days: {:?}",
            summary.final_counts
        );
        Ok(summary)
    }

    fn snapshot(&self, day: usize, reconciliation: DayReconciliation) -> Result<Snapshot, SimError> {
        let population = self.get_population()?;
        Ok(Snapshot {
            day,
            positions: PerState::from_fn(|status: InfectionStatus| population.positions(status)),
            counts: population.counts(),
            targets: self.compartment_row(day)?,
            reconciliation,
        })
    }

    fn get_clock(&self) -> SimulationClock {
        self.get_data_container::<SimulationClock>()
            .copied()
            .unwrap_or_default()
    }
}
