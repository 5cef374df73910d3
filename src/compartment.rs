/*!

The continuous half of the model: the SEIRD system

```text
dS/dt = -β S I / N
dE/dt =  β S I / N - σ E
dI/dt =  σ E - γ I - μ I
dR/dt =  γ I
dD/dt =  μ I
```

integrated with an adaptive Dormand–Prince 5(4) scheme and sampled at every whole day from
`0` to `horizon_days`. The result is computed once per session and treated as ground truth by
the reconciliation step.

*/

use crate::{
    context::{Context, DataPlugin},
    error::SimError,
    logging::{debug, trace},
    parameters::{ContextParametersExt, MAX_HORIZON_DAYS, RateParameters},
    population::{InfectionStatus, PerState},
};
use serde::Serialize;
use std::ops::Index;

/// `(S, E, I, R, D)` for a single day.
pub type CompartmentRow = PerState<f64>;

type State = [f64; 5];

/// One row per day, `0..=horizon_days`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompartmentTrajectory {
    rows: Vec<CompartmentRow>,
}

impl CompartmentTrajectory {
    /// Wraps rows computed elsewhere. Row `k` is day `k`.
    #[must_use]
    pub fn from_rows(rows: Vec<CompartmentRow>) -> Self {
        CompartmentTrajectory { rows }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn horizon_days(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    #[must_use]
    pub fn row(&self, day: usize) -> Option<&CompartmentRow> {
        self.rows.get(day)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompartmentRow> {
        self.rows.iter()
    }

    /// The day on which `status` is largest, and its value then. Earliest day wins ties.
    #[must_use]
    pub fn peak(&self, status: InfectionStatus) -> Option<(usize, f64)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(day, row)| (day, row[status]))
            .fold(None, |best, (day, value)| match best {
                Some((_, best_value)) if best_value >= value => best,
                _ => Some((day, value)),
            })
    }
}

impl Index<usize> for CompartmentTrajectory {
    type Output = CompartmentRow;

    fn index(&self, day: usize) -> &CompartmentRow {
        &self.rows[day]
    }
}

// Dormand–Prince 5(4) tableau. The system is autonomous, so the stage times are not needed.
// The last stage is evaluated at the fifth-order solution.
const A: [&[f64]; 7] = [
    &[],
    &[1.0 / 5.0],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
    &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
    &[9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
    &[35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
];
const B5: [f64; 7] = [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0, 0.0];
// Fifth-order minus fourth-order weights.
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

const RELATIVE_TOLERANCE: f64 = 1e-8;
const ABSOLUTE_TOLERANCE: f64 = 1e-8;
const INITIAL_STEP: f64 = 0.1;
const MIN_STEP: f64 = 1e-10;
const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;
const MAX_STEPS_PER_DAY: usize = 100_000;

/// The SEIRD rate constants.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CompartmentModel {
    pub beta: f64,
    pub sigma: f64,
    pub gamma: f64,
    pub mu: f64,
}

impl CompartmentModel {
    pub fn new(rates: &RateParameters) -> Result<Self, SimError> {
        rates.validate()?;
        Ok(CompartmentModel {
            beta: rates.beta(),
            sigma: rates.sigma,
            gamma: rates.gamma,
            mu: rates.mu,
        })
    }

    /// The right-hand side of the system. `N` is recomputed from the state.
    #[must_use]
    #[allow(clippy::many_single_char_names)]
    pub fn derivatives(&self, y: &State) -> State {
        let [s, e, i, r, d] = *y;
        let n = s + e + i + r + d;
        let new_exposures = if n > 0.0 { self.beta * s * i / n } else { 0.0 };
        [
            -new_exposures,
            new_exposures - self.sigma * e,
            self.sigma * e - self.gamma * i - self.mu * i,
            self.gamma * i,
            self.mu * i,
        ]
    }

    /// Integrates from `initial` and samples every whole day up to and including `horizon_days`.
    pub fn integrate(
        &self,
        initial: CompartmentRow,
        horizon_days: usize,
    ) -> Result<CompartmentTrajectory, SimError> {
        if horizon_days > MAX_HORIZON_DAYS {
            return Err(SimError::InvalidParameters(format!(
                "horizon_days must not exceed {MAX_HORIZON_DAYS}, got {horizon_days}"
            )));
        }
        let mut y: State = *initial.values();
        let mut t = 0.0;
        let mut h = INITIAL_STEP;
        let mut rows = Vec::with_capacity(horizon_days + 1);
        rows.push(initial);

        for day in 1..=horizon_days {
            let target = day as f64;
            let mut steps = 0;
            while t < target {
                steps += 1;
                if steps > MAX_STEPS_PER_DAY {
                    return Err(SimError::Integration(format!(
                        "exceeded {MAX_STEPS_PER_DAY} steps before day {day}"
                    )));
                }

                let remaining = target - t;
                let landing = h >= remaining;
                let step = if landing { remaining } else { h };
                let (candidate, error) = self.dormand_prince_step(&y, step);

                if error.is_finite() && error <= 1.0 {
                    y = candidate;
                    t = if landing { target } else { t + step };
                    let factor = if error == 0.0 {
                        MAX_FACTOR
                    } else {
                        (SAFETY * error.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                    };
                    h = step * factor;
                } else {
                    let factor = if error.is_finite() {
                        (SAFETY * error.powf(-0.2)).max(MIN_FACTOR)
                    } else {
                        MIN_FACTOR
                    };
                    h = step * factor;
                    if h < MIN_STEP {
                        return Err(SimError::Integration(format!(
                            "step size collapsed to {h:e} at t = {t}"
                        )));
                    }
                }
            }
            // Round-off can leave components a hair below zero.
            rows.push(PerState::from(y.map(|value| value.max(0.0))));
        }

        Ok(CompartmentTrajectory { rows })
    }

    /// One embedded step of size `h`; returns the fifth-order solution and the scaled RMS
    /// error estimate (accept when `<= 1`).
    fn dormand_prince_step(&self, y: &State, h: f64) -> (State, f64) {
        let mut k: [State; 7] = [[0.0; 5]; 7];
        for stage in 0..7 {
            let mut y_stage = *y;
            for (j, &a) in A[stage].iter().enumerate() {
                for (value, slope) in y_stage.iter_mut().zip(k[j]) {
                    *value += h * a * slope;
                }
            }
            k[stage] = self.derivatives(&y_stage);
        }

        let mut next = *y;
        let mut error_sum = 0.0;
        for component in 0..5 {
            let mut increment = 0.0;
            let mut error = 0.0;
            for stage in 0..7 {
                increment += B5[stage] * k[stage][component];
                error += E[stage] * k[stage][component];
            }
            next[component] += h * increment;

            let scale = ABSOLUTE_TOLERANCE
                + RELATIVE_TOLERANCE * y[component].abs().max(next[component].abs());
            error_sum += (h * error / scale).powi(2);
        }

        (next, (error_sum / 5.0).sqrt())
    }
}

/// Integrates the SEIRD system for `rates` over `[0, horizon_days]`.
pub fn integrate(rates: &RateParameters) -> Result<CompartmentTrajectory, SimError> {
    let model = CompartmentModel::new(rates)?;
    let initial = PerState::new(
        rates.initial_susceptible() as f64,
        rates.initial_exposed as f64,
        rates.initial_infected as f64,
        rates.initial_recovered as f64,
        rates.initial_dead as f64,
    );
    trace!(
        "integrating SEIRD system: beta = {}, sigma = {}, gamma = {}, mu = {}",
        model.beta, model.sigma, model.gamma, model.mu
    );
    model.integrate(initial, rates.horizon_days)
}

struct TrajectoryPlugin {
    trajectory: Option<CompartmentTrajectory>,
}

impl DataPlugin for TrajectoryPlugin {
    fn create() -> Self {
        TrajectoryPlugin { trajectory: None }
    }
}

pub trait ContextCompartmentExt {
    /// Integrates the trajectory for the stored parameters and keeps it for the session.
    fn init_trajectory(&mut self) -> Result<(), SimError>;

    /// Replaces the session trajectory with one computed elsewhere.
    fn set_trajectory(&mut self, trajectory: CompartmentTrajectory);

    fn get_trajectory(&self) -> Result<&CompartmentTrajectory, SimError>;

    /// A copy of the trajectory row for `day`.
    fn compartment_row(&self, day: usize) -> Result<CompartmentRow, SimError>;
}

impl ContextCompartmentExt for Context {
    fn init_trajectory(&mut self) -> Result<(), SimError> {
        let trajectory = integrate(&self.get_parameters()?.rates)?;
        if let Some((day, infected)) = trajectory.peak(InfectionStatus::Infected) {
            debug!("trajectory infected peak: {infected:.2} on day {day}");
        }
        self.set_trajectory(trajectory);
        Ok(())
    }

    fn set_trajectory(&mut self, trajectory: CompartmentTrajectory) {
        self.get_data_container_mut::<TrajectoryPlugin>().trajectory = Some(trajectory);
    }

    fn get_trajectory(&self) -> Result<&CompartmentTrajectory, SimError> {
        self.get_data_container::<TrajectoryPlugin>()
            .and_then(|plugin| plugin.trajectory.as_ref())
            .ok_or(SimError::NotInitialized("trajectory"))
    }

    fn compartment_row(&self, day: usize) -> Result<CompartmentRow, SimError> {
        let trajectory = self.get_trajectory()?;
        trajectory
            .row(day)
            .copied()
            .ok_or(SimError::DayOutOfRange {
                day,
                horizon: trajectory.horizon_days(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::SimulationConfig;
    use InfectionStatus::*;

    fn assert_rows_conserve(trajectory: &CompartmentTrajectory, total: f64) {
        for (day, row) in trajectory.iter().enumerate() {
            let sum: f64 = row.values().iter().sum();
            assert!(
                ((sum - total) / total).abs() < 1e-3,
                "day {day}: compartments sum to {sum}"
            );
            assert!(row.values().iter().all(|value| *value >= 0.0), "day {day}: {row:?}");
        }
    }

    #[test]
    fn reference_scenario() {
        let rates = RateParameters::default();
        let trajectory = integrate(&rates).unwrap();

        assert_eq!(trajectory.len(), 11);
        assert_eq!(trajectory.horizon_days(), 10);
        assert_eq!(trajectory[0], PerState::new(99.0, 1.0, 0.0, 0.0, 0.0));
        assert_rows_conserve(&trajectory, 100.0);

        for day in 1..=10 {
            assert!(
                trajectory[day][Infected] > trajectory[day - 1][Infected],
                "infected should grow on day {day}"
            );
        }
        assert!((trajectory[10][Infected] - 10.7143).abs() < 1e-3);
        assert!((trajectory[10][Exposed] - 34.2874).abs() < 1e-3);
        assert!((trajectory[10][Susceptible] - 52.5018).abs() < 1e-3);
    }

    #[test]
    fn integration_is_deterministic() {
        let rates = RateParameters {
            horizon_days: 60,
            ..RateParameters::default()
        };
        assert_eq!(integrate(&rates).unwrap(), integrate(&rates).unwrap());
    }

    #[test]
    fn matches_exponential_decay_without_transmission() {
        // With beta = 0 the exposed compartment decays as E0 * exp(-sigma * t).
        let rates = RateParameters {
            initial_exposed: 50,
            contact_probability: 0.0,
            horizon_days: 20,
            ..RateParameters::default()
        };
        let trajectory = integrate(&rates).unwrap();
        for day in [1, 5, 20] {
            let expected = 50.0 * (-rates.sigma * day as f64).exp();
            assert!((trajectory[day][Exposed] - expected).abs() < 1e-5);
            assert_eq!(trajectory[day][Susceptible], 50.0);
        }
    }

    #[test]
    fn long_epidemic_stays_conservative() {
        let rates = RateParameters {
            initial_exposed: 50,
            initial_infected: 50,
            total_population: 2500,
            horizon_days: 120,
            ..RateParameters::default()
        };
        let trajectory = integrate(&rates).unwrap();
        assert_rows_conserve(&trajectory, 2500.0);

        let (peak_day, peak) = trajectory.peak(Infected).unwrap();
        assert!(peak_day > 0 && peak_day < 120);
        assert!(peak > 800.0);
        // Nearly everyone has passed through by the end.
        assert!(trajectory[120][Recovered] + trajectory[120][Dead] > 2490.0);
        // Removed compartments never shrink.
        for day in 1..=120 {
            assert!(trajectory[day][Recovered] >= trajectory[day - 1][Recovered]);
            assert!(trajectory[day][Dead] >= trajectory[day - 1][Dead]);
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let rates = RateParameters {
            mu: -0.01,
            ..RateParameters::default()
        };
        assert!(matches!(integrate(&rates), Err(SimError::InvalidParameters(_))));

        let rates = RateParameters {
            initial_infected: 100,
            ..RateParameters::default()
        };
        assert!(matches!(integrate(&rates), Err(SimError::InvalidParameters(_))));
    }

    #[test]
    fn huge_horizons_are_rejected_before_allocating() {
        let model = CompartmentModel::new(&RateParameters::default()).unwrap();
        let initial = PerState::new(99.0, 1.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            model.integrate(initial, usize::MAX),
            Err(SimError::InvalidParameters(_))
        ));
    }

    #[test]
    fn context_keeps_the_trajectory() {
        let mut context = Context::new();
        assert!(matches!(
            context.init_trajectory(),
            Err(SimError::NotInitialized("parameters"))
        ));

        context.set_parameters(SimulationConfig::default()).unwrap();
        context.init_trajectory().unwrap();
        assert_eq!(context.get_trajectory().unwrap().len(), 11);
        assert_eq!(context.compartment_row(0).unwrap()[Exposed], 1.0);
        assert!(matches!(
            context.compartment_row(11),
            Err(SimError::DayOutOfRange { day: 11, horizon: 10 })
        ));
    }
}
