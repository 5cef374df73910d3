/*!

Model inputs. [`RateParameters`] holds the epidemiological quantities that drive the ODE
system and the initial population split; [`SimulationConfig`] adds the run options that only
matter to the agent layer (movement, seeding, nearest-neighbour strategy, rounding policy).

Both load from JSON. The rate fields sit at the top level of the document:

```json
{
  "initial_exposed": 1,
  "initial_infected": 0,
  "initial_recovered": 0,
  "initial_dead": 0,
  "total_population": 100,
  "horizon_days": 10,
  "sigma": 0.143,
  "gamma": 0.095,
  "mu": 0.0034,
  "contact_probability": 0.1,
  "contacts_per_day": 25.0,
  "step_size": 0.1,
  "seed": 42,
  "neighbor_search": "spatial_grid"
}
```

*/

use crate::{
    context::{Context, DataPlugin},
    error::SimError,
    logging::trace,
    neighbor::NeighborSearchKind,
    reconcile::DeltaPolicy,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Largest accepted horizon; every day is a stored trajectory row.
pub const MAX_HORIZON_DAYS: usize = 36_500;

/// Largest accepted population; every agent is allocated up front.
pub const MAX_POPULATION: usize = 100_000_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateParameters {
    pub initial_exposed: usize,
    pub initial_infected: usize,
    pub initial_recovered: usize,
    pub initial_dead: usize,
    pub total_population: usize,
    pub horizon_days: usize,
    /// Incubation rate: exposed become infectious at `sigma * E` per day.
    pub sigma: f64,
    /// Recovery rate.
    pub gamma: f64,
    /// Mortality rate.
    pub mu: f64,
    /// Probability that a single contact with an infectious agent transmits.
    pub contact_probability: f64,
    pub contacts_per_day: f64,
}

impl Default for RateParameters {
    fn default() -> Self {
        RateParameters {
            initial_exposed: 1,
            initial_infected: 0,
            initial_recovered: 0,
            initial_dead: 0,
            total_population: 100,
            horizon_days: 10,
            sigma: 0.143,
            gamma: 0.095,
            mu: 0.0034,
            contact_probability: 0.1,
            contacts_per_day: 25.0,
        }
    }
}

impl RateParameters {
    /// The contact rate `beta = contact_probability * contacts_per_day`.
    #[must_use]
    pub fn beta(&self) -> f64 {
        self.contact_probability * self.contacts_per_day
    }

    /// `E + I + R + D` at day 0, or `None` if the sum overflows.
    #[must_use]
    pub fn initial_non_susceptible(&self) -> Option<usize> {
        [
            self.initial_exposed,
            self.initial_infected,
            self.initial_recovered,
            self.initial_dead,
        ]
        .into_iter()
        .try_fold(0usize, usize::checked_add)
    }

    #[must_use]
    pub fn initial_susceptible(&self) -> usize {
        self.initial_non_susceptible()
            .map_or(0, |seeded| self.total_population.saturating_sub(seeded))
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let rates = [
            ("sigma", self.sigma),
            ("gamma", self.gamma),
            ("mu", self.mu),
            ("contact_probability", self.contact_probability),
            ("contacts_per_day", self.contacts_per_day),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::InvalidParameters(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.contact_probability > 1.0 {
            return Err(SimError::InvalidParameters(format!(
                "contact_probability must not exceed 1, got {}",
                self.contact_probability
            )));
        }
        if self.total_population == 0 {
            return Err(SimError::InvalidParameters(
                "total_population must be positive".to_string(),
            ));
        }
        if self.total_population > MAX_POPULATION {
            return Err(SimError::InvalidParameters(format!(
                "total_population must not exceed {MAX_POPULATION}, got {}",
                self.total_population
            )));
        }
        if self.horizon_days == 0 || self.horizon_days > MAX_HORIZON_DAYS {
            return Err(SimError::InvalidParameters(format!(
                "horizon_days must be between 1 and {MAX_HORIZON_DAYS}, got {}",
                self.horizon_days
            )));
        }
        match self.initial_non_susceptible() {
            Some(seeded) if seeded <= self.total_population => {}
            Some(seeded) => {
                return Err(SimError::InvalidParameters(format!(
                    "initial compartments ({seeded}) exceed total_population ({})",
                    self.total_population
                )));
            }
            None => {
                return Err(SimError::InvalidParameters(
                    "initial compartments overflow".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn default_step_size() -> f64 {
    0.1
}

/// Everything needed to start a simulation session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(flatten)]
    pub rates: RateParameters,
    /// Distance every agent moves per day.
    #[serde(default = "default_step_size")]
    pub step_size: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub neighbor_search: NeighborSearchKind,
    #[serde(default)]
    pub delta_policy: DeltaPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            rates: RateParameters::default(),
            step_size: default_step_size(),
            seed: 0,
            neighbor_search: NeighborSearchKind::default(),
            delta_policy: DeltaPolicy::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        trace!("loading simulation config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        self.rates.validate()?;
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(SimError::InvalidParameters(format!(
                "step_size must be a positive number, got {}",
                self.step_size
            )));
        }
        Ok(())
    }
}

struct ParametersPlugin {
    config: Option<SimulationConfig>,
}

impl DataPlugin for ParametersPlugin {
    fn create() -> Self {
        ParametersPlugin { config: None }
    }
}

pub trait ContextParametersExt {
    /// Validates `config` and stores it as the session's parameters.
    fn set_parameters(&mut self, config: SimulationConfig) -> Result<(), SimError>;

    fn get_parameters(&self) -> Result<&SimulationConfig, SimError>;
}

impl ContextParametersExt for Context {
    fn set_parameters(&mut self, config: SimulationConfig) -> Result<(), SimError> {
        config.validate()?;
        self.get_data_container_mut::<ParametersPlugin>().config = Some(config);
        Ok(())
    }

    fn get_parameters(&self) -> Result<&SimulationConfig, SimError> {
        self.get_data_container::<ParametersPlugin>()
            .and_then(|plugin| plugin.config.as_ref())
            .ok_or(SimError::NotInitialized("parameters"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn beta_is_probability_times_contacts() {
        let rates = RateParameters::default();
        assert!((rates.beta() - 2.5).abs() < 1e-12);
        assert_eq!(rates.initial_susceptible(), 99);
    }

    #[test]
    fn negative_rates_are_rejected() {
        let rates = RateParameters {
            gamma: -0.1,
            ..RateParameters::default()
        };
        assert!(matches!(rates.validate(), Err(SimError::InvalidParameters(_))));

        let rates = RateParameters {
            sigma: f64::NAN,
            ..RateParameters::default()
        };
        assert!(matches!(rates.validate(), Err(SimError::InvalidParameters(_))));
    }

    #[test]
    fn initial_compartments_must_fit_population() {
        let rates = RateParameters {
            initial_exposed: 60,
            initial_infected: 41,
            ..RateParameters::default()
        };
        assert!(matches!(rates.validate(), Err(SimError::InvalidParameters(_))));

        let rates = RateParameters {
            initial_exposed: 60,
            initial_infected: 40,
            ..RateParameters::default()
        };
        assert!(rates.validate().is_ok());
    }

    #[test]
    fn overflowing_initial_compartments_are_rejected() {
        let rates = RateParameters {
            initial_exposed: usize::MAX,
            initial_infected: 1,
            ..RateParameters::default()
        };
        assert_eq!(rates.initial_non_susceptible(), None);
        assert_eq!(rates.initial_susceptible(), 0);
        assert!(matches!(rates.validate(), Err(SimError::InvalidParameters(_))));

        let json = format!(
            r#"{{
            "initial_exposed": {}, "initial_infected": 1, "initial_recovered": 0,
            "initial_dead": 0, "total_population": 100, "horizon_days": 10,
            "sigma": 0.143, "gamma": 0.095, "mu": 0.0034,
            "contact_probability": 0.1, "contacts_per_day": 25
        }}"#,
            usize::MAX
        );
        assert!(matches!(
            SimulationConfig::from_json_str(&json),
            Err(SimError::InvalidParameters(_))
        ));
    }

    #[test]
    fn initial_compartments_may_fill_the_population() {
        let rates = RateParameters {
            initial_exposed: 50,
            initial_infected: 30,
            initial_recovered: 15,
            initial_dead: 5,
            ..RateParameters::default()
        };
        assert_eq!(rates.initial_non_susceptible(), Some(100));
        assert_eq!(rates.initial_susceptible(), 0);
        assert!(rates.validate().is_ok());

        let single = RateParameters {
            initial_exposed: 1,
            total_population: 1,
            ..RateParameters::default()
        };
        assert!(single.validate().is_ok());
        let single = RateParameters {
            initial_exposed: 1,
            initial_infected: 1,
            total_population: 1,
            ..RateParameters::default()
        };
        assert!(matches!(single.validate(), Err(SimError::InvalidParameters(_))));
    }

    #[test]
    fn oversized_horizon_and_population_are_rejected() {
        let rates = RateParameters {
            horizon_days: usize::MAX,
            ..RateParameters::default()
        };
        assert!(matches!(rates.validate(), Err(SimError::InvalidParameters(_))));

        let rates = RateParameters {
            horizon_days: MAX_HORIZON_DAYS,
            ..RateParameters::default()
        };
        assert!(rates.validate().is_ok());

        let rates = RateParameters {
            total_population: MAX_POPULATION + 1,
            ..RateParameters::default()
        };
        assert!(matches!(rates.validate(), Err(SimError::InvalidParameters(_))));
    }

    #[test]
    fn zero_horizon_and_population_are_rejected() {
        let rates = RateParameters {
            horizon_days: 0,
            ..RateParameters::default()
        };
        assert!(rates.validate().is_err());

        let rates = RateParameters {
            total_population: 0,
            initial_exposed: 0,
            ..RateParameters::default()
        };
        assert!(rates.validate().is_err());
    }

    #[test]
    fn config_json_uses_defaults_for_run_options() {
        let json = r#"{
            "initial_exposed": 2,
            "initial_infected": 1,
            "initial_recovered": 0,
            "initial_dead": 0,
            "total_population": 400,
            "horizon_days": 30,
            "sigma": 0.2,
            "gamma": 0.1,
            "mu": 0.01,
            "contact_probability": 0.05,
            "contacts_per_day": 10
        }"#;
        let config = SimulationConfig::from_json_str(json).unwrap();
        assert_eq!(config.rates.total_population, 400);
        assert_eq!(config.step_size, 0.1);
        assert_eq!(config.seed, 0);
        assert_eq!(config.neighbor_search, NeighborSearchKind::LinearScan);
        assert_eq!(config.delta_policy, DeltaPolicy::Round);
    }

    #[test]
    fn config_loads_from_file() {
        let config = SimulationConfig {
            seed: 1234,
            neighbor_search: NeighborSearchKind::SpatialGrid,
            ..SimulationConfig::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = SimulationConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn invalid_step_size_is_rejected() {
        let json = r#"{
            "initial_exposed": 1, "initial_infected": 0, "initial_recovered": 0,
            "initial_dead": 0, "total_population": 100, "horizon_days": 10,
            "sigma": 0.143, "gamma": 0.095, "mu": 0.0034,
            "contact_probability": 0.1, "contacts_per_day": 25, "step_size": 0
        }"#;
        assert!(matches!(
            SimulationConfig::from_json_str(json),
            Err(SimError::InvalidParameters(_))
        ));
        assert!(matches!(
            SimulationConfig::from_json_str("{ not json"),
            Err(SimError::Json(_))
        ));
    }

    #[test]
    fn context_stores_validated_parameters() {
        let mut context = Context::new();
        assert!(matches!(
            context.get_parameters(),
            Err(SimError::NotInitialized(_))
        ));

        let bad = SimulationConfig {
            step_size: -1.0,
            ..SimulationConfig::default()
        };
        assert!(context.set_parameters(bad).is_err());

        context.set_parameters(SimulationConfig::default()).unwrap();
        assert_eq!(context.get_parameters().unwrap().rates.horizon_days, 10);
    }
}
