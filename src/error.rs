//! The crate-wide error type.
//!
//! Construction-time failures (`InvalidParameters`, `InvalidPopulationSize`) are fatal: the
//! simulation cannot start. Pool conditions met during daily reconciliation (`EmptyPool`,
//! `InsufficientPool`) are absorbed by the reconciliation policies and only surface as
//! diagnostics.

use crate::population::{AgentId, InfectionStatus};
use std::fmt::{self, Display};
use std::io;

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SimError {
    InvalidParameters(String),
    InvalidPopulationSize(usize),
    EmptyPool(InfectionStatus),
    InsufficientPool {
        pool: InfectionStatus,
        requested: usize,
        available: usize,
    },
    InvalidTransition {
        agent_id: AgentId,
        from: InfectionStatus,
        to: InfectionStatus,
    },
    InvariantViolation(String),
    Integration(String),
    NotInitialized(&'static str),
    DayOutOfRange {
        day: usize,
        horizon: usize,
    },
    Io(io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    Logging(String),
}

impl From<io::Error> for SimError {
    fn from(error: io::Error) -> Self {
        SimError::Io(error)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(error: serde_json::Error) -> Self {
        SimError::Json(error)
    }
}

impl From<csv::Error> for SimError {
    fn from(error: csv::Error) -> Self {
        SimError::Csv(error)
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Io(error) => Some(error),
            SimError::Json(error) => Some(error),
            SimError::Csv(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidParameters(reason) => write!(f, "invalid parameters: {reason}"),
            SimError::InvalidPopulationSize(size) => {
                write!(f, "population size {size} is not a perfect square")
            }
            SimError::EmptyPool(pool) => write!(f, "the {pool} pool is empty"),
            SimError::InsufficientPool {
                pool,
                requested,
                available,
            } => write!(
                f,
                "requested {requested} agents from the {pool} pool but only {available} are available"
            ),
            SimError::InvalidTransition { agent_id, from, to } => {
                write!(f, "{agent_id:?} cannot move from {from} to {to}")
            }
            SimError::InvariantViolation(reason) => write!(f, "population invariant violated: {reason}"),
            SimError::Integration(reason) => write!(f, "integration failed: {reason}"),
            SimError::NotInitialized(what) => write!(f, "{what} has not been initialized"),
            SimError::DayOutOfRange { day, horizon } => {
                write!(f, "day {day} is outside the simulation horizon of {horizon} days")
            }
            SimError::Io(error) => write!(f, "I/O error: {error}"),
            SimError::Json(error) => write!(f, "JSON error: {error}"),
            SimError::Csv(error) => write!(f, "CSV error: {error}"),
            SimError::Logging(reason) => write!(f, "logging error: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_names_the_pool() {
        let error = SimError::InsufficientPool {
            pool: InfectionStatus::Infected,
            requested: 5,
            available: 2,
        };
        assert_eq!(
            error.to_string(),
            "requested 5 agents from the Infected pool but only 2 are available"
        );
        assert_eq!(
            SimError::InvalidPopulationSize(99).to_string(),
            "population size 99 is not a perfect square"
        );
    }

    #[test]
    fn io_errors_keep_their_source() {
        let error: SimError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(error, SimError::Io(_)));
        assert!(error.source().is_some());
    }
}
