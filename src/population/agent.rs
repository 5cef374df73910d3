use crate::population::InfectionStatus;
use serde::Serialize;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct AgentId(pub(crate) usize);

impl AgentId {
    #[must_use]
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    /// `|dx| + |dy|`, the metric used to pick who gets exposed.
    #[must_use]
    #[inline]
    pub fn manhattan_distance(&self, other: &Position) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// The position `distance` away in direction `theta` (radians).
    #[must_use]
    pub fn stepped(&self, distance: f64, theta: f64) -> Position {
        Position {
            x: self.x + distance * theta.cos(),
            y: self.y + distance * theta.sin(),
        }
    }
}

/// One simulated individual. The state is only ever changed by `Population`, which moves the
/// agent between pools at the same time.
#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    pub(crate) id: AgentId,
    pub(crate) age: u8,
    pub(crate) position: Position,
    pub(crate) state: InfectionStatus,
    pub(crate) step_size: f64,
}

impl Agent {
    pub(crate) fn new(id: AgentId, age: u8, position: Position, step_size: f64) -> Self {
        Agent {
            id,
            age,
            position,
            state: InfectionStatus::Susceptible,
            step_size,
        }
    }

    #[must_use]
    pub fn id(&self) -> AgentId {
        self.id
    }

    #[must_use]
    pub fn age(&self) -> u8 {
        self.age
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    #[must_use]
    pub fn state(&self) -> InfectionStatus {
        self.state
    }

    #[must_use]
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub(crate) fn take_step(&mut self, theta: f64) {
        self.position = self.position.stepped(self.step_size, theta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn manhattan_distance_sums_axis_offsets() {
        let a = Position::new(0.0, 0.0);
        assert_eq!(a.manhattan_distance(&Position::new(1.0, 1.0)), 2.0);
        assert_eq!(a.manhattan_distance(&Position::new(-5.0, 5.0)), 10.0);
        assert_eq!(Position::new(2.5, 1.0).manhattan_distance(&a), 3.5);
    }

    #[test]
    fn steps_keep_their_length() {
        let mut agent = Agent::new(AgentId(0), 30, Position::new(1.0, 1.0), 0.1);
        agent.take_step(FRAC_PI_2);
        assert!((agent.position().x - 1.0).abs() < 1e-12);
        assert!((agent.position().y - 1.1).abs() < 1e-12);

        agent.take_step(PI);
        assert!((agent.position().x - 0.9).abs() < 1e-12);
        assert_eq!(agent.state(), InfectionStatus::Susceptible);
    }
}
