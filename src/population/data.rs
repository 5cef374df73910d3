use crate::{
    HashSet,
    context::DataPlugin,
    error::SimError,
    neighbor::{LinearScan, NeighborSearch, SearchSpace},
    population::{Agent, AgentId, InfectionStatus, PerState, Position, pools::StatePools},
};

/// Side length of the square grid that holds `total_population` agents.
pub fn grid_side(total_population: usize) -> Result<usize, SimError> {
    let side = total_population.isqrt();
    if total_population == 0 || side * side != total_population {
        return Err(SimError::InvalidPopulationSize(total_population));
    }
    Ok(side)
}

/// The agent roster and its partition into compartment pools.
///
/// Agents are created once, laid out on a square lattice, and never added or removed
/// afterwards; the only mutations are movement and state transitions. Every transition goes
/// through [`Population::transition`], which updates the agent's state and its pool membership
/// together.
pub struct Population {
    agents: Vec<Agent>,
    pools: StatePools,
    search: Box<dyn NeighborSearch>,
    // Bumped whenever positions change, so cached spatial structures know to rebuild.
    positions_epoch: u64,
}

impl DataPlugin for Population {
    fn create() -> Self {
        Population {
            agents: vec![],
            pools: StatePools::default(),
            search: Box::new(LinearScan),
            positions_epoch: 0,
        }
    }
}

impl Population {
    /// Lays agents out on the 1-based integer lattice `{1..=side} x {1..=side}`, column by
    /// column. `ages` must hold one age per agent.
    pub fn from_grid(total_population: usize, step_size: f64, ages: &[u8]) -> Result<Self, SimError> {
        let side = grid_side(total_population)?;
        if ages.len() != total_population {
            return Err(SimError::InvalidParameters(format!(
                "expected {total_population} ages, got {}",
                ages.len()
            )));
        }

        let agents = ages
            .iter()
            .enumerate()
            .map(|(idx, &age)| {
                let position = Position::new((1 + idx / side) as f64, (1 + idx % side) as f64);
                Agent::new(AgentId(idx), age, position, step_size)
            })
            .collect();

        Ok(Population {
            agents,
            pools: StatePools::all_susceptible(total_population),
            search: Box::new(LinearScan),
            positions_epoch: 0,
        })
    }

    pub fn set_neighbor_search(&mut self, search: Box<dyn NeighborSearch>) {
        self.search = search;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    #[must_use]
    pub fn agent(&self, agent_id: AgentId) -> &Agent {
        &self.agents[agent_id.0]
    }

    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// The agents currently in `status`, in pool order.
    #[must_use]
    pub fn pool(&self, status: InfectionStatus) -> &[AgentId] {
        self.pools.members(status)
    }

    #[must_use]
    pub fn count(&self, status: InfectionStatus) -> usize {
        self.pools.len(status)
    }

    #[must_use]
    pub fn counts(&self) -> PerState<usize> {
        self.pools.counts()
    }

    /// Positions of every agent in `status`, in pool order.
    #[must_use]
    pub fn positions(&self, status: InfectionStatus) -> Vec<Position> {
        self.pool(status)
            .iter()
            .map(|agent_id| self.agents[agent_id.0].position)
            .collect()
    }

    /// Moves `agent_id` into `to`. Fails if the move would break the S -> E -> I -> {R, D}
    /// ordering.
    pub fn transition(&mut self, agent_id: AgentId, to: InfectionStatus) -> Result<(), SimError> {
        let from = self.agents[agent_id.0].state;
        if !from.can_transition_to(to) {
            return Err(SimError::InvalidTransition { agent_id, from, to });
        }
        self.pools.move_agent(agent_id, from, to);
        self.agents[agent_id.0].state = to;
        Ok(())
    }

    /// Transitions the agent at `slot` of the `from` pool and returns its id.
    pub fn transition_at(
        &mut self,
        from: InfectionStatus,
        slot: usize,
        to: InfectionStatus,
    ) -> Result<AgentId, SimError> {
        let agent_id = *self
            .pools
            .members(from)
            .get(slot)
            .ok_or(SimError::InsufficientPool {
                pool: from,
                requested: slot + 1,
                available: self.pools.len(from),
            })?;
        self.transition(agent_id, to)?;
        Ok(agent_id)
    }

    /// Places a susceptible agent directly into any compartment. Only used while seeding the
    /// initial conditions, which may include recovered and dead agents.
    pub(crate) fn place(&mut self, slot: usize, to: InfectionStatus) -> AgentId {
        let agent_id = self.pools.members(InfectionStatus::Susceptible)[slot];
        self.pools.move_agent(agent_id, InfectionStatus::Susceptible, to);
        self.agents[agent_id.0].state = to;
        agent_id
    }

    /// Applies one step to every agent; `thetas[i]` is the direction for agent `i`.
    pub fn move_agents(&mut self, thetas: &[f64]) {
        debug_assert_eq!(thetas.len(), self.agents.len());
        for (agent, &theta) in self.agents.iter_mut().zip(thetas) {
            agent.take_step(theta);
        }
        self.positions_epoch += 1;
    }

    /// The agent in `target` closest to `origin` by Manhattan distance. Ties go to the agent
    /// that comes first in pool order.
    pub fn find_closest_to(
        &mut self,
        origin: Position,
        target: InfectionStatus,
    ) -> Result<AgentId, SimError> {
        self.search_closest(origin, target, None)
    }

    /// Like [`Population::find_closest_to`], measured from `origin`'s position. An agent is
    /// never its own closest neighbour.
    pub fn find_closest(
        &mut self,
        origin: AgentId,
        target: InfectionStatus,
    ) -> Result<AgentId, SimError> {
        let position = self.agents[origin.0].position;
        self.search_closest(position, target, Some(origin))
    }

    fn search_closest(
        &mut self,
        origin: Position,
        target: InfectionStatus,
        exclude: Option<AgentId>,
    ) -> Result<AgentId, SimError> {
        let space = SearchSpace {
            agents: &self.agents,
            pools: &self.pools,
            epoch: self.positions_epoch,
            exclude,
        };
        self.search
            .closest(&space, origin, target)
            .ok_or(SimError::EmptyPool(target))
    }

    /// Verifies that the pools partition the roster and that each agent's state matches the
    /// pool holding it.
    pub fn check_invariants(&self) -> Result<(), SimError> {
        let mut seen = HashSet::default();
        for status in InfectionStatus::ALL {
            for (slot, &agent_id) in self.pools.members(status).iter().enumerate() {
                let agent = self.agents.get(agent_id.0).ok_or_else(|| {
                    SimError::InvariantViolation(format!("{agent_id:?} is not in the roster"))
                })?;
                if agent.state != status {
                    return Err(SimError::InvariantViolation(format!(
                        "{agent_id:?} is in the {status} pool but has state {}",
                        agent.state
                    )));
                }
                if self.pools.slot(agent_id) != slot {
                    return Err(SimError::InvariantViolation(format!(
                        "{agent_id:?} has a stale pool slot"
                    )));
                }
                if !seen.insert(agent_id) {
                    return Err(SimError::InvariantViolation(format!(
                        "{agent_id:?} appears in more than one pool"
                    )));
                }
            }
        }
        if seen.len() != self.agents.len() {
            return Err(SimError::InvariantViolation(format!(
                "pools hold {} agents but the roster has {}",
                seen.len(),
                self.agents.len()
            )));
        }
        Ok(())
    }
}
