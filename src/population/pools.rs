/*!

The partition of agents into the five compartment pools.

Each pool is a dense `Vec<AgentId>` so that uniform draws are a single index, and every agent
remembers its slot in whichever pool holds it so removal is `O(1)`. Removal swaps the last
member into the vacated slot, which keeps pool order deterministic for a given sequence of
moves.

*/

use crate::population::{AgentId, InfectionStatus, PerState};

#[derive(Clone, Debug, Default)]
pub(crate) struct StatePools {
    members: PerState<Vec<AgentId>>,
    // Indexed by `AgentId`: the agent's position within the pool that currently holds it.
    slots: Vec<usize>,
}

impl StatePools {
    /// Every agent starts out susceptible, in id order.
    pub(crate) fn all_susceptible(count: usize) -> Self {
        let mut members = PerState::<Vec<AgentId>>::default();
        members[InfectionStatus::Susceptible] = (0..count).map(AgentId).collect();
        StatePools {
            members,
            slots: (0..count).collect(),
        }
    }

    #[inline]
    pub(crate) fn members(&self, status: InfectionStatus) -> &[AgentId] {
        &self.members[status]
    }

    #[inline]
    pub(crate) fn len(&self, status: InfectionStatus) -> usize {
        self.members[status].len()
    }

    #[inline]
    pub(crate) fn slot(&self, agent_id: AgentId) -> usize {
        self.slots[agent_id.0]
    }

    pub(crate) fn counts(&self) -> PerState<usize> {
        self.members.map(Vec::len)
    }

    /// Moves `agent_id` from `from` to the back of `to`. The caller guarantees the agent is
    /// currently in `from`.
    pub(crate) fn move_agent(&mut self, agent_id: AgentId, from: InfectionStatus, to: InfectionStatus) {
        let slot = self.slots[agent_id.0];
        let source = &mut self.members[from];
        debug_assert_eq!(source[slot], agent_id);

        source.swap_remove(slot);
        if let Some(&displaced) = source.get(slot) {
            self.slots[displaced.0] = slot;
        }

        let destination = &mut self.members[to];
        self.slots[agent_id.0] = destination.len();
        destination.push(agent_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InfectionStatus::*;

    #[test]
    fn moves_keep_slots_consistent() {
        let mut pools = StatePools::all_susceptible(5);
        pools.move_agent(AgentId(1), Susceptible, Exposed);
        pools.move_agent(AgentId(3), Susceptible, Exposed);

        assert_eq!(pools.members(Susceptible), &[AgentId(0), AgentId(4), AgentId(2)]);
        assert_eq!(pools.members(Exposed), &[AgentId(1), AgentId(3)]);
        for status in InfectionStatus::ALL {
            for (slot, agent_id) in pools.members(status).iter().enumerate() {
                assert_eq!(pools.slot(*agent_id), slot);
            }
        }
        assert_eq!(pools.counts(), PerState::new(3, 2, 0, 0, 0));
    }

    #[test]
    fn removing_the_last_member_needs_no_swap() {
        let mut pools = StatePools::all_susceptible(2);
        pools.move_agent(AgentId(1), Susceptible, Infected);
        pools.move_agent(AgentId(1), Infected, Dead);
        assert_eq!(pools.len(Infected), 0);
        assert_eq!(pools.members(Dead), &[AgentId(1)]);
        assert_eq!(pools.slot(AgentId(1)), 0);
    }
}
