/*!

Nearest-neighbour strategies for choosing who gets exposed.

A strategy answers one question: which agent in a given pool is closest, by Manhattan
distance, to a point? Ties go to the agent that comes first in pool order. [`LinearScan`]
answers it by walking the pool. [`SpatialGrid`] buckets every agent into square cells and
searches outward ring by ring; it gives exactly the same answers, ties included, and only
rebuilds its buckets after agents have moved.

*/

use crate::{
    HashMap,
    error::SimError,
    population::{Agent, AgentId, InfectionStatus, Position, pools::StatePools},
};
use serde::{Deserialize, Serialize};

/// A read-only view of the population handed to a [`NeighborSearch`].
pub struct SearchSpace<'a> {
    pub(crate) agents: &'a [Agent],
    pub(crate) pools: &'a StatePools,
    pub(crate) epoch: u64,
    pub(crate) exclude: Option<AgentId>,
}

impl SearchSpace<'_> {
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        self.agents
    }

    #[must_use]
    pub fn pool(&self, status: InfectionStatus) -> &[AgentId] {
        self.pools.members(status)
    }

    /// The agent's position within its current pool.
    #[must_use]
    pub fn slot(&self, agent_id: AgentId) -> usize {
        self.pools.slot(agent_id)
    }

    /// Changes whenever any agent has moved since the last query.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn is_candidate(&self, agent_id: AgentId, target: InfectionStatus) -> bool {
        self.exclude != Some(agent_id) && self.agents[agent_id.index()].state() == target
    }
}

pub trait NeighborSearch {
    /// The agent in `target` closest to `origin`, or `None` if there is no candidate.
    fn closest(
        &mut self,
        space: &SearchSpace<'_>,
        origin: Position,
        target: InfectionStatus,
    ) -> Option<AgentId>;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSearchKind {
    #[default]
    LinearScan,
    SpatialGrid,
}

impl NeighborSearchKind {
    #[must_use]
    pub fn build(self) -> Box<dyn NeighborSearch> {
        match self {
            NeighborSearchKind::LinearScan => Box::new(LinearScan),
            NeighborSearchKind::SpatialGrid => Box::new(SpatialGrid::default()),
        }
    }
}

/// Scans every member of the target pool.
#[derive(Copy, Clone, Debug, Default)]
pub struct LinearScan;

impl NeighborSearch for LinearScan {
    fn closest(
        &mut self,
        space: &SearchSpace<'_>,
        origin: Position,
        target: InfectionStatus,
    ) -> Option<AgentId> {
        let mut best: Option<(f64, AgentId)> = None;
        for &agent_id in space.pool(target) {
            if space.exclude == Some(agent_id) {
                continue;
            }
            let distance = space.agents[agent_id.index()]
                .position()
                .manhattan_distance(&origin);
            if best.is_none_or(|(best_distance, _)| distance < best_distance) {
                best = Some((distance, agent_id));
            }
        }
        best.map(|(_, agent_id)| agent_id)
    }
}

type Cell = (i64, i64);

/// Buckets agents into square cells of side `cell_size`.
pub struct SpatialGrid {
    cell_size: f64,
    // `(epoch, agent count)` the buckets were built for.
    built_for: Option<(u64, usize)>,
    cells: HashMap<Cell, Vec<AgentId>>,
    // Inclusive cell bounds `(min_x, max_x, min_y, max_y)` of the occupied cells.
    bounds: Option<(i64, i64, i64, i64)>,
}

impl Default for SpatialGrid {
    /// One cell per lattice spacing.
    fn default() -> Self {
        SpatialGrid::empty(1.0)
    }
}

impl SpatialGrid {
    /// A grid with cells of side `cell_size`, which must be finite and positive.
    pub fn with_cell_size(cell_size: f64) -> Result<Self, SimError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(SimError::InvalidParameters(format!(
                "cell size must be a positive number, got {cell_size}"
            )));
        }
        Ok(SpatialGrid::empty(cell_size))
    }

    fn empty(cell_size: f64) -> Self {
        SpatialGrid {
            cell_size,
            built_for: None,
            cells: HashMap::default(),
            bounds: None,
        }
    }

    fn cell_of(&self, position: &Position) -> Cell {
        (
            (position.x / self.cell_size).floor() as i64,
            (position.y / self.cell_size).floor() as i64,
        )
    }

    fn rebuild(&mut self, space: &SearchSpace<'_>) {
        self.cells.clear();
        self.bounds = None;
        for agent in space.agents {
            let cell = self.cell_of(&agent.position());
            self.cells.entry(cell).or_default().push(agent.id());
            self.bounds = Some(match self.bounds {
                None => (cell.0, cell.0, cell.1, cell.1),
                Some((min_x, max_x, min_y, max_y)) => (
                    min_x.min(cell.0),
                    max_x.max(cell.0),
                    min_y.min(cell.1),
                    max_y.max(cell.1),
                ),
            });
        }
        self.built_for = Some((space.epoch, space.agents.len()));
    }

    /// Cells at Chebyshev distance exactly `ring` from `center`.
    fn ring_cells(center: Cell, ring: i64) -> Vec<Cell> {
        let (cx, cy) = center;
        if ring == 0 {
            return vec![center];
        }
        let mut cells = Vec::with_capacity(8 * ring as usize);
        for dx in -ring..=ring {
            cells.push((cx + dx, cy - ring));
            cells.push((cx + dx, cy + ring));
        }
        for dy in (-ring + 1)..ring {
            cells.push((cx - ring, cy + dy));
            cells.push((cx + ring, cy + dy));
        }
        cells
    }
}

impl NeighborSearch for SpatialGrid {
    fn closest(
        &mut self,
        space: &SearchSpace<'_>,
        origin: Position,
        target: InfectionStatus,
    ) -> Option<AgentId> {
        if self.built_for != Some((space.epoch, space.agents.len())) {
            self.rebuild(space);
        }
        let (min_x, max_x, min_y, max_y) = self.bounds?;
        let center = self.cell_of(&origin);

        // Best so far as `(distance, pool slot, id)`; the slot reproduces pool-order tie breaking.
        let mut best: Option<(f64, usize, AgentId)> = None;
        let mut ring = 0;
        loop {
            for cell in Self::ring_cells(center, ring) {
                let Some(bucket) = self.cells.get(&cell) else {
                    continue;
                };
                for &agent_id in bucket {
                    if !space.is_candidate(agent_id, target) {
                        continue;
                    }
                    let distance = space.agents[agent_id.index()]
                        .position()
                        .manhattan_distance(&origin);
                    let slot = space.slot(agent_id);
                    let better = match best {
                        None => true,
                        Some((best_distance, best_slot, _)) => {
                            distance < best_distance
                                || (distance == best_distance && slot < best_slot)
                        }
                    };
                    if better {
                        best = Some((distance, slot, agent_id));
                    }
                }
            }

            // Anything in an unvisited ring is strictly farther than `ring * cell_size`.
            if let Some((best_distance, _, _)) = best {
                if best_distance <= ring as f64 * self.cell_size {
                    break;
                }
            }
            let covers_all = center.0 - ring <= min_x
                && center.0 + ring >= max_x
                && center.1 - ring <= min_y
                && center.1 + ring >= max_y;
            if covers_all {
                break;
            }
            ring += 1;
        }

        best.map(|(_, _, agent_id)| agent_id)
    }
}
