/*!

Agents, their compartment states, and the population that partitions them into pools.

`Population` is the only owner of agent state. Pool membership and each agent's `state` field
are changed together by a single method, so "every agent is in exactly one pool and its state
matches that pool" holds at every point a caller can observe.

*/

mod agent;
mod context_ext;
mod data;
pub(crate) mod pools;
mod status;

pub use agent::{Agent, AgentId, Position};
pub use context_ext::ContextPopulationExt;
pub use data::{Population, grid_side};
pub use status::{InfectionStatus, PerState};
