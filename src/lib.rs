/*!

A SEIRD epidemic modelled two ways at once: a compartmental ODE system integrated over the
whole horizon, and a grid of moving agents whose states are reconciled each day against the
ODE's predicted compartment sizes. Geometry only decides *which* susceptible agent becomes
exposed (the one closest to a randomly chosen infector); *how many* transitions happen comes
from the trajectory.

Everything is driven through a [`Context`]:

```rust,no_run
use seird_core::{Context, ContextSimulationExt, SimulationConfig, Snapshot};

# fn main() -> Result<(), seird_core::SimError> {
let mut context = Context::new();
context.init_simulation(SimulationConfig::default())?;

let mut snapshots: Vec<Snapshot> = Vec::new();
let summary = context.run_simulation(&mut snapshots)?;
println!("{} days simulated", summary.days);
# Ok(())
# }
```

*/

pub mod clock;
pub mod compartment;
pub mod context;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod neighbor;
pub mod parameters;
pub mod population;
pub mod random;
pub mod reconcile;
pub mod report;

// Re-exported so that `define_rng!` can name `$crate::rand` from downstream crates.
pub use rand;

// All modules import `crate::TypeId` in case we want to change the underlying type of `TypeId`.
pub(crate) use std::any::TypeId;
pub(crate) use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use clock::{ContextSimulationExt, RunSummary, SimulationClock, Snapshot, SnapshotObserver};
pub use compartment::{CompartmentModel, CompartmentRow, CompartmentTrajectory, ContextCompartmentExt};
pub use context::{Context, DataPlugin};
pub use error::SimError;
pub use neighbor::{LinearScan, NeighborSearch, NeighborSearchKind, SpatialGrid};
pub use parameters::{ContextParametersExt, RateParameters, SimulationConfig};
pub use population::{
    Agent, AgentId, ContextPopulationExt, InfectionStatus, PerState, Population, Position,
};
pub use random::ContextRandomExt;
pub use reconcile::{
    ContextReconcileExt, DayReconciliation, DeltaPolicy, ReconciliationStats, target_delta,
};
pub use report::{CompartmentReport, SnapshotWriter};

// Replace with `typeid::of as type_of` if necessary.
#[inline(always)]
pub fn type_of<T: 'static>() -> TypeId {
    TypeId::of::<T>()
}
