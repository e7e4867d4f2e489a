pub mod compartments;
pub mod error;
pub mod model;
pub mod network;
pub mod rng;
pub mod seeding;
pub mod snapshot;

/// Actor identity, shared across all layers of a multilayer network.
pub type ActorId = usize;

pub use compartments::{CompartmentalGraph, Process};
pub use error::{CascadeError, Result};
pub use model::{CoupledModel, StateUpdate};
pub use network::{Layer, MultilayerNetwork};
pub use rng::DiffusionRng;
pub use seeding::{berahmand_centrality, BerahmandSelector, RandomSeedSelector, SeedSelector};
pub use snapshot::{EpochSnapshot, StepOutcome};
