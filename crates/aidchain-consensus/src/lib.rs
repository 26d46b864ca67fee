pub mod engine;
pub mod registry;
pub mod sealer;

pub use engine::{ConsensusStatus, PoaEngine, SealOutcome};
pub use registry::ValidatorRegistry;
pub use sealer::{Sealer, SealerConfig};
