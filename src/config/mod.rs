pub mod traits;
pub mod evolution;
pub mod tree;
pub mod manager;

pub use manager::{ConfigManager, AppConfig};
pub use evolution::{
    Diversity, EvolutionConfig, MutationPolicy, ObjectiveMode, ParentSelection, ParsimonyMeasure,
    SurvivalSelection, SurvivalStrategy, Termination,
};
pub use tree::TreeConfig;
pub use traits::ConfigSection;
