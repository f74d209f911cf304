pub mod tree;
pub mod individual;
pub mod operators;
pub mod pareto;
pub mod breeder;
pub mod hall_of_fame;
pub mod evolution_engine;
pub mod coevolution;
pub mod progress;

pub use tree::{PrimitiveSet, SensorBindings, Tree};
pub use individual::{Individual, Objectives};
pub use breeder::Breeder;
pub use hall_of_fame::HallOfFame;
pub use evolution_engine::{
    EvolutionEngine, ExperimentReport, GenerationRecord, ProgressCallback, RunReport,
};
pub use coevolution::{CoevolutionEngine, CoevolutionReport};
pub use progress::{ChannelProgressCallback, ConsoleProgressCallback, ProgressMessage};
pub use pareto::{OptimizationDirection, ParetoFront};
