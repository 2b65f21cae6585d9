pub use algorithm::{GaCore, GaParameters, GaParts, GeneticAlgorithm, Offspring, SearchState};
pub use mio::{Mio, MioArgs};
pub use mosa::Mosa;
pub use nsga2::Nsga2;
pub use registry::{
    AlgorithmBuilder, CrossoverBuilder, FactoryBuilder, GaBuilder, GaConfig, MutationBuilder,
    Registry, SelectionBuilder, TerminationBuilder,
};
pub use sapienz::Sapienz;
pub use standard_ga::StandardGa;
pub use stopping_condition::{
    AllOf, AnyOf, IterTermination, NeverTermination, SearchProgress, TerminationCondition,
    TimeTermination,
};

mod algorithm;
mod mio;
mod mosa;
mod nsga2;
mod registry;
mod sapienz;
mod standard_ga;
mod stopping_condition;
