pub use comparison::{ParetoDominance, PreferredSolution};
pub use crossover::{Crossover, OnePointTestCaseCrossover, UniformSuiteCrossover};
pub use factory::{ChromosomeFactory, RandomWalkFactory, SuiteFactory};
pub use mutation::{CutPointMutation, Mutation, SuiteCutPointMutation};
pub use selector::{
    FitnessProportionateSelection, FitnessSortedSelection, IdentitySelection, RandomSelection,
    Selection,
};

pub mod comparison;
pub mod crossover;
pub mod factory;
pub mod mutation;
mod replay;
pub mod selector;
