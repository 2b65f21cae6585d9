pub use chromosome::{Chromosome, ChromosomeId, Payload, Population};
pub use error::SearchError;
pub use fitness::{
    ActivityCoverageFitness, CoverageContext, CoverageSource, CrashFitness, FitnessFunction,
    FitnessFunctions, TargetCoverageFitness, TestLengthFitness,
};
pub use test_case::{ExecutionTrace, TestCase, TestSuite};
pub use utils::get_rng;

mod chromosome;
mod error;
mod fitness;
mod test_case;
#[cfg(test)]
pub(crate) mod test_utils;
mod utils;
