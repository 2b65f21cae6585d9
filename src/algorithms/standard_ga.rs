use crate::algorithms::{GaCore, GaParameters, GaParts, GeneticAlgorithm};
use crate::core::SearchError;

/// The standard generational genetic algorithm. At each generation the
/// `generation_survivor_count` fittest chromosomes for the first fitness function survive and the
/// new generation is filled with the offspring of the standard variation.
pub struct StandardGa<T> {
    core: GaCore<T>,
}

impl<T> StandardGa<T> {
    /// Initialise the algorithm.
    ///
    /// # Arguments
    ///
    /// * `parts`: The injected collaborators.
    /// * `parameters`: The hyperparameters.
    ///
    /// returns: `Result<StandardGa<T>, SearchError>`
    pub fn new(parts: GaParts<T>, parameters: GaParameters) -> Result<Self, SearchError> {
        Ok(Self {
            core: GaCore::new("StandardGA", parts, parameters)?,
        })
    }
}

impl<T> GeneticAlgorithm<T> for StandardGa<T> {
    fn core(&self) -> &GaCore<T> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GaCore<T> {
        &mut self.core
    }
}
