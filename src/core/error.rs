use thiserror::Error;

#[derive(Error, Debug)]
/// Errors raised by the library.
pub enum SearchError {
    #[error("The following error occurred: {0}")]
    Generic(String),
    #[error("The emulator or device is no longer reachable: {0}")]
    EmulatorCrash(String),
    #[error("The driver of the application under test failed: {0}")]
    Driver(String),
    #[error("The {0} named '{1}' is not registered")]
    UnknownIdentifier(String, String),
    #[error("The parameter '{0}' is required because defaults are disabled")]
    MissingParameter(String),
    #[error("The parameter '{0}' is not valid: {1}")]
    InvalidParameter(String, String),
    #[error("An error occurred in the chromosome factory '{0}': {1}")]
    Factory(String, String),
    #[error("An error occurred in the selection operator '{0}': {1}")]
    SelectionOperator(String, String),
    #[error("An error occurred in the crossover operator '{0}': {1}")]
    CrossoverOperator(String, String),
    #[error("An error occurred in the mutation operator '{0}': {1}")]
    MutationOperator(String, String),
    #[error("An error occurred in the survival operator '{0}': {1}")]
    SurvivalOperator(String, String),
    #[error("An error occurred when evaluating the fitness function '{0}': {1}")]
    Evaluation(String, String),
    #[error("An error occurred when initialising {0}: {1}")]
    AlgorithmInit(String, String),
    #[error("{0} cannot {1} in the {2} state")]
    InvalidState(String, String, String),
    #[error("The search bookkeeping of {0} is out of sync: {1}")]
    InvariantViolation(String, String),
    #[error("An error occurred when exporting the algorithm data: {0}")]
    AlgorithmExport(String),
}

impl SearchError {
    /// Whether the error must abort the whole run. Only a lost device is fatal; every other error
    /// is still propagated but does not describe the state of the application under test.
    ///
    /// returns: `bool`
    pub fn is_fatal(&self) -> bool {
        matches!(self, SearchError::EmulatorCrash(_))
    }
}
