use log::debug;
use rand::RngCore;

use crate::core::{Chromosome, Payload, SearchError, TestCase, TestSuite};
use crate::operators::replay::{random_walk, start_test_case};
use crate::sut::{borrow_driver, SharedDriver};

/// Create new chromosomes, usually by driving the application under test.
pub trait ChromosomeFactory<T> {
    /// Create a new chromosome. A lost device is returned as
    /// [`SearchError::EmulatorCrash`] and aborts the run.
    ///
    /// # Arguments
    ///
    /// * `rng`: The random number generator.
    ///
    /// returns: `Result<Chromosome<T>, SearchError>`
    fn create_chromosome(&mut self, rng: &mut dyn RngCore) -> Result<Chromosome<T>, SearchError>;

    /// The factory name.
    ///
    /// returns: `String`
    fn name(&self) -> String;
}

/// Create test cases with a random walk: the application is reset and up to `max_actions`
/// uniformly chosen executable actions are executed. The walk stops early when the application
/// crashes or is left.
pub struct RandomWalkFactory {
    /// The application under test.
    driver: SharedDriver,
    /// The maximum number of actions per test case.
    max_actions: usize,
}

impl RandomWalkFactory {
    /// Create the factory. This returns an error if `max_actions` is zero.
    ///
    /// # Arguments
    ///
    /// * `driver`: The application under test.
    /// * `max_actions`: The maximum number of actions per test case.
    ///
    /// returns: `Result<RandomWalkFactory, SearchError>`
    pub fn new(driver: SharedDriver, max_actions: usize) -> Result<Self, SearchError> {
        if max_actions == 0 {
            return Err(SearchError::InvalidParameter(
                "max_actions".to_string(),
                "a test case needs at least one action".to_string(),
            ));
        }
        Ok(Self {
            driver,
            max_actions,
        })
    }
}

impl ChromosomeFactory<TestCase> for RandomWalkFactory {
    fn create_chromosome(
        &mut self,
        rng: &mut dyn RngCore,
    ) -> Result<Chromosome<TestCase>, SearchError> {
        let mut driver = borrow_driver(&self.driver)?;
        let mut test_case = start_test_case(&mut *driver)?;
        random_walk(&mut *driver, &mut test_case, self.max_actions, rng)?;
        debug!(
            "Created test case with {} actions (crash: {})",
            test_case.length(),
            test_case.crash_detected()
        );
        Ok(Chromosome::new(test_case))
    }

    fn name(&self) -> String {
        "RandomWalkFactory".to_string()
    }
}

/// Create test suites made of test cases from another factory.
pub struct SuiteFactory {
    /// The factory creating each test case.
    test_case_factory: Box<dyn ChromosomeFactory<TestCase>>,
    /// The number of test cases in each suite.
    test_cases_per_suite: usize,
}

impl SuiteFactory {
    pub fn new(
        test_case_factory: Box<dyn ChromosomeFactory<TestCase>>,
        test_cases_per_suite: usize,
    ) -> Self {
        Self {
            test_case_factory,
            test_cases_per_suite,
        }
    }
}

impl ChromosomeFactory<TestSuite> for SuiteFactory {
    fn create_chromosome(
        &mut self,
        rng: &mut dyn RngCore,
    ) -> Result<Chromosome<TestSuite>, SearchError> {
        if self.test_cases_per_suite == 0 {
            return Err(SearchError::Factory(
                self.name(),
                "A suite needs at least one test case".to_string(),
            ));
        }
        let test_cases = (0..self.test_cases_per_suite)
            .map(|_| self.test_case_factory.create_chromosome(rng))
            .collect::<Result<Vec<_>, SearchError>>()?;
        Ok(Chromosome::new(TestSuite::new(test_cases)))
    }

    fn name(&self) -> String {
        "SuiteFactory".to_string()
    }
}
