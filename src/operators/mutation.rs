use log::debug;
use rand::{Rng, RngCore};

use crate::core::{Chromosome, SearchError, TestCase, TestSuite};
use crate::operators::replay::{random_walk, replay};
use crate::sut::{borrow_driver, SharedDriver};

/// The trait to implement a mutation operator to modify the genetic material of a chromosome.
/// A mutation may drive the application under test to materialise the offspring.
pub trait Mutation<T> {
    /// Mutate a chromosome. The parent is left untouched.
    ///
    /// # Arguments
    ///
    /// * `parent`: The chromosome to mutate.
    /// * `rng`: The random number generator.
    ///
    /// returns: `Result<Vec<Chromosome<T>>, SearchError>`. The offspring, usually one.
    fn mutate(
        &mut self,
        parent: &Chromosome<T>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<T>>, SearchError>;

    /// The operator name.
    ///
    /// returns: `String`
    fn name(&self) -> String;
}

/// Cut-point mutation of a test case: a random prefix of the parent actions is replayed on a
/// freshly reset application, then the test case continues with random actions up to
/// `max_actions`.
pub struct CutPointMutation {
    /// The application under test.
    driver: SharedDriver,
    /// The maximum test case length.
    max_actions: usize,
}

impl CutPointMutation {
    pub fn new(driver: SharedDriver, max_actions: usize) -> Self {
        Self {
            driver,
            max_actions,
        }
    }
}

impl Mutation<TestCase> for CutPointMutation {
    fn mutate(
        &mut self,
        parent: &Chromosome<TestCase>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<TestCase>>, SearchError> {
        let actions = parent.payload().actions();
        let cut_point = rng.gen_range(0..=actions.len().min(self.max_actions));
        debug!("Mutating {} at cut point {cut_point}", parent.id());

        let mut driver = borrow_driver(&self.driver)?;
        let (mut test_case, open) = replay(&mut *driver, &actions[..cut_point])?;
        if open {
            random_walk(&mut *driver, &mut test_case, self.max_actions, rng)?;
        }
        Ok(vec![Chromosome::new(test_case)])
    }

    fn name(&self) -> String {
        "CutPointMutation".to_string()
    }
}

/// Mutate the test cases of a suite with a test case mutation. Each test case is mutated with
/// probability `1/n`, where `n` is the suite size; when the draw selects none, one random test
/// case is mutated so the offspring always differs from its parent.
pub struct SuiteCutPointMutation {
    /// The mutation applied to a single test case.
    test_case_mutation: Box<dyn Mutation<TestCase>>,
}

impl SuiteCutPointMutation {
    pub fn new(test_case_mutation: Box<dyn Mutation<TestCase>>) -> Self {
        Self { test_case_mutation }
    }
}

impl Mutation<TestSuite> for SuiteCutPointMutation {
    fn mutate(
        &mut self,
        parent: &Chromosome<TestSuite>,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<TestSuite>>, SearchError> {
        let mut test_cases = parent.payload().test_cases().to_vec();
        if test_cases.is_empty() {
            return Ok(vec![Chromosome::new(TestSuite::new(test_cases))]);
        }

        let probability = 1.0 / test_cases.len() as f64;
        let mut selected = (0..test_cases.len())
            .filter(|_| rng.gen_bool(probability))
            .collect::<Vec<_>>();
        if selected.is_empty() {
            selected.push(rng.gen_range(0..test_cases.len()));
        }

        for index in selected {
            let offspring = self.test_case_mutation.mutate(&test_cases[index], rng)?;
            if let Some(mutated) = offspring.into_iter().next() {
                test_cases[index] = mutated;
            }
        }
        Ok(vec![Chromosome::new(TestSuite::new(test_cases))])
    }

    fn name(&self) -> String {
        "SuiteCutPointMutation".to_string()
    }
}
