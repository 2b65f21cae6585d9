use log::debug;
use rand::{Rng, RngCore};

use crate::core::{Chromosome, SearchError, TestCase, TestSuite};
use crate::operators::replay::replay;
use crate::sut::{borrow_driver, SharedDriver};

/// Trait to define a crossover operator to generate new children by recombining the genetic
/// material of parents. A crossover may drive the application under test to materialise the
/// offspring.
pub trait Crossover<T> {
    /// Generate one or more children from the first parents in `parents`.
    ///
    /// # Arguments
    ///
    /// * `parents`: The parent candidates, in selection order.
    /// * `rng`: The random number generator.
    ///
    /// returns: `Result<Vec<Chromosome<T>>, SearchError>`.
    fn cross(
        &mut self,
        parents: &[Chromosome<T>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<T>>, SearchError>;

    /// The operator name.
    ///
    /// returns: `String`
    fn name(&self) -> String;
}

/// Get the first two parents.
fn two_parents<'a, T>(
    name: &str,
    parents: &'a [Chromosome<T>],
) -> Result<(&'a Chromosome<T>, &'a Chromosome<T>), SearchError> {
    match parents {
        [first, second, ..] => Ok((first, second)),
        _ => Err(SearchError::CrossoverOperator(
            name.to_string(),
            format!("Two parents are needed, but {} given", parents.len()),
        )),
    }
}

/// One-point crossover between two test cases. Each parent is cut at a random point and the
/// children are the first part of one parent followed by the second part of the other. Because a
/// hybrid action sequence may not be valid anymore, each child is replayed on a freshly reset
/// application; actions that are not executable when reached are dropped.
pub struct OnePointTestCaseCrossover {
    /// The application under test.
    driver: SharedDriver,
}

impl OnePointTestCaseCrossover {
    pub fn new(driver: SharedDriver) -> Self {
        Self { driver }
    }
}

impl Crossover<TestCase> for OnePointTestCaseCrossover {
    fn cross(
        &mut self,
        parents: &[Chromosome<TestCase>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<TestCase>>, SearchError> {
        let (parent1, parent2) = two_parents(&self.name(), parents)?;
        let actions1 = parent1.payload().actions();
        let actions2 = parent2.payload().actions();
        let cut1 = rng.gen_range(0..=actions1.len());
        let cut2 = rng.gen_range(0..=actions2.len());
        debug!("Crossing test cases at {cut1} and {cut2}");

        let mut driver = borrow_driver(&self.driver)?;
        let mut children = Vec::with_capacity(2);
        for (head, tail) in [
            (&actions1[..cut1], &actions2[cut2..]),
            (&actions2[..cut2], &actions1[cut1..]),
        ] {
            let hybrid = head.iter().chain(tail).cloned().collect::<Vec<_>>();
            let (test_case, _) = replay(&mut *driver, &hybrid)?;
            children.push(Chromosome::new(test_case));
        }
        Ok(children)
    }

    fn name(&self) -> String {
        "OnePointTestCaseCrossover".to_string()
    }
}

/// Uniform crossover between two test suites. For every position both parents have, a coin flip
/// decides whether the children swap the test cases at that position. Test cases are reused as
/// they are, so the application is never driven.
pub struct UniformSuiteCrossover;

impl Crossover<TestSuite> for UniformSuiteCrossover {
    fn cross(
        &mut self,
        parents: &[Chromosome<TestSuite>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<TestSuite>>, SearchError> {
        let (parent1, parent2) = two_parents(&self.name(), parents)?;
        let mut child1 = parent1.payload().test_cases().to_vec();
        let mut child2 = parent2.payload().test_cases().to_vec();
        for i in 0..child1.len().min(child2.len()) {
            if rng.gen_bool(0.5) {
                std::mem::swap(&mut child1[i], &mut child2[i]);
            }
        }
        Ok(vec![
            Chromosome::new(TestSuite::new(child1)),
            Chromosome::new(TestSuite::new(child2)),
        ])
    }

    fn name(&self) -> String {
        "UniformSuiteCrossover".to_string()
    }
}
