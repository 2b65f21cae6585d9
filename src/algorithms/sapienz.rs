use log::debug;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use crate::algorithms::{GaCore, GaParameters, GaParts, GeneticAlgorithm, Offspring};
use crate::core::{Chromosome, Population, SearchError, TestCase, TestSuite};
use crate::operators::Crossover;
use crate::utils::{
    crowding_distance, fast_non_dominated_sort, normalized_fitness_matrix,
    rank_and_crowding_order,
};

/// The multi-objective test suite generation of Sapienz. Each offspring is produced by one of
/// three actions chosen at random: a uniform crossover of two suites (probability
/// `p_crossover`), a mutation of a suite (probability `p_mutate`) or the reproduction of the
/// parent. A suite mutation first recombines pairs of its shuffled test cases with the test case
/// crossover, each pair with probability `p_mutate`, then applies the suite mutation operator.
///
/// The survivors are selected with the non-dominated sort: whole fronts are kept while they fit
/// in `population_size`, the front that does not fit is truncated by descending crowding
/// distance.
///
/// Implemented based on:
/// > K. Mao, M. Harman and Y. Jia, "Sapienz: multi-objective automated testing for Android
/// > applications," in Proceedings of the 25th International Symposium on Software Testing and
/// > Analysis (ISSTA 2016), pp. 94-105, doi: 10.1145/2931037.2931054.
pub struct Sapienz {
    core: GaCore<TestSuite>,
    /// The crossover used to recombine the test cases of a suite being mutated.
    test_case_crossover: Box<dyn Crossover<TestCase>>,
}

impl Sapienz {
    /// Initialise the algorithm.
    ///
    /// # Arguments
    ///
    /// * `parts`: The injected collaborators working on test suites.
    /// * `parameters`: The hyperparameters.
    /// * `test_case_crossover`: The crossover between two test cases used by the suite mutation.
    ///
    /// returns: `Result<Sapienz, SearchError>`
    pub fn new(
        parts: GaParts<TestSuite>,
        parameters: GaParameters,
        test_case_crossover: Box<dyn Crossover<TestCase>>,
    ) -> Result<Self, SearchError> {
        debug!("Test case crossover: {}", test_case_crossover.name());
        Ok(Self {
            core: GaCore::new("Sapienz", parts, parameters)?,
            test_case_crossover,
        })
    }

    /// Produce one offspring with crossover, mutation or reproduction.
    fn variation(
        test_case_crossover: &mut dyn Crossover<TestCase>,
        parts: &mut GaParts<TestSuite>,
        parameters: &GaParameters,
        parents: &[Chromosome<TestSuite>],
        rng: &mut dyn RngCore,
    ) -> Offspring<TestSuite> {
        let parent = parents.first().ok_or_else(|| {
            SearchError::SelectionOperator(
                parts.selection.name(),
                "No parent was selected".to_string(),
            )
        })?;

        let r: f64 = rng.gen();
        if r < parameters.p_crossover {
            let children = parts.crossover.cross(parents, rng)?;
            Ok(children.into_iter().take(1).collect())
        } else if r < parameters.p_crossover + parameters.p_mutate {
            Self::mutate_suite(test_case_crossover, parts, parameters, parent, rng)
        } else {
            Ok(vec![parent.clone()])
        }
    }

    /// Recombine pairs of shuffled test cases of a suite, then mutate the resulting suite.
    fn mutate_suite(
        test_case_crossover: &mut dyn Crossover<TestCase>,
        parts: &mut GaParts<TestSuite>,
        parameters: &GaParameters,
        parent: &Chromosome<TestSuite>,
        rng: &mut dyn RngCore,
    ) -> Offspring<TestSuite> {
        let mut test_cases = parent.payload().test_cases().to_vec();
        test_cases.shuffle(rng);
        for i in (1..test_cases.len()).step_by(2) {
            if !rng.gen_bool(parameters.p_mutate) {
                continue;
            }
            let children = test_case_crossover.cross(&test_cases[i - 1..=i], rng)?;
            if let [first, second, ..] = children.as_slice() {
                test_cases[i - 1] = first.clone();
                test_cases[i] = second.clone();
            }
        }

        let recombined = Chromosome::new(TestSuite::new(test_cases));
        Ok(parts
            .mutation
            .mutate(&recombined, rng)?
            .into_iter()
            .take(1)
            .collect())
    }
}

/// Select `size` solutions by adding whole non-dominated fronts while they fit and truncating
/// the first front that does not fit by descending crowding distance.
///
/// # Arguments
///
/// * `values`: The normalised fitness of each solution.
/// * `size`: The number of solutions to select.
///
/// returns: `Vec<usize>`. The indexes of the selected solutions.
pub(crate) fn front_survivors(values: &[Vec<f64>], size: usize) -> Vec<usize> {
    let sorting_results = fast_non_dominated_sort(values);
    debug!("Collected {} fronts", sorting_results.fronts.len());

    let mut selected: Vec<usize> = Vec::with_capacity(size);
    for (fi, front) in sorting_results.fronts.iter().enumerate() {
        if selected.len() + front.len() <= size {
            debug!("Adding front #{} (size: {})", fi + 1, front.len());
            selected.extend(front);
        } else {
            let distances = crowding_distance(values, front);
            let order = rank_and_crowding_order(&vec![0; front.len()], &distances);
            let missing = size - selected.len();
            debug!("Truncating front #{} to {} chromosomes", fi + 1, missing);
            selected.extend(order.into_iter().take(missing).map(|i| front[i]));
        }
        if selected.len() == size {
            break;
        }
    }
    selected
}

impl GeneticAlgorithm<TestSuite> for Sapienz {
    fn core(&self) -> &GaCore<TestSuite> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GaCore<TestSuite> {
        &mut self.core
    }

    fn generation_survivors(&self) -> Result<Population<TestSuite>, SearchError> {
        let population = self.core.population();
        let values = normalized_fitness_matrix(population, &self.core.objectives())?;
        Ok(
            front_survivors(&values, self.core.parameters().population_size)
                .into_iter()
                .map(|i| population[i].clone())
                .collect(),
        )
    }

    fn evolve(&mut self) -> Result<(), SearchError> {
        self.core.expect_evolvable()?;
        let survivors = self.generation_survivors()?;
        let test_case_crossover = self.test_case_crossover.as_mut();
        let new_generation = self
            .core
            .breed(survivors, |parts, parameters, parents, rng| {
                Self::variation(test_case_crossover, parts, parameters, parents, rng)
            })?;
        self.core.replace_population(new_generation);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use crate::algorithms::sapienz::front_survivors;
    use crate::algorithms::{GaParameters, GaParts, GeneticAlgorithm, IterTermination, Sapienz};
    use crate::core::test_utils::{test_case, MockDriver};
    use crate::core::{
        ActivityCoverageFitness, Chromosome, CrashFitness, FitnessFunction, SearchError,
        TestCase, TestLengthFitness, TestSuite,
    };
    use crate::operators::{
        Crossover, CutPointMutation, Mutation, OnePointTestCaseCrossover, RandomSelection,
        RandomWalkFactory, SuiteCutPointMutation, SuiteFactory, UniformSuiteCrossover,
    };

    /// Delegate to an operator and count its calls.
    struct Counting<O> {
        inner: O,
        calls: Rc<Cell<usize>>,
    }

    impl<O> Counting<O> {
        fn new(inner: O) -> (Self, Rc<Cell<usize>>) {
            let calls = Rc::new(Cell::new(0));
            (
                Self {
                    inner,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl<T, O: Crossover<T>> Crossover<T> for Counting<O> {
        fn cross(
            &mut self,
            parents: &[Chromosome<T>],
            rng: &mut dyn RngCore,
        ) -> Result<Vec<Chromosome<T>>, SearchError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.cross(parents, rng)
        }

        fn name(&self) -> String {
            self.inner.name()
        }
    }

    impl<T, O: Mutation<T>> Mutation<T> for Counting<O> {
        fn mutate(
            &mut self,
            parent: &Chromosome<T>,
            rng: &mut dyn RngCore,
        ) -> Result<Vec<Chromosome<T>>, SearchError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.mutate(parent, rng)
        }

        fn name(&self) -> String {
            self.inner.name()
        }
    }

    /// The number of calls of the suite crossover, the test case crossover and the suite
    /// mutation.
    struct Calls {
        suite_crossover: Rc<Cell<usize>>,
        test_case_crossover: Rc<Cell<usize>>,
        suite_mutation: Rc<Cell<usize>>,
    }

    fn sapienz(parameters: GaParameters, generations: usize) -> (Sapienz, Calls) {
        let driver = Rc::new(RefCell::new(MockDriver::new(6).with_action("crash")));
        let test_cases = RandomWalkFactory::new(driver.clone(), 5).unwrap();
        let (crossover, suite_crossover) = Counting::new(UniformSuiteCrossover);
        let (mutation, suite_mutation) = Counting::new(SuiteCutPointMutation::new(Box::new(
            CutPointMutation::new(driver.clone(), 5),
        )));
        let (test_case_crossover, test_case_crossover_calls) =
            Counting::new(OnePointTestCaseCrossover::new(driver));
        let parts = GaParts {
            factory: Box::new(SuiteFactory::new(Box::new(test_cases), 4)),
            selection: Box::new(RandomSelection),
            crossover: Box::new(crossover),
            mutation: Box::new(mutation),
            fitness_functions: vec![
                Box::new(ActivityCoverageFitness::new(2)) as Box<dyn FitnessFunction<TestSuite>>,
                Box::new(CrashFitness::new(4)),
                Box::new(TestLengthFitness::new(20)),
            ],
            termination: Box::new(IterTermination(generations)),
        };
        let algorithm = Sapienz::new(parts, parameters, Box::new(test_case_crossover)).unwrap();
        let calls = Calls {
            suite_crossover,
            test_case_crossover: test_case_crossover_calls,
            suite_mutation,
        };
        (algorithm, calls)
    }

    /// Replace two test cases with two new ones holding a single `crossed` action.
    struct MarkerCrossover;

    impl Crossover<TestCase> for MarkerCrossover {
        fn cross(
            &mut self,
            _parents: &[Chromosome<TestCase>],
            _rng: &mut dyn RngCore,
        ) -> Result<Vec<Chromosome<TestCase>>, SearchError> {
            Ok(vec![
                Chromosome::new(test_case(&["crossed"])),
                Chromosome::new(test_case(&["crossed"])),
            ])
        }

        fn name(&self) -> String {
            "MarkerCrossover".to_string()
        }
    }

    /// Return the parent suite unchanged.
    struct KeepSuite;

    impl Mutation<TestSuite> for KeepSuite {
        fn mutate(
            &mut self,
            parent: &Chromosome<TestSuite>,
            _rng: &mut dyn RngCore,
        ) -> Result<Vec<Chromosome<TestSuite>>, SearchError> {
            Ok(vec![parent.clone()])
        }

        fn name(&self) -> String {
            "KeepSuite".to_string()
        }
    }

    fn suite_parts() -> GaParts<TestSuite> {
        let driver = Rc::new(RefCell::new(MockDriver::new(3)));
        GaParts {
            factory: Box::new(SuiteFactory::new(
                Box::new(RandomWalkFactory::new(driver, 2).unwrap()),
                4,
            )),
            selection: Box::new(RandomSelection),
            crossover: Box::new(UniformSuiteCrossover),
            mutation: Box::new(KeepSuite),
            fitness_functions: vec![
                Box::new(TestLengthFitness::new(10)) as Box<dyn FitnessFunction<TestSuite>>,
            ],
            termination: Box::new(IterTermination(1)),
        }
    }

    fn action_ids(suite: &Chromosome<TestSuite>) -> Vec<Vec<String>> {
        suite
            .payload()
            .test_cases()
            .iter()
            .map(|t| {
                t.payload()
                    .actions()
                    .iter()
                    .map(|a| a.id().to_string())
                    .collect()
            })
            .collect()
    }

    #[test]
    /// Whole fronts first, then the most isolated solutions of the front that does not fit.
    fn test_front_survivors() {
        let values = vec![
            vec![1.0, 1.0],
            vec![0.0, 0.9],
            vec![0.9, 0.0],
            vec![0.5, 0.5],
            vec![0.45, 0.55],
            vec![0.1, 0.1],
        ];
        // front 0 is #0; front 1 is #1, #2, #3, #4 where #3 is the most crowded
        assert_eq!(front_survivors(&values, 1), vec![0]);
        let selected = front_survivors(&values, 4);
        assert_eq!(selected.len(), 4);
        assert_eq!(selected[0], 0);
        assert!(!selected.contains(&5));
        assert!(selected.contains(&1) && selected.contains(&2));

        let mut all = front_survivors(&values, 6);
        all.sort();
        assert_eq!(all, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    /// Every pair of shuffled test cases is replaced by the crossover children.
    fn test_mutate_suite_crosses_all_pairs() {
        let mut parts = suite_parts();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let parent = Chromosome::new(TestSuite::new(
            ["a", "b", "c", "d", "e"]
                .iter()
                .map(|a| Chromosome::new(test_case(&[*a])))
                .collect(),
        ));
        let parameters = GaParameters {
            p_mutate: 1.0,
            ..GaParameters::new(4)
        };

        let offspring =
            Sapienz::mutate_suite(&mut MarkerCrossover, &mut parts, &parameters, &parent, &mut rng)
                .unwrap();
        assert_eq!(offspring.len(), 1);
        let ids = action_ids(&offspring[0]);
        assert_eq!(ids.len(), 5);
        // two pairs are crossed, the odd test case is kept
        let crossed = ids.iter().filter(|a| *a == &vec!["crossed".to_string()]).count();
        assert_eq!(crossed, 4);
        assert_eq!(ids[4].len(), 1);
        assert_ne!(ids[4][0], "crossed");
    }

    #[test]
    /// Without crossing, the offspring holds the shuffled test cases of the parent.
    fn test_mutate_suite_without_crossing() {
        let mut parts = suite_parts();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let parent = Chromosome::new(TestSuite::new(
            ["a", "b", "c", "d"]
                .iter()
                .map(|a| Chromosome::new(test_case(&[*a])))
                .collect(),
        ));
        let parameters = GaParameters {
            p_mutate: 0.0,
            ..GaParameters::new(4)
        };

        let offspring =
            Sapienz::mutate_suite(&mut MarkerCrossover, &mut parts, &parameters, &parent, &mut rng)
                .unwrap();
        let mut ids = action_ids(&offspring[0]);
        ids.sort();
        assert_eq!(ids, action_ids(&parent));
        assert_ne!(offspring[0], parent);
    }

    #[test]
    fn test_mutation_only() {
        let parameters = GaParameters {
            p_crossover: 0.0,
            p_mutate: 1.0,
            seed: Some(4),
            ..GaParameters::new(4)
        };
        let (mut algorithm, calls) = sapienz(parameters, 1);
        algorithm.create_initial_population().unwrap();
        algorithm.evolve().unwrap();

        assert_eq!(algorithm.population().len(), 8);
        assert_eq!(calls.suite_crossover.get(), 0);
        assert_eq!(calls.suite_mutation.get(), 4);
        // two pairs of test cases crossed for each of the 4 offspring
        assert_eq!(calls.test_case_crossover.get(), 8);
        assert!(algorithm
            .population()
            .iter()
            .all(|suite| suite.payload().test_cases().len() == 4));
    }

    #[test]
    /// Each crossover gives a single offspring.
    fn test_crossover_only() {
        let parameters = GaParameters {
            p_crossover: 1.0,
            seed: Some(4),
            ..GaParameters::new(4)
        };
        let (mut algorithm, calls) = sapienz(parameters, 1);
        algorithm.create_initial_population().unwrap();
        let initial = algorithm.population().to_vec();
        algorithm.evolve().unwrap();

        assert_eq!(algorithm.population().len(), 8);
        assert_eq!(calls.suite_crossover.get(), 4);
        assert_eq!(calls.suite_mutation.get(), 0);
        assert_eq!(calls.test_case_crossover.get(), 0);
        let new = algorithm
            .population()
            .iter()
            .filter(|c| !initial.contains(c))
            .count();
        assert_eq!(new, 4);
    }

    #[test]
    fn test_reproduction_only() {
        let parameters = GaParameters {
            p_crossover: 0.0,
            p_mutate: 0.0,
            seed: Some(4),
            ..GaParameters::new(4)
        };
        let (mut algorithm, calls) = sapienz(parameters, 1);
        algorithm.create_initial_population().unwrap();
        let initial = algorithm.population().to_vec();
        algorithm.evolve().unwrap();

        assert_eq!(algorithm.population().len(), 8);
        assert!(algorithm.population().iter().all(|c| initial.contains(c)));
        assert_eq!(calls.suite_crossover.get(), 0);
        assert_eq!(calls.suite_mutation.get(), 0);
    }

    #[test]
    fn test_run() {
        let parameters = GaParameters {
            seed: Some(4),
            ..GaParameters::new(4)
        };
        let (mut algorithm, _) = sapienz(parameters, 3);
        algorithm.run().unwrap();

        assert_eq!(algorithm.generation(), 3);
        assert_eq!(algorithm.population().len(), 8);
        assert_eq!(algorithm.generation_survivors().unwrap().len(), 4);
        assert!(algorithm
            .population()
            .iter()
            .all(|suite| suite.payload().test_cases().len() == 4));
    }
}
