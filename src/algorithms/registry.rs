use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::algorithms::{
    AnyOf, GaParameters, GaParts, GeneticAlgorithm, IterTermination, Mio, MioArgs, Mosa,
    NeverTermination, Nsga2, Sapienz, StandardGa, TerminationCondition, TimeTermination,
};
use crate::core::{FitnessFunctions, Payload, SearchError, TestCase, TestSuite};
use crate::operators::{
    ChromosomeFactory, Crossover, CutPointMutation, FitnessProportionateSelection,
    FitnessSortedSelection, IdentitySelection, Mutation, OnePointTestCaseCrossover,
    RandomSelection, RandomWalkFactory, Selection, SuiteCutPointMutation, SuiteFactory,
    UniformSuiteCrossover,
};
use crate::sut::SharedDriver;

/// The configuration of a run: the identifiers of the registered algorithm and operators, and the
/// hyperparameters. A missing hyperparameter takes its default value unless `use_defaults` is
/// `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    /// The algorithm identifier.
    pub algorithm: String,
    /// The chromosome factory identifier.
    pub chromosome_factory: String,
    /// The selection operator identifier.
    pub selection: String,
    /// The crossover operator identifier.
    pub crossover: String,
    /// The mutation operator identifier.
    pub mutation: String,
    /// The termination condition identifier.
    pub termination: String,
    pub population_size: Option<usize>,
    pub big_population_size: Option<usize>,
    pub generation_survivor_count: Option<usize>,
    pub p_crossover: Option<f64>,
    pub p_mutate: Option<f64>,
    pub p_sample_random: Option<f64>,
    pub focused_search_start: Option<f64>,
    /// The time budget of the run in seconds.
    pub search_budget_secs: Option<u64>,
    pub max_generations: Option<usize>,
    pub seed: Option<u64>,
    /// Whether a missing hyperparameter takes its default value.
    pub use_defaults: bool,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            algorithm: "standard".to_string(),
            chromosome_factory: "random_walk".to_string(),
            selection: "random".to_string(),
            crossover: "one_point".to_string(),
            mutation: "cut_point".to_string(),
            termination: "iter".to_string(),
            population_size: None,
            big_population_size: None,
            generation_survivor_count: None,
            p_crossover: None,
            p_mutate: None,
            p_sample_random: None,
            focused_search_start: None,
            search_budget_secs: None,
            max_generations: None,
            seed: None,
            use_defaults: true,
        }
    }
}

impl GaConfig {
    /// Load the configuration from a JSON string.
    ///
    /// # Arguments
    ///
    /// * `data`: The JSON data.
    ///
    /// returns: `Result<GaConfig, SearchError>`
    pub fn from_json(data: &str) -> Result<Self, SearchError> {
        serde_json::from_str(data).map_err(|e| {
            SearchError::InvalidParameter(
                "configuration".to_string(),
                format!("The JSON data cannot be parsed: {e}"),
            )
        })
    }

    /// Resolve a parameter, falling back to its default when allowed.
    fn value<V>(&self, name: &str, value: Option<V>, default: V) -> Result<V, SearchError> {
        match value {
            Some(value) => Ok(value),
            None if self.use_defaults => Ok(default),
            None => Err(SearchError::MissingParameter(name.to_string())),
        }
    }

    fn size(&self, name: &str, value: Option<usize>, default: usize) -> Result<usize, SearchError> {
        let value = self.value(name, value, default)?;
        if value == 0 {
            return Err(SearchError::InvalidParameter(
                name.to_string(),
                "The value must be at least 1".to_string(),
            ));
        }
        Ok(value)
    }

    fn probability(&self, name: &str, value: Option<f64>, default: f64) -> Result<f64, SearchError> {
        let value = self.value(name, value, default)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(SearchError::InvalidParameter(
                name.to_string(),
                format!("The probability {value} must be in [0, 1]"),
            ));
        }
        Ok(value)
    }

    pub fn population_size(&self) -> Result<usize, SearchError> {
        self.size("population_size", self.population_size, 20)
    }

    /// The size of a new generation. This defaults to twice the population size.
    ///
    /// returns: `Result<usize, SearchError>`
    pub fn big_population_size(&self) -> Result<usize, SearchError> {
        let population_size = self.population_size()?;
        let value = self.size(
            "big_population_size",
            self.big_population_size,
            2 * population_size,
        )?;
        if value < population_size {
            return Err(SearchError::InvalidParameter(
                "big_population_size".to_string(),
                format!("The value {value} is smaller than the population size {population_size}"),
            ));
        }
        Ok(value)
    }

    pub fn generation_survivor_count(&self) -> Result<usize, SearchError> {
        let population_size = self.population_size()?;
        self.size(
            "generation_survivor_count",
            self.generation_survivor_count,
            population_size,
        )
    }

    pub fn p_crossover(&self) -> Result<f64, SearchError> {
        self.probability("p_crossover", self.p_crossover, 0.7)
    }

    pub fn p_mutate(&self) -> Result<f64, SearchError> {
        self.probability("p_mutate", self.p_mutate, 0.3)
    }

    pub fn p_sample_random(&self) -> Result<f64, SearchError> {
        self.probability("p_sample_random", self.p_sample_random, 0.5)
    }

    pub fn focused_search_start(&self) -> Result<f64, SearchError> {
        self.probability("focused_search_start", self.focused_search_start, 0.5)
    }

    pub fn search_budget(&self) -> Result<Duration, SearchError> {
        let seconds = self.value("search_budget_secs", self.search_budget_secs, 3600)?;
        Ok(Duration::from_secs(seconds))
    }

    pub fn max_generations(&self) -> Result<usize, SearchError> {
        self.size("max_generations", self.max_generations, 10)
    }

    /// The hyperparameters of the generational algorithms.
    ///
    /// returns: `Result<GaParameters, SearchError>`
    pub fn ga_parameters(&self) -> Result<GaParameters, SearchError> {
        Ok(GaParameters {
            population_size: self.population_size()?,
            big_population_size: self.big_population_size()?,
            generation_survivor_count: self.generation_survivor_count()?,
            p_crossover: self.p_crossover()?,
            p_mutate: self.p_mutate()?,
            seed: self.seed,
        })
    }

    /// The arguments of [`Mio`].
    ///
    /// returns: `Result<MioArgs, SearchError>`
    pub fn mio_args(&self) -> Result<MioArgs, SearchError> {
        Ok(MioArgs {
            p_sample_random: self.p_sample_random()?,
            focused_search_start: self.focused_search_start()?,
            search_budget: self.search_budget()?,
        })
    }
}

/// Build an algorithm from its collaborators and the configuration.
pub type AlgorithmBuilder<T> =
    Box<dyn Fn(GaParts<T>, &GaConfig) -> Result<Box<dyn GeneticAlgorithm<T>>, SearchError>>;
/// Build a selection operator from the configuration.
pub type SelectionBuilder<T> = Box<dyn Fn(&GaConfig) -> Result<Box<dyn Selection<T>>, SearchError>>;
/// Build a crossover operator from the configuration.
pub type CrossoverBuilder<T> = Box<dyn Fn(&GaConfig) -> Result<Box<dyn Crossover<T>>, SearchError>>;
/// Build a mutation operator from the configuration.
pub type MutationBuilder<T> = Box<dyn Fn(&GaConfig) -> Result<Box<dyn Mutation<T>>, SearchError>>;
/// Build a chromosome factory from the configuration.
pub type FactoryBuilder<T> =
    Box<dyn Fn(&GaConfig) -> Result<Box<dyn ChromosomeFactory<T>>, SearchError>>;
/// Build a termination condition from the configuration.
pub type TerminationBuilder =
    Box<dyn Fn(&GaConfig) -> Result<Box<dyn TerminationCondition>, SearchError>>;

/// Map the identifiers used in a [`GaConfig`] to the constructors of algorithms and operators
/// working on payloads of type `T`.
pub struct Registry<T> {
    algorithms: HashMap<String, AlgorithmBuilder<T>>,
    selections: HashMap<String, SelectionBuilder<T>>,
    crossovers: HashMap<String, CrossoverBuilder<T>>,
    mutations: HashMap<String, MutationBuilder<T>>,
    factories: HashMap<String, FactoryBuilder<T>>,
    terminations: HashMap<String, TerminationBuilder>,
}

impl<T: Payload + 'static> Registry<T> {
    /// Create a registry with the algorithms, selection operators and termination conditions
    /// that work on any payload:
    /// - algorithms: `standard`, `nsga2`, `mosa` and `mio`;
    /// - selection: `random`, `fitness_proportionate`, `fitness_sorted` and `identity`;
    /// - termination: `iter`, `time`, `never` and `iter_or_time`.
    ///
    /// returns: `Registry<T>`
    pub fn new() -> Self {
        let mut registry = Self {
            algorithms: HashMap::new(),
            selections: HashMap::new(),
            crossovers: HashMap::new(),
            mutations: HashMap::new(),
            factories: HashMap::new(),
            terminations: HashMap::new(),
        };

        registry.register_algorithm("standard", |parts, config| {
            Ok(Box::new(StandardGa::new(parts, config.ga_parameters()?)?))
        });
        registry.register_algorithm("nsga2", |parts, config| {
            Ok(Box::new(Nsga2::new(parts, config.ga_parameters()?)?))
        });
        registry.register_algorithm("mosa", |parts, config| {
            Ok(Box::new(Mosa::new(parts, config.ga_parameters()?)?))
        });
        registry.register_algorithm("mio", |parts, config| {
            Ok(Box::new(Mio::new(
                parts,
                config.ga_parameters()?,
                config.mio_args()?,
            )?))
        });

        registry.register_selection("random", |_| Ok(Box::new(RandomSelection)));
        registry.register_selection("fitness_proportionate", |_| {
            Ok(Box::new(FitnessProportionateSelection))
        });
        registry.register_selection("fitness_sorted", |_| Ok(Box::new(FitnessSortedSelection)));
        registry.register_selection("identity", |_| Ok(Box::new(IdentitySelection)));

        registry.register_termination("iter", |config| {
            Ok(Box::new(IterTermination(config.max_generations()?)))
        });
        registry.register_termination("time", |config| {
            Ok(Box::new(TimeTermination(config.search_budget()?)))
        });
        registry.register_termination("never", |_| Ok(Box::new(NeverTermination)));
        registry.register_termination("iter_or_time", |config| {
            Ok(Box::new(AnyOf(vec![
                Box::new(IterTermination(config.max_generations()?)),
                Box::new(TimeTermination(config.search_budget()?)),
            ])))
        });
        registry
    }
}

impl<T: Payload + 'static> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    /// Register an algorithm constructor. An existing constructor with the same name is
    /// replaced.
    ///
    /// # Arguments
    ///
    /// * `name`: The identifier used in [`GaConfig::algorithm`].
    /// * `builder`: The constructor.
    pub fn register_algorithm<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(GaParts<T>, &GaConfig) -> Result<Box<dyn GeneticAlgorithm<T>>, SearchError> + 'static,
    {
        self.algorithms.insert(name.to_string(), Box::new(builder));
    }

    pub fn register_selection<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&GaConfig) -> Result<Box<dyn Selection<T>>, SearchError> + 'static,
    {
        self.selections.insert(name.to_string(), Box::new(builder));
    }

    pub fn register_crossover<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&GaConfig) -> Result<Box<dyn Crossover<T>>, SearchError> + 'static,
    {
        self.crossovers.insert(name.to_string(), Box::new(builder));
    }

    pub fn register_mutation<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&GaConfig) -> Result<Box<dyn Mutation<T>>, SearchError> + 'static,
    {
        self.mutations.insert(name.to_string(), Box::new(builder));
    }

    pub fn register_factory<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&GaConfig) -> Result<Box<dyn ChromosomeFactory<T>>, SearchError> + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(builder));
    }

    pub fn register_termination<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&GaConfig) -> Result<Box<dyn TerminationCondition>, SearchError> + 'static,
    {
        self.terminations.insert(name.to_string(), Box::new(builder));
    }
}

impl Registry<TestCase> {
    /// Create a registry for test case generation. On top of [`Registry::new`], this registers
    /// the `random_walk` factory, the `one_point` crossover and the `cut_point` mutation, all
    /// driving the application through `driver`.
    ///
    /// # Arguments
    ///
    /// * `driver`: The driver of the application under test.
    /// * `max_actions`: The maximum number of actions of a test case.
    ///
    /// returns: `Registry<TestCase>`
    pub fn for_test_cases(driver: SharedDriver, max_actions: usize) -> Self {
        let mut registry = Self::new();
        let factory_driver = driver.clone();
        registry.register_factory("random_walk", move |_| {
            Ok(Box::new(RandomWalkFactory::new(
                factory_driver.clone(),
                max_actions,
            )?))
        });
        let crossover_driver = driver.clone();
        registry.register_crossover("one_point", move |_| {
            Ok(Box::new(OnePointTestCaseCrossover::new(
                crossover_driver.clone(),
            )))
        });
        registry.register_mutation("cut_point", move |_| {
            Ok(Box::new(CutPointMutation::new(driver.clone(), max_actions)))
        });
        registry
    }
}

impl Registry<TestSuite> {
    /// Create a registry for test suite generation. On top of [`Registry::new`], this registers
    /// the `sapienz` algorithm, the `suite` factory, the `uniform_suite` crossover and the
    /// `suite_cut_point` mutation.
    ///
    /// # Arguments
    ///
    /// * `driver`: The driver of the application under test.
    /// * `max_actions`: The maximum number of actions of a test case.
    /// * `test_cases_per_suite`: The number of test cases of a new suite.
    ///
    /// returns: `Registry<TestSuite>`
    pub fn for_test_suites(
        driver: SharedDriver,
        max_actions: usize,
        test_cases_per_suite: usize,
    ) -> Self {
        let mut registry = Self::new();
        let algorithm_driver = driver.clone();
        registry.register_algorithm("sapienz", move |parts, config| {
            Ok(Box::new(Sapienz::new(
                parts,
                config.ga_parameters()?,
                Box::new(OnePointTestCaseCrossover::new(algorithm_driver.clone())),
            )?))
        });
        let factory_driver = driver.clone();
        registry.register_factory("suite", move |_| {
            let test_cases = RandomWalkFactory::new(factory_driver.clone(), max_actions)?;
            Ok(Box::new(SuiteFactory::new(
                Box::new(test_cases),
                test_cases_per_suite,
            )))
        });
        registry.register_crossover("uniform_suite", |_| Ok(Box::new(UniformSuiteCrossover)));
        registry.register_mutation("suite_cut_point", move |_| {
            Ok(Box::new(SuiteCutPointMutation::new(Box::new(
                CutPointMutation::new(driver.clone(), max_actions),
            ))))
        });
        registry
    }
}

/// Look up a builder, failing with [`SearchError::UnknownIdentifier`].
fn lookup<'a, B>(
    builders: &'a HashMap<String, B>,
    kind: &str,
    name: &str,
) -> Result<&'a B, SearchError> {
    builders
        .get(name)
        .ok_or_else(|| SearchError::UnknownIdentifier(kind.to_string(), name.to_string()))
}

/// Assemble an algorithm from a [`GaConfig`] and a [`Registry`].
pub struct GaBuilder<'a, T> {
    registry: &'a Registry<T>,
    config: GaConfig,
}

impl<'a, T> GaBuilder<'a, T> {
    pub fn new(registry: &'a Registry<T>, config: GaConfig) -> Self {
        Self { registry, config }
    }

    /// Build the configured algorithm. All the identifiers are resolved before any operator is
    /// constructed, so a configuration error never reaches the application under test.
    ///
    /// # Arguments
    ///
    /// * `fitness_functions`: The targets of the run.
    ///
    /// returns: `Result<Box<dyn GeneticAlgorithm<T>>, SearchError>`
    pub fn build(
        &self,
        fitness_functions: FitnessFunctions<T>,
    ) -> Result<Box<dyn GeneticAlgorithm<T>>, SearchError> {
        let config = &self.config;
        let registry = self.registry;
        let algorithm = lookup(&registry.algorithms, "algorithm", &config.algorithm)?;
        let factory = lookup(
            &registry.factories,
            "chromosome factory",
            &config.chromosome_factory,
        )?;
        let selection = lookup(&registry.selections, "selection operator", &config.selection)?;
        let crossover = lookup(&registry.crossovers, "crossover operator", &config.crossover)?;
        let mutation = lookup(&registry.mutations, "mutation operator", &config.mutation)?;
        let termination = lookup(
            &registry.terminations,
            "termination condition",
            &config.termination,
        )?;
        // validate the numeric parameters before creating anything
        config.ga_parameters()?;
        debug!("Resolved all the identifiers of the configuration");

        let parts = GaParts {
            factory: factory(config)?,
            selection: selection(config)?,
            crossover: crossover(config)?,
            mutation: mutation(config)?,
            fitness_functions,
            termination: termination(config)?,
        };
        let algorithm = algorithm(parts, config)?;
        info!("Built {}", algorithm.name());
        Ok(algorithm)
    }
}
