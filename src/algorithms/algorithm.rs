use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use log::{debug, error, info};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::algorithms::{SearchProgress, TerminationCondition};
use crate::core::{
    get_rng, Chromosome, FitnessFunction, FitnessFunctions, Payload, Population, SearchError,
};
use crate::operators::{ChromosomeFactory, Crossover, Mutation, Selection};
use crate::utils::{argsort, Sort};

/// The lifecycle of a run. A run moves from `NotStarted` to `PopulationInitialized` when the
/// initial population is created, to `Evolving` after the first generation and to `Terminated`
/// when [`GeneticAlgorithm::run`] sees the termination condition met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchState {
    NotStarted,
    PopulationInitialized,
    Evolving,
    Terminated,
}

impl Display for SearchState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SearchState::NotStarted => "not started",
            SearchState::PopulationInitialized => "population initialised",
            SearchState::Evolving => "evolving",
            SearchState::Terminated => "terminated",
        };
        write!(f, "{name}")
    }
}

/// The hyperparameters shared by the generational algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaParameters {
    /// The number of chromosomes in the initial population and of survivors kept by the
    /// Pareto-based algorithms.
    pub population_size: usize,
    /// The size of a new generation: the survivors plus the offspring.
    pub big_population_size: usize,
    /// The number of fittest chromosomes the standard algorithm keeps at each generation.
    pub generation_survivor_count: usize,
    /// The probability of producing offspring with the crossover operator.
    pub p_crossover: f64,
    /// The probability of mutating an offspring.
    pub p_mutate: f64,
    /// The seed of the random number generator. A random seed is used when `None`.
    pub seed: Option<u64>,
}

impl GaParameters {
    /// Create the parameters for a population size with the default values for the other
    /// parameters: a big population twice as large, all chromosomes surviving, a crossover
    /// probability of `0.7` and a mutation probability of `0.3`.
    ///
    /// # Arguments
    ///
    /// * `population_size`: The population size.
    ///
    /// returns: `GaParameters`
    pub fn new(population_size: usize) -> Self {
        Self {
            population_size,
            big_population_size: 2 * population_size,
            generation_survivor_count: population_size,
            p_crossover: 0.7,
            p_mutate: 0.3,
            seed: None,
        }
    }

    /// Check the parameters.
    ///
    /// # Arguments
    ///
    /// * `name`: The algorithm name used in the error.
    ///
    /// returns: `Result<(), SearchError>`
    pub fn validate(&self, name: &str) -> Result<(), SearchError> {
        let fail = |message: String| Err(SearchError::AlgorithmInit(name.to_string(), message));
        if self.population_size == 0 {
            return fail("The population size must be at least 1".to_string());
        }
        if self.big_population_size < self.population_size {
            return fail(format!(
                "The big population size ({}) must not be smaller than the population size ({})",
                self.big_population_size, self.population_size
            ));
        }
        for (label, p) in [("crossover", self.p_crossover), ("mutation", self.p_mutate)] {
            if !(0.0..=1.0).contains(&p) {
                return fail(format!("The {label} probability {p} must be in [0, 1]"));
            }
        }
        Ok(())
    }
}

impl Default for GaParameters {
    fn default() -> Self {
        Self::new(20)
    }
}

/// The collaborators injected into an algorithm.
pub struct GaParts<T> {
    /// The factory creating new chromosomes.
    pub factory: Box<dyn ChromosomeFactory<T>>,
    /// The operator ordering the parent candidates.
    pub selection: Box<dyn Selection<T>>,
    /// The operator recombining parents.
    pub crossover: Box<dyn Crossover<T>>,
    /// The operator mutating offspring.
    pub mutation: Box<dyn Mutation<T>>,
    /// The targets of the run.
    pub fitness_functions: FitnessFunctions<T>,
    /// The condition that stops [`GeneticAlgorithm::run`].
    pub termination: Box<dyn TerminationCondition>,
}

/// The offspring produced from a list of parent candidates.
pub type Offspring<T> = Result<Vec<Chromosome<T>>, SearchError>;

/// The state and collaborators shared by all the algorithms: the population, the generation
/// counter, the lifecycle state, the injected operators and the random number generator.
pub struct GaCore<T> {
    /// The algorithm name.
    name: String,
    /// The injected collaborators.
    parts: GaParts<T>,
    /// The hyperparameters.
    parameters: GaParameters,
    /// The current population.
    population: Population<T>,
    /// The number of completed generations.
    generation: usize,
    /// The lifecycle state.
    state: SearchState,
    /// The random number generator shared by all the stochastic operators.
    rng: Box<dyn RngCore>,
    /// When the initial population creation started.
    start_time: Option<Instant>,
    /// The wall-clock time matching `start_time`.
    started_at: Option<DateTime<Local>>,
}

impl<T> GaCore<T> {
    /// Create the shared state of an algorithm. This returns an error if the parameters are not
    /// valid or no fitness function is given.
    ///
    /// # Arguments
    ///
    /// * `name`: The algorithm name.
    /// * `parts`: The injected collaborators.
    /// * `parameters`: The hyperparameters.
    ///
    /// returns: `Result<GaCore<T>, SearchError>`
    pub fn new(name: &str, parts: GaParts<T>, parameters: GaParameters) -> Result<Self, SearchError> {
        parameters.validate(name)?;
        if parts.fitness_functions.is_empty() {
            return Err(SearchError::AlgorithmInit(
                name.to_string(),
                "At least one fitness function is needed".to_string(),
            ));
        }
        info!("{}", Self::algorithm_option_str(&parts, &parameters));

        Ok(Self {
            name: name.to_string(),
            rng: get_rng(parameters.seed),
            parts,
            parameters,
            population: Vec::new(),
            generation: 0,
            state: SearchState::NotStarted,
            start_time: None,
            started_at: None,
        })
    }

    /// Get a string listing the algorithm options.
    ///
    /// # Arguments
    ///
    /// * `parts`: The injected collaborators.
    /// * `parameters`: The hyperparameters.
    ///
    /// returns: `String`
    fn algorithm_option_str(parts: &GaParts<T>, parameters: &GaParameters) -> String {
        let mut log_opts: String = "Algorithm options are:\n".to_owned();
        log_opts.push_str(
            format!(
                "\t* Number of fitness functions {:>8}\n\t* Population size {:>20}\n\t* Big population size {:>16}\n\t* Generation survivors {:>15}\n",
                parts.fitness_functions.len(),
                parameters.population_size,
                parameters.big_population_size,
                parameters.generation_survivor_count,
            )
            .as_str(),
        );
        log_opts.push_str(
            format!(
                "\t* Crossover probability {:>14}\n\t* Mutation probability {:>15}\n",
                parameters.p_crossover, parameters.p_mutate,
            )
            .as_str(),
        );
        log_opts.push_str(
            format!(
                "\t* Factory: {}\n\t* Selection: {}\n\t* Crossover: {}\n\t* Mutation: {}\n\t* Termination: {}",
                parts.factory.name(),
                parts.selection.name(),
                parts.crossover.name(),
                parts.mutation.name(),
                parts.termination.name(),
            )
            .as_str(),
        );
        log_opts
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &GaParameters {
        &self.parameters
    }

    pub fn fitness_functions(&self) -> &[Box<dyn FitnessFunction<T>>] {
        &self.parts.fitness_functions
    }

    /// The fitness functions as trait objects, in objective order.
    ///
    /// returns: `Vec<&dyn FitnessFunction<T>>`
    pub fn objectives(&self) -> Vec<&dyn FitnessFunction<T>> {
        self.parts
            .fitness_functions
            .iter()
            .map(|f| f.as_ref())
            .collect()
    }

    pub fn population(&self) -> &[Chromosome<T>] {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn termination(&self) -> &dyn TerminationCondition {
        self.parts.termination.as_ref()
    }

    /// The time elapsed since the initial population creation started. This is zero before the
    /// run starts.
    ///
    /// returns: `Duration`
    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or_default()
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    /// The progress handed to the termination condition.
    ///
    /// returns: `SearchProgress`
    pub fn progress(&self) -> SearchProgress {
        SearchProgress {
            generation: self.generation,
            elapsed: self.elapsed(),
        }
    }

    /// The random number generator of the run.
    pub(crate) fn rng(&mut self) -> &mut dyn RngCore {
        &mut *self.rng
    }

    /// The factory and the random number generator, borrowed together.
    pub(crate) fn factory_and_rng(&mut self) -> (&mut dyn ChromosomeFactory<T>, &mut dyn RngCore) {
        (self.parts.factory.as_mut(), &mut *self.rng)
    }

    /// The mutation operator and the random number generator, borrowed together.
    pub(crate) fn mutation_and_rng(&mut self) -> (&mut dyn Mutation<T>, &mut dyn RngCore) {
        (self.parts.mutation.as_mut(), &mut *self.rng)
    }

    /// Fail with [`SearchError::InvalidState`] unless the run is in one of the `allowed` states.
    ///
    /// # Arguments
    ///
    /// * `operation`: The operation name used in the error.
    /// * `allowed`: The states the operation is allowed in.
    ///
    /// returns: `Result<(), SearchError>`
    pub(crate) fn expect_state(
        &self,
        operation: &str,
        allowed: &[SearchState],
    ) -> Result<(), SearchError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SearchError::InvalidState(
                self.name.clone(),
                operation.to_string(),
                self.state.to_string(),
            ))
        }
    }

    /// Fail unless a new generation can be created.
    pub(crate) fn expect_evolvable(&self) -> Result<(), SearchError> {
        self.expect_state(
            "evolve",
            &[SearchState::PopulationInitialized, SearchState::Evolving],
        )
    }

    /// Start the clock and fill the population with `population_size` new chromosomes from the
    /// factory.
    ///
    /// returns: `Result<(), SearchError>`
    pub(crate) fn initialise_population(&mut self) -> Result<(), SearchError> {
        self.expect_state("create the initial population", &[SearchState::NotStarted])?;
        self.start_time = Some(Instant::now());
        self.started_at = Some(Local::now());

        let mut population = Vec::with_capacity(self.parameters.population_size);
        for _ in 0..self.parameters.population_size {
            population.push(self.parts.factory.create_chromosome(&mut *self.rng)?);
        }
        debug!("Created initial population with {} chromosomes", population.len());
        self.population = population;
        self.state = SearchState::PopulationInitialized;
        Ok(())
    }

    /// Replace the population in one swap and count the generation.
    ///
    /// # Arguments
    ///
    /// * `population`: The new generation.
    pub(crate) fn replace_population(&mut self, population: Population<T>) {
        debug!("New population size is {}", population.len());
        self.population = population;
        self.generation += 1;
        self.state = SearchState::Evolving;
    }

    /// Replace the population without counting a generation.
    pub(crate) fn set_population(&mut self, population: Population<T>) {
        self.population = population;
    }

    pub(crate) fn terminate(&mut self) {
        self.state = SearchState::Terminated;
    }

    /// Keep the `generation_survivor_count` chromosomes with the highest normalised fitness for
    /// the first fitness function. Ties keep the population order.
    ///
    /// returns: `Result<Population<T>, SearchError>`
    pub(crate) fn fittest_survivors(&self) -> Result<Population<T>, SearchError> {
        let first = self.parts.fitness_functions.first().ok_or_else(|| {
            SearchError::SurvivalOperator(
                self.name.clone(),
                "At least one fitness function is needed".to_string(),
            )
        })?;
        let values = self
            .population
            .iter()
            .map(|c| first.normalized_fitness(c))
            .collect::<Result<Vec<f64>, SearchError>>()?;

        Ok(argsort(&values, Sort::Descending)
            .into_iter()
            .take(self.parameters.generation_survivor_count)
            .map(|i| self.population[i].clone())
            .collect())
    }

    /// Create a new generation starting from `survivors`: parent candidates are repeatedly
    /// selected from the current population and turned into offspring by `variation` until the
    /// generation holds `big_population_size` chromosomes. Offspring that do not fit anymore are
    /// discarded. The current population is not changed.
    ///
    /// # Arguments
    ///
    /// * `survivors`: The chromosomes carried over to the new generation.
    /// * `variation`: The function turning parent candidates into offspring.
    ///
    /// returns: `Result<Population<T>, SearchError>`. The new generation.
    pub(crate) fn breed<F>(
        &mut self,
        survivors: Population<T>,
        mut variation: F,
    ) -> Result<Population<T>, SearchError>
    where
        F: FnMut(&mut GaParts<T>, &GaParameters, &[Chromosome<T>], &mut dyn RngCore) -> Offspring<T>,
    {
        let target = self.parameters.big_population_size;
        let mut new_generation = survivors;
        new_generation.truncate(target);

        while new_generation.len() < target {
            let rng: &mut dyn RngCore = &mut *self.rng;
            let parents = self.parts.selection.select(
                &self.population,
                &self.parts.fitness_functions,
                rng,
            )?;
            let offspring = variation(&mut self.parts, &self.parameters, &parents, rng)?;
            if offspring.is_empty() {
                return Err(SearchError::Generic(format!(
                    "{} produced no offspring from {} parents",
                    self.name,
                    parents.len()
                )));
            }
            for child in offspring {
                if new_generation.len() >= target {
                    break;
                }
                new_generation.push(child);
            }
        }
        Ok(new_generation)
    }

    /// The standard variation: with probability `p_crossover` the parents are recombined,
    /// otherwise the first parent is taken; each resulting chromosome is then replaced by its
    /// mutation with probability `p_mutate`.
    ///
    /// # Arguments
    ///
    /// * `parts`: The operators.
    /// * `parameters`: The probabilities.
    /// * `parents`: The parent candidates.
    /// * `rng`: The random number generator.
    ///
    /// returns: `Offspring<T>`
    pub(crate) fn standard_variation(
        parts: &mut GaParts<T>,
        parameters: &GaParameters,
        parents: &[Chromosome<T>],
        rng: &mut dyn RngCore,
    ) -> Offspring<T> {
        let first = parents.first().ok_or_else(|| {
            SearchError::SelectionOperator(
                parts.selection.name(),
                "No parent was selected".to_string(),
            )
        })?;
        let offspring = if rng.gen_bool(parameters.p_crossover) {
            parts.crossover.cross(parents, rng)?
        } else {
            vec![first.clone()]
        };

        let mut result = Vec::with_capacity(offspring.len());
        for child in offspring {
            if rng.gen_bool(parameters.p_mutate) {
                result.extend(parts.mutation.mutate(&child, rng)?);
            } else {
                result.push(child);
            }
        }
        Ok(result)
    }
}

/// The trait to use to implement a genetic algorithm. An implementation owns a [`GaCore`] and
/// overrides the survivor selection, the generation step or the archive update; the lifecycle
/// and the run loop are shared.
pub trait GeneticAlgorithm<T> {
    /// The shared state.
    fn core(&self) -> &GaCore<T>;

    /// The shared state, mutably.
    fn core_mut(&mut self) -> &mut GaCore<T>;

    /// Return the algorithm name.
    ///
    /// return: `String`.
    fn name(&self) -> String {
        self.core().name().to_string()
    }

    /// Return the number of completed generations.
    ///
    /// return: `usize`.
    fn generation(&self) -> usize {
        self.core().generation()
    }

    /// Return the lifecycle state.
    ///
    /// return: `SearchState`.
    fn state(&self) -> SearchState {
        self.core().state()
    }

    /// Return the current population.
    ///
    /// return: `&[Chromosome<T>]`.
    fn population(&self) -> &[Chromosome<T>] {
        self.core().population()
    }

    fn fitness_functions(&self) -> &[Box<dyn FitnessFunction<T>>] {
        self.core().fitness_functions()
    }

    /// The outcome of the run: the population, or the archive for the archive-based algorithms.
    ///
    /// return: `Population<T>`.
    fn result(&self) -> Population<T> {
        self.population().to_vec()
    }

    /// Update the persistent archive with the current population. This is called after the
    /// initial population is created and after every generation; algorithms without an archive
    /// do nothing.
    ///
    /// return: `Result<(), SearchError>`
    fn update_archive(&mut self) -> Result<(), SearchError> {
        Ok(())
    }

    /// Fill the population using the chromosome factory. This can only be called once.
    ///
    /// return: `Result<(), SearchError>`
    fn create_initial_population(&mut self) -> Result<(), SearchError> {
        self.core_mut().initialise_population()?;
        self.update_archive()
    }

    /// Select the chromosomes of the current population carried over to the next generation.
    ///
    /// return: `Result<Population<T>, SearchError>`
    fn generation_survivors(&self) -> Result<Population<T>, SearchError> {
        self.core().fittest_survivors()
    }

    /// Create a new generation: the survivors plus the offspring of the standard variation.
    ///
    /// return: `Result<(), SearchError>`
    fn evolve(&mut self) -> Result<(), SearchError> {
        self.core().expect_evolvable()?;
        let survivors = self.generation_survivors()?;
        debug!("Keeping {} survivors", survivors.len());
        let new_generation = self
            .core_mut()
            .breed(survivors, GaCore::<T>::standard_variation)?;
        self.core_mut().replace_population(new_generation);
        self.update_archive()
    }

    /// Format the elapsed time as string.
    ///
    /// return: `String`.
    fn elapsed_as_string(&self) -> String {
        let seconds = self.core().elapsed().as_secs();
        format!(
            "{:0>2} hours, {:0>2} minutes and {:0>2} seconds",
            seconds / 3600,
            (seconds / 60) % 60,
            seconds % 60
        )
    }

    /// Run the algorithm: create the initial population, then evolve until the termination
    /// condition is met. A fatal error aborts the run immediately.
    ///
    /// return: `Result<(), SearchError>`
    fn run(&mut self) -> Result<(), SearchError> {
        info!("Starting {}", self.name());
        if let Err(e) = self.create_initial_population() {
            if e.is_fatal() {
                error!("Aborting {}: {e}", self.name());
            }
            return Err(e);
        }

        loop {
            let progress = self.core().progress();
            let termination = self.core().termination();
            if termination.is_met(&progress) {
                info!(
                    "Stopping evolution because the {} was reached",
                    termination.name()
                );
                break;
            }

            info!("Generation #{}", self.generation() + 1);
            if let Err(e) = self.evolve() {
                if e.is_fatal() {
                    error!("Aborting {} at generation #{}: {e}", self.name(), self.generation());
                }
                return Err(e);
            }
            info!(
                "Evolved generation #{} - Elapsed Time: {:?}",
                self.generation(),
                self.core().elapsed()
            );
        }

        info!("Took {}", self.elapsed_as_string());
        self.core_mut().terminate();
        Ok(())
    }

    /// Save the algorithm data (name, generation, timing and the result chromosomes with their
    /// fitness) to a JSON file.
    ///
    /// # Arguments
    ///
    /// * `destination`: The path to the JSON file.
    ///
    /// return `Result<(), SearchError>`
    fn save_to_json(&self, destination: &Path) -> Result<(), SearchError>
    where
        T: Serialize + Payload,
    {
        let chromosomes = self
            .result()
            .into_iter()
            .map(|c| ChromosomeExport::new(c, self.fitness_functions()))
            .collect::<Result<Vec<_>, SearchError>>()?;

        let seconds = self.core().elapsed().as_secs();
        let export = AlgorithmExport {
            algorithm: self.name(),
            generation: self.generation(),
            state: self.state(),
            started_at: self.core().started_at(),
            took: Elapsed {
                hours: seconds / 3600,
                minutes: (seconds / 60) % 60,
                seconds: seconds % 60,
            },
            chromosomes,
        };
        let data = serde_json::to_string_pretty(&export)
            .map_err(|e| SearchError::AlgorithmExport(e.to_string()))?;

        fs::write(destination, data).map_err(|e| SearchError::AlgorithmExport(e.to_string()))?;
        info!("Saved {} chromosomes to {:?}", export.chromosomes.len(), destination);
        Ok(())
    }
}

#[derive(Serialize)]
pub struct Elapsed {
    hours: u64,
    minutes: u64,
    seconds: u64,
}

/// One exported chromosome.
#[derive(Serialize)]
pub struct ChromosomeExport<T> {
    id: u64,
    length: usize,
    /// The raw fitness by fitness function name.
    fitness: BTreeMap<String, f64>,
    payload: Chromosome<T>,
}

impl<T: Serialize + Payload> ChromosomeExport<T> {
    fn new(
        chromosome: Chromosome<T>,
        fitness_functions: &[Box<dyn FitnessFunction<T>>],
    ) -> Result<Self, SearchError> {
        let fitness = fitness_functions
            .iter()
            .map(|f| Ok((f.name(), f.fitness(&chromosome)?)))
            .collect::<Result<BTreeMap<String, f64>, SearchError>>()?;
        Ok(Self {
            id: chromosome.id().value(),
            length: chromosome.length(),
            fitness,
            payload: chromosome,
        })
    }
}

/// The struct used to export the algorithm data to JSON file.
#[derive(Serialize)]
pub struct AlgorithmExport<T> {
    algorithm: String,
    generation: usize,
    state: SearchState,
    started_at: Option<DateTime<Local>>,
    took: Elapsed,
    chromosomes: Vec<ChromosomeExport<T>>,
}
