use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::algorithms::{GaCore, GaParameters, GaParts, GeneticAlgorithm};
use crate::core::{Chromosome, FitnessFunction, Payload, Population, SearchError};

/// Input arguments for the MIO algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MioArgs {
    /// The probability of sampling a new chromosome instead of mutating an archived one at the
    /// start of the run.
    pub p_sample_random: f64,
    /// The fraction of the search budget after which the focused search starts.
    pub focused_search_start: f64,
    /// The total time budget of the run.
    pub search_budget: Duration,
}

impl Default for MioArgs {
    fn default() -> Self {
        Self {
            p_sample_random: 0.5,
            focused_search_start: 0.5,
            search_budget: Duration::from_secs(3600),
        }
    }
}

/// One archived chromosome with its raw fitness for the target of the sub-population.
struct Entry<T> {
    chromosome: Chromosome<T>,
    fitness: f64,
}

/// The Many Independent Objective algorithm (MIO). Each target has its own bounded archive
/// ("sub-population") of the best chromosomes found so far and a counter of how many times it
/// was sampled since its last improvement. At each generation a single chromosome is either
/// sampled from the factory or obtained by mutating a member of the least sampled target; it is
/// then considered for the archive of every target.
///
/// The sub-population size and the random sampling probability shrink linearly with the elapsed
/// time until the focused search starts; from then on every sub-population keeps its single best
/// member and only archived chromosomes are mutated.
///
/// The population of the run is the set of archived chromosomes and the result is the best
/// archived chromosome of each target.
///
/// Implemented based on:
/// > A. Arcuri, "Many Independent Objective (MIO) Algorithm for Test Suite Generation," in
/// > Search Based Software Engineering (SSBSE 2017), LNCS vol. 10452, pp. 3-17,
/// > doi: 10.1007/978-3-319-66299-2_1.
pub struct Mio<T> {
    core: GaCore<T>,
    /// The algorithm options.
    args: MioArgs,
    /// The current maximum size of each sub-population.
    sub_population_size: usize,
    /// The current probability of sampling a new chromosome.
    p_sample_random: f64,
    /// The sub-population of each target, by fitness function index.
    archive: Vec<Vec<Entry<T>>>,
    /// The number of samples of each target since it last improved.
    sampling_counters: Vec<usize>,
    /// When the first generation started. The schedule is measured from this instant.
    first_generation: Option<Instant>,
}

impl<T: Payload> Mio<T> {
    /// Initialise the MIO algorithm. The `population_size` of `parameters` is the initial
    /// sub-population size and the number of chromosomes sampled at the start; the crossover and
    /// selection operators are not used.
    ///
    /// # Arguments
    ///
    /// * `parts`: The injected collaborators.
    /// * `parameters`: The hyperparameters.
    /// * `args`: The [`MioArgs`] arguments to customise the algorithm behaviour.
    ///
    /// returns: `Result<Mio<T>, SearchError>`
    pub fn new(
        parts: GaParts<T>,
        parameters: GaParameters,
        args: MioArgs,
    ) -> Result<Self, SearchError> {
        let name = "MIO";
        for (label, value) in [
            ("random sampling probability", args.p_sample_random),
            ("focused search start", args.focused_search_start),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SearchError::AlgorithmInit(
                    name.to_string(),
                    format!("The {label} {value} must be in [0, 1]"),
                ));
            }
        }
        info!(
            "MIO options: sampling probability {}, focused search at {} of {:?}",
            args.p_sample_random, args.focused_search_start, args.search_budget
        );

        let targets = parts.fitness_functions.len();
        let sub_population_size = parameters.population_size;
        Ok(Self {
            core: GaCore::new(name, parts, parameters)?,
            p_sample_random: args.p_sample_random,
            args,
            sub_population_size,
            archive: (0..targets).map(|_| Vec::new()).collect(),
            sampling_counters: vec![0; targets],
            first_generation: None,
        })
    }

    /// The current maximum sub-population size.
    ///
    /// returns: `usize`
    pub fn sub_population_size(&self) -> usize {
        self.sub_population_size
    }

    /// The current random sampling probability.
    ///
    /// returns: `f64`
    pub fn p_sample_random(&self) -> f64 {
        self.p_sample_random
    }

    /// The chromosomes archived for a target.
    ///
    /// # Arguments
    ///
    /// * `target`: The index of the fitness function.
    ///
    /// returns: `Vec<Chromosome<T>>`
    pub fn sub_population(&self, target: usize) -> Vec<Chromosome<T>> {
        self.archive
            .get(target)
            .map(|s| s.iter().map(|e| e.chromosome.clone()).collect())
            .unwrap_or_default()
    }

    /// The number of samples of a target since it last improved.
    pub fn sampling_counter(&self, target: usize) -> Option<usize> {
        self.sampling_counters.get(target).copied()
    }

    /// Whether a target is covered: its sub-population holds a single optimal chromosome.
    ///
    /// # Arguments
    ///
    /// * `target`: The index of the fitness function.
    ///
    /// returns: `bool`
    pub fn is_covered(&self, target: usize) -> bool {
        let function = &self.core.fitness_functions()[target];
        matches!(self.archive[target].as_slice(), [e] if function.is_optimal(e.fitness))
    }

    /// Update the sub-population size and the random sampling probability for the elapsed time.
    /// With `p` the elapsed fraction of the time before the focused search, the size is
    /// `round(n0 - (n0 - 1) * p)` and the probability is `p0 * (1 - p)`; once the focused
    /// search starts they are `1` and `0`. Sub-populations larger than the new size lose their
    /// worst members.
    ///
    /// # Arguments
    ///
    /// * `elapsed`: The time elapsed since the first generation.
    pub fn update_parameters(&mut self, elapsed: Duration) {
        let threshold = self.args.focused_search_start * self.args.search_budget.as_secs_f64();
        let progress = if threshold > 0.0 {
            elapsed.as_secs_f64() / threshold
        } else {
            1.0
        };

        let initial_size = self.core.parameters().population_size as f64;
        let (size, p_sample_random) = if progress >= 1.0 {
            (1, 0.0)
        } else {
            let size = (initial_size - (initial_size - 1.0) * progress).round() as usize;
            (size.max(1), self.args.p_sample_random * (1.0 - progress))
        };

        if size < self.sub_population_size {
            debug!("Shrinking the sub-populations to {size} chromosomes");
            for target in 0..self.archive.len() {
                self.shrink(target, size);
            }
        }
        if progress >= 1.0 && (self.sub_population_size > 1 || self.p_sample_random > 0.0) {
            info!("Starting the focused search");
        }
        self.sub_population_size = size;
        self.p_sample_random = p_sample_random;
    }

    /// Remove the worst members of a sub-population until it has at most `size` members.
    fn shrink(&mut self, target: usize, size: usize) {
        let function = self.core.fitness_functions()[target].as_ref();
        let sub_population = &mut self.archive[target];
        while sub_population.len() > size {
            if let Some(worst) = worst_index(function, sub_population) {
                sub_population.remove(worst);
            }
        }
    }

    /// Pick the target whose sub-population is sampled next: the least sampled target among the
    /// non-empty and uncovered ones (first one on ties) or, when all the non-empty targets are
    /// covered, a random non-empty target.
    ///
    /// returns: `Option<usize>`. `None` when the archive is empty.
    fn pick_target(&mut self) -> Option<usize> {
        let non_empty = (0..self.archive.len())
            .filter(|t| !self.archive[*t].is_empty())
            .collect::<Vec<usize>>();
        let least_sampled = non_empty
            .iter()
            .filter(|t| !self.is_covered(**t))
            .min_by_key(|t| self.sampling_counters[**t])
            .copied();
        match least_sampled {
            Some(target) => Some(target),
            None => non_empty.choose(self.core.rng()).copied(),
        }
    }

    /// Sample a new chromosome or mutate an archived one.
    ///
    /// returns: `Result<Chromosome<T>, SearchError>`
    fn next_candidate(&mut self) -> Result<Chromosome<T>, SearchError> {
        let sample = self.core.rng().gen_bool(self.p_sample_random);
        let target = if sample { None } else { self.pick_target() };

        let Some(target) = target else {
            let (factory, rng) = self.core.factory_and_rng();
            return factory.create_chromosome(rng);
        };
        let index = self.core.rng().gen_range(0..self.archive[target].len());
        let parent = self.archive[target][index].chromosome.clone();
        self.sampling_counters[target] += 1;

        let (mutation, rng) = self.core.mutation_and_rng();
        let name = mutation.name();
        mutation.mutate(&parent, rng)?.into_iter().next().ok_or_else(|| {
            SearchError::MutationOperator(name, format!("No offspring for {}", parent.id()))
        })
    }

    /// Consider a chromosome for the sub-population of every target.
    ///
    /// # Arguments
    ///
    /// * `chromosome`: The new chromosome.
    ///
    /// returns: `Result<(), SearchError>`
    pub fn archive_chromosome(&mut self, chromosome: &Chromosome<T>) -> Result<(), SearchError> {
        let fitness = self
            .core
            .fitness_functions()
            .iter()
            .map(|f| f.fitness(chromosome))
            .collect::<Result<Vec<f64>, SearchError>>()?;
        for target in 0..fitness.len() {
            self.modify_archive(target, chromosome, &fitness)?;
        }
        Ok(())
    }

    /// Update the sub-population of one target with a new chromosome.
    ///
    /// # Arguments
    ///
    /// * `target`: The index of the fitness function.
    /// * `chromosome`: The new chromosome.
    /// * `fitness`: The raw fitness of the chromosome for every target.
    ///
    /// returns: `Result<(), SearchError>`
    fn modify_archive(
        &mut self,
        target: usize,
        chromosome: &Chromosome<T>,
        fitness: &[f64],
    ) -> Result<(), SearchError> {
        let functions = self.core.fitness_functions();
        let function = functions[target].as_ref();
        let value = fitness[target];
        if function.is_unreachable(value) {
            return Ok(());
        }

        let covered = self.is_covered(target);
        let sub_population = &mut self.archive[target];
        let entry = Entry {
            chromosome: chromosome.clone(),
            fitness: value,
        };

        if function.is_optimal(value) {
            if covered {
                let current = &sub_population[0];
                if compare_size_and_other_targets(functions, target, &entry, fitness, current)?
                    == Ordering::Greater
                {
                    debug!("{} replaces the chromosome covering '{}'", chromosome.id(), function.name());
                    sub_population[0] = entry;
                }
            } else {
                debug!("Target '{}' covered by {}", function.name(), chromosome.id());
                sub_population.clear();
                sub_population.push(entry);
                self.sampling_counters[target] = 0;
            }
        } else if covered {
            // a covered target only keeps its optimal chromosome
        } else if sub_population.len() < self.sub_population_size {
            sub_population.push(entry);
            self.sampling_counters[target] = 0;
        } else if let Some(worst) = worst_index(function, sub_population) {
            if compare_entries(function, &entry, &sub_population[worst]) == Ordering::Greater {
                sub_population[worst] = entry;
                self.sampling_counters[target] = 0;
            }
        }

        self.check_sub_population(target)
    }

    /// Fail when the sub-population of a target breaks the archive bounds.
    fn check_sub_population(&self, target: usize) -> Result<(), SearchError> {
        let function = &self.core.fitness_functions()[target];
        let sub_population = &self.archive[target];
        let optimal = sub_population
            .iter()
            .filter(|e| function.is_optimal(e.fitness))
            .count();
        if sub_population.len() > self.sub_population_size.max(1) {
            return Err(SearchError::InvariantViolation(
                self.core.name().to_string(),
                format!(
                    "the sub-population of '{}' has {} chromosomes but its size is {}",
                    function.name(),
                    sub_population.len(),
                    self.sub_population_size
                ),
            ));
        }
        if optimal > 0 && sub_population.len() != 1 {
            return Err(SearchError::InvariantViolation(
                self.core.name().to_string(),
                format!(
                    "the sub-population of the covered target '{}' has {} chromosomes",
                    function.name(),
                    sub_population.len()
                ),
            ));
        }
        Ok(())
    }

    /// Make the population the set of archived chromosomes.
    fn archived_population(&self) -> Population<T> {
        let mut seen = HashSet::new();
        self.archive
            .iter()
            .flatten()
            .filter(|e| seen.insert(e.chromosome.id()))
            .map(|e| e.chromosome.clone())
            .collect()
    }
}

/// Compare two entries of the same sub-population: the one with the higher normalised fitness
/// is better and, on ties, the shorter one.
fn compare_entries<T: Payload>(
    function: &dyn FitnessFunction<T>,
    first: &Entry<T>,
    second: &Entry<T>,
) -> Ordering {
    function
        .normalize(first.fitness)
        .total_cmp(&function.normalize(second.fitness))
        .then_with(|| second.chromosome.length().cmp(&first.chromosome.length()))
}

/// The index of the worst entry of a sub-population.
fn worst_index<T: Payload>(function: &dyn FitnessFunction<T>, entries: &[Entry<T>]) -> Option<usize> {
    (0..entries.len()).min_by(|a, b| compare_entries(function, &entries[*a], &entries[*b]))
}

/// Compare a new chromosome covering a target with the chromosome already covering it: the
/// shorter one is better and, on ties, the one with the higher sum of normalised fitness for the
/// other targets.
///
/// # Arguments
///
/// * `functions`: All the fitness functions.
/// * `target`: The index of the covered target.
/// * `new`: The new entry.
/// * `new_fitness`: The raw fitness of the new chromosome for every target.
/// * `current`: The entry covering the target.
///
/// returns: `Result<Ordering, SearchError>`. `Greater` when the new chromosome is better.
fn compare_size_and_other_targets<T: Payload>(
    functions: &[Box<dyn FitnessFunction<T>>],
    target: usize,
    new: &Entry<T>,
    new_fitness: &[f64],
    current: &Entry<T>,
) -> Result<Ordering, SearchError> {
    let by_size = current.chromosome.length().cmp(&new.chromosome.length());
    if by_size != Ordering::Equal {
        return Ok(by_size);
    }

    let mut new_sum = 0.0;
    let mut current_sum = 0.0;
    for (t, function) in functions.iter().enumerate() {
        if t == target {
            continue;
        }
        new_sum += function.normalize(new_fitness[t]);
        current_sum += function.normalized_fitness(&current.chromosome)?;
    }
    Ok(new_sum.total_cmp(&current_sum))
}

impl<T: Payload> GeneticAlgorithm<T> for Mio<T> {
    fn core(&self) -> &GaCore<T> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GaCore<T> {
        &mut self.core
    }

    /// The best archived chromosome of each target, without duplicates.
    fn result(&self) -> Population<T> {
        let functions = self.core.fitness_functions();
        let mut seen = HashSet::new();
        self.archive
            .iter()
            .enumerate()
            .filter_map(|(t, s)| {
                (0..s.len())
                    .max_by(|a, b| compare_entries(functions[t].as_ref(), &s[*a], &s[*b]))
                    .map(|i| s[i].chromosome.clone())
            })
            .filter(|c| seen.insert(c.id()))
            .collect()
    }

    /// Archive the sampled initial population and replace it with the archived chromosomes.
    fn update_archive(&mut self) -> Result<(), SearchError> {
        for chromosome in self.core.population().to_vec() {
            self.archive_chromosome(&chromosome)?;
        }
        let population = self.archived_population();
        self.core.set_population(population);
        Ok(())
    }

    fn evolve(&mut self) -> Result<(), SearchError> {
        self.core.expect_evolvable()?;
        let first_generation = *self.first_generation.get_or_insert_with(Instant::now);
        self.update_parameters(first_generation.elapsed());

        let candidate = self.next_candidate()?;
        self.archive_chromosome(&candidate)?;

        let population = self.archived_population();
        self.core.replace_population(population);
        Ok(())
    }
}
