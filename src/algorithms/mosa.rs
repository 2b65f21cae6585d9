use std::collections::HashSet;

use log::{debug, info};

use crate::algorithms::{GaCore, GaParameters, GaParts, GeneticAlgorithm};
use crate::core::{Chromosome, Payload, Population, SearchError};
use crate::utils::{crowding_distance, fast_non_dominated_sort, rank_and_crowding_order};

/// The Many-Objective Sorting Algorithm (MOSA). Each fitness function is a separate target.
/// The survivors are ranked with a preference criterion that favours, for each target not
/// covered yet, the chromosome closest to cover it; the other chromosomes are ranked with the
/// non-dominated sort over the uncovered targets only.
///
/// The result of the run is the archive: for each target, the shortest chromosome that covers
/// it.
///
/// Implemented based on:
/// > A. Panichella, F. M. Kifetew and P. Tonella, "Reformulating Branch Coverage as a
/// > Many-Objective Optimization Problem," 2015 IEEE 8th International Conference on Software
/// > Testing, Verification and Validation (ICST), 2015, doi: 10.1109/ICST.2015.7102604.
pub struct Mosa<T> {
    core: GaCore<T>,
    /// The best chromosome covering each target, by fitness function index.
    archive: Vec<Option<Chromosome<T>>>,
}

impl<T: Payload> Mosa<T> {
    /// Initialise the MOSA algorithm.
    ///
    /// # Arguments
    ///
    /// * `parts`: The injected collaborators.
    /// * `parameters`: The hyperparameters.
    ///
    /// returns: `Result<Mosa<T>, SearchError>`
    pub fn new(parts: GaParts<T>, parameters: GaParameters) -> Result<Self, SearchError> {
        let archive = parts.fitness_functions.iter().map(|_| None).collect();
        Ok(Self {
            core: GaCore::new("MOSA", parts, parameters)?,
            archive,
        })
    }

    /// The archived chromosome covering a target.
    ///
    /// # Arguments
    ///
    /// * `target`: The index of the fitness function.
    ///
    /// returns: `Option<&Chromosome<T>>`
    pub fn archived(&self, target: usize) -> Option<&Chromosome<T>> {
        self.archive.get(target).and_then(|c| c.as_ref())
    }

    /// The number of covered targets.
    ///
    /// returns: `usize`
    pub fn covered_targets(&self) -> usize {
        self.archive.iter().filter(|c| c.is_some()).count()
    }

    /// Archive the chromosomes covering a target when no shorter one was archived before. A
    /// chromosome as long as the archived one replaces it.
    ///
    /// # Arguments
    ///
    /// * `chromosomes`: The chromosomes to consider.
    ///
    /// returns: `Result<(), SearchError>`
    pub fn archive_chromosomes(&mut self, chromosomes: &[Chromosome<T>]) -> Result<(), SearchError> {
        for (target, function) in self.core.fitness_functions().iter().enumerate() {
            for chromosome in chromosomes {
                if !function.is_optimal(function.fitness(chromosome)?) {
                    continue;
                }
                let slot = &mut self.archive[target];
                let replace = match slot {
                    None => {
                        debug!("Target '{}' covered by {}", function.name(), chromosome.id());
                        true
                    }
                    Some(best) => chromosome.length() <= best.length(),
                };
                if replace {
                    *slot = Some(chromosome.clone());
                }
            }
        }
        Ok(())
    }
}

impl<T: Payload> GeneticAlgorithm<T> for Mosa<T> {
    fn core(&self) -> &GaCore<T> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GaCore<T> {
        &mut self.core
    }

    /// The distinct archived chromosomes, in target order.
    fn result(&self) -> Population<T> {
        let mut seen = HashSet::new();
        self.archive
            .iter()
            .flatten()
            .filter(|c| seen.insert(c.id()))
            .cloned()
            .collect()
    }

    fn update_archive(&mut self) -> Result<(), SearchError> {
        let population = self.core.population().to_vec();
        self.archive_chromosomes(&population)?;
        info!(
            "Covered {} of {} targets",
            self.covered_targets(),
            self.archive.len()
        );
        Ok(())
    }

    fn generation_survivors(&self) -> Result<Population<T>, SearchError> {
        let population = self.core.population();
        let functions = self.core.fitness_functions();
        let uncovered = (0..functions.len())
            .filter(|t| self.archive[*t].is_none())
            .collect::<Vec<usize>>();

        // raw fitness for the uncovered targets only
        let raw = population
            .iter()
            .map(|c| {
                uncovered
                    .iter()
                    .map(|t| functions[*t].fitness(c))
                    .collect::<Result<Vec<f64>, SearchError>>()
            })
            .collect::<Result<Vec<Vec<f64>>, SearchError>>()?;
        let normalized = |c: usize, k: usize| functions[uncovered[k]].normalize(raw[c][k]);

        // preference front: the best chromosome for each uncovered target
        let mut ranks: Vec<Option<usize>> = vec![None; population.len()];
        let mut preferred: Vec<usize> = Vec::new();
        let mut still_uncovered: Vec<usize> = Vec::new();
        for k in 0..uncovered.len() {
            let mut best: Option<usize> = None;
            for c in 0..population.len() {
                if best.map_or(true, |b| normalized(c, k) > normalized(b, k)) {
                    best = Some(c);
                }
            }
            let Some(best) = best else {
                continue;
            };
            if ranks[best].is_none() {
                ranks[best] = Some(0);
                preferred.push(best);
            }
            if !functions[uncovered[k]].is_optimal(raw[best][k]) {
                still_uncovered.push(k);
            }
        }
        debug!(
            "Preference front has {} chromosomes for {} uncovered targets",
            preferred.len(),
            still_uncovered.len()
        );

        // the other chromosomes ranked over the targets that are still uncovered
        let restricted = |c: usize| {
            still_uncovered
                .iter()
                .map(|k| normalized(c, *k))
                .collect::<Vec<f64>>()
        };
        let values = (0..population.len()).map(restricted).collect::<Vec<_>>();
        let remaining = (0..population.len())
            .filter(|c| ranks[*c].is_none())
            .collect::<Vec<usize>>();
        let remaining_values = remaining
            .iter()
            .map(|c| values[*c].clone())
            .collect::<Vec<_>>();
        let sorting_results = fast_non_dominated_sort(&remaining_values);

        let mut distances = vec![0.0; population.len()];
        for (c, d) in preferred.iter().zip(crowding_distance(&values, &preferred)) {
            distances[*c] = d;
        }
        for front in sorting_results.fronts.iter() {
            let front = front.iter().map(|i| remaining[*i]).collect::<Vec<usize>>();
            for (c, d) in front.iter().zip(crowding_distance(&values, &front)) {
                distances[*c] = d;
            }
        }
        for (i, c) in remaining.iter().enumerate() {
            ranks[*c] = Some(sorting_results.ranks[i] + 1);
        }

        let ranks = ranks
            .into_iter()
            .enumerate()
            .map(|(c, r)| {
                r.ok_or_else(|| {
                    SearchError::InvariantViolation(
                        self.core.name().to_string(),
                        format!("{} was not ranked", population[c].id()),
                    )
                })
            })
            .collect::<Result<Vec<usize>, SearchError>>()?;

        Ok(rank_and_crowding_order(&ranks, &distances)
            .into_iter()
            .take(self.core.parameters().population_size)
            .map(|i| population[i].clone())
            .collect())
    }
}
