use log::debug;

use crate::algorithms::{GaCore, GaParameters, GaParts, GeneticAlgorithm};
use crate::core::{Population, SearchError};
use crate::utils::{
    crowding_distance, fast_non_dominated_sort, normalized_fitness_matrix,
    rank_and_crowding_order,
};

/// The Non-dominated Sorting Genetic Algorithm (NSGA2). The new generation is made of the
/// `population_size` survivors and of offspring up to `big_population_size` chromosomes. The
/// survivors are the best chromosomes by non-domination rank and then by crowding distance over
/// all the fitness functions.
///
/// Implemented based on:
/// > K. Deb, A. Pratap, S. Agarwal and T. Meyarivan, "A fast and elitist multi-objective genetic
/// > algorithm: NSGA-II," in IEEE Transactions on Evolutionary Computation, vol. 6, no. 2, pp.
/// > 182-197, April 2002, doi: 10.1109/4235.996017.
///
/// See: <https://doi.org/10.1109/4235.996017>.
pub struct Nsga2<T> {
    core: GaCore<T>,
}

impl<T> Nsga2<T> {
    /// Initialise the NSGA2 algorithm.
    ///
    /// # Arguments
    ///
    /// * `parts`: The injected collaborators.
    /// * `parameters`: The hyperparameters. `big_population_size` is usually twice the
    ///   population size.
    ///
    /// returns: `Result<Nsga2<T>, SearchError>`
    pub fn new(parts: GaParts<T>, parameters: GaParameters) -> Result<Self, SearchError> {
        Ok(Self {
            core: GaCore::new("NSGA2", parts, parameters)?,
        })
    }
}

impl<T> GeneticAlgorithm<T> for Nsga2<T> {
    fn core(&self) -> &GaCore<T> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GaCore<T> {
        &mut self.core
    }

    fn generation_survivors(&self) -> Result<Population<T>, SearchError> {
        let population = self.core.population();
        let values = normalized_fitness_matrix(population, &self.core.objectives())?;

        debug!("Calculating fronts and ranks for the population");
        let sorting_results = fast_non_dominated_sort(&values);
        debug!("Collected {} fronts", sorting_results.fronts.len());

        let mut distances = vec![0.0; population.len()];
        for front in sorting_results.fronts.iter() {
            for (i, d) in front.iter().zip(crowding_distance(&values, front)) {
                distances[*i] = d;
            }
        }

        Ok(rank_and_crowding_order(&sorting_results.ranks, &distances)
            .into_iter()
            .take(self.core.parameters().population_size)
            .map(|i| population[i].clone())
            .collect())
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::algorithms::{GaParameters, GaParts, GeneticAlgorithm, IterTermination, Nsga2};
    use crate::core::test_utils::{
        point_objectives, points, Point, PointCrossover, PointFactory, PointMutation,
    };
    use crate::operators::{ChromosomeFactory, RandomSelection};

    fn nsga2(population_size: usize, generations: usize) -> Nsga2<Point> {
        let parts = GaParts {
            factory: Box::new(PointFactory::new(2)),
            selection: Box::new(RandomSelection),
            crossover: Box::new(PointCrossover::new()),
            mutation: Box::new(PointMutation::new()),
            fitness_functions: point_objectives(&[true, false]),
            termination: Box::new(IterTermination(generations)),
        };
        let parameters = GaParameters {
            seed: Some(1),
            ..GaParameters::new(population_size)
        };
        Nsga2::new(parts, parameters).unwrap()
    }

    #[test]
    /// The survivors are the first front truncated by crowding distance.
    fn test_survivors_by_rank_and_crowding() {
        let mut algorithm = nsga2(4, 1);
        algorithm.create_initial_population().unwrap();
        // the second objective is minimised: the normalised values are (1.0, 0.0), (0.0, 1.0),
        // (0.5, 0.5), (0.45, 0.55), (0.6, 0.4) and (0.1, 0.1)
        let population = points(&[
            &[1.0, 1.0],
            &[0.0, 0.0],
            &[0.5, 0.5],
            &[0.45, 0.45],
            &[0.6, 0.6],
            &[0.1, 0.9],
        ]);
        algorithm.core.replace_population(population.clone());

        // the boundaries come first, then the two chromosomes with distance 1; the third one
        // has distance 0.3 and the last one is dominated
        let survivors = algorithm.generation_survivors().unwrap();
        assert_eq!(
            survivors,
            vec![
                population[0].clone(),
                population[1].clone(),
                population[3].clone(),
                population[4].clone()
            ]
        );
    }

    #[test]
    fn test_run() {
        let mut algorithm = nsga2(6, 5);
        algorithm.run().unwrap();
        assert_eq!(algorithm.generation(), 5);
        assert_eq!(algorithm.population().len(), 12);
        assert_eq!(algorithm.generation_survivors().unwrap().len(), 6);
    }

    proptest! {
        #[test]
        fn prop_survivor_count(population_size in 1_usize..8, extra in 0_usize..10, seed in 0_u64..1000) {
            let mut algorithm = nsga2(population_size, 1);
            algorithm.create_initial_population().unwrap();
            let mut factory = PointFactory::new(2);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let population = (0..population_size + extra)
                .map(|_| factory.create_chromosome(&mut rng).unwrap())
                .collect::<Vec<_>>();
            algorithm.core.replace_population(population);

            prop_assert_eq!(algorithm.generation_survivors().unwrap().len(), population_size);
        }
    }
}
