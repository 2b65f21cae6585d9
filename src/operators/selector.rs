use ordered_float::OrderedFloat;
use rand::prelude::SliceRandom;
use rand::{Rng, RngCore};

use crate::core::{Chromosome, FitnessFunction, SearchError};

/// A trait implementing methods to choose the parent candidates from a population for
/// reproduction. The operators use the chromosomes at the start of the returned list.
pub trait Selection<T> {
    /// Order the population for parent selection.
    ///
    /// # Arguments
    ///
    /// * `population`: The population.
    /// * `fitness_functions`: The fitness functions of the run.
    /// * `rng`: The random number generator.
    ///
    /// returns: `Result<Vec<Chromosome<T>>, SearchError>`
    fn select(
        &self,
        population: &[Chromosome<T>],
        fitness_functions: &[Box<dyn FitnessFunction<T>>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<T>>, SearchError>;

    /// The selection name.
    ///
    /// returns: `String`
    fn name(&self) -> String;
}

/// Fail when the population is empty.
fn check_population<T>(name: &str, population: &[Chromosome<T>]) -> Result<(), SearchError> {
    if population.is_empty() {
        return Err(SearchError::SelectionOperator(
            name.to_string(),
            "The population is empty and no chromosome can be selected".to_string(),
        ));
    }
    Ok(())
}

/// Get the function used by the fitness-based selections: the first one of the run.
fn first_fitness<'a, T>(
    name: &str,
    fitness_functions: &'a [Box<dyn FitnessFunction<T>>],
) -> Result<&'a dyn FitnessFunction<T>, SearchError> {
    fitness_functions
        .first()
        .map(|f| f.as_ref())
        .ok_or_else(|| {
            SearchError::SelectionOperator(
                name.to_string(),
                "At least one fitness function is needed".to_string(),
            )
        })
}

/// Shuffle the population.
pub struct RandomSelection;

impl<T> Selection<T> for RandomSelection {
    fn select(
        &self,
        population: &[Chromosome<T>],
        _fitness_functions: &[Box<dyn FitnessFunction<T>>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<T>>, SearchError> {
        check_population(&Selection::<T>::name(self), population)?;
        let mut selected = population.to_vec();
        selected.shuffle(rng);
        Ok(selected)
    }

    fn name(&self) -> String {
        "RandomSelection".to_string()
    }
}

/// Fitness proportionate (roulette-like) selection. Each chromosome gets a weight equal to its
/// normalised fitness multiplied by a uniform random draw, then the population is sorted by
/// descending weight. Only the first fitness function is used.
pub struct FitnessProportionateSelection;

impl<T> Selection<T> for FitnessProportionateSelection {
    fn select(
        &self,
        population: &[Chromosome<T>],
        fitness_functions: &[Box<dyn FitnessFunction<T>>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<T>>, SearchError> {
        let name = Selection::<T>::name(self);
        check_population(&name, population)?;
        let fitness_function = first_fitness(&name, fitness_functions)?;

        let mut weighted = population
            .iter()
            .map(|c| {
                let weight = fitness_function.normalized_fitness(c)? * rng.gen_range(0.0..1.0);
                Ok((OrderedFloat(weight), c.clone()))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;
        weighted.sort_by(|(a, _), (b, _)| b.cmp(a));
        Ok(weighted.into_iter().map(|(_, c)| c).collect())
    }

    fn name(&self) -> String {
        "FitnessProportionateSelection".to_string()
    }
}

/// Sort the population by descending normalised fitness of the first fitness function. Ties
/// keep the population order.
pub struct FitnessSortedSelection;

impl<T> Selection<T> for FitnessSortedSelection {
    fn select(
        &self,
        population: &[Chromosome<T>],
        fitness_functions: &[Box<dyn FitnessFunction<T>>],
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<T>>, SearchError> {
        let name = Selection::<T>::name(self);
        check_population(&name, population)?;
        let fitness_function = first_fitness(&name, fitness_functions)?;

        let mut scored = population
            .iter()
            .map(|c| Ok((fitness_function.normalized_fitness(c)?, c.clone())))
            .collect::<Result<Vec<_>, SearchError>>()?;
        scored.sort_by(|(a, _), (b, _)| b.total_cmp(a));
        Ok(scored.into_iter().map(|(_, c)| c).collect())
    }

    fn name(&self) -> String {
        "FitnessSortedSelection".to_string()
    }
}

/// Return the population as it is. Used when the parent choice does not matter.
pub struct IdentitySelection;

impl<T> Selection<T> for IdentitySelection {
    fn select(
        &self,
        population: &[Chromosome<T>],
        _fitness_functions: &[Box<dyn FitnessFunction<T>>],
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<Chromosome<T>>, SearchError> {
        check_population(&Selection::<T>::name(self), population)?;
        Ok(population.to_vec())
    }

    fn name(&self) -> String {
        "IdentitySelection".to_string()
    }
}

#[cfg(test)]
mod test {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::core::test_utils::{point_objectives, points, Point};
    use crate::core::{Chromosome, SearchError};
    use crate::operators::{
        FitnessProportionateSelection, FitnessSortedSelection, IdentitySelection,
        RandomSelection, Selection,
    };

    fn population() -> Vec<Chromosome<Point>> {
        points(&[&[0.2], &[0.9], &[0.5], &[0.0]])
    }

    #[test]
    fn test_sorted_selection() {
        let population = population();
        let objectives = point_objectives(&[true]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let selected = FitnessSortedSelection
            .select(&population, &objectives, &mut rng)
            .unwrap();
        let order: Vec<_> = selected.iter().map(|c| c.payload().values[0]).collect();
        assert_eq!(order, vec![0.9, 0.5, 0.2, 0.0]);
    }

    #[test]
    fn test_sorted_selection_with_minimised_objective() {
        let population = population();
        let objectives = point_objectives(&[false]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let selected = FitnessSortedSelection
            .select(&population, &objectives, &mut rng)
            .unwrap();
        assert_eq!(selected[0].payload().values[0], 0.0);
    }

    #[test]
    fn test_proportionate_selection_keeps_everyone() {
        let population = population();
        let objectives = point_objectives(&[true]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let selected = FitnessProportionateSelection
            .select(&population, &objectives, &mut rng)
            .unwrap();
        assert_eq!(selected.len(), population.len());
        // a zero fitness always gets a zero weight
        assert_eq!(selected.last().unwrap().payload().values[0], 0.0);
    }

    #[test]
    fn test_random_and_identity_selection() {
        let population = population();
        let objectives = point_objectives(&[true]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let mut shuffled = RandomSelection
            .select(&population, &objectives, &mut rng)
            .unwrap();
        shuffled.sort_by_key(|c| c.id());
        assert_eq!(shuffled, population);

        let same = IdentitySelection
            .select(&population, &objectives, &mut rng)
            .unwrap();
        assert_eq!(same, population);
    }

    #[test]
    fn test_empty_population() {
        let objectives = point_objectives(&[true]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(matches!(
            RandomSelection.select(&[] as &[Chromosome<Point>], &objectives, &mut rng),
            Err(SearchError::SelectionOperator(_, _))
        ));
        assert!(matches!(
            FitnessSortedSelection.select(&population(), &[], &mut rng),
            Err(SearchError::SelectionOperator(_, _))
        ));
    }
}
