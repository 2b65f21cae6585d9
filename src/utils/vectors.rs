use crate::core::{Chromosome, FitnessFunction, SearchError};

/// Define the sort type
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Sort {
    /// Sort values in ascending order
    Ascending,
    /// Sort values in descending order
    Descending,
}

/// Returns the indices that would sort an array. The sort is stable in both directions: equal
/// values keep their original order.
///
/// # Arguments
///
/// * `data`: The vector to sort.
/// * `sort_type`: Specify whether to sort in ascending or descending order.
///
/// returns: `Vec<usize>`. The vector with the indices.
pub fn argsort(data: &[f64], sort_type: Sort) -> Vec<usize> {
    let mut indices = (0..data.len()).collect::<Vec<_>>();
    match sort_type {
        Sort::Ascending => indices.sort_by(|a, b| data[*a].total_cmp(&data[*b])),
        Sort::Descending => indices.sort_by(|a, b| data[*b].total_cmp(&data[*a])),
    }
    indices
}

/// Evaluate the normalised fitness (larger is better) of each chromosome for each objective.
/// Chromosomes are evaluated one at a time, in order.
///
/// # Arguments
///
/// * `chromosomes`: The chromosomes to evaluate.
/// * `objectives`: The fitness functions.
///
/// returns: `Result<Vec<Vec<f64>>, SearchError>`. One row per chromosome and one column per
/// objective.
pub fn normalized_fitness_matrix<T>(
    chromosomes: &[Chromosome<T>],
    objectives: &[&dyn FitnessFunction<T>],
) -> Result<Vec<Vec<f64>>, SearchError> {
    chromosomes
        .iter()
        .map(|c| {
            objectives
                .iter()
                .map(|f| f.normalized_fitness(c))
                .collect::<Result<Vec<f64>, SearchError>>()
        })
        .collect()
}
