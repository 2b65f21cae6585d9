use crate::core::{Chromosome, FitnessFunction, SearchError};

/// The preferred solution when two chromosomes are compared.
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq)]
pub enum PreferredSolution {
    /// The first solution is preferred.
    First,
    /// The second solution is preferred.
    Second,
    /// The two solutions are mutually preferred.
    MutuallyPreferred,
}

/// Pareto dominance between two chromosomes. A chromosome $S_1$ dominates $S_2$ if it is not worse
/// on any objective and strictly better on at least one.
///
/// The comparison works on normalised fitness values (see
/// [`FitnessFunction::normalize`]) where larger is always better, so maximising and minimising
/// targets can be mixed.
pub struct ParetoDominance;

impl ParetoDominance {
    /// Get the dominance relation between two vectors of normalised fitness values.
    ///
    /// # Arguments
    ///
    /// * `first_solution`: The normalised fitness of the first solution.
    /// * `second_solution`: The normalised fitness of the second solution.
    ///
    /// returns: `PreferredSolution` The dominance relation between solution 1 and 2.
    pub fn compare(first_solution: &[f64], second_solution: &[f64]) -> PreferredSolution {
        let mut relation = PreferredSolution::MutuallyPreferred;
        for (obj_sol1, obj_sol2) in first_solution.iter().zip(second_solution) {
            if obj_sol1 > obj_sol2 {
                if relation == PreferredSolution::Second {
                    // mutually dominated
                    return PreferredSolution::MutuallyPreferred;
                }
                relation = PreferredSolution::First;
            } else if obj_sol1 < obj_sol2 {
                if relation == PreferredSolution::First {
                    // mutually dominated
                    return PreferredSolution::MutuallyPreferred;
                }
                relation = PreferredSolution::Second;
            }
        }
        relation
    }

    /// Get the dominance relation between two chromosomes over a set of objectives.
    ///
    /// # Arguments
    ///
    /// * `first_solution`: The first chromosome.
    /// * `second_solution`: The second chromosome.
    /// * `objectives`: The fitness functions to compare on.
    ///
    /// returns: `Result<PreferredSolution, SearchError>`
    pub fn compare_chromosomes<T>(
        first_solution: &Chromosome<T>,
        second_solution: &Chromosome<T>,
        objectives: &[&dyn FitnessFunction<T>],
    ) -> Result<PreferredSolution, SearchError> {
        let mut first = Vec::with_capacity(objectives.len());
        let mut second = Vec::with_capacity(objectives.len());
        for objective in objectives {
            first.push(objective.normalized_fitness(first_solution)?);
            second.push(objective.normalized_fitness(second_solution)?);
        }
        Ok(Self::compare(&first, &second))
    }
}

#[cfg(test)]
mod test {
    use crate::core::test_utils::{point_objectives, points};
    use crate::operators::{ParetoDominance, PreferredSolution};

    #[test]
    /// Test one objective
    fn test_solutions_1_objective() {
        assert_eq!(
            ParetoDominance::compare(&[0.5], &[0.1]),
            PreferredSolution::First
        );
        assert_eq!(
            ParetoDominance::compare(&[0.5], &[0.9]),
            PreferredSolution::Second
        );
        assert_eq!(
            ParetoDominance::compare(&[0.5], &[0.5]),
            PreferredSolution::MutuallyPreferred
        );
    }

    #[test]
    /// Test two objectives
    fn test_solutions_2_objectives() {
        assert_eq!(
            ParetoDominance::compare(&[1.0, 1.0], &[0.0, 0.0]),
            PreferredSolution::First
        );
        assert_eq!(
            ParetoDominance::compare(&[1.0, 0.0], &[1.0, 1.0]),
            PreferredSolution::Second
        );
        // neither dominates
        assert_eq!(
            ParetoDominance::compare(&[0.9, 0.2], &[0.3, 0.8]),
            PreferredSolution::MutuallyPreferred
        );
        assert_eq!(
            ParetoDominance::compare(&[0.3, 0.8], &[0.9, 0.2]),
            PreferredSolution::MutuallyPreferred
        );
    }

    #[test]
    /// A minimising objective is inverted before comparing.
    fn test_mixed_directions() {
        let chromosomes = points(&[&[0.9, 0.2], &[0.3, 0.8]]);
        let objectives = point_objectives(&[true, false]);
        let objectives = objectives.iter().map(|o| o.as_ref()).collect::<Vec<_>>();

        // 0.9 > 0.3 on the first objective and 0.2 < 0.8 on the minimised one
        assert_eq!(
            ParetoDominance::compare_chromosomes(&chromosomes[0], &chromosomes[1], &objectives)
                .unwrap(),
            PreferredSolution::First
        );
    }
}
