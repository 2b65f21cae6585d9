use crate::operators::{ParetoDominance, PreferredSolution};

/// Outputs of the non-dominated sort algorithm.
#[derive(Debug)]
pub struct NonDominatedSortResults {
    /// A vector containing sub-vectors. Each child vector represents a front (with the first being
    /// the non-dominated front with solutions of rank 0) and contains the indexes of the
    /// solutions in the vector passed to [`fast_non_dominated_sort`].
    pub fronts: Vec<Vec<usize>>,
    /// The rank of each solution (the index of its front).
    pub ranks: Vec<usize>,
    /// Number of solutions that dominates a solution at a given vector index. When the counter
    /// is 0, the solution is non-dominated. This is `n_p` in the paper.
    pub domination_counter: Vec<usize>,
}

/// Non-dominated fast sorting from NSGA2 paper (with complexity $O(M * N^2)$, where `M` is the
/// number of objectives and `N` the number of solutions).
///
/// This sorts solutions into fronts. Solutions that are not dominated by any other solution
/// belong to the first front (rank 0); the solutions of front `i > 0` are dominated by at least
/// one solution in the fronts `0..i` and by none of the fronts `>= i`.
///
/// Implemented based on paragraph 3A in:
/// > K. Deb, A. Pratap, S. Agarwal and T. Meyarivan, "A fast and elitist multi-objective genetic
/// > algorithm: NSGA-II," in IEEE Transactions on Evolutionary Computation, vol. 6, no. 2, pp.
/// > 182-197, April 2002, doi: 10.1109/4235.996017.
///
/// # Arguments
///
/// * `values`: The normalised fitness values (larger is better) of each solution. All vectors
///   must have the same number of objectives.
///
/// returns: `NonDominatedSortResults`.
pub fn fast_non_dominated_sort(values: &[Vec<f64>]) -> NonDominatedSortResults {
    // this set contains all the solutions being dominated by a solution `p`. This is `S_p` in
    // the paper
    let mut dominated_solutions: Vec<Vec<usize>> = values.iter().map(|_| Vec::new()).collect();
    // number of solutions that dominates `p`. When the counter is 0, `p` is non-dominated. This
    // is `n_p` in the paper
    let mut domination_counter: Vec<usize> = vec![0; values.len()];
    let mut ranks: Vec<usize> = vec![0; values.len()];

    for pi in 0..values.len() {
        for qi in (pi + 1)..values.len() {
            match ParetoDominance::compare(&values[pi], &values[qi]) {
                PreferredSolution::First => {
                    // `p` dominates `q` - add `q` to the set of solutions dominated by `p`
                    dominated_solutions[pi].push(qi);
                    domination_counter[qi] += 1;
                }
                PreferredSolution::Second => {
                    // q dominates p
                    dominated_solutions[qi].push(pi);
                    domination_counter[pi] += 1;
                }
                PreferredSolution::MutuallyPreferred => {}
            }
        }
    }

    // the solutions non-dominated by any other belong to the first front
    let mut current_front: Vec<usize> = (0..values.len())
        .filter(|pi| domination_counter[*pi] == 0)
        .collect();
    let e_domination_counter = domination_counter.clone();

    // collect the other fronts
    let mut all_fronts: Vec<Vec<usize>> = Vec::new();
    let mut rank = 0;
    while !current_front.is_empty() {
        let mut next_front: Vec<usize> = Vec::new();
        for pi in current_front.iter() {
            ranks[*pi] = rank;
            // loop solutions that are dominated by `p` in the current front
            for qi in dominated_solutions[*pi].iter() {
                domination_counter[*qi] -= 1;

                // if counter is 0 then none of the solutions in the subsequent fronts are
                // dominated by `p` and `q` belongs to the next front
                if domination_counter[*qi] == 0 {
                    next_front.push(*qi);
                }
            }
        }
        rank += 1;
        all_fronts.push(current_front);
        current_front = next_front;
    }

    NonDominatedSortResults {
        fronts: all_fronts,
        ranks,
        domination_counter: e_domination_counter,
    }
}
