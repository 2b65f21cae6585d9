use std::cmp::Ordering;

use log::debug;

use crate::utils::{argsort, Sort};

/// Two crowding distances closer than this are considered equal.
pub const CROWDING_DISTANCE_EPSILON: f64 = 1e-10;

/// Calculate the crowding distance (with complexity $O(M * N * log(N))$, where `M` is the number
/// of objectives and `N` the number of solutions in the front).
///
/// For each objective, the front is sorted in ascending order. The boundary solutions get an
/// infinite distance and every other solution accumulates the gap between its two neighbours,
/// divided by the objective range. An objective whose range is zero does not contribute. A front
/// with less than three solutions only has boundary solutions.
///
/// Implemented based on paragraph 3B in:
/// > K. Deb, A. Pratap, S. Agarwal and T. Meyarivan, "A fast and elitist multi-objective genetic
/// > algorithm: NSGA-II," in IEEE Transactions on Evolutionary Computation, vol. 6, no. 2, pp.
/// > 182-197, April 2002, doi: 10.1109/4235.996017.
///
/// # Arguments
///
/// * `values`: The objective values of all the solutions, one vector per solution.
/// * `front`: The indexes in `values` of the solutions in the front.
///
/// returns: `Vec<f64>`. The distance of each solution in `front`, in the same order.
pub fn crowding_distance(values: &[Vec<f64>], front: &[usize]) -> Vec<f64> {
    let total = front.len();
    let mut distances = vec![0.0; total];
    if total == 0 {
        return distances;
    }
    let number_of_objectives = values[front[0]].len();
    if number_of_objectives == 0 {
        return distances;
    }
    if total < 3 {
        debug!("Setting crowding distance to Inf for all solutions. At least 3 are needed");
        return vec![f64::INFINITY; total];
    }

    for obj in 0..number_of_objectives {
        let obj_values = front.iter().map(|i| values[*i][obj]).collect::<Vec<f64>>();
        // sorted indexes map to positions in `front`
        let sorted_idx = argsort(&obj_values, Sort::Ascending);

        // assign infinite distance to the boundary points
        distances[sorted_idx[0]] = f64::INFINITY;
        distances[sorted_idx[total - 1]] = f64::INFINITY;

        let delta_range = obj_values[sorted_idx[total - 1]] - obj_values[sorted_idx[0]];
        if delta_range <= 0.0 {
            continue;
        }
        for k in 1..(total - 1) {
            let delta = obj_values[sorted_idx[k + 1]] - obj_values[sorted_idx[k - 1]];
            distances[sorted_idx[k]] += delta / delta_range;
        }
    }
    distances
}

/// Compare two crowding distances so that the largest comes first. Distances within
/// [`CROWDING_DISTANCE_EPSILON`] are equal.
///
/// # Arguments
///
/// * `first`: The first distance.
/// * `second`: The second distance.
///
/// returns: `Ordering`
pub fn compare_crowding_distance(first: f64, second: f64) -> Ordering {
    if first == second || (first - second).abs() < CROWDING_DISTANCE_EPSILON {
        Ordering::Equal
    } else if first > second {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Get the indexes of the solutions sorted by ascending rank and then by descending crowding
/// distance. Solutions with the same rank whose distances are within
/// [`CROWDING_DISTANCE_EPSILON`] of the largest distance of their group keep their input order.
///
/// The solutions are first sorted with a total order on the distances; the groups of nearly
/// equal distances are then restored to their input order, so the tolerance never reaches the
/// sort comparator.
///
/// # Arguments
///
/// * `ranks`: The rank of each solution.
/// * `distances`: The crowding distance of each solution.
///
/// returns: `Vec<usize>`
pub fn rank_and_crowding_order(ranks: &[usize], distances: &[f64]) -> Vec<usize> {
    let mut order = (0..ranks.len()).collect::<Vec<usize>>();
    order.sort_by(|a, b| {
        ranks[*a]
            .cmp(&ranks[*b])
            .then_with(|| distances[*b].total_cmp(&distances[*a]))
    });

    let mut start = 0;
    while start < order.len() {
        let first = order[start];
        let mut end = start + 1;
        while end < order.len()
            && ranks[order[end]] == ranks[first]
            && compare_crowding_distance(distances[first], distances[order[end]])
                == Ordering::Equal
        {
            end += 1;
        }
        order[start..end].sort_unstable();
        start = end;
    }
    order
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use float_cmp::assert_approx_eq;
    use proptest::prelude::*;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::utils::{
        compare_crowding_distance, crowding_distance, rank_and_crowding_order,
        CROWDING_DISTANCE_EPSILON,
    };

    fn all(values: &[Vec<f64>]) -> Vec<f64> {
        let front = (0..values.len()).collect::<Vec<_>>();
        crowding_distance(values, &front)
    }

    #[test]
    /// Test the crowding distance algorithm (not enough points).
    fn test_crowding_distance_not_enough_points() {
        let d = all(&[vec![0.0, 0.0], vec![50.0, 50.0]]);
        assert_eq!(d, vec![f64::INFINITY; 2]);
        assert!(all(&[]).is_empty());
    }

    #[test]
    /// Test the crowding distance algorithm (3 points).
    fn test_crowding_distance_3_points() {
        let scenarios = vec![
            vec![vec![0.0, 0.0], vec![-100.0, 100.0], vec![200.0, -200.0]],
            vec![vec![25.0, 25.0], vec![-100.0, 100.0], vec![200.0, -200.0]],
        ];
        for objectives in scenarios {
            let d = all(&objectives);
            assert_approx_eq!(f64, d[0], 2.0, epsilon = 0.00001);
            // boundaries
            assert_eq!(d[1], f64::INFINITY);
            assert_eq!(d[2], f64::INFINITY);
        }
    }

    #[test]
    /// Test the crowding distance algorithm (4 points).
    fn test_crowding_distance_4points() {
        let objectives = vec![
            vec![0.0, 0.0],
            vec![100.0, -100.0],
            vec![200.0, -200.0],
            vec![400.0, -400.0],
        ];
        let d = all(&objectives);
        assert_eq!(d[0], f64::INFINITY);
        assert_approx_eq!(f64, d[1], 1.0, epsilon = 0.00001);
        assert_approx_eq!(f64, d[2], 1.5, epsilon = 0.00001);
        assert_eq!(d[3], f64::INFINITY);
    }

    #[test]
    /// Test the crowding distance algorithm (6 points).
    fn test_crowding_distance_6points() {
        let objectives = vec![
            vec![1.1, 8.1],
            vec![2.1, 6.1],
            vec![3.1, 4.1],
            vec![5.1, 3.1],
            vec![8.1, 2.1],
            vec![11.1, 1.1],
        ];
        let d = all(&objectives);
        let expected = [
            f64::INFINITY,
            0.7714285714285714,
            0.728571429,
            0.785714286,
            0.885714286,
            f64::INFINITY,
        ];
        for (value, exp) in d.into_iter().zip(expected) {
            if exp.is_infinite() {
                assert_eq!(value, exp);
            } else {
                assert_approx_eq!(f64, value, exp, epsilon = 0.001);
            }
        }
    }

    #[test]
    /// A flat objective does not contribute and a front is a subset of the solutions.
    fn test_crowding_distance_flat_objective_and_subset() {
        let objectives = vec![
            vec![9.0, 0.5],
            vec![0.0, 0.5],
            vec![9.0, 0.5],
            vec![1.0, 0.5],
            vec![2.0, 0.5],
        ];
        let d = crowding_distance(&objectives, &[1, 3, 4]);
        assert_eq!(d[0], f64::INFINITY);
        assert_approx_eq!(f64, d[1], 1.0, epsilon = 0.00001);
        assert_eq!(d[2], f64::INFINITY);

        // no objective
        let d = crowding_distance(&[vec![], vec![], vec![]], &[0, 1, 2]);
        assert_eq!(d, vec![0.0; 3]);
    }

    #[test]
    fn test_rank_and_crowding_order() {
        assert_eq!(
            compare_crowding_distance(f64::INFINITY, f64::INFINITY),
            Ordering::Equal
        );
        assert_eq!(compare_crowding_distance(1.0, 1.0 + 1e-12), Ordering::Equal);
        assert_eq!(compare_crowding_distance(2.0, 1.0), Ordering::Less);

        let ranks = [1, 0, 0, 1, 0];
        let distances = [5.0, 0.3, f64::INFINITY, 1.0, 0.3];
        assert_eq!(rank_and_crowding_order(&ranks, &distances), vec![2, 1, 4, 0, 3]);
    }

    #[test]
    /// Nearly equal distances keep their input order.
    fn test_rank_and_crowding_order_near_ties() {
        let distances = [1.0, 1.0 + 1e-12, 0.5, f64::INFINITY, 0.5 + 1e-11];
        assert_eq!(
            rank_and_crowding_order(&[0; 5], &distances),
            vec![3, 0, 1, 2, 4]
        );
    }

    #[test]
    /// A chain of distances, each within the tolerance of the next, is still sorted.
    fn test_rank_and_crowding_order_chain_of_near_ties() {
        let mut distances = (0..500)
            .map(|i| 1.0 + i as f64 * 0.6e-10)
            .collect::<Vec<f64>>();
        distances.shuffle(&mut ChaCha8Rng::seed_from_u64(3));
        let ranks = (0..500).map(|i| i % 2).collect::<Vec<usize>>();

        let order = rank_and_crowding_order(&ranks, &distances);
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, (0..500).collect::<Vec<_>>());
        for pair in order.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(ranks[a] <= ranks[b]);
            if ranks[a] == ranks[b] {
                assert!(distances[a] >= distances[b] - CROWDING_DISTANCE_EPSILON);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_boundaries_are_infinite(
            values in prop::collection::vec(prop::collection::vec(0.0_f64..=1.0, 2), 2..30)
        ) {
            let d = all(&values);
            for obj in 0..2 {
                let column = values.iter().map(|v| v[obj]).collect::<Vec<_>>();
                let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                prop_assert!((0..values.len()).any(|i| column[i] == min && d[i].is_infinite()));
                prop_assert!((0..values.len()).any(|i| column[i] == max && d[i].is_infinite()));
            }
            prop_assert!(d.iter().all(|v| *v >= 0.0));
        }
    }
}
