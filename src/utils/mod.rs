pub use crowding_distance::{
    compare_crowding_distance, crowding_distance, rank_and_crowding_order,
    CROWDING_DISTANCE_EPSILON,
};
pub use fast_non_dominated_sort::{fast_non_dominated_sort, NonDominatedSortResults};
pub use vectors::{argsort, normalized_fitness_matrix, Sort};

mod crowding_distance;
mod fast_non_dominated_sort;
mod vectors;
