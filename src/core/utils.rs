use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Get the random number generator of a run. If no seed is provided, this is seeded from the
/// operating system entropy.
///
/// # Arguments
///
/// * `seed`: The optional seed number.
///
/// returns: `Box<dyn RngCore>`
pub fn get_rng(seed: Option<u64>) -> Box<dyn RngCore> {
    let rng = match seed {
        None => ChaCha8Rng::from_entropy(),
        Some(s) => ChaCha8Rng::seed_from_u64(s),
    };
    Box::new(rng)
}
