use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Explicit random source threaded through seed selection and the
/// coin-flip evaluator. Replaces any global RNG state so that unrelated
/// runs cannot couple through hidden shared state.
pub struct DiffusionRng {
    rng: ChaCha20Rng,
}

impl DiffusionRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Derive an independent stream for one realization of a multi-run
    /// experiment. Combines seeds deterministically.
    pub fn for_run(global_seed: u64, run_id: u64) -> Self {
        let seed = global_seed.wrapping_add(run_id.wrapping_mul(0x9e3779b97f4a7c15));
        Self::new(seed)
    }

    /// Weighted coin flip: true with probability `prob`.
    pub fn chance(&mut self, prob: f64) -> bool {
        if prob <= 0.0 {
            return false;
        }
        if prob >= 1.0 {
            return true;
        }
        self.rng.gen::<f64>() < prob
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}
