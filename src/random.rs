// Random Generation Module
//
// Per-worker random source. Every worker owns its own generator, so draws
// never contend and a fixed seed reproduces a worker's decision sequence.

use rand::distributions::uniform::SampleUniform;
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seedable random source used by workers and actions.
pub struct StressRng {
    rng: StdRng,
}

impl StressRng {
    /// Create a generator seeded from the operating system.
    pub fn new() -> Self {
        StressRng {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a generator with a fixed seed, for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        StressRng {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw from the inclusive range [min, max].
    pub fn number<T>(&mut self, min: T, max: T) -> T
    where
        T: SampleUniform + PartialOrd + Copy,
    {
        self.rng.gen_range(min..=max)
    }

    /// Alphanumeric string whose length is drawn uniformly from
    /// [min_length, max_length].
    pub fn string(&mut self, min_length: usize, max_length: usize) -> String {
        let length = self.number(min_length, max_length);
        Alphanumeric.sample_string(&mut self.rng, length)
    }
}

impl Default for StressRng {
    fn default() -> Self {
        Self::new()
    }
}
