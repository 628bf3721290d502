use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic key generator seeded for reproducible benchmarks.
pub struct DataGenerator {
    rng: StdRng,
}

impl DataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `count` uniformly distributed u32 keys.
    pub fn uniform_u32(&mut self, count: usize) -> Vec<u32> {
        (0..count).map(|_| self.rng.gen::<u32>()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_data() {
        let a = DataGenerator::new(42).uniform_u32(1_000);
        let b = DataGenerator::new(42).uniform_u32(1_000);
        assert_eq!(a, b);
        assert_ne!(a, DataGenerator::new(43).uniform_u32(1_000));
    }

    #[test]
    fn test_count() {
        let mut gen = DataGenerator::new(1);
        assert!(gen.uniform_u32(0).is_empty());
        assert_eq!(gen.uniform_u32(17).len(), 17);
    }
}
