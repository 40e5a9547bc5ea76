//! Backend assignment for paths without cached affinity.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Picks a backend index for a path seen for the first time.
///
/// Implementations must return a value in `0..backend_count`; callers
/// guarantee `backend_count >= 1`.
pub trait AssignmentPolicy: Send + Sync {
    fn choose(&self, backend_count: usize) -> usize;
}

/// Uniform choice from the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformRandom;

impl UniformRandom {
    pub fn new() -> Self {
        Self
    }
}

impl AssignmentPolicy for UniformRandom {
    fn choose(&self, backend_count: usize) -> usize {
        debug_assert!(backend_count > 0);
        rand::thread_rng().gen_range(0..backend_count)
    }
}

/// Uniform choice from a seeded generator, reproducible across runs.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl AssignmentPolicy for SeededRandom {
    fn choose(&self, backend_count: usize) -> usize {
        debug_assert!(backend_count > 0);
        self.rng.lock().gen_range(0..backend_count)
    }
}

impl<F> AssignmentPolicy for F
where
    F: Fn(usize) -> usize + Send + Sync,
{
    fn choose(&self, backend_count: usize) -> usize {
        self(backend_count)
    }
}
