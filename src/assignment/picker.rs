//! Random selection of reviewers.

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::models::Member;

/// Source of randomness for reviewer selection.
pub trait ReviewerPicker: Send + Sync {
    /// Shuffle candidates uniformly in place.
    fn shuffle(&self, candidates: &mut [Member]);

    /// A uniform index in `0..len`. `len` is never zero.
    fn choose(&self, len: usize) -> usize;
}

/// Picker backed by the thread-local RNG.
#[derive(Debug, Default)]
pub struct ThreadRngPicker;

impl ReviewerPicker for ThreadRngPicker {
    fn shuffle(&self, candidates: &mut [Member]) {
        candidates.shuffle(&mut rand::thread_rng());
    }

    fn choose(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Reproducible picker over a seeded `StdRng`.
#[derive(Debug)]
pub struct SeededPicker {
    rng: Mutex<StdRng>,
}

impl SeededPicker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl ReviewerPicker for SeededPicker {
    fn shuffle(&self, candidates: &mut [Member]) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        candidates.shuffle(&mut *rng);
    }

    fn choose(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..len)
    }
}

/// Seeded picker when a seed is configured, thread RNG otherwise.
pub fn picker_from_seed(seed: Option<u64>) -> Arc<dyn ReviewerPicker> {
    match seed {
        Some(seed) => Arc::new(SeededPicker::new(seed)),
        None => Arc::new(ThreadRngPicker),
    }
}
