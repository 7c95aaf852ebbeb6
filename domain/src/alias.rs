//! Random alias generation under a wall-clock deadline.

use std::time::Instant;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::{Clock, CoreError};

/// Draws random aliases of a fixed length from an alphabet.
#[derive(Clone, Debug)]
pub struct AliasGenerator {
    alphabet: Vec<char>,
    length: usize,
}

impl AliasGenerator {
    pub fn new(allowed_chars: &str, length: usize) -> Self {
        Self {
            alphabet: allowed_chars.chars().collect(),
            length,
        }
    }

    /// One candidate: `length` independent draws, with replacement.
    fn candidate<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        (0..self.length)
            .map(|_| self.alphabet.choose(rng).copied())
            .collect()
    }

    /// Keep drawing until a candidate is free and not `reserved`, or the
    /// deadline passes.
    ///
    /// There is no iteration cap; the deadline is the only bound. The
    /// deadline is checked before every draw, so a timeout is never reported
    /// early. `exists` errors abort generation.
    pub fn generate<C, R, F>(
        &self,
        clock: &C,
        deadline: Instant,
        rng: &mut R,
        reserved: Option<&str>,
        mut exists: F,
    ) -> Result<String, CoreError>
    where
        C: Clock + ?Sized,
        R: Rng + ?Sized,
        F: FnMut(&str) -> Result<bool, CoreError>,
    {
        loop {
            if clock.now() >= deadline {
                return Err(CoreError::GenerationTimeout);
            }
            // An empty alphabet never yields a candidate; spin out the budget.
            let Some(candidate) = self.candidate(rng) else {
                continue;
            };
            if reserved == Some(candidate.as_str()) {
                continue;
            }
            if !exists(&candidate)? {
                return Ok(candidate);
            }
        }
    }
}
