//! Simple random number generator for reproducibility.
//!
//! This module provides a lightweight xorshift-based PRNG that doesn't require
//! external dependencies. Weight initialization draws every sample from an
//! explicitly seeded instance, so two networks built with the same seed are
//! identical.

/// Simple RNG for reproducibility without external crates.
///
/// Uses xorshift64 for fast, deterministic generation and Box-Muller for
/// Gaussian samples.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Create a new RNG from `seed`.
    ///
    /// The seed is scrambled with splitmix64 so that small seeds do not yield
    /// a run of tiny leading values.
    pub fn new(seed: u64) -> Self {
        let mut z = seed.wrapping_add(0x9e3779b97f4a7c15);
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^= z >> 31;
        let state = if z == 0 { 0x9e3779b97f4a7c15 } else { z };
        Self { state }
    }

    /// Basic xorshift to generate u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    /// Uniform sample in (0, 1]. Never returns zero, so it is safe to take its log.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u32() as f64 + 1.0) / (u32::MAX as f64 + 1.0)
    }

    /// Zero-mean Gaussian sample with the given standard deviation (Box-Muller).
    pub fn gaussian(&mut self, std_dev: f64) -> f64 {
        let u1 = self.next_f64();
        let u2 = self.next_f64();
        let standard = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).sin();
        std_dev * standard
    }
}
