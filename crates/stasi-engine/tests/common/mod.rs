// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::f64::consts::PI;

/// Seeded standard-normal samples: a 64-bit LCG feeding the Box-Muller transform.
pub struct GaussianNoise {
    state: u64,
    spare: Option<f64>,
}

impl GaussianNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
            spare: None,
        }
    }

    /// Uniform draw in the open interval `(0, 1)`.
    fn next_unit(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 11) as f64 + 0.5) / (1u64 << 53) as f64
    }

    pub fn sample(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        let radius = (-2.0 * self.next_unit().ln()).sqrt();
        let theta = 2.0 * PI * self.next_unit();
        self.spare = Some(radius * theta.sin());
        radius * theta.cos()
    }
}

/// Piecewise-constant levels plus independent Gaussian noise of standard deviation `sd`.
///
/// The noise estimate of the result is close to `sd`.
pub fn gaussian_steps(levels: &[(f64, usize)], sd: f64, seed: u64) -> Vec<f64> {
    let mut noise = GaussianNoise::new(seed);
    levels
        .iter()
        .flat_map(|&(level, len)| std::iter::repeat_n(level, len))
        .map(|level| level + sd * noise.sample())
        .collect()
}
