//! Sample generation for the Monte Carlo cycles
//!
//! Standard normals are drawn in fixed batches, each batch seeded from the
//! run seed, the cycle and the batch index, so the stream does not depend on
//! how batches are scheduled across threads.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use rand_distr::StandardNormal;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::Result;
use crate::linalg::Matrix;
use crate::model::Distribution;
use crate::problem::PointTable;
use crate::stats::normal_pdf;

/// Samples generated from one seed
pub(super) const BATCH_SIZE: usize = 100;

/// Seed of one batch (splitmix64 finaliser over the three inputs)
pub(super) fn mix(seed: u64, cycle: usize, batch: usize) -> u64 {
    let mut z = seed
        .wrapping_add((cycle as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((batch as u64).wrapping_mul(0xD1B5_4A32_D192_ED03));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// `samples` rows of `n` independent standard normals, row-major
pub(super) fn standard_normals(n: usize, samples: usize, seed: u64, cycle: usize) -> Vec<f64> {
    let batches = samples.div_ceil(BATCH_SIZE);
    let draw = |batch: usize| {
        let mut rng = SmallRng::seed_from_u64(mix(seed, cycle, batch));
        let len = if batch == batches - 1 {
            samples - batch * BATCH_SIZE
        } else {
            BATCH_SIZE
        };
        (0..len * n)
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect::<Vec<_>>()
    };

    #[cfg(feature = "parallel")]
    let values = (0..batches).into_par_iter().flat_map(draw).collect();

    #[cfg(not(feature = "parallel"))]
    let values = (0..batches).flat_map(draw).collect();

    values
}

/// Maps correlated standard normals to physical samples and their
/// importance sampling weights.
pub(super) struct Sampler {
    distributions: Vec<Distribution>,
    sampling: Vec<Option<Distribution>>,
    chol: Matrix,
    r_inv: Matrix,
    /// Skip the joint density correction when nothing is correlated
    correlated: bool,
}

impl Sampler {
    pub(super) fn new(
        distributions: Vec<Distribution>,
        sampling: Vec<Option<Distribution>>,
        correlation: &Matrix,
    ) -> Result<Self> {
        let chol = correlation.cholesky()?;
        let r_inv = correlation.spd_inverse()?;
        let n = correlation.size();
        let correlated = (0..n).any(|i| (0..n).any(|j| i != j && correlation[(i, j)] != 0.0));
        Ok(Self {
            distributions,
            sampling,
            chol,
            r_inv,
            correlated,
        })
    }

    pub(super) fn set_sampling(&mut self, index: usize, distribution: Distribution) {
        self.sampling[index] = Some(distribution);
    }

    /// Fill the random columns of `row` from the independent normals `z` and
    /// return the weight of the sample.
    fn transform(&self, z: &[f64], row: &mut [f64]) -> f64 {
        let zh = self.chol.mul_vec(z);
        let mut zf = zh.clone();
        let mut log_weight = 0.0;

        for (i, (f, h)) in self.distributions.iter().zip(&self.sampling).enumerate() {
            match h {
                None => row[i] = f.from_standard_normal(zh[i]),
                Some(h) => {
                    let x = h.from_standard_normal(zh[i]);
                    zf[i] = f.to_standard_normal(x);
                    row[i] = x;
                    // (f(x)/φ(zf)) / (h(x)/φ(zh))
                    log_weight += f.pdf(x).ln() - normal_pdf(zf[i]).ln() - h.pdf(x).ln()
                        + normal_pdf(zh[i]).ln();
                }
            }
        }

        if self.correlated {
            log_weight += -0.5 * self.r_inv.quadratic_form(&zf) + 0.5 * self.r_inv.quadratic_form(&zh);
        } else {
            log_weight += zh
                .iter()
                .zip(&zf)
                .map(|(h, f)| 0.5 * (h * h - f * f))
                .sum::<f64>();
        }

        let weight = log_weight.exp();
        if weight.is_finite() { weight } else { 0.0 }
    }

    /// Transform every row of `table` in place from the row-major normals `z`
    /// and return the sample weights.
    pub(super) fn fill(&self, table: &mut PointTable, z: &[f64]) -> Vec<f64> {
        let n = self.distributions.len();
        let stride = table.stride();

        #[cfg(feature = "parallel")]
        let weights = table
            .data_mut()
            .par_chunks_mut(stride)
            .zip(z.par_chunks(n))
            .map(|(row, z)| self.transform(z, row))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let weights = table
            .data_mut()
            .chunks_mut(stride)
            .zip(z.chunks(n))
            .map(|(row, z)| self.transform(z, row))
            .collect();

        weights
    }
}
