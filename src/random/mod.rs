//! Seeded random primitives.
//!
//! A single seedable engine type plus five generator wrappers, each exposing one
//! operation: `sample(engine) -> T`. No distribution owns or shares an engine; callers
//! pass one in by mutable reference, which is what lets [`crate::pool::ThreadPool`]
//! workers each own an independent engine with no cross-worker synchronization.

use crate::error::{GenError, Result};
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli as RdBernoulli, Distribution as RdDistribution, LogNormal as RdLogNormal, Normal as RdNormal};

/// The engine every sampler in this crate draws from. `rand`'s `StdRng` is used for its
/// Mersenne-Twister-class guarantees: seedable, reproducible across platforms for a given
/// `rand` version, and cheap to clone a fresh sub-stream from.
pub type Engine = rand::rngs::StdRng;

/// Derive an independent worker engine from a parent engine and a worker index.
///
/// This is the Rust stand-in for `std::seed_seq`-based sub-seeding:
/// each call consumes one `u64` from the parent stream and folds in the index, so the
/// resulting sequence of worker engines is a deterministic function of the parent seed
/// and worker count alone — rerunning with the same seed and the same worker count
/// reproduces bit-identical engines.
pub fn spawn_sub_engine(parent: &mut Engine, index: u64) -> Engine {
    let draw: u64 = parent.gen();
    Engine::seed_from_u64(draw ^ index.wrapping_mul(0x9E3779B97F4A7C15))
}

/// Common interface for every distribution wrapper in this module.
pub trait Sample<T> {
    fn sample(&self, engine: &mut Engine) -> T;
}

/// Uniform real distribution over `[low, high)`.
#[derive(Debug, Clone, Copy)]
pub struct Uniform {
    pub low: f64,
    pub high: f64,
}

impl Uniform {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        if !(low < high) {
            return Err(GenError::InvalidDistribution(format!(
                "uniform bounds must satisfy low < high, got [{low}, {high})"
            )));
        }
        Ok(Uniform { low, high })
    }
}

impl Sample<f64> for Uniform {
    fn sample(&self, engine: &mut Engine) -> f64 {
        engine.gen_range(self.low..self.high)
    }
}

/// Uniform distribution in `log10` space over `[log10(low), log10(high))`, exponentiated
/// back on sample. Used for magnetic-field draws (e.g. `10^Uniform(0.5, 4.5)`).
#[derive(Debug, Clone, Copy)]
pub struct LogUniform {
    inner: Uniform,
}

impl LogUniform {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        if !(low > 0.0 && high > 0.0) {
            return Err(GenError::InvalidDistribution(format!(
                "log-uniform bounds must be positive, got [{low}, {high})"
            )));
        }
        Ok(LogUniform {
            inner: Uniform::new(low.log10(), high.log10())?,
        })
    }
}

impl Sample<f64> for LogUniform {
    fn sample(&self, engine: &mut Engine) -> f64 {
        10f64.powf(self.inner.sample(engine))
    }
}

/// Normal (Gaussian) distribution.
#[derive(Debug, Clone, Copy)]
pub struct Normal {
    dist: RdNormal<f64>,
}

impl Normal {
    pub fn new(mean: f64, std_dev: f64) -> Result<Self> {
        let dist = RdNormal::new(mean, std_dev)
            .map_err(|e| GenError::InvalidDistribution(e.to_string()))?;
        Ok(Normal { dist })
    }
}

impl Sample<f64> for Normal {
    fn sample(&self, engine: &mut Engine) -> f64 {
        self.dist.sample(engine)
    }
}

/// Log-normal distribution (the underlying normal is over `ln(x)`).
#[derive(Debug, Clone, Copy)]
pub struct LogNormal {
    dist: RdLogNormal<f64>,
}

impl LogNormal {
    pub fn new(mean: f64, std_dev: f64) -> Result<Self> {
        let dist = RdLogNormal::new(mean, std_dev)
            .map_err(|e| GenError::InvalidDistribution(e.to_string()))?;
        Ok(LogNormal { dist })
    }
}

impl Sample<f64> for LogNormal {
    fn sample(&self, engine: &mut Engine) -> f64 {
        self.dist.sample(engine)
    }
}

/// Biased coin flip.
#[derive(Debug, Clone, Copy)]
pub struct Bernoulli {
    dist: RdBernoulli,
}

impl Bernoulli {
    pub fn new(p: f64) -> Result<Self> {
        let dist = RdBernoulli::new(p).map_err(|e| GenError::InvalidDistribution(e.to_string()))?;
        Ok(Bernoulli { dist })
    }
}

impl Sample<bool> for Bernoulli {
    fn sample(&self, engine: &mut Engine) -> bool {
        self.dist.sample(engine)
    }
}

/// Rejection-sample `proposal` against `pdf`, returning the first proposal accepted under
/// a uniform draw against `ceiling` (an upper bound on `pdf` over the proposal's support).
///
/// Used for the mass and feH samplers, whose PDFs are not in a form `rand_distr` knows
/// how to sample directly.
pub fn rejection_sample<F>(engine: &mut Engine, proposal: &Uniform, ceiling: f64, pdf: F) -> f64
where
    F: Fn(f64) -> f64,
{
    loop {
        let x = proposal.sample(engine);
        let u = engine.gen::<f64>() * ceiling;
        if u <= pdf(x) {
            return x;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_engines_are_deterministic() {
        let mut parent_a = Engine::seed_from_u64(42);
        let mut parent_b = Engine::seed_from_u64(42);

        let mut child_a = spawn_sub_engine(&mut parent_a, 3);
        let mut child_b = spawn_sub_engine(&mut parent_b, 3);

        let draw_a: f64 = child_a.gen();
        let draw_b: f64 = child_b.gen();
        assert_eq!(draw_a, draw_b);
    }

    #[test]
    fn sub_engines_differ_by_index() {
        let mut parent = Engine::seed_from_u64(42);
        let mut first = spawn_sub_engine(&mut parent, 0);
        let mut parent2 = Engine::seed_from_u64(42);
        let mut second = spawn_sub_engine(&mut parent2, 1);

        let a: u64 = first.gen();
        let b: u64 = second.gen();
        assert_ne!(a, b);
    }

    #[test]
    fn log_uniform_stays_in_bounds() {
        let mut engine = Engine::seed_from_u64(7);
        let dist = LogUniform::new(0.5, 4.5).unwrap();
        for _ in 0..1000 {
            let v = dist.sample(&mut engine);
            assert!(v >= 0.5 && v < 4.5);
        }
    }

    #[test]
    fn rejection_sample_respects_pdf_support() {
        let mut engine = Engine::seed_from_u64(1);
        let proposal = Uniform::new(0.0, 1.0).unwrap();
        // triangular pdf peaking at x=0.5, ceiling 2.0
        let pdf = |x: f64| 2.0 * (1.0 - (2.0 * x - 1.0).abs());
        for _ in 0..1000 {
            let x = rejection_sample(&mut engine, &proposal, 2.0, pdf);
            assert!((0.0..1.0).contains(&x));
        }
    }
}
