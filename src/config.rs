use serde::{Deserialize, Serialize};

/// Top-level population parameters handed to [`crate::universe::Universe::fill`].
///
/// Mirrors the `fillUniverse` entry point: a seed, per-category counts, and the universe
/// age used to derive age-distribution shifts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    pub seed: u64,
    pub star_count: usize,
    pub giant_count: usize,
    pub massive_count: usize,
    pub neutron_star_count: usize,
    pub black_hole_count: usize,
    pub merge_star_count: usize,
    /// Age of the simulated universe, in years.
    pub universe_age: f64,
    /// Root of the MIST track tree (`Assets/Models/MIST` in the original layout).
    pub mist_root: String,
    /// Minimum spacing enforced by the octree sampler, in parsecs.
    pub min_spacing_pc: f64,
    /// Target stellar density used to size octree leaves, in stars per cubic parsec.
    pub density: f64,
    /// Worker thread count; `None` sizes to the physical core count.
    pub thread_count: Option<usize>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        UniverseConfig {
            seed: 0,
            star_count: 1000,
            giant_count: 0,
            massive_count: 0,
            neutron_star_count: 0,
            black_hole_count: 0,
            merge_star_count: 0,
            universe_age: 13.8e9,
            mist_root: "Assets/Models/MIST".to_string(),
            min_spacing_pc: 0.1,
            density: 0.004,
            thread_count: None,
        }
    }
}

/// Which proposal a primordial-parameter sampler draws from. `FromPdf`
/// rejection-samples against the astrophysically-motivated PDF; `Uniform` draws linearly
/// over `[lower, upper]`, bypassing rejection; `UniformByExponent` draws linearly in
/// `log10` space before exponentiating back (used for the age sampler only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleDistribution {
    FromPdf,
    Uniform,
    UniformByExponent,
}

/// Sampling bounds for one worker generator, derived from a [`UniverseConfig`] and the
/// extra category currently being filled.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorLimits {
    pub mass_lower: f64,
    pub mass_upper: f64,
    pub mass_distribution: SampleDistribution,
    pub age_lower: f64,
    pub age_upper: f64,
    pub age_distribution: SampleDistribution,
    pub feh_lower: f64,
    pub feh_upper: f64,
    pub universe_age: f64,
    /// Coil-field limits for the `minCoilMass` derived quantity: the maximum operating
    /// temperature, in Kelvin, of a star-lifter's equatorial deflection coil.
    pub coil_temp_limit: f64,
    /// Coil-field limits for the `minCoilMass` derived quantity: the coil's
    /// power-dissipation-per-unit-mass design constant.
    pub dep_dm: f64,
}

impl Default for GeneratorLimits {
    fn default() -> Self {
        GeneratorLimits {
            mass_lower: 0.075,
            mass_upper: 300.0,
            mass_distribution: SampleDistribution::FromPdf,
            age_lower: 0.0,
            age_upper: 13.8e9,
            age_distribution: SampleDistribution::FromPdf,
            feh_lower: -4.0,
            feh_upper: 0.5,
            universe_age: 13.8e9,
            coil_temp_limit: 1514.114,
            dep_dm: 2e6,
        }
    }
}

impl GeneratorLimits {
    /// Bounds for the `Giant` extra-star category: mass 1-35 M☉, age
    /// and feH left at the population defaults (rejection-sampled).
    pub fn giant(universe_age: f64) -> Self {
        GeneratorLimits {
            mass_lower: 1.0,
            mass_upper: 35.0,
            universe_age,
            ..GeneratorLimits::default()
        }
    }

    /// Bounds for the `Massive` extra-star category: mass and age both drawn uniformly
    /// (raw, not log-space), restricted to young high-mass stars.
    pub fn massive(universe_age: f64) -> Self {
        GeneratorLimits {
            mass_lower: 20.0,
            mass_upper: 300.0,
            mass_distribution: SampleDistribution::Uniform,
            age_lower: 0.0,
            age_upper: 3.5e6,
            age_distribution: SampleDistribution::Uniform,
            universe_age,
            ..GeneratorLimits::default()
        }
    }

    /// Bounds for the `NeutronStar` extra category: mass uniform 10-20 M☉ (the `DeathStar`
    /// `GenOption` skips evolution entirely, so mass only seeds the remnant death table);
    /// age drawn log-uniformly over 1e7-1e8 years.
    pub fn neutron_star(universe_age: f64) -> Self {
        GeneratorLimits {
            mass_lower: 10.0,
            mass_upper: 20.0,
            mass_distribution: SampleDistribution::Uniform,
            age_lower: 1e7,
            age_upper: 1e8,
            age_distribution: SampleDistribution::UniformByExponent,
            universe_age,
            ..GeneratorLimits::default()
        }
    }

    /// Bounds for the `BlackHole` extra category: mass uniform 35-300 M☉, age
    /// rejection-sampled over the full age-PDF range, feH restricted to metal-poor
    /// populations where pair-instability/photodisintegration channels are reachable.
    pub fn black_hole(universe_age: f64) -> Self {
        GeneratorLimits {
            mass_lower: 35.0,
            mass_upper: 300.0,
            mass_distribution: SampleDistribution::Uniform,
            age_lower: 1e7,
            age_upper: 1.26e10,
            feh_lower: -2.0,
            feh_upper: 0.5,
            universe_age,
            ..GeneratorLimits::default()
        }
    }

    /// Bounds for the `MergeStar` extra category: a zero-width mass range, age log-uniform over 1e6-1e8.
    pub fn merge_star(universe_age: f64) -> Self {
        GeneratorLimits {
            mass_lower: 0.0,
            mass_upper: 0.0,
            mass_distribution: SampleDistribution::Uniform,
            age_lower: 1e6,
            age_upper: 1e8,
            age_distribution: SampleDistribution::UniformByExponent,
            universe_age,
            ..GeneratorLimits::default()
        }
    }

    /// Bounds for the bulk of ordinary stars filling out the remainder of `star_count`.
    pub fn ordinary(universe_age: f64) -> Self {
        GeneratorLimits {
            mass_lower: 0.075,
            universe_age,
            ..GeneratorLimits::default()
        }
    }
}
