//! Procedural synthesis of astrophysically plausible stellar populations from MIST
//! evolution tracks.
//!
//! [`Universe::fill`] is the top-level entry point: seed a population, sample primordial
//! parameters per star category, interpolate MIST tracks in parallel, place systems with
//! the octree sampler, and bind binary companions.

pub mod config;
pub mod constants;
pub mod error;
pub mod interpolation;
pub mod mist;
pub mod octree;
pub mod pool;
pub mod random;
pub mod stellar;
pub mod universe;

pub use config::{GeneratorLimits, SampleDistribution, UniverseConfig};
pub use error::{GenError, Result};
pub use mist::MistStore;
pub use pool::{TaskHandle, ThreadPool};
pub use stellar::{EvolutionPhase, GenOption, PrimaryParameters, Star, StarFrom, StellarGenerator};
pub use universe::{StellarSystem, Universe};
