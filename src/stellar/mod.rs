//! Stellar generator and the `Star`/`PrimaryParameters` data model.

pub mod classification;
pub mod generator;
pub mod remnant;
pub mod spin;

pub use generator::StellarGenerator;

use crate::stellar::classification::StellarClass;

/// How a star's primordial parameters were produced, and therefore which branch of
/// [`StellarGenerator::generate_star`] materialises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenOption {
    Normal,
    Giant,
    DeathStar,
    MergeStar,
    BinaryCompanion,
}

/// Sampled primordial parameters, held by every generated star for its whole lifetime
///.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryParameters {
    /// Initial mass, in solar masses.
    pub initial_mass: f64,
    /// Age, in years.
    pub age: f64,
    /// log10(Fe/H) relative to solar.
    pub feh: f64,
    pub gen_option: GenOption,
}

/// Evolutionary stage tag. Negative/large values double as remnant markers:
/// the discriminant matches the MIST `phase` column for living stars and the reserved
/// values 11-15 for remnants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EvolutionPhase {
    PreMainSequence = -1,
    MainSequence = 0,
    RedGiant = 2,
    CoreHeliumBurning = 3,
    EarlyAgb = 4,
    ThermalPulseAgb = 5,
    PostAgb = 6,
    WolfRayet = 9,
    HeliumWhiteDwarf = 11,
    CarbonOxygenWhiteDwarf = 12,
    OxygenNeonMagnesiumWhiteDwarf = 13,
    NeutronStar = 14,
    StellarBlackHole = 15,
    /// No surviving remnant (pair-instability annihilation).
    Null = 16,
}

impl EvolutionPhase {
    pub fn is_remnant(self) -> bool {
        matches!(
            self,
            EvolutionPhase::HeliumWhiteDwarf
                | EvolutionPhase::CarbonOxygenWhiteDwarf
                | EvolutionPhase::OxygenNeonMagnesiumWhiteDwarf
                | EvolutionPhase::NeutronStar
                | EvolutionPhase::StellarBlackHole
                | EvolutionPhase::Null
        )
    }

    pub fn is_white_dwarf(self) -> bool {
        matches!(
            self,
            EvolutionPhase::HeliumWhiteDwarf
                | EvolutionPhase::CarbonOxygenWhiteDwarf
                | EvolutionPhase::OxygenNeonMagnesiumWhiteDwarf
        )
    }

    /// Numeric code matching `evolutionProgress` encoding for remnants.
    pub fn remnant_code(self) -> Option<f64> {
        match self {
            EvolutionPhase::HeliumWhiteDwarf => Some(11.0),
            EvolutionPhase::CarbonOxygenWhiteDwarf => Some(12.0),
            EvolutionPhase::OxygenNeonMagnesiumWhiteDwarf => Some(13.0),
            EvolutionPhase::NeutronStar => Some(14.0),
            EvolutionPhase::StellarBlackHole => Some(15.0),
            _ => None,
        }
    }
}

/// Terminal-event provenance: how a star reached its present state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarFrom {
    Normal,
    WhiteDwarfMerge,
    SlowCoolDown,
    EnvelopeDispersal,
    ElectronCaptureSupernova,
    IronCoreCollapseSupernova,
    RelativisticJetHypernova,
    PairInstabilitySupernova,
    Photodisintegration,
}

/// Mass fractions of the outer envelope. Invariant: the three non-hydrogen fractions sum
/// to 1 within float tolerance.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceComposition {
    pub h1: f64,
    pub z: f64,
    pub energetic_nuclide: f64,
    pub volatiles: f64,
}

/// The two Euler angles placing a rotation pole on the celestial sphere.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normal2 {
    pub theta: f64,
    pub phi: f64,
}

/// Fully materialised stellar entity.
#[derive(Debug, Clone)]
pub struct Star {
    pub primary: PrimaryParameters,

    pub mass: f64,       // solar masses
    pub radius: f64,     // solar radii
    pub luminosity: f64, // solar luminosities
    pub teff: f64,       // K
    pub core_temp: f64,  // K
    pub core_density: f64, // kg/m^3
    pub stellar_wind_speed: f64, // m/s
    pub stellar_wind_mass_loss_rate: f64, // kg/s

    pub surface: SurfaceComposition,

    /// Total main-sequence-to-remnant lifetime, in years.
    pub lifetime: f64,
    /// Normalized position on the evolution track, or the remnant code (>10) from
    /// [`EvolutionPhase::remnant_code`].
    pub evolution_progress: f64,
    pub evolution_phase: EvolutionPhase,
    pub star_from: StarFrom,

    pub stellar_class: StellarClass,

    pub magnetic_field: f64, // Tesla
    /// Spin period in seconds for ordinary stars/WD/NS; dimensionless Kerr parameter for
    /// black holes.
    pub spin: f64,
    pub oblateness: f64,
    pub normal: Normal2,
    /// Minimum mass of a star-lifter's equatorial deflection coil able to survive this
    /// star's field and luminosity, in kg.
    pub min_coil_mass: f64,
}
