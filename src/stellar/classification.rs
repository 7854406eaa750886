//! Spectral/luminosity classification and the packed `StellarClass` wire format.

use crate::error::{GenError, Result};
use crate::stellar::{EvolutionPhase, Star};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Two-bit star-type tag. The transient `DeathStar` placeholder used
/// mid-generation never reaches a packed `StellarClass` and so has no wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarType {
    Normal = 0,
    WhiteDwarf = 1,
    NeutronStar = 2,
    BlackHole = 3,
}

/// Primary spectral class, packed into 4 bits. `Q`/`X` (neutron star / black
/// hole) share one code and are disambiguated via [`StarType`] — between them and the 15
/// other codes this exactly fills the 4-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralClass {
    Unknown = 0,
    O = 1,
    B = 2,
    A = 3,
    F = 4,
    G = 5,
    K = 6,
    M = 7,
    L = 8,
    T = 9,
    Y = 10,
    WC = 11,
    WN = 12,
    WO = 13,
    D = 14,
    Remnant = 15, // Q (neutron star) or X (black hole), per StarType
}

impl SpectralClass {
    fn from_code(code: u8) -> SpectralClass {
        use SpectralClass::*;
        match code {
            1 => O,
            2 => B,
            3 => A,
            4 => F,
            5 => G,
            6 => K,
            7 => M,
            8 => L,
            9 => T,
            10 => Y,
            11 => WC,
            12 => WN,
            13 => WO,
            14 => D,
            15 => Remnant,
            _ => Unknown,
        }
    }
}

/// Luminosity class, packed into 4 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuminosityClass {
    Unknown = 0,
    Zero = 1,
    IaPlus = 2,
    Ia = 3,
    Iab = 4,
    Ib = 5,
    II = 6,
    III = 7,
    IV = 8,
    V = 9,
    VI = 10,
}

impl LuminosityClass {
    fn from_code(code: u8) -> LuminosityClass {
        use LuminosityClass::*;
        match code {
            1 => Zero,
            2 => IaPlus,
            3 => Ia,
            4 => Iab,
            5 => Ib,
            6 => II,
            7 => III,
            8 => IV,
            9 => V,
            10 => VI,
            _ => Unknown,
        }
    }
}

/// Special-peculiarity bitfield. Only the peculiarities this generator ever
/// sets are given named bits; the remaining bits of the 33-bit field are reserved.
pub mod peculiarity {
    pub const NONE: u64 = 0;
    pub const F: u64 = 1 << 0; // N III / He II emission lines
    pub const H: u64 = 1 << 1; // WR star with hydrogen emission lines
    pub const M: u64 = 1 << 2; // enhanced metal lines
    pub const P: u64 = 1 << 3; // unspecified peculiar star
}

/// Unpacked view of a [`StellarClass`]'s fields.
#[derive(Debug, Clone, Copy)]
pub struct SpectralType {
    pub h_class: SpectralClass,
    pub subclass_int: u8,
    pub subclass_decimal: u8,
    pub is_am_star: bool,
    pub am_class: SpectralClass,
    pub am_subclass_int: u8,
    pub am_subclass_decimal: u8,
    pub luminosity_class: LuminosityClass,
    pub special_mark: u64,
}

impl Default for SpectralType {
    fn default() -> Self {
        SpectralType {
            h_class: SpectralClass::Unknown,
            subclass_int: 0,
            subclass_decimal: 0,
            is_am_star: false,
            am_class: SpectralClass::Unknown,
            am_subclass_int: 0,
            am_subclass_decimal: 0,
            luminosity_class: LuminosityClass::Unknown,
            special_mark: peculiarity::NONE,
        }
    }
}

/// Packed 64-bit spectral type. Bit layout from the MSB: 2 bits star type, 4
/// bits primary spectral class, 4 bits integer subclass, 4 bits decimal subclass, 1 bit
/// isAmStar, 4 bits metal (Am) spectral class, 4 bits Am integer subclass, 4 bits Am
/// decimal subclass, 4 bits luminosity class, 33 bits special-peculiarity bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StellarClass {
    pub star_type: StarType,
    bits: u64,
}

impl StellarClass {
    pub fn pack(star_type: StarType, spectral: SpectralType) -> StellarClass {
        let mut bits: u64 = 0;
        bits |= (star_type as u64) << 62;
        bits |= (spectral.h_class as u64 & 0xF) << 58;
        bits |= (spectral.subclass_int as u64 & 0xF) << 54;
        bits |= (spectral.subclass_decimal as u64 & 0xF) << 50;
        bits |= (spectral.is_am_star as u64 & 0x1) << 49;
        bits |= (spectral.am_class as u64 & 0xF) << 45;
        bits |= (spectral.am_subclass_int as u64 & 0xF) << 41;
        bits |= (spectral.am_subclass_decimal as u64 & 0xF) << 37;
        bits |= (spectral.luminosity_class as u64 & 0xF) << 33;
        bits |= spectral.special_mark & 0x1_FFFF_FFFF;
        StellarClass { star_type, bits }
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn from_bits(bits: u64) -> StellarClass {
        let star_type = match (bits >> 62) & 0x3 {
            0 => StarType::Normal,
            1 => StarType::WhiteDwarf,
            2 => StarType::NeutronStar,
            _ => StarType::BlackHole,
        };
        StellarClass { star_type, bits }
    }

    pub fn data(&self) -> SpectralType {
        SpectralType {
            h_class: SpectralClass::from_code(((self.bits >> 58) & 0xF) as u8),
            subclass_int: ((self.bits >> 54) & 0xF) as u8,
            subclass_decimal: ((self.bits >> 50) & 0xF) as u8,
            is_am_star: ((self.bits >> 49) & 0x1) != 0,
            am_class: SpectralClass::from_code(((self.bits >> 45) & 0xF) as u8),
            am_subclass_int: ((self.bits >> 41) & 0xF) as u8,
            am_subclass_decimal: ((self.bits >> 37) & 0xF) as u8,
            luminosity_class: LuminosityClass::from_code(((self.bits >> 33) & 0xF) as u8),
            special_mark: self.bits & 0x1_FFFF_FFFF,
        }
    }
}

impl fmt::Display for StellarClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        match self.star_type {
            StarType::NeutronStar => return write!(f, "Q"),
            StarType::BlackHole => return write!(f, "X"),
            _ => {}
        }

        let class_letter = match data.h_class {
            SpectralClass::Unknown => "Unknown",
            SpectralClass::O => "O",
            SpectralClass::B => "B",
            SpectralClass::A => "A",
            SpectralClass::F => "F",
            SpectralClass::G => "G",
            SpectralClass::K => "K",
            SpectralClass::M => "M",
            SpectralClass::L => "L",
            SpectralClass::T => "T",
            SpectralClass::Y => "Y",
            SpectralClass::WC => "WC",
            SpectralClass::WN => "WN",
            SpectralClass::WO => "WO",
            SpectralClass::D => "D",
            SpectralClass::Remnant => "Q",
        };

        if class_letter == "Unknown" {
            return write!(f, "Unknown");
        }

        write!(f, "{class_letter}")?;

        if matches!(self.star_type, StarType::WhiteDwarf) {
            write!(f, "{}.{}", data.subclass_int, data.subclass_decimal)?;
        } else {
            write!(f, "{}", data.subclass_int)?;
            if data.special_mark & peculiarity::H != 0 {
                write!(f, "h")?;
            }
            if data.special_mark & peculiarity::F != 0 {
                write!(f, "f")?;
            }
            match data.luminosity_class {
                LuminosityClass::Zero => write!(f, "0")?,
                LuminosityClass::IaPlus => write!(f, "Ia+")?,
                LuminosityClass::Ia => write!(f, "Ia")?,
                LuminosityClass::Iab => write!(f, "Iab")?,
                LuminosityClass::Ib => write!(f, "Ib")?,
                LuminosityClass::II => write!(f, "II")?,
                LuminosityClass::III => write!(f, "III")?,
                LuminosityClass::IV => write!(f, "IV")?,
                LuminosityClass::V => write!(f, "V")?,
                LuminosityClass::VI => write!(f, "VI")?,
                LuminosityClass::Unknown => {}
            }
        }

        Ok(())
    }
}

impl FromStr for StellarClass {
    type Err = GenError;

    /// Parses the strings this module's own [`fmt::Display`] impl produces, satisfying
    /// the round-trip property `parse(to_string(cls)) == cls`. This is not a general
    /// MK-notation parser.
    fn from_str(s: &str) -> Result<StellarClass> {
        if s == "Q" {
            let spectral = SpectralType {
                h_class: SpectralClass::Remnant,
                ..Default::default()
            };
            return Ok(StellarClass::pack(StarType::NeutronStar, spectral));
        }
        if s == "X" {
            let spectral = SpectralType {
                h_class: SpectralClass::Remnant,
                ..Default::default()
            };
            return Ok(StellarClass::pack(StarType::BlackHole, spectral));
        }
        if s == "Unknown" {
            return Ok(StellarClass::pack(StarType::Normal, SpectralType::default()));
        }

        if let Some(rest) = s.strip_prefix('D') {
            let subclass: f64 = rest
                .parse()
                .map_err(|_| GenError::InvalidDistribution(format!("bad white dwarf subclass in `{s}`")))?;
            let spectral = SpectralType {
                h_class: SpectralClass::D,
                subclass_int: subclass.trunc() as u8,
                subclass_decimal: (subclass.fract() * 10.0).round() as u8,
                ..Default::default()
            };
            return Ok(StellarClass::pack(StarType::WhiteDwarf, spectral));
        }

        let (class_letters, rest) = if let Some(r) = s.strip_prefix("WC") {
            (SpectralClass::WC, r)
        } else if let Some(r) = s.strip_prefix("WN") {
            (SpectralClass::WN, r)
        } else if let Some(r) = s.strip_prefix("WO") {
            (SpectralClass::WO, r)
        } else {
            let mut chars = s.chars();
            let letter = chars.next().ok_or_else(|| {
                GenError::InvalidDistribution(format!("empty spectral class string `{s}`"))
            })?;
            let class = match letter {
                'O' => SpectralClass::O,
                'B' => SpectralClass::B,
                'A' => SpectralClass::A,
                'F' => SpectralClass::F,
                'G' => SpectralClass::G,
                'K' => SpectralClass::K,
                'M' => SpectralClass::M,
                'L' => SpectralClass::L,
                'T' => SpectralClass::T,
                'Y' => SpectralClass::Y,
                _ => {
                    return Err(GenError::InvalidDistribution(format!(
                        "unrecognised spectral class in `{s}`"
                    )))
                }
            };
            (class, chars.as_str())
        };

        let mut digits = String::new();
        let mut tail = rest;
        for (i, c) in rest.char_indices() {
            if c.is_ascii_digit() {
                digits.push(c);
            } else {
                tail = &rest[i..];
                break;
            }
        }
        if digits.len() == rest.len() {
            tail = "";
        }
        let subclass_int: u8 = digits.parse().unwrap_or(0);

        let mut special_mark = peculiarity::NONE;
        let mut remaining = tail;
        if let Some(r) = remaining.strip_prefix('h') {
            special_mark |= peculiarity::H;
            remaining = r;
        }
        if let Some(r) = remaining.strip_prefix('f') {
            special_mark |= peculiarity::F;
            remaining = r;
        }

        let luminosity_class = match remaining {
            "0" => LuminosityClass::Zero,
            "Ia+" => LuminosityClass::IaPlus,
            "Ia" => LuminosityClass::Ia,
            "Iab" => LuminosityClass::Iab,
            "Ib" => LuminosityClass::Ib,
            "II" => LuminosityClass::II,
            "III" => LuminosityClass::III,
            "IV" => LuminosityClass::IV,
            "V" => LuminosityClass::V,
            "VI" => LuminosityClass::VI,
            "" => LuminosityClass::Unknown,
            _ => {
                return Err(GenError::InvalidDistribution(format!(
                    "unrecognised luminosity class in `{s}`"
                )))
            }
        };

        let spectral = SpectralType {
            h_class: class_letters,
            subclass_int,
            luminosity_class,
            special_mark,
            ..Default::default()
        };
        Ok(StellarClass::pack(StarType::Normal, spectral))
    }
}

/// `(temperature_threshold_K, subclass)` pairs, descending in temperature, used by
/// [`classify_subclass`]. Thresholds taken from the standard MIST-era spectral-atlas
/// subclass tables.
struct SubclassMap(&'static [(f64, u8)]);

const MAP_O: SubclassMap = SubclassMap(&[
    (54000.0, 2), (44900.0, 3), (42900.0, 4), (41400.0, 5), (39500.0, 6),
    (38500.0, 7), (35100.0, 8), (34500.0, 9), (33400.0, 10),
]);
const MAP_B: SubclassMap = SubclassMap(&[
    (33400.0, 0), (26000.0, 1), (20600.0, 2), (17200.0, 3), (16400.0, 4),
    (15700.0, 5), (14500.0, 6), (14000.0, 7), (12300.0, 8), (10910.0, 9), (9900.0, 10),
]);
const MAP_A: SubclassMap = SubclassMap(&[
    (9900.0, 0), (9700.0, 1), (9450.0, 2), (8590.0, 3), (8300.0, 4),
    (8100.0, 5), (7910.0, 6), (7840.0, 7), (7700.0, 8), (7590.0, 9), (7200.0, 10),
]);
const MAP_F: SubclassMap = SubclassMap(&[
    (7200.0, 0), (7020.0, 1), (6900.0, 2), (6750.0, 3), (6670.0, 4),
    (6550.0, 5), (6520.0, 6), (6300.0, 7), (6260.0, 8), (6220.0, 9), (6100.0, 10),
]);
const MAP_G: SubclassMap = SubclassMap(&[
    (6100.0, 0), (5860.0, 1), (5770.0, 2), (5720.0, 3), (5680.0, 4),
    (5660.0, 5), (5600.0, 6), (5550.0, 7), (5480.0, 8), (5380.0, 9), (5260.0, 10),
]);
const MAP_K: SubclassMap = SubclassMap(&[
    (5260.0, 0), (5170.0, 1), (5100.0, 2), (4830.0, 3), (4600.0, 4),
    (4440.0, 5), (4300.0, 6), (4100.0, 7), (3990.0, 8), (3930.0, 9), (3850.0, 10),
]);
const MAP_M: SubclassMap = SubclassMap(&[
    (3850.0, 0), (3660.0, 1), (3560.0, 2), (3430.0, 3), (3210.0, 4),
    (3060.0, 5), (2810.0, 6), (2680.0, 7), (2570.0, 8), (2380.0, 9), (2270.0, 10),
]);
const MAP_L: SubclassMap = SubclassMap(&[
    (2270.0, 0), (2160.0, 1), (2060.0, 2), (1920.0, 3), (1870.0, 4),
    (1710.0, 5), (1550.0, 6), (1530.0, 7), (1420.0, 8), (1370.0, 9), (1255.0, 10),
]);
const MAP_T: SubclassMap = SubclassMap(&[
    (1255.0, 0), (1240.0, 1), (1220.0, 2), (1200.0, 3), (1180.0, 4),
    (1160.0, 5), (950.0, 6), (825.0, 7), (680.0, 8), (560.0, 9), (450.0, 10),
]);
const MAP_Y: SubclassMap = SubclassMap(&[(450.0, 0), (360.0, 1), (320.0, 2), (250.0, 4), (0.0, 0)]);

const MAP_WC: SubclassMap = SubclassMap(&[
    (117000.0, 4), (83000.0, 5), (78000.0, 6), (71000.0, 7), (60000.0, 8), (44000.0, 9), (40000.0, 10),
]);
const MAP_WN: SubclassMap = SubclassMap(&[
    (141000.0, 2), (85000.0, 3), (70000.0, 4), (60000.0, 5), (56000.0, 6), (50000.0, 7), (45000.0, 8), (40000.0, 10),
]);
const MAP_WO: SubclassMap = SubclassMap(&[(200000.0, 2), (180000.0, 3), (150000.0, 4), (100000.0, 5)]);
const MAP_WNXH: SubclassMap = SubclassMap(&[
    (50000.0, 5), (45000.0, 6), (43000.0, 7), (40000.0, 8), (35000.0, 9), (30000.0, 10),
]);

/// `[(upper_bound_exclusive, subclass_map)]` in descending order. The O/B boundary is
/// 33400 K.
const ORDINARY_CLASS_MAP: &[(f64, SpectralClass, &SubclassMap)] = &[
    (54000.0, SpectralClass::O, &MAP_O),
    (33400.0, SpectralClass::B, &MAP_B),
    (9900.0, SpectralClass::A, &MAP_A),
    (7200.0, SpectralClass::F, &MAP_F),
    (6100.0, SpectralClass::G, &MAP_G),
    (5260.0, SpectralClass::K, &MAP_K),
    (3850.0, SpectralClass::M, &MAP_M),
    (2270.0, SpectralClass::L, &MAP_L),
    (1255.0, SpectralClass::T, &MAP_T),
    (450.0, SpectralClass::Y, &MAP_Y),
];

fn classify_subclass(map: &SubclassMap, teff: f64) -> u8 {
    for window in map.0.windows(2) {
        let (hi, sub) = window[0];
        let (lo, _) = window[1];
        if teff <= hi && teff > lo {
            return sub;
        }
    }
    map.0.last().map(|&(_, s)| s).unwrap_or(0)
}

/// Full classification algorithm: dispatches on remnant state first, then
/// scans the ordinary-star temperature map, applying the Wolf-Rayet promotion and
/// hypergiant/luminosity rules.
pub fn classify(star: &Star, hr: Option<&HrDiagramTable>) -> SpectralType {
    if star.evolution_phase.is_remnant() {
        return match star.evolution_phase {
            EvolutionPhase::HeliumWhiteDwarf
            | EvolutionPhase::CarbonOxygenWhiteDwarf
            | EvolutionPhase::OxygenNeonMagnesiumWhiteDwarf => classify_white_dwarf(star),
            EvolutionPhase::NeutronStar | EvolutionPhase::StellarBlackHole => SpectralType {
                h_class: SpectralClass::Remnant,
                ..Default::default()
            },
            _ => SpectralType::default(),
        };
    }

    if star.evolution_phase == EvolutionPhase::MainSequence && star.surface.h1 < 0.5 {
        return classify_wolf_rayet(star);
    }

    if star.teff >= 200_000.0 {
        return SpectralType {
            h_class: SpectralClass::WO,
            subclass_int: 2,
            luminosity_class: LuminosityClass::Unknown,
            ..Default::default()
        };
    }

    let mut h_class = SpectralClass::Unknown;
    let mut subclass = 0u8;
    for &(upper, class, map) in ORDINARY_CLASS_MAP {
        if star.teff <= upper {
            h_class = class;
            subclass = classify_subclass(map, star.teff);
            break;
        }
    }
    if h_class == SpectralClass::Unknown && star.teff > ORDINARY_CLASS_MAP[0].0 {
        h_class = SpectralClass::O;
        subclass = 2;
    }

    let luminosity_class = if star.evolution_phase == EvolutionPhase::PreMainSequence {
        LuminosityClass::V
    } else if star.evolution_phase == EvolutionPhase::MainSequence {
        LuminosityClass::V
    } else {
        compute_luminosity_class(star, hr)
    };

    SpectralType {
        h_class,
        subclass_int: subclass,
        luminosity_class,
        ..Default::default()
    }
}

fn classify_wolf_rayet(star: &Star) -> SpectralType {
    let h1 = star.surface.h1;
    let (map, class, mark) = if h1 >= 0.2 {
        (&MAP_WNXH, SpectralClass::WN, peculiarity::H)
    } else if h1 >= 0.1 {
        (&MAP_WN, SpectralClass::WN, peculiarity::NONE)
    } else if h1 > 0.05 {
        (&MAP_WC, SpectralClass::WC, peculiarity::NONE)
    } else {
        (&MAP_WO, SpectralClass::WO, peculiarity::NONE)
    };

    let mut subclass = classify_subclass(map, star.teff);
    if class == SpectralClass::WN && mark & peculiarity::H != 0 && subclass < 5 {
        subclass = 5;
    }
    if class == SpectralClass::WO && subclass > 4 {
        subclass = 4;
    }

    SpectralType {
        h_class: class,
        subclass_int: subclass,
        special_mark: mark,
        luminosity_class: LuminosityClass::Unknown,
        ..Default::default()
    }
}

fn classify_white_dwarf(star: &Star) -> SpectralType {
    let mut subclass = 50400.0 / star.teff.max(1.0);
    if subclass > 9.5 {
        subclass = 9.5;
    }
    let rounded = (subclass * 2.0).round() / 2.0;
    SpectralType {
        h_class: SpectralClass::D,
        subclass_int: rounded.trunc() as u8,
        subclass_decimal: (rounded.fract() * 10.0).round() as u8,
        ..Default::default()
    }
}

/// Luminosity class: mass-loss/mass hypergiant rule, super-luminous
/// hypergiant rule, then either an H-R diagram table lookup or a pure-luminosity
/// fallback when the B-V colour index or the table itself is unavailable.
pub fn compute_luminosity_class(star: &Star, hr: Option<&HrDiagramTable>) -> LuminosityClass {
    let mass_loss_rate_sol_per_year =
        star.stellar_wind_mass_loss_rate * crate::constants::YEAR_IN_SECONDS / crate::constants::SOLAR_MASS;
    if mass_loss_rate_sol_per_year > 1e-4 && star.mass >= 15.0 {
        return LuminosityClass::IaPlus;
    }
    if star.luminosity > 650_000.0 {
        return LuminosityClass::Zero;
    }

    let log_teff = star.teff.log10();
    let bv = if log_teff < 3.691 {
        -3.684 * log_teff + 14.551
    } else {
        0.344 * log_teff.powi(2) - 3.402 * log_teff + 8.037
    };

    if bv < -0.3 || bv > 1.836_363_636_363_636_2 || hr.is_none() {
        log::warn!(
            "B-V={bv:.3} outside the H-R diagram table range (or table unavailable); \
             falling back to pure-luminosity luminosity-class thresholds"
        );
        return pure_luminosity_fallback(star.luminosity, mass_loss_rate_sol_per_year, star.mass);
    }

    hr.unwrap().classify(bv, star.luminosity)
}

fn pure_luminosity_fallback(luminosity: f64, _mass_loss: f64, _mass: f64) -> LuminosityClass {
    if luminosity > 100_000.0 {
        LuminosityClass::Ia
    } else if luminosity > 50_000.0 {
        LuminosityClass::Iab
    } else if luminosity > 10_000.0 {
        LuminosityClass::Ib
    } else if luminosity > 1_000.0 {
        LuminosityClass::II
    } else if luminosity > 100.0 {
        LuminosityClass::III
    } else if luminosity > 10.0 {
        LuminosityClass::IV
    } else if luminosity > 0.05 {
        LuminosityClass::V
    } else {
        LuminosityClass::VI
    }
}

/// The `H-R Diagram.csv` table: B-V colour index -> luminosity boundaries for each
/// luminosity class.
#[derive(Debug, Clone)]
pub struct HrDiagramTable {
    /// `(B-V, [Ia, Ib, II, III, IV, V])`, sorted by B-V ascending.
    rows: Vec<(f64, [f64; 6])>,
}

impl HrDiagramTable {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<HrDiagramTable> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GenError::MissingAsset {
                path: path.display().to_string(),
            });
        }
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let expected = ["B-V", "Ia", "Ib", "II", "III", "IV", "V"];
        for column in expected {
            if !headers.iter().any(|h| h == column) {
                return Err(GenError::MissingColumn {
                    path: path.display().to_string(),
                    column: "B-V/Ia/Ib/II/III/IV/V",
                });
            }
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let values: Vec<f64> = record.iter().map(|s| s.parse().unwrap_or(f64::NAN)).collect();
            if values.len() < 7 {
                continue;
            }
            rows.push((values[0], [values[1], values[2], values[3], values[4], values[5], values[6]]));
        }
        rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        Ok(HrDiagramTable { rows })
    }

    /// Linear interpolation of the six boundary columns by B-V, then classification of
    /// `luminosity_sol` against the interpolated boundaries (mirrors the original
    /// engine's `CalcLuminosityClass` body).
    fn classify(&self, bv: f64, luminosity_sol: f64) -> LuminosityClass {
        if self.rows.is_empty() {
            return pure_luminosity_fallback(luminosity_sol, 0.0, 0.0);
        }
        let boundaries = self.interpolate(bv);

        if luminosity_sol > boundaries[0] {
            return LuminosityClass::Ia;
        }

        let closest_idx = (0..boundaries.len())
            .min_by(|&a, &b| {
                (boundaries[a] - luminosity_sol)
                    .abs()
                    .partial_cmp(&(boundaries[b] - luminosity_sol).abs())
                    .unwrap()
            })
            .unwrap_or(0);

        if luminosity_sol <= boundaries[0] && (closest_idx == 0 || closest_idx == 1) {
            LuminosityClass::Iab
        } else if luminosity_sol < boundaries[1] {
            match closest_idx {
                1 => LuminosityClass::Ib,
                2 => LuminosityClass::II,
                3 => LuminosityClass::III,
                4 => LuminosityClass::IV,
                _ => LuminosityClass::Unknown,
            }
        } else {
            LuminosityClass::Unknown
        }
    }

    fn interpolate(&self, bv: f64) -> [f64; 6] {
        if bv <= self.rows[0].0 {
            return self.rows[0].1;
        }
        if bv >= self.rows[self.rows.len() - 1].0 {
            return self.rows[self.rows.len() - 1].1;
        }
        for window in self.rows.windows(2) {
            let (lo_bv, lo) = window[0];
            let (hi_bv, hi) = window[1];
            if bv >= lo_bv && bv <= hi_bv {
                let t = if (hi_bv - lo_bv).abs() < f64::EPSILON {
                    0.0
                } else {
                    (bv - lo_bv) / (hi_bv - lo_bv)
                };
                let mut out = [0.0; 6];
                for i in 0..6 {
                    out[i] = lo[i] + t * (hi[i] - lo[i]);
                }
                return out;
            }
        }
        self.rows[self.rows.len() - 1].1
    }
}

/// Lazily-loaded, shareable handle to the H-R diagram table.
pub type SharedHrDiagram = Arc<HrDiagramTable>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ordinary_class() {
        let spectral = SpectralType {
            h_class: SpectralClass::G,
            subclass_int: 2,
            luminosity_class: LuminosityClass::V,
            ..Default::default()
        };
        let class = StellarClass::pack(StarType::Normal, spectral);
        let s = class.to_string();
        assert_eq!(s, "G2V");
        let parsed: StellarClass = s.parse().unwrap();
        assert_eq!(parsed.bits(), class.bits());
    }

    #[test]
    fn round_trips_white_dwarf() {
        let spectral = SpectralType {
            h_class: SpectralClass::D,
            subclass_int: 7,
            subclass_decimal: 5,
            ..Default::default()
        };
        let class = StellarClass::pack(StarType::WhiteDwarf, spectral);
        let s = class.to_string();
        assert_eq!(s, "D7.5");
        let parsed: StellarClass = s.parse().unwrap();
        assert_eq!(parsed.bits(), class.bits());
    }

    #[test]
    fn round_trips_remnants() {
        let ns = StellarClass::pack(StarType::NeutronStar, SpectralType::default());
        assert_eq!(ns.to_string(), "Q");
        let parsed: StellarClass = "Q".parse().unwrap();
        assert_eq!(parsed.bits(), ns.bits());

        let bh = StellarClass::pack(StarType::BlackHole, SpectralType::default());
        assert_eq!(bh.to_string(), "X");
        let parsed: StellarClass = "X".parse().unwrap();
        assert_eq!(parsed.bits(), bh.bits());
    }

    #[test]
    fn wr_promotion_respects_clamps() {
        let map_wn = classify_subclass(&MAP_WNXH, 60000.0);
        assert!(map_wn <= 10);
        let wo = classify_subclass(&MAP_WO, 50000.0);
        assert!(wo <= 5);
    }

    #[test]
    fn classify_subclass_monotonic_bounds() {
        assert_eq!(classify_subclass(&MAP_O, 54000.0), 2);
        assert_eq!(classify_subclass(&MAP_B, 9900.0), 10);
    }
}
