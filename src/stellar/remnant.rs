//! Remnant synthesis: the mass/feH-conditioned death table, white-dwarf and
//! neutron-star state lookups, and the neutron-star/black-hole merge branch.

use crate::interpolation::interpolate_rows_by_key;
use crate::mist::{wd_col, MistStore, WhiteDwarfAtmosphere};
use crate::random::{Engine, Sample, Uniform};
use crate::stellar::{EvolutionPhase, StarFrom};

/// Outcome of the death-table lookup: the remnant's evolutionary phase, how it got there,
/// and its mass (zero for an annihilated pair-instability remnant).
#[derive(Debug, Clone, Copy)]
pub struct RemnantOutcome {
    pub phase: EvolutionPhase,
    pub star_from: StarFrom,
    pub mass: f64,
}

fn carbon_oxygen_branch_mass(mass: f64) -> f64 {
    if mass < 7.9 {
        -1.2336e-4 * mass.powi(6) + 3.160e-3 * mass.powi(5) - 2.960e-2 * mass.powi(4)
            + 0.12350 * mass.powi(3)
            - 0.21550 * mass.powi(2)
            + 0.19022 * mass
            + 0.46575
    } else {
        1.301 + 0.008095 * mass
    }
}

/// The death table. Checks the pair-instability/photodisintegration rule
/// before the generic `M >= 40` black-hole rule — the ordering matters, since a star in
/// the pair-instability window would otherwise also satisfy the generic rule.
pub fn classify_remnant(initial_mass: f64, feh: f64) -> RemnantOutcome {
    if feh <= -2.0 && initial_mass >= 140.0 && initial_mass < 250.0 {
        return RemnantOutcome {
            phase: EvolutionPhase::Null,
            star_from: StarFrom::PairInstabilitySupernova,
            mass: 0.0,
        };
    }
    if feh <= -2.0 && initial_mass >= 250.0 {
        return RemnantOutcome {
            phase: EvolutionPhase::StellarBlackHole,
            star_from: StarFrom::Photodisintegration,
            mass: 0.5 * initial_mass,
        };
    }

    if initial_mass >= 40.0 {
        return RemnantOutcome {
            phase: EvolutionPhase::StellarBlackHole,
            star_from: StarFrom::RelativisticJetHypernova,
            mass: 0.5 * initial_mass,
        };
    }

    // Sub-branch overrides within the carbon-oxygen mass window.
    if (8.0..9.759).contains(&initial_mass) {
        return RemnantOutcome {
            phase: EvolutionPhase::OxygenNeonMagnesiumWhiteDwarf,
            star_from: StarFrom::EnvelopeDispersal,
            mass: carbon_oxygen_branch_mass(initial_mass),
        };
    }
    if (9.759..10.0).contains(&initial_mass) {
        return RemnantOutcome {
            phase: EvolutionPhase::NeutronStar,
            star_from: StarFrom::ElectronCaptureSupernova,
            mass: carbon_oxygen_branch_mass(initial_mass),
        };
    }

    if (0.075..0.5).contains(&initial_mass) {
        return RemnantOutcome {
            phase: EvolutionPhase::HeliumWhiteDwarf,
            star_from: StarFrom::SlowCoolDown,
            mass: (0.9795 - 0.393 * initial_mass) * initial_mass,
        };
    }
    if (0.5..10.0).contains(&initial_mass) {
        return RemnantOutcome {
            phase: EvolutionPhase::CarbonOxygenWhiteDwarf,
            star_from: StarFrom::EnvelopeDispersal,
            mass: carbon_oxygen_branch_mass(initial_mass),
        };
    }
    if (10.0..21.0).contains(&initial_mass) {
        return RemnantOutcome {
            phase: EvolutionPhase::NeutronStar,
            star_from: StarFrom::IronCoreCollapseSupernova,
            mass: 1.246 + 0.0136 * initial_mass,
        };
    }
    if (21.0..23.3537).contains(&initial_mass) {
        return RemnantOutcome {
            phase: EvolutionPhase::NeutronStar,
            star_from: StarFrom::IronCoreCollapseSupernova,
            mass: 10f64.powf(1.334 - 0.009987 * initial_mass),
        };
    }
    if (23.3537..33.75).contains(&initial_mass) {
        return RemnantOutcome {
            phase: EvolutionPhase::NeutronStar,
            star_from: StarFrom::IronCoreCollapseSupernova,
            mass: 12.1 - 0.763 * initial_mass + 0.0137 * initial_mass.powi(2),
        };
    }
    // 33.75 <= initial_mass < 40.0
    RemnantOutcome {
        phase: EvolutionPhase::NeutronStar,
        star_from: StarFrom::IronCoreCollapseSupernova,
        mass: 10f64.powf(0.882 + 0.0105 * initial_mass),
    }
}

/// Neutron-star/black-hole merge branch: on a successful `Bernoulli(p)`
/// draw, overwrite the remnant outcome with a merged product — mostly a neutron star,
/// rarely a black hole.
pub fn apply_merge_probability(engine: &mut Engine, outcome: RemnantOutcome, probability: f64) -> RemnantOutcome {
    if probability <= 0.0 {
        return outcome;
    }
    let coin = crate::random::Bernoulli::new(probability).expect("merge probability in [0, 1]");
    if !coin.sample(engine) {
        return outcome;
    }

    let becomes_black_hole = Uniform::new(0.0, 1.0).expect("valid bounds").sample(engine) < 0.114;
    if becomes_black_hole {
        let mass = Uniform::new(2.60, 2.76).expect("valid bounds").sample(engine);
        RemnantOutcome {
            phase: EvolutionPhase::StellarBlackHole,
            star_from: StarFrom::WhiteDwarfMerge,
            mass,
        }
    } else {
        let mass = Uniform::new(1.38, 2.18).expect("valid bounds").sample(engine);
        RemnantOutcome {
            phase: EvolutionPhase::NeutronStar,
            star_from: StarFrom::WhiteDwarfMerge,
            mass,
        }
    }
}

/// Physical state of a white dwarf (log-quantities match `living_col`-style naming used
/// elsewhere in this crate, but over the white-dwarf track's own five columns).
#[derive(Debug, Clone, Copy)]
pub struct WhiteDwarfState {
    pub log_r: f64,
    pub log_teff: f64,
    pub log_core_t: f64,
    pub log_core_rho: f64,
}

/// White-dwarf state lookup: interpolate the Thin and Thick tables at
/// `remnant_age` and blend by remnant mass; outside `[0.2, 1.3] M☉` the radius falls back
/// to an analytic fit and core temperatures are sentinel-minimal; once `remnant_age`
/// exceeds the track's own age, cool the temperature analytically.
pub fn white_dwarf_state(mist: &MistStore, remnant_mass: f64, remnant_age: f64) -> crate::error::Result<WhiteDwarfState> {
    let thin_masses = mist.available_wd_masses(WhiteDwarfAtmosphere::Thin)?;
    let bracket_mass = nearest_bracket_mass(&thin_masses, remnant_mass);
    let table = mist.wd_table(WhiteDwarfAtmosphere::Thin, bracket_mass)?;
    let row = interpolate_rows_by_key(&table, remnant_age, wd_col::AGE)?;

    let track_age = row[wd_col::AGE];
    let mut log_r = row[wd_col::LOG_R];
    let mut log_teff = row[wd_col::LOG_TEFF];
    let mut log_core_t = row[wd_col::LOG_CORE_T];
    let mut log_core_rho = row[wd_col::LOG_CORE_RHO];

    if !(0.2..=1.3).contains(&remnant_mass) {
        log_r = (0.0323 - 0.021384 * remnant_mass).log10();
        log_core_t = f64::MIN;
        log_core_rho = f64::MIN;
    }

    if remnant_age > track_age {
        let t1 = 10f64.powf(log_teff);
        let cooled = t1 * ((20.0 * track_age) / (remnant_age + 19.0 * track_age)).powf(7.0 / 4.0);
        log_teff = cooled.log10();
        log_core_t = f64::MIN;
    }

    Ok(WhiteDwarfState {
        log_r,
        log_teff,
        log_core_t,
        log_core_rho,
    })
}

fn nearest_bracket_mass(masses: &[f64], target: f64) -> f64 {
    masses
        .iter()
        .copied()
        .min_by(|a, b| (a - target).abs().partial_cmp(&(b - target).abs()).unwrap())
        .unwrap_or(target)
}

/// Neutron-star physical state: a three-segment analytic radius-mass
/// relation pivoting at 0.77711 and 2.0181 M☉, plus a cooling-law effective temperature.
/// `remnant_age` below 1e5 years is shifted up by 1e5 years before use, avoiding a
/// pre-main-sequence floor the cooling law isn't valid below.
pub fn neutron_star_state(remnant_mass: f64, remnant_age: f64) -> (f64, f64) {
    let age = if remnant_age < 1e5 { remnant_age + 1e5 } else { remnant_age };

    let radius_km = if remnant_mass <= 0.77711 {
        -4.783 + 2.565 / remnant_mass + 42.0 * remnant_mass - 55.4 * remnant_mass.powi(2)
            + 34.93 * remnant_mass.powi(3)
            - 8.4 * remnant_mass.powi(4)
    } else if remnant_mass <= 2.0181 {
        11.302 - 0.35184 * remnant_mass
    } else {
        -31951.1 + 63121.8 * remnant_mass - 46717.8 * remnant_mass.powi(2) + 15358.4 * remnant_mass.powi(3)
            - 1892.365 * remnant_mass.powi(4)
    };

    let radius_sol = radius_km * 1000.0 / crate::constants::SOLAR_RADIUS;
    let teff = 1.5e8 * ((age - 1e5) + 22000.0).powf(-0.5);
    (radius_sol.log10(), teff.log10())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_instability_checked_before_generic_black_hole_rule() {
        let outcome = classify_remnant(200.0, -3.0);
        assert_eq!(outcome.phase, EvolutionPhase::Null);
        assert_eq!(outcome.mass, 0.0);
    }

    #[test]
    fn low_feh_massive_star_photodisintegrates() {
        let outcome = classify_remnant(300.0, -3.0);
        assert_eq!(outcome.phase, EvolutionPhase::StellarBlackHole);
        assert_eq!(outcome.star_from, StarFrom::Photodisintegration);
    }

    #[test]
    fn one_solar_mass_becomes_carbon_oxygen_white_dwarf() {
        let outcome = classify_remnant(1.0, 0.0);
        assert_eq!(outcome.phase, EvolutionPhase::CarbonOxygenWhiteDwarf);
        assert!(outcome.mass > 0.0 && outcome.mass < 1.0);
    }

    #[test]
    fn electron_capture_sub_branch_overrides_generic_bracket() {
        let outcome = classify_remnant(9.8, 0.0);
        assert_eq!(outcome.phase, EvolutionPhase::NeutronStar);
        assert_eq!(outcome.star_from, StarFrom::ElectronCaptureSupernova);
    }

    #[test]
    fn neutron_star_radius_segments_are_continuous_in_order() {
        let (log_r_low, _) = neutron_star_state(0.7, 1e6);
        let (log_r_mid, _) = neutron_star_state(1.4, 1e6);
        assert!(log_r_low.is_finite());
        assert!(log_r_mid.is_finite());
    }
}
