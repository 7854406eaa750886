//! Magnetic field, spin, and oblateness.

use crate::constants::GRAVITATIONAL_CONSTANT;
use crate::random::{Bernoulli, Engine, LogUniform, Sample, Uniform};
use crate::stellar::classification::{peculiarity, SpectralClass, StarType};
use crate::stellar::{EvolutionPhase, Star};

/// Magnetic field sampler, dispatched on remnant type and (for ordinary stars) mass
/// bracket. Ordinary-star fields are drawn in Gauss and converted to Tesla;
/// white dwarfs, neutron stars, and black holes are already in Tesla/zero.
pub fn generate_magnetic_field(
    engine: &mut Engine,
    star_type: StarType,
    mass_sol: f64,
    age: f64,
    special_mark: &mut u64,
    h_class: SpectralClass,
    evolution_phase: EvolutionPhase,
) -> f64 {
    match star_type {
        StarType::Normal => {
            let gauss = if (0.075..0.33).contains(&mass_sol) {
                Uniform::new(500.0, 3000.0).expect("valid bounds").sample(engine)
            } else if (0.33..0.6).contains(&mass_sol) {
                Uniform::new(100.0, 1000.0).expect("valid bounds").sample(engine)
            } else if (0.6..1.5).contains(&mass_sol) {
                Uniform::new(1.0, 10.0).expect("valid bounds").sample(engine)
            } else if (1.5..20.0).contains(&mass_sol) {
                let is_ab_main_sequence = evolution_phase == EvolutionPhase::MainSequence
                    && matches!(h_class, SpectralClass::A | SpectralClass::B);
                if is_ab_main_sequence
                    && Bernoulli::new(0.15).expect("valid probability").sample(engine)
                {
                    *special_mark |= peculiarity::P;
                    Uniform::new(1000.0, 10000.0).expect("valid bounds").sample(engine)
                } else {
                    Uniform::new(0.1, 1.0).expect("valid bounds").sample(engine)
                }
            } else {
                Uniform::new(100.0, 1000.0).expect("valid bounds").sample(engine)
            };
            gauss / 10000.0
        }
        StarType::WhiteDwarf => {
            let exponent = Uniform::new(0.5, 4.5).expect("valid bounds").sample(engine);
            10f64.powf(exponent)
        }
        StarType::NeutronStar => {
            let b0 = Uniform::new(1e9, 1e11).expect("valid bounds").sample(engine);
            b0 / ((0.034 * age / 1e4).powf(1.17) + 0.84)
        }
        StarType::BlackHole => 0.0,
    }
}

/// Spin sampler. Returns a period in seconds for ordinary stars, white
/// dwarfs, and neutron stars, or a dimensionless Kerr parameter for black holes.
pub fn generate_spin(engine: &mut Engine, star: &Star, star_type: StarType) -> f64 {
    match star_type {
        StarType::Normal => {
            let is_ap_bp = star.stellar_class.data().special_mark & peculiarity::P != 0;
            let base = if is_ap_bp {
                Uniform::new(1.0, 2.0).expect("valid bounds").sample(engine) * 10.0
            } else {
                Uniform::new(1.0, 2.0).expect("valid bounds").sample(engine)
            };

            let log_mass = star.mass.log10();
            let term1 = 10f64.powf(
                4.81438 + 0.27978 * log_mass.exp() - 1.21782 * log_mass + 0.21678 * log_mass.powi(2),
            );
            let term2 = if star.mass <= 1.4 {
                (star.radius / star.mass.powf(0.9)).powf(1.5)
            } else {
                (star.radius / (1.1062 * star.mass.powf(0.6))).powf(1.5)
            };
            let term3 = 2f64.powf((base * (star.primary.age + 1e6) / 1e9).sqrt());

            term1 * term2 * term3
        }
        StarType::WhiteDwarf => {
            let exponent = Uniform::new(3.0, 5.0).expect("valid bounds").sample(engine);
            10f64.powf(exponent)
        }
        StarType::NeutronStar => star.primary.age * 3.0 * 1e-9 + 1e-3,
        StarType::BlackHole => Uniform::new(0.001, 0.998).expect("valid bounds").sample(engine),
    }
}

/// `oblateness = 4*pi^2*R^3 / (spin^2 * G * M)`, computed for every non-black-hole star
///. `mass`/`radius` are in SI units.
pub fn oblateness(radius_m: f64, spin_seconds: f64, mass_kg: f64) -> f64 {
    4.0 * std::f64::consts::PI.powi(2) * radius_m.powi(3)
        / (spin_seconds.powi(2) * GRAVITATIONAL_CONSTANT * mass_kg)
}

/// Minimum mass, in kg, of a star-lifter's equatorial deflection coil able to withstand
/// this star's magnetic field and luminosity: the heavier of a coil-cooling-limited term
/// and a field-strength-limited term. `magnetic_field_tesla`/`luminosity_w`/`mass_kg` are
/// the star's own field, luminosity, and mass; `coil_temp_limit` and `dep_dm` are fixed
/// per generator from [`crate::config::GeneratorLimits`].
pub fn min_coil_mass(
    magnetic_field_tesla: f64,
    luminosity_w: f64,
    mass_kg: f64,
    coil_temp_limit: f64,
    dep_dm: f64,
) -> f64 {
    let cooling_limited = 6.6156e14
        * magnetic_field_tesla.powi(2)
        * luminosity_w.powf(1.5)
        * coil_temp_limit.powf(-6.0)
        / dep_dm;
    let field_limited = 2.34865e29
        * magnetic_field_tesla.powi(2)
        * luminosity_w.powi(2)
        * coil_temp_limit.powf(-8.0)
        / mass_kg;
    cooling_limited.max(field_limited)
}

/// Magnetic field, spin, and oblateness as one step (used by
/// [`crate::stellar::StellarGenerator`] after classification has already run).
pub fn finalize_rotation_and_field(engine: &mut Engine, star: &mut Star, star_type: StarType) {
    let mut special_mark = star.stellar_class.data().special_mark;
    star.magnetic_field = generate_magnetic_field(
        engine,
        star_type,
        star.mass,
        star.primary.age,
        &mut special_mark,
        star.stellar_class.data().h_class,
        star.evolution_phase,
    );
    if special_mark != star.stellar_class.data().special_mark {
        let mut data = star.stellar_class.data();
        data.special_mark = special_mark;
        star.stellar_class = crate::stellar::classification::StellarClass::pack(star.stellar_class.star_type, data);
    }

    star.spin = generate_spin(engine, star, star_type);

    star.oblateness = if star_type == StarType::BlackHole {
        f64::NAN
    } else {
        oblateness(
            star.radius * crate::constants::SOLAR_RADIUS,
            star.spin,
            star.mass * crate::constants::SOLAR_MASS,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::Engine as Rng;
    use rand::SeedableRng;

    #[test]
    fn black_hole_has_no_magnetic_field() {
        let mut engine = Rng::seed_from_u64(1);
        let mut mark = 0u64;
        let field = generate_magnetic_field(
            &mut engine,
            StarType::BlackHole,
            0.0,
            0.0,
            &mut mark,
            SpectralClass::Unknown,
            EvolutionPhase::StellarBlackHole,
        );
        assert_eq!(field, 0.0);
    }

    #[test]
    fn white_dwarf_field_is_positive_tesla() {
        let mut engine = Rng::seed_from_u64(2);
        let mut mark = 0u64;
        let field = generate_magnetic_field(
            &mut engine,
            StarType::WhiteDwarf,
            0.6,
            1e9,
            &mut mark,
            SpectralClass::D,
            EvolutionPhase::CarbonOxygenWhiteDwarf,
        );
        assert!(field > 0.0);
    }

    #[test]
    fn oblateness_is_positive_for_reasonable_inputs() {
        let o = oblateness(7e8, 2.5e6, 2e30);
        assert!(o > 0.0);
    }

    #[test]
    fn min_coil_mass_is_positive_and_picks_the_larger_term() {
        let m = min_coil_mass(1e-4, 3.828e26, 1.989e30, 1514.114, 2e6);
        assert!(m > 0.0);
        assert!(m.is_finite());
    }
}
