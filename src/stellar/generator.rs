//! `StellarGenerator`: sampling primordials and materialising stars.

use crate::constants::{GRAVITATIONAL_CONSTANT, SOLAR_LUMINOSITY, SOLAR_MASS, SOLAR_RADIUS, SOLAR_TEFF, YEAR_IN_SECONDS};
use crate::error::Result;
use crate::interpolation::{self, Evolution, PhaseChangeRow};
use crate::mist::{living_col, MistStore, FEH_PRESETS};
use crate::random::{rejection_sample, Engine, LogNormal, Normal, Sample, Uniform};
use crate::stellar::classification::{self, HrDiagramTable, StarType};
use crate::stellar::remnant::{self, RemnantOutcome};
use crate::stellar::spin;
use crate::stellar::{EvolutionPhase, GenOption, Normal2, PrimaryParameters, StarFrom, Star, SurfaceComposition};
use crate::config::{GeneratorLimits, SampleDistribution};
use std::sync::Arc;

fn mass_pdf(log_mass: f64, is_binary_primary: bool) -> f64 {
    let mass = 10f64.powf(log_mass);
    if !is_binary_primary {
        if mass <= 1.0 {
            0.158 * (-(log_mass + 1.0).powi(2) / 1.101128).exp()
        } else {
            0.06371598 * mass.powf(-0.65)
        }
    } else if mass <= 1.0 {
        0.086 * (-(log_mass + 0.657_577_34).powi(2) / 1.101128).exp()
    } else {
        0.058070157 * mass.powf(-0.65)
    }
}

fn mass_pdf_peak_log(is_binary_primary: bool) -> f64 {
    if is_binary_primary {
        -0.657_577_34
    } else {
        -1.0
    }
}

fn age_pdf(age_gyr: f64) -> f64 {
    if age_gyr < 8.0 {
        (age_gyr / 8.4).exp()
    } else {
        2.6 * (-0.5 * (age_gyr - 8.0).powi(2) / 1.5f64.powi(2)).exp()
    }
}

/// One worker's sampling context: an owned engine, configuration bounds, and a shared
/// handle to the MIST track grid.
pub struct StellarGenerator {
    engine: Engine,
    limits: GeneratorLimits,
    mist: MistStore,
    hr_diagram: Option<Arc<HrDiagramTable>>,
    gen_option: GenOption,
    is_binary_primary: bool,
    merge_probability: f64,
}

impl StellarGenerator {
    pub fn new(engine: Engine, limits: GeneratorLimits, mist: MistStore, gen_option: GenOption) -> Self {
        let hr_diagram_path = mist
            .root()
            .parent()
            .map(|p| p.join("H-R Diagram").join("H-R Diagram.csv"))
            .unwrap_or_else(|| mist.root().join("H-R Diagram.csv"));
        let hr_diagram = HrDiagramTable::load(hr_diagram_path).ok().map(Arc::new);
        StellarGenerator {
            engine,
            limits,
            mist,
            hr_diagram,
            gen_option,
            is_binary_primary: false,
            merge_probability: 0.0,
        }
    }

    pub fn with_binary_primary(mut self, is_binary_primary: bool) -> Self {
        self.is_binary_primary = is_binary_primary;
        self
    }

    pub fn with_merge_probability(mut self, probability: f64) -> Self {
        self.merge_probability = probability;
        self
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Samples one `PrimaryParameters` via rejection sampling over the mass, age, and feH
    /// distributions.
    pub fn generate_basic_properties(&mut self) -> Result<PrimaryParameters> {
        let initial_mass = self.generate_mass()?;
        let age = self.generate_age()?;
        let feh = self.generate_feh(age)?;
        Ok(PrimaryParameters {
            initial_mass,
            age,
            feh,
            gen_option: self.gen_option,
        })
    }

    fn generate_mass(&mut self) -> Result<f64> {
        // Mass-range-zero bypasses rejection entirely: used by the
        // `MergeStar` category, whose `GenOption` discards the mass anyway.
        if (self.limits.mass_upper - self.limits.mass_lower).abs() < f64::EPSILON {
            return Ok(self.limits.mass_lower);
        }

        if self.limits.mass_distribution == SampleDistribution::Uniform {
            return Ok(Uniform::new(self.limits.mass_lower, self.limits.mass_upper)?.sample(&mut self.engine));
        }

        let log_low = self.limits.mass_lower.log10();
        let log_high = self.limits.mass_upper.log10();
        let proposal = Uniform::new(log_low, log_high)?;

        let peak = mass_pdf_peak_log(self.is_binary_primary);
        let ceiling = if (log_low..=log_high).contains(&peak) {
            mass_pdf(peak, self.is_binary_primary)
        } else {
            mass_pdf(log_low, self.is_binary_primary).max(mass_pdf(log_high, self.is_binary_primary))
        };

        let log_mass = rejection_sample(&mut self.engine, &proposal, ceiling * 1.05, |x| {
            mass_pdf(x, self.is_binary_primary)
        });
        Ok(10f64.powf(log_mass))
    }

    fn generate_age(&mut self) -> Result<f64> {
        match self.limits.age_distribution {
            SampleDistribution::Uniform => {
                Ok(Uniform::new(self.limits.age_lower, self.limits.age_upper)?.sample(&mut self.engine))
            }
            SampleDistribution::UniformByExponent => {
                let log_low = self.limits.age_lower.log10();
                let log_high = self.limits.age_upper.log10();
                let log_age = Uniform::new(log_low, log_high)?.sample(&mut self.engine);
                Ok(10f64.powf(log_age))
            }
            SampleDistribution::FromPdf => {
                let shift_gyr = (self.limits.universe_age - 13.8e9) / 1e9;
                let proposal = Uniform::new(self.limits.age_lower, self.limits.age_upper)?;
                let age = rejection_sample(&mut self.engine, &proposal, 2.7, |age_years| {
                    age_pdf(age_years / 1e9 - shift_gyr)
                });
                Ok(age)
            }
        }
    }

    fn generate_feh(&mut self, age: f64) -> Result<f64> {
        let shift = self.limits.universe_age - 13.8e9;
        let bucket_floor = |gyr: f64| shift + gyr * 1e9;

        let old_bucket = age > bucket_floor(8.0);
        let (lower, upper) = if old_bucket {
            (-self.limits.feh_upper, -self.limits.feh_lower)
        } else {
            (self.limits.feh_lower, self.limits.feh_upper)
        };

        let mut feh;
        loop {
            feh = if old_bucket {
                LogNormal::new(-0.3, 0.5)?.sample(&mut self.engine)
            } else if age > bucket_floor(6.0) {
                Normal::new(-0.3, 0.15)?.sample(&mut self.engine)
            } else if age > bucket_floor(4.0) {
                Normal::new(-0.08, 0.12)?.sample(&mut self.engine)
            } else {
                Normal::new(0.05, 0.16)?.sample(&mut self.engine)
            };
            if feh >= lower && feh <= upper {
                break;
            }
        }

        if old_bucket {
            feh = -feh;
        }
        Ok(feh)
    }

    /// Samples a binary companion's primordials: mass
    /// from `Normal(log10(primary_mass), 0.25)` clamped to `[max(0.075, 0.1*M1), min(10*M1,
    /// 300)]`, age and feH inherited from the primary (age additionally reduced by the
    /// primary's lifetime when the primary is itself a remnant).
    pub fn generate_companion(
        &mut self,
        primary_mass: f64,
        primary_age: f64,
        primary_feh: f64,
        primary_lifetime_if_remnant: Option<f64>,
    ) -> Result<PrimaryParameters> {
        let lower = (0.075_f64).max(0.1 * primary_mass);
        let upper = (10.0 * primary_mass).min(300.0);
        let log_dist = Normal::new(primary_mass.log10(), 0.25)?;

        let mut mass;
        loop {
            mass = 10f64.powf(log_dist.sample(&mut self.engine));
            if mass >= lower && mass <= upper {
                break;
            }
        }

        let age = match primary_lifetime_if_remnant {
            Some(lifetime) => (primary_age - lifetime).max(0.0),
            None => primary_age,
        };

        Ok(PrimaryParameters {
            initial_mass: mass,
            age,
            feh: primary_feh,
            gen_option: GenOption::BinaryCompanion,
        })
    }

    fn snap_feh(feh: f64) -> f64 {
        *FEH_PRESETS
            .iter()
            .min_by(|a, b| (*a - feh).abs().partial_cmp(&(*b - feh).abs()).unwrap())
            .unwrap()
    }

    /// Materialises a `Star` from sampled primordials, dispatching on `gen_option`.
    /// `DeathStar`/`MergeStar` skip the evolution tables and go straight to
    /// remnant synthesis; `Normal`/`Giant` interpolate the MIST tracks and fall back to
    /// remnant synthesis on a `DeathStar` signal.
    pub fn generate_star(&mut self, primary: PrimaryParameters) -> Result<Star> {
        match primary.gen_option {
            GenOption::DeathStar | GenOption::MergeStar => self.build_remnant_star(primary, primary.age),
            GenOption::Giant => {
                let mut primary = primary;
                loop {
                    let target_age = 0.0_f64.max(self.lifetime_estimate(&primary) - 500_000.0);
                    match self.try_living_star(&primary, target_age)? {
                        Some(star) => return Ok(star),
                        None => {
                            primary = self.generate_basic_properties()?;
                        }
                    }
                }
            }
            GenOption::Normal | GenOption::BinaryCompanion => {
                match self.try_living_star(&primary, primary.age)? {
                    Some(star) => Ok(star),
                    None => self.build_remnant_star(primary, primary.age),
                }
            }
        }
    }

    fn lifetime_estimate(&mut self, primary: &PrimaryParameters) -> f64 {
        let feh = Self::snap_feh(primary.feh);
        match self.bracket_rows(feh, primary.initial_mass) {
            Ok((low, high, _)) => {
                let last = |rows: &Option<Vec<PhaseChangeRow>>| rows.as_ref().and_then(|r| r.last()).map(|r| r.age);
                last(&low).or_else(|| last(&high)).unwrap_or(primary.age)
            }
            Err(_) => primary.age,
        }
    }

    /// Attempts the living-star branch: returns `Ok(None)`
    /// on a *DeathStar* signal so the caller can hand off to remnant synthesis (or, for
    /// `Giant`, regenerate).
    fn try_living_star(&mut self, primary: &PrimaryParameters, target_age: f64) -> Result<Option<Star>> {
        let feh = Self::snap_feh(primary.feh);

        if primary.initial_mass < 0.1 {
            return Ok(Some(self.build_sub_brown_dwarf_scaling(primary, feh, target_age)?));
        }

        let (low, high, mass_frac) = self.bracket_rows(feh, primary.initial_mass)?;
        let evolution = interpolation::compute_evolution_progress(
            low.as_deref(),
            high.as_deref(),
            target_age,
            mass_frac,
        )?;

        let progress = match evolution {
            Evolution::DeathStar { .. } => return Ok(None),
            Evolution::Row(row) => row[0],
        };

        let table_low = self.mist.table(feh, self.bracket_masses(feh, primary.initial_mass)?.0)?;
        let table_high_mass = self.bracket_masses(feh, primary.initial_mass)?.1;
        let table_high = self.mist.table(feh, table_high_mass)?;

        let row_low = interpolation::interpolate_rows_by_key(&table_low, progress, living_col::X)
            .unwrap_or_else(|_| table_low.last_row().to_vec());
        let row_high = interpolation::interpolate_rows_by_key(&table_high, progress, living_col::X)
            .unwrap_or_else(|_| table_high.last_row().to_vec());

        let blended = if (table_low.path == table_high.path) || mass_frac.abs() < f64::EPSILON {
            row_low
        } else {
            interpolation::interpolate_aligned(&row_low, &row_high, mass_frac)?
        };

        let lifetime = self.lifetime_estimate(primary);
        Ok(Some(self.finish_star_from_row(primary, target_age, lifetime, &blended)?))
    }

    fn bracket_masses(&self, feh: f64, mass: f64) -> Result<(f64, f64)> {
        let masses = self.mist.available_masses(feh)?;
        if masses.is_empty() {
            return Ok((mass, mass));
        }
        if mass <= masses[0] {
            return Ok((masses[0], masses[0]));
        }
        if mass >= *masses.last().unwrap() {
            let last = *masses.last().unwrap();
            return Ok((last, last));
        }
        for window in masses.windows(2) {
            if window[0] <= mass && window[1] >= mass {
                return Ok((window[0], window[1]));
            }
        }
        Ok((mass, mass))
    }

    fn bracket_rows(
        &self,
        feh: f64,
        mass: f64,
    ) -> Result<(Option<Vec<PhaseChangeRow>>, Option<Vec<PhaseChangeRow>>, f64)> {
        let (low_mass, high_mass) = self.bracket_masses(feh, mass)?;
        let mass_frac = if (high_mass - low_mass).abs() < f64::EPSILON {
            0.0
        } else {
            (mass - low_mass) / (high_mass - low_mass)
        };

        let low_table = self.mist.table(feh, low_mass)?;
        let low_changes = self.mist.phase_changes(&low_table);
        let low_rows: Vec<PhaseChangeRow> = low_changes.rows(&low_table).iter().map(|&r| PhaseChangeRow::from_row(r)).collect();

        if (high_mass - low_mass).abs() < f64::EPSILON {
            return Ok((Some(low_rows), None, 0.0));
        }

        let high_table = self.mist.table(feh, high_mass)?;
        let high_changes = self.mist.phase_changes(&high_table);
        let high_rows: Vec<PhaseChangeRow> = high_changes.rows(&high_table).iter().map(|&r| PhaseChangeRow::from_row(r)).collect();

        Ok((Some(low_rows), Some(high_rows), mass_frac))
    }

    /// Sub-0.1 M☉ analytic scaling branch: phase-change times scale as
    /// `(M/0.1)^-1.3`, mass and mass-loss rate scale linearly, radius and luminosity scale
    /// as `(M/0.1)^2.3`, all relative to the 0.1 M☉ track.
    fn build_sub_brown_dwarf_scaling(&mut self, primary: &PrimaryParameters, feh: f64, target_age: f64) -> Result<Star> {
        let reference_table = self.mist.table(feh, 0.1)?;
        let scale_time = (primary.initial_mass / 0.1).powf(-1.3);
        let scaled_age = target_age / scale_time;

        let reference_changes = self.mist.phase_changes(&reference_table);
        let rows: Vec<PhaseChangeRow> = reference_changes.rows(&reference_table).iter().map(|&r| PhaseChangeRow::from_row(r)).collect();

        let evolution = interpolation::compute_evolution_progress(Some(&rows), None, scaled_age, 0.0)?;
        let progress = match evolution {
            Evolution::DeathStar { .. } => {
                return self.build_remnant_star(*primary, target_age);
            }
            Evolution::Row(row) => row[0],
        };

        let row = interpolation::interpolate_rows_by_key(&reference_table, progress, living_col::X)?;
        let mass_scale = primary.initial_mass / 0.1;
        let size_scale = mass_scale.powf(2.3);

        let mut scaled = row.clone();
        scaled[living_col::MASS] = primary.initial_mass;
        scaled[living_col::MDOT] *= mass_scale;
        scaled[living_col::LOG_R] += size_scale.log10();
        scaled[living_col::LOG_TEFF] = row[living_col::LOG_TEFF];

        let reference_lifetime = rows.last().map(|r| r.age).unwrap_or(target_age) * scale_time;
        self.finish_star_from_row(primary, target_age, reference_lifetime, &scaled)
    }

    fn finish_star_from_row(&mut self, primary: &PrimaryParameters, age: f64, lifetime: f64, row: &[f64]) -> Result<Star> {
        let radius_sol = 10f64.powf(row[living_col::LOG_R]);
        let teff = 10f64.powf(row[living_col::LOG_TEFF]);
        let mass_sol = row[living_col::MASS];
        let luminosity_sol = radius_sol.powi(2) * (teff / SOLAR_TEFF).powi(4);
        let escape_velocity = (2.0 * GRAVITATIONAL_CONSTANT * mass_sol * SOLAR_MASS / (radius_sol * SOLAR_RADIUS)).sqrt();

        let lifetime = if lifetime > 0.0 { lifetime } else { age.max(1.0) };
        let life_progress = if lifetime > 0.0 { age / lifetime } else { 0.0 };
        let stellar_wind_speed = (3.0 - life_progress) * escape_velocity;

        let surface_h1 = row[living_col::SURFACE_H1];
        let surface_he3 = row[living_col::SURFACE_HE3];
        let surface_z = 10f64.powf(row[living_col::LOG_SURF_Z]);
        let surface_energetic_nuclide = 0.00002 * surface_h1 + surface_he3;
        let surface_volatiles = 1.0 - surface_z - surface_energetic_nuclide;

        let evolution_phase = phase_from_code(row[living_col::PHASE]);

        let mut star = Star {
            primary: *primary,
            mass: mass_sol,
            radius: radius_sol,
            luminosity: luminosity_sol,
            teff,
            core_temp: 10f64.powf(row[living_col::LOG_CORE_T]),
            core_density: 10f64.powf(row[living_col::LOG_CORE_RHO]) * 1000.0,
            stellar_wind_speed,
            stellar_wind_mass_loss_rate: -(row[living_col::MDOT] * SOLAR_MASS / YEAR_IN_SECONDS),
            surface: SurfaceComposition {
                h1: surface_h1,
                z: surface_z,
                energetic_nuclide: surface_energetic_nuclide,
                volatiles: surface_volatiles,
            },
            lifetime,
            evolution_progress: row[living_col::X],
            evolution_phase,
            star_from: StarFrom::Normal,
            stellar_class: classification::StellarClass::pack(StarType::Normal, Default::default()),
            magnetic_field: 0.0,
            spin: 0.0,
            oblateness: 0.0,
            normal: Normal2::default(),
            min_coil_mass: 0.0,
        };

        let spectral = classification::classify(&star, self.hr_diagram.as_deref());
        star.stellar_class = classification::StellarClass::pack(StarType::Normal, spectral);
        spin::finalize_rotation_and_field(&mut self.engine, &mut star, StarType::Normal);
        star.min_coil_mass = spin::min_coil_mass(
            star.magnetic_field,
            star.luminosity * SOLAR_LUMINOSITY,
            star.mass * SOLAR_MASS,
            self.limits.coil_temp_limit,
            self.limits.dep_dm,
        );

        Ok(star)
    }

    /// Remnant branch: classify via the death table, apply the optional
    /// merge probability, then synthesize WD/NS/BH physical state.
    fn build_remnant_star(&mut self, primary: PrimaryParameters, target_age: f64) -> Result<Star> {
        let mut outcome = remnant::classify_remnant(primary.initial_mass, primary.feh);
        if outcome.phase == EvolutionPhase::NeutronStar {
            outcome = remnant::apply_merge_probability(&mut self.engine, outcome, self.merge_probability);
        }

        let RemnantOutcome { phase, star_from, mass } = outcome;
        let remnant_age = (target_age - self.lifetime_for_remnant(&primary)).max(0.0);

        let (log_r, log_teff, log_core_t, log_core_rho, star_type) = match phase {
            EvolutionPhase::HeliumWhiteDwarf
            | EvolutionPhase::CarbonOxygenWhiteDwarf
            | EvolutionPhase::OxygenNeonMagnesiumWhiteDwarf => {
                let state = remnant::white_dwarf_state(&self.mist, mass, remnant_age)?;
                (state.log_r, state.log_teff, state.log_core_t, state.log_core_rho, StarType::WhiteDwarf)
            }
            EvolutionPhase::NeutronStar => {
                let (log_r, log_teff) = remnant::neutron_star_state(mass, remnant_age);
                (log_r, log_teff, f64::MIN, f64::MIN, StarType::NeutronStar)
            }
            _ => (f64::NAN, f64::NAN, f64::NAN, f64::NAN, StarType::BlackHole),
        };

        let radius_sol = if log_r.is_finite() { 10f64.powf(log_r) } else { f64::NAN };
        let teff = if log_teff.is_finite() { 10f64.powf(log_teff) } else { f64::NAN };
        let luminosity_sol = if radius_sol.is_finite() && teff.is_finite() {
            radius_sol.powi(2) * (teff / SOLAR_TEFF).powi(4)
        } else {
            f64::NAN
        };

        let mut star = Star {
            primary,
            mass,
            radius: radius_sol,
            luminosity: luminosity_sol,
            teff,
            core_temp: if log_core_t.is_finite() { 10f64.powf(log_core_t) } else { f64::NAN },
            core_density: if log_core_rho.is_finite() { 10f64.powf(log_core_rho) * 1000.0 } else { f64::NAN },
            stellar_wind_speed: 0.0,
            stellar_wind_mass_loss_rate: 0.0,
            surface: SurfaceComposition {
                h1: 0.0,
                z: 0.0,
                energetic_nuclide: 0.0,
                volatiles: if star_type == StarType::WhiteDwarf { 1.0 } else { f64::NAN },
            },
            lifetime: self.lifetime_for_remnant(&primary),
            evolution_progress: phase.remnant_code().unwrap_or(16.0),
            evolution_phase: phase,
            star_from,
            stellar_class: classification::StellarClass::pack(star_type, Default::default()),
            magnetic_field: 0.0,
            spin: 0.0,
            oblateness: 0.0,
            normal: Normal2::default(),
            min_coil_mass: 0.0,
        };

        let spectral = classification::classify(&star, self.hr_diagram.as_deref());
        star.stellar_class = classification::StellarClass::pack(star_type, spectral);
        spin::finalize_rotation_and_field(&mut self.engine, &mut star, star_type);
        star.min_coil_mass = spin::min_coil_mass(
            star.magnetic_field,
            star.luminosity * SOLAR_LUMINOSITY,
            star.mass * SOLAR_MASS,
            self.limits.coil_temp_limit,
            self.limits.dep_dm,
        );

        Ok(star)
    }

    fn lifetime_for_remnant(&mut self, primary: &PrimaryParameters) -> f64 {
        self.lifetime_estimate(primary)
    }
}

fn phase_from_code(code: f64) -> EvolutionPhase {
    let rounded = code.round() as i64;
    match rounded {
        -1 => EvolutionPhase::PreMainSequence,
        0 => EvolutionPhase::MainSequence,
        2 => EvolutionPhase::RedGiant,
        3 => EvolutionPhase::CoreHeliumBurning,
        4 => EvolutionPhase::EarlyAgb,
        5 => EvolutionPhase::ThermalPulseAgb,
        6 => EvolutionPhase::PostAgb,
        9 => EvolutionPhase::WolfRayet,
        _ => EvolutionPhase::MainSequence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mass_pdf_is_positive_across_both_regimes() {
        assert!(mass_pdf(-0.5, false) > 0.0);
        assert!(mass_pdf(0.5, false) > 0.0);
        assert!(mass_pdf(-0.5, true) > 0.0);
    }

    #[test]
    fn age_pdf_is_continuous_near_eight_gyr() {
        let just_below = age_pdf(7.999);
        let just_above = age_pdf(8.001);
        assert!((just_below - just_above).abs() < 0.01);
    }

    #[test]
    fn snap_feh_picks_nearest_preset() {
        assert_eq!(StellarGenerator::snap_feh(0.3), 0.5);
        assert_eq!(StellarGenerator::snap_feh(-0.2), 0.0);
        assert_eq!(StellarGenerator::snap_feh(-4.5), -4.0);
    }

    #[test]
    fn zero_width_mass_range_bypasses_rejection() {
        let mut limits = GeneratorLimits::merge_star(13.8e9);
        limits.mass_distribution = SampleDistribution::Uniform;
        assert_eq!(limits.mass_lower, 0.0);
        assert_eq!(limits.mass_upper, 0.0);
    }

    #[test]
    fn uniform_age_distribution_stays_in_raw_bounds() {
        let limits = GeneratorLimits::massive(13.8e9);
        assert_eq!(limits.age_distribution, SampleDistribution::Uniform);
        assert_eq!(limits.mass_distribution, SampleDistribution::Uniform);
    }
}
