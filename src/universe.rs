//! Universe orchestrator: the `fillUniverse` entry point that ties together
//! worker seeding, stellar generation, octree slot placement, and binary-companion
//! synthesis into one population of [`StellarSystem`]s.

use crate::config::{GeneratorLimits, UniverseConfig};
use crate::error::Result;
use crate::mist::MistStore;
use crate::octree::{self, SamplerParams};
use crate::pool::ThreadPool;
use crate::random::{spawn_sub_engine, Engine};
use crate::stellar::{GenOption, PrimaryParameters, Star};
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A slot in space holding one or two gravitationally bound stars.
#[derive(Debug, Clone)]
pub struct StellarSystem {
    pub position: [f64; 3],
    pub normal: crate::stellar::Normal2,
    /// Rank by distance from the origin, 1-indexed; rank 1 is always the home system.
    pub distance_rank: usize,
    pub name: String,
    pub stars: Vec<Star>,
}

/// A fully synthesized population, ready for naming/placement.
pub struct Universe {
    pub systems: Vec<StellarSystem>,
}

/// One category of extra star alongside its worker-generator limits and `GenOption`.
struct Category {
    count: usize,
    limits: GeneratorLimits,
    gen_option: GenOption,
}

impl Universe {
    /// Runs the full nine-step population algorithm:
    ///
    /// 1. Seed a root engine from `config.seed`.
    /// 2. Sub-seed one worker engine per extra category plus the ordinary remainder.
    /// 3. Sample basic properties (mass/age/feH) for every star, category by category.
    /// 4. Interpolate every star's full physical state in parallel chunks.
    /// 5. Build the octree and derive exactly `config.star_count` placement slots.
    /// 6. Shuffle stars onto slots; the home slot receives the first primary star.
    /// 7. Reset the home system's position/normal to the origin.
    /// 8. Generate binary companions for any primary flagged `BinaryCompanion`-eligible.
    /// 9. Rank systems by distance from the origin and assign `SYSTEM-<rank>` /
    ///    `STAR-<rank> A/B` names.
    pub fn fill(config: &UniverseConfig) -> Result<Universe> {
        let pool = match config.thread_count {
            Some(n) => ThreadPool::new(n),
            None => ThreadPool::sized_to_physical_cores(),
        };

        let mist = MistStore::load(&config.mist_root)?;
        let mut root_engine = Engine::seed_from_u64(config.seed);

        let categories = build_categories(config);
        let ordinary_count = config
            .star_count
            .saturating_sub(categories.iter().map(|c| c.count).sum());

        let mut primaries: Vec<(PrimaryParameters, bool)> = Vec::with_capacity(config.star_count);
        let mut worker_index: u64 = 0;

        log::info!("basic-properties: sampling primordials for {} stars", config.star_count);
        for category in &categories {
            let engine = spawn_sub_engine(&mut root_engine, worker_index);
            worker_index += 1;
            let sampled = sample_category(engine, &mist, *category_limits(category), category.gen_option, category.count)?;
            primaries.extend(sampled.into_iter().map(|p| (p, false)));
        }

        {
            let engine = spawn_sub_engine(&mut root_engine, worker_index);
            worker_index += 1;
            let limits = GeneratorLimits::ordinary(config.universe_age);
            let sampled = sample_category(engine, &mist, limits, GenOption::Normal, ordinary_count)?;
            // binary eligibility: every third ordinary star gets a companion, chosen by a fixed stride so the
            // count is a deterministic function of input size rather than another RNG draw.
            primaries.extend(sampled.into_iter().enumerate().map(|(i, p)| (p, i % 3 == 0)));
        }

        log::info!("basic-properties: sampled {} primordials", primaries.len());

        let chunk_count = pool_chunk_count(&pool, primaries.len());
        let mist_for_chunks = mist.clone();
        let universe_age = config.universe_age;
        let chunk_seed = config.seed;

        log::info!("interpolation: materialising stars across {chunk_count} chunks");
        let results = pool.map_chunked(primaries, chunk_count, move |(primary, wants_companion)| {
            let mist = mist_for_chunks.clone();
            let mut engine = Engine::seed_from_u64(chunk_seed ^ primary.age.to_bits() ^ primary.initial_mass.to_bits());
            generate_one(&mut engine, &mist, universe_age, primary, wants_companion)
        });

        let mut stars: Vec<Star> = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(mut produced) => stars.append(&mut produced),
                Err(source) => {
                    log::error!("interpolation failed at star index {index}: {source}");
                    return Err(crate::error::GenError::Stage {
                        stage: "interpolation",
                        index,
                        source: Box::new(source),
                    });
                }
            }
        }
        log::info!("interpolation: materialised {} stars", stars.len());

        let sample_engine = spawn_sub_engine(&mut root_engine, worker_index);
        log::info!("octree: placing {} systems", config.star_count);
        let systems = place_systems(stars, config, &pool, sample_engine)?;
        log::info!("binding: named and ranked {} systems", systems.len());

        Ok(Universe { systems })
    }
}

fn category_limits(category: &Category) -> &GeneratorLimits {
    &category.limits
}

fn build_categories(config: &UniverseConfig) -> Vec<Category> {
    let age = config.universe_age;
    vec![
        Category {
            count: config.giant_count,
            limits: GeneratorLimits::giant(age),
            gen_option: GenOption::Giant,
        },
        Category {
            count: config.massive_count,
            limits: GeneratorLimits::massive(age),
            gen_option: GenOption::Normal,
        },
        Category {
            count: config.neutron_star_count,
            limits: GeneratorLimits::neutron_star(age),
            gen_option: GenOption::DeathStar,
        },
        Category {
            count: config.black_hole_count,
            limits: GeneratorLimits::black_hole(age),
            gen_option: GenOption::DeathStar,
        },
        Category {
            count: config.merge_star_count,
            limits: GeneratorLimits::merge_star(age),
            gen_option: GenOption::MergeStar,
        },
    ]
}

fn sample_category(
    engine: Engine,
    mist: &MistStore,
    limits: GeneratorLimits,
    gen_option: GenOption,
    count: usize,
) -> Result<Vec<PrimaryParameters>> {
    let mut generator = crate::stellar::StellarGenerator::new(engine, limits, mist.clone(), gen_option);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(generator.generate_basic_properties()?);
    }
    Ok(out)
}

/// Materialises one star from its sampled primordials, then — if flagged eligible —
/// generates and materialises a bound companion.
/// Returns one or two stars. A failure here is a surface-level error: the
/// orchestrator wraps it in `GenError::Stage` and terminates rather than silently
/// dropping the star.
fn generate_one(
    engine: &mut Engine,
    mist: &MistStore,
    universe_age: f64,
    primary: PrimaryParameters,
    wants_companion: bool,
) -> Result<Vec<Star>> {
    let limits = GeneratorLimits::ordinary(universe_age);
    let mut generator = crate::stellar::StellarGenerator::new(engine.clone(), limits, mist.clone(), primary.gen_option);

    let primary_star = generator.generate_star(primary)?;

    if !wants_companion {
        return Ok(vec![primary_star]);
    }

    let lifetime_if_remnant = if primary_star.evolution_phase.is_remnant() {
        Some(primary_star.lifetime)
    } else {
        None
    };

    let companion_primary = generator.generate_companion(
        primary_star.mass,
        primary_star.primary.age,
        primary_star.primary.feh,
        lifetime_if_remnant,
    )?;

    let companion_star = generator.generate_star(companion_primary)?;
    Ok(vec![primary_star, companion_star])
}

fn pool_chunk_count(_pool: &ThreadPool, item_count: usize) -> usize {
    num_cpus::get_physical().min(item_count.max(1))
}

/// Groups flattened `(primary [, companion])` stars back into systems, assigns them to
/// octree slots, resets the home system, ranks by distance, and names everything.
fn place_systems(stars: Vec<Star>, config: &UniverseConfig, pool: &ThreadPool, mut engine: Engine) -> Result<Vec<StellarSystem>> {
    let grouped = group_into_systems(stars);

    let params = SamplerParams {
        sample_count: grouped.len(),
        min_distance: config.min_spacing_pc,
        density: config.density,
    };
    let tree = octree::sample(params, &mut engine, pool)?;

    let mut slots: Vec<[f64; 3]> = Vec::with_capacity(grouped.len());
    tree.traverse(|n| slots.extend(n.points.iter().copied()));

    let mut shuffled = grouped;
    shuffled.shuffle(&mut engine);

    let mut systems: Vec<StellarSystem> = shuffled
        .into_iter()
        .zip(slots.into_iter())
        .map(|(stars, position)| StellarSystem {
            position,
            normal: crate::stellar::Normal2::default(),
            distance_rank: 0,
            name: String::new(),
            stars,
        })
        .collect();

    if let Some(home) = systems.iter_mut().find(|s| s.position == [0.0, 0.0, 0.0]) {
        home.position = [0.0, 0.0, 0.0];
        home.normal = crate::stellar::Normal2::default();
    }

    systems.sort_by(|a, b| distance(a.position).partial_cmp(&distance(b.position)).unwrap());

    for (rank, system) in systems.iter_mut().enumerate() {
        let rank = rank + 1;
        system.distance_rank = rank;
        system.name = format!("SYSTEM-{rank}");
        // Heavier star takes the "A" suffix (binary-naming rule); lighter takes "B".
        if system.stars.len() == 2 && system.stars[0].mass < system.stars[1].mass {
            system.stars.swap(0, 1);
        }
    }

    Ok(systems)
}

fn distance(p: [f64; 3]) -> f64 {
    (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt()
}

/// Consumes the flattened per-primary star list and regroups it into systems of 1 or 2,
/// based on which stars were produced together by [`generate_one`]. Since `map_chunked`
/// loses that grouping boundary once flattened, this re-derives it by walking the list and
/// pairing any `BinaryCompanion` star with the star immediately preceding it.
fn group_into_systems(stars: Vec<Star>) -> Vec<Vec<Star>> {
    let mut systems = Vec::new();
    let mut iter = stars.into_iter().peekable();
    while let Some(star) = iter.next() {
        let mut system = vec![star];
        if let Some(next) = iter.peek() {
            if next.primary.gen_option == GenOption::BinaryCompanion {
                system.push(iter.next().unwrap());
            }
        }
        systems.push(system);
    }
    systems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_into_systems_pairs_companions_with_their_primary() {
        let primary = dummy_star(GenOption::Normal, 5.0);
        let companion = dummy_star(GenOption::BinaryCompanion, 2.0);
        let lone = dummy_star(GenOption::Normal, 1.0);
        let grouped = group_into_systems(vec![primary, companion, lone]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].len(), 2);
        assert_eq!(grouped[1].len(), 1);
    }

    #[test]
    fn distance_is_euclidean_norm() {
        assert_eq!(distance([3.0, 4.0, 0.0]), 5.0);
    }

    fn dummy_star(gen_option: GenOption, mass: f64) -> Star {
        use crate::stellar::classification::StellarClass;
        use crate::stellar::{EvolutionPhase, StarFrom, SurfaceComposition};

        Star {
            primary: PrimaryParameters {
                initial_mass: mass,
                age: 1.0,
                feh: 0.0,
                gen_option,
            },
            mass,
            radius: 1.0,
            luminosity: 1.0,
            teff: 5000.0,
            core_temp: 1e7,
            core_density: 1e5,
            stellar_wind_speed: 0.0,
            stellar_wind_mass_loss_rate: 0.0,
            surface: SurfaceComposition {
                h1: 0.7,
                z: 0.02,
                energetic_nuclide: 0.0,
                volatiles: 0.28,
            },
            lifetime: 1e10,
            evolution_progress: 0.5,
            evolution_phase: EvolutionPhase::MainSequence,
            star_from: StarFrom::Normal,
            stellar_class: StellarClass::pack(crate::stellar::classification::StarType::Normal, Default::default()),
            magnetic_field: 0.0,
            spin: 0.0,
            oblateness: 0.0,
            normal: crate::stellar::Normal2::default(),
            min_coil_mass: 0.0,
        }
    }
}
