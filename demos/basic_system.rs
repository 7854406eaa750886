//! Generates a small population and prints a summary of the home system plus its
//! nearest neighbours.

use stellar_synth::{Universe, UniverseConfig};

fn main() {
    env_logger::init();

    let config = UniverseConfig {
        seed: 42,
        star_count: 200,
        mist_root: "Assets/Models/MIST".to_string(),
        ..UniverseConfig::default()
    };

    let universe = match Universe::fill(&config) {
        Ok(universe) => universe,
        Err(err) => {
            eprintln!("failed to generate universe: {err}");
            std::process::exit(1);
        }
    };

    for system in universe.systems.iter().take(5) {
        println!(
            "{} (rank {}) at [{:.2}, {:.2}, {:.2}] pc, {} star(s)",
            system.name,
            system.distance_rank,
            system.position[0],
            system.position[1],
            system.position[2],
            system.stars.len()
        );
        for star in &system.stars {
            println!(
                "  {:?}  M={:.3} Msun  R={:.3} Rsun  Teff={:.0} K  class={}",
                star.evolution_phase, star.mass, star.radius, star.teff, star.stellar_class
            );
        }
    }
}
