//! MIST data store.
//!
//! Loads the pre-computed stellar-evolution track grid from disk: eight chemistry
//! directories for living stars plus two white-dwarf atmosphere directories, each holding
//! one CSV file per sampled mass. Tables and their phase-change caches are populated
//! lazily and guarded by a single readers–writer lock, matching the "readers run in
//! parallel, writers (first-time insertions) run exclusively" rule.

use crate::error::{GenError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Column layout for a living-star track.
pub mod living_col {
    pub const AGE: usize = 0;
    pub const MASS: usize = 1;
    pub const MDOT: usize = 2;
    pub const LOG_TEFF: usize = 3;
    pub const LOG_R: usize = 4;
    pub const LOG_SURF_Z: usize = 5;
    pub const SURFACE_H1: usize = 6;
    pub const SURFACE_HE3: usize = 7;
    pub const LOG_CORE_T: usize = 8;
    pub const LOG_CORE_RHO: usize = 9;
    pub const PHASE: usize = 10;
    pub const X: usize = 11;
    pub const COUNT: usize = 12;

    pub const HEADERS: [&str; COUNT] = [
        "star_age",
        "star_mass",
        "star_mdot",
        "log_Teff",
        "log_R",
        "log_surf_z",
        "surface_h1",
        "surface_he3",
        "log_center_T",
        "log_center_Rho",
        "phase",
        "x",
    ];
}

/// Column layout for a white-dwarf track.
pub mod wd_col {
    pub const AGE: usize = 0;
    pub const LOG_R: usize = 1;
    pub const LOG_TEFF: usize = 2;
    pub const LOG_CORE_T: usize = 3;
    pub const LOG_CORE_RHO: usize = 4;
    pub const COUNT: usize = 5;

    pub const HEADERS: [&str; COUNT] =
        ["star_age", "log_R", "log_Teff", "log_center_T", "log_center_Rho"];
}

/// The eight preset metallicity rows for living-star tracks.
pub const FEH_PRESETS: [f64; 8] = [-4.0, -3.0, -2.0, -1.5, -1.0, -0.5, 0.0, 0.5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhiteDwarfAtmosphere {
    Thin,
    Thick,
}

/// An immutable table of numeric rows, one per (metallicity, mass) track file, or one
/// per white-dwarf atmosphere/mass pair.
#[derive(Debug, Clone)]
pub struct MistTable {
    pub path: PathBuf,
    pub is_white_dwarf: bool,
    pub rows: Vec<Vec<f64>>,
}

impl MistTable {
    fn column_count(&self) -> usize {
        if self.is_white_dwarf {
            wd_col::COUNT
        } else {
            living_col::COUNT
        }
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_row(&self) -> &[f64] {
        &self.rows[self.rows.len() - 1]
    }

    fn load_csv(path: &Path, is_white_dwarf: bool) -> Result<MistTable> {
        if !path.exists() {
            log::error!("MIST track missing: {}", path.display());
            return Err(GenError::MissingAsset {
                path: path.display().to_string(),
            });
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let expected: &[&str] = if is_white_dwarf {
            &wd_col::HEADERS
        } else {
            &living_col::HEADERS
        };
        for &column in expected {
            if !headers.iter().any(|h| h == column) {
                log::error!("MIST track {} missing required column `{column}`", path.display());
                return Err(GenError::MissingColumn {
                    path: path.display().to_string(),
                    column,
                });
            }
        }

        let indices: Vec<usize> = expected
            .iter()
            .map(|&column| headers.iter().position(|h| h == column).unwrap())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row = Vec::with_capacity(expected.len());
            for &idx in &indices {
                let value: f64 = record
                    .get(idx)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(f64::NAN);
                row.push(value);
            }
            rows.push(row);
        }

        Ok(MistTable {
            path: path.to_path_buf(),
            is_white_dwarf,
            rows,
        })
    }
}

/// Rows of a table where `phase` changes, or where `x == 10` (end-of-life marker).
/// Cached per table after the first scan.
#[derive(Debug, Clone, Default)]
pub struct PhaseChangeList {
    pub indices: Vec<usize>,
}

impl PhaseChangeList {
    fn scan(table: &MistTable) -> PhaseChangeList {
        let mut indices = Vec::new();
        if table.is_white_dwarf || table.rows.is_empty() {
            return PhaseChangeList { indices };
        }
        let mut last_phase = table.rows[0][living_col::PHASE];
        indices.push(0);
        for (i, row) in table.rows.iter().enumerate().skip(1) {
            let phase = row[living_col::PHASE];
            let x = row[living_col::X];
            if phase != last_phase || x == 10.0 {
                indices.push(i);
                last_phase = phase;
            }
        }
        PhaseChangeList { indices }
    }

    pub fn rows<'a>(&self, table: &'a MistTable) -> Vec<&'a [f64]> {
        self.indices.iter().map(|&i| table.row(i)).collect()
    }
}

fn feh_dir_name(feh: f64) -> String {
    let sign = if feh >= 0.0 { '+' } else { '-' };
    format!("[Fe_H]={}{:.1}", sign, feh.abs())
}

/// `000.750` (solar masses) -> `"0007500Ms_track.csv"`.
fn mass_filename(mass: f64) -> String {
    let scaled = (mass * 1000.0).round() as i64;
    let int_part = scaled / 1000;
    let frac_part = scaled % 1000;
    format!("{:03}{:03}0Ms_track.csv", int_part, frac_part)
}

fn parse_mass_from_filename(name: &str) -> Option<f64> {
    let digits = name.strip_suffix("Ms_track.csv")?;
    if digits.len() != 7 {
        return None;
    }
    let (int_digits, rest) = digits.split_at(3);
    let frac_digits = &rest[..3];
    let int_part: i64 = int_digits.parse().ok()?;
    let frac_part: i64 = frac_digits.parse().ok()?;
    Some(int_part as f64 + frac_part as f64 / 1000.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Directory {
    Chemistry(i64), // feH * 10, to make it hashable
    WhiteDwarf(WhiteDwarfAtmosphere),
}

impl Directory {
    fn chemistry(feh: f64) -> Self {
        Directory::Chemistry((feh * 10.0).round() as i64)
    }

    fn path(&self, root: &Path) -> PathBuf {
        match self {
            Directory::Chemistry(tenths) => root.join(feh_dir_name(*tenths as f64 / 10.0)),
            Directory::WhiteDwarf(WhiteDwarfAtmosphere::Thin) => {
                root.join("WhiteDwarfs").join("Thin")
            }
            Directory::WhiteDwarf(WhiteDwarfAtmosphere::Thick) => {
                root.join("WhiteDwarfs").join("Thick")
            }
        }
    }

    fn is_white_dwarf(&self) -> bool {
        matches!(self, Directory::WhiteDwarf(_))
    }
}

type TableKey = (Directory, i64); // (directory, mass * 1000 rounded)

/// Shared, cached access to the MIST track grid. Cloneable handle (`Arc` internally) so
/// every worker generator in the pool can hold one without re-reading disk.
#[derive(Clone)]
pub struct MistStore {
    inner: Arc<MistStoreInner>,
}

struct MistStoreInner {
    root: PathBuf,
    masses: RwLock<HashMap<Directory, Arc<Vec<f64>>>>,
    tables: RwLock<HashMap<TableKey, Arc<MistTable>>>,
    phase_changes: RwLock<HashMap<PathBuf, Arc<PhaseChangeList>>>,
}

impl MistStore {
    /// Walk the ten preset directories and record each one's sorted mass list. Tables
    /// themselves are opened lazily on first [`MistStore::table`] call. A missing
    /// directory is fatal.
    pub fn load(root: impl AsRef<Path>) -> Result<MistStore> {
        let root = root.as_ref().to_path_buf();
        log::info!("loading MIST track grid from {}", root.display());
        let masses = RwLock::new(HashMap::new());

        let store = MistStore {
            inner: Arc::new(MistStoreInner {
                root,
                masses,
                tables: RwLock::new(HashMap::new()),
                phase_changes: RwLock::new(HashMap::new()),
            }),
        };

        for &feh in &FEH_PRESETS {
            store.load_directory_masses(Directory::chemistry(feh))?;
        }
        store.load_directory_masses(Directory::WhiteDwarf(WhiteDwarfAtmosphere::Thin))?;
        store.load_directory_masses(Directory::WhiteDwarf(WhiteDwarfAtmosphere::Thick))?;

        log::info!("MIST track grid loaded ({} directories)", FEH_PRESETS.len() + 2);
        Ok(store)
    }

    fn load_directory_masses(&self, dir: Directory) -> Result<()> {
        let path = dir.path(&self.inner.root);
        let entries = std::fs::read_dir(&path).map_err(|_| {
            log::error!("MIST directory missing: {}", path.display());
            GenError::MissingAsset {
                path: path.display().to_string(),
            }
        })?;

        let mut masses: Vec<f64> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter_map(|name| parse_mass_from_filename(&name))
            .collect();
        masses.sort_by(|a, b| a.partial_cmp(b).unwrap());

        self.inner
            .masses
            .write()
            .unwrap()
            .insert(dir, Arc::new(masses));
        Ok(())
    }

    /// Sorted masses available in a chemistry directory (solar masses).
    pub fn available_masses(&self, feh: f64) -> Result<Arc<Vec<f64>>> {
        let dir = Directory::chemistry(feh);
        self.masses_for(dir)
    }

    pub fn available_wd_masses(&self, atmosphere: WhiteDwarfAtmosphere) -> Result<Arc<Vec<f64>>> {
        self.masses_for(Directory::WhiteDwarf(atmosphere))
    }

    fn masses_for(&self, dir: Directory) -> Result<Arc<Vec<f64>>> {
        if let Some(masses) = self.inner.masses.read().unwrap().get(&dir) {
            return Ok(masses.clone());
        }
        self.load_directory_masses(dir)?;
        Ok(self.inner.masses.read().unwrap().get(&dir).unwrap().clone())
    }

    fn table_for(&self, dir: Directory, mass: f64) -> Result<Arc<MistTable>> {
        let key = (dir, (mass * 1000.0).round() as i64);

        if let Some(table) = self.inner.tables.read().unwrap().get(&key) {
            return Ok(table.clone());
        }

        let path = dir.path(&self.inner.root).join(mass_filename(mass));
        let table = Arc::new(MistTable::load_csv(&path, dir.is_white_dwarf())?);

        let mut tables = self.inner.tables.write().unwrap();
        let entry = tables.entry(key).or_insert_with(|| table.clone());
        Ok(entry.clone())
    }

    /// Cached table lookup for a living-star track at a given feH preset and mass.
    pub fn table(&self, feh: f64, mass: f64) -> Result<Arc<MistTable>> {
        self.table_for(Directory::chemistry(feh), mass)
    }

    pub fn wd_table(&self, atmosphere: WhiteDwarfAtmosphere, mass: f64) -> Result<Arc<MistTable>> {
        self.table_for(Directory::WhiteDwarf(atmosphere), mass)
    }

    /// Cached phase-change scan for a table (first call scans the table once), keyed by
    /// the table's source path so that a mass value shared across chemistry directories
    /// does not collide in the cache.
    pub fn phase_changes(&self, table: &Arc<MistTable>) -> Arc<PhaseChangeList> {
        if let Some(list) = self.inner.phase_changes.read().unwrap().get(&table.path) {
            return list.clone();
        }
        let list = Arc::new(PhaseChangeList::scan(table));
        self.inner
            .phase_changes
            .write()
            .unwrap()
            .insert(table.path.clone(), list.clone());
        list
    }

    /// The MIST root directory this store was loaded from.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn column_count(&self, is_white_dwarf: bool) -> usize {
        if is_white_dwarf {
            wd_col::COUNT
        } else {
            living_col::COUNT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mass_filename_round_trips() {
        let name = mass_filename(0.75);
        assert_eq!(name, "0007500Ms_track.csv");
        assert_eq!(parse_mass_from_filename(&name), Some(0.75));
    }

    #[test]
    fn feh_dir_name_has_explicit_sign() {
        assert_eq!(feh_dir_name(0.5), "[Fe_H]=+0.5");
        assert_eq!(feh_dir_name(-1.5), "[Fe_H]=-1.5");
        assert_eq!(feh_dir_name(0.0), "[Fe_H]=+0.0");
    }

    #[test]
    fn missing_root_is_fatal() {
        let err = MistStore::load("/nonexistent/mist/root");
        assert!(err.is_err());
    }
}
