//! Interpolation kernels over MIST tracks.
//!
//! Three kernels, all linear: element-wise row blending, bracketed lookup by a key
//! column, and the evolution-progress kernel that reconciles two mass-bracketing tracks
//! across a phase discontinuity. The third kernel is where the *DeathStar* signal
//! originates — a tagged return value, never an exception.

use crate::error::{GenError, Result};
use crate::mist::{living_col, MistTable};

/// Result of evolving a star to a target age: either a blended evolution-track row, or a
/// signal that the target age is past the track's last row and the caller must hand off
/// to remnant synthesis.
#[derive(Debug, Clone)]
pub enum Evolution {
    Row(Vec<f64>),
    DeathStar { lifetime: f64 },
}

/// Element-wise `a + t*(b - a)`. Fails when the two rows are not the same length — a
/// programmer error, never a data-driven condition.
pub fn interpolate_aligned(a: &[f64], b: &[f64], t: f64) -> Result<Vec<f64>> {
    if a.len() != b.len() {
        return Err(GenError::SizeMismatch {
            lhs: a.len(),
            rhs: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| x + t * (y - x)).collect())
}

/// Locate the two rows of `table` bracketing `key` in `key_column` and linearly
/// interpolate between them.
///
/// Living-star tables treat the `phase` column specially: it is not blended — the
/// returned row's phase is forced to the lower bracket row's phase, since phase is a
/// discontinuous tag rather than a continuous quantity. White-dwarf tables
/// forbid extrapolation past the last row: once `key` exceeds it, both bracket rows
/// collapse to the last row and the oldest available remnant state is returned unchanged
///.
pub fn interpolate_rows_by_key(table: &MistTable, key: f64, key_column: usize) -> Result<Vec<f64>> {
    let rows = &table.rows;
    debug_assert!(!rows.is_empty());

    if table.is_white_dwarf && key > table.last_row()[key_column] {
        let last = table.last_row();
        return Ok(last.to_vec());
    }

    if key <= rows[0][key_column] {
        return Ok(rows[0].clone());
    }

    let mut lower = &rows[rows.len() - 1];
    let mut upper = &rows[rows.len() - 1];
    for window in rows.windows(2) {
        if window[0][key_column] <= key && window[1][key_column] >= key {
            lower = &window[0];
            upper = &window[1];
            break;
        }
    }

    let denom = upper[key_column] - lower[key_column];
    let t = if denom.abs() < f64::EPSILON {
        0.0
    } else {
        (key - lower[key_column]) / denom
    };

    let mut blended = interpolate_aligned(lower, upper, t)?;
    if !table.is_white_dwarf {
        blended[living_col::PHASE] = lower[living_col::PHASE];
    }
    Ok(blended)
}

/// One entry of a [`crate::mist::PhaseChangeList`], pulled out of its source row for the
/// evolution-progress kernel.
#[derive(Debug, Clone, Copy)]
pub struct PhaseChangeRow {
    pub age: f64,
    pub phase: f64,
    pub x: f64,
}

impl PhaseChangeRow {
    pub fn from_row(row: &[f64]) -> Self {
        PhaseChangeRow {
            age: row[living_col::AGE],
            phase: row[living_col::PHASE],
            x: row[living_col::X],
        }
    }
}

fn bracket(rows: &[PhaseChangeRow], target_age: f64) -> Option<(usize, usize)> {
    if rows.len() < 2 {
        return None;
    }
    for i in 0..rows.len() - 1 {
        if rows[i].age <= target_age && rows[i + 1].age >= target_age {
            return Some((i, i + 1));
        }
    }
    None
}

/// Align two phase-change lists of mismatched shape so that index-wise interpolation
/// across mass becomes meaningful. Trims the longer list's tail and
/// re-appends a synthesized tail row so the two end at a mutually consistent phase.
fn align(mut low: Vec<PhaseChangeRow>, mut high: Vec<PhaseChangeRow>) -> (Vec<PhaseChangeRow>, Vec<PhaseChangeRow>) {
    let low_last = low.last().copied();
    let high_last = high.last().copied();
    let (low_last, high_last) = match (low_last, high_last) {
        (Some(l), Some(h)) => (l, h),
        _ => return (low, high),
    };

    if low_last.phase == 9.0 && high_last.phase == 9.0 {
        // Both end as Wolf-Rayet: trim two tail rows and re-append the tails so the
        // shapes match without disturbing the WR endpoint.
        for side in [&mut low, &mut high] {
            if side.len() > 2 {
                let tail = side[side.len() - 1];
                side.truncate(side.len() - 2);
                side.push(tail);
            }
        }
        return (low, high);
    }

    if low_last.phase == 9.0 || high_last.phase == 9.0 {
        // One side ends in WR, the other doesn't: promote the shorter side's last row to
        // phase 9 if it is one row short, otherwise equalize both endpoints.
        if low.len() + 1 == high.len() {
            if let Some(last) = low.last_mut() {
                last.phase = 9.0;
            }
        } else if high.len() + 1 == low.len() {
            if let Some(last) = high.last_mut() {
                last.phase = 9.0;
            }
        } else {
            let target_phase = low_last.phase.max(high_last.phase);
            let target_x = low_last.x.max(high_last.x);
            if let Some(last) = low.last_mut() {
                last.phase = target_phase;
                last.x = target_x;
            }
            if let Some(last) = high.last_mut() {
                last.phase = target_phase;
                last.x = target_x;
            }
        }
        return (low, high);
    }

    // Disagreeing length or last phase with neither side at phase 9: shrink both to the
    // shorter length, keeping each side's own tail.
    let shorter = low.len().min(high.len());
    if low.len() != high.len() {
        let low_tail = low.last().copied();
        let high_tail = high.last().copied();
        low.truncate(shorter.saturating_sub(1));
        high.truncate(shorter.saturating_sub(1));
        if let Some(t) = low_tail {
            low.push(t);
        }
        if let Some(t) = high_tail {
            high.push(t);
        }
    }
    (low, high)
}

/// The hardest kernel: reconcile the evolutionary state of two mass-bracketing tracks (or
/// a single one, for masses below the lowest available file) at a target age, returning a
/// fractional "evolution progress" coordinate or a *DeathStar* signal.
pub fn compute_evolution_progress(
    low: Option<&[PhaseChangeRow]>,
    high: Option<&[PhaseChangeRow]>,
    target_age: f64,
    mass_frac: f64,
) -> Result<Evolution> {
    match (low, high) {
        (Some(rows), None) | (None, Some(rows)) => single_side_progress(rows, target_age),
        (Some(low), Some(high)) => {
            if low.len() == high.len()
                && low.len() >= 2
                && low[low.len() - 2].phase == high[high.len() - 2].phase
            {
                return blended_progress(low, high, target_age, mass_frac);
            }

            let (low_aligned, high_aligned) = align(low.to_vec(), high.to_vec());
            if low_aligned.len() == high_aligned.len() && low_aligned.len() >= 2 {
                blended_progress(&low_aligned, &high_aligned, target_age, mass_frac)
            } else {
                // Degenerate alignment: fall back to whichever side brackets the age,
                // preferring the heavier (high) side since its track is the one whose
                // phase boundaries the caller is already interpolating toward.
                single_side_progress(&high_aligned, target_age)
                    .or_else(|_| single_side_progress(&low_aligned, target_age))
            }
        }
        (None, None) => Err(GenError::InvalidDistribution(
            "compute_evolution_progress requires at least one bracketing track".to_string(),
        )),
    }
}

fn single_side_progress(rows: &[PhaseChangeRow], target_age: f64) -> Result<Evolution> {
    let last = *rows.last().expect("non-empty phase-change list");
    if target_age > last.age {
        return Ok(Evolution::DeathStar { lifetime: last.age });
    }
    match bracket(rows, target_age) {
        Some((i, j)) => {
            let lo = rows[i];
            let hi = rows[j];
            let t = if (hi.age - lo.age).abs() < f64::EPSILON {
                0.0
            } else {
                (target_age - lo.age) / (hi.age - lo.age)
            };
            Ok(snap_wolf_rayet(lo.phase + t, lo.phase, hi.phase))
        }
        None => Ok(Evolution::DeathStar { lifetime: last.age }),
    }
}

fn blended_progress(
    low: &[PhaseChangeRow],
    high: &[PhaseChangeRow],
    target_age: f64,
    mass_frac: f64,
) -> Result<Evolution> {
    let blended_ages: Vec<f64> = low
        .iter()
        .zip(high.iter())
        .map(|(l, h)| l.age + mass_frac * (h.age - l.age))
        .collect();

    let last_age = *blended_ages.last().unwrap();
    if target_age > last_age {
        return Ok(Evolution::DeathStar { lifetime: last_age });
    }

    for i in 0..blended_ages.len().saturating_sub(1) {
        let (lo_age, hi_age) = (blended_ages[i], blended_ages[i + 1]);
        if lo_age <= target_age && hi_age >= target_age {
            let t = if (hi_age - lo_age).abs() < f64::EPSILON {
                0.0
            } else {
                (target_age - lo_age) / (hi_age - lo_age)
            };
            let lo_phase = low[i].phase;
            let hi_phase = low[i + 1].phase;
            return Ok(snap_wolf_rayet(lo_phase + t, lo_phase, hi_phase));
        }
    }

    Ok(Evolution::DeathStar { lifetime: last_age })
}

/// If the final progress's fractional part exceeds 0.99 and the two phases bracketing it
/// are consistent with a Wolf-Rayet transition, snap progress to exactly 9.0.
fn snap_wolf_rayet(progress: f64, lo_phase: f64, hi_phase: f64) -> Evolution {
    let fract = progress.fract();
    if fract > 0.99 && (lo_phase.max(hi_phase) - progress.trunc()).abs() < 1.0 {
        Evolution::Row(vec![9.0])
    } else {
        Evolution::Row(vec![progress])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_rejects_unequal_length() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!(interpolate_aligned(&a, &b, 0.5).is_err());
    }

    #[test]
    fn aligned_blends_elementwise() {
        let a = vec![0.0, 10.0];
        let b = vec![2.0, 20.0];
        let row = interpolate_aligned(&a, &b, 0.5).unwrap();
        assert_eq!(row, vec![1.0, 15.0]);
    }

    #[test]
    fn single_side_raises_death_star_past_last_row() {
        let rows = vec![
            PhaseChangeRow { age: 0.0, phase: 0.0, x: 0.0 },
            PhaseChangeRow { age: 1.0e9, phase: 0.0, x: 10.0 },
        ];
        match single_side_progress(&rows, 2.0e9).unwrap() {
            Evolution::DeathStar { lifetime } => assert_eq!(lifetime, 1.0e9),
            Evolution::Row(_) => panic!("expected DeathStar"),
        }
    }

    #[test]
    fn single_side_interpolates_within_bracket() {
        let rows = vec![
            PhaseChangeRow { age: 0.0, phase: 0.0, x: 0.0 },
            PhaseChangeRow { age: 1.0e9, phase: 1.0, x: 10.0 },
        ];
        match single_side_progress(&rows, 5.0e8).unwrap() {
            Evolution::Row(row) => assert!((row[0] - 0.5).abs() < 1e-9),
            Evolution::DeathStar { .. } => panic!("expected Row"),
        }
    }
}
