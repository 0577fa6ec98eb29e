//! Coverage classifier: fractal field to binary cloud mask
//!
//! The raw elevation field is min-max normalized, then a bisection search
//! finds the cut elevation whose areal coverage (fraction of populated cells
//! at or below the cut) matches the requested target. Cells at or below the
//! cut are "cloud" (0), cells above are "clear" (1); unpopulated cells pass
//! through unchanged.
//!
//! The target is `2 x measured opaque sky cover`, clamped to 0.99. The
//! factor of two compensates for the softening the fuzzy shading layers
//! apply afterwards; it is an empirical calibration constant, not a physical
//! law.

use std::ops::Range;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::field::pattern::{CloudField, Pattern};

/// Half-width of the acceptable coverage band around the target.
pub const COVERAGE_TOLERANCE: f64 = 0.005;

/// Bisection iteration cap; past this the best cut found is accepted.
pub const MAX_BISECTION_ITERATIONS: u32 = 64;

/// Fewest populated window cells for which the coverage quantum
/// (`1 / cells`) still fits inside the tolerance band; a smaller window falls
/// back to whole-grid measurement.
pub const MIN_COVERAGE_CELLS: usize = 100;

/// Cell region coverage is measured over, `(rows, cols)`.
pub(crate) type CoverageWindow = (Range<usize>, Range<usize>);

/// Outcome of the bisection search for the cut elevation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutResult {
    /// Cut elevation on the normalized field, in [0, 1].
    pub cut: f64,
    /// Coverage fraction actually achieved at the cut.
    pub measured: f64,
    /// Bisection iterations spent.
    pub iterations: u32,
    /// Whether `measured` landed within tolerance of the target.
    pub converged: bool,
}

/// Coverage target from measured opaque sky cover: doubled to compensate
/// for fuzzy-layer softening, clamped to 0.99.
pub fn coverage_target(opaque_sky_cover: f64) -> f64 {
    (2.0 * opaque_sky_cover.clamp(0.0, 1.0)).min(0.99)
}

/// Rescale populated cells to [0, 1] with the field's current min and max.
/// A flat field normalizes to all zeros.
pub(crate) fn normalize(field: &CloudField) -> Pattern {
    let size = field.size();
    let Some((min, max)) = field.populated_min_max() else {
        return Pattern::new(size, vec![None; size * size]);
    };
    let range = max - min;
    let cells = field
        .cells()
        .par_iter()
        .map(|cell| {
            cell.map(|value| {
                if range > 0.0 {
                    (value - min) / range
                } else {
                    0.0
                }
            })
        })
        .collect();
    Pattern::new(size, cells)
}

fn in_window(window: &CoverageWindow, size: usize, idx: usize) -> bool {
    let (rows, cols) = window;
    rows.contains(&(idx / size)) && cols.contains(&(idx % size))
}

fn populated_in(normalized: &Pattern, window: &CoverageWindow) -> usize {
    let size = normalized.size();
    normalized
        .cells()
        .par_iter()
        .enumerate()
        .filter(|(idx, cell)| cell.is_some() && in_window(window, size, *idx))
        .count()
}

/// Fraction of populated window cells at or below the cut.
fn coverage_at(normalized: &Pattern, window: &CoverageWindow, cut: f64, populated: usize) -> f64 {
    let size = normalized.size();
    let covered = normalized
        .cells()
        .par_iter()
        .enumerate()
        .filter(|(idx, cell)| {
            matches!(cell, Some(value) if *value <= cut) && in_window(window, size, *idx)
        })
        .count();
    covered as f64 / populated as f64
}

/// Bisect for the cut elevation matching `target` coverage over `window`,
/// then write the binary mask for the whole grid. A window with fewer than
/// [`MIN_COVERAGE_CELLS`] populated cells is too quantized for the tolerance
/// band and coverage is measured over the whole grid instead.
/// Non-convergence keeps the best cut found and warns; it never halts the
/// simulation.
pub(crate) fn classify(
    normalized: &Pattern,
    window: &CoverageWindow,
    target: f64,
    tolerance: f64,
) -> (Pattern, CutResult) {
    let size = normalized.size();
    let mut region = window.clone();
    let mut populated = populated_in(normalized, &region);
    if populated < MIN_COVERAGE_CELLS {
        region = (0..size, 0..size);
        populated = populated_in(normalized, &region);
    }
    if populated == 0 {
        return (
            Pattern::new(size, vec![None; size * size]),
            CutResult {
                cut: 0.0,
                measured: 0.0,
                iterations: 0,
                converged: false,
            },
        );
    }

    let mut low = 0.0_f64;
    let mut high = 1.0_f64;
    let mut cut = 0.0_f64;
    let mut best = CutResult {
        cut,
        measured: 0.0,
        iterations: 0,
        converged: false,
    };
    let mut best_error = f64::INFINITY;
    let mut iterations = 0;

    loop {
        iterations += 1;
        let measured = coverage_at(normalized, &region, cut, populated);
        let error = (measured - target).abs();
        if error < best_error {
            best_error = error;
            best = CutResult {
                cut,
                measured,
                iterations,
                converged: false,
            };
        }
        if error <= tolerance {
            best.converged = true;
            best.iterations = iterations;
            break;
        }
        if iterations >= MAX_BISECTION_ITERATIONS {
            warn!(
                target_coverage = target,
                best_cut = best.cut,
                best_measured = best.measured,
                iterations,
                "coverage bisection did not converge; using best cut found"
            );
            best.iterations = iterations;
            break;
        }
        if measured > target {
            high = cut;
        } else {
            low = cut;
        }
        cut = (low + high) / 2.0;
    }

    let cut = best.cut;
    let cells = normalized
        .cells()
        .par_iter()
        .map(|cell| cell.map(|value| if value <= cut { 0.0 } else { 1.0 }))
        .collect();
    (Pattern::new(size, cells), best)
}
