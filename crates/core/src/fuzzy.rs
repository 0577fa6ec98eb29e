//! Fuzzy shading: binary cloud mask to graded opacity
//!
//! Hard-edged binary clouds shade a collector all-or-nothing; real cumulus
//! has thin translucent fringes and dense cores. The generator layers
//! uniform partial-shading draws beneath the cut elevation: the deeper a
//! cell sits below the cut, the more layers it qualifies for and the larger
//! the draws it accumulates. The accumulated field is then min-max
//! normalized to [0, 1] and the unpopulated mask re-imposed.

use rand::rngs::StdRng;
use rand::Rng;

use crate::field::pattern::Pattern;

/// Grade the binary mask into continuous opacity.
///
/// For layer `i` of `num_layers`, cloud cells whose normalized elevation is
/// at or below `cut - (i + 1) * (cut / alpha)` accumulate a draw from
/// `[(i / L) * cut, ((i + 1) / L) * cut]`. `alpha >= num_layers` is enforced
/// by config validation, so the deepest threshold stays non-negative.
pub(crate) fn fuzzy_opacity(
    normalized: &Pattern,
    binary: &Pattern,
    cut: f64,
    num_layers: u32,
    alpha: f64,
    rng: &mut StdRng,
) -> Pattern {
    let size = normalized.size();
    let layers = f64::from(num_layers);
    let mut accumulator = vec![0.0_f64; size * size];

    for layer in 0..num_layers {
        let lower = f64::from(layer) / layers * cut;
        let upper = f64::from(layer + 1) / layers * cut;
        let threshold = cut - f64::from(layer + 1) * (cut / alpha);

        for (idx, (norm, mask)) in normalized
            .cells()
            .iter()
            .zip(binary.cells().iter())
            .enumerate()
        {
            let (Some(elevation), Some(mask)) = (norm, mask) else {
                continue;
            };
            if *mask == 0.0 && *elevation <= threshold {
                accumulator[idx] += if upper > lower {
                    rng.random_range(lower..upper)
                } else {
                    lower
                };
            }
        }
    }

    // Min-max normalize over populated cells; a degenerate uniform
    // accumulator is left as-is.
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for (idx, norm) in normalized.cells().iter().enumerate() {
        if norm.is_some() {
            min = min.min(accumulator[idx]);
            max = max.max(accumulator[idx]);
        }
    }
    let range = max - min;

    let cells = normalized
        .cells()
        .iter()
        .enumerate()
        .map(|(idx, norm)| {
            norm.map(|_| {
                if range > 0.0 {
                    (accumulator[idx] - min) / range
                } else {
                    accumulator[idx]
                }
            })
        })
        .collect();
    Pattern::new(size, cells)
}
