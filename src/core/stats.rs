//! Robust summary statistics over sample slices.

/// Returns `(min, max)`, or `None` for an empty slice.
pub fn min_max(xs: &[f64]) -> Option<(f64, f64)> {
    let first = *xs.first()?;
    Some(
        xs.iter()
            .fold((first, first), |(lo, hi), &x| (lo.min(x), hi.max(x))),
    )
}

/// Median with the midpoint convention for even lengths. Empty input yields 0.
pub fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation around `center` (unscaled).
pub fn median_abs_deviation(xs: &[f64], center: f64) -> f64 {
    let dev: Vec<f64> = xs.iter().map(|&x| (x - center).abs()).collect();
    median(&dev)
}
