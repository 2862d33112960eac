// ---------------------------------------------------------------------------
// Sequence generators for fans
// ---------------------------------------------------------------------------

/// `first, first + step, ...` up to and including `last`
/// (within a hundredth of a step, so 0.05-degree fans land on their end).
pub fn linear(first: f64, step: f64, last: f64) -> Vec<f64> {
    if step == 0.0 || !step.is_finite() || (last - first) * step < 0.0 {
        return vec![first];
    }
    let n = ((last - first) / step + 0.01).floor() as usize + 1;
    (0..n).map(|k| first + k as f64 * step).collect()
}

/// `count` values growing geometrically by `ratio`.
pub fn log(first: f64, ratio: f64, count: usize) -> Vec<f64> {
    std::iter::successors(Some(first), |v| Some(v * ratio)).take(count).collect()
}
