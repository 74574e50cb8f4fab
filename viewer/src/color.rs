//! Percentile-clipped linear color scale for auxiliary columns.

/// Percentiles bounding the color scale; values outside are clamped.
pub const CLIP_PERCENTILES: (f64, f64) = (0.3, 20.0);

/// Percentile `q` (0..=100) of already sorted values, interpolating linearly
/// between the two closest ranks.
pub fn percentile(sorted: &[f32], q: f64) -> Option<f32> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    let (a, b) = (sorted[lo] as f64, sorted[hi] as f64);
    Some((a + (b - a) * frac) as f32)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub low: f32,
    pub high: f32,
}

impl ColorScale {
    /// Scale spanning the clip percentiles of the finite values.
    pub fn clipped(values: &[f32]) -> Option<Self> {
        let mut finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
        finite.sort_by(f32::total_cmp);
        let low = percentile(&finite, CLIP_PERCENTILES.0)?;
        let high = percentile(&finite, CLIP_PERCENTILES.1)?;
        Some(Self { low, high })
    }

    /// Position of `v` on the scale in `[0, 1]`; missing values have none.
    pub fn normalize(&self, v: f32) -> Option<f32> {
        if !v.is_finite() {
            return None;
        }
        let span = self.high - self.low;
        if span <= 0.0 {
            return Some(if v > self.low { 1.0 } else { 0.0 });
        }
        Some(((v - self.low) / span).clamp(0.0, 1.0))
    }
}
