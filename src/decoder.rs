// src/decoder.rs
//
// Distribution-focal-loss box decode: each box side is predicted as a
// softmax over `reg_max` discrete distance bins; the continuous distance
// is the distribution's expectation, in stride units.

/// Distances of the four box sides from the anchor center, in stride units,
/// plus the raw (un-activated) score logit of the row.
#[derive(Debug, Clone, Copy)]
pub struct SideDistances {
    pub l: f32,
    pub t: f32,
    pub r: f32,
    pub b: f32,
    pub score_logit: f32,
}

/// Decode one output row of `4 * reg_max` distribution logits followed by a
/// single score logit.
pub fn decode_row(row: &[f32], reg_max: usize) -> SideDistances {
    debug_assert_eq!(row.len(), 4 * reg_max + 1);

    SideDistances {
        l: expectation(&row[0..reg_max]),
        t: expectation(&row[reg_max..2 * reg_max]),
        r: expectation(&row[2 * reg_max..3 * reg_max]),
        b: expectation(&row[3 * reg_max..4 * reg_max]),
        score_logit: row[4 * reg_max],
    }
}

/// Softmax expectation over distance bins. The max is subtracted before
/// exponentiating to keep the sums finite for large logits.
fn expectation(bins: &[f32]) -> f32 {
    let max = bins.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let mut exp_sum = 0.0f32;
    let mut weighted = 0.0f32;
    for (i, &logit) in bins.iter().enumerate() {
        let e = (logit - max).exp();
        exp_sum += e;
        weighted += e * i as f32;
    }

    weighted / exp_sum
}

#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
