// src/fusion.rs
//
// Merges candidate boxes across inference passes (and adjacent-cell
// duplicates within one pass): greedy clustering seeded by the
// highest-scoring remaining candidate, absorbing everything that overlaps
// the seed beyond the IoU threshold. Each cluster keeps the seed's
// geometry and the maximum member score.

use crate::types::FaceBox;
use tracing::debug;

/// IoU above which two candidates are treated as the same face. Tunable;
/// 0.4 merges TTA pairs reliably while keeping adjacent faces apart.
pub const FUSION_IOU_THRESHOLD: f32 = 0.4;

/// Collapse overlapping candidates to one box per face. Input lists from
/// all passes are concatenated by the caller; output is ordered by
/// descending score (cluster creation order).
pub fn fuse(mut candidates: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    if candidates.is_empty() {
        return candidates;
    }

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut fused: Vec<FaceBox> = Vec::new();
    let mut clustered = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if clustered[i] {
            continue;
        }
        clustered[i] = true;

        let seed = candidates[i];
        let mut max_score = seed.score;

        for j in (i + 1)..candidates.len() {
            if clustered[j] {
                continue;
            }
            if iou(&seed, &candidates[j]) > iou_threshold {
                clustered[j] = true;
                max_score = max_score.max(candidates[j].score);
            }
        }

        fused.push(FaceBox {
            score: max_score,
            ..seed
        });
    }

    if fused.len() < candidates.len() {
        debug!(
            "fused {} candidate(s) into {} face(s)",
            candidates.len(),
            fused.len()
        );
    }

    fused
}

pub(crate) fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = (a.x + a.w).min(b.x + b.w);
    let y1 = (a.y + a.h).min(b.y + b.h);

    let intersection = (x1 - x0).max(0.0) * (y1 - y0).max(0.0);
    let union = a.w * a.h + b.w * b.h - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
