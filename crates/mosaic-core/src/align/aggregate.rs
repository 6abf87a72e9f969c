use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tile::StitchAxis;

use super::engine::Measurement;

/// How multiple Z-sample measurements of one tile pair collapse into a
/// single result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationMode {
    /// Keep the measurement with the highest correlation score.
    #[default]
    BestScore,
    /// Average each shift component, weighted by correlation score.
    WeightedAverage,
}

/// Final aggregated shift record for one tile pair, the hand-off to
/// downstream position solving.
#[derive(Clone, Debug, Serialize)]
pub struct PairShift {
    pub a: String,
    pub b: String,
    pub axis: StitchAxis,
    pub dz: f64,
    pub dy: f64,
    pub dx: f64,
    pub score: f32,
}

/// Collapse measurements into at most one record per (a, b, axis) key.
///
/// Measurements already carry trim-corrected shifts, so the only remaining
/// conversion is axis-dependent: Y-axis pairs report `overlap_v - dy` (the
/// measured overlap extent along the stitching direction), X-axis pairs
/// report dy unchanged. For `WeightedAverage` the emitted score is the
/// unweighted mean score of the group; weights are scores clamped to zero,
/// falling back to a plain mean when no measurement scored above zero.
pub fn aggregate(
    measurements: &[Measurement],
    mode: AggregationMode,
    overlap_v: usize,
) -> Vec<PairShift> {
    let mut groups: BTreeMap<(&str, &str, StitchAxis), Vec<&Measurement>> = BTreeMap::new();
    for m in measurements {
        groups
            .entry((m.a.as_str(), m.b.as_str(), m.axis))
            .or_default()
            .push(m);
    }

    let mut results = Vec::with_capacity(groups.len());
    for ((a, b, axis), group) in groups {
        let (dz, mut dy, dx, score) = match mode {
            AggregationMode::BestScore => {
                let Some(best) = group.iter().max_by(|l, r| l.score.total_cmp(&r.score)) else {
                    continue;
                };
                (best.dz, best.dy, best.dx, best.score)
            }
            AggregationMode::WeightedAverage => {
                let n = group.len() as f64;
                let total_weight: f64 = group.iter().map(|m| m.score.max(0.0) as f64).sum();
                let component = |pick: fn(&Measurement) -> f64| -> f64 {
                    if total_weight > 0.0 {
                        group
                            .iter()
                            .map(|m| m.score.max(0.0) as f64 * pick(m))
                            .sum::<f64>()
                            / total_weight
                    } else {
                        group.iter().map(|m| pick(m)).sum::<f64>() / n
                    }
                };
                let mean_score = group.iter().map(|m| m.score as f64).sum::<f64>() / n;
                (
                    component(|m| m.dz),
                    component(|m| m.dy),
                    component(|m| m.dx),
                    mean_score as f32,
                )
            }
        };

        if axis == StitchAxis::Y {
            dy = overlap_v as f64 - dy;
        }

        results.push(PairShift {
            a: a.to_owned(),
            b: b.to_owned(),
            axis,
            dz,
            dy,
            dx,
            score,
        });
    }

    results
}
