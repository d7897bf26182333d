//! Small deterministic sampling helpers shared by the factories.

use rand::Rng;
use rand::rngs::StdRng;

/// Pick an index according to a weight vector by walking the cumulative
/// distribution. Weights need not be normalized; validation upstream
/// guarantees a positive sum.
pub fn pick_weighted(rng: &mut StdRng, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    let mut target = rng.gen::<f64>() * total;
    for (idx, w) in weights.iter().enumerate() {
        target -= w;
        if target <= 0.0 {
            return idx;
        }
    }
    weights.len().saturating_sub(1)
}

/// Shifted geometric draw with the given mean, clamped to `[1, cap]`.
/// Used for records-per-soldier targets.
pub fn geometric_count(rng: &mut StdRng, mean: f64, cap: u32) -> u32 {
    let p = (1.0 / mean.max(1.0)).clamp(1e-6, 1.0);
    let u: f64 = rng.gen_range(f64::EPSILON..1.0);
    let draw = if p >= 1.0 {
        1.0
    } else {
        1.0 + (u.ln() / (1.0 - p).ln()).floor()
    };
    (draw as u32).clamp(1, cap.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_pick_weighted_respects_zero_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let idx = pick_weighted(&mut rng, &[0.0, 1.0, 0.0]);
            assert_eq!(idx, 1);
        }
    }

    #[test]
    fn test_pick_weighted_covers_support() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [false; 3];
        for _ in 0..500 {
            seen[pick_weighted(&mut rng, &[1.0, 2.0, 3.0])] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_geometric_count_stays_in_bounds_and_near_mean() {
        let mut rng = StdRng::seed_from_u64(13);
        let draws: Vec<u32> = (0..5_000).map(|_| geometric_count(&mut rng, 12.0, 64)).collect();
        assert!(draws.iter().all(|d| (1..=64).contains(d)));
        let mean = f64::from(draws.iter().sum::<u32>()) / draws.len() as f64;
        assert!((mean - 12.0).abs() < 1.5, "empirical mean {mean} too far from 12");
    }
}
