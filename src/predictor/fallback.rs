//! Rule-based steps used when the model cannot be asked or cannot be understood.
//!
//! The spans and noise level are fixed policy, not fitted parameters.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::trajectory::Coordinate;

/// Initial points are drawn from `[-INITIAL_SPAN, INITIAL_SPAN]` on each axis.
pub const INITIAL_SPAN: f64 = 10.0;
/// Standard deviation of the per-axis Gaussian noise added to an extrapolated step.
pub const NOISE_STD: f64 = 2.0;

pub const INITIAL_RATIONALE: &str = "randomly generated initial point";
pub const FALLBACK_INITIAL_RATIONALE: &str = "random initial point, fallback";
pub const FALLBACK_RATIONALE: &str = "simple rule-based fallback prediction";

pub fn initial_point<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    let x = rng.gen_range(-INITIAL_SPAN..=INITIAL_SPAN);
    let y = rng.gen_range(-INITIAL_SPAN..=INITIAL_SPAN);
    (x, y)
}

/// Repeats the last displacement plus noise, or draws a fresh point for walks under 2 points.
///
/// An extrapolation that overflows to infinity is replaced by a fresh draw.
pub fn fallback_step<R: Rng + ?Sized>(
    points: &[Coordinate],
    rng: &mut R,
) -> (f64, f64, &'static str) {
    let [.., prev, last] = points else {
        let (x, y) = initial_point(rng);
        return (x, y, FALLBACK_INITIAL_RATIONALE);
    };

    let dx = last.x - prev.x;
    let dy = last.y - prev.y;
    let nx: f64 = rng.sample::<f64, _>(StandardNormal) * NOISE_STD;
    let ny: f64 = rng.sample::<f64, _>(StandardNormal) * NOISE_STD;

    let (x, y) = (last.x + dx + nx, last.y + dy + ny);
    if !(x.is_finite() && y.is_finite()) {
        tracing::warn!(
            last_x = last.x,
            last_y = last.y,
            "extrapolation overflowed, drawing afresh"
        );
        let (x, y) = initial_point(rng);
        return (x, y, FALLBACK_INITIAL_RATIONALE);
    }
    (x, y, FALLBACK_RATIONALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pt(x: f64, y: f64) -> Coordinate {
        Coordinate {
            x,
            y,
            timestamp: "2025-01-01T00:00:00Z".into(),
            thought_process: None,
        }
    }

    #[test]
    fn initial_points_stay_in_box() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let (x, y) = initial_point(&mut rng);
            assert!((-10.0..=10.0).contains(&x) && (-10.0..=10.0).contains(&y));
        }
    }

    #[test]
    fn short_walk_falls_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(2);
        let (x, y, why) = fallback_step(&[pt(40.0, 40.0)], &mut rng);
        assert_eq!(why, FALLBACK_INITIAL_RATIONALE);
        assert!(x.abs() <= 10.0 && y.abs() <= 10.0);
    }

    #[test]
    fn same_seed_same_step() {
        let points = [pt(0.0, 0.0), pt(1.0, 2.0)];
        let a = fallback_step(&points, &mut StdRng::seed_from_u64(9));
        let b = fallback_step(&points, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn overflowing_extrapolation_stays_finite() {
        let points = [pt(-f64::MAX, 0.0), pt(f64::MAX, f64::MAX)];
        let mut rng = StdRng::seed_from_u64(4);
        let (x, y, why) = fallback_step(&points, &mut rng);
        assert_eq!(why, FALLBACK_INITIAL_RATIONALE);
        assert!(x.abs() <= 10.0 && y.abs() <= 10.0);
    }

    #[test]
    fn extrapolation_centers_on_repeated_displacement() {
        let points = [pt(5.0, 5.0), pt(0.0, 0.0), pt(3.0, -1.0)];
        let mut rng = StdRng::seed_from_u64(3);
        let trials = 4000;
        let (mut sx, mut sy) = (0.0, 0.0);
        for _ in 0..trials {
            let (x, y, why) = fallback_step(&points, &mut rng);
            assert_eq!(why, FALLBACK_RATIONALE);
            // 3 + |dx| + |dy| + 6 sigma is far outside any plausible draw
            assert!((x - 3.0).abs() <= 3.0 + 1.0 + 6.0 * NOISE_STD);
            assert!((y + 1.0).abs() <= 3.0 + 1.0 + 6.0 * NOISE_STD);
            sx += x;
            sy += y;
        }
        let (mx, my) = (sx / trials as f64, sy / trials as f64);
        assert!((mx - 6.0).abs() < 0.2, "mean x {mx}");
        assert!((my + 2.0).abs() < 0.2, "mean y {my}");
    }
}
