//! Per-ray random streams.
//!
//! Every traced ray draws from its own ChaCha8 stream, keyed by the batch seed
//! and the ray's index. Workers never share generator state, and a batch
//! produces the same rays whichever thread happens to trace each one.

use rand::{ Rng, SeedableRng };
use rand_chacha::ChaCha8Rng;

#[derive(Clone, Debug)]
pub struct RandomStream {
    rng: ChaCha8Rng,
}

impl RandomStream {
    pub fn new(seed: u64) -> RandomStream {
        RandomStream { rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    /// The stream for ray `index` of a batch seeded with `seed`.
    pub fn for_ray(seed: u64, index: u64) -> RandomStream {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(index);

        RandomStream { rng }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform draw in `[min, max)`.
    pub fn uniform_range(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.uniform()
    }

    /// Standard normal draw (polar Box-Muller).
    pub fn standard_normal(&mut self) -> f64 {
        loop {
            let x = 2.0 * self.uniform() - 1.0;
            let y = 2.0 * self.uniform() - 1.0;
            let r2 = x * x + y * y;

            if r2 > 0.0 && r2 < 1.0 {
                return x * (-2.0 * r2.ln() / r2).sqrt();
            }
        }
    }
}

/* Tests */

#[test]
fn same_seed_and_index_repeat() {
    let mut a = RandomStream::for_ray(7, 42);
    let mut b = RandomStream::for_ray(7, 42);

    for _ in 0..16 {
        assert_eq!(a.uniform(), b.uniform());
    }
}

#[test]
fn ray_streams_differ() {
    let mut a = RandomStream::for_ray(7, 0);
    let mut b = RandomStream::for_ray(7, 1);
    let xs: Vec<f64> = (0..8).map(|_| a.uniform()).collect();
    let ys: Vec<f64> = (0..8).map(|_| b.uniform()).collect();

    assert_ne!(xs, ys);
}

#[test]
fn uniform_stays_in_range() {
    let mut s = RandomStream::new(1);

    for _ in 0..1000 {
        let x = s.uniform();
        assert!((0.0..1.0).contains(&x));

        let y = s.uniform_range(-2.0, 3.0);
        assert!((-2.0..3.0).contains(&y));
    }
}

#[test]
fn normal_draws_have_unit_variance() {
    let mut s = RandomStream::new(3);
    let n = 20000;
    let draws: Vec<f64> = (0..n).map(|_| s.standard_normal()).collect();

    let mean = draws.iter().sum::<f64>() / n as f64;
    let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;

    approx::assert_abs_diff_eq!(mean, 0.0, epsilon = 0.05);
    approx::assert_abs_diff_eq!(var, 1.0, epsilon = 0.05);
}
