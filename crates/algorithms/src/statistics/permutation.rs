//! Seeded permutation inference
//!
//! A 64-bit linear congruential generator (Knuth's MMIX constants) drives
//! Fisher–Yates shuffles. Results are reproducible for a fixed seed.

const MULTIPLIER: u64 = 6364136223846793005;
const INCREMENT: u64 = 1442695040888963407;

/// Small deterministic PRNG for permutation tests
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        let mut rng = Self { state: seed };
        // Decorrelate nearby seeds
        rng.next_u64();
        rng
    }

    /// Generator for sub-stream `stream` of `seed` (e.g. one per location)
    pub fn stream(seed: u64, stream: u64) -> Self {
        Self::new(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        self.state
    }

    /// Uniform in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in [0, bound)
    pub fn below(&mut self, bound: usize) -> usize {
        // High bits of an LCG are the well-mixed ones
        ((self.next_u64() >> 32) * bound as u64 >> 32) as usize
    }

    /// In-place Fisher–Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }

    /// Move a uniform random sample of `m` items to the front of `items`
    pub fn partial_shuffle<T>(&mut self, items: &mut [T], m: usize) {
        let n = items.len();
        for i in 0..m.min(n) {
            let j = i + self.below(n - i);
            items.swap(i, j);
        }
    }
}

/// Summary of a reference distribution built by permutation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermutationSummary {
    pub mean: f64,
    pub variance: f64,
    /// Pseudo p-value `(extreme + 1) / (permutations + 1)`, two-sided
    /// around the permutation mean
    pub pseudo_p: f64,
}

/// Summarize permuted statistics against an observed value
pub fn summarize(observed: f64, permuted: &[f64]) -> PermutationSummary {
    let m = permuted.len();
    if m == 0 {
        return PermutationSummary {
            mean: observed,
            variance: 0.0,
            pseudo_p: 1.0,
        };
    }
    let mean = permuted.iter().sum::<f64>() / m as f64;
    let variance = if m > 1 {
        permuted.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (m - 1) as f64
    } else {
        0.0
    };
    let dev = (observed - mean).abs();
    let extreme = permuted.iter().filter(|v| (*v - mean).abs() >= dev).count();
    PermutationSummary {
        mean,
        variance,
        pseudo_p: (extreme + 1) as f64 / (m + 1) as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reproducible() {
        let mut a = Lcg::new(42);
        let mut b = Lcg::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        assert_ne!(Lcg::stream(42, 1).next_u64(), Lcg::stream(42, 2).next_u64());
    }

    #[test]
    fn test_ranges() {
        let mut rng = Lcg::new(7);
        for _ in 0..1000 {
            let f = rng.next_f64();
            assert!((0.0..1.0).contains(&f));
            assert!(rng.below(5) < 5);
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = Lcg::new(1);
        let mut v: Vec<usize> = (0..50).collect();
        rng.shuffle(&mut v);
        let mut sorted = v.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(v, sorted);
    }

    #[test]
    fn test_shuffle_roughly_uniform() {
        let mut rng = Lcg::new(3);
        let mut first = [0usize; 4];
        for _ in 0..8000 {
            let mut v = [0, 1, 2, 3];
            rng.shuffle(&mut v);
            first[v[0]] += 1;
        }
        assert!(first.iter().all(|&c| (1700..2300).contains(&c)), "{:?}", first);
    }

    #[test]
    fn test_summarize() {
        let s = summarize(10.0, &[0.0, 1.0, -1.0, 0.0]);
        assert_eq!(s.mean, 0.0);
        assert_eq!(s.pseudo_p, 1.0 / 5.0);
        assert!(s.variance > 0.0);
        assert_eq!(summarize(1.0, &[]).pseudo_p, 1.0);
    }
}
