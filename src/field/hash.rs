//! Index-addressable pseudo-random numbers.
//!
//! Integer-only so the WGSL copy in `simulate.wgsl` produces identical bits.

/// PCG output permutation of a single u32 state
pub fn pcg(v: u32) -> u32 {
    let state = v.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Hash of (particle index, tick, seed, stream)
pub fn hash(index: u32, tick: u32, seed: u32, stream: u32) -> u32 {
    let h = pcg(seed ^ pcg(stream));
    let h = pcg(h ^ tick);
    pcg(h ^ index)
}

/// Uniform value in [0, 1) from the top 24 bits of the hash
pub fn rand01(index: u32, tick: u32, seed: u32, stream: u32) -> f32 {
    (hash(index, tick, seed, stream) >> 8) as f32 / 16_777_216.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcg_reference_values() {
        assert_eq!(pcg(0), 129_708_002);
        assert_eq!(pcg(1), 2_831_084_092);
        assert_eq!(pcg(12345), 4_099_845_390);
    }

    #[test]
    fn test_hash_reference_values() {
        assert_eq!(hash(0, 0, 0, 0), 2_368_882_721);
        assert_eq!(hash(7, 3, 0x5eed, 1), 741_275_340);
        assert!((rand01(7, 3, 0x5eed, 1) - 0.172_591_57).abs() < 1e-6);
    }

    #[test]
    fn test_rand01_range_and_spread() {
        let mut sum = 0.0;
        let n = 10_000;
        for i in 0..n {
            let r = rand01(i, 42, 1, 0);
            assert!((0.0..1.0).contains(&r));
            sum += r;
        }
        let mean = sum / n as f32;
        assert!((mean - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_streams_are_independent() {
        assert_ne!(hash(5, 9, 1, 0), hash(5, 9, 1, 1));
        assert_ne!(hash(5, 9, 1, 0), hash(5, 10, 1, 0));
        assert_ne!(hash(5, 9, 1, 0), hash(6, 9, 1, 0));
    }
}
