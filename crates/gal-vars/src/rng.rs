pub(crate) fn next_random_u32(state: &mut u32) -> u32 {
    let mut next = state.wrapping_add(0x6d2b79f5);
    *state = next;
    next = (next ^ (next >> 15)).wrapping_mul(next | 1);
    next ^= next.wrapping_add((next ^ (next >> 7)).wrapping_mul(next | 61));
    next ^ (next >> 14)
}

/// Uniform float in `[0, 1)`.
pub(crate) fn next_random_unit(state: &mut u32) -> f64 {
    f64::from(next_random_u32(state)) / (f64::from(u32::MAX) + 1.0)
}

#[cfg(test)]
mod rng_tests {
    use super::*;

    #[test]
    fn next_random_unit_stays_in_range() {
        let mut state = 12345u32;
        for _ in 0..1000 {
            let value = next_random_unit(&mut state);
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn sequences_differ_by_seed() {
        let mut a = 1u32;
        let mut b = 2u32;
        assert_ne!(next_random_u32(&mut a), next_random_u32(&mut b));
    }
}
