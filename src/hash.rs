//! Shard routing hash.

/// Multiplier of [`polynomial_hash`].
pub const HASH_SEED: u32 = 131;

/// Hashes a key into a `u32` for shard routing.
///
/// The hash is a polynomial rolling hash over the Unicode scalar values of the key, computed with
/// wrapping 32-bit arithmetic: `h = h * 131 + c` for each `char` `c`, starting from `0`. It is
/// stable across calls and processes, and spreads typical key sets evenly over the low bits used
/// for shard selection. It is not suitable for anything that requires collision resistance.
///
/// # Examples
///
/// ```
/// use sharded_map::polynomial_hash;
///
/// assert_eq!(polynomial_hash(""), 0);
/// assert_eq!(polynomial_hash("a"), 97);
/// assert_eq!(polynomial_hash("ab"), 97 * 131 + 98);
/// ```
#[inline]
#[must_use]
pub fn polynomial_hash(key: &str) -> u32 {
    key.chars().fold(0_u32, |hash, c| {
        hash.wrapping_mul(HASH_SEED).wrapping_add(u32::from(c))
    })
}

#[cfg(test)]
mod hash_test {
    use super::polynomial_hash;

    #[test]
    fn hash_wraps_around() {
        assert_eq!(polynomial_hash("hello world"), 1_310_283_332);
        assert_eq!(polynomial_hash("hello world"), polynomial_hash("hello world"));
    }

    #[test]
    fn hash_uses_code_points() {
        assert_eq!(polynomial_hash("日本"), 26085 * 131 + 26412);
    }

    #[test]
    fn hash_spreads_keys() {
        let mut buckets = [0_usize; 32];
        for i in 0..10_000 {
            buckets[(polynomial_hash(&format!("key-{i}")) & 31) as usize] += 1;
        }
        assert!(buckets.iter().all(|&n| n > 250 && n < 375), "{buckets:?}");
    }
}
