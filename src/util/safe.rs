//! Constant-time comparison for credentials.

use subtle::ConstantTimeEq;

/// Longest input, in bytes, that [`compare`] will look at.
pub const MAX_COMPARE_LEN: usize = 1 << 10;

/// Compare `expected` and `actual` without branching on their contents.
///
/// Returns `false` without reading either string when one of them exceeds
/// [`MAX_COMPARE_LEN`] bytes. On a length mismatch the work done still scales
/// with `actual` only.
pub fn compare(expected: &str, actual: &str) -> bool {
    if expected.len() > MAX_COMPARE_LEN || actual.len() > MAX_COMPARE_LEN {
        return false;
    }

    let same_len: bool = expected.len().ct_eq(&actual.len()).into();
    if !same_len {
        std::hint::black_box(xor_equal(actual.as_bytes(), actual.as_bytes()));
        return false;
    }

    xor_equal(expected.as_bytes(), actual.as_bytes())
}

fn xor_equal(expected: &[u8], actual: &[u8]) -> bool {
    let acc = expected
        .iter()
        .zip(actual)
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    acc.ct_eq(&0).into()
}
