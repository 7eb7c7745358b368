//! Arbitrary-precision modular-arithmetic primitives used by [`crate::field`]
//! and [`crate::keys`].
//!
//! A thin, named wrapper over `num-bigint`/`num-traits`/`num-integer`, in the
//! spirit of the reference implementation's `btcutils` package: rather than
//! sprinkling `BigInt` method calls through the field and curve code, the
//! modular operations get names that match the math they perform.

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};

/// `(x + y) mod m`
pub fn add_mod(x: &BigInt, y: &BigInt, m: &BigInt) -> BigInt {
    (x + y).mod_floor(m)
}

/// `(x - y) mod m`
pub fn sub_mod(x: &BigInt, y: &BigInt, m: &BigInt) -> BigInt {
    (x - y).mod_floor(m)
}

/// `(x * y) mod m`
pub fn mul_mod(x: &BigInt, y: &BigInt, m: &BigInt) -> BigInt {
    (x * y).mod_floor(m)
}

/// `x^e mod m`, `e` assumed non-negative.
pub fn pow_mod(x: &BigInt, e: &BigInt, m: &BigInt) -> BigInt {
    x.modpow(e, m)
}

/// Modular inverse of `x` mod the prime `p`, via Fermat's little theorem:
/// `x^(p-2) mod p`. Only valid when `p` is prime and `x` is not a multiple
/// of `p`.
pub fn inv_mod_prime(x: &BigInt, p: &BigInt) -> BigInt {
    pow_mod(x, &(p - BigInt::from(2)), p)
}

/// Parses a big-endian byte slice into an unsigned `BigInt`.
pub fn from_be_bytes(b: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, b)
}

/// Parses a little-endian byte slice into an unsigned `BigInt`.
pub fn from_le_bytes(b: &[u8]) -> BigInt {
    BigInt::from_bytes_le(Sign::Plus, b)
}

/// Serializes a non-negative `BigInt` into exactly `len` big-endian bytes,
/// left-padding with zeros (panics if the value does not fit).
pub fn to_be_bytes_padded(x: &BigInt, len: usize) -> Vec<u8> {
    let (_, mut raw) = x.to_bytes_be();
    assert!(raw.len() <= len, "value does not fit in {len} bytes");
    let mut out = vec![0u8; len - raw.len()];
    out.append(&mut raw);
    out
}

/// Serializes a non-negative `BigInt` into exactly `len` little-endian
/// bytes, right-padding with zeros (panics if the value does not fit).
pub fn to_le_bytes_padded(x: &BigInt, len: usize) -> Vec<u8> {
    let (_, raw) = x.to_bytes_le();
    assert!(raw.len() <= len, "value does not fit in {len} bytes");
    let mut out = raw;
    out.resize(len, 0);
    out
}

/// `true` iff `x` is even.
pub fn is_even(x: &BigInt) -> bool {
    x.is_even()
}

pub fn zero() -> BigInt {
    BigInt::zero()
}

pub fn one() -> BigInt {
    BigInt::one()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inv_mod_prime_is_multiplicative_inverse() {
        let p = BigInt::from(17);
        let x = BigInt::from(5);
        let inv = inv_mod_prime(&x, &p);
        assert_eq!(mul_mod(&x, &inv, &p), BigInt::one());
    }

    #[test]
    fn be_round_trip_padding() {
        let x = BigInt::from(300);
        let bytes = to_be_bytes_padded(&x, 4);
        assert_eq!(bytes, vec![0, 0, 1, 44]);
        assert_eq!(from_be_bytes(&bytes), x);
    }

    #[test]
    fn le_round_trip_padding() {
        let x = BigInt::from(300);
        let bytes = to_le_bytes_padded(&x, 4);
        assert_eq!(bytes, vec![44, 1, 0, 0]);
        assert_eq!(from_le_bytes(&bytes), x);
    }
}
