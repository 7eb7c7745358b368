//! Finite field elements modulo an arbitrary prime, used to build the
//! secp256k1 curve coordinates in [`crate::curve`].

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::bigint;
use crate::error::{Error, Result};

/// An element of `Z/pZ`. Equality and arithmetic between elements of
/// different `prime`s is a precondition violation, reported as
/// [`Error::FieldDifferentModulus`] rather than a panic.
#[derive(Debug, Clone)]
pub struct FieldElement {
    num: BigInt,
    prime: BigInt,
}

impl FieldElement {
    /// Constructs `num mod prime` reduced into `[0, prime)`. Returns
    /// [`Error::FieldOutOfRange`] if `num` is negative or `>= prime`
    /// (mirrors the reference implementation's strict range check rather
    /// than silently reducing out-of-range input).
    pub fn new(num: BigInt, prime: BigInt) -> Result<Self> {
        if num.sign() == num_bigint::Sign::Minus || num >= prime {
            return Err(Error::FieldOutOfRange);
        }
        Ok(Self { num, prime })
    }

    pub fn num(&self) -> &BigInt {
        &self.num
    }

    pub fn prime(&self) -> &BigInt {
        &self.prime
    }

    fn check_same_field(&self, other: &Self) -> Result<()> {
        if self.prime != other.prime {
            return Err(Error::FieldDifferentModulus);
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_same_field(other)?;
        Ok(Self {
            num: bigint::add_mod(&self.num, &other.num, &self.prime),
            prime: self.prime.clone(),
        })
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_same_field(other)?;
        Ok(Self {
            num: bigint::sub_mod(&self.num, &other.num, &self.prime),
            prime: self.prime.clone(),
        })
    }

    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.check_same_field(other)?;
        Ok(Self {
            num: bigint::mul_mod(&self.num, &other.num, &self.prime),
            prime: self.prime.clone(),
        })
    }

    /// `self / other`, computed as `self * other^(p-2) mod p` per Fermat's
    /// little theorem.
    pub fn div(&self, other: &Self) -> Result<Self> {
        self.check_same_field(other)?;
        let inv = bigint::inv_mod_prime(&other.num, &self.prime);
        Ok(Self {
            num: bigint::mul_mod(&self.num, &inv, &self.prime),
            prime: self.prime.clone(),
        })
    }

    /// `self^exponent`, with the exponent first reduced modulo `p - 1`
    /// (Fermat), so negative exponents are accepted.
    pub fn pow(&self, exponent: &BigInt) -> Self {
        let reduced = exponent.mod_floor(&(&self.prime - BigInt::one()));
        Self {
            num: bigint::pow_mod(&self.num, &reduced, &self.prime),
            prime: self.prime.clone(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }
}

impl PartialEq for FieldElement {
    fn eq(&self, other: &Self) -> bool {
        self.num == other.num && self.prime == other.prime
    }
}
impl Eq for FieldElement {}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement_{}({})", self.prime, self.num)
    }
}

macro_rules! impl_op_via_method {
    ($trait:ident, $method:ident, $inherent:ident) => {
        impl $trait for &FieldElement {
            type Output = Result<FieldElement>;
            fn $method(self, rhs: Self) -> Self::Output {
                FieldElement::$inherent(self, rhs)
            }
        }
    };
}

impl_op_via_method!(Add, add, add);
impl_op_via_method!(Sub, sub, sub);
impl_op_via_method!(Mul, mul, mul);
impl_op_via_method!(Div, div, div);

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(num: i64, prime: i64) -> FieldElement {
        FieldElement::new(BigInt::from(num), BigInt::from(prime)).unwrap()
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(matches!(
            FieldElement::new(BigInt::from(13), BigInt::from(13)),
            Err(Error::FieldOutOfRange)
        ));
    }

    #[test]
    fn add_wraps_modulo_prime() {
        let a = fe(7, 13);
        let b = fe(12, 13);
        assert_eq!(a.add(&b).unwrap(), fe(6, 13));
    }

    #[test]
    fn mismatched_fields_rejected() {
        let a = fe(2, 13);
        let b = fe(2, 17);
        assert!(matches!(a.add(&b), Err(Error::FieldDifferentModulus)));
    }

    #[test]
    fn div_is_mul_by_inverse() {
        let a = fe(2, 19);
        let b = fe(7, 19);
        let q = a.div(&b).unwrap();
        assert_eq!(q.mul(&b).unwrap(), a);
    }

    #[test]
    fn pow_handles_negative_exponent() {
        let a = fe(7, 13);
        let inv = a.pow(&BigInt::from(-1));
        assert_eq!(a.mul(&inv).unwrap(), fe(1, 13));
    }
}
