//! secp256k1 elliptic curve: point representation, addition, and scalar
//! multiplication.

use std::sync::OnceLock;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::error::{Error, Result};
use crate::field::FieldElement;

/// A point on a short Weierstrass curve `y^2 = x^3 + a*x + b`, or the
/// identity. Tagged explicitly rather than represented with nullable
/// coordinates, so "is this infinity" is a match arm, not a null check.
#[derive(Debug, Clone)]
pub enum Point {
    Finite {
        x: FieldElement,
        y: FieldElement,
        a: FieldElement,
        b: FieldElement,
    },
    Infinity {
        a: FieldElement,
        b: FieldElement,
    },
}

impl Point {
    /// Constructs a finite point, checking it lies on the curve.
    pub fn new(x: FieldElement, y: FieldElement, a: FieldElement, b: FieldElement) -> Result<Self> {
        let lhs = y.mul(&y)?;
        let rhs = x.mul(&x)?.mul(&x)?.add(&a.mul(&x)?)?.add(&b)?;
        if lhs != rhs {
            return Err(Error::PointNotOnCurve);
        }
        Ok(Point::Finite { x, y, a, b })
    }

    pub fn infinity(a: FieldElement, b: FieldElement) -> Self {
        Point::Infinity { a, b }
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity { .. })
    }

    pub fn x(&self) -> Option<&FieldElement> {
        match self {
            Point::Finite { x, .. } => Some(x),
            Point::Infinity { .. } => None,
        }
    }

    pub fn y(&self) -> Option<&FieldElement> {
        match self {
            Point::Finite { y, .. } => Some(y),
            Point::Infinity { .. } => None,
        }
    }

    fn curve_params(&self) -> (&FieldElement, &FieldElement) {
        match self {
            Point::Finite { a, b, .. } => (a, b),
            Point::Infinity { a, b } => (a, b),
        }
    }

    fn same_curve(&self, other: &Self) -> Result<()> {
        let (a1, b1) = self.curve_params();
        let (a2, b2) = other.curve_params();
        if a1 != a2 || b1 != b2 {
            return Err(Error::PointsOnDifferentCurves);
        }
        Ok(())
    }

    /// Point addition implementing, in order: identity cases, the
    /// vertical-line (inverse) case, the tangent case (equal points), and
    /// the secant case (distinct x).
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.same_curve(other)?;

        let (a, b) = self.curve_params();
        let (a, b) = (a.clone(), b.clone());

        let (x1, y1) = match self {
            Point::Infinity { .. } => return Ok(other.clone()),
            Point::Finite { x, y, .. } => (x, y),
        };
        let (x2, y2) = match other {
            Point::Infinity { .. } => return Ok(self.clone()),
            Point::Finite { x, y, .. } => (x, y),
        };

        if x1 == x2 && (y1 != y2 || y1.is_zero()) {
            return Ok(Point::infinity(a, b));
        }

        let slope = if x1 == x2 {
            // Tangent: s = (3x1^2 + a) / (2y1)
            let three = FieldElement::new(BigInt::from(3), x1.prime().clone())?;
            let two = FieldElement::new(BigInt::from(2), x1.prime().clone())?;
            let num = three.mul(&x1.mul(x1)?)?.add(&a)?;
            let den = two.mul(y1)?;
            num.div(&den)?
        } else {
            // Secant: s = (y2 - y1) / (x2 - x1)
            y2.sub(y1)?.div(&x2.sub(x1)?)?
        };

        let x3 = slope.mul(&slope)?.sub(x1)?.sub(x2)?;
        let y3 = slope.mul(&x1.sub(&x3)?)?.sub(y1)?;

        Ok(Point::Finite { x: x3, y: y3, a, b })
    }

    /// Scalar multiplication via double-and-add, right-to-left bit scan,
    /// over a local copy of `coefficient`. `self` is consumed but never
    /// mutated in place — each loop iteration produces a fresh point.
    pub fn scalar_mul(&self, coefficient: &BigInt) -> Result<Self> {
        let (a, b) = self.curve_params();
        let mut coef = coefficient.clone();
        let mut current = self.clone();
        let mut result = Point::infinity(a.clone(), b.clone());

        while coef > BigInt::zero() {
            if &coef & BigInt::one() == BigInt::one() {
                result = result.add(&current)?;
            }
            current = current.add(&current)?;
            coef >>= 1;
        }

        Ok(result)
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Point::Infinity { a: a1, b: b1 }, Point::Infinity { a: a2, b: b2 }) => a1 == a2 && b1 == b2,
            (
                Point::Finite { x: x1, y: y1, a: a1, b: b1 },
                Point::Finite { x: x2, y: y2, a: a2, b: b2 },
            ) => x1 == x2 && y1 == y2 && a1 == a2 && b1 == b2,
            _ => false,
        }
    }
}
impl Eq for Point {}

/// secp256k1 domain parameters.
pub struct Secp256k1 {
    pub p: BigInt,
    pub a: BigInt,
    pub b: BigInt,
    pub n: BigInt,
    pub gx: BigInt,
    pub gy: BigInt,
}

impl Secp256k1 {
    pub fn g(&self) -> Point {
        let a = FieldElement::new(self.a.clone(), self.p.clone()).unwrap();
        let b = FieldElement::new(self.b.clone(), self.p.clone()).unwrap();
        let x = FieldElement::new(self.gx.clone(), self.p.clone()).unwrap();
        let y = FieldElement::new(self.gy.clone(), self.p.clone()).unwrap();
        Point::new(x, y, a, b).expect("generator point must lie on the curve")
    }

    pub fn curve_a(&self) -> FieldElement {
        FieldElement::new(self.a.clone(), self.p.clone()).unwrap()
    }

    pub fn curve_b(&self) -> FieldElement {
        FieldElement::new(self.b.clone(), self.p.clone()).unwrap()
    }

    pub fn field(&self, num: BigInt) -> Result<FieldElement> {
        FieldElement::new(num.mod_floor(&self.p), self.p.clone())
    }
}

fn build_secp256k1() -> Secp256k1 {
    let p = ((BigInt::one() << 256) - (BigInt::one() << 32)) - BigInt::from(977);
    let n = BigInt::parse_bytes(
        b"fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
        16,
    )
    .unwrap();
    let gx = BigInt::parse_bytes(
        b"79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        16,
    )
    .unwrap();
    let gy = BigInt::parse_bytes(
        b"483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8",
        16,
    )
    .unwrap();

    Secp256k1 {
        p,
        a: BigInt::zero(),
        b: BigInt::from(7),
        n,
        gx,
        gy,
    }
}

static CURVE: OnceLock<Secp256k1> = OnceLock::new();

/// Returns the process-wide secp256k1 parameter set, initialized once.
pub fn secp256k1() -> &'static Secp256k1 {
    CURVE.get_or_init(build_secp256k1)
}
