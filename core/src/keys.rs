//! ECDSA signatures, key pairs, SEC/DER/WIF encoding, and Bitcoin address
//! derivation.
//!
//! # Security
//!
//! [`PrivateKey::sign`] uses a **fixed** ephemeral scalar `k = 100` instead
//! of deriving `k` per RFC 6979. This matches the reference implementation
//! this crate is ported from and the fixture-driven tests that depend on
//! it, but it means two different messages signed by the same key leak the
//! private key to anyone who can solve two linear equations. Do not use
//! this module to sign anything of value; replacing `deterministic_k` with
//! an RFC 6979 derivation is the prerequisite for any production use
//! (tracked as an open design question, not implemented here).

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::One;

use crate::bigint;
use crate::codec::{self, base58check_decode, base58check_encode};
use crate::curve::{secp256k1, Point};
use crate::error::{Error, Result};
use crate::field::FieldElement;

/// An ECDSA signature `(r, s)`. `s` is always normalized to the low-s form
/// (`s <= n/2`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: BigInt,
    pub s: BigInt,
}

impl Signature {
    pub fn new(r: BigInt, s: BigInt) -> Self {
        Self { r, s }
    }

    /// DER encoding: `0x30 len 0x02 len_r r 0x02 len_s s`, each integer
    /// minimally encoded with a leading `0x00` pad when its high bit is
    /// set.
    pub fn der(&self) -> Vec<u8> {
        let r = der_encode_int(&self.r);
        let s = der_encode_int(&self.s);
        let mut body = Vec::with_capacity(r.len() + s.len());
        body.extend_from_slice(&r);
        body.extend_from_slice(&s);

        let mut out = Vec::with_capacity(body.len() + 2);
        out.push(0x30);
        out.push(body.len() as u8);
        out.extend_from_slice(&body);
        out
    }

    /// Parses a DER-encoded signature, enforcing the SEQUENCE/INTEGER tag
    /// structure and total-length consistency.
    pub fn parse(der: &[u8]) -> Result<Self> {
        if der.len() < 6 || der[0] != 0x30 {
            return Err(Error::BadSignature);
        }
        let seq_len = der[1] as usize;
        if seq_len + 2 != der.len() {
            return Err(Error::BadSignatureLength);
        }

        let mut pos = 2;
        let (r, next) = der_parse_int(der, pos)?;
        pos = next;
        let (s, next) = der_parse_int(der, pos)?;
        pos = next;

        if pos != der.len() {
            return Err(Error::BadSignatureLength);
        }

        Ok(Signature { r, s })
    }
}

fn der_encode_int(value: &BigInt) -> Vec<u8> {
    let (_, mut bytes) = value.to_bytes_be();
    if bytes.is_empty() {
        bytes.push(0);
    }
    // Trim leading zero bytes, but always keep at least one byte.
    while bytes.len() > 1 && bytes[0] == 0 && bytes[1] < 0x80 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0x00);
    }
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(0x02);
    out.push(bytes.len() as u8);
    out.extend_from_slice(&bytes);
    out
}

fn der_parse_int(der: &[u8], pos: usize) -> Result<(BigInt, usize)> {
    if pos + 2 > der.len() || der[pos] != 0x02 {
        return Err(Error::BadSignature);
    }
    let len = der[pos + 1] as usize;
    let start = pos + 2;
    let end = start + len;
    if end > der.len() {
        return Err(Error::BadSignatureLength);
    }
    let value = BigInt::from_bytes_be(Sign::Plus, &der[start..end]);
    Ok((value, end))
}

/// A secp256k1 key pair: `secret` and the derived public point `secret * G`.
#[derive(Clone)]
pub struct PrivateKey {
    pub secret: BigInt,
    pub point: Point,
}

impl PrivateKey {
    pub fn new(secret: BigInt) -> Self {
        let point = secp256k1().g().scalar_mul(&secret).expect("scalar mul of generator");
        Self { secret, point }
    }

    /// The reference implementation's fixed ephemeral scalar. See the
    /// module-level `# Security` note.
    fn deterministic_k() -> BigInt {
        BigInt::from(100)
    }

    /// Signs the 32-byte message hash `z`, returning a low-s-normalized
    /// signature.
    pub fn sign(&self, z: &[u8]) -> Signature {
        let curve = secp256k1();
        let z_int = bigint::from_be_bytes(z);
        let k = Self::deterministic_k();

        let r = curve
            .g()
            .scalar_mul(&k)
            .expect("scalar mul")
            .x()
            .expect("R is not infinity")
            .num()
            .mod_floor(&curve.n);

        let k_inv = bigint::inv_mod_prime(&k, &curve.n);
        let mut s = bigint::mul_mod(&bigint::add_mod(&z_int, &bigint::mul_mod(&r, &self.secret, &curve.n), &curve.n), &k_inv, &curve.n);

        let half_n = &curve.n / BigInt::from(2);
        if s > half_n {
            s = &curve.n - s;
        }

        Signature::new(r, s)
    }

    /// Compressed SEC-encoded public key: `0x02`/`0x03` parity prefix plus
    /// 32-byte `x`.
    pub fn sec_compressed(&self) -> Vec<u8> {
        sec_encode(&self.point, true)
    }

    /// Uncompressed SEC-encoded public key: `0x04` plus 32-byte `x` and
    /// 32-byte `y`.
    pub fn sec_uncompressed(&self) -> Vec<u8> {
        sec_encode(&self.point, false)
    }

    /// WIF-encodes the private key. `compressed` appends the `0x01` suffix
    /// marking that the derived public key should be SEC-compressed.
    pub fn wif(&self, testnet: bool, compressed: bool) -> String {
        let prefix: u8 = if testnet { 0xef } else { 0x80 };
        let mut payload = vec![prefix];
        payload.extend_from_slice(&bigint::to_be_bytes_padded(&self.secret, 32));
        if compressed {
            payload.push(0x01);
        }
        base58check_encode(&payload)
    }

    /// Decodes a WIF-encoded private key, returning the secret, whether it
    /// targets testnet, and whether the SEC key should be compressed.
    pub fn from_wif(wif: &str) -> Result<(BigInt, bool, bool)> {
        let payload = base58check_decode(wif)?;
        if payload.len() < 33 {
            return Err(Error::Parse("WIF payload too short".into()));
        }
        let prefix = payload[0];
        let testnet = match prefix {
            0x80 => false,
            0xef => true,
            _ => return Err(Error::Parse("unrecognized WIF version byte".into())),
        };
        let compressed = payload.len() == 34 && payload[33] == 0x01;
        let secret = bigint::from_be_bytes(&payload[1..33]);
        Ok((secret, testnet, compressed))
    }
}

fn sec_encode(point: &Point, compressed: bool) -> Vec<u8> {
    let x = point.x().expect("public point is not infinity");
    let y = point.y().expect("public point is not infinity");
    let x_bytes = bigint::to_be_bytes_padded(x.num(), 32);

    if compressed {
        let prefix: u8 = if bigint::is_even(y.num()) { 0x02 } else { 0x03 };
        let mut out = vec![prefix];
        out.extend_from_slice(&x_bytes);
        out
    } else {
        let y_bytes = bigint::to_be_bytes_padded(y.num(), 32);
        let mut out = vec![0x04];
        out.extend_from_slice(&x_bytes);
        out.extend_from_slice(&y_bytes);
        out
    }
}

/// Parses a SEC-encoded public key (compressed or uncompressed) into a
/// curve point, recovering `y` via `y = sqrt(x^3 + 7) mod p` when
/// compressed.
pub fn parse_sec(sec: &[u8]) -> Result<Point> {
    let curve = secp256k1();
    if sec.is_empty() {
        return Err(Error::Parse("empty SEC pubkey".into()));
    }

    if sec[0] == 0x04 {
        if sec.len() != 65 {
            return Err(Error::Parse("bad uncompressed SEC length".into()));
        }
        let x = curve.field(bigint::from_be_bytes(&sec[1..33]))?;
        let y = curve.field(bigint::from_be_bytes(&sec[33..65]))?;
        return Point::new(x, y, curve.curve_a(), curve.curve_b());
    }

    if sec[0] != 0x02 && sec[0] != 0x03 {
        return Err(Error::Parse("bad SEC prefix".into()));
    }
    if sec.len() != 33 {
        return Err(Error::Parse("bad compressed SEC length".into()));
    }

    let x = curve.field(bigint::from_be_bytes(&sec[1..33]))?;
    let alpha = x.mul(&x)?.mul(&x)?.add(&curve.curve_b())?;
    let beta = sqrt_field(&alpha, &curve.p);

    let even_beta_num = beta.num().clone();
    let (even_beta, odd_beta) = if bigint::is_even(&even_beta_num) {
        let odd = curve.field(&curve.p - &even_beta_num)?;
        (beta, odd)
    } else {
        let even = curve.field(&curve.p - &even_beta_num)?;
        (even, beta)
    };

    let y = if sec[0] == 0x02 { even_beta } else { odd_beta };
    Point::new(x, y, curve.curve_a(), curve.curve_b())
}

/// Computes a square root mod `p` for `p % 4 == 3` (true of the secp256k1
/// prime): `w = v^((p+1)/4) mod p`.
fn sqrt_field(v: &FieldElement, p: &BigInt) -> FieldElement {
    let exponent = (p + BigInt::one()) / BigInt::from(4);
    v.pow(&exponent)
}

/// Verifies that `(r, s)` is a valid ECDSA signature of the 32-byte message
/// hash `z` under `pubkey`.
pub fn verify(z: &[u8], sig: &Signature, pubkey: &Point) -> bool {
    let curve = secp256k1();
    let z_int = bigint::from_be_bytes(z);

    let s_inv = bigint::inv_mod_prime(&sig.s, &curve.n);
    let u = bigint::mul_mod(&z_int, &s_inv, &curve.n);
    let v = bigint::mul_mod(&sig.r, &s_inv, &curve.n);

    let total = match curve.g().scalar_mul(&u).and_then(|ug| {
        let vp = pubkey.scalar_mul(&v)?;
        ug.add(&vp)
    }) {
        Ok(p) => p,
        Err(_) => return false,
    };

    match total.x() {
        Some(x) => x.num().mod_floor(&curve.n) == sig.r,
        None => false,
    }
}

/// Derives the P2PKH Base58Check address for a SEC-encoded public key.
pub fn p2pkh_address(sec: &[u8], testnet: bool) -> String {
    let h160 = codec::hash160(sec);
    let prefix: u8 = if testnet { 0x6f } else { 0x00 };
    let mut payload = vec![prefix];
    payload.extend_from_slice(&h160);
    base58check_encode(&payload)
}

/// Derives the P2SH Base58Check address for a 20-byte script hash.
pub fn p2sh_address(h160: &[u8; 20], testnet: bool) -> String {
    let prefix: u8 = if testnet { 0xc4 } else { 0x05 };
    let mut payload = vec![prefix];
    payload.extend_from_slice(h160);
    base58check_encode(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn hash_message(msg: &[u8]) -> [u8; 32] {
        Sha256::digest(msg).into()
    }

    #[test]
    fn signature_round_trip_is_sound() {
        let secret = BigInt::from(12345u64);
        let key = PrivateKey::new(secret);
        let z = hash_message(b"test message");
        let sig = key.sign(&z);
        assert!(verify(&z, &sig, &key.point));
    }

    #[test]
    fn signature_cross_rejects_under_different_key() {
        let key_a = PrivateKey::new(BigInt::from(111u64));
        let key_b = PrivateKey::new(BigInt::from(222u64));
        let z = hash_message(b"another message");
        let sig = key_a.sign(&z);
        assert!(!verify(&z, &sig, &key_b.point));
    }

    #[test]
    fn der_round_trip() {
        let key = PrivateKey::new(BigInt::from(42u64));
        let z = hash_message(b"der round trip");
        let sig = key.sign(&z);
        let der = sig.der();
        let parsed = Signature::parse(&der).unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn sec_compressed_round_trip() {
        let key = PrivateKey::new(BigInt::from(999u64));
        let sec = key.sec_compressed();
        let point = parse_sec(&sec).unwrap();
        assert_eq!(point, key.point);
    }

    #[test]
    fn sec_uncompressed_round_trip() {
        let key = PrivateKey::new(BigInt::from(999u64));
        let sec = key.sec_uncompressed();
        let point = parse_sec(&sec).unwrap();
        assert_eq!(point, key.point);
    }

    #[test]
    fn wif_round_trip() {
        let key = PrivateKey::new(BigInt::from(5003u64));
        let wif = key.wif(true, true);
        let (secret, testnet, compressed) = PrivateKey::from_wif(&wif).unwrap();
        assert_eq!(secret, key.secret);
        assert!(testnet);
        assert!(compressed);
    }

    #[test]
    fn addresses_differ_by_network() {
        let key = PrivateKey::new(BigInt::from(5002u64));
        let sec = key.sec_compressed();
        let main = p2pkh_address(&sec, false);
        let test = p2pkh_address(&sec, true);
        assert_ne!(main, test);
    }
}
