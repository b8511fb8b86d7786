// Copyright 2016 Pierre-Étienne Meunier
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Arbitrary-precision signed integers (C1 of the design: BigInteger plus
//! modular arithmetic, and element types for binary/prime finite fields).
//!
//! The heavy lifting (division, Montgomery-ish multiplication, allocation) is
//! delegated to `num-bigint`; this crate adds the canonicalization, byte
//! import/export and field-aware wrappers the rest of the stack expects.

pub mod field;

use std::cmp::Ordering;
use std::fmt;

use num_bigint::{BigInt, Sign};
use num_integer::Integer as _;
use num_traits::{One, Signed, Zero};

pub use num_bigint::RandBigInt;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("modular inverse does not exist")]
	NoInverse,
	#[error("division by zero")]
	DivisionByZero,
	#[error("negative exponent not supported")]
	NegativeExponent,
}

/// Arbitrary precision signed integer, canonicalized (no leading zero limbs,
/// explicit sign carried by the underlying `BigInt`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigInteger(BigInt);

impl fmt::Debug for BigInteger {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "BigInteger({})", self.0)
	}
}

impl fmt::Display for BigInteger {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl BigInteger {
	pub fn zero() -> Self {
		BigInteger(BigInt::zero())
	}

	pub fn one() -> Self {
		BigInteger(BigInt::one())
	}

	pub fn from_i64(n: i64) -> Self {
		BigInteger(BigInt::from(n))
	}

	pub fn from_u64(n: u64) -> Self {
		BigInteger(BigInt::from(n))
	}

	/// Import from a base-N string (`radix` in 2..=36).
	pub fn from_str_radix(s: &str, radix: u32) -> Option<Self> {
		BigInt::parse_bytes(s.as_bytes(), radix).map(BigInteger)
	}

	/// Import from big-endian bytes. `signed` interprets the bytes as
	/// two's-complement; otherwise the value is always non-negative.
	pub fn from_bytes_be(bytes: &[u8], signed: bool) -> Self {
		if signed {
			BigInteger(BigInt::from_signed_bytes_be(bytes))
		} else {
			BigInteger(BigInt::from_bytes_be(Sign::Plus, bytes))
		}
	}

	pub fn from_bytes_le(bytes: &[u8]) -> Self {
		BigInteger(BigInt::from_bytes_le(Sign::Plus, bytes))
	}

	/// Export to big-endian bytes, unsigned magnitude, no leading zero byte.
	pub fn to_bytes_be(&self) -> Vec<u8> {
		self.0.to_bytes_be().1
	}

	/// Export to big-endian bytes two's-complement, as used by ASN.1 INTEGER.
	pub fn to_signed_bytes_be(&self) -> Vec<u8> {
		self.0.to_signed_bytes_be()
	}

	/// Export to exactly `len` big-endian bytes, left-padding with zero or
	/// truncating the most-significant bytes as needed (used by int2octets).
	pub fn to_bytes_be_padded(&self, len: usize) -> Vec<u8> {
		let raw = self.to_bytes_be();
		if raw.len() >= len {
			raw[raw.len() - len..].to_vec()
		} else {
			let mut out = vec![0u8; len - raw.len()];
			out.extend_from_slice(&raw);
			out
		}
	}

	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	pub fn is_negative(&self) -> bool {
		self.0.is_negative()
	}

	pub fn bit_length(&self) -> usize {
		self.0.bits() as usize
	}

	pub fn add(&self, other: &Self) -> Self {
		BigInteger(&self.0 + &other.0)
	}

	pub fn sub(&self, other: &Self) -> Self {
		BigInteger(&self.0 - &other.0)
	}

	pub fn mul(&self, other: &Self) -> Self {
		BigInteger(&self.0 * &other.0)
	}

	/// Truncating division (toward zero), like most BigInteger libraries.
	pub fn div(&self, other: &Self) -> Result<Self, Error> {
		if other.is_zero() {
			return Err(Error::DivisionByZero);
		}
		Ok(BigInteger(&self.0 / &other.0))
	}

	/// Euclidean-style modulus: result always has the sign of `modulus`
	/// (i.e. is non-negative for a positive modulus), matching phpseclib's
	/// `modPow`/`bmod` semantics used throughout SSH and PKCS arithmetic.
	pub fn modulus(&self, modulus: &Self) -> Result<Self, Error> {
		if modulus.is_zero() {
			return Err(Error::DivisionByZero);
		}
		let r = self.0.mod_floor(&modulus.0);
		Ok(BigInteger(r))
	}

	pub fn neg(&self) -> Self {
		BigInteger(-&self.0)
	}

	pub fn abs(&self) -> Self {
		BigInteger(self.0.abs())
	}

	pub fn cmp_abs(&self, other: &Self) -> Ordering {
		self.0.abs().cmp(&other.0.abs())
	}

	/// Modular exponentiation, `self^exp mod modulus`, exp must be
	/// non-negative.
	pub fn mod_pow(&self, exp: &Self, modulus: &Self) -> Result<Self, Error> {
		if exp.is_negative() {
			return Err(Error::NegativeExponent);
		}
		if modulus.is_zero() {
			return Err(Error::DivisionByZero);
		}
		let base = self.0.mod_floor(&modulus.0);
		Ok(BigInteger(base.modpow(&exp.0, &modulus.0)))
	}

	pub fn gcd(&self, other: &Self) -> Self {
		BigInteger(self.0.gcd(&other.0))
	}

	/// Extended Euclidean algorithm, returns `(gcd, x, y)` with
	/// `self*x + other*y == gcd`.
	pub fn extended_gcd(&self, other: &Self) -> (Self, Self, Self) {
		let eg = self.0.extended_gcd(&other.0);
		(BigInteger(eg.gcd), BigInteger(eg.x), BigInteger(eg.y))
	}

	/// Modular multiplicative inverse of `self` modulo `modulus`.
	pub fn mod_inverse(&self, modulus: &Self) -> Result<Self, Error> {
		let (gcd, x, _) = self.extended_gcd(modulus);
		if gcd.0 != BigInt::one() && gcd.0 != -BigInt::one() {
			return Err(Error::NoInverse);
		}
		let result = x.0.mod_floor(&modulus.0);
		Ok(BigInteger(result))
	}

	/// Generate a uniformly random integer in `[0, bound)`.
	pub fn random_below<R: rand::RngCore>(rng: &mut R, bound: &Self) -> Self {
		BigInteger(rng.gen_bigint_range(&BigInt::zero(), &bound.0))
	}

	/// `bits2int` from RFC 6979 §2.3.2: interpret `bytes` as a big-endian
	/// integer and, if it has more bits than `qlen`, shift right to match.
	pub fn bits2int(bytes: &[u8], qlen: usize) -> Self {
		let v = BigInt::from_bytes_be(Sign::Plus, bytes);
		let vlen = bytes.len() * 8;
		if vlen > qlen {
			BigInteger(v >> (vlen - qlen))
		} else {
			BigInteger(v)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mod_pow_matches_known_answer() {
		let base = BigInteger::from_u64(4);
		let exp = BigInteger::from_u64(13);
		let m = BigInteger::from_u64(497);
		assert_eq!(base.mod_pow(&exp, &m).unwrap(), BigInteger::from_u64(445));
	}

	#[test]
	fn mod_inverse_roundtrip() {
		let a = BigInteger::from_u64(17);
		let m = BigInteger::from_u64(3120);
		let inv = a.mod_inverse(&m).unwrap();
		let check = a.mul(&inv).modulus(&m).unwrap();
		assert_eq!(check, BigInteger::one());
	}

	#[test]
	fn padded_export_left_pads() {
		let n = BigInteger::from_u64(0x1234);
		let bytes = n.to_bytes_be_padded(4);
		assert_eq!(bytes, vec![0x00, 0x00, 0x12, 0x34]);
	}

	#[test]
	fn euclidean_modulus_is_nonnegative() {
		let a = BigInteger::from_i64(-7);
		let m = BigInteger::from_i64(3);
		assert_eq!(a.modulus(&m).unwrap(), BigInteger::from_i64(2));
	}
}
