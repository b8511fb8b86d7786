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

//! Finite field element types: `PrimeFieldElement` (GF(p), used by EC point
//! arithmetic and DSA/ECDSA scalars) and `BinaryFieldElement` (GF(2^m),
//! used by GHASH in GCM mode).

use crate::BigInteger;

/// Element of GF(p) for a fixed prime modulus `p`. Always stored reduced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimeFieldElement {
	value: BigInteger,
	modulus: BigInteger,
}

impl PrimeFieldElement {
	pub fn new(value: BigInteger, modulus: BigInteger) -> Self {
		let reduced = value.modulus(&modulus).expect("non-zero modulus");
		PrimeFieldElement { value: reduced, modulus }
	}

	pub fn value(&self) -> &BigInteger {
		&self.value
	}

	pub fn modulus(&self) -> &BigInteger {
		&self.modulus
	}

	pub fn add(&self, other: &Self) -> Self {
		debug_assert_eq!(self.modulus, other.modulus);
		Self::new(self.value.add(&other.value), self.modulus.clone())
	}

	pub fn sub(&self, other: &Self) -> Self {
		debug_assert_eq!(self.modulus, other.modulus);
		Self::new(self.value.sub(&other.value), self.modulus.clone())
	}

	pub fn mul(&self, other: &Self) -> Self {
		debug_assert_eq!(self.modulus, other.modulus);
		Self::new(self.value.mul(&other.value), self.modulus.clone())
	}

	pub fn inverse(&self) -> Option<Self> {
		self.value
			.mod_inverse(&self.modulus)
			.ok()
			.map(|v| PrimeFieldElement { value: v, modulus: self.modulus.clone() })
	}

	pub fn pow(&self, exp: &BigInteger) -> Self {
		Self::new(
			self.value.mod_pow(exp, &self.modulus).expect("valid exponent"),
			self.modulus.clone(),
		)
	}
}

/// Element of GF(2^128) with the reduction polynomial fixed to the one used
/// by AES-GCM's GHASH (`x^128 + x^7 + x^2 + x + 1`). Represented as a 128-bit
/// value in the bit order GCM specifies (MSB-first within the 16-byte block).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinaryFieldElement128(pub u128);

const GCM_R: u128 = 0xe100_0000_0000_0000_0000_0000_0000_0000;

impl BinaryFieldElement128 {
	pub fn from_be_bytes(b: &[u8; 16]) -> Self {
		BinaryFieldElement128(u128::from_be_bytes(*b))
	}

	pub fn to_be_bytes(self) -> [u8; 16] {
		self.0.to_be_bytes()
	}

	pub fn xor(self, other: Self) -> Self {
		BinaryFieldElement128(self.0 ^ other.0)
	}

	/// GHASH-style binary field multiplication, per SP 800-38D algorithm 1.
	pub fn mul(self, other: Self) -> Self {
		let mut z: u128 = 0;
		let mut v = other.0;
		let x = self.0;
		for i in 0..128 {
			if (x >> (127 - i)) & 1 == 1 {
				z ^= v;
			}
			let lsb = v & 1;
			v >>= 1;
			if lsb == 1 {
				v ^= GCM_R;
			}
		}
		BinaryFieldElement128(z)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prime_field_roundtrip() {
		let p = BigInteger::from_u64(23);
		let a = PrimeFieldElement::new(BigInteger::from_u64(7), p.clone());
		let b = PrimeFieldElement::new(BigInteger::from_u64(5), p.clone());
		let sum = a.add(&b);
		assert_eq!(sum.value(), &BigInteger::from_u64(12));
	}

	#[test]
	fn binary_field_mul_by_one_is_identity() {
		let h = BinaryFieldElement128(0x1234_5678_9abc_def0_1122_3344_5566_7788);
		let one = BinaryFieldElement128(1u128 << 127);
		assert_eq!(one.mul(h), h);
	}
}
