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

//! FIPS 186-4 DSA (`ssh-dss`), built on the same `wyvern_bigint` primitives
//! as [`crate::ec`] rather than a dedicated `dsa` crate, since the teacher's
//! own dependency on `num-bigint` is for exactly this kind of modular
//! arithmetic.

use rand::RngCore;
use wyvern_bigint::BigInteger;
use wyvern_digest::Algorithm;

use crate::Error;

#[derive(Clone, Debug)]
pub struct DsaParams {
	pub p: BigInteger,
	pub q: BigInteger,
	pub g: BigInteger,
}

#[derive(Clone, Debug)]
pub struct Signature {
	pub r: BigInteger,
	pub s: BigInteger,
}

pub fn sign_with_rng<R: RngCore>(
	params: &DsaParams,
	private_key: &BigInteger,
	hash: &[u8],
	rng: &mut R,
) -> Signature {
	loop {
		let mut bytes = vec![0u8; (params.q.bit_length() + 7) / 8];
		rng.fill_bytes(&mut bytes);
		let k = BigInteger::from_bytes_be(&bytes, false).modulus(&params.q).unwrap();
		if k.is_zero() {
			continue;
		}
		if let Some(sig) = sign_with_k(params, private_key, hash, &k) {
			return sig;
		}
	}
}

/// RFC 6979 §3.2: deterministic `k` derived from the private key and the
/// message hash via an HMAC-DRBG, using `q` in place of an ECDSA curve's
/// order. Mirrors `ecdsa::deterministic_k` exactly, minus the `Curve` type.
fn deterministic_k(params: &DsaParams, private_key: &BigInteger, hash: &[u8], algorithm: Algorithm) -> BigInteger {
	let qlen = params.q.bit_length();
	let hlen = algorithm.output_size();
	let x = private_key.to_bytes_be_padded((qlen + 7) / 8);
	let h1 = BigInteger::bits2int(hash, qlen).modulus(&params.q).unwrap().to_bytes_be_padded((qlen + 7) / 8);

	let mut v = vec![0x01u8; hlen];
	let mut k = vec![0x00u8; hlen];

	k = hmac_bytes(algorithm, &k, &v, 0x00, &x, &h1);
	v = wyvern_digest::Hash::hmac(algorithm, &k, &v);
	k = hmac_bytes(algorithm, &k, &v, 0x01, &x, &h1);
	v = wyvern_digest::Hash::hmac(algorithm, &k, &v);

	loop {
		let mut t = Vec::new();
		while t.len() * 8 < qlen {
			v = wyvern_digest::Hash::hmac(algorithm, &k, &v);
			t.extend_from_slice(&v);
		}
		let candidate = BigInteger::bits2int(&t, qlen);
		if !candidate.is_zero() && candidate.cmp_abs(&params.q) == std::cmp::Ordering::Less {
			return candidate;
		}
		k = hmac_bytes(algorithm, &k, &v, 0x00, &[], &[]);
		v = wyvern_digest::Hash::hmac(algorithm, &k, &v);
	}
}

fn hmac_bytes(algorithm: Algorithm, key: &[u8], v: &[u8], tail: u8, x: &[u8], h1: &[u8]) -> Vec<u8> {
	let mut data = Vec::with_capacity(v.len() + 1 + x.len() + h1.len());
	data.extend_from_slice(v);
	data.push(tail);
	data.extend_from_slice(x);
	data.extend_from_slice(h1);
	wyvern_digest::Hash::hmac(algorithm, key, &data)
}

pub fn sign_deterministic(params: &DsaParams, private_key: &BigInteger, hash: &[u8], algorithm: Algorithm) -> Signature {
	let k = deterministic_k(params, private_key, hash, algorithm);
	sign_with_k(params, private_key, hash, &k).expect("RFC 6979 k yields r, s != 0 except with negligible probability")
}

fn sign_with_k(params: &DsaParams, private_key: &BigInteger, hash: &[u8], k: &BigInteger) -> Option<Signature> {
	let r = params.g.mod_pow(k, &params.p).ok()?.modulus(&params.q).ok()?;
	if r.is_zero() {
		return None;
	}
	let qlen = params.q.bit_length();
	let e = BigInteger::bits2int(hash, qlen);
	let k_inv = k.mod_inverse(&params.q).ok()?;
	let s = k_inv.mul(&e.add(&private_key.mul(&r))).modulus(&params.q).ok()?;
	if s.is_zero() {
		return None;
	}
	Some(Signature { r, s })
}

pub fn verify(params: &DsaParams, public_key: &BigInteger, hash: &[u8], sig: &Signature) -> Result<bool, Error> {
	if sig.r.is_zero() || sig.s.is_zero() {
		return Ok(false);
	}
	if sig.r.cmp_abs(&params.q) != std::cmp::Ordering::Less || sig.s.cmp_abs(&params.q) != std::cmp::Ordering::Less {
		return Ok(false);
	}
	let qlen = params.q.bit_length();
	let e = BigInteger::bits2int(hash, qlen);
	let w = sig.s.mod_inverse(&params.q).map_err(|_| Error::BadSignature)?;
	let u1 = e.mul(&w).modulus(&params.q)?;
	let u2 = sig.r.mul(&w).modulus(&params.q)?;
	let v = params
		.g
		.mod_pow(&u1, &params.p)?
		.mul(&public_key.mod_pow(&u2, &params.p)?)
		.modulus(&params.p)?
		.modulus(&params.q)?;
	Ok(v == sig.r)
}

impl From<wyvern_bigint::Error> for Error {
	fn from(e: wyvern_bigint::Error) -> Self {
		Error::BigInt(e)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::rngs::StdRng;
	use rand::SeedableRng;

	/// A small (non-production-size) parameter set with p prime and
	/// g of order q dividing p-1, chosen only for fast, deterministic unit
	/// testing of the arithmetic rather than real security margins.
	fn toy_params() -> (DsaParams, BigInteger) {
		let p = BigInteger::from_u64(2179); // prime, p - 1 = 2178 = 2 * 1089
		let q = BigInteger::from_u64(1089); // divides p - 1
		// g = h^((p-1)/q) mod p guarantees g^q == 1 mod p by Fermat, for any h.
		let g = BigInteger::from_u64(3).mod_pow(&BigInteger::from_u64(2), &p).unwrap();
		(DsaParams { p, q, g }, BigInteger::from_u64(5))
	}

	#[test]
	fn sign_then_verify_roundtrip() {
		let (params, x) = toy_params();
		let y = params.g.mod_pow(&x, &params.p).unwrap();
		let mut rng = StdRng::seed_from_u64(7);
		let hash = wyvern_digest::Hash::hash(Algorithm::Sha256, b"dsa message");
		let sig = sign_with_rng(&params, &x, &hash, &mut rng);
		assert!(verify(&params, &y, &hash, &sig).unwrap());
	}

	#[test]
	fn tampered_hash_rejected() {
		let (params, x) = toy_params();
		let y = params.g.mod_pow(&x, &params.p).unwrap();
		let mut rng = StdRng::seed_from_u64(7);
		let hash = wyvern_digest::Hash::hash(Algorithm::Sha256, b"dsa message");
		let sig = sign_with_rng(&params, &x, &hash, &mut rng);
		let other_hash = wyvern_digest::Hash::hash(Algorithm::Sha256, b"different message");
		assert!(!verify(&params, &y, &other_hash, &sig).unwrap());
	}

	#[test]
	fn deterministic_signature_is_reproducible() {
		let (params, x) = toy_params();
		let y = params.g.mod_pow(&x, &params.p).unwrap();
		let hash = wyvern_digest::Hash::hash(Algorithm::Sha256, b"deterministic dsa");
		let sig1 = sign_deterministic(&params, &x, &hash, Algorithm::Sha256);
		let sig2 = sign_deterministic(&params, &x, &hash, Algorithm::Sha256);
		assert_eq!(sig1.r, sig2.r);
		assert_eq!(sig1.s, sig2.s);
		assert!(verify(&params, &y, &hash, &sig1).unwrap());
	}
}
