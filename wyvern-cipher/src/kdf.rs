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

//! Key derivation functions named in spec §4.3: PBKDF1/PBKDF2 (RFC 2898),
//! the PKCS#12 KDF (RFC 7292 appendix B), and bcrypt-pbkdf (OpenSSH private
//! key encryption).

use wyvern_digest::{Algorithm, Hash};

use crate::Error;

/// RFC 2898 §5.1. Fails if the requested output is longer than one hash
/// output, per spec.
pub fn pbkdf1(alg: Algorithm, password: &[u8], salt: &[u8], count: u32, dk_len: usize) -> Result<Vec<u8>, Error> {
	if dk_len > alg.output_size() {
		return Err(Error::InvalidArgument("PBKDF1 output longer than the hash digest size"));
	}
	if count == 0 {
		return Err(Error::InvalidArgument("PBKDF1 iteration count must be >= 1"));
	}
	let mut t = Vec::with_capacity(password.len() + salt.len());
	t.extend_from_slice(password);
	t.extend_from_slice(salt);
	let mut digest = Hash::hash(alg, &t);
	for _ in 1..count {
		digest = Hash::hash(alg, &digest);
	}
	digest.truncate(dk_len);
	Ok(digest)
}

/// RFC 2898 §5.2, HMAC-based PBKDF2.
pub fn pbkdf2(alg: Algorithm, password: &[u8], salt: &[u8], count: u32, dk_len: usize) -> Result<Vec<u8>, Error> {
	if count == 0 {
		return Err(Error::InvalidArgument("PBKDF2 iteration count must be >= 1"));
	}
	let hlen = alg.output_size();
	let blocks_needed = (dk_len + hlen - 1) / hlen.max(1);
	let mut out = Vec::with_capacity(blocks_needed * hlen);
	for block_index in 1..=blocks_needed as u32 {
		let mut salt_block = salt.to_vec();
		salt_block.extend_from_slice(&block_index.to_be_bytes());
		let mut u = Hash::hmac(alg, password, &salt_block);
		let mut t = u.clone();
		for _ in 1..count {
			u = Hash::hmac(alg, password, &u);
			for (t_byte, u_byte) in t.iter_mut().zip(&u) {
				*t_byte ^= u_byte;
			}
		}
		out.extend_from_slice(&t);
	}
	out.truncate(dk_len);
	Ok(out)
}

/// Which material RFC 7292 appendix B's `ID` byte selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pkcs12Purpose {
	Key = 1,
	Iv = 2,
	Mac = 3,
}

/// RFC 7292 appendix B.2. `password` must already be the null-terminated
/// UTF-16BE (BMPString) encoding; an empty password is encoded as the two
/// zero bytes of the terminator alone.
pub fn pkcs12_kdf(
	alg: Algorithm,
	password_bmp: &[u8],
	salt: &[u8],
	iterations: u32,
	purpose: Pkcs12Purpose,
	dk_len: usize,
) -> Vec<u8> {
	let u = alg.output_size(); // hash output size in bytes
	let v = alg.block_size(); // hash block size in bytes

	let diversifier = vec![purpose as u8; v];

	let pad_to_v = |data: &[u8]| -> Vec<u8> {
		if data.is_empty() {
			return vec![0u8; v];
		}
		let reps = (v + data.len() - 1) / data.len();
		let mut out = Vec::with_capacity(reps * data.len());
		for _ in 0..reps {
			out.extend_from_slice(data);
		}
		out.truncate(((data.len() + v - 1) / v) * v);
		out
	};

	let salt_block = pad_to_v(salt);
	let pass_block = pad_to_v(password_bmp);
	let mut i = salt_block;
	i.extend_from_slice(&pass_block);

	let mut out = Vec::with_capacity(dk_len + u);
	while out.len() < dk_len {
		let mut a = diversifier.clone();
		a.extend_from_slice(&i);
		let mut digest = Hash::hash(alg, &a);
		for _ in 1..iterations {
			digest = Hash::hash(alg, &digest);
		}
		out.extend_from_slice(&digest);

		// B_i = A repeated to fill v bytes, then I_j += B (mod 2^v) for
		// every v-byte block of I.
		let b = pad_to_v(&digest);
		for chunk in i.chunks_mut(v) {
			let mut carry = 1u16;
			for (byte, &b_byte) in chunk.iter_mut().rev().zip(b.iter().rev()) {
				let sum = *byte as u16 + b_byte as u16 + carry;
				*byte = sum as u8;
				carry = sum >> 8;
			}
		}
	}
	out.truncate(dk_len);
	out
}

/// OpenSSH's bcrypt-pbkdf, used to encrypt new-format OpenSSH private keys.
pub fn bcrypt_pbkdf(password: &[u8], salt: &[u8], rounds: u32, dk_len: usize) -> Result<Vec<u8>, Error> {
	let mut out = vec![0u8; dk_len];
	bcrypt_pbkdf::bcrypt_pbkdf(password, salt, rounds, &mut out)
		.map_err(|_| Error::InvalidArgument("bcrypt-pbkdf derivation failed"))?;
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn s2_pbkdf2_hmac_sha1_known_answer() {
		let dk = pbkdf2(Algorithm::Sha1, b"password", b"salt", 4096, 20).unwrap();
		assert_eq!(hex::encode(dk), "4b007901b765489abead49d926f721d065a429c1");
	}

	#[test]
	fn pbkdf2_output_length_is_respected() {
		let dk = pbkdf2(Algorithm::Sha256, b"pw", b"NaCl", 2, 17).unwrap();
		assert_eq!(dk.len(), 17);
	}

	#[test]
	fn pbkdf1_rejects_oversize_output() {
		assert!(pbkdf1(Algorithm::Md5, b"pw", b"salt", 1, 32).is_err());
	}

	#[test]
	fn pkcs12_kdf_is_deterministic() {
		let a = pkcs12_kdf(Algorithm::Sha1, &[0, 0], b"salt1234", 1000, Pkcs12Purpose::Key, 24);
		let b = pkcs12_kdf(Algorithm::Sha1, &[0, 0], b"salt1234", 1000, Pkcs12Purpose::Key, 24);
		assert_eq!(a, b);
		assert_eq!(a.len(), 24);
	}
}
