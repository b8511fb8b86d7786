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

//! A single `Hash` contract (C3) wrapping every digest algorithm the rest of
//! the stack needs: MD2/MD4/MD5, SHA-1/SHA-2/SHA-3, and Keccak. `Hash`
//! becomes an HMAC the moment a key is supplied via [`Hash::keyed`].

use hmac::{Hmac, Mac};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
	#[error("unknown hash algorithm: {0}")]
	UnknownAlgorithm(String),
}

/// Identifies a supported digest algorithm by its canonical lowercase name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
	Md2,
	Md4,
	Md5,
	Sha1,
	Sha224,
	Sha256,
	Sha384,
	Sha512,
	Sha3_224,
	Sha3_256,
	Sha3_384,
	Sha3_512,
	Keccak256,
}

impl Algorithm {
	pub fn from_name(name: &str) -> Result<Self, Error> {
		Ok(match name.to_ascii_lowercase().as_str() {
			"md2" => Algorithm::Md2,
			"md4" => Algorithm::Md4,
			"md5" => Algorithm::Md5,
			"sha1" | "sha-1" => Algorithm::Sha1,
			"sha224" | "sha-224" => Algorithm::Sha224,
			"sha256" | "sha-256" => Algorithm::Sha256,
			"sha384" | "sha-384" => Algorithm::Sha384,
			"sha512" | "sha-512" => Algorithm::Sha512,
			"sha3-224" => Algorithm::Sha3_224,
			"sha3-256" => Algorithm::Sha3_256,
			"sha3-384" => Algorithm::Sha3_384,
			"sha3-512" => Algorithm::Sha3_512,
			"keccak256" | "keccak-256" => Algorithm::Keccak256,
			other => return Err(Error::UnknownAlgorithm(other.to_string())),
		})
	}

	pub fn output_size(self) -> usize {
		match self {
			Algorithm::Md2 | Algorithm::Md4 | Algorithm::Md5 => 16,
			Algorithm::Sha1 => 20,
			Algorithm::Sha224 | Algorithm::Sha3_224 => 28,
			Algorithm::Sha256 | Algorithm::Sha3_256 | Algorithm::Keccak256 => 32,
			Algorithm::Sha384 | Algorithm::Sha3_384 => 48,
			Algorithm::Sha512 | Algorithm::Sha3_512 => 64,
		}
	}

	/// Input block size, needed by HMAC and by PBKDF1/bcrypt-pbkdf.
	pub fn block_size(self) -> usize {
		match self {
			Algorithm::Md2 => 16,
			Algorithm::Md4 | Algorithm::Md5 | Algorithm::Sha1 | Algorithm::Sha224 | Algorithm::Sha256 => 64,
			Algorithm::Sha384 | Algorithm::Sha512 => 128,
			Algorithm::Sha3_224 => 144,
			Algorithm::Sha3_256 | Algorithm::Keccak256 => 136,
			Algorithm::Sha3_384 => 104,
			Algorithm::Sha3_512 => 72,
		}
	}
}

/// A running digest computation, optionally keyed into an HMAC.
///
/// Input is buffered rather than streamed through the underlying digest,
/// since the concrete digest/HMAC type is only selected at `finalize()`.
pub struct Hash {
	algorithm: Algorithm,
	buffer: Vec<u8>,
	hmac_key: Option<Vec<u8>>,
}

impl Hash {
	pub fn new(algorithm: Algorithm) -> Self {
		Hash { algorithm, buffer: Vec::new(), hmac_key: None }
	}

	/// Turn this hash into an HMAC keyed by `key` (RFC 2104).
	pub fn keyed(algorithm: Algorithm, key: &[u8]) -> Self {
		Hash { algorithm, buffer: Vec::new(), hmac_key: Some(key.to_vec()) }
	}

	pub fn algorithm(&self) -> Algorithm {
		self.algorithm
	}

	pub fn output_size(&self) -> usize {
		self.algorithm.output_size()
	}

	pub fn update(&mut self, data: &[u8]) {
		self.buffer.extend_from_slice(data);
	}

	/// Consume the hash, returning the digest (or HMAC) bytes.
	pub fn finalize(self) -> Vec<u8> {
		match self.hmac_key {
			Some(key) => hmac_dispatch(self.algorithm, &key, &self.buffer),
			None => digest_dispatch(self.algorithm, &self.buffer),
		}
	}

	/// One-shot convenience: `hash(bytes) -> bytes`.
	pub fn hash(algorithm: Algorithm, data: &[u8]) -> Vec<u8> {
		digest_dispatch(algorithm, data)
	}

	/// One-shot HMAC: `hmac(key, data) -> bytes`.
	pub fn hmac(algorithm: Algorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
		hmac_dispatch(algorithm, key, data)
	}
}

fn digest_dispatch(algorithm: Algorithm, data: &[u8]) -> Vec<u8> {
	use digest::Digest;
	macro_rules! run {
		($ty:ty) => {
			<$ty>::digest(data).to_vec()
		};
	}
	match algorithm {
		Algorithm::Md2 => run!(md2::Md2),
		Algorithm::Md4 => run!(md4::Md4),
		Algorithm::Md5 => run!(md5::Md5),
		Algorithm::Sha1 => run!(sha1::Sha1),
		Algorithm::Sha224 => run!(sha2::Sha224),
		Algorithm::Sha256 => run!(sha2::Sha256),
		Algorithm::Sha384 => run!(sha2::Sha384),
		Algorithm::Sha512 => run!(sha2::Sha512),
		Algorithm::Sha3_224 => run!(sha3::Sha3_224),
		Algorithm::Sha3_256 => run!(sha3::Sha3_256),
		Algorithm::Sha3_384 => run!(sha3::Sha3_384),
		Algorithm::Sha3_512 => run!(sha3::Sha3_512),
		Algorithm::Keccak256 => run!(sha3::Keccak256),
	}
}

// The generic HMAC path needs the concrete digest type, so we dispatch once
// per algorithm rather than threading a trait object through `hmac::Hmac`.
fn hmac_dispatch(algorithm: Algorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
	macro_rules! run {
		($ty:ty) => {{
			let mut mac = <Hmac<$ty> as Mac>::new_from_slice(key).expect("hmac accepts any key length");
			mac.update(data);
			mac.finalize().into_bytes().to_vec()
		}};
	}
	match algorithm {
		Algorithm::Md2 => run!(md2::Md2),
		Algorithm::Md4 => run!(md4::Md4),
		Algorithm::Md5 => run!(md5::Md5),
		Algorithm::Sha1 => run!(sha1::Sha1),
		Algorithm::Sha224 => run!(sha2::Sha224),
		Algorithm::Sha256 => run!(sha2::Sha256),
		Algorithm::Sha384 => run!(sha2::Sha384),
		Algorithm::Sha512 => run!(sha2::Sha512),
		Algorithm::Sha3_224 => run!(sha3::Sha3_224),
		Algorithm::Sha3_256 => run!(sha3::Sha3_256),
		Algorithm::Sha3_384 => run!(sha3::Sha3_384),
		Algorithm::Sha3_512 => run!(sha3::Sha3_512),
		Algorithm::Keccak256 => run!(sha3::Keccak256),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sha256_known_answer() {
		let out = Hash::hash(Algorithm::Sha256, b"abc");
		assert_eq!(
			hex::encode(out),
			"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
		);
	}

	#[test]
	fn hmac_sha1_matches_rfc2202_case1() {
		let key = [0x0bu8; 20];
		let data = b"Hi There";
		let mac = Hash::hmac(Algorithm::Sha1, &key, data);
		assert_eq!(hex::encode(mac), "b617318655057264e28bc0b6fb378c8ef146be00");
	}

	#[test]
	fn streaming_update_matches_one_shot() {
		let mut h = Hash::new(Algorithm::Sha256);
		h.update(b"ab");
		h.update(b"c");
		assert_eq!(h.finalize(), Hash::hash(Algorithm::Sha256, b"abc"));
	}
}
