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

//! RSA (PKCS#1 v1.5 and PSS signatures, PKCS#1 v1.5 and OAEP encryption),
//! delegated to the `rsa` crate rather than hand-rolled, the same way the
//! teacher delegates its symmetric primitives to RustCrypto crates instead
//! of reimplementing them.

use rand::rngs::OsRng;
use rsa::pkcs1v15::{Pkcs1v15Encrypt, Pkcs1v15Sign};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};

use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RsaHash {
	Sha1,
	Sha256,
	Sha384,
	Sha512,
}

pub struct RsaKeyPair {
	pub private: RsaPrivateKey,
	pub public: RsaPublicKey,
}

impl RsaKeyPair {
	pub fn generate(bits: usize) -> Result<Self, Error> {
		let mut rng = OsRng;
		let private = RsaPrivateKey::new(&mut rng, bits)?;
		let public = RsaPublicKey::from(&private);
		Ok(RsaKeyPair { private, public })
	}

	pub fn from_components(n: rsa::BigUint, e: rsa::BigUint, d: rsa::BigUint, primes: Vec<rsa::BigUint>) -> Result<Self, Error> {
		let private = RsaPrivateKey::from_components(n, e, d, primes)?;
		let public = RsaPublicKey::from(&private);
		Ok(RsaKeyPair { private, public })
	}

	/// PKCS#1 v1.5 signature (`ssh-rsa`, `rsaEncryption`/`sha*WithRSAEncryption`).
	pub fn sign_pkcs1v15(&self, hash: RsaHash, digest: &[u8]) -> Result<Vec<u8>, Error> {
		let scheme = pkcs1v15_scheme(hash);
		Ok(self.private.sign(scheme, digest)?)
	}

	/// RSASSA-PSS signature (`rsassaPss`).
	pub fn sign_pss(&self, hash: RsaHash, digest: &[u8]) -> Result<Vec<u8>, Error> {
		let mut rng = OsRng;
		match hash {
			RsaHash::Sha1 => Ok(self.private.sign_with_rng(&mut rng, rsa::pss::Pss::new::<sha1::Sha1>(), digest)?),
			RsaHash::Sha256 => Ok(self.private.sign_with_rng(&mut rng, rsa::pss::Pss::new::<Sha256>(), digest)?),
			RsaHash::Sha384 => Ok(self.private.sign_with_rng(&mut rng, rsa::pss::Pss::new::<Sha384>(), digest)?),
			RsaHash::Sha512 => Ok(self.private.sign_with_rng(&mut rng, rsa::pss::Pss::new::<Sha512>(), digest)?),
		}
	}

	pub fn decrypt_pkcs1v15(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
		Ok(self.private.decrypt(Pkcs1v15Encrypt, ciphertext)?)
	}

	pub fn decrypt_oaep(&self, hash: RsaHash, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
		let scheme = oaep_scheme(hash);
		Ok(self.private.decrypt(scheme, ciphertext)?)
	}
}

pub fn verify_pkcs1v15(public: &RsaPublicKey, hash: RsaHash, digest: &[u8], signature: &[u8]) -> bool {
	public.verify(pkcs1v15_scheme(hash), digest, signature).is_ok()
}

pub fn verify_pss(public: &RsaPublicKey, hash: RsaHash, digest: &[u8], signature: &[u8]) -> bool {
	match hash {
		RsaHash::Sha1 => public.verify(rsa::pss::Pss::new::<sha1::Sha1>(), digest, signature).is_ok(),
		RsaHash::Sha256 => public.verify(rsa::pss::Pss::new::<Sha256>(), digest, signature).is_ok(),
		RsaHash::Sha384 => public.verify(rsa::pss::Pss::new::<Sha384>(), digest, signature).is_ok(),
		RsaHash::Sha512 => public.verify(rsa::pss::Pss::new::<Sha512>(), digest, signature).is_ok(),
	}
}

pub fn encrypt_pkcs1v15(public: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
	let mut rng = OsRng;
	Ok(public.encrypt(&mut rng, Pkcs1v15Encrypt, plaintext)?)
}

pub fn encrypt_oaep(public: &RsaPublicKey, hash: RsaHash, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
	let mut rng = OsRng;
	let scheme = oaep_scheme(hash);
	Ok(public.encrypt(&mut rng, scheme, plaintext)?)
}

fn pkcs1v15_scheme(hash: RsaHash) -> Pkcs1v15Sign {
	match hash {
		RsaHash::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
		RsaHash::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
		RsaHash::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
		RsaHash::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
	}
}

fn oaep_scheme(hash: RsaHash) -> Oaep {
	match hash {
		RsaHash::Sha1 => Oaep::new::<sha1::Sha1>(),
		RsaHash::Sha256 => Oaep::new::<Sha256>(),
		RsaHash::Sha384 => Oaep::new::<Sha384>(),
		RsaHash::Sha512 => Oaep::new::<Sha512>(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sha2::Digest;

	#[test]
	fn pkcs1v15_sign_verify_roundtrip() {
		let kp = RsaKeyPair::generate(1024).unwrap();
		let digest = Sha256::digest(b"rsa message").to_vec();
		let sig = kp.sign_pkcs1v15(RsaHash::Sha256, &digest).unwrap();
		assert!(verify_pkcs1v15(&kp.public, RsaHash::Sha256, &digest, &sig));
	}

	#[test]
	fn pss_sign_verify_roundtrip() {
		let kp = RsaKeyPair::generate(1024).unwrap();
		let digest = Sha256::digest(b"pss message").to_vec();
		let sig = kp.sign_pss(RsaHash::Sha256, &digest).unwrap();
		assert!(verify_pss(&kp.public, RsaHash::Sha256, &digest, &sig));
	}

	#[test]
	fn oaep_encrypt_decrypt_roundtrip() {
		let kp = RsaKeyPair::generate(1024).unwrap();
		let ct = encrypt_oaep(&kp.public, RsaHash::Sha256, b"secret").unwrap();
		let pt = kp.decrypt_oaep(RsaHash::Sha256, &ct).unwrap();
		assert_eq!(pt, b"secret");
	}
}
