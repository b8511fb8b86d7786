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

//! Ed25519 (RFC 8032) signing via `ed25519-dalek`, and Curve25519 ECDH via
//! `x25519-dalek` — the curve25519 family the teacher already depends on
//! (`russh`'s own `curve25519-dalek` KEX), generalized here to also cover
//! host-key signing instead of only key exchange.

use ed25519_dalek::{Keypair, PublicKey as DalekPublicKey, SecretKey, Signature as DalekSignature, Signer, Verifier};
use rand::rngs::OsRng;

use crate::Error;

pub struct Ed25519KeyPair {
	keypair: Keypair,
}

impl Ed25519KeyPair {
	pub fn generate() -> Self {
		let mut csprng = OsRng {};
		Ed25519KeyPair { keypair: Keypair::generate(&mut csprng) }
	}

	pub fn from_seed(seed: &[u8; 32]) -> Result<Self, Error> {
		let secret = SecretKey::from_bytes(seed).map_err(|_| Error::Malformed("invalid ed25519 seed"))?;
		let public = DalekPublicKey::from(&secret);
		Ok(Ed25519KeyPair { keypair: Keypair { secret, public } })
	}

	pub fn public_key_bytes(&self) -> [u8; 32] {
		self.keypair.public.to_bytes()
	}

	pub fn sign(&self, message: &[u8]) -> [u8; 64] {
		self.keypair.sign(message).to_bytes()
	}
}

pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, Error> {
	let public_key = DalekPublicKey::from_bytes(public_key).map_err(|_| Error::Malformed("invalid ed25519 public key"))?;
	let signature = DalekSignature::from_bytes(signature).map_err(|_| Error::Malformed("invalid ed25519 signature"))?;
	Ok(public_key.verify(message, &signature).is_ok())
}

/// Curve25519 Diffie-Hellman, used for `curve25519-sha256` key exchange
/// rather than signing.
pub struct X25519KeyPair {
	secret: x25519_dalek::StaticSecret,
	pub public: x25519_dalek::PublicKey,
}

impl X25519KeyPair {
	pub fn generate() -> Self {
		let secret = x25519_dalek::StaticSecret::new(OsRng);
		let public = x25519_dalek::PublicKey::from(&secret);
		X25519KeyPair { secret, public }
	}

	pub fn diffie_hellman(&self, their_public: &x25519_dalek::PublicKey) -> [u8; 32] {
		self.secret.diffie_hellman(their_public).to_bytes()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ed25519_sign_verify_roundtrip() {
		let kp = Ed25519KeyPair::generate();
		let sig = kp.sign(b"hello wyvern");
		assert!(verify(&kp.public_key_bytes(), b"hello wyvern", &sig).unwrap());
	}

	#[test]
	fn ed25519_tampered_message_rejected() {
		let kp = Ed25519KeyPair::generate();
		let sig = kp.sign(b"hello wyvern");
		assert!(!verify(&kp.public_key_bytes(), b"goodbye wyvern", &sig).unwrap());
	}

	#[test]
	fn x25519_agreement_matches_both_sides() {
		let alice = X25519KeyPair::generate();
		let bob = X25519KeyPair::generate();
		let shared_a = alice.diffie_hellman(&bob.public);
		let shared_b = bob.diffie_hellman(&alice.public);
		assert_eq!(shared_a, shared_b);
	}
}
