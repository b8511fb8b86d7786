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

//! Asymmetric key types (C6): RSA, DSA, ECDSA over several named curves,
//! EdDSA (Ed25519), Curve25519 ECDH, a pluggable key-format registry
//! (PKCS#1, PKCS#8, OpenSSH, PuTTY `.ppk`, JWK, XML/XKMS, raw — see
//! [`format::registry`] for lookup by name), signature-serialization
//! plug-ins, and OpenSSH-style fingerprints.

pub mod dsa;
pub mod ec;
pub mod ecdsa;
pub mod eddsa;
pub mod fingerprint;
pub mod format;
pub mod rsa_key;

use zeroize::Zeroize;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Asn1(#[from] wyvern_asn1::Error),
	#[error(transparent)]
	BigInt(#[from] wyvern_bigint::Error),
	#[error(transparent)]
	Rsa(#[from] rsa::errors::Error),
	#[error("unsupported key algorithm: {0}")]
	UnsupportedAlgorithm(&'static str),
	#[error("malformed key material: {0}")]
	Malformed(&'static str),
	#[error("signature verification failed")]
	BadSignature,
	#[error("no passphrase supplied for an encrypted key")]
	MissingPassphrase,
	#[error("incorrect passphrase")]
	BadPassphrase,
	#[error(transparent)]
	Cipher(#[from] wyvern_cipher::Error),
}

/// Every algorithm a [`PublicKey`]/`PrivateKey` may hold, including the named
/// elliptic curves this crate supports natively via [`ec`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
	Rsa,
	Dsa,
	EcdsaP224,
	EcdsaP256,
	EcdsaP384,
	EcdsaP521,
	EcdsaSecp256k1,
	EcdsaBrainpoolP256r1,
	EcdsaBrainpoolP384r1,
	EcdsaBrainpoolP512r1,
	Ed25519,
	X25519,
	/// Recognized for algorithm negotiation, but unsupported: see
	/// DESIGN.md for why no Ed448/Curve448 implementation is provided.
	Ed448,
}

impl KeyAlgorithm {
	pub fn ssh_name(self) -> &'static str {
		match self {
			KeyAlgorithm::Rsa => "ssh-rsa",
			KeyAlgorithm::Dsa => "ssh-dss",
			KeyAlgorithm::EcdsaP224 => "ecdsa-sha2-nistp224",
			KeyAlgorithm::EcdsaP256 => "ecdsa-sha2-nistp256",
			KeyAlgorithm::EcdsaP384 => "ecdsa-sha2-nistp384",
			KeyAlgorithm::EcdsaP521 => "ecdsa-sha2-nistp521",
			KeyAlgorithm::EcdsaSecp256k1 => "ecdsa-sha2-secp256k1",
			KeyAlgorithm::EcdsaBrainpoolP256r1 => "ecdsa-sha2-brainpoolP256r1",
			KeyAlgorithm::EcdsaBrainpoolP384r1 => "ecdsa-sha2-brainpoolP384r1",
			KeyAlgorithm::EcdsaBrainpoolP512r1 => "ecdsa-sha2-brainpoolP512r1",
			KeyAlgorithm::Ed25519 => "ssh-ed25519",
			KeyAlgorithm::X25519 => "curve25519",
			KeyAlgorithm::Ed448 => "ssh-ed448",
		}
	}
}

/// A decoded public key, whatever format it was read from. The format
/// plugins in [`format`] all converge on producing one of these (or the
/// matching private half) so the rest of the crate never has to branch on
/// encoding again once a key is loaded.
pub enum PublicKey {
	Rsa(rsa::RsaPublicKey),
	Dsa { params: dsa::DsaParams, y: wyvern_bigint::BigInteger },
	Ecdsa { curve: ec::Curve, point: ec::Point },
	Ed25519([u8; 32]),
}

impl PublicKey {
	pub fn algorithm(&self) -> KeyAlgorithm {
		match self {
			PublicKey::Rsa(_) => KeyAlgorithm::Rsa,
			PublicKey::Dsa { .. } => KeyAlgorithm::Dsa,
			PublicKey::Ecdsa { curve, .. } => curve_name_to_algorithm(curve.params.name),
			PublicKey::Ed25519(_) => KeyAlgorithm::Ed25519,
		}
	}

	/// Verify a signature already in its algorithm's native `(r, s)` or RSA
	/// byte-string form. Callers pick the digest for RSA/DSA/ECDSA
	/// themselves; Ed25519 signs the message directly.
	pub fn verify(&self, message_or_digest: &[u8], signature: &[u8]) -> Result<bool, Error> {
		match self {
			PublicKey::Rsa(public) => Ok(rsa_key::verify_pkcs1v15(public, rsa_key::RsaHash::Sha256, message_or_digest, signature)),
			PublicKey::Dsa { params, y } => {
				let (r, s) = format::signature_format::decode_ssh2(signature)?;
				Ok(dsa::verify(params, y, message_or_digest, &dsa::Signature { r, s })?)
			}
			PublicKey::Ecdsa { curve, point } => {
				let (r, s) = format::signature_format::decode_ssh2(signature)?;
				Ok(ecdsa::verify(curve, point, message_or_digest, &ecdsa::Signature { r, s })?)
			}
			PublicKey::Ed25519(public) => Ok(eddsa::verify(public, message_or_digest, signature)?),
		}
	}
}

fn curve_name_to_algorithm(name: &str) -> KeyAlgorithm {
	match name {
		"nistp224" => KeyAlgorithm::EcdsaP224,
		"nistp256" => KeyAlgorithm::EcdsaP256,
		"nistp384" => KeyAlgorithm::EcdsaP384,
		"nistp521" => KeyAlgorithm::EcdsaP521,
		"secp256k1" => KeyAlgorithm::EcdsaSecp256k1,
		"brainpoolP256r1" => KeyAlgorithm::EcdsaBrainpoolP256r1,
		"brainpoolP384r1" => KeyAlgorithm::EcdsaBrainpoolP384r1,
		"brainpoolP512r1" => KeyAlgorithm::EcdsaBrainpoolP512r1,
		_ => unreachable!("every named curve maps to a KeyAlgorithm variant"),
	}
}

/// A byte buffer that is zeroized on drop, used for private scalar/exponent
/// material that doesn't otherwise flow through `wyvern-cryptovec`.
#[derive(Clone)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
	pub fn new(data: Vec<u8>) -> Self {
		SecretBytes(data)
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}
}

impl Drop for SecretBytes {
	fn drop(&mut self) {
		self.0.zeroize();
	}
}

impl std::fmt::Debug for SecretBytes {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "SecretBytes(..)")
	}
}
