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

//! The X.509 family (C7): `Certificate`, `CertificationRequest` (CSR),
//! `CertificateList` (CRL), `SPKAC` and `PFX` (PKCS#12), built on
//! `wyvern-asn1`'s raw-bytes-preserving TLV tree so that a loaded
//! `tbsCertificate` can be re-serialized byte-for-byte for signature
//! verification, plus an extension registry and chain validation.

pub mod algorithm;
pub mod certificate;
pub mod crl;
pub mod csr;
pub mod extensions;
pub mod name;
pub mod pfx;
pub mod spkac;
pub mod validate;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Asn1(#[from] wyvern_asn1::Error),
	#[error(transparent)]
	Keys(#[from] wyvern_keys::Error),
	#[error(transparent)]
	Cipher(#[from] wyvern_cipher::Error),
	#[error("unsupported signature algorithm: {0}")]
	UnsupportedAlgorithm(String),
	#[error("malformed document: {0}")]
	Malformed(&'static str),
	#[error("signature verification failed")]
	BadSignature,
	#[error("no issuer available to verify against")]
	NoIssuer,
	#[error("chain validation recursion limit exceeded")]
	RecursionLimitExceeded,
	#[error("certificate is not currently valid (outside notBefore/notAfter)")]
	NotCurrentlyValid,
	#[error("issuer subject does not match certificate issuer")]
	IssuerMismatch,
	#[error("issuer is not permitted to sign certificates (basicConstraints/keyUsage)")]
	IssuerNotPermitted,
	#[error("name constraints on an ancestor excluded this certificate's name")]
	NameConstraintsViolation,
	#[error("host name does not match any SubjectAltName entry")]
	HostnameMismatch,
	#[error("incorrect password")]
	BadPassword,
	#[error("plugin or bag not found: {0}")]
	NotFound(&'static str),
}

/// Registers every built-in OID ↔ name pair this crate's extension and
/// algorithm tables use, beyond the smaller seed `wyvern-asn1::oid` already
/// carries for key formats. Idempotent; safe to call more than once. Most
/// callers never need this directly since [`extensions::decode_extension`]
/// and [`algorithm::signature_algorithm_from_oid`] work from the OID
/// value regardless, but registering names up front makes
/// `ObjectIdentifier::name()` useful for logging and diagnostics.
pub fn register_oids() {
	extensions::register_known_oids();
	pfx::register_known_oids();
}
