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

//! `AlgorithmIdentifier` (RFC 5280 §4.1.1.2), the signature-OID-to-digest
//! table, RSASSA-PSS parameter parsing, and the public-key material a
//! `SubjectPublicKeyInfo` decodes to, ready for [`verify`] to check a
//! signature against.

use wyvern_asn1::element::Element;
use wyvern_asn1::oid::ObjectIdentifier;
use wyvern_asn1::schema::Cursor;
use wyvern_asn1::tag::universal;
use wyvern_asn1::value::{decode_integer, BitString};
use wyvern_bigint::BigInteger;
use wyvern_digest::Algorithm as DigestAlgorithm;
use wyvern_keys::ec::{Curve, Point};
use wyvern_keys::{dsa, ecdsa, eddsa, rsa_key};

use crate::Error;

/// `SubjectPublicKeyInfo ::= SEQUENCE { algorithm AlgorithmIdentifier,
/// subjectPublicKey BIT STRING }` (RFC 5280 §4.1.2.7), decoded here rather
/// than through [`wyvern_keys::format::pkcs8::decode_spki`] because that
/// helper keeps only the algorithm OID: X.509 also needs DSA's `Dss-Parms`
/// and EC's `namedCurve` out of `algorithm.parameters` to reconstruct the
/// key itself.
#[derive(Clone, Debug)]
pub struct SubjectPublicKeyInfo {
	pub algorithm: AlgorithmIdentifier,
	pub public_key: BitString,
}

impl SubjectPublicKeyInfo {
	pub fn decode(el: &Element) -> Result<Self, Error> {
		let mut cur = Cursor::new(el)?;
		let alg_el = cur.next_universal(universal::SEQUENCE)?;
		let algorithm = AlgorithmIdentifier::decode(alg_el)?;
		let bits_el = cur.next_universal(universal::BIT_STRING)?;
		let public_key = BitString::decode(bits_el)?;
		Ok(SubjectPublicKeyInfo { algorithm, public_key })
	}
}

#[derive(Clone, Debug)]
pub struct AlgorithmIdentifier {
	pub oid: ObjectIdentifier,
	/// The raw `parameters` element, when present — RSASSA-PSS's
	/// `RSASSA-PSS-params` SEQUENCE, DSA's `Dss-Parms`, or an EC named
	/// curve OID.
	pub parameters: Option<Element>,
}

impl AlgorithmIdentifier {
	pub fn decode(el: &Element) -> Result<Self, Error> {
		let mut cur = Cursor::new(el)?;
		let oid_el = cur.next_universal(universal::OBJECT_IDENTIFIER)?;
		let oid = wyvern_asn1::value::decode_oid(oid_el)?;
		let parameters = cur.remaining().first().cloned();
		Ok(AlgorithmIdentifier { oid, parameters })
	}
}

/// A signature algorithm this crate can verify, resolved from a
/// certificate's/CSR's/CRL's `signatureAlgorithm` OID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureAlgorithm {
	RsaPkcs1(DigestAlgorithm),
	RsaPss(DigestAlgorithm),
	Dsa(DigestAlgorithm),
	Ecdsa(DigestAlgorithm),
	Ed25519,
}

impl SignatureAlgorithm {
	pub fn digest(self) -> Option<DigestAlgorithm> {
		match self {
			SignatureAlgorithm::RsaPkcs1(d) | SignatureAlgorithm::RsaPss(d) | SignatureAlgorithm::Dsa(d) | SignatureAlgorithm::Ecdsa(d) => Some(d),
			SignatureAlgorithm::Ed25519 => None,
		}
	}
}

/// Resolve a `signatureAlgorithm.algorithm` OID (plus, for RSASSA-PSS, its
/// parameters) to the digest/scheme pair used to verify it. PSS's default
/// parameters (SHA-1, MGF1-SHA1, salt length 20) apply when `parameters`
/// is absent, per RFC 4055 §3.1; this crate otherwise trusts the explicit
/// hash algorithm named in the parameters rather than reconstructing PSS
/// parameters from scratch.
pub fn signature_algorithm_from_oid(oid: &ObjectIdentifier, parameters: Option<&Element>) -> Result<SignatureAlgorithm, Error> {
	match oid.to_dotted().as_str() {
		"1.2.840.113549.1.1.4" => Ok(SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Md5)),
		"1.2.840.113549.1.1.5" => Ok(SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha1)),
		"1.2.840.113549.1.1.11" => Ok(SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha256)),
		"1.2.840.113549.1.1.12" => Ok(SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha384)),
		"1.2.840.113549.1.1.13" => Ok(SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha512)),
		"1.2.840.113549.1.1.10" => Ok(SignatureAlgorithm::RsaPss(pss_digest(parameters)?)),
		"1.2.840.10040.4.3" => Ok(SignatureAlgorithm::Dsa(DigestAlgorithm::Sha1)),
		"2.16.840.1.101.3.4.3.2" => Ok(SignatureAlgorithm::Dsa(DigestAlgorithm::Sha256)),
		"1.2.840.10045.4.1" => Ok(SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha1)),
		"1.2.840.10045.4.3.2" => Ok(SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha256)),
		"1.2.840.10045.4.3.3" => Ok(SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha384)),
		"1.2.840.10045.4.3.4" => Ok(SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha512)),
		"1.3.101.112" => Ok(SignatureAlgorithm::Ed25519),
		other => Err(Error::UnsupportedAlgorithm(other.to_string())),
	}
}

/// Pull the hash algorithm's OID out of `RSASSA-PSS-params`'s first
/// (`EXPLICIT [0]`) field, defaulting to SHA-1 when parameters are absent.
fn pss_digest(parameters: Option<&Element>) -> Result<DigestAlgorithm, Error> {
	let Some(params) = parameters else {
		return Ok(DigestAlgorithm::Sha1);
	};
	let mut cur = Cursor::new(params)?;
	let Some(hash_alg_el) = cur.next_optional_context(0, wyvern_asn1::schema::Tagging::Explicit)? else {
		return Ok(DigestAlgorithm::Sha1);
	};
	let hash_alg = AlgorithmIdentifier::decode(hash_alg_el)?;
	digest_from_oid(&hash_alg.oid)
}

fn digest_from_oid(oid: &ObjectIdentifier) -> Result<DigestAlgorithm, Error> {
	match oid.to_dotted().as_str() {
		"1.3.14.3.2.26" => Ok(DigestAlgorithm::Sha1),
		"2.16.840.1.101.3.4.2.1" => Ok(DigestAlgorithm::Sha256),
		"2.16.840.1.101.3.4.2.2" => Ok(DigestAlgorithm::Sha384),
		"2.16.840.1.101.3.4.2.3" => Ok(DigestAlgorithm::Sha512),
		other => Err(Error::UnsupportedAlgorithm(other.to_string())),
	}
}

/// A decoded `SubjectPublicKeyInfo`, ready to verify a signature against.
pub enum PublicKeyMaterial {
	Rsa(rsa::RsaPublicKey),
	Dsa { params: dsa::DsaParams, y: BigInteger },
	Ecdsa { curve: Curve, point: Point },
	Ed25519([u8; 32]),
}

pub fn decode_public_key(spki: &SubjectPublicKeyInfo) -> Result<PublicKeyMaterial, Error> {
	match spki.algorithm.oid.to_dotted().as_str() {
		"1.2.840.113549.1.1.1" => {
			let (n, e) = wyvern_keys::format::pkcs1::decode_public(&spki.public_key.data)?;
			let n = rsa::BigUint::from_bytes_be(&n.to_bytes_be());
			let e = rsa::BigUint::from_bytes_be(&e.to_bytes_be());
			let public = rsa::RsaPublicKey::new(n, e).map_err(wyvern_keys::Error::from)?;
			Ok(PublicKeyMaterial::Rsa(public))
		}
		"1.2.840.10040.4.1" => {
			let params_el = spki.algorithm.parameters.as_ref().ok_or(Error::Malformed("DSA SubjectPublicKeyInfo missing Dss-Parms"))?;
			let params = decode_dss_parms(params_el)?;
			let (el, _) = wyvern_asn1::element::decode_der(&spki.public_key.data)?;
			let y = decode_integer(&el)?;
			Ok(PublicKeyMaterial::Dsa { params, y })
		}
		"1.2.840.10045.2.1" => {
			let params_el = spki.algorithm.parameters.as_ref().ok_or(Error::Malformed("EC SubjectPublicKeyInfo missing namedCurve"))?;
			let curve_oid = wyvern_asn1::value::decode_oid(params_el)?;
			let curve = curve_from_oid(&curve_oid)?;
			let point = decode_ec_point(&curve, &spki.public_key.data)?;
			Ok(PublicKeyMaterial::Ecdsa { curve, point })
		}
		"1.3.101.112" => {
			let bytes = &spki.public_key.data;
			let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| Error::Malformed("Ed25519 public key must be 32 bytes"))?;
			Ok(PublicKeyMaterial::Ed25519(arr))
		}
		other => Err(Error::UnsupportedAlgorithm(other.to_string())),
	}
}

/// `Dss-Parms ::= SEQUENCE { p INTEGER, q INTEGER, g INTEGER }` (RFC 3279 §2.3.2).
fn decode_dss_parms(el: &Element) -> Result<dsa::DsaParams, Error> {
	let mut cur = Cursor::new(el)?;
	let p = decode_integer(cur.next_universal(universal::INTEGER)?)?;
	let q = decode_integer(cur.next_universal(universal::INTEGER)?)?;
	let g = decode_integer(cur.next_universal(universal::INTEGER)?)?;
	Ok(dsa::DsaParams { p, q, g })
}

/// Maps an EC `namedCurve` OID (RFC 5480 §2.1.1.1) to the matching curve
/// parameters from [`wyvern_keys::ec`].
pub fn curve_from_oid(oid: &ObjectIdentifier) -> Result<Curve, Error> {
	let params = match oid.to_dotted().as_str() {
		"1.2.840.10045.3.1.7" => wyvern_keys::ec::nist_p256(),
		"1.3.132.0.34" => wyvern_keys::ec::nist_p384(),
		"1.3.132.0.35" => wyvern_keys::ec::nist_p521(),
		"1.3.132.0.10" => wyvern_keys::ec::secp256k1(),
		"1.3.36.3.3.2.8.1.1.7" => wyvern_keys::ec::brainpoolp256r1(),
		"1.3.36.3.3.2.8.1.1.11" => wyvern_keys::ec::brainpoolp384r1(),
		"1.3.36.3.3.2.8.1.1.13" => wyvern_keys::ec::brainpoolp512r1(),
		other => return Err(Error::UnsupportedAlgorithm(other.to_string())),
	};
	Ok(Curve::load(params))
}

/// `ECPoint ::= OCTET STRING`, uncompressed form `04 || X || Y` (SEC1
/// §2.3.3); compressed points are not supported.
pub fn decode_ec_point(curve: &Curve, bytes: &[u8]) -> Result<Point, Error> {
	let field_bytes = (curve.params.field_size_bits + 7) / 8;
	if bytes.len() != 2 * field_bytes + 1 || bytes[0] != 0x04 {
		return Err(Error::Malformed("only uncompressed EC points are supported"));
	}
	let x = BigInteger::from_bytes_be(&bytes[1..1 + field_bytes], false);
	let y = BigInteger::from_bytes_be(&bytes[1 + field_bytes..], false);
	Ok(Point::Affine(x, y))
}

/// Verify `signature` over `message` (already the exact bytes that were
/// signed — a `tbsCertificate`/`tbsCertList`/`CertificationRequestInfo`
/// re-serialized from its preserved `raw` bytes) under `public_key`.
pub fn verify(sig_alg: SignatureAlgorithm, public_key: &PublicKeyMaterial, message: &[u8], signature: &[u8]) -> Result<bool, Error> {
	match (sig_alg, public_key) {
		(SignatureAlgorithm::RsaPkcs1(hash), PublicKeyMaterial::Rsa(public)) => {
			let digest = wyvern_digest::Hash::hash(hash, message);
			Ok(rsa_key::verify_pkcs1v15(public, to_rsa_hash(hash)?, &digest, signature))
		}
		(SignatureAlgorithm::RsaPss(hash), PublicKeyMaterial::Rsa(public)) => {
			let digest = wyvern_digest::Hash::hash(hash, message);
			Ok(rsa_key::verify_pss(public, to_rsa_hash(hash)?, &digest, signature))
		}
		(SignatureAlgorithm::Dsa(hash), PublicKeyMaterial::Dsa { params, y }) => {
			let digest = wyvern_digest::Hash::hash(hash, message);
			let (r, s) = wyvern_keys::format::signature_format::decode_asn1(signature)?;
			Ok(dsa::verify(params, y, &digest, &dsa::Signature { r, s })?)
		}
		(SignatureAlgorithm::Ecdsa(hash), PublicKeyMaterial::Ecdsa { curve, point }) => {
			let digest = wyvern_digest::Hash::hash(hash, message);
			let (r, s) = wyvern_keys::format::signature_format::decode_asn1(signature)?;
			Ok(ecdsa::verify(curve, point, &digest, &ecdsa::Signature { r, s })?)
		}
		(SignatureAlgorithm::Ed25519, PublicKeyMaterial::Ed25519(public)) => Ok(eddsa::verify(public, message, signature)?),
		_ => Err(Error::UnsupportedAlgorithm("signature algorithm does not match the subject public key's algorithm".into())),
	}
}

fn to_rsa_hash(hash: DigestAlgorithm) -> Result<rsa_key::RsaHash, Error> {
	match hash {
		DigestAlgorithm::Sha1 => Ok(rsa_key::RsaHash::Sha1),
		DigestAlgorithm::Sha256 => Ok(rsa_key::RsaHash::Sha256),
		DigestAlgorithm::Sha384 => Ok(rsa_key::RsaHash::Sha384),
		DigestAlgorithm::Sha512 => Ok(rsa_key::RsaHash::Sha512),
		other => Err(Error::UnsupportedAlgorithm(format!("{:?}", other))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rsa_sha256_oid_resolves() {
		let oid = ObjectIdentifier::from_dotted("1.2.840.113549.1.1.11").unwrap();
		assert_eq!(signature_algorithm_from_oid(&oid, None).unwrap(), SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha256));
	}

	#[test]
	fn pss_without_parameters_defaults_to_sha1() {
		let oid = ObjectIdentifier::from_dotted("1.2.840.113549.1.1.10").unwrap();
		assert_eq!(signature_algorithm_from_oid(&oid, None).unwrap(), SignatureAlgorithm::RsaPss(DigestAlgorithm::Sha1));
	}

	#[test]
	fn unknown_oid_is_unsupported() {
		let oid = ObjectIdentifier::from_dotted("1.2.3.4.5").unwrap();
		assert!(signature_algorithm_from_oid(&oid, None).is_err());
	}

	#[test]
	fn ec_point_roundtrips_through_decode() {
		let curve = curve_from_oid(&ObjectIdentifier::from_dotted("1.2.840.10045.3.1.7").unwrap()).unwrap();
		let point = curve.base_point_mul(&BigInteger::from_u64(12345));
		let (x, y) = match &point {
			Point::Affine(x, y) => (x.to_bytes_be_padded(32), y.to_bytes_be_padded(32)),
			Point::Infinity => panic!("base point multiple should not be infinity"),
		};
		let mut encoded = vec![0x04u8];
		encoded.extend_from_slice(&x);
		encoded.extend_from_slice(&y);
		let decoded = decode_ec_point(&curve, &encoded).unwrap();
		assert_eq!(decoded, point);
	}
}
