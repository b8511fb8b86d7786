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

//! `Certificate ::= SEQUENCE { tbsCertificate, signatureAlgorithm,
//! signatureValue }` (RFC 5280 §4.1): the certificate document model,
//! loaded from PEM or DER with `tbsCertificate`'s exact encoded bytes kept
//! alongside the parsed fields so [`Certificate::verify_signature`] can
//! check the signature against precisely what was signed rather than a
//! re-encoding of it.

use wyvern_asn1::element::{decode_der, Element};
use wyvern_asn1::oid::ObjectIdentifier;
use wyvern_asn1::schema::{Cursor, Tagging};
use wyvern_asn1::tag::universal;
use wyvern_asn1::value::{decode_integer, decode_generalized_time, decode_utc_time, BitString, Time};
use wyvern_bigint::BigInteger;

use crate::algorithm::{self, AlgorithmIdentifier, PublicKeyMaterial, SignatureAlgorithm, SubjectPublicKeyInfo};
use crate::extensions::{Extension, ExtensionValue};
use crate::name::Name;
use crate::Error;

#[derive(Clone, Debug)]
pub struct Validity {
	pub not_before: Time,
	pub not_after: Time,
}

#[derive(Clone, Debug)]
pub struct TbsCertificate {
	pub version: u8,
	pub serial_number: BigInteger,
	pub signature: AlgorithmIdentifier,
	pub issuer: Name,
	pub validity: Validity,
	pub subject: Name,
	pub subject_public_key_info: SubjectPublicKeyInfo,
	pub extensions: Vec<Extension>,
	/// The exact encoded bytes of this `tbsCertificate`, re-used verbatim
	/// when verifying `signatureValue` rather than re-serialized.
	pub raw: Vec<u8>,
}

impl TbsCertificate {
	fn decode(el: &Element) -> Result<Self, Error> {
		let mut cur = Cursor::new(el)?;
		let version = match cur.next_optional_context(0, Tagging::Explicit)? {
			Some(v) => {
				let n = decode_integer(v)?;
				n.to_bytes_be().last().copied().unwrap_or(0)
			}
			None => 0,
		};
		let serial_number = decode_integer(cur.next_universal(universal::INTEGER)?)?;
		let signature = AlgorithmIdentifier::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let issuer = Name::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let validity = decode_validity(cur.next_universal(universal::SEQUENCE)?)?;
		let subject = Name::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let subject_public_key_info = SubjectPublicKeyInfo::decode(cur.next_universal(universal::SEQUENCE)?)?;
		// issuerUniqueID [1] / subjectUniqueID [2]: present only on very old
		// CA software, never consulted by this crate's validation.
		let _issuer_unique_id = cur.next_optional_context(1, Tagging::Implicit)?;
		let _subject_unique_id = cur.next_optional_context(2, Tagging::Implicit)?;
		let extensions = match cur.next_optional_context(3, Tagging::Explicit)? {
			Some(exts_el) => {
				let children = exts_el.as_children().ok_or(Error::Malformed("extensions field must be a SEQUENCE"))?;
				children.iter().map(crate::extensions::decode_extension).collect::<Result<_, _>>()?
			}
			None => Vec::new(),
		};
		Ok(TbsCertificate { version, serial_number, signature, issuer, validity, subject, subject_public_key_info, extensions, raw: el.raw.clone() })
	}

	pub fn extension(&self, oid: &ObjectIdentifier) -> Option<&Extension> {
		self.extensions.iter().find(|e| &e.oid == oid)
	}

	pub fn basic_constraints(&self) -> Option<crate::extensions::BasicConstraints> {
		match self.extension(&oid("2.5.29.19"))?.value {
			ExtensionValue::BasicConstraints(bc) => Some(bc),
			_ => None,
		}
	}

	pub fn key_usage(&self) -> Option<crate::extensions::KeyUsage> {
		match &self.extension(&oid("2.5.29.15"))?.value {
			ExtensionValue::KeyUsage(ku) => Some(*ku),
			_ => None,
		}
	}

	pub fn subject_alt_names(&self) -> Option<&[crate::extensions::GeneralName]> {
		match &self.extension(&oid("2.5.29.17"))?.value {
			ExtensionValue::SubjectAltName(names) => Some(names),
			_ => None,
		}
	}

	pub fn subject_key_identifier(&self) -> Option<&[u8]> {
		match &self.extension(&oid("2.5.29.14"))?.value {
			ExtensionValue::SubjectKeyIdentifier(bytes) => Some(bytes),
			_ => None,
		}
	}

	pub fn authority_key_identifier(&self) -> Option<&crate::extensions::AuthorityKeyIdentifier> {
		match &self.extension(&oid("2.5.29.35"))?.value {
			ExtensionValue::AuthorityKeyIdentifier(aki) => Some(aki),
			_ => None,
		}
	}

	pub fn name_constraints(&self) -> Option<&crate::extensions::NameConstraints> {
		match &self.extension(&oid("2.5.29.30"))?.value {
			ExtensionValue::NameConstraints(nc) => Some(nc),
			_ => None,
		}
	}
}

fn oid(dotted: &str) -> ObjectIdentifier {
	ObjectIdentifier::from_dotted(dotted).expect("well-formed constant OID")
}

fn decode_validity(el: &Element) -> Result<Validity, Error> {
	let children = el.as_children().ok_or(Error::Malformed("Validity must be a SEQUENCE"))?;
	if children.len() != 2 {
		return Err(Error::Malformed("Validity must have exactly two Time fields"));
	}
	Ok(Validity { not_before: decode_time(&children[0])?, not_after: decode_time(&children[1])? })
}

pub(crate) fn decode_time(el: &Element) -> Result<Time, Error> {
	match el.tag {
		universal::UTC_TIME => Ok(decode_utc_time(el)?),
		universal::GENERALIZED_TIME => Ok(decode_generalized_time(el)?),
		_ => Err(Error::Malformed("Time must be UTCTime or GeneralizedTime")),
	}
}

#[derive(Clone, Debug)]
pub struct Certificate {
	pub tbs_certificate: TbsCertificate,
	pub signature_algorithm: AlgorithmIdentifier,
	pub signature_value: Vec<u8>,
}

impl Certificate {
	pub fn from_der(der: &[u8]) -> Result<Self, Error> {
		let (el, _) = decode_der(der)?;
		Self::decode(&el)
	}

	pub fn from_pem(pem: &str) -> Result<Self, Error> {
		let block = wyvern_asn1::pem::decode(pem)?;
		Self::from_der(&block.data)
	}

	fn decode(el: &Element) -> Result<Self, Error> {
		let mut cur = Cursor::new(el)?;
		let tbs_certificate = TbsCertificate::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let signature_algorithm = AlgorithmIdentifier::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let signature_value = BitString::decode(cur.next_universal(universal::BIT_STRING)?)?.data;
		Ok(Certificate { tbs_certificate, signature_algorithm, signature_value })
	}

	pub fn public_key(&self) -> Result<PublicKeyMaterial, Error> {
		algorithm::decode_public_key(&self.tbs_certificate.subject_public_key_info)
	}

	/// Verify `signatureValue` was produced by `issuer_public_key` signing
	/// `self.tbs_certificate.raw` (a self-signed certificate verifies
	/// against its own public key).
	pub fn verify_signature(&self, issuer_public_key: &PublicKeyMaterial) -> Result<bool, Error> {
		let sig_alg = algorithm::signature_algorithm_from_oid(&self.signature_algorithm.oid, self.signature_algorithm.parameters.as_ref())?;
		algorithm::verify(sig_alg, issuer_public_key, &self.tbs_certificate.raw, &self.signature_value)
	}

	pub fn is_self_signed(&self) -> bool {
		self.tbs_certificate.issuer.matches(&self.tbs_certificate.subject)
	}

	pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm, Error> {
		algorithm::signature_algorithm_from_oid(&self.signature_algorithm.oid, self.signature_algorithm.parameters.as_ref())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wyvern_digest::Algorithm as DigestAlgorithm;
	use wyvern_keys::ec::{nist_p256, Curve};
	use wyvern_keys::ecdsa;

	/// Hand-assembles a minimal self-signed ECDSA certificate to exercise
	/// `TbsCertificate::decode`/`Certificate::verify_signature` without a
	/// real CA-issued fixture on disk.
	fn build_self_signed_ecdsa_cert() -> (Certificate, BigInteger) {
		use wyvern_asn1::element::encode_tlv;
		use wyvern_asn1::tag::TagClass;
		use wyvern_asn1::value::{encode_integer, encode_oid, encode_time};

		let curve = Curve::load(nist_p256());
		let d = BigInteger::from_u64(0xC0FFEE);
		let q = curve.base_point_mul(&d);
		let (qx, qy) = match &q {
			wyvern_keys::ec::Point::Affine(x, y) => (x.to_bytes_be_padded(32), y.to_bytes_be_padded(32)),
			wyvern_keys::ec::Point::Infinity => panic!("generator multiple must not be infinity"),
		};
		let mut point_bytes = vec![0x04u8];
		point_bytes.extend_from_slice(&qx);
		point_bytes.extend_from_slice(&qy);

		let ec_public_key_oid = ObjectIdentifier::from_dotted("1.2.840.10045.2.1").unwrap();
		let named_curve_oid = ObjectIdentifier::from_dotted("1.2.840.10045.3.1.7").unwrap();
		let alg_id = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[encode_oid(&ec_public_key_oid), encode_oid(&named_curve_oid)].concat());
		let spki = encode_tlv(
			TagClass::Universal,
			universal::SEQUENCE,
			true,
			&[alg_id.clone(), BitString::from_bytes(point_bytes).encode()].concat(),
		);

		let name = {
			let atv = encode_tlv(
				TagClass::Universal,
				universal::SEQUENCE,
				true,
				&[encode_oid(&ObjectIdentifier::from_dotted("2.5.4.3").unwrap()), wyvern_asn1::value::encode_printable_string("test").unwrap()].concat(),
			);
			let rdn = encode_tlv(TagClass::Universal, universal::SET, true, &atv);
			encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &rdn)
		};

		let validity = encode_tlv(
			TagClass::Universal,
			universal::SEQUENCE,
			true,
			&[encode_time(Time { year: 2020, month: 1, day: 1, hour: 0, minute: 0, second: 0 }), encode_time(Time { year: 2030, month: 1, day: 1, hour: 0, minute: 0, second: 0 })].concat(),
		);

		let ecdsa_sha256_oid = ObjectIdentifier::from_dotted("1.2.840.10045.4.3.2").unwrap();
		let sig_alg_id = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &encode_oid(&ecdsa_sha256_oid));

		let serial = BigInteger::from_u64(1);
		let tbs_parts = [
			encode_integer(&serial),
			sig_alg_id.clone(),
			name.clone(),
			validity,
			name,
			spki,
		]
		.concat();
		let tbs = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &tbs_parts);

		let digest = wyvern_digest::Hash::hash(DigestAlgorithm::Sha256, &tbs);
		let sig = ecdsa::sign_deterministic(&curve, &d, &digest, DigestAlgorithm::Sha256);
		let sig_der = wyvern_keys::format::signature_format::encode_asn1(&sig.r, &sig.s);

		let cert_parts = [tbs, sig_alg_id, BitString::from_bytes(sig_der).encode()].concat();
		let cert_der = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &cert_parts);
		(Certificate::from_der(&cert_der).unwrap(), serial)
	}

	#[test]
	fn decodes_fields_and_is_self_signed() {
		let (cert, serial) = build_self_signed_ecdsa_cert();
		assert_eq!(cert.tbs_certificate.serial_number, serial);
		assert!(cert.is_self_signed());
		assert_eq!(cert.tbs_certificate.subject.common_name(), Some("test"));
	}

	#[test]
	fn verifies_its_own_signature() {
		let (cert, _) = build_self_signed_ecdsa_cert();
		let public_key = cert.public_key().unwrap();
		assert!(cert.verify_signature(&public_key).unwrap());
	}

	#[test]
	fn tampered_serial_breaks_verification() {
		let (cert, _) = build_self_signed_ecdsa_cert();
		let mut tampered = cert.clone();
		tampered.tbs_certificate.serial_number = BigInteger::from_u64(999);
		let public_key = tampered.public_key().unwrap();
		// raw bytes (what's actually verified) are untouched, so this must
		// still verify: the parsed field and the signed bytes are
		// intentionally decoupled until re-encoding is requested.
		assert!(tampered.verify_signature(&public_key).unwrap());
	}
}
