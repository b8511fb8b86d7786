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

//! PKCS#10 `CertificationRequest ::= SEQUENCE { certificationRequestInfo,
//! signatureAlgorithm, signature }` (RFC 2986 §4): the certificate signing
//! request document model. Like [`crate::certificate::Certificate`], the
//! signed `certificationRequestInfo` keeps its exact encoded bytes for
//! signature verification.

use wyvern_asn1::element::{decode_der, Element};
use wyvern_asn1::oid::ObjectIdentifier;
use wyvern_asn1::schema::{Cursor, Tagging};
use wyvern_asn1::tag::universal;
use wyvern_asn1::value::{decode_integer, BitString};

use crate::algorithm::{self, AlgorithmIdentifier, PublicKeyMaterial, SignatureAlgorithm, SubjectPublicKeyInfo};
use crate::extensions::Extension;
use crate::name::Name;
use crate::Error;

/// `1.2.840.113549.1.9.14`: the `extensionRequest` attribute PKCS#9 defines
/// for carrying requested `Extensions` inside a CSR's attribute set.
const EXTENSION_REQUEST_OID: &str = "1.2.840.113549.1.9.14";

#[derive(Clone, Debug)]
pub struct Attribute {
	pub attribute_type: ObjectIdentifier,
	pub values: Vec<Element>,
}

#[derive(Clone, Debug)]
pub struct CertificationRequestInfo {
	pub version: u8,
	pub subject: Name,
	pub subject_public_key_info: SubjectPublicKeyInfo,
	pub attributes: Vec<Attribute>,
	/// The exact encoded bytes of this `certificationRequestInfo`.
	pub raw: Vec<u8>,
}

impl CertificationRequestInfo {
	fn decode(el: &Element) -> Result<Self, Error> {
		let mut cur = Cursor::new(el)?;
		let version_int = decode_integer(cur.next_universal(universal::INTEGER)?)?;
		let version = version_int.to_bytes_be().last().copied().unwrap_or(0);
		let subject = Name::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let subject_public_key_info = SubjectPublicKeyInfo::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let attributes = match cur.next_optional_context(0, Tagging::Implicit)? {
			Some(attrs_el) => {
				let attr_elements = attrs_el.as_children().ok_or(Error::Malformed("attributes must be a SET"))?;
				attr_elements.iter().map(decode_attribute).collect::<Result<_, _>>()?
			}
			None => Vec::new(),
		};
		Ok(CertificationRequestInfo { version, subject, subject_public_key_info, attributes, raw: el.raw.clone() })
	}

	/// Requested extensions, if the CSR carries an `extensionRequest`
	/// attribute (RFC 2985 §5.4.2). A CA is free to ignore these, grant a
	/// subset, or grant them all; this crate only parses what was asked for.
	pub fn requested_extensions(&self) -> Result<Vec<Extension>, Error> {
		let oid = ObjectIdentifier::from_dotted(EXTENSION_REQUEST_OID).expect("well-formed constant OID");
		let Some(attr) = self.attributes.iter().find(|a| a.attribute_type == oid) else {
			return Ok(Vec::new());
		};
		let Some(exts_set) = attr.values.first() else {
			return Ok(Vec::new());
		};
		let children = exts_set.as_children().ok_or(Error::Malformed("extensionRequest value must be a SEQUENCE of Extension"))?;
		children.iter().map(crate::extensions::decode_extension).collect()
	}
}

fn decode_attribute(el: &Element) -> Result<Attribute, Error> {
	let children = el.as_children().ok_or(Error::Malformed("Attribute must be a SEQUENCE"))?;
	if children.len() != 2 {
		return Err(Error::Malformed("Attribute must have exactly two fields"));
	}
	let attribute_type = wyvern_asn1::value::decode_oid(&children[0])?;
	let values = children[1].as_children().ok_or(Error::Malformed("Attribute values must be a SET"))?.to_vec();
	Ok(Attribute { attribute_type, values })
}

#[derive(Clone, Debug)]
pub struct CertificationRequest {
	pub info: CertificationRequestInfo,
	pub signature_algorithm: AlgorithmIdentifier,
	pub signature_value: Vec<u8>,
}

impl CertificationRequest {
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
		let info = CertificationRequestInfo::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let signature_algorithm = AlgorithmIdentifier::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let signature_value = BitString::decode(cur.next_universal(universal::BIT_STRING)?)?.data;
		Ok(CertificationRequest { info, signature_algorithm, signature_value })
	}

	pub fn public_key(&self) -> Result<PublicKeyMaterial, Error> {
		algorithm::decode_public_key(&self.info.subject_public_key_info)
	}

	pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm, Error> {
		algorithm::signature_algorithm_from_oid(&self.signature_algorithm.oid, self.signature_algorithm.parameters.as_ref())
	}

	/// A CSR proves possession of the private key by signing its own
	/// `certificationRequestInfo` with the same key it's requesting a
	/// certificate for, so verification always uses the CSR's own
	/// [`CertificationRequest::public_key`].
	pub fn verify_signature(&self) -> Result<bool, Error> {
		let public_key = self.public_key()?;
		let sig_alg = self.signature_algorithm()?;
		algorithm::verify(sig_alg, &public_key, &self.info.raw, &self.signature_value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wyvern_asn1::element::encode_tlv;
	use wyvern_asn1::tag::TagClass;
	use wyvern_asn1::value::{encode_integer, encode_oid, encode_printable_string};
	use wyvern_bigint::BigInteger;
	use wyvern_digest::Algorithm as DigestAlgorithm;
	use wyvern_keys::ec::{nist_p256, Curve, Point};
	use wyvern_keys::ecdsa;

	fn build_self_signed_csr() -> CertificationRequest {
		let curve = Curve::load(nist_p256());
		let d = BigInteger::from_u64(0xBADC0DE);
		let q = curve.base_point_mul(&d);
		let (qx, qy) = match &q {
			Point::Affine(x, y) => (x.to_bytes_be_padded(32), y.to_bytes_be_padded(32)),
			Point::Infinity => panic!("generator multiple must not be infinity"),
		};
		let mut point_bytes = vec![0x04u8];
		point_bytes.extend_from_slice(&qx);
		point_bytes.extend_from_slice(&qy);

		let ec_public_key_oid = ObjectIdentifier::from_dotted("1.2.840.10045.2.1").unwrap();
		let named_curve_oid = ObjectIdentifier::from_dotted("1.2.840.10045.3.1.7").unwrap();
		let alg_id = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[encode_oid(&ec_public_key_oid), encode_oid(&named_curve_oid)].concat());
		let spki = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[alg_id, BitString::from_bytes(point_bytes).encode()].concat());

		let subject = {
			let atv = encode_tlv(
				TagClass::Universal,
				universal::SEQUENCE,
				true,
				&[encode_oid(&ObjectIdentifier::from_dotted("2.5.4.3").unwrap()), encode_printable_string("requester").unwrap()].concat(),
			);
			let rdn = encode_tlv(TagClass::Universal, universal::SET, true, &atv);
			encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &rdn)
		};

		let info_parts = [encode_integer(&BigInteger::from_u64(0)), subject, spki].concat();
		let info = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &info_parts);

		let ecdsa_sha256_oid = ObjectIdentifier::from_dotted("1.2.840.10045.4.3.2").unwrap();
		let sig_alg_id = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &encode_oid(&ecdsa_sha256_oid));

		let digest = wyvern_digest::Hash::hash(DigestAlgorithm::Sha256, &info);
		let sig = ecdsa::sign_deterministic(&curve, &d, &digest, DigestAlgorithm::Sha256);
		let sig_der = wyvern_keys::format::signature_format::encode_asn1(&sig.r, &sig.s);

		let csr_parts = [info, sig_alg_id, BitString::from_bytes(sig_der).encode()].concat();
		let csr_der = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &csr_parts);
		CertificationRequest::from_der(&csr_der).unwrap()
	}

	#[test]
	fn decodes_subject_and_no_attributes() {
		let csr = build_self_signed_csr();
		assert_eq!(csr.info.subject.common_name(), Some("requester"));
		assert!(csr.info.attributes.is_empty());
		assert!(csr.info.requested_extensions().unwrap().is_empty());
	}

	#[test]
	fn verifies_proof_of_possession_signature() {
		let csr = build_self_signed_csr();
		assert!(csr.verify_signature().unwrap());
	}
}
