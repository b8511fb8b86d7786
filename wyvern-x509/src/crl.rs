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

//! `CertificateList ::= SEQUENCE { tbsCertList, signatureAlgorithm,
//! signatureValue }` (RFC 5280 §5.1): the certificate revocation list
//! document model, with each `revokedCertificates` entry's own extensions
//! (`reasonCode`, `invalidityDate`, ...) decoded through the same extension
//! registry certificates use.

use wyvern_asn1::element::{decode_der, Element};
use wyvern_asn1::schema::{Cursor, Tagging};
use wyvern_asn1::tag::universal;
use wyvern_asn1::value::{decode_integer, BitString, Time};
use wyvern_bigint::BigInteger;

use crate::algorithm::AlgorithmIdentifier;
use crate::certificate::decode_time;
use crate::extensions::Extension;
use crate::name::Name;
use crate::Error;

#[derive(Clone, Debug)]
pub struct RevokedCertificate {
	pub user_certificate: BigInteger,
	pub revocation_date: Time,
	pub crl_entry_extensions: Vec<Extension>,
}

impl RevokedCertificate {
	fn decode(el: &Element) -> Result<Self, Error> {
		let mut cur = Cursor::new(el)?;
		let user_certificate = decode_integer(cur.next_universal(universal::INTEGER)?)?;
		let revocation_date = decode_time(cur.next()?)?;
		let crl_entry_extensions = match cur.remaining().first() {
			Some(exts_el) => {
				let children = exts_el.as_children().ok_or(Error::Malformed("crlEntryExtensions must be a SEQUENCE"))?;
				children.iter().map(crate::extensions::decode_extension).collect::<Result<_, _>>()?
			}
			None => Vec::new(),
		};
		Ok(RevokedCertificate { user_certificate, revocation_date, crl_entry_extensions })
	}

	pub fn reason(&self) -> Option<&[u8]> {
		self.crl_entry_extensions.iter().find(|e| e.oid.to_dotted() == "2.5.29.21").and_then(|e| match &e.value {
			crate::extensions::ExtensionValue::Opaque(bytes) => Some(bytes.as_slice()),
			_ => None,
		})
	}
}

#[derive(Clone, Debug)]
pub struct TbsCertList {
	pub version: u8,
	pub signature: AlgorithmIdentifier,
	pub issuer: Name,
	pub this_update: Time,
	pub next_update: Option<Time>,
	pub revoked_certificates: Vec<RevokedCertificate>,
	pub crl_extensions: Vec<Extension>,
	pub raw: Vec<u8>,
}

impl TbsCertList {
	fn decode(el: &Element) -> Result<Self, Error> {
		let mut cur = Cursor::new(el)?;
		// `version` is OPTIONAL here (unlike TBSCertificate, not EXPLICIT
		// [0]-tagged) — present as a bare INTEGER only on v2 CRLs.
		let version = match cur.remaining().first() {
			Some(v) if v.is_universal(universal::INTEGER) => {
				cur.next()?;
				decode_integer(v)?.to_bytes_be().last().copied().unwrap_or(0)
			}
			_ => 0,
		};
		let signature = AlgorithmIdentifier::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let issuer = Name::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let this_update = decode_time(cur.next()?)?;
		let next_update = match cur.remaining().first() {
			Some(el) if el.is_universal(universal::UTC_TIME) || el.is_universal(universal::GENERALIZED_TIME) => {
				cur.next()?;
				Some(decode_time(el)?)
			}
			_ => None,
		};
		let revoked_certificates = match cur.remaining().first() {
			Some(el) if el.is_universal(universal::SEQUENCE) => {
				cur.next()?;
				let entries = el.as_children().ok_or(Error::Malformed("revokedCertificates must be a SEQUENCE"))?;
				entries.iter().map(RevokedCertificate::decode).collect::<Result<_, _>>()?
			}
			_ => Vec::new(),
		};
		let crl_extensions = match cur.next_optional_context(0, Tagging::Explicit)? {
			Some(exts_el) => {
				let children = exts_el.as_children().ok_or(Error::Malformed("crlExtensions must be a SEQUENCE"))?;
				children.iter().map(crate::extensions::decode_extension).collect::<Result<_, _>>()?
			}
			None => Vec::new(),
		};
		Ok(TbsCertList { version, signature, issuer, this_update, next_update, revoked_certificates, crl_extensions, raw: el.raw.clone() })
	}

	pub fn authority_key_identifier(&self) -> Option<&crate::extensions::AuthorityKeyIdentifier> {
		self.crl_extensions.iter().find_map(|e| match &e.value {
			crate::extensions::ExtensionValue::AuthorityKeyIdentifier(aki) => Some(aki),
			_ => None,
		})
	}

	pub fn is_revoked(&self, serial: &BigInteger) -> bool {
		self.revoked_certificates.iter().any(|rc| &rc.user_certificate == serial)
	}
}

#[derive(Clone, Debug)]
pub struct CertificateList {
	pub tbs_cert_list: TbsCertList,
	pub signature_algorithm: AlgorithmIdentifier,
	pub signature_value: Vec<u8>,
}

impl CertificateList {
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
		let tbs_cert_list = TbsCertList::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let signature_algorithm = AlgorithmIdentifier::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let signature_value = BitString::decode(cur.next_universal(universal::BIT_STRING)?)?.data;
		Ok(CertificateList { tbs_cert_list, signature_algorithm, signature_value })
	}

	pub fn verify_signature(&self, issuer_public_key: &crate::algorithm::PublicKeyMaterial) -> Result<bool, Error> {
		let sig_alg = crate::algorithm::signature_algorithm_from_oid(&self.signature_algorithm.oid, self.signature_algorithm.parameters.as_ref())?;
		crate::algorithm::verify(sig_alg, issuer_public_key, &self.tbs_cert_list.raw, &self.signature_value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wyvern_asn1::element::encode_tlv;
	use wyvern_asn1::oid::ObjectIdentifier;
	use wyvern_asn1::tag::TagClass;
	use wyvern_asn1::value::{encode_integer, encode_oid, encode_printable_string, encode_time};
	use wyvern_digest::Algorithm as DigestAlgorithm;
	use wyvern_keys::ec::{nist_p256, Curve};
	use wyvern_keys::ecdsa;

	fn issuer_name() -> Vec<u8> {
		let atv = encode_tlv(
			TagClass::Universal,
			universal::SEQUENCE,
			true,
			&[encode_oid(&ObjectIdentifier::from_dotted("2.5.4.3").unwrap()), encode_printable_string("test-ca").unwrap()].concat(),
		);
		let rdn = encode_tlv(TagClass::Universal, universal::SET, true, &atv);
		encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &rdn)
	}

	fn build_signed_crl(revoked_serials: &[u64]) -> CertificateList {
		let curve = Curve::load(nist_p256());
		let d = BigInteger::from_u64(42);

		let ecdsa_sha256_oid = ObjectIdentifier::from_dotted("1.2.840.10045.4.3.2").unwrap();
		let sig_alg_id = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &encode_oid(&ecdsa_sha256_oid));

		let this_update = Time { year: 2024, month: 1, day: 1, hour: 0, minute: 0, second: 0 };
		let entries: Vec<u8> = revoked_serials
			.iter()
			.map(|serial| {
				let entry_parts = [encode_integer(&BigInteger::from_u64(*serial)), encode_time(this_update)].concat();
				encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &entry_parts)
			})
			.collect::<Vec<_>>()
			.concat();
		let revoked_certificates = if revoked_serials.is_empty() { Vec::new() } else { encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &entries) };

		let tbs_parts = [sig_alg_id.clone(), issuer_name(), encode_time(this_update), revoked_certificates].concat();
		let tbs = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &tbs_parts);

		let digest = wyvern_digest::Hash::hash(DigestAlgorithm::Sha256, &tbs);
		let sig = ecdsa::sign_deterministic(&curve, &d, &digest, DigestAlgorithm::Sha256);
		let sig_der = wyvern_keys::format::signature_format::encode_asn1(&sig.r, &sig.s);

		let crl_parts = [tbs, sig_alg_id, BitString::from_bytes(sig_der).encode()].concat();
		let crl_der = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &crl_parts);
		CertificateList::from_der(&crl_der).unwrap()
	}

	#[test]
	fn decodes_issuer_and_revoked_entries() {
		let crl = build_signed_crl(&[1, 2, 3]);
		assert_eq!(crl.tbs_cert_list.issuer.common_name(), Some("test-ca"));
		assert_eq!(crl.tbs_cert_list.revoked_certificates.len(), 3);
		assert!(crl.tbs_cert_list.is_revoked(&BigInteger::from_u64(2)));
		assert!(!crl.tbs_cert_list.is_revoked(&BigInteger::from_u64(9)));
	}

	#[test]
	fn empty_crl_has_no_revocations() {
		let crl = build_signed_crl(&[]);
		assert!(crl.tbs_cert_list.revoked_certificates.is_empty());
	}
}
