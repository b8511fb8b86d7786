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

//! `Extension ::= SEQUENCE { extnID OBJECT IDENTIFIER, critical BOOLEAN
//! DEFAULT FALSE, extnValue OCTET STRING }` (RFC 5280 §4.2): typed decoders
//! for the extensions chain validation inspects (`BasicConstraints`,
//! `KeyUsage`, `ExtKeyUsage`, `SubjectAltName`, `AuthorityKeyIdentifier`,
//! `SubjectKeyIdentifier`, `NameConstraints`), and opaque pass-through for
//! everything else so a certificate round-trips even with extensions this
//! crate has no business interpreting.

use wyvern_asn1::element::{decode_der, Element};
use wyvern_asn1::oid::ObjectIdentifier;
use wyvern_asn1::schema::{Cursor, Tagging};
use wyvern_asn1::tag::{universal, TagClass};
use wyvern_asn1::value::{decode_integer, decode_octet_string, decode_oid, decode_string, BitString};
use wyvern_bigint::BigInteger;

use crate::name::Name;
use crate::Error;

#[derive(Clone, Debug)]
pub struct Extension {
	pub oid: ObjectIdentifier,
	pub critical: bool,
	pub value: ExtensionValue,
}

#[derive(Clone, Debug)]
pub enum ExtensionValue {
	BasicConstraints(BasicConstraints),
	KeyUsage(KeyUsage),
	ExtKeyUsage(Vec<ObjectIdentifier>),
	SubjectAltName(Vec<GeneralName>),
	AuthorityKeyIdentifier(AuthorityKeyIdentifier),
	SubjectKeyIdentifier(Vec<u8>),
	NameConstraints(NameConstraints),
	/// `CertificatePolicies`, `CRLDistributionPoints`, `AuthorityInfoAccess`,
	/// `PolicyMappings`, `PolicyConstraints`, `InhibitAnyPolicy`,
	/// `FreshestCRL`, Netscape/Microsoft private extensions, logotype,
	/// Signed Certificate Timestamps — carried verbatim rather than parsed.
	Opaque(Vec<u8>),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BasicConstraints {
	pub ca: bool,
	pub path_len_constraint: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyUsage {
	pub digital_signature: bool,
	pub non_repudiation: bool,
	pub key_encipherment: bool,
	pub data_encipherment: bool,
	pub key_agreement: bool,
	pub key_cert_sign: bool,
	pub crl_sign: bool,
	pub encipher_only: bool,
	pub decipher_only: bool,
}

impl KeyUsage {
	fn bit(bits: &BitString, n: usize) -> bool {
		let byte = n / 8;
		let shift = 7 - (n % 8);
		bits.data.get(byte).map(|b| (b >> shift) & 1 != 0).unwrap_or(false)
	}

	fn decode(bits: &BitString) -> Self {
		KeyUsage {
			digital_signature: Self::bit(bits, 0),
			non_repudiation: Self::bit(bits, 1),
			key_encipherment: Self::bit(bits, 2),
			data_encipherment: Self::bit(bits, 3),
			key_agreement: Self::bit(bits, 4),
			key_cert_sign: Self::bit(bits, 5),
			crl_sign: Self::bit(bits, 6),
			encipher_only: Self::bit(bits, 7),
			decipher_only: Self::bit(bits, 8),
		}
	}
}

/// `GeneralName ::= CHOICE { ... }` (RFC 5280 §4.2.1.6). Variants this
/// crate does not special-case (`otherName`, `x400Address`,
/// `ediPartyName`) are preserved as `Other` with their context tag number
/// and raw content, rather than dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeneralName {
	Rfc822Name(String),
	DnsName(String),
	DirectoryName(Name),
	Uri(String),
	IpAddress(Vec<u8>),
	RegisteredId(ObjectIdentifier),
	Other(u32, Vec<u8>),
}

fn decode_general_name(el: &Element) -> Result<GeneralName, Error> {
	if el.class != TagClass::ContextSpecific {
		return Err(Error::Malformed("GeneralName must be context-tagged"));
	}
	Ok(match el.tag {
		1 => GeneralName::Rfc822Name(ia5_string(el)?),
		2 => GeneralName::DnsName(ia5_string(el)?),
		4 => GeneralName::DirectoryName(Name::decode(el)?),
		6 => GeneralName::Uri(ia5_string(el)?),
		7 => GeneralName::IpAddress(el.as_primitive().ok_or(Error::Malformed("iPAddress must be primitive"))?.to_vec()),
		8 => GeneralName::RegisteredId(decode_oid(el)?),
		other => GeneralName::Other(other, el.as_primitive().map(|b| b.to_vec()).unwrap_or_default()),
	})
}

/// `dNSName`/`rfc822Name`/`uniformResourceIdentifier` are IA5String
/// content tagged `[n] IMPLICIT`, so the primitive bytes are plain ASCII.
fn ia5_string(el: &Element) -> Result<String, Error> {
	let body = el.as_primitive().ok_or(Error::Malformed("IA5String GeneralName must be primitive"))?;
	String::from_utf8(body.to_vec()).map_err(|_| Error::Malformed("non-ASCII IA5String GeneralName"))
}

fn decode_general_names(el: &Element) -> Result<Vec<GeneralName>, Error> {
	let children = el.as_children().ok_or(Error::Malformed("GeneralNames must be a SEQUENCE"))?;
	children.iter().map(decode_general_name).collect()
}

#[derive(Clone, Debug, Default)]
pub struct AuthorityKeyIdentifier {
	pub key_identifier: Option<Vec<u8>>,
	pub authority_cert_issuer: Option<Vec<GeneralName>>,
	pub authority_cert_serial_number: Option<BigInteger>,
}

#[derive(Clone, Debug)]
pub struct GeneralSubtree {
	pub base: GeneralName,
	pub minimum: u64,
	pub maximum: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct NameConstraints {
	pub permitted: Vec<GeneralSubtree>,
	pub excluded: Vec<GeneralSubtree>,
}

/// Register the OIDs this module's extension table names but the shared
/// `wyvern-asn1` registry doesn't already seed (see that module's
/// `build_default_registry` for the X.509-core set). Idempotent.
pub fn register_known_oids() {
	let extra: &[(&str, &str)] = &[
		("subjectDirectoryAttributes", "2.5.29.9"),
		("issuerAltName", "2.5.29.18"),
		("subjectAltName", "2.5.29.17"),
		("crlNumber", "2.5.29.20"),
		("deltaCRLIndicator", "2.5.29.27"),
		("issuingDistributionPoint", "2.5.29.28"),
		("cRLReason", "2.5.29.21"),
		("holdInstructionCode", "2.5.29.23"),
		("invalidityDate", "2.5.29.24"),
		("certificateIssuer", "2.5.29.29"),
		("extendedKeyUsage", "2.5.29.37"),
		("anyExtendedKeyUsage", "2.5.29.37.0"),
		("nsComment", "2.16.840.1.113730.1.13"),
		("nsCertType", "2.16.840.1.113730.1.1"),
		("ctPrecertificateSCTs", "1.3.6.1.4.1.11129.2.4.2"),
		("szOID_SUBJECT_ALT_NAME2", "1.3.6.1.4.1.311.20.2"),
	];
	for (name, oid) in extra {
		wyvern_asn1::oid::register(name, oid);
	}
}

/// Decode one `Extension` SEQUENCE. `extnValue`'s own DER is parsed for
/// every OID this crate assigns a typed decoder to; any other OID, or an
/// extension whose typed decode fails structurally, is kept as the raw
/// `extnValue` bytes instead of erroring the whole certificate out.
pub fn decode_extension(el: &Element) -> Result<Extension, Error> {
	let mut cur = Cursor::new(el)?;
	let oid = decode_oid(cur.next_universal(universal::OBJECT_IDENTIFIER)?)?;
	let critical = cur.next_default_bool(false)?;
	let extn_value_el = cur.next_universal(universal::OCTET_STRING)?;
	let extn_value = decode_octet_string(extn_value_el)?;

	let value = decode_typed(&oid, &extn_value).unwrap_or_else(|_| ExtensionValue::Opaque(extn_value.clone()));
	Ok(Extension { oid, critical, value })
}

fn decode_typed(oid: &ObjectIdentifier, extn_value: &[u8]) -> Result<ExtensionValue, Error> {
	let (inner, _) = decode_der(extn_value)?;
	match oid.to_dotted().as_str() {
		"2.5.29.19" => {
			let mut cur = Cursor::new(&inner)?;
			let ca = cur.next_default_bool(false)?;
			let path_len_constraint = match cur.remaining().first() {
				Some(el) if el.is_universal(universal::INTEGER) => Some(int_to_u64(&decode_integer(cur.next()?)?)),
				_ => None,
			};
			Ok(ExtensionValue::BasicConstraints(BasicConstraints { ca, path_len_constraint }))
		}
		"2.5.29.15" => Ok(ExtensionValue::KeyUsage(KeyUsage::decode(&BitString::decode(&inner)?))),
		"2.5.29.37" => {
			let children = inner.as_children().ok_or(Error::Malformed("ExtKeyUsage must be a SEQUENCE"))?;
			Ok(ExtensionValue::ExtKeyUsage(children.iter().map(decode_oid).collect::<Result<_, _>>()?))
		}
		"2.5.29.17" => Ok(ExtensionValue::SubjectAltName(decode_general_names(&inner)?)),
		"2.5.29.14" => Ok(ExtensionValue::SubjectKeyIdentifier(decode_octet_string(&inner)?)),
		"2.5.29.35" => Ok(ExtensionValue::AuthorityKeyIdentifier(decode_authority_key_identifier(&inner)?)),
		"2.5.29.30" => Ok(ExtensionValue::NameConstraints(decode_name_constraints(&inner)?)),
		_ => Err(Error::Malformed("no typed decoder registered for this extension OID")),
	}
}

fn decode_authority_key_identifier(el: &Element) -> Result<AuthorityKeyIdentifier, Error> {
	let mut cur = Cursor::new(el)?;
	let key_identifier = cur.next_optional_context(0, Tagging::Implicit)?.and_then(|e| e.as_primitive().map(|b| b.to_vec()));
	let authority_cert_issuer = match cur.next_optional_context(1, Tagging::Implicit)? {
		Some(e) => Some(decode_general_names(e)?),
		None => None,
	};
	let authority_cert_serial_number = match cur.next_optional_context(2, Tagging::Implicit)? {
		Some(e) => Some(decode_integer(e)?),
		None => None,
	};
	Ok(AuthorityKeyIdentifier { key_identifier, authority_cert_issuer, authority_cert_serial_number })
}

fn decode_name_constraints(el: &Element) -> Result<NameConstraints, Error> {
	let mut cur = Cursor::new(el)?;
	let permitted = match cur.next_optional_context(0, Tagging::Implicit)? {
		Some(e) => decode_general_subtrees(e)?,
		None => Vec::new(),
	};
	let excluded = match cur.next_optional_context(1, Tagging::Implicit)? {
		Some(e) => decode_general_subtrees(e)?,
		None => Vec::new(),
	};
	Ok(NameConstraints { permitted, excluded })
}

fn decode_general_subtrees(el: &Element) -> Result<Vec<GeneralSubtree>, Error> {
	let children = el.as_children().ok_or(Error::Malformed("GeneralSubtrees must be a SEQUENCE"))?;
	children.iter().map(decode_general_subtree).collect()
}

fn decode_general_subtree(el: &Element) -> Result<GeneralSubtree, Error> {
	let mut cur = Cursor::new(el)?;
	let base = decode_general_name(cur.next()?)?;
	let minimum = match cur.next_optional_context(0, Tagging::Implicit)? {
		Some(e) => int_to_u64(&decode_integer(e)?),
		None => 0,
	};
	let maximum = match cur.next_optional_context(1, Tagging::Implicit)? {
		Some(e) => Some(int_to_u64(&decode_integer(e)?)),
		None => None,
	};
	Ok(GeneralSubtree { base, minimum, maximum })
}

fn int_to_u64(n: &BigInteger) -> u64 {
	n.to_bytes_be().iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
mod tests {
	use super::*;
	use wyvern_asn1::element::encode_tlv;
	use wyvern_asn1::value::{encode_boolean, encode_integer, encode_octet_string, encode_oid};

	fn wrap_extension(oid: &str, critical: bool, value_der: Vec<u8>) -> Extension {
		let oid_obj = ObjectIdentifier::from_dotted(oid).unwrap();
		let mut parts = vec![encode_oid(&oid_obj)];
		if critical {
			parts.push(encode_boolean(true));
		}
		parts.push(encode_octet_string(&value_der));
		let seq = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &parts.concat());
		let (el, _) = decode_der(&seq).unwrap();
		decode_extension(&el).unwrap()
	}

	#[test]
	fn basic_constraints_ca_true_with_path_len() {
		let inner = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[encode_boolean(true), encode_integer(&BigInteger::from_u64(2))].concat());
		let ext = wrap_extension("2.5.29.19", true, inner);
		assert!(ext.critical);
		match ext.value {
			ExtensionValue::BasicConstraints(bc) => {
				assert!(bc.ca);
				assert_eq!(bc.path_len_constraint, Some(2));
			}
			_ => panic!("expected BasicConstraints"),
		}
	}

	#[test]
	fn key_usage_bits_decode() {
		let bits = BitString { unused_bits: 1, data: vec![0b1000_0010] }; // digitalSignature + keyCertSign
		let ext = wrap_extension("2.5.29.15", true, bits.encode());
		match ext.value {
			ExtensionValue::KeyUsage(ku) => {
				assert!(ku.digital_signature);
				assert!(ku.key_cert_sign);
				assert!(!ku.non_repudiation);
			}
			_ => panic!("expected KeyUsage"),
		}
	}

	#[test]
	fn unknown_extension_falls_back_to_opaque() {
		let ext = wrap_extension("1.2.3.4.5.6", false, vec![0x05, 0x00]);
		assert!(matches!(ext.value, ExtensionValue::Opaque(_)));
	}
}
