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

//! Distinguished Names: `Name ::= RDNSequence`, `RDNSequence ::= SEQUENCE OF
//! RelativeDistinguishedName`, `RelativeDistinguishedName ::= SET OF
//! AttributeTypeAndValue` (RFC 5280 §4.1.2.4). Attribute values are decoded
//! to `String` regardless of their underlying ASN.1 string type
//! (PrintableString/UTF8String/TeletexString/IA5String/BMPString) since
//! nothing here round-trips a parsed Name back to bytes — signature
//! verification instead re-serializes the whole `tbsCertificate` from its
//! preserved raw bytes.

use wyvern_asn1::element::Element;
use wyvern_asn1::oid::ObjectIdentifier;
use wyvern_asn1::tag::universal;
use wyvern_asn1::value::decode_string;

use crate::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeTypeAndValue {
	pub attribute_type: ObjectIdentifier,
	pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Name {
	pub rdns: Vec<Vec<AttributeTypeAndValue>>,
}

impl Name {
	pub fn decode(el: &Element) -> Result<Self, Error> {
		let rdn_elements = el.as_children().ok_or(Error::Malformed("Name must be a SEQUENCE of RDNs"))?;
		let mut rdns = Vec::with_capacity(rdn_elements.len());
		for rdn_el in rdn_elements {
			let atv_elements = rdn_el.as_children().ok_or(Error::Malformed("RDN must be a SET"))?;
			let mut atvs = Vec::with_capacity(atv_elements.len());
			for atv_el in atv_elements {
				atvs.push(decode_atv(atv_el)?);
			}
			rdns.push(atvs);
		}
		Ok(Name { rdns })
	}

	/// First value of the given attribute OID, searching every RDN in
	/// order (a Name conventionally has at most one `commonName`, but
	/// nothing in DER enforces that).
	pub fn get(&self, attribute_type: &ObjectIdentifier) -> Option<&str> {
		self.rdns.iter().flatten().find(|atv| &atv.attribute_type == attribute_type).map(|atv| atv.value.as_str())
	}

	pub fn common_name(&self) -> Option<&str> {
		self.get(&commonname_oid())
	}

	/// RFC 5280 §7.1's name comparison is defined attribute by attribute
	/// with type-specific string-prep; this applies the same
	/// case-insensitive, whitespace-collapsed comparison to every
	/// attribute value, which matches the common case closely enough for
	/// chain validation and differs from the full RFC rule only for
	/// exotic attribute types this crate does not special-case.
	pub fn matches(&self, other: &Name) -> bool {
		if self.rdns.len() != other.rdns.len() {
			return false;
		}
		self.rdns.iter().zip(other.rdns.iter()).all(|(a, b)| rdn_matches(a, b))
	}

	pub fn to_display_string(&self) -> String {
		let mut parts = Vec::new();
		for rdn in &self.rdns {
			for atv in rdn {
				let label = atv.attribute_type.name().unwrap_or_else(|| atv.attribute_type.to_dotted());
				parts.push(format!("{}={}", label, atv.value));
			}
		}
		parts.join(", ")
	}
}

fn rdn_matches(a: &[AttributeTypeAndValue], b: &[AttributeTypeAndValue]) -> bool {
	if a.len() != b.len() {
		return false;
	}
	a.iter().all(|atv| b.iter().any(|other| atv.attribute_type == other.attribute_type && normalize(&atv.value) == normalize(&other.value)))
}

fn normalize(s: &str) -> String {
	s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

fn decode_atv(el: &Element) -> Result<AttributeTypeAndValue, Error> {
	let children = el.as_children().ok_or(Error::Malformed("AttributeTypeAndValue must be a SEQUENCE"))?;
	if children.len() != 2 {
		return Err(Error::Malformed("AttributeTypeAndValue must have exactly two fields"));
	}
	let attribute_type = wyvern_asn1::value::decode_oid(&children[0])?;
	let value = decode_directory_string(&children[1])?;
	Ok(AttributeTypeAndValue { attribute_type, value })
}

/// `DirectoryString ::= CHOICE { teletexString, printableString,
/// universalString, utf8String, bmpString }` — decoded permissively by
/// whichever tag is actually present rather than matching the CHOICE
/// against the attribute type, since real-world certificates mix these
/// inconsistently.
fn decode_directory_string(el: &Element) -> Result<String, Error> {
	match el.tag {
		universal::BMP_STRING => Ok(wyvern_asn1::value::decode_bmp_string(el)?),
		universal::IA5_STRING | universal::UTF8_STRING | universal::PRINTABLE_STRING => Ok(decode_string(el)?),
		// TeletexString (20) and UniversalString (28): neither has a typed
		// decoder of its own; most certificates in the wild use
		// TeletexString for plain ASCII content, which this forgivingly
		// accepts as UTF-8.
		_ => {
			let body = el.as_primitive().ok_or(Error::Malformed("directory string must be primitive"))?;
			String::from_utf8(body.to_vec()).map_err(|_| Error::Malformed("non-UTF-8 legacy directory string"))
		}
	}
}

fn commonname_oid() -> ObjectIdentifier {
	ObjectIdentifier::from_dotted("2.5.4.3").expect("well-formed constant OID")
}

#[cfg(test)]
mod tests {
	use super::*;
	use wyvern_asn1::element::{decode_der, encode_tlv};
	use wyvern_asn1::tag::TagClass;
	use wyvern_asn1::value::{encode_oid, encode_printable_string};

	fn single_rdn_name(oid: &str, value: &str) -> Name {
		let atv = encode_tlv(
			TagClass::Universal,
			universal::SEQUENCE,
			true,
			&[encode_oid(&ObjectIdentifier::from_dotted(oid).unwrap()), encode_printable_string(value).unwrap()].concat(),
		);
		let rdn = encode_tlv(TagClass::Universal, universal::SET, true, &atv);
		let seq = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &rdn);
		let (el, _) = decode_der(&seq).unwrap();
		Name::decode(&el).unwrap()
	}

	#[test]
	fn common_name_is_extracted() {
		let name = single_rdn_name("2.5.4.3", "example.com");
		assert_eq!(name.common_name(), Some("example.com"));
	}

	#[test]
	fn matches_is_case_and_whitespace_insensitive() {
		let a = single_rdn_name("2.5.4.3", "Example  Corp");
		let b = single_rdn_name("2.5.4.3", "example corp");
		assert!(a.matches(&b));
	}

	#[test]
	fn different_attribute_values_do_not_match() {
		let a = single_rdn_name("2.5.4.3", "example.com");
		let b = single_rdn_name("2.5.4.3", "example.org");
		assert!(!a.matches(&b));
	}
}
