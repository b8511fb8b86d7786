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

//! PKCS#8 `PrivateKeyInfo` (RFC 5208) and `SubjectPublicKeyInfo` (RFC 5280
//! §4.1): the algorithm-agnostic wrapper every modern key format (PKCS#8,
//! X.509 `SubjectPublicKeyInfo`, JWK's `alg`) builds on.

use wyvern_asn1::element::{decode_der, encode_tlv};
use wyvern_asn1::oid::ObjectIdentifier;
use wyvern_asn1::tag::{universal, TagClass};
use wyvern_asn1::value::{decode_octet_string, decode_oid, encode_null, encode_octet_string, encode_oid, BitString};
use wyvern_bigint::BigInteger;

use crate::Error;

pub struct PrivateKeyInfo {
	pub algorithm: ObjectIdentifier,
	/// Raw DER of the algorithm-specific private key (e.g. a PKCS#1
	/// `RSAPrivateKey`, or the raw 32-byte Ed25519 seed wrapped in an
	/// OCTET STRING per RFC 8410).
	pub private_key: Vec<u8>,
}

fn algorithm_identifier(oid: &ObjectIdentifier, has_null_params: bool) -> Vec<u8> {
	let mut content = encode_oid(oid);
	if has_null_params {
		content.extend(encode_null());
	}
	encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &content)
}

pub fn encode_private_key_info(info: &PrivateKeyInfo, has_null_params: bool) -> Vec<u8> {
	let parts = [
		wyvern_asn1::value::encode_integer(&BigInteger::zero()),
		algorithm_identifier(&info.algorithm, has_null_params),
		encode_octet_string(&info.private_key),
	]
	.concat();
	encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &parts)
}

pub fn decode_private_key_info(der: &[u8]) -> Result<PrivateKeyInfo, Error> {
	let (el, _) = decode_der(der)?;
	let children = el.as_children().ok_or(wyvern_asn1::Error::Parse("PrivateKeyInfo must be a SEQUENCE"))?;
	if children.len() < 3 {
		return Err(wyvern_asn1::Error::Parse("PrivateKeyInfo missing fields").into());
	}
	let alg_seq = children[1].as_children().ok_or(wyvern_asn1::Error::Parse("AlgorithmIdentifier must be a SEQUENCE"))?;
	let algorithm = decode_oid(alg_seq.first().ok_or(wyvern_asn1::Error::Parse("AlgorithmIdentifier missing OID"))?)?;
	let private_key = decode_octet_string(&children[2])?;
	Ok(PrivateKeyInfo { algorithm, private_key })
}

pub struct SubjectPublicKeyInfo {
	pub algorithm: ObjectIdentifier,
	pub public_key: BitString,
}

pub fn encode_spki(info: &SubjectPublicKeyInfo, has_null_params: bool) -> Vec<u8> {
	let parts = [algorithm_identifier(&info.algorithm, has_null_params), info.public_key.encode()].concat();
	encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &parts)
}

pub fn decode_spki(der: &[u8]) -> Result<SubjectPublicKeyInfo, Error> {
	let (el, _) = decode_der(der)?;
	let children = el.as_children().ok_or(wyvern_asn1::Error::Parse("SubjectPublicKeyInfo must be a SEQUENCE"))?;
	if children.len() != 2 {
		return Err(wyvern_asn1::Error::Parse("SubjectPublicKeyInfo must have exactly two fields").into());
	}
	let alg_seq = children[0].as_children().ok_or(wyvern_asn1::Error::Parse("AlgorithmIdentifier must be a SEQUENCE"))?;
	let algorithm = decode_oid(alg_seq.first().ok_or(wyvern_asn1::Error::Parse("AlgorithmIdentifier missing OID"))?)?;
	let public_key = BitString::decode(&children[1])?;
	Ok(SubjectPublicKeyInfo { algorithm, public_key })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn private_key_info_roundtrip() {
		let oid = ObjectIdentifier::from_dotted("1.2.840.113549.1.1.1").unwrap();
		let info = PrivateKeyInfo { algorithm: oid.clone(), private_key: vec![1, 2, 3, 4] };
		let der = encode_private_key_info(&info, true);
		let back = decode_private_key_info(&der).unwrap();
		assert_eq!(back.algorithm, oid);
		assert_eq!(back.private_key, vec![1, 2, 3, 4]);
	}

	#[test]
	fn spki_roundtrip() {
		let oid = ObjectIdentifier::from_dotted("1.3.101.112").unwrap(); // id-Ed25519
		let info = SubjectPublicKeyInfo { algorithm: oid.clone(), public_key: BitString::from_bytes(vec![9; 32]) };
		let der = encode_spki(&info, false);
		let back = decode_spki(&der).unwrap();
		assert_eq!(back.algorithm, oid);
		assert_eq!(back.public_key.data, vec![9; 32]);
	}
}
