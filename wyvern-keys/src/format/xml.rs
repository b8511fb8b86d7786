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

//! The `<RSAKeyValue>` XML key encoding (the XKMS/`.NET` convention): each
//! field a base64 element, ASCII-only, parsed with a small hand-rolled
//! scanner rather than a general XML library since the shape is this one
//! fixed schema.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use wyvern_bigint::BigInteger;

use crate::Error;

pub fn encode_rsa_public(n: &BigInteger, e: &BigInteger) -> String {
	format!(
		"<RSAKeyValue><Modulus>{}</Modulus><Exponent>{}</Exponent></RSAKeyValue>",
		STANDARD.encode(n.to_bytes_be()),
		STANDARD.encode(e.to_bytes_be())
	)
}

pub fn encode_rsa_private(n: &BigInteger, e: &BigInteger, d: &BigInteger, p: &BigInteger, q: &BigInteger, dp: &BigInteger, dq: &BigInteger, qinv: &BigInteger) -> String {
	let b64 = |v: &BigInteger| STANDARD.encode(v.to_bytes_be());
	format!(
		"<RSAKeyValue><Modulus>{}</Modulus><Exponent>{}</Exponent><P>{}</P><Q>{}</Q><DP>{}</DP><DQ>{}</DQ><InverseQ>{}</InverseQ><D>{}</D></RSAKeyValue>",
		b64(n), b64(e), b64(p), b64(q), b64(dp), b64(dq), b64(qinv), b64(d)
	)
}

fn extract_element<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
	let open = format!("<{}>", tag);
	let close = format!("</{}>", tag);
	let start = xml.find(&open)? + open.len();
	let end = xml[start..].find(&close)? + start;
	Some(&xml[start..end])
}

fn decode_field(xml: &str, tag: &str) -> Result<BigInteger, Error> {
	let field = extract_element(xml, tag).ok_or(Error::Malformed("XML key value missing required field"))?;
	let bytes = STANDARD.decode(field.trim()).map_err(|_| Error::Malformed("invalid base64 in XML key value"))?;
	Ok(BigInteger::from_bytes_be(&bytes, false))
}

pub fn decode_rsa_public(xml: &str) -> Result<(BigInteger, BigInteger), Error> {
	Ok((decode_field(xml, "Modulus")?, decode_field(xml, "Exponent")?))
}

pub fn decode_rsa_private(xml: &str) -> Result<crate::format::pkcs1::RsaPrivateKeyFields, Error> {
	Ok(crate::format::pkcs1::RsaPrivateKeyFields {
		n: decode_field(xml, "Modulus")?,
		e: decode_field(xml, "Exponent")?,
		d: decode_field(xml, "D")?,
		p: decode_field(xml, "P")?,
		q: decode_field(xml, "Q")?,
		dp: decode_field(xml, "DP")?,
		dq: decode_field(xml, "DQ")?,
		qinv: decode_field(xml, "InverseQ")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rsa_public_xml_roundtrip() {
		let n = BigInteger::from_u64(3233);
		let e = BigInteger::from_u64(17);
		let xml = encode_rsa_public(&n, &e);
		let (n2, e2) = decode_rsa_public(&xml).unwrap();
		assert_eq!(n, n2);
		assert_eq!(e, e2);
	}

	#[test]
	fn rsa_private_xml_roundtrip() {
		let n = BigInteger::from_u64(3233);
		let e = BigInteger::from_u64(17);
		let d = BigInteger::from_u64(413);
		let p = BigInteger::from_u64(61);
		let q = BigInteger::from_u64(53);
		let dp = BigInteger::from_u64(53);
		let dq = BigInteger::from_u64(49);
		let qinv = BigInteger::from_u64(38);
		let xml = encode_rsa_private(&n, &e, &d, &p, &q, &dp, &dq, &qinv);
		let back = decode_rsa_private(&xml).unwrap();
		assert_eq!(back.n, n);
		assert_eq!(back.d, d);
	}
}
