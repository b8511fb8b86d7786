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

//! The four serializations a DSA/ECDSA `(r, s)` pair can appear in on the
//! wire: `ASN.1` (`Ecdsa-Sig-Value ::= SEQUENCE { r INTEGER, s INTEGER }`),
//! `IEEE-P1363` (fixed-width `r || s`), the SSH2 wire form (each of `r`/`s`
//! as its own `mpint`, the pair wrapped in an outer `string`), and `Raw`
//! (an alias for IEEE-P1363 used by some plugins).

use wyvern_asn1::element::{decode_der, encode_tlv};
use wyvern_asn1::tag::{universal, TagClass};
use wyvern_asn1::value::{decode_integer, encode_integer};
use wyvern_bigint::BigInteger;

use crate::format::wire::{put_mpint, Reader};
use crate::Error;

pub fn encode_asn1(r: &BigInteger, s: &BigInteger) -> Vec<u8> {
	let content = [encode_integer(r), encode_integer(s)].concat();
	encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &content)
}

pub fn decode_asn1(der: &[u8]) -> Result<(BigInteger, BigInteger), Error> {
	let (el, _) = decode_der(der)?;
	let children = el.as_children().ok_or(wyvern_asn1::Error::Parse("Ecdsa-Sig-Value must be a SEQUENCE"))?;
	if children.len() != 2 {
		return Err(wyvern_asn1::Error::Parse("Ecdsa-Sig-Value must have exactly two INTEGERs").into());
	}
	Ok((decode_integer(&children[0])?, decode_integer(&children[1])?))
}

/// `r || s`, each left-padded to `field_width` bytes.
pub fn encode_ieee_p1363(r: &BigInteger, s: &BigInteger, field_width: usize) -> Vec<u8> {
	let mut out = Vec::with_capacity(field_width * 2);
	out.extend_from_slice(&r.to_bytes_be_padded(field_width));
	out.extend_from_slice(&s.to_bytes_be_padded(field_width));
	out
}

pub fn decode_ieee_p1363(bytes: &[u8]) -> Result<(BigInteger, BigInteger), Error> {
	if bytes.len() % 2 != 0 {
		return Err(Error::Malformed("IEEE-P1363 signature must have even length"));
	}
	let (r, s) = bytes.split_at(bytes.len() / 2);
	Ok((BigInteger::from_bytes_be(r, false), BigInteger::from_bytes_be(s, false)))
}

/// SSH2 wire form used by `ecdsa-sha2-*` signature blobs: `mpint r`
/// followed by `mpint s`.
pub fn encode_ssh2(r: &BigInteger, s: &BigInteger) -> Vec<u8> {
	let mut out = Vec::new();
	put_mpint(&mut out, &r.to_bytes_be());
	put_mpint(&mut out, &s.to_bytes_be());
	out
}

pub fn decode_ssh2(bytes: &[u8]) -> Result<(BigInteger, BigInteger), Error> {
	let mut reader = Reader::new(bytes);
	let r = reader.read_string()?;
	let s = reader.read_string()?;
	Ok((BigInteger::from_bytes_be(r, false), BigInteger::from_bytes_be(s, false)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn asn1_roundtrip() {
		let r = BigInteger::from_u64(12345);
		let s = BigInteger::from_u64(67890);
		let der = encode_asn1(&r, &s);
		let (r2, s2) = decode_asn1(&der).unwrap();
		assert_eq!((r, s), (r2, s2));
	}

	#[test]
	fn ieee_p1363_roundtrip_is_fixed_width() {
		let r = BigInteger::from_u64(5);
		let s = BigInteger::from_u64(300);
		let encoded = encode_ieee_p1363(&r, &s, 4);
		assert_eq!(encoded.len(), 8);
		let (r2, s2) = decode_ieee_p1363(&encoded).unwrap();
		assert_eq!((r, s), (r2, s2));
	}

	#[test]
	fn ssh2_roundtrip() {
		let r = BigInteger::from_u64(999999);
		let s = BigInteger::from_u64(123);
		let wire = encode_ssh2(&r, &s);
		let (r2, s2) = decode_ssh2(&wire).unwrap();
		assert_eq!((r, s), (r2, s2));
	}
}
