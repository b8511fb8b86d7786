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

//! Typed accessors over [`crate::element::Element`]: `OctetString`,
//! `UTF8String`, `PrintableString`, `ObjectIdentifier`, `Integer`,
//! `BitString`, `BmpString`, and canonicalized time values, each knowing how
//! to round-trip to and from its DER encoding.

use wyvern_bigint::BigInteger;

use crate::element::{encode_tlv, Body, Element};
use crate::oid::ObjectIdentifier;
use crate::tag::{universal, TagClass};
use crate::Error;

#[derive(Clone, Debug)]
pub struct BitString {
	pub unused_bits: u8,
	pub data: Vec<u8>,
}

impl BitString {
	pub fn from_bytes(data: Vec<u8>) -> Self {
		BitString { unused_bits: 0, data }
	}

	pub fn encode(&self) -> Vec<u8> {
		let mut content = Vec::with_capacity(self.data.len() + 1);
		content.push(self.unused_bits);
		content.extend_from_slice(&self.data);
		encode_tlv(TagClass::Universal, universal::BIT_STRING, false, &content)
	}

	pub fn decode(el: &Element) -> Result<Self, Error> {
		let body = el.as_primitive().ok_or(Error::Parse("BIT STRING must be primitive"))?;
		let (&unused, data) = body.split_first().ok_or(Error::Parse("empty BIT STRING"))?;
		if unused > 7 {
			return Err(Error::Parse("BIT STRING unused-bit count out of range"));
		}
		Ok(BitString { unused_bits: unused, data: data.to_vec() })
	}
}

pub fn encode_integer(value: &BigInteger) -> Vec<u8> {
	let bytes = value.to_signed_bytes_be();
	let bytes = if bytes.is_empty() { vec![0] } else { bytes };
	encode_tlv(TagClass::Universal, universal::INTEGER, false, &bytes)
}

pub fn decode_integer(el: &Element) -> Result<BigInteger, Error> {
	let body = el.as_primitive().ok_or(Error::Parse("INTEGER must be primitive"))?;
	if body.is_empty() {
		return Err(Error::Parse("empty INTEGER"));
	}
	Ok(BigInteger::from_bytes_be(body, true))
}

pub fn encode_octet_string(data: &[u8]) -> Vec<u8> {
	encode_tlv(TagClass::Universal, universal::OCTET_STRING, false, data)
}

pub fn decode_octet_string(el: &Element) -> Result<Vec<u8>, Error> {
	el.as_primitive().map(|b| b.to_vec()).ok_or(Error::Parse("OCTET STRING must be primitive"))
}

pub fn encode_oid(oid: &ObjectIdentifier) -> Vec<u8> {
	encode_tlv(TagClass::Universal, universal::OBJECT_IDENTIFIER, false, &oid.encode())
}

pub fn decode_oid(el: &Element) -> Result<ObjectIdentifier, Error> {
	let body = el.as_primitive().ok_or(Error::Parse("OBJECT IDENTIFIER must be primitive"))?;
	ObjectIdentifier::decode(body)
}

pub fn encode_utf8_string(s: &str) -> Vec<u8> {
	encode_tlv(TagClass::Universal, universal::UTF8_STRING, false, s.as_bytes())
}

pub fn encode_printable_string(s: &str) -> Result<Vec<u8>, Error> {
	if !s.bytes().all(|b| b.is_ascii_alphanumeric() || b" '()+,-./:=?".contains(&b)) {
		return Err(Error::Parse("invalid PrintableString character"));
	}
	Ok(encode_tlv(TagClass::Universal, universal::PRINTABLE_STRING, false, s.as_bytes()))
}

pub fn decode_string(el: &Element) -> Result<String, Error> {
	let body = el.as_primitive().ok_or(Error::Parse("string type must be primitive"))?;
	String::from_utf8(body.to_vec()).map_err(|_| Error::Parse("invalid UTF-8 in string type"))
}

/// BMPString is UTF-16BE; used for PKCS#12 passwords and some legacy DNs.
pub fn encode_bmp_string(s: &str) -> Vec<u8> {
	let mut content = Vec::with_capacity(s.len() * 2);
	for unit in s.encode_utf16() {
		content.extend_from_slice(&unit.to_be_bytes());
	}
	encode_tlv(TagClass::Universal, universal::BMP_STRING, false, &content)
}

pub fn decode_bmp_string(el: &Element) -> Result<String, Error> {
	let body = el.as_primitive().ok_or(Error::Parse("BMPString must be primitive"))?;
	if body.len() % 2 != 0 {
		return Err(Error::Parse("BMPString has odd byte length"));
	}
	let units: Vec<u16> = body.chunks(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
	String::from_utf16(&units).map_err(|_| Error::Parse("invalid UTF-16 in BMPString"))
}

/// A PKCS#12 password: BMPString-encoded, null-terminated, per RFC 7292.
pub fn pkcs12_password_bytes(password: &str) -> Vec<u8> {
	let mut out = Vec::with_capacity(password.len() * 2 + 2);
	for unit in password.encode_utf16() {
		out.extend_from_slice(&unit.to_be_bytes());
	}
	out.extend_from_slice(&[0, 0]);
	out
}

/// Canonical civil time parsed from UTCTime (`YYMMDDHHMMSS(Z)`, seconds
/// optional) or GeneralizedTime (`YYYYMMDDHHMMSS(.fff)?Z`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time {
	pub year: u16,
	pub month: u8,
	pub day: u8,
	pub hour: u8,
	pub minute: u8,
	pub second: u8,
}

pub fn decode_utc_time(el: &Element) -> Result<Time, Error> {
	let s = decode_string(el)?;
	let digits = s.strip_suffix('Z').ok_or(Error::Parse("UTCTime must be Zulu"))?;
	let (yy, rest) = digits.split_at(2);
	let (mm, rest) = rest.split_at(2);
	let (dd, rest) = rest.split_at(2);
	let (hh, rest) = rest.split_at(2);
	let (mi, rest) = rest.split_at(2);
	let ss = if rest.len() >= 2 { &rest[..2] } else { "00" };
	let yy: u16 = yy.parse().map_err(|_| Error::Parse("bad UTCTime year"))?;
	// RFC 5280 §4.1.2.5.1: YY >= 50 => 19YY, else 20YY.
	let year = if yy >= 50 { 1900 + yy } else { 2000 + yy };
	Ok(Time {
		year,
		month: mm.parse().map_err(|_| Error::Parse("bad UTCTime month"))?,
		day: dd.parse().map_err(|_| Error::Parse("bad UTCTime day"))?,
		hour: hh.parse().map_err(|_| Error::Parse("bad UTCTime hour"))?,
		minute: mi.parse().map_err(|_| Error::Parse("bad UTCTime minute"))?,
		second: ss.parse().map_err(|_| Error::Parse("bad UTCTime second"))?,
	})
}

pub fn decode_generalized_time(el: &Element) -> Result<Time, Error> {
	let s = decode_string(el)?;
	let digits = s.strip_suffix('Z').ok_or(Error::Parse("GeneralizedTime must be Zulu"))?;
	let digits = digits.split('.').next().unwrap_or(digits);
	if digits.len() != 14 {
		return Err(Error::Parse("GeneralizedTime must be YYYYMMDDHHMMSS"));
	}
	let year: u16 = digits[0..4].parse().map_err(|_| Error::Parse("bad GeneralizedTime year"))?;
	Ok(Time {
		year,
		month: digits[4..6].parse().map_err(|_| Error::Parse("bad GeneralizedTime month"))?,
		day: digits[6..8].parse().map_err(|_| Error::Parse("bad GeneralizedTime day"))?,
		hour: digits[8..10].parse().map_err(|_| Error::Parse("bad GeneralizedTime hour"))?,
		minute: digits[10..12].parse().map_err(|_| Error::Parse("bad GeneralizedTime minute"))?,
		second: digits[12..14].parse().map_err(|_| Error::Parse("bad GeneralizedTime second"))?,
	})
}

/// Encode as UTCTime when the year fits (1950-2049), else GeneralizedTime,
/// matching RFC 5280's rule for certificate validity fields.
pub fn encode_time(t: Time) -> Vec<u8> {
	if (1950..2050).contains(&t.year) {
		let yy = if t.year >= 2000 { t.year - 2000 } else { t.year - 1900 };
		let s = format!("{:02}{:02}{:02}{:02}{:02}{:02}Z", yy, t.month, t.day, t.hour, t.minute, t.second);
		encode_tlv(TagClass::Universal, universal::UTC_TIME, false, s.as_bytes())
	} else {
		let s = format!(
			"{:04}{:02}{:02}{:02}{:02}{:02}Z",
			t.year, t.month, t.day, t.hour, t.minute, t.second
		);
		encode_tlv(TagClass::Universal, universal::GENERALIZED_TIME, false, s.as_bytes())
	}
}

pub fn encode_null() -> Vec<u8> {
	encode_tlv(TagClass::Universal, universal::NULL, false, &[])
}

pub fn encode_boolean(b: bool) -> Vec<u8> {
	encode_tlv(TagClass::Universal, universal::BOOLEAN, false, &[if b { 0xff } else { 0x00 }])
}

pub fn decode_boolean(el: &Element) -> Result<bool, Error> {
	let body = el.as_primitive().ok_or(Error::Parse("BOOLEAN must be primitive"))?;
	match body {
		[0x00] => Ok(false),
		[_] => Ok(true),
		_ => Err(Error::Parse("BOOLEAN must be a single byte")),
	}
}

pub fn wrap_explicit(class: TagClass, tag: u32, inner: &[u8]) -> Vec<u8> {
	encode_tlv(class, tag, true, inner)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn integer_roundtrip_negative() {
		let n = BigInteger::from_i64(-1);
		let encoded = encode_integer(&n);
		let (el, _) = crate::element::decode_der(&encoded).unwrap();
		assert_eq!(decode_integer(&el).unwrap(), n);
	}

	#[test]
	fn utc_time_pivots_on_50() {
		let (el, _) = crate::element::decode_der(&encode_tlv(
			TagClass::Universal,
			universal::UTC_TIME,
			false,
			b"491231235959Z",
		))
		.unwrap();
		assert_eq!(decode_utc_time(&el).unwrap().year, 2049);
		let (el2, _) = crate::element::decode_der(&encode_tlv(
			TagClass::Universal,
			universal::UTC_TIME,
			false,
			b"500101000000Z",
		))
		.unwrap();
		assert_eq!(decode_utc_time(&el2).unwrap().year, 1950);
	}

	#[test]
	fn bmp_string_roundtrip() {
		let encoded = encode_bmp_string("hi");
		let (el, _) = crate::element::decode_der(&encoded).unwrap();
		assert_eq!(decode_bmp_string(&el).unwrap(), "hi");
	}

	#[test]
	fn bit_string_roundtrip() {
		let bs = BitString { unused_bits: 3, data: vec![0xF0] };
		let encoded = bs.encode();
		let (el, _) = crate::element::decode_der(&encoded).unwrap();
		let back = BitString::decode(&el).unwrap();
		assert_eq!(back.unused_bits, 3);
		assert_eq!(back.data, vec![0xF0]);
	}
}
