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

//! JSON Web Key (RFC 7517/7518): `kty: "RSA"` and `kty: "EC"`/`"OKP"`
//! members, base64url-no-pad encoded per RFC 7515 appendix C.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use wyvern_bigint::BigInteger;

use crate::Error;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Jwk {
	pub kty: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub crv: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub n: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub e: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub d: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub x: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub y: Option<String>,
}

fn b64(bytes: &[u8]) -> String {
	URL_SAFE_NO_PAD.encode(bytes)
}

fn unb64(s: &str) -> Result<Vec<u8>, Error> {
	URL_SAFE_NO_PAD.decode(s).map_err(|_| Error::Malformed("invalid base64url in JWK member"))
}

pub fn rsa_public_jwk(n: &BigInteger, e: &BigInteger) -> Jwk {
	Jwk {
		kty: "RSA".to_string(),
		crv: None,
		n: Some(b64(&n.to_bytes_be())),
		e: Some(b64(&e.to_bytes_be())),
		d: None,
		x: None,
		y: None,
	}
}

pub fn rsa_private_jwk(n: &BigInteger, e: &BigInteger, d: &BigInteger) -> Jwk {
	let mut jwk = rsa_public_jwk(n, e);
	jwk.d = Some(b64(&d.to_bytes_be()));
	jwk
}

pub fn ec_public_jwk(curve_name: &str, x: &BigInteger, y: &BigInteger) -> Jwk {
	Jwk { kty: "EC".to_string(), crv: Some(curve_name.to_string()), n: None, e: None, d: None, x: Some(b64(&x.to_bytes_be())), y: Some(b64(&y.to_bytes_be())) }
}

/// `OKP` (Octet Key Pair, RFC 8037) for Ed25519/X25519: `x` carries the
/// raw public key, `d` the raw private seed.
pub fn okp_jwk(curve_name: &str, public_key: &[u8], private_key: Option<&[u8]>) -> Jwk {
	Jwk {
		kty: "OKP".to_string(),
		crv: Some(curve_name.to_string()),
		n: None,
		e: None,
		d: private_key.map(b64),
		x: Some(b64(public_key)),
		y: None,
	}
}

pub fn parse(text: &str) -> Result<Jwk, Error> {
	serde_json::from_str(text).map_err(|_| Error::Malformed("invalid JWK JSON"))
}

pub fn to_string(jwk: &Jwk) -> Result<String, Error> {
	serde_json::to_string(jwk).map_err(|_| Error::Malformed("failed to serialize JWK"))
}

pub fn decode_rsa_public(jwk: &Jwk) -> Result<(BigInteger, BigInteger), Error> {
	if jwk.kty != "RSA" {
		return Err(Error::UnsupportedAlgorithm("JWK kty is not RSA"));
	}
	let n = jwk.n.as_deref().ok_or(Error::Malformed("RSA JWK missing n"))?;
	let e = jwk.e.as_deref().ok_or(Error::Malformed("RSA JWK missing e"))?;
	Ok((BigInteger::from_bytes_be(&unb64(n)?, false), BigInteger::from_bytes_be(&unb64(e)?, false)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rsa_jwk_roundtrip() {
		let n = BigInteger::from_u64(3233);
		let e = BigInteger::from_u64(17);
		let jwk = rsa_public_jwk(&n, &e);
		let text = to_string(&jwk).unwrap();
		let back = parse(&text).unwrap();
		let (n2, e2) = decode_rsa_public(&back).unwrap();
		assert_eq!(n, n2);
		assert_eq!(e, e2);
	}

	#[test]
	fn okp_jwk_carries_raw_ed25519_bytes() {
		let jwk = okp_jwk("Ed25519", &[1u8; 32], Some(&[2u8; 32]));
		assert_eq!(jwk.kty, "OKP");
		assert_eq!(jwk.crv.as_deref(), Some("Ed25519"));
	}
}
