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

//! Netscape `SignedPublicKeyAndChallenge ::= SEQUENCE {
//! publicKeyAndChallenge, signatureAlgorithm, signature }`, the output of
//! the long-deprecated HTML `<keygen>` element: a self-signed proof that the
//! submitter holds the private key matching the enclosed public key, tied
//! to a server-supplied challenge string to prevent replay.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use wyvern_asn1::element::{decode_der, Element};
use wyvern_asn1::schema::Cursor;
use wyvern_asn1::tag::universal;
use wyvern_asn1::value::{decode_string, BitString};

use crate::algorithm::{self, AlgorithmIdentifier, PublicKeyMaterial, SignatureAlgorithm, SubjectPublicKeyInfo};
use crate::Error;

#[derive(Clone, Debug)]
pub struct PublicKeyAndChallenge {
	pub spki: SubjectPublicKeyInfo,
	pub challenge: String,
	/// The exact encoded bytes of this `publicKeyAndChallenge`.
	pub raw: Vec<u8>,
}

impl PublicKeyAndChallenge {
	fn decode(el: &Element) -> Result<Self, Error> {
		let mut cur = Cursor::new(el)?;
		let spki = SubjectPublicKeyInfo::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let challenge = decode_string(cur.next_universal(universal::IA5_STRING)?)?;
		Ok(PublicKeyAndChallenge { spki, challenge, raw: el.raw.clone() })
	}
}

#[derive(Clone, Debug)]
pub struct SignedPublicKeyAndChallenge {
	pub public_key_and_challenge: PublicKeyAndChallenge,
	pub signature_algorithm: AlgorithmIdentifier,
	pub signature_value: Vec<u8>,
}

impl SignedPublicKeyAndChallenge {
	pub fn from_der(der: &[u8]) -> Result<Self, Error> {
		let (el, _) = decode_der(der)?;
		Self::decode(&el)
	}

	/// Browsers historically base64-encoded the raw DER with no PEM armor;
	/// this accepts either that or a proper PEM block.
	pub fn from_base64_or_pem(text: &str) -> Result<Self, Error> {
		let trimmed = text.trim();
		if trimmed.starts_with("-----BEGIN") {
			let block = wyvern_asn1::pem::decode(trimmed)?;
			return Self::from_der(&block.data);
		}
		let der = STANDARD.decode(trimmed.as_bytes()).map_err(|_| Error::Malformed("SPKAC is not valid base64"))?;
		Self::from_der(&der)
	}

	fn decode(el: &Element) -> Result<Self, Error> {
		let mut cur = Cursor::new(el)?;
		let public_key_and_challenge = PublicKeyAndChallenge::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let signature_algorithm = AlgorithmIdentifier::decode(cur.next_universal(universal::SEQUENCE)?)?;
		let signature_value = BitString::decode(cur.next_universal(universal::BIT_STRING)?)?.data;
		Ok(SignedPublicKeyAndChallenge { public_key_and_challenge, signature_algorithm, signature_value })
	}

	pub fn public_key(&self) -> Result<PublicKeyMaterial, Error> {
		algorithm::decode_public_key(&self.public_key_and_challenge.spki)
	}

	pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm, Error> {
		algorithm::signature_algorithm_from_oid(&self.signature_algorithm.oid, self.signature_algorithm.parameters.as_ref())
	}

	/// Like a CSR, an SPKAC proves possession of the private key by signing
	/// its own `publicKeyAndChallenge` with the enclosed public key.
	pub fn verify_signature(&self) -> Result<bool, Error> {
		let public_key = self.public_key()?;
		let sig_alg = self.signature_algorithm()?;
		algorithm::verify(sig_alg, &public_key, &self.public_key_and_challenge.raw, &self.signature_value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wyvern_asn1::element::encode_tlv;
	use wyvern_asn1::oid::ObjectIdentifier;
	use wyvern_asn1::tag::TagClass;
	use wyvern_asn1::value::encode_oid;
	use wyvern_bigint::BigInteger;
	use wyvern_digest::Algorithm as DigestAlgorithm;
	use wyvern_keys::ec::{nist_p256, Curve, Point};
	use wyvern_keys::ecdsa;

	fn build_spkac_der(challenge: &str) -> Vec<u8> {
		let curve = Curve::load(nist_p256());
		let d = BigInteger::from_u64(7);
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

		let challenge_el = encode_tlv(TagClass::Universal, universal::IA5_STRING, false, challenge.as_bytes());
		let pkac = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[spki, challenge_el].concat());

		let ecdsa_sha256_oid = ObjectIdentifier::from_dotted("1.2.840.10045.4.3.2").unwrap();
		let sig_alg_id = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &encode_oid(&ecdsa_sha256_oid));

		let digest = wyvern_digest::Hash::hash(DigestAlgorithm::Sha256, &pkac);
		let sig = ecdsa::sign_deterministic(&curve, &d, &digest, DigestAlgorithm::Sha256);
		let sig_der = wyvern_keys::format::signature_format::encode_asn1(&sig.r, &sig.s);

		let spkac_parts = [pkac, sig_alg_id, BitString::from_bytes(sig_der).encode()].concat();
		encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &spkac_parts)
	}

	#[test]
	fn decodes_challenge_and_verifies() {
		let spkac = SignedPublicKeyAndChallenge::from_der(&build_spkac_der("abc123")).unwrap();
		assert_eq!(spkac.public_key_and_challenge.challenge, "abc123");
		assert!(spkac.verify_signature().unwrap());
	}

	#[test]
	fn from_base64_or_pem_accepts_bare_base64() {
		let der = build_spkac_der("base64-path");
		let encoded = STANDARD.encode(&der);
		let spkac = SignedPublicKeyAndChallenge::from_base64_or_pem(&encoded).unwrap();
		assert_eq!(spkac.public_key_and_challenge.challenge, "base64-path");
	}
}
