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

//! PKCS#12 (RFC 7292) `PFX`: a password-protected bag of private keys,
//! certificates and CRLs. `ContentInfo`/`AuthenticatedSafe`/`SafeContents`
//! are unwrapped down to a flat list of [`SafeBag`]s, decrypting each
//! `encryptedData` content and `pkcs8ShroudedKeyBag` along the way with
//! either the legacy RFC 7292 appendix B PBE schemes or PBES2 (RFC 8018).

use wyvern_asn1::element::{decode_der, encode_tlv, Element};
use wyvern_asn1::oid::ObjectIdentifier;
use wyvern_asn1::schema::{Cursor, Tagging};
use wyvern_asn1::tag::{universal, TagClass};
use wyvern_asn1::value::{decode_bmp_string, decode_integer, decode_octet_string, decode_oid, pkcs12_password_bytes};
use wyvern_bigint::BigInteger;
use wyvern_cipher::block::BlockCipherKind;
use wyvern_cipher::kdf::{pbkdf2, pkcs12_kdf, Pkcs12Purpose};
use wyvern_cipher::{Cipher, Mode};
use wyvern_digest::Algorithm as DigestAlgorithm;
use wyvern_keys::format::pkcs8::PrivateKeyInfo;

use crate::algorithm::AlgorithmIdentifier;
use crate::Error;

const OID_DATA: &str = "1.2.840.113549.1.7.1";
const OID_ENCRYPTED_DATA: &str = "1.2.840.113549.1.7.6";
const OID_PBES2: &str = "1.2.840.113549.1.5.13";
const OID_PBKDF2: &str = "1.2.840.113549.1.5.12";
const OID_KEY_BAG: &str = "1.2.840.113549.1.12.10.1.1";
const OID_PKCS8_SHROUDED_KEY_BAG: &str = "1.2.840.113549.1.12.10.1.2";
const OID_CERT_BAG: &str = "1.2.840.113549.1.12.10.1.3";
const OID_CRL_BAG: &str = "1.2.840.113549.1.12.10.1.4";
const OID_SECRET_BAG: &str = "1.2.840.113549.1.12.10.1.5";
const OID_SAFE_CONTENTS_BAG: &str = "1.2.840.113549.1.12.10.1.6";
const OID_X509_CERTIFICATE: &str = "1.2.840.113549.1.9.22.1";
const OID_FRIENDLY_NAME: &str = "1.2.840.113549.1.9.20";
const OID_LOCAL_KEY_ID: &str = "1.2.840.113549.1.9.21";

/// Registers the PKCS#12-specific OID names this module's bag/attribute
/// dispatch does not strictly need (it matches on dotted strings directly)
/// but which make `ObjectIdentifier::name()` useful for logging bag
/// contents during import.
pub fn register_known_oids() {
	wyvern_asn1::oid::register("keyBag", OID_KEY_BAG);
	wyvern_asn1::oid::register("pkcs8ShroudedKeyBag", OID_PKCS8_SHROUDED_KEY_BAG);
	wyvern_asn1::oid::register("certBag", OID_CERT_BAG);
	wyvern_asn1::oid::register("crlBag", OID_CRL_BAG);
	wyvern_asn1::oid::register("secretBag", OID_SECRET_BAG);
	wyvern_asn1::oid::register("safeContentsBag", OID_SAFE_CONTENTS_BAG);
	wyvern_asn1::oid::register("x509Certificate", OID_X509_CERTIFICATE);
	wyvern_asn1::oid::register("friendlyName", OID_FRIENDLY_NAME);
	wyvern_asn1::oid::register("localKeyID", OID_LOCAL_KEY_ID);
	wyvern_asn1::oid::register("pbeWithSHAAnd128BitRC4", "1.2.840.113549.1.12.1.1");
	wyvern_asn1::oid::register("pbeWithSHAAnd40BitRC4", "1.2.840.113549.1.12.1.2");
	wyvern_asn1::oid::register("pbeWithSHAAnd2-KeyTripleDES-CBC", "1.2.840.113549.1.12.1.4");
	wyvern_asn1::oid::register("pbeWithSHAAnd128BitRC2-CBC", "1.2.840.113549.1.12.1.5");
	wyvern_asn1::oid::register("pbeWithSHAAnd40BitRC2-CBC", "1.2.840.113549.1.12.1.6");
}

pub enum SafeBagKind {
	PrivateKey(PrivateKeyInfo),
	Certificate(Vec<u8>),
	Crl(Vec<u8>),
	Secret { type_oid: ObjectIdentifier, value: Vec<u8> },
}

pub struct SafeBag {
	pub kind: SafeBagKind,
	pub friendly_name: Option<String>,
	pub local_key_id: Option<Vec<u8>>,
}

pub struct Pfx {
	pub version: u8,
	pub bags: Vec<SafeBag>,
}

impl Pfx {
	pub fn from_der(der: &[u8], password: &str) -> Result<Self, Error> {
		let (el, _) = decode_der(der)?;
		Self::decode(&el, password)
	}

	pub fn from_pem(pem: &str, password: &str) -> Result<Self, Error> {
		let block = wyvern_asn1::pem::decode(pem)?;
		Self::from_der(&block.data, password)
	}

	fn decode(el: &Element, password: &str) -> Result<Self, Error> {
		let mut cur = Cursor::new(el)?;
		let version_int = decode_integer(cur.next_universal(universal::INTEGER)?)?;
		let version = version_int.to_bytes_be().last().copied().unwrap_or(3);
		let auth_safe = decode_content_info(cur.next_universal(universal::SEQUENCE)?)?;
		if auth_safe.content_type != OID_DATA {
			return Err(Error::Malformed("PFX authSafe must be of type data"));
		}
		let authenticated_safe_bytes = auth_safe.content.ok_or(Error::Malformed("PFX authSafe has no content"))?;
		let (authenticated_safe_el, _) = decode_der(&authenticated_safe_bytes)?;
		let content_infos = authenticated_safe_el.as_children().ok_or(Error::Malformed("AuthenticatedSafe must be a SEQUENCE"))?;

		let password_bmp = pkcs12_password_bytes(password);
		let mut bags = Vec::new();
		for ci_el in content_infos {
			let ci = decode_content_info(ci_el)?;
			let safe_contents_der = match ci.content_type.as_str() {
				OID_DATA => ci.content.ok_or(Error::Malformed("data ContentInfo has no content"))?,
				OID_ENCRYPTED_DATA => {
					let content = ci.content.ok_or(Error::Malformed("encryptedData ContentInfo has no content"))?;
					decrypt_encrypted_data(&content, &password_bmp)?
				}
				other => return Err(Error::UnsupportedAlgorithm(format!("unsupported AuthenticatedSafe content type {}", other))),
			};
			let (safe_contents_el, _) = decode_der(&safe_contents_der)?;
			let safe_bag_elements = safe_contents_el.as_children().ok_or(Error::Malformed("SafeContents must be a SEQUENCE"))?;
			for bag_el in safe_bag_elements {
				bags.push(decode_safe_bag(bag_el, &password_bmp)?);
			}
		}
		Ok(Pfx { version, bags })
	}

	pub fn certificates(&self) -> impl Iterator<Item = &[u8]> {
		self.bags.iter().filter_map(|b| match &b.kind {
			SafeBagKind::Certificate(der) => Some(der.as_slice()),
			_ => None,
		})
	}

	pub fn private_keys(&self) -> impl Iterator<Item = &PrivateKeyInfo> {
		self.bags.iter().filter_map(|b| match &b.kind {
			SafeBagKind::PrivateKey(info) => Some(info),
			_ => None,
		})
	}

	/// The first bag (of any kind) carrying the given `friendlyName`.
	pub fn find_by_friendly_name(&self, name: &str) -> Option<&SafeBag> {
		self.bags.iter().find(|b| b.friendly_name.as_deref() == Some(name))
	}

	/// The first bag (of any kind) carrying the given `localKeyID`, the
	/// mechanism PKCS#12 uses to pair a certBag with the keyBag/
	/// pkcs8ShroudedKeyBag holding its private key.
	pub fn find_by_local_key_id(&self, id: &[u8]) -> Option<&SafeBag> {
		self.bags.iter().find(|b| b.local_key_id.as_deref() == Some(id))
	}

	/// Re-encodes every bag as a single unencrypted `data` `SafeContents`
	/// inside a single `data` `AuthenticatedSafe` entry, with no `MacData`.
	/// Private keys are written out as plain `keyBag`s rather than
	/// password-shrouded ones, so the result is only as confidential as
	/// whatever stores the bytes — callers re-wrapping a PFX purely to
	/// change its container (e.g. stripping a password before loading a
	/// key into memory) are the intended use, not long-term storage.
	pub fn to_der(&self) -> Vec<u8> {
		let bags_der: Vec<u8> = self.bags.iter().map(encode_safe_bag_from).collect::<Vec<_>>().concat();
		let safe_contents = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &bags_der);
		let data_ci = encode_content_info(OID_DATA, wyvern_asn1::value::encode_octet_string(&safe_contents));
		let authenticated_safe = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &data_ci);
		let auth_safe_ci = encode_content_info(OID_DATA, wyvern_asn1::value::encode_octet_string(&authenticated_safe));
		let parts = [wyvern_asn1::value::encode_integer(&BigInteger::from_u64(self.version as u64)), auth_safe_ci].concat();
		encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &parts)
	}
}

fn encode_content_info(content_type: &str, content: Vec<u8>) -> Vec<u8> {
	let oid = wyvern_asn1::value::encode_oid(&ObjectIdentifier::from_dotted(content_type).expect("built-in content type OID"));
	let wrapped = encode_tlv(TagClass::ContextSpecific, 0, true, &content);
	encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[oid, wrapped].concat())
}

fn encode_safe_bag_from(bag: &SafeBag) -> Vec<u8> {
	let (bag_id, bag_value) = match &bag.kind {
		SafeBagKind::PrivateKey(info) => (OID_KEY_BAG, wyvern_keys::format::pkcs8::encode_private_key_info(info, false)),
		SafeBagKind::Certificate(der) => {
			let type_oid = wyvern_asn1::value::encode_oid(&ObjectIdentifier::from_dotted(OID_X509_CERTIFICATE).unwrap());
			let value = encode_tlv(TagClass::ContextSpecific, 0, true, &wyvern_asn1::value::encode_octet_string(der));
			(OID_CERT_BAG, encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[type_oid, value].concat()))
		}
		SafeBagKind::Crl(der) => {
			let type_oid = wyvern_asn1::value::encode_oid(&ObjectIdentifier::from_dotted("1.2.840.113549.1.9.23.1").unwrap());
			let value = encode_tlv(TagClass::ContextSpecific, 0, true, &wyvern_asn1::value::encode_octet_string(der));
			(OID_CRL_BAG, encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[type_oid, value].concat()))
		}
		SafeBagKind::Secret { value, .. } => (OID_SECRET_BAG, value.clone()),
	};

	let bag_id_oid = wyvern_asn1::value::encode_oid(&ObjectIdentifier::from_dotted(bag_id).unwrap());
	let wrapped_value = encode_tlv(TagClass::ContextSpecific, 0, true, &bag_value);
	let mut parts = vec![bag_id_oid, wrapped_value];
	if let Some(name) = &bag.friendly_name {
		let attr_oid = wyvern_asn1::value::encode_oid(&ObjectIdentifier::from_dotted(OID_FRIENDLY_NAME).unwrap());
		let value_set = encode_tlv(TagClass::Universal, universal::SET, true, &wyvern_asn1::value::encode_bmp_string(name));
		let attr = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[attr_oid, value_set].concat());
		let attrs_set = encode_tlv(TagClass::Universal, universal::SET, true, &attr);
		parts.push(attrs_set);
	}
	encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &parts.concat())
}

struct ContentInfo {
	content_type: String,
	content: Option<Vec<u8>>,
}

fn decode_content_info(el: &Element) -> Result<ContentInfo, Error> {
	let mut cur = Cursor::new(el)?;
	let content_type = decode_oid(cur.next_universal(universal::OBJECT_IDENTIFIER)?)?.to_dotted();
	let content = match cur.next_optional_context(0, Tagging::Explicit)? {
		Some(inner) => Some(match content_type.as_str() {
			OID_DATA => decode_octet_string(inner)?,
			_ => inner.raw.clone(),
		}),
		None => None,
	};
	Ok(ContentInfo { content_type, content })
}

/// `EncryptedData ::= SEQUENCE { version INTEGER, encryptedContentInfo
/// EncryptedContentInfo }`, `EncryptedContentInfo ::= SEQUENCE { contentType
/// OBJECT IDENTIFIER, contentEncryptionAlgorithm AlgorithmIdentifier,
/// encryptedContent [0] IMPLICIT OCTET STRING OPTIONAL }` (RFC 5652 §8).
fn decrypt_encrypted_data(der: &[u8], password_bmp: &[u8]) -> Result<Vec<u8>, Error> {
	let (el, _) = decode_der(der)?;
	let mut cur = Cursor::new(&el)?;
	let _version = cur.next_universal(universal::INTEGER)?;
	let eci_el = cur.next_universal(universal::SEQUENCE)?;
	let mut eci_cur = Cursor::new(eci_el)?;
	let _content_type = eci_cur.next_universal(universal::OBJECT_IDENTIFIER)?;
	let encryption_algorithm = AlgorithmIdentifier::decode(eci_cur.next_universal(universal::SEQUENCE)?)?;
	let encrypted_content = eci_cur
		.next_required_context(0, Tagging::Implicit)?
		.as_primitive()
		.ok_or(Error::Malformed("encryptedContent must be an OCTET STRING"))?
		.to_vec();
	decrypt_pbe(&encryption_algorithm, &encrypted_content, password_bmp)
}

fn decode_safe_bag(el: &Element, password_bmp: &[u8]) -> Result<SafeBag, Error> {
	let mut cur = Cursor::new(el)?;
	let bag_id = decode_oid(cur.next_universal(universal::OBJECT_IDENTIFIER)?)?.to_dotted();
	let bag_value = cur.next_required_context(0, Tagging::Explicit)?.clone();

	let kind = match bag_id.as_str() {
		OID_KEY_BAG => SafeBagKind::PrivateKey(wyvern_keys::format::pkcs8::decode_private_key_info(&bag_value.raw)?),
		OID_PKCS8_SHROUDED_KEY_BAG => {
			let decrypted = decrypt_encrypted_private_key_info(&bag_value.raw, password_bmp)?;
			SafeBagKind::PrivateKey(wyvern_keys::format::pkcs8::decode_private_key_info(&decrypted)?)
		}
		OID_CERT_BAG => SafeBagKind::Certificate(decode_cert_bag(&bag_value, OID_X509_CERTIFICATE)?),
		OID_CRL_BAG => SafeBagKind::Crl(decode_cert_bag(&bag_value, "1.2.840.113549.1.9.23.1")?),
		OID_SECRET_BAG | OID_SAFE_CONTENTS_BAG => SafeBagKind::Secret { type_oid: ObjectIdentifier::from_dotted(&bag_id).expect("dotted OID from decode_oid"), value: bag_value.raw.clone() },
		other => return Err(Error::UnsupportedAlgorithm(format!("unsupported SafeBag type {}", other))),
	};

	let (friendly_name, local_key_id) = match cur.next_collection() {
		Ok(attrs) => decode_bag_attributes(attrs)?,
		Err(_) => (None, None),
	};
	Ok(SafeBag { kind, friendly_name, local_key_id })
}

fn decode_cert_bag(cert_bag_el: &Element, expected_type_oid: &str) -> Result<Vec<u8>, Error> {
	let mut cur = Cursor::new(cert_bag_el)?;
	let type_oid = decode_oid(cur.next_universal(universal::OBJECT_IDENTIFIER)?)?.to_dotted();
	if type_oid != expected_type_oid {
		return Err(Error::UnsupportedAlgorithm(format!("unsupported CertBag/CrlBag type {}", type_oid)));
	}
	let value_el = cur.next_required_context(0, Tagging::Explicit)?;
	decode_octet_string(value_el).map_err(Error::from)
}

fn decode_bag_attributes(attrs: &[Element]) -> Result<(Option<String>, Option<Vec<u8>>), Error> {
	let mut friendly_name = None;
	let mut local_key_id = None;
	for attr_el in attrs {
		let mut cur = Cursor::new(attr_el)?;
		let attr_id = decode_oid(cur.next_universal(universal::OBJECT_IDENTIFIER)?)?.to_dotted();
		let values = cur.next_collection()?;
		match attr_id.as_str() {
			OID_FRIENDLY_NAME => {
				if let Some(v) = values.first() {
					friendly_name = Some(decode_bmp_string(v)?);
				}
			}
			OID_LOCAL_KEY_ID => {
				if let Some(v) = values.first() {
					local_key_id = Some(decode_octet_string(v)?);
				}
			}
			_ => {}
		}
	}
	Ok((friendly_name, local_key_id))
}

fn decrypt_encrypted_private_key_info(der: &[u8], password_bmp: &[u8]) -> Result<Vec<u8>, Error> {
	let (el, _) = decode_der(der)?;
	let mut cur = Cursor::new(&el)?;
	let encryption_algorithm = AlgorithmIdentifier::decode(cur.next_universal(universal::SEQUENCE)?)?;
	let encrypted_data = decode_octet_string(cur.next_universal(universal::OCTET_STRING)?)?;
	decrypt_pbe(&encryption_algorithm, &encrypted_data, password_bmp)
}

fn decrypt_pbe(alg: &AlgorithmIdentifier, ciphertext: &[u8], password_bmp: &[u8]) -> Result<Vec<u8>, Error> {
	match alg.oid.to_dotted().as_str() {
		OID_PBES2 => decrypt_pbes2(alg, ciphertext, password_bmp),
		legacy => decrypt_legacy_pbe(legacy, alg, ciphertext, password_bmp),
	}
}

enum LegacyCipher {
	Rc4 { key_len: usize },
	BlockCbc { kind: BlockCipherKind, key_len: usize },
}

fn legacy_cipher_for_oid(oid: &str) -> Result<LegacyCipher, Error> {
	match oid {
		"1.2.840.113549.1.12.1.1" => Ok(LegacyCipher::Rc4 { key_len: 16 }),
		"1.2.840.113549.1.12.1.2" => Ok(LegacyCipher::Rc4 { key_len: 5 }),
		"1.2.840.113549.1.12.1.3" => Ok(LegacyCipher::BlockCbc { kind: BlockCipherKind::TripleDes, key_len: 24 }),
		"1.2.840.113549.1.12.1.4" => Ok(LegacyCipher::BlockCbc { kind: BlockCipherKind::TripleDes, key_len: 16 }),
		"1.2.840.113549.1.12.1.5" => Ok(LegacyCipher::BlockCbc { kind: BlockCipherKind::Rc2, key_len: 16 }),
		"1.2.840.113549.1.12.1.6" => Ok(LegacyCipher::BlockCbc { kind: BlockCipherKind::Rc2, key_len: 5 }),
		other => Err(Error::UnsupportedAlgorithm(format!("unsupported PKCS#12 PBE algorithm {}", other))),
	}
}

/// `PBEParameter ::= SEQUENCE { salt OCTET STRING, iterations INTEGER }`
/// (RFC 7292 appendix C), keys derived via [`pkcs12_kdf`] (always SHA-1, per
/// the algorithm's own name).
fn decrypt_legacy_pbe(oid: &str, alg: &AlgorithmIdentifier, ciphertext: &[u8], password_bmp: &[u8]) -> Result<Vec<u8>, Error> {
	let cipher = legacy_cipher_for_oid(oid)?;
	let params_el = alg.parameters.as_ref().ok_or(Error::Malformed("PKCS#12 PBE algorithm missing PBEParameter"))?;
	let mut cur = Cursor::new(params_el)?;
	let salt = decode_octet_string(cur.next_universal(universal::OCTET_STRING)?)?;
	let iterations = int_to_u32(&decode_integer(cur.next_universal(universal::INTEGER)?)?);

	match cipher {
		LegacyCipher::Rc4 { key_len } => {
			let key = pkcs12_kdf(DigestAlgorithm::Sha1, password_bmp, &salt, iterations, Pkcs12Purpose::Key, key_len);
			let mut handle = wyvern_cipher::StreamCipherHandle::new_rc4(&key)?;
			let mut buf = ciphertext.to_vec();
			handle.apply(&mut buf);
			Ok(buf)
		}
		LegacyCipher::BlockCbc { kind, key_len } => {
			let key = pkcs12_kdf(DigestAlgorithm::Sha1, password_bmp, &salt, iterations, Pkcs12Purpose::Key, key_len);
			let iv = pkcs12_kdf(DigestAlgorithm::Sha1, password_bmp, &salt, iterations, Pkcs12Purpose::Iv, kind.block_size());
			let mut c = Cipher::new(kind, Mode::Cbc, &key, &iv)?;
			Ok(c.decrypt(ciphertext)?)
		}
	}
}

/// PBES2 (RFC 8018 §6.2): `PBES2-params ::= SEQUENCE { keyDerivationFunc
/// AlgorithmIdentifier, encryptionScheme AlgorithmIdentifier }`. Only
/// PBKDF2 key derivation is supported, matching every PKCS#12 writer in
/// practice (no other KDF is registered under PBES2's OID arc in the wild).
fn decrypt_pbes2(alg: &AlgorithmIdentifier, ciphertext: &[u8], password_bmp: &[u8]) -> Result<Vec<u8>, Error> {
	let params_el = alg.parameters.as_ref().ok_or(Error::Malformed("PBES2 missing PBES2-params"))?;
	let mut cur = Cursor::new(params_el)?;
	let kdf = AlgorithmIdentifier::decode(cur.next_universal(universal::SEQUENCE)?)?;
	let encryption_scheme = AlgorithmIdentifier::decode(cur.next_universal(universal::SEQUENCE)?)?;
	if kdf.oid.to_dotted() != OID_PBKDF2 {
		return Err(Error::UnsupportedAlgorithm("PBES2 key derivation function other than PBKDF2".into()));
	}
	let kdf_params_el = kdf.parameters.as_ref().ok_or(Error::Malformed("PBKDF2 missing PBKDF2-params"))?;
	let mut kdf_cur = Cursor::new(kdf_params_el)?;
	let salt = decode_octet_string(kdf_cur.next_universal(universal::OCTET_STRING)?)?;
	let iteration_count = int_to_u32(&decode_integer(kdf_cur.next_universal(universal::INTEGER)?)?);

	let (kind, key_len) = aes_cbc_kind(&encryption_scheme.oid.to_dotted())?;
	let iv_el = encryption_scheme.parameters.as_ref().ok_or(Error::Malformed("AES-CBC encryptionScheme missing IV"))?;
	let iv = decode_octet_string(iv_el)?;

	// Passwords under PBES2/PBKDF2 are plain UTF-8 octets, not the
	// PKCS#12-style null-terminated BMPString used by the legacy PBE
	// schemes above, so undo `pkcs12_password_bytes`'s BMPString encoding.
	let password_utf8 = bmp_to_utf8(password_bmp)?;
	let key = pbkdf2(DigestAlgorithm::Sha1, password_utf8.as_bytes(), &salt, iteration_count, key_len)?;
	let mut c = Cipher::new(kind, Mode::Cbc, &key, &iv)?;
	Ok(c.decrypt(ciphertext)?)
}

fn aes_cbc_kind(oid: &str) -> Result<(BlockCipherKind, usize), Error> {
	match oid {
		"2.16.840.1.101.3.4.1.2" => Ok((BlockCipherKind::Aes, 16)),
		"2.16.840.1.101.3.4.1.22" => Ok((BlockCipherKind::Aes, 24)),
		"2.16.840.1.101.3.4.1.42" => Ok((BlockCipherKind::Aes, 32)),
		other => Err(Error::UnsupportedAlgorithm(format!("unsupported PBES2 encryption scheme {}", other))),
	}
}

fn bmp_to_utf8(password_bmp: &[u8]) -> Result<String, Error> {
	let units: Vec<u16> = password_bmp[..password_bmp.len().saturating_sub(2)].chunks(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
	String::from_utf16(&units).map_err(|_| Error::Malformed("password is not valid UTF-16"))
}

fn int_to_u32(n: &BigInteger) -> u32 {
	let bytes = n.to_bytes_be();
	let mut buf = [0u8; 4];
	let start = bytes.len().saturating_sub(4);
	for (i, &b) in bytes[start..].iter().enumerate() {
		buf[4 - (bytes.len() - start) + i] = b;
	}
	u32::from_be_bytes(buf)
}

/// Builds a minimal `SafeBag ::= SEQUENCE { bagId, bagValue [0] EXPLICIT,
/// bagAttributes SET OF PKCS12Attribute OPTIONAL }`, used by tests below to
/// assemble a PFX without a real `openssl pkcs12` fixture on disk.
#[cfg(test)]
fn encode_safe_bag(bag_id: &str, bag_value: Vec<u8>, friendly_name: Option<&str>) -> Vec<u8> {
	let bag_id_oid = wyvern_asn1::value::encode_oid(&ObjectIdentifier::from_dotted(bag_id).unwrap());
	let wrapped_value = encode_tlv(TagClass::ContextSpecific, 0, true, &bag_value);
	let mut parts = vec![bag_id_oid, wrapped_value];
	if let Some(name) = friendly_name {
		let attr_oid = wyvern_asn1::value::encode_oid(&ObjectIdentifier::from_dotted(OID_FRIENDLY_NAME).unwrap());
		let value_set = encode_tlv(TagClass::Universal, universal::SET, true, &wyvern_asn1::value::encode_bmp_string(name));
		let attr = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[attr_oid, value_set].concat());
		let attrs_set = encode_tlv(TagClass::Universal, universal::SET, true, &attr);
		parts.push(attrs_set);
	}
	encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &parts.concat())
}

#[cfg(test)]
mod tests {
	use super::*;
	use wyvern_asn1::value::{encode_integer, encode_octet_string, encode_oid};

	fn wrap_content_info(content_type: &str, content: Vec<u8>) -> Vec<u8> {
		let oid = encode_oid(&ObjectIdentifier::from_dotted(content_type).unwrap());
		let wrapped = encode_tlv(TagClass::ContextSpecific, 0, true, &content);
		encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[oid, wrapped].concat())
	}

	fn build_unencrypted_pfx(cert_der: &[u8], friendly_name: &str) -> Vec<u8> {
		let cert_bag_value = {
			let type_oid = encode_oid(&ObjectIdentifier::from_dotted(OID_X509_CERTIFICATE).unwrap());
			let value = encode_tlv(TagClass::ContextSpecific, 0, true, &encode_octet_string(cert_der));
			encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[type_oid, value].concat())
		};
		let cert_bag = encode_safe_bag(OID_CERT_BAG, cert_bag_value, Some(friendly_name));
		let safe_contents = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &cert_bag);

		let data_ci = wrap_content_info(OID_DATA, encode_octet_string(&safe_contents));
		let authenticated_safe = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &data_ci);

		let auth_safe_ci = wrap_content_info(OID_DATA, encode_octet_string(&authenticated_safe));
		let parts = [encode_integer(&BigInteger::from_u64(3)), auth_safe_ci].concat();
		encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &parts)
	}

	#[test]
	fn decodes_unencrypted_certificate_bag() {
		let cert_der = b"not a real certificate, just bytes to round-trip".to_vec();
		let pfx_der = build_unencrypted_pfx(&cert_der, "my-cert");
		let pfx = Pfx::from_der(&pfx_der, "password").unwrap();
		assert_eq!(pfx.version, 3);
		let certs: Vec<&[u8]> = pfx.certificates().collect();
		assert_eq!(certs, vec![cert_der.as_slice()]);
		assert!(pfx.find_by_friendly_name("my-cert").is_some());
		assert!(pfx.find_by_friendly_name("no-such-name").is_none());
	}

	#[test]
	fn to_der_round_trips_without_a_password() {
		let cert_der = b"another certificate's DER bytes".to_vec();
		let pfx_der = build_unencrypted_pfx(&cert_der, "reexported");
		let pfx = Pfx::from_der(&pfx_der, "password").unwrap();

		let reencoded = pfx.to_der();
		let reloaded = Pfx::from_der(&reencoded, "").unwrap();
		let certs: Vec<&[u8]> = reloaded.certificates().collect();
		assert_eq!(certs, vec![cert_der.as_slice()]);
		assert!(reloaded.find_by_friendly_name("reexported").is_some());
	}

	#[test]
	fn legacy_pbe_3des_round_trips() {
		let plaintext = b"super secret private key bytes".to_vec();
		let salt = b"saltsalt".to_vec();
		let iterations = 2048u32;
		let password_bmp = pkcs12_password_bytes("hunter2");
		let key = pkcs12_kdf(DigestAlgorithm::Sha1, &password_bmp, &salt, iterations, Pkcs12Purpose::Key, 24);
		let iv = pkcs12_kdf(DigestAlgorithm::Sha1, &password_bmp, &salt, iterations, Pkcs12Purpose::Iv, 8);
		let mut enc = Cipher::new(BlockCipherKind::TripleDes, Mode::Cbc, &key, &iv).unwrap();
		let ciphertext = enc.encrypt(&plaintext).unwrap();

		let params = encode_tlv(
			TagClass::Universal,
			universal::SEQUENCE,
			true,
			&[encode_octet_string(&salt), encode_integer(&BigInteger::from_u64(iterations as u64))].concat(),
		);
		let alg = AlgorithmIdentifier {
			oid: ObjectIdentifier::from_dotted("1.2.840.113549.1.12.1.3").unwrap(),
			parameters: Some(decode_der(&params).unwrap().0),
		};
		let decrypted = decrypt_pbe(&alg, &ciphertext, &password_bmp).unwrap();
		assert_eq!(decrypted, plaintext);
	}
}
