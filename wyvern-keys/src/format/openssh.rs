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

//! The two OpenSSH on-disk key encodings: the one-line authorized_keys /
//! `.pub` format (`<algo> <base64-blob> <comment>`), and the "openssh-key-v1"
//! new private key format, including its bcrypt-pbkdf-encrypted variant.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::format::wire::{put_mpint, put_string, put_u32, Reader};
use crate::format::KeyBlob;
use crate::KeyAlgorithm;
use crate::Error;

pub fn encode_public_line(blob: &KeyBlob, comment: &str) -> String {
	format!("{} {} {}", blob.algorithm.ssh_name(), STANDARD.encode(&blob.data), comment)
}

pub fn decode_public_line(line: &str) -> Result<(KeyBlob, String), Error> {
	let mut parts = line.trim().splitn(3, ' ');
	let algo_name = parts.next().ok_or(Error::Malformed("empty public key line"))?;
	let data_b64 = parts.next().ok_or(Error::Malformed("missing base64 field"))?;
	let comment = parts.next().unwrap_or("").to_string();
	let algorithm = algorithm_from_name(algo_name)?;
	let data = STANDARD.decode(data_b64).map_err(|_| Error::Malformed("invalid base64 in public key line"))?;
	Ok((KeyBlob { algorithm, data }, comment))
}

fn algorithm_from_name(name: &str) -> Result<KeyAlgorithm, Error> {
	Ok(match name {
		"ssh-rsa" => KeyAlgorithm::Rsa,
		"ssh-dss" => KeyAlgorithm::Dsa,
		"ssh-ed25519" => KeyAlgorithm::Ed25519,
		"ecdsa-sha2-nistp256" => KeyAlgorithm::EcdsaP256,
		"ecdsa-sha2-nistp384" => KeyAlgorithm::EcdsaP384,
		"ecdsa-sha2-nistp521" => KeyAlgorithm::EcdsaP521,
		"ecdsa-sha2-secp256k1" => KeyAlgorithm::EcdsaSecp256k1,
		_ => return Err(Error::UnsupportedAlgorithm("unknown OpenSSH key type")),
	})
}

/// Build the `ssh-ed25519` public key wire blob: `string "ssh-ed25519"`
/// followed by `string <32-byte public key>`.
pub fn ed25519_public_blob(public_key: &[u8; 32]) -> Vec<u8> {
	let mut out = Vec::new();
	put_string(&mut out, b"ssh-ed25519");
	put_string(&mut out, public_key);
	out
}

/// Build the `ssh-rsa` public key wire blob: `string "ssh-rsa"`, `mpint e`,
/// `mpint n`.
pub fn rsa_public_blob(e: &[u8], n: &[u8]) -> Vec<u8> {
	let mut out = Vec::new();
	put_string(&mut out, b"ssh-rsa");
	put_mpint(&mut out, e);
	put_mpint(&mut out, n);
	out
}

const MAGIC: &[u8] = b"openssh-key-v1\0";

#[derive(Clone, Debug)]
pub struct OpenSshPrivateFile {
	pub cipher_name: String,
	pub kdf_name: String,
	pub kdf_salt: Vec<u8>,
	pub kdf_rounds: u32,
	pub public_blob: Vec<u8>,
	/// The private section, still encrypted if `cipher_name != "none"`.
	pub private_section: Vec<u8>,
}

impl OpenSshPrivateFile {
	pub fn is_encrypted(&self) -> bool {
		self.cipher_name != "none"
	}
}

pub fn parse_private(pem_body: &[u8]) -> Result<OpenSshPrivateFile, Error> {
	let body = pem_body.strip_prefix(MAGIC).ok_or(Error::Malformed("missing openssh-key-v1 magic"))?;
	let mut r = Reader::new(body);
	let cipher_name = String::from_utf8_lossy(r.read_string()?).into_owned();
	let kdf_name = String::from_utf8_lossy(r.read_string()?).into_owned();
	let kdf_options = r.read_string()?;
	let (kdf_salt, kdf_rounds) = if kdf_name == "bcrypt" {
		let mut kr = Reader::new(kdf_options);
		(kr.read_string()?.to_vec(), kr.read_u32()?)
	} else {
		(Vec::new(), 0)
	};
	let n_keys = r.read_u32()?;
	if n_keys != 1 {
		return Err(Error::UnsupportedAlgorithm("only single-key openssh-key-v1 files are supported"));
	}
	let public_blob = r.read_string()?.to_vec();
	let private_section = r.read_string()?.to_vec();
	Ok(OpenSshPrivateFile { cipher_name, kdf_name, kdf_salt, kdf_rounds, public_blob, private_section })
}

/// Decrypt (if necessary) and parse the private section of an
/// `openssh-key-v1` file, returning the raw ed25519 keypair bytes:
/// `(public[32], private_expanded[64], comment)`. Other key types follow
/// the same checkint/padding structure but with different field layouts.
pub fn decrypt_ed25519_private_section(
	file: &OpenSshPrivateFile,
	passphrase: Option<&str>,
) -> Result<([u8; 32], [u8; 64], String), Error> {
	let plaintext = if file.is_encrypted() {
		let passphrase = passphrase.ok_or(Error::MissingPassphrase)?;
		decrypt_section(file, passphrase)?
	} else {
		file.private_section.clone()
	};

	let mut r = Reader::new(&plaintext);
	let check1 = r.read_u32()?;
	let check2 = r.read_u32()?;
	if check1 != check2 {
		return Err(Error::BadPassphrase);
	}
	let _key_type = r.read_string()?;
	let public = r.read_string()?;
	let private = r.read_string()?;
	let comment = String::from_utf8_lossy(r.read_string()?).into_owned();
	if public.len() != 32 || private.len() != 64 {
		return Err(Error::Malformed("unexpected ed25519 key section length"));
	}
	let mut pub_arr = [0u8; 32];
	pub_arr.copy_from_slice(public);
	let mut priv_arr = [0u8; 64];
	priv_arr.copy_from_slice(private);
	Ok((pub_arr, priv_arr, comment))
}

fn decrypt_section(file: &OpenSshPrivateFile, passphrase: &str) -> Result<Vec<u8>, Error> {
	if file.kdf_name != "bcrypt" {
		return Err(Error::UnsupportedAlgorithm("only the bcrypt KDF is supported for openssh-key-v1 passphrases"));
	}
	let (key_len, iv_len) = match file.cipher_name.as_str() {
		"aes256-ctr" | "aes256-cbc" => (32, 16),
		"aes128-ctr" | "aes128-cbc" => (16, 16),
		_ => return Err(Error::UnsupportedAlgorithm("unsupported openssh-key-v1 cipher")),
	};
	let material = wyvern_cipher::kdf::bcrypt_pbkdf(passphrase.as_bytes(), &file.kdf_salt, file.kdf_rounds, key_len + iv_len)?;
	let (key, iv) = material.split_at(key_len);

	let (kind, mode) = match file.cipher_name.as_str() {
		"aes256-ctr" | "aes128-ctr" => (wyvern_cipher::block::BlockCipherKind::Aes, wyvern_cipher::Mode::Ctr),
		"aes256-cbc" | "aes128-cbc" => (wyvern_cipher::block::BlockCipherKind::Aes, wyvern_cipher::Mode::Cbc),
		_ => unreachable!(),
	};
	let mut cipher = wyvern_cipher::Cipher::new(kind, mode, key, iv)?;
	cipher.disable_padding();
	Ok(cipher.decrypt(&file.private_section)?)
}

/// Encode an unencrypted ed25519 `openssh-key-v1` private key file body
/// (everything between the PEM armor lines, already base64'd by the PEM
/// layer).
pub fn encode_ed25519_private(public_key: &[u8; 32], private_key: &[u8; 64], comment: &str) -> Vec<u8> {
	let public_blob = ed25519_public_blob(public_key);

	let mut section = Vec::new();
	let checkint = 0x2a2a2a2au32;
	put_u32(&mut section, checkint);
	put_u32(&mut section, checkint);
	put_string(&mut section, b"ssh-ed25519");
	put_string(&mut section, public_key);
	put_string(&mut section, private_key);
	put_string(&mut section, comment.as_bytes());
	let mut pad = 1u8;
	while section.len() % 8 != 0 {
		section.push(pad);
		pad += 1;
	}

	let mut out = Vec::new();
	out.extend_from_slice(MAGIC);
	put_string(&mut out, b"none");
	put_string(&mut out, b"none");
	put_string(&mut out, b"");
	put_u32(&mut out, 1);
	put_string(&mut out, &public_blob);
	put_string(&mut out, &section);
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn public_line_roundtrip() {
		let blob = KeyBlob { algorithm: KeyAlgorithm::Ed25519, data: ed25519_public_blob(&[7u8; 32]) };
		let line = encode_public_line(&blob, "user@host");
		let (decoded, comment) = decode_public_line(&line).unwrap();
		assert_eq!(decoded.algorithm, KeyAlgorithm::Ed25519);
		assert_eq!(decoded.data, blob.data);
		assert_eq!(comment, "user@host");
	}

	#[test]
	fn unencrypted_ed25519_private_roundtrip() {
		let public = [3u8; 32];
		let private = [9u8; 64];
		let encoded = encode_ed25519_private(&public, &private, "test@host");
		let file = parse_private(&encoded).unwrap();
		assert!(!file.is_encrypted());
		let (pub_out, priv_out, comment) = decrypt_ed25519_private_section(&file, None).unwrap();
		assert_eq!(pub_out, public);
		assert_eq!(priv_out, private);
		assert_eq!(comment, "test@host");
	}
}
