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

//! PuTTY's classic `.ppk` (version 2) private key file: a small text
//! header followed by base64 public/private sections, AES-256-CBC
//! encrypted under a key derived from two rounds of SHA-1 over the
//! passphrase, with an HMAC-SHA1 integrity tag over the plaintext.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use wyvern_cipher::block::BlockCipherKind;
use wyvern_cipher::{Cipher, Mode};
use wyvern_digest::Algorithm;

use crate::Error;

#[derive(Clone, Debug)]
pub struct PuttyKeyFile {
	pub algorithm: String,
	pub encryption: String,
	pub comment: String,
	pub public_blob: Vec<u8>,
	pub private_blob: Vec<u8>,
	pub private_mac: Vec<u8>,
}

impl PuttyKeyFile {
	pub fn is_encrypted(&self) -> bool {
		self.encryption != "none"
	}
}

pub fn parse(text: &str) -> Result<PuttyKeyFile, Error> {
	let mut lines = text.lines();
	let header = lines.next().ok_or(Error::Malformed("empty .ppk file"))?;
	let algorithm = header
		.strip_prefix("PuTTY-User-Key-File-2: ")
		.ok_or(Error::Malformed("not a PuTTY v2 key file"))?
		.trim()
		.to_string();

	let mut fields = std::collections::HashMap::new();
	let mut public_b64 = String::new();
	let mut private_b64 = String::new();
	let mut private_mac = String::new();

	while let Some(line) = lines.next() {
		if let Some(rest) = line.strip_prefix("Public-Lines: ") {
			let n: usize = rest.trim().parse().map_err(|_| Error::Malformed("bad Public-Lines count"))?;
			for _ in 0..n {
				public_b64.push_str(lines.next().ok_or(Error::Malformed("truncated public section"))?.trim());
			}
		} else if let Some(rest) = line.strip_prefix("Private-Lines: ") {
			let n: usize = rest.trim().parse().map_err(|_| Error::Malformed("bad Private-Lines count"))?;
			for _ in 0..n {
				private_b64.push_str(lines.next().ok_or(Error::Malformed("truncated private section"))?.trim());
			}
		} else if let Some(rest) = line.strip_prefix("Private-MAC: ") {
			private_mac = rest.trim().to_string();
		} else if let Some((key, value)) = line.split_once(": ") {
			fields.insert(key.to_string(), value.trim().to_string());
		}
	}

	let encryption = fields.get("Encryption").cloned().unwrap_or_else(|| "none".to_string());
	let comment = fields.get("Comment").cloned().unwrap_or_default();
	let public_blob = STANDARD.decode(public_b64).map_err(|_| Error::Malformed("bad public base64"))?;
	let private_blob = STANDARD.decode(private_b64).map_err(|_| Error::Malformed("bad private base64"))?;
	let private_mac = hex_decode(&private_mac)?;

	Ok(PuttyKeyFile { algorithm, encryption, comment, public_blob, private_blob, private_mac })
}

fn hex_decode(s: &str) -> Result<Vec<u8>, Error> {
	if s.len() % 2 != 0 {
		return Err(Error::Malformed("odd-length hex MAC"));
	}
	(0..s.len())
		.step_by(2)
		.map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| Error::Malformed("invalid hex digit in MAC")))
		.collect()
}

/// Derive the AES-256 key PuTTY v2 uses: `SHA1(0u32||pass) || SHA1(1u32||pass)`
/// truncated to 32 bytes, with a zero IV.
fn derive_cipher_key(passphrase: &str) -> [u8; 32] {
	let mut out = [0u8; 32];
	for (i, chunk) in out.chunks_mut(20).enumerate() {
		let mut input = Vec::new();
		input.extend_from_slice(&(i as u32).to_be_bytes());
		input.extend_from_slice(passphrase.as_bytes());
		let digest = wyvern_digest::Hash::hash(Algorithm::Sha1, &input);
		let n = chunk.len();
		chunk.copy_from_slice(&digest[..n]);
	}
	out
}

/// Derive the HMAC-SHA1 MAC key PuTTY v2 uses over the fixed string
/// `"putty-private-key-file-mac-key"`.
fn derive_mac_key(passphrase: &str) -> Vec<u8> {
	let mut input = b"putty-private-key-file-mac-key".to_vec();
	input.extend_from_slice(passphrase.as_bytes());
	wyvern_digest::Hash::hash(Algorithm::Sha1, &input)
}

pub fn decrypt_private_blob(file: &PuttyKeyFile, passphrase: Option<&str>) -> Result<Vec<u8>, Error> {
	let plaintext = if file.is_encrypted() {
		let passphrase = passphrase.ok_or(Error::MissingPassphrase)?;
		let key = derive_cipher_key(passphrase);
		let iv = [0u8; 16];
		let mut cipher = Cipher::new(BlockCipherKind::Aes, Mode::Cbc, &key, &iv)?;
		cipher.disable_padding();
		cipher.decrypt(&file.private_blob)?
	} else {
		file.private_blob.clone()
	};

	let mac_key = passphrase.map(derive_mac_key).unwrap_or_default();
	let mut mac_input = Vec::new();
	for field in [&file.algorithm, &file.encryption, &file.comment] {
		mac_input.extend_from_slice(&(field.len() as u32).to_be_bytes());
		mac_input.extend_from_slice(field.as_bytes());
	}
	mac_input.extend_from_slice(&(plaintext.len() as u32).to_be_bytes());
	mac_input.extend_from_slice(&plaintext);
	let expected = wyvern_digest::Hash::hmac(Algorithm::Sha1, &mac_key, &mac_input);
	if expected != file.private_mac {
		return Err(Error::BadPassphrase);
	}
	Ok(plaintext)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_unencrypted_header_fields() {
		let text = "PuTTY-User-Key-File-2: ssh-ed25519\n\
Encryption: none\n\
Comment: test key\n\
Public-Lines: 1\n\
QUJD\n\
Private-Lines: 1\n\
REVG\n\
Private-MAC: 0011223344\n";
		let parsed = parse(text).unwrap();
		assert_eq!(parsed.algorithm, "ssh-ed25519");
		assert!(!parsed.is_encrypted());
		assert_eq!(parsed.public_blob, b"ABC");
		assert_eq!(parsed.private_blob, b"DEF");
	}

	#[test]
	fn cipher_key_derivation_is_deterministic() {
		assert_eq!(derive_cipher_key("hunter2"), derive_cipher_key("hunter2"));
		assert_ne!(derive_cipher_key("hunter2"), derive_cipher_key("hunter3"));
	}
}
