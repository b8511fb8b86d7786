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

//! The Poly1305-authenticated stream mode (spec §4.3): keystream from a
//! stream cipher, MAC computed in GF(2^130-5) with a key clamped per
//! RFC 7539 §2.5. Used by SSH's `chacha20-poly1305@openssh.com`, the same
//! pairing the teacher's (now-removed) `chacha20poly1305.rs` wired up.

use chacha20::cipher::{KeyIvInit, StreamCipher as _};
use chacha20::ChaCha20;
use poly1305::universal_hash::KeyInit as Poly1305KeyInit;
use poly1305::Poly1305;
use subtle::ConstantTimeEq;
use universal_hash::UniversalHash;

use crate::Error;

/// Derive the one-time Poly1305 key as `ChaCha20(key, nonce, counter=0)`'s
/// first 32 keystream bytes (RFC 7539 §2.6).
fn poly1305_key(key: &[u8; 32], nonce: &[u8; 12]) -> [u8; 32] {
	let mut block = [0u8; 64];
	let mut cipher = ChaCha20::new(key.into(), nonce.into());
	cipher.apply_keystream(&mut block);
	let mut out = [0u8; 32];
	out.copy_from_slice(&block[..32]);
	out
}

fn mac(key: &[u8; 32], aad: &[u8], ciphertext: &[u8]) -> [u8; 16] {
	let mut poly = Poly1305::new(key.into());
	let mut feed = |data: &[u8]| {
		poly.update_padded(data);
	};
	feed(aad);
	feed(ciphertext);
	let mut len_block = [0u8; 16];
	len_block[0..8].copy_from_slice(&(aad.len() as u64).to_le_bytes());
	len_block[8..16].copy_from_slice(&(ciphertext.len() as u64).to_le_bytes());
	poly.update_padded(&len_block);
	poly.finalize().into()
}

pub fn seal(key: &[u8; 32], nonce: &[u8; 12], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
	let one_time_key = poly1305_key(key, nonce);
	// Data keystream starts at block counter 1, per RFC 7539 §2.8.
	let mut cipher = ChaCha20::new(key.into(), nonce.into());
	let mut skip = [0u8; 64];
	cipher.apply_keystream(&mut skip);
	let mut ciphertext = plaintext.to_vec();
	cipher.apply_keystream(&mut ciphertext);
	let tag = mac(&one_time_key, aad, &ciphertext);
	let mut out = ciphertext;
	out.extend_from_slice(&tag);
	Ok(out)
}

pub fn open(key: &[u8; 32], nonce: &[u8; 12], aad: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>, Error> {
	let one_time_key = poly1305_key(key, nonce);
	let expected = mac(&one_time_key, aad, ciphertext);
	if expected.ct_eq(tag).unwrap_u8() != 1 {
		return Err(Error::Decryption);
	}
	let mut cipher = ChaCha20::new(key.into(), nonce.into());
	let mut skip = [0u8; 64];
	cipher.apply_keystream(&mut skip);
	let mut plaintext = ciphertext.to_vec();
	cipher.apply_keystream(&mut plaintext);
	Ok(plaintext)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn roundtrip() {
		let key = [0x11u8; 32];
		let nonce = [0x22u8; 12];
		let out = seal(&key, &nonce, b"aad bytes", b"poly1305 mode payload").unwrap();
		let (ct, tag) = out.split_at(out.len() - 16);
		let pt = open(&key, &nonce, b"aad bytes", ct, tag).unwrap();
		assert_eq!(pt, b"poly1305 mode payload");
	}

	#[test]
	fn tamper_detected() {
		let key = [0x33u8; 32];
		let nonce = [0x44u8; 12];
		let mut out = seal(&key, &nonce, b"", b"message").unwrap();
		let last = out.len() - 1;
		out[last] ^= 0x80;
		let (ct, tag) = out.split_at(out.len() - 16);
		assert!(open(&key, &nonce, b"", ct, tag).is_err());
	}
}
