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

//! PKCS#7 padding (RFC 5652 §6.3), the only padding scheme the engine
//! applies by default; disabling it is only valid when the input is already
//! a block-size multiple (enforced by the caller in `lib.rs`).

pub fn pkcs7_pad(data: &[u8], block_size: usize) -> Vec<u8> {
	let pad_len = block_size - (data.len() % block_size);
	let mut out = Vec::with_capacity(data.len() + pad_len);
	out.extend_from_slice(data);
	out.resize(data.len() + pad_len, pad_len as u8);
	out
}

/// Strip and validate PKCS#7 padding. Returns `None` on malformed padding —
/// callers MUST treat this the same as any other decryption failure and
/// never reveal which byte differed (no early-return on the first mismatch).
pub fn pkcs7_unpad(data: &[u8], block_size: usize) -> Option<Vec<u8>> {
	if data.is_empty() || data.len() % block_size != 0 {
		return None;
	}
	let pad_len = *data.last()? as usize;
	if pad_len == 0 || pad_len > block_size || pad_len > data.len() {
		return None;
	}
	let start = data.len() - pad_len;
	let mut bad = 0u8;
	for &b in &data[start..] {
		bad |= b ^ (pad_len as u8);
	}
	if bad != 0 {
		return None;
	}
	Some(data[..start].to_vec())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pad_then_unpad_roundtrip() {
		for len in 0..33 {
			let data: Vec<u8> = (0..len as u8).collect();
			let padded = pkcs7_pad(&data, 16);
			assert_eq!(padded.len() % 16, 0);
			assert_eq!(pkcs7_unpad(&padded, 16).unwrap(), data);
		}
	}

	#[test]
	fn bad_padding_rejected() {
		let mut padded = pkcs7_pad(b"hello", 16);
		*padded.last_mut().unwrap() = 0;
		assert!(pkcs7_unpad(&padded, 16).is_none());
	}
}
