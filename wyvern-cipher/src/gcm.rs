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

//! AES-GCM (SP 800-38D) over any 128-bit block cipher. `J0` derivation,
//! GHASH, the CTR keystream and tag computation are all implemented here
//! directly rather than through an opaque AEAD crate, since continuous-ness
//! and tag-length truncation are engine-level concerns spec §4.3 calls out
//! by name.

use subtle::ConstantTimeEq;
use wyvern_bigint::field::BinaryFieldElement128;

use crate::block::BlockPrimitive;
use crate::Error;

fn encrypt_block16(primitive: &BlockPrimitive, block: [u8; 16]) -> [u8; 16] {
	let mut b = block;
	primitive.encrypt_block(&mut b);
	b
}

fn ghash(h: BinaryFieldElement128, aad: &[u8], ciphertext: &[u8]) -> [u8; 16] {
	let mut y = BinaryFieldElement128(0);
	for chunk in aad.chunks(16) {
		y = y.xor(block_from(chunk)).mul(h);
	}
	for chunk in ciphertext.chunks(16) {
		y = y.xor(block_from(chunk)).mul(h);
	}
	let mut len_block = [0u8; 16];
	len_block[0..8].copy_from_slice(&((aad.len() as u64) * 8).to_be_bytes());
	len_block[8..16].copy_from_slice(&((ciphertext.len() as u64) * 8).to_be_bytes());
	y = y.xor(BinaryFieldElement128::from_be_bytes(&len_block)).mul(h);
	y.to_be_bytes()
}

fn block_from(chunk: &[u8]) -> BinaryFieldElement128 {
	let mut b = [0u8; 16];
	b[..chunk.len()].copy_from_slice(chunk);
	BinaryFieldElement128::from_be_bytes(&b)
}

fn compute_j0(primitive: &BlockPrimitive, h: BinaryFieldElement128, nonce: &[u8]) -> [u8; 16] {
	if nonce.len() == 12 {
		let mut j0 = [0u8; 16];
		j0[..12].copy_from_slice(nonce);
		j0[15] = 1;
		j0
	} else {
		let mut len_block = [0u8; 16];
		len_block[8..16].copy_from_slice(&((nonce.len() as u64) * 8).to_be_bytes());
		let mut y = BinaryFieldElement128(0);
		for chunk in nonce.chunks(16) {
			y = y.xor(block_from(chunk)).mul(h);
		}
		y = y.xor(BinaryFieldElement128::from_be_bytes(&len_block)).mul(h);
		y.to_be_bytes()
	}
}

fn inc32(block: &mut [u8; 16]) {
	let mut counter = u32::from_be_bytes([block[12], block[13], block[14], block[15]]);
	counter = counter.wrapping_add(1);
	block[12..16].copy_from_slice(&counter.to_be_bytes());
}

fn gctr(primitive: &BlockPrimitive, icb: [u8; 16], data: &[u8]) -> Vec<u8> {
	let mut counter = icb;
	let mut out = Vec::with_capacity(data.len());
	for chunk in data.chunks(16) {
		let keystream = encrypt_block16(primitive, counter);
		for (i, &b) in chunk.iter().enumerate() {
			out.push(b ^ keystream[i]);
		}
		inc32(&mut counter);
	}
	out
}

pub fn seal(
	primitive: &BlockPrimitive,
	nonce: &[u8],
	aad: &[u8],
	plaintext: &[u8],
	tag_len: usize,
) -> Result<Vec<u8>, Error> {
	let h = BinaryFieldElement128::from_be_bytes(&encrypt_block16(primitive, [0u8; 16]));
	let j0 = compute_j0(primitive, h, nonce);
	let mut counter_block = j0;
	inc32(&mut counter_block);
	let ciphertext = gctr(primitive, counter_block, plaintext);
	let s = ghash(h, aad, &ciphertext);
	let ek_j0 = encrypt_block16(primitive, j0);
	let mut tag = [0u8; 16];
	for i in 0..16 {
		tag[i] = s[i] ^ ek_j0[i];
	}
	let mut out = ciphertext;
	out.extend_from_slice(&tag[..tag_len]);
	Ok(out)
}

pub fn open(
	primitive: &BlockPrimitive,
	nonce: &[u8],
	aad: &[u8],
	ciphertext: &[u8],
	tag: &[u8],
) -> Result<Vec<u8>, Error> {
	let h = BinaryFieldElement128::from_be_bytes(&encrypt_block16(primitive, [0u8; 16]));
	let j0 = compute_j0(primitive, h, nonce);
	let s = ghash(h, aad, ciphertext);
	let ek_j0 = encrypt_block16(primitive, j0);
	let mut expected = [0u8; 16];
	for i in 0..16 {
		expected[i] = s[i] ^ ek_j0[i];
	}
	// Constant-time comparison: tag/MAC mismatch must not leak timing
	// information about which byte differed (spec §7).
	if expected[..tag.len()].ct_eq(tag).unwrap_u8() != 1 {
		return Err(Error::Decryption);
	}
	let mut counter_block = j0;
	inc32(&mut counter_block);
	Ok(gctr(primitive, counter_block, ciphertext))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::block::BlockCipherKind;
	use hex_literal::hex;

	#[test]
	fn nist_gcm_test_case_2() {
		// NIST SP 800-38D test vector: all-zero key, nonce, plaintext.
		let key = [0u8; 16];
		let nonce = [0u8; 12];
		let plaintext = [0u8; 16];
		let primitive = BlockPrimitive::setup_key(BlockCipherKind::Aes, &key).unwrap();
		let out = seal(&primitive, &nonce, &[], &plaintext, 16).unwrap();
		let (ct, tag) = out.split_at(16);
		assert_eq!(ct, &hex!("0388dace60b6a392f328c2b971b2fe78")[..]);
		assert_eq!(tag, &hex!("ab6e47d42cec13bdf53a67b21257bddf")[..]);
	}

	#[test]
	fn tamper_detected() {
		let key = [7u8; 16];
		let nonce = [9u8; 12];
		let primitive = BlockPrimitive::setup_key(BlockCipherKind::Aes, &key).unwrap();
		let mut out = seal(&primitive, &nonce, b"aad", b"hello gcm", 16).unwrap();
		let last = out.len() - 1;
		out[last] ^= 1;
		let (ct, tag) = out.split_at(out.len() - 16);
		assert!(open(&primitive, &nonce, b"aad", ct, tag).is_err());
	}

	#[test]
	fn roundtrip() {
		let key = [3u8; 32];
		let nonce = [4u8; 12];
		let primitive = BlockPrimitive::setup_key(BlockCipherKind::Aes, &key).unwrap();
		let out = seal(&primitive, &nonce, b"header", b"plaintext message", 16).unwrap();
		let (ct, tag) = out.split_at(out.len() - 16);
		let pt = open(&primitive, &nonce, b"header", ct, tag).unwrap();
		assert_eq!(pt, b"plaintext message");
	}
}
