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

//! Mode strategies composed with a [`crate::block::BlockPrimitive`]:
//! ECB, CBC, CTR, CFB, CFB8, OFB, OFB8. Each `ModeState` carries its own
//! feedback register plus the continuous-buffer cursor (`pos` into
//! `keystream_cache`, or `block_acc` for whole-block feedback) so that
//! successive calls on the same instance behave like one call on the
//! concatenated input (spec §4.3 "Continuous buffer").

use crate::block::BlockPrimitive;
use crate::{Error, Mode};

pub struct ModeState {
	mode: Mode,
	block_size: usize,
	original_iv: Vec<u8>,
	/// The feedback register: a counter (CTR), the previous keystream
	/// block (OFB), the previous ciphertext block (CFB), or the chaining
	/// value (CBC).
	register: Vec<u8>,
	/// Keystream generated from `register` but not yet fully consumed.
	keystream_cache: Vec<u8>,
	/// How many bytes of `keystream_cache` have already been XORed.
	pos: usize,
	/// Bytes of the in-progress block's output, for whole-block feedback
	/// modes (CFB) where the new register is the finished output block.
	block_acc: Vec<u8>,
}

impl ModeState {
	pub fn new(mode: Mode, block_size: usize, iv: &[u8]) -> Result<Self, Error> {
		if mode != Mode::Gcm && mode != Mode::Poly1305 && iv.len() != block_size && mode != Mode::Ecb {
			return Err(Error::LengthMismatch);
		}
		Ok(ModeState {
			mode,
			block_size,
			original_iv: iv.to_vec(),
			register: iv.to_vec(),
			keystream_cache: Vec::new(),
			pos: block_size,
			block_acc: Vec::new(),
		})
	}

	pub fn iv(&self) -> Vec<u8> {
		self.original_iv.clone()
	}

	pub fn reset(&mut self) {
		self.register = self.original_iv.clone();
		self.keystream_cache.clear();
		self.pos = self.block_size;
		self.block_acc.clear();
	}

	/// True when the engine sits on a block boundary (no partial state
	/// buffered) — used to decide when PKCS#7 unpadding may run.
	pub fn at_boundary(&self) -> bool {
		self.pos == self.block_size && self.block_acc.is_empty()
	}

	pub fn process(&mut self, primitive: &BlockPrimitive, input: &[u8], encrypting: bool) -> Vec<u8> {
		match self.mode {
			Mode::Ecb => self.process_ecb(primitive, input, encrypting),
			Mode::Cbc => self.process_cbc(primitive, input, encrypting),
			Mode::Ctr => self.process_counter_like(primitive, input, FeedbackKind::Counter),
			Mode::Ofb => self.process_counter_like(primitive, input, FeedbackKind::Ofb),
			Mode::Cfb => self.process_cfb(primitive, input, encrypting),
			Mode::Cfb8 => self.process_shift_register(primitive, input, encrypting, true),
			Mode::Ofb8 => self.process_shift_register(primitive, input, encrypting, false),
			Mode::Gcm | Mode::Poly1305 => Vec::new(), // handled by the AEAD paths in lib.rs
		}
	}

	fn process_ecb(&mut self, primitive: &BlockPrimitive, input: &[u8], encrypting: bool) -> Vec<u8> {
		let mut out = Vec::with_capacity(input.len());
		self.block_acc.extend_from_slice(input);
		let bs = self.block_size;
		let mut offset = 0;
		while self.block_acc.len() - offset >= bs {
			let mut block = self.block_acc[offset..offset + bs].to_vec();
			if encrypting {
				primitive.encrypt_block(&mut block);
			} else {
				primitive.decrypt_block(&mut block);
			}
			out.extend_from_slice(&block);
			offset += bs;
		}
		self.block_acc.drain(..offset);
		out
	}

	fn process_cbc(&mut self, primitive: &BlockPrimitive, input: &[u8], encrypting: bool) -> Vec<u8> {
		let mut out = Vec::with_capacity(input.len());
		self.block_acc.extend_from_slice(input);
		let bs = self.block_size;
		let mut offset = 0;
		while self.block_acc.len() - offset >= bs {
			let chunk = &self.block_acc[offset..offset + bs];
			if encrypting {
				let mut block: Vec<u8> = chunk.iter().zip(&self.register).map(|(a, b)| a ^ b).collect();
				primitive.encrypt_block(&mut block);
				self.register = block.clone();
				out.extend_from_slice(&block);
			} else {
				let mut block = chunk.to_vec();
				let prev_cipher = block.clone();
				primitive.decrypt_block(&mut block);
				for (b, k) in block.iter_mut().zip(&self.register) {
					*b ^= k;
				}
				self.register = prev_cipher;
				out.extend_from_slice(&block);
			}
			offset += bs;
		}
		self.block_acc.drain(..offset);
		out
	}

	fn process_counter_like(&mut self, primitive: &BlockPrimitive, input: &[u8], kind: FeedbackKind) -> Vec<u8> {
		let bs = self.block_size;
		let mut out = Vec::with_capacity(input.len());
		for &byte in input {
			if self.pos == bs {
				let mut block = self.register.clone();
				primitive.encrypt_block(&mut block);
				self.keystream_cache = block.clone();
				self.pos = 0;
				match kind {
					FeedbackKind::Counter => increment_be(&mut self.register),
					FeedbackKind::Ofb => self.register = block,
				}
			}
			out.push(byte ^ self.keystream_cache[self.pos]);
			self.pos += 1;
		}
		out
	}

	fn process_cfb(&mut self, primitive: &BlockPrimitive, input: &[u8], encrypting: bool) -> Vec<u8> {
		let bs = self.block_size;
		let mut out = Vec::with_capacity(input.len());
		for &byte in input {
			if self.pos == bs {
				let mut block = self.register.clone();
				primitive.encrypt_block(&mut block);
				self.keystream_cache = block;
				self.pos = 0;
				self.block_acc.clear();
			}
			let out_byte = byte ^ self.keystream_cache[self.pos];
			self.block_acc.push(if encrypting { out_byte } else { byte });
			out.push(out_byte);
			self.pos += 1;
			if self.pos == bs {
				self.register = std::mem::take(&mut self.block_acc);
			}
		}
		out
	}

	/// CFB8 / OFB8: a `block_size`-byte shift register, one byte of
	/// keystream produced (and the top byte of `E(register)` used) per
	/// input byte.
	fn process_shift_register(
		&mut self,
		primitive: &BlockPrimitive,
		input: &[u8],
		encrypting: bool,
		cipher_feedback: bool,
	) -> Vec<u8> {
		let mut out = Vec::with_capacity(input.len());
		for &byte in input {
			let mut block = self.register.clone();
			primitive.encrypt_block(&mut block);
			let keystream_byte = block[0];
			let out_byte = byte ^ keystream_byte;
			let feedback_byte = if cipher_feedback {
				if encrypting {
					out_byte
				} else {
					byte
				}
			} else {
				keystream_byte
			};
			self.register.remove(0);
			self.register.push(feedback_byte);
			out.push(out_byte);
		}
		out
	}
}

enum FeedbackKind {
	Counter,
	Ofb,
}

/// Increment a big-endian byte string by one, wrapping on overflow (used by
/// CTR mode, matching SP 800-38A's counter block increment).
fn increment_be(counter: &mut [u8]) {
	for byte in counter.iter_mut().rev() {
		*byte = byte.wrapping_add(1);
		if *byte != 0 {
			break;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::block::BlockCipherKind;

	#[test]
	fn counter_increments_and_wraps() {
		let mut c = vec![0u8, 0, 0, 0xff];
		increment_be(&mut c);
		assert_eq!(c, vec![0, 0, 1, 0]);
		let mut wrap = vec![0xffu8; 4];
		increment_be(&mut wrap);
		assert_eq!(wrap, vec![0, 0, 0, 0]);
	}

	#[test]
	fn cfb_encrypt_decrypt_roundtrip() {
		let key = [0x5Au8; 16];
		let iv = [0x00u8; 16];
		let p = BlockPrimitive::setup_key(BlockCipherKind::Aes, &key).unwrap();
		let mut enc = ModeState::new(Mode::Cfb, 16, &iv).unwrap();
		let mut dec = ModeState::new(Mode::Cfb, 16, &iv).unwrap();
		let msg = b"variable length message for cfb roundtrip test!";
		let ct = enc.process(&p, msg, true);
		let pt = dec.process(&p, &ct, false);
		assert_eq!(pt, msg);
	}

	#[test]
	fn cfb8_encrypt_decrypt_roundtrip() {
		let key = [0x5Au8; 16];
		let iv = [0x00u8; 16];
		let p = BlockPrimitive::setup_key(BlockCipherKind::Aes, &key).unwrap();
		let mut enc = ModeState::new(Mode::Cfb8, 16, &iv).unwrap();
		let mut dec = ModeState::new(Mode::Cfb8, 16, &iv).unwrap();
		let msg = b"odd length msg";
		let ct = enc.process(&p, msg, true);
		let pt = dec.process(&p, &ct, false);
		assert_eq!(pt, msg);
	}

	#[test]
	fn ofb_encrypt_decrypt_roundtrip() {
		let key = [0x5Au8; 16];
		let iv = [0x01u8; 16];
		let p = BlockPrimitive::setup_key(BlockCipherKind::Aes, &key).unwrap();
		let mut enc = ModeState::new(Mode::Ofb, 16, &iv).unwrap();
		let mut dec = ModeState::new(Mode::Ofb, 16, &iv).unwrap();
		let msg = b"ofb mode roundtrip";
		let ct = enc.process(&p, msg, true);
		let pt = dec.process(&p, &ct, false);
		assert_eq!(pt, msg);
	}
}
