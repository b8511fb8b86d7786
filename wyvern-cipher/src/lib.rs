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

//! The symmetric cipher engine (C4): block cipher family, stream ciphers,
//! modes (ECB/CBC/CTR/CFB/CFB8/OFB/OFB8/GCM/Poly1305-stream), padding,
//! continuous-buffer streaming, and key derivation.

pub mod block;
pub mod gcm;
pub mod kdf;
pub mod modes;
pub mod padding;
pub mod poly1305mode;
pub mod stream;

use block::{BlockCipherKind, BlockPrimitive};
use modes::ModeState;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("invalid argument: {0}")]
	InvalidArgument(&'static str),
	#[error("unsupported algorithm: {0}")]
	UnsupportedAlgorithm(&'static str),
	#[error("key or iv length mismatch")]
	LengthMismatch,
	#[error("mode does not support this operation")]
	BadMode,
	#[error("decryption failed (bad padding or authentication tag)")]
	Decryption,
}

/// How many key lengths, in bytes, a cipher family accepts.
#[derive(Clone, Copy, Debug)]
pub enum KeyLengthsAllowed {
	Discrete(&'static [usize]),
	Range(usize, usize),
}

impl KeyLengthsAllowed {
	pub fn validate(self, len: usize) -> Result<(), Error> {
		let ok = match self {
			KeyLengthsAllowed::Discrete(lens) => lens.contains(&len),
			KeyLengthsAllowed::Range(lo, hi) => (lo..=hi).contains(&len),
		};
		if ok {
			Ok(())
		} else {
			Err(Error::LengthMismatch)
		}
	}
}

/// Which mode a [`Cipher`] is operating in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
	Ecb,
	Cbc,
	Ctr,
	Cfb,
	Cfb8,
	Ofb,
	Ofb8,
	Gcm,
	Poly1305,
}

impl Mode {
	pub fn is_aead(self) -> bool {
		matches!(self, Mode::Gcm | Mode::Poly1305)
	}

	/// Whether PKCS#7 padding applies (only the two pure block modes).
	pub fn is_paddable(self) -> bool {
		matches!(self, Mode::Ecb | Mode::Cbc)
	}
}

/// A symmetric cipher instance: key material, mode, padding and
/// continuous-buffer configuration, matching the `Symmetric cipher state`
/// data model in spec.md §3.
pub struct Cipher {
	kind: BlockCipherKind,
	primitive: BlockPrimitive,
	mode: Mode,
	block_size: usize,
	padding_on: bool,
	continuous_on: bool,
	encrypt_state: ModeState,
	decrypt_state: ModeState,
	aad: Vec<u8>,
	tag_len: usize,
}

impl Cipher {
	/// Construct a new block-cipher-backed engine. `iv` must be `block_size`
	/// bytes for CBC/CFB/OFB, or any length GCM accepts as a nonce, or a
	/// full-width big-endian counter for CTR.
	pub fn new(kind: BlockCipherKind, mode: Mode, key: &[u8], iv: &[u8]) -> Result<Self, Error> {
		let primitive = BlockPrimitive::setup_key(kind, key)?;
		let block_size = kind.block_size();
		if mode == Mode::Gcm && block_size != 16 {
			return Err(Error::UnsupportedAlgorithm("GCM requires a 128-bit block cipher"));
		}
		let encrypt_state = ModeState::new(mode, block_size, iv)?;
		let decrypt_state = ModeState::new(mode, block_size, iv)?;
		Ok(Cipher {
			kind,
			primitive,
			mode,
			block_size,
			padding_on: mode.is_paddable(),
			continuous_on: false,
			encrypt_state,
			decrypt_state,
			aad: Vec::new(),
			tag_len: 16,
		})
	}

	pub fn kind(&self) -> BlockCipherKind {
		self.kind
	}

	pub fn mode(&self) -> Mode {
		self.mode
	}

	pub fn block_size(&self) -> usize {
		self.block_size
	}

	pub fn disable_padding(&mut self) {
		self.padding_on = false;
	}

	pub fn enable_padding(&mut self) {
		if self.mode.is_paddable() {
			self.padding_on = true;
		}
	}

	pub fn enable_continuous_buffer(&mut self) {
		self.continuous_on = true;
	}

	pub fn disable_continuous_buffer(&mut self) {
		self.continuous_on = false;
		self.encrypt_state.reset();
		self.decrypt_state.reset();
	}

	/// Associated data for AEAD modes; must be set before the first
	/// `encrypt`/`decrypt` call of a message.
	pub fn set_aad(&mut self, aad: &[u8]) {
		self.aad = aad.to_vec();
	}

	pub fn set_tag_length(&mut self, len: usize) -> Result<(), Error> {
		if !(4..=16).contains(&len) {
			return Err(Error::InvalidArgument("GCM tag length must be 4..=16 bytes"));
		}
		self.tag_len = len;
		Ok(())
	}

	/// Encrypt `plaintext`. For AEAD modes the authentication tag is
	/// appended to the returned ciphertext.
	pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
		if self.mode.is_aead() {
			return self.encrypt_aead(plaintext);
		}
		let padded;
		let input = if self.padding_on {
			padded = padding::pkcs7_pad(plaintext, self.block_size);
			&padded[..]
		} else {
			if !self.continuous_on && plaintext.len() % self.block_size != 0 {
				return Err(Error::InvalidArgument(
					"padding disabled: input must be a multiple of the block size",
				));
			}
			plaintext
		};
		let out = self.encrypt_state.process(&self.primitive, input, true);
		if !self.continuous_on {
			self.encrypt_state.reset();
		}
		Ok(out)
	}

	pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
		if self.mode.is_aead() {
			return self.decrypt_aead(ciphertext);
		}
		if !self.continuous_on
			&& self.mode.is_paddable()
			&& ciphertext.len() % self.block_size != 0
		{
			return Err(Error::Decryption);
		}
		let out = self.decrypt_state.process(&self.primitive, ciphertext, false);
		let result = if self.padding_on && (!self.continuous_on || self.decrypt_state.at_boundary()) {
			padding::pkcs7_unpad(&out, self.block_size).ok_or(Error::Decryption)?
		} else {
			out
		};
		if !self.continuous_on {
			self.decrypt_state.reset();
		}
		Ok(result)
	}

	fn encrypt_aead(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
		match self.mode {
			Mode::Gcm => gcm::seal(&self.primitive, &self.encrypt_state.iv(), &self.aad, plaintext, self.tag_len),
			Mode::Poly1305 => Err(Error::UnsupportedAlgorithm(
				"Poly1305 mode requires a stream cipher; use StreamCipher directly",
			)),
			_ => unreachable!(),
		}
	}

	fn decrypt_aead(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
		match self.mode {
			Mode::Gcm => {
				if ciphertext.len() < self.tag_len {
					return Err(Error::Decryption);
				}
				let (body, tag) = ciphertext.split_at(ciphertext.len() - self.tag_len);
				gcm::open(&self.primitive, &self.encrypt_state.iv(), &self.aad, body, tag)
			}
			Mode::Poly1305 => Err(Error::UnsupportedAlgorithm(
				"Poly1305 mode requires a stream cipher; use StreamCipher directly",
			)),
			_ => unreachable!(),
		}
	}
}

/// A pure stream cipher (RC4), used standalone rather than through
/// [`Cipher`] since it has no block structure, IV or padding to speak of.
pub struct StreamCipherHandle(stream::StreamCipher);

impl StreamCipherHandle {
	pub fn new_rc4(key: &[u8]) -> Result<Self, Error> {
		Ok(StreamCipherHandle(stream::StreamCipher::new_rc4(key)?))
	}

	/// RC4 encryption and decryption are the same XOR-with-keystream
	/// operation; call sites that stream in chunks keep using the same
	/// handle to preserve keystream position, the stream-cipher analogue
	/// of `Cipher`'s continuous buffer.
	pub fn apply(&mut self, data: &mut [u8]) {
		self.0.apply_keystream(data)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use hex_literal::hex;

	#[test]
	fn s1_aes128_ctr_known_answer() {
		let key = hex!("00112233445566778899aabbccddeeff");
		let iv = hex!("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff");
		let pt = hex!("6bc1bee22e409f96e93d7e117393172a");
		let mut c = Cipher::new(BlockCipherKind::Aes, Mode::Ctr, &key, &iv).unwrap();
		c.disable_padding();
		let ct = c.encrypt(&pt).unwrap();
		assert_eq!(hex::encode(ct), "874d6191b620e3261bef6864990db6ce");
	}

	#[test]
	fn cbc_roundtrip_with_padding() {
		let key = [0x42u8; 16];
		let iv = [0u8; 16];
		let mut enc = Cipher::new(BlockCipherKind::Aes, Mode::Cbc, &key, &iv).unwrap();
		let mut dec = Cipher::new(BlockCipherKind::Aes, Mode::Cbc, &key, &iv).unwrap();
		for len in 0..40 {
			let pt: Vec<u8> = (0..len as u8).collect();
			let ct = enc.encrypt(&pt).unwrap();
			let back = dec.decrypt(&ct).unwrap();
			assert_eq!(back, pt, "roundtrip failed for len {len}");
		}
	}

	#[test]
	fn continuous_buffer_equivalence_ctr() {
		let key = [0x11u8; 16];
		let iv = [0u8; 16];
		let msg = b"the quick brown fox jumps over the lazy dog, twice over!!";

		let mut whole = Cipher::new(BlockCipherKind::Aes, Mode::Ctr, &key, &iv).unwrap();
		whole.disable_padding();
		let whole_ct = whole.encrypt(msg).unwrap();

		let mut streamed = Cipher::new(BlockCipherKind::Aes, Mode::Ctr, &key, &iv).unwrap();
		streamed.disable_padding();
		streamed.enable_continuous_buffer();
		let mut streamed_ct = Vec::new();
		for chunk in msg.chunks(7) {
			streamed_ct.extend(streamed.encrypt(chunk).unwrap());
		}
		assert_eq!(whole_ct, streamed_ct);
	}

	#[test]
	fn padding_required_when_disabled_on_nonmultiple() {
		let key = [0u8; 16];
		let iv = [0u8; 16];
		let mut c = Cipher::new(BlockCipherKind::Aes, Mode::Cbc, &key, &iv).unwrap();
		c.disable_padding();
		assert!(c.encrypt(b"not16bytes").is_err());
	}
}
