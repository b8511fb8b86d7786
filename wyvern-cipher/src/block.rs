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

//! `BlockPrimitive`: the cipher contract from spec §4.3 — `setup_key`,
//! `encrypt_block`, `decrypt_block` — implemented for every block cipher
//! family the engine supports. Mode strategies (`crate::modes`) are built on
//! top of this and never touch the underlying RustCrypto traits directly.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use generic_array::GenericArray;

use crate::{Error, KeyLengthsAllowed};

/// Which block cipher family `CipherState` is driving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockCipherKind {
	Aes,
	Des,
	TripleDes,
	Blowfish,
	Twofish,
	Rc2,
}

impl BlockCipherKind {
	pub fn block_size(self) -> usize {
		match self {
			BlockCipherKind::Des | BlockCipherKind::TripleDes | BlockCipherKind::Blowfish => 8,
			BlockCipherKind::Aes | BlockCipherKind::Twofish | BlockCipherKind::Rc2 => 16,
		}
	}

	pub fn key_lengths_allowed(self) -> KeyLengthsAllowed {
		match self {
			BlockCipherKind::Aes => KeyLengthsAllowed::Discrete(&[16, 24, 32]),
			BlockCipherKind::Des => KeyLengthsAllowed::Discrete(&[8]),
			BlockCipherKind::TripleDes => KeyLengthsAllowed::Discrete(&[16, 24]),
			BlockCipherKind::Blowfish => KeyLengthsAllowed::Range(4, 56),
			BlockCipherKind::Twofish => KeyLengthsAllowed::Discrete(&[16, 24, 32]),
			BlockCipherKind::Rc2 => KeyLengthsAllowed::Range(1, 128),
		}
	}
}

/// A single expanded block-cipher key, dispatching to the concrete
/// RustCrypto implementation for its family.
pub enum BlockPrimitive {
	Aes128(Box<aes::Aes128>),
	Aes192(Box<aes::Aes192>),
	Aes256(Box<aes::Aes256>),
	Des(Box<des::Des>),
	TripleDes(Box<des::TdesEde3>),
	Blowfish(Box<blowfish::Blowfish>),
	Twofish(Box<twofish::Twofish>),
	Rc2(Box<rc2::Rc2>),
}

impl BlockPrimitive {
	pub fn setup_key(kind: BlockCipherKind, key: &[u8]) -> Result<Self, Error> {
		kind.key_lengths_allowed().validate(key.len())?;
		Ok(match kind {
			BlockCipherKind::Aes => match key.len() {
				16 => BlockPrimitive::Aes128(Box::new(aes::Aes128::new_from_slice(key).map_err(|_| Error::LengthMismatch)?)),
				24 => BlockPrimitive::Aes192(Box::new(aes::Aes192::new_from_slice(key).map_err(|_| Error::LengthMismatch)?)),
				32 => BlockPrimitive::Aes256(Box::new(aes::Aes256::new_from_slice(key).map_err(|_| Error::LengthMismatch)?)),
				_ => return Err(Error::LengthMismatch),
			},
			BlockCipherKind::Des => {
				BlockPrimitive::Des(Box::new(des::Des::new_from_slice(key).map_err(|_| Error::LengthMismatch)?))
			}
			BlockCipherKind::TripleDes => {
				let key24 = if key.len() == 16 {
					let mut k = Vec::with_capacity(24);
					k.extend_from_slice(key);
					k.extend_from_slice(&key[0..8]);
					k
				} else {
					key.to_vec()
				};
				BlockPrimitive::TripleDes(Box::new(
					des::TdesEde3::new_from_slice(&key24).map_err(|_| Error::LengthMismatch)?,
				))
			}
			BlockCipherKind::Blowfish => BlockPrimitive::Blowfish(Box::new(
				blowfish::Blowfish::new_from_slice(key).map_err(|_| Error::LengthMismatch)?,
			)),
			BlockCipherKind::Twofish => BlockPrimitive::Twofish(Box::new(
				twofish::Twofish::new_from_slice(key).map_err(|_| Error::LengthMismatch)?,
			)),
			BlockCipherKind::Rc2 => BlockPrimitive::Rc2(Box::new(
				rc2::Rc2::new_from_slice(key).map_err(|_| Error::LengthMismatch)?,
			)),
		})
	}

	pub fn block_size(&self) -> usize {
		match self {
			BlockPrimitive::Aes128(_) | BlockPrimitive::Aes192(_) | BlockPrimitive::Aes256(_) => 16,
			BlockPrimitive::Des(_) | BlockPrimitive::TripleDes(_) | BlockPrimitive::Blowfish(_) => 8,
			BlockPrimitive::Twofish(_) | BlockPrimitive::Rc2(_) => 16,
		}
	}

	/// Encrypt exactly one block in place.
	pub fn encrypt_block(&self, block: &mut [u8]) {
		debug_assert_eq!(block.len(), self.block_size());
		macro_rules! go {
			($cipher:ident, $n:expr) => {{
				let mut ga = GenericArray::clone_from_slice(block);
				$cipher.encrypt_block(&mut ga);
				block.copy_from_slice(&ga);
			}};
		}
		match self {
			BlockPrimitive::Aes128(c) => go!(c, 16),
			BlockPrimitive::Aes192(c) => go!(c, 16),
			BlockPrimitive::Aes256(c) => go!(c, 16),
			BlockPrimitive::Des(c) => go!(c, 8),
			BlockPrimitive::TripleDes(c) => go!(c, 8),
			BlockPrimitive::Blowfish(c) => go!(c, 8),
			BlockPrimitive::Twofish(c) => go!(c, 16),
			BlockPrimitive::Rc2(c) => go!(c, 16),
		}
	}

	/// Decrypt exactly one block in place.
	pub fn decrypt_block(&self, block: &mut [u8]) {
		debug_assert_eq!(block.len(), self.block_size());
		macro_rules! go {
			($cipher:ident, $n:expr) => {{
				let mut ga = GenericArray::clone_from_slice(block);
				$cipher.decrypt_block(&mut ga);
				block.copy_from_slice(&ga);
			}};
		}
		match self {
			BlockPrimitive::Aes128(c) => go!(c, 16),
			BlockPrimitive::Aes192(c) => go!(c, 16),
			BlockPrimitive::Aes256(c) => go!(c, 16),
			BlockPrimitive::Des(c) => go!(c, 8),
			BlockPrimitive::TripleDes(c) => go!(c, 8),
			BlockPrimitive::Blowfish(c) => go!(c, 8),
			BlockPrimitive::Twofish(c) => go!(c, 16),
			BlockPrimitive::Rc2(c) => go!(c, 16),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aes128_block_roundtrip() {
		let key = [0u8; 16];
		let p = BlockPrimitive::setup_key(BlockCipherKind::Aes, &key).unwrap();
		let mut block = [0x11u8; 16];
		let original = block;
		p.encrypt_block(&mut block);
		assert_ne!(block, original);
		p.decrypt_block(&mut block);
		assert_eq!(block, original);
	}
}
