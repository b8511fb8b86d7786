//! SSH-named ciphers (RFC 4253 §6.3, RFC 5647 AES-GCM, and the OpenSSH
//! `chacha20-poly1305@openssh.com` construction), built on top of
//! [`wyvern_cipher::Cipher`] and [`wyvern_cipher::poly1305mode`] rather than
//! re-implementing any block cipher or AEAD construction here.

use wyvern_cipher::block::BlockCipherKind;
use wyvern_cipher::{Cipher as BlockEngine, Mode};

use crate::wire::increment_be;
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
	Block { kind: BlockCipherKind, mode: Mode },
	AesGcm,
	Chacha20Poly1305,
}

#[derive(Clone, Copy, Debug)]
pub struct CipherAlgorithm {
	pub name: &'static str,
	pub family: Family,
	pub key_len: usize,
	pub iv_len: usize,
}

impl CipherAlgorithm {
	pub fn is_aead(&self) -> bool {
		matches!(self.family, Family::AesGcm | Family::Chacha20Poly1305)
	}

	pub fn tag_len(&self) -> usize {
		match self.family {
			Family::AesGcm | Family::Chacha20Poly1305 => 16,
			Family::Block { .. } => 0,
		}
	}

	/// The boundary the packet length (padding length + payload + padding)
	/// must be a multiple of: the cipher's own block size for block ciphers
	/// (RFC 4253 §6), 16 for AES-GCM (RFC 5647 §5.2), 8 for
	/// `chacha20-poly1305@openssh.com` (its payload is stream cipher, not
	/// block, but OpenSSH still aligns padding to 8).
	pub fn padding_block_size(&self) -> usize {
		match self.family {
			Family::Block { kind, .. } => kind.block_size(),
			Family::AesGcm => 16,
			Family::Chacha20Poly1305 => 8,
		}
	}
}

const ALL: &[CipherAlgorithm] = &[
	CipherAlgorithm { name: "aes128-ctr", family: Family::Block { kind: BlockCipherKind::Aes, mode: Mode::Ctr }, key_len: 16, iv_len: 16 },
	CipherAlgorithm { name: "aes192-ctr", family: Family::Block { kind: BlockCipherKind::Aes, mode: Mode::Ctr }, key_len: 24, iv_len: 16 },
	CipherAlgorithm { name: "aes256-ctr", family: Family::Block { kind: BlockCipherKind::Aes, mode: Mode::Ctr }, key_len: 32, iv_len: 16 },
	CipherAlgorithm { name: "aes128-cbc", family: Family::Block { kind: BlockCipherKind::Aes, mode: Mode::Cbc }, key_len: 16, iv_len: 16 },
	CipherAlgorithm { name: "aes256-cbc", family: Family::Block { kind: BlockCipherKind::Aes, mode: Mode::Cbc }, key_len: 32, iv_len: 16 },
	CipherAlgorithm { name: "3des-cbc", family: Family::Block { kind: BlockCipherKind::TripleDes, mode: Mode::Cbc }, key_len: 24, iv_len: 8 },
	CipherAlgorithm { name: "blowfish-cbc", family: Family::Block { kind: BlockCipherKind::Blowfish, mode: Mode::Cbc }, key_len: 16, iv_len: 8 },
	CipherAlgorithm { name: "aes128-gcm@openssh.com", family: Family::AesGcm, key_len: 16, iv_len: 12 },
	CipherAlgorithm { name: "aes256-gcm@openssh.com", family: Family::AesGcm, key_len: 32, iv_len: 12 },
	CipherAlgorithm { name: "chacha20-poly1305@openssh.com", family: Family::Chacha20Poly1305, key_len: 64, iv_len: 0 },
];

pub fn by_name(name: &str) -> Result<CipherAlgorithm, Error> {
	ALL.iter().copied().find(|a| a.name == name).ok_or_else(|| Error::UnsupportedAlgorithm(name.to_string()))
}

/// One direction's cipher state, keyed after NEWKEYS, holding whatever
/// mutable nonce/IV state that direction's family advances per packet.
pub enum DirectionalCipher {
	Block(BlockEngine),
	AesGcm { key: Vec<u8>, fixed: [u8; 4], counter: [u8; 8] },
	Chacha20Poly1305 { k1: [u8; 32], k2: [u8; 32] },
}

impl DirectionalCipher {
	pub fn new(algorithm: &CipherAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self, Error> {
		Ok(match algorithm.family {
			Family::Block { kind, mode } => {
				let mut engine = BlockEngine::new(kind, mode, key, iv)?;
				engine.disable_padding();
				engine.enable_continuous_buffer();
				DirectionalCipher::Block(engine)
			}
			Family::AesGcm => {
				let mut fixed = [0u8; 4];
				let mut counter = [0u8; 8];
				fixed.copy_from_slice(&iv[..4]);
				counter.copy_from_slice(&iv[4..12]);
				DirectionalCipher::AesGcm { key: key.to_vec(), fixed, counter }
			}
			Family::Chacha20Poly1305 => {
				let mut k1 = [0u8; 32];
				let mut k2 = [0u8; 32];
				// OpenSSH derives K_1 (packet length) from the *second* half
				// of the derived key material and K_2 (payload) from the
				// first half; see `chacha20-poly1305@openssh.com`'s spec.
				k2.copy_from_slice(&key[..32]);
				k1.copy_from_slice(&key[32..64]);
				DirectionalCipher::Chacha20Poly1305 { k1, k2 }
			}
		})
	}

	fn gcm_nonce(fixed: &[u8; 4], counter: &[u8; 8]) -> [u8; 12] {
		let mut nonce = [0u8; 12];
		nonce[..4].copy_from_slice(fixed);
		nonce[4..].copy_from_slice(counter);
		nonce
	}

	/// Seal one packet body (everything after the 4-byte length field).
	/// Returns `(ciphertext, tag)`; for non-AEAD families `tag` is empty
	/// and authentication is the caller's separate MAC's job.
	pub fn seal(&mut self, seqn: u32, length_field: &[u8; 4], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
		match self {
			DirectionalCipher::Block(engine) => Ok((engine.encrypt(plaintext)?, Vec::new())),
			DirectionalCipher::AesGcm { key, fixed, counter } => {
				let nonce = Self::gcm_nonce(fixed, counter);
				let mut engine = BlockEngine::new(BlockCipherKind::Aes, Mode::Gcm, key, &nonce)?;
				engine.set_aad(length_field);
				let out = engine.encrypt(plaintext)?;
				increment_be(counter);
				let (body, tag) = out.split_at(out.len() - 16);
				Ok((body.to_vec(), tag.to_vec()))
			}
			DirectionalCipher::Chacha20Poly1305 { k1: _, k2 } => {
				let nonce = chacha_nonce(seqn);
				let out = wyvern_cipher::poly1305mode::seal(k2, &nonce, length_field, plaintext)?;
				let (body, tag) = out.split_at(out.len() - 16);
				Ok((body.to_vec(), tag.to_vec()))
			}
		}
	}

	pub fn open(&mut self, seqn: u32, length_field: &[u8; 4], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>, Error> {
		match self {
			DirectionalCipher::Block(engine) => engine.decrypt(ciphertext).map_err(Error::from),
			DirectionalCipher::AesGcm { key, fixed, counter } => {
				let nonce = Self::gcm_nonce(fixed, counter);
				let mut engine = BlockEngine::new(BlockCipherKind::Aes, Mode::Gcm, key, &nonce)?;
				engine.set_aad(length_field);
				let mut combined = ciphertext.to_vec();
				combined.extend_from_slice(tag);
				let out = engine.decrypt(&combined)?;
				increment_be(counter);
				Ok(out)
			}
			DirectionalCipher::Chacha20Poly1305 { k1: _, k2 } => {
				let nonce = chacha_nonce(seqn);
				Ok(wyvern_cipher::poly1305mode::open(k2, &nonce, length_field, ciphertext, tag)?)
			}
		}
	}

	/// Classic (non-ETM, non-AEAD) framing folds the packet length into the
	/// same continuous block-cipher stream as the rest of the packet, so it
	/// must be encrypted with its own call before the remainder — relies on
	/// `enable_continuous_buffer` to keep the keystream/chaining state
	/// advancing correctly across the two calls.
	pub fn encrypt_length_field(&mut self, length_field: &[u8; 4]) -> Result<[u8; 4], Error> {
		match self {
			DirectionalCipher::Block(engine) => {
				let out = engine.encrypt(length_field)?;
				let mut arr = [0u8; 4];
				arr.copy_from_slice(&out);
				Ok(arr)
			}
			_ => Ok(*length_field),
		}
	}

	pub fn decrypt_length_field(&mut self, length_field: &[u8; 4]) -> Result<[u8; 4], Error> {
		match self {
			DirectionalCipher::Block(engine) => {
				let out = engine.decrypt(length_field)?;
				let mut arr = [0u8; 4];
				arr.copy_from_slice(&out);
				Ok(arr)
			}
			_ => Ok(*length_field),
		}
	}

	/// Encrypt (or decrypt — the construction is symmetric) just the
	/// 4-byte packet length field, the one piece of `chacha20-poly1305`
	/// framing that isn't covered by the main payload keystream. AES-GCM's
	/// length field is authenticated-only (AAD) and travels unencrypted, so
	/// it is left unchanged here too.
	pub fn length_mask(&self, seqn: u32, length_field: &[u8; 4]) -> [u8; 4] {
		match self {
			DirectionalCipher::Chacha20Poly1305 { k1, .. } => chacha20_length_mask(k1, &chacha_nonce(seqn), length_field),
			_ => *length_field,
		}
	}
}

fn chacha_nonce(seqn: u32) -> [u8; 12] {
	let mut nonce = [0u8; 12];
	nonce[8..].copy_from_slice(&(seqn as u64).to_be_bytes());
	nonce
}

fn chacha20_length_mask(key: &[u8; 32], nonce: &[u8; 12], length_field: &[u8; 4]) -> [u8; 4] {
	use chacha20::cipher::{KeyIvInit, StreamCipher as _};
	use chacha20::ChaCha20;
	let mut block = *length_field;
	let mut cipher = ChaCha20::new(key.into(), nonce.into());
	cipher.apply_keystream(&mut block);
	block
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aes128_ctr_known_key_lengths() {
		let algo = by_name("aes128-ctr").unwrap();
		assert_eq!(algo.key_len, 16);
		assert_eq!(algo.iv_len, 16);
		assert!(!algo.is_aead());
	}

	#[test]
	fn chacha20_poly1305_key_is_64_bytes_for_both_subkeys() {
		let algo = by_name("chacha20-poly1305@openssh.com").unwrap();
		assert_eq!(algo.key_len, 64);
		assert!(algo.is_aead());
		assert_eq!(algo.tag_len(), 16);
	}

	#[test]
	fn block_cipher_roundtrips_through_directional_cipher() {
		let algo = by_name("aes128-ctr").unwrap();
		let key = [0x11u8; 16];
		let iv = [0x22u8; 16];
		let mut sender = DirectionalCipher::new(&algo, &key, &iv).unwrap();
		let mut receiver = DirectionalCipher::new(&algo, &key, &iv).unwrap();
		let length_field = [0u8, 0, 0, 12];
		let (ct, _tag) = sender.seal(0, &length_field, b"hello packet").unwrap();
		let pt = receiver.open(0, &length_field, &ct, &[]).unwrap();
		assert_eq!(pt, b"hello packet");
	}

	#[test]
	fn chacha20_poly1305_roundtrips() {
		let algo = by_name("chacha20-poly1305@openssh.com").unwrap();
		let key = [0x33u8; 64];
		let mut sender = DirectionalCipher::new(&algo, &key, &[]).unwrap();
		let mut receiver = DirectionalCipher::new(&algo, &key, &[]).unwrap();
		let length_field = [0u8, 0, 0, 5];
		let (ct, tag) = sender.seal(3, &length_field, b"hello").unwrap();
		let pt = receiver.open(3, &length_field, &ct, &tag).unwrap();
		assert_eq!(pt, b"hello");
	}
}
