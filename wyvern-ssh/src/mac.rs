//! SSH MAC algorithms (RFC 4253 §6.4, plus the `-etm@openssh.com` family):
//! a keyed [`wyvern_digest::Hash`] HMAC, tagged with whether it authenticates
//! the plaintext ("encrypt-and-MAC") or the ciphertext ("encrypt-then-MAC").

use wyvern_digest::Algorithm;

use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
	/// MAC computed over `seq || plaintext`, teacher-default construction.
	EncryptAndMac,
	/// MAC computed over `seq || ciphertext`; verified before decryption.
	EncryptThenMac,
}

#[derive(Clone, Copy, Debug)]
pub struct MacAlgorithm {
	pub name: &'static str,
	pub digest: Algorithm,
	pub key_len: usize,
	pub tag_len: usize,
	pub order: Order,
}

pub fn by_name(name: &str) -> Result<MacAlgorithm, Error> {
	ALL.iter().copied().find(|a| a.name == name).ok_or_else(|| Error::UnsupportedAlgorithm(name.to_string()))
}

const ALL: &[MacAlgorithm] = &[
	MacAlgorithm { name: "hmac-sha1", digest: Algorithm::Sha1, key_len: 20, tag_len: 20, order: Order::EncryptAndMac },
	MacAlgorithm { name: "hmac-sha2-256", digest: Algorithm::Sha256, key_len: 32, tag_len: 32, order: Order::EncryptAndMac },
	MacAlgorithm { name: "hmac-sha2-512", digest: Algorithm::Sha512, key_len: 64, tag_len: 64, order: Order::EncryptAndMac },
	MacAlgorithm {
		name: "hmac-sha2-256-etm@openssh.com",
		digest: Algorithm::Sha256,
		key_len: 32,
		tag_len: 32,
		order: Order::EncryptThenMac,
	},
	MacAlgorithm {
		name: "hmac-sha2-512-etm@openssh.com",
		digest: Algorithm::Sha512,
		key_len: 64,
		tag_len: 64,
		order: Order::EncryptThenMac,
	},
	MacAlgorithm {
		name: "hmac-sha1-etm@openssh.com",
		digest: Algorithm::Sha1,
		key_len: 20,
		tag_len: 20,
		order: Order::EncryptThenMac,
	},
];

impl MacAlgorithm {
	/// `HMAC(key, seqn_be || message)`, RFC 4253 §6.4.
	pub fn compute(&self, key: &[u8], seqn: u32, message: &[u8]) -> Vec<u8> {
		let mut input = Vec::with_capacity(4 + message.len());
		input.extend_from_slice(&seqn.to_be_bytes());
		input.extend_from_slice(message);
		wyvern_digest::Hash::hmac(self.digest, &key[..self.key_len], &input)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::wire::constant_time_eq;

	#[test]
	fn hmac_sha2_256_tag_is_reproducible() {
		let algo = by_name("hmac-sha2-256").unwrap();
		let key = [0x11u8; 32];
		let a = algo.compute(&key, 0, b"packet bytes");
		let b = algo.compute(&key, 0, b"packet bytes");
		assert!(constant_time_eq(&a, &b));
	}

	#[test]
	fn different_sequence_numbers_change_the_tag() {
		let algo = by_name("hmac-sha2-256").unwrap();
		let key = [0x22u8; 32];
		let a = algo.compute(&key, 0, b"payload");
		let b = algo.compute(&key, 1, b"payload");
		assert_ne!(a, b);
	}

	#[test]
	fn etm_variant_is_flagged() {
		assert_eq!(by_name("hmac-sha2-256-etm@openssh.com").unwrap().order, Order::EncryptThenMac);
		assert_eq!(by_name("hmac-sha2-256").unwrap().order, Order::EncryptAndMac);
	}

	#[test]
	fn unknown_name_is_rejected() {
		assert!(by_name("hmac-made-up").is_err());
	}
}
