//! `KEXINIT` construction/parsing and algorithm negotiation (RFC 4253 §7.1):
//! each category's winner is the first name the client lists that the
//! server also lists.

use crate::msg::SSH_MSG_KEXINIT;
use crate::wire::{Reader, Writer};
use crate::Error;

/// One side's offered algorithm lists, in preference order.
#[derive(Clone, Debug)]
pub struct AlgorithmLists {
	pub kex: Vec<String>,
	pub server_host_key: Vec<String>,
	pub encryption_client_to_server: Vec<String>,
	pub encryption_server_to_client: Vec<String>,
	pub mac_client_to_server: Vec<String>,
	pub mac_server_to_client: Vec<String>,
	pub compression_client_to_server: Vec<String>,
	pub compression_server_to_client: Vec<String>,
	pub languages_client_to_server: Vec<String>,
	pub languages_server_to_client: Vec<String>,
}

impl AlgorithmLists {
	/// The preference lists this client offers by default (spec.md §4.1
	/// "Key exchange" minimum algorithm set, plus the cipher/MAC matrix
	/// `wyvern-cipher`/`wyvern-digest` implement).
	pub fn defaults() -> Self {
		let kex = vec![
			"curve25519-sha256".to_string(),
			"curve25519-sha256@libssh.org".to_string(),
			"ecdh-sha2-nistp256".to_string(),
			"ecdh-sha2-nistp384".to_string(),
			"ecdh-sha2-nistp521".to_string(),
			"diffie-hellman-group-exchange-sha256".to_string(),
			"diffie-hellman-group14-sha256".to_string(),
			"diffie-hellman-group14-sha1".to_string(),
			"diffie-hellman-group1-sha1".to_string(),
		];
		let server_host_key = vec![
			"ssh-ed25519".to_string(),
			"ecdsa-sha2-nistp256".to_string(),
			"ecdsa-sha2-nistp384".to_string(),
			"ecdsa-sha2-nistp521".to_string(),
			"rsa-sha2-512".to_string(),
			"rsa-sha2-256".to_string(),
			"ssh-rsa".to_string(),
			"ssh-dss".to_string(),
		];
		let ciphers = vec![
			"chacha20-poly1305@openssh.com".to_string(),
			"aes256-gcm@openssh.com".to_string(),
			"aes128-gcm@openssh.com".to_string(),
			"aes256-ctr".to_string(),
			"aes192-ctr".to_string(),
			"aes128-ctr".to_string(),
			"aes256-cbc".to_string(),
			"aes128-cbc".to_string(),
			"3des-cbc".to_string(),
			"blowfish-cbc".to_string(),
		];
		let macs = vec![
			"hmac-sha2-256-etm@openssh.com".to_string(),
			"hmac-sha2-512-etm@openssh.com".to_string(),
			"hmac-sha2-256".to_string(),
			"hmac-sha2-512".to_string(),
			"hmac-sha1".to_string(),
		];
		AlgorithmLists {
			kex,
			server_host_key,
			encryption_client_to_server: ciphers.clone(),
			encryption_server_to_client: ciphers,
			mac_client_to_server: macs.clone(),
			mac_server_to_client: macs,
			compression_client_to_server: vec!["none".to_string()],
			compression_server_to_client: vec!["none".to_string()],
			languages_client_to_server: Vec::new(),
			languages_server_to_client: Vec::new(),
		}
	}

	/// Encode as the `KEXINIT` message payload, given a 16-byte cookie.
	pub fn encode(&self, cookie: [u8; 16]) -> Vec<u8> {
		let names = |v: &[String]| v.iter().map(String::as_str).collect::<Vec<_>>();
		Writer::new()
			.byte(SSH_MSG_KEXINIT)
			.raw(&cookie)
			.name_list(&names(&self.kex))
			.name_list(&names(&self.server_host_key))
			.name_list(&names(&self.encryption_client_to_server))
			.name_list(&names(&self.encryption_server_to_client))
			.name_list(&names(&self.mac_client_to_server))
			.name_list(&names(&self.mac_server_to_client))
			.name_list(&names(&self.compression_client_to_server))
			.name_list(&names(&self.compression_server_to_client))
			.name_list(&names(&self.languages_client_to_server))
			.name_list(&names(&self.languages_server_to_client))
			.boolean(false)
			.u32(0)
			.finish()
	}

	pub fn parse(payload: &[u8]) -> Result<Self, Error> {
		let mut r = Reader::new(payload);
		let msg_type = r.byte()?;
		if msg_type != SSH_MSG_KEXINIT {
			return Err(Error::UnexpectedMessage(msg_type, "kexinit"));
		}
		let mut cookie = [0u8; 16];
		cookie.copy_from_slice(r.remaining().get(..16).ok_or(Error::Truncated("kexinit cookie"))?);
		for _ in 0..16 {
			r.byte()?;
		}
		Ok(AlgorithmLists {
			kex: r.name_list()?,
			server_host_key: r.name_list()?,
			encryption_client_to_server: r.name_list()?,
			encryption_server_to_client: r.name_list()?,
			mac_client_to_server: r.name_list()?,
			mac_server_to_client: r.name_list()?,
			compression_client_to_server: r.name_list()?,
			compression_server_to_client: r.name_list()?,
			languages_client_to_server: r.name_list()?,
			languages_server_to_client: r.name_list()?,
		})
	}
}

/// The algorithm selected for every negotiated category, queryable via
/// `Client::algorithms_negotiated` (spec.md's `getAlgorithmsNegotiated`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiatedAlgorithms {
	pub kex: String,
	pub server_host_key: String,
	pub encryption_client_to_server: String,
	pub encryption_server_to_client: String,
	pub mac_client_to_server: String,
	pub mac_server_to_client: String,
	pub compression_client_to_server: String,
	pub compression_server_to_client: String,
}

/// Pick the first name `client` lists that also appears in `server`.
fn pick(category: &'static str, client: &[String], server: &[String]) -> Result<String, Error> {
	client
		.iter()
		.find(|name| server.contains(name))
		.cloned()
		.ok_or(Error::NoCommonAlgorithm(category))
}

pub fn negotiate(client: &AlgorithmLists, server: &AlgorithmLists) -> Result<NegotiatedAlgorithms, Error> {
	Ok(NegotiatedAlgorithms {
		kex: pick("kex", &client.kex, &server.kex)?,
		server_host_key: pick("server_host_key", &client.server_host_key, &server.server_host_key)?,
		encryption_client_to_server: pick(
			"encryption_client_to_server",
			&client.encryption_client_to_server,
			&server.encryption_client_to_server,
		)?,
		encryption_server_to_client: pick(
			"encryption_server_to_client",
			&client.encryption_server_to_client,
			&server.encryption_server_to_client,
		)?,
		mac_client_to_server: pick("mac_client_to_server", &client.mac_client_to_server, &server.mac_client_to_server)?,
		mac_server_to_client: pick("mac_server_to_client", &client.mac_server_to_client, &server.mac_server_to_client)?,
		compression_client_to_server: pick(
			"compression_client_to_server",
			&client.compression_client_to_server,
			&server.compression_client_to_server,
		)?,
		compression_server_to_client: pick(
			"compression_server_to_client",
			&client.compression_server_to_client,
			&server.compression_server_to_client,
		)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kexinit_round_trips() {
		let lists = AlgorithmLists::defaults();
		let encoded = lists.encode([7u8; 16]);
		let decoded = AlgorithmLists::parse(&encoded).unwrap();
		assert_eq!(decoded.kex, lists.kex);
		assert_eq!(decoded.server_host_key, lists.server_host_key);
	}

	#[test]
	fn negotiation_prefers_clients_first_common_choice() {
		let client = AlgorithmLists::defaults();
		let mut server = AlgorithmLists::defaults();
		server.kex = vec!["diffie-hellman-group14-sha256".to_string(), "curve25519-sha256".to_string()];
		let picked = negotiate(&client, &server).unwrap();
		assert_eq!(picked.kex, "curve25519-sha256");
	}

	#[test]
	fn negotiation_fails_when_no_algorithm_is_shared() {
		let client = AlgorithmLists::defaults();
		let mut server = AlgorithmLists::defaults();
		server.kex = vec!["unknown-kex@example.com".to_string()];
		assert!(negotiate(&client, &server).is_err());
	}
}
