//! Per-[`crate::client::Client`] configuration: timeouts, keepalive cadence
//! and PTY defaults. Algorithm *preference* is a separate, optional concern
//! from the negotiation machinery in [`crate::negotiate`] — this struct lets
//! a caller narrow or reorder [`crate::negotiate::AlgorithmLists::defaults`]
//! without the transport itself knowing where those preferences came from
//! (a config file, a CLI flag, a hardcoded policy). Parsing `~/.ssh/config`
//! itself is `wyvern-config`'s job, not this crate's; a caller that wants to
//! honor a config file resolves a `wyvern_config::HostConfig` and copies the
//! relevant fields into a `ClientConfig` itself.

use std::time::Duration;

use crate::negotiate::AlgorithmLists;

/// Default SFTP/exec pipeline depth mirrors OpenSSH's default window; kept
/// here rather than in `wyvern-sftp` since it's a connection-wide policy.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Overrides for the client's offered algorithm lists. Any `None` field
	/// falls back to [`AlgorithmLists::defaults`]'s ordering for that
	/// category; a `Some` list is used verbatim (callers are responsible for
	/// ordering it by preference, most preferred first).
	pub kex: Option<Vec<String>>,
	pub server_host_key: Option<Vec<String>>,
	pub ciphers: Option<Vec<String>>,
	pub macs: Option<Vec<String>>,

	/// Applied to the TCP connect and, independently, to the banner/KEXINIT
	/// exchange. `None` waits indefinitely.
	pub connect_timeout: Option<Duration>,
	/// Applies to the *next* read or write a caller performs (spec.md's
	/// `setTimeout(seconds)`); `None`/zero disables it. Stored here as the
	/// connection-wide default a `Client` is constructed with; it can be
	/// changed afterwards via `Client::set_timeout`.
	pub default_timeout: Option<Duration>,
	/// `SSH_MSG_IGNORE` cadence while idle (spec.md's `setKeepAlive`).
	/// `None` disables keepalive.
	pub keepalive_interval: Option<Duration>,

	/// `term` name the next `exec`/`shell` sends with `enablePTY()`.
	pub pty_term: String,
	pub pty_width_chars: u32,
	pub pty_height_rows: u32,

	/// Upper bound on pipelined channel-open/request concurrency; shared
	/// with `wyvern-sftp`'s default request pipeline depth.
	pub max_pipeline_depth: usize,
}

impl Default for ClientConfig {
	fn default() -> Self {
		ClientConfig {
			kex: None,
			server_host_key: None,
			ciphers: None,
			macs: None,
			connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
			default_timeout: None,
			keepalive_interval: None,
			pty_term: "xterm".to_string(),
			pty_width_chars: 80,
			pty_height_rows: 24,
			max_pipeline_depth: 25,
		}
	}
}

impl ClientConfig {
	/// Builds the [`AlgorithmLists`] this config's overrides produce, falling
	/// back to the negotiation defaults for anything left unset.
	pub fn algorithm_lists(&self) -> AlgorithmLists {
		let mut lists = AlgorithmLists::defaults();
		if let Some(kex) = &self.kex {
			lists.kex = kex.clone();
		}
		if let Some(host_key) = &self.server_host_key {
			lists.server_host_key = host_key.clone();
		}
		if let Some(ciphers) = &self.ciphers {
			lists.encryption_client_to_server = ciphers.clone();
			lists.encryption_server_to_client = ciphers.clone();
		}
		if let Some(macs) = &self.macs {
			lists.mac_client_to_server = macs.clone();
			lists.mac_server_to_client = macs.clone();
		}
		lists
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_uses_negotiation_defaults() {
		let config = ClientConfig::default();
		assert_eq!(config.algorithm_lists().kex, AlgorithmLists::defaults().kex);
	}

	#[test]
	fn cipher_override_applies_to_both_directions() {
		let mut config = ClientConfig::default();
		config.ciphers = Some(vec!["aes128-ctr".to_string()]);
		let lists = config.algorithm_lists();
		assert_eq!(lists.encryption_client_to_server, vec!["aes128-ctr".to_string()]);
		assert_eq!(lists.encryption_server_to_client, vec!["aes128-ctr".to_string()]);
	}
}
