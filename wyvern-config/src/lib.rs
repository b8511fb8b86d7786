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

//! Parses OpenSSH-style `~/.ssh/config` files: `Host` blocks with
//! `HostName`/`User`/`Port`/`IdentityFile`/`ProxyCommand`, plus the
//! cipher/kex/mac preference-list options `wyvern-ssh`'s negotiation layer
//! consumes directly (spec.md §4.1 "Algorithm negotiation" calls these
//! configuration, not protocol).

pub mod proxy;

use std::fs;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("could not read config file {0}: {1}")]
	Io(PathBuf, std::io::Error),
	#[error("malformed config line {0}: {1}")]
	Malformed(usize, String),
}

/// A single resolved `Host` stanza, after wildcard-pattern matching and
/// first-match-wins merging against later stanzas (OpenSSH's own rule: the
/// first obtained value for each keyword is kept).
#[derive(Clone, Debug, Default)]
pub struct HostConfig {
	pub host_name: Option<String>,
	pub user: Option<String>,
	pub port: Option<u16>,
	pub identity_files: Vec<PathBuf>,
	pub proxy_command: Option<String>,
	pub ciphers: Option<Vec<String>>,
	pub kex_algorithms: Option<Vec<String>>,
	pub macs: Option<Vec<String>>,
	pub host_key_algorithms: Option<Vec<String>>,
	pub server_alive_interval: Option<u32>,
	pub connect_timeout: Option<u32>,
	pub strict_host_key_checking: Option<bool>,
}

struct Stanza {
	patterns: Vec<String>,
	config: HostConfig,
}

/// A parsed config file: an ordered list of `Host` stanzas, matched in
/// order and merged (first value wins per keyword, matching OpenSSH).
pub struct SshConfig {
	stanzas: Vec<Stanza>,
}

impl SshConfig {
	/// The default per-user config path, `~/.ssh/config`.
	pub fn default_path() -> Option<PathBuf> {
		dirs_next::home_dir().map(|h| h.join(".ssh").join("config"))
	}

	pub fn load_default() -> Result<Self, Error> {
		match Self::default_path() {
			Some(p) if p.exists() => Self::load(&p),
			_ => Ok(SshConfig { stanzas: Vec::new() }),
		}
	}

	pub fn load(path: &Path) -> Result<Self, Error> {
		let text = fs::read_to_string(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
		Self::parse(&text)
	}

	pub fn parse(text: &str) -> Result<Self, Error> {
		let mut stanzas: Vec<Stanza> = vec![Stanza { patterns: vec!["*".to_string()], config: HostConfig::default() }];
		for (lineno, raw_line) in text.lines().enumerate() {
			let line = strip_comment(raw_line).trim();
			if line.is_empty() {
				continue;
			}
			let (keyword, rest) = split_keyword(line).ok_or_else(|| Error::Malformed(lineno + 1, line.to_string()))?;
			match keyword.to_ascii_lowercase().as_str() {
				"host" => {
					let patterns = rest.split_whitespace().map(str::to_string).collect();
					stanzas.push(Stanza { patterns, config: HostConfig::default() });
				}
				_ => {
					let current = stanzas.last_mut().expect("a catch-all stanza always exists");
					apply_keyword(&mut current.config, &keyword.to_ascii_lowercase(), rest)
						.map_err(|_| Error::Malformed(lineno + 1, line.to_string()))?;
				}
			}
		}
		Ok(SshConfig { stanzas })
	}

	/// Resolve the effective configuration for `host`, applying every
	/// matching stanza in file order with first-value-wins merge.
	pub fn for_host(&self, host: &str) -> HostConfig {
		let mut resolved = HostConfig::default();
		for stanza in &self.stanzas {
			if stanza.patterns.iter().any(|p| pattern_matches(p, host)) {
				merge(&mut resolved, &stanza.config);
			}
		}
		if resolved.host_name.is_none() {
			resolved.host_name = Some(host.to_string());
		}
		resolved
	}
}

fn strip_comment(line: &str) -> &str {
	match line.find('#') {
		Some(i) => &line[..i],
		None => line,
	}
}

fn split_keyword(line: &str) -> Option<(&str, &str)> {
	if let Some(eq) = line.find('=') {
		let (k, v) = line.split_at(eq);
		return Some((k.trim(), v[1..].trim()));
	}
	let mut parts = line.splitn(2, char::is_whitespace);
	let keyword = parts.next()?;
	let rest = parts.next().unwrap_or("").trim();
	Some((keyword, rest))
}

fn apply_keyword(config: &mut HostConfig, keyword: &str, value: &str) -> Result<(), ()> {
	match keyword {
		"hostname" => set_once(&mut config.host_name, value.to_string()),
		"user" => set_once(&mut config.user, value.to_string()),
		"port" => set_once(&mut config.port, value.parse().map_err(|_| ())?),
		"identityfile" => config.identity_files.push(expand_tilde(value)),
		"proxycommand" => set_once(&mut config.proxy_command, value.to_string()),
		"ciphers" => set_once(&mut config.ciphers, split_list(value)),
		"kexalgorithms" => set_once(&mut config.kex_algorithms, split_list(value)),
		"macs" => set_once(&mut config.macs, split_list(value)),
		"hostkeyalgorithms" => set_once(&mut config.host_key_algorithms, split_list(value)),
		"serveraliveinterval" => set_once(&mut config.server_alive_interval, value.parse().map_err(|_| ())?),
		"connecttimeout" => set_once(&mut config.connect_timeout, value.parse().map_err(|_| ())?),
		"stricthostkeychecking" => set_once(&mut config.strict_host_key_checking, !value.eq_ignore_ascii_case("no")),
		// Unrecognized keywords are accepted and ignored, the way OpenSSH's
		// own client tolerates directives it doesn't implement.
		_ => {}
	}
	Ok(())
}

fn set_once<T>(slot: &mut Option<T>, value: T) {
	if slot.is_none() {
		*slot = Some(value);
	}
}

fn split_list(value: &str) -> Vec<String> {
	value.split(',').map(|s| s.trim().to_string()).collect()
}

fn expand_tilde(path: &str) -> PathBuf {
	if let Some(rest) = path.strip_prefix("~/") {
		if let Some(home) = dirs_next::home_dir() {
			return home.join(rest);
		}
	}
	PathBuf::from(path)
}

fn merge(into: &mut HostConfig, from: &HostConfig) {
	if into.host_name.is_none() {
		into.host_name = from.host_name.clone();
	}
	if into.user.is_none() {
		into.user = from.user.clone();
	}
	if into.port.is_none() {
		into.port = from.port;
	}
	into.identity_files.extend(from.identity_files.iter().cloned());
	if into.proxy_command.is_none() {
		into.proxy_command = from.proxy_command.clone();
	}
	if into.ciphers.is_none() {
		into.ciphers = from.ciphers.clone();
	}
	if into.kex_algorithms.is_none() {
		into.kex_algorithms = from.kex_algorithms.clone();
	}
	if into.macs.is_none() {
		into.macs = from.macs.clone();
	}
	if into.host_key_algorithms.is_none() {
		into.host_key_algorithms = from.host_key_algorithms.clone();
	}
	if into.server_alive_interval.is_none() {
		into.server_alive_interval = from.server_alive_interval;
	}
	if into.connect_timeout.is_none() {
		into.connect_timeout = from.connect_timeout;
	}
	if into.strict_host_key_checking.is_none() {
		into.strict_host_key_checking = from.strict_host_key_checking;
	}
}

/// OpenSSH `Host` pattern matching: `*` and `?` globs, a leading `!` negates.
/// Good enough for the common single-pattern and wildcard-domain cases;
/// does not implement comma-separated negation precedence edge cases.
fn pattern_matches(pattern: &str, host: &str) -> bool {
	if let Some(negated) = pattern.strip_prefix('!') {
		return !glob_match(negated, host);
	}
	glob_match(pattern, host)
}

fn glob_match(pattern: &str, text: &str) -> bool {
	fn rec(p: &[u8], t: &[u8]) -> bool {
		match p.first() {
			None => t.is_empty(),
			Some(b'*') => rec(&p[1..], t) || (!t.is_empty() && rec(p, &t[1..])),
			Some(b'?') => !t.is_empty() && rec(&p[1..], &t[1..]),
			Some(&c) => t.first() == Some(&c) && rec(&p[1..], &t[1..]),
		}
	}
	rec(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_single_host_stanza() {
		let cfg = SshConfig::parse(
			"Host example\n  HostName example.com\n  User alice\n  Port 2222\n  IdentityFile ~/.ssh/id_ed25519\n",
		)
		.unwrap();
		let resolved = cfg.for_host("example");
		assert_eq!(resolved.host_name.as_deref(), Some("example.com"));
		assert_eq!(resolved.user.as_deref(), Some("alice"));
		assert_eq!(resolved.port, Some(2222));
		assert_eq!(resolved.identity_files.len(), 1);
	}

	#[test]
	fn wildcard_host_applies_defaults_first() {
		let cfg = SshConfig::parse(
			"Host *\n  User default-user\n  ServerAliveInterval 30\n\nHost prod\n  HostName prod.example.com\n",
		)
		.unwrap();
		let resolved = cfg.for_host("prod");
		assert_eq!(resolved.user.as_deref(), Some("default-user"));
		assert_eq!(resolved.host_name.as_deref(), Some("prod.example.com"));
		assert_eq!(resolved.server_alive_interval, Some(30));
	}

	#[test]
	fn first_matching_value_wins() {
		let cfg = SshConfig::parse("Host *\n  User first\n\nHost *\n  User second\n").unwrap();
		assert_eq!(cfg.for_host("anything").user.as_deref(), Some("first"));
	}

	#[test]
	fn cipher_preference_list_is_parsed() {
		let cfg = SshConfig::parse("Host *\n  Ciphers aes256-gcm@openssh.com,aes128-ctr\n").unwrap();
		let resolved = cfg.for_host("x");
		assert_eq!(resolved.ciphers, Some(vec!["aes256-gcm@openssh.com".to_string(), "aes128-ctr".to_string()]));
	}

	#[test]
	fn host_without_matching_stanza_falls_back_to_literal_name() {
		let cfg = SshConfig::parse("Host other\n  User someone\n").unwrap();
		let resolved = cfg.for_host("unmatched.example.com");
		assert_eq!(resolved.host_name.as_deref(), Some("unmatched.example.com"));
	}
}
