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

//! The agent client (C10): a thin codec over the agent IPC socket. Unlike
//! `wyvern-sftp`/`wyvern-scp` this never touches an SSH channel — the agent
//! protocol speaks its own length-prefixed framing directly over a local
//! Unix socket, with no encryption or multiplexing of its own.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use wyvern_ssh::wire::{Reader, Writer};

use crate::msg::*;

/// Guards against a malicious or broken agent claiming an absurd reply
/// length; no real identity list or signature approaches this.
const MAX_PACKET_LEN: u32 = 256 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Wire(#[from] wyvern_ssh::Error),
	#[error("local I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("malformed agent reply: {0}")]
	Malformed(&'static str),
	#[error("agent refused the request")]
	Failure,
	#[error("unexpected agent reply type {0}")]
	UnexpectedReply(u8),
	#[error("SSH_AUTH_SOCK is not set")]
	NoAgentSocket,
}

/// One key the agent holds, as reported by `SSH_AGENT_IDENTITIES_ANSWER`.
/// `blob` is the key's SSH2 public-key wire blob, already in the form
/// `publickey_probe_request`/`publickey_request` in `wyvern-ssh::auth` want
/// it — the agent never exposes private key material over this protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
	pub blob: Vec<u8>,
	pub comment: String,
}

/// `SSH_AGENTC_ADD_ID_CONSTRAINED` constraints (draft-miller-ssh-agent §3.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Constraint {
	/// Key expires after this many seconds.
	Lifetime(u32),
	/// Agent must prompt the user before each use of this key.
	Confirm,
}

fn encode_constraint(w: Writer, constraint: &Constraint) -> Writer {
	match constraint {
		Constraint::Lifetime(seconds) => w.byte(SSH_AGENT_CONSTRAIN_LIFETIME).u32(*seconds),
		Constraint::Confirm => w.byte(SSH_AGENT_CONSTRAIN_CONFIRM),
	}
}

/// A connection to a running `ssh-agent`. Generic over the transport so
/// tests can drive it over an in-memory duplex stream instead of a real
/// Unix socket.
pub struct AgentClient<S> {
	stream: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin> AgentClient<S> {
	pub fn new(stream: S) -> Self {
		AgentClient { stream }
	}

	async fn write_packet(&mut self, payload: &[u8]) -> Result<(), Error> {
		self.stream.write_all(&(payload.len() as u32).to_be_bytes()).await?;
		self.stream.write_all(payload).await?;
		self.stream.flush().await?;
		Ok(())
	}

	async fn read_packet(&mut self) -> Result<Vec<u8>, Error> {
		let mut len_bytes = [0u8; 4];
		self.stream.read_exact(&mut len_bytes).await?;
		let len = u32::from_be_bytes(len_bytes);
		if len == 0 {
			return Err(Error::Malformed("zero-length agent reply"));
		}
		if len > MAX_PACKET_LEN {
			return Err(Error::Malformed("agent reply exceeds the size this client will buffer"));
		}
		let mut payload = vec![0u8; len as usize];
		self.stream.read_exact(&mut payload).await?;
		Ok(payload)
	}

	async fn request(&mut self, msg_type: u8, writer: Writer) -> Result<(u8, Vec<u8>), Error> {
		log::trace!("agent: request type={}", msg_type);
		let body = Writer::new().byte(msg_type).raw(&writer.finish()).finish();
		self.write_packet(&body).await?;
		let reply = self.read_packet().await?;
		let mut r = Reader::new(&reply);
		let reply_type = r.byte()?;
		Ok((reply_type, r.rest().to_vec()))
	}

	async fn request_expect_success(&mut self, msg_type: u8, writer: Writer) -> Result<(), Error> {
		let (reply_type, _body) = self.request(msg_type, writer).await?;
		match reply_type {
			SSH_AGENT_SUCCESS => Ok(()),
			SSH_AGENT_FAILURE => Err(Error::Failure),
			other => Err(Error::UnexpectedReply(other)),
		}
	}

	/// `SSH_AGENTC_REQUEST_IDENTITIES`: every key the agent currently holds.
	pub async fn list_identities(&mut self) -> Result<Vec<Identity>, Error> {
		let (reply_type, body) = self.request(SSH_AGENTC_REQUEST_IDENTITIES, Writer::new()).await?;
		match reply_type {
			SSH_AGENT_IDENTITIES_ANSWER => {
				let mut r = Reader::new(&body);
				let count = r.u32()?;
				let mut identities = Vec::with_capacity(count as usize);
				for _ in 0..count {
					let blob = r.string()?.to_vec();
					let comment = r.utf8_string()?;
					identities.push(Identity { blob, comment });
				}
				log::debug!("agent: {} identities reported", identities.len());
				Ok(identities)
			}
			SSH_AGENT_FAILURE => Err(Error::Failure),
			other => Err(Error::UnexpectedReply(other)),
		}
	}

	/// `SSH_AGENTC_SIGN_REQUEST`: asks the agent to sign `data` with the key
	/// matching `key_blob`. `flags` carries RFC 8332 `SSH_AGENT_RSA_SHA2_*`
	/// bits for `ssh-rsa` keys; pass `0` for every other algorithm. Returns
	/// the SSH2 signature wire blob (algorithm name + raw signature).
	pub async fn sign(&mut self, key_blob: &[u8], data: &[u8], flags: u32) -> Result<Vec<u8>, Error> {
		let writer = Writer::new().string(key_blob).string(data).u32(flags);
		let (reply_type, body) = self.request(SSH_AGENTC_SIGN_REQUEST, writer).await?;
		match reply_type {
			SSH_AGENT_SIGN_RESPONSE => {
				let mut r = Reader::new(&body);
				Ok(r.string()?.to_vec())
			}
			SSH_AGENT_FAILURE => Err(Error::Failure),
			other => Err(Error::UnexpectedReply(other)),
		}
	}

	/// `SSH_AGENTC_ADD_IDENTITY`. `private_key_wire_fields` is the
	/// algorithm-specific private key field sequence (e.g. for `ssh-rsa`:
	/// `string "ssh-rsa"`, then `n`, `e`, `d`, `iqmp`, `p`, `q` as `mpint`s)
	/// already encoded — building that encoding is a key-format concern
	/// this client leaves to `wyvern-keys`.
	pub async fn add_identity(&mut self, private_key_wire_fields: &[u8], comment: &str) -> Result<(), Error> {
		let writer = Writer::new().raw(private_key_wire_fields).string(comment.as_bytes());
		self.request_expect_success(SSH_AGENTC_ADD_IDENTITY, writer).await
	}

	/// `SSH_AGENTC_ADD_ID_CONSTRAINED`: as [`Self::add_identity`], but the
	/// key is only usable under the given constraints (a lifetime, a
	/// per-use confirmation prompt, or both).
	pub async fn add_identity_constrained(
		&mut self,
		private_key_wire_fields: &[u8],
		comment: &str,
		constraints: &[Constraint],
	) -> Result<(), Error> {
		let mut writer = Writer::new().raw(private_key_wire_fields).string(comment.as_bytes());
		for constraint in constraints {
			writer = encode_constraint(writer, constraint);
		}
		self.request_expect_success(SSH_AGENTC_ADD_ID_CONSTRAINED, writer).await
	}

	/// `SSH_AGENTC_REMOVE_IDENTITY`: drops the key matching `key_blob`.
	pub async fn remove_identity(&mut self, key_blob: &[u8]) -> Result<(), Error> {
		let writer = Writer::new().string(key_blob);
		self.request_expect_success(SSH_AGENTC_REMOVE_IDENTITY, writer).await
	}

	/// `SSH_AGENTC_REMOVE_ALL_IDENTITIES`.
	pub async fn remove_all_identities(&mut self) -> Result<(), Error> {
		self.request_expect_success(SSH_AGENTC_REMOVE_ALL_IDENTITIES, Writer::new()).await
	}

	/// `SSH_AGENTC_LOCK`: the agent refuses every other request until
	/// [`Self::unlock`] is called with the same passphrase.
	pub async fn lock(&mut self, passphrase: &str) -> Result<(), Error> {
		let writer = Writer::new().string(passphrase.as_bytes());
		self.request_expect_success(SSH_AGENTC_LOCK, writer).await
	}

	pub async fn unlock(&mut self, passphrase: &str) -> Result<(), Error> {
		let writer = Writer::new().string(passphrase.as_bytes());
		self.request_expect_success(SSH_AGENTC_UNLOCK, writer).await
	}

	/// Gives the underlying transport back, e.g. to close it explicitly.
	pub fn into_inner(self) -> S {
		self.stream
	}
}

#[cfg(unix)]
mod unix_transport {
	use std::env;
	use std::path::Path;

	use tokio::net::UnixStream;

	use super::{AgentClient, Error};

	impl AgentClient<UnixStream> {
		/// Connects to the agent listening at `path`.
		pub async fn connect(path: impl AsRef<Path>) -> Result<Self, Error> {
			let stream = UnixStream::connect(path).await?;
			Ok(AgentClient::new(stream))
		}

		/// Connects to the agent named by the `SSH_AUTH_SOCK` environment
		/// variable, the convention every OpenSSH-compatible client follows.
		pub async fn connect_env() -> Result<Self, Error> {
			let path = env::var("SSH_AUTH_SOCK").map_err(|_| Error::NoAgentSocket)?;
			Self::connect(path).await
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn identities_answer(identities: &[(&[u8], &str)]) -> Vec<u8> {
		let mut w = Writer::new().byte(SSH_AGENT_IDENTITIES_ANSWER).u32(identities.len() as u32);
		for (blob, comment) in identities {
			w = w.string(blob).string(comment.as_bytes());
		}
		w.finish()
	}

	#[tokio::test]
	async fn list_identities_parses_multiple_entries() {
		let (client_io, mut server_io) = tokio::io::duplex(4096);
		let mut client = AgentClient::new(client_io);

		let server = tokio::spawn(async move {
			let mut len_bytes = [0u8; 4];
			server_io.read_exact(&mut len_bytes).await.unwrap();
			let len = u32::from_be_bytes(len_bytes) as usize;
			let mut request = vec![0u8; len];
			server_io.read_exact(&mut request).await.unwrap();
			assert_eq!(request, vec![SSH_AGENTC_REQUEST_IDENTITIES]);

			let reply = identities_answer(&[(b"blob-one", "alice@host"), (b"blob-two", "bob@host")]);
			server_io.write_all(&(reply.len() as u32).to_be_bytes()).await.unwrap();
			server_io.write_all(&reply).await.unwrap();
			server_io.flush().await.unwrap();
		});

		let identities = client.list_identities().await.unwrap();
		server.await.unwrap();

		assert_eq!(identities.len(), 2);
		assert_eq!(identities[0].blob, b"blob-one");
		assert_eq!(identities[0].comment, "alice@host");
		assert_eq!(identities[1].comment, "bob@host");
	}

	#[tokio::test]
	async fn sign_returns_signature_blob_and_propagates_failure() {
		let (client_io, mut server_io) = tokio::io::duplex(4096);
		let mut client = AgentClient::new(client_io);

		let server = tokio::spawn(async move {
			let mut len_bytes = [0u8; 4];
			server_io.read_exact(&mut len_bytes).await.unwrap();
			let len = u32::from_be_bytes(len_bytes) as usize;
			let mut request = vec![0u8; len];
			server_io.read_exact(&mut request).await.unwrap();
			assert_eq!(request[0], SSH_AGENTC_SIGN_REQUEST);

			let reply = Writer::new().byte(SSH_AGENT_SIGN_RESPONSE).string(b"sig-blob").finish();
			server_io.write_all(&(reply.len() as u32).to_be_bytes()).await.unwrap();
			server_io.write_all(&reply).await.unwrap();
			server_io.flush().await.unwrap();
		});

		let signature = client.sign(b"key-blob", b"data-to-sign", 0).await.unwrap();
		server.await.unwrap();
		assert_eq!(signature, b"sig-blob");
	}

	#[tokio::test]
	async fn remove_identity_maps_agent_failure() {
		let (client_io, mut server_io) = tokio::io::duplex(4096);
		let mut client = AgentClient::new(client_io);

		let server = tokio::spawn(async move {
			let mut len_bytes = [0u8; 4];
			server_io.read_exact(&mut len_bytes).await.unwrap();
			let len = u32::from_be_bytes(len_bytes) as usize;
			let mut request = vec![0u8; len];
			server_io.read_exact(&mut request).await.unwrap();

			let reply = Writer::new().byte(SSH_AGENT_FAILURE).finish();
			server_io.write_all(&(reply.len() as u32).to_be_bytes()).await.unwrap();
			server_io.write_all(&reply).await.unwrap();
			server_io.flush().await.unwrap();
		});

		let err = client.remove_identity(b"no-such-key").await.unwrap_err();
		server.await.unwrap();
		assert!(matches!(err, Error::Failure));
	}
}
