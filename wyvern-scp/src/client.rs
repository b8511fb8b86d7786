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

//! The SCP client (C10): the `rcp`-style ack-byte stream spec.md §6
//! describes, driven over one `wyvern-ssh` `exec` channel per transfer.
//! A single call uploads or downloads one file; there is no persistent
//! session object, since the underlying protocol is itself a short-lived
//! `scp -t`/`scp -f` conversation that ends when the channel closes.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use wyvern_ssh::channel::MAXIMUM_PACKET_SIZE;
use wyvern_ssh::client::{Client, ReadMode};

/// Leaves room under the channel's max packet size for the remote shell's
/// own framing; matches the same margin `wyvern-sftp` leaves for SFTP
/// packet headers.
const CHUNK_SIZE: usize = MAXIMUM_PACKET_SIZE as usize - 64;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Ssh(#[from] wyvern_ssh::Error),
	#[error("local I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("malformed scp protocol: {0}")]
	Protocol(&'static str),
	#[error("remote scp error (fatal={fatal}): {message}")]
	Remote { fatal: bool, message: String },
	#[error("remote path {0} is a directory; this client transfers single files only")]
	IsDirectory(String),
	#[error("source produced only {sent} of {expected} declared bytes")]
	ShortSource { expected: u64, sent: u64 },
}

/// Quotes `path` for the remote shell's command line the way a careful
/// `ssh`/`scp` wrapper would: wrapped in single quotes, with embedded
/// single quotes escaped by closing, emitting an escaped quote, reopening.
fn shell_quote(path: &str) -> String {
	format!("'{}'", path.replace('\'', "'\\''"))
}

fn basename(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or(path)
}

fn parse_c_line(line: &str) -> Result<(u32, u64, String), Error> {
	let rest = line.strip_prefix('C').ok_or(Error::Protocol("expected a 'C' control line"))?;
	let mut parts = rest.splitn(3, ' ');
	let mode_str = parts.next().ok_or(Error::Protocol("'C' line missing mode"))?;
	let size_str = parts.next().ok_or(Error::Protocol("'C' line missing size"))?;
	let name = parts.next().ok_or(Error::Protocol("'C' line missing filename"))?.to_string();
	let mode = u32::from_str_radix(mode_str, 8).map_err(|_| Error::Protocol("'C' line has a non-octal mode"))?;
	let size = size_str.parse().map_err(|_| Error::Protocol("'C' line has a non-numeric size"))?;
	Ok((mode, size, name))
}

/// One in-flight `scp -t`/`scp -f` conversation: buffers channel bytes so
/// line- and byte-oriented reads (acks, control lines, raw file data) can
/// share the same underlying `Client::read` chunking.
struct Session<'c, S> {
	client: &'c mut Client<S>,
	channel_id: u32,
	incoming: Vec<u8>,
	timeout: Option<Duration>,
}

impl<'c, S: AsyncRead + AsyncWrite + Unpin> Session<'c, S> {
	async fn fill_until(&mut self, needed: usize) -> Result<(), Error> {
		while self.incoming.len() < needed {
			let chunk = self.client.read(self.channel_id, ReadMode::NextChunk, self.timeout).await?;
			if chunk.is_empty() {
				return Err(Error::Ssh(wyvern_ssh::Error::Disconnected("scp channel closed mid-transfer".to_string())));
			}
			self.incoming.extend_from_slice(&chunk);
		}
		Ok(())
	}

	async fn read_byte(&mut self) -> Result<u8, Error> {
		self.fill_until(1).await?;
		Ok(self.incoming.remove(0))
	}

	async fn read_exact_bytes(&mut self, n: usize) -> Result<Vec<u8>, Error> {
		self.fill_until(n).await?;
		Ok(self.incoming.drain(..n).collect())
	}

	async fn read_line_raw(&mut self) -> Result<String, Error> {
		let mut line = Vec::new();
		loop {
			let b = self.read_byte().await?;
			if b == b'\n' {
				break;
			}
			line.push(b);
		}
		String::from_utf8(line).map_err(|_| Error::Protocol("non-UTF-8 scp control line"))
	}

	/// Reads one full control line, treating a leading `0x01`/`0x02` byte
	/// (warning/fatal, per the protocol's ack convention) as an error
	/// instead of the start of a `C`/`D`/`T`/`E` line.
	async fn read_command(&mut self) -> Result<String, Error> {
		let first = self.read_byte().await?;
		if first == 1 || first == 2 {
			let message = self.read_line_raw().await.unwrap_or_default();
			return Err(Error::Remote { fatal: first == 2, message });
		}
		let rest = self.read_line_raw().await?;
		Ok(format!("{}{}", first as char, rest))
	}

	async fn expect_ack(&mut self) -> Result<(), Error> {
		let status = self.read_byte().await?;
		if status == 0 {
			return Ok(());
		}
		let message = self.read_line_raw().await.unwrap_or_default();
		Err(Error::Remote { fatal: status == 2, message })
	}

	async fn write_raw(&mut self, data: &[u8]) -> Result<(), Error> {
		self.client.write(self.channel_id, data).await?;
		Ok(())
	}

	async fn send_line(&mut self, line: &str) -> Result<(), Error> {
		let mut bytes = line.as_bytes().to_vec();
		bytes.push(b'\n');
		self.write_raw(&bytes).await
	}

	async fn send_ack(&mut self) -> Result<(), Error> {
		self.write_raw(&[0u8]).await
	}

	async fn close(self) -> Result<(), Error> {
		self.client.close_channel(self.channel_id).await?;
		Ok(())
	}
}

/// Uploads `source` (exactly `size` bytes) to `remote_path` as a single
/// file, acting as the protocol's "source" side (`scp -t`). `mode` is a
/// POSIX permission bitmask (e.g. `0o644`); only the low 12 bits are sent.
pub async fn upload<S, R>(client: &mut Client<S>, remote_path: &str, mut source: R, size: u64, mode: u32) -> Result<(), Error>
where
	S: AsyncRead + AsyncWrite + Unpin,
	R: AsyncRead + Unpin,
{
	let channel_id = client.exec(&format!("scp -t {}", shell_quote(remote_path))).await?;
	let mut session = Session { client, channel_id, incoming: Vec::new(), timeout: None };
	log::debug!("scp: uploading {} bytes to {}", size, remote_path);
	session.send_line(&format!("C{:04o} {} {}", mode & 0o7777, size, basename(remote_path))).await?;
	session.expect_ack().await?;
	let mut remaining = size;
	let mut buf = vec![0u8; CHUNK_SIZE];
	while remaining > 0 {
		let want = remaining.min(CHUNK_SIZE as u64) as usize;
		let n = source.read(&mut buf[..want]).await?;
		if n == 0 {
			return Err(Error::ShortSource { expected: size, sent: size - remaining });
		}
		session.write_raw(&buf[..n]).await?;
		remaining -= n as u64;
	}
	session.send_ack().await?;
	session.expect_ack().await?;
	session.close().await
}

/// Downloads a single file from `remote_path` into `sink`, acting as the
/// protocol's "sink" side (`scp -f`). Returns the remote's declared
/// `(size, mode)`. Fails with [`Error::IsDirectory`] if the remote sends a
/// `D` (directory) entry instead of a `C` (file) entry — this client
/// transfers single files only, not recursive trees.
pub async fn download<S, W>(client: &mut Client<S>, remote_path: &str, mut sink: W) -> Result<(u64, u32), Error>
where
	S: AsyncRead + AsyncWrite + Unpin,
	W: AsyncWrite + Unpin,
{
	let channel_id = client.exec(&format!("scp -f {}", shell_quote(remote_path))).await?;
	let mut session = Session { client, channel_id, incoming: Vec::new(), timeout: None };
	session.send_ack().await?;
	loop {
		let line = session.read_command().await?;
		match line.chars().next() {
			Some('T') => {
				session.send_ack().await?;
			}
			Some('D') => {
				return Err(Error::IsDirectory(remote_path.to_string()));
			}
			Some('E') => {}
			Some('C') => {
				let (mode, size, _name) = parse_c_line(&line)?;
				log::debug!("scp: downloading {} bytes from {}", size, remote_path);
				session.send_ack().await?;
				let mut remaining = size;
				while remaining > 0 {
					let want = remaining.min(CHUNK_SIZE as u64) as usize;
					let chunk = session.read_exact_bytes(want).await?;
					sink.write_all(&chunk).await?;
					remaining -= chunk.len() as u64;
				}
				session.expect_ack().await?;
				session.send_ack().await?;
				session.close().await?;
				return Ok((size, mode));
			}
			_ => return Err(Error::Protocol("expected a 'C', 'D', 'T' or 'E' control line")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_well_formed_c_line() {
		let (mode, size, name) = parse_c_line("C0644 1234 report.txt").unwrap();
		assert_eq!(mode, 0o644);
		assert_eq!(size, 1234);
		assert_eq!(name, "report.txt");
	}

	#[test]
	fn rejects_non_c_line() {
		assert!(matches!(parse_c_line("D0755 0 subdir"), Err(Error::Protocol(_))));
	}

	#[test]
	fn shell_quote_escapes_embedded_quotes() {
		assert_eq!(shell_quote("it's a file"), "'it'\\''s a file'");
	}

	#[test]
	fn basename_strips_directory_components() {
		assert_eq!(basename("/home/alice/report.txt"), "report.txt");
		assert_eq!(basename("report.txt"), "report.txt");
	}
}
