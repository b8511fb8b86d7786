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

//! The SFTP client state machine (C9): runs the subsystem over one
//! `wyvern-ssh` session channel, speaks the `SSH_FXP_INIT`/`VERSION`
//! handshake, correlates pipelined requests by id, and exposes the
//! filesystem-oriented operations on top.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use wyvern_ssh::channel::MAXIMUM_PACKET_SIZE;
use wyvern_ssh::client::{Client, ReadMode};
use wyvern_ssh::wire::{Reader, Writer};

use crate::attrs::FileAttributes;
use crate::msg::*;
use crate::statcache::StatCache;

/// Pipelined requests are submitted up to this many at a time during
/// `put`/`get`, matching spec.md's "default: 25" pipelining depth.
pub const DEFAULT_PIPELINE_DEPTH: usize = 25;

/// Leaves comfortable room under the channel's negotiated max packet size
/// for the SFTP framing (length + type + id + handle string + offset) that
/// wraps every `read`/`write` payload.
const MAX_IO_CHUNK: usize = MAXIMUM_PACKET_SIZE as usize - 64;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Ssh(#[from] wyvern_ssh::Error),
	#[error("local I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("malformed SFTP packet: {0}")]
	Malformed(&'static str),
	#[error("SFTP {kind:?} ({code}) on {path}: {message}")]
	Status { kind: StatusKind, code: u32, message: String, path: String },
}

/// Coarse classification of `SSH_FXP_STATUS` codes, per spec.md §4.2
/// "Server status codes map to kinds".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
	Eof,
	NoSuchFile,
	PermissionDenied,
	Failure,
	BadMessage,
	NoConnection,
	ConnectionLost,
	OpUnsupported,
	Unknown,
}

impl StatusKind {
	fn from_code(code: u32) -> Self {
		match code {
			SSH_FX_EOF => StatusKind::Eof,
			SSH_FX_NO_SUCH_FILE => StatusKind::NoSuchFile,
			SSH_FX_PERMISSION_DENIED => StatusKind::PermissionDenied,
			SSH_FX_FAILURE => StatusKind::Failure,
			SSH_FX_BAD_MESSAGE => StatusKind::BadMessage,
			SSH_FX_NO_CONNECTION => StatusKind::NoConnection,
			SSH_FX_CONNECTION_LOST => StatusKind::ConnectionLost,
			SSH_FX_OP_UNSUPPORTED => StatusKind::OpUnsupported,
			_ => StatusKind::Unknown,
		}
	}
}

/// `{remote_handle, kind: file, offset, eof}` from spec.md's SFTP handle
/// data model; `offset` and `eof` are tracked by the caller across
/// `read_at`/`write_at` calls rather than inside the handle itself, since a
/// caller doing random access has no single "current offset" to track.
#[derive(Clone, Debug)]
pub struct FileHandle {
	handle: Vec<u8>,
	path: String,
}

#[derive(Clone, Debug)]
pub struct DirHandle {
	handle: Vec<u8>,
	path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
	pub filename: String,
	pub longname: String,
	pub attrs: FileAttributes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListField {
	Filename,
	Size,
	Mtime,
	Type,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
	Ascending,
	Descending,
}

/// `put` upload modes from spec.md's `put(remote, source, mode)`: the
/// `string`/`localFile`/`callback` source variants all reduce to "any
/// `AsyncRead`", so only the remote-side open behaviour varies here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutMode {
	/// Create or truncate, then write from the start.
	Truncate,
	/// `stat` first to learn the current length, then write from there.
	Resume,
	/// Open with `SSH_FXF_APPEND`; the server decides where writes land.
	Append,
}

/// The OpenSSH `statvfs@openssh.com` extension reply (not ATTRS-encoded;
/// it's eleven `uint64`s in a fixed order).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatVfs {
	pub bsize: u64,
	pub frsize: u64,
	pub blocks: u64,
	pub bfree: u64,
	pub bavail: u64,
	pub files: u64,
	pub ffree: u64,
	pub favail: u64,
	pub fsid: u64,
	pub flag: u64,
	pub namemax: u64,
}

impl StatVfs {
	fn decode(body: &[u8]) -> Result<Self, Error> {
		let mut r = Reader::new(body);
		Ok(StatVfs {
			bsize: r.u64()?,
			frsize: r.u64()?,
			blocks: r.u64()?,
			bfree: r.u64()?,
			bavail: r.u64()?,
			files: r.u64()?,
			ffree: r.u64()?,
			favail: r.u64()?,
			fsid: r.u64()?,
			flag: r.u64()?,
			namemax: r.u64()?,
		})
	}
}

/// Adapts an owned `Vec<u8>` to `AsyncWrite` so [`Sftp::get_bytes`] can
/// share the same streaming `get` path as a caller-supplied sink.
struct VecSink<'a>(&'a mut Vec<u8>);

impl<'a> AsyncWrite for VecSink<'a> {
	fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, std::io::Error>> {
		self.get_mut().0.extend_from_slice(buf);
		Poll::Ready(Ok(buf.len()))
	}

	fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
		Poll::Ready(Ok(()))
	}

	fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
		Poll::Ready(Ok(()))
	}
}

/// Drives one SFTP dialogue over a single session channel of an already
/// authenticated [`Client`]. Like `Client` itself, not `Clone`/`Sync`: one
/// instance, one driving task.
pub struct Sftp<S> {
	client: Client<S>,
	channel_id: u32,
	next_id: u32,
	incoming: Vec<u8>,
	pending: HashMap<u32, (u8, Vec<u8>)>,
	version: u32,
	extensions: HashMap<String, Vec<u8>>,
	stat_cache: StatCache,
	timeout: Option<Duration>,
	list_order: (ListField, SortDirection),
	pipeline_depth: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Sftp<S> {
	/// Opens the `sftp` subsystem on `client` and performs the version
	/// handshake. `client` must already be authenticated.
	pub async fn new(mut client: Client<S>) -> Result<Self, Error> {
		let channel_id = client.subsystem("sftp").await?;
		let mut sftp = Sftp {
			client,
			channel_id,
			next_id: 0,
			incoming: Vec::new(),
			pending: HashMap::new(),
			version: 0,
			extensions: HashMap::new(),
			stat_cache: StatCache::new(),
			timeout: None,
			list_order: (ListField::Filename, SortDirection::Ascending),
			pipeline_depth: DEFAULT_PIPELINE_DEPTH,
		};
		sftp.handshake().await?;
		Ok(sftp)
	}

	async fn handshake(&mut self) -> Result<(), Error> {
		let body = Writer::new().byte(SSH_FXP_INIT).u32(CLIENT_VERSION).finish();
		self.write_framed(&body).await?;
		let packet = self.read_raw_packet().await?;
		if packet.first().copied() != Some(SSH_FXP_VERSION) {
			return Err(Error::Malformed("expected SSH_FXP_VERSION"));
		}
		let mut r = Reader::new(&packet[1..]);
		let server_version = r.u32()?;
		self.version = server_version.min(CLIENT_VERSION);
		while !r.is_empty() {
			let name = r.utf8_string()?;
			let data = r.string()?.to_vec();
			self.extensions.insert(name, data);
		}
		log::debug!("sftp: negotiated version {} (server offered {}), {} extension(s)", self.version, server_version, self.extensions.len());
		Ok(())
	}

	pub fn version(&self) -> u32 {
		self.version
	}

	pub fn supports_extension(&self, name: &str) -> bool {
		self.extensions.contains_key(name)
	}

	pub fn enable_stat_cache(&mut self) {
		self.stat_cache.enable();
	}

	pub fn disable_stat_cache(&mut self) {
		self.stat_cache.disable();
	}

	pub fn clear_stat_cache(&mut self) {
		self.stat_cache.clear();
	}

	pub fn set_timeout(&mut self, timeout: Option<Duration>) {
		self.timeout = timeout;
	}

	pub fn set_pipeline_depth(&mut self, depth: usize) {
		self.pipeline_depth = depth.max(1);
	}

	pub fn set_list_order(&mut self, field: ListField, direction: SortDirection) {
		self.list_order = (field, direction);
	}

	/// Ends the SFTP dialogue (closes the subsystem channel) and hands the
	/// underlying transport back so the caller may open further channels.
	pub async fn close_session(mut self) -> Result<Client<S>, Error> {
		self.client.close_channel(self.channel_id).await?;
		Ok(self.client)
	}

	// --- wire plumbing -----------------------------------------------

	fn next_request_id(&mut self) -> u32 {
		let id = self.next_id;
		self.next_id = self.next_id.wrapping_add(1);
		id
	}

	async fn write_framed(&mut self, body: &[u8]) -> Result<(), Error> {
		let framed = Writer::new().u32(body.len() as u32).raw(body).finish();
		self.client.write(self.channel_id, &framed).await?;
		Ok(())
	}

	async fn send_request(&mut self, msg_type: u8, id: u32, writer: Writer) -> Result<(), Error> {
		log::trace!("sftp: request id={} type={}", id, msg_type);
		let body = Writer::new().byte(msg_type).u32(id).raw(&writer.finish()).finish();
		self.write_framed(&body).await
	}

	async fn fill_buffer_until(&mut self, needed: usize) -> Result<(), Error> {
		while self.incoming.len() < needed {
			let chunk = self.client.read(self.channel_id, ReadMode::NextChunk, self.timeout).await?;
			if chunk.is_empty() {
				return Err(Error::Ssh(wyvern_ssh::Error::Disconnected("SFTP channel closed mid-reply".to_string())));
			}
			self.incoming.extend_from_slice(&chunk);
		}
		Ok(())
	}

	async fn read_raw_packet(&mut self) -> Result<Vec<u8>, Error> {
		self.fill_buffer_until(4).await?;
		let len = u32::from_be_bytes(self.incoming[0..4].try_into().unwrap()) as usize;
		self.fill_buffer_until(4 + len).await?;
		let packet = self.incoming[4..4 + len].to_vec();
		self.incoming.drain(0..4 + len);
		Ok(packet)
	}

	/// Reads packets off the wire until one tagged with `id` turns up,
	/// stashing any mismatched replies (a pipelined sibling request
	/// finishing out of order) for their own eventual `recv_matching` call.
	async fn recv_matching(&mut self, id: u32) -> Result<(u8, Vec<u8>), Error> {
		if let Some(reply) = self.pending.remove(&id) {
			return Ok(reply);
		}
		loop {
			let packet = self.read_raw_packet().await?;
			let msg_type = *packet.first().ok_or(Error::Malformed("empty SFTP packet"))?;
			let mut r = Reader::new(&packet[1..]);
			let got_id = r.u32()?;
			let body = r.rest().to_vec();
			if got_id == id {
				return Ok((msg_type, body));
			}
			self.pending.insert(got_id, (msg_type, body));
		}
	}

	async fn request(&mut self, msg_type: u8, writer: Writer) -> Result<(u8, Vec<u8>), Error> {
		let id = self.next_request_id();
		self.send_request(msg_type, id, writer).await?;
		self.recv_matching(id).await
	}

	fn parse_status_raw(body: &[u8]) -> Result<(u32, String), Error> {
		let mut r = Reader::new(body);
		let code = r.u32()?;
		let message = r.utf8_string().unwrap_or_default();
		Ok((code, message))
	}

	fn status_err(body: &[u8], path: &str) -> Error {
		match Self::parse_status_raw(body) {
			Ok((code, message)) => {
				log::warn!("sftp: status {} on {}: {}", code, path, message);
				Error::Status { kind: StatusKind::from_code(code), code, message, path: path.to_string() }
			}
			Err(e) => e,
		}
	}

	fn status_only_from_body(body: &[u8], path: &str) -> Result<(), Error> {
		let (code, message) = Self::parse_status_raw(body)?;
		if code == SSH_FX_OK {
			Ok(())
		} else {
			Err(Error::Status { kind: StatusKind::from_code(code), code, message, path: path.to_string() })
		}
	}

	async fn status_only(&mut self, msg_type: u8, writer: Writer, path: &str) -> Result<(), Error> {
		let (got_type, body) = self.request(msg_type, writer).await?;
		if got_type != SSH_FXP_STATUS {
			return Err(Error::Malformed("expected SSH_FXP_STATUS"));
		}
		Self::status_only_from_body(&body, path)
	}

	async fn handle_request(&mut self, msg_type: u8, writer: Writer, path: &str) -> Result<Vec<u8>, Error> {
		let (got_type, body) = self.request(msg_type, writer).await?;
		match got_type {
			SSH_FXP_HANDLE => {
				let mut r = Reader::new(&body);
				Ok(r.string()?.to_vec())
			}
			SSH_FXP_STATUS => Err(Self::status_err(&body, path)),
			_ => Err(Error::Malformed("expected SSH_FXP_HANDLE")),
		}
	}

	async fn attrs_request(&mut self, msg_type: u8, writer: Writer, path: &str) -> Result<FileAttributes, Error> {
		let (got_type, body) = self.request(msg_type, writer).await?;
		match got_type {
			SSH_FXP_ATTRS => {
				let mut r = Reader::new(&body);
				Ok(FileAttributes::decode(&mut r)?)
			}
			SSH_FXP_STATUS => Err(Self::status_err(&body, path)),
			_ => Err(Error::Malformed("expected SSH_FXP_ATTRS")),
		}
	}

	fn decode_name_entries(body: &[u8]) -> Result<Vec<DirEntry>, Error> {
		let mut r = Reader::new(body);
		let count = r.u32()?;
		let mut entries = Vec::with_capacity(count as usize);
		for _ in 0..count {
			let filename = r.utf8_string()?;
			let longname = r.utf8_string()?;
			let attrs = FileAttributes::decode(&mut r)?;
			entries.push(DirEntry { filename, longname, attrs });
		}
		Ok(entries)
	}

	fn expect_single_name(msg_type: u8, body: &[u8], path: &str) -> Result<String, Error> {
		match msg_type {
			SSH_FXP_NAME => Self::decode_name_entries(body)?
				.into_iter()
				.next()
				.map(|e| e.filename)
				.ok_or(Error::Malformed("empty SSH_FXP_NAME reply")),
			SSH_FXP_STATUS => Err(Self::status_err(body, path)),
			_ => Err(Error::Malformed("expected SSH_FXP_NAME")),
		}
	}

	async fn extended_two_path(&mut self, ext: &str, a: &str, b: &str) -> Result<(), Error> {
		self.status_only(SSH_FXP_EXTENDED, Writer::new().string(ext.as_bytes()).string(a.as_bytes()).string(b.as_bytes()), a).await
	}

	// --- core operations -----------------------------------------------

	pub async fn realpath(&mut self, path: &str) -> Result<String, Error> {
		let (msg_type, body) = self.request(SSH_FXP_REALPATH, Writer::new().string(path.as_bytes())).await?;
		Self::expect_single_name(msg_type, &body, path)
	}

	/// Follows symlinks (unlike [`Sftp::lstat`]); served from the stat
	/// cache when enabled and populated.
	pub async fn stat(&mut self, path: &str) -> Result<FileAttributes, Error> {
		if let Some(cached) = self.stat_cache.stat(path) {
			return Ok(cached.clone());
		}
		let attrs = self.attrs_request(SSH_FXP_STAT, Writer::new().string(path.as_bytes()), path).await?;
		self.stat_cache.put_stat(path, attrs.clone());
		Ok(attrs)
	}

	/// Does not follow symlinks.
	pub async fn lstat(&mut self, path: &str) -> Result<FileAttributes, Error> {
		if let Some(cached) = self.stat_cache.lstat(path) {
			return Ok(cached.clone());
		}
		let attrs = self.attrs_request(SSH_FXP_LSTAT, Writer::new().string(path.as_bytes()), path).await?;
		self.stat_cache.put_lstat(path, attrs.clone());
		Ok(attrs)
	}

	pub async fn setstat(&mut self, path: &str, attrs: &FileAttributes) -> Result<(), Error> {
		let writer = attrs.encode(Writer::new().string(path.as_bytes()));
		self.status_only(SSH_FXP_SETSTAT, writer, path).await?;
		self.stat_cache.invalidate(path);
		Ok(())
	}

	pub async fn fsetstat(&mut self, handle: &FileHandle, attrs: &FileAttributes) -> Result<(), Error> {
		let writer = attrs.encode(Writer::new().string(&handle.handle));
		self.status_only(SSH_FXP_FSETSTAT, writer, &handle.path).await?;
		self.stat_cache.invalidate(&handle.path);
		Ok(())
	}

	/// `SETSTAT { size }`, per spec.md's "Truncation is implemented via
	/// SETSTAT".
	pub async fn truncate(&mut self, path: &str, size: u64) -> Result<(), Error> {
		self.setstat(path, &FileAttributes::with_size(size)).await
	}

	pub async fn remove(&mut self, path: &str) -> Result<(), Error> {
		self.status_only(SSH_FXP_REMOVE, Writer::new().string(path.as_bytes()), path).await?;
		self.stat_cache.invalidate(path);
		Ok(())
	}

	/// Uses `posix-rename@openssh.com` (which may overwrite an existing
	/// target) when the server advertises it, else the plain v3 `rename`
	/// (which most servers refuse if `to` already exists).
	pub async fn rename(&mut self, from: &str, to: &str) -> Result<(), Error> {
		if self.supports_extension(EXT_POSIX_RENAME) {
			self.extended_two_path(EXT_POSIX_RENAME, from, to).await?;
		} else {
			self.status_only(SSH_FXP_RENAME, Writer::new().string(from.as_bytes()).string(to.as_bytes()), from).await?;
		}
		self.stat_cache.invalidate(from);
		self.stat_cache.invalidate(to);
		Ok(())
	}

	pub async fn hardlink(&mut self, old_path: &str, new_path: &str) -> Result<(), Error> {
		if !self.supports_extension(EXT_HARDLINK) {
			return Err(Error::Status {
				kind: StatusKind::OpUnsupported,
				code: SSH_FX_OP_UNSUPPORTED,
				message: "server does not advertise hardlink@openssh.com".to_string(),
				path: old_path.to_string(),
			});
		}
		self.extended_two_path(EXT_HARDLINK, old_path, new_path).await?;
		self.stat_cache.invalidate(new_path);
		Ok(())
	}

	pub async fn statvfs(&mut self, path: &str) -> Result<StatVfs, Error> {
		if !self.supports_extension(EXT_STATVFS) {
			return Err(Error::Status {
				kind: StatusKind::OpUnsupported,
				code: SSH_FX_OP_UNSUPPORTED,
				message: "server does not advertise statvfs@openssh.com".to_string(),
				path: path.to_string(),
			});
		}
		let (msg_type, body) = self.request(SSH_FXP_EXTENDED, Writer::new().string(EXT_STATVFS.as_bytes()).string(path.as_bytes())).await?;
		match msg_type {
			SSH_FXP_EXTENDED_REPLY => StatVfs::decode(&body),
			SSH_FXP_STATUS => Err(Self::status_err(&body, path)),
			_ => Err(Error::Malformed("expected SSH_FXP_EXTENDED_REPLY")),
		}
	}

	pub async fn mkdir(&mut self, path: &str, attrs: &FileAttributes) -> Result<(), Error> {
		let writer = attrs.encode(Writer::new().string(path.as_bytes()));
		self.status_only(SSH_FXP_MKDIR, writer, path).await?;
		self.stat_cache.invalidate(path);
		Ok(())
	}

	/// Creates missing ancestors first, ignoring the "already exists"
	/// case by probing with `stat` rather than inspecting status codes
	/// (servers disagree on which code a pre-existing directory gets).
	pub async fn mkdir_recursive(&mut self, path: &str) -> Result<(), Error> {
		let mut built = String::new();
		for part in path.split('/') {
			if part.is_empty() {
				if built.is_empty() {
					built.push('/');
				}
				continue;
			}
			if !built.is_empty() && !built.ends_with('/') {
				built.push('/');
			}
			built.push_str(part);
			if self.stat(&built).await.is_err() {
				self.mkdir(&built, &FileAttributes::default()).await?;
			}
		}
		Ok(())
	}

	pub async fn rmdir(&mut self, path: &str) -> Result<(), Error> {
		self.status_only(SSH_FXP_RMDIR, Writer::new().string(path.as_bytes()), path).await?;
		self.stat_cache.invalidate(path);
		Ok(())
	}

	/// Argument order follows the draft literally: link path, then target.
	pub async fn symlink(&mut self, target: &str, link_path: &str) -> Result<(), Error> {
		self.status_only(SSH_FXP_SYMLINK, Writer::new().string(link_path.as_bytes()).string(target.as_bytes()), link_path).await?;
		self.stat_cache.invalidate(link_path);
		Ok(())
	}

	pub async fn readlink(&mut self, path: &str) -> Result<String, Error> {
		let (msg_type, body) = self.request(SSH_FXP_READLINK, Writer::new().string(path.as_bytes())).await?;
		Self::expect_single_name(msg_type, &body, path)
	}

	pub async fn open(&mut self, path: &str, pflags: u32, attrs: &FileAttributes) -> Result<FileHandle, Error> {
		let writer = attrs.encode(Writer::new().string(path.as_bytes()).u32(pflags));
		let handle = self.handle_request(SSH_FXP_OPEN, writer, path).await?;
		Ok(FileHandle { handle, path: path.to_string() })
	}

	pub async fn close(&mut self, handle: FileHandle) -> Result<(), Error> {
		self.status_only(SSH_FXP_CLOSE, Writer::new().string(&handle.handle), &handle.path).await
	}

	/// `Ok(None)` on `SSH_FX_EOF`, per spec.md's stat-cache/handle model.
	pub async fn read_at(&mut self, handle: &FileHandle, offset: u64, len: u32) -> Result<Option<Vec<u8>>, Error> {
		let (msg_type, body) = self.request(SSH_FXP_READ, Writer::new().string(&handle.handle).u64(offset).u32(len)).await?;
		match msg_type {
			SSH_FXP_DATA => {
				let mut r = Reader::new(&body);
				Ok(Some(r.string()?.to_vec()))
			}
			SSH_FXP_STATUS => {
				let (code, message) = Self::parse_status_raw(&body)?;
				if code == SSH_FX_EOF {
					Ok(None)
				} else {
					Err(Error::Status { kind: StatusKind::from_code(code), code, message, path: handle.path.clone() })
				}
			}
			_ => Err(Error::Malformed("expected SSH_FXP_DATA")),
		}
	}

	pub async fn write_at(&mut self, handle: &FileHandle, offset: u64, data: &[u8]) -> Result<(), Error> {
		self.status_only(SSH_FXP_WRITE, Writer::new().string(&handle.handle).u64(offset).string(data), &handle.path).await
	}

	pub async fn opendir(&mut self, path: &str) -> Result<DirHandle, Error> {
		let handle = self.handle_request(SSH_FXP_OPENDIR, Writer::new().string(path.as_bytes()), path).await?;
		Ok(DirHandle { handle, path: path.to_string() })
	}

	pub async fn closedir(&mut self, handle: DirHandle) -> Result<(), Error> {
		self.status_only(SSH_FXP_CLOSE, Writer::new().string(&handle.handle), &handle.path).await
	}

	/// One batch from the server; `Ok(None)` once the listing is exhausted
	/// (`SSH_FX_EOF`).
	pub async fn readdir_raw(&mut self, handle: &DirHandle) -> Result<Option<Vec<DirEntry>>, Error> {
		let (msg_type, body) = self.request(SSH_FXP_READDIR, Writer::new().string(&handle.handle)).await?;
		match msg_type {
			SSH_FXP_NAME => Ok(Some(Self::decode_name_entries(&body)?)),
			SSH_FXP_STATUS => {
				let (code, message) = Self::parse_status_raw(&body)?;
				if code == SSH_FX_EOF {
					Ok(None)
				} else {
					Err(Error::Status { kind: StatusKind::from_code(code), code, message, path: handle.path.clone() })
				}
			}
			_ => Err(Error::Malformed("expected SSH_FXP_NAME")),
		}
	}

	fn sort_entries(entries: &mut [DirEntry], order: (ListField, SortDirection)) {
		let (field, direction) = order;
		let rank = |name: &str| match name {
			"." => 0,
			".." => 1,
			_ => 2,
		};
		entries.sort_by(|a, b| {
			let (ra, rb) = (rank(&a.filename), rank(&b.filename));
			if ra != 2 || rb != 2 {
				return ra.cmp(&rb);
			}
			let ord = match field {
				ListField::Filename => a.filename.cmp(&b.filename),
				ListField::Size => a.attrs.size.unwrap_or(0).cmp(&b.attrs.size.unwrap_or(0)),
				ListField::Mtime => a.attrs.mtime.unwrap_or(0).cmp(&b.attrs.mtime.unwrap_or(0)),
				ListField::Type => a.attrs.file_type_is_dir().cmp(&b.attrs.file_type_is_dir()),
			};
			match direction {
				SortDirection::Ascending => ord,
				SortDirection::Descending => ord.reverse(),
			}
		});
	}

	/// Reads a whole directory, feeds the stat cache, and sorts per
	/// [`Sftp::set_list_order`] with `.`/`..` always first.
	pub async fn rawlist(&mut self, path: &str) -> Result<Vec<DirEntry>, Error> {
		let handle = self.opendir(path).await?;
		let mut entries = Vec::new();
		loop {
			match self.readdir_raw(&handle).await {
				Ok(Some(batch)) => entries.extend(batch),
				Ok(None) => break,
				Err(e) => {
					let _ = self.closedir(handle).await;
					return Err(e);
				}
			}
		}
		self.closedir(handle).await?;
		let listing: Vec<(String, FileAttributes)> = entries.iter().map(|e| (e.filename.clone(), e.attrs.clone())).collect();
		self.stat_cache.record_listing(path, &listing);
		Self::sort_entries(&mut entries, self.list_order);
		Ok(entries)
	}

	pub async fn nlist(&mut self, path: &str) -> Result<Vec<String>, Error> {
		Ok(self.rawlist(path).await?.into_iter().map(|e| e.filename).collect())
	}

	/// Walks and deletes a subtree: files via `remove`, directories
	/// depth-first via `rmdir` after recursing into their children. Takes
	/// `path` by value (rather than `&'a str`) since each recursive call
	/// needs to hand down a freshly built child path whose lifetime is
	/// shorter than the boxed future's.
	pub fn delete_recursive<'a>(&'a mut self, path: String) -> Pin<Box<dyn std::future::Future<Output = Result<(), Error>> + 'a>> {
		Box::pin(async move {
			let st = self.lstat(&path).await?;
			if !st.file_type_is_dir() {
				return self.remove(&path).await;
			}
			let entries = self.rawlist(&path).await?;
			let trimmed = path.trim_end_matches('/');
			for entry in entries {
				if entry.filename == "." || entry.filename == ".." {
					continue;
				}
				let child = format!("{}/{}", trimmed, entry.filename);
				self.delete_recursive(child).await?;
			}
			self.rmdir(&path).await
		})
	}

	// --- streaming transfers --------------------------------------------

	/// Uploads `source` to `remote`, pipelining writes up to
	/// [`Sftp::set_pipeline_depth`] in flight at once. Returns the number
	/// of bytes written.
	pub async fn put<R: AsyncRead + Unpin>(&mut self, remote: &str, mut source: R, mode: PutMode) -> Result<u64, Error> {
		let mut pflags = SSH_FXF_WRITE | SSH_FXF_CREAT;
		match mode {
			PutMode::Truncate => pflags |= SSH_FXF_TRUNC,
			PutMode::Append => pflags |= SSH_FXF_APPEND,
			PutMode::Resume => {}
		}
		let handle = self.open(remote, pflags, &FileAttributes::default()).await?;
		let mut offset = match mode {
			PutMode::Resume => self.stat(remote).await?.size.unwrap_or(0),
			_ => 0,
		};
		let mut inflight: VecDeque<u32> = VecDeque::new();
		let mut buf = vec![0u8; MAX_IO_CHUNK];
		let mut total = 0u64;
		let mut source_eof = false;
		loop {
			while !source_eof && inflight.len() < self.pipeline_depth {
				let n = source.read(&mut buf).await?;
				if n == 0 {
					source_eof = true;
					break;
				}
				let id = self.next_request_id();
				self.send_request(SSH_FXP_WRITE, id, Writer::new().string(&handle.handle).u64(offset).string(&buf[..n])).await?;
				inflight.push_back(id);
				offset += n as u64;
				total += n as u64;
			}
			let Some(id) = inflight.pop_front() else { break };
			let (msg_type, body) = self.recv_matching(id).await?;
			if msg_type != SSH_FXP_STATUS {
				let _ = self.close(handle).await;
				return Err(Error::Malformed("expected SSH_FXP_STATUS"));
			}
			if let Err(e) = Self::status_only_from_body(&body, remote) {
				let _ = self.close(handle).await;
				return Err(e);
			}
		}
		self.stat_cache.invalidate(remote);
		self.close(handle).await?;
		Ok(total)
	}

	/// Downloads `length` bytes (0 = until EOF) starting at `offset` from
	/// `remote` into `sink`, pipelining reads and reassembling them in
	/// offset order before writing (replies may arrive out of order).
	/// Returns the number of bytes written.
	pub async fn get<W: AsyncWrite + Unpin>(&mut self, remote: &str, mut sink: W, offset: u64, length: u64) -> Result<u64, Error> {
		let handle = self.open(remote, SSH_FXF_READ, &FileAttributes::default()).await?;
		let mut next_offset = offset;
		let mut requested = 0u64;
		let mut inflight: VecDeque<(u32, u64)> = VecDeque::new();
		let mut pending_chunks: HashMap<u64, Vec<u8>> = HashMap::new();
		let mut write_cursor = offset;
		let mut eof = false;
		let mut total = 0u64;
		loop {
			while !eof && inflight.len() < self.pipeline_depth && (length == 0 || requested < length) {
				let want = if length == 0 { MAX_IO_CHUNK as u64 } else { (length - requested).min(MAX_IO_CHUNK as u64) };
				if want == 0 {
					break;
				}
				let id = self.next_request_id();
				self.send_request(SSH_FXP_READ, id, Writer::new().string(&handle.handle).u64(next_offset).u32(want as u32)).await?;
				inflight.push_back((id, next_offset));
				next_offset += want;
				requested += want;
			}
			let Some((id, chunk_offset)) = inflight.pop_front() else { break };
			let (msg_type, body) = self.recv_matching(id).await?;
			match msg_type {
				SSH_FXP_DATA => {
					let mut r = Reader::new(&body);
					pending_chunks.insert(chunk_offset, r.string()?.to_vec());
				}
				SSH_FXP_STATUS => {
					let (code, message) = Self::parse_status_raw(&body)?;
					if code == SSH_FX_EOF {
						eof = true;
					} else {
						let _ = self.close(handle).await;
						return Err(Error::Status { kind: StatusKind::from_code(code), code, message, path: remote.to_string() });
					}
				}
				_ => {
					let _ = self.close(handle).await;
					return Err(Error::Malformed("expected SSH_FXP_DATA"));
				}
			}
			while let Some(data) = pending_chunks.remove(&write_cursor) {
				sink.write_all(&data).await?;
				write_cursor += data.len() as u64;
				total += data.len() as u64;
			}
		}
		self.close(handle).await?;
		Ok(total)
	}

	/// Convenience wrapper returning the downloaded bytes directly, for
	/// spec.md's "string returned if [no sink]" `get` mode.
	pub async fn get_bytes(&mut self, remote: &str, offset: u64, length: u64) -> Result<Vec<u8>, Error> {
		let mut buf = Vec::new();
		self.get(remote, VecSink(&mut buf), offset, length).await?;
		Ok(buf)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_kind_maps_known_codes() {
		assert_eq!(StatusKind::from_code(SSH_FX_NO_SUCH_FILE), StatusKind::NoSuchFile);
		assert_eq!(StatusKind::from_code(SSH_FX_OP_UNSUPPORTED), StatusKind::OpUnsupported);
		assert_eq!(StatusKind::from_code(9999), StatusKind::Unknown);
	}

	#[test]
	fn sort_entries_keeps_dot_entries_first() {
		let mut entries = vec![
			DirEntry { filename: "b.txt".to_string(), longname: String::new(), attrs: FileAttributes::default() },
			DirEntry { filename: "..".to_string(), longname: String::new(), attrs: FileAttributes::default() },
			DirEntry { filename: "a.txt".to_string(), longname: String::new(), attrs: FileAttributes::default() },
			DirEntry { filename: ".".to_string(), longname: String::new(), attrs: FileAttributes::default() },
		];
		Sftp::<tokio::io::DuplexStream>::sort_entries(&mut entries, (ListField::Filename, SortDirection::Ascending));
		let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
		assert_eq!(names, vec![".", "..", "a.txt", "b.txt"]);
	}

	#[test]
	fn sort_entries_by_size_descending() {
		let mut entries = vec![
			DirEntry { filename: "small".to_string(), longname: String::new(), attrs: FileAttributes::with_size(1) },
			DirEntry { filename: "big".to_string(), longname: String::new(), attrs: FileAttributes::with_size(100) },
		];
		Sftp::<tokio::io::DuplexStream>::sort_entries(&mut entries, (ListField::Size, SortDirection::Descending));
		let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
		assert_eq!(names, vec!["big", "small"]);
	}

	#[tokio::test]
	async fn vec_sink_accumulates_writes() {
		let mut buf = Vec::new();
		{
			let mut sink = VecSink(&mut buf);
			sink.write_all(b"hello").await.unwrap();
			sink.write_all(b" world").await.unwrap();
		}
		assert_eq!(buf, b"hello world");
	}
}
