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

//! `ATTRS` (draft-ietf-secsh-filexfer-02 §5): the file attribute record
//! returned by `stat`/`lstat`/`fstat` and sent with `setstat`/`fsetstat`/
//! `open`. Fields are all optional; presence is carried by a flags word.

use wyvern_ssh::wire::{Reader, Writer};
use wyvern_ssh::Error as WireError;

use crate::msg::*;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileAttributes {
	pub size: Option<u64>,
	pub uid: Option<u32>,
	pub gid: Option<u32>,
	pub permissions: Option<u32>,
	pub atime: Option<u32>,
	pub mtime: Option<u32>,
	pub extended: Vec<(String, Vec<u8>)>,
}

impl FileAttributes {
	/// A bare `SETSTAT { size }`, the wire form `truncate` is built from.
	pub fn with_size(size: u64) -> Self {
		FileAttributes { size: Some(size), ..Default::default() }
	}

	pub fn is_dir(&self, permissions_mask_dir_bit: u32) -> bool {
		self.permissions.map_or(false, |p| p & permissions_mask_dir_bit != 0)
	}

	pub(crate) fn encode(&self, w: Writer) -> Writer {
		let mut flags = 0u32;
		if self.size.is_some() {
			flags |= SSH_FILEXFER_ATTR_SIZE;
		}
		if self.uid.is_some() || self.gid.is_some() {
			flags |= SSH_FILEXFER_ATTR_UIDGID;
		}
		if self.permissions.is_some() {
			flags |= SSH_FILEXFER_ATTR_PERMISSIONS;
		}
		if self.atime.is_some() || self.mtime.is_some() {
			flags |= SSH_FILEXFER_ATTR_ACMODTIME;
		}
		if !self.extended.is_empty() {
			flags |= SSH_FILEXFER_ATTR_EXTENDED;
		}
		let mut w = w.u32(flags);
		if let Some(size) = self.size {
			w = w.u64(size);
		}
		if flags & SSH_FILEXFER_ATTR_UIDGID != 0 {
			w = w.u32(self.uid.unwrap_or(0)).u32(self.gid.unwrap_or(0));
		}
		if let Some(permissions) = self.permissions {
			w = w.u32(permissions);
		}
		if flags & SSH_FILEXFER_ATTR_ACMODTIME != 0 {
			w = w.u32(self.atime.unwrap_or(0)).u32(self.mtime.unwrap_or(0));
		}
		if !self.extended.is_empty() {
			w = w.u32(self.extended.len() as u32);
			for (key, value) in &self.extended {
				w = w.string(key.as_bytes()).string(value);
			}
		}
		w
	}

	pub(crate) fn decode(r: &mut Reader) -> Result<Self, WireError> {
		let flags = r.u32()?;
		let mut attrs = FileAttributes::default();
		if flags & SSH_FILEXFER_ATTR_SIZE != 0 {
			attrs.size = Some(r.u64()?);
		}
		if flags & SSH_FILEXFER_ATTR_UIDGID != 0 {
			attrs.uid = Some(r.u32()?);
			attrs.gid = Some(r.u32()?);
		}
		if flags & SSH_FILEXFER_ATTR_PERMISSIONS != 0 {
			attrs.permissions = Some(r.u32()?);
		}
		if flags & SSH_FILEXFER_ATTR_ACMODTIME != 0 {
			attrs.atime = Some(r.u32()?);
			attrs.mtime = Some(r.u32()?);
		}
		if flags & SSH_FILEXFER_ATTR_EXTENDED != 0 {
			let count = r.u32()?;
			for _ in 0..count {
				let key = r.utf8_string()?;
				let value = r.string()?.to_vec();
				attrs.extended.push((key, value));
			}
		}
		Ok(attrs)
	}
}

/// `S_IFDIR` (POSIX permissions encode the file type in the high bits, the
/// same convention OpenSSH's `sftp-server` uses in `permissions`).
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFLNK: u32 = 0o120000;

impl FileAttributes {
	pub fn file_type_is_dir(&self) -> bool {
		self.permissions.map_or(false, |p| p & S_IFMT == S_IFDIR)
	}

	pub fn file_type_is_symlink(&self) -> bool {
		self.permissions.map_or(false, |p| p & S_IFMT == S_IFLNK)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_size_and_permissions() {
		let attrs = FileAttributes { size: Some(42), permissions: Some(0o100644), ..Default::default() };
		let bytes = attrs.encode(Writer::new()).finish();
		let mut r = Reader::new(&bytes);
		let decoded = FileAttributes::decode(&mut r).unwrap();
		assert_eq!(decoded, attrs);
	}

	#[test]
	fn round_trips_extended_pairs() {
		let attrs = FileAttributes { extended: vec![("x-flag".to_string(), vec![1, 2, 3])], ..Default::default() };
		let bytes = attrs.encode(Writer::new()).finish();
		let mut r = Reader::new(&bytes);
		let decoded = FileAttributes::decode(&mut r).unwrap();
		assert_eq!(decoded.extended, attrs.extended);
	}

	#[test]
	fn empty_attrs_round_trip_to_zero_flags() {
		let attrs = FileAttributes::default();
		let bytes = attrs.encode(Writer::new()).finish();
		assert_eq!(bytes, 0u32.to_be_bytes());
	}
}
