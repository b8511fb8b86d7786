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

//! A `Vec<u8>`-like buffer that zeroes its memory whenever it is cleared,
//! resized down, reallocated or dropped. Used everywhere key material and
//! packet plaintext passes through the stack, so that a `core::mem::forget`
//! or panic never leaves secrets lying around on the heap.

use std::ops::{Deref, DerefMut};

use zeroize::Zeroize;

/// A self-zeroizing byte buffer.
#[derive(Clone, Default)]
pub struct CryptoVec {
	buf: Vec<u8>,
}

impl std::fmt::Debug for CryptoVec {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "CryptoVec {{ {} bytes }}", self.buf.len())
	}
}

impl Drop for CryptoVec {
	fn drop(&mut self) {
		self.buf.zeroize();
	}
}

impl CryptoVec {
	pub fn new() -> Self {
		CryptoVec { buf: Vec::new() }
	}

	pub fn with_capacity(cap: usize) -> Self {
		CryptoVec { buf: Vec::with_capacity(cap) }
	}

	pub fn from_slice(s: &[u8]) -> Self {
		CryptoVec { buf: s.to_vec() }
	}

	/// Zero the contents without deallocating.
	pub fn clear(&mut self) {
		self.buf.zeroize();
		self.buf.clear();
	}

	pub fn len(&self) -> usize {
		self.buf.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	pub fn extend(&mut self, s: &[u8]) {
		self.buf.extend_from_slice(s);
	}

	pub fn push(&mut self, b: u8) {
		self.buf.push(b);
	}

	pub fn push_u32_be(&mut self, n: u32) {
		self.extend(&n.to_be_bytes());
	}

	/// Grow (or shrink, zeroizing the discarded tail) to exactly `size`
	/// bytes, returning the newly-added region for the caller to fill in.
	pub fn resize_mut(&mut self, size: usize) -> &mut [u8] {
		let start = self.buf.len();
		if size <= start {
			for b in &mut self.buf[start - size..] {
				*b = 0;
			}
		} else {
			self.buf.resize(start + size, 0);
		}
		&mut self.buf[self.buf.len() - size..]
	}

	pub fn resize(&mut self, size: usize) {
		if size < self.buf.len() {
			for b in &mut self.buf[size..] {
				*b = 0;
			}
		}
		self.buf.resize(size, 0);
	}

	pub fn into_vec(mut self) -> Vec<u8> {
		std::mem::take(&mut self.buf)
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.buf
	}
}

impl Deref for CryptoVec {
	type Target = [u8];
	fn deref(&self) -> &[u8] {
		&self.buf
	}
}

impl DerefMut for CryptoVec {
	fn deref_mut(&mut self) -> &mut [u8] {
		&mut self.buf
	}
}

impl From<Vec<u8>> for CryptoVec {
	fn from(buf: Vec<u8>) -> Self {
		CryptoVec { buf }
	}
}

impl<'a> From<&'a [u8]> for CryptoVec {
	fn from(buf: &'a [u8]) -> Self {
		CryptoVec { buf: buf.to_vec() }
	}
}

impl Extend<u8> for CryptoVec {
	fn extend<T: IntoIterator<Item = u8>>(&mut self, iter: T) {
		self.buf.extend(iter)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn resize_mut_grows_and_zeroizes_shrink() {
		let mut v = CryptoVec::new();
		v.extend(b"hello world");
		{
			let tail = v.resize_mut(16);
			assert_eq!(tail.len(), 5);
			tail.copy_from_slice(b"12345");
		}
		assert_eq!(v.len(), 16);
		v.resize(4);
		assert_eq!(&v[..], b"hell");
	}

	#[test]
	fn clear_zeroizes() {
		let mut v = CryptoVec::from_slice(b"secret");
		v.clear();
		assert!(v.is_empty());
	}
}
