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

//! Key format plugins: each submodule reads and writes one on-disk key
//! encoding (the "format plugin registry" spec.md asks for) over the same
//! RFC 4251 wire primitives (`wire` module) that the OpenSSH public key
//! blob itself uses.

pub mod jwk;
pub mod openssh;
pub mod pkcs1;
pub mod pkcs8;
pub mod putty;
pub mod raw;
pub mod registry;
pub mod signature_format;
pub mod xml;

use crate::Error;

/// RFC 4251 §5 primitive encoders/decoders: every SSH key blob and private
/// key file is built from `string` and `mpint` fields laid out this way.
pub mod wire {
	use crate::Error;

	pub fn put_string(out: &mut Vec<u8>, data: &[u8]) {
		out.extend_from_slice(&(data.len() as u32).to_be_bytes());
		out.extend_from_slice(data);
	}

	pub fn put_mpint(out: &mut Vec<u8>, be_bytes: &[u8]) {
		let mut bytes = be_bytes;
		while bytes.first() == Some(&0) && bytes.len() > 1 {
			bytes = &bytes[1..];
		}
		if let Some(&first) = bytes.first() {
			if first & 0x80 != 0 {
				let mut padded = Vec::with_capacity(bytes.len() + 1);
				padded.push(0);
				padded.extend_from_slice(bytes);
				return put_string(out, &padded);
			}
		}
		put_string(out, bytes);
	}

	pub fn put_u32(out: &mut Vec<u8>, v: u32) {
		out.extend_from_slice(&v.to_be_bytes());
	}

	pub struct Reader<'a> {
		data: &'a [u8],
		pos: usize,
	}

	impl<'a> Reader<'a> {
		pub fn new(data: &'a [u8]) -> Self {
			Reader { data, pos: 0 }
		}

		pub fn remaining(&self) -> &'a [u8] {
			&self.data[self.pos..]
		}

		pub fn read_string(&mut self) -> Result<&'a [u8], Error> {
			let len_bytes = self.data.get(self.pos..self.pos + 4).ok_or(Error::Malformed("truncated length"))?;
			let len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
			self.pos += 4;
			let s = self.data.get(self.pos..self.pos + len).ok_or(Error::Malformed("truncated string"))?;
			self.pos += len;
			Ok(s)
		}

		pub fn read_u32(&mut self) -> Result<u32, Error> {
			let bytes = self.data.get(self.pos..self.pos + 4).ok_or(Error::Malformed("truncated u32"))?;
			self.pos += 4;
			Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
		}

		pub fn read_byte(&mut self) -> Result<u8, Error> {
			let b = *self.data.get(self.pos).ok_or(Error::Malformed("truncated byte"))?;
			self.pos += 1;
			Ok(b)
		}

		pub fn is_empty(&self) -> bool {
			self.pos >= self.data.len()
		}
	}
}

/// A bare encoded key blob plus the algorithm that produced it, the unit
/// the format plugins above actually move between their on-disk encodings.
#[derive(Clone, Debug)]
pub struct KeyBlob {
	pub algorithm: crate::KeyAlgorithm,
	pub data: Vec<u8>,
}

pub trait KeyFormat {
	fn encode_public(blob: &KeyBlob) -> Result<Vec<u8>, Error>;
	fn decode_public(data: &[u8]) -> Result<KeyBlob, Error>;
}
