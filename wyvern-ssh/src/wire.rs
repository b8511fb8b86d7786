//! RFC 4251 §5 primitive encoders/decoders (C2): `packSSH2`/`unpackSSH2` for
//! `byte`, `boolean`, `uint32`, `uint64`, `string`, `mpint` and `name-list`
//! fields, plus the constant-time compare spec.md asks of this component.

use subtle::ConstantTimeEq;

use crate::Error;

/// Builds up a packet payload field by field, in the order spec.md's
/// `packSSH2` expects them supplied.
#[derive(Default)]
pub struct Writer(Vec<u8>);

impl Writer {
	pub fn new() -> Self {
		Writer(Vec::new())
	}

	pub fn byte(mut self, b: u8) -> Self {
		self.0.push(b);
		self
	}

	pub fn boolean(mut self, b: bool) -> Self {
		self.0.push(b as u8);
		self
	}

	pub fn u32(mut self, v: u32) -> Self {
		self.0.extend_from_slice(&v.to_be_bytes());
		self
	}

	pub fn u64(mut self, v: u64) -> Self {
		self.0.extend_from_slice(&v.to_be_bytes());
		self
	}

	pub fn string(mut self, data: &[u8]) -> Self {
		self.0.extend_from_slice(&(data.len() as u32).to_be_bytes());
		self.0.extend_from_slice(data);
		self
	}

	pub fn name_list(self, names: &[&str]) -> Self {
		self.string(names.join(",").as_bytes())
	}

	/// `mpint`: big-endian two's-complement, minimal length, empty for zero.
	pub fn mpint(mut self, be_bytes: &[u8]) -> Self {
		let mut bytes = be_bytes;
		while bytes.first() == Some(&0) && bytes.len() > 1 {
			bytes = &bytes[1..];
		}
		if bytes == [0] {
			return self.string(&[]);
		}
		if bytes.first().map_or(false, |&b| b & 0x80 != 0) {
			let mut padded = Vec::with_capacity(bytes.len() + 1);
			padded.push(0);
			padded.extend_from_slice(bytes);
			self.0.extend_from_slice(&(padded.len() as u32).to_be_bytes());
			self.0.extend_from_slice(&padded);
			self
		} else {
			self.string(bytes)
		}
	}

	pub fn raw(mut self, data: &[u8]) -> Self {
		self.0.extend_from_slice(data);
		self
	}

	pub fn finish(self) -> Vec<u8> {
		self.0
	}
}

/// Walks a packet payload field by field (`unpackSSH2`).
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

	pub fn is_empty(&self) -> bool {
		self.pos >= self.data.len()
	}

	pub fn byte(&mut self) -> Result<u8, Error> {
		let b = *self.data.get(self.pos).ok_or(Error::Truncated("byte"))?;
		self.pos += 1;
		Ok(b)
	}

	pub fn boolean(&mut self) -> Result<bool, Error> {
		Ok(self.byte()? != 0)
	}

	pub fn u32(&mut self) -> Result<u32, Error> {
		let bytes = self.data.get(self.pos..self.pos + 4).ok_or(Error::Truncated("uint32"))?;
		self.pos += 4;
		Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
	}

	pub fn u64(&mut self) -> Result<u64, Error> {
		let bytes = self.data.get(self.pos..self.pos + 8).ok_or(Error::Truncated("uint64"))?;
		self.pos += 8;
		Ok(u64::from_be_bytes(bytes.try_into().unwrap()))
	}

	pub fn string(&mut self) -> Result<&'a [u8], Error> {
		let len = self.u32()? as usize;
		let s = self.data.get(self.pos..self.pos + len).ok_or(Error::Truncated("string"))?;
		self.pos += len;
		Ok(s)
	}

	pub fn utf8_string(&mut self) -> Result<String, Error> {
		Ok(String::from_utf8_lossy(self.string()?).into_owned())
	}

	pub fn name_list(&mut self) -> Result<Vec<String>, Error> {
		let s = self.utf8_string()?;
		if s.is_empty() {
			return Ok(Vec::new());
		}
		Ok(s.split(',').map(str::to_string).collect())
	}

	/// `mpint`, returned as big-endian bytes with any sign-extension byte
	/// stripped (non-negative values only, as every SSH KEX use expects).
	pub fn mpint(&mut self) -> Result<Vec<u8>, Error> {
		let raw = self.string()?;
		Ok(match raw.first() {
			Some(0) => raw[1..].to_vec(),
			_ => raw.to_vec(),
		})
	}

	pub fn rest(&mut self) -> &'a [u8] {
		let r = &self.data[self.pos..];
		self.pos = self.data.len();
		r
	}
}

/// Constant-time byte comparison (C2), used for MAC tag checks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	a.len() == b.len() && a.ct_eq(b).unwrap_u8() == 1
}

/// Byte-increment a big-endian counter in place (C2), used by CTR mode and
/// GCM's invocation counter. Wraps silently on overflow.
pub fn increment_be(counter: &mut [u8]) {
	for byte in counter.iter_mut().rev() {
		*byte = byte.wrapping_add(1);
		if *byte != 0 {
			break;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mpint_round_trips_high_bit_value() {
		let payload = Writer::new().mpint(&[0x80, 0x01]).finish();
		let mut r = Reader::new(&payload);
		assert_eq!(r.mpint().unwrap(), vec![0x80, 0x01]);
	}

	#[test]
	fn mpint_of_zero_is_empty_string() {
		let payload = Writer::new().mpint(&[0]).finish();
		assert_eq!(payload, vec![0, 0, 0, 0]);
	}

	#[test]
	fn name_list_round_trips() {
		let payload = Writer::new().name_list(&["a", "b", "c"]).finish();
		let mut r = Reader::new(&payload);
		assert_eq!(r.name_list().unwrap(), vec!["a", "b", "c"]);
	}

	#[test]
	fn increment_be_carries() {
		let mut c = [0u8, 0, 0xff];
		increment_be(&mut c);
		assert_eq!(c, [0, 1, 0]);
	}

	#[test]
	fn constant_time_eq_rejects_length_mismatch() {
		assert!(!constant_time_eq(b"abc", b"ab"));
		assert!(constant_time_eq(b"abc", b"abc"));
	}
}
