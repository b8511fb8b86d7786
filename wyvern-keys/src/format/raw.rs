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

//! The "raw" format: a key algorithm's native fixed-width scalar bytes with
//! no envelope at all (a bare 32-byte Curve25519/Ed25519 key, or a `(p, a,
//! b)` curve point's `x`/`y` coordinates), for callers that already know
//! which algorithm they're loading and just want the bytes.

use crate::Error;

pub fn encode_ed25519_seed(seed: &[u8; 32]) -> Vec<u8> {
	seed.to_vec()
}

pub fn decode_ed25519_seed(bytes: &[u8]) -> Result<[u8; 32], Error> {
	bytes.try_into().map_err(|_| Error::Malformed("ed25519 raw key must be exactly 32 bytes"))
}

pub fn encode_x25519_scalar(scalar: &[u8; 32]) -> Vec<u8> {
	scalar.to_vec()
}

pub fn decode_x25519_scalar(bytes: &[u8]) -> Result<[u8; 32], Error> {
	bytes.try_into().map_err(|_| Error::Malformed("x25519 raw key must be exactly 32 bytes"))
}

/// An uncompressed EC point as SEC1 encodes it: `0x04 || X || Y`, each
/// coordinate left-padded to the curve's field width.
pub fn encode_ec_point_uncompressed(x: &[u8], y: &[u8], field_width: usize) -> Vec<u8> {
	let mut out = Vec::with_capacity(1 + field_width * 2);
	out.push(0x04);
	out.extend(std::iter::repeat(0).take(field_width - x.len()));
	out.extend_from_slice(x);
	out.extend(std::iter::repeat(0).take(field_width - y.len()));
	out.extend_from_slice(y);
	out
}

pub fn decode_ec_point_uncompressed(bytes: &[u8]) -> Result<(&[u8], &[u8]), Error> {
	if bytes.first() != Some(&0x04) {
		return Err(Error::Malformed("only uncompressed EC points are supported"));
	}
	let rest = &bytes[1..];
	if rest.len() % 2 != 0 {
		return Err(Error::Malformed("uncompressed EC point has odd coordinate length"));
	}
	Ok(rest.split_at(rest.len() / 2))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ec_point_roundtrip() {
		let encoded = encode_ec_point_uncompressed(&[1, 2], &[3, 4], 4);
		let (x, y) = decode_ec_point_uncompressed(&encoded).unwrap();
		assert_eq!(x, &[0, 0, 1, 2]);
		assert_eq!(y, &[0, 0, 3, 4]);
	}

	#[test]
	fn rejects_compressed_point() {
		assert!(decode_ec_point_uncompressed(&[0x02, 1, 2, 3, 4]).is_err());
	}
}
