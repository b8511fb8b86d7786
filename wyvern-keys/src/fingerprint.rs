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

//! OpenSSH-style key fingerprints over the wire-format public key blob
//! (`ssh-keygen -l` output): legacy `MD5:aa:bb:...` and the modern default
//! `SHA256:base64...`.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use wyvern_digest::Algorithm;

pub fn md5_fingerprint(public_key_blob: &[u8]) -> String {
	let digest = wyvern_digest::Hash::hash(Algorithm::Md5, public_key_blob);
	let hex: Vec<String> = digest.iter().map(|b| format!("{:02x}", b)).collect();
	format!("MD5:{}", hex.join(":"))
}

pub fn sha256_fingerprint(public_key_blob: &[u8]) -> String {
	let digest = wyvern_digest::Hash::hash(Algorithm::Sha256, public_key_blob);
	format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sha256_fingerprint_has_expected_prefix_and_no_padding() {
		let fp = sha256_fingerprint(b"fake public key blob");
		assert!(fp.starts_with("SHA256:"));
		assert!(!fp.contains('='));
	}

	#[test]
	fn md5_fingerprint_is_colon_separated_hex_pairs() {
		let fp = md5_fingerprint(b"fake public key blob");
		let body = fp.strip_prefix("MD5:").unwrap();
		let groups: Vec<&str> = body.split(':').collect();
		assert_eq!(groups.len(), 16);
		assert!(groups.iter().all(|g| g.len() == 2));
	}
}
