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

//! Object identifiers and the process-wide name registry (spec §4.4,
//! §5 "global mutable state" — init-once, append-only after first use).

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier(Vec<u64>);

impl ObjectIdentifier {
	pub fn from_dotted(s: &str) -> Result<Self, Error> {
		let parts: Result<Vec<u64>, _> = s.split('.').map(|p| p.parse::<u64>()).collect();
		let parts = parts.map_err(|_| Error::Parse("malformed dotted OID"))?;
		if parts.len() < 2 {
			return Err(Error::Parse("OID must have at least two arcs"));
		}
		Ok(ObjectIdentifier(parts))
	}

	pub fn to_dotted(&self) -> String {
		self.0.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(".")
	}

	/// Base-128 variable length sub-identifier encoding, canonical first
	/// byte `40*a+b` (X.690 §8.19).
	pub fn encode(&self) -> Vec<u8> {
		let mut out = Vec::new();
		let first = self.0[0] * 40 + self.0[1];
		encode_subidentifier(first, &mut out);
		for &arc in &self.0[2..] {
			encode_subidentifier(arc, &mut out);
		}
		out
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
		let mut arcs = Vec::new();
		let mut value: u64 = 0;
		let mut started = false;
		for &b in bytes {
			started = true;
			value = (value << 7) | (b & 0x7f) as u64;
			if b & 0x80 == 0 {
				arcs.push(value);
				value = 0;
			}
		}
		if started && value != 0 {
			return Err(Error::Parse("truncated OID sub-identifier"));
		}
		if arcs.is_empty() {
			return Err(Error::Parse("empty OID"));
		}
		let first_two = arcs.remove(0);
		let (a, b) = if first_two >= 80 { (2, first_two - 80) } else { (first_two / 40, first_two % 40) };
		let mut out = vec![a, b];
		out.extend(arcs);
		Ok(ObjectIdentifier(out))
	}

	pub fn arcs(&self) -> &[u64] {
		&self.0
	}

	pub fn name(&self) -> Option<String> {
		registry().read().unwrap().by_oid.get(&self.to_dotted()).cloned()
	}
}

fn encode_subidentifier(mut value: u64, out: &mut Vec<u8>) {
	let mut stack = vec![(value & 0x7f) as u8];
	value >>= 7;
	while value > 0 {
		stack.push(((value & 0x7f) as u8) | 0x80);
		value >>= 7;
	}
	out.extend(stack.into_iter().rev());
}

struct Registry {
	by_name: HashMap<String, String>,
	by_oid: HashMap<String, String>,
}

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(build_default_registry()));

fn registry() -> &'static RwLock<Registry> {
	&REGISTRY
}

/// Register a new `name <-> dotted-OID` pair. Intended to run at module
/// init (X.509 extension registration); treated as append-only afterwards
/// per spec §5 "Shared resources".
pub fn register(name: &str, dotted_oid: &str) {
	let mut reg = REGISTRY.write().unwrap();
	reg.by_name.insert(name.to_string(), dotted_oid.to_string());
	reg.by_oid.insert(dotted_oid.to_string(), name.to_string());
}

pub fn lookup_by_name(name: &str) -> Option<String> {
	REGISTRY.read().unwrap().by_name.get(name).cloned()
}

pub fn lookup_by_oid(dotted_oid: &str) -> Option<String> {
	REGISTRY.read().unwrap().by_oid.get(dotted_oid).cloned()
}

fn build_default_registry() -> Registry {
	let mut reg = Registry { by_name: HashMap::new(), by_oid: HashMap::new() };
	let seed: &[(&str, &str)] = &[
		("rsaEncryption", "1.2.840.113549.1.1.1"),
		("md5WithRSAEncryption", "1.2.840.113549.1.1.4"),
		("sha1WithRSAEncryption", "1.2.840.113549.1.1.5"),
		("rsassaPss", "1.2.840.113549.1.1.10"),
		("sha256WithRSAEncryption", "1.2.840.113549.1.1.11"),
		("sha384WithRSAEncryption", "1.2.840.113549.1.1.12"),
		("sha512WithRSAEncryption", "1.2.840.113549.1.1.13"),
		("id-ecPublicKey", "1.2.840.10045.2.1"),
		("ecdsa-with-SHA256", "1.2.840.10045.4.3.2"),
		("ecdsa-with-SHA384", "1.2.840.10045.4.3.3"),
		("ecdsa-with-SHA512", "1.2.840.10045.4.3.4"),
		("id-dsa", "1.2.840.10040.4.1"),
		("id-dsa-with-sha1", "1.2.840.10040.4.3"),
		("commonName", "2.5.4.3"),
		("countryName", "2.5.4.6"),
		("organizationName", "2.5.4.10"),
		("organizationalUnitName", "2.5.4.11"),
		("stateOrProvinceName", "2.5.4.8"),
		("basicConstraints", "2.5.29.19"),
		("keyUsage", "2.5.29.15"),
		("extKeyUsage", "2.5.29.37"),
		("subjectAltName", "2.5.29.17"),
		("authorityKeyIdentifier", "2.5.29.35"),
		("subjectKeyIdentifier", "2.5.29.14"),
		("certificatePolicies", "2.5.29.32"),
		("cRLDistributionPoints", "2.5.29.31"),
		("authorityInfoAccess", "1.3.6.1.5.5.7.1.1"),
		("nameConstraints", "2.5.29.30"),
		("policyMappings", "2.5.29.33"),
		("policyConstraints", "2.5.29.36"),
		("inhibitAnyPolicy", "2.5.29.54"),
		("freshestCRL", "2.5.29.46"),
		("pkcs9-emailAddress", "1.2.840.113549.1.9.1"),
		("data", "1.2.840.113549.1.7.1"),
		("pkcs7-signedData", "1.2.840.113549.1.7.2"),
		("pkcs7-encryptedData", "1.2.840.113549.1.7.6"),
		("pbeWithSHAAnd3-KeyTripleDES-CBC", "1.2.840.113549.1.12.1.3"),
		("pbes2", "1.2.840.113549.1.5.13"),
		("pbkdf2", "1.2.840.113549.1.5.12"),
	];
	for (name, oid) in seed {
		reg.by_name.insert(name.to_string(), oid.to_string());
		reg.by_oid.insert(oid.to_string(), name.to_string());
	}
	reg
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encode_decode_roundtrip() {
		let oid = ObjectIdentifier::from_dotted("1.2.840.113549.1.1.1").unwrap();
		let encoded = oid.encode();
		let decoded = ObjectIdentifier::decode(&encoded).unwrap();
		assert_eq!(oid, decoded);
	}

	#[test]
	fn registry_roundtrip() {
		assert_eq!(lookup_by_name("rsaEncryption").as_deref(), Some("1.2.840.113549.1.1.1"));
		assert_eq!(lookup_by_oid("2.5.29.19").as_deref(), Some("basicConstraints"));
	}

	#[test]
	fn first_byte_is_40a_plus_b() {
		let oid = ObjectIdentifier::from_dotted("2.5.29.19").unwrap();
		let encoded = oid.encode();
		assert_eq!(encoded[0], 40 * 2 + 5);
	}
}
