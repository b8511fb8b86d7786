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

//! Certificate chain validation (RFC 5280 §6, simplified to the checks a
//! client needs rather than the full path-validation state machine):
//! signature verification up to a trust anchor, validity windows,
//! `BasicConstraints`/`KeyUsage` enforcement on every issuer, accumulated
//! `NameConstraints`, and SAN-based hostname matching.

use chrono::{Datelike, Timelike};
use wyvern_asn1::value::Time;

use crate::certificate::Certificate;
use crate::extensions::GeneralName;
use crate::Error;

/// How deep a chain may run before validation gives up rather than loop
/// forever on a malicious or malformed candidate set (RFC 5280 places no
/// fixed bound; this one is generous for any real deployment).
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 8;

pub struct ChainOptions {
	/// Accept a single self-signed leaf as its own trust anchor.
	pub allow_self_signed: bool,
	pub max_depth: usize,
	/// Reject certificates outside their `notBefore`/`notAfter` window.
	/// Disabled only for validating historical chains against a fixed
	/// point in time, via `current_time`.
	pub check_validity: bool,
	/// The instant validity windows are checked against; `None` uses the
	/// wall clock.
	pub current_time: Option<Time>,
}

impl Default for ChainOptions {
	fn default() -> Self {
		ChainOptions { allow_self_signed: false, max_depth: DEFAULT_MAX_CHAIN_DEPTH, check_validity: true, current_time: None }
	}
}

fn now() -> Time {
	let now = chrono::Utc::now();
	Time { year: now.year() as u16, month: now.month() as u8, day: now.day() as u8, hour: now.hour() as u8, minute: now.minute() as u8, second: now.second() as u8 }
}

/// Validates `leaf` against `candidates` (intermediates and trust anchors,
/// in no particular order), returning the path from leaf to the
/// self-signed root that was actually used.
pub fn validate_chain<'a>(leaf: &'a Certificate, candidates: &'a [Certificate], options: &ChainOptions) -> Result<Vec<&'a Certificate>, Error> {
	let reference_time = options.current_time.unwrap_or_else(now);
	let mut path = Vec::new();
	let mut current = leaf;
	let mut permitted_accum: Vec<&crate::extensions::GeneralSubtree> = Vec::new();
	let mut excluded_accum: Vec<&crate::extensions::GeneralSubtree> = Vec::new();

	for depth in 0.. {
		if depth > options.max_depth {
			return Err(Error::RecursionLimitExceeded);
		}
		check_validity_window(current, options.check_validity, reference_time)?;
		path.push(current);

		if current.is_self_signed() {
			let public_key = current.public_key()?;
			let verifies = current.verify_signature(&public_key)?;
			if !verifies {
				return Err(Error::BadSignature);
			}
			if depth > 0 || options.allow_self_signed {
				return finish(path, leaf, permitted_accum, excluded_accum);
			}
			return Err(Error::NoIssuer);
		}

		let issuer = find_issuer(current, candidates).ok_or(Error::NoIssuer)?;
		check_issuer_permitted(issuer, depth)?;

		let public_key = issuer.public_key()?;
		if !current.verify_signature(&public_key)? {
			return Err(Error::IssuerMismatch);
		}

		if let Some(nc) = issuer.tbs_certificate.name_constraints() {
			permitted_accum.extend(nc.permitted.iter());
			excluded_accum.extend(nc.excluded.iter());
		}

		current = issuer;
	}
	unreachable!("loop above always returns before the range is exhausted")
}

fn finish<'a>(
	path: Vec<&'a Certificate>,
	leaf: &'a Certificate,
	permitted: Vec<&crate::extensions::GeneralSubtree>,
	excluded: Vec<&crate::extensions::GeneralSubtree>,
) -> Result<Vec<&'a Certificate>, Error> {
	check_name_constraints(leaf, &permitted, &excluded)?;
	Ok(path)
}

fn check_validity_window(cert: &Certificate, enabled: bool, reference_time: Time) -> Result<(), Error> {
	if !enabled {
		return Ok(());
	}
	let validity = &cert.tbs_certificate.validity;
	if reference_time < validity.not_before || reference_time > validity.not_after {
		return Err(Error::NotCurrentlyValid);
	}
	Ok(())
}

/// RFC 5280 §6.1.3: an issuer in the middle of a chain must be a CA
/// (`BasicConstraints.cA = TRUE`) with `keyCertSign` set whenever it
/// carries a `KeyUsage` extension at all (the extension is optional, but
/// when present it is authoritative).
fn check_issuer_permitted(issuer: &Certificate, child_depth: usize) -> Result<(), Error> {
	let bc = issuer.tbs_certificate.basic_constraints().unwrap_or_default();
	if !bc.ca {
		return Err(Error::IssuerNotPermitted);
	}
	if let Some(path_len) = bc.path_len_constraint {
		// `child_depth` counts certificates already verified below this
		// issuer; a pathLenConstraint of 0 allows no intermediates beneath it.
		if (child_depth as u64) > path_len {
			return Err(Error::IssuerNotPermitted);
		}
	}
	if let Some(ku) = issuer.tbs_certificate.key_usage() {
		if !ku.key_cert_sign {
			return Err(Error::IssuerNotPermitted);
		}
	}
	Ok(())
}

/// Finds every candidate whose `subject` matches `cert`'s `issuer`,
/// preferring one whose `SubjectKeyIdentifier` matches `cert`'s
/// `AuthorityKeyIdentifier.key_identifier` when both are present (RFC 5280
/// §4.2.1.1's recommended disambiguator among same-named issuers).
fn find_issuer<'a>(cert: &Certificate, candidates: &'a [Certificate]) -> Option<&'a Certificate> {
	let by_name: Vec<&Certificate> = candidates.iter().filter(|c| c.tbs_certificate.subject.matches(&cert.tbs_certificate.issuer)).collect();
	if by_name.len() <= 1 {
		return by_name.into_iter().next();
	}
	if let Some(wanted) = cert.tbs_certificate.authority_key_identifier().and_then(|aki| aki.key_identifier.as_deref()) {
		if let Some(matched) = by_name.iter().find(|c| c.tbs_certificate.subject_key_identifier() == Some(wanted)) {
			return Some(*matched);
		}
	}
	by_name.into_iter().next()
}

/// Checks `leaf`'s subject `commonName` and every `dNSName`/`rfc822Name`/
/// `directoryName` SAN entry against the accumulated constraints from every
/// issuer in the path. Other `GeneralName` forms (`uniformResourceIdentifier`,
/// `iPAddress`, `registeredID`) are not checked: RFC 5280 §4.2.1.10 does not
/// require a form this crate has no comparison rule for to be rejected.
fn check_name_constraints(leaf: &Certificate, permitted: &[&crate::extensions::GeneralSubtree], excluded: &[&crate::extensions::GeneralSubtree]) -> Result<(), Error> {
	if permitted.is_empty() && excluded.is_empty() {
		return Ok(());
	}
	let mut names: Vec<GeneralName> = Vec::new();
	if let Some(cn) = leaf.tbs_certificate.subject.common_name() {
		names.push(GeneralName::DnsName(cn.to_string()));
	}
	if let Some(sans) = leaf.tbs_certificate.subject_alt_names() {
		names.extend(sans.iter().cloned());
	}

	for name in &names {
		if excluded.iter().any(|subtree| name_matches_subtree(name, &subtree.base)) {
			return Err(Error::NameConstraintsViolation);
		}
		let applicable_permitted: Vec<&&crate::extensions::GeneralSubtree> = permitted.iter().filter(|s| std::mem::discriminant(&s.base) == std::mem::discriminant(name)).collect();
		if !applicable_permitted.is_empty() && !applicable_permitted.iter().any(|subtree| name_matches_subtree(name, &subtree.base)) {
			return Err(Error::NameConstraintsViolation);
		}
	}
	Ok(())
}

fn name_matches_subtree(name: &GeneralName, base: &GeneralName) -> bool {
	match (name, base) {
		(GeneralName::DnsName(n), GeneralName::DnsName(b)) => dns_name_in_subtree(n, b),
		(GeneralName::Rfc822Name(n), GeneralName::Rfc822Name(b)) => rfc822_in_subtree(n, b),
		(GeneralName::DirectoryName(n), GeneralName::DirectoryName(b)) => directory_name_in_subtree(n, b),
		_ => false,
	}
}

/// A dNSName constraint `example.com` matches `example.com` itself and any
/// subdomain, but not `notexample.com`.
fn dns_name_in_subtree(name: &str, base: &str) -> bool {
	let name = name.trim_end_matches('.').to_ascii_lowercase();
	let base = base.trim_end_matches('.').to_ascii_lowercase();
	if base.is_empty() {
		return true;
	}
	name == base || name.ends_with(&format!(".{}", base))
}

/// An rfc822Name constraint may be a full mailbox (`user@host.com`, exact
/// match) or a bare domain (`host.com`, matching any mailbox at that domain
/// or a subdomain of it), per RFC 5280 §4.2.1.10.
fn rfc822_in_subtree(name: &str, base: &str) -> bool {
	if base.contains('@') {
		return name.eq_ignore_ascii_case(base);
	}
	match name.rsplit_once('@') {
		Some((_, domain)) => dns_name_in_subtree(domain, base),
		None => false,
	}
}

fn directory_name_in_subtree(name: &crate::name::Name, base: &crate::name::Name) -> bool {
	if base.rdns.len() > name.rdns.len() {
		return false;
	}
	let prefix = crate::name::Name { rdns: name.rdns[..base.rdns.len()].to_vec() };
	prefix.matches(base)
}

/// RFC 6125-style single-leftmost-label wildcard matching of a URL's host
/// against a certificate's `dNSName` SAN entries; no fallback to the
/// subject `commonName`, matching modern TLS client behavior rather than
/// the legacy CN-as-hostname convention.
pub fn validate_url(cert: &Certificate, url: &str) -> Result<(), Error> {
	let hostname = host_from_url(url);
	let hostname = hostname.trim_end_matches('.').to_ascii_lowercase();
	let sans = cert.tbs_certificate.subject_alt_names().unwrap_or(&[]);
	let matches = sans.iter().any(|name| match name {
		GeneralName::DnsName(pattern) => hostname_matches_pattern(&hostname, &pattern.trim_end_matches('.').to_ascii_lowercase()),
		_ => false,
	});
	if matches {
		Ok(())
	} else {
		Err(Error::HostnameMismatch)
	}
}

/// Pulls the authority's host out of `scheme://[user@]host[:port][/path]`,
/// or treats the whole input as a bare hostname when it carries no scheme.
fn host_from_url(url: &str) -> &str {
	let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
	let authority = after_scheme.split(['/', '?', '#']).next().unwrap_or(after_scheme);
	let authority = authority.rsplit_once('@').map(|(_, host)| host).unwrap_or(authority);
	if authority.starts_with('[') {
		// IPv6 literal: `[::1]:22` — keep the bracketed form as-is rather
		// than truncating at the colons inside it.
		return authority.split(']').next().map(|h| &h[1..]).unwrap_or(authority);
	}
	authority.split_once(':').map(|(host, _)| host).unwrap_or(authority)
}

fn hostname_matches_pattern(hostname: &str, pattern: &str) -> bool {
	if pattern == hostname {
		return true;
	}
	let Some(rest) = pattern.strip_prefix("*.") else {
		return false;
	};
	// A wildcard covers exactly one label: "*.example.com" matches
	// "foo.example.com" but not "example.com" or "a.b.example.com".
	match hostname.split_once('.') {
		Some((_, host_rest)) => host_rest == rest,
		None => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::extensions::KeyUsage;
	use crate::name::{AttributeTypeAndValue, Name};
	use wyvern_asn1::element::encode_tlv;
	use wyvern_asn1::oid::ObjectIdentifier;
	use wyvern_asn1::tag::{universal, TagClass};
	use wyvern_asn1::value::BitString;
	use wyvern_bigint::BigInteger;
	use wyvern_digest::Algorithm as DigestAlgorithm;
	use wyvern_keys::ec::{nist_p256, Curve, Point};
	use wyvern_keys::ecdsa;

	fn cn_name(value: &str) -> Name {
		Name { rdns: vec![vec![AttributeTypeAndValue { attribute_type: ObjectIdentifier::from_dotted("2.5.4.3").unwrap(), value: value.to_string() }]] }
	}

	fn encode_name(name: &Name) -> Vec<u8> {
		let rdns: Vec<u8> = name
			.rdns
			.iter()
			.map(|rdn| {
				let atvs: Vec<u8> = rdn
					.iter()
					.map(|atv| {
						let parts = [wyvern_asn1::value::encode_oid(&atv.attribute_type), wyvern_asn1::value::encode_printable_string(&atv.value).unwrap()].concat();
						encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &parts)
					})
					.collect::<Vec<_>>()
					.concat();
				encode_tlv(TagClass::Universal, universal::SET, true, &atvs)
			})
			.collect::<Vec<_>>()
			.concat();
		encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &rdns)
	}

	/// Hand-assembles a two-level chain (root -> leaf), exercising
	/// `validate_chain` without real CA-issued fixtures on disk.
	fn build_chain(leaf_ca: bool) -> (Certificate, Certificate) {
		let curve = Curve::load(nist_p256());
		let root_d = BigInteger::from_u64(1001);
		let leaf_d = BigInteger::from_u64(2002);

		let root_cert = build_cert(&curve, &root_d, &root_d, "root", "root", true, None);
		let leaf_cert = build_cert(&curve, &leaf_d, &root_d, "leaf", "root", leaf_ca, None);
		(root_cert, leaf_cert)
	}

	fn build_cert(curve: &Curve, subject_key: &BigInteger, signing_key: &BigInteger, subject_cn: &str, issuer_cn: &str, ca: bool, key_usage: Option<KeyUsage>) -> Certificate {
		use wyvern_asn1::value::{encode_integer, encode_oid, encode_time};

		let q = curve.base_point_mul(subject_key);
		let (qx, qy) = match &q {
			Point::Affine(x, y) => (x.to_bytes_be_padded(32), y.to_bytes_be_padded(32)),
			Point::Infinity => panic!("generator multiple must not be infinity"),
		};
		let mut point_bytes = vec![0x04u8];
		point_bytes.extend_from_slice(&qx);
		point_bytes.extend_from_slice(&qy);

		let ec_public_key_oid = ObjectIdentifier::from_dotted("1.2.840.10045.2.1").unwrap();
		let named_curve_oid = ObjectIdentifier::from_dotted("1.2.840.10045.3.1.7").unwrap();
		let alg_id = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[encode_oid(&ec_public_key_oid), encode_oid(&named_curve_oid)].concat());
		let spki = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[alg_id, BitString::from_bytes(point_bytes).encode()].concat());

		let subject = encode_name(&cn_name(subject_cn));
		let issuer = encode_name(&cn_name(issuer_cn));

		let validity = encode_tlv(
			TagClass::Universal,
			universal::SEQUENCE,
			true,
			&[encode_time(Time { year: 2020, month: 1, day: 1, hour: 0, minute: 0, second: 0 }), encode_time(Time { year: 2040, month: 1, day: 1, hour: 0, minute: 0, second: 0 })].concat(),
		);

		let ecdsa_sha256_oid = ObjectIdentifier::from_dotted("1.2.840.10045.4.3.2").unwrap();
		let sig_alg_id = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &encode_oid(&ecdsa_sha256_oid));

		let bc_inner = encode_tlv(TagClass::Universal, universal::BOOLEAN, false, &[if ca { 0xff } else { 0x00 }]);
		let bc_seq = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &bc_inner);
		let bc_octets = wyvern_asn1::value::encode_octet_string(&bc_seq);
		let bc_ext = encode_tlv(
			TagClass::Universal,
			universal::SEQUENCE,
			true,
			&[encode_oid(&ObjectIdentifier::from_dotted("2.5.29.19").unwrap()), wyvern_asn1::value::encode_boolean(true), bc_octets].concat(),
		);

		let mut ext_parts = bc_ext;
		if let Some(ku) = key_usage {
			let mut byte = 0u8;
			if ku.key_cert_sign {
				byte |= 0b0000_0100;
			}
			if ku.digital_signature {
				byte |= 0b1000_0000;
			}
			let bits = BitString { unused_bits: 0, data: vec![byte] };
			let ku_octets = wyvern_asn1::value::encode_octet_string(&bits.encode());
			let ku_ext = encode_tlv(
				TagClass::Universal,
				universal::SEQUENCE,
				true,
				&[encode_oid(&ObjectIdentifier::from_dotted("2.5.29.15").unwrap()), wyvern_asn1::value::encode_boolean(true), ku_octets].concat(),
			);
			ext_parts = [ext_parts, ku_ext].concat();
		}
		let extensions_seq = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &ext_parts);
		let extensions_field = encode_tlv(TagClass::ContextSpecific, 3, true, &extensions_seq);

		let tbs_parts = [encode_integer(&BigInteger::from_u64(1)), sig_alg_id.clone(), issuer, validity, subject, spki, extensions_field].concat();
		let tbs = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &tbs_parts);

		let digest = wyvern_digest::Hash::hash(DigestAlgorithm::Sha256, &tbs);
		let sig = ecdsa::sign_deterministic(curve, signing_key, &digest, DigestAlgorithm::Sha256);
		let sig_der = wyvern_keys::format::signature_format::encode_asn1(&sig.r, &sig.s);

		let cert_parts = [tbs, sig_alg_id, BitString::from_bytes(sig_der).encode()].concat();
		let cert_der = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &cert_parts);
		Certificate::from_der(&cert_der).unwrap()
	}

	#[test]
	fn two_level_chain_with_ca_leaf_validates() {
		let (root, leaf) = build_chain(true);
		let options = ChainOptions { allow_self_signed: true, ..Default::default() };
		let path = validate_chain(&leaf, &[root], &options).unwrap();
		assert_eq!(path.len(), 2);
	}

	#[test]
	fn non_ca_issuer_is_rejected() {
		let curve = Curve::load(nist_p256());
		let fake_issuer_d = BigInteger::from_u64(3003);
		let leaf_d = BigInteger::from_u64(4004);
		let non_ca_issuer = build_cert(&curve, &fake_issuer_d, &fake_issuer_d, "not-a-ca", "not-a-ca", false, None);
		let leaf = build_cert(&curve, &leaf_d, &fake_issuer_d, "leaf", "not-a-ca", false, None);
		let options = ChainOptions { allow_self_signed: true, ..Default::default() };
		let err = validate_chain(&leaf, &[non_ca_issuer], &options).unwrap_err();
		assert!(matches!(err, Error::IssuerNotPermitted));
	}

	#[test]
	fn wildcard_hostname_matches_single_label() {
		assert!(hostname_matches_pattern("foo.example.com", "*.example.com"));
		assert!(!hostname_matches_pattern("example.com", "*.example.com"));
		assert!(!hostname_matches_pattern("a.b.example.com", "*.example.com"));
	}

	#[test]
	fn host_from_url_strips_scheme_port_and_path() {
		assert_eq!(host_from_url("https://example.com:8443/path?q=1"), "example.com");
		assert_eq!(host_from_url("example.com"), "example.com");
		assert_eq!(host_from_url("sftp://user@example.com/home"), "example.com");
		assert_eq!(host_from_url("https://[::1]:22/"), "::1");
	}

	#[test]
	fn dns_name_constraint_matches_subdomains_only() {
		assert!(dns_name_in_subtree("host.example.com", "example.com"));
		assert!(dns_name_in_subtree("example.com", "example.com"));
		assert!(!dns_name_in_subtree("notexample.com", "example.com"));
	}
}
