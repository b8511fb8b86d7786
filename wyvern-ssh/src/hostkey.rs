//! Host key wire blobs and signature blobs (RFC 4253 §6.6, RFC 5656,
//! RFC 8332, RFC 8709): decoding the bytes `KEX_*_REPLY` carries into a
//! [`wyvern_keys::PublicKey`], and verifying the signature over the
//! exchange hash with the digest each algorithm name calls for.

use wyvern_bigint::BigInteger;
use wyvern_digest::{Algorithm, Hash};
use wyvern_keys::dsa::DsaParams;
use wyvern_keys::ec::{self, Curve, Point};
use wyvern_keys::rsa_key::{verify_pkcs1v15, RsaHash};
use wyvern_keys::PublicKey;

use crate::wire::Reader;
use crate::Error;

/// The SSH2 wire-format public key blob this side received, available via
/// `Client::server_public_host_key` (spec.md's `getServerPublicHostKey`).
pub struct HostKeyBlob {
	pub algorithm_name: String,
	pub raw: Vec<u8>,
}

pub fn decode(blob: &[u8]) -> Result<PublicKey, Error> {
	let mut r = Reader::new(blob);
	let algo = r.utf8_string()?;
	Ok(match algo.as_str() {
		"ssh-rsa" => {
			let e = r.mpint()?;
			let n = r.mpint()?;
			let public = rsa::RsaPublicKey::new(rsa::BigUint::from_bytes_be(&n), rsa::BigUint::from_bytes_be(&e))
				.map_err(wyvern_keys::Error::from)?;
			PublicKey::Rsa(public)
		}
		"ssh-dss" => {
			let p = BigInteger::from_bytes_be(r.mpint()?.as_slice(), false);
			let q = BigInteger::from_bytes_be(r.mpint()?.as_slice(), false);
			let g = BigInteger::from_bytes_be(r.mpint()?.as_slice(), false);
			let y = BigInteger::from_bytes_be(r.mpint()?.as_slice(), false);
			PublicKey::Dsa { params: DsaParams { p, q, g }, y }
		}
		"ecdsa-sha2-nistp256" | "ecdsa-sha2-nistp384" | "ecdsa-sha2-nistp521" => {
			let curve_name = r.utf8_string()?;
			let q = r.string()?;
			let params = match curve_name.as_str() {
				"nistp256" => ec::nist_p256(),
				"nistp384" => ec::nist_p384(),
				"nistp521" => ec::nist_p521(),
				_ => return Err(Error::UnsupportedAlgorithm(curve_name)),
			};
			let curve = Curve::load(params);
			let point = decode_uncompressed_point(q)?;
			if !curve.is_on_curve(&point) {
				return Err(Error::Malformed("host key point is not on its named curve"));
			}
			PublicKey::Ecdsa { curve, point }
		}
		"ssh-ed25519" => {
			let key = r.string()?;
			if key.len() != 32 {
				return Err(Error::Malformed("ssh-ed25519 public key must be 32 bytes"));
			}
			let mut fixed = [0u8; 32];
			fixed.copy_from_slice(key);
			PublicKey::Ed25519(fixed)
		}
		other => return Err(Error::UnsupportedAlgorithm(other.to_string())),
	})
}

fn decode_uncompressed_point(q: &[u8]) -> Result<Point, Error> {
	if q.first() != Some(&0x04) || q.len() < 2 {
		return Err(Error::Malformed("uncompressed EC point expected in host key blob"));
	}
	let coord_len = (q.len() - 1) / 2;
	let x = BigInteger::from_bytes_be(&q[1..1 + coord_len], false);
	let y = BigInteger::from_bytes_be(&q[1 + coord_len..], false);
	Ok(Point::Affine(x, y))
}

/// Verify a signature blob over `message` (the exchange hash `H`) using
/// `signature_algorithm_name` to pick both the wire layout and the digest:
/// `ssh-rsa` hashes with SHA-1, `rsa-sha2-256`/`rsa-sha2-512` with SHA-2
/// (RFC 8332 §3), everything else uses its own named hash.
pub fn verify(public_key: &PublicKey, signature_algorithm_name: &str, message: &[u8], signature_blob: &[u8]) -> Result<bool, Error> {
	let mut r = Reader::new(signature_blob);
	let blob_algo = r.utf8_string()?;
	let sig_body = r.string()?;

	match (public_key, signature_algorithm_name) {
		(PublicKey::Rsa(public), "ssh-rsa") | (PublicKey::Rsa(public), "rsa-sha2-256") | (PublicKey::Rsa(public), "rsa-sha2-512") => {
			let hash = match signature_algorithm_name {
				"ssh-rsa" => RsaHash::Sha1,
				"rsa-sha2-256" => RsaHash::Sha256,
				"rsa-sha2-512" => RsaHash::Sha512,
				_ => unreachable!(),
			};
			if blob_algo != signature_algorithm_name {
				return Err(Error::Malformed("signature blob algorithm does not match negotiated host key algorithm"));
			}
			let digest = Hash::hash(rsa_hash_to_digest(hash), message);
			Ok(verify_pkcs1v15(public, hash, &digest, sig_body))
		}
		(PublicKey::Dsa { .. }, "ssh-dss") => {
			if sig_body.len() != 40 {
				return Err(Error::Malformed("ssh-dss signature must be 40 bytes"));
			}
			let r_val = BigInteger::from_bytes_be(&sig_body[..20], false);
			let s_val = BigInteger::from_bytes_be(&sig_body[20..], false);
			let digest = Hash::hash(Algorithm::Sha1, message);
			verify_dsa(public_key, &digest, &r_val, &s_val)
		}
		(PublicKey::Ecdsa { curve, .. }, name) if name.starts_with("ecdsa-sha2-") => {
			let mut inner = Reader::new(sig_body);
			let r_val = BigInteger::from_bytes_be(inner.mpint()?.as_slice(), false);
			let s_val = BigInteger::from_bytes_be(inner.mpint()?.as_slice(), false);
			let digest = Hash::hash(ecdsa_digest_for(curve), message);
			verify_ecdsa(public_key, &digest, &r_val, &s_val)
		}
		(PublicKey::Ed25519(_), "ssh-ed25519") => Ok(wyvern_keys::eddsa::verify(
			if let PublicKey::Ed25519(bytes) = public_key { bytes } else { unreachable!() },
			message,
			sig_body,
		)?),
		_ => Err(Error::BadHostKeySignature),
	}
}

fn rsa_hash_to_digest(hash: RsaHash) -> Algorithm {
	match hash {
		RsaHash::Sha1 => Algorithm::Sha1,
		RsaHash::Sha256 => Algorithm::Sha256,
		RsaHash::Sha384 => Algorithm::Sha384,
		RsaHash::Sha512 => Algorithm::Sha512,
	}
}

fn ecdsa_digest_for(curve: &Curve) -> Algorithm {
	match curve.params.field_size_bits {
		0..=256 => Algorithm::Sha256,
		257..=384 => Algorithm::Sha384,
		_ => Algorithm::Sha512,
	}
}

fn verify_dsa(public_key: &PublicKey, digest: &[u8], r_val: &BigInteger, s_val: &BigInteger) -> Result<bool, Error> {
	if let PublicKey::Dsa { params, y } = public_key {
		Ok(wyvern_keys::dsa::verify(params, y, digest, &wyvern_keys::dsa::Signature { r: r_val.clone(), s: s_val.clone() })?)
	} else {
		unreachable!()
	}
}

fn verify_ecdsa(public_key: &PublicKey, digest: &[u8], r_val: &BigInteger, s_val: &BigInteger) -> Result<bool, Error> {
	if let PublicKey::Ecdsa { curve, point } = public_key {
		Ok(wyvern_keys::ecdsa::verify(curve, point, digest, &wyvern_keys::ecdsa::Signature { r: r_val.clone(), s: s_val.clone() })?)
	} else {
		unreachable!()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wyvern_keys::eddsa::Ed25519KeyPair;

	#[test]
	fn decodes_ed25519_host_key_blob_and_verifies_its_own_signature() {
		let kp = Ed25519KeyPair::generate();
		let blob = wyvern_keys::format::openssh::ed25519_public_blob(&kp.public_key_bytes());
		let public_key = decode(&blob).unwrap();
		let message = b"exchange hash H";
		let sig = kp.sign(message);
		let sig_blob = crate::wire::Writer::new().string(b"ssh-ed25519").string(&sig).finish();
		assert!(verify(&public_key, "ssh-ed25519", message, &sig_blob).unwrap());
	}

	#[test]
	fn rejects_signature_algorithm_pubkey_mismatch() {
		let kp = Ed25519KeyPair::generate();
		let blob = wyvern_keys::format::openssh::ed25519_public_blob(&kp.public_key_bytes());
		let public_key = decode(&blob).unwrap();
		let sig_blob = crate::wire::Writer::new().string(b"ssh-rsa").string(&[0u8; 4]).finish();
		assert!(verify(&public_key, "ssh-rsa", b"msg", &sig_blob).is_err());
	}
}
