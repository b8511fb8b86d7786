//! Key exchange (RFC 4253 §8, RFC 4419 group-exchange, RFC 5656 ECDH, and
//! `curve25519-sha256`): ephemeral key generation, shared-secret agreement,
//! the exchange hash `H`, and RFC 4253 §7.2 key derivation/extension.

use wyvern_bigint::BigInteger;
use wyvern_digest::{Algorithm, Hash};
use wyvern_keys::ec::{self, Curve, CurveParams, Point};
use wyvern_keys::eddsa::X25519KeyPair;

use crate::wire::Writer;
use crate::Error;

/// RFC 3526 MODP groups used by the static `diffie-hellman-group*` suites.
const GROUP1_P_HEX: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381FFFFFFFFFFFFFFFF";
const GROUP14_P_HEX: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF6955817183995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

fn group_params(name: &str) -> Option<(BigInteger, BigInteger)> {
	let hex = match name {
		"diffie-hellman-group1-sha1" => GROUP1_P_HEX,
		"diffie-hellman-group14-sha1" | "diffie-hellman-group14-sha256" => GROUP14_P_HEX,
		_ => return None,
	};
	Some((BigInteger::from_str_radix(hex, 16).expect("static group constant is valid hex"), BigInteger::from_u64(2)))
}

fn ecdh_curve(name: &str) -> Option<CurveParams> {
	Some(match name {
		"ecdh-sha2-nistp256" => ec::nist_p256(),
		"ecdh-sha2-nistp384" => ec::nist_p384(),
		"ecdh-sha2-nistp521" => ec::nist_p521(),
		_ => return None,
	})
}

/// The digest algorithm a KEX method names itself after.
pub fn hash_algorithm(name: &str) -> Result<Algorithm, Error> {
	Ok(match name {
		"diffie-hellman-group1-sha1" | "diffie-hellman-group14-sha1" => Algorithm::Sha1,
		"diffie-hellman-group14-sha256" | "diffie-hellman-group-exchange-sha256" => Algorithm::Sha256,
		"curve25519-sha256" | "curve25519-sha256@libssh.org" => Algorithm::Sha256,
		"ecdh-sha2-nistp256" => Algorithm::Sha256,
		"ecdh-sha2-nistp384" => Algorithm::Sha384,
		"ecdh-sha2-nistp521" => Algorithm::Sha512,
		other => return Err(Error::UnsupportedAlgorithm(other.to_string())),
	})
}

/// This side's ephemeral key exchange material for one handshake.
pub enum Ephemeral {
	FiniteField { p: BigInteger, private: BigInteger, public: BigInteger },
	Curve25519(X25519KeyPair),
	Ecdh { curve: Curve, private: BigInteger, public: Point },
}

/// Generate ephemeral KEX material. `group` supplies `(p, g)` for
/// `diffie-hellman-group-exchange-*`, which negotiates its group from the
/// server's `KEX_DH_GEX_GROUP` reply rather than a fixed RFC 3526 constant.
pub fn generate(name: &str, group: Option<(BigInteger, BigInteger)>) -> Result<Ephemeral, Error> {
	if name == "curve25519-sha256" || name == "curve25519-sha256@libssh.org" {
		return Ok(Ephemeral::Curve25519(X25519KeyPair::generate()));
	}
	if let Some(params) = ecdh_curve(name) {
		let curve = Curve::load(params);
		let mut rng = rand::rngs::OsRng;
		let private = BigInteger::random_below(&mut rng, &curve.n);
		let public = curve.base_point_mul(&private);
		return Ok(Ephemeral::Ecdh { curve, private, public });
	}
	let (p, g) = group.or_else(|| group_params(name)).ok_or_else(|| Error::UnsupportedAlgorithm(name.to_string()))?;
	let mut rng = rand::rngs::OsRng;
	let two = BigInteger::from_u64(2);
	let upper_bound = p.sub(&two);
	let private = BigInteger::random_below(&mut rng, &upper_bound).add(&BigInteger::one());
	let public = g.mod_pow(&private, &p)?;
	Ok(Ephemeral::FiniteField { p, private, public })
}

/// The wire bytes this side sends as its half of the exchange (`e`/`f` for
/// finite-field and ECDH KEX, the raw 32-byte point for curve25519).
pub fn public_bytes(ephemeral: &Ephemeral) -> Vec<u8> {
	match ephemeral {
		Ephemeral::FiniteField { public, .. } => public.to_bytes_be(),
		Ephemeral::Curve25519(kp) => kp.public.as_bytes().to_vec(),
		Ephemeral::Ecdh { public: Point::Affine(x, y), .. } => {
			let mut out = vec![0x04];
			out.extend_from_slice(&x.to_bytes_be());
			out.extend_from_slice(&y.to_bytes_be());
			out
		}
		Ephemeral::Ecdh { public: Point::Infinity, .. } => Vec::new(),
	}
}

/// Complete the exchange against the peer's public bytes, returning the
/// shared secret `K` as an unsigned big-endian byte string (the form every
/// KEX method's `H` and key-derivation inputs expect it in as an `mpint`).
pub fn shared_secret(ephemeral: &Ephemeral, peer_public: &[u8]) -> Result<Vec<u8>, Error> {
	match ephemeral {
		Ephemeral::FiniteField { p, private, .. } => {
			let f = BigInteger::from_bytes_be(peer_public, false);
			Ok(f.mod_pow(private, p)?.to_bytes_be())
		}
		Ephemeral::Curve25519(kp) => {
			let mut theirs = [0u8; 32];
			if peer_public.len() != 32 {
				return Err(Error::Malformed("curve25519 public value must be 32 bytes"));
			}
			theirs.copy_from_slice(peer_public);
			let shared = kp.diffie_hellman(&x25519_dalek::PublicKey::from(theirs));
			Ok(BigInteger::from_bytes_be(&shared, false).to_bytes_be())
		}
		Ephemeral::Ecdh { curve, private, .. } => {
			if peer_public.first() != Some(&0x04) || peer_public.len() < 2 {
				return Err(Error::Malformed("uncompressed EC point expected"));
			}
			let coord_len = (peer_public.len() - 1) / 2;
			let x = BigInteger::from_bytes_be(&peer_public[1..1 + coord_len], false);
			let y = BigInteger::from_bytes_be(&peer_public[1 + coord_len..], false);
			let their_point = Point::Affine(x, y);
			if !curve.is_on_curve(&their_point) {
				return Err(Error::Malformed("peer EC point is not on the negotiated curve"));
			}
			let shared = curve.scalar_mul(private, &their_point);
			match shared {
				Point::Affine(x, _) => Ok(x.to_bytes_be()),
				Point::Infinity => Err(Error::Malformed("EC shared point is the point at infinity")),
			}
		}
	}
}

/// `H = hash(V_C || V_S || I_C || I_S || K_S || <kex-specific> || K)`,
/// RFC 4253 §8. `kex_specific` is already the concatenation of whatever
/// the method contributes (`e`, `f`, group `p`/`g` for group-exchange).
#[allow(clippy::too_many_arguments)]
pub fn exchange_hash(
	hash_algo: Algorithm,
	v_c: &[u8],
	v_s: &[u8],
	i_c: &[u8],
	i_s: &[u8],
	k_s: &[u8],
	kex_specific: &[u8],
	k: &[u8],
) -> Vec<u8> {
	let payload = Writer::new()
		.string(v_c)
		.string(v_s)
		.string(i_c)
		.string(i_s)
		.string(k_s)
		.raw(kex_specific)
		.mpint(k)
		.finish();
	Hash::hash(hash_algo, &payload)
}

/// Derived key material for one handshake: IVs, cipher keys, MAC keys for
/// both directions, each extended with `HASH(K||H||prev)` until long
/// enough (RFC 4253 §7.2).
pub struct DerivedKeys {
	pub iv_client_to_server: Vec<u8>,
	pub iv_server_to_client: Vec<u8>,
	pub enc_client_to_server: Vec<u8>,
	pub enc_server_to_client: Vec<u8>,
	pub mac_client_to_server: Vec<u8>,
	pub mac_server_to_client: Vec<u8>,
}

pub fn derive_key(hash_algo: Algorithm, k: &[u8], h: &[u8], letter: u8, session_id: &[u8], out_len: usize) -> Vec<u8> {
	let seed = Writer::new().mpint(k).raw(h).byte(letter).raw(session_id).finish();
	let mut out = Hash::hash(hash_algo, &seed);
	while out.len() < out_len {
		let mut more_input = Writer::new().mpint(k).raw(h).finish();
		more_input.extend_from_slice(&out);
		out.extend_from_slice(&Hash::hash(hash_algo, &more_input));
	}
	out.truncate(out_len);
	out
}

pub fn derive_keys(
	hash_algo: Algorithm,
	k: &[u8],
	h: &[u8],
	session_id: &[u8],
	iv_len: usize,
	enc_key_len: usize,
	mac_key_len: usize,
) -> DerivedKeys {
	DerivedKeys {
		iv_client_to_server: derive_key(hash_algo, k, h, b'A', session_id, iv_len),
		iv_server_to_client: derive_key(hash_algo, k, h, b'B', session_id, iv_len),
		enc_client_to_server: derive_key(hash_algo, k, h, b'C', session_id, enc_key_len),
		enc_server_to_client: derive_key(hash_algo, k, h, b'D', session_id, enc_key_len),
		mac_client_to_server: derive_key(hash_algo, k, h, b'E', session_id, mac_key_len),
		mac_server_to_client: derive_key(hash_algo, k, h, b'F', session_id, mac_key_len),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn curve25519_agreement_matches_both_sides() {
		let client = generate("curve25519-sha256", None).unwrap();
		let server = generate("curve25519-sha256", None).unwrap();
		let client_pub = public_bytes(&client);
		let server_pub = public_bytes(&server);
		let k_client = shared_secret(&client, &server_pub).unwrap();
		let k_server = shared_secret(&server, &client_pub).unwrap();
		assert_eq!(k_client, k_server);
	}

	#[test]
	fn ecdh_nistp256_agreement_matches_both_sides() {
		let client = generate("ecdh-sha2-nistp256", None).unwrap();
		let server = generate("ecdh-sha2-nistp256", None).unwrap();
		let k_client = shared_secret(&client, &public_bytes(&server)).unwrap();
		let k_server = shared_secret(&server, &public_bytes(&client)).unwrap();
		assert_eq!(k_client, k_server);
	}

	#[test]
	fn finite_field_group14_agreement_matches_both_sides() {
		let client = generate("diffie-hellman-group14-sha256", None).unwrap();
		let server = generate("diffie-hellman-group14-sha256", None).unwrap();
		let k_client = shared_secret(&client, &public_bytes(&server)).unwrap();
		let k_server = shared_secret(&server, &public_bytes(&client)).unwrap();
		assert_eq!(k_client, k_server);
	}

	#[test]
	fn derived_keys_are_extended_past_one_hash_block() {
		let keys = derive_keys(Algorithm::Sha256, b"K", b"H", b"session-id", 16, 64, 32);
		assert_eq!(keys.enc_client_to_server.len(), 64);
		assert_ne!(keys.iv_client_to_server, keys.iv_server_to_client);
	}
}
