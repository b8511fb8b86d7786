//! The SSH2 client state machine (C8): banner/`KEXINIT` exchange, key
//! exchange, the encrypted packet layer, user authentication and a channel
//! multiplexer, wired together into the single entry point applications use.
//! Every suspension point (a read, a write, a window-blocked send) is a
//! plain `.await`; nothing here spawns a background task, so one `Client`
//! must not be driven from two call sites concurrently.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use wyvern_bigint::BigInteger;
use wyvern_cryptovec::CryptoVec;
use wyvern_digest::{Algorithm, Hash};
use wyvern_keys::dsa::DsaParams;
use wyvern_keys::ec::{Curve, Point};
use wyvern_keys::eddsa::Ed25519KeyPair;
use wyvern_keys::rsa_key::{RsaHash, RsaKeyPair};
use wyvern_keys::PublicKey;

use crate::auth::{self, AuthOutcome};
use crate::channel::{self, Channel, ChannelState, ChannelType};
use crate::cipher::{self, CipherAlgorithm, DirectionalCipher};
use crate::config::ClientConfig;
use crate::hostkey;
use crate::kex::{self, Ephemeral};
use crate::mac;
use crate::msg::*;
use crate::negotiate::{self, AlgorithmLists, NegotiatedAlgorithms};
use crate::packet;
use crate::wire::{Reader, Writer};
use crate::Error;

/// RFC 4419 §5 defaults for `diffie-hellman-group-exchange-*`: ask for a
/// group around 2048 bits, accept anything the server offers between 1024
/// and 8192.
const GEX_MIN_BITS: u32 = 1024;
const GEX_PREFERRED_BITS: u32 = 2048;
const GEX_MAX_BITS: u32 = 8192;

/// How a matched substring/regex cuts off the bytes `Client::read` hands
/// back, versus just draining whatever has already arrived.
#[derive(Clone, Debug)]
pub enum Pattern {
	Substring(String),
	Regex(Regex),
}

impl Pattern {
	/// Byte offset one past the end of the first match, if any.
	fn match_end(&self, haystack: &[u8]) -> Option<usize> {
		match self {
			Pattern::Substring(needle) => {
				if needle.is_empty() {
					return None;
				}
				haystack.windows(needle.len()).position(|w| w == needle.as_bytes()).map(|pos| pos + needle.len())
			}
			Pattern::Regex(re) => {
				let text = String::from_utf8_lossy(haystack);
				re.find(&text).map(|m| m.end())
			}
		}
	}
}

/// spec.md's three read modes: drain whatever is already buffered, block
/// until a pattern appears, or block for only the next chunk the peer sends.
#[derive(Clone, Debug)]
pub enum ReadMode {
	ConsumeAllPending,
	WaitForPattern(Pattern),
	NextChunk,
}

/// One local identity a caller may authenticate with. Ed25519/RSA keys are
/// typically loaded from disk via `wyvern_keys::format`; DSA/ECDSA identities
/// are constructed directly from key material, since this crate has no
/// on-disk private-key loader for those two algorithms (see DESIGN.md).
pub enum Identity {
	Rsa(RsaKeyPair),
	Dsa { params: DsaParams, private: BigInteger, public: BigInteger },
	Ecdsa { curve: Curve, private: BigInteger, public: Point },
	Ed25519(Ed25519KeyPair),
}

impl Identity {
	/// The `publickey` signature algorithm name this identity signs as by
	/// default. RSA identities sign with `rsa-sha2-512` (RFC 8332) rather
	/// than the legacy SHA-1 `ssh-rsa` scheme; a caller wanting the legacy
	/// scheme (for a server too old to understand RFC 8332) should call
	/// [`Identity::sign`] directly with `"ssh-rsa"` instead of going through
	/// `Client::authenticate_publickey`'s default.
	pub fn default_algorithm_name(&self) -> &'static str {
		match self {
			Identity::Rsa(_) => "rsa-sha2-512",
			Identity::Dsa { .. } => "ssh-dss",
			Identity::Ecdsa { curve, .. } => ecdsa_ssh_name(curve),
			Identity::Ed25519(_) => "ssh-ed25519",
		}
	}

	/// The SSH2 wire-format public key blob (RFC 4253 §6.6), as sent in a
	/// `publickey` probe/request and as decoded by [`hostkey::decode`].
	pub fn public_key_blob(&self) -> Vec<u8> {
		match self {
			Identity::Rsa(keypair) => wyvern_keys::format::openssh::rsa_public_blob(
				&keypair.public.e().to_bytes_be(),
				&keypair.public.n().to_bytes_be(),
			),
			Identity::Dsa { params, public, .. } => Writer::new()
				.string(b"ssh-dss")
				.mpint(&params.p.to_bytes_be())
				.mpint(&params.q.to_bytes_be())
				.mpint(&params.g.to_bytes_be())
				.mpint(&public.to_bytes_be())
				.finish(),
			Identity::Ecdsa { curve, public, .. } => ecdsa_public_key_blob(curve, public),
			Identity::Ed25519(kp) => wyvern_keys::format::openssh::ed25519_public_blob(&kp.public_key_bytes()),
		}
	}

	/// Sign `data` (the exact bytes [`auth::signed_data`] produced) as
	/// `algorithm_name`, wrapping the result in its SSH2 signature blob.
	pub fn sign(&self, algorithm_name: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
		match self {
			Identity::Rsa(keypair) => {
				let hash = match algorithm_name {
					"ssh-rsa" => RsaHash::Sha1,
					"rsa-sha2-256" => RsaHash::Sha256,
					"rsa-sha2-512" => RsaHash::Sha512,
					other => return Err(Error::UnsupportedAlgorithm(other.to_string())),
				};
				let digest = Hash::hash(rsa_hash_to_digest(hash), data);
				let sig = keypair.sign_pkcs1v15(hash, &digest)?;
				Ok(Writer::new().string(algorithm_name.as_bytes()).string(&sig).finish())
			}
			Identity::Dsa { params, private, .. } => {
				let digest = Hash::hash(Algorithm::Sha1, data);
				let sig = wyvern_keys::dsa::sign_deterministic(params, private, &digest, Algorithm::Sha1);
				let body = wyvern_keys::format::signature_format::encode_ssh2(&sig.r, &sig.s);
				Ok(Writer::new().string(b"ssh-dss").string(&body).finish())
			}
			Identity::Ecdsa { curve, private, .. } => {
				let digest_algo = ecdsa_digest_for(curve);
				let digest = Hash::hash(digest_algo, data);
				let sig = wyvern_keys::ecdsa::sign_deterministic(curve, private, &digest, digest_algo);
				let body = wyvern_keys::format::signature_format::encode_ssh2(&sig.r, &sig.s);
				Ok(Writer::new().string(ecdsa_ssh_name(curve).as_bytes()).string(&body).finish())
			}
			Identity::Ed25519(kp) => {
				let sig = kp.sign(data);
				Ok(Writer::new().string(b"ssh-ed25519").string(&sig).finish())
			}
		}
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

fn ecdsa_ssh_name(curve: &Curve) -> &'static str {
	match curve.params.name {
		"nistp256" => "ecdsa-sha2-nistp256",
		"nistp384" => "ecdsa-sha2-nistp384",
		"nistp521" => "ecdsa-sha2-nistp521",
		_ => "ecdsa-sha2-nistp256",
	}
}

fn ecdsa_public_key_blob(curve: &Curve, point: &Point) -> Vec<u8> {
	let name = ecdsa_ssh_name(curve);
	let curve_id = &name["ecdsa-sha2-".len()..];
	let field_bytes = (curve.params.field_size_bits + 7) / 8;
	let point_bytes = match point {
		Point::Affine(x, y) => {
			let mut v = vec![0x04];
			v.extend(x.to_bytes_be_padded(field_bytes));
			v.extend(y.to_bytes_be_padded(field_bytes));
			v
		}
		Point::Infinity => Vec::new(),
	};
	Writer::new().string(name.as_bytes()).string(curve_id.as_bytes()).string(&point_bytes).finish()
}

/// RFC 4253 §6 framing with no cipher and no MAC, used only for the
/// banner/`KEXINIT` exchange before `NEWKEYS` establishes a `Direction`.
async fn write_plaintext_packet<S: AsyncWrite + Unpin>(stream: &mut S, payload: &[u8]) -> Result<(), Error> {
	let block = 8usize;
	let mut padding_length = block - ((1 + payload.len()) % block);
	if padding_length < 4 {
		padding_length += block;
	}
	let packet_length = 1 + payload.len() + padding_length;
	let mut out = Vec::with_capacity(4 + packet_length);
	out.extend_from_slice(&(packet_length as u32).to_be_bytes());
	out.push(padding_length as u8);
	out.extend_from_slice(payload);
	let mut padding = vec![0u8; padding_length];
	OsRng.fill_bytes(&mut padding);
	out.extend_from_slice(&padding);
	stream.write_all(&out).await?;
	Ok(())
}

async fn read_plaintext_packet<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Vec<u8>, Error> {
	let mut length_wire = [0u8; 4];
	stream.read_exact(&mut length_wire).await?;
	let packet_length = u32::from_be_bytes(length_wire) as usize;
	if packet_length < 1 || packet_length > (1 << 20) {
		return Err(Error::Malformed("packet length out of bounds"));
	}
	let mut body = vec![0u8; packet_length];
	stream.read_exact(&mut body).await?;
	let padding_length = body[0] as usize;
	let payload_end = body.len().checked_sub(padding_length).ok_or(Error::Malformed("padding length exceeds packet"))?;
	Ok(body[1..payload_end].to_vec())
}

/// Send one packet, either in the clear (pre-`NEWKEYS`) or through an
/// established [`packet::Direction`] (a rekey reuses the still-current one
/// for everything up to and including its own `NEWKEYS`).
async fn send_packet<S: AsyncWrite + Unpin>(stream: &mut S, dir: Option<&mut packet::Direction>, payload: &[u8]) -> Result<(), Error> {
	match dir {
		None => write_plaintext_packet(stream, payload).await,
		Some(d) => {
			let mut padding = [0u8; 256];
			OsRng.fill_bytes(&mut padding);
			let wire = d.seal(payload, &padding);
			stream.write_all(&wire).await?;
			Ok(())
		}
	}
}

async fn recv_packet<S: AsyncRead + Unpin>(stream: &mut S, dir: Option<&mut packet::Direction>) -> Result<Vec<u8>, Error> {
	match dir {
		None => read_plaintext_packet(stream).await,
		Some(d) => {
			let mut buffer = CryptoVec::new();
			d.read(stream, &mut buffer).await?;
			Ok(buffer.as_slice().to_vec())
		}
	}
}

/// Whether a negotiated KEX method's wire messages carry `e`/`f` as
/// `mpint`s (classic finite-field DH), as length-prefixed point octet
/// strings (ECDH/curve25519), or additionally negotiate their own group
/// first (group-exchange).
enum KexFlavor {
	Classic,
	Ecdh,
	GroupExchange,
}

fn kex_flavor(name: &str) -> KexFlavor {
	if name == "diffie-hellman-group-exchange-sha256" {
		KexFlavor::GroupExchange
	} else if name.starts_with("ecdh-sha2-") || name.starts_with("curve25519-sha256") {
		KexFlavor::Ecdh
	} else {
		KexFlavor::Classic
	}
}

struct KexOutcome {
	negotiated: NegotiatedAlgorithms,
	write_dir: packet::Direction,
	read_dir: packet::Direction,
	session_id: Vec<u8>,
	server_public_key: PublicKey,
	server_host_key_blob: Vec<u8>,
}

/// Run one key exchange: negotiate algorithms, agree a shared secret,
/// verify the host key over the exchange hash, derive fresh directional
/// keys. `write_dir`/`read_dir` are `None` for the initial, pre-`NEWKEYS`
/// handshake and `Some` for a rekey (whose `KEXINIT`/`KEXDH_*`/`NEWKEYS`
/// packets are still sent and read through the *old* keys). `peer_kexinit`
/// lets a peer-initiated rekey hand in the `KEXINIT` payload the dispatch
/// loop already consumed off the wire, instead of reading a second one.
#[allow(clippy::too_many_arguments)]
async fn perform_kex<S: AsyncRead + AsyncWrite + Unpin>(
	stream: &mut S,
	client_id: &str,
	server_id: &str,
	config: &ClientConfig,
	mut write_dir: Option<&mut packet::Direction>,
	mut read_dir: Option<&mut packet::Direction>,
	existing_session_id: Option<Vec<u8>>,
	peer_kexinit: Option<Vec<u8>>,
) -> Result<KexOutcome, Error> {
	let mut cookie = [0u8; 16];
	OsRng.fill_bytes(&mut cookie);
	let our_lists = config.algorithm_lists();
	let i_c = our_lists.encode(cookie);
	send_packet(stream, write_dir.as_mut().map(|d| &mut **d), &i_c).await?;

	let i_s = match peer_kexinit {
		Some(payload) => payload,
		None => recv_packet(stream, read_dir.as_mut().map(|d| &mut **d)).await?,
	};
	let their_lists = AlgorithmLists::parse(&i_s)?;
	let negotiated = negotiate::negotiate(&our_lists, &their_lists)?;

	let hash_algo = kex::hash_algorithm(&negotiated.kex)?;
	let flavor = kex_flavor(&negotiated.kex);

	let group_for_hash = if matches!(flavor, KexFlavor::GroupExchange) {
		let request =
			Writer::new().byte(SSH_MSG_KEX_DH_GEX_REQUEST).u32(GEX_MIN_BITS).u32(GEX_PREFERRED_BITS).u32(GEX_MAX_BITS).finish();
		send_packet(stream, write_dir.as_mut().map(|d| &mut **d), &request).await?;
		let group_payload = recv_packet(stream, read_dir.as_mut().map(|d| &mut **d)).await?;
		let mut r = Reader::new(&group_payload);
		let msg_type = r.byte()?;
		if msg_type != SSH_MSG_KEX_DH_GEX_GROUP {
			return Err(Error::UnexpectedMessage(msg_type, "kex dh gex group"));
		}
		let p = BigInteger::from_bytes_be(r.mpint()?.as_slice(), false);
		let g = BigInteger::from_bytes_be(r.mpint()?.as_slice(), false);
		Some((p, g))
	} else {
		None
	};

	let ephemeral = kex::generate(&negotiated.kex, group_for_hash.clone())?;
	let our_public = kex::public_bytes(&ephemeral);

	let init_msg_type = match flavor {
		KexFlavor::GroupExchange => SSH_MSG_KEX_DH_GEX_INIT,
		_ => SSH_MSG_KEXDH_INIT,
	};
	let init_payload = match flavor {
		KexFlavor::Ecdh => Writer::new().byte(init_msg_type).string(&our_public).finish(),
		KexFlavor::Classic | KexFlavor::GroupExchange => Writer::new().byte(init_msg_type).mpint(&our_public).finish(),
	};
	send_packet(stream, write_dir.as_mut().map(|d| &mut **d), &init_payload).await?;

	let reply_payload = recv_packet(stream, read_dir.as_mut().map(|d| &mut **d)).await?;
	let mut r = Reader::new(&reply_payload);
	let msg_type = r.byte()?;
	let expected_reply = match flavor {
		KexFlavor::GroupExchange => SSH_MSG_KEX_DH_GEX_REPLY,
		_ => SSH_MSG_KEXDH_REPLY,
	};
	if msg_type != expected_reply {
		return Err(Error::UnexpectedMessage(msg_type, "kex reply"));
	}
	let k_s = r.string()?.to_vec();
	let peer_public = match flavor {
		KexFlavor::Ecdh => r.string()?.to_vec(),
		KexFlavor::Classic | KexFlavor::GroupExchange => r.mpint()?,
	};
	let signature_blob = r.string()?.to_vec();

	let k = kex::shared_secret(&ephemeral, &peer_public)?;

	let kex_specific = match flavor {
		KexFlavor::Classic => Writer::new().mpint(&our_public).mpint(&peer_public).finish(),
		KexFlavor::Ecdh => Writer::new().string(&our_public).string(&peer_public).finish(),
		KexFlavor::GroupExchange => {
			let (p, g) = group_for_hash.expect("group-exchange always resolves a group");
			Writer::new()
				.u32(GEX_MIN_BITS)
				.u32(GEX_PREFERRED_BITS)
				.u32(GEX_MAX_BITS)
				.mpint(&p.to_bytes_be())
				.mpint(&g.to_bytes_be())
				.mpint(&our_public)
				.mpint(&peer_public)
				.finish()
		}
	};
	let h = kex::exchange_hash(hash_algo, client_id.as_bytes(), server_id.as_bytes(), &i_c, &i_s, &k_s, &kex_specific, &k);

	let server_public_key = hostkey::decode(&k_s)?;
	if !hostkey::verify(&server_public_key, &negotiated.server_host_key, &h, &signature_blob)? {
		return Err(Error::BadHostKeySignature);
	}

	send_packet(stream, write_dir.as_mut().map(|d| &mut **d), &[SSH_MSG_NEWKEYS]).await?;
	let newkeys_payload = recv_packet(stream, read_dir.as_mut().map(|d| &mut **d)).await?;
	if newkeys_payload.first() != Some(&SSH_MSG_NEWKEYS) {
		return Err(Error::UnexpectedMessage(newkeys_payload.first().copied().unwrap_or(0), "newkeys"));
	}

	let session_id = existing_session_id.unwrap_or_else(|| h.clone());

	let cipher_c2s = cipher::by_name(&negotiated.encryption_client_to_server)?;
	let cipher_s2c = cipher::by_name(&negotiated.encryption_server_to_client)?;
	let mac_c2s = if cipher_c2s.is_aead() { None } else { Some(mac::by_name(&negotiated.mac_client_to_server)?) };
	let mac_s2c = if cipher_s2c.is_aead() { None } else { Some(mac::by_name(&negotiated.mac_server_to_client)?) };
	let mac_key_len_c2s = mac_c2s.map(|m| m.key_len).unwrap_or(0);
	let mac_key_len_s2c = mac_s2c.map(|m| m.key_len).unwrap_or(0);

	let iv_c2s = kex::derive_key(hash_algo, &k, &h, b'A', &session_id, cipher_c2s.iv_len);
	let iv_s2c = kex::derive_key(hash_algo, &k, &h, b'B', &session_id, cipher_s2c.iv_len);
	let enc_c2s = kex::derive_key(hash_algo, &k, &h, b'C', &session_id, cipher_c2s.key_len);
	let enc_s2c = kex::derive_key(hash_algo, &k, &h, b'D', &session_id, cipher_s2c.key_len);
	let mac_key_c2s = kex::derive_key(hash_algo, &k, &h, b'E', &session_id, mac_key_len_c2s);
	let mac_key_s2c = kex::derive_key(hash_algo, &k, &h, b'F', &session_id, mac_key_len_s2c);

	let write_dir = packet::Direction::new(cipher_c2s, DirectionalCipher::new(&cipher_c2s, &enc_c2s, &iv_c2s)?, mac_c2s, mac_key_c2s);
	let read_dir = packet::Direction::new(cipher_s2c, DirectionalCipher::new(&cipher_s2c, &enc_s2c, &iv_s2c)?, mac_s2c, mac_key_s2c);

	Ok(KexOutcome { negotiated, write_dir, read_dir, session_id, server_public_key, server_host_key_blob: k_s })
}

/// Identification string exchange (RFC 4253 §4.2): send ours, then read
/// lines until one starts with `SSH-` (earlier lines are a server's
/// optional pre-banner text, displayed by interactive clients but otherwise
/// ignored here).
async fn exchange_banners<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S) -> Result<(String, String), Error> {
	stream.write_all(format!("{}\r\n", CLIENT_IDENTIFIER).as_bytes()).await?;
	let mut line = Vec::new();
	let mut byte = [0u8; 1];
	loop {
		line.clear();
		loop {
			stream.read_exact(&mut byte).await?;
			if byte[0] == b'\n' {
				break;
			}
			if byte[0] != b'\r' {
				line.push(byte[0]);
			}
		}
		let text = String::from_utf8_lossy(&line).to_string();
		if text.starts_with("SSH-") {
			return Ok((CLIENT_IDENTIFIER.to_string(), text));
		}
	}
}

/// One connected SSH2 session: transport, authentication and the channels
/// multiplexed over it. Not `Clone`/`Sync` — spec.md's concurrency model
/// treats a `Client` as owned exclusively by whatever task drives it.
pub struct Client<S> {
	stream: S,
	config: ClientConfig,
	client_id: String,
	server_id: String,
	write_dir: packet::Direction,
	read_dir: packet::Direction,
	session_id: Vec<u8>,
	negotiated: NegotiatedAlgorithms,
	server_public_key: PublicKey,
	server_host_key_blob: Vec<u8>,
	channels: HashMap<u32, Channel>,
	next_channel_id: u32,
	pty_pending: bool,
	timed_out: bool,
	last_activity: Instant,
	services_accepted: HashSet<String>,
}

impl Client<TcpStream> {
	/// Connect, exchange banners and complete the initial key exchange.
	/// `config.connect_timeout` bounds the TCP handshake only; the
	/// SSH-level exchange is bounded by `config.default_timeout` once a
	/// `Client` exists, same as any other read.
	pub async fn connect(host: &str, port: u16, config: ClientConfig) -> Result<Self, Error> {
		let connect = TcpStream::connect((host, port));
		let stream = match config.connect_timeout {
			Some(d) => tokio::time::timeout(d, connect).await.map_err(|_| Error::Timeout)??,
			None => connect.await?,
		};
		Client::new(stream, config).await
	}
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
	/// Wrap an already-connected byte stream and run the handshake over it.
	pub async fn new(mut stream: S, config: ClientConfig) -> Result<Self, Error> {
		let (client_id, server_id) = exchange_banners(&mut stream).await?;
		let outcome = perform_kex(&mut stream, &client_id, &server_id, &config, None, None, None, None).await?;
		Ok(Client {
			stream,
			config,
			client_id,
			server_id,
			write_dir: outcome.write_dir,
			read_dir: outcome.read_dir,
			session_id: outcome.session_id,
			negotiated: outcome.negotiated,
			server_public_key: outcome.server_public_key,
			server_host_key_blob: outcome.server_host_key_blob,
			channels: HashMap::new(),
			next_channel_id: 0,
			pty_pending: false,
			timed_out: false,
			last_activity: Instant::now(),
			services_accepted: HashSet::new(),
		})
	}

	pub fn algorithms_negotiated(&self) -> &NegotiatedAlgorithms {
		&self.negotiated
	}

	/// spec.md's `getServerPublicHostKey()`: the raw SSH2 wire blob, not the
	/// decoded key, so a caller can hash/compare/store it verbatim.
	pub fn server_public_host_key(&self) -> &[u8] {
		&self.server_host_key_blob
	}

	pub fn server_public_key(&self) -> &PublicKey {
		&self.server_public_key
	}

	/// `0`/`None` disables the default; a `None` passed to [`Client::read`]
	/// directly overrides it for one call only.
	pub fn set_timeout(&mut self, seconds: u64) {
		self.config.default_timeout = if seconds == 0 { None } else { Some(Duration::from_secs(seconds)) };
	}

	pub fn is_timeout(&self) -> bool {
		self.timed_out
	}

	pub fn set_keep_alive(&mut self, interval: Option<Duration>) {
		self.config.keepalive_interval = interval;
	}

	/// The next `exec`/`shell` on this client requests a PTY first.
	/// `channel::Channel::pty_request_message` itself refuses a second
	/// request on the same channel, so this only controls whether the
	/// *next newly opened* channel asks for one.
	pub fn enable_pty(&mut self) {
		self.pty_pending = true;
	}

	async fn send_packet(&mut self, payload: &[u8]) -> Result<(), Error> {
		let mut padding = [0u8; 256];
		OsRng.fill_bytes(&mut padding);
		let wire = self.write_dir.seal(payload, &padding);
		self.stream.write_all(&wire).await?;
		self.last_activity = Instant::now();
		if self.write_dir.needs_rekey() {
			self.rekey().await?;
		}
		Ok(())
	}

	async fn recv_packet_raw(&mut self) -> Result<Vec<u8>, Error> {
		let mut buffer = CryptoVec::new();
		self.read_dir.read(&mut self.stream, &mut buffer).await?;
		self.last_activity = Instant::now();
		Ok(buffer.as_slice().to_vec())
	}

	/// Read and dispatch exactly one incoming packet, optionally bounded by
	/// `deadline`. Used both by the public [`Client::read`] loop and by
	/// anything that needs to drain a `WINDOW_ADJUST`/reply out of band.
	async fn pump_one(&mut self, deadline: Option<Duration>) -> Result<(), Error> {
		let payload = match deadline {
			Some(d) => match tokio::time::timeout(d, self.recv_packet_raw()).await {
				Ok(result) => result?,
				Err(_) => {
					self.timed_out = true;
					return Err(Error::Timeout);
				}
			},
			None => self.recv_packet_raw().await?,
		};
		let msg_type = *payload.first().ok_or(Error::Truncated("message type"))?;
		self.dispatch_message(msg_type, &payload).await
	}

	async fn ensure_service(&mut self, name: &str) -> Result<(), Error> {
		if self.services_accepted.contains(name) {
			return Ok(());
		}
		let req = Writer::new().byte(SSH_MSG_SERVICE_REQUEST).string(name.as_bytes()).finish();
		self.send_packet(&req).await?;
		loop {
			let payload = self.recv_packet_raw().await?;
			let msg_type = *payload.first().ok_or(Error::Truncated("message type"))?;
			if msg_type == SSH_MSG_SERVICE_ACCEPT {
				self.services_accepted.insert(name.to_string());
				return Ok(());
			}
			self.dispatch_message(msg_type, &payload).await?;
		}
	}

	/// Handle everything that isn't a reply this call site is already
	/// blocking on: disconnects, peer-initiated rekey, global requests,
	/// channel data/window/teardown. `login`/auth loops and the open/reply
	/// waiters call this for every packet that isn't the thing they wanted.
	async fn dispatch_message(&mut self, msg_type: u8, payload: &[u8]) -> Result<(), Error> {
		match msg_type {
			SSH_MSG_DISCONNECT => {
				let mut r = Reader::new(&payload[1..]);
				let _reason = r.u32().unwrap_or(0);
				let description = r.utf8_string().unwrap_or_default();
				Err(Error::Disconnected(description))
			}
			SSH_MSG_IGNORE | SSH_MSG_DEBUG | SSH_MSG_UNIMPLEMENTED | SSH_MSG_USERAUTH_BANNER => Ok(()),
			SSH_MSG_KEXINIT => self.rekey_from_peer_kexinit(payload.to_vec()).await,
			SSH_MSG_GLOBAL_REQUEST => {
				let mut r = Reader::new(&payload[1..]);
				let _name = r.utf8_string()?;
				let want_reply = r.boolean()?;
				if want_reply {
					let reply = Writer::new().byte(SSH_MSG_REQUEST_FAILURE).finish();
					self.send_packet(&reply).await?;
				}
				Ok(())
			}
			SSH_MSG_CHANNEL_OPEN_CONFIRMATION | SSH_MSG_CHANNEL_OPEN_FAILURE => Ok(()),
			SSH_MSG_CHANNEL_WINDOW_ADJUST => {
				let mut r = Reader::new(&payload[1..]);
				let local_id = r.u32()?;
				let bytes = r.u32()?;
				if let Some(ch) = self.channels.get_mut(&local_id) {
					ch.on_window_adjust(bytes);
				}
				Ok(())
			}
			SSH_MSG_CHANNEL_DATA => {
				let mut r = Reader::new(&payload[1..]);
				let local_id = r.u32()?;
				let data = r.string()?.to_vec();
				let adjust = match self.channels.get_mut(&local_id) {
					Some(ch) => ch.on_data(&data, false)?,
					None => None,
				};
				if let Some(msg) = adjust {
					self.send_packet(&msg).await?;
				}
				Ok(())
			}
			SSH_MSG_CHANNEL_EXTENDED_DATA => {
				let mut r = Reader::new(&payload[1..]);
				let local_id = r.u32()?;
				let data_type = r.u32()?;
				let data = r.string()?.to_vec();
				if !channel::is_stderr_extended_data(data_type) {
					return Ok(());
				}
				let adjust = match self.channels.get_mut(&local_id) {
					Some(ch) => ch.on_data(&data, true)?,
					None => None,
				};
				if let Some(msg) = adjust {
					self.send_packet(&msg).await?;
				}
				Ok(())
			}
			SSH_MSG_CHANNEL_EOF => {
				let mut r = Reader::new(&payload[1..]);
				let local_id = r.u32()?;
				if let Some(ch) = self.channels.get_mut(&local_id) {
					ch.on_eof();
				}
				Ok(())
			}
			SSH_MSG_CHANNEL_CLOSE => {
				let mut r = Reader::new(&payload[1..]);
				let local_id = r.u32()?;
				if let Some(ch) = self.channels.get_mut(&local_id) {
					ch.on_close();
				}
				self.channels.remove(&local_id);
				Ok(())
			}
			SSH_MSG_CHANNEL_REQUEST => {
				let mut r = Reader::new(&payload[1..]);
				let recipient = r.u32()?;
				let request_type = r.utf8_string()?;
				let want_reply = r.boolean()?;
				if request_type == "exit-status" {
					let status = r.u32()?;
					if let Some(ch) = self.channels.get_mut(&recipient) {
						ch.exit_status = Some(status);
					}
				} else if want_reply {
					let msg = Writer::new().byte(SSH_MSG_CHANNEL_FAILURE).u32(recipient).finish();
					self.send_packet(&msg).await?;
				}
				Ok(())
			}
			SSH_MSG_CHANNEL_SUCCESS | SSH_MSG_CHANNEL_FAILURE | SSH_MSG_REQUEST_SUCCESS | SSH_MSG_REQUEST_FAILURE => Ok(()),
			other => Err(Error::UnexpectedMessage(other, "connection protocol")),
		}
	}

	async fn rekey(&mut self) -> Result<(), Error> {
		let outcome = perform_kex(
			&mut self.stream,
			&self.client_id,
			&self.server_id,
			&self.config,
			Some(&mut self.write_dir),
			Some(&mut self.read_dir),
			Some(self.session_id.clone()),
			None,
		)
		.await?;
		self.apply_kex_outcome(outcome);
		Ok(())
	}

	async fn rekey_from_peer_kexinit(&mut self, peer_kexinit: Vec<u8>) -> Result<(), Error> {
		let outcome = perform_kex(
			&mut self.stream,
			&self.client_id,
			&self.server_id,
			&self.config,
			Some(&mut self.write_dir),
			Some(&mut self.read_dir),
			Some(self.session_id.clone()),
			Some(peer_kexinit),
		)
		.await?;
		self.apply_kex_outcome(outcome);
		Ok(())
	}

	fn apply_kex_outcome(&mut self, outcome: KexOutcome) {
		self.negotiated = outcome.negotiated;
		self.write_dir = outcome.write_dir;
		self.read_dir = outcome.read_dir;
		self.server_public_key = outcome.server_public_key;
		self.server_host_key_blob = outcome.server_host_key_blob;
	}

	/// `SSH_MSG_IGNORE` with an empty payload. Returns `false` (spec.md's
	/// "unhealthy, subsequent calls should fail fast") if the send itself
	/// fails.
	pub async fn ping(&mut self) -> bool {
		let msg = Writer::new().byte(SSH_MSG_IGNORE).string(b"").finish();
		self.send_packet(&msg).await.is_ok()
	}

	async fn maybe_keepalive(&mut self) -> Result<(), Error> {
		if let Some(interval) = self.config.keepalive_interval {
			if self.last_activity.elapsed() >= interval {
				self.send_packet(&Writer::new().byte(SSH_MSG_IGNORE).string(b"").finish()).await?;
			}
		}
		Ok(())
	}

	// -- authentication ---------------------------------------------------

	/// spec.md: never throws on a rejected password; the transport remains
	/// usable either way.
	pub async fn authenticate_password(&mut self, username: &str, password: &str) -> Result<bool, Error> {
		self.ensure_service("ssh-userauth").await?;
		let req = auth::password_request(username, password);
		self.send_packet(&req).await?;
		loop {
			let payload = self.recv_packet_raw().await?;
			if auth::is_banner(&payload) {
				continue;
			}
			match auth::parse_outcome(&payload) {
				Ok(AuthOutcome::Success) => return Ok(true),
				Ok(AuthOutcome::Failure { .. }) => return Ok(false),
				Err(_) => {
					let msg_type = *payload.first().ok_or(Error::Truncated("message type"))?;
					self.dispatch_message(msg_type, &payload).await?;
				}
			}
		}
	}

	/// RFC 4252 §7/§8: probe with `has_signature = false`, sign once the
	/// server confirms it'll accept the key, then send the signed request.
	pub async fn authenticate_publickey(&mut self, username: &str, identity: &Identity) -> Result<bool, Error> {
		self.ensure_service("ssh-userauth").await?;
		let algorithm_name = identity.default_algorithm_name();
		let blob = identity.public_key_blob();
		let probe = auth::publickey_probe_request(username, algorithm_name, &blob);
		self.send_packet(&probe).await?;
		loop {
			let payload = self.recv_packet_raw().await?;
			if auth::is_banner(&payload) {
				continue;
			}
			if auth::is_pk_ok(&payload) {
				let to_sign = auth::signed_data(&self.session_id, username, algorithm_name, &blob);
				let signature_blob = identity.sign(algorithm_name, &to_sign)?;
				let req = auth::publickey_request(username, algorithm_name, &blob, &signature_blob);
				self.send_packet(&req).await?;
				continue;
			}
			match auth::parse_outcome(&payload) {
				Ok(AuthOutcome::Success) => return Ok(true),
				Ok(AuthOutcome::Failure { .. }) => return Ok(false),
				Err(_) => {
					let msg_type = *payload.first().ok_or(Error::Truncated("message type"))?;
					self.dispatch_message(msg_type, &payload).await?;
				}
			}
		}
	}

	/// RFC 4256: `responder` receives each `InfoRequest` and returns answers
	/// in prompt order.
	pub async fn authenticate_keyboard_interactive<F>(&mut self, username: &str, mut responder: F) -> Result<bool, Error>
	where
		F: FnMut(&auth::InfoRequest) -> Vec<String>,
	{
		self.ensure_service("ssh-userauth").await?;
		let req = auth::keyboard_interactive_request(username, "");
		self.send_packet(&req).await?;
		loop {
			let payload = self.recv_packet_raw().await?;
			if auth::is_banner(&payload) {
				continue;
			}
			if payload.first() == Some(&SSH_MSG_USERAUTH_INFO_REQUEST) {
				let info = auth::parse_info_request(&payload)?;
				let answers = responder(&info);
				let resp = auth::info_response(&answers);
				self.send_packet(&resp).await?;
				continue;
			}
			match auth::parse_outcome(&payload) {
				Ok(AuthOutcome::Success) => return Ok(true),
				Ok(AuthOutcome::Failure { .. }) => return Ok(false),
				Err(_) => {
					let msg_type = *payload.first().ok_or(Error::Truncated("message type"))?;
					self.dispatch_message(msg_type, &payload).await?;
				}
			}
		}
	}

	// -- channels -----------------------------------------------------------

	fn alloc_channel_id(&mut self) -> u32 {
		let id = self.next_channel_id;
		self.next_channel_id += 1;
		id
	}

	async fn await_open_confirmation(&mut self, local_id: u32) -> Result<u32, Error> {
		loop {
			let payload = self.recv_packet_raw().await?;
			let msg_type = *payload.first().ok_or(Error::Truncated("message type"))?;
			match msg_type {
				SSH_MSG_CHANNEL_OPEN_CONFIRMATION => {
					let mut r = Reader::new(&payload[1..]);
					let recipient = r.u32()?;
					if recipient != local_id {
						continue;
					}
					let remote_id = r.u32()?;
					let remote_window = r.u32()?;
					let remote_max_packet = r.u32()?;
					if let Some(ch) = self.channels.get_mut(&local_id) {
						ch.on_open_confirmation(remote_id, remote_window, remote_max_packet);
					}
					return Ok(local_id);
				}
				SSH_MSG_CHANNEL_OPEN_FAILURE => {
					let mut r = Reader::new(&payload[1..]);
					let recipient = r.u32()?;
					if recipient != local_id {
						continue;
					}
					self.channels.remove(&local_id);
					return Err(Error::NoSuchChannel(local_id));
				}
				_ => self.dispatch_message(msg_type, &payload).await?,
			}
		}
	}

	async fn await_channel_reply(&mut self, local_id: u32) -> Result<bool, Error> {
		loop {
			let payload = self.recv_packet_raw().await?;
			let msg_type = *payload.first().ok_or(Error::Truncated("message type"))?;
			match msg_type {
				SSH_MSG_CHANNEL_SUCCESS => {
					let mut r = Reader::new(&payload[1..]);
					if r.u32()? == local_id {
						return Ok(true);
					}
				}
				SSH_MSG_CHANNEL_FAILURE => {
					let mut r = Reader::new(&payload[1..]);
					if r.u32()? == local_id {
						return Ok(false);
					}
				}
				_ => self.dispatch_message(msg_type, &payload).await?,
			}
		}
	}

	pub async fn open_session_channel(&mut self) -> Result<u32, Error> {
		let local_id = self.alloc_channel_id();
		self.channels.insert(local_id, Channel::new(local_id, ChannelType::Session));
		let open_msg = Channel::open_session(local_id);
		self.send_packet(&open_msg).await?;
		self.await_open_confirmation(local_id).await
	}

	pub async fn open_direct_tcpip(
		&mut self,
		host: &str,
		port: u16,
		originator_host: &str,
		originator_port: u16,
	) -> Result<u32, Error> {
		let local_id = self.alloc_channel_id();
		self.channels.insert(local_id, Channel::new(local_id, ChannelType::DirectTcpip));
		let open_msg = Writer::new()
			.byte(SSH_MSG_CHANNEL_OPEN)
			.string(b"direct-tcpip")
			.u32(local_id)
			.u32(channel::INITIAL_WINDOW_SIZE)
			.u32(channel::MAXIMUM_PACKET_SIZE)
			.string(host.as_bytes())
			.u32(port as u32)
			.string(originator_host.as_bytes())
			.u32(originator_port as u32)
			.finish();
		self.send_packet(&open_msg).await?;
		self.await_open_confirmation(local_id).await
	}

	async fn request_pty_if_pending(&mut self, local_id: u32) -> Result<(), Error> {
		if !self.pty_pending {
			return Ok(());
		}
		self.pty_pending = false;
		let msg = {
			let ch = self.channels.get_mut(&local_id).ok_or(Error::NoSuchChannel(local_id))?;
			ch.pty_request_message(&self.config.pty_term, self.config.pty_width_chars, self.config.pty_height_rows, 0, 0, &[])?
		};
		self.send_packet(&msg).await?;
		self.await_channel_reply(local_id).await?;
		Ok(())
	}

	/// Opens a `session` channel, sends `pty-req` first if
	/// [`Client::enable_pty`] was called since the last exec/shell, then
	/// `exec`. Does not wait for the server's `CHANNEL_SUCCESS`/`FAILURE`
	/// reply to the `exec` itself — use [`Client::read`] to drive output.
	pub async fn exec(&mut self, command: &str) -> Result<u32, Error> {
		let local_id = self.open_session_channel().await?;
		self.request_pty_if_pending(local_id).await?;
		let msg = {
			let ch = self.channels.get(&local_id).ok_or(Error::NoSuchChannel(local_id))?;
			ch.exec_request_message(command)
		};
		self.send_packet(&msg).await?;
		Ok(local_id)
	}

	pub async fn shell(&mut self) -> Result<u32, Error> {
		let local_id = self.open_session_channel().await?;
		self.request_pty_if_pending(local_id).await?;
		let msg = {
			let ch = self.channels.get(&local_id).ok_or(Error::NoSuchChannel(local_id))?;
			ch.shell_request_message()
		};
		self.send_packet(&msg).await?;
		self.await_channel_reply(local_id).await?;
		Ok(local_id)
	}

	/// Opens a `session` channel and requests the named subsystem (RFC 4254
	/// §6.5), e.g. `subsystem("sftp")`. Waits for the server's
	/// `CHANNEL_SUCCESS`/`FAILURE` reply, the same as [`Client::shell`],
	/// since callers (the SFTP client in particular) need to know the
	/// subsystem actually started before sending any protocol bytes on it.
	pub async fn subsystem(&mut self, name: &str) -> Result<u32, Error> {
		let local_id = self.open_session_channel().await?;
		let msg = {
			let ch = self.channels.get(&local_id).ok_or(Error::NoSuchChannel(local_id))?;
			ch.subsystem_request_message(name)
		};
		self.send_packet(&msg).await?;
		if !self.await_channel_reply(local_id).await? {
			return Err(Error::UnexpectedMessage(0, "subsystem request refused"));
		}
		Ok(local_id)
	}

	pub fn exit_status(&self, channel_id: u32) -> Option<u32> {
		self.channels.get(&channel_id).and_then(|ch| ch.exit_status)
	}

	/// Writes `data`, chunking and pacing it to the channel's remote window
	/// and max packet size; blocks (suspends) on incoming `WINDOW_ADJUST`
	/// traffic when the window runs out.
	pub async fn write(&mut self, channel_id: u32, data: &[u8]) -> Result<usize, Error> {
		let mut sent = 0;
		while sent < data.len() {
			let (messages, consumed) = {
				let ch = self.channels.get_mut(&channel_id).ok_or(Error::NoSuchChannel(channel_id))?;
				if !ch.is_open() {
					return Err(Error::NoSuchChannel(channel_id));
				}
				ch.data_messages(&data[sent..])
			};
			for message in &messages {
				self.send_packet(message).await?;
			}
			sent += consumed;
			if consumed == 0 {
				self.pump_one(self.config.default_timeout).await?;
			}
		}
		Ok(sent)
	}

	/// spec.md's reading model: drain what's buffered, wait for a pattern to
	/// appear, or wait for the next chunk — whichever `mode` asks for,
	/// bounded by `timeout` (falling back to the client's default). A
	/// reader on one channel that has nothing pending still processes and
	/// buffers data for every other channel rather than dropping it, since
	/// `pump_one` dispatches by channel id regardless of which channel this
	/// call is waiting on.
	pub async fn read(&mut self, channel_id: u32, mode: ReadMode, timeout: Option<Duration>) -> Result<Vec<u8>, Error> {
		self.timed_out = false;
		let budget = timeout.or(self.config.default_timeout);
		let start = Instant::now();
		loop {
			{
				let ch = self.channels.get_mut(&channel_id).ok_or(Error::NoSuchChannel(channel_id))?;
				let ready = match &mode {
					ReadMode::ConsumeAllPending | ReadMode::NextChunk => !ch.read_buffer.is_empty(),
					ReadMode::WaitForPattern(pattern) => {
						let buffered: Vec<u8> = ch.read_buffer.iter().copied().collect();
						pattern.match_end(&buffered).is_some()
					}
				};
				if ready {
					let end = match &mode {
						ReadMode::WaitForPattern(pattern) => {
							let buffered: Vec<u8> = ch.read_buffer.iter().copied().collect();
							pattern.match_end(&buffered).expect("ready implies a match")
						}
						_ => ch.read_buffer.len(),
					};
					return Ok(ch.read_buffer.drain(..end).collect());
				}
				if !ch.is_open() {
					return Ok(ch.read_buffer.drain(..).collect());
				}
			}
			self.maybe_keepalive().await?;
			let remaining = match budget {
				Some(total) => {
					let elapsed = start.elapsed();
					if elapsed >= total {
						self.timed_out = true;
						return Err(Error::Timeout);
					}
					Some(total - elapsed)
				}
				None => None,
			};
			self.pump_one(remaining).await?;
		}
	}

	/// Sends `CHANNEL_EOF` then `CHANNEL_CLOSE` and waits for the peer's own
	/// close, so `channel_id` is never reused while traffic for it might
	/// still be in flight.
	pub async fn close_channel(&mut self, channel_id: u32) -> Result<(), Error> {
		let eof = {
			let ch = self.channels.get_mut(&channel_id).ok_or(Error::NoSuchChannel(channel_id))?;
			ch.eof_message()
		};
		self.send_packet(&eof).await?;
		let close = {
			let ch = self.channels.get_mut(&channel_id).ok_or(Error::NoSuchChannel(channel_id))?;
			ch.close_message()
		};
		self.send_packet(&close).await?;
		while self.channels.contains_key(&channel_id) {
			self.pump_one(self.config.default_timeout).await?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn substring_pattern_matches_first_occurrence_end() {
		let pattern = Pattern::Substring("hello".to_string());
		assert_eq!(pattern.match_end(b"say hello there"), Some(9));
		assert_eq!(pattern.match_end(b"nothing here"), None);
	}

	#[test]
	fn regex_pattern_matches_end_of_match() {
		let pattern = Pattern::Regex(Regex::new(r"\$\s*$").unwrap());
		assert_eq!(pattern.match_end(b"user@host:~$ "), Some(13));
	}

	#[test]
	fn ed25519_identity_round_trips_through_hostkey_verify() {
		let kp = Ed25519KeyPair::generate();
		let identity = Identity::Ed25519(kp);
		let blob = identity.public_key_blob();
		let public_key = hostkey::decode(&blob).unwrap();
		let message = b"session-id || USERAUTH_REQUEST || ...";
		let signature_blob = identity.sign("ssh-ed25519", message).unwrap();
		assert!(hostkey::verify(&public_key, "ssh-ed25519", message, &signature_blob).unwrap());
	}

	#[test]
	fn kex_flavor_classifies_known_methods() {
		assert!(matches!(kex_flavor("diffie-hellman-group-exchange-sha256"), KexFlavor::GroupExchange));
		assert!(matches!(kex_flavor("ecdh-sha2-nistp256"), KexFlavor::Ecdh));
		assert!(matches!(kex_flavor("curve25519-sha256"), KexFlavor::Ecdh));
		assert!(matches!(kex_flavor("diffie-hellman-group14-sha256"), KexFlavor::Classic));
	}

	#[tokio::test]
	async fn plaintext_packet_round_trips() {
		let payload = b"hello kexinit".to_vec();
		let mut wire = Vec::new();
		write_plaintext_packet(&mut wire, &payload).await.unwrap();
		let mut cursor = std::io::Cursor::new(wire);
		let read_back = read_plaintext_packet(&mut cursor).await.unwrap();
		assert_eq!(read_back, payload);
	}
}
