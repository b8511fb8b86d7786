//! User authentication (RFC 4252): building `SSH_MSG_USERAUTH_REQUEST` for
//! `password`, `publickey` and `keyboard-interactive`, and interpreting the
//! server's response. `login` never raises on a rejected password — a bad
//! credential is ordinary protocol traffic, not a transport failure.

use wyvern_keys::PublicKey;

use crate::msg::{
	SSH_MSG_USERAUTH_BANNER, SSH_MSG_USERAUTH_FAILURE, SSH_MSG_USERAUTH_INFO_REQUEST, SSH_MSG_USERAUTH_INFO_RESPONSE,
	SSH_MSG_USERAUTH_PK_OK, SSH_MSG_USERAUTH_REQUEST, SSH_MSG_USERAUTH_SUCCESS,
};
use crate::wire::{Reader, Writer};
use crate::Error;

/// The outcome of one authentication attempt; distinct from `Error` so a
/// rejected password/key is ordinary control flow rather than a transport
/// fault (spec.md: "`login` must never throw on bad password").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
	Success,
	/// RFC 4252 §5.1: methods the server still accepts, and whether it is
	/// willing to try further authentication at all.
	Failure { methods_that_can_continue: Vec<String>, partial_success: bool },
}

pub fn password_request(username: &str, password: &str) -> Vec<u8> {
	Writer::new()
		.byte(SSH_MSG_USERAUTH_REQUEST)
		.string(username.as_bytes())
		.string(b"ssh-connection")
		.string(b"password")
		.boolean(false)
		.string(password.as_bytes())
		.finish()
}

/// RFC 4252 §8: sent first with `has_signature = false` to let the server
/// confirm it'll accept this key/algorithm before the client signs anything.
pub fn publickey_probe_request(username: &str, algorithm_name: &str, public_key_blob: &[u8]) -> Vec<u8> {
	Writer::new()
		.byte(SSH_MSG_USERAUTH_REQUEST)
		.string(username.as_bytes())
		.string(b"ssh-connection")
		.string(b"publickey")
		.boolean(false)
		.string(algorithm_name.as_bytes())
		.string(public_key_blob)
		.finish()
}

/// The signed follow-up once the server's `PK_OK` confirms the key is
/// acceptable. `signature_blob` is the full SSH2 signature wire blob
/// (algorithm name + raw signature bytes), and must be computed over
/// exactly the bytes `signed_data` returns for this same request.
pub fn publickey_request(username: &str, algorithm_name: &str, public_key_blob: &[u8], signature_blob: &[u8]) -> Vec<u8> {
	Writer::new()
		.byte(SSH_MSG_USERAUTH_REQUEST)
		.string(username.as_bytes())
		.string(b"ssh-connection")
		.string(b"publickey")
		.boolean(true)
		.string(algorithm_name.as_bytes())
		.string(public_key_blob)
		.string(signature_blob)
		.finish()
}

/// RFC 4252 §7: `session_id || SSH_MSG_USERAUTH_REQUEST || ...` is what the
/// client actually signs for a `publickey` request, not the request itself.
pub fn signed_data(session_id: &[u8], username: &str, algorithm_name: &str, public_key_blob: &[u8]) -> Vec<u8> {
	Writer::new()
		.string(session_id)
		.byte(SSH_MSG_USERAUTH_REQUEST)
		.string(username.as_bytes())
		.string(b"ssh-connection")
		.string(b"publickey")
		.boolean(true)
		.string(algorithm_name.as_bytes())
		.string(public_key_blob)
		.finish()
}

pub fn keyboard_interactive_request(username: &str, submethods: &str) -> Vec<u8> {
	Writer::new()
		.byte(SSH_MSG_USERAUTH_REQUEST)
		.string(username.as_bytes())
		.string(b"ssh-connection")
		.string(b"keyboard-interactive")
		.string(b"")
		.string(submethods.as_bytes())
		.finish()
}

#[derive(Clone, Debug)]
pub struct InfoRequest {
	pub name: String,
	pub instruction: String,
	pub prompts: Vec<(String, bool)>,
}

pub fn parse_info_request(payload: &[u8]) -> Result<InfoRequest, Error> {
	let mut r = Reader::new(payload);
	let msg_type = r.byte()?;
	if msg_type != SSH_MSG_USERAUTH_INFO_REQUEST {
		return Err(Error::UnexpectedMessage(msg_type, "userauth info request"));
	}
	let name = r.utf8_string()?;
	let instruction = r.utf8_string()?;
	let _language_tag = r.utf8_string()?;
	let count = r.u32()?;
	let mut prompts = Vec::with_capacity(count as usize);
	for _ in 0..count {
		let text = r.utf8_string()?;
		let echo = r.boolean()?;
		prompts.push((text, echo));
	}
	Ok(InfoRequest { name, instruction, prompts })
}

pub fn info_response(answers: &[String]) -> Vec<u8> {
	let mut writer = Writer::new().byte(SSH_MSG_USERAUTH_INFO_RESPONSE).u32(answers.len() as u32);
	for answer in answers {
		writer = writer.string(answer.as_bytes());
	}
	writer.finish()
}

/// Parse `SSH_MSG_USERAUTH_SUCCESS`/`SSH_MSG_USERAUTH_FAILURE` into an
/// [`AuthOutcome`]; any other message type is an error since the transport
/// state machine should not hand this function traffic it didn't ask for.
pub fn parse_outcome(payload: &[u8]) -> Result<AuthOutcome, Error> {
	let mut r = Reader::new(payload);
	let msg_type = r.byte()?;
	match msg_type {
		SSH_MSG_USERAUTH_SUCCESS => Ok(AuthOutcome::Success),
		SSH_MSG_USERAUTH_FAILURE => {
			let methods_that_can_continue = r.name_list()?;
			let partial_success = r.boolean()?;
			Ok(AuthOutcome::Failure { methods_that_can_continue, partial_success })
		}
		other => Err(Error::UnexpectedMessage(other, "userauth success/failure")),
	}
}

pub fn is_pk_ok(payload: &[u8]) -> bool {
	payload.first() == Some(&SSH_MSG_USERAUTH_PK_OK)
}

pub fn is_banner(payload: &[u8]) -> bool {
	payload.first() == Some(&SSH_MSG_USERAUTH_BANNER)
}

pub fn parse_banner(payload: &[u8]) -> Result<String, Error> {
	let mut r = Reader::new(payload);
	let msg_type = r.byte()?;
	if msg_type != SSH_MSG_USERAUTH_BANNER {
		return Err(Error::UnexpectedMessage(msg_type, "userauth banner"));
	}
	r.utf8_string()
}

/// The SSH algorithm name a negotiated key should sign/verify as, given its
/// algorithm family — distinct from the key *type* name for RSA, which may
/// sign as `rsa-sha2-256`/`rsa-sha2-512` under RFC 8332 even though the key
/// itself is still reported as `ssh-rsa` in `publickey_probe_request`.
pub fn default_signature_algorithm(public_key: &PublicKey) -> &'static str {
	public_key.algorithm().ssh_name()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn password_request_encodes_plaintext_password() {
		let req = password_request("alice", "hunter2");
		assert!(req.windows(b"hunter2".len()).any(|w| w == b"hunter2"));
	}

	#[test]
	fn failure_outcome_lists_continuing_methods() {
		let payload = Writer::new()
			.byte(SSH_MSG_USERAUTH_FAILURE)
			.name_list(&["publickey", "password"])
			.boolean(false)
			.finish();
		let outcome = parse_outcome(&payload).unwrap();
		assert_eq!(
			outcome,
			AuthOutcome::Failure { methods_that_can_continue: vec!["publickey".into(), "password".into()], partial_success: false }
		);
	}

	#[test]
	fn success_outcome_parses() {
		let payload = Writer::new().byte(SSH_MSG_USERAUTH_SUCCESS).finish();
		assert_eq!(parse_outcome(&payload).unwrap(), AuthOutcome::Success);
	}

	#[test]
	fn info_request_round_trips_prompts() {
		let payload = Writer::new()
			.byte(SSH_MSG_USERAUTH_INFO_REQUEST)
			.string(b"name")
			.string(b"instruction")
			.string(b"")
			.u32(2)
			.string(b"Password: ")
			.boolean(false)
			.string(b"Token: ")
			.boolean(true)
			.finish();
		let parsed = parse_info_request(&payload).unwrap();
		assert_eq!(parsed.prompts, vec![("Password: ".to_string(), false), ("Token: ".to_string(), true)]);
	}

	#[test]
	fn signed_data_includes_session_id_prefix() {
		let data = signed_data(b"session-id-bytes", "bob", "ssh-ed25519", b"blob");
		assert!(data.starts_with(&Writer::new().string(b"session-id-bytes").finish()));
	}
}
