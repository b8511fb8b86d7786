//! Channel multiplexing (RFC 4254 §5): per-channel flow-control windows,
//! `CHANNEL_DATA`/`CHANNEL_EXTENDED_DATA` (stderr), symmetric EOF/close
//! teardown, and the bookkeeping that lets several interactive sessions
//! (shell, exec, PTY) share one transport concurrently.

use std::collections::VecDeque;

use crate::msg::SSH_EXTENDED_DATA_STDERR;
use crate::wire::{Reader, Writer};
use crate::Error;

/// RFC 4254 §5.1 defaults: a generous initial window so a first write
/// doesn't immediately stall on `WINDOW_ADJUST`, and a max packet size
/// comfortably under the 32KiB a conforming peer must accept.
pub const INITIAL_WINDOW_SIZE: u32 = 2 * 1024 * 1024;
pub const MAXIMUM_PACKET_SIZE: u32 = 32 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelType {
	Session,
	DirectTcpip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
	/// `CHANNEL_OPEN` sent, awaiting confirmation or failure.
	Opening,
	Open,
	/// This side sent `CHANNEL_EOF`; the peer's half may still be open.
	EofSent,
	/// The peer sent `CHANNEL_EOF`.
	EofReceived,
	/// Both directions have seen `CHANNEL_EOF`/`CHANNEL_CLOSE`; `CHANNEL_CLOSE`
	/// has been sent and the channel is awaiting (or has seen) the peer's.
	Closing,
	Closed,
}

/// One multiplexed SSH channel (a shell, an exec, a direct-tcpip tunnel).
/// Flow control windows are tracked in both directions independently, per
/// RFC 4254 §5.2 ("Note that the channel is bidirectional.").
pub struct Channel {
	pub local_id: u32,
	pub remote_id: u32,
	pub channel_type: ChannelType,
	pub state: ChannelState,
	pub local_window: u32,
	pub local_max_packet: u32,
	pub remote_window: u32,
	pub remote_max_packet: u32,
	pub read_buffer: VecDeque<u8>,
	pub stderr_buffer: VecDeque<u8>,
	pub pty_requested: bool,
	pub exit_status: Option<u32>,
}

impl Channel {
	pub fn new(local_id: u32, channel_type: ChannelType) -> Self {
		Channel {
			local_id,
			remote_id: 0,
			channel_type,
			state: ChannelState::Opening,
			local_window: INITIAL_WINDOW_SIZE,
			local_max_packet: MAXIMUM_PACKET_SIZE,
			remote_window: 0,
			remote_max_packet: 0,
			read_buffer: VecDeque::new(),
			stderr_buffer: VecDeque::new(),
			pty_requested: false,
			exit_status: None,
		}
	}

	pub fn is_open(&self) -> bool {
		matches!(self.state, ChannelState::Open | ChannelState::EofSent | ChannelState::EofReceived)
	}

	/// `CHANNEL_OPEN` payload for a `session` channel (RFC 4254 §6.1).
	pub fn open_session(local_id: u32) -> Vec<u8> {
		Writer::new()
			.byte(crate::msg::SSH_MSG_CHANNEL_OPEN)
			.string(b"session")
			.u32(local_id)
			.u32(INITIAL_WINDOW_SIZE)
			.u32(MAXIMUM_PACKET_SIZE)
			.finish()
	}

	pub fn on_open_confirmation(&mut self, remote_id: u32, remote_window: u32, remote_max_packet: u32) {
		self.remote_id = remote_id;
		self.remote_window = remote_window;
		self.remote_max_packet = remote_max_packet;
		self.state = ChannelState::Open;
	}

	/// `CHANNEL_DATA`, chunked to respect `remote_max_packet` and consuming
	/// `remote_window`; returns the wire messages to send and the number of
	/// payload bytes actually consumed (the rest must wait for a
	/// `WINDOW_ADJUST`).
	pub fn data_messages(&mut self, payload: &[u8]) -> (Vec<Vec<u8>>, usize) {
		self.frame_data(crate::msg::SSH_MSG_CHANNEL_DATA, None, payload)
	}

	pub fn extended_data_messages(&mut self, data_type: u32, payload: &[u8]) -> (Vec<Vec<u8>>, usize) {
		self.frame_data(crate::msg::SSH_MSG_CHANNEL_EXTENDED_DATA, Some(data_type), payload)
	}

	fn frame_data(&mut self, msg_type: u8, data_type: Option<u32>, payload: &[u8]) -> (Vec<Vec<u8>>, usize) {
		let mut messages = Vec::new();
		let mut consumed = 0;
		let overhead = if data_type.is_some() { 4 } else { 0 };
		let max_chunk = self.remote_max_packet.saturating_sub(overhead).max(1) as usize;

		while consumed < payload.len() && self.remote_window > 0 {
			let chunk_len = max_chunk.min(payload.len() - consumed).min(self.remote_window as usize);
			if chunk_len == 0 {
				break;
			}
			let chunk = &payload[consumed..consumed + chunk_len];
			let mut writer = Writer::new().byte(msg_type).u32(self.remote_id);
			if let Some(dt) = data_type {
				writer = writer.u32(dt);
			}
			messages.push(writer.string(chunk).finish());
			self.remote_window -= chunk_len as u32;
			consumed += chunk_len;
		}
		(messages, consumed)
	}

	/// Incoming `CHANNEL_DATA`/`CHANNEL_EXTENDED_DATA` payload: buffer it
	/// and, if the local window has run low, return a `WINDOW_ADJUST` to
	/// send back (RFC 4254 §5.2).
	pub fn on_data(&mut self, data: &[u8], stderr: bool) -> Result<Option<Vec<u8>>, Error> {
		if data.len() as u32 > self.local_window {
			return Err(Error::WindowExhausted(self.local_id));
		}
		if stderr {
			self.stderr_buffer.extend(data);
		} else {
			self.read_buffer.extend(data);
		}
		self.local_window -= data.len() as u32;
		if self.local_window < INITIAL_WINDOW_SIZE / 2 {
			let adjustment = INITIAL_WINDOW_SIZE - self.local_window;
			self.local_window += adjustment;
			Ok(Some(Writer::new().byte(crate::msg::SSH_MSG_CHANNEL_WINDOW_ADJUST).u32(self.remote_id).u32(adjustment).finish()))
		} else {
			Ok(None)
		}
	}

	pub fn on_window_adjust(&mut self, bytes: u32) {
		self.remote_window = self.remote_window.saturating_add(bytes);
	}

	pub fn eof_message(&mut self) -> Vec<u8> {
		self.state = match self.state {
			ChannelState::EofReceived => ChannelState::Closing,
			_ => ChannelState::EofSent,
		};
		Writer::new().byte(crate::msg::SSH_MSG_CHANNEL_EOF).u32(self.remote_id).finish()
	}

	pub fn on_eof(&mut self) {
		self.state = match self.state {
			ChannelState::EofSent => ChannelState::Closing,
			_ => ChannelState::EofReceived,
		};
	}

	pub fn close_message(&mut self) -> Vec<u8> {
		self.state = ChannelState::Closed;
		Writer::new().byte(crate::msg::SSH_MSG_CHANNEL_CLOSE).u32(self.remote_id).finish()
	}

	pub fn on_close(&mut self) {
		self.state = ChannelState::Closed;
	}

	/// `pty-req` (RFC 4254 §6.2). `Error::PtyAlreadyOpen` enforces spec.md's
	/// single-PTY-per-channel guard rather than silently sending a second
	/// request the server would reject anyway.
	pub fn pty_request_message(
		&mut self,
		term: &str,
		width_chars: u32,
		height_rows: u32,
		width_pixels: u32,
		height_pixels: u32,
		modes: &[u8],
	) -> Result<Vec<u8>, Error> {
		if self.pty_requested {
			return Err(Error::PtyAlreadyOpen);
		}
		self.pty_requested = true;
		Ok(Writer::new()
			.byte(crate::msg::SSH_MSG_CHANNEL_REQUEST)
			.u32(self.remote_id)
			.string(b"pty-req")
			.boolean(true)
			.string(term.as_bytes())
			.u32(width_chars)
			.u32(height_rows)
			.u32(width_pixels)
			.u32(height_pixels)
			.string(modes)
			.finish())
	}

	pub fn shell_request_message(&self) -> Vec<u8> {
		Writer::new().byte(crate::msg::SSH_MSG_CHANNEL_REQUEST).u32(self.remote_id).string(b"shell").boolean(true).finish()
	}

	pub fn exec_request_message(&self, command: &str) -> Vec<u8> {
		Writer::new()
			.byte(crate::msg::SSH_MSG_CHANNEL_REQUEST)
			.u32(self.remote_id)
			.string(b"exec")
			.boolean(true)
			.string(command.as_bytes())
			.finish()
	}

	/// `subsystem` (RFC 4254 §6.5), e.g. `name = "sftp"`.
	pub fn subsystem_request_message(&self, name: &str) -> Vec<u8> {
		Writer::new()
			.byte(crate::msg::SSH_MSG_CHANNEL_REQUEST)
			.u32(self.remote_id)
			.string(b"subsystem")
			.boolean(true)
			.string(name.as_bytes())
			.finish()
	}

	/// Parse `exit-status` out of an incoming `CHANNEL_REQUEST` payload
	/// (`want_reply` is always `false` for this one, RFC 4254 §6.10).
	pub fn try_parse_exit_status(payload: &[u8]) -> Result<Option<u32>, Error> {
		let mut r = Reader::new(payload);
		let msg_type = r.byte()?;
		if msg_type != crate::msg::SSH_MSG_CHANNEL_REQUEST {
			return Ok(None);
		}
		let _recipient = r.u32()?;
		let request_type = r.utf8_string()?;
		if request_type != "exit-status" {
			return Ok(None);
		}
		let _want_reply = r.boolean()?;
		Ok(Some(r.u32()?))
	}
}

/// Extracts the `data_type_code` from a `CHANNEL_EXTENDED_DATA` payload,
/// confirming it is the stderr stream (RFC 4254 §5.2) rather than some
/// other extended data type this client doesn't understand.
pub fn is_stderr_extended_data(data_type: u32) -> bool {
	data_type == SSH_EXTENDED_DATA_STDERR
}

#[cfg(test)]
mod tests {
	use super::*;

	fn opened_channel() -> Channel {
		let mut ch = Channel::new(3, ChannelType::Session);
		ch.on_open_confirmation(7, INITIAL_WINDOW_SIZE, MAXIMUM_PACKET_SIZE);
		ch
	}

	#[test]
	fn data_messages_respect_remote_window_and_max_packet() {
		let mut ch = opened_channel();
		ch.remote_window = 10;
		ch.remote_max_packet = 1024;
		let (messages, consumed) = ch.data_messages(b"hello world");
		assert_eq!(consumed, 10);
		assert_eq!(messages.len(), 1);
		assert_eq!(ch.remote_window, 0);
	}

	#[test]
	fn on_data_rejects_payload_larger_than_local_window() {
		let mut ch = opened_channel();
		ch.local_window = 4;
		assert!(ch.on_data(b"too much data", false).is_err());
	}

	#[test]
	fn on_data_emits_window_adjust_once_window_runs_low() {
		let mut ch = opened_channel();
		ch.local_window = 1;
		let adjust = ch.on_data(b"x", false).unwrap();
		assert!(adjust.is_some());
		assert_eq!(ch.local_window, INITIAL_WINDOW_SIZE);
	}

	#[test]
	fn second_pty_request_is_rejected() {
		let mut ch = opened_channel();
		assert!(ch.pty_request_message("xterm", 80, 24, 0, 0, &[]).is_ok());
		assert!(ch.pty_request_message("xterm", 80, 24, 0, 0, &[]).is_err());
	}

	#[test]
	fn eof_then_close_from_both_sides_reaches_closing_state() {
		let mut ch = opened_channel();
		ch.eof_message();
		assert_eq!(ch.state, ChannelState::EofSent);
		ch.on_eof();
		assert_eq!(ch.state, ChannelState::Closing);
	}

	#[test]
	fn exit_status_request_parses() {
		let payload = Writer::new()
			.byte(crate::msg::SSH_MSG_CHANNEL_REQUEST)
			.u32(3)
			.string(b"exit-status")
			.boolean(false)
			.u32(0)
			.finish();
		assert_eq!(Channel::try_parse_exit_status(&payload).unwrap(), Some(0));
	}
}
