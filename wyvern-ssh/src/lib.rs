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

//! SSH2 transport, user authentication and connection-layer client (C8):
//! algorithm negotiation, key exchange, the encrypted packet layer, and a
//! channel multiplexer supporting concurrent interactive sessions.

pub mod auth;
pub mod channel;
pub mod cipher;
pub mod client;
pub mod config;
pub mod hostkey;
pub mod kex;
pub mod mac;
pub mod msg;
pub mod negotiate;
pub mod packet;
pub mod wire;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("truncated packet field: {0}")]
	Truncated(&'static str),
	#[error("malformed packet: {0}")]
	Malformed(&'static str),
	#[error("unsupported algorithm: {0}")]
	UnsupportedAlgorithm(String),
	#[error("no common algorithm for {0}")]
	NoCommonAlgorithm(&'static str),
	#[error("host key signature verification failed")]
	BadHostKeySignature,
	#[error("MAC or AEAD authentication failed")]
	MacError,
	#[error("peer sent an unexpected message {0} in state {1}")]
	UnexpectedMessage(u8, &'static str),
	#[error("channel {0} is not open")]
	NoSuchChannel(u32),
	#[error("remote window exhausted on channel {0}")]
	WindowExhausted(u32),
	#[error("a PTY-bearing channel is already open")]
	PtyAlreadyOpen,
	#[error("peer disconnected: {0}")]
	Disconnected(String),
	#[error("authentication failed")]
	AuthFailed,
	#[error("operation timed out")]
	Timeout,
	#[error(transparent)]
	Cipher(#[from] wyvern_cipher::Error),
	#[error(transparent)]
	Keys(#[from] wyvern_keys::Error),
	#[error(transparent)]
	BigInt(#[from] wyvern_bigint::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// The identifying banner each side sends before KEXINIT (RFC 4253 §4.2).
pub const CLIENT_IDENTIFIER: &str = "SSH-2.0-wyvern_0.1";
