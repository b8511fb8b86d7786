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

//! ASN.1 DER codec (C5): a raw-bytes-preserving TLV tree (`element`), typed
//! value accessors (`value`), object identifiers with a process-wide name
//! registry (`oid`), PEM armor (`pem`), and a declarative schema layer
//! (`schema`) scoped to what certificate and key documents need.

pub mod element;
pub mod oid;
pub mod pem;
pub mod schema;
pub mod tag;
pub mod value;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("ASN.1 parse error: {0}")]
	Parse(&'static str),
	#[error("schema mismatch: {0}")]
	SchemaMismatch(String),
	#[error("PEM error: {0}")]
	Pem(String),
	#[error("base64 decode error: {0}")]
	Base64(#[from] base64::DecodeError),
}

pub use element::{decode_all, decode_der, encode_tlv, Body, Element};
pub use oid::ObjectIdentifier;
