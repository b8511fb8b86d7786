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

//! A small cursor-based helper for walking SEQUENCE/SET content the way a
//! hand-written X.509 parser does: pull the mandatory fields off the front,
//! peek at a context tag to decide whether an OPTIONAL or DEFAULT field is
//! present, and unwrap EXPLICIT/IMPLICIT tagging without re-deriving the
//! whole of X.680 for it. This deliberately does not attempt to be a generic
//! ASN.1 schema interpreter: wyvern-x509 is the only consumer, and its
//! document shapes (Certificate, TBSCertificate, Extension, AlgorithmIdentifier,
//! Name/RDN, Validity...) are all flat sequences of optional-or-not fields.

use crate::element::{Body, Element};
use crate::tag::TagClass;
use crate::Error;

/// Whether a context-tagged field wraps its content in an extra TLV
/// (EXPLICIT, the X.509 default) or reuses the inner type's tag slot
/// (IMPLICIT).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tagging {
	Explicit,
	Implicit,
}

/// A read-only walk over the direct children of a SEQUENCE or SET element.
pub struct Cursor<'a> {
	children: &'a [Element],
	pos: usize,
}

impl<'a> Cursor<'a> {
	pub fn new(container: &'a Element) -> Result<Self, Error> {
		let children = container.as_children().ok_or(Error::Parse("expected a constructed element"))?;
		Ok(Cursor { children, pos: 0 })
	}

	pub fn from_children(children: &'a [Element]) -> Self {
		Cursor { children, pos: 0 }
	}

	pub fn remaining(&self) -> &'a [Element] {
		&self.children[self.pos..]
	}

	pub fn is_empty(&self) -> bool {
		self.pos >= self.children.len()
	}

	fn peek(&self) -> Option<&'a Element> {
		self.children.get(self.pos)
	}

	/// Consume and return the next mandatory element, regardless of tag.
	pub fn next(&mut self) -> Result<&'a Element, Error> {
		let el = self.peek().ok_or(Error::SchemaMismatch("expected another field, found none".into()))?;
		self.pos += 1;
        Ok(el)
	}

	/// Consume and return the next element, requiring it to be the given
	/// UNIVERSAL tag.
	pub fn next_universal(&mut self, tag: u32) -> Result<&'a Element, Error> {
		let el = self.next()?;
		if !el.is_universal(tag) {
			return Err(Error::SchemaMismatch(format!("expected universal tag {}, found {:?}/{}", tag, el.class, el.tag)));
		}
		Ok(el)
	}

	/// If the next element carries context-specific tag `number`, consume and
	/// return its payload element (unwrapped per `tagging`); otherwise leave
	/// the cursor untouched and return `None`. This is how OPTIONAL and
	/// DEFAULT fields are matched against the children of a SEQUENCE.
	pub fn next_optional_context(&mut self, number: u32, tagging: Tagging) -> Result<Option<&'a Element>, Error> {
		match self.peek() {
			Some(el) if el.class == TagClass::ContextSpecific && el.tag == number => {
				self.pos += 1;
				match tagging {
					Tagging::Explicit => {
						let inner = el
							.as_children()
							.and_then(|c| c.first())
							.ok_or(Error::SchemaMismatch("EXPLICIT tag has no inner element".into()))?;
						Ok(Some(inner))
					}
					Tagging::Implicit => Ok(Some(el)),
				}
			}
			_ => Ok(None),
		}
	}

	/// Like [`next_optional_context`] but errors if the field is absent.
	pub fn next_required_context(&mut self, number: u32, tagging: Tagging) -> Result<&'a Element, Error> {
		self.next_optional_context(number, tagging)?
			.ok_or_else(|| Error::SchemaMismatch(format!("missing required [{}] field", number)))
	}

	/// Consume a SEQUENCE OF / SET OF: the next element's children, decoded
	/// as a flat list with no further tag checking (the caller interprets
	/// each member).
	pub fn next_collection(&mut self) -> Result<&'a [Element], Error> {
		let el = self.next()?;
		el.as_children().ok_or(Error::SchemaMismatch("expected SEQUENCE OF / SET OF".into()))
	}

	/// A DEFAULT boolean field encoded only when it differs from its
	/// default (X.690 §11.5): absent means the default applies.
	pub fn next_default_bool(&mut self, default: bool) -> Result<bool, Error> {
		match self.peek() {
			Some(el) if el.is_universal(crate::tag::universal::BOOLEAN) => {
				self.pos += 1;
				crate::value::decode_boolean(el)
			}
			_ => Ok(default),
		}
	}
}

/// Unwrap a single level of EXPLICIT context tagging, returning the one
/// child it must contain.
pub fn unwrap_explicit(el: &Element) -> Result<&Element, Error> {
	match &el.body {
		Body::Constructed(children) if children.len() == 1 => Ok(&children[0]),
		Body::Constructed(_) => Err(Error::SchemaMismatch("EXPLICIT wrapper must contain exactly one element".into())),
		_ => Err(Error::SchemaMismatch("EXPLICIT wrapper must be constructed".into())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::element::{decode_der, encode_tlv};
	use crate::tag::universal;

	fn int(n: u8) -> Vec<u8> {
		encode_tlv(TagClass::Universal, universal::INTEGER, false, &[n])
	}

	#[test]
	fn cursor_reads_mandatory_then_optional_then_default() {
		let version = encode_tlv(TagClass::ContextSpecific, 0, true, &int(2));
		let serial = int(7);
		let present_flag = encode_tlv(TagClass::ContextSpecific, 1, false, &[0xAA]);
		let seq = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[version, serial, present_flag].concat());
		let (el, _) = decode_der(&seq).unwrap();
		let mut cur = Cursor::new(&el).unwrap();

		let v = cur.next_required_context(0, Tagging::Explicit).unwrap();
		assert_eq!(v.as_primitive().unwrap(), &[2]);

		let serial_el = cur.next_universal(universal::INTEGER).unwrap();
		assert_eq!(serial_el.as_primitive().unwrap(), &[7]);

		let tag1 = cur.next_optional_context(1, Tagging::Implicit).unwrap();
		assert!(tag1.is_some());
		let tag2 = cur.next_optional_context(2, Tagging::Implicit).unwrap();
		assert!(tag2.is_none());
		assert!(cur.is_empty());
	}

	#[test]
	fn default_bool_absent_uses_default() {
		let seq = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &int(3));
		let (el, _) = decode_der(&seq).unwrap();
		let mut cur = Cursor::new(&el).unwrap();
		assert_eq!(cur.next_default_bool(false).unwrap(), false);
		cur.next().unwrap();
	}

	#[test]
	fn missing_required_context_is_an_error() {
		let seq = encode_tlv(TagClass::Universal, universal::SEQUENCE, true, &[]);
		let (el, _) = decode_der(&seq).unwrap();
		let mut cur = Cursor::new(&el).unwrap();
		assert!(cur.next_required_context(0, Tagging::Explicit).is_err());
	}
}
