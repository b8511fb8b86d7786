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

//! ASN.1 tag classes and the universal tag numbers the codec understands.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagClass {
	Universal,
	Application,
	ContextSpecific,
	Private,
}

impl TagClass {
	pub fn from_bits(bits: u8) -> Self {
		match bits {
			0b00 => TagClass::Universal,
			0b01 => TagClass::Application,
			0b10 => TagClass::ContextSpecific,
			_ => TagClass::Private,
		}
	}

	pub fn to_bits(self) -> u8 {
		match self {
			TagClass::Universal => 0b00,
			TagClass::Application => 0b01,
			TagClass::ContextSpecific => 0b10,
			TagClass::Private => 0b11,
		}
	}
}

pub mod universal {
	pub const BOOLEAN: u32 = 1;
	pub const INTEGER: u32 = 2;
	pub const BIT_STRING: u32 = 3;
	pub const OCTET_STRING: u32 = 4;
	pub const NULL: u32 = 5;
	pub const OBJECT_IDENTIFIER: u32 = 6;
	pub const ENUMERATED: u32 = 10;
	pub const UTF8_STRING: u32 = 12;
	pub const SEQUENCE: u32 = 16;
	pub const SET: u32 = 17;
	pub const PRINTABLE_STRING: u32 = 19;
	pub const IA5_STRING: u32 = 22;
	pub const UTC_TIME: u32 = 23;
	pub const GENERALIZED_TIME: u32 = 24;
	pub const BMP_STRING: u32 = 30;
}
