//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use std::fmt::Display;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::RegisterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum WordRegister {
	R0 = 0,
	R1 = 1,
	R2 = 2,
	R3 = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Half {
	Low = 0,
	High = 1,
}

/// One 8-bit half of word register 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRegister {
	word: WordRegister,
	half: Half,
}

impl WordRegister {
	pub fn from_constant(value: i64) -> Result<Self, RegisterError> {
		u8::try_from(value)
			.ok()
			.and_then(|value| Self::try_from(value).ok())
			.ok_or(RegisterError::NotWordRegister(value))
	}

	/// The two-bit field this register occupies in an instruction.
	pub fn wire(self) -> u8 {
		self.into()
	}
}

impl ByteRegister {
	/// Parse-time tags keep the half in bit 2 and the word register in bits 0-1.
	pub const HIGH_TAG: i64 = 4;

	pub fn new(word: WordRegister, half: Half) -> Result<Self, RegisterError> {
		match word {
			WordRegister::R0 | WordRegister::R1 => Ok(Self { word, half }),
			_ => Err(RegisterError::NoByteHalves(word.wire() as i64)),
		}
	}

	pub fn from_tag(tag: i64) -> Result<Self, RegisterError> {
		if !(0..8).contains(&tag) {
			return Err(RegisterError::NotByteRegister(tag));
		}

		let word = WordRegister::from_constant(tag & 3)?;
		let half = if tag & Self::HIGH_TAG != 0 {
			Half::High
		} else {
			Half::Low
		};

		Self::new(word, half)
	}

	pub fn word(self) -> WordRegister {
		self.word
	}

	pub fn half(self) -> Half {
		self.half
	}

	pub fn tag(self) -> i64 {
		let half: u8 = self.half.into();
		(half as i64) << 2 | self.word.wire() as i64
	}

	/// The two-bit field: word register in bit 1, half in bit 0.
	pub fn wire(self) -> u8 {
		let half: u8 = self.half.into();
		(self.word.wire() & 1) << 1 | half
	}

	pub fn from_wire(wire: u8) -> Result<Self, RegisterError> {
		if wire > 3 {
			return Err(RegisterError::NotByteRegister(wire as i64));
		}

		let word = WordRegister::from_constant((wire >> 1) as i64)?;
		let half = Half::try_from(wire & 1).map_err(|_| RegisterError::NotByteRegister(wire as i64))?;

		Self::new(word, half)
	}
}

impl Display for WordRegister {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "`{}", self.wire())
	}
}

impl Display for ByteRegister {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.half {
			Half::Low => write!(f, "`[{}", self.word.wire()),
			Half::High => write!(f, "`]{}", self.word.wire()),
		}
	}
}
