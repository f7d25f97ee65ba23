//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use std::fmt::Display;

use bitflags::bitflags;
use num_enum::TryFromPrimitive;

/// Every operand shape the Z8 instruction set knows about.
///
/// The discriminant doubles as the bit index of the mode inside a [`ModeSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum AddressingMode {
	Absolute = 0,
	ImmediateByte = 1,
	Relative = 2,
	Implicit = 3,
	Indexed = 4,
	RegisterByte = 5,
	RegisterByteAbsolute = 6,
	RegisterByteImmediate = 7,
	RegisterByteIndexed = 8,
	RegisterByteIndexedPostIncrement = 9,
	RegisterBytePreDecrementIndexed = 10,
	RegisterByteRegisterByte = 11,
	RegisterWord = 12,
	RegisterWordAbsolute = 13,
	RegisterWordImmediate = 14,
	RegisterWordImmediateByte = 15,
	RegisterWordIndexed = 16,
	RegisterWordIndexedPostIncrement = 17,
	RegisterWordPreDecrementIndexed = 18,
	RegisterWordRegisterWord = 19,
	RegisterWordRegisterByte = 20,
}

impl AddressingMode {
	pub const ALL: [AddressingMode; 21] = [
		Self::Absolute,
		Self::ImmediateByte,
		Self::Relative,
		Self::Implicit,
		Self::Indexed,
		Self::RegisterByte,
		Self::RegisterByteAbsolute,
		Self::RegisterByteImmediate,
		Self::RegisterByteIndexed,
		Self::RegisterByteIndexedPostIncrement,
		Self::RegisterBytePreDecrementIndexed,
		Self::RegisterByteRegisterByte,
		Self::RegisterWord,
		Self::RegisterWordAbsolute,
		Self::RegisterWordImmediate,
		Self::RegisterWordImmediateByte,
		Self::RegisterWordIndexed,
		Self::RegisterWordIndexedPostIncrement,
		Self::RegisterWordPreDecrementIndexed,
		Self::RegisterWordRegisterWord,
		Self::RegisterWordRegisterByte,
	];

	pub const fn bit(self) -> u32 {
		1 << (self as u32)
	}

	/// Whether the first operand of this mode names a word register.
	pub const fn is_word_register(self) -> bool {
		matches!(
			self,
			Self::RegisterWord
				| Self::RegisterWordAbsolute
				| Self::RegisterWordImmediate
				| Self::RegisterWordImmediateByte
				| Self::RegisterWordIndexed
				| Self::RegisterWordIndexedPostIncrement
				| Self::RegisterWordPreDecrementIndexed
				| Self::RegisterWordRegisterWord
				| Self::RegisterWordRegisterByte
		)
	}
}

impl Display for AddressingMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct ModeSet: u32 {
		const ABSOLUTE = AddressingMode::Absolute.bit();
		const IMMEDIATE_BYTE = AddressingMode::ImmediateByte.bit();
		const RELATIVE = AddressingMode::Relative.bit();
		const IMPLICIT = AddressingMode::Implicit.bit();
		const INDEXED = AddressingMode::Indexed.bit();
		const REGISTER_BYTE = AddressingMode::RegisterByte.bit();
		const REGISTER_BYTE_ABSOLUTE = AddressingMode::RegisterByteAbsolute.bit();
		const REGISTER_BYTE_IMMEDIATE = AddressingMode::RegisterByteImmediate.bit();
		const REGISTER_BYTE_INDEXED = AddressingMode::RegisterByteIndexed.bit();
		const REGISTER_BYTE_INDEXED_POST_INCREMENT = AddressingMode::RegisterByteIndexedPostIncrement.bit();
		const REGISTER_BYTE_PRE_DECREMENT_INDEXED = AddressingMode::RegisterBytePreDecrementIndexed.bit();
		const REGISTER_BYTE_REGISTER_BYTE = AddressingMode::RegisterByteRegisterByte.bit();
		const REGISTER_WORD = AddressingMode::RegisterWord.bit();
		const REGISTER_WORD_ABSOLUTE = AddressingMode::RegisterWordAbsolute.bit();
		const REGISTER_WORD_IMMEDIATE = AddressingMode::RegisterWordImmediate.bit();
		const REGISTER_WORD_IMMEDIATE_BYTE = AddressingMode::RegisterWordImmediateByte.bit();
		const REGISTER_WORD_INDEXED = AddressingMode::RegisterWordIndexed.bit();
		const REGISTER_WORD_INDEXED_POST_INCREMENT = AddressingMode::RegisterWordIndexedPostIncrement.bit();
		const REGISTER_WORD_PRE_DECREMENT_INDEXED = AddressingMode::RegisterWordPreDecrementIndexed.bit();
		const REGISTER_WORD_REGISTER_WORD = AddressingMode::RegisterWordRegisterWord.bit();
		const REGISTER_WORD_REGISTER_BYTE = AddressingMode::RegisterWordRegisterByte.bit();
	}
}

impl ModeSet {
	/// Builds a set at compile time; used by the generated instruction table.
	pub const fn from_modes(modes: &[AddressingMode]) -> Self {
		let mut bits = 0;
		let mut i = 0;
		while i < modes.len() {
			bits |= modes[i].bit();
			i += 1;
		}
		Self::from_bits_retain(bits)
	}

	pub const fn has(self, mode: AddressingMode) -> bool {
		self.bits() & mode.bit() != 0
	}

	/// The only mode left in the set, if exactly one is.
	pub fn single(self) -> Option<AddressingMode> {
		if self.bits().count_ones() != 1 {
			return None;
		}

		AddressingMode::try_from(self.bits().trailing_zeros() as u8).ok()
	}

	pub fn modes(self) -> impl Iterator<Item = AddressingMode> {
		AddressingMode::ALL
			.into_iter()
			.filter(move |mode| self.has(*mode))
	}
}

impl From<AddressingMode> for ModeSet {
	fn from(mode: AddressingMode) -> Self {
		Self::from_bits_retain(mode.bit())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_mode_has_its_own_bit() {
		let all = ModeSet::from_modes(&AddressingMode::ALL);
		assert_eq!(all, ModeSet::all());
		assert_eq!(all.bits().count_ones(), 21);
	}

	#[test]
	fn single_only_answers_for_one_mode() {
		assert_eq!(ModeSet::empty().single(), None);
		assert_eq!(
			ModeSet::RELATIVE.single(),
			Some(AddressingMode::Relative)
		);
		assert_eq!((ModeSet::ABSOLUTE | ModeSet::RELATIVE).single(), None);
	}

	#[test]
	fn intersection_picks_the_legal_reading() {
		let written = ModeSet::ABSOLUTE | ModeSet::RELATIVE;
		let branch = ModeSet::RELATIVE | ModeSet::IMMEDIATE_BYTE;
		let jump = ModeSet::ABSOLUTE | ModeSet::INDEXED;

		assert_eq!((written & branch).single(), Some(AddressingMode::Relative));
		assert_eq!((written & jump).single(), Some(AddressingMode::Absolute));
		assert!((written & ModeSet::IMPLICIT).is_empty());
	}

	#[test]
	fn modes_iterates_in_declaration_order() {
		let set = ModeSet::REGISTER_WORD | ModeSet::ABSOLUTE | ModeSet::REGISTER_BYTE;
		let modes: Vec<_> = set.modes().collect();
		assert_eq!(
			modes,
			vec![
				AddressingMode::Absolute,
				AddressingMode::RegisterByte,
				AddressingMode::RegisterWord,
			]
		);
	}
}
