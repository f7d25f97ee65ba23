//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use crate::{
	error::{EncodeError, EncodeResult},
	mode::AddressingMode,
	operand::{Operand, ResolvedOperand},
	output::Emit,
	table::{Family, InstructionDescriptor},
};

/// Branches are always opcode + displacement.
pub const BRANCH_LEN: u16 = 2;

const WORD_VARIANT: u8 = 4;

/// Immediate loads sit this far below the byte absolute opcode.
const IMMEDIATE_BELOW_ABSOLUTE: u8 = 8;

/// Opcodes of the arithmetic family, one row per mnemonic.
///
/// Columns: byte immediate, word immediate, byte/byte, word/word, word/byte,
/// word with 8-bit immediate.
const ARITHMETIC: [[Option<u8>; 6]; 7] = [
	// ADC
	[Some(0x70), None, Some(0x50), Some(0x58), Some(0x60), Some(0x8c)],
	// SBC
	[Some(0x74), None, Some(0x51), Some(0x59), Some(0x61), Some(0x90)],
	// AND
	[Some(0x78), Some(0x94), Some(0x52), Some(0x5a), None, None],
	// BIT
	[Some(0x7c), Some(0x98), Some(0x53), Some(0x5b), None, None],
	// CMP
	[Some(0x80), Some(0x9c), Some(0x54), Some(0x5c), None, None],
	// OR
	[Some(0x84), Some(0xa0), Some(0x55), Some(0x5d), None, None],
	// XOR
	[Some(0x88), Some(0xa4), Some(0x56), Some(0x5e), None, None],
];

fn arithmetic_column(mode: AddressingMode) -> Option<usize> {
	Some(match mode {
		AddressingMode::RegisterByteImmediate => 0,
		AddressingMode::RegisterWordImmediate => 1,
		AddressingMode::RegisterByteRegisterByte => 2,
		AddressingMode::RegisterWordRegisterWord => 3,
		AddressingMode::RegisterWordRegisterByte => 4,
		AddressingMode::RegisterWordImmediateByte => 5,
		_ => return None,
	})
}

/// Packs two register fields into the byte that follows the opcode.
fn pack(high: u8, low: u8) -> u8 {
	high << 4 | low
}

struct Encoder<'a> {
	descriptor: &'a InstructionDescriptor,
	operand: &'a ResolvedOperand,
}

impl<'a> Encoder<'a> {
	fn illegal(&self) -> EncodeError {
		EncodeError::IllegalAddressingMode {
			mnemonic: self.descriptor.mnemonic(),
		}
	}

	fn first(&self) -> EncodeResult<&'a Operand> {
		self.operand.first.as_ref().ok_or(EncodeError::MissingOperand {
			mnemonic: self.descriptor.mnemonic(),
		})
	}

	fn second(&self) -> EncodeResult<&'a Operand> {
		self.operand.second.as_ref().ok_or(EncodeError::MissingOperand {
			mnemonic: self.descriptor.mnemonic(),
		})
	}

	fn implicit(&self, out: &mut dyn Emit) -> EncodeResult<()> {
		out.put_opcode(self.operand.base);
		Ok(())
	}

	fn jump(&self, out: &mut dyn Emit) -> EncodeResult<()> {
		match self.operand.mode {
			AddressingMode::Absolute => {
				out.put_opcode_word(self.operand.base, &self.first()?.expression())
			},
			AddressingMode::Indexed => {
				let pointer = self.first()?.word_register()?;
				out.put_opcode(self.operand.extension | pointer.wire());
			},
			_ => return Err(self.illegal()),
		}
		Ok(())
	}

	fn single_register(&self, out: &mut dyn Emit) -> EncodeResult<()> {
		let register = self.first()?;
		let opcode = match self.operand.mode {
			AddressingMode::RegisterByte => self.operand.base | register.byte_register()?.wire(),
			AddressingMode::RegisterWord => {
				self.operand.extension | register.word_register()?.wire()
			},
			_ => return Err(self.illegal()),
		};

		out.put_opcode(opcode);
		Ok(())
	}

	fn arithmetic(&self, out: &mut dyn Emit) -> EncodeResult<()> {
		let opcode = arithmetic_column(self.operand.mode)
			.zip(ARITHMETIC.get(self.operand.extension as usize))
			.and_then(|(column, row)| row[column])
			.ok_or_else(|| self.illegal())?;
		let destination = self.first()?;
		let source = self.second()?;

		match self.operand.mode {
			AddressingMode::RegisterByteImmediate => {
				let register = destination.byte_register()?;
				out.put_opcode_byte(opcode | register.wire(), &source.expression());
			},
			AddressingMode::RegisterWordImmediate => {
				let register = destination.word_register()?;
				out.put_opcode_word(opcode | register.wire(), &source.expression());
			},
			AddressingMode::RegisterWordImmediateByte => {
				let register = destination.word_register()?;
				out.put_opcode_byte(opcode | register.wire(), &source.expression());
			},
			// the opcode goes out before the source register is checked
			AddressingMode::RegisterByteRegisterByte => {
				let destination = destination.byte_register()?;
				out.put_opcode(opcode);
				let source = source.byte_register()?;
				out.put_opcode(pack(destination.wire(), source.wire()));
			},
			AddressingMode::RegisterWordRegisterWord => {
				let destination = destination.word_register()?;
				out.put_opcode(opcode);
				let source = source.word_register()?;
				out.put_opcode(pack(destination.wire(), source.wire()));
			},
			AddressingMode::RegisterWordRegisterByte => {
				let destination = destination.word_register()?;
				out.put_opcode(opcode);
				let source = source.byte_register()?;
				out.put_opcode(pack(destination.wire(), source.wire()));
			},
			_ => return Err(self.illegal()),
		}
		Ok(())
	}

	fn branch(&self, out: &mut dyn Emit) -> EncodeResult<()> {
		let target = self.first()?.expression();

		match self.operand.mode {
			AddressingMode::Relative => {
				out.put_opcode_relative(self.operand.base, &target, BRANCH_LEN)
			},
			AddressingMode::ImmediateByte => out.put_opcode_byte(self.operand.base, &target),
			_ => return Err(self.illegal()),
		}
		Ok(())
	}

	fn flag(&self, out: &mut dyn Emit) -> EncodeResult<()> {
		match self.operand.mode {
			AddressingMode::ImmediateByte => {
				out.put_opcode_byte(self.operand.base, &self.first()?.expression());
				Ok(())
			},
			_ => Err(self.illegal()),
		}
	}

	fn load(&self, out: &mut dyn Emit) -> EncodeResult<()> {
		let immediate = self.operand.base.wrapping_sub(IMMEDIATE_BELOW_ABSOLUTE);

		match self.operand.mode {
			AddressingMode::RegisterByteImmediate => {
				let register = self.first()?.byte_register()?;
				let value = self.second()?.expression();
				out.put_opcode_byte(immediate | register.wire(), &value);
				Ok(())
			},
			AddressingMode::RegisterWordImmediate => {
				let register = self.first()?.word_register()?;
				let value = self.second()?.expression();
				let opcode = immediate.wrapping_add(WORD_VARIANT) | register.wire();
				out.put_opcode_word(opcode, &value);
				Ok(())
			},
			_ => self.memory(out),
		}
	}

	/// Absolute and indexed forms shared by loads and stores.
	fn memory(&self, out: &mut dyn Emit) -> EncodeResult<()> {
		let mode = self.operand.mode;
		let value = self.first()?;
		let address = self.second()?;

		let (register, variant) = if mode.is_word_register() {
			(value.word_register()?.wire(), WORD_VARIANT)
		} else {
			(value.byte_register()?.wire(), 0)
		};

		let step = match mode {
			AddressingMode::RegisterByteAbsolute | AddressingMode::RegisterWordAbsolute => {
				let opcode = self.operand.base.wrapping_add(variant) | register;
				out.put_opcode_word(opcode, &address.expression());
				return Ok(());
			},
			AddressingMode::RegisterByteIndexed | AddressingMode::RegisterWordIndexed => 0,
			AddressingMode::RegisterByteIndexedPostIncrement
			| AddressingMode::RegisterWordIndexedPostIncrement => 1,
			AddressingMode::RegisterBytePreDecrementIndexed
			| AddressingMode::RegisterWordPreDecrementIndexed => 2,
			_ => return Err(self.illegal()),
		};

		out.put_opcode(self.operand.extension.wrapping_add(variant + step));
		let pointer = address.word_register()?;
		out.put_opcode(pack(pointer.wire(), register));
		Ok(())
	}
}

pub(crate) fn encode(
	descriptor: &InstructionDescriptor,
	operand: &ResolvedOperand,
	out: &mut dyn Emit,
) -> EncodeResult<()> {
	let encoder = Encoder {
		descriptor,
		operand,
	};

	match descriptor.family() {
		Family::Implicit => encoder.implicit(out),
		Family::Jump => encoder.jump(out),
		Family::SingleRegister => encoder.single_register(out),
		Family::Arithmetic => encoder.arithmetic(out),
		Family::Branch => encoder.branch(out),
		Family::Flag => encoder.flag(out),
		Family::Load => encoder.load(out),
		Family::Store => encoder.memory(out),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		error::RegisterError,
		expr::{Expression, SymbolTable},
		mode::ModeSet,
		output::CodeBuffer,
		register::{ByteRegister, Half, WordRegister},
		table::{lookup, INSTRUCTIONS},
	};

	#[test]
	fn matrix_agrees_with_legal_modes() {
		for descriptor in INSTRUCTIONS
			.iter()
			.filter(|descriptor| descriptor.family() == Family::Arithmetic)
		{
			let row = ARITHMETIC[descriptor.extension() as usize];
			let from_matrix = AddressingMode::ALL
				.into_iter()
				.filter(|mode| arithmetic_column(*mode).and_then(|column| row[column]).is_some())
				.fold(ModeSet::empty(), |set, mode| set | ModeSet::from(mode));

			assert_eq!(from_matrix, descriptor.modes(), "{}", descriptor.mnemonic());
		}
	}

	#[test]
	fn encodes_from_register_references() {
		let mut buffer = CodeBuffer::default();
		let descriptor = lookup("adc").unwrap();
		let operand = ResolvedOperand {
			mode: AddressingMode::RegisterWordRegisterByte,
			first: Some(WordRegister::R3.into()),
			second: Some(ByteRegister::new(WordRegister::R1, Half::Low).unwrap().into()),
			base: descriptor.base(),
			extension: descriptor.extension(),
		};

		descriptor.encode(&operand, &mut buffer).unwrap();
		assert_eq!(buffer.pending(), &[0x60, 0x32]);
	}

	#[test]
	fn immediate_loads_sit_below_the_absolute_forms() {
		let descriptor = lookup("ld").unwrap();
		let encode_with = |mode, register: Operand| {
			let mut buffer = CodeBuffer::default();
			let operand = ResolvedOperand {
				mode,
				first: Some(register),
				second: Some(Expression::Literal(0).into()),
				base: descriptor.base(),
				extension: descriptor.extension(),
			};
			descriptor.encode(&operand, &mut buffer).unwrap();
			buffer.pending()[0]
		};
		let low = ByteRegister::new(WordRegister::R0, Half::Low).unwrap();

		let byte_absolute = encode_with(AddressingMode::RegisterByteAbsolute, low.into());
		let word_absolute = encode_with(AddressingMode::RegisterWordAbsolute, WordRegister::R0.into());
		let byte_immediate = encode_with(AddressingMode::RegisterByteImmediate, low.into());
		let word_immediate =
			encode_with(AddressingMode::RegisterWordImmediate, WordRegister::R0.into());

		assert_eq!((byte_absolute, word_absolute), (0xc4, 0xc8));
		assert_eq!(byte_immediate, byte_absolute - 8);
		assert_eq!(word_immediate, word_absolute - 8);
		assert_eq!((byte_immediate, word_immediate), (0xbc, 0xc0));
	}

	#[test]
	fn bad_source_register_leaves_the_opcode_behind() {
		let mut buffer = CodeBuffer::default();
		let descriptor = lookup("xor").unwrap();
		let operand = ResolvedOperand {
			mode: AddressingMode::RegisterByteRegisterByte,
			first: Some(Expression::Literal(0).into()),
			second: Some(Expression::Literal(3).into()),
			base: descriptor.base(),
			extension: descriptor.extension(),
		};

		let error = descriptor.encode(&operand, &mut buffer).unwrap_err();
		assert_eq!(
			error,
			EncodeError::InvalidRegisterConstant(RegisterError::NoByteHalves(3))
		);
		assert_eq!(buffer.pending(), &[0x56]);
	}

	#[test]
	fn bad_destination_register_emits_nothing() {
		let mut buffer = CodeBuffer::default();
		let descriptor = lookup("cmp").unwrap();
		let operand = ResolvedOperand {
			mode: AddressingMode::RegisterWordRegisterWord,
			first: Some(Expression::Symbol("later".into()).into()),
			second: Some(Expression::Literal(1).into()),
			base: descriptor.base(),
			extension: descriptor.extension(),
		};

		let error = descriptor.encode(&operand, &mut buffer).unwrap_err();
		assert_eq!(
			error,
			EncodeError::InvalidRegisterConstant(RegisterError::NotConstant)
		);
		assert!(buffer.pending().is_empty());
	}

	#[test]
	fn missing_operands_are_reported() {
		let mut buffer = CodeBuffer::default();
		let descriptor = lookup("jmp").unwrap();
		let operand = ResolvedOperand::new(AddressingMode::Absolute, None, None);

		assert_eq!(
			descriptor.encode(&operand, &mut buffer),
			Err(EncodeError::MissingOperand { mnemonic: "JMP" })
		);
	}

	#[test]
	fn branch_displacement_is_left_to_the_emitter() {
		let mut buffer = CodeBuffer::new(crate::output::Address::new(0x300));
		let descriptor = lookup("bne").unwrap();
		let operand = ResolvedOperand {
			mode: AddressingMode::Relative,
			first: Some(Expression::Literal(0x300 + 0x90).into()),
			second: None,
			base: descriptor.base(),
			extension: descriptor.extension(),
		};

		descriptor.encode(&operand, &mut buffer).unwrap();
		assert_eq!(buffer.pending(), &[0xaa, 0x00]);
		assert!(buffer.resolve(&SymbolTable::new()).is_err());
	}
}
