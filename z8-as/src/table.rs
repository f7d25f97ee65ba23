//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use tracing::trace;
use z8_as_proc_macro::instruction_table;

use crate::{
	config::Config,
	encode,
	error::{EncodeError, EncodeResult},
	expr::ExpressionServices,
	mode::{AddressingMode, ModeSet},
	operand::{self, ResolvedOperand},
	output::Emit,
	scanner::Cursor,
};

/// Selects the emission strategy of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
	Implicit,
	Jump,
	SingleRegister,
	Arithmetic,
	Branch,
	Flag,
	Load,
	Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionDescriptor {
	mnemonic: &'static str,
	modes: ModeSet,
	base: u8,
	extension: u8,
	family: Family,
}

// Single register ops: base is the byte form, extension the word form.
// Arithmetic: extension is the row in the arithmetic opcode matrix.
// Jumps: base is absolute, extension indexed.
// Load/store: base is byte absolute, extension byte indexed. Immediate loads
// are 8 below base.
instruction_table! {
	ADC: RegisterByteImmediate | RegisterByteRegisterByte | RegisterWordRegisterWord
		| RegisterWordRegisterByte | RegisterWordImmediateByte, 0x00, 0 => Arithmetic;
	AND: RegisterByteImmediate | RegisterWordImmediate | RegisterByteRegisterByte
		| RegisterWordRegisterWord, 0x00, 2 => Arithmetic;
	ASL: RegisterByte | RegisterWord, 0x20, 0x24 => SingleRegister;
	BCC: Relative | ImmediateByte, 0xa8, 0 => Branch;
	BCS: Relative | ImmediateByte, 0xa9, 0 => Branch;
	BEQ: Relative | ImmediateByte, 0xab, 0 => Branch;
	BIT: RegisterByteImmediate | RegisterWordImmediate | RegisterByteRegisterByte
		| RegisterWordRegisterWord, 0x00, 3 => Arithmetic;
	BMI: Relative | ImmediateByte, 0xac, 0 => Branch;
	BNE: Relative | ImmediateByte, 0xaa, 0 => Branch;
	BPL: Relative | ImmediateByte, 0xad, 0 => Branch;
	BRK: Implicit, 0x00, 0 => Implicit;
	CLF: ImmediateByte, 0x0e, 0 => Flag;
	CMP: RegisterByteImmediate | RegisterWordImmediate | RegisterByteRegisterByte
		| RegisterWordRegisterWord, 0x00, 4 => Arithmetic;
	DEC: RegisterByte | RegisterWord, 0x18, 0x1c => SingleRegister;
	HLT: Implicit, 0x02, 0 => Implicit;
	INC: RegisterByte | RegisterWord, 0x10, 0x14 => SingleRegister;
	JMP: Absolute | Indexed, 0x0c, 0x04 => Jump;
	JSR: Absolute | Indexed, 0x0d, 0x08 => Jump;
	LD: RegisterByteAbsolute | RegisterWordAbsolute | RegisterByteImmediate | RegisterWordImmediate
		| RegisterByteIndexed | RegisterByteIndexedPostIncrement | RegisterBytePreDecrementIndexed
		| RegisterWordIndexed | RegisterWordIndexedPostIncrement | RegisterWordPreDecrementIndexed,
		0xc4, 0xd4 => Load;
	LSR: RegisterByte | RegisterWord, 0x28, 0x2c => SingleRegister;
	NOP: Implicit, 0x01, 0 => Implicit;
	OR: RegisterByteImmediate | RegisterWordImmediate | RegisterByteRegisterByte
		| RegisterWordRegisterWord, 0x00, 5 => Arithmetic;
	PLL: RegisterByte | RegisterWord, 0x48, 0x4c => SingleRegister;
	PSH: RegisterByte | RegisterWord, 0x40, 0x44 => SingleRegister;
	ROL: RegisterByte | RegisterWord, 0x30, 0x34 => SingleRegister;
	ROR: RegisterByte | RegisterWord, 0x38, 0x3c => SingleRegister;
	RTS: Implicit, 0x03, 0 => Implicit;
	SBC: RegisterByteImmediate | RegisterByteRegisterByte | RegisterWordRegisterWord
		| RegisterWordRegisterByte | RegisterWordImmediateByte, 0x00, 1 => Arithmetic;
	ST: RegisterByteAbsolute | RegisterWordAbsolute
		| RegisterByteIndexed | RegisterByteIndexedPostIncrement | RegisterBytePreDecrementIndexed
		| RegisterWordIndexed | RegisterWordIndexedPostIncrement | RegisterWordPreDecrementIndexed,
		0xcc, 0xdc => Store;
	STF: ImmediateByte, 0x0f, 0 => Flag;
	XOR: RegisterByteImmediate | RegisterWordImmediate | RegisterByteRegisterByte
		| RegisterWordRegisterWord, 0x00, 6 => Arithmetic;
}

/// Finds a mnemonic, ignoring case.
pub fn lookup(mnemonic: &str) -> Option<&'static InstructionDescriptor> {
	let mnemonic = mnemonic.to_ascii_uppercase();

	INSTRUCTIONS
		.binary_search_by(|descriptor| descriptor.mnemonic.cmp(mnemonic.as_str()))
		.ok()
		.map(|index| &INSTRUCTIONS[index])
}

impl InstructionDescriptor {
	pub fn mnemonic(&self) -> &'static str {
		self.mnemonic
	}

	pub fn modes(&self) -> ModeSet {
		self.modes
	}

	pub fn base(&self) -> u8 {
		self.base
	}

	pub fn extension(&self) -> u8 {
		self.extension
	}

	pub fn family(&self) -> Family {
		self.family
	}

	/// Reads this instruction's operands from `cursor` and emits it.
	pub fn assemble(
		&self,
		cursor: &mut Cursor,
		config: &Config,
		services: &dyn ExpressionServices,
		out: &mut dyn Emit,
	) -> EncodeResult<()> {
		let operand = operand::resolve(self, cursor, config, services)?;
		self.encode(&operand, out)
	}

	/// Emits this instruction from operands that are already resolved.
	pub fn encode(&self, operand: &ResolvedOperand, out: &mut dyn Emit) -> EncodeResult<()> {
		trace!(
			mnemonic = self.mnemonic,
			mode = %operand.mode,
			address = %out.address(),
			"encoding"
		);

		encode::encode(self, operand, out)
	}
}

/// Emits `mnemonic` from an operand record built by another stage.
///
/// The base and extension opcodes of `operand` are overwritten with the
/// table's, and its expressions are simplified first.
pub fn synthesize(
	mnemonic: &str,
	operand: ResolvedOperand,
	services: &dyn ExpressionServices,
	out: &mut dyn Emit,
) -> EncodeResult<()> {
	let descriptor =
		lookup(mnemonic).ok_or_else(|| EncodeError::UnknownMnemonic(mnemonic.into()))?;

	if !descriptor.modes.has(operand.mode) {
		return Err(EncodeError::IllegalAddressingMode {
			mnemonic: descriptor.mnemonic,
		});
	}

	let operand = ResolvedOperand {
		mode: operand.mode,
		first: operand.first.map(|operand| operand.simplify(services)),
		second: operand.second.map(|operand| operand.simplify(services)),
		base: descriptor.base,
		extension: descriptor.extension,
	};

	descriptor.encode(&operand, out)
}
