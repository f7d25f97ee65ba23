//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use std::{fmt::Display, fs::File, io, mem, path::Path};

use auto_ops::*;
use byteorder::{ByteOrder, LittleEndian};
use positioned_io::WriteAt;
use tracing::{debug, trace};

use crate::{
	error::{AssembleError, Diagnostic, FixupError},
	expr::{Expression, SymbolTable},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u16);

impl Address {
	pub const fn new(value: u16) -> Self {
		Self(value)
	}

	pub const fn value(self) -> u16 {
		self.0
	}
}

#[rustfmt::skip]
impl_op_ex!(+ |address: &Address, offset: &u16| -> Address { Address::new(address.0.wrapping_add(*offset)) });
impl_op_ex!(+= |address: &mut Address, offset: &u16| { *address = *address + offset; });
impl_op_ex!(- |lhs: &Address, rhs: &Address| -> i64 { lhs.0 as i64 - rhs.0 as i64 });

impl From<u16> for Address {
	fn from(value: u16) -> Self {
		Self::new(value)
	}
}

impl Display for Address {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "${:04X}", self.0)
	}
}

/// Where encoded instructions go.
///
/// Operand expressions are handed over as-is; range checks and little-endian
/// layout are the emitter's business, as is computing branch displacements.
pub trait Emit {
	/// Address the next byte will be placed at.
	fn address(&self) -> Address;

	fn put_opcode(&mut self, opcode: u8);

	fn put_opcode_byte(&mut self, opcode: u8, operand: &Expression);

	fn put_opcode_word(&mut self, opcode: u8, operand: &Expression);

	/// Emits `opcode` followed by `target - (start + instruction_len)` as a
	/// signed byte, where `start` is the address of the opcode.
	fn put_opcode_relative(&mut self, opcode: u8, target: &Expression, instruction_len: u16);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
	origin: Address,
	bytes: Vec<u8>,
}

impl Chunk {
	fn new(origin: Address) -> Self {
		Self {
			origin,
			bytes: Vec::new(),
		}
	}

	pub fn origin(&self) -> Address {
		self.origin
	}

	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixupKind {
	Byte,
	Word,
	Relative { from: Address },
}

#[derive(Debug, Clone)]
struct Fixup {
	chunk: usize,
	offset: usize,
	kind: FixupKind,
	expression: Expression,
	line: usize,
}

impl FixupKind {
	fn width(self) -> usize {
		match self {
			Self::Word => 2,
			_ => 1,
		}
	}
}

fn check_range(value: i64, bits: u32) -> Result<(), FixupError> {
	let min = -(1i64 << (bits - 1));
	let max = (1i64 << bits) - 1;

	if (min..=max).contains(&value) {
		Ok(())
	} else {
		Err(FixupError::ValueOutOfRange { value, bits })
	}
}

impl Fixup {
	fn apply(&self, bytes: &mut [u8], symbols: &SymbolTable) -> Result<(), FixupError> {
		let value = self.expression.evaluate(symbols)?;
		trace!(line = self.line, expression = %self.expression, value, "fixup");

		match self.kind {
			FixupKind::Byte => {
				check_range(value, 8)?;
				bytes[self.offset] = value as u8;
			},
			FixupKind::Word => {
				check_range(value, 16)?;
				LittleEndian::write_u16(&mut bytes[self.offset..self.offset + 2], value as u16);
			},
			FixupKind::Relative { from } => {
				let displacement = value - from.value() as i64;
				if !(-128..=127).contains(&displacement) {
					return Err(FixupError::BranchOutOfRange(displacement));
				}
				bytes[self.offset] = displacement as u8;
			},
		}

		Ok(())
	}
}

/// One past the last addressable byte.
const ADDRESS_SPACE: usize = 0x1_0000;

/// Append-only output with deferred operand patching.
#[derive(Debug, Clone)]
pub struct CodeBuffer {
	finished: Vec<Chunk>,
	current: Chunk,
	fixups: Vec<Fixup>,
	line: usize,
	// lines where a chunk first ran past $FFFF
	overflows: Vec<usize>,
}

impl Default for CodeBuffer {
	fn default() -> Self {
		Self::new(Address::default())
	}
}

impl CodeBuffer {
	pub fn new(origin: Address) -> Self {
		Self {
			finished: Vec::new(),
			current: Chunk::new(origin),
			fixups: Vec::new(),
			line: 0,
			overflows: Vec::new(),
		}
	}

	/// Source line that fixups recorded from now on are reported against.
	pub fn set_line(&mut self, line: usize) {
		self.line = line;
	}

	pub fn set_origin(&mut self, origin: Address) {
		debug!(%origin, "origin");

		if self.current.bytes.is_empty() {
			self.current.origin = origin;
		} else {
			let done = mem::replace(&mut self.current, Chunk::new(origin));
			self.finished.push(done);
		}
	}

	/// Bytes of the chunk being filled, with unresolved operands still zero.
	pub fn pending(&self) -> &[u8] {
		&self.current.bytes
	}

	pub fn put_data_byte(&mut self, value: &Expression) {
		self.record(FixupKind::Byte, value);
	}

	pub fn put_data_word(&mut self, value: &Expression) {
		self.record(FixupKind::Word, value);
	}

	fn record(&mut self, kind: FixupKind, expression: &Expression) {
		self.fixups.push(Fixup {
			chunk: self.finished.len(),
			offset: self.current.bytes.len(),
			kind,
			expression: expression.clone(),
			line: self.line,
		});
		self.extend(&[0; 2][..kind.width()]);
	}

	fn extend(&mut self, bytes: &[u8]) {
		let end = self.current.origin.value() as usize + self.current.bytes.len();
		if end <= ADDRESS_SPACE && end + bytes.len() > ADDRESS_SPACE {
			self.overflows.push(self.line);
		}

		self.current.bytes.extend_from_slice(bytes);
	}

	/// Patches every recorded operand now that all symbols are known.
	pub fn resolve(self, symbols: &SymbolTable) -> Result<Program, Vec<Diagnostic>> {
		let mut chunks = self.finished;
		chunks.push(self.current);

		let mut diagnostics: Vec<_> = self
			.overflows
			.iter()
			.map(|&line| Diagnostic {
				line,
				error: AssembleError::AddressOverflow,
			})
			.collect();

		for fixup in &self.fixups {
			if let Err(error) = fixup.apply(&mut chunks[fixup.chunk].bytes, symbols) {
				diagnostics.push(Diagnostic {
					line: fixup.line,
					error: error.into(),
				});
			}
		}

		if !diagnostics.is_empty() {
			diagnostics.sort_by_key(|diagnostic| diagnostic.line);
			return Err(diagnostics);
		}

		chunks.retain(|chunk| !chunk.bytes.is_empty());
		Ok(Program { chunks })
	}
}

impl Emit for CodeBuffer {
	fn address(&self) -> Address {
		self.current.origin + self.current.bytes.len() as u16
	}

	fn put_opcode(&mut self, opcode: u8) {
		self.extend(&[opcode]);
	}

	fn put_opcode_byte(&mut self, opcode: u8, operand: &Expression) {
		self.put_opcode(opcode);
		self.record(FixupKind::Byte, operand);
	}

	fn put_opcode_word(&mut self, opcode: u8, operand: &Expression) {
		self.put_opcode(opcode);
		self.record(FixupKind::Word, operand);
	}

	fn put_opcode_relative(&mut self, opcode: u8, target: &Expression, instruction_len: u16) {
		let from = self.address() + instruction_len;
		self.put_opcode(opcode);
		self.record(FixupKind::Relative { from }, target);
	}
}

/// A fully resolved memory image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
	chunks: Vec<Chunk>,
}

impl Program {
	pub fn chunks(&self) -> &[Chunk] {
		&self.chunks
	}

	/// The lowest address anything was assembled at.
	pub fn base(&self) -> Option<Address> {
		self.chunks.iter().map(Chunk::origin).min()
	}

	/// Flat image starting at [`Program::base`], gaps filled with zeros.
	pub fn image(&self) -> Vec<u8> {
		let Some(base) = self.base() else {
			return Vec::new();
		};

		let mut image = Vec::new();
		for chunk in &self.chunks {
			let start = (chunk.origin - base) as usize;
			let end = start + chunk.bytes.len();
			if image.len() < end {
				image.resize(end, 0);
			}
			image[start..end].copy_from_slice(&chunk.bytes);
		}
		image
	}

	pub fn write_to<W: WriteAt>(&self, output: &mut W) -> io::Result<()> {
		let Some(base) = self.base() else {
			return Ok(());
		};

		for chunk in &self.chunks {
			output.write_all_at((chunk.origin - base) as u64, &chunk.bytes)?;
		}
		Ok(())
	}

	pub fn write_file(&self, path: &Path) -> io::Result<()> {
		let mut file = File::create(path)?;
		self.write_to(&mut file)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn symbol(name: &str) -> Expression {
		Expression::Symbol(name.into())
	}

	#[test]
	fn words_are_little_endian() {
		let mut buffer = CodeBuffer::default();
		buffer.put_opcode_word(0xc8, &Expression::Literal(0x1234));

		let program = buffer.resolve(&SymbolTable::new()).unwrap();
		assert_eq!(program.image(), vec![0xc8, 0x34, 0x12]);
	}

	#[test]
	fn forward_references_are_patched() {
		let mut buffer = CodeBuffer::new(Address::new(0x100));
		buffer.put_opcode_word(0x0c, &symbol("target"));
		assert_eq!(buffer.pending(), &[0x0c, 0, 0]);

		let mut symbols = SymbolTable::new();
		symbols.define("target", 0x0150).unwrap();

		let program = buffer.resolve(&symbols).unwrap();
		assert_eq!(program.base(), Some(Address::new(0x100)));
		assert_eq!(program.image(), vec![0x0c, 0x50, 0x01]);
	}

	#[test]
	fn relative_displacement_counts_from_instruction_end() {
		let mut buffer = CodeBuffer::new(Address::new(0x10));
		buffer.put_opcode_relative(0xab, &Expression::Literal(0x10), 2);
		buffer.put_opcode_relative(0xab, &Expression::Literal(0x20), 2);

		let program = buffer.resolve(&SymbolTable::new()).unwrap();
		assert_eq!(program.image(), vec![0xab, 0xfe, 0xab, 0x0c]);
	}

	#[test]
	fn out_of_range_values_are_reported_with_their_line() {
		let mut buffer = CodeBuffer::default();
		buffer.set_line(3);
		buffer.put_opcode_byte(0x78, &Expression::Literal(0x100));
		buffer.set_line(4);
		buffer.put_opcode_relative(0xa8, &Expression::Literal(0x200), 2);

		let diagnostics = buffer.resolve(&SymbolTable::new()).unwrap_err();
		assert_eq!(
			diagnostics,
			vec![
				Diagnostic {
					line: 3,
					error: AssembleError::Fixup(FixupError::ValueOutOfRange {
						value: 0x100,
						bits: 8
					}),
				},
				Diagnostic {
					line: 4,
					error: AssembleError::Fixup(FixupError::BranchOutOfRange(0x200 - 4)),
				},
			]
		);
	}

	#[test]
	fn undefined_symbols_fail_resolution() {
		let mut buffer = CodeBuffer::default();
		buffer.put_data_word(&symbol("nowhere"));

		let diagnostics = buffer.resolve(&SymbolTable::new()).unwrap_err();
		assert_eq!(
			diagnostics[0].error,
			AssembleError::Fixup(FixupError::UndefinedSymbol("nowhere".into()))
		);
	}

	#[test]
	fn running_past_the_address_space_is_reported_once() {
		let mut buffer = CodeBuffer::new(Address::new(0xfffe));
		buffer.set_line(1);
		buffer.put_opcode(0x01);
		buffer.set_line(2);
		buffer.put_opcode_word(0x0c, &Expression::Literal(0));
		buffer.set_line(3);
		buffer.put_opcode(0x03);

		let diagnostics = buffer.resolve(&SymbolTable::new()).unwrap_err();
		assert_eq!(
			diagnostics,
			vec![Diagnostic {
				line: 2,
				error: AssembleError::AddressOverflow,
			}]
		);
	}

	#[test]
	fn filling_the_last_byte_is_fine() {
		let mut buffer = CodeBuffer::new(Address::new(0xfffd));
		buffer.put_opcode_word(0x0c, &Expression::Literal(0xfffd));

		let program = buffer.resolve(&SymbolTable::new()).unwrap();
		assert_eq!(program.image(), vec![0x0c, 0xfd, 0xff]);
	}

	#[test]
	fn chunks_are_laid_out_from_the_lowest_origin() {
		let mut buffer = CodeBuffer::new(Address::new(0x8004));
		buffer.put_opcode(0x01);
		buffer.set_origin(Address::new(0x8000));
		buffer.put_opcode(0x03);

		let program = buffer.resolve(&SymbolTable::new()).unwrap();
		assert_eq!(program.chunks().len(), 2);
		assert_eq!(program.image(), vec![0x03, 0, 0, 0, 0x01]);
	}
}
