//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use tracing::{debug, error};

use crate::{
	config::Config,
	error::{AssembleError, Diagnostic, EncodeError, FixupError},
	expr::{ExpressionServices, SymbolTable},
	output::{Address, CodeBuffer, Emit, Program},
	scanner::{Cursor, Token},
	table,
};

/// Line-at-a-time front end.
///
/// A line is `[label:] [mnemonic operands | directive]` or `name = value`.
/// Errors are recorded and assembly continues with the next line.
#[derive(Debug, Clone)]
pub struct Assembler {
	config: Config,
	symbols: SymbolTable,
	buffer: CodeBuffer,
	diagnostics: Vec<Diagnostic>,
}

impl Assembler {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			symbols: SymbolTable::new(),
			buffer: CodeBuffer::default(),
			diagnostics: Vec::new(),
		}
	}

	/// Predefines a symbol, as if by `name = value`.
	pub fn define(&mut self, name: &str, value: i64) -> Result<(), AssembleError> {
		self.symbols.define(name, value)
	}

	pub fn address(&self) -> Address {
		self.buffer.address()
	}

	pub fn diagnostics(&self) -> &[Diagnostic] {
		&self.diagnostics
	}

	pub fn assemble_line(&mut self, number: usize, text: &str) {
		self.buffer.set_line(number);

		if let Err(error) = self.line(text) {
			error!(line = number, "{}", error);
			self.diagnostics.push(Diagnostic {
				line: number,
				error,
			});
		}
	}

	fn line(&mut self, text: &str) -> Result<(), AssembleError> {
		let mut cursor = Cursor::new(text);

		let Some(mut name) = cursor.identifier() else {
			return Ok(cursor.expect_end()?);
		};

		if cursor.eat(Token::Colon) {
			self.symbols
				.define(name, self.buffer.address().value() as i64)?;

			name = match cursor.identifier() {
				Some(name) => name,
				None => return Ok(cursor.expect_end()?),
			};
		} else if cursor.eat(Token::Equals) {
			let value = self
				.symbols
				.scope(self.buffer.address())
				.constant(&cursor.expression()?)
				.ok_or_else(|| AssembleError::NotConstant(name.into()))?;
			cursor.expect_end()?;

			return self.symbols.define(name, value);
		}

		match name.strip_prefix('.') {
			Some(directive) => self.directive(directive, &mut cursor)?,
			None => self.instruction(name, &mut cursor)?,
		}

		Ok(cursor.expect_end()?)
	}

	fn instruction(&mut self, mnemonic: &str, cursor: &mut Cursor) -> Result<(), EncodeError> {
		let descriptor = table::lookup(mnemonic)
			.ok_or_else(|| EncodeError::UnknownMnemonic(mnemonic.into()))?;
		let scope = self.symbols.scope(self.buffer.address());

		descriptor.assemble(cursor, &self.config, &scope, &mut self.buffer)
	}

	fn directive(&mut self, name: &str, cursor: &mut Cursor) -> Result<(), AssembleError> {
		match name.to_ascii_lowercase().as_str() {
			"org" => {
				let value = self
					.symbols
					.scope(self.buffer.address())
					.constant(&cursor.expression()?)
					.ok_or_else(|| AssembleError::NotConstant(".org".into()))?;
				let origin = u16::try_from(value)
					.map_err(|_| FixupError::ValueOutOfRange { value, bits: 16 })?;

				self.buffer.set_origin(Address::new(origin));
			},
			directive @ ("byte" | "word") => loop {
				let value = self
					.symbols
					.scope(self.buffer.address())
					.simplify(cursor.expression()?);

				if directive == "byte" {
					self.buffer.put_data_byte(&value);
				} else {
					self.buffer.put_data_word(&value);
				}

				if !cursor.eat(Token::Comma) {
					break;
				}
			},
			_ => return Err(AssembleError::UnknownDirective(name.into())),
		}

		Ok(())
	}

	/// Resolves forward references and returns the image, or every error
	/// found along the way ordered by line.
	pub fn finish(self) -> Result<Program, Vec<Diagnostic>> {
		let mut diagnostics = self.diagnostics;

		match self.buffer.resolve(&self.symbols) {
			Ok(program) if diagnostics.is_empty() => {
				debug!(bytes = program.image().len(), "assembled");
				Ok(program)
			},
			Ok(_) => Err(diagnostics),
			Err(fixups) => {
				for diagnostic in &fixups {
					error!(line = diagnostic.line, "{}", diagnostic.error);
				}
				diagnostics.extend(fixups);
				diagnostics.sort_by_key(|diagnostic| diagnostic.line);
				Err(diagnostics)
			},
		}
	}
}

/// Assembles a whole source text.
pub fn assemble(source: &str, config: Config) -> Result<Program, Vec<Diagnostic>> {
	let mut assembler = Assembler::new(config);

	for (index, line) in source.lines().enumerate() {
		assembler.assemble_line(index + 1, line);
	}

	assembler.finish()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{RegisterError, SyntaxError, SyntaxErrorKind};

	fn image(source: &str) -> Vec<u8> {
		assemble(source, Config::default()).unwrap().image()
	}

	fn errors(source: &str) -> Vec<Diagnostic> {
		assemble(source, Config::default()).unwrap_err()
	}

	#[test]
	fn labels_resolve_forwards_and_backwards() {
		let source = "
			.org $200
		start:
			jmp end
			dec `[0
			bne start
		end: rts
		";
		assert_eq!(
			image(source),
			vec![0x0c, 0x06, 0x02, 0x18, 0xaa, 0xfa, 0x03]
		);
	}

	#[test]
	fn constants_name_registers() {
		let source = "
			ptr = 1
			count = ptr - 1
			ld `ptr, #table
			ld `[count, (`ptr++)
			hlt
		table: .byte 1, 2, 'x'
			.word table
		";
		assert_eq!(
			image(source),
			vec![0xc1, 0x06, 0x00, 0xd5, 0x10, 0x02, 0x01, 0x02, b'x', 0x06, 0x00]
		);
	}

	#[test]
	fn label_alone_and_blank_lines() {
		let source = "here:\n\n  ; just a comment\nthere: nop";
		let program = assemble(source, Config::default()).unwrap();
		assert_eq!(program.image(), vec![0x01]);
	}

	#[test]
	fn predefined_symbols() {
		let mut assembler = Assembler::new(Config::default());
		assembler.define("IO", 0xff00).unwrap();
		assembler.assemble_line(1, "st `1, IO");
		assert_eq!(assembler.address(), Address::new(3));
		assert_eq!(assembler.finish().unwrap().image(), vec![0xd1, 0x00, 0xff]);
	}

	#[test]
	fn errors_do_not_stop_assembly() {
		let diagnostics = errors("nop\nfoo `0\ninc `[3\nld\njmp nowhere\njmp (0) x");

		let lines: Vec<_> = diagnostics.iter().map(|diagnostic| diagnostic.line).collect();
		assert_eq!(lines, vec![2, 3, 4, 5, 6]);

		assert_eq!(
			diagnostics[0].error,
			AssembleError::Encode(EncodeError::UnknownMnemonic("foo".into()))
		);
		assert_eq!(
			diagnostics[1].error,
			AssembleError::Encode(EncodeError::InvalidRegisterConstant(
				RegisterError::NoByteHalves(3)
			))
		);
		assert_eq!(
			diagnostics[2].error,
			AssembleError::Encode(EncodeError::IllegalAddressingMode { mnemonic: "LD" })
		);
		assert_eq!(
			diagnostics[3].error,
			AssembleError::Fixup(FixupError::UndefinedSymbol("nowhere".into()))
		);
		assert_eq!(
			diagnostics[4].error,
			AssembleError::Syntax(SyntaxError::new(8, SyntaxErrorKind::UnexpectedInput))
		);
	}

	#[test]
	fn symbol_errors() {
		let diagnostics = errors("a: nop\na: nop\nb = later\n.fill 3");

		assert_eq!(
			diagnostics[0].error,
			AssembleError::DuplicateSymbol("a".into())
		);
		assert_eq!(diagnostics[1].error, AssembleError::NotConstant("b".into()));
		assert_eq!(
			diagnostics[2].error,
			AssembleError::UnknownDirective("fill".into())
		);
	}

	#[test]
	fn constants_fold_through_the_current_scope() {
		let source = "
			.org 8
			here = * + 2
			.org here * 2
			.byte here
		";
		let program = assemble(source, Config::default()).unwrap();
		assert_eq!(program.base(), Some(Address::new(20)));
		assert_eq!(program.image(), vec![10]);

		let diagnostics = errors(".org later\nlater: nop");
		assert_eq!(
			diagnostics[0].error,
			AssembleError::NotConstant(".org".into())
		);
	}

	#[test]
	fn code_past_the_top_of_memory_is_an_error() {
		let diagnostics = errors(".org $ffff\nnop\nhere: jmp here\nrts");

		assert_eq!(
			diagnostics,
			vec![Diagnostic {
				line: 3,
				error: AssembleError::AddressOverflow,
			}]
		);
	}

	#[test]
	fn current_address_is_the_instruction_start() {
		assert_eq!(image(".org 16\nbeq *"), vec![0xab, 0xfe]);
		assert_eq!(image("nop\njmp * + 3\nrts"), vec![0x01, 0x0c, 0x04, 0x00, 0x03]);
	}

	#[test]
	fn bracket_style() {
		let program = assemble("jsr [`2]\nld `0, (1 + 1) * 2", Config::with_brackets()).unwrap();
		assert_eq!(program.image(), vec![0x0a, 0xc8, 0x04, 0x00]);
	}
}
