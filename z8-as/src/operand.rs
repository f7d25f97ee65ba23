//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use std::fmt::Display;

use crate::{
	config::{Config, IndirectStyle},
	error::{EncodeError, EncodeResult, RegisterError, SyntaxError},
	expr::{BinaryOp, Expression, ExpressionServices},
	mode::{AddressingMode, ModeSet},
	register::{ByteRegister, Half, WordRegister},
	scanner::{Cursor, Token},
	table::InstructionDescriptor,
};

/// One operand slot of an instruction.
///
/// Source text always produces [`Operand::Expr`]; in register positions the
/// expression's value is the register number (word) or tag (byte). The
/// register variants let other stages pass registers without building
/// expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
	Expr(Expression),
	Word(WordRegister),
	Byte(ByteRegister),
}

impl Operand {
	/// The operand as a value to emit.
	pub fn expression(&self) -> Expression {
		match self {
			Self::Expr(expression) => expression.clone(),
			Self::Word(register) => Expression::Literal(register.wire() as i64),
			Self::Byte(register) => Expression::Literal(register.tag()),
		}
	}

	pub fn word_register(&self) -> Result<WordRegister, RegisterError> {
		match self {
			Self::Word(register) => Ok(*register),
			Self::Byte(_) => Err(RegisterError::WidthMismatch),
			Self::Expr(expression) => {
				let value = expression.as_constant().ok_or(RegisterError::NotConstant)?;
				WordRegister::from_constant(value)
			},
		}
	}

	pub fn byte_register(&self) -> Result<ByteRegister, RegisterError> {
		match self {
			Self::Byte(register) => Ok(*register),
			Self::Word(_) => Err(RegisterError::WidthMismatch),
			Self::Expr(expression) => {
				let tag = expression.as_constant().ok_or(RegisterError::NotConstant)?;
				ByteRegister::from_tag(tag)
			},
		}
	}

	pub(crate) fn simplify(self, services: &dyn ExpressionServices) -> Self {
		match self {
			Self::Expr(expression) => Self::Expr(services.simplify(expression)),
			register => register,
		}
	}
}

impl From<Expression> for Operand {
	fn from(expression: Expression) -> Self {
		Self::Expr(expression)
	}
}

impl From<WordRegister> for Operand {
	fn from(register: WordRegister) -> Self {
		Self::Word(register)
	}
}

impl From<ByteRegister> for Operand {
	fn from(register: ByteRegister) -> Self {
		Self::Byte(register)
	}
}

impl Display for Operand {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Expr(expression) => write!(f, "{}", expression),
			Self::Word(register) => write!(f, "{}", register),
			Self::Byte(register) => write!(f, "{}", register),
		}
	}
}

/// Everything an emitter needs to encode one instruction occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOperand {
	pub mode: AddressingMode,
	pub first: Option<Operand>,
	pub second: Option<Operand>,
	pub base: u8,
	pub extension: u8,
}

impl ResolvedOperand {
	/// An operand record whose opcodes are filled in later by the table.
	pub fn new(mode: AddressingMode, first: Option<Operand>, second: Option<Operand>) -> Self {
		Self {
			mode,
			first,
			second,
			base: 0,
			extension: 0,
		}
	}
}

/// What the operand text could mean, before looking at the mnemonic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandSyntax {
	pub modes: ModeSet,
	pub first: Option<Operand>,
	pub second: Option<Operand>,
}

impl OperandSyntax {
	fn new(modes: ModeSet, first: Option<Expression>, second: Option<Expression>) -> Self {
		Self {
			modes,
			first: first.map(Operand::Expr),
			second: second.map(Operand::Expr),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
	Byte,
	Word,
}

impl Width {
	fn pick(self, byte: ModeSet, word: ModeSet) -> ModeSet {
		match self {
			Self::Byte => byte,
			Self::Word => word,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
	None,
	PreDecrement,
	PostIncrement,
}

fn byte_tag(half: Half, index: Expression) -> Expression {
	match half {
		Half::Low => index,
		Half::High => Expression::binary(
			BinaryOp::Or,
			index,
			Expression::Literal(ByteRegister::HIGH_TAG),
		),
	}
}

/// Reads the inside of an indirection; the opening delimiter is already consumed.
fn indirection(cursor: &mut Cursor, style: IndirectStyle) -> Result<(Expression, Step), SyntaxError> {
	let pre = cursor.eat(Token::PreDecrement);
	cursor.eat(Token::WordMarker);
	let pointer = cursor.expression()?;

	let step = if pre {
		Step::PreDecrement
	} else if cursor.eat(Token::PostIncrement) {
		Step::PostIncrement
	} else {
		Step::None
	};

	cursor.expect(style.close())?;
	Ok((pointer, step))
}

/// Reads the operand field and classifies it.
///
/// Leaves the cursor immediately after the last operand token.
pub fn scan(cursor: &mut Cursor, style: IndirectStyle) -> Result<OperandSyntax, SyntaxError> {
	let token = cursor.peek();

	match token {
		Token::End => Ok(OperandSyntax::new(ModeSet::IMPLICIT, None, None)),
		Token::Hash => {
			cursor.bump();
			let value = cursor.expression()?;
			Ok(OperandSyntax::new(ModeSet::IMMEDIATE_BYTE, Some(value), None))
		},
		_ if token == style.open() => {
			cursor.bump();
			let (pointer, step) = indirection(cursor, style)?;
			let modes = match step {
				Step::None => ModeSet::INDEXED,
				_ => ModeSet::empty(),
			};
			Ok(OperandSyntax::new(modes, Some(pointer), None))
		},
		Token::WordMarker => {
			cursor.bump();
			let register = cursor.expression()?;
			register_operands(cursor, style, Width::Word, register)
		},
		Token::ByteMarker(half) => {
			cursor.bump();
			let register = byte_tag(half, cursor.expression()?);
			register_operands(cursor, style, Width::Byte, register)
		},
		_ => {
			let address = cursor.expression()?;
			Ok(OperandSyntax::new(
				ModeSet::ABSOLUTE | ModeSet::RELATIVE,
				Some(address),
				None,
			))
		},
	}
}

fn register_operands(
	cursor: &mut Cursor,
	style: IndirectStyle,
	width: Width,
	register: Expression,
) -> Result<OperandSyntax, SyntaxError> {
	if !cursor.eat(Token::Comma) {
		let modes = width.pick(ModeSet::REGISTER_BYTE, ModeSet::REGISTER_WORD);
		return Ok(OperandSyntax::new(modes, Some(register), None));
	}

	let token = cursor.peek();
	let (modes, second) = match token {
		Token::Hash => {
			cursor.bump();
			let modes = width.pick(
				ModeSet::REGISTER_BYTE_IMMEDIATE,
				ModeSet::REGISTER_WORD_IMMEDIATE | ModeSet::REGISTER_WORD_IMMEDIATE_BYTE,
			);
			(modes, cursor.expression()?)
		},
		_ if token == style.open() => {
			cursor.bump();
			let (pointer, step) = indirection(cursor, style)?;
			let modes = match step {
				Step::None => width.pick(
					ModeSet::REGISTER_BYTE_INDEXED,
					ModeSet::REGISTER_WORD_INDEXED,
				),
				Step::PostIncrement => width.pick(
					ModeSet::REGISTER_BYTE_INDEXED_POST_INCREMENT,
					ModeSet::REGISTER_WORD_INDEXED_POST_INCREMENT,
				),
				Step::PreDecrement => width.pick(
					ModeSet::REGISTER_BYTE_PRE_DECREMENT_INDEXED,
					ModeSet::REGISTER_WORD_PRE_DECREMENT_INDEXED,
				),
			};
			(modes, pointer)
		},
		Token::WordMarker => {
			cursor.bump();
			// no mode pairs a byte register with a word source
			let modes = width.pick(ModeSet::empty(), ModeSet::REGISTER_WORD_REGISTER_WORD);
			(modes, cursor.expression()?)
		},
		Token::ByteMarker(half) => {
			cursor.bump();
			let modes = width.pick(
				ModeSet::REGISTER_BYTE_REGISTER_BYTE,
				ModeSet::REGISTER_WORD_REGISTER_BYTE,
			);
			(modes, byte_tag(half, cursor.expression()?))
		},
		_ => {
			let modes = width.pick(
				ModeSet::REGISTER_BYTE_ABSOLUTE,
				ModeSet::REGISTER_WORD_ABSOLUTE,
			);
			(modes, cursor.expression()?)
		},
	};

	Ok(OperandSyntax::new(modes, Some(register), Some(second)))
}

/// Scans the operands of `descriptor` and settles on its addressing mode.
///
/// Operand expressions are simplified before they are stored.
pub fn resolve(
	descriptor: &InstructionDescriptor,
	cursor: &mut Cursor,
	config: &Config,
	services: &dyn ExpressionServices,
) -> EncodeResult<ResolvedOperand> {
	let syntax = scan(cursor, config.indirect)?;
	let mode = (syntax.modes & descriptor.modes())
		.single()
		.ok_or(EncodeError::IllegalAddressingMode {
			mnemonic: descriptor.mnemonic(),
		})?;

	Ok(ResolvedOperand {
		mode,
		first: syntax.first.map(|operand| operand.simplify(services)),
		second: syntax.second.map(|operand| operand.simplify(services)),
		base: descriptor.base(),
		extension: descriptor.extension(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{expr::SymbolTable, table::lookup};

	fn modes(text: &str) -> ModeSet {
		scan(&mut Cursor::new(text), IndirectStyle::Parentheses)
			.unwrap()
			.modes
	}

	#[test]
	fn classifies_by_first_token() {
		assert_eq!(modes(""), ModeSet::IMPLICIT);
		assert_eq!(modes("; nothing"), ModeSet::IMPLICIT);
		assert_eq!(modes("#$ff"), ModeSet::IMMEDIATE_BYTE);
		assert_eq!(modes("(`1)"), ModeSet::INDEXED);
		assert_eq!(modes("(1)"), ModeSet::INDEXED);
		assert_eq!(modes("label + 2"), ModeSet::ABSOLUTE | ModeSet::RELATIVE);
		assert_eq!(modes("`2"), ModeSet::REGISTER_WORD);
		assert_eq!(modes("`]1"), ModeSet::REGISTER_BYTE);
	}

	#[test]
	fn classifies_word_register_forms() {
		assert_eq!(
			modes("`0, #1"),
			ModeSet::REGISTER_WORD_IMMEDIATE | ModeSet::REGISTER_WORD_IMMEDIATE_BYTE
		);
		assert_eq!(modes("`0, (`1)"), ModeSet::REGISTER_WORD_INDEXED);
		assert_eq!(
			modes("`0, (`1++)"),
			ModeSet::REGISTER_WORD_INDEXED_POST_INCREMENT
		);
		assert_eq!(
			modes("`0, (--`1)"),
			ModeSet::REGISTER_WORD_PRE_DECREMENT_INDEXED
		);
		assert_eq!(modes("`0, `1"), ModeSet::REGISTER_WORD_REGISTER_WORD);
		assert_eq!(modes("`0, `[1"), ModeSet::REGISTER_WORD_REGISTER_BYTE);
		assert_eq!(modes("`0, $1000"), ModeSet::REGISTER_WORD_ABSOLUTE);
	}

	#[test]
	fn classifies_byte_register_forms() {
		assert_eq!(modes("`[0, #1"), ModeSet::REGISTER_BYTE_IMMEDIATE);
		assert_eq!(modes("`[0, (1)"), ModeSet::REGISTER_BYTE_INDEXED);
		assert_eq!(
			modes("`]0, (1++)"),
			ModeSet::REGISTER_BYTE_INDEXED_POST_INCREMENT
		);
		assert_eq!(
			modes("`]0, (--1)"),
			ModeSet::REGISTER_BYTE_PRE_DECREMENT_INDEXED
		);
		assert_eq!(modes("`[0, `]1"), ModeSet::REGISTER_BYTE_REGISTER_BYTE);
		assert_eq!(modes("`[0, label"), ModeSet::REGISTER_BYTE_ABSOLUTE);
		assert_eq!(modes("`[0, `1"), ModeSet::empty());
		assert_eq!(modes("(--1)"), ModeSet::empty());
	}

	#[test]
	fn brackets_free_up_parentheses() {
		let scanned = scan(&mut Cursor::new("(1 + 2) * 3"), IndirectStyle::Brackets).unwrap();
		assert_eq!(scanned.modes, ModeSet::ABSOLUTE | ModeSet::RELATIVE);

		let scanned = scan(&mut Cursor::new("`0, [`1++]"), IndirectStyle::Brackets).unwrap();
		assert_eq!(scanned.modes, ModeSet::REGISTER_WORD_INDEXED_POST_INCREMENT);

		let mut cursor = Cursor::new("[1]");
		assert!(scan(&mut cursor, IndirectStyle::Parentheses).is_err());
	}

	#[test]
	fn high_half_sets_the_tag_bit() {
		let mut cursor = Cursor::new("`]1, `[0");
		let scanned = scan(&mut cursor, IndirectStyle::Parentheses).unwrap();
		let symbols = SymbolTable::new();

		let first = scanned.first.unwrap().simplify(&symbols);
		let second = scanned.second.unwrap().simplify(&symbols);
		assert_eq!(first.byte_register().unwrap().tag(), 5);
		assert_eq!(second.byte_register().unwrap().tag(), 0);
	}

	#[test]
	fn leaves_cursor_after_operands() {
		let mut cursor = Cursor::new("`0, (`1) ; comment");
		scan(&mut cursor, IndirectStyle::Parentheses).unwrap();
		assert_eq!(cursor.rest(), " ; comment");

		let mut cursor = Cursor::new("`0, #2 extra");
		scan(&mut cursor, IndirectStyle::Parentheses).unwrap();
		assert!(cursor.expect_end().is_err());
	}

	#[test]
	fn resolve_intersects_with_the_mnemonic() {
		let symbols = SymbolTable::new();
		let config = Config::default();

		let ld = lookup("ld").unwrap();
		let resolved = resolve(ld, &mut Cursor::new("`1, #$10"), &config, &symbols).unwrap();
		assert_eq!(resolved.mode, AddressingMode::RegisterWordImmediate);
		assert_eq!(resolved.base, ld.base());

		let adc = lookup("adc").unwrap();
		let resolved = resolve(adc, &mut Cursor::new("`1, #$10"), &config, &symbols).unwrap();
		assert_eq!(resolved.mode, AddressingMode::RegisterWordImmediateByte);

		let error = resolve(ld, &mut Cursor::new(""), &config, &symbols).unwrap_err();
		assert_eq!(error, EncodeError::IllegalAddressingMode { mnemonic: "LD" });
	}

	#[test]
	fn resolution_is_deterministic() {
		let mut symbols = SymbolTable::new();
		symbols.define("table", 0x4000).unwrap();
		let st = lookup("st").unwrap();

		let resolve_text = |text| {
			resolve(st, &mut Cursor::new(text), &Config::default(), &symbols).unwrap()
		};

		let once = resolve_text("`]0, table + 1");
		assert_eq!(once, resolve_text("`]0, table + 1"));
		assert_eq!(once.second, Some(Operand::Expr(Expression::Literal(0x4001))));
	}

	#[test]
	fn register_decoding_reports_problems() {
		let symbol = Operand::Expr(Expression::Symbol("later".into()));
		assert_eq!(symbol.word_register(), Err(RegisterError::NotConstant));
		assert_eq!(
			Operand::Word(WordRegister::R1).byte_register(),
			Err(RegisterError::WidthMismatch)
		);
		assert_eq!(
			Operand::Expr(Expression::Literal(2)).byte_register(),
			Err(RegisterError::NoByteHalves(2))
		);
	}
}
