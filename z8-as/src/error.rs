//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
	#[error("expected an expression")]
	ExpectedExpression,
	#[error("expected `{0}`")]
	Expected(&'static str),
	#[error("invalid number literal")]
	InvalidNumber,
	#[error("unexpected input")]
	UnexpectedInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} at column {}", .position + 1)]
pub struct SyntaxError {
	pub position: usize,
	pub kind: SyntaxErrorKind,
}

impl SyntaxError {
	pub fn new(position: usize, kind: SyntaxErrorKind) -> Self {
		Self { position, kind }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
	#[error("register number is not a constant")]
	NotConstant,
	#[error("{0} is not a word register")]
	NotWordRegister(i64),
	#[error("{0} is not a byte register")]
	NotByteRegister(i64),
	#[error("word register {0} has no byte halves")]
	NoByteHalves(i64),
	#[error("register has the wrong width for this operand")]
	WidthMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
	#[error("illegal addressing mode for `{mnemonic}`")]
	IllegalAddressingMode { mnemonic: &'static str },
	#[error("invalid register: {0}")]
	InvalidRegisterConstant(#[from] RegisterError),
	#[error("unknown mnemonic `{0}`")]
	UnknownMnemonic(SmolStr),
	#[error("`{mnemonic}` is missing an operand")]
	MissingOperand { mnemonic: &'static str },
	#[error(transparent)]
	Syntax(#[from] SyntaxError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixupError {
	#[error("undefined symbol `{0}`")]
	UndefinedSymbol(SmolStr),
	#[error("division by zero")]
	DivisionByZero,
	#[error("value {value} does not fit in {bits} bits")]
	ValueOutOfRange { value: i64, bits: u32 },
	#[error("branch displacement {0} is out of range")]
	BranchOutOfRange(i64),
	#[error("current address used outside of an instruction")]
	UnresolvedAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
	#[error(transparent)]
	Encode(#[from] EncodeError),
	#[error(transparent)]
	Syntax(#[from] SyntaxError),
	#[error(transparent)]
	Fixup(#[from] FixupError),
	#[error("symbol `{0}` is already defined")]
	DuplicateSymbol(SmolStr),
	#[error("unknown directive `.{0}`")]
	UnknownDirective(SmolStr),
	#[error("value of `{0}` is not a constant")]
	NotConstant(SmolStr),
	#[error("code runs past $FFFF")]
	AddressOverflow,
}

/// An error tied to the source line that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {error}")]
pub struct Diagnostic {
	pub line: usize,
	pub error: AssembleError,
}

pub type EncodeResult<T> = Result<T, EncodeError>;
