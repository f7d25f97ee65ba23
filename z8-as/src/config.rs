//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use crate::scanner::Token;

/// Which delimiters mark an indirection such as `jmp (0)`.
///
/// With brackets, parentheses are free to group expressions at the start of
/// an operand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndirectStyle {
	#[default]
	Parentheses,
	Brackets,
}

impl IndirectStyle {
	pub fn open(self) -> Token {
		match self {
			Self::Parentheses => Token::OpenParen,
			Self::Brackets => Token::OpenBracket,
		}
	}

	pub fn close(self) -> Token {
		match self {
			Self::Parentheses => Token::CloseParen,
			Self::Brackets => Token::CloseBracket,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
	pub indirect: IndirectStyle,
}

impl Config {
	pub fn with_brackets() -> Self {
		Self {
			indirect: IndirectStyle::Brackets,
		}
	}
}
