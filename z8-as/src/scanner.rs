//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use std::fmt::Display;

use crate::{
	error::{SyntaxError, SyntaxErrorKind},
	expr::{parse_expression, Expression},
	register::Half,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
	/// End of the line, or the start of a `;` comment.
	End,
	Hash,
	Comma,
	Colon,
	Equals,
	OpenParen,
	CloseParen,
	OpenBracket,
	CloseBracket,
	/// `` ` ``
	WordMarker,
	/// `` `[ `` or `` `] ``
	ByteMarker(Half),
	PreDecrement,
	PostIncrement,
	/// Anything else; the start of an expression or an identifier.
	Other,
}

impl Token {
	fn len(self) -> usize {
		match self {
			Self::End | Self::Other => 0,
			Self::ByteMarker(_) | Self::PreDecrement | Self::PostIncrement => 2,
			_ => 1,
		}
	}

	fn spelling(self) -> &'static str {
		match self {
			Self::End => "end of line",
			Self::Hash => "#",
			Self::Comma => ",",
			Self::Colon => ":",
			Self::Equals => "=",
			Self::OpenParen => "(",
			Self::CloseParen => ")",
			Self::OpenBracket => "[",
			Self::CloseBracket => "]",
			Self::WordMarker => "`",
			Self::ByteMarker(Half::Low) => "`[",
			Self::ByteMarker(Half::High) => "`]",
			Self::PreDecrement => "--",
			Self::PostIncrement => "++",
			Self::Other => "expression",
		}
	}
}

impl Display for Token {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.spelling())
	}
}

/// Pull-based reader over one source line.
///
/// Tokens are classified one at a time on demand; expressions are handed to
/// the expression grammar starting at the current position.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
	line: &'a str,
	position: usize,
}

impl<'a> Cursor<'a> {
	pub fn new(line: &'a str) -> Self {
		Self { line, position: 0 }
	}

	/// Byte offset of the next unread character.
	pub fn position(&self) -> usize {
		self.position
	}

	pub fn rest(&self) -> &'a str {
		&self.line[self.position..]
	}

	fn skip_whitespace(&mut self) {
		let rest = self.rest();
		self.position += rest.len() - rest.trim_start().len();
	}

	pub fn peek(&self) -> Token {
		let bytes = self.rest().trim_start().as_bytes();

		match bytes {
			[] | [b';', ..] => Token::End,
			[b'#', ..] => Token::Hash,
			[b',', ..] => Token::Comma,
			[b':', ..] => Token::Colon,
			[b'=', ..] => Token::Equals,
			[b'(', ..] => Token::OpenParen,
			[b')', ..] => Token::CloseParen,
			[b'[', ..] => Token::OpenBracket,
			[b']', ..] => Token::CloseBracket,
			[b'`', b'[', ..] => Token::ByteMarker(Half::Low),
			[b'`', b']', ..] => Token::ByteMarker(Half::High),
			[b'`', ..] => Token::WordMarker,
			[b'-', b'-', ..] => Token::PreDecrement,
			[b'+', b'+', ..] => Token::PostIncrement,
			_ => Token::Other,
		}
	}

	/// Consumes the token [`Cursor::peek`] would return.
	pub fn bump(&mut self) -> Token {
		self.skip_whitespace();
		let token = self.peek();
		self.position += token.len();
		token
	}

	pub fn eat(&mut self, token: Token) -> bool {
		if self.peek() == token {
			self.bump();
			true
		} else {
			false
		}
	}

	pub fn expect(&mut self, token: Token) -> Result<(), SyntaxError> {
		if self.eat(token) {
			Ok(())
		} else {
			Err(self.error(SyntaxErrorKind::Expected(token.spelling())))
		}
	}

	pub fn expect_end(&mut self) -> Result<(), SyntaxError> {
		match self.peek() {
			Token::End => Ok(()),
			_ => Err(self.error(SyntaxErrorKind::UnexpectedInput)),
		}
	}

	pub fn expression(&mut self) -> Result<Expression, SyntaxError> {
		self.skip_whitespace();

		match parse_expression(self.rest()) {
			Ok((expression, consumed)) => {
				self.position += consumed;
				Ok(expression)
			},
			Err(kind) => Err(SyntaxError::new(self.position, kind)),
		}
	}

	/// Reads a name such as a mnemonic, label, or directive.
	pub fn identifier(&mut self) -> Option<&'a str> {
		let rest = self.rest();
		let trimmed = rest.trim_start();

		let first = trimmed.chars().next()?;
		if !(first.is_ascii_alphabetic() || first == '_' || first == '.') {
			return None;
		}

		let len = trimmed[1..]
			.find(|char: char| !(char.is_ascii_alphanumeric() || char == '_'))
			.map_or(trimmed.len(), |end| end + 1);

		self.position += rest.len() - trimmed.len() + len;
		Some(&trimmed[..len])
	}

	fn error(&mut self, kind: SyntaxErrorKind) -> SyntaxError {
		self.skip_whitespace();
		SyntaxError::new(self.position, kind)
	}
}
