//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use std::{collections::HashMap, fmt::Display};

use lazy_static::lazy_static;
use pest::{
	iterators::Pair,
	pratt_parser::{Assoc, Op, PrattParser},
	Parser,
};
use pest_derive::Parser;
use smol_str::SmolStr;
use tracing::debug;

use crate::{
	error::{AssembleError, FixupError, SyntaxErrorKind},
	output::Address,
};

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct ExpressionParser;

lazy_static! {
	static ref PRATT: PrattParser<Rule> = PrattParser::new()
		.op(Op::infix(Rule::or, Assoc::Left))
		.op(Op::infix(Rule::xor, Assoc::Left))
		.op(Op::infix(Rule::and, Assoc::Left))
		.op(Op::infix(Rule::shift_left, Assoc::Left) | Op::infix(Rule::shift_right, Assoc::Left))
		.op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
		.op(Op::infix(Rule::mul, Assoc::Left)
			| Op::infix(Rule::div, Assoc::Left)
			| Op::infix(Rule::rem, Assoc::Left))
		.op(Op::prefix(Rule::neg)
			| Op::prefix(Rule::not)
			| Op::prefix(Rule::low_byte)
			| Op::prefix(Rule::high_byte));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
	Negate,
	Not,
	LowByte,
	HighByte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
	Or,
	Xor,
	And,
	ShiftLeft,
	ShiftRight,
	Add,
	Subtract,
	Multiply,
	Divide,
	Remainder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
	Literal(i64),
	Symbol(SmolStr),
	/// `*`, the address of the instruction being assembled.
	CurrentAddress,
	Unary(UnaryOp, Box<Expression>),
	Binary(BinaryOp, Box<Expression>, Box<Expression>),
}

impl UnaryOp {
	pub fn apply(self, value: i64) -> i64 {
		match self {
			Self::Negate => value.wrapping_neg(),
			Self::Not => !value,
			Self::LowByte => value & 0xff,
			Self::HighByte => (value >> 8) & 0xff,
		}
	}
}

impl BinaryOp {
	/// `None` when the right-hand side is a zero divisor.
	pub fn apply(self, lhs: i64, rhs: i64) -> Option<i64> {
		let shift = u32::try_from(rhs).ok();

		Some(match self {
			Self::Or => lhs | rhs,
			Self::Xor => lhs ^ rhs,
			Self::And => lhs & rhs,
			Self::ShiftLeft => shift.and_then(|shift| lhs.checked_shl(shift)).unwrap_or(0),
			Self::ShiftRight => shift
				.and_then(|shift| lhs.checked_shr(shift))
				.unwrap_or(if lhs < 0 { -1 } else { 0 }),
			Self::Add => lhs.wrapping_add(rhs),
			Self::Subtract => lhs.wrapping_sub(rhs),
			Self::Multiply => lhs.wrapping_mul(rhs),
			Self::Divide if rhs == 0 => return None,
			Self::Divide => lhs.wrapping_div(rhs),
			Self::Remainder if rhs == 0 => return None,
			Self::Remainder => lhs.wrapping_rem(rhs),
		})
	}
}

impl Expression {
	pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
		Self::Binary(op, Box::new(lhs), Box::new(rhs))
	}

	pub fn as_constant(&self) -> Option<i64> {
		match self {
			Self::Literal(value) => Some(*value),
			_ => None,
		}
	}

	/// Folds every subtree whose leaves are known.
	pub fn simplify<F>(self, lookup: &F, address: Option<Address>) -> Self
	where
		F: Fn(&str) -> Option<i64>,
	{
		match self {
			literal @ Self::Literal(_) => literal,
			Self::Symbol(name) => match lookup(name.as_str()) {
				Some(value) => Self::Literal(value),
				None => Self::Symbol(name),
			},
			Self::CurrentAddress => match address {
				Some(address) => Self::Literal(address.value() as i64),
				None => Self::CurrentAddress,
			},
			Self::Unary(op, operand) => match operand.simplify(lookup, address) {
				Self::Literal(value) => Self::Literal(op.apply(value)),
				operand => Self::Unary(op, Box::new(operand)),
			},
			Self::Binary(op, lhs, rhs) => {
				let lhs = lhs.simplify(lookup, address);
				let rhs = rhs.simplify(lookup, address);

				if let (Some(a), Some(b)) = (lhs.as_constant(), rhs.as_constant()) {
					if let Some(value) = op.apply(a, b) {
						return Self::Literal(value);
					}
				}

				Self::binary(op, lhs, rhs)
			},
		}
	}

	pub fn evaluate(&self, symbols: &SymbolTable) -> Result<i64, FixupError> {
		match self {
			Self::Literal(value) => Ok(*value),
			Self::Symbol(name) => symbols
				.get(name)
				.ok_or_else(|| FixupError::UndefinedSymbol(name.clone())),
			Self::CurrentAddress => Err(FixupError::UnresolvedAddress),
			Self::Unary(op, operand) => Ok(op.apply(operand.evaluate(symbols)?)),
			Self::Binary(op, lhs, rhs) => op
				.apply(lhs.evaluate(symbols)?, rhs.evaluate(symbols)?)
				.ok_or(FixupError::DivisionByZero),
		}
	}
}

impl From<i64> for Expression {
	fn from(value: i64) -> Self {
		Self::Literal(value)
	}
}

impl Display for Expression {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Literal(value) => write!(f, "{}", value),
			Self::Symbol(name) => write!(f, "{}", name),
			Self::CurrentAddress => write!(f, "*"),
			Self::Unary(op, operand) => {
				let op = match op {
					UnaryOp::Negate => "-",
					UnaryOp::Not => "~",
					UnaryOp::LowByte => "<",
					UnaryOp::HighByte => ">",
				};
				write!(f, "{}{}", op, operand)
			},
			Self::Binary(op, lhs, rhs) => {
				let op = match op {
					BinaryOp::Or => "|",
					BinaryOp::Xor => "^",
					BinaryOp::And => "&",
					BinaryOp::ShiftLeft => "<<",
					BinaryOp::ShiftRight => ">>",
					BinaryOp::Add => "+",
					BinaryOp::Subtract => "-",
					BinaryOp::Multiply => "*",
					BinaryOp::Divide => "/",
					BinaryOp::Remainder => "%",
				};
				write!(f, "({} {} {})", lhs, op, rhs)
			},
		}
	}
}

/// Parses the longest expression at the start of `text`.
///
/// Returns the expression and the number of bytes it spans.
pub(crate) fn parse_expression(text: &str) -> Result<(Expression, usize), SyntaxErrorKind> {
	let expression = ExpressionParser::parse(Rule::expression, text)
		.map_err(|_| SyntaxErrorKind::ExpectedExpression)?
		.next()
		.ok_or(SyntaxErrorKind::ExpectedExpression)?;
	let consumed = expression.as_span().end();

	Ok((build(expression)?, consumed))
}

fn build(expression: Pair<Rule>) -> Result<Expression, SyntaxErrorKind> {
	PRATT
		.map_primary(|primary| match primary.as_rule() {
			Rule::integer => parse_integer(primary).map(Expression::Literal),
			Rule::character => parse_character(primary).map(Expression::Literal),
			Rule::current_address => Ok(Expression::CurrentAddress),
			Rule::symbol => Ok(Expression::Symbol(primary.as_str().into())),
			Rule::expression => build(primary),
			_ => unreachable!(),
		})
		.map_prefix(|op, rhs| {
			let op = match op.as_rule() {
				Rule::neg => UnaryOp::Negate,
				Rule::not => UnaryOp::Not,
				Rule::low_byte => UnaryOp::LowByte,
				Rule::high_byte => UnaryOp::HighByte,
				_ => unreachable!(),
			};
			Ok(Expression::Unary(op, Box::new(rhs?)))
		})
		.map_infix(|lhs, op, rhs| {
			let op = match op.as_rule() {
				Rule::or => BinaryOp::Or,
				Rule::xor => BinaryOp::Xor,
				Rule::and => BinaryOp::And,
				Rule::shift_left => BinaryOp::ShiftLeft,
				Rule::shift_right => BinaryOp::ShiftRight,
				Rule::add => BinaryOp::Add,
				Rule::sub => BinaryOp::Subtract,
				Rule::mul => BinaryOp::Multiply,
				Rule::div => BinaryOp::Divide,
				Rule::rem => BinaryOp::Remainder,
				_ => unreachable!(),
			};
			Ok(Expression::binary(op, lhs?, rhs?))
		})
		.parse(expression.into_inner())
}

fn parse_integer(integer: Pair<Rule>) -> Result<i64, SyntaxErrorKind> {
	let literal = integer
		.into_inner()
		.next()
		.ok_or(SyntaxErrorKind::InvalidNumber)?;
	let text = literal.as_str();

	let (digits, radix) = match literal.as_rule() {
		Rule::hex_literal => (text.strip_prefix('$').unwrap_or(&text[2..]), 16),
		Rule::binary_literal => (text.strip_prefix('%').unwrap_or(&text[2..]), 2),
		Rule::octal_literal => (&text[2..], 8),
		Rule::decimal_literal => (text, 10),
		_ => unreachable!(),
	};

	let filtered: String = digits.chars().filter(|&char| char != '_').collect();

	i64::from_str_radix(&filtered, radix).map_err(|_| SyntaxErrorKind::InvalidNumber)
}

fn parse_character(character: Pair<Rule>) -> Result<i64, SyntaxErrorKind> {
	let inner = character
		.into_inner()
		.next()
		.ok_or(SyntaxErrorKind::InvalidNumber)?;
	let mut chars = inner.as_str().chars();

	let value = match inner.as_rule() {
		Rule::normal_char => chars.next(),
		Rule::escaped_char => chars.nth(1).map(|escape| match escape {
			'n' => '\n',
			't' => '\t',
			'r' => '\r',
			'0' => '\0',
			other => other,
		}),
		_ => unreachable!(),
	};

	value
		.map(|char| char as i64)
		.ok_or(SyntaxErrorKind::InvalidNumber)
}

/// The two questions asked of an expression while assembling.
pub trait ExpressionServices {
	fn simplify(&self, expression: Expression) -> Expression;

	fn constant(&self, expression: &Expression) -> Option<i64> {
		self.simplify(expression.clone()).as_constant()
	}
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
	values: HashMap<SmolStr, i64>,
}

impl SymbolTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn define(&mut self, name: &str, value: i64) -> Result<(), AssembleError> {
		if self.values.contains_key(name) {
			return Err(AssembleError::DuplicateSymbol(name.into()));
		}

		debug!(symbol = name, value, "defined symbol");
		self.values.insert(name.into(), value);
		Ok(())
	}

	pub fn get(&self, name: &str) -> Option<i64> {
		self.values.get(name).copied()
	}

	/// The view used while assembling the instruction at `address`.
	pub fn scope(&self, address: Address) -> Scope<'_> {
		Scope {
			symbols: self,
			address,
		}
	}
}

impl ExpressionServices for SymbolTable {
	fn simplify(&self, expression: Expression) -> Expression {
		expression.simplify(&|name| self.get(name), None)
	}
}

#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
	symbols: &'a SymbolTable,
	address: Address,
}

impl ExpressionServices for Scope<'_> {
	fn simplify(&self, expression: Expression) -> Expression {
		expression.simplify(&|name| self.symbols.get(name), Some(self.address))
	}
}
