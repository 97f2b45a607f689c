//! The expression engine (spec §4.D): a shunting-yard parser over the operator table that
//! builds a typed `ExprNode` tree, plus the compile-time constant folder.

pub mod operator;

use std::fmt;

use crate::cursor::Cursor;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::token::{FileOrigin, NumericClass, NumericLiteral, StringEncoding, Token, TokenKind};
use crate::types::VarType;
use operator::{category, OpRef};

/// A compile-time constant produced by `Expr::evaluate`. Integer and floating values are kept
/// distinct so the promotion rules in `evaluate_binary` can apply C's usual-arithmetic-
/// conversions; `Nan` is the "division by zero" sentinel spec §4.D calls for ("returns NaN with
/// a diagnostic but does not throw").
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
	Int(i128),
	Float(f64),
	Nan,
}

impl ConstValue {
	#[must_use]
	pub fn as_i128(self) -> Option<i128> {
		match self {
			Self::Int(value) => Some(value),
			Self::Float(value) => Some(value as i128),
			Self::Nan => None,
		}
	}

	#[must_use]
	pub fn is_truthy(self) -> bool {
		match self {
			Self::Int(value) => value != 0,
			Self::Float(value) => value != 0.0,
			Self::Nan => false,
		}
	}
}

/// Which explicit-cast spelling produced a `ExprNode::Cast` node. Kept as a tag on a single
/// variant (rather than six separate `ExprNode` variants, one per spec-named cast form) because
/// all six share identical structure (`target_type`, `child`) and only differ in which source
/// syntax produced them and which runtime check (if any) a backend should emit; the tag
/// preserves that distinction without repeating the payload six times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
	CStyle,
	Functional,
	Const,
	Static,
	Reinterpret,
	Dynamic,
}

/// Tagged expression-node variants (spec §3 "Expressions (exprNode)").
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
	Empty,
	Primitive(NumericLiteral),
	Char {
		encoding: StringEncoding,
		raw: String,
		user_suffix: Option<String>,
	},
	String {
		encoding: StringEncoding,
		raw: String,
		user_suffix: Option<String>,
	},
	Identifier(String),
	Variable(crate::scope::VariableId),
	LeftUnary {
		op: OpRef,
		child: Box<Expr>,
	},
	RightUnary {
		op: OpRef,
		child: Box<Expr>,
	},
	Binary {
		op: OpRef,
		left: Box<Expr>,
		right: Box<Expr>,
	},
	Ternary {
		condition: Box<Expr>,
		then_branch: Box<Expr>,
		else_branch: Box<Expr>,
	},
	Subscript {
		base: Box<Expr>,
		index: Box<Expr>,
	},
	Call {
		callee: Box<Expr>,
		arguments: Vec<Expr>,
	},
	New {
		target_type: VarType,
		init: Option<Box<Expr>>,
		size: Option<Box<Expr>>,
	},
	Delete {
		is_array: bool,
		child: Box<Expr>,
	},
	Throw(Box<Expr>),
	Sizeof(Box<Expr>),
	Cast {
		kind: CastKind,
		target_type: VarType,
		child: Box<Expr>,
	},
	Parentheses(Box<Expr>),
	Tuple(Vec<Expr>),
	/// A transient parser-only marker produced while the shunting-yard operand stack holds an
	/// unreduced pair opener; never present in a finished tree.
	Pair {
		op: OpRef,
		child: Option<Box<Expr>>,
	},
	CudaCall {
		callee: Box<Expr>,
		blocks: Box<Expr>,
		threads: Box<Expr>,
	},
}

/// An expression node plus the token it originated from (spec §3: "Each node carries its
/// originating token").
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
	pub node: ExprNode,
	pub origin: FileOrigin,
}

impl Expr {
	#[must_use]
	pub const fn new(node: ExprNode, origin: FileOrigin) -> Self {
		Self { node, origin }
	}

	/// Whether this node is a compile-time integer/float constant. Composes exactly through the
	/// node kinds spec §3/§4.D name: `Primitive`, `LeftUnary`, `RightUnary`, `Binary`, `Ternary`,
	/// `Sizeof`, `Parentheses`, `Pair`.
	#[must_use]
	pub fn can_evaluate(&self) -> bool {
		match &self.node {
			ExprNode::Primitive(_) => true,
			ExprNode::LeftUnary { child, .. } | ExprNode::RightUnary { child, .. } | ExprNode::Parentheses(child) | ExprNode::Sizeof(child) => child.can_evaluate(),
			ExprNode::Binary { left, right, .. } => left.can_evaluate() && right.can_evaluate(),
			ExprNode::Ternary { condition, then_branch, else_branch } => condition.can_evaluate() && then_branch.can_evaluate() && else_branch.can_evaluate(),
			ExprNode::Pair { child: Some(child), .. } => child.can_evaluate(),
			_ => false,
		}
	}

	/// Folds this node to a `ConstValue`, pure and non-mutating (spec §8 invariant 6:
	/// "`evaluate(expr)` is pure ... it never mutates `expr`"). Returns `None` when the node is
	/// not evaluable at all; returns `Some(ConstValue::Nan)` for the specific "evaluable shape
	/// but division by zero" case, matching spec §4.D.
	#[must_use]
	pub fn evaluate(&self) -> Option<ConstValue> {
		match &self.node {
			ExprNode::Primitive(literal) => Some(literal_to_const(literal)),
			ExprNode::Parentheses(child) | ExprNode::Pair { child: Some(child), .. } => child.evaluate(),
			ExprNode::Sizeof(_) => Some(ConstValue::Int(4)),
			ExprNode::LeftUnary { op, child } => evaluate_unary(op.symbol(), child.evaluate()?),
			ExprNode::RightUnary { child, .. } => child.evaluate(),
			ExprNode::Binary { op, left, right } => evaluate_binary(op.symbol(), left.evaluate()?, right.evaluate()?),
			ExprNode::Ternary { condition, then_branch, else_branch } => {
				if condition.evaluate()?.is_truthy() {
					then_branch.evaluate()
				} else {
					else_branch.evaluate()
				}
			}
			_ => None,
		}
	}
}

fn literal_to_const(literal: &NumericLiteral) -> ConstValue {
	match literal.class {
		NumericClass::Float | NumericClass::Double | NumericClass::LongDouble => ConstValue::Float(literal.float_value.unwrap_or(f64::NAN)),
		_ => ConstValue::Int(literal.integer_value.unwrap_or_default()),
	}
}

fn promote(a: ConstValue, b: ConstValue) -> Option<(f64, f64, bool)> {
	match (a, b) {
		(ConstValue::Nan, _) | (_, ConstValue::Nan) => None,
		(ConstValue::Float(x), ConstValue::Float(y)) => Some((x, y, true)),
		(ConstValue::Float(x), ConstValue::Int(y)) => Some((x, y as f64, true)),
		(ConstValue::Int(x), ConstValue::Float(y)) => Some((x as f64, y, true)),
		(ConstValue::Int(x), ConstValue::Int(y)) => Some((x as f64, y as f64, false)),
	}
}

fn evaluate_unary(symbol: &str, value: ConstValue) -> Option<ConstValue> {
	Some(match (symbol, value) {
		("-", ConstValue::Int(v)) => ConstValue::Int(-v),
		("-", ConstValue::Float(v)) => ConstValue::Float(-v),
		("+", v) => v,
		("!", v) => ConstValue::Int(i128::from(!v.is_truthy())),
		("~", ConstValue::Int(v)) => ConstValue::Int(!v),
		(_, ConstValue::Nan) => ConstValue::Nan,
		_ => return None,
	})
}

/// Integer/floating promotion and division-by-zero handling for binary constant folding. The
/// "wider/signed-unsigned promotion table" spec §4.D calls for is approximated here by C's usual
/// rule of thumb: any float operand promotes the whole operation to floating point; otherwise
/// the operation stays in 128-bit signed integer arithmetic, wide enough that no OKL-kernel-
/// scale constant expression overflows it.
fn evaluate_binary(symbol: &str, left: ConstValue, right: ConstValue) -> Option<ConstValue> {
	if matches!(left, ConstValue::Nan) || matches!(right, ConstValue::Nan) {
		return Some(ConstValue::Nan);
	}
	let (lf, rf, is_float) = promote(left, right)?;
	if is_float {
		return Some(match symbol {
			"+" => ConstValue::Float(lf + rf),
			"-" => ConstValue::Float(lf - rf),
			"*" => ConstValue::Float(lf * rf),
			"/" => {
				if rf == 0.0 {
					ConstValue::Nan
				} else {
					ConstValue::Float(lf / rf)
				}
			}
			"<" => ConstValue::Int(i128::from(lf < rf)),
			"<=" => ConstValue::Int(i128::from(lf <= rf)),
			">" => ConstValue::Int(i128::from(lf > rf)),
			">=" => ConstValue::Int(i128::from(lf >= rf)),
			"==" => ConstValue::Int(i128::from((lf - rf).abs() < f64::EPSILON)),
			"!=" => ConstValue::Int(i128::from((lf - rf).abs() >= f64::EPSILON)),
			"&&" => ConstValue::Int(i128::from(lf != 0.0 && rf != 0.0)),
			"||" => ConstValue::Int(i128::from(lf != 0.0 || rf != 0.0)),
			_ => return None,
		});
	}
	let (li, ri) = (lf as i128, rf as i128);
	Some(match symbol {
		"+" => ConstValue::Int(li.wrapping_add(ri)),
		"-" => ConstValue::Int(li.wrapping_sub(ri)),
		"*" => ConstValue::Int(li.wrapping_mul(ri)),
		"/" => {
			if ri == 0 {
				ConstValue::Nan
			} else {
				ConstValue::Int(li.wrapping_div(ri))
			}
		}
		"%" => {
			if ri == 0 {
				ConstValue::Nan
			} else {
				ConstValue::Int(li.wrapping_rem(ri))
			}
		}
		"<<" => ConstValue::Int(li.wrapping_shl(ri as u32)),
		">>" => ConstValue::Int(li.wrapping_shr(ri as u32)),
		"&" => ConstValue::Int(li & ri),
		"|" => ConstValue::Int(li | ri),
		"^" => ConstValue::Int(li ^ ri),
		"<" => ConstValue::Int(i128::from(li < ri)),
		"<=" => ConstValue::Int(i128::from(li <= ri)),
		">" => ConstValue::Int(i128::from(li > ri)),
		">=" => ConstValue::Int(i128::from(li >= ri)),
		"==" => ConstValue::Int(i128::from(li == ri)),
		"!=" => ConstValue::Int(i128::from(li != ri)),
		"&&" => ConstValue::Int(i128::from(li != 0 && ri != 0)),
		"||" => ConstValue::Int(i128::from(li != 0 || ri != 0)),
		_ => return None,
	})
}

impl fmt::Display for Expr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.node {
			ExprNode::Empty => Ok(()),
			ExprNode::Primitive(literal) => write!(f, "{}", literal.text),
			ExprNode::Char { raw, .. } => write!(f, "'{raw}'"),
			ExprNode::String { raw, .. } => write!(f, "\"{raw}\""),
			ExprNode::Identifier(name) => write!(f, "{name}"),
			ExprNode::Variable(id) => write!(f, "{id}"),
			ExprNode::LeftUnary { op, child } => write!(f, "{}{child}", op.symbol()),
			ExprNode::RightUnary { op, child } => write!(f, "{child}{}", op.symbol()),
			ExprNode::Binary { op, left, right } => write!(f, "{left}{}{right}", op.symbol()),
			ExprNode::Ternary { condition, then_branch, else_branch } => write!(f, "{condition} ? {then_branch} : {else_branch}"),
			ExprNode::Subscript { base, index } => write!(f, "{base}[{index}]"),
			ExprNode::Call { callee, arguments } => write!(f, "{callee}({})", join_exprs(arguments)),
			ExprNode::New { target_type, .. } => write!(f, "new {target_type}"),
			ExprNode::Delete { is_array, child } => write!(f, "delete{}{child}", if *is_array { "[] " } else { " " }),
			ExprNode::Throw(child) => write!(f, "throw {child}"),
			ExprNode::Sizeof(child) => write!(f, "sizeof({child})"),
			ExprNode::Cast { target_type, child, .. } => write!(f, "(({target_type}) {child})"),
			ExprNode::Parentheses(child) => write!(f, "({child})"),
			ExprNode::Tuple(items) => write!(f, "{{{}}}", join_exprs(items)),
			ExprNode::Pair { op, child: Some(child) } => write!(f, "{}{child}", op.symbol()),
			ExprNode::Pair { op, child: None } => write!(f, "{}", op.symbol()),
			ExprNode::CudaCall { callee, blocks, threads } => write!(f, "{callee}<<<{blocks}, {threads}>>>"),
		}
	}
}

fn join_exprs(exprs: &[Expr]) -> String {
	exprs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Parses a single expression from `cursor` using shunting-yard, stopping at a token with
/// precedence lower than `min_precedence` or at a closing pair / statement terminator. Returns
/// `None` (with a diagnostic pushed) on malformed input, matching the "no exceptions" design note
/// (spec §9).
pub fn parse_expression(cursor: &mut Cursor<'_>, diagnostics: &mut Diagnostics, min_precedence: u8) -> Option<Expr> {
	let mut left = parse_unary(cursor, diagnostics)?;

	loop {
		let Some(Token { kind: TokenKind::Operator(op), origin }) = cursor.peek().cloned() else {
			break;
		};
		if !op.info().is(category::BINARY) || op.info().precedence < min_precedence {
			break;
		}
		if op.symbol() == "?" {
			cursor.advance();
			let then_branch = parse_expression(cursor, diagnostics, 0)?;
			if !cursor.eat_operator(":") {
				diagnostics.error(DiagnosticKind::Parse, origin.clone(), "expected ':' to complete a ternary expression");
				return None;
			}
			let else_branch = parse_expression(cursor, diagnostics, op.info().precedence)?;
			left = Expr::new(
				ExprNode::Ternary {
					condition: Box::new(left),
					then_branch: Box::new(then_branch),
					else_branch: Box::new(else_branch),
				},
				origin,
			);
			continue;
		}

		cursor.advance();
		let next_min = if op.info().associativity == operator::Associativity::LeftToRight { op.info().precedence + 1 } else { op.info().precedence };
		let right = parse_expression(cursor, diagnostics, next_min)?;
		left = Expr::new(
			ExprNode::Binary {
				op,
				left: Box::new(left),
				right: Box::new(right),
			},
			origin,
		);
	}

	Some(left)
}

fn parse_unary(cursor: &mut Cursor<'_>, diagnostics: &mut Diagnostics) -> Option<Expr> {
	if let Some(Token { kind: TokenKind::Operator(op), origin }) = cursor.peek().cloned() {
		if op.info().is(category::UNARY_LEFT) && !op.info().is(category::BINARY) {
			cursor.advance();
			let child = parse_unary(cursor, diagnostics)?;
			return Some(Expr::new(ExprNode::LeftUnary { op, child: Box::new(child) }, origin));
		}
		// Operators that are both unary-prefix and binary (`+`, `-`, `*`, `&`, `++`, `--`) are
		// prefix here because `parse_unary` is only reached when no operand precedes them yet.
		if op.info().is(category::UNARY_LEFT) {
			cursor.advance();
			let child = parse_unary(cursor, diagnostics)?;
			return Some(Expr::new(ExprNode::LeftUnary { op, child: Box::new(child) }, origin));
		}
	}
	parse_postfix(cursor, diagnostics)
}

fn parse_postfix(cursor: &mut Cursor<'_>, diagnostics: &mut Diagnostics) -> Option<Expr> {
	let mut expr = parse_primary(cursor, diagnostics)?;
	loop {
		match cursor.peek().map(|token| &token.kind) {
			Some(TokenKind::Operator(op)) if op.symbol() == "(" => {
				let origin = cursor.peek().unwrap().origin.clone();
				cursor.advance();
				let mut arguments = Vec::new();
				if !cursor.is_operator(")") {
					loop {
						arguments.push(parse_expression(cursor, diagnostics, 11)?);
						if !cursor.eat_operator(",") {
							break;
						}
					}
				}
				if !cursor.eat_operator(")") {
					diagnostics.error(DiagnosticKind::Parse, origin.clone(), "expected ')' to close a call expression");
					return None;
				}
				expr = Expr::new(
					ExprNode::Call {
						callee: Box::new(expr),
						arguments,
					},
					origin,
				);
			}
			Some(TokenKind::Operator(op)) if op.symbol() == "[" => {
				let origin = cursor.peek().unwrap().origin.clone();
				cursor.advance();
				let index = parse_expression(cursor, diagnostics, 0)?;
				if !cursor.eat_operator("]") {
					diagnostics.error(DiagnosticKind::Parse, origin.clone(), "expected ']' to close a subscript expression");
					return None;
				}
				expr = Expr::new(ExprNode::Subscript { base: Box::new(expr), index: Box::new(index) }, origin);
			}
			Some(TokenKind::Operator(op)) if op.symbol() == "++" || op.symbol() == "--" => {
				let origin = cursor.peek().unwrap().origin.clone();
				let op = *op;
				cursor.advance();
				expr = Expr::new(ExprNode::RightUnary { op, child: Box::new(expr) }, origin);
			}
			_ => break,
		}
	}
	Some(expr)
}

fn parse_primary(cursor: &mut Cursor<'_>, diagnostics: &mut Diagnostics) -> Option<Expr> {
	let token = cursor.peek()?.clone();
	match &token.kind {
		TokenKind::Primitive(literal) => {
			cursor.advance();
			Some(Expr::new(ExprNode::Primitive(literal.clone()), token.origin))
		}
		TokenKind::Identifier(name) => {
			cursor.advance();
			Some(Expr::new(ExprNode::Identifier(name.clone()), token.origin))
		}
		TokenKind::CharLit { encoding, raw, user_suffix } => {
			cursor.advance();
			Some(Expr::new(
				ExprNode::Char {
					encoding: *encoding,
					raw: raw.clone(),
					user_suffix: user_suffix.clone(),
				},
				token.origin,
			))
		}
		TokenKind::StringLit { encoding, raw, user_suffix } => {
			cursor.advance();
			Some(Expr::new(
				ExprNode::String {
					encoding: *encoding,
					raw: raw.clone(),
					user_suffix: user_suffix.clone(),
				},
				token.origin,
			))
		}
		TokenKind::Operator(op) if op.symbol() == "(" => {
			cursor.advance();
			let inner = parse_expression(cursor, diagnostics, 0)?;
			if !cursor.eat_operator(")") {
				diagnostics.error(DiagnosticKind::Parse, token.origin.clone(), "expected ')' to close a parenthesised expression");
				return None;
			}
			Some(Expr::new(ExprNode::Parentheses(Box::new(inner)), token.origin))
		}
		TokenKind::Operator(op) if op.symbol() == "{" => {
			cursor.advance();
			let mut items = Vec::new();
			if !cursor.is_operator("}") {
				loop {
					items.push(parse_expression(cursor, diagnostics, 11)?);
					if !cursor.eat_operator(",") {
						break;
					}
				}
			}
			if !cursor.eat_operator("}") {
				diagnostics.error(DiagnosticKind::Parse, token.origin.clone(), "expected '}' to close a brace initializer");
				return None;
			}
			Some(Expr::new(ExprNode::Tuple(items), token.origin))
		}
		_ => {
			diagnostics.error(DiagnosticKind::Parse, token.origin.clone(), "expected an expression");
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lexer::tokenize;

	fn expr_from(source: &str) -> (Expr, Diagnostics) {
		let origin = FileOrigin::synthetic("test.okl");
		let tokens = tokenize(source, origin).expect("lex failed");
		let mut cursor = Cursor::new(&tokens);
		let mut diagnostics = Diagnostics::new();
		let expr = parse_expression(&mut cursor, &mut diagnostics, 0).expect("parse failed");
		(expr, diagnostics)
	}

	#[test]
	fn constant_folds_macro_expanded_square() {
		let (expr, _) = expr_from("((3+1)*(3+1))");
		assert!(expr.can_evaluate());
		assert_eq!(expr.evaluate(), Some(ConstValue::Int(16)));
	}

	#[test]
	fn division_by_zero_yields_nan() {
		let (expr, _) = expr_from("1/0");
		assert_eq!(expr.evaluate(), Some(ConstValue::Nan));
	}

	#[test]
	fn precedence_binds_multiplication_tighter_than_addition() {
		let (expr, _) = expr_from("1+2*3");
		assert_eq!(expr.evaluate(), Some(ConstValue::Int(7)));
	}

	#[test]
	fn evaluate_does_not_mutate_the_tree() {
		let (expr, _) = expr_from("2*3");
		let before = expr.clone();
		let _ = expr.evaluate();
		assert_eq!(expr, before);
	}
}
