//! The process-wide operator table (spec §3 "`OpRef`", §6 "Operator table layout", §9
//! "Dynamic operator dispatch"). Operators are data, not code: an immutable table keyed by
//! longest-match symbol, looked up by the tokenizer and the shunting-yard engine by reference.
//!
//! Grounded on the concrete C operator/precedence enumeration in
//! `examples/original_source/parser_sandbox/src/operator.cpp`.

/// Bitmask categories an operator can belong to. An operator may belong to more than one (e.g.
/// `+` is both a left-unary prefix and a binary operator; `++` is both left- and right-unary).
pub mod category {
	pub const UNARY_LEFT: u32 = 1 << 0;
	pub const UNARY_RIGHT: u32 = 1 << 1;
	pub const BINARY: u32 = 1 << 2;
	pub const TERNARY: u32 = 1 << 3;
	pub const ASSIGNMENT: u32 = 1 << 4;
	pub const COMPARISON: u32 = 1 << 5;
	pub const BITWISE: u32 = 1 << 6;
	pub const SHIFT: u32 = 1 << 7;
	pub const PAIR_OPEN: u32 = 1 << 8;
	pub const PAIR_CLOSE: u32 = 1 << 9;
	pub const PUNCTUATION: u32 = 1 << 10;
	pub const COMMENT_MARKER: u32 = 1 << 11;
	pub const PREPROCESSOR_MARKER: u32 = 1 << 12;
}

/// Associativity of a binary/ternary/assignment operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
	LeftToRight,
	RightToLeft,
}

/// A single entry of the operator table: symbol, category bitmask, precedence (higher binds
/// tighter), and associativity for binary-ish operators.
#[derive(Debug, Clone, Copy)]
pub struct OperatorInfo {
	pub symbol: &'static str,
	pub categories: u32,
	pub precedence: u8,
	pub associativity: Associativity,
}

impl OperatorInfo {
	#[must_use]
	pub const fn is(&self, mask: u32) -> bool {
		self.categories & mask != 0
	}
}

/// A reference into the process-wide [`OPERATORS`] table. Cheap to copy, compared by index —
/// never by re-deriving behaviour from the symbol string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpRef(pub usize);

impl OpRef {
	#[must_use]
	pub fn info(self) -> &'static OperatorInfo {
		&OPERATORS[self.0]
	}

	#[must_use]
	pub fn symbol(self) -> &'static str {
		self.info().symbol
	}

	#[must_use]
	pub fn lookup(symbol: &str) -> Option<Self> {
		SYMBOL_INDEX.get(symbol).map(|&index| Self(index))
	}
}

macro_rules! op {
	($symbol:literal, $categories:expr, $precedence:expr, $assoc:expr) => {
		OperatorInfo {
			symbol: $symbol,
			categories: $categories,
			precedence: $precedence,
			associativity: $assoc,
		}
	};
}

use category::{ASSIGNMENT, BINARY, BITWISE, COMMENT_MARKER, COMPARISON, PAIR_CLOSE, PAIR_OPEN, PREPROCESSOR_MARKER, PUNCTUATION, SHIFT, TERNARY, UNARY_LEFT, UNARY_RIGHT};
use Associativity::{LeftToRight, RightToLeft};

/// Precedence follows standard C operator-precedence levels, highest-binds-tightest, scaled so
/// there's headroom between levels for future operators without renumbering everything.
pub static OPERATORS: &[OperatorInfo] = &[
	op!("::", PUNCTUATION, 160, LeftToRight),
	op!(".", PUNCTUATION, 150, LeftToRight),
	op!("->", PUNCTUATION, 150, LeftToRight),
	op!("++", UNARY_LEFT | UNARY_RIGHT, 150, RightToLeft),
	op!("--", UNARY_LEFT | UNARY_RIGHT, 150, RightToLeft),
	op!("!", UNARY_LEFT, 140, RightToLeft),
	op!("~", UNARY_LEFT | BITWISE, 140, RightToLeft),
	op!("sizeof", UNARY_LEFT, 140, RightToLeft),
	op!("*", UNARY_LEFT | BINARY, 130, LeftToRight),
	op!("/", BINARY, 130, LeftToRight),
	op!("%", BINARY, 130, LeftToRight),
	op!("+", UNARY_LEFT | BINARY, 120, LeftToRight),
	op!("-", UNARY_LEFT | BINARY, 120, LeftToRight),
	op!("<<", BINARY | SHIFT, 110, LeftToRight),
	op!(">>", BINARY | SHIFT, 110, LeftToRight),
	op!("<", BINARY | COMPARISON, 100, LeftToRight),
	op!("<=", BINARY | COMPARISON, 100, LeftToRight),
	op!(">", BINARY | COMPARISON, 100, LeftToRight),
	op!(">=", BINARY | COMPARISON, 100, LeftToRight),
	op!("==", BINARY | COMPARISON, 90, LeftToRight),
	op!("!=", BINARY | COMPARISON, 90, LeftToRight),
	op!("&", UNARY_LEFT | BINARY | BITWISE, 80, LeftToRight),
	op!("^", BINARY | BITWISE, 70, LeftToRight),
	op!("|", BINARY | BITWISE, 60, LeftToRight),
	op!("&&", BINARY, 50, LeftToRight),
	op!("||", BINARY, 40, LeftToRight),
	op!("?", TERNARY, 30, RightToLeft),
	op!(":", TERNARY, 30, RightToLeft),
	op!("=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!("+=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!("-=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!("*=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!("/=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!("%=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!("&=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!("|=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!("^=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!("<<=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!(">>=", BINARY | ASSIGNMENT, 20, RightToLeft),
	op!(",", BINARY, 10, LeftToRight),
	op!("(", PAIR_OPEN, 255, LeftToRight),
	op!(")", PAIR_CLOSE, 255, LeftToRight),
	op!("[", PAIR_OPEN, 255, LeftToRight),
	op!("]", PAIR_CLOSE, 255, LeftToRight),
	op!("{", PAIR_OPEN, 255, LeftToRight),
	op!("}", PAIR_CLOSE, 255, LeftToRight),
	op!(";", PUNCTUATION, 0, LeftToRight),
	op!("//", COMMENT_MARKER, 0, LeftToRight),
	op!("/*", COMMENT_MARKER, 0, LeftToRight),
	op!("*/", COMMENT_MARKER, 0, LeftToRight),
	op!("#", PREPROCESSOR_MARKER, 0, LeftToRight),
	op!("##", PREPROCESSOR_MARKER, 0, LeftToRight),
	op!("@", PUNCTUATION, 0, LeftToRight),
];

static SYMBOL_INDEX: phf::Map<&'static str, usize> = phf::phf_map! {
	"::" => 0_usize,
	"." => 1,
	"->" => 2,
	"++" => 3,
	"--" => 4,
	"!" => 5,
	"~" => 6,
	"sizeof" => 7,
	"*" => 8,
	"/" => 9,
	"%" => 10,
	"+" => 11,
	"-" => 12,
	"<<" => 13,
	">>" => 14,
	"<" => 15,
	"<=" => 16,
	">" => 17,
	">=" => 18,
	"==" => 19,
	"!=" => 20,
	"&" => 21,
	"^" => 22,
	"|" => 23,
	"&&" => 24,
	"||" => 25,
	"?" => 26,
	":" => 27,
	"=" => 28,
	"+=" => 29,
	"-=" => 30,
	"*=" => 31,
	"/=" => 32,
	"%=" => 33,
	"&=" => 34,
	"|=" => 35,
	"^=" => 36,
	"<<=" => 37,
	">>=" => 38,
	"," => 39,
	"(" => 40,
	")" => 41,
	"[" => 42,
	"]" => 43,
	"{" => 44,
	"}" => 45,
	";" => 46,
	"//" => 47,
	"/*" => 48,
	"*/" => 49,
	"#" => 50,
	"##" => 51,
	"@" => 52,
};

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lookup_matches_table_symbol() {
		let op_ref = OpRef::lookup("+=").expect("+= must be registered");
		assert_eq!(op_ref.symbol(), "+=");
		assert!(op_ref.info().is(ASSIGNMENT));
	}

	#[test]
	fn unary_and_binary_share_a_symbol() {
		let plus = OpRef::lookup("+").unwrap();
		assert!(plus.info().is(UNARY_LEFT));
		assert!(plus.info().is(BINARY));
	}

	#[test]
	fn comparison_operators_have_equal_precedence() {
		let lt = OpRef::lookup("<").unwrap();
		let gte = OpRef::lookup(">=").unwrap();
		assert_eq!(lt.info().precedence, gte.info().precedence);
	}
}
