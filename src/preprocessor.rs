//! The macro preprocessor (spec §4.B). Runs on the tokenizer's output before the statement
//! parser ever sees it: object-like and function-like `#define`s, the `#if`/`#ifdef`/`#elif`
//! conditional stack, `#include`, and the special predefined macros.
//!
//! Grounded on the original implementation's `preprocessor.cpp`/`macro.hpp` macro-table shape:
//! a name keyed table of replacement-list macros plus a stack of conditional frames, walked one
//! source line at a time.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::expr::ConstValue;
use crate::token::{FileOrigin, NumericClass, NumericLiteral, Token, TokenKind};

/// A registered macro's parameter list and replacement tokens.
#[derive(Debug, Clone)]
struct MacroDef {
	params: Option<Vec<String>>,
	is_variadic: bool,
	replacement: Vec<Token>,
}

/// One frame of the `#if`/`#ifdef`/`#elif`/`#else`/`#endif` stack.
struct ConditionalFrame {
	/// Whether the branch currently open in this frame should emit tokens, accounting for every
	/// enclosing frame also being active.
	active: bool,
	/// Whether any branch in this frame has already been taken (so a later `#else`/`#elif` does
	/// not re-enter once one has fired).
	taken: bool,
	/// Whether the frame's enclosing conditional, if any, is itself active.
	parent_active: bool,
}

/// Resolves `#include "..."`/`#include <...>` to the included file's path and text. The
/// preprocessor itself has no filesystem access; a real resolver is supplied by
/// [`crate::session::Session`].
pub trait IncludeResolver {
	fn resolve(&mut self, name: &str, is_system: bool, including_file: &std::path::Path) -> Option<(PathBuf, String)>;
}

/// An [`IncludeResolver`] that never finds anything, for preprocessing an isolated source string
/// with no include search path (e.g. unit tests).
pub struct NoIncludes;
impl IncludeResolver for NoIncludes {
	fn resolve(&mut self, _name: &str, _is_system: bool, _including_file: &std::path::Path) -> Option<(PathBuf, String)> {
		None
	}
}

pub struct Preprocessor<'a> {
	macros: HashMap<String, MacroDef>,
	conditionals: Vec<ConditionalFrame>,
	counter: u64,
	diagnostics: &'a mut Diagnostics,
}

impl<'a> Preprocessor<'a> {
	#[must_use]
	pub fn new(diagnostics: &'a mut Diagnostics) -> Self {
		Self {
			macros: HashMap::new(),
			conditionals: Vec::new(),
			counter: 0,
			diagnostics,
		}
	}

	#[must_use]
	fn is_active(&self) -> bool {
		self.conditionals.last().is_none_or(|frame| frame.active)
	}

	/// Seeds an object-like macro before `run` is called, for the compiler-macros a backend
	/// installs during `before_preprocessing` (spec §4.J "installs its compiler-macros during
	/// preprocessing", e.g. the serial backend's `restrict` redefinition).
	pub fn define_object_macro(&mut self, name: &str, replacement_text: &str) -> anyhow::Result<()> {
		let origin = FileOrigin::synthetic("<builtin>");
		let tokens = crate::lexer::tokenize(replacement_text, origin)?;
		self.macros.insert(
			name.to_owned(),
			MacroDef {
				params: None,
				is_variadic: false,
				replacement: tokens,
			},
		);
		Ok(())
	}

	pub fn undefine_macro(&mut self, name: &str) {
		self.macros.remove(name);
	}

	/// Runs the preprocessor over a tokenized source, expanding macros and resolving conditional
	/// directives. Tokens are still newline-delimited on return; run
	/// [`crate::token_stream::normalize`] afterwards before parsing.
	pub fn run(&mut self, tokens: Vec<Token>, source_file: &std::path::Path, includes: &mut dyn IncludeResolver) -> Vec<Token> {
		let mut output = Vec::new();
		let mut lines = split_lines(tokens);
		let mut index = 0;
		while index < lines.len() {
			let line = std::mem::take(&mut lines[index]);
			index += 1;
			if is_directive_line(&line) {
				self.handle_directive(line, source_file, includes, &mut output);
				continue;
			}
			if self.is_active() {
				let mut cursor = 0;
				self.expand_tokens(&line, &mut cursor, &mut Vec::new(), &mut output);
				if let Some(origin) = output.last().map(|t: &Token| t.origin.clone()) {
					output.push(Token::new(TokenKind::Newline, origin));
				}
			}
		}
		if !self.conditionals.is_empty() {
			self.diagnostics.error(DiagnosticKind::Preprocessor, FileOrigin::synthetic(source_file), "unterminated #if: missing #endif");
		}
		output
	}

	fn handle_directive(&mut self, line: Vec<Token>, source_file: &std::path::Path, includes: &mut dyn IncludeResolver, output: &mut Vec<Token>) {
		let mut rest = line.into_iter().filter(|t| !t.kind.is_newline());
		rest.next(); // the leading `#`
		let Some(keyword_token) = rest.next() else { return };
		let Some(keyword) = keyword_token.kind.as_identifier().map(str::to_owned) else { return };
		let rest: Vec<Token> = rest.collect();
		let origin = keyword_token.origin;

		match keyword.as_str() {
			"define" if self.is_active() => self.define(&rest, &origin),
			"undef" if self.is_active() => {
				if let Some(name) = rest.first().and_then(|t| t.kind.as_identifier()) {
					self.macros.remove(name);
				}
			},
			"ifdef" => {
				let defined = rest.first().and_then(|t| t.kind.as_identifier()).is_some_and(|name| self.macros.contains_key(name));
				self.push_conditional(defined);
			},
			"ifndef" => {
				let defined = rest.first().and_then(|t| t.kind.as_identifier()).is_some_and(|name| self.macros.contains_key(name));
				self.push_conditional(!defined);
			},
			"if" if self.is_active() => {
				let value = self.evaluate_condition(&rest, &origin);
				self.push_conditional(value);
			},
			"if" => self.push_conditional(false),
			"elif" => self.handle_elif(&rest, &origin),
			"else" => self.handle_else(&origin),
			"endif" => {
				self.conditionals.pop();
			},
			"include" if self.is_active() => self.handle_include(&rest, source_file, includes, output),
			"error" if self.is_active() => {
				let message = render_tokens(&rest);
				self.diagnostics.error(DiagnosticKind::Preprocessor, origin, format!("#error {message}"));
			},
			"warning" if self.is_active() => {
				let message = render_tokens(&rest);
				self.diagnostics.warning(DiagnosticKind::Preprocessor, origin, format!("#warning {message}"));
			},
			"pragma" if self.is_active() => {
				output.push(Token::new(TokenKind::Pragma(render_tokens(&rest)), origin));
			},
			"line" | _ => {},
		}
	}

	fn push_conditional(&mut self, condition: bool) {
		let parent_active = self.is_active();
		self.conditionals.push(ConditionalFrame {
			active: parent_active && condition,
			taken: condition,
			parent_active,
		});
	}

	fn handle_elif(&mut self, rest: &[Token], origin: &FileOrigin) {
		let Some(frame) = self.conditionals.last_mut() else { return };
		if !frame.parent_active || frame.taken {
			if let Some(frame) = self.conditionals.last_mut() {
				frame.active = false;
			}
			return;
		}
		let value = self.evaluate_condition(rest, origin);
		if let Some(frame) = self.conditionals.last_mut() {
			frame.active = value;
			frame.taken = value;
		}
	}

	fn handle_else(&mut self, _origin: &FileOrigin) {
		if let Some(frame) = self.conditionals.last_mut() {
			frame.active = frame.parent_active && !frame.taken;
			frame.taken = true;
		}
	}

	fn handle_include(&mut self, rest: &[Token], source_file: &std::path::Path, includes: &mut dyn IncludeResolver, output: &mut Vec<Token>) {
		let Some(first) = rest.first() else { return };
		let (name, is_system) = match &first.kind {
			TokenKind::HeaderName { system, text } => (text.clone(), *system),
			TokenKind::StringLit { raw, .. } => (raw.clone(), false),
			_ => return,
		};
		let Some((path, text)) = includes.resolve(&name, is_system, source_file) else {
			self.diagnostics.error(DiagnosticKind::Preprocessor, first.origin.clone(), format!("cannot find include file '{name}'"));
			return;
		};
		let Ok(included_tokens) = crate::lexer::tokenize(&text, FileOrigin::synthetic(&path)) else {
			self.diagnostics.error(DiagnosticKind::Preprocessor, first.origin.clone(), format!("'{name}' contains a lexical error"));
			return;
		};
		output.extend(self.run(included_tokens, &path, includes));
	}

	fn define(&mut self, rest: &[Token], origin: &FileOrigin) {
		let Some(name_token) = rest.first() else { return };
		let Some(name) = name_token.kind.as_identifier() else { return };
		let name = name.to_owned();
		let after_name = &rest[1..];

		let is_function_like = after_name.first().is_some_and(|t| matches!(&t.kind, TokenKind::Operator(op) if op.symbol() == "(")) && name_token.origin.byte_offset + name.len() == after_name[0].origin.byte_offset;

		if is_function_like {
			let mut params = Vec::new();
			let mut is_variadic = false;
			let mut cursor = 1;
			while let Some(token) = after_name.get(cursor) {
				match &token.kind {
					TokenKind::Operator(op) if op.symbol() == ")" => {
						cursor += 1;
						break;
					},
					TokenKind::Operator(op) if op.symbol() == "," => {
						cursor += 1;
					},
					TokenKind::Identifier(id) => {
						params.push(id.clone());
						cursor += 1;
					},
					TokenKind::Operator(op) if op.symbol() == "." => {
						// `...` variadic marker (three consecutive `.` operator tokens).
						is_variadic = true;
						cursor += 1;
					},
					_ => cursor += 1,
				}
			}
			let replacement = after_name[cursor..].to_vec();
			self.macros.insert(
				name,
				MacroDef {
					params: Some(params),
					is_variadic,
					replacement,
				},
			);
		} else {
			self.macros.insert(
				name,
				MacroDef {
					params: None,
					is_variadic: false,
					replacement: after_name.to_vec(),
				},
			);
		}
		let _ = origin;
	}

	/// Expands every token in `tokens[*cursor..]` into `output`, advancing `*cursor` past whatever
	/// each step consumed (a lone token, or a function-like macro call's name plus its whole
	/// parenthesized argument list). `active_expansions` guards against infinite self-referential
	/// expansion (spec §4.B "a macro does not re-expand within its own replacement").
	fn expand_tokens(&mut self, tokens: &[Token], cursor: &mut usize, active_expansions: &mut Vec<String>, output: &mut Vec<Token>) {
		while *cursor < tokens.len() {
			if tokens[*cursor].kind.is_newline() {
				output.push(tokens[*cursor].clone());
				*cursor += 1;
				continue;
			}
			self.expand_one(tokens, cursor, active_expansions, output);
		}
	}

	/// Expands the token at `tokens[*cursor]`, consuming a trailing argument list too if it names
	/// a function-like macro immediately followed by `(`.
	fn expand_one(&mut self, tokens: &[Token], cursor: &mut usize, active_expansions: &mut Vec<String>, output: &mut Vec<Token>) {
		let token = tokens[*cursor].clone();
		let Some(name) = token.kind.as_identifier() else {
			output.push(token);
			*cursor += 1;
			return;
		};
		if let Some(builtin) = self.expand_builtin(name, &token.origin) {
			output.push(builtin);
			*cursor += 1;
			return;
		}
		if active_expansions.contains(&name.to_owned()) {
			output.push(token);
			*cursor += 1;
			return;
		}
		let Some(def) = self.macros.get(name).cloned() else {
			output.push(token);
			*cursor += 1;
			return;
		};
		*cursor += 1;

		let Some(params) = &def.params else {
			active_expansions.push(name.to_owned());
			let mut body_cursor = 0;
			self.expand_tokens(&def.replacement, &mut body_cursor, active_expansions, output);
			active_expansions.pop();
			return;
		};

		if !matches!(tokens.get(*cursor).map(|t| &t.kind), Some(TokenKind::Operator(op)) if op.symbol() == "(") {
			// A function-like macro name not followed by '(' is left untouched (standard C rule).
			output.push(token);
			return;
		}
		*cursor += 1;
		let params = params.clone();
		let Some(arguments) = self.collect_arguments(tokens, cursor, &token.origin) else {
			output.push(token);
			return;
		};
		let normalized_arguments = normalize_call_arguments(arguments, params.len(), def.is_variadic);

		let substituted = self.substitute(&def, &params, &normalized_arguments, active_expansions, &token.origin);
		active_expansions.push(name.to_owned());
		let mut body_cursor = 0;
		self.expand_tokens(&substituted, &mut body_cursor, active_expansions, output);
		active_expansions.pop();
	}

	/// Consumes tokens from `tokens[*cursor..]` up through the matching `)` of a macro call whose
	/// `(` has already been consumed, splitting on top-level commas into separate arguments.
	/// Returns `None` (with a diagnostic) if the call's argument list runs off the end of the line
	/// without a matching `)`.
	fn collect_arguments(&mut self, tokens: &[Token], cursor: &mut usize, origin: &FileOrigin) -> Option<Vec<Vec<Token>>> {
		let mut arguments: Vec<Vec<Token>> = vec![Vec::new()];
		let mut depth: usize = 0;
		loop {
			let Some(token) = tokens.get(*cursor) else {
				self.diagnostics.error(DiagnosticKind::Preprocessor, origin.clone(), "unterminated macro invocation: missing ')'");
				return None;
			};
			match &token.kind {
				TokenKind::Operator(op) if op.symbol() == "(" => {
					depth += 1;
					arguments.last_mut().expect("arguments always has a current slot").push(token.clone());
					*cursor += 1;
				},
				TokenKind::Operator(op) if op.symbol() == ")" => {
					*cursor += 1;
					if depth == 0 {
						break;
					}
					depth -= 1;
					arguments.last_mut().expect("arguments always has a current slot").push(token.clone());
				},
				TokenKind::Operator(op) if op.symbol() == "," && depth == 0 => {
					arguments.push(Vec::new());
					*cursor += 1;
				},
				_ => {
					arguments.last_mut().expect("arguments always has a current slot").push(token.clone());
					*cursor += 1;
				},
			}
		}
		Some(arguments)
	}

	/// Builds the replacement token list for a function-like macro call: substitutes each
	/// parameter (and `__VA_ARGS__`, for a variadic macro) with its argument, macro-expanding the
	/// argument first unless it's the operand of `#` (stringize) or `##` (paste), which use the
	/// raw, unexpanded argument tokens instead.
	fn substitute(&mut self, def: &MacroDef, params: &[String], arguments: &[Vec<Token>], active_expansions: &mut Vec<String>, call_origin: &FileOrigin) -> Vec<Token> {
		let variadic_tokens = join_variadic_arguments(arguments, params.len(), call_origin);
		let resolve_raw = |name: &str| -> Option<&[Token]> {
			if name == "__VA_ARGS__" && def.is_variadic {
				Some(variadic_tokens.as_slice())
			} else {
				params.iter().position(|p| p == name).map(|index| arguments.get(index).map_or(&[][..], Vec::as_slice))
			}
		};

		let replacement = &def.replacement;
		let mut result: Vec<Token> = Vec::new();
		let mut i = 0;
		while i < replacement.len() {
			let token = &replacement[i];

			if is_operator(token, "#") {
				if let Some(name) = replacement.get(i + 1).and_then(|t| t.kind.as_identifier()) {
					if let Some(raw) = resolve_raw(name) {
						result.push(stringize(raw, &token.origin));
						i += 2;
						continue;
					}
				}
				result.push(token.clone());
				i += 1;
				continue;
			}

			if is_operator(token, "##") {
				i += 1;
				if let Some(next) = replacement.get(i) {
					let right_raw: Vec<Token> = next
						.kind
						.as_identifier()
						.and_then(resolve_raw)
						.map_or_else(|| vec![next.clone()], <[Token]>::to_vec);
					i += 1;
					match (result.pop(), right_raw.split_first()) {
						(Some(left), Some((right_head, right_tail))) => {
							result.extend(paste(&left, right_head, &token.origin));
							result.extend_from_slice(right_tail);
						},
						(Some(left), None) => result.push(left),
						(None, _) => result.extend(right_raw),
					}
				}
				continue;
			}

			if let Some(name) = token.kind.as_identifier() {
				if let Some(raw) = resolve_raw(name) {
					let followed_by_paste = replacement.get(i + 1).is_some_and(|t| is_operator(t, "##"));
					if followed_by_paste {
						result.extend(raw.iter().cloned());
					} else {
						let mut expanded = Vec::new();
						let mut argument_cursor = 0;
						self.expand_tokens(raw, &mut argument_cursor, active_expansions, &mut expanded);
						result.extend(expanded);
					}
					i += 1;
					continue;
				}
			}

			result.push(token.clone());
			i += 1;
		}
		result
	}

	fn expand_builtin(&mut self, name: &str, origin: &FileOrigin) -> Option<Token> {
		match name {
			"__LINE__" => Some(Token::new(TokenKind::Primitive(int_literal(origin.line as i128)), origin.clone())),
			"__FILE__" => Some(Token::new(
				TokenKind::StringLit {
					encoding: crate::token::StringEncoding::Plain,
					raw: origin.file.display().to_string(),
					user_suffix: None,
				},
				origin.clone(),
			)),
			"__COUNTER__" => {
				let value = self.counter;
				self.counter += 1;
				Some(Token::new(TokenKind::Primitive(int_literal(i128::from(value))), origin.clone()))
			},
			_ => None,
		}
	}

	/// Evaluates an `#if`/`#elif` condition line: rewrites `defined NAME`/`defined(NAME)` to
	/// `1`/`0`, expands remaining macros, parses and constant-folds the result. Treats an
	/// identifier left unexpanded (i.e. genuinely undefined) as `0` with a warning diagnostic
	/// (spec §9 open question: "undefined `#if` identifiers treated as 0 with a warning").
	fn evaluate_condition(&mut self, tokens: &[Token], origin: &FileOrigin) -> bool {
		let mut rewritten = Vec::new();
		let mut index = 0;
		while index < tokens.len() {
			if tokens[index].kind.as_identifier() == Some("defined") {
				let (name, consumed) = if tokens.get(index + 1).is_some_and(|t| matches!(&t.kind, TokenKind::Operator(op) if op.symbol() == "(")) {
					(tokens.get(index + 2).and_then(|t| t.kind.as_identifier()), 4)
				} else {
					(tokens.get(index + 1).and_then(|t| t.kind.as_identifier()), 2)
				};
				let is_defined = name.is_some_and(|n| self.macros.contains_key(n));
				rewritten.push(Token::new(TokenKind::Primitive(int_literal(i128::from(is_defined))), origin.clone()));
				index += consumed;
				continue;
			}
			self.expand_one(tokens, &mut index, &mut Vec::new(), &mut rewritten);
		}

		for token in &rewritten {
			if let Some(name) = token.kind.as_identifier() {
				self.diagnostics.warning(DiagnosticKind::Preprocessor, token.origin.clone(), format!("'{name}' is not defined, evaluates to 0"));
			}
		}
		let zeroed: Vec<Token> = rewritten
			.into_iter()
			.map(|token| {
				if token.kind.as_identifier().is_some() {
					Token::new(TokenKind::Primitive(int_literal(0)), token.origin)
				} else {
					token
				}
			})
			.collect();

		let mut cursor = crate::cursor::Cursor::new(&zeroed);
		match crate::expr::parse_expression(&mut cursor, self.diagnostics, 0) {
			Some(expr) => expr.evaluate().is_some_and(ConstValue::is_truthy),
			None => {
				self.diagnostics.error(DiagnosticKind::Preprocessor, origin.clone(), "malformed #if expression");
				false
			},
		}
	}
}

fn int_literal(value: i128) -> NumericLiteral {
	NumericLiteral {
		text: value.to_string(),
		class: NumericClass::Int,
		integer_value: Some(value),
		float_value: None,
	}
}

fn split_lines(tokens: Vec<Token>) -> Vec<Vec<Token>> {
	let mut lines = Vec::new();
	let mut current = Vec::new();
	for token in tokens {
		let is_newline = token.kind.is_newline();
		current.push(token);
		if is_newline {
			lines.push(std::mem::take(&mut current));
		}
	}
	if !current.is_empty() {
		lines.push(current);
	}
	lines
}

fn is_directive_line(line: &[Token]) -> bool {
	line.iter().find(|t| !t.kind.is_newline()).is_some_and(|t| matches!(&t.kind, TokenKind::Operator(op) if op.symbol() == "#"))
}

fn render_tokens(tokens: &[Token]) -> String {
	tokens
		.iter()
		.filter(|t| !t.kind.is_newline() && !t.kind.is_eof())
		.map(|t| match &t.kind {
			TokenKind::Identifier(name) => name.clone(),
			TokenKind::Primitive(literal) => literal.text.clone(),
			TokenKind::StringLit { raw, .. } => format!("\"{raw}\""),
			TokenKind::Operator(op) => op.symbol().to_owned(),
			_ => String::new(),
		})
		.collect::<Vec<_>>()
		.join(" ")
}

fn is_operator(token: &Token, symbol: &str) -> bool {
	matches!(&token.kind, TokenKind::Operator(op) if op.symbol() == symbol)
}

/// Reconstructs one token's literal source spelling, for `#` stringizing and `##` pasting.
fn token_spelling(token: &Token) -> String {
	match &token.kind {
		TokenKind::Identifier(name) => name.clone(),
		TokenKind::Primitive(literal) => literal.text.clone(),
		TokenKind::StringLit { raw, .. } => format!("\"{raw}\""),
		TokenKind::CharLit { raw, .. } => format!("'{raw}'"),
		TokenKind::Operator(op) => op.symbol().to_owned(),
		_ => String::new(),
	}
}

/// A call against an `N`-parameter macro with zero actual arguments (`FOO()`) lexes as one empty
/// argument slot; normalize that down to zero so `arguments.len() == params` holds for a
/// zero-parameter macro, and pad with empty slots if the call under-supplies variadic arguments.
fn normalize_call_arguments(mut arguments: Vec<Vec<Token>>, param_count: usize, is_variadic: bool) -> Vec<Vec<Token>> {
	if param_count == 0 && !is_variadic && arguments.len() == 1 && arguments[0].is_empty() {
		arguments.clear();
	}
	arguments
}

/// Concatenates the trailing variadic arguments of a call (those past the named parameters) into
/// one token list, joined by synthesized commas, for substituting `__VA_ARGS__`.
fn join_variadic_arguments(arguments: &[Vec<Token>], param_count: usize, call_origin: &FileOrigin) -> Vec<Token> {
	let Some(comma) = crate::expr::operator::OpRef::lookup(",") else {
		return Vec::new();
	};
	let mut joined = Vec::new();
	for (index, argument) in arguments.iter().enumerate().skip(param_count) {
		if index > param_count {
			joined.push(Token::new(TokenKind::Operator(comma), call_origin.clone()));
		}
		joined.extend(argument.iter().cloned());
	}
	joined
}

/// Stringizes a `#`-operand argument's raw tokens into one string-literal token (spec §4.B).
fn stringize(raw: &[Token], origin: &FileOrigin) -> Token {
	let text = raw.iter().map(token_spelling).collect::<Vec<_>>().join(" ");
	Token::new(
		TokenKind::StringLit {
			encoding: crate::token::StringEncoding::Plain,
			raw: text,
			user_suffix: None,
		},
		origin.clone(),
	)
}

/// Pastes two tokens into one via `##`, re-lexing their concatenated spellings. Falls back to
/// leaving both tokens unpasted if the paste doesn't lex as a single token.
fn paste(left: &Token, right: &Token, origin: &FileOrigin) -> Vec<Token> {
	let pasted_text = format!("{}{}", token_spelling(left), token_spelling(right));
	match crate::lexer::tokenize(&pasted_text, origin.clone()) {
		Ok(pasted_tokens) => {
			let mut meaningful: Vec<Token> = pasted_tokens.into_iter().filter(|t| !t.kind.is_newline() && !t.kind.is_eof()).collect();
			if meaningful.len() == 1 {
				return vec![meaningful.remove(0)];
			}
			vec![left.clone(), right.clone()]
		},
		Err(_) => vec![left.clone(), right.clone()],
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::token::FileOrigin;
	use crate::token_stream::normalize;

	fn preprocess(source: &str) -> (Vec<Token>, Diagnostics) {
		let tokens = crate::lexer::tokenize(source, FileOrigin::synthetic("a.okl")).unwrap();
		let mut diagnostics = Diagnostics::new();
		let output = {
			let mut preprocessor = Preprocessor::new(&mut diagnostics);
			preprocessor.run(tokens, std::path::Path::new("a.okl"), &mut NoIncludes)
		};
		(normalize(output), diagnostics)
	}

	#[test]
	fn object_macro_expands_inline() {
		let (tokens, _) = preprocess("#define N 4\nint x = N;\n");
		assert!(tokens.iter().any(|t| matches!(&t.kind, TokenKind::Primitive(literal) if literal.integer_value == Some(4))));
	}

	#[test]
	fn function_macro_expands_its_body() {
		let (tokens, _) = preprocess("#define SQ(x) ((x)*(x))\nint y = SQ(3+1);\n");
		let identifiers: Vec<_> = tokens.iter().filter_map(|t| t.kind.as_identifier()).collect();
		assert!(!identifiers.contains(&"SQ"));
	}

	#[test]
	fn function_macro_substitutes_its_argument_into_the_replacement() {
		let (tokens, _) = preprocess("#define SQ(x) ((x)*(x))\nint y = SQ(3+1);\n");
		let rendered = render_tokens(&tokens);
		assert!(rendered.contains("( ( 3 + 1 ) * ( 3 + 1 ) )"), "got {rendered}");
	}

	#[test]
	fn function_macro_name_without_a_call_is_left_unexpanded() {
		let (tokens, _) = preprocess("#define SQ(x) ((x)*(x))\nint (*fp)() = SQ;\n");
		assert!(tokens.iter().any(|t| t.kind.as_identifier() == Some("SQ")));
	}

	#[test]
	fn stringize_operator_quotes_the_raw_argument() {
		let (tokens, _) = preprocess("#define STR(x) #x\nchar *s = STR(hello world);\n");
		assert!(tokens.iter().any(|t| matches!(&t.kind, TokenKind::StringLit { raw, .. } if raw == "hello world")));
	}

	#[test]
	fn paste_operator_joins_two_tokens_into_one_identifier() {
		let (tokens, _) = preprocess("#define CAT(a, b) a##b\nint CAT(foo, bar);\n");
		assert!(tokens.iter().any(|t| t.kind.as_identifier() == Some("foobar")));
		assert!(!tokens.iter().any(|t| t.kind.as_identifier() == Some("foo")));
	}

	#[test]
	fn variadic_macro_joins_trailing_arguments_for_va_args() {
		let (tokens, _) = preprocess("#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)\nLOG(\"%d %d\", 1, 2);\n");
		let rendered = render_tokens(&tokens);
		assert!(rendered.contains("printf ( \"%d %d\" , 1 , 2 )"), "got {rendered}");
	}

	#[test]
	fn inactive_branch_of_if_zero_is_dropped() {
		let (tokens, _) = preprocess("#if 0\nint dead = 1;\n#endif\nint alive = 2;\n");
		assert!(!tokens.iter().any(|t| t.kind.as_identifier() == Some("dead")));
		assert!(tokens.iter().any(|t| t.kind.as_identifier() == Some("alive")));
	}

	#[test]
	fn undefined_if_identifier_warns_and_treats_as_zero() {
		let (tokens, diagnostics) = preprocess("#if UNDEFINED_THING\nint dead = 1;\n#endif\n");
		assert!(!tokens.iter().any(|t| t.kind.as_identifier() == Some("dead")));
		assert!(diagnostics.entries().iter().any(|d| d.message.contains("not defined")));
	}
}
