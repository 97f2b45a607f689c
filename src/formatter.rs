//! Prints the statement arena back into C-like source text (spec §4.J "emits a rewritten source
//! string"; §8 "Parse ∘ print of a statement yields a string that re-parses to a structurally
//! equal statement"). [`crate::expr::Expr`] already implements `Display`; this module adds the
//! statement- and declarator-level printing that expression `Display` alone doesn't cover.

use crate::ast::{StatementArena, StatementId, StatementKind};
use crate::attribute::AttributeInstance;
use crate::scope::ScopeData;
use crate::types::ArrayDimension;

/// Prints a whole translation unit. The root statement is always the top-level `Block`
/// [`crate::parser_okl::parse_source`] builds; printed flat (without the enclosing braces a
/// nested block would get), since a bare `{ ... }` around every top-level declaration would
/// reparse into one extra level of block nesting the original program never had.
#[must_use]
pub fn print_program(arena: &StatementArena, scopes: &ScopeData, root: StatementId) -> String {
	let StatementKind::Block { children, .. } = &arena.get(root).kind else {
		return print_statement(arena, scopes, root, 0);
	};
	children.iter().map(|child| print_statement(arena, scopes, *child, 0)).collect::<Vec<_>>().join("\n")
}

fn indent(depth: usize) -> String {
	"  ".repeat(depth)
}

/// Attribute names a backend lowering pass stamps onto a statement purely to carry information to
/// this printer (e.g. `backend_extern_c`, see `backend::serial::EXTERN_C_MARKER`) — never real
/// `@name` syntax, so they're dropped here and handled by their own special case in
/// [`print_statement`] instead.
fn is_internal_marker(name: &str) -> bool {
	name.starts_with("backend_")
}

fn print_attributes(attributes: &[AttributeInstance]) -> String {
	attributes
		.iter()
		.filter(|attribute| !is_internal_marker(&attribute.kind_name))
		.map(|attribute| {
			if attribute.arguments.is_empty() {
				format!("@{} ", attribute.kind_name)
			} else {
				format!("@{}({}) ", attribute.kind_name, attribute.arguments.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))
			}
		})
		.collect()
}

fn print_array_dims(dims: &[ArrayDimension]) -> String {
	dims.iter()
		.map(|dimension| match dimension {
			ArrayDimension::Sized(expr) => format!("[{expr}]"),
			ArrayDimension::Unsized => "[]".to_owned(),
		})
		.collect()
}

fn print_declarators(arena: &StatementArena, scopes: &ScopeData, declarators: &[crate::ast::VariableDeclarator]) -> String {
	let _ = arena;
	declarators
		.iter()
		.map(|declarator| {
			let variable = scopes.variable(declarator.variable);
			let dims = print_array_dims(&variable.vartype.array_dimensions);
			match &declarator.initializer {
				Some(initializer) => format!("{} {}{dims} = {initializer}", variable.vartype, variable.name),
				None => format!("{} {}{dims}", variable.vartype, variable.name),
			}
		})
		.collect::<Vec<_>>()
		.join(", ")
}

/// Renders the `init`/`check`/`update` clause of a `for` header as the bare text that belongs
/// between the parens, without the indent or trailing `;` the equivalent top-level statement
/// would carry.
fn print_for_clause(arena: &StatementArena, scopes: &ScopeData, id: Option<StatementId>) -> String {
	let Some(id) = id else { return String::new() };
	match &arena.get(id).kind {
		StatementKind::Expression(expr) => expr.to_string(),
		StatementKind::Declaration(declarators) => print_declarators(arena, scopes, declarators),
		_ => String::new(),
	}
}

/// Prints one statement, including its attribute prefix, at the given indentation depth.
/// Embedding a sub-statement after inline header text (`if (...) `, `for (...) `, ...) trims the
/// sub-statement's own leading indent, since it is appended right after the header rather than on
/// its own line.
#[must_use]
pub fn print_statement(arena: &StatementArena, scopes: &ScopeData, id: StatementId, depth: usize) -> String {
	let node = arena.get(id);
	let prefix = print_attributes(&node.attributes);
	let pad = indent(depth);
	match &node.kind {
		StatementKind::Empty => format!("{pad}{prefix};"),
		StatementKind::Pragma(text) => format!("{pad}#pragma {text}"),
		StatementKind::Block { children, .. } => {
			let mut out = format!("{pad}{prefix}{{\n");
			for child in children {
				out.push_str(&print_statement(arena, scopes, *child, depth + 1));
				out.push('\n');
			}
			out.push_str(&format!("{pad}}}"));
			out
		},
		StatementKind::Namespace { name, body } => format!("{pad}{prefix}namespace {name} {}", print_statement(arena, scopes, *body, depth).trim_start()),
		StatementKind::TypeDecl { name, underlying } => format!("{pad}{prefix}typedef {underlying} {name};"),
		StatementKind::ClassAccess(label) => format!("{pad}{label}:"),
		StatementKind::Expression(expr) => format!("{pad}{prefix}{expr};"),
		StatementKind::Declaration(declarators) => format!("{pad}{prefix}{};", print_declarators(arena, scopes, declarators)),
		StatementKind::Goto(label) => format!("{pad}{prefix}goto {label};"),
		StatementKind::GotoLabel(label) => format!("{pad}{label}:"),
		StatementKind::If { condition, then_branch, else_branch } => {
			let mut out = format!("{pad}{prefix}if ({condition}) {}", print_statement(arena, scopes, *then_branch, depth).trim_start());
			if let Some(else_branch) = else_branch {
				out.push_str(&format!(" else {}", print_statement(arena, scopes, *else_branch, depth).trim_start()));
			}
			out
		},
		StatementKind::For { init, check, update, body } => {
			let init_str = print_for_clause(arena, scopes, *init);
			let check_str = print_for_clause(arena, scopes, *check);
			let update_str = print_for_clause(arena, scopes, *update);
			format!("{pad}{prefix}for ({init_str}; {check_str}; {update_str}) {}", print_statement(arena, scopes, *body, depth).trim_start())
		},
		StatementKind::While { check, body, is_do_while: false } => format!("{pad}{prefix}while ({check}) {}", print_statement(arena, scopes, *body, depth).trim_start()),
		StatementKind::While { check, body, is_do_while: true } => format!("{pad}{prefix}do {} while ({check});", print_statement(arena, scopes, *body, depth).trim_start()),
		StatementKind::Switch { subject, body } => format!("{pad}{prefix}switch ({subject}) {}", print_statement(arena, scopes, *body, depth).trim_start()),
		StatementKind::Case(expr) => format!("{pad}case {expr}:"),
		StatementKind::Default => format!("{pad}default:"),
		StatementKind::Continue => format!("{pad}{prefix}continue;"),
		StatementKind::Break => format!("{pad}{prefix}break;"),
		StatementKind::Return(Some(expr)) => format!("{pad}{prefix}return {expr};"),
		StatementKind::Return(None) => format!("{pad}{prefix}return;"),
		StatementKind::FunctionDecl { function, body } => {
			let function = scopes.function(*function);
			let params: Vec<String> = function
				.parameters
				.iter()
				.map(|parameter| format!("{}{} {}{}", print_attributes(&parameter.attributes), parameter.vartype, parameter.name, print_array_dims(&parameter.vartype.array_dimensions)))
				.collect();
			let extern_c = if node.has_attribute("backend_extern_c") { "extern \"C\" " } else { "" };
			let header = format!("{pad}{prefix}{extern_c}{} {}({})", function.return_type, function.name, params.join(", "));
			match body {
				Some(body_id) => format!("{header} {}", print_statement(arena, scopes, *body_id, depth).trim_start()),
				None => format!("{header};"),
			}
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attribute::AttributeRegistry;
	use crate::diagnostics::Diagnostics;
	use crate::scope::ScopeData;

	fn print(source: &str) -> String {
		let mut scopes = ScopeData::global();
		let attributes = AttributeRegistry::with_builtins();
		let mut diagnostics = Diagnostics::new();
		let (arena, root) = crate::parser_okl::parse_source(source, "print.okl", &mut scopes, &attributes, &mut diagnostics).expect("parse");
		print_program(&arena, &scopes, root)
	}

	fn reparses_cleanly(source: &str) {
		let printed = print(source);
		let mut scopes = ScopeData::global();
		let attributes = AttributeRegistry::with_builtins();
		let mut diagnostics = Diagnostics::new();
		crate::parser_okl::parse_source(&printed, "reprint.okl", &mut scopes, &attributes, &mut diagnostics).expect("reparse");
		assert!(!diagnostics.has_errors(), "reprinted source failed to reparse cleanly: {printed}\n{:?}", diagnostics.entries());
	}

	#[test]
	fn prints_a_kernel_and_reparses_it() {
		reparses_cleanly(
			r"
			@kernel void addVectors(int N, double *a, double *b, double *c) {
				@outer for (int i = 0; i < N; ++i) {
					@inner for (int j = 0; j < N; ++j) {
						c[i] = a[i] + b[j];
					}
				}
			}
			",
		);
	}

	#[test]
	fn prints_array_declarator_dimensions() {
		let printed = print("@shared double tile[16][16];");
		assert!(printed.contains("[16][16]"), "expected array dims in {printed}");
	}

	#[test]
	fn prints_attribute_arguments() {
		let printed = print("@kernel void k(@dim(N, N) double *A, int N) {}");
		assert!(printed.contains("@dim(N, N)"), "expected @dim arguments preserved in {printed}");
	}
}
