//! The `@dim`/`@dimOrder` call-to-subscript rewrite (spec §4.I, scenarios 2 and 3).
//!
//! `A(i, j)` on a variable declared `@dim(N, M) double *A;` becomes `A[(i) + (N) * (j)]`; a
//! `@dimOrder(p0, p1, …)` permutes which argument lines up with which declared dimension before
//! the index expression is folded. Grounded on
//! `examples/original_source/parser_sandbox/src/builtins/transforms/dim.cpp`'s row-major index
//! fold, transcribed as an `ExprTransform` rather than an in-place AST mutation.

use crate::ast::{StatementArena, StatementId, StatementKind};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::expr::operator::OpRef;
use crate::expr::{Expr, ExprNode};
use crate::scope::{Keyword, ScopeData};

use super::{rewrite_expr_postorder, ExprTransform, StatementTransform};

/// Rewrites every `Expression` statement under a kernel, replacing calls on `@dim`-attributed
/// variables with the folded subscript. Declarations and other statement kinds are left alone —
/// `@dim` only ever appears as a call expression inside an expression statement or another
/// expression (e.g. the right-hand side of an assignment), never as a statement shape of its own.
pub struct DimTransform;

impl StatementTransform for DimTransform {
	fn visit(&mut self, arena: &mut StatementArena, scopes: &mut ScopeData, scope_id: usize, id: StatementId, diagnostics: &mut Diagnostics) -> Option<StatementId> {
		if let StatementKind::Expression(expr) = &arena.get(id).kind {
			let expr = expr.clone();
			let mut rewriter = DimExprRewriter { scopes: &*scopes, scope_id };
			let rewritten = rewrite_expr_postorder(expr, &mut rewriter, diagnostics);
			arena.replace(id, StatementKind::Expression(rewritten));
		}
		Some(id)
	}
}

struct DimExprRewriter<'a> {
	scopes: &'a ScopeData,
	scope_id: usize,
}

impl ExprTransform for DimExprRewriter<'_> {
	fn visit(&mut self, expr: Expr, diagnostics: &mut Diagnostics) -> Expr {
		let ExprNode::Call { callee, arguments } = &expr.node else { return expr };
		let ExprNode::Identifier(name) = &callee.node else { return expr };
		let Some(Keyword::Variable(variable_id)) = self.scopes.lookup_from(self.scope_id, name) else {
			return expr;
		};
		let variable = self.scopes.variable(*variable_id);
		let Some(dim_attribute) = variable.attribute("dim") else { return expr };

		let rank = dim_attribute.arguments.len();
		if arguments.len() != rank {
			diagnostics.error(
				DiagnosticKind::Transform,
				expr.origin.clone(),
				format!("'{name}' is declared with @dim rank {rank} but called with {} argument(s)", arguments.len()),
			);
			return expr;
		}

		let order = match dim_order(variable, rank) {
			Ok(order) => order,
			Err(message) => {
				diagnostics.error(DiagnosticKind::Transform, expr.origin.clone(), message);
				return expr;
			},
		};

		let plus = OpRef::lookup("+").expect("'+' is a registered operator");
		let star = OpRef::lookup("*").expect("'*' is a registered operator");
		let dims = &dim_attribute.arguments;
		let origin = expr.origin.clone();

		let mut index = parenthesize(arguments[order[rank - 1]].clone(), origin.clone());
		for position in order.iter().take(rank - 1).rev() {
			let scaled = Expr::new(
				ExprNode::Binary {
					op: star,
					left: Box::new(parenthesize(dims[*position].clone(), origin.clone())),
					right: Box::new(index),
				},
				origin.clone(),
			);
			index = Expr::new(
				ExprNode::Binary {
					op: plus,
					left: Box::new(parenthesize(arguments[*position].clone(), origin.clone())),
					right: Box::new(scaled),
				},
				origin.clone(),
			);
		}

		Expr::new(ExprNode::Subscript { base: callee.clone(), index: Box::new(index) }, origin)
	}
}

fn parenthesize(expr: Expr, origin: crate::token::FileOrigin) -> Expr {
	Expr::new(ExprNode::Parentheses(Box::new(expr)), origin)
}

/// Reads `@dimOrder`'s permutation off the variable, or the identity permutation if none is
/// attached (spec §4.I "else identity").
fn dim_order(variable: &crate::types::Variable, rank: usize) -> Result<Vec<usize>, String> {
	let Some(dim_order_attribute) = variable.attribute("dimOrder") else {
		return Ok((0..rank).collect());
	};

	let mut order = Vec::with_capacity(dim_order_attribute.arguments.len());
	for argument in &dim_order_attribute.arguments {
		let Some(index) = argument.evaluate().and_then(|value| value.as_i128()) else {
			return Err(format!("'{}' has a @dimOrder index that is not a compile-time constant", variable.name));
		};
		order.push(index as usize);
	}

	if order.len() != rank || order.iter().any(|&index| index >= rank) {
		return Err(format!("'{}' has a @dimOrder permutation that does not match its @dim rank {rank}", variable.name));
	}
	Ok(order)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attribute::AttributeRegistry;
	use crate::diagnostics::Diagnostics;

	fn rewrite(source: &str) -> (String, Diagnostics) {
		let mut scopes = ScopeData::global();
		let attributes = AttributeRegistry::with_builtins();
		let mut diagnostics = Diagnostics::new();
		let (mut arena, root) = crate::parser_okl::parse_source(source, "dim.okl", &mut scopes, &attributes, &mut diagnostics).expect("parse");
		super::super::apply_statement_transform(&mut arena, &mut scopes, root, &mut DimTransform, &mut diagnostics);
		(render_first_call_site(&arena, root), diagnostics)
	}

	/// Walks down to the first `Expression` statement under `root` and renders its `Debug` form,
	/// since this module has no pretty-printer yet (that lives with the backend passes).
	fn render_first_call_site(arena: &StatementArena, id: StatementId) -> String {
		match &arena.get(id).kind {
			StatementKind::Expression(expr) => format!("{:?}", expr.node),
			StatementKind::Block { children, .. } => children.iter().map(|child| render_first_call_site(arena, *child)).find(|rendered| !rendered.is_empty()).unwrap_or_default(),
			StatementKind::FunctionDecl { body: Some(body), .. } => render_first_call_site(arena, *body),
			_ => String::new(),
		}
	}

	#[test]
	fn rewrites_a_two_dimensional_call_to_a_subscript() {
		let (rendered, diagnostics) = rewrite(
			r"
			@kernel void k(@dim(N, N) double *A, int N) {
				@outer for (int i = 0; i < N; ++i) {
					@inner for (int j = 0; j < N; ++j) {
						A(i, j) = 1.0;
					}
				}
			}
			",
		);
		assert!(!diagnostics.has_errors());
		assert!(rendered.contains("Subscript"), "expected a Subscript node, got {rendered}");
	}

	#[test]
	fn dim_order_swaps_the_fold_order() {
		let with_order = rewrite(
			r"
			@kernel void k(@dim(N, N) @dimOrder(1, 0) double *A, int N) {
				@outer for (int i = 0; i < N; ++i) {
					@inner for (int j = 0; j < N; ++j) {
						A(i, j) = 1.0;
					}
				}
			}
			",
		)
		.0;
		let without_order = rewrite(
			r"
			@kernel void k(@dim(N, N) double *A, int N) {
				@outer for (int i = 0; i < N; ++i) {
					@inner for (int j = 0; j < N; ++j) {
						A(i, j) = 1.0;
					}
				}
			}
			",
		)
		.0;
		assert_ne!(with_order, without_order, "a dimOrder permutation must change the folded index shape");
	}

	#[test]
	fn arity_mismatch_is_a_transform_error() {
		let (_, diagnostics) = rewrite(
			r"
			@kernel void k(@dim(N, N) double *A, int N) {
				@outer for (int i = 0; i < N; ++i) {
					@inner for (int j = 0; j < N; ++j) {
						A(i) = 1.0;
					}
				}
			}
			",
		);
		assert!(diagnostics.has_errors());
	}
}
