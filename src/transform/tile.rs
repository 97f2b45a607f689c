//! The `@tile`/`@safeTile` loop-blocking rewrite (spec §4.I, scenario 5).
//!
//! `for (int i = 0; i < N; ++i) /* @tile(16, @outer, @inner) */ body` becomes a block loop over
//! `_occa_tiled_i` nested around the original loop re-bounded to one tile, with `@tile`'s
//! companion attributes relocated onto the new loops and `@tile` itself dropped so the rewritten
//! loops don't re-enter the transform. Grounded on
//! `examples/original_source/parser_sandbox/src/builtins/transforms/tile.cpp`'s block/register
//! loop split, transcribed in terms of this crate's statement arena rather than in-place AST
//! surgery.

use crate::ast::{StatementArena, StatementId, StatementKind, VariableDeclarator};
use crate::attribute::AttributeInstance;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::expr::operator::OpRef;
use crate::expr::{Expr, ExprNode};
use crate::scope::{ScopeData, VariableId};
use crate::token::FileOrigin;
use crate::types::{Variable, VarType};

use super::StatementTransform;

/// Rewrites every `for` statement carrying `@tile`/`@safeTile` into the nested block/register
/// loop pair. `@safeTile` always clamps the inner loop's bound with `min(...)`; plain `@tile`
/// only clamps when the caller already asked for that via `@safeTile` (see `SPEC_FULL.md` §4.M —
/// plain `@tile` trusts the bound to divide evenly and emits the unclamped arithmetic scenario 5
/// shows).
pub struct TileTransform;

impl StatementTransform for TileTransform {
	fn visit(&mut self, arena: &mut StatementArena, scopes: &mut ScopeData, _scope_id: usize, id: StatementId, diagnostics: &mut Diagnostics) -> Option<StatementId> {
		let node = arena.get(id);
		let is_for = matches!(node.kind, StatementKind::For { .. });
		let tile = node.attribute("tile").cloned();
		let safe_tile = node.attribute("safeTile").cloned();
		let Some((attribute, clamp)) = tile.map(|a| (a, false)).or_else(|| safe_tile.map(|a| (a, true))) else {
			return Some(id);
		};
		if !is_for {
			return Some(id);
		}

		match rewrite(arena, scopes, id, &attribute, clamp, diagnostics) {
			Some(replacement) => Some(replacement),
			None => Some(id),
		}
	}
}

struct SimpleLoopShape {
	iterator: VariableId,
	iterator_name: String,
	iterator_type: VarType,
	start: Expr,
	bound_op: OpRef,
	bound: Expr,
	step: Expr,
}

fn rewrite(arena: &mut StatementArena, scopes: &mut ScopeData, id: StatementId, tile_attribute: &AttributeInstance, clamp: bool, diagnostics: &mut Diagnostics) -> Option<StatementId> {
	let block_size = tile_attribute.arguments.first()?.clone();
	let (outer_attr_name, inner_attr_name) = companion_attribute_names(tile_attribute);

	let StatementKind::For { init, check, update, body } = &arena.get(id).kind else { return None };
	let (init, check, update, body) = (*init, *check, *update, *body);
	let origin = arena.get(id).origin.clone();

	let shape = simple_loop_shape(arena, scopes, init, check, update, diagnostics)?;

	let block_iterator_name = format!("_occa_tiled_{}", shape.iterator_name);
	let block_variable = Variable {
		name: block_iterator_name.clone(),
		vartype: shape.iterator_type.clone(),
		attributes: Vec::new(),
	};
	let Ok(block_variable_id) = scopes.declare_variable(block_variable, origin.clone()) else {
		diagnostics.error(DiagnosticKind::Transform, origin, format!("'{block_iterator_name}' already declared; cannot tile this loop"));
		return None;
	};

	let plus = OpRef::lookup("+").expect("'+' is registered");
	let star = OpRef::lookup("*").expect("'*' is registered");

	// inner bound: block_iterator + block_size, optionally clamped with min(bound, that)
	let block_plus_size = binary(plus, identifier(&block_iterator_name, origin.clone()), shape.bound.clone(), origin.clone());
	let inner_bound = if clamp {
		Expr::new(
			ExprNode::Call {
				callee: Box::new(Expr::new(ExprNode::Identifier("min".to_owned()), origin.clone())),
				arguments: vec![shape.bound.clone(), block_plus_size.clone()],
			},
			origin.clone(),
		)
	} else {
		block_plus_size
	};

	// outer (block) loop: for (T0 _occa_tiled_x = S; _occa_tiled_x BOUND_OP E; _occa_tiled_x += step * blockSize)
	let outer_init = declaration_statement(arena, block_variable_id, shape.start.clone(), origin.clone(), Some(id));
	let outer_check_expr = binary(shape.bound_op, identifier(&block_iterator_name, origin.clone()), shape.bound.clone(), origin.clone());
	let outer_update_step = binary(star, shape.step.clone(), block_size, origin.clone());
	let outer_update_expr = binary(OpRef::lookup("+=").expect("'+=' is registered"), identifier(&block_iterator_name, origin.clone()), outer_update_step, origin.clone());

	// inner (register) loop: for (T0 x = _occa_tiled_x; x BOUND_OP innerBound; x += step)
	let inner_init = declaration_statement(arena, shape.iterator, identifier(&block_iterator_name, origin.clone()), origin.clone(), None);
	let inner_check_expr = binary(shape.bound_op, identifier(&shape.iterator_name, origin.clone()), inner_bound, origin.clone());
	let inner_update_expr = binary(OpRef::lookup("+=").expect("'+=' is registered"), identifier(&shape.iterator_name, origin.clone()), shape.step.clone(), origin.clone());

	let inner_check = arena.insert(StatementKind::Expression(inner_check_expr), origin.clone(), None);
	let inner_update = arena.insert(StatementKind::Expression(inner_update_expr), origin.clone(), None);
	let inner_for = arena.insert(
		StatementKind::For {
			init: Some(inner_init),
			check: Some(inner_check),
			update: Some(inner_update),
			body,
		},
		origin.clone(),
		Some(id),
	);
	attach_attribute(arena, inner_for, inner_attr_name);
	reparent(arena, body, inner_for);
	reparent(arena, inner_init, inner_for);
	reparent(arena, inner_check, inner_for);
	reparent(arena, inner_update, inner_for);

	let outer_check = arena.insert(StatementKind::Expression(outer_check_expr), origin.clone(), None);
	let outer_update = arena.insert(StatementKind::Expression(outer_update_expr), origin.clone(), None);
	arena.replace(
		id,
		StatementKind::For {
			init: Some(outer_init),
			check: Some(outer_check),
			update: Some(outer_update),
			body: inner_for,
		},
	);
	reparent(arena, outer_init, id);
	reparent(arena, outer_check, id);
	reparent(arena, outer_update, id);
	reparent(arena, inner_for, id);
	arena.get_mut(id).attributes.retain(|attribute| attribute.kind_name != "tile" && attribute.kind_name != "safeTile");
	attach_attribute(arena, id, outer_attr_name);

	Some(id)
}

fn reparent(arena: &mut StatementArena, child: StatementId, parent: StatementId) {
	arena.get_mut(child).parent = Some(parent);
}

fn attach_attribute(arena: &mut StatementArena, id: StatementId, name: Option<String>) {
	let Some(name) = name else { return };
	let origin = arena.get(id).origin.clone();
	arena.get_mut(id).attributes.push(AttributeInstance { kind_name: name, origin, arguments: Vec::new() });
}

/// `@tile(16, @outer, @inner)`'s companion markers: the first relocates onto the new block
/// (outer) loop, the second onto the register (inner) loop (spec §4.I, scenario 5).
fn companion_attribute_names(tile_attribute: &AttributeInstance) -> (Option<String>, Option<String>) {
	let markers: Vec<&str> = tile_attribute.arguments[1..]
		.iter()
		.filter_map(|argument| match &argument.node {
			ExprNode::Identifier(name) => name.strip_prefix('@'),
			_ => None,
		})
		.collect();
	(markers.first().map(|s| (*s).to_owned()), markers.get(1).map(|s| (*s).to_owned()))
}

fn identifier(name: &str, origin: FileOrigin) -> Expr {
	Expr::new(ExprNode::Identifier(name.to_owned()), origin)
}

fn binary(op: OpRef, left: Expr, right: Expr, origin: FileOrigin) -> Expr {
	Expr::new(
		ExprNode::Binary {
			op,
			left: Box::new(left),
			right: Box::new(right),
		},
		origin,
	)
}

fn declaration_statement(arena: &mut StatementArena, variable: VariableId, initializer: Expr, origin: FileOrigin, parent: Option<StatementId>) -> StatementId {
	arena.insert(
		StatementKind::Declaration(vec![VariableDeclarator {
			variable,
			initializer: Some(initializer),
			origin: origin.clone(),
		}]),
		origin,
		parent,
	)
}

/// Reads the `for (T0 x = S; x OP E; update)` shape a validated simple loop (spec §4.H rule 3)
/// must already have, normalising `++x`/`x++`/`--x`/`x--` to a `step` of `1`/`-1` and `x += e`/
/// `x -= e` to a `step` of `e`/`-e`. Returns `None` (with a diagnostic) for any shape the validator
/// would have already rejected, or one `@tile` does not yet support (a decrementing loop, which
/// the original OCCA tiling pass also never needed to handle — see `DESIGN.md`).
fn simple_loop_shape(arena: &StatementArena, scopes: &ScopeData, init: Option<StatementId>, check: Option<StatementId>, update: Option<StatementId>, diagnostics: &mut Diagnostics) -> Option<SimpleLoopShape> {
	let init_id = init?;
	let StatementKind::Declaration(declarators) = &arena.get(init_id).kind else {
		diagnostics.error(DiagnosticKind::Transform, arena.get(init_id).origin.clone(), "@tile requires a simple `for (T x = S; ...)` initializer");
		return None;
	};
	let declarator = declarators.first()?;
	let variable = scopes.variable(declarator.variable);
	let iterator_type = variable.vartype.clone();
	if !matches!(&iterator_type.base, crate::types::BaseType::Primitive(kind) if kind.is_valid_loop_iterator()) {
		diagnostics.error(DiagnosticKind::Transform, declarator.origin.clone(), "@tile requires an integer loop iterator");
		return None;
	}
	let start = declarator.initializer.clone()?;

	let check_id = check?;
	let StatementKind::Expression(check_expr) = &arena.get(check_id).kind else { return None };
	let ExprNode::Binary { op, right, .. } = &check_expr.node else {
		diagnostics.error(DiagnosticKind::Transform, check_expr.origin.clone(), "@tile requires a simple `x OP bound` loop check");
		return None;
	};

	let update_id = update?;
	let StatementKind::Expression(update_expr) = &arena.get(update_id).kind else { return None };
	let step = match &update_expr.node {
		ExprNode::LeftUnary { op, .. } | ExprNode::RightUnary { op, .. } if op.symbol() == "++" => int_literal(1, update_expr.origin.clone()),
		ExprNode::Binary { op, right, .. } if op.symbol() == "+=" => (**right).clone(),
		ExprNode::LeftUnary { op, .. } | ExprNode::RightUnary { op, .. } if op.symbol() == "--" => {
			diagnostics.error(DiagnosticKind::Transform, update_expr.origin.clone(), "@tile does not yet support a decrementing loop");
			return None;
		},
		ExprNode::Binary { op, .. } if op.symbol() == "-=" => {
			diagnostics.error(DiagnosticKind::Transform, update_expr.origin.clone(), "@tile does not yet support a decrementing loop");
			return None;
		},
		_ => {
			diagnostics.error(DiagnosticKind::Transform, update_expr.origin.clone(), "@tile requires a simple `++x`/`x += step` loop update");
			return None;
		},
	};

	Some(SimpleLoopShape {
		iterator: declarator.variable,
		iterator_name: variable.name.clone(),
		iterator_type,
		start,
		bound_op: *op,
		bound: (**right).clone(),
		step,
	})
}

fn int_literal(value: i128, origin: FileOrigin) -> Expr {
	Expr::new(
		ExprNode::Primitive(crate::token::NumericLiteral {
			text: value.to_string(),
			class: crate::token::NumericClass::Int,
			integer_value: Some(value),
			float_value: None,
		}),
		origin,
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attribute::AttributeRegistry;
	use crate::diagnostics::Diagnostics;

	fn rewrite_source(source: &str) -> (StatementArena, StatementId, Diagnostics) {
		let mut scopes = ScopeData::global();
		let attributes = AttributeRegistry::with_builtins();
		let mut diagnostics = Diagnostics::new();
		let (mut arena, root) = crate::parser_okl::parse_source(source, "tile.okl", &mut scopes, &attributes, &mut diagnostics).expect("parse");
		super::super::apply_statement_transform(&mut arena, &mut scopes, root, &mut TileTransform, &mut diagnostics);
		(arena, root, diagnostics)
	}

	fn find_for_loops(arena: &StatementArena, id: StatementId, out: &mut Vec<StatementId>) {
		if matches!(arena.get(id).kind, StatementKind::For { .. }) {
			out.push(id);
		}
		match &arena.get(id).kind {
			StatementKind::Block { children, .. } => {
				for child in children {
					find_for_loops(arena, *child, out);
				}
			},
			StatementKind::FunctionDecl { body: Some(body), .. } => find_for_loops(arena, *body, out),
			StatementKind::For { body, .. } => find_for_loops(arena, *body, out),
			_ => {},
		}
	}

	#[test]
	fn tile_produces_two_nested_loops_named_after_the_iterator() {
		let (arena, root, diagnostics) = rewrite_source(
			r"
			@kernel void k(int N) {
				@tile(16, @outer, @inner) for (int i = 0; i < N; ++i) {
					int x = i;
				}
			}
			",
		);
		assert!(!diagnostics.has_errors(), "{:?}", diagnostics.entries());
		let mut loops = Vec::new();
		find_for_loops(&arena, root, &mut loops);
		assert_eq!(loops.len(), 2, "tiling must produce exactly one outer and one inner loop");

		let StatementKind::For { init: Some(outer_init), body: inner_id, .. } = &arena.get(loops[0]).kind else { panic!() };
		let StatementKind::Declaration(declarators) = &arena.get(*outer_init).kind else { panic!() };
		assert!(arena.get(loops[0]).has_attribute("outer"));
		assert!(!arena.get(loops[0]).has_attribute("tile"));
		assert_eq!(declarators.len(), 1);

		assert_eq!(*inner_id, loops[1]);
		assert!(arena.get(loops[1]).has_attribute("inner"));
	}
}
