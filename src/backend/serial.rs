//! The serial (and, by extension, OpenMP) backend (spec §4.J "serial"). Grounded on
//! `examples/original_source/parser_sandbox/src/modes/serial.cpp`: every `@kernel` function is
//! wrapped `extern "C"` with its non-pointer, non-reference arguments passed by reference, and
//! every `@exclusive` scalar becomes a `[N]`-sized array indexed by a synthesized
//! `_occa_exclusive_index` that resets to `0` before each outermost `@inner` loop and increments
//! after each innermost one.

use crate::ast::{StatementArena, StatementId, StatementKind};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::expr::operator::OpRef;
use crate::expr::{Expr, ExprNode};
use crate::properties::Properties;
use crate::scope::{ScopeData, VariableId};
use crate::transform::{rewrite_expr_postorder, ExprTransform, FoundNode, StatementTransform, StatementTreeFinder};
use crate::types::ArrayDimension;

use super::{declaration_statement, ensure_int_variable, find_kernels, insert_before, int_literal, nearest_enclosing_loop, push_back, walk_pre_order, KernelMetadata};

const EXCLUSIVE_INDEX_NAME: &str = "_occa_exclusive_index";

/// The marker this backend stamps on a `@kernel` `FunctionDecl` so
/// [`crate::formatter::print_statement`] renders `extern "C"` ahead of its return type, without
/// teaching the shared printer about a backend-specific concept.
pub const EXTERN_C_MARKER: &str = "backend_extern_c";

#[must_use]
pub fn lower(arena: &mut StatementArena, scopes: &mut ScopeData, root: StatementId, properties: &Properties, diagnostics: &mut Diagnostics) -> Vec<KernelMetadata> {
	let array_size = properties.get_u64("serial/exclusiveArraySize", 256);
	let kernels = find_kernels(arena, root);
	let mut metadata = Vec::with_capacity(kernels.len());
	for kernel in kernels {
		wrap_extern_c_and_pass_by_reference(arena, scopes, kernel);
		setup_exclusives(arena, scopes, kernel, array_size, diagnostics);
		let StatementKind::FunctionDecl { function, .. } = &arena.get(kernel).kind else { unreachable!() };
		metadata.push(KernelMetadata::from_function(scopes.function(*function)));
	}
	metadata
}

/// OpenMP shares every bit of serial's lowering (spec §4.J "OpenMP: ... otherwise identical to
/// serial") and additionally parallelizes the outermost `@outer` loop of each kernel with a
/// `#pragma omp parallel for` inserted immediately ahead of it.
#[must_use]
pub fn lower_openmp(arena: &mut StatementArena, scopes: &mut ScopeData, root: StatementId, properties: &Properties, diagnostics: &mut Diagnostics) -> Vec<KernelMetadata> {
	let metadata = lower(arena, scopes, root, properties, diagnostics);
	for kernel in find_kernels(arena, root) {
		add_omp_pragma(arena, kernel);
	}
	metadata
}

fn add_omp_pragma(arena: &mut StatementArena, kernel: StatementId) {
	let StatementKind::FunctionDecl { body: Some(body), .. } = &arena.get(kernel).kind else { return };
	let body = *body;
	let is_outer_for = |node: &crate::ast::StatementNode| matches!(node.kind, StatementKind::For { .. }) && node.has_attribute("outer");
	let Some(outer_loop) = StatementTreeFinder::new(&is_outer_for).find(arena, body).into_iter().next() else { return };
	let origin = arena.get(outer_loop.id).origin.clone();
	let pragma = arena.insert(StatementKind::Pragma("omp parallel for".to_owned()), origin, Some(body));
	insert_before(arena, body, outer_loop.id, pragma);
}

/// `extern "C"` plus pass-non-pointer-args-by-reference (`serial.cpp`'s `setupKernel`).
fn wrap_extern_c_and_pass_by_reference(arena: &mut StatementArena, scopes: &mut ScopeData, kernel: StatementId) {
	let origin = arena.get(kernel).origin.clone();
	arena.get_mut(kernel).attributes.push(crate::attribute::AttributeInstance {
		kind_name: EXTERN_C_MARKER.to_owned(),
		origin,
		arguments: Vec::new(),
	});
	let StatementKind::FunctionDecl { function, .. } = &arena.get(kernel).kind else { unreachable!() };
	let function = scopes.function_mut(*function);
	for parameter in &mut function.parameters {
		if !parameter.vartype.is_pointer() && !parameter.vartype.is_reference {
			parameter.vartype.is_reference = true;
		}
	}
}

/// `serial.cpp`'s `setupExclusives`: finds every `@exclusive` declaration in the kernel, turns its
/// scalar into an `array_size`-wide array, rewrites every use into a subscript on the synthesized
/// index, and wires up the index's reset/increment around the enclosing `@inner` loops.
fn setup_exclusives(arena: &mut StatementArena, scopes: &mut ScopeData, kernel: StatementId, array_size: u64, diagnostics: &mut Diagnostics) {
	let StatementKind::FunctionDecl { body: Some(body), .. } = &arena.get(kernel).kind else { return };
	let body = *body;

	let mut exclusive_decls = Vec::new();
	walk_pre_order(arena, body, &mut |id| {
		if arena.get(id).has_attribute("exclusive") && matches!(arena.get(id).kind, StatementKind::Declaration(_)) {
			exclusive_decls.push(id);
		}
	});

	let mut indexed_outer_loops = Vec::new();
	for decl in exclusive_decls {
		let Some(outer_loop) = nearest_enclosing_loop(arena, decl, "outer") else {
			diagnostics.error(DiagnosticKind::Semantic, arena.get(decl).origin.clone(), "`@exclusive` declaration must be inside an `@outer` loop");
			continue;
		};

		let Some(parent_block) = parent_block_of(arena, outer_loop) else {
			diagnostics.warning(DiagnosticKind::Transform, arena.get(outer_loop).origin.clone(), "`@outer` loop body is not a block; skipping `@exclusive` index synthesis here");
			continue;
		};
		let scope_id = block_scope(arena, parent_block).unwrap_or_else(|| scopes.global_id());

		let origin = arena.get(outer_loop).origin.clone();
		match ensure_int_variable(scopes, scope_id, EXCLUSIVE_INDEX_NAME, origin.clone()) {
			Some((variable_id, true)) => {
				let declaration = declaration_statement(arena, variable_id, int_literal(0, origin.clone()), origin, Some(parent_block));
				insert_before(arena, parent_block, outer_loop, declaration);
				if !indexed_outer_loops.contains(&outer_loop) {
					indexed_outer_loops.push(outer_loop);
				}
			},
			Some((_, false)) => {
				if !indexed_outer_loops.contains(&outer_loop) {
					indexed_outer_loops.push(outer_loop);
				}
			},
			None => {
				diagnostics.error(DiagnosticKind::Semantic, origin, format!("'{EXCLUSIVE_INDEX_NAME}' is already declared as something other than a variable"));
				continue;
			},
		}

		let StatementKind::Declaration(declarators) = &arena.get(decl).kind else { unreachable!() };
		let Some(declarator) = declarators.first() else { continue };
		let variable_name = scopes.variable(declarator.variable).name.clone();
		scopes.variable_mut(declarator.variable).vartype.array_dimensions.push(ArrayDimension::Sized(Box::new(int_literal(array_size as i128, origin.clone()))));

		rewrite_exclusive_uses(arena, outer_loop, &variable_name, diagnostics);
	}

	for outer_loop in indexed_outer_loops {
		wire_inner_loop_index(arena, outer_loop);
	}
}

fn parent_block_of(arena: &StatementArena, id: StatementId) -> Option<StatementId> {
	let parent = arena.get(id).parent?;
	matches!(arena.get(parent).kind, StatementKind::Block { .. }).then_some(parent)
}

fn block_scope(arena: &StatementArena, id: StatementId) -> Option<usize> {
	match &arena.get(id).kind {
		StatementKind::Block { scope, .. } => Some(*scope),
		_ => None,
	}
}

struct ExclusiveRewriter<'a> {
	name: &'a str,
}

impl ExprTransform for ExclusiveRewriter<'_> {
	fn visit(&mut self, expr: Expr, _diagnostics: &mut Diagnostics) -> Expr {
		if !matches!(&expr.node, ExprNode::Identifier(name) if name == self.name) {
			return expr;
		}
		let origin = expr.origin.clone();
		Expr::new(
			ExprNode::Subscript {
				base: Box::new(expr),
				index: Box::new(super::identifier(EXCLUSIVE_INDEX_NAME, origin.clone())),
			},
			origin,
		)
	}
}

struct ExclusiveUsageTransform<'a> {
	name: &'a str,
}

impl StatementTransform for ExclusiveUsageTransform<'_> {
	fn visit(&mut self, arena: &mut StatementArena, _scopes: &mut ScopeData, _scope_id: usize, id: StatementId, diagnostics: &mut Diagnostics) -> Option<StatementId> {
		match arena.get(id).kind.clone() {
			StatementKind::Expression(expr) => {
				let rewritten = rewrite_expr_postorder(expr, &mut ExclusiveRewriter { name: self.name }, diagnostics);
				arena.replace(id, StatementKind::Expression(rewritten));
			},
			StatementKind::Declaration(declarators) => {
				let rewritten = declarators
					.into_iter()
					.map(|declarator| crate::ast::VariableDeclarator {
						initializer: declarator.initializer.map(|initializer| rewrite_expr_postorder(initializer, &mut ExclusiveRewriter { name: self.name }, diagnostics)),
						..declarator
					})
					.collect();
				arena.replace(id, StatementKind::Declaration(rewritten));
			},
			_ => {},
		}
		Some(id)
	}
}

fn rewrite_exclusive_uses(arena: &mut StatementArena, outer_loop: StatementId, name: &str, diagnostics: &mut Diagnostics) {
	// `ExclusiveUsageTransform` matches by name, not by scope lookup, so the scope data threaded
	// through `apply_statement_transform` is never read; a throwaway table avoids borrowing the
	// real one mutably while its variable/array-dimension edits are still in scope in the caller.
	let mut throwaway_scopes = ScopeData::global();
	crate::transform::apply_statement_transform(arena, &mut throwaway_scopes, outer_loop, &mut ExclusiveUsageTransform { name }, diagnostics);
}

/// Resets `_occa_exclusive_index` to `0` immediately before each outermost `@inner` loop under
/// `outer_loop`, and appends its increment as the last statement of each innermost one
/// (`serial.cpp`'s `setupExclusiveIndices`/`getInnerMostLoops`).
fn wire_inner_loop_index(arena: &mut StatementArena, outer_loop: StatementId) {
	let is_inner_for = |node: &crate::ast::StatementNode| matches!(node.kind, StatementKind::For { .. }) && node.has_attribute("inner");
	let tree = StatementTreeFinder::new(&is_inner_for).find(arena, outer_loop);

	for top in &tree {
		reset_before(arena, top.id);
		increment_leaves(arena, top);
	}
}

fn reset_before(arena: &mut StatementArena, inner_loop: StatementId) {
	let Some(parent) = parent_block_of(arena, inner_loop) else { return };
	let origin = arena.get(inner_loop).origin.clone();
	let reset = super::assignment_statement(arena, EXCLUSIVE_INDEX_NAME, int_literal(0, origin.clone()), origin, Some(parent));
	insert_before(arena, parent, inner_loop, reset);
}

fn increment_leaves(arena: &mut StatementArena, node: &FoundNode) {
	if node.children.is_empty() {
		let StatementKind::For { body, .. } = &arena.get(node.id).kind else { return };
		let body = *body;
		if !matches!(arena.get(body).kind, StatementKind::Block { .. }) {
			return;
		}
		let origin = arena.get(body).origin.clone();
		let increment_op = OpRef::lookup("++").expect("'++' is a registered operator");
		let increment = Expr::new(
			ExprNode::RightUnary {
				op: increment_op,
				child: Box::new(super::identifier(EXCLUSIVE_INDEX_NAME, origin.clone())),
			},
			origin.clone(),
		);
		let statement = arena.insert(StatementKind::Expression(increment), origin, Some(body));
		push_back(arena, body, statement);
		return;
	}
	for child in &node.children {
		increment_leaves(arena, child);
	}
}

/// Applies the `serial/restrict` property (`SPEC_FULL.md`'s sibling decision to Open Question 2):
/// the parser only ever recognises the literal spelling `restrict` (no dynamic keyword table, see
/// `DESIGN.md`), so a backend-configured spelling is substituted as a text-level postprocessing
/// step over the printed source instead of inside the shared printer. A `None`/absent property
/// leaves `restrict` as printed; an empty string drops the qualifier entirely (C89-target mode).
#[must_use]
pub fn substitute_restrict(source: String, properties: &Properties) -> String {
	match properties.get_str("serial/restrict") {
		Some(spelling) if spelling.is_empty() => source.replace("restrict ", ""),
		Some(spelling) => source.replace("restrict", spelling),
		None => source,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attribute::AttributeRegistry;

	fn lower_source(source: &str, properties: &Properties) -> (String, Vec<KernelMetadata>, Diagnostics) {
		let mut scopes = ScopeData::global();
		let attributes = AttributeRegistry::with_builtins();
		let mut diagnostics = Diagnostics::new();
		let (mut arena, root) = crate::parser_okl::parse_source(source, "serial.okl", &mut scopes, &attributes, &mut diagnostics).expect("parse");
		let metadata = lower(&mut arena, &mut scopes, root, properties, &mut diagnostics);
		(crate::formatter::print_program(&arena, &scopes, root), metadata, diagnostics)
	}

	#[test]
	fn exclusive_scalar_becomes_an_array_indexed_by_the_synthesized_counter() {
		let (printed, metadata, diagnostics) = lower_source(
			r"
			@kernel void k(int N) {
				@outer for (int o = 0; o < N; ++o) {
					@exclusive int value;
					@inner for (int i = 0; i < N; ++i) {
						value = i;
					}
					@inner for (int i = 0; i < N; ++i) {
						int x = value;
					}
				}
			}
			",
			&Properties::new(),
		);
		assert!(!diagnostics.has_errors(), "{:?}", diagnostics.entries());
		assert_eq!(metadata.len(), 1);
		assert!(printed.contains(EXCLUSIVE_INDEX_NAME), "expected the synthesized index in:\n{printed}");
		assert!(printed.contains("value[256]") || printed.contains("value [256]"), "expected value to become a 256-wide array:\n{printed}");
		assert!(printed.contains("value[_occa_exclusive_index]"), "expected uses rewritten to a subscript:\n{printed}");
	}

	#[test]
	fn exclusive_array_size_is_configurable() {
		let mut properties = Properties::new();
		properties.set("serial/exclusiveArraySize", serde_json::Value::from(64));
		let (printed, _, diagnostics) = lower_source(
			r"
			@kernel void k(int N) {
				@outer for (int o = 0; o < N; ++o) {
					@exclusive int value;
					@inner for (int i = 0; i < N; ++i) {
						value = i;
					}
				}
			}
			",
			&properties,
		);
		assert!(!diagnostics.has_errors());
		assert!(printed.contains("value[64]"), "expected the configured width in:\n{printed}");
	}

	#[test]
	fn extern_c_marker_reaches_the_printed_header() {
		let (printed, _, diagnostics) = lower_source(
			r"
			@kernel void k(int N) {
				@outer for (int o = 0; o < N; ++o) {
					@inner for (int i = 0; i < N; ++i) {}
				}
			}
			",
			&Properties::new(),
		);
		assert!(!diagnostics.has_errors());
		assert!(printed.contains("extern \"C\""), "expected extern \"C\" in:\n{printed}");
	}
}
