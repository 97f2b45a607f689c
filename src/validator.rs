//! The OKL semantic validator (spec §4.H): once parsing succeeds, every `@kernel` function is
//! checked for valid `@outer`/`@inner` placement and loop shape before any transform pass runs.
//!
//! Violations are collected in deterministic depth-first pre-order (Open Question 3) rather than
//! returned on first failure, matching "the validator continues to collect independent errors
//! where it can" (spec §4.H).

use crate::ast::{StatementArena, StatementId, StatementKind};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::scope::{Keyword, ScopeData, VariableId};

/// Runs every rule in spec §4.H rule order against `root`. Returns whether the whole tree
/// validated cleanly; pushes one diagnostic per violation found along the way.
pub fn validate(arena: &StatementArena, root: StatementId, scopes: &ScopeData, diagnostics: &mut Diagnostics) -> bool {
	let kernels = find_kernels(arena, root);
	let mut success = true;

	if kernels.is_empty() {
		diagnostics.error(DiagnosticKind::Semantic, arena.get(root).origin.clone(), "translation unit contains no `@kernel` function declaration");
		success = false;
	}

	for kernel in kernels {
		if !validate_kernel(arena, kernel, scopes, diagnostics) {
			success = false;
		}
	}
	success
}

/// Depth-first pre-order collection of every `FunctionDecl` statement carrying `@kernel` (rule 1:
/// "each is a function declaration" is enforced for free here, since `@kernel` can only attach to
/// a `function_decl` statement — see `attribute::KernelAttributeKind::is_statement_attribute`).
fn find_kernels(arena: &StatementArena, id: StatementId) -> Vec<StatementId> {
	let mut found = Vec::new();
	walk_pre_order(arena, id, &mut |node_id| {
		if arena.get(node_id).has_attribute("kernel") {
			found.push(node_id);
		}
	});
	found
}

fn walk_pre_order(arena: &StatementArena, id: StatementId, visit: &mut impl FnMut(StatementId)) {
	visit(id);
	match &arena.get(id).kind {
		StatementKind::Block { children, .. } => {
			for child in children {
				walk_pre_order(arena, *child, visit);
			}
		},
		StatementKind::Namespace { body, .. } | StatementKind::While { body, .. } | StatementKind::Switch { body, .. } => walk_pre_order(arena, *body, visit),
		StatementKind::If { then_branch, else_branch, .. } => {
			walk_pre_order(arena, *then_branch, visit);
			if let Some(else_branch) = else_branch {
				walk_pre_order(arena, *else_branch, visit);
			}
		},
		StatementKind::For { init, check, update, body } => {
			for child in [*init, *check, *update].into_iter().flatten() {
				walk_pre_order(arena, child, visit);
			}
			walk_pre_order(arena, *body, visit);
		},
		StatementKind::FunctionDecl { body: Some(body), .. } => walk_pre_order(arena, *body, visit),
		_ => {},
	}
}

/// One `@outer`/`@inner` for-loop found while walking a kernel, with its nesting depth measured
/// in "how many ancestor loops of the same attribute kind enclose it" (rule 4 "consistent depth").
struct LoopSite {
	id: StatementId,
	outer_depth: usize,
	inner_depth: usize,
}

fn validate_kernel(arena: &StatementArena, kernel: StatementId, scopes: &ScopeData, diagnostics: &mut Diagnostics) -> bool {
	let mut success = true;
	let StatementKind::FunctionDecl { body, .. } = &arena.get(kernel).kind else {
		unreachable!("find_kernels only returns function_decl statements");
	};
	let Some(body) = body else {
		diagnostics.error(DiagnosticKind::Semantic, arena.get(kernel).origin.clone(), "`@kernel` function has no body");
		return false;
	};

	let mut loops = Vec::new();
	collect_loop_sites(arena, *body, 0, 0, &mut loops);

	let outer_loops: Vec<&LoopSite> = loops.iter().filter(|site| arena.get(site.id).has_attribute("outer")).collect();
	let inner_loops: Vec<&LoopSite> = loops.iter().filter(|site| arena.get(site.id).has_attribute("inner")).collect();

	// Rule 2: both attributes present; no loop carries both.
	if outer_loops.is_empty() {
		diagnostics.error(DiagnosticKind::Semantic, arena.get(kernel).origin.clone(), "`@kernel` has no `@outer` for-loop");
		success = false;
	}
	if inner_loops.is_empty() {
		diagnostics.error(DiagnosticKind::Semantic, arena.get(kernel).origin.clone(), "`@kernel` has no `@inner` for-loop");
		success = false;
	}
	for site in &loops {
		let node = arena.get(site.id);
		if node.has_attribute("outer") && node.has_attribute("inner") {
			diagnostics.error(DiagnosticKind::Semantic, node.origin.clone(), "a for-loop cannot carry both `@outer` and `@inner`");
			success = false;
		}
	}

	// Rule 3: simple loop shape, for every @outer/@inner loop.
	for site in outer_loops.iter().chain(inner_loops.iter()) {
		if check_simple_loop(arena, scopes, site.id, diagnostics).is_none() {
			success = false;
		}
	}

	// Rule 4: nesting.
	for site in &inner_loops {
		if site.outer_depth == 0 {
			diagnostics.error(DiagnosticKind::Semantic, arena.get(site.id).origin.clone(), "`@inner` for-loop does not lie inside any `@outer` for-loop");
			success = false;
		}
	}
	for site in &outer_loops {
		if site.inner_depth > 0 {
			diagnostics.error(DiagnosticKind::Semantic, arena.get(site.id).origin.clone(), "`@outer` for-loop lies inside an `@inner` for-loop");
			success = false;
		}
	}
	if !outer_loops.is_empty() {
		let first_depth = outer_loops[0].outer_depth;
		for site in &outer_loops {
			if site.outer_depth != first_depth {
				diagnostics.error(DiagnosticKind::Semantic, arena.get(site.id).origin.clone(), "sibling `@outer` for-loops disagree on their enclosing `@outer` depth");
				success = false;
			}
		}
	}

	// Rules 5-6: @shared / @exclusive placement.
	if !validate_shared_and_exclusive(arena, scopes, *body, diagnostics) {
		success = false;
	}

	success
}

fn collect_loop_sites(arena: &StatementArena, id: StatementId, outer_depth: usize, inner_depth: usize, out: &mut Vec<LoopSite>) {
	let node = arena.get(id);
	let (next_outer, next_inner) = match &node.kind {
		StatementKind::For { .. } => {
			let is_outer = node.has_attribute("outer");
			let is_inner = node.has_attribute("inner");
			out.push(LoopSite { id, outer_depth, inner_depth });
			(outer_depth + usize::from(is_outer), inner_depth + usize::from(is_inner))
		},
		_ => (outer_depth, inner_depth),
	};
	match &node.kind {
		StatementKind::Block { children, .. } => {
			for child in children {
				collect_loop_sites(arena, *child, next_outer, next_inner, out);
			}
		},
		StatementKind::For { init, check, update, body } => {
			for child in [*init, *check, *update].into_iter().flatten() {
				collect_loop_sites(arena, child, next_outer, next_inner, out);
			}
			collect_loop_sites(arena, *body, next_outer, next_inner, out);
		},
		StatementKind::If { then_branch, else_branch, .. } => {
			collect_loop_sites(arena, *then_branch, next_outer, next_inner, out);
			if let Some(else_branch) = else_branch {
				collect_loop_sites(arena, *else_branch, next_outer, next_inner, out);
			}
		},
		StatementKind::While { body, .. } | StatementKind::Switch { body, .. } | StatementKind::Namespace { body, .. } => collect_loop_sites(arena, *body, next_outer, next_inner, out),
		_ => {},
	}
}

/// Rule 3: init is a single declaration of an integer iterator; check is `iter OP bound`; update
/// is one of the six recognised forms; the iterator variable matches across all three. Returns
/// the iterator's `VariableId` on success.
fn check_simple_loop(arena: &StatementArena, scopes: &ScopeData, for_id: StatementId, diagnostics: &mut Diagnostics) -> Option<VariableId> {
	let node = arena.get(for_id);
	let StatementKind::For { init, check, update, .. } = &node.kind else {
		unreachable!("check_simple_loop is only called on For statements");
	};

	let Some(init_id) = init else {
		diagnostics.error(DiagnosticKind::Semantic, node.origin.clone(), "`@outer`/`@inner` for-loop must declare its iterator in the initializer");
		return None;
	};
	let StatementKind::Declaration(declarators) = &arena.get(*init_id).kind else {
		diagnostics.error(DiagnosticKind::Semantic, arena.get(*init_id).origin.clone(), "`@outer`/`@inner` for-loop initializer must be a declaration");
		return None;
	};
	if declarators.len() > 1 {
		diagnostics.error(DiagnosticKind::Semantic, declarators[1].origin.clone(), "Can only transform 1 iterator variable");
		return None;
	}
	let Some(declarator) = declarators.first() else {
		diagnostics.error(DiagnosticKind::Semantic, arena.get(*init_id).origin.clone(), "`@outer`/`@inner` for-loop initializer must declare exactly one iterator variable");
		return None;
	};
	let iterator = declarator.variable;
	let variable = scopes.variable(iterator);
	if !matches!(&variable.vartype.base, crate::types::BaseType::Primitive(kind) if kind.is_valid_loop_iterator()) {
		diagnostics.error(
			DiagnosticKind::Semantic,
			declarator.origin.clone(),
			format!("loop iterator '{}' must be an integer type (char/short/int/long), found '{}'", variable.name, variable.vartype),
		);
		return None;
	}

	let Some(check_id) = check else {
		diagnostics.error(DiagnosticKind::Semantic, node.origin.clone(), "`@outer`/`@inner` for-loop must have a bound check");
		return None;
	};
	if !check_matches_iterator(arena, *check_id, &variable.name) {
		diagnostics.error(DiagnosticKind::Semantic, arena.get(*check_id).origin.clone(), format!("loop check must compare iterator '{}' against a bound", variable.name));
		return None;
	}

	let Some(update_id) = update else {
		diagnostics.error(DiagnosticKind::Semantic, node.origin.clone(), "`@outer`/`@inner` for-loop must have an update expression");
		return None;
	};
	if !update_matches_iterator(arena, *update_id, &variable.name) {
		diagnostics.error(DiagnosticKind::Semantic, arena.get(*update_id).origin.clone(), format!("loop update must be a simple increment/decrement of iterator '{}'", variable.name));
		return None;
	}

	Some(iterator)
}

fn check_matches_iterator(arena: &StatementArena, check_id: StatementId, iterator_name: &str) -> bool {
	let StatementKind::Expression(expr) = &arena.get(check_id).kind else { return false };
	let crate::expr::ExprNode::Binary { op, left, .. } = &expr.node else { return false };
	matches!(op.symbol(), "<" | "<=" | ">" | ">=") && is_identifier(left, iterator_name)
}

fn update_matches_iterator(arena: &StatementArena, update_id: StatementId, iterator_name: &str) -> bool {
	let StatementKind::Expression(expr) = &arena.get(update_id).kind else { return false };
	match &expr.node {
		crate::expr::ExprNode::LeftUnary { op, child } | crate::expr::ExprNode::RightUnary { op, child } => matches!(op.symbol(), "++" | "--") && is_identifier(child, iterator_name),
		crate::expr::ExprNode::Binary { op, left, .. } => matches!(op.symbol(), "+=" | "-=") && is_identifier(left, iterator_name),
		_ => false,
	}
}

fn is_identifier(expr: &crate::expr::Expr, name: &str) -> bool {
	matches!(&expr.node, crate::expr::ExprNode::Identifier(found) if found == name)
}

/// Rules 5-6: `@shared` must sit between the innermost `@outer` and outermost `@inner`, be an
/// array whose every dimension is compile-time evaluable; `@exclusive` must sit between `@outer`
/// and `@inner`. Both rules require two independent things: the declaration's own nesting (under
/// an `@outer`) and every use of the declared name being nested inside an `@inner` for-loop.
fn validate_shared_and_exclusive(arena: &StatementArena, scopes: &ScopeData, body: StatementId, diagnostics: &mut Diagnostics) -> bool {
	let mut success = true;
	walk_declarations_under_outer(arena, body, false, &mut |declaration_id, under_outer| {
		let node = arena.get(declaration_id);
		if node.has_attribute("shared") && !under_outer {
			diagnostics.error(DiagnosticKind::Semantic, node.origin.clone(), "`@shared` must be declared inside an `@outer` for-loop");
			success = false;
		}
		if node.has_attribute("exclusive") && !under_outer {
			diagnostics.error(DiagnosticKind::Semantic, node.origin.clone(), "`@exclusive` must be declared inside an `@outer` for-loop");
			success = false;
		}
	});

	let names = collect_shared_exclusive_names(arena, scopes, body);
	if !names.is_empty() && !check_uses_inside_inner(arena, body, &names, false, diagnostics) {
		success = false;
	}
	success
}

/// Collects the declared names of every `@shared`/`@exclusive` variable in a kernel, so the
/// use-site walk below can recognise a reference by name without re-resolving scopes at each leaf.
fn collect_shared_exclusive_names(arena: &StatementArena, scopes: &ScopeData, body: StatementId) -> std::collections::HashSet<String> {
	let mut names = std::collections::HashSet::new();
	walk_pre_order(arena, body, &mut |id| {
		let node = arena.get(id);
		if !(node.has_attribute("shared") || node.has_attribute("exclusive")) {
			return;
		}
		let StatementKind::Declaration(declarators) = &node.kind else { return };
		for declarator in declarators {
			names.insert(scopes.variable(declarator.variable).name.clone());
		}
	});
	names
}

/// Walks every statement under `body`, tracking whether the current position lies inside an
/// `@inner` for-loop, and flags any expression reference to a `@shared`/`@exclusive` name found
/// outside that nesting (rule 5/6's use-site half).
fn check_uses_inside_inner(arena: &StatementArena, id: StatementId, names: &std::collections::HashSet<String>, inside_inner: bool, diagnostics: &mut Diagnostics) -> bool {
	let node = arena.get(id);
	let mut success = true;
	let next_inside_inner = inside_inner || (matches!(node.kind, StatementKind::For { .. }) && node.has_attribute("inner"));

	match &node.kind {
		StatementKind::Expression(expr) | StatementKind::Case(expr) => {
			if !check_expr_for_shared_exclusive(expr, names, next_inside_inner, diagnostics) {
				success = false;
			}
		},
		StatementKind::Declaration(declarators) => {
			for declarator in declarators {
				if let Some(initializer) = &declarator.initializer {
					if !check_expr_for_shared_exclusive(initializer, names, next_inside_inner, diagnostics) {
						success = false;
					}
				}
			}
		},
		StatementKind::If { condition, .. } | StatementKind::Switch { subject: condition, .. } => {
			if !check_expr_for_shared_exclusive(condition, names, next_inside_inner, diagnostics) {
				success = false;
			}
		},
		StatementKind::While { check, .. } => {
			if !check_expr_for_shared_exclusive(check, names, next_inside_inner, diagnostics) {
				success = false;
			}
		},
		StatementKind::Return(Some(expr)) => {
			if !check_expr_for_shared_exclusive(expr, names, next_inside_inner, diagnostics) {
				success = false;
			}
		},
		_ => {},
	}

	match &node.kind {
		StatementKind::Block { children, .. } => {
			for child in children {
				if !check_uses_inside_inner(arena, *child, names, next_inside_inner, diagnostics) {
					success = false;
				}
			}
		},
		StatementKind::For { init, check, update, body } => {
			for child in [*init, *check, *update].into_iter().flatten() {
				if !check_uses_inside_inner(arena, child, names, next_inside_inner, diagnostics) {
					success = false;
				}
			}
			if !check_uses_inside_inner(arena, *body, names, next_inside_inner, diagnostics) {
				success = false;
			}
		},
		StatementKind::If { then_branch, else_branch, .. } => {
			if !check_uses_inside_inner(arena, *then_branch, names, next_inside_inner, diagnostics) {
				success = false;
			}
			if let Some(else_branch) = else_branch {
				if !check_uses_inside_inner(arena, *else_branch, names, next_inside_inner, diagnostics) {
					success = false;
				}
			}
		},
		StatementKind::While { body, .. } | StatementKind::Switch { body, .. } | StatementKind::Namespace { body, .. } => {
			if !check_uses_inside_inner(arena, *body, names, next_inside_inner, diagnostics) {
				success = false;
			}
		},
		_ => {},
	}
	success
}

/// Recurses through an expression tree, flagging any `Identifier`/`Variable` leaf whose name is
/// in `names` while `inside_inner` is false.
fn check_expr_for_shared_exclusive(expr: &crate::expr::Expr, names: &std::collections::HashSet<String>, inside_inner: bool, diagnostics: &mut Diagnostics) -> bool {
	let mut success = true;
	walk_expr(expr, &mut |leaf| {
		if let crate::expr::ExprNode::Identifier(name) = &leaf.node {
			if names.contains(name) && !inside_inner {
				diagnostics.error(
					DiagnosticKind::Semantic,
					leaf.origin.clone(),
					format!("use of `@shared`/`@exclusive` variable '{name}' must be inside an `@inner` for-loop"),
				);
				success = false;
			}
		}
	});
	success
}

fn walk_expr(expr: &crate::expr::Expr, visit: &mut impl FnMut(&crate::expr::Expr)) {
	use crate::expr::ExprNode;
	visit(expr);
	match &expr.node {
		ExprNode::LeftUnary { child, .. } | ExprNode::RightUnary { child, .. } | ExprNode::Delete { child, .. } | ExprNode::Sizeof(child) | ExprNode::Throw(child) | ExprNode::Cast { child, .. } | ExprNode::Parentheses(child) => {
			walk_expr(child, visit);
		},
		ExprNode::Binary { left, right, .. } => {
			walk_expr(left, visit);
			walk_expr(right, visit);
		},
		ExprNode::Ternary { condition, then_branch, else_branch } => {
			walk_expr(condition, visit);
			walk_expr(then_branch, visit);
			walk_expr(else_branch, visit);
		},
		ExprNode::Subscript { base, index } => {
			walk_expr(base, visit);
			walk_expr(index, visit);
		},
		ExprNode::Call { callee, arguments } => {
			walk_expr(callee, visit);
			for argument in arguments {
				walk_expr(argument, visit);
			}
		},
		ExprNode::New { init, size, .. } => {
			if let Some(init) = init {
				walk_expr(init, visit);
			}
			if let Some(size) = size {
				walk_expr(size, visit);
			}
		},
		ExprNode::Tuple(items) => {
			for item in items {
				walk_expr(item, visit);
			}
		},
		ExprNode::Pair { child: Some(child), .. } => walk_expr(child, visit),
		ExprNode::CudaCall { callee, blocks, threads } => {
			walk_expr(callee, visit);
			walk_expr(blocks, visit);
			walk_expr(threads, visit);
		},
		_ => {},
	}
}

fn walk_declarations_under_outer(arena: &StatementArena, id: StatementId, under_outer: bool, visit: &mut impl FnMut(StatementId, bool)) {
	let node = arena.get(id);
	if matches!(node.kind, StatementKind::Declaration(_)) {
		visit(id, under_outer);
	}
	let is_outer_for = matches!(node.kind, StatementKind::For { .. }) && node.has_attribute("outer");
	let next_under_outer = under_outer || is_outer_for;
	match &node.kind {
		StatementKind::Block { children, .. } => {
			for child in children {
				walk_declarations_under_outer(arena, *child, next_under_outer, visit);
			}
		},
		StatementKind::For { init, check, update, body } => {
			for child in [*init, *check, *update].into_iter().flatten() {
				walk_declarations_under_outer(arena, child, next_under_outer, visit);
			}
			walk_declarations_under_outer(arena, *body, next_under_outer, visit);
		},
		StatementKind::If { then_branch, else_branch, .. } => {
			walk_declarations_under_outer(arena, *then_branch, next_under_outer, visit);
			if let Some(else_branch) = else_branch {
				walk_declarations_under_outer(arena, *else_branch, next_under_outer, visit);
			}
		},
		StatementKind::While { body, .. } | StatementKind::Switch { body, .. } | StatementKind::Namespace { body, .. } => walk_declarations_under_outer(arena, *body, next_under_outer, visit),
		_ => {},
	}
}

/// Checks a `@shared` variable's array dimensions are all compile-time evaluable (rule 5),
/// against the scope arena that owns its `VarType`. Split out from the tree walk above because it
/// needs `ScopeData`, not just the statement tree.
pub fn validate_shared_array_dimensions(arena: &StatementArena, root: StatementId, scopes: &ScopeData, diagnostics: &mut Diagnostics) -> bool {
	let mut success = true;
	walk_pre_order(arena, root, &mut |id| {
		let node = arena.get(id);
		if !node.has_attribute("shared") {
			return;
		}
		let StatementKind::Declaration(declarators) = &node.kind else { return };
		for declarator in declarators {
			let variable = scopes.variable(declarator.variable);
			if !variable.vartype.is_array() {
				diagnostics.error(DiagnosticKind::Semantic, declarator.origin.clone(), format!("`@shared` variable '{}' must be declared as an array", variable.name));
				success = false;
			} else if !variable.vartype.has_evaluable_array_dimensions() {
				diagnostics.error(DiagnosticKind::Semantic, declarator.origin.clone(), format!("`@shared` array '{}' must have compile-time-evaluable dimensions", variable.name));
				success = false;
			}
		}
	});
	success
}

/// Looks up a bound variable's keyword kind, used by callers that need to distinguish a
/// validated loop iterator from an ordinary identifier reference (e.g. the `@dim`/`@tile`
/// transforms resolving a call's callee).
#[must_use]
pub fn is_declared_type(scopes: &ScopeData, name: &str) -> bool {
	matches!(scopes.lookup(name), Some(Keyword::Type))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attribute::AttributeRegistry;
	use crate::scope::ScopeData;

	fn validate_source(source: &str) -> (bool, Diagnostics) {
		let mut scopes = ScopeData::global();
		let attributes = AttributeRegistry::with_builtins();
		let mut diagnostics = Diagnostics::new();
		let (arena, root) = crate::parser_okl::parse_source(source, "test.okl", &mut scopes, &attributes, &mut diagnostics).unwrap();
		let ok = validate(&arena, root, &scopes, &mut diagnostics);
		(ok, diagnostics)
	}

	#[test]
	fn well_formed_kernel_validates_cleanly() {
		let (ok, diagnostics) = validate_source(
			r"
			@kernel void addVectors(int N, float *a, float *b, float *ans) {
				@outer for (int o = 0; o < N; ++o) {
					@inner for (int i = 0; i < 1; ++i) {
						ans[o] = a[o] + b[o];
					}
				}
			}
			",
		);
		assert!(ok, "{diagnostics:?}");
	}

	#[test]
	fn two_declarator_outer_init_reports_the_exact_scenario_message() {
		let (ok, diagnostics) = validate_source(
			r"
			@kernel void k(int N) {
				@outer for (int i = 0, j = 0; i < N; ++i) {
					@inner for (int x = 0; x < 1; ++x) {}
				}
			}
			",
		);
		assert!(!ok);
		assert!(diagnostics.entries().iter().any(|d| d.message.contains("Can only transform 1 iterator variable")));
	}

	#[test]
	fn missing_inner_loop_is_reported() {
		let (ok, diagnostics) = validate_source(
			r"
			@kernel void k(int N) {
				@outer for (int o = 0; o < N; ++o) {}
			}
			",
		);
		assert!(!ok);
		assert!(diagnostics.entries().iter().any(|d| d.message.contains("no `@inner`")));
	}

	#[test]
	fn empty_kernel_body_fails_for_missing_outer() {
		let (ok, diagnostics) = validate_source("@kernel void k() {}");
		assert!(!ok);
		assert!(diagnostics.entries().iter().any(|d| d.message.contains("no `@outer`")));
	}

	#[test]
	fn shared_variable_used_before_the_inner_loop_is_rejected() {
		let (ok, diagnostics) = validate_source(
			r"
			@kernel void k(int N) {
				@outer for (int o = 0; o < N; ++o) {
					@shared float buf[16];
					buf[0] = 1.0;
					@inner for (int i = 0; i < 16; ++i) {
						buf[i] = buf[i] + 1.0;
					}
				}
			}
			",
		);
		assert!(!ok);
		assert!(diagnostics.entries().iter().any(|d| d.message.contains("must be inside an `@inner` for-loop")));
	}

	#[test]
	fn shared_variable_used_only_inside_the_inner_loop_validates_cleanly() {
		let (ok, diagnostics) = validate_source(
			r"
			@kernel void k(int N) {
				@outer for (int o = 0; o < N; ++o) {
					@shared float buf[16];
					@inner for (int i = 0; i < 16; ++i) {
						buf[i] = i;
					}
				}
			}
			",
		);
		assert!(ok, "{diagnostics:?}");
	}
}
