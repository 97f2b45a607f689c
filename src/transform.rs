//! The statement/expression rewrite framework (spec §4.I): two visitor traits plus a handful of
//! tree utilities that `@dim` ([`dim`]) and `@tile`/`@safeTile` ([`tile`]) are built on top of.
//!
//! Grounded on the pre-order/post-order "visit, replace, or drop" shape of the teacher's own
//! statement-rewrite passes (`src/parser/statements/mod.rs`'s `Statement::evaluate_statements`),
//! generalized from Cabin's compile-time evaluation walk to OKL's backend-rewrite walk.

pub mod dim;
pub mod tile;

use crate::ast::{StatementArena, StatementId, StatementKind, StatementNode};
use crate::diagnostics::Diagnostics;
use crate::expr::{Expr, ExprNode};
use crate::scope::ScopeData;

/// Rewrites one statement at a time. Returning `None` drops the statement from its parent;
/// returning `Some(id)` keeps (or replaces, if `id` differs from the visited node) it. Honours
/// `down_to_up` for post-order visits (spec §4.I "honours a `downToUp` flag for post-order").
pub trait StatementTransform {
	fn visit(&mut self, arena: &mut StatementArena, scopes: &mut ScopeData, scope_id: usize, id: StatementId, diagnostics: &mut Diagnostics) -> Option<StatementId>;

	fn down_to_up(&self) -> bool {
		false
	}
}

/// Rewrites one expression node at a time, bottom-up. Used by [`rewrite_expr_postorder`] to walk
/// a whole expression tree and by `@dim`'s call-to-subscript rewrite.
pub trait ExprTransform {
	fn visit(&mut self, expr: Expr, diagnostics: &mut Diagnostics) -> Expr;
}

/// Runs `transform` over every statement reachable from `root`, threading the enclosing scope id
/// down through nested blocks so a transform can resolve identifiers against the right scope
/// without its own push/pop bookkeeping. Returns the (possibly different) id that should replace
/// `root` in its own parent, or `None` if `root` itself was dropped.
pub fn apply_statement_transform(arena: &mut StatementArena, scopes: &mut ScopeData, root: StatementId, transform: &mut impl StatementTransform, diagnostics: &mut Diagnostics) -> Option<StatementId> {
	let root_scope = block_scope(arena, root).unwrap_or_else(|| scopes.global_id());
	walk(arena, scopes, root, root_scope, transform, diagnostics)
}

fn block_scope(arena: &StatementArena, id: StatementId) -> Option<usize> {
	match &arena.get(id).kind {
		StatementKind::Block { scope, .. } => Some(*scope),
		_ => None,
	}
}

fn walk(arena: &mut StatementArena, scopes: &mut ScopeData, id: StatementId, scope_id: usize, transform: &mut impl StatementTransform, diagnostics: &mut Diagnostics) -> Option<StatementId> {
	let mut current = id;
	if !transform.down_to_up() {
		current = transform.visit(arena, scopes, scope_id, current, diagnostics)?;
	}

	let child_scope = block_scope(arena, current).unwrap_or(scope_id);
	for child in children_of(arena.get(current)) {
		let replacement = walk(arena, scopes, child, child_scope, transform, diagnostics);
		replace_child(&mut arena.get_mut(current).kind, child, replacement);
	}

	if transform.down_to_up() {
		transform.visit(arena, scopes, scope_id, current, diagnostics)
	} else {
		Some(current)
	}
}

fn children_of(node: &StatementNode) -> Vec<StatementId> {
	match &node.kind {
		StatementKind::Block { children, .. } => children.clone(),
		StatementKind::Namespace { body, .. } | StatementKind::While { body, .. } | StatementKind::Switch { body, .. } => vec![*body],
		StatementKind::If { then_branch, else_branch, .. } => {
			let mut ids = vec![*then_branch];
			ids.extend(*else_branch);
			ids
		},
		StatementKind::For { init, check, update, body } => {
			let mut ids: Vec<StatementId> = [*init, *check, *update].into_iter().flatten().collect();
			ids.push(*body);
			ids
		},
		StatementKind::FunctionDecl { body: Some(body), .. } => vec![*body],
		_ => Vec::new(),
	}
}

/// Updates whichever slot of `kind` held `old` to `new` (or removes it, for a `Block`'s children,
/// when `new` is `None`). A statement other than a `Block` whose only child is dropped keeps its
/// old child id, since a for-loop or if-branch cannot structurally lose its body/branch — only a
/// transform that replaces the whole enclosing statement can remove one of those.
fn replace_child(kind: &mut StatementKind, old: StatementId, new: Option<StatementId>) {
	match kind {
		StatementKind::Block { children, .. } => match new {
			Some(new_id) => {
				if let Some(slot) = children.iter_mut().find(|child| **child == old) {
					*slot = new_id;
				}
			},
			None => children.retain(|child| *child != old),
		},
		StatementKind::Namespace { body, .. } | StatementKind::While { body, .. } | StatementKind::Switch { body, .. } => {
			if *body == old {
				if let Some(new_id) = new {
					*body = new_id;
				}
			}
		},
		StatementKind::If { then_branch, else_branch, .. } => {
			if *then_branch == old {
				if let Some(new_id) = new {
					*then_branch = new_id;
				}
			}
			if *else_branch == Some(old) {
				*else_branch = new;
			}
		},
		StatementKind::For { init, check, update, body } => {
			for slot in [init, check, update] {
				if *slot == Some(old) {
					*slot = new;
				}
			}
			if *body == old {
				if let Some(new_id) = new {
					*body = new_id;
				}
			}
		},
		StatementKind::FunctionDecl { body, .. } => {
			if *body == Some(old) {
				*body = new;
			}
		},
		_ => {},
	}
}

/// Walks `expr` bottom-up, calling `transform.visit` on every node including the root (spec §4.I
/// "`ExprTransform` ... returns a replacement node").
pub fn rewrite_expr_postorder(expr: Expr, transform: &mut impl ExprTransform, diagnostics: &mut Diagnostics) -> Expr {
	let Expr { node, origin } = expr;
	let rewritten_node = match node {
		ExprNode::LeftUnary { op, child } => ExprNode::LeftUnary {
			op,
			child: Box::new(rewrite_expr_postorder(*child, transform, diagnostics)),
		},
		ExprNode::RightUnary { op, child } => ExprNode::RightUnary {
			op,
			child: Box::new(rewrite_expr_postorder(*child, transform, diagnostics)),
		},
		ExprNode::Binary { op, left, right } => ExprNode::Binary {
			op,
			left: Box::new(rewrite_expr_postorder(*left, transform, diagnostics)),
			right: Box::new(rewrite_expr_postorder(*right, transform, diagnostics)),
		},
		ExprNode::Ternary { condition, then_branch, else_branch } => ExprNode::Ternary {
			condition: Box::new(rewrite_expr_postorder(*condition, transform, diagnostics)),
			then_branch: Box::new(rewrite_expr_postorder(*then_branch, transform, diagnostics)),
			else_branch: Box::new(rewrite_expr_postorder(*else_branch, transform, diagnostics)),
		},
		ExprNode::Subscript { base, index } => ExprNode::Subscript {
			base: Box::new(rewrite_expr_postorder(*base, transform, diagnostics)),
			index: Box::new(rewrite_expr_postorder(*index, transform, diagnostics)),
		},
		ExprNode::Call { callee, arguments } => ExprNode::Call {
			callee: Box::new(rewrite_expr_postorder(*callee, transform, diagnostics)),
			arguments: arguments.into_iter().map(|argument| rewrite_expr_postorder(argument, transform, diagnostics)).collect(),
		},
		ExprNode::Parentheses(child) => ExprNode::Parentheses(Box::new(rewrite_expr_postorder(*child, transform, diagnostics))),
		ExprNode::Sizeof(child) => ExprNode::Sizeof(Box::new(rewrite_expr_postorder(*child, transform, diagnostics))),
		ExprNode::Throw(child) => ExprNode::Throw(Box::new(rewrite_expr_postorder(*child, transform, diagnostics))),
		ExprNode::Delete { is_array, child } => ExprNode::Delete {
			is_array,
			child: Box::new(rewrite_expr_postorder(*child, transform, diagnostics)),
		},
		ExprNode::Cast { kind, target_type, child } => ExprNode::Cast {
			kind,
			target_type,
			child: Box::new(rewrite_expr_postorder(*child, transform, diagnostics)),
		},
		ExprNode::Tuple(items) => ExprNode::Tuple(items.into_iter().map(|item| rewrite_expr_postorder(item, transform, diagnostics)).collect()),
		ExprNode::New { target_type, init, size } => ExprNode::New {
			target_type,
			init: init.map(|child| Box::new(rewrite_expr_postorder(*child, transform, diagnostics))),
			size: size.map(|child| Box::new(rewrite_expr_postorder(*child, transform, diagnostics))),
		},
		ExprNode::CudaCall { callee, blocks, threads } => ExprNode::CudaCall {
			callee: Box::new(rewrite_expr_postorder(*callee, transform, diagnostics)),
			blocks: Box::new(rewrite_expr_postorder(*blocks, transform, diagnostics)),
			threads: Box::new(rewrite_expr_postorder(*threads, transform, diagnostics)),
		},
		other => other,
	};
	transform.visit(Expr::new(rewritten_node, origin.clone()), diagnostics)
}

/// One node of a [`StatementTreeFinder`] result: a statement matching its predicate, plus its
/// nearest matching descendants.
#[derive(Debug)]
pub struct FoundNode {
	pub id: StatementId,
	pub children: Vec<FoundNode>,
}

/// Builds the tree of statements matching a predicate under some root, preserving source nesting
/// but skipping non-matching intermediates (spec §4.I: "used by `@outer`/`@inner` ordering and
/// `@shared`/`@exclusive` placement").
pub struct StatementTreeFinder<'a> {
	predicate: &'a dyn Fn(&StatementNode) -> bool,
}

impl<'a> StatementTreeFinder<'a> {
	#[must_use]
	pub const fn new(predicate: &'a dyn Fn(&StatementNode) -> bool) -> Self {
		Self { predicate }
	}

	#[must_use]
	pub fn find(&self, arena: &StatementArena, root: StatementId) -> Vec<FoundNode> {
		self.find_in(arena, root)
	}

	fn find_in(&self, arena: &StatementArena, id: StatementId) -> Vec<FoundNode> {
		children_of(arena.get(id))
			.into_iter()
			.flat_map(|child| {
				if (self.predicate)(arena.get(child)) {
					vec![FoundNode { id: child, children: self.find_in(arena, child) }]
				} else {
					self.find_in(arena, child)
				}
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attribute::AttributeRegistry;
	use crate::token::FileOrigin;

	#[test]
	fn tree_finder_skips_non_matching_intermediates() {
		let mut scopes = ScopeData::global();
		let attributes = AttributeRegistry::with_builtins();
		let mut diagnostics = Diagnostics::new();
		let (arena, root) = crate::parser_okl::parse_source(
			r"
			@kernel void k(int N) {
				@outer for (int o = 0; o < N; ++o) {
					if (o > 0) {
						@inner for (int i = 0; i < 1; ++i) {}
					}
				}
			}
			",
			"test.okl",
			&mut scopes,
			&attributes,
			&mut diagnostics,
		)
		.unwrap();

		let is_for = |node: &StatementNode| matches!(node.kind, StatementKind::For { .. });
		let finder = StatementTreeFinder::new(&is_for);
		let tree = finder.find(&arena, root);
		assert_eq!(tree.len(), 1, "exactly one top-level for-loop (@outer)");
		assert_eq!(tree[0].children.len(), 1, "the @inner loop is found through the intervening if");
	}

	#[test]
	fn drop_statement_transform_removes_empty_statements() {
		struct DropEmpty;
		impl StatementTransform for DropEmpty {
			fn visit(&mut self, arena: &mut StatementArena, _scopes: &mut ScopeData, _scope_id: usize, id: StatementId, _diagnostics: &mut Diagnostics) -> Option<StatementId> {
				if matches!(arena.get(id).kind, StatementKind::Empty) {
					None
				} else {
					Some(id)
				}
			}
		}

		let mut arena = StatementArena::new();
		let origin = FileOrigin::synthetic("a.okl");
		let root = arena.insert(StatementKind::Block { children: Vec::new(), scope: 0 }, origin.clone(), None);
		let empty = arena.insert(StatementKind::Empty, origin, Some(root));
		if let StatementKind::Block { children, .. } = &mut arena.get_mut(root).kind {
			children.push(empty);
		}

		let mut scopes = ScopeData::global();
		let mut diagnostics = Diagnostics::new();
		apply_statement_transform(&mut arena, &mut scopes, root, &mut DropEmpty, &mut diagnostics);

		let StatementKind::Block { children, .. } = &arena.get(root).kind else { panic!() };
		assert!(children.is_empty());
	}
}
