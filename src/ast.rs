//! The statement tree (spec §3 "Statements", §9 "Cyclic AST links").
//!
//! Statements form a tree with parent back-links, which is exactly the owner/back-edge cycle
//! the design notes call for arena-ing: every `Statement` lives in a flat [`StatementArena`] and
//! is referred to everywhere else — by its `Block`'s `children`, by its `parent` field, by a
//! transform's replace-and-return result — through a [`StatementId`] index rather than an owned
//! or reference-counted pointer. This mirrors [`crate::scope::ScopeData`]'s treatment of scopes
//! and variables, which is grounded on the same arena pattern in the teacher's
//! `src/api/scope.rs`.

use crate::attribute::AttributeInstance;
use crate::expr::Expr;
use crate::scope::VariableId;
use crate::token::FileOrigin;
use crate::types::VarType;

/// A non-owning handle to a [`StatementNode`] living in a [`StatementArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementId(pub usize);

/// One declarator inside a `Declaration` statement: the variable it introduces, its optional
/// initializer expression, and the source location of its own name (distinct from the
/// `Declaration` statement's origin, which points at the first token of the whole declaration —
/// the validator needs to report the second-or-later declarator in a multi-declarator loop
/// initializer at its own location, not the first's).
#[derive(Debug, Clone)]
pub struct VariableDeclarator {
	pub variable: VariableId,
	pub initializer: Option<Expr>,
	pub origin: FileOrigin,
}

/// Tagged statement variants (spec §3 "Statements").
#[derive(Debug, Clone)]
pub enum StatementKind {
	Empty,
	Pragma(String),
	Block { children: Vec<StatementId>, scope: usize },
	Namespace { name: String, body: StatementId },
	TypeDecl { name: String, underlying: VarType },
	ClassAccess(String),
	Expression(Expr),
	Declaration(Vec<VariableDeclarator>),
	Goto(String),
	GotoLabel(String),
	If { condition: Expr, then_branch: StatementId, else_branch: Option<StatementId> },
	For { init: Option<StatementId>, check: Option<StatementId>, update: Option<StatementId>, body: StatementId },
	While { check: Expr, body: StatementId, is_do_while: bool },
	Switch { subject: Expr, body: StatementId },
	Case(Expr),
	Default,
	Continue,
	Break,
	Return(Option<Expr>),
	FunctionDecl { function: crate::scope::FunctionId, body: Option<StatementId> },
}

impl StatementKind {
	/// The discriminant label used by [`crate::attribute::AttributeKind::is_statement_attribute`]
	/// to decide where an attribute may attach, without creating a dependency from the attribute
	/// module back onto this one's concrete variants.
	#[must_use]
	pub const fn label(&self) -> &'static str {
		match self {
			Self::Empty => "empty",
			Self::Pragma(_) => "pragma",
			Self::Block { .. } => "block",
			Self::Namespace { .. } => "namespace",
			Self::TypeDecl { .. } => "type_decl",
			Self::ClassAccess(_) => "class_access",
			Self::Expression(_) => "expression",
			Self::Declaration(_) => "declaration",
			Self::Goto(_) => "goto",
			Self::GotoLabel(_) => "goto_label",
			Self::If { .. } => "if",
			Self::For { .. } => "for",
			Self::While { .. } => "while",
			Self::Switch { .. } => "switch",
			Self::Case(_) => "case",
			Self::Default => "default",
			Self::Continue => "continue",
			Self::Break => "break",
			Self::Return(_) => "return",
			Self::FunctionDecl { .. } => "function_decl",
		}
	}
}

/// A statement plus its attribute list, source origin, and parent back-link (spec §3: "Each
/// carries an attribute list"; §9: owner edges are exclusive ownership, back-edges are
/// non-owning handles).
#[derive(Debug, Clone)]
pub struct StatementNode {
	pub kind: StatementKind,
	pub attributes: Vec<AttributeInstance>,
	pub origin: FileOrigin,
	pub parent: Option<StatementId>,
}

impl StatementNode {
	#[must_use]
	pub fn has_attribute(&self, name: &str) -> bool {
		self.attributes.iter().any(|attribute| attribute.kind_name == name)
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<&AttributeInstance> {
		self.attributes.iter().rev().find(|attribute| attribute.kind_name == name)
	}
}

/// The flat arena every statement in a compilation unit lives in. Freeing the whole AST is one
/// operation: drop the arena (spec §9 "Arena the AST under the root block to make freeing a
/// single operation").
#[derive(Debug, Default)]
pub struct StatementArena {
	nodes: Vec<StatementNode>,
}

impl StatementArena {
	#[must_use]
	pub const fn new() -> Self {
		Self { nodes: Vec::new() }
	}

	pub fn insert(&mut self, kind: StatementKind, origin: FileOrigin, parent: Option<StatementId>) -> StatementId {
		let id = StatementId(self.nodes.len());
		self.nodes.push(StatementNode {
			kind,
			attributes: Vec::new(),
			origin,
			parent,
		});
		id
	}

	#[must_use]
	pub fn get(&self, id: StatementId) -> &StatementNode {
		&self.nodes[id.0]
	}

	pub fn get_mut(&mut self, id: StatementId) -> &mut StatementNode {
		&mut self.nodes[id.0]
	}

	/// Replaces the statement at `id` in place (transform replace-and-return protocol, spec
	/// §4.I/§5); the id, and therefore every existing reference to it, stays valid.
	pub fn replace(&mut self, id: StatementId, kind: StatementKind) {
		self.nodes[id.0].kind = kind;
	}

	/// Removes `child` from `parent`'s `Block` children list (transform "return null to drop").
	/// No-ops if `parent` is not a `Block` or does not list `child`.
	pub fn detach_child(&mut self, parent: StatementId, child: StatementId) {
		if let StatementKind::Block { children, .. } = &mut self.nodes[parent.0].kind {
			children.retain(|id| *id != child);
		}
	}

	/// Checks the invariant `s.parent == null ∨ s ∈ s.parent.children` for every statement that
	/// descends from `root` (spec §8 invariant 2). Intended for tests and debug assertions, not
	/// the hot path.
	#[must_use]
	pub fn check_parent_invariant(&self, root: StatementId) -> bool {
		let node = self.get(root);
		if let Some(parent_id) = node.parent {
			let StatementKind::Block { children, .. } = &self.get(parent_id).kind else {
				return false;
			};
			if !children.contains(&root) {
				return false;
			}
		}
		match &node.kind {
			StatementKind::Block { children, .. } => children.iter().all(|child| self.check_parent_invariant(*child)),
			StatementKind::For { init, check, update, body } => [*init, *check, *update].into_iter().flatten().chain([*body]).all(|child| self.check_parent_invariant(child)),
			StatementKind::If { then_branch, else_branch, .. } => self.check_parent_invariant(*then_branch) && else_branch.map_or(true, |child| self.check_parent_invariant(child)),
			StatementKind::While { body, .. } | StatementKind::Switch { body, .. } | StatementKind::Namespace { body, .. } => self.check_parent_invariant(*body),
			StatementKind::FunctionDecl { body: Some(body), .. } => self.check_parent_invariant(*body),
			_ => true,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parent_invariant_holds_for_a_simple_block() {
		let mut arena = StatementArena::new();
		let origin = FileOrigin::synthetic("a.okl");
		let block = arena.insert(StatementKind::Block { children: Vec::new(), scope: 0 }, origin.clone(), None);
		let child = arena.insert(StatementKind::Empty, origin, Some(block));
		if let StatementKind::Block { children, .. } = &mut arena.get_mut(block).kind {
			children.push(child);
		}
		assert!(arena.check_parent_invariant(block));
	}
}
