//! Lexical scopes and the variable/function arenas they bind into (spec §3 "Scopes", §9
//! "Cyclic AST links").
//!
//! Grounded on the teacher's arena-indexed `Scope`/`ScopeData` in `src/api/scope.rs`: scopes
//! form a tree via `parent: Option<usize>` / `children: Vec<usize>` indices into a flat
//! `Vec<Scope>`, which sidesteps the `Rc<RefCell<_>>` cycle that a naive parent/child
//! representation would need. Variables and functions get the same treatment: they are owned by
//! flat arenas and referenced everywhere else by index (`VariableId`/`FunctionId`), which is how
//! `exprNode::Variable` can hold a non-owning handle into a scope it doesn't own without a
//! borrow-checker fight.

use std::collections::HashMap;
use std::fmt;

use crate::types::{Function, Variable};

/// A non-owning handle to a [`Variable`] living in a [`ScopeData`]'s variable arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(pub usize);

impl fmt::Display for VariableId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "$var{}", self.0)
	}
}

/// A non-owning handle to a [`Function`] living in a [`ScopeData`]'s function arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub usize);

/// What an identifier names in a scope (spec §3 "A `Keyword` variant names a `Type`, `Variable`,
/// `Function`, `Qualifier`, or reserved word").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
	Type,
	Variable(VariableId),
	Function(FunctionId),
	Qualifier,
	Reserved,
}

/// One node in the scope tree (spec §3 "A `Scope` is a mapping from identifier to keyword").
#[derive(Debug)]
pub struct Scope {
	pub parent: Option<usize>,
	children: Vec<usize>,
	bindings: HashMap<String, (Keyword, crate::token::FileOrigin)>,
}

impl Scope {
	#[must_use]
	fn get_direct(&self, name: &str) -> Option<&Keyword> {
		self.bindings.get(name).map(|(keyword, _)| keyword)
	}
}

/// The scope-tree arena plus the variable/function arenas every `Keyword::Variable` /
/// `Keyword::Function` indexes into. Exactly one `ScopeData` exists per compilation
/// ([`crate::session::Session`] owns it).
pub struct ScopeData {
	scopes: Vec<Scope>,
	current: usize,
	variables: Vec<Variable>,
	functions: Vec<Function>,
}

impl ScopeData {
	#[must_use]
	pub fn global() -> Self {
		Self {
			scopes: vec![Scope {
				parent: None,
				children: Vec::new(),
				bindings: HashMap::new(),
			}],
			current: 0,
			variables: Vec::new(),
			functions: Vec::new(),
		}
	}

	#[must_use]
	pub const fn global_id(&self) -> usize {
		0
	}

	#[must_use]
	pub const fn current_id(&self) -> usize {
		self.current
	}

	pub fn enter(&mut self) -> usize {
		let id = self.scopes.len();
		self.scopes.push(Scope {
			parent: Some(self.current),
			children: Vec::new(),
			bindings: HashMap::new(),
		});
		self.scopes[self.current].children.push(id);
		self.current = id;
		id
	}

	/// Exits the current scope. A no-op (rather than an error) at the global scope, since
	/// callers that walk a tree recursively often call `exit` unconditionally on the way back up
	/// without tracking whether they ever entered.
	pub fn exit(&mut self) {
		if let Some(parent) = self.scopes[self.current].parent {
			self.current = parent;
		}
	}

	pub fn set_current(&mut self, id: usize) -> usize {
		let previous = self.current;
		self.current = id;
		previous
	}

	/// Introduces a new binding into the scope with the given id. Returns the origin of a prior
	/// definition if `name` is already bound in that exact scope (spec §3 "Scope keys are unique
	/// within a scope; redefinition is an error with the first definition's origin reported").
	pub fn declare_in(&mut self, id: usize, name: String, keyword: Keyword, origin: crate::token::FileOrigin) -> Result<(), crate::token::FileOrigin> {
		if let Some((_, existing_origin)) = self.scopes[id].bindings.get(&name) {
			return Err(existing_origin.clone());
		}
		self.scopes[id].bindings.insert(name, (keyword, origin));
		Ok(())
	}

	pub fn declare(&mut self, name: String, keyword: Keyword, origin: crate::token::FileOrigin) -> Result<(), crate::token::FileOrigin> {
		self.declare_in(self.current, name, keyword, origin)
	}

	/// Resolves `name` by walking from the scope with the given id up through its ancestors
	/// (spec §3 "lookup chains through parent blocks").
	#[must_use]
	pub fn lookup_from(&self, id: usize, name: &str) -> Option<&Keyword> {
		let mut current = Some(id);
		while let Some(index) = current {
			let scope = &self.scopes[index];
			if let Some(keyword) = scope.get_direct(name) {
				return Some(keyword);
			}
			current = scope.parent;
		}
		None
	}

	#[must_use]
	pub fn lookup(&self, name: &str) -> Option<&Keyword> {
		self.lookup_from(self.current, name)
	}

	pub fn declare_variable(&mut self, variable: Variable, origin: crate::token::FileOrigin) -> Result<VariableId, crate::token::FileOrigin> {
		let id = VariableId(self.variables.len());
		let name = variable.name.clone();
		self.variables.push(variable);
		self.declare(name, Keyword::Variable(id), origin)?;
		Ok(id)
	}

	pub fn declare_function(&mut self, function: Function, origin: crate::token::FileOrigin) -> Result<FunctionId, crate::token::FileOrigin> {
		let id = FunctionId(self.functions.len());
		let name = function.name.clone();
		self.functions.push(function);
		self.declare(name, Keyword::Function(id), origin)?;
		Ok(id)
	}

	#[must_use]
	pub fn variable(&self, id: VariableId) -> &Variable {
		&self.variables[id.0]
	}

	pub fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
		&mut self.variables[id.0]
	}

	#[must_use]
	pub fn function(&self, id: FunctionId) -> &Function {
		&self.functions[id.0]
	}

	pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
		&mut self.functions[id.0]
	}

	/// Resolves the variable an `exprNode::Variable` references by name, from the scope that owns
	/// the statement containing the expression (spec §8 invariant 3).
	#[must_use]
	pub fn resolve_variable_from(&self, id: usize, name: &str) -> Option<VariableId> {
		match self.lookup_from(id, name) {
			Some(Keyword::Variable(variable_id)) => Some(*variable_id),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::token::FileOrigin;
	use crate::types::{PrimitiveKind, VarType};

	#[test]
	fn redefinition_reports_first_origin() {
		let mut scopes = ScopeData::global();
		let first_origin = FileOrigin::synthetic("a.okl");
		scopes
			.declare_variable(
				Variable {
					name: "x".to_owned(),
					vartype: VarType::primitive(PrimitiveKind::Int),
					attributes: Vec::new(),
				},
				first_origin.clone(),
			)
			.unwrap();
		let second_origin = FileOrigin { line: 5, ..first_origin.clone() };
		let err = scopes
			.declare_variable(
				Variable {
					name: "x".to_owned(),
					vartype: VarType::primitive(PrimitiveKind::Int),
					attributes: Vec::new(),
				},
				second_origin,
			)
			.unwrap_err();
		assert_eq!(err, first_origin);
	}

	#[test]
	fn child_scope_sees_parent_variable() {
		let mut scopes = ScopeData::global();
		let origin = FileOrigin::synthetic("a.okl");
		scopes
			.declare_variable(
				Variable {
					name: "n".to_owned(),
					vartype: VarType::primitive(PrimitiveKind::Int),
					attributes: Vec::new(),
				},
				origin.clone(),
			)
			.unwrap();
		scopes.enter();
		assert!(matches!(scopes.lookup("n"), Some(Keyword::Variable(_))));
		scopes.exit();
		assert_eq!(scopes.current_id(), scopes.global_id());
	}
}
