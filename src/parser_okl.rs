//! The statement parser (spec §4.F): a peek-table-driven recursive-descent loader that builds
//! the [`crate::ast::StatementArena`] tree and populates [`crate::scope::ScopeData`] as it goes,
//! consulting the registered attribute kinds for the `@name(args…)` prefixes OKL attaches to
//! declarations, functions, and `for` statements.
//!
//! Grounded on the peek-then-dispatch shape of the teacher's `parser/mod.rs` statement loader,
//! adapted from Cabin's keyword set to the C-family grammar OKL kernels are written in.

use crate::ast::{StatementArena, StatementId, StatementKind, VariableDeclarator};
use crate::attribute::{AttributeInstance, AttributeRegistry};
use crate::cursor::Cursor;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::expr::{parse_expression, Expr};
use crate::scope::{Keyword, ScopeData};
use crate::token::{FileOrigin, Token, TokenKind};
use crate::types::{qualifier, ArrayDimension, BaseType, PrimitiveKind, Qualifiers, VarType, Variable};

/// Everything a parse needs threaded through it: the token cursor, the statement arena being
/// built, the scope/variable/function arena, the attribute registry, and the diagnostic sink.
pub struct Parser<'tokens, 'ctx> {
	cursor: Cursor<'tokens>,
	arena: &'ctx mut StatementArena,
	scopes: &'ctx mut ScopeData,
	attributes: &'ctx AttributeRegistry,
	diagnostics: &'ctx mut Diagnostics,
}

impl<'tokens, 'ctx> Parser<'tokens, 'ctx> {
	pub fn new(tokens: &'tokens [Token], arena: &'ctx mut StatementArena, scopes: &'ctx mut ScopeData, attributes: &'ctx AttributeRegistry, diagnostics: &'ctx mut Diagnostics) -> Self {
		Self {
			cursor: Cursor::new(tokens),
			arena,
			scopes,
			attributes,
			diagnostics,
		}
	}

	/// Parses a whole translation unit into one root `Block` statement.
	pub fn parse_program(&mut self) -> StatementId {
		let origin = self.cursor.peek().map_or_else(|| FileOrigin::synthetic("<empty>"), |token| token.origin.clone());
		let scope = self.scopes.global_id();
		let root = self.arena.insert(StatementKind::Block { children: Vec::new(), scope }, origin, None);
		let mut children = Vec::new();
		while !self.cursor.at_eof() {
			if let Some(child) = self.parse_statement(root) {
				children.push(child);
			} else {
				self.cursor.advance();
			}
		}
		if let StatementKind::Block { children: slot, .. } = &mut self.arena.get_mut(root).kind {
			*slot = children;
		}
		root
	}

	fn peek_symbol(&self, symbol: &str) -> bool {
		self.cursor.is_operator(symbol)
	}

	fn peek_keyword(&self, keyword: &str) -> bool {
		matches!(self.cursor.peek().map(|t| &t.kind), Some(TokenKind::Identifier(name)) if name == keyword)
	}

	fn eat_keyword(&mut self, keyword: &str) -> bool {
		if self.peek_keyword(keyword) {
			self.cursor.advance();
			true
		} else {
			false
		}
	}

	fn expect_symbol(&mut self, symbol: &str, context: &str) -> bool {
		if self.cursor.eat_operator(symbol) {
			true
		} else {
			let origin = self.cursor.peek().map_or_else(|| FileOrigin::synthetic("<eof>"), |t| t.origin.clone());
			self.diagnostics.error(DiagnosticKind::Parse, origin, format!("expected '{symbol}' {context}"));
			false
		}
	}

	/// Parses `@name(args…)` prefixes until none remain (spec §4.G).
	fn parse_attribute_prefixes(&mut self) -> Vec<AttributeInstance> {
		let mut attributes = Vec::new();
		while self.peek_symbol("@") {
			let origin = self.cursor.peek().unwrap().origin.clone();
			self.cursor.advance();
			let Some(name) = self.cursor.peek().and_then(|t| t.kind.as_identifier()).map(str::to_owned) else {
				self.diagnostics.error(DiagnosticKind::Parse, origin, "expected an attribute name after '@'");
				continue;
			};
			self.cursor.advance();
			let mut arguments = Vec::new();
			if self.cursor.eat_operator("(") {
				if !self.peek_symbol(")") {
					loop {
						// `@tile(16, @outer, @inner)` names its companion attributes as bare
						// `@name` tokens rather than expressions; `@tile`'s own transform strips
						// the leading '@' back off to read them (spec §4.I).
						if self.peek_symbol("@") {
							let marker_origin = self.cursor.peek().unwrap().origin.clone();
							self.cursor.advance();
							if let Some(marker_name) = self.cursor.peek().and_then(|t| t.kind.as_identifier()).map(str::to_owned) {
								self.cursor.advance();
								arguments.push(Expr::new(crate::expr::ExprNode::Identifier(format!("@{marker_name}")), marker_origin));
							}
						} else if let Some(expr) = parse_expression(&mut self.cursor, self.diagnostics, 11) {
							arguments.push(expr);
						}
						if !self.cursor.eat_operator(",") {
							break;
						}
					}
				}
				self.expect_symbol(")", "to close an attribute argument list");
			}
			let kind = self.attributes.find(&name);
			if let Some(kind) = kind {
				let instance = kind.create(origin, arguments);
				attributes.push(instance);
			} else {
				attributes.push(AttributeInstance { kind_name: name, origin, arguments });
			}
		}
		self.warn_duplicate_attributes(&attributes);
		attributes
	}

	/// A single attribute is always the latest of its name; an earlier duplicate is silently
	/// overridden by `has_attribute`/`attribute`'s `.rev().find()`, so surface it as a warning
	/// here instead (spec §4.G "a duplicate overrides with a warning").
	fn warn_duplicate_attributes(&mut self, attributes: &[AttributeInstance]) {
		for (index, attribute) in attributes.iter().enumerate() {
			if attributes[index + 1..].iter().any(|later| later.kind_name == attribute.kind_name) {
				self.diagnostics.warning(DiagnosticKind::Parse, attribute.origin.clone(), format!("duplicate '@{}' attribute; only the last instance is used", attribute.kind_name));
			}
		}
	}

	fn parse_statement(&mut self, parent: StatementId) -> Option<StatementId> {
		let attributes = self.parse_attribute_prefixes();
		let origin = self.cursor.peek()?.origin.clone();

		let id = if self.peek_symbol(";") {
			self.cursor.advance();
			self.arena.insert(StatementKind::Empty, origin, Some(parent))
		} else if self.peek_symbol("{") {
			self.parse_block(parent)?
		} else if self.peek_keyword("if") {
			self.parse_if(parent, origin)?
		} else if self.peek_keyword("for") {
			self.parse_for(parent, origin)?
		} else if self.peek_keyword("while") {
			self.parse_while(parent, origin, false)?
		} else if self.peek_keyword("do") {
			self.parse_while(parent, origin, true)?
		} else if self.peek_keyword("return") {
			self.cursor.advance();
			let value = if self.peek_symbol(";") { None } else { parse_expression(&mut self.cursor, self.diagnostics, 0) };
			self.expect_symbol(";", "after a return statement");
			self.arena.insert(StatementKind::Return(value), origin, Some(parent))
		} else if self.eat_keyword("break") {
			self.expect_symbol(";", "after break");
			self.arena.insert(StatementKind::Break, origin, Some(parent))
		} else if self.eat_keyword("continue") {
			self.expect_symbol(";", "after continue");
			self.arena.insert(StatementKind::Continue, origin, Some(parent))
		} else if self.eat_keyword("goto") {
			let label = self.cursor.peek().and_then(|t| t.kind.as_identifier()).map(str::to_owned).unwrap_or_default();
			self.cursor.advance();
			self.expect_symbol(";", "after goto");
			self.arena.insert(StatementKind::Goto(label), origin, Some(parent))
		} else if self.is_label_ahead() {
			let label = self.cursor.advance().and_then(|t| t.kind.as_identifier()).map(str::to_owned).unwrap_or_default();
			self.cursor.advance(); // ':'
			self.arena.insert(StatementKind::GotoLabel(label), origin, Some(parent))
		} else if self.starts_declaration() {
			self.parse_declaration_or_function(parent, origin, &attributes)?
		} else {
			let expr = parse_expression(&mut self.cursor, self.diagnostics, 0)?;
			self.expect_symbol(";", "after an expression statement");
			self.arena.insert(StatementKind::Expression(expr), origin, Some(parent))
		};

		if !attributes.is_empty() {
			let statement_kind_label = self.arena.get(id).kind.label().to_owned();
			for attribute in &attributes {
				if let Some(kind) = self.attributes.find(&attribute.kind_name) {
					if kind.is_statement_attribute(&statement_kind_label) {
						kind.on_statement_load(attribute, self.diagnostics);
					}
				}
			}
			self.arena.get_mut(id).attributes = attributes;
		}
		Some(id)
	}

	fn is_label_ahead(&self) -> bool {
		matches!(self.cursor.peek().map(|t| &t.kind), Some(TokenKind::Identifier(_))) && matches!(self.cursor.peek_at(1).map(|t| &t.kind), Some(TokenKind::Operator(op)) if op.symbol() == ":")
	}

	fn parse_block(&mut self, parent: StatementId) -> Option<StatementId> {
		let origin = self.cursor.peek()?.origin.clone();
		self.cursor.advance();
		let scope_id = self.scopes.enter();
		let block = self.arena.insert(StatementKind::Block { children: Vec::new(), scope: scope_id }, origin, Some(parent));
		let mut children = Vec::new();
		while !self.peek_symbol("}") && !self.cursor.at_eof() {
			if let Some(child) = self.parse_statement(block) {
				children.push(child);
			} else {
				self.cursor.advance();
			}
		}
		self.expect_symbol("}", "to close a block");
		self.scopes.exit();
		if let StatementKind::Block { children: slot, .. } = &mut self.arena.get_mut(block).kind {
			*slot = children;
		}
		Some(block)
	}

	fn parse_if(&mut self, parent: StatementId, origin: FileOrigin) -> Option<StatementId> {
		self.cursor.advance();
		self.expect_symbol("(", "after 'if'");
		let condition = parse_expression(&mut self.cursor, self.diagnostics, 0)?;
		self.expect_symbol(")", "to close an 'if' condition");
		let id = self.arena.insert(StatementKind::If { condition, then_branch: StatementId(0), else_branch: None }, origin, Some(parent));
		let then_branch = self.parse_statement(id)?;
		let else_branch = if self.eat_keyword("else") { self.parse_statement(id) } else { None };
		if let StatementKind::If { then_branch: slot, else_branch: else_slot, .. } = &mut self.arena.get_mut(id).kind {
			*slot = then_branch;
			*else_slot = else_branch;
		}
		Some(id)
	}

	fn parse_for(&mut self, parent: StatementId, origin: FileOrigin) -> Option<StatementId> {
		self.cursor.advance();
		self.expect_symbol("(", "after 'for'");
		let scope_id = self.scopes.enter();
		let id = self.arena.insert(StatementKind::For { init: None, check: None, update: None, body: StatementId(0) }, origin.clone(), Some(parent));
		let init = if self.peek_symbol(";") {
			self.cursor.advance();
			None
		} else if self.starts_declaration() {
			self.parse_declaration_or_function(id, origin.clone(), &[])
		} else {
			let expr = parse_expression(&mut self.cursor, self.diagnostics, 0);
			self.expect_symbol(";", "after a for-loop initializer");
			expr.map(|e| self.arena.insert(StatementKind::Expression(e), origin.clone(), Some(id)))
		};
		let check = if self.peek_symbol(";") {
			None
		} else {
			parse_expression(&mut self.cursor, self.diagnostics, 0).map(|e| self.arena.insert(StatementKind::Expression(e), origin.clone(), Some(id)))
		};
		self.expect_symbol(";", "after a for-loop condition");
		let update = if self.peek_symbol(")") {
			None
		} else {
			parse_expression(&mut self.cursor, self.diagnostics, 0).map(|e| self.arena.insert(StatementKind::Expression(e), origin.clone(), Some(id)))
		};
		self.expect_symbol(")", "to close a for-loop header");
		let body = self.parse_statement(id)?;
		self.scopes.exit();
		if let StatementKind::For { init: i, check: c, update: u, body: b } = &mut self.arena.get_mut(id).kind {
			*i = init;
			*c = check;
			*u = update;
			*b = body;
		}
		Some(id)
	}

	fn parse_while(&mut self, parent: StatementId, origin: FileOrigin, is_do_while: bool) -> Option<StatementId> {
		if is_do_while {
			self.cursor.advance();
			let id = self.arena.insert(StatementKind::While { check: dummy_expr(origin.clone()), body: StatementId(0), is_do_while: true }, origin.clone(), Some(parent));
			let body = self.parse_statement(id)?;
			if !self.eat_keyword("while") {
				self.diagnostics.error(DiagnosticKind::Parse, origin.clone(), "expected 'while' to close a do-while loop");
			}
			self.expect_symbol("(", "after 'while'");
			let check = parse_expression(&mut self.cursor, self.diagnostics, 0)?;
			self.expect_symbol(")", "to close a do-while condition");
			self.expect_symbol(";", "after a do-while loop");
			if let StatementKind::While { check: slot, body: body_slot, .. } = &mut self.arena.get_mut(id).kind {
				*slot = check;
				*body_slot = body;
			}
			Some(id)
		} else {
			self.cursor.advance();
			self.expect_symbol("(", "after 'while'");
			let check = parse_expression(&mut self.cursor, self.diagnostics, 0)?;
			self.expect_symbol(")", "to close a 'while' condition");
			let id = self.arena.insert(StatementKind::While { check, body: StatementId(0), is_do_while: false }, origin, Some(parent));
			let body = self.parse_statement(id)?;
			if let StatementKind::While { body: slot, .. } = &mut self.arena.get_mut(id).kind {
				*slot = body;
			}
			Some(id)
		}
	}

	/// Whether the upcoming tokens begin a declaration: a qualifier keyword, a primitive-type
	/// keyword, or an identifier already bound as `Keyword::Type` in the active scope (the
	/// standard "typedef-aware" lookahead a context-free C grammar needs, grounded on the
	/// `scope`/`Keyword::Type` split already in place for exactly this purpose).
	fn starts_declaration(&self) -> bool {
		match self.cursor.peek().map(|t| &t.kind) {
			Some(TokenKind::Identifier(name)) => is_qualifier_keyword(name) || PrimitiveKind::from_spelling(name).is_some() || matches!(self.scopes.lookup(name), Some(Keyword::Type)),
			_ => false,
		}
	}

	fn parse_qualifiers(&mut self) -> Qualifiers {
		let mut qualifiers = Qualifiers::default();
		loop {
			match self.cursor.peek().and_then(|t| t.kind.as_identifier()) {
				Some("const") => qualifiers.set(qualifier::CONST),
				Some("volatile") => qualifiers.set(qualifier::VOLATILE),
				Some("restrict") => qualifiers.set(qualifier::RESTRICT),
				Some("extern") => qualifiers.set(qualifier::EXTERN),
				_ => break,
			}
			self.cursor.advance();
		}
		qualifiers
	}

	fn parse_base_type(&mut self) -> Option<BaseType> {
		let name = self.cursor.peek()?.kind.as_identifier()?.to_owned();
		if let Some(primitive) = PrimitiveKind::from_spelling(&name) {
			self.cursor.advance();
			// `long long`, `unsigned int`, etc: greedily fold a second spelling word in.
			if let Some(next) = self.cursor.peek().and_then(|t| t.kind.as_identifier()) {
				if let Some(combined) = PrimitiveKind::from_spelling(&format!("{name} {next}")) {
					self.cursor.advance();
					return Some(BaseType::Primitive(combined));
				}
			}
			return Some(BaseType::Primitive(primitive));
		}
		self.cursor.advance();
		Some(BaseType::Typedef {
			name: name.clone(),
			aliased: Box::new(VarType::primitive(PrimitiveKind::Int)),
		})
	}

	fn parse_declarator_suffix(&mut self, mut vartype: VarType) -> VarType {
		while self.cursor.eat_operator("*") {
			vartype.pointer_levels += 1;
		}
		if self.cursor.eat_operator("&") {
			vartype.is_reference = true;
		}
		vartype
	}

	fn parse_array_dimensions(&mut self) -> Vec<ArrayDimension> {
		let mut dimensions = Vec::new();
		while self.cursor.eat_operator("[") {
			if self.cursor.eat_operator("]") {
				dimensions.push(ArrayDimension::Unsized);
			} else if let Some(expr) = parse_expression(&mut self.cursor, self.diagnostics, 0) {
				dimensions.push(ArrayDimension::Sized(Box::new(expr)));
				self.expect_symbol("]", "to close an array dimension");
			}
		}
		dimensions
	}

	/// Parses a declaration, which may turn out to be a function declaration/definition once the
	/// first declarator is seen followed by `(` (spec §4.F "function-declaration promotion").
	fn parse_declaration_or_function(&mut self, parent: StatementId, origin: FileOrigin, attributes: &[AttributeInstance]) -> Option<StatementId> {
		let qualifiers = self.parse_qualifiers();
		let base = self.parse_base_type()?;
		let base_vartype = VarType {
			base,
			qualifiers,
			pointer_levels: 0,
			is_reference: false,
			array_dimensions: Vec::new(),
		};

		let mut vartype = self.parse_declarator_suffix(base_vartype.clone());
		let name_origin = self.cursor.peek()?.origin.clone();
		let name = self.cursor.peek().and_then(|t| t.kind.as_identifier()).map(str::to_owned)?;
		self.cursor.advance();

		if self.peek_symbol("(") {
			return self.parse_function(parent, origin, name, vartype, attributes);
		}

		vartype.array_dimensions = self.parse_array_dimensions();
		let mut declarators = Vec::new();
		self.declare_one(&mut declarators, name, vartype.clone(), name_origin, attributes);

		while self.cursor.eat_operator(",") {
			let mut next_vartype = self.parse_declarator_suffix(base_vartype.clone());
			let Some(next_origin) = self.cursor.peek().map(|t| t.origin.clone()) else { break };
			let Some(next_name) = self.cursor.peek().and_then(|t| t.kind.as_identifier()).map(str::to_owned) else { break };
			self.cursor.advance();
			next_vartype.array_dimensions = self.parse_array_dimensions();
			self.declare_one(&mut declarators, next_name, next_vartype, next_origin, attributes);
		}
		self.expect_symbol(";", "to close a declaration");
		Some(self.arena.insert(StatementKind::Declaration(declarators), origin, Some(parent)))
	}

	/// Declares one variable of a (possibly multi-declarator) declaration. `attributes` is the
	/// declaration statement's own attribute prefix (e.g. `@dim(N, N)`) — it is copied onto the
	/// variable record itself too, since `@dim`/`@dimOrder` lookups in the transform passes go
	/// through the variable found at a call site's scope, not through the declaring statement.
	fn declare_one(&mut self, declarators: &mut Vec<VariableDeclarator>, name: String, vartype: VarType, name_origin: FileOrigin, attributes: &[AttributeInstance]) {
		let initializer = if self.cursor.eat_operator("=") { parse_expression(&mut self.cursor, self.diagnostics, 11) } else { None };
		for attribute in attributes {
			if let Some(kind) = self.attributes.find(&attribute.kind_name) {
				if kind.is_variable_attribute() {
					kind.on_variable_load(attribute, self.diagnostics);
				}
			}
		}
		let variable = Variable { name: name.clone(), vartype, attributes: attributes.to_vec() };
		match self.scopes.declare_variable(variable, name_origin.clone()) {
			Ok(variable_id) => declarators.push(VariableDeclarator {
				variable: variable_id,
				initializer,
				origin: name_origin,
			}),
			Err(first_origin) => self.diagnostics.error(DiagnosticKind::Type, name_origin, format!("redefinition of '{name}', first declared at {}:{}", first_origin.line, first_origin.column)),
		}
	}

	fn parse_function(&mut self, parent: StatementId, origin: FileOrigin, name: String, return_type: VarType, attributes: &[AttributeInstance]) -> Option<StatementId> {
		self.cursor.advance(); // '('
		let enclosing_scope = self.scopes.current_id();
		let scope_id = self.scopes.enter();
		let mut parameters = Vec::new();
		if !self.peek_symbol(")") {
			loop {
				// `@dim(N, N) double *A` attaches straight to the parameter, same prefix grammar
				// as a declaration statement's attributes (spec §4.G).
				let param_attributes = self.parse_attribute_prefixes();
				let param_qualifiers = self.parse_qualifiers();
				let Some(param_base) = self.parse_base_type() else { break };
				let mut param_type = self.parse_declarator_suffix(VarType {
					base: param_base,
					qualifiers: param_qualifiers,
					pointer_levels: 0,
					is_reference: false,
					array_dimensions: Vec::new(),
				});
				let param_name = self.cursor.peek().and_then(|t| t.kind.as_identifier()).map(str::to_owned).unwrap_or_default();
				if !param_name.is_empty() {
					self.cursor.advance();
				}
				param_type.array_dimensions = self.parse_array_dimensions();
				let param_origin = self.cursor.peek().map_or_else(|| origin.clone(), |t| t.origin.clone());
				for attribute in &param_attributes {
					if let Some(kind) = self.attributes.find(&attribute.kind_name) {
						if kind.is_variable_attribute() {
							kind.on_variable_load(attribute, self.diagnostics);
						}
					}
				}
				let parameter = Variable {
					name: param_name.clone(),
					vartype: param_type.clone(),
					attributes: param_attributes,
				};
				if !param_name.is_empty() {
					let _ = self.scopes.declare_variable(parameter.clone(), param_origin);
				}
				parameters.push(parameter);
				if !self.cursor.eat_operator(",") {
					break;
				}
			}
		}
		self.expect_symbol(")", "to close a parameter list");

		let function = crate::types::Function {
			name: name.clone(),
			return_type,
			parameters,
			attributes: attributes.to_vec(),
		};
		// The function name belongs to the scope that encloses it, not the parameter scope just
		// entered to hold its arguments.
		self.scopes.set_current(enclosing_scope);
		let function_id = match self.scopes.declare_function(function, origin.clone()) {
			Ok(id) => id,
			Err(first_origin) => {
				self.diagnostics.error(DiagnosticKind::Type, origin.clone(), format!("redefinition of function '{name}', first declared at {}:{}", first_origin.line, first_origin.column));
				self.scopes.set_current(scope_id);
				return None;
			},
		};
		self.scopes.set_current(scope_id);

		let id = self.arena.insert(StatementKind::FunctionDecl { function: function_id, body: None }, origin, Some(parent));
		let body = if self.peek_symbol("{") {
			self.parse_block(id)
		} else {
			self.expect_symbol(";", "after a function declaration");
			None
		};
		self.scopes.exit();
		if let StatementKind::FunctionDecl { body: slot, .. } = &mut self.arena.get_mut(id).kind {
			*slot = body;
		}
		Some(id)
	}
}

fn is_qualifier_keyword(name: &str) -> bool {
	matches!(name, "const" | "volatile" | "restrict" | "extern" | "static" | "inline")
}

fn dummy_expr(origin: FileOrigin) -> Expr {
	Expr::new(crate::expr::ExprNode::Empty, origin)
}

/// Convenience entry point: tokenizes, preprocesses, normalizes, and parses a full program in one
/// call, for callers (tests, the CLI) that don't need the intermediate stages individually.
pub fn parse_source(source: &str, file: impl AsRef<std::path::Path>, scopes: &mut ScopeData, attributes: &AttributeRegistry, diagnostics: &mut Diagnostics) -> anyhow::Result<(StatementArena, StatementId)> {
	let origin = FileOrigin::synthetic(file.as_ref());
	let tokens = crate::lexer::tokenize(source, origin)?;
	let mut preprocessor = crate::preprocessor::Preprocessor::new(diagnostics);
	let preprocessed = preprocessor.run(tokens, file.as_ref(), &mut crate::preprocessor::NoIncludes);
	let normalized = crate::token_stream::normalize(preprocessed);
	let mut arena = StatementArena::new();
	let root = {
		let mut parser = Parser::new(&normalized, &mut arena, scopes, attributes, diagnostics);
		parser.parse_program()
	};
	Ok((arena, root))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::scope::ScopeData;

	fn parse(source: &str) -> (StatementArena, StatementId, Diagnostics) {
		let mut scopes = ScopeData::global();
		let attributes = AttributeRegistry::with_builtins();
		let mut diagnostics = Diagnostics::new();
		let (arena, root) = parse_source(source, "test.okl", &mut scopes, &attributes, &mut diagnostics).unwrap();
		(arena, root, diagnostics)
	}

	#[test]
	fn parses_a_kernel_function_with_a_for_loop() {
		let (arena, root, diagnostics) = parse(
			r"
			@kernel void addVectors(int N, float *a, float *b, float *ans) {
				@outer for (int i = 0; i < N; ++i) {
					ans[i] = a[i] + b[i];
				}
			}
			",
		);
		assert!(!diagnostics.has_errors());
		let StatementKind::Block { children, .. } = &arena.get(root).kind else {
			panic!("expected a root block");
		};
		assert_eq!(children.len(), 1);
		let StatementKind::FunctionDecl { body: Some(body), .. } = &arena.get(children[0]).kind else {
			panic!("expected a function declaration");
		};
		let StatementKind::Block { children: body_children, .. } = &arena.get(*body).kind else {
			panic!("expected a function body block");
		};
		assert_eq!(body_children.len(), 1);
		assert!(arena.get(body_children[0]).has_attribute("outer"));
	}

	#[test]
	fn declaration_supports_multiple_comma_separated_declarators() {
		let (arena, root, diagnostics) = parse("int a = 1, b = 2;");
		assert!(!diagnostics.has_errors());
		let StatementKind::Block { children, .. } = &arena.get(root).kind else { panic!() };
		let StatementKind::Declaration(declarators) = &arena.get(children[0]).kind else {
			panic!("expected a declaration statement");
		};
		assert_eq!(declarators.len(), 2);
	}
}
