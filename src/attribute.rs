//! The attribute engine (spec §4.G, §6 "Attribute-instance protocol"): registered attribute
//! kinds, argument capture, and the three load hooks.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::expr::Expr;
use crate::token::FileOrigin;

/// An attached `@name(args…)` instance (spec §3 "Attributes"). Variables/statements/functions
/// each keep a `Vec<AttributeInstance>`; only the most recent instance of a given name is
/// authoritative (spec §4.G "a single attribute is always the latest of its name").
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInstance {
	pub kind_name: String,
	pub origin: FileOrigin,
	pub arguments: Vec<Expr>,
}

/// The registered-extension surface (spec §6 "Attribute-instance protocol"): a kind must supply
/// applicability predicates, `create`, and the three load hooks. Implemented as a trait object
/// registry (rather than a closed sum type) because this actually is the one open extension
/// point the spec calls out explicitly, for registering backend- or user-defined attributes
/// beyond the OKL built-ins.
pub trait AttributeKind {
	fn name(&self) -> &'static str;

	fn is_variable_attribute(&self) -> bool {
		false
	}

	fn is_function_attribute(&self) -> bool {
		false
	}

	/// `statement_kind` is the statement's discriminant label (see
	/// `Statement::kind_label`), avoiding a dependency cycle between this module and `ast`.
	fn is_statement_attribute(&self, _statement_kind: &str) -> bool {
		false
	}

	fn create(&self, origin: FileOrigin, arguments: Vec<Expr>) -> AttributeInstance {
		AttributeInstance {
			kind_name: self.name().to_owned(),
			origin,
			arguments,
		}
	}

	fn on_variable_load(&self, _instance: &AttributeInstance, _diagnostics: &mut Diagnostics) -> bool {
		true
	}

	fn on_function_load(&self, _instance: &AttributeInstance, _diagnostics: &mut Diagnostics) -> bool {
		true
	}

	fn on_statement_load(&self, _instance: &AttributeInstance, _diagnostics: &mut Diagnostics) -> bool {
		true
	}
}

macro_rules! simple_attribute_kind {
	($type_name:ident, $name:literal, statement) => {
		pub struct $type_name;
		impl AttributeKind for $type_name {
			fn name(&self) -> &'static str {
				$name
			}
			fn is_statement_attribute(&self, statement_kind: &str) -> bool {
				statement_kind == "for" || statement_kind == "declaration" || statement_kind == "function_decl"
			}
		}
	};
}

simple_attribute_kind!(KernelAttributeKind, "kernel", statement);
simple_attribute_kind!(OuterAttributeKind, "outer", statement);
simple_attribute_kind!(InnerAttributeKind, "inner", statement);

/// `@shared` applies to a declaration; its array dimensions must be compile-time evaluable
/// (enforced by the validator, §4.H rule 5, not here — this hook only checks arity).
pub struct SharedAttributeKind;
impl AttributeKind for SharedAttributeKind {
	fn name(&self) -> &'static str {
		"shared"
	}
	fn is_statement_attribute(&self, statement_kind: &str) -> bool {
		statement_kind == "declaration"
	}
}

pub struct ExclusiveAttributeKind;
impl AttributeKind for ExclusiveAttributeKind {
	fn name(&self) -> &'static str {
		"exclusive"
	}
	fn is_statement_attribute(&self, statement_kind: &str) -> bool {
		statement_kind == "declaration"
	}
}

/// `@dim(size_expr, …)` records one expression per declared rank (spec §4.G). An empty argument
/// list is a transform-error (spec §7 kind 6), reported here rather than deferred to the `@dim`
/// transform so the mistake surfaces as close to the declaration as possible.
pub struct DimAttributeKind;
impl AttributeKind for DimAttributeKind {
	fn name(&self) -> &'static str {
		"dim"
	}
	fn is_variable_attribute(&self) -> bool {
		true
	}
	fn on_variable_load(&self, instance: &AttributeInstance, diagnostics: &mut Diagnostics) -> bool {
		if instance.arguments.is_empty() {
			diagnostics.error(DiagnosticKind::Transform, instance.origin.clone(), "[@dim] expects at least one dimension-size expression");
			return false;
		}
		true
	}
}

/// `@dimOrder(index, …)` records a permutation of dimension indices (spec §4.G).
pub struct DimOrderAttributeKind;
impl AttributeKind for DimOrderAttributeKind {
	fn name(&self) -> &'static str {
		"dimOrder"
	}
	fn is_variable_attribute(&self) -> bool {
		true
	}
	fn on_variable_load(&self, instance: &AttributeInstance, diagnostics: &mut Diagnostics) -> bool {
		if instance.arguments.is_empty() {
			diagnostics.error(DiagnosticKind::Transform, instance.origin.clone(), "[@dimOrder] expects at least one permutation index");
			return false;
		}
		true
	}
}

pub struct TileAttributeKind;
impl AttributeKind for TileAttributeKind {
	fn name(&self) -> &'static str {
		"tile"
	}
	fn is_statement_attribute(&self, statement_kind: &str) -> bool {
		statement_kind == "for"
	}
	fn on_statement_load(&self, instance: &AttributeInstance, diagnostics: &mut Diagnostics) -> bool {
		if instance.arguments.is_empty() {
			diagnostics.error(DiagnosticKind::Transform, instance.origin.clone(), "[@tile] expects a block-size expression");
			return false;
		}
		true
	}
}

/// `@safeTile` behaves like `@tile` but always clamps the inner loop's bound with `min(...)`
/// even when the tile size evenly divides the loop bound (see `SPEC_FULL.md` §4.M).
pub struct SafeTileAttributeKind;
impl AttributeKind for SafeTileAttributeKind {
	fn name(&self) -> &'static str {
		"safeTile"
	}
	fn is_statement_attribute(&self, statement_kind: &str) -> bool {
		statement_kind == "for"
	}
	fn on_statement_load(&self, instance: &AttributeInstance, diagnostics: &mut Diagnostics) -> bool {
		if instance.arguments.is_empty() {
			diagnostics.error(DiagnosticKind::Transform, instance.origin.clone(), "[@safeTile] expects a block-size expression");
			return false;
		}
		true
	}
}

/// The process-wide registry of attribute kinds: append-only before parsing begins, immutable
/// afterwards (spec §5 "the registered-attribute registry (append-only during startup; not
/// mutated after parsing begins)").
pub struct AttributeRegistry {
	kinds: Vec<Box<dyn AttributeKind>>,
}

impl AttributeRegistry {
	/// Registers the built-ins required by the OKL semantics (spec §4.G).
	#[must_use]
	pub fn with_builtins() -> Self {
		let mut registry = Self { kinds: Vec::new() };
		registry.register(Box::new(KernelAttributeKind));
		registry.register(Box::new(OuterAttributeKind));
		registry.register(Box::new(InnerAttributeKind));
		registry.register(Box::new(SharedAttributeKind));
		registry.register(Box::new(ExclusiveAttributeKind));
		registry.register(Box::new(DimAttributeKind));
		registry.register(Box::new(DimOrderAttributeKind));
		registry.register(Box::new(TileAttributeKind));
		registry.register(Box::new(SafeTileAttributeKind));
		registry
	}

	pub fn register(&mut self, kind: Box<dyn AttributeKind>) {
		self.kinds.push(kind);
	}

	#[must_use]
	pub fn find(&self, name: &str) -> Option<&dyn AttributeKind> {
		self.kinds.iter().find(|kind| kind.name() == name).map(std::convert::AsRef::as_ref)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builtins_cover_the_okl_attribute_set() {
		let registry = AttributeRegistry::with_builtins();
		for name in ["kernel", "outer", "inner", "shared", "exclusive", "dim", "dimOrder", "tile", "safeTile"] {
			assert!(registry.find(name).is_some(), "missing built-in attribute kind {name}");
		}
	}

	#[test]
	fn dim_requires_at_least_one_argument() {
		let kind = DimAttributeKind;
		let mut diagnostics = Diagnostics::new();
		let instance = AttributeInstance {
			kind_name: "dim".to_owned(),
			origin: FileOrigin::synthetic("a.okl"),
			arguments: Vec::new(),
		};
		assert!(!kind.on_variable_load(&instance, &mut diagnostics));
		assert!(diagnostics.has_errors());
	}
}
