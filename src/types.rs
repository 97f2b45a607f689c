//! The C-like type system (spec §3 "Types", §4.E "Type & variable model"): qualifiers, base
//! types, pointer/reference/array chains, and the variable/function records built on top of
//! them.

use std::fmt;

use crate::expr::Expr;

/// A bitset of type qualifiers. Kept as a plain `u32` bitset (mirroring the operator table's
/// category bitmask in `expr::operator`) rather than the `bitflags` crate, since the teacher's
/// own stack has no bitflags dependency and a hand-rolled bitset is exactly as much code either
/// way for a set this small.
pub mod qualifier {
	pub const CONST: u32 = 1 << 0;
	pub const VOLATILE: u32 = 1 << 1;
	pub const RESTRICT: u32 = 1 << 2;
	pub const EXTERN: u32 = 1 << 3;
	pub const EXTERN_C: u32 = 1 << 4;
	pub const EXTERN_CPP: u32 = 1 << 5;
}

/// A qualifier registered beyond the built-in set (e.g. a backend-specific address-space
/// qualifier like OpenCL's `__global`). Custom qualifiers are looked up by name rather than
/// occupying a bit in the built-in bitset, since the set of backends is open-ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomQualifier(pub String);

/// The qualifier set on a `VarType`: the built-in bitset plus any backend-registered custom
/// qualifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Qualifiers {
	pub bits: u32,
	pub custom: Vec<CustomQualifier>,
}

impl Qualifiers {
	#[must_use]
	pub const fn has(&self, bit: u32) -> bool {
		self.bits & bit != 0
	}

	pub fn set(&mut self, bit: u32) {
		self.bits |= bit;
	}
}

/// A named base type: a primitive, a previously declared aggregate, or a typedef alias.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseType {
	Primitive(PrimitiveKind),
	Struct { name: String, members: Vec<Variable> },
	Union { name: String, members: Vec<Variable> },
	Class { name: String, members: Vec<Variable> },
	Enum { name: String, underlying: PrimitiveKind },
	Typedef { name: String, aliased: Box<VarType> },
	Function { return_type: Box<VarType>, parameters: Vec<VarType> },
}

impl BaseType {
	/// Structural-identity name used for type-registry comparisons; two `BaseType`s compare
	/// equal when this matches and their shapes match (spec §4.E "Equality").
	#[must_use]
	pub fn registry_name(&self) -> &str {
		match self {
			Self::Primitive(kind) => kind.spelling(),
			Self::Struct { name, .. } | Self::Union { name, .. } | Self::Class { name, .. } | Self::Enum { name, .. } | Self::Typedef { name, .. } => name,
			Self::Function { .. } => "<function>",
		}
	}
}

/// The built-in primitive kinds, matching the subset of C primitive types OKL kernels actually
/// use (spec §4.H rule 3 restricts loop iterators to `char`/`short`/`int`/`long`; the type
/// system itself recognises the full arithmetic set so ordinary kernel code type-checks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
	Void,
	Bool,
	Char,
	Short,
	Int,
	Long,
	LongLong,
	Float,
	Double,
	UnsignedChar,
	UnsignedShort,
	UnsignedInt,
	UnsignedLong,
}

impl PrimitiveKind {
	#[must_use]
	pub const fn spelling(self) -> &'static str {
		match self {
			Self::Void => "void",
			Self::Bool => "bool",
			Self::Char => "char",
			Self::Short => "short",
			Self::Int => "int",
			Self::Long => "long",
			Self::LongLong => "long long",
			Self::Float => "float",
			Self::Double => "double",
			Self::UnsignedChar => "unsigned char",
			Self::UnsignedShort => "unsigned short",
			Self::UnsignedInt => "unsigned int",
			Self::UnsignedLong => "unsigned long",
		}
	}

	#[must_use]
	pub fn from_spelling(spelling: &str) -> Option<Self> {
		Some(match spelling {
			"void" => Self::Void,
			"bool" => Self::Bool,
			"char" => Self::Char,
			"short" => Self::Short,
			"int" => Self::Int,
			"long" => Self::Long,
			"long long" => Self::LongLong,
			"float" => Self::Float,
			"double" => Self::Double,
			"unsigned char" => Self::UnsignedChar,
			"unsigned short" => Self::UnsignedShort,
			"unsigned int" => Self::UnsignedInt,
			"unsigned long" => Self::UnsignedLong,
			_ => return None,
		})
	}

	/// Whether this is one of the integer kinds the OKL validator accepts for a simple-loop
	/// iterator (spec §4.H rule 3 / §4.I `@tile`'s `isValidInit`).
	#[must_use]
	pub const fn is_valid_loop_iterator(self) -> bool {
		matches!(self, Self::Char | Self::Short | Self::Int | Self::Long | Self::UnsignedChar | Self::UnsignedShort | Self::UnsignedInt | Self::UnsignedLong)
	}
}

/// One dimension of an array declarator: either a known compile-time size expression or an
/// unsized `[]` (valid only as the outermost dimension of a function parameter).
#[derive(Debug, Clone)]
pub enum ArrayDimension {
	Sized(Box<Expr>),
	Unsized,
}

impl PartialEq for ArrayDimension {
	fn eq(&self, other: &Self) -> bool {
		// Structural array-size equality compares evaluated values when both are evaluable
		// (spec §4.E "Equality"); falls back to node-shape equality otherwise, since we cannot
		// always constant-fold (e.g. a parameter-dependent size).
		match (self, other) {
			(Self::Unsized, Self::Unsized) => true,
			(Self::Sized(a), Self::Sized(b)) => match (a.evaluate(), b.evaluate()) {
				(Some(a), Some(b)) => a == b,
				_ => format!("{a:?}") == format!("{b:?}"),
			},
			_ => false,
		}
	}
}

/// `vartype = (baseType, qualifiers, pointer-levels, optional-reference, array-dimensions)`
/// (spec §3 "Types").
#[derive(Debug, Clone, PartialEq)]
pub struct VarType {
	pub base: BaseType,
	pub qualifiers: Qualifiers,
	pub pointer_levels: u32,
	pub is_reference: bool,
	pub array_dimensions: Vec<ArrayDimension>,
}

impl VarType {
	#[must_use]
	pub fn primitive(kind: PrimitiveKind) -> Self {
		Self {
			base: BaseType::Primitive(kind),
			qualifiers: Qualifiers::default(),
			pointer_levels: 0,
			is_reference: false,
			array_dimensions: Vec::new(),
		}
	}

	#[must_use]
	pub const fn is_pointer(&self) -> bool {
		self.pointer_levels > 0
	}

	#[must_use]
	pub fn is_array(&self) -> bool {
		!self.array_dimensions.is_empty()
	}

	/// Whether every array dimension's size is a compile-time-evaluable constant, required for
	/// `@shared` declarations (spec §4.H rule 5).
	#[must_use]
	pub fn has_evaluable_array_dimensions(&self) -> bool {
		self.array_dimensions.iter().all(|dimension| matches!(dimension, ArrayDimension::Sized(expr) if expr.can_evaluate()))
	}

	/// Structural equality up to qualifiers (spec §4.E): base types identical by registry name
	/// and shape, pointer/array chains equal, reference-ness equal. Qualifiers are deliberately
	/// excluded, matching the spec's explicit "two types compare equal by structural identity up
	/// to qualifiers".
	#[must_use]
	pub fn structurally_equal(&self, other: &Self) -> bool {
		self.base.registry_name() == other.base.registry_name() && self.pointer_levels == other.pointer_levels && self.is_reference == other.is_reference && self.array_dimensions == other.array_dimensions
	}
}

impl fmt::Display for VarType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.qualifiers.has(qualifier::CONST) {
			write!(f, "const ")?;
		}
		if self.qualifiers.has(qualifier::VOLATILE) {
			write!(f, "volatile ")?;
		}
		if self.qualifiers.has(qualifier::RESTRICT) {
			write!(f, "restrict ")?;
		}
		for custom in &self.qualifiers.custom {
			write!(f, "{} ", custom.0)?;
		}
		write!(f, "{}", self.base.registry_name())?;
		for _ in 0..self.pointer_levels {
			write!(f, "*")?;
		}
		if self.is_reference {
			write!(f, "&")?;
		}
		Ok(())
	}
}

/// `Variable = (vartype, sourceIdent, attributes[])` (spec §3). Attributes are keyed by name,
/// since a variable may only ever carry the latest instance of a given attribute name (spec
/// §4.G).
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
	pub name: String,
	pub vartype: VarType,
	pub attributes: Vec<crate::attribute::AttributeInstance>,
}

impl Variable {
	#[must_use]
	pub fn has_attribute(&self, name: &str) -> bool {
		self.attributes.iter().any(|attribute| attribute.kind_name == name)
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<&crate::attribute::AttributeInstance> {
		self.attributes.iter().rev().find(|attribute| attribute.kind_name == name)
	}
}

/// `Function = (name, returnVartype, args[variable], body?, attributes[])` (spec §3). The body
/// is stored on the owning `Statement::FunctionDecl` rather than here, matching the spec's
/// "args[variable], body?" phrasing where `body?` is optional on a bare declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
	pub name: String,
	pub return_type: VarType,
	pub parameters: Vec<Variable>,
	pub attributes: Vec<crate::attribute::AttributeInstance>,
}

impl Function {
	#[must_use]
	pub fn has_attribute(&self, name: &str) -> bool {
		self.attributes.iter().any(|attribute| attribute.kind_name == name)
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<&crate::attribute::AttributeInstance> {
		self.attributes.iter().rev().find(|attribute| attribute.kind_name == name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn structural_equality_ignores_qualifiers() {
		let mut a = VarType::primitive(PrimitiveKind::Int);
		let mut b = VarType::primitive(PrimitiveKind::Int);
		a.qualifiers.set(qualifier::CONST);
		b.qualifiers.set(qualifier::VOLATILE);
		assert!(a.structurally_equal(&b));
	}

	#[test]
	fn pointer_levels_break_equality() {
		let a = VarType::primitive(PrimitiveKind::Int);
		let mut b = VarType::primitive(PrimitiveKind::Int);
		b.pointer_levels = 1;
		assert!(!a.structurally_equal(&b));
	}

	#[test]
	fn loop_iterator_kinds_match_spec_h3() {
		assert!(PrimitiveKind::Int.is_valid_loop_iterator());
		assert!(PrimitiveKind::Long.is_valid_loop_iterator());
		assert!(!PrimitiveKind::Float.is_valid_loop_iterator());
	}
}
