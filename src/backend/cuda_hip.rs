//! The CUDA and HIP backends (spec §4.J "CUDA", "HIP"). HIP mirrors CUDA's source-level
//! conventions closely enough (same `__global__` kernel qualifier, same grid/block builtin
//! indices) that both dialects share this one lowering; [`Dialect`] only changes the text that
//! ends up in diagnostics, the natural seam for the two dialects' eventual diverging compiler
//! defines (`__HIPCC__` vs `__CUDACC__`) to grow from.
//!
//! Real CUDA/HIP reads `blockIdx.x`/`threadIdx.x` as a dotted member access on a builtin struct.
//! This crate's expression grammar has no member-access node at all (`.`/`->` are registered as
//! punctuation, never as an infix operator — see `DESIGN.md`), so that syntax cannot be
//! reproduced literally. Instead each `@outer`/`@inner` loop's iterator is declared from a
//! synthesized flat identifier (`blockIdx_x`, `threadIdx_y`, …) — a deliberate, documented
//! simplification rather than an attempt to fake member-access syntax the printer can't emit.

use crate::ast::{StatementArena, StatementId, StatementKind};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::scope::ScopeData;
use crate::types::CustomQualifier;

use super::{find_kernels, identifier, loop_depth, walk_pre_order, KernelMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
	Cuda,
	Hip,
}

impl Dialect {
	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::Cuda => "CUDA",
			Self::Hip => "HIP",
		}
	}
}

#[must_use]
pub fn lower(dialect: Dialect, arena: &mut StatementArena, scopes: &mut ScopeData, root: StatementId, diagnostics: &mut Diagnostics) -> Vec<KernelMetadata> {
	let kernels = find_kernels(arena, root);
	let mut metadata = Vec::with_capacity(kernels.len());
	for kernel in kernels {
		qualify_kernel(scopes, arena, kernel);
		flatten_parallel_loops(dialect, arena, kernel, diagnostics);
		let StatementKind::FunctionDecl { function, .. } = &arena.get(kernel).kind else { unreachable!() };
		metadata.push(KernelMetadata::from_function(scopes.function(*function)));
	}
	metadata
}

fn qualify_kernel(scopes: &mut ScopeData, arena: &StatementArena, kernel: StatementId) {
	let StatementKind::FunctionDecl { function, .. } = &arena.get(kernel).kind else { return };
	let function = scopes.function_mut(*function);
	if !function.return_type.qualifiers.custom.iter().any(|qualifier| qualifier.0 == "__global__") {
		function.return_type.qualifiers.custom.push(CustomQualifier("__global__".to_owned()));
	}
}

fn flatten_parallel_loops(dialect: Dialect, arena: &mut StatementArena, kernel: StatementId, diagnostics: &mut Diagnostics) {
	let StatementKind::FunctionDecl { body: Some(body), .. } = &arena.get(kernel).kind else { return };
	let body = *body;

	let mut sites = Vec::new();
	walk_pre_order(arena, body, &mut |id| {
		let node = arena.get(id);
		if !matches!(node.kind, StatementKind::For { .. }) {
			return;
		}
		if node.has_attribute("outer") {
			sites.push((id, true, loop_depth(arena, id, "outer")));
		} else if node.has_attribute("inner") {
			sites.push((id, false, loop_depth(arena, id, "inner")));
		}
	});

	for (loop_id, is_outer, depth) in sites {
		let Some(axis) = super::GRID_AXES.get(depth) else {
			diagnostics.error(
				DiagnosticKind::Transform,
				arena.get(loop_id).origin.clone(),
				format!("{} supports at most {} nested `@{}` loops", dialect.name(), super::GRID_AXES.len(), if is_outer { "outer" } else { "inner" }),
			);
			continue;
		};
		let builtin = if is_outer { "blockIdx" } else { "threadIdx" };
		let origin = arena.get(loop_id).origin.clone();
		let initializer = identifier(&format!("{builtin}_{axis}"), origin);
		super::flatten_parallel_loop(arena, loop_id, initializer);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attribute::AttributeRegistry;

	fn lower_source(dialect: Dialect, source: &str) -> (String, Vec<KernelMetadata>, Diagnostics) {
		let mut scopes = ScopeData::global();
		let attributes = AttributeRegistry::with_builtins();
		let mut diagnostics = Diagnostics::new();
		let (mut arena, root) = crate::parser_okl::parse_source(source, "cuda.okl", &mut scopes, &attributes, &mut diagnostics).expect("parse");
		let metadata = lower(dialect, &mut arena, &mut scopes, root, &mut diagnostics);
		(crate::formatter::print_program(&arena, &scopes, root), metadata, diagnostics)
	}

	#[test]
	fn kernel_gets_the_global_qualifier() {
		let (printed, metadata, diagnostics) = lower_source(
			Dialect::Cuda,
			r"
			@kernel void addVectors(int N, double *a, double *b, double *c) {
				@outer for (int i = 0; i < N; ++i) {
					@inner for (int j = 0; j < N; ++j) {
						c[i] = a[i] + b[j];
					}
				}
			}
			",
		);
		assert!(!diagnostics.has_errors(), "{:?}", diagnostics.entries());
		assert_eq!(metadata.len(), 1);
		assert!(printed.contains("__global__"), "expected __global__ in:\n{printed}");
	}

	#[test]
	fn outer_and_inner_loops_become_flat_builtin_identifiers() {
		let (printed, _, diagnostics) = lower_source(
			Dialect::Hip,
			r"
			@kernel void k(int N) {
				@outer for (int i = 0; i < N; ++i) {
					@inner for (int j = 0; j < N; ++j) {
						int x = i + j;
					}
				}
			}
			",
		);
		assert!(!diagnostics.has_errors());
		assert!(printed.contains("blockIdx_x"), "expected a flattened outer index in:\n{printed}");
		assert!(printed.contains("threadIdx_x"), "expected a flattened inner index in:\n{printed}");
		assert!(!printed.contains("for ("), "no for-loop should survive flattening:\n{printed}");
	}

	#[test]
	fn a_fourth_nested_outer_loop_is_rejected() {
		let (_, _, diagnostics) = lower_source(
			Dialect::Cuda,
			r"
			@kernel void k() {
				@outer for (int a = 0; a < 1; ++a) {
				@outer for (int b = 0; b < 1; ++b) {
				@outer for (int c = 0; c < 1; ++c) {
				@outer for (int d = 0; d < 1; ++d) {
					@inner for (int i = 0; i < 1; ++i) {}
				}}}}}
			",
		);
		assert!(diagnostics.has_errors(), "a fourth nested @outer loop should be rejected");
	}
}
