//! The Metal backend (spec §4.J "Metal"). Real Metal Shading Language reads grid/threadgroup
//! position off an attribute-qualified parameter (`uint3 gid [[thread_position_in_grid]]`) rather
//! than a builtin global the way CUDA/OpenCL do. Neither that `[[attribute]]` parameter syntax
//! nor a dotted `.x`/`.y`/`.z` component access exists in this crate's grammar (no member-access
//! expression node at all — see [`super::cuda_hip`]'s module doc and `DESIGN.md`), so this
//! backend applies the same flat-identifier simplification: each `@outer`/`@inner` loop's
//! iterator is declared from a synthesized `threadPositionInGrid_x`/`threadPositionInThreadgroup_y`
//! identifier instead. The kernel function itself is qualified `kernel` (Metal's function-type
//! keyword, analogous to OpenCL's `__kernel`/CUDA's `__global__`).

use crate::ast::{StatementArena, StatementId, StatementKind};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::scope::ScopeData;
use crate::types::CustomQualifier;

use super::{find_kernels, identifier, loop_depth, walk_pre_order, KernelMetadata};

#[must_use]
pub fn lower(arena: &mut StatementArena, scopes: &mut ScopeData, root: StatementId, diagnostics: &mut Diagnostics) -> Vec<KernelMetadata> {
	let kernels = find_kernels(arena, root);
	let mut metadata = Vec::with_capacity(kernels.len());
	for kernel in kernels {
		qualify_kernel(scopes, arena, kernel);
		flatten_parallel_loops(arena, kernel, diagnostics);
		let StatementKind::FunctionDecl { function, .. } = &arena.get(kernel).kind else { unreachable!() };
		metadata.push(KernelMetadata::from_function(scopes.function(*function)));
	}
	metadata
}

fn qualify_kernel(scopes: &mut ScopeData, arena: &StatementArena, kernel: StatementId) {
	let StatementKind::FunctionDecl { function, .. } = &arena.get(kernel).kind else { return };
	let function = scopes.function_mut(*function);
	if !function.return_type.qualifiers.custom.iter().any(|qualifier| qualifier.0 == "kernel") {
		function.return_type.qualifiers.custom.push(CustomQualifier("kernel".to_owned()));
	}
}

fn flatten_parallel_loops(arena: &mut StatementArena, kernel: StatementId, diagnostics: &mut Diagnostics) {
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
				format!("Metal supports at most {} nested `@{}` loops", super::GRID_AXES.len(), if is_outer { "outer" } else { "inner" }),
			);
			continue;
		};
		let builtin = if is_outer { "threadPositionInGrid" } else { "threadPositionInThreadgroup" };
		let origin = arena.get(loop_id).origin.clone();
		let initializer = identifier(&format!("{builtin}_{axis}"), origin);
		super::flatten_parallel_loop(arena, loop_id, initializer);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attribute::AttributeRegistry;

	fn lower_source(source: &str) -> (String, Vec<KernelMetadata>, Diagnostics) {
		let mut scopes = ScopeData::global();
		let attributes = AttributeRegistry::with_builtins();
		let mut diagnostics = Diagnostics::new();
		let (mut arena, root) = crate::parser_okl::parse_source(source, "metal.okl", &mut scopes, &attributes, &mut diagnostics).expect("parse");
		let metadata = lower(&mut arena, &mut scopes, root, &mut diagnostics);
		(crate::formatter::print_program(&arena, &scopes, root), metadata, diagnostics)
	}

	#[test]
	fn kernel_gets_the_kernel_qualifier() {
		let (printed, metadata, diagnostics) = lower_source(
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
		assert!(printed.contains("kernel void"), "expected the kernel qualifier in:\n{printed}");
	}

	#[test]
	fn outer_and_inner_loops_become_flat_builtin_identifiers() {
		let (printed, _, diagnostics) = lower_source(
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
		assert!(printed.contains("threadPositionInGrid_x"), "expected a flattened outer index in:\n{printed}");
		assert!(printed.contains("threadPositionInThreadgroup_x"), "expected a flattened inner index in:\n{printed}");
		assert!(!printed.contains("for ("), "no for-loop should survive flattening:\n{printed}");
	}
}
