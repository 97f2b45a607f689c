//! The OpenCL backend (spec §4.J "OpenCL"). Grounded on
//! `examples/original_source/parser_sandbox/src/modes/opencl.cpp`: every `@kernel` function is
//! qualified `__kernel`, every pointer parameter is qualified `__global`, and each `@outer`/
//! `@inner` for-loop collapses into a single iterator declaration sourced from
//! `get_group_id`/`get_local_id` — the work-group grid iterates them, so no loop survives into
//! the emitted source (see [`super::flatten_parallel_loop`]). Any `opencl/extensions` property
//! entries become leading `#pragma OPENCL EXTENSION … : enable` statements; an entirely absent
//! `opencl/extensions` subtree defaults to `cl_khr_fp64` enabled, matching
//! `openclParser::openclParser()`'s constructor default.

use crate::ast::{StatementArena, StatementId, StatementKind};
use crate::diagnostics::Diagnostics;
use crate::properties::Properties;
use crate::scope::ScopeData;
use crate::types::CustomQualifier;

use super::{call_expr, find_kernels, int_literal, loop_depth, push_front, walk_pre_order, KernelMetadata};

#[must_use]
pub fn lower(arena: &mut StatementArena, scopes: &mut ScopeData, root: StatementId, properties: &Properties, diagnostics: &mut Diagnostics) -> Vec<KernelMetadata> {
	let kernels = find_kernels(arena, root);
	let mut metadata = Vec::with_capacity(kernels.len());
	for kernel in kernels {
		qualify_kernel_and_pointers(scopes, arena, kernel);
		flatten_parallel_loops(arena, kernel, diagnostics);
		let StatementKind::FunctionDecl { function, .. } = &arena.get(kernel).kind else { unreachable!() };
		metadata.push(KernelMetadata::from_function(scopes.function(*function)));
	}
	add_extension_pragmas(arena, root, properties);
	metadata
}

/// `__kernel` on the return type, `__global` on every pointer parameter (`opencl.cpp`'s
/// `setupKernelArgs`, which in the original sits in the shared `oklParser` base rather than this
/// subclass — OpenCL is the only backend here that needs an explicit address-space qualifier).
fn qualify_kernel_and_pointers(scopes: &mut ScopeData, arena: &StatementArena, kernel: StatementId) {
	let StatementKind::FunctionDecl { function, .. } = &arena.get(kernel).kind else { return };
	let function = scopes.function_mut(*function);
	if !has_custom(&function.return_type.qualifiers.custom, "__kernel") {
		function.return_type.qualifiers.custom.push(CustomQualifier("__kernel".to_owned()));
	}
	for parameter in &mut function.parameters {
		if parameter.vartype.is_pointer() && !has_custom(&parameter.vartype.qualifiers.custom, "__global") {
			parameter.vartype.qualifiers.custom.insert(0, CustomQualifier("__global".to_owned()));
		}
	}
}

fn has_custom(custom: &[CustomQualifier], name: &str) -> bool {
	custom.iter().any(|qualifier| qualifier.0 == name)
}

/// Collects every `@outer`/`@inner` for-loop's dimension depth from the untouched tree, then
/// flattens each one in the same pre-order (parent loops before the children their own flatten
/// reparents), so a loop's depth is always read before anything has been rewritten.
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
		if depth >= super::GRID_AXES.len() {
			diagnostics.error(crate::diagnostics::DiagnosticKind::Transform, arena.get(loop_id).origin.clone(), format!("OpenCL supports at most {} nested `@{}` loops", super::GRID_AXES.len(), if is_outer { "outer" } else { "inner" }));
			continue;
		}
		let origin = arena.get(loop_id).origin.clone();
		let builtin = if is_outer { "get_group_id" } else { "get_local_id" };
		let initializer = call_expr(builtin, vec![int_literal(depth as i128, origin.clone())], origin);
		super::flatten_parallel_loop(arena, loop_id, initializer);
	}
}

/// `opencl.cpp`'s `addExtensions`: one leading `#pragma OPENCL EXTENSION <name> : enable` per
/// enabled entry under `opencl/extensions`, defaulting to `cl_khr_fp64` when that subtree is
/// absent entirely (an explicit `opencl/extensions` with every entry disabled enables nothing).
fn add_extension_pragmas(arena: &mut StatementArena, root: StatementId, properties: &Properties) {
	let origin = arena.get(root).origin.clone();
	let enabled: Vec<String> = if properties.has("opencl/extensions") {
		let mut names: Vec<String> = properties.get_object("opencl/extensions").into_iter().filter(|(_, value)| value.as_bool().unwrap_or(false)).map(|(name, _)| name.to_owned()).collect();
		names.sort();
		names
	} else {
		vec!["cl_khr_fp64".to_owned()]
	};
	for extension in enabled {
		let pragma = arena.insert(StatementKind::Pragma(format!("OPENCL EXTENSION {extension} : enable")), origin.clone(), Some(root));
		push_front(arena, root, pragma);
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
		let (mut arena, root) = crate::parser_okl::parse_source(source, "opencl.okl", &mut scopes, &attributes, &mut diagnostics).expect("parse");
		let metadata = lower(&mut arena, &mut scopes, root, properties, &mut diagnostics);
		(crate::formatter::print_program(&arena, &scopes, root), metadata, diagnostics)
	}

	#[test]
	fn kernel_and_pointer_parameters_are_qualified() {
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
			&Properties::new(),
		);
		assert!(!diagnostics.has_errors(), "{:?}", diagnostics.entries());
		assert_eq!(metadata.len(), 1);
		assert!(printed.contains("__kernel"), "expected __kernel in:\n{printed}");
		assert!(printed.contains("__global double"), "expected __global on pointer params in:\n{printed}");
	}

	#[test]
	fn outer_and_inner_loops_become_builtin_index_declarations() {
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
			&Properties::new(),
		);
		assert!(!diagnostics.has_errors());
		assert!(printed.contains("get_group_id(0)"), "expected an outer-loop rewrite in:\n{printed}");
		assert!(printed.contains("get_local_id(0)"), "expected an inner-loop rewrite in:\n{printed}");
		assert!(!printed.contains("for ("), "no for-loop should survive flattening:\n{printed}");
	}

	#[test]
	fn default_extension_is_cl_khr_fp64() {
		let (printed, _, diagnostics) = lower_source("@kernel void k() { @outer for (int i = 0; i < 1; ++i) { @inner for (int j = 0; j < 1; ++j) {} } }", &Properties::new());
		assert!(!diagnostics.has_errors());
		assert!(printed.contains("cl_khr_fp64"), "expected the default extension pragma in:\n{printed}");
	}

	#[test]
	fn explicit_extensions_property_overrides_the_default() {
		let mut properties = Properties::new();
		properties.set("opencl/extensions", serde_json::json!({ "cl_khr_fp16": true, "cl_khr_fp64": false }));
		let (printed, _, diagnostics) = lower_source("@kernel void k() { @outer for (int i = 0; i < 1; ++i) { @inner for (int j = 0; j < 1; ++j) {} } }", &properties);
		assert!(!diagnostics.has_errors());
		assert!(printed.contains("cl_khr_fp16"), "expected the enabled extension in:\n{printed}");
		assert!(!printed.contains("cl_khr_fp64"), "disabled extension must not be emitted:\n{printed}");
	}
}
