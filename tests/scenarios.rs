//! End-to-end tests for the literal expected behaviour in spec §8's numbered scenarios, each
//! driven through `Session::compile` rather than a single pipeline stage in isolation. Scenario 4
//! (the two-declarator `@outer` initializer) is covered in `src/validator.rs`'s own test module,
//! since it only exercises the validator and never reaches lowering.

use okl_compiler::backend::Backend;
use okl_compiler::properties::Properties;
use okl_compiler::session::Session;

fn without_whitespace(text: &str) -> String {
	text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Scenario 1 — `#define SQ(x) ((x)*(x))` expands `SQ(3+1)` to `((3+1)*(3+1))` with the call's
/// argument substituted into the macro body rather than left dangling after an unexpanded one.
#[test]
fn scenario_1_function_like_macro_expands_with_argument_substitution() {
	let mut session = Session::new(Backend::Serial);
	let mut properties = Properties::new();
	properties.set("okl/validate", serde_json::Value::Bool(false));

	let result = session.compile(
		r"
		#define SQ(x) ((x)*(x))
		int a = SQ(3+1);
		",
		"scenario1.okl",
		&properties,
	);

	assert!(result.ok, "{:?}", result.diagnostics);
	let output = without_whitespace(&result.output.unwrap());
	assert!(output.contains("inta=((3+1)*(3+1));"), "expected substituted macro body, got {output}");
}

/// Scenario 2 — `@dim(N, N)` folds a two-argument call into a row-major subscript.
#[test]
fn scenario_2_dim_rewrites_a_two_dimensional_call_to_a_subscript() {
	let mut session = Session::new(Backend::Serial);
	let result = session.compile(
		r"
		@kernel void k(@dim(N, N) double *A, int N) {
			@outer for (int i = 0; i < N; ++i) {
				@inner for (int j = 0; j < N; ++j) {
					A(i, j) = 1.0;
				}
			}
		}
		",
		"scenario2.okl",
		&Properties::new(),
	);

	assert!(result.ok, "{:?}", result.diagnostics);
	let output = without_whitespace(&result.output.unwrap());
	assert!(output.contains("A[(i)+(N)*(j)]"), "expected folded row-major subscript, got {output}");
}

/// Scenario 3 — `@dimOrder(1, 0)` swaps which argument lines up with which declared dimension.
#[test]
fn scenario_3_dim_order_permutes_the_fold() {
	let mut session = Session::new(Backend::Serial);
	let result = session.compile(
		r"
		@kernel void k(@dim(N, N) @dimOrder(1, 0) double *A, int N) {
			@outer for (int i = 0; i < N; ++i) {
				@inner for (int j = 0; j < N; ++j) {
					A(i, j) = 1.0;
				}
			}
		}
		",
		"scenario3.okl",
		&Properties::new(),
	);

	assert!(result.ok, "{:?}", result.diagnostics);
	let output = without_whitespace(&result.output.unwrap());
	assert!(output.contains("A[(j)+(N)*(i)]"), "expected dimOrder-permuted subscript, got {output}");
}

/// Scenario 5 — `@tile(16, @outer, @inner)` splits a simple loop into a block loop (stepping by
/// the tile size) around a register loop re-bounded to one tile. Validation runs before the
/// transform pass, so a loop that only carries `@tile` (not yet `@outer`/`@inner`) is disabled
/// here the same way `src/transform/tile.rs`'s own unit tests disable it.
#[test]
fn scenario_5_tile_splits_a_simple_loop_into_block_and_register_loops() {
	let mut session = Session::new(Backend::Serial);
	let mut properties = Properties::new();
	properties.set("okl/validate", serde_json::Value::Bool(false));

	let result = session.compile(
		r"
		@kernel void k(int N) {
			@tile(16, @outer, @inner) for (int i = 0; i < N; ++i) {
				int x = i;
			}
		}
		",
		"scenario5.okl",
		&properties,
	);

	assert!(result.ok, "{:?}", result.diagnostics);
	let output = result.output.unwrap();
	assert!(output.contains("_occa_tiled_i"), "expected a block iterator named after the original, got {output}");
	let without_ws = without_whitespace(&output);
	assert!(without_ws.contains("_occa_tiled_i+=1*16"), "expected the block loop to step by the tile size, got {without_ws}");
	assert!(without_ws.contains("i=_occa_tiled_i"), "expected the register loop to start from the block iterator, got {without_ws}");
}

/// Scenario 6 — serial lowering of `@exclusive`: the scalar becomes an array, an index counter is
/// threaded through the `@inner` loop, and every use is rewritten to index it.
#[test]
fn scenario_6_serial_lowering_rewrites_exclusive_scalars_into_indexed_arrays() {
	let mut session = Session::new(Backend::Serial);
	let result = session.compile(
		r"
		@kernel void k(int O, int I) {
			@outer for (int o = 0; o < O; ++o) {
				@exclusive int tmp;
				@inner for (int i = 0; i < I; ++i) {
					tmp = i;
				}
			}
		}
		",
		"scenario6.okl",
		&Properties::new(),
	);

	assert!(result.ok, "{:?}", result.diagnostics);
	let output = without_whitespace(&result.output.unwrap());
	assert!(output.contains("tmp[256]"), "expected the exclusive scalar widened to an array, got {output}");
	assert!(output.contains("_occa_exclusive_index=0"), "expected the index counter declared before the @inner loop, got {output}");
	assert!(output.contains("++_occa_exclusive_index;"), "expected the index counter incremented at the end of the @inner body, got {output}");
	assert!(output.contains("tmp[_occa_exclusive_index]"), "expected uses of tmp rewritten to index by the counter, got {output}");
}
