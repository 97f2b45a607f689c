//! The per-compile orchestrator (spec §5 "`Session`"): owns the attribute registry, the
//! diagnostic sink, and a real filesystem `#include` resolver, and runs one source through the
//! whole pipeline — tokenize, preprocess, parse, validate, transform, lower — producing a
//! [`CompileResult`].
//!
//! Grounded on the teacher's `Context` (`src/context.rs`): a small struct threaded through a
//! multi-stage pipeline that accumulates diagnostics rather than aborting on the first one.
//! `Session` is deliberately not given a `Send`/`Sync` impl (spec §5 "process-local, `!Sync` by
//! construction") — nothing here uses interior mutability that would make that unsound, but nor
//! is concurrent access between threads a contract this crate offers.

use std::path::{Path, PathBuf};

use crate::attribute::AttributeRegistry;
use crate::backend::{Backend, KernelMetadata};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::preprocessor::{IncludeResolver, Preprocessor};
use crate::properties::Properties;
use crate::scope::ScopeData;
use crate::token::FileOrigin;
use crate::transform::apply_statement_transform;

/// The public return type of [`Session::compile`] (spec §6 "Output"/§7 "Public surface returns a
/// structured result"). `kernels` is always empty when `output` is `None` — a pipeline stage
/// failed before lowering ever ran.
#[derive(Debug, Clone, Default)]
pub struct CompileResult {
	pub output: Option<String>,
	pub kernels: Vec<KernelMetadata>,
	pub diagnostics: Vec<Diagnostic>,
	pub ok: bool,
}

/// Resolves `#include "..."`/`#include <...>` against the real filesystem: a quoted include is
/// tried relative to the including file's own directory first, then every `include_paths` entry
/// in search order; an angle-bracket include only searches `include_paths` (spec §6
/// "`include_paths` (array of dirs)").
struct FsIncludeResolver {
	search_paths: Vec<PathBuf>,
}

impl FsIncludeResolver {
	fn new(properties: &Properties) -> Self {
		Self {
			search_paths: properties.get_array("include_paths").into_iter().filter_map(|value| value.as_str()).map(PathBuf::from).collect(),
		}
	}
}

impl IncludeResolver for FsIncludeResolver {
	fn resolve(&mut self, name: &str, is_system: bool, including_file: &Path) -> Option<(PathBuf, String)> {
		let mut candidates = Vec::new();
		if !is_system {
			if let Some(parent) = including_file.parent() {
				candidates.push(parent.join(name));
			}
		}
		candidates.extend(self.search_paths.iter().map(|dir| dir.join(name)));
		candidates.into_iter().find_map(|path| std::fs::read_to_string(&path).ok().map(|text| (path, text)))
	}
}

/// One compiler run (spec §5 "`Session`", this crate's name for the spec's "parser instance").
/// Construct one per compile, or reuse across several — `compile` resets its own diagnostic sink
/// at the start of every call, so results from one call never bleed into the next.
pub struct Session {
	backend: Backend,
	attributes: AttributeRegistry,
	diagnostics: Diagnostics,
}

impl Session {
	#[must_use]
	pub fn new(backend: Backend) -> Self {
		Self {
			backend,
			attributes: AttributeRegistry::with_builtins(),
			diagnostics: Diagnostics::new(),
		}
	}

	/// Runs `source` through the whole pipeline under `properties` (spec §6 "Source contract").
	/// `file` only ever needs to be a display name when `source` isn't read from disk; reading
	/// `#include`s relative to a synthetic path simply never finds anything, which is the correct
	/// behaviour for an isolated in-memory compile.
	#[tracing::instrument(skip(self, source, properties), fields(backend = self.backend.name()))]
	pub fn compile(&mut self, source: &str, file: impl AsRef<Path>, properties: &Properties) -> CompileResult {
		self.diagnostics = Diagnostics::new();
		let (output, kernels) = self.run(source, file.as_ref(), properties).unzip();
		let diagnostics = std::mem::take(&mut self.diagnostics);
		let ok = !diagnostics.has_errors();
		CompileResult {
			output,
			kernels: kernels.unwrap_or_default(),
			diagnostics: diagnostics.into_vec(),
			ok,
		}
	}

	fn run(&mut self, source: &str, file: &Path, properties: &Properties) -> Option<(String, Vec<KernelMetadata>)> {
		let wrapped = wrap_header_and_footer(source, properties);

		let tokens = {
			let _span = tracing::debug_span!("tokenize").entered();
			match crate::lexer::tokenize(&wrapped, FileOrigin::synthetic(file)) {
				Ok(tokens) => tokens,
				Err(error) => {
					self.diagnostics.error(DiagnosticKind::Lex, FileOrigin::synthetic(file), error.to_string());
					return None;
				},
			}
		};

		let normalized = {
			let _span = tracing::debug_span!("preprocess").entered();
			let mut preprocessor = Preprocessor::new(&mut self.diagnostics);
			self.backend.before_preprocessing(&mut preprocessor, properties);
			for (name, value) in properties.get_object("defines") {
				if let Err(error) = preprocessor.define_object_macro(name, &define_value_text(value)) {
					preprocessor_diagnostics_sink_error(&mut self.diagnostics, file, name, &error);
				}
			}
			let mut includes = FsIncludeResolver::new(properties);
			let preprocessed = preprocessor.run(tokens, file, &mut includes);
			crate::token_stream::normalize(preprocessed)
		};
		if self.diagnostics.has_errors() {
			return None;
		}

		let mut scopes = ScopeData::global();
		let mut arena = crate::ast::StatementArena::new();
		let root = {
			let _span = tracing::debug_span!("parse").entered();
			let mut parser = crate::parser_okl::Parser::new(&normalized, &mut arena, &mut scopes, &self.attributes, &mut self.diagnostics);
			parser.parse_program()
		};
		if self.diagnostics.has_errors() {
			return None;
		}

		if properties.get_bool("okl/validate", true) {
			let _span = tracing::debug_span!("validate").entered();
			crate::validator::validate(&arena, root, &scopes, &mut self.diagnostics);
			if self.diagnostics.has_errors() {
				return None;
			}
		}

		apply_statement_transform(&mut arena, &mut scopes, root, &mut crate::transform::dim::DimTransform, &mut self.diagnostics);
		apply_statement_transform(&mut arena, &mut scopes, root, &mut crate::transform::tile::TileTransform, &mut self.diagnostics);
		if self.diagnostics.has_errors() {
			return None;
		}

		let kernels = {
			let _span = tracing::debug_span!("lower").entered();
			self.backend.lower(&mut arena, &mut scopes, root, properties, &mut self.diagnostics)
		};
		if self.diagnostics.has_errors() {
			return None;
		}

		let printed = crate::formatter::print_program(&arena, &scopes, root);
		Some((self.backend.postprocess_source(printed, properties), kernels))
	}
}

/// Concatenates `header`/`footer` properties around the source (spec §6 "`header` (extra
/// prelude), `footer` (extra suffix)").
fn wrap_header_and_footer(source: &str, properties: &Properties) -> String {
	let header = properties.get_str("header").unwrap_or_default();
	let footer = properties.get_str("footer").unwrap_or_default();
	if header.is_empty() && footer.is_empty() {
		return source.to_owned();
	}
	format!("{header}\n{source}\n{footer}")
}

/// Renders a `defines` entry's JSON value as the macro-replacement text a `#define` would carry
/// (a string value is spliced in verbatim; anything else prints as JSON).
fn define_value_text(value: &serde_json::Value) -> String {
	match value.as_str() {
		Some(text) => text.to_owned(),
		None => value.to_string(),
	}
}

fn preprocessor_diagnostics_sink_error(diagnostics: &mut Diagnostics, file: &Path, name: &str, error: &anyhow::Error) {
	diagnostics.error(DiagnosticKind::Preprocessor, FileOrigin::synthetic(file), format!("invalid 'defines/{name}' macro body: {error}"));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn compiles_a_simple_kernel_with_the_serial_backend() {
		let mut session = Session::new(Backend::Serial);
		let result = session.compile(
			r"
			@kernel void addVectors(int N, float *a, float *b, float *ans) {
				@outer for (int i = 0; i < N; ++i) {
					@inner for (int j = 0; j < 1; ++j) {
						ans[i] = a[i] + b[i];
					}
				}
			}
			",
			"addVectors.okl",
			&Properties::new(),
		);
		assert!(result.ok, "{:?}", result.diagnostics);
		assert_eq!(result.kernels.len(), 1);
		assert!(result.output.unwrap().contains("extern \"C\""));
	}

	#[test]
	fn a_kernel_with_no_outer_loop_fails_validation_and_reports_no_output() {
		let mut session = Session::new(Backend::Serial);
		let result = session.compile("@kernel void k() {}", "k.okl", &Properties::new());
		assert!(!result.ok);
		assert!(result.output.is_none());
		assert!(result.kernels.is_empty());
		assert!(!result.diagnostics.is_empty());
	}

	#[test]
	fn defines_property_seeds_a_compiler_macro() {
		let mut session = Session::new(Backend::Serial);
		let mut properties = Properties::new();
		properties.set("defines", serde_json::json!({ "TILE_SIZE": "16" }));
		let result = session.compile(
			r"
			@kernel void k(int N) {
				@outer for (int i = 0; i < N; ++i) {
					@inner for (int j = 0; j < TILE_SIZE; ++j) {}
				}
			}
			",
			"k.okl",
			&properties,
		);
		assert!(result.ok, "{:?}", result.diagnostics);
		assert!(result.output.unwrap().contains("16"), "expected TILE_SIZE to expand to 16");
	}

	#[test]
	fn okl_validate_false_skips_validation_and_still_lowers() {
		let mut session = Session::new(Backend::Serial);
		let mut properties = Properties::new();
		properties.set("okl/validate", serde_json::Value::Bool(false));
		let result = session.compile("@kernel void k() {}", "k.okl", &properties);
		assert!(result.ok, "{:?}", result.diagnostics);
		assert_eq!(result.kernels.len(), 1);
	}

	#[test]
	fn header_and_footer_properties_wrap_the_source() {
		let mut session = Session::new(Backend::Serial);
		let mut properties = Properties::new();
		properties.set("header", serde_json::Value::String("#define N 64".to_owned()));
		let result = session.compile(
			r"
			@kernel void k() {
				@outer for (int i = 0; i < N; ++i) {
					@inner for (int j = 0; j < 1; ++j) {}
				}
			}
			",
			"k.okl",
			&properties,
		);
		assert!(result.ok, "{:?}", result.diagnostics);
		assert!(result.output.unwrap().contains("64"));
	}
}
