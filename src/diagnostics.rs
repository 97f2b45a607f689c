//! Structured diagnostics. Every stage of the pipeline (tokenizer, preprocessor, parser,
//! validator, backend lowering) reports failures and warnings into a [`Diagnostics`] sink
//! instead of aborting, so independent errors within a stage are never lost (spec §7's
//! "each stage exhausts independent errors within itself").

use colored::Colorize as _;
use std::fmt;

use crate::token::FileOrigin;

/// The severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	Warning,
	Error,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Warning => write!(f, "{}", "warning".yellow().bold()),
			Self::Error => write!(f, "{}", "error".red().bold()),
		}
	}
}

/// The seven error kinds enumerated in the error-handling design. Kept distinct so that
/// callers (and tests) can match on *why* a diagnostic was raised rather than parsing its
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
	/// Unterminated literal, bad escape, unknown character, malformed number.
	Lex,
	/// Unknown directive, bad macro arity, unmatched conditional, `#error`, recursive include.
	Preprocessor,
	/// Unexpected token, missing punctuator, malformed declarator, unbalanced pair.
	Parse,
	/// Unknown type name, qualifier applied to the wrong kind, duplicate declaration.
	Type,
	/// Violation of one of the OKL semantic-validator rules.
	Semantic,
	/// Attribute-arity mismatch, non-evaluable `@shared` size, and other transform failures.
	Transform,
	/// An invariant check that indicates a bug in the compiler itself, not the input.
	Internal,
}

impl fmt::Display for DiagnosticKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Lex => "lex",
			Self::Preprocessor => "preprocessor",
			Self::Parse => "parse",
			Self::Type => "type",
			Self::Semantic => "semantic",
			Self::Transform => "transform",
			Self::Internal => "internal",
		};
		write!(f, "{name}")
	}
}

/// A single diagnostic: severity, message, primary origin, and any secondary origins (e.g.
/// the location of a prior conflicting declaration).
#[derive(Debug, Clone)]
pub struct Diagnostic {
	pub severity: Severity,
	pub kind: DiagnosticKind,
	pub message: String,
	pub origin: FileOrigin,
	pub secondary_origins: Vec<(FileOrigin, String)>,
}

impl Diagnostic {
	#[must_use]
	pub fn error(kind: DiagnosticKind, origin: FileOrigin, message: impl Into<String>) -> Self {
		Self {
			severity: Severity::Error,
			kind,
			message: message.into(),
			origin,
			secondary_origins: Vec::new(),
		}
	}

	#[must_use]
	pub fn warning(kind: DiagnosticKind, origin: FileOrigin, message: impl Into<String>) -> Self {
		Self {
			severity: Severity::Warning,
			kind,
			message: message.into(),
			origin,
			secondary_origins: Vec::new(),
		}
	}

	#[must_use]
	pub fn with_secondary(mut self, origin: FileOrigin, message: impl Into<String>) -> Self {
		self.secondary_origins.push((origin, message.into()));
		self
	}

	/// Renders a source-line-and-caret snippet under the diagnostic, mirroring the original
	/// frontend's `token_t::printError` (file:line:column, a copy of the offending line, and a
	/// `^` caret under the offending column).
	#[must_use]
	pub fn render(&self, source_lines: Option<&[&str]>) -> String {
		let mut out = format!(
			"{file}:{line}:{column}: {severity}: {message}",
			file = self.origin.file.display(),
			line = self.origin.line,
			column = self.origin.column,
			severity = self.severity,
			message = self.message,
		);
		if let Some(lines) = source_lines {
			if let Some(line) = lines.get(self.origin.line.saturating_sub(1)) {
				out.push('\n');
				out.push_str(line);
				out.push('\n');
				out.push_str(&" ".repeat(self.origin.column.saturating_sub(1)));
				out.push_str(&"^".red().bold().to_string());
			}
		}
		for (origin, message) in &self.secondary_origins {
			out.push('\n');
			out.push_str(&format!("  {}:{}:{}: note: {message}", origin.file.display(), origin.line, origin.column));
		}
		out
	}
}

/// A line-buffered sink that a whole compilation writes its diagnostics into. Distinct from
/// the teacher's `Context::error_details`, which only ever held notes for the single error
/// currently propagating; this sink accumulates every diagnostic across a whole pipeline run,
/// matching spec §7's "each stage exhausts independent errors within itself".
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
	entries: Vec<Diagnostic>,
}

impl Diagnostics {
	#[must_use]
	pub const fn new() -> Self {
		Self { entries: Vec::new() }
	}

	pub fn push(&mut self, diagnostic: Diagnostic) {
		tracing::debug!(kind = %diagnostic.kind, severity = %diagnostic.severity, "diagnostic emitted");
		self.entries.push(diagnostic);
	}

	pub fn error(&mut self, kind: DiagnosticKind, origin: FileOrigin, message: impl Into<String>) {
		self.push(Diagnostic::error(kind, origin, message));
	}

	pub fn warning(&mut self, kind: DiagnosticKind, origin: FileOrigin, message: impl Into<String>) {
		self.push(Diagnostic::warning(kind, origin, message));
	}

	/// Whether any error-severity diagnostic has been recorded. A CLI wrapper must exit
	/// non-zero iff this is `true` (spec §6).
	#[must_use]
	pub fn has_errors(&self) -> bool {
		self.entries.iter().any(|d| d.severity == Severity::Error)
	}

	#[must_use]
	pub fn entries(&self) -> &[Diagnostic] {
		&self.entries
	}

	pub fn extend(&mut self, other: Diagnostics) {
		self.entries.extend(other.entries);
	}

	#[must_use]
	pub fn into_vec(self) -> Vec<Diagnostic> {
		self.entries
	}
}
