//! # oklc
//!
//! A source-to-source compiler for the OKL kernel language: tokenizes and preprocesses an OKL
//! source file, parses and validates its parallelism attributes, and lowers it to one of several
//! backend targets (serial, OpenMP, OpenCL, CUDA, HIP, Metal).
//!
//! This crate is split into a library (every pipeline stage, reusable from integration tests in
//! `tests/`) and a thin `oklc` binary that wires the library's [`cli::commands::SubCommand`] up
//! to `std::env::args`.

pub mod diagnostics;
pub mod token;
pub mod cursor;
pub mod types;
pub mod scope;
pub mod attribute;
pub mod expr;
pub mod ast;
pub mod source_stream;
pub mod preprocessor;
pub mod token_stream;
pub mod parser_okl;
pub mod validator;
pub mod transform;
pub mod backend;
pub mod formatter;
pub mod properties;
pub mod session;

/// The lexer module, which tokenizes source code into a stream of tokens.
pub mod lexer;

/// The CLI module. This module handles tooling related to the CLI, such as pretty-printing code snippets and errors, configuration options, subcommands, etc.
pub mod cli;

/// Installs the CLI's log formatter. Split out of `main` so both the `oklc` binary and anything
/// else embedding this crate can opt into the same `tracing-subscriber` setup.
pub fn init_logging() {
	tracing_subscriber::fmt::init();
}
