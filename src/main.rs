//! The `oklc` binary: parses command-line arguments and dispatches to the library's subcommands.

/// Bring the `Parser` trait into scope from `clap`, which allows parsing argument structs from the command line. We assign it to underscore to indicate
/// clearly that it's not used outside of bringing its trait methods into scope.
use clap::Parser as _;

use okl_compiler::cli::commands::{OklCommand as _, SubCommand};

/// The command-line arguments for the compiler.
#[derive(clap::Parser)]
pub struct OklCompilerArguments {
	/// The command to run, such as `compile` or `check`.
	#[command(subcommand)]
	pub command: SubCommand,
}

/// The main entry point for the OKL compiler. This parses the arguments passed at the command-line, and runs the
/// given subcommand (`compile`, `check`, etc.)
fn main() -> anyhow::Result<()> {
	okl_compiler::init_logging();
	OklCompilerArguments::parse().command.execute()
}
