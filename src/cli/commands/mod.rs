use std::path::Path;

use colored::Colorize as _;

use crate::backend::Backend;
use crate::diagnostics::Diagnostic;
use crate::properties::Properties;

pub mod check;
pub mod compile;

#[enum_dispatch::enum_dispatch]
pub trait OklCommand {
	/// Executes this subcommand.
	fn execute(self) -> anyhow::Result<()>;
}

#[derive(clap::Subcommand)]
#[enum_dispatch::enum_dispatch(OklCommand)]
pub enum SubCommand {
	Compile(compile::CompileCommand),
	Check(check::CheckCommand),
}

fn parse_backend(name: &str) -> anyhow::Result<Backend> {
	match name {
		"serial" => Ok(Backend::Serial),
		"openmp" => Ok(Backend::OpenMp),
		"opencl" => Ok(Backend::OpenCl),
		"cuda" => Ok(Backend::Cuda),
		"hip" => Ok(Backend::Hip),
		"metal" => Ok(Backend::Metal),
		other => anyhow::bail!("unknown backend '{other}' (expected one of: serial, openmp, opencl, cuda, hip, metal)"),
	}
}

/// Loads the properties bag from an optional on-disk file, dispatching on extension: `.toml`
/// reads `toml_edit`, anything else is parsed as JSON (spec §6 "Source contract").
fn load_properties(path: Option<&Path>) -> anyhow::Result<Properties> {
	let Some(path) = path else { return Ok(Properties::new()) };
	let text = std::fs::read_to_string(path)?;
	if path.extension().is_some_and(|extension| extension == "toml") {
		Properties::from_toml(&text)
	} else {
		Properties::from_json(&text)
	}
}

/// Renders every diagnostic with its source-line-and-caret snippet (spec §4.K) to stderr for
/// errors and stdout for warnings, matching the teacher's own colored diagnostic rendering.
fn print_diagnostics(diagnostics: &[Diagnostic], file: &Path, source: &str) {
	let lines: Vec<&str> = source.lines().collect();
	for diagnostic in diagnostics {
		let rendered = diagnostic.render(Some(&lines));
		match diagnostic.severity {
			crate::diagnostics::Severity::Error => eprintln!("{}", rendered.red()),
			crate::diagnostics::Severity::Warning => println!("{}", rendered.yellow()),
		}
	}
	if diagnostics.is_empty() {
		tracing::debug!(file = %file.display(), "no diagnostics");
	}
}
