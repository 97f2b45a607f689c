use std::path::PathBuf;

use colored::Colorize as _;

use crate::session::Session;

use super::{load_properties, parse_backend, print_diagnostics};

/// Lowers one OKL source file to a backend target (spec §6 "Public surface").
#[derive(clap::Parser)]
pub struct CompileCommand {
	/// The OKL kernel source file to compile.
	pub file: PathBuf,

	/// The backend to lower to: serial, openmp, opencl, cuda, hip, or metal.
	#[arg(long, short, default_value = "serial")]
	pub backend: String,

	/// An optional JSON properties file (spec §6 "Source contract").
	#[arg(long)]
	pub properties: Option<PathBuf>,

	/// Write the lowered source to this file instead of stdout.
	#[arg(long, short)]
	pub output: Option<PathBuf>,

	/// Print the kernel metadata as JSON alongside the lowered source.
	#[arg(long)]
	pub metadata: bool,
}

impl super::OklCommand for CompileCommand {
	fn execute(self) -> anyhow::Result<()> {
		let backend = parse_backend(&self.backend)?;
		let properties = load_properties(self.properties.as_deref())?;
		let source = std::fs::read_to_string(&self.file)?;

		let mut session = Session::new(backend);
		let result = session.compile(&source, &self.file, &properties);

		print_diagnostics(&result.diagnostics, &self.file, &source);

		if !result.ok {
			anyhow::bail!("compilation of {} failed", self.file.display());
		}
		let output = result.output.expect("ok result always carries output");

		match &self.output {
			Some(path) => std::fs::write(path, &output)?,
			None => print!("{output}"),
		}

		if self.metadata {
			println!("{}", serde_json::to_string_pretty(&result.kernels)?);
		}

		if self.output.is_some() {
			println!("{} {}", "compiled".bold().green(), self.file.display());
		}
		Ok(())
	}
}
