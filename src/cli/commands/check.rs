use std::path::PathBuf;

use colored::Colorize as _;

use crate::backend::Backend;
use crate::session::Session;

use super::{load_properties, print_diagnostics};

/// Validates every `.okl` file under a directory (or a single file) without emitting lowered
/// source — just tokenize, preprocess, parse, and validate (spec §4.H), reporting every
/// diagnostic found.
#[derive(clap::Parser)]
pub struct CheckCommand {
	/// A single `.okl` file, or a directory to walk for `.okl` files.
	pub path: PathBuf,

	/// An optional JSON properties file (spec §6 "Source contract").
	#[arg(long)]
	pub properties: Option<PathBuf>,
}

impl super::OklCommand for CheckCommand {
	fn execute(self) -> anyhow::Result<()> {
		let properties = load_properties(self.properties.as_deref())?;
		let files = collect_okl_files(&self.path)?;
		if files.is_empty() {
			anyhow::bail!("no .okl files found under {}", self.path.display());
		}

		let mut session = Session::new(Backend::Serial);
		let mut failures = 0;
		for file in &files {
			let source = std::fs::read_to_string(file)?;
			let result = session.compile(&source, file, &properties);
			print_diagnostics(&result.diagnostics, file, &source);
			if result.ok {
				println!("{} {}", "ok".bold().green(), file.display());
			} else {
				failures += 1;
				println!("{} {}", "fail".bold().red(), file.display());
			}
		}

		if failures > 0 {
			anyhow::bail!("{failures} of {} file(s) failed validation", files.len());
		}
		Ok(())
	}
}

fn collect_okl_files(path: &std::path::Path) -> anyhow::Result<Vec<PathBuf>> {
	if path.is_file() {
		return Ok(vec![path.to_owned()]);
	}
	let mut files = Vec::new();
	for entry in walkdir::WalkDir::new(path) {
		let entry = entry?;
		if entry.file_type().is_file() && entry.path().extension().is_some_and(|extension| extension == "okl") {
			files.push(entry.path().to_owned());
		}
	}
	files.sort();
	Ok(files)
}
