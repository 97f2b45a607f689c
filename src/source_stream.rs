//! The character-level source reader and its `#include` stack (spec §4.A "Source stream &
//! tokenizer"). Grounded on the original implementation's `sourceStream_t`/`sourceStream.cpp`,
//! which pairs a character cursor with a stack of include frames so that peeking/rewinding works
//! uniformly across file boundaries.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::token::{FileOrigin, IncludeFrame};

/// One file currently being read, tracked on the include stack.
struct Frame {
	file: Rc<PathBuf>,
	text: Vec<char>,
	position: usize,
	line: usize,
	column: usize,
	include_chain: Vec<Rc<IncludeFrame>>,
}

impl Frame {
	fn peek_at(&self, offset: usize) -> Option<char> {
		self.text.get(self.position + offset).copied()
	}
}

/// A pull-based character reader over one compilation unit's source text, including whatever it
/// transitively `#include`s. Lines ending in `\` are spliced before any other character is
/// observed, matching the original's handling of line continuations ahead of tokenization.
pub struct SourceStream {
	stack: Vec<Frame>,
}

impl SourceStream {
	#[must_use]
	pub fn new(file: impl AsRef<Path>, text: &str) -> Self {
		Self {
			stack: vec![Frame {
				file: Rc::new(file.as_ref().to_path_buf()),
				text: splice_continuations(text),
				position: 0,
				line: 1,
				column: 1,
				include_chain: Vec::new(),
			}],
		}
	}

	#[must_use]
	pub fn peek(&self) -> Option<char> {
		self.peek_at(0)
	}

	#[must_use]
	pub fn peek_at(&self, offset: usize) -> Option<char> {
		self.stack.last().and_then(|frame| frame.peek_at(offset))
	}

	/// Advances one character, folding the include stack once a frame is exhausted. Returns
	/// `None` once every frame on the stack has been consumed.
	pub fn advance(&mut self) -> Option<char> {
		loop {
			let frame = self.stack.last_mut()?;
			let Some(character) = frame.text.get(frame.position).copied() else {
				self.stack.pop();
				if self.stack.is_empty() {
					return None;
				}
				continue;
			};
			frame.position += 1;
			if character == '\n' {
				frame.line += 1;
				frame.column = 1;
			} else {
				frame.column += 1;
			}
			return Some(character);
		}
	}

	#[must_use]
	pub fn at_eof(&self) -> bool {
		self.stack.is_empty() || (self.stack.len() == 1 && self.stack[0].position >= self.stack[0].text.len())
	}

	/// Pushes an included file's text onto the stack; its origin reports as nested under the
	/// current file (spec §3 "include chain").
	pub fn push_include(&mut self, file: impl AsRef<Path>, text: &str) {
		let include_chain = self.stack.last().map_or_else(Vec::new, |parent| {
			let mut chain = parent.include_chain.clone();
			chain.push(Rc::new(IncludeFrame { file: Rc::clone(&parent.file), line: parent.line }));
			chain
		});
		self.stack.push(Frame {
			file: Rc::new(file.as_ref().to_path_buf()),
			text: splice_continuations(text),
			position: 0,
			line: 1,
			column: 1,
			include_chain,
		});
	}

	#[must_use]
	pub fn origin(&self) -> FileOrigin {
		let frame = self.stack.last().expect("source stream frame stack is never empty while reading");
		FileOrigin {
			file: Rc::clone(&frame.file),
			line: frame.line,
			column: frame.column,
			byte_offset: frame.position,
			include_chain: frame.include_chain.clone(),
		}
	}
}

/// Joins a line ending in an unescaped backslash with the line that follows it, the way a C
/// preprocessor's phase-2 translation does, before any token boundary is considered.
fn splice_continuations(text: &str) -> Vec<char> {
	let mut out = Vec::with_capacity(text.len());
	let chars: Vec<char> = text.chars().collect();
	let mut index = 0;
	while index < chars.len() {
		if chars[index] == '\\' && matches!(chars.get(index + 1), Some('\n')) {
			index += 2;
			continue;
		}
		if chars[index] == '\\' && matches!(chars.get(index + 1), Some('\r')) && matches!(chars.get(index + 2), Some('\n')) {
			index += 3;
			continue;
		}
		out.push(chars[index]);
		index += 1;
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn line_continuations_are_spliced_before_reading() {
		let stream = SourceStream::new("a.okl", "int x =\\\n  1;");
		let mut text = String::new();
		let mut stream = stream;
		while let Some(character) = stream.advance() {
			text.push(character);
		}
		assert_eq!(text, "int x =  1;");
	}

	#[test]
	fn include_push_nests_the_chain() {
		let mut stream = SourceStream::new("a.okl", "A");
		stream.advance();
		stream.push_include("b.okl", "B");
		let origin = stream.origin();
		assert_eq!(origin.file.as_path(), Path::new("b.okl"));
		assert_eq!(origin.include_chain.len(), 1);
	}
}
