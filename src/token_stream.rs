//! Token-stream transforms (spec §4.C): small, composable pull iterators that sit between the
//! tokenizer/preprocessor and the statement parser. Grounded on the "token streams are pull-based
//! iterators, composed by function composition" design note (spec §9) — each transform here is an
//! `Iterator<Item = Token>` adapter rather than a pass that allocates a whole new `Vec<Token>`.

use crate::token::{StringEncoding, Token, TokenKind};

/// Merges adjacent string literal tokens (`"a" "b"` → one literal), the way translation phase 6
/// concatenates string literals. Newlines between the literals are transparent to this merge,
/// since after preprocessing line structure no longer matters for the statement grammar.
pub struct StringMerger<I: Iterator<Item = Token>> {
	inner: std::iter::Peekable<I>,
}

impl<I: Iterator<Item = Token>> StringMerger<I> {
	pub fn new(inner: I) -> Self {
		Self { inner: inner.peekable() }
	}

	fn peek_skip_newlines(&mut self) -> Option<&Token> {
		while matches!(self.inner.peek().map(|t| &t.kind), Some(TokenKind::Newline)) {
			self.inner.next();
		}
		self.inner.peek()
	}
}

impl<I: Iterator<Item = Token>> Iterator for StringMerger<I> {
	type Item = Token;

	fn next(&mut self) -> Option<Token> {
		let token = self.inner.next()?;
		let TokenKind::StringLit { encoding, raw, user_suffix } = token.kind else {
			return Some(token);
		};
		let mut merged_encoding = encoding;
		let mut merged_raw = raw;
		let mut merged_suffix = user_suffix;
		loop {
			let Some(next_kind) = self.peek_skip_newlines().map(|t| &t.kind) else { break };
			let TokenKind::StringLit { encoding: next_encoding, .. } = next_kind else { break };
			let Some(combined) = merged_encoding.merge(*next_encoding) else { break };
			let Some(Token { kind: TokenKind::StringLit { raw: next_raw, user_suffix: next_suffix, .. }, .. }) = self.inner.next() else {
				unreachable!("peeked token must match the string literal just matched");
			};
			merged_encoding = combined;
			merged_raw.push_str(&next_raw);
			merged_suffix = merged_suffix.or(next_suffix);
		}
		Some(Token::new(
			TokenKind::StringLit {
				encoding: merged_encoding,
				raw: merged_raw,
				user_suffix: merged_suffix,
			},
			token.origin,
		))
	}
}

/// Drops every `Newline` marker. The preprocessor consumes newlines to find directive-line
/// boundaries; nothing downstream of it needs them.
pub struct NewlineFilter<I: Iterator<Item = Token>> {
	inner: I,
}

impl<I: Iterator<Item = Token>> NewlineFilter<I> {
	pub fn new(inner: I) -> Self {
		Self { inner }
	}
}

impl<I: Iterator<Item = Token>> Iterator for NewlineFilter<I> {
	type Item = Token;

	fn next(&mut self) -> Option<Token> {
		self.inner.by_ref().find(|token| !token.kind.is_newline())
	}
}

/// Drops tokens matching an arbitrary predicate, used to discard the empty placemarker tokens a
/// macro expansion with zero replacement tokens can otherwise leave behind.
pub struct UnknownFilter<I: Iterator<Item = Token>, F: FnMut(&Token) -> bool> {
	inner: I,
	predicate: F,
}

impl<I: Iterator<Item = Token>, F: FnMut(&Token) -> bool> UnknownFilter<I, F> {
	pub fn new(inner: I, predicate: F) -> Self {
		Self { inner, predicate }
	}
}

impl<I: Iterator<Item = Token>, F: FnMut(&Token) -> bool> Iterator for UnknownFilter<I, F> {
	type Item = Token;

	fn next(&mut self) -> Option<Token> {
		loop {
			let token = self.inner.next()?;
			if (self.predicate)(&token) {
				return Some(token);
			}
		}
	}
}

/// Runs the standard post-preprocessing pipeline: merge adjacent strings, then drop newlines.
pub fn normalize(tokens: Vec<Token>) -> Vec<Token> {
	NewlineFilter::new(StringMerger::new(tokens.into_iter())).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::token::FileOrigin;

	fn string_token(text: &str) -> Token {
		Token::new(
			TokenKind::StringLit {
				encoding: StringEncoding::Plain,
				raw: text.to_owned(),
				user_suffix: None,
			},
			FileOrigin::synthetic("a.okl"),
		)
	}

	#[test]
	fn adjacent_strings_merge_across_a_newline() {
		let tokens = vec![string_token("ab"), Token::new(TokenKind::Newline, FileOrigin::synthetic("a.okl")), string_token("cd")];
		let merged: Vec<_> = StringMerger::new(tokens.into_iter()).collect();
		assert_eq!(merged.len(), 1);
		assert!(matches!(&merged[0].kind, TokenKind::StringLit { raw, .. } if raw == "abcd"));
	}

	#[test]
	fn normalize_drops_newlines() {
		let tokens = vec![Token::new(TokenKind::Newline, FileOrigin::synthetic("a.okl")), string_token("x")];
		let normalized = normalize(tokens);
		assert_eq!(normalized.len(), 1);
	}
}
