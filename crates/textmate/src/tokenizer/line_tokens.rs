use crate::attributes::{AttributesUpdate, EncodedTokenAttributes};
use crate::brackets::BalancedBracketSelectors;
use crate::grammar::{Token, TokenTypeMatcher};
use crate::stack::{AttributedScopeStack, StateStack};

/// Shape of the tokens a tokenize call emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputMode {
	/// [`Token`]s with scope name lists.
	Scopes,
	/// `(end offset, metadata)` pairs.
	Binary,
}

/// Token sink of one line.
///
/// Each `produce` call closes the span running from the previous end up to
/// the given offset. Calls that do not move past the previous end are
/// ignored, so spans never overlap.
pub(crate) struct LineTokens<'g> {
	mode: OutputMode,
	token_types: &'g [TokenTypeMatcher],
	brackets: &'g BalancedBracketSelectors,
	tokens: Vec<Token>,
	binary: Vec<(usize, EncodedTokenAttributes)>,
	last_end: usize,
}

impl<'g> LineTokens<'g> {
	pub(crate) fn new(mode: OutputMode, token_types: &'g [TokenTypeMatcher], brackets: &'g BalancedBracketSelectors) -> Self {
		Self {
			mode,
			token_types,
			brackets,
			tokens: Vec::new(),
			binary: Vec::new(),
			last_end: 0,
		}
	}

	pub(crate) fn produce(&mut self, stack: &StateStack, end: usize) {
		self.produce_from_scopes(stack.content_name_scopes(), end);
	}

	pub(crate) fn produce_from_scopes(&mut self, scopes: &AttributedScopeStack, end: usize) {
		if self.last_end >= end {
			return;
		}

		match self.mode {
			OutputMode::Scopes => self.tokens.push(Token {
				start: self.last_end,
				end,
				scopes: scopes.scope_names().into_iter().map(str::to_owned).collect(),
			}),
			OutputMode::Binary => {
				let metadata = self.binary_metadata(scopes);
				match self.binary.last_mut() {
					Some((last_end, last)) if *last == metadata => *last_end = end,
					_ => self.binary.push((end, metadata)),
				}
			}
		}
		self.last_end = end;
	}

	fn binary_metadata(&self, scopes: &AttributedScopeStack) -> EncodedTokenAttributes {
		let mut metadata = scopes.attributes();
		let mut balanced = self.brackets.matches_always();

		if !self.token_types.is_empty() || !(balanced || self.brackets.matches_never()) {
			let names = scopes.scope_names();
			if let Some(forced) = self.token_types.iter().find(|t| t.matcher.matches(&names)) {
				metadata = metadata.set(AttributesUpdate {
					token_type: Some(forced.token_type),
					..Default::default()
				});
			}
			balanced = self.brackets.matches(&names);
		}

		if balanced {
			metadata = metadata.set(AttributesUpdate {
				balanced_brackets: Some(true),
				..Default::default()
			});
		}
		metadata
	}

	/// Finishes a [`OutputMode::Scopes`] line of `real_len` bytes.
	///
	/// Spans of the appended line terminator are dropped. A line that
	/// produced nothing yields one empty token with the final scopes.
	pub(crate) fn into_tokens(self, stack: &StateStack, real_len: usize) -> Vec<Token> {
		let mut tokens = self.tokens;
		tokens.retain(|token| token.start < real_len);
		match tokens.last_mut() {
			Some(last) => last.end = real_len,
			None => tokens.push(Token {
				start: 0,
				end: real_len,
				scopes: stack.scope_names().into_iter().map(str::to_owned).collect(),
			}),
		}
		tokens
	}

	/// Finishes a [`OutputMode::Binary`] line of `real_len` bytes as flat
	/// `(end, metadata)` pairs.
	pub(crate) fn into_binary(self, stack: &StateStack, real_len: usize) -> Vec<u32> {
		let mut pairs = Vec::with_capacity(self.binary.len());
		let mut start = 0;
		for &(end, metadata) in &self.binary {
			if start >= real_len {
				break;
			}
			pairs.push((end, metadata));
			start = end;
		}
		match pairs.last_mut() {
			Some((end, _)) => *end = real_len,
			None => pairs.push((real_len, self.binary_metadata(stack.content_name_scopes()))),
		}
		pairs
			.into_iter()
			.flat_map(|(end, metadata)| [end as u32, metadata.bits()])
			.collect()
	}
}
