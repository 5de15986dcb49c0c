//! Compiled grammars and the line tokenize entry points.
//!
//! A [`Grammar`] is cheap to construct: nothing is compiled until the first
//! line is tokenized (or [`Grammar::root_rule_id`] is asked for). The compile
//! pass runs exactly once per grammar, after which the grammar is shared
//! read-only between any number of threads.

mod compiled;

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use scopeline_selector::{Matcher, Priority, create_matchers};
use serde::Deserialize;

pub(crate) use self::compiled::CompiledGrammar;
use crate::attributes::{EncodedTokenAttributes, LanguageId, StandardTokenType};
use crate::brackets::BalancedBracketSelectors;
use crate::error::Result;
use crate::raw::{RawGrammar, init_grammar};
use crate::registry::GrammarRepository;
use crate::rule::{Rule, RuleId};
use crate::scope_attributes::BasicScopeAttributesProvider;
use crate::stack::{AttributedScopeStack, ScanId, ScopeEncoder, StateStack};
use crate::theme::ThemeProvider;
use crate::tokenizer::{LinePosition, LineTokens, OutputMode, StringOutcome, Tokenizer};

/// Scope root used when the root rule carries no name.
const UNKNOWN_ROOT_SCOPE: &str = "unknown";

/// Per-grammar tokenization options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrammarOptions {
	/// Language id of text outside any embedded language scope.
	pub initial_language: LanguageId,
	/// Scope name to language id. The longest dotted prefix of a scope wins.
	pub embedded_languages: FxHashMap<String, LanguageId>,
	/// Selector to forced token type, first matching selector wins.
	pub token_types: IndexMap<String, StandardTokenType>,
	/// Selectors of scopes whose brackets pair up. `*` allows every scope.
	pub balanced_bracket_selectors: Vec<String>,
	/// Selectors of scopes excluded from bracket pairing.
	pub unbalanced_bracket_selectors: Vec<String>,
}

/// A token span with its scope path, outermost scope first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	pub start: usize,
	pub end: usize,
	pub scopes: Vec<String>,
}

impl Token {
	pub fn range(&self) -> Range<usize> {
		self.start..self.end
	}
}

/// Output of one tokenize call.
#[derive(Debug, Clone)]
pub struct TokenizeLineResult<T> {
	pub tokens: T,
	/// State to pass when tokenizing the next line.
	pub rule_stack: StateStack,
	/// The time budget ran out. The tail of the line is one token carrying
	/// the scopes active when tokenizing stopped.
	pub stopped_early: bool,
}

/// A rule applied wherever its selector matches the current scope path,
/// independently of the normal rule nesting.
#[derive(Debug, Clone)]
pub struct Injection {
	pub selector: String,
	pub matcher: Matcher,
	pub rule_id: RuleId,
	/// Scope name of the grammar the injection comes from.
	pub grammar_scope: String,
	pub priority: Priority,
}

#[derive(Debug, Clone)]
pub(crate) struct TokenTypeMatcher {
	pub matcher: Matcher,
	pub token_type: StandardTokenType,
}

/// One grammar, compiled on first use.
pub struct Grammar {
	scope_name: String,
	raw: Arc<RawGrammar>,
	repository: Arc<dyn GrammarRepository>,
	theme: Arc<dyn ThemeProvider>,
	attributes: BasicScopeAttributesProvider,
	token_types: Vec<TokenTypeMatcher>,
	brackets: BalancedBracketSelectors,
	compiled: OnceLock<CompiledGrammar>,
}

impl Grammar {
	/// Wraps `raw` without compiling it. `raw` is copied; the caller's value
	/// is left untouched. The grammar's scope name is `raw.scope_name`.
	pub fn new(
		raw: &RawGrammar,
		options: &GrammarOptions,
		repository: Arc<dyn GrammarRepository>,
		theme: Arc<dyn ThemeProvider>,
	) -> Self {
		let token_types = options
			.token_types
			.iter()
			.flat_map(|(selector, &token_type)| {
				create_matchers(selector)
					.into_iter()
					.map(move |m| TokenTypeMatcher {
						matcher: m.matcher,
						token_type,
					})
			})
			.collect();

		Self {
			scope_name: raw.scope_name.clone(),
			raw: Arc::new(init_grammar(raw, None)),
			repository,
			theme,
			attributes: BasicScopeAttributesProvider::new(options.initial_language, &options.embedded_languages),
			token_types,
			brackets: BalancedBracketSelectors::new(
				options.balanced_bracket_selectors.as_slice(),
				options.unbalanced_bracket_selectors.as_slice(),
			),
			compiled: OnceLock::new(),
		}
	}

	pub fn scope_name(&self) -> &str {
		&self.scope_name
	}

	/// Display name declared by the grammar.
	pub fn name(&self) -> Option<&str> {
		self.raw.name.as_deref()
	}

	pub fn file_types(&self) -> &[String] {
		&self.raw.file_types
	}

	pub fn first_line_match(&self) -> Option<&str> {
		self.raw.first_line_match.as_deref()
	}

	pub fn root_rule_id(&self) -> RuleId {
		self.compiled().root
	}

	pub fn rule(&self, id: RuleId) -> Result<&Rule> {
		self.compiled().rules.get(id)
	}

	/// Injections in the order they are tried.
	pub fn injections(&self) -> &[Injection] {
		&self.compiled().injections
	}

	/// Scope names of the external grammars pulled in by includes and
	/// injections.
	pub fn included_grammars(&self) -> impl Iterator<Item = &str> {
		self.compiled().included.keys().map(String::as_str)
	}

	/// Compiles the grammar on first call and returns the cached result.
	pub(crate) fn compiled(&self) -> &CompiledGrammar {
		self.compiled
			.get_or_init(|| CompiledGrammar::build(&self.scope_name, &self.raw, &*self.repository))
	}

	pub(crate) fn encoder(&self) -> ScopeEncoder<'_> {
		ScopeEncoder {
			attributes: &self.attributes,
			theme: &*self.theme,
		}
	}

	/// Tokenizes one line into scope-name tokens.
	///
	/// `prev` is the `rule_stack` returned for the previous line, or `None`
	/// for the first line of a document. `time_limit` bounds the work spent
	/// on this line.
	pub fn tokenize_line(
		&self,
		line: &str,
		prev: Option<&StateStack>,
		time_limit: Option<Duration>,
	) -> Result<TokenizeLineResult<Vec<Token>>> {
		let (tokens, outcome) = self.tokenize(line, prev, time_limit, OutputMode::Scopes)?;
		Ok(TokenizeLineResult {
			tokens: tokens.into_tokens(&outcome.stack, line.len()),
			rule_stack: outcome.stack,
			stopped_early: outcome.stopped_early,
		})
	}

	/// Tokenizes one line into flat `(end offset, metadata)` pairs.
	pub fn tokenize_line2(
		&self,
		line: &str,
		prev: Option<&StateStack>,
		time_limit: Option<Duration>,
	) -> Result<TokenizeLineResult<Vec<u32>>> {
		let (tokens, outcome) = self.tokenize(line, prev, time_limit, OutputMode::Binary)?;
		Ok(TokenizeLineResult {
			tokens: tokens.into_binary(&outcome.stack, line.len()),
			rule_stack: outcome.stack,
			stopped_early: outcome.stopped_early,
		})
	}

	fn tokenize(
		&self,
		line: &str,
		prev: Option<&StateStack>,
		time_limit: Option<Duration>,
		mode: OutputMode,
	) -> Result<(LineTokens<'_>, StringOutcome)> {
		let compiled = self.compiled();
		let started = Instant::now();
		let scan = ScanId::next();
		let (stack, is_first_line) = match prev {
			Some(prev) => (prev.clone(), false),
			None => (self.initial_state(compiled, scan)?, true),
		};

		let text = if line.ends_with('\n') {
			Cow::Borrowed(line)
		} else {
			Cow::Owned(format!("{line}\n"))
		};

		let mut tokens = LineTokens::new(mode, &self.token_types, &self.brackets);
		let tokenizer = Tokenizer::new(self, compiled, scan, started, time_limit);
		let outcome = tokenizer.tokenize_string(&text, LinePosition { pos: 0, is_first_line }, stack, &mut tokens, true)?;
		Ok((tokens, outcome))
	}

	/// Root state for the first line of a document.
	fn initial_state(&self, compiled: &CompiledGrammar, scan: ScanId) -> Result<StateStack> {
		let defaults = AttributedScopeStack::merge_attributes(
			EncodedTokenAttributes::default(),
			self.attributes.default_attributes(),
			Some(self.theme.defaults()),
		);
		let root_name = compiled.rules.get(compiled.root)?.name_source();
		let scopes = match root_name.filter(|name| !name.is_empty()) {
			Some(root_scope) => AttributedScopeStack::root_with_lookup(root_scope, defaults, self.encoder()),
			None => AttributedScopeStack::root(UNKNOWN_ROOT_SCOPE, defaults),
		};
		Ok(StateStack::root(compiled.root, scopes, scan))
	}
}

impl fmt::Debug for Grammar {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Grammar")
			.field("scope_name", &self.scope_name)
			.field("compiled", &self.compiled.get().is_some())
			.finish_non_exhaustive()
	}
}
